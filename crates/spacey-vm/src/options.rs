//! Compilation options and engine configuration.
//!
//! Both types deserialize with serde and fall back to defaults for missing
//! fields, so a host can embed them in its own configuration files.

use serde::{Deserialize, Serialize};

/// Options recognized by [`crate::Engine::compile`].
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct CompileOptions {
    /// Compile as strict mode code even without a `"use strict"` directive
    pub strict_mode: bool,
    /// Reported in error messages and stack information only
    #[serde(rename = "sourceURL")]
    pub source_url: Option<String>,
}

impl CompileOptions {
    /// Options with a source URL set.
    pub fn with_source_url(url: impl Into<String>) -> Self {
        Self {
            strict_mode: false,
            source_url: Some(url.into()),
        }
    }
}

/// Limits and policies of one engine instance.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct EngineConfig {
    /// Maximum number of interpreter frames
    pub max_stack_depth: usize,
    /// Maximum nesting of native functions calling back into scripts
    pub max_native_depth: usize,
    /// Surface stack overflow as a catchable `RangeError`
    pub catchable_stack_overflow: bool,
    /// Instructions between calls to the instruction observer
    pub instruction_threshold: u64,
    /// Sloppy assignments to undeclared names create global properties
    pub implicit_globals: bool,
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            max_stack_depth: 10_000,
            max_native_depth: 200,
            catchable_stack_overflow: false,
            instruction_threshold: 100_000,
            implicit_globals: true,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_compile_options_from_json() {
        let options: CompileOptions =
            serde_json::from_str(r#"{"strictMode": true, "sourceURL": "a.js"}"#).unwrap();
        assert!(options.strict_mode);
        assert_eq!(options.source_url.as_deref(), Some("a.js"));

        let options: CompileOptions = serde_json::from_str("{}").unwrap();
        assert_eq!(options, CompileOptions::default());
    }

    #[test]
    fn test_engine_config_defaults() {
        let config: EngineConfig = serde_json::from_str(r#"{"max_stack_depth": 50}"#).unwrap();
        assert_eq!(config.max_stack_depth, 50);
        assert!(config.implicit_globals);
        assert!(!config.catchable_stack_overflow);
    }
}
