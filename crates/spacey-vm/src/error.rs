//! Error types shared by every stage of the engine.

use std::fmt;

use thiserror::Error;

use crate::runtime::value::Value;

/// Whether an early error is reported as a `SyntaxError` or a `ReferenceError`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CompileErrorKind {
    /// Grammar violations and static semantic errors
    Syntax,
    /// Invalid assignment targets such as `1 = 2`
    Reference,
}

impl fmt::Display for CompileErrorKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            CompileErrorKind::Syntax => f.write_str("SyntaxError"),
            CompileErrorKind::Reference => f.write_str("ReferenceError"),
        }
    }
}

/// An error detected before any code runs, with its source location.
#[derive(Debug, Clone, PartialEq, Error)]
#[error("{kind}: {message} ({}:{line}:{column})", source_url.as_deref().unwrap_or("<anonymous>"))]
pub struct CompileError {
    /// Which error constructor the failure maps to
    pub kind: CompileErrorKind,
    /// Human-readable message
    pub message: String,
    /// 1-based line
    pub line: u32,
    /// 1-based column
    pub column: u32,
    /// Script name, if the caller supplied one
    pub source_url: Option<String>,
}

/// Errors that can occur during JavaScript compilation and execution.
#[derive(Debug, Clone, PartialEq, Error)]
pub enum Error {
    /// Early error during parsing or compilation
    #[error(transparent)]
    SyntaxError(#[from] CompileError),
    /// Reference error (unresolvable binding, TDZ access)
    #[error("ReferenceError: {0}")]
    ReferenceError(String),
    /// Type error during execution
    #[error("TypeError: {0}")]
    TypeError(String),
    /// Range error (invalid length, radix, ...)
    #[error("RangeError: {0}")]
    RangeError(String),
    /// A JavaScript value thrown by `throw` and not caught
    #[error("Uncaught {}", describe_thrown(.0))]
    Thrown(Value),
    /// The call stack exceeded `max_stack_depth` or `max_native_depth`
    #[error("RangeError: Maximum call stack size exceeded")]
    StackOverflow,
    /// The instruction observer stopped the script
    #[error("Script terminated: {0}")]
    Terminated(String),
    /// Internal engine error; indicates a bug or a stale heap handle
    #[error("InternalError: {0}")]
    InternalError(String),
}

fn describe_thrown(value: &Value) -> String {
    match value {
        Value::Object(_) => "exception object".to_string(),
        other => other.to_string(),
    }
}

impl Error {
    /// Whether a JavaScript `catch` or `finally` may observe this error.
    pub fn is_catchable(&self) -> bool {
        !matches!(
            self,
            Error::StackOverflow | Error::Terminated(_) | Error::InternalError(_)
        )
    }
}

/// Result alias used throughout the engine.
pub type Result<T> = std::result::Result<T, Error>;

/// Shorthand for `Err(Error::TypeError(..))`.
pub fn type_error<T>(message: impl Into<String>) -> Result<T> {
    Err(Error::TypeError(message.into()))
}

/// Shorthand for `Err(Error::RangeError(..))`.
pub fn range_error<T>(message: impl Into<String>) -> Result<T> {
    Err(Error::RangeError(message.into()))
}

/// Shorthand for `Err(Error::ReferenceError(..))`.
pub fn reference_error<T>(message: impl Into<String>) -> Result<T> {
    Err(Error::ReferenceError(message.into()))
}

/// Shorthand for `Err(Error::InternalError(..))`.
pub fn internal_error<T>(message: impl Into<String>) -> Result<T> {
    Err(Error::InternalError(message.into()))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_compile_error_display() {
        let error = CompileError {
            kind: CompileErrorKind::Syntax,
            message: "Unexpected token".into(),
            line: 3,
            column: 7,
            source_url: Some("main.js".into()),
        };
        assert_eq!(error.to_string(), "SyntaxError: Unexpected token (main.js:3:7)");
        let error: Error = error.into();
        assert!(error.to_string().starts_with("SyntaxError"));
    }

    #[test]
    fn test_catchability() {
        assert!(Error::TypeError("x".into()).is_catchable());
        assert!(Error::Thrown(Value::Number(1.0)).is_catchable());
        assert!(!Error::StackOverflow.is_catchable());
        assert!(!Error::Terminated("limit".into()).is_catchable());
    }

    #[test]
    fn test_thrown_display() {
        assert_eq!(Error::Thrown(Value::Number(42.0)).to_string(), "Uncaught 42");
    }
}
