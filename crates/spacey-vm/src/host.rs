//! Interfaces to the collaborators the engine core does not implement.
//!
//! The interpreter reaches outward through five narrow traits:
//!
//! - [`RegexEngine`] / [`RegexProgram`]: compiling and executing regular
//!   expressions for `RegExp` and the string methods that take patterns.
//! - [`HostObject`]: foreign objects exposed to scripts through the ordinary
//!   property contract.
//! - [`ModuleLoader`]: resolving and compiling `require`d and imported modules.
//! - [`ConsoleSink`]: where `console.*` output goes.
//! - [`InstructionObserver`]: cooperative cancellation.
//!
//! Each has a default implementation, so an engine works out of the box.

use std::sync::Arc;

use parking_lot::{Mutex, RwLock};
use rustc_hash::FxHashMap;

use crate::compiler::{CompiledFunction, compile_module};
use crate::error::{Error, Result, type_error};
use crate::gc::Tracer;
use crate::options::CompileOptions;
use crate::runtime::object::PropertyKey;
use crate::runtime::value::Value;
use crate::vm::VM;

// ============================================================================
// Regular expressions
// ============================================================================

/// A successful match. Offsets are in UTF-16 code units.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RegexMatch {
    /// Start of the whole match
    pub start: usize,
    /// End of the whole match
    pub end: usize,
    /// Capture groups 1..n; `None` for groups that did not participate
    pub captures: Vec<Option<(usize, usize)>>,
}

/// A compiled regular expression.
pub trait RegexProgram: Send + Sync {
    /// Searches `input` from UTF-16 offset `start`. With `sticky` the match
    /// must begin exactly at `start`.
    fn exec(&self, input: &str, start: usize, sticky: bool) -> Option<RegexMatch>;

    /// Names of the capture groups 1..n.
    fn group_names(&self) -> Vec<Option<String>>;
}

/// Compiles regular expressions.
pub trait RegexEngine: Send + Sync {
    /// Compiles `pattern` with the given flags, or describes why it can't.
    fn compile(&self, pattern: &str, flags: &str) -> std::result::Result<Arc<dyn RegexProgram>, String>;
}

/// The default backend, built on the `regex` crate.
///
/// Backreferences and lookaround are not supported and fail to compile.
#[derive(Debug, Default, Clone, Copy)]
pub struct DefaultRegexEngine;

impl RegexEngine for DefaultRegexEngine {
    fn compile(&self, pattern: &str, flags: &str) -> std::result::Result<Arc<dyn RegexProgram>, String> {
        for flag in flags.chars() {
            if !"gimsuy".contains(flag) || flags.matches(flag).count() > 1 {
                return Err(format!("Invalid regular expression flags '{flags}'"));
            }
        }
        let translated = translate_pattern(pattern);
        let regex = regex::RegexBuilder::new(&translated)
            .case_insensitive(flags.contains('i'))
            .multi_line(flags.contains('m'))
            .dot_matches_new_line(flags.contains('s'))
            .build()
            .map_err(|e| format!("Invalid regular expression: /{pattern}/: {e}"))?;
        Ok(Arc::new(DefaultRegexProgram { regex }))
    }
}

/// Rewrites the escapes whose meaning differs between the two dialects.
fn translate_pattern(pattern: &str) -> String {
    let mut out = String::with_capacity(pattern.len());
    let mut chars = pattern.chars();
    while let Some(c) = chars.next() {
        if c != '\\' {
            out.push(c);
            continue;
        }
        match chars.next() {
            Some('d') => out.push_str("[0-9]"),
            Some('D') => out.push_str("[^0-9]"),
            Some('w') => out.push_str("[0-9A-Za-z_]"),
            Some('W') => out.push_str("[^0-9A-Za-z_]"),
            Some('/') => out.push('/'),
            Some('0') => out.push_str("\\x00"),
            Some('c') => match chars.next() {
                Some(letter) if letter.is_ascii_alphabetic() => {
                    out.push_str(&format!("\\x{{{:02X}}}", (letter as u32) % 32));
                }
                Some(other) => {
                    out.push_str("\\\\c");
                    out.push(other);
                }
                None => out.push_str("\\\\c"),
            },
            Some(other) => {
                out.push('\\');
                out.push(other);
            }
            None => out.push_str("\\\\"),
        }
    }
    out
}

struct DefaultRegexProgram {
    regex: regex::Regex,
}

impl RegexProgram for DefaultRegexProgram {
    fn exec(&self, input: &str, start: usize, sticky: bool) -> Option<RegexMatch> {
        let byte_start = utf16_to_byte(input, start)?;
        let captures = self.regex.captures_at(input, byte_start)?;
        let whole = captures.get(0)?;
        if sticky && whole.start() != byte_start {
            return None;
        }
        let to_units = |byte: usize| byte_to_utf16(input, byte);
        Some(RegexMatch {
            start: to_units(whole.start()),
            end: to_units(whole.end()),
            captures: (1..captures.len())
                .map(|i| captures.get(i).map(|m| (to_units(m.start()), to_units(m.end()))))
                .collect(),
        })
    }

    fn group_names(&self) -> Vec<Option<String>> {
        self.regex
            .capture_names()
            .skip(1)
            .map(|name| name.map(str::to_string))
            .collect()
    }
}

/// Byte offset of a UTF-16 offset, or `None` past the end.
pub fn utf16_to_byte(s: &str, units: usize) -> Option<usize> {
    let mut count = 0;
    for (byte, c) in s.char_indices() {
        if count >= units {
            return Some(byte);
        }
        count += c.len_utf16();
    }
    (count >= units).then_some(s.len())
}

/// UTF-16 offset of a byte offset.
pub fn byte_to_utf16(s: &str, byte: usize) -> usize {
    s[..byte.min(s.len())].chars().map(char::len_utf16).sum()
}

// ============================================================================
// Host objects
// ============================================================================

/// A foreign object exposed to scripts.
///
/// The engine wraps it in an ordinary object whose property reads and
/// writes are offered to the host first. Implementations keep their own
/// state behind interior mutability, since scripts may reach the same host
/// object through many handles.
pub trait HostObject: Send + Sync {
    /// Name reported by `Object.prototype.toString`.
    fn class_name(&self) -> &str {
        "Object"
    }

    /// Reads a property. `None` falls back to the wrapper and its prototype.
    fn get(&self, vm: &mut VM, key: &PropertyKey) -> Result<Option<Value>>;

    /// Writes a property. `false` stores it on the wrapper instead.
    fn set(&self, _vm: &mut VM, _key: &PropertyKey, _value: Value) -> Result<bool> {
        Ok(false)
    }

    /// Keys reported to `for-in` and `Object.keys`.
    fn keys(&self) -> Vec<PropertyKey> {
        Vec::new()
    }

    /// Whether scripts may call the object.
    fn is_callable(&self) -> bool {
        false
    }

    /// Called when a script calls the object.
    fn call(&self, _vm: &mut VM, _this: &Value, _args: &[Value]) -> Result<Value> {
        type_error(format!("{} is not a function", self.class_name()))
    }

    /// Reports script values the host object keeps alive.
    fn trace(&self, _tracer: &mut Tracer) {}
}

// ============================================================================
// Modules
// ============================================================================

/// A resolved module.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct ModuleRecord {
    /// Canonical module id; the module cache key
    pub id: Arc<str>,
}

/// Resolves and compiles modules for `require` and `import`.
pub trait ModuleLoader: Send + Sync {
    /// Resolves `specifier` as seen from the module `referrer`.
    fn resolve(&self, specifier: &str, referrer: Option<&str>) -> Result<ModuleRecord>;

    /// Compiles the module body (see [`crate::compiler::compile_module`]).
    fn load(&self, record: &ModuleRecord) -> Result<Arc<CompiledFunction>>;
}

/// A loader serving module sources registered in memory.
///
/// Ids are slash-separated paths; `./` and `../` specifiers resolve
/// against the directory of the referrer.
#[derive(Debug, Default)]
pub struct MemoryModuleLoader {
    sources: RwLock<FxHashMap<String, Arc<str>>>,
}

impl MemoryModuleLoader {
    /// Creates an empty loader.
    pub fn new() -> Self {
        Self::default()
    }

    /// Registers the source of module `id`.
    pub fn insert(&self, id: impl Into<String>, source: impl Into<Arc<str>>) {
        self.sources.write().insert(id.into(), source.into());
    }
}

impl ModuleLoader for MemoryModuleLoader {
    fn resolve(&self, specifier: &str, referrer: Option<&str>) -> Result<ModuleRecord> {
        let id = if specifier.starts_with("./") || specifier.starts_with("../") {
            let base = referrer
                .and_then(|r| r.rfind('/').map(|at| &r[..at]))
                .unwrap_or("");
            normalize_path(base, specifier)
        } else {
            specifier.to_string()
        };
        let sources = self.sources.read();
        let found = [id.clone(), format!("{id}.js")]
            .into_iter()
            .find(|candidate| sources.contains_key(candidate));
        match found {
            Some(id) => Ok(ModuleRecord { id: Arc::from(id) }),
            None => Err(Error::TypeError(format!("Cannot find module '{specifier}'"))),
        }
    }

    fn load(&self, record: &ModuleRecord) -> Result<Arc<CompiledFunction>> {
        let source = self
            .sources
            .read()
            .get(&*record.id)
            .cloned()
            .ok_or_else(|| Error::TypeError(format!("Cannot find module '{}'", record.id)))?;
        let options = CompileOptions::with_source_url(&*record.id);
        Ok(compile_module(&source, &options)?)
    }
}

fn normalize_path(base: &str, specifier: &str) -> String {
    let mut parts: Vec<&str> = base.split('/').filter(|p| !p.is_empty() && *p != ".").collect();
    for part in specifier.split('/') {
        match part {
            "" | "." => {}
            ".." => {
                parts.pop();
            }
            other => parts.push(other),
        }
    }
    parts.join("/")
}

// ============================================================================
// Console
// ============================================================================

/// Severity of a console message.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ConsoleLevel {
    /// `console.log`
    Log,
    /// `console.info`
    Info,
    /// `console.warn`
    Warn,
    /// `console.error`
    Error,
    /// `console.debug`
    Debug,
}

/// Receives the output of the `console` builtins.
pub trait ConsoleSink: Send + Sync {
    /// Writes one formatted message.
    fn write(&self, level: ConsoleLevel, message: &str);
}

/// Emits console output as `tracing` events on target `spacey_vm::console`.
#[derive(Debug, Default, Clone, Copy)]
pub struct TracingConsole;

impl ConsoleSink for TracingConsole {
    fn write(&self, level: ConsoleLevel, message: &str) {
        match level {
            ConsoleLevel::Log | ConsoleLevel::Info => {
                tracing::info!(target: "spacey_vm::console", "{message}")
            }
            ConsoleLevel::Warn => tracing::warn!(target: "spacey_vm::console", "{message}"),
            ConsoleLevel::Error => tracing::error!(target: "spacey_vm::console", "{message}"),
            ConsoleLevel::Debug => tracing::debug!(target: "spacey_vm::console", "{message}"),
        }
    }
}

/// Collects console output in memory.
#[derive(Debug, Default)]
pub struct BufferConsole {
    lines: Mutex<Vec<(ConsoleLevel, String)>>,
}

impl BufferConsole {
    /// Creates an empty buffer.
    pub fn new() -> Self {
        Self::default()
    }

    /// Removes and returns everything written so far.
    pub fn take(&self) -> Vec<(ConsoleLevel, String)> {
        std::mem::take(&mut *self.lines.lock())
    }

    /// The messages written so far, without levels.
    pub fn messages(&self) -> Vec<String> {
        self.lines.lock().iter().map(|(_, line)| line.clone()).collect()
    }
}

impl ConsoleSink for BufferConsole {
    fn write(&self, level: ConsoleLevel, message: &str) {
        self.lines.lock().push((level, message.to_string()));
    }
}

impl<T: ConsoleSink + ?Sized> ConsoleSink for Arc<T> {
    fn write(&self, level: ConsoleLevel, message: &str) {
        (**self).write(level, message);
    }
}

// ============================================================================
// Instruction observer
// ============================================================================

/// What the interpreter should do after consulting the observer.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ObserverAction {
    /// Keep running
    Continue,
    /// Abort the script with [`Error::Terminated`]
    Terminate(String),
}

/// Cooperative cancellation hook.
///
/// Called at backward branches and calls once at least
/// `EngineConfig::instruction_threshold` instructions ran since the last
/// call, with the total executed by the current run.
pub trait InstructionObserver: Send {
    /// Decides whether execution continues.
    fn observe(&mut self, instructions: u64) -> ObserverAction;
}

impl<F: FnMut(u64) -> ObserverAction + Send> InstructionObserver for F {
    fn observe(&mut self, instructions: u64) -> ObserverAction {
        self(instructions)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_regex_exec() {
        let program = DefaultRegexEngine.compile("(\\d+)-(x)?", "").unwrap();
        let found = program.exec("ab 12-", 0, false).unwrap();
        assert_eq!((found.start, found.end), (3, 6));
        assert_eq!(found.captures, vec![Some((3, 5)), None]);
        assert!(program.exec("ab 12-", 1, true).is_none());
        assert!(program.exec("ab 12-", 3, true).is_some());
    }

    #[test]
    fn test_regex_offsets_are_utf16() {
        let program = DefaultRegexEngine.compile("b", "").unwrap();
        let found = program.exec("😀b", 0, false).unwrap();
        assert_eq!((found.start, found.end), (2, 3));
        assert_eq!(utf16_to_byte("😀b", 2), Some(4));
        assert_eq!(utf16_to_byte("ab", 3), None);
    }

    #[test]
    fn test_regex_flags() {
        assert!(DefaultRegexEngine.compile("a", "gg").is_err());
        assert!(DefaultRegexEngine.compile("a", "q").is_err());
        let program = DefaultRegexEngine.compile("A", "i").unwrap();
        assert!(program.exec("a", 0, false).is_some());
    }

    #[test]
    fn test_memory_loader_resolves_relative() {
        let loader = MemoryModuleLoader::new();
        loader.insert("lib/util.js", "exports.x = 1;");
        let record = loader.resolve("./util", Some("lib/main.js")).unwrap();
        assert_eq!(&*record.id, "lib/util.js");
        assert!(loader.resolve("missing", None).is_err());
        assert!(loader.load(&record).is_ok());
    }

    #[test]
    fn test_buffer_console() {
        let console = BufferConsole::new();
        console.write(ConsoleLevel::Warn, "careful");
        assert_eq!(console.messages(), vec!["careful".to_string()]);
        assert_eq!(console.take(), vec![(ConsoleLevel::Warn, "careful".to_string())]);
        assert!(console.take().is_empty());
    }

    #[test]
    fn test_closure_observer() {
        let mut observer = |count: u64| {
            if count > 10 {
                ObserverAction::Terminate("limit".into())
            } else {
                ObserverAction::Continue
            }
        };
        assert_eq!(observer.observe(5), ObserverAction::Continue);
        assert!(matches!(observer.observe(11), ObserverAction::Terminate(_)));
    }
}
