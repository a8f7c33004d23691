// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.
//
// Copyright (c) 2025 Pegasus Heavy Industries, LLC

//! # spacey-vm
//!
//! A bytecode ECMAScript engine core, implemented in Rust.
//!
//! ## Overview
//!
//! Source text flows through four stages:
//! - [`lexer`] turns characters into tokens
//! - [`parser`] builds an AST and reports early errors
//! - [`compiler`] resolves scopes and emits bytecode
//! - [`vm`] runs the bytecode over the object model in [`runtime`]
//!
//! Objects and scopes live in the generation-checked arenas of [`gc`].
//! The regular expression backend, host objects, modules and the console
//! are pluggable through the traits in [`host`].
//!
//! ## Quick Start
//!
//! ```rust
//! use spacey_vm::{Completion, Engine, Value};
//!
//! let mut engine = Engine::new();
//! let completion = engine.evaluate("[1, 2, 3].map(x => x * 2).join()").unwrap();
//! assert_eq!(completion, Completion::Normal(Value::from("2,4,6")));
//! ```
//!
//! ## Threads
//!
//! An [`Engine`] owns one realm and runs on one thread at a time; it is
//! `Send` but not shared. Compiled code is `Send + Sync` and may be shared
//! freely, for example through a [`CodeCache`].

#![warn(missing_docs)]
#![warn(clippy::all)]

pub mod ast;
pub mod builtins;
pub mod cache;
pub mod compiler;
pub mod error;
pub mod gc;
pub mod host;
pub mod lexer;
pub mod options;
#[cfg(feature = "parallel")]
pub mod parallel;
pub mod parser;
pub mod runtime;
mod stack;
pub mod vm;

use std::sync::Arc;

use tracing::debug;

pub use cache::CodeCache;
pub use compiler::{CompiledFunction, compile, compile_module};
pub use error::{CompileError, CompileErrorKind, Error, Result};
pub use gc::{GcStats, ObjectRef};
pub use host::{
    ConsoleLevel, ConsoleSink, HostObject, InstructionObserver, MemoryModuleLoader, ModuleLoader, ModuleRecord,
    ObserverAction, RegexEngine,
};
pub use options::{CompileOptions, EngineConfig};
#[cfg(feature = "parallel")]
pub use parallel::{CompileJob, ParallelExecutor};
pub use runtime::NativeFn;
pub use runtime::object::{HostHandle, JsObject, ObjectKind, PropertyKey};
pub use runtime::string::JsString;
pub use runtime::value::Value;
pub use vm::VM;

/// The outcome of running code.
#[derive(Debug, Clone, PartialEq)]
pub enum Completion {
    /// The code ran to the end; its completion value
    Normal(Value),
    /// An exception escaped the code
    Thrown(Value),
}

impl Completion {
    /// The normal value, or [`Error::Thrown`].
    pub fn into_result(self) -> Result<Value> {
        match self {
            Completion::Normal(value) => Ok(value),
            Completion::Thrown(value) => Err(Error::Thrown(value)),
        }
    }

    /// Whether an exception escaped.
    pub fn is_thrown(&self) -> bool {
        matches!(self, Completion::Thrown(_))
    }

    /// The carried value, either way.
    pub fn value(&self) -> &Value {
        match self {
            Completion::Normal(value) | Completion::Thrown(value) => value,
        }
    }
}

/// The main JavaScript engine instance.
///
/// Owns a [`VM`] (one heap, one realm) and a code cache. Script outcomes,
/// including uncaught exceptions, come back as a [`Completion`]; `Err` is
/// reserved for compile errors and conditions scripts cannot catch
/// (stack overflow by default, termination, internal errors).
pub struct Engine {
    vm: VM,
    cache: Arc<CodeCache>,
}

impl Engine {
    /// Creates an engine with default configuration.
    pub fn new() -> Self {
        Self::with_config(EngineConfig::default())
    }

    /// Creates an engine with `config` and a private code cache.
    pub fn with_config(config: EngineConfig) -> Self {
        Self::with_cache(config, Arc::new(CodeCache::new()))
    }

    /// Creates an engine sharing `cache` with other engines.
    pub fn with_cache(config: EngineConfig, cache: Arc<CodeCache>) -> Self {
        Self {
            vm: VM::new(config),
            cache,
        }
    }

    /// The underlying VM.
    pub fn vm(&mut self) -> &mut VM {
        &mut self.vm
    }

    /// The code cache.
    pub fn cache(&self) -> &Arc<CodeCache> {
        &self.cache
    }

    /// The global object.
    pub fn global_object(&self) -> ObjectRef {
        self.vm.global_object()
    }

    /// Compiles a script, reusing cached code for identical source and options.
    pub fn compile(&self, source: &str, options: &CompileOptions) -> Result<Arc<CompiledFunction>> {
        Ok(self.cache.get_or_compile(source, options)?)
    }

    /// Runs compiled top-level code with the global object as `this`.
    pub fn run(&mut self, code: Arc<CompiledFunction>) -> Result<Completion> {
        let this = Value::Object(self.vm.global_object());
        self.run_with(code, this, Vec::new())
    }

    /// Runs compiled top-level code with an explicit `this` and arguments.
    pub fn run_with(&mut self, code: Arc<CompiledFunction>, this: Value, args: Vec<Value>) -> Result<Completion> {
        let result = self.vm.run_script(code, this, args);
        self.complete(result)
    }

    /// Compiles and runs `source` with default options.
    pub fn evaluate(&mut self, source: &str) -> Result<Completion> {
        self.evaluate_with(source, &CompileOptions::default())
    }

    /// Compiles and runs `source`.
    pub fn evaluate_with(&mut self, source: &str, options: &CompileOptions) -> Result<Completion> {
        let code = self.compile(source, options)?;
        self.run(code)
    }

    /// Compiles and runs `source`; an uncaught exception is
    /// [`Error::Thrown`].
    pub fn eval(&mut self, source: &str) -> Result<Value> {
        self.evaluate(source)?.into_result()
    }

    /// Calls a script function.
    pub fn call(&mut self, function: &Value, this: &Value, args: &[Value]) -> Result<Completion> {
        let result = self.vm.call(function, this, args);
        self.complete(result)
    }

    /// Calls the global function `name` with `undefined` as `this`.
    pub fn call_global(&mut self, name: &str, args: &[Value]) -> Result<Completion> {
        let function = self.get_global(name)?;
        self.call(&function, &Value::Undefined, args)
    }

    /// Reads a property of the global object.
    pub fn get_global(&mut self, name: &str) -> Result<Value> {
        let global = Value::Object(self.vm.global_object());
        self.vm.get_named(&global, name)
    }

    /// Writes a property of the global object.
    pub fn set_global(&mut self, name: &str, value: Value) -> Result<()> {
        let global = self.vm.global_object();
        self.vm.put(global, name, value)
    }

    /// Defines a global function implemented in Rust.
    pub fn register_function(&mut self, name: &str, length: u32, function: NativeFn) -> Result<()> {
        let function = self.vm.new_native_function(name, length, function, None);
        self.set_global(name, Value::Object(function))
    }

    /// Wraps a host object so scripts can use it.
    pub fn host_object(&mut self, host: Arc<dyn HostObject>) -> Value {
        let intrinsics = self.vm.intrinsics();
        let prototype = if host.is_callable() {
            intrinsics.function_prototype
        } else {
            intrinsics.object_prototype
        };
        let object = JsObject::with_kind(Some(prototype), ObjectKind::Host(HostHandle(host)));
        Value::Object(self.vm.alloc(object))
    }

    /// Converts a value with the script `String()` semantics.
    pub fn to_string(&mut self, value: &Value) -> Result<String> {
        Ok(self.vm.to_string(value)?.to_string())
    }

    /// Replaces the regular expression backend.
    pub fn set_regex_engine(&mut self, engine: Arc<dyn RegexEngine>) {
        self.vm.set_regex_engine(engine);
    }

    /// Installs a module loader and the global `require`.
    pub fn set_module_loader(&mut self, loader: Arc<dyn ModuleLoader>) -> Result<()> {
        self.vm.set_module_loader(loader)
    }

    /// Replaces the sink `console` methods write to.
    pub fn set_console(&mut self, console: Arc<dyn ConsoleSink>) {
        self.vm.set_console(console);
    }

    /// Installs the cooperative cancellation hook.
    pub fn set_observer(&mut self, observer: impl InstructionObserver + 'static) {
        self.vm.set_observer(Box::new(observer));
    }

    /// Reclaims unreachable objects and scopes.
    pub fn collect_garbage(&mut self) -> Result<GcStats> {
        let stats = self.vm.collect_garbage()?;
        debug!(
            objects_freed = stats.objects_freed,
            scopes_freed = stats.scopes_freed,
            objects_live = stats.objects_live,
            "garbage collected"
        );
        Ok(stats)
    }

    fn complete(&mut self, result: Result<Value>) -> Result<Completion> {
        match result {
            Ok(value) => Ok(Completion::Normal(value)),
            Err(error) if error.is_catchable() => Ok(Completion::Thrown(self.vm.error_value(error)?)),
            Err(error) => Err(error),
        }
    }
}

impl Default for Engine {
    fn default() -> Self {
        Self::new()
    }
}

impl std::fmt::Debug for Engine {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Engine").field("cache", &self.cache).finish_non_exhaustive()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn assert_send<T: Send>() {}
    fn assert_send_sync<T: Send + Sync>() {}

    #[test]
    fn test_thread_bounds() {
        assert_send::<Engine>();
        assert_send_sync::<CompiledFunction>();
        assert_send_sync::<CodeCache>();
    }

    #[test]
    fn test_evaluate() {
        let mut engine = Engine::new();
        assert_eq!(engine.eval("1 + 2").unwrap(), Value::Number(3.0));
        let completion = engine.evaluate("throw 7").unwrap();
        assert_eq!(completion, Completion::Thrown(Value::Number(7.0)));
        assert!(matches!(engine.eval("throw 7"), Err(Error::Thrown(_))));
    }

    #[test]
    fn test_compile_error_is_err() {
        let mut engine = Engine::new();
        match engine.evaluate("var = 1") {
            Err(Error::SyntaxError(error)) => assert_eq!(error.kind, CompileErrorKind::Syntax),
            other => panic!("expected a syntax error, got {other:?}"),
        }
    }

    #[test]
    fn test_compile_is_cached() {
        let mut engine = Engine::new();
        let options = CompileOptions::default();
        let first = engine.compile("var n = (n || 0) + 1; n", &options).unwrap();
        let second = engine.compile("var n = (n || 0) + 1; n", &options).unwrap();
        assert!(Arc::ptr_eq(&first, &second));
        assert_eq!(engine.run(first).unwrap(), Completion::Normal(Value::Number(1.0)));
        assert_eq!(engine.run(second).unwrap(), Completion::Normal(Value::Number(2.0)));
    }

    #[test]
    fn test_globals_and_calls() {
        let mut engine = Engine::new();
        engine.set_global("answer", Value::Number(42.0)).unwrap();
        engine.eval("function twice(x) { return answer + x * 2; }").unwrap();
        let completion = engine.call_global("twice", &[Value::Number(4.0)]).unwrap();
        assert_eq!(completion, Completion::Normal(Value::Number(50.0)));
        assert_eq!(engine.get_global("missing").unwrap(), Value::Undefined);
    }

    #[test]
    fn test_register_function() {
        fn add(vm: &mut VM, _this: &Value, args: &[Value]) -> Result<Value> {
            let mut sum = 0.0;
            for value in args {
                sum += vm.to_number(value)?;
            }
            Ok(Value::Number(sum))
        }
        let mut engine = Engine::new();
        engine.register_function("add", 2, add).unwrap();
        assert_eq!(engine.eval("add(1, 2, '3')").unwrap(), Value::Number(6.0));
    }

    #[test]
    fn test_native_type_error_becomes_thrown_error_object() {
        let mut engine = Engine::new();
        let undefined = Value::Undefined;
        let completion = engine.call(&undefined, &undefined, &[]).unwrap();
        let Completion::Thrown(error) = completion else {
            panic!("calling undefined should throw");
        };
        assert!(engine.to_string(&error).unwrap().starts_with("TypeError"));
    }
}
