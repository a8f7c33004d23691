//! The bytecode interpreter.
//!
//! Script-to-script calls push a frame onto [`VM::frames`] and keep running
//! in the same dispatch loop; only native code calling back into scripts
//! (and generator resumption) re-enters [`VM::execute`] recursively. Each
//! `execute` owns the frames above the height it started at, its *base*:
//! exceptions unwind through those frames and returns out of the base frame
//! end the call.

use std::fmt;
use std::sync::Arc;

use super::calls::Invocation;
use crate::builtins;
use crate::compiler::bytecode::{
    COMPLETION_RETURN, COMPLETION_THROW, CodeKind, HandlerKind, TemplateSite,
};
use crate::compiler::{CompiledFunction, Constant, Instruction, OpCode, Operand};
use crate::error::{CompileError, CompileErrorKind, Error, Result, internal_error, type_error};
use crate::gc::{GcStats, Heap, ObjectRef, ScopeRef};
use crate::host::{
    ConsoleSink, DefaultRegexEngine, InstructionObserver, ModuleLoader, ObserverAction, RegexEngine,
    TracingConsole,
};
use crate::options::EngineConfig;
use crate::runtime::context::{ErrorType, Intrinsics, Realm};
use crate::runtime::environment::{Scope, ScopeKind};
use crate::runtime::function::{CallFrame, GeneratorData, GeneratorState, ResumeMode};
use crate::runtime::object::{
    Attributes, ForInState, JsObject, ObjectKind, PropertyDescriptor, PropertyKey, PropertySlot,
};
use crate::runtime::string::JsString;
use crate::runtime::value::Value;

use super::arithmetic::NumericOp;

/// How a frame handed control back to [`VM::execute`]'s caller.
#[derive(Debug, Clone)]
pub(crate) enum Exit {
    /// The base frame returned
    Return(Value),
    /// The base frame (a generator) yielded this iterator result
    Yield(Value),
}

/// An abrupt completion injected into a resumed generator frame.
#[derive(Debug, Clone)]
pub(crate) enum Injected {
    Throw(Value),
    Return(Value),
}

/// Where a name resolved to.
enum NameRef {
    Binding(ScopeRef, u32),
    Object(ObjectRef),
    Unresolved,
}

/// The virtual machine: one heap, one realm and the frames running on it.
pub struct VM {
    pub(crate) heap: Heap,
    pub(crate) realm: Realm,
    pub(crate) frames: Vec<CallFrame>,
    pub(crate) config: EngineConfig,
    pub(crate) native_depth: usize,
    instructions: u64,
    next_check: u64,
    pub(crate) regex: Arc<dyn RegexEngine>,
    pub(crate) loader: Option<Arc<dyn ModuleLoader>>,
    pub(crate) console: Arc<dyn ConsoleSink>,
    observer: Option<Box<dyn InstructionObserver>>,
    /// State of the `Math.random` generator
    pub(crate) random_state: u64,
    /// Arrays being joined, to cut cycles short
    pub(crate) join_stack: Vec<ObjectRef>,
}

impl VM {
    /// Creates a VM with a fresh realm.
    pub fn new(config: EngineConfig) -> Self {
        let mut heap = Heap::new();
        let realm = Realm::new(&mut heap);
        let next_check = config.instruction_threshold;
        Self {
            heap,
            realm,
            frames: Vec::new(),
            config,
            native_depth: 0,
            instructions: 0,
            next_check,
            regex: Arc::new(DefaultRegexEngine),
            loader: None,
            console: Arc::new(TracingConsole),
            observer: None,
            random_state: builtins::math::seed(),
            join_stack: Vec::new(),
        }
    }

    /// The heap.
    pub fn heap(&self) -> &Heap {
        &self.heap
    }

    /// The heap, mutably.
    pub fn heap_mut(&mut self) -> &mut Heap {
        &mut self.heap
    }

    /// The realm.
    pub fn realm(&self) -> &Realm {
        &self.realm
    }

    /// The intrinsic objects.
    pub fn intrinsics(&self) -> &Intrinsics {
        &self.realm.intrinsics
    }

    /// The global object.
    pub fn global_object(&self) -> ObjectRef {
        self.realm.global_object
    }

    /// The engine configuration.
    pub fn config(&self) -> &EngineConfig {
        &self.config
    }

    /// Replaces the regular expression backend.
    pub fn set_regex_engine(&mut self, engine: Arc<dyn RegexEngine>) {
        self.regex = engine;
    }

    /// Installs a module loader and the global `require`.
    pub fn set_module_loader(&mut self, loader: Arc<dyn ModuleLoader>) -> Result<()> {
        self.loader = Some(loader);
        let require = self.new_native_function("require", 1, builtins::require::require, None);
        let global = self.realm.global_object;
        self.heap
            .object_mut(global)?
            .insert_hidden(PropertyKey::from("require"), Value::Object(require));
        Ok(())
    }

    /// Replaces the console sink.
    pub fn set_console(&mut self, console: Arc<dyn ConsoleSink>) {
        self.console = console;
    }

    /// Installs the instruction observer.
    pub fn set_observer(&mut self, observer: Box<dyn InstructionObserver>) {
        self.observer = Some(observer);
    }

    /// Runs top-level code (a script, or a module body with its
    /// `(exports, require, module)` arguments) in the global scope.
    pub fn run_script(&mut self, code: Arc<CompiledFunction>, this: Value, args: Vec<Value>) -> Result<Value> {
        if self.frames.is_empty() {
            self.instructions = 0;
            self.next_check = self.config.instruction_threshold;
        }
        let mut frame = CallFrame::new(code, self.realm.global_scope, this, args);
        self.enter_function_scope(&mut frame);
        self.run_frame(frame)
    }

    /// Mark-and-sweep from the realm. Only allowed between runs.
    pub fn collect_garbage(&mut self) -> Result<GcStats> {
        if !self.frames.is_empty() {
            return internal_error("garbage collection while frames are live");
        }
        Ok(self.heap.collect(&self.realm))
    }

    // ========================================================================
    // Execution
    // ========================================================================

    /// Runs `frame` until it returns or yields.
    pub(crate) fn execute(&mut self, frame: CallFrame, injected: Option<Injected>) -> Result<Exit> {
        let base = self.frames.len();
        self.push_frame(frame)?;
        let result = self.run(base, injected);
        self.frames.truncate(base);
        result
    }

    fn run(&mut self, base: usize, injected: Option<Injected>) -> Result<Exit> {
        match injected {
            Some(Injected::Throw(value)) => {
                if !self.unwind_throw(base, value.clone())? {
                    return Err(Error::Thrown(value));
                }
            }
            Some(Injected::Return(value)) => {
                if let Some(exit) = self.unwind_return(base, value)? {
                    return Ok(exit);
                }
            }
            None => {}
        }
        loop {
            let error = match self.dispatch(base) {
                Ok(exit) => return Ok(exit),
                Err(error) => error,
            };
            let value = self.error_value(error)?;
            if !self.unwind_throw(base, value.clone())? {
                return Err(Error::Thrown(value));
            }
        }
    }

    fn dispatch(&mut self, base: usize) -> Result<Exit> {
        loop {
            if let Some(exit) = self.step(base)? {
                return Ok(exit);
            }
        }
    }

    /// Turns a catchable error into the script value a `catch` receives.
    pub(crate) fn error_value(&mut self, error: Error) -> Result<Value> {
        let (kind, message) = match error {
            Error::Thrown(value) => return Ok(value),
            Error::TypeError(message) => (ErrorType::Type, message),
            Error::ReferenceError(message) => (ErrorType::Reference, message),
            Error::RangeError(message) => (ErrorType::Range, message),
            Error::SyntaxError(error) => match error.kind {
                CompileErrorKind::Syntax => (ErrorType::Syntax, error.message),
                CompileErrorKind::Reference => (ErrorType::Reference, error.message),
            },
            Error::StackOverflow if self.config.catchable_stack_overflow => {
                (ErrorType::Range, "Maximum call stack size exceeded".to_string())
            }
            other => return Err(other),
        };
        Ok(Value::Object(self.new_error(kind, &message)))
    }

    /// Finds the innermost handler for an exception, popping frames down to
    /// `base`. Returns `false` when the exception leaves the base frame.
    fn unwind_throw(&mut self, base: usize, value: Value) -> Result<bool> {
        loop {
            let Some(frame) = self.frames.last_mut() else {
                return Ok(false);
            };
            let ip = frame.ip.saturating_sub(1) as u32;
            let handler = frame
                .code
                .handlers
                .iter()
                .find(|handler| handler.start <= ip && ip < handler.end)
                .cloned();
            if let Some(handler) = handler {
                frame.stack.truncate(handler.stack_depth as usize);
                frame.scopes.truncate(frame.base_scopes + handler.scope_depth as usize);
                frame.stack.push(value);
                if handler.kind == HandlerKind::Finally {
                    frame.stack.push(Value::Number(COMPLETION_THROW));
                }
                frame.ip = handler.target as usize;
                return Ok(true);
            }
            if self.frames.len() <= base + 1 {
                return Ok(false);
            }
            if let Some(frame) = self.frames.pop() {
                tracing::trace!(function = %frame.code.name, "unwind frame");
            }
        }
    }

    /// Returns from the running frame, first entering any `finally` block
    /// that covers the current instruction.
    fn unwind_return(&mut self, base: usize, value: Value) -> Result<Option<Exit>> {
        let frame = self.frame_mut()?;
        let ip = frame.ip.saturating_sub(1) as u32;
        let handler = frame
            .code
            .handlers
            .iter()
            .find(|h| h.kind == HandlerKind::Finally && h.start <= ip && ip < h.end)
            .cloned();
        if let Some(handler) = handler {
            frame.stack.truncate(handler.stack_depth as usize);
            frame.scopes.truncate(frame.base_scopes + handler.scope_depth as usize);
            frame.stack.push(value);
            frame.stack.push(Value::Number(COMPLETION_RETURN));
            frame.ip = handler.target as usize;
            return Ok(None);
        }
        self.finish_frame(base, value)
    }

    /// Pops the running frame and hands `value` to its caller.
    fn finish_frame(&mut self, base: usize, value: Value) -> Result<Option<Exit>> {
        let Some(frame) = self.frames.pop() else {
            return internal_error("return without a frame");
        };
        tracing::trace!(function = %frame.code.name, depth = self.frames.len(), "pop frame");
        let value = if frame.construct && !value.is_object() { frame.this } else { value };
        self.return_to_caller(base, value)
    }

    fn return_to_caller(&mut self, base: usize, value: Value) -> Result<Option<Exit>> {
        if self.frames.len() <= base {
            return Ok(Some(Exit::Return(value)));
        }
        self.push(value)?;
        Ok(None)
    }

    fn push_frame(&mut self, frame: CallFrame) -> Result<()> {
        if self.frames.len() >= self.config.max_stack_depth {
            return Err(Error::StackOverflow);
        }
        tracing::trace!(function = %frame.code.name, depth = self.frames.len(), "push frame");
        self.frames.push(frame);
        Ok(())
    }

    /// Consults the instruction observer once enough instructions ran.
    fn checkpoint(&mut self) -> Result<()> {
        if self.instructions < self.next_check {
            return Ok(());
        }
        self.next_check = self.instructions + self.config.instruction_threshold.max(1);
        if let Some(observer) = self.observer.as_mut()
            && let ObserverAction::Terminate(reason) = observer.observe(self.instructions)
        {
            tracing::warn!(instructions = self.instructions, %reason, "script terminated by observer");
            return Err(Error::Terminated(reason));
        }
        Ok(())
    }

    /// Executes one instruction of the running frame.
    fn step(&mut self, base: usize) -> Result<Option<Exit>> {
        let frame = self.frame_mut()?;
        let Some(instruction) = frame.code.bytecode.instructions.get(frame.ip) else {
            return internal_error("instruction pointer out of range");
        };
        let Instruction { opcode, operand } = instruction.clone();
        frame.ip += 1;
        self.instructions += 1;

        match opcode {
            // Constants
            OpCode::Constant => {
                let value = match self.constant(index(operand)?)? {
                    Constant::Number(n) => Value::Number(n),
                    Constant::String(s) => Value::String(s),
                    Constant::BigInt(n) => Value::BigInt(n),
                    _ => return internal_error("constant is not a primitive"),
                };
                self.push(value)?;
            }
            OpCode::Undefined => self.push(Value::Undefined)?,
            OpCode::Null => self.push(Value::Null)?,
            OpCode::True => self.push(Value::Boolean(true))?,
            OpCode::False => self.push(Value::Boolean(false))?,

            // Stack operations
            OpCode::Pop => {
                self.pop()?;
            }
            OpCode::Dup => {
                let value = self.peek(0)?.clone();
                self.push(value)?;
            }
            OpCode::Dup2 => {
                let a = self.peek(1)?.clone();
                let b = self.peek(0)?.clone();
                self.push(a)?;
                self.push(b)?;
            }
            OpCode::Swap => {
                let stack = &mut self.frame_mut()?.stack;
                let len = stack.len();
                if len < 2 {
                    return internal_error("stack underflow");
                }
                stack.swap(len - 1, len - 2);
            }
            OpCode::Rot3 => self.rotate(3)?,
            OpCode::Rot4 => self.rotate(4)?,
            OpCode::Pick => {
                let value = self.peek(index(operand)? as usize)?.clone();
                self.push(value)?;
            }

            // Frame locals
            OpCode::GetLocal => {
                let slot = index(operand)? as usize;
                let value = self.frame()?.locals.get(slot).cloned().unwrap_or_default();
                if matches!(value, Value::Empty) {
                    return Err(self.local_tdz_error(slot));
                }
                self.push(value)?;
            }
            OpCode::SetLocal => {
                let slot = index(operand)? as usize;
                if matches!(self.frame()?.locals.get(slot), Some(Value::Empty)) {
                    return Err(self.local_tdz_error(slot));
                }
                let value = self.peek(0)?.clone();
                self.set_local(slot, value)?;
            }
            OpCode::InitLocal => {
                let slot = index(operand)? as usize;
                let value = self.pop()?;
                self.set_local(slot, value)?;
            }
            OpCode::ClearLocal => {
                let slot = index(operand)? as usize;
                self.set_local(slot, Value::Empty)?;
            }

            // Heap bindings
            OpCode::GetScope => {
                let (scope, slot) = self.scope_operand(operand)?;
                let value = self.read_binding(scope, slot)?;
                self.push(value)?;
            }
            OpCode::SetScope => {
                let (scope, slot) = self.scope_operand(operand)?;
                let value = self.peek(0)?.clone();
                let strict = self.strict()?;
                self.assign_binding(scope, slot, value, strict)?;
            }
            OpCode::InitScope => {
                let (scope, slot) = self.scope_operand(operand)?;
                let value = self.pop()?;
                self.init_binding(scope, slot, value)?;
            }

            // Dynamic name resolution
            OpCode::GetName => {
                let name = self.name(index(operand)?)?;
                let value = self.get_name(&name)?;
                self.push(value)?;
            }
            OpCode::SetName => {
                let name = self.name(index(operand)?)?;
                let value = self.peek(0)?.clone();
                let target = self.resolve_name(&name)?;
                self.assign_name(&name, target, value)?;
            }
            OpCode::TypeofName => {
                let name = self.name(index(operand)?)?;
                let value = match self.resolve_name(&name)? {
                    NameRef::Unresolved => Value::Undefined,
                    NameRef::Binding(scope, slot) => self.read_binding(scope, slot)?,
                    NameRef::Object(object) => {
                        self.get(object, &PropertyKey::from_string(name), &Value::Object(object))?
                    }
                };
                let kind = self.type_of(&value);
                self.push(Value::from(kind))?;
            }
            OpCode::DeleteName => {
                let name = self.name(index(operand)?)?;
                let deleted = match self.resolve_name(&name)? {
                    NameRef::Unresolved => true,
                    NameRef::Binding(..) => false,
                    NameRef::Object(object) => self.delete_property(object, &PropertyKey::from_string(name))?,
                };
                self.push(Value::Boolean(deleted))?;
            }
            OpCode::GetNameForCall => {
                let name = self.name(index(operand)?)?;
                let (function, this) = match self.resolve_name(&name)? {
                    NameRef::Unresolved => return Err(not_defined(&name)),
                    NameRef::Binding(scope, slot) => (self.read_binding(scope, slot)?, Value::Undefined),
                    NameRef::Object(object) => {
                        let function = self.get(object, &PropertyKey::from_string(name), &Value::Object(object))?;
                        let this = if object == self.realm.global_object {
                            Value::Undefined
                        } else {
                            Value::Object(object)
                        };
                        (function, this)
                    }
                };
                self.push(function)?;
                self.push(this)?;
            }
            OpCode::GetGlobal => {
                let name = self.name(index(operand)?)?;
                let value = match self.resolve_global(&name)? {
                    NameRef::Binding(scope, slot) => self.read_binding(scope, slot)?,
                    NameRef::Object(object) => {
                        self.get(object, &PropertyKey::from_string(name), &Value::Object(object))?
                    }
                    NameRef::Unresolved => return Err(not_defined(&name)),
                };
                self.push(value)?;
            }
            OpCode::SetGlobal => {
                let name = self.name(index(operand)?)?;
                let value = self.peek(0)?.clone();
                let target = self.resolve_global(&name)?;
                self.assign_name(&name, target, value)?;
            }

            // Declarations
            OpCode::DeclareVar => {
                let name = self.name(index(operand)?)?;
                self.declare_var(name)?;
            }
            OpCode::DeclareLet => {
                let name = self.name(index(operand)?)?;
                self.declare_lexical(name, true)?;
            }
            OpCode::DeclareConst => {
                let name = self.name(index(operand)?)?;
                self.declare_lexical(name, false)?;
            }
            OpCode::InitVar => {
                let name = self.name(index(operand)?)?;
                let value = self.pop()?;
                self.init_var(name, value)?;
            }
            OpCode::InitName => {
                let name = self.name(index(operand)?)?;
                let value = self.pop()?;
                match self.resolve_name(&name)? {
                    NameRef::Binding(scope, slot) => self.init_binding(scope, slot, value)?,
                    NameRef::Object(object) => {
                        self.set(object, PropertyKey::from_string(name), value, &Value::Object(object))?;
                    }
                    NameRef::Unresolved => {
                        let global = self.realm.global_object;
                        self.set(global, PropertyKey::from_string(name), value, &Value::Object(global))?;
                    }
                }
            }

            // Scopes
            OpCode::PushScope => {
                let Constant::Scope(template) = self.constant(index(operand)?)? else {
                    return internal_error("PushScope without a scope template");
                };
                let parent = self.frame()?.scope();
                let scope = self
                    .heap
                    .alloc_scope(Scope::from_template(&template, ScopeKind::Declarative, Some(parent)));
                self.frame_mut()?.scopes.push(scope);
            }
            OpCode::PopScope => {
                let frame = self.frame_mut()?;
                if frame.scopes.len() > 1 {
                    frame.scopes.pop();
                }
            }
            OpCode::PushWith => {
                let value = self.pop()?;
                let object = self.to_object(&value)?;
                let parent = self.frame()?.scope();
                let scope = self.heap.alloc_scope(Scope::with_object(object, Some(parent)));
                self.frame_mut()?.scopes.push(scope);
            }
            OpCode::CopyScope => {
                let current = self.frame()?.scope();
                let copy = self.heap.scope(current)?.clone();
                let copy = self.heap.alloc_scope(copy);
                let frame = self.frame_mut()?;
                if let Some(last) = frame.scopes.last_mut() {
                    *last = copy;
                }
            }

            // Function context
            OpCode::GetArg => {
                let position = index(operand)? as usize;
                let value = self.frame()?.arguments.get(position).cloned().unwrap_or_default();
                self.push(value)?;
            }
            OpCode::RestArgs => {
                let from = index(operand)? as usize;
                let rest = self.frame()?.arguments.get(from..).map(<[Value]>::to_vec).unwrap_or_default();
                let array = self.new_array(rest);
                self.push(Value::Object(array))?;
            }
            OpCode::CreateArguments => {
                let arguments = self.create_arguments()?;
                self.push(Value::Object(arguments))?;
            }
            OpCode::This => {
                let this = self.frame()?.this.clone();
                self.push(this)?;
            }
            OpCode::NewTarget => {
                let new_target = self.frame()?.new_target.clone();
                self.push(new_target)?;
            }
            OpCode::Callee => {
                let callee = self.frame()?.callee.map(Value::Object).unwrap_or_default();
                self.push(callee)?;
            }

            // Literals
            OpCode::NewObject => {
                let object = self.new_object();
                self.push(Value::Object(object))?;
            }
            OpCode::NewArray => {
                let array = self.new_array(Vec::new());
                self.push(Value::Object(array))?;
            }
            OpCode::ArrayPush => {
                let value = self.pop()?;
                let array = self.peek_object(0)?;
                self.array_append(array, value)?;
            }
            OpCode::ArrayHole => {
                let array = self.peek_object(0)?;
                if let ObjectKind::Array(data) = &mut self.heap.object_mut(array)?.kind {
                    data.length += 1;
                }
            }
            OpCode::ArraySpread => {
                let iterable = self.pop()?;
                let array = self.peek_object(0)?;
                for value in self.iterate_to_vec(&iterable)? {
                    self.array_append(array, value)?;
                }
            }
            OpCode::DefineField => {
                let name = self.name(index(operand)?)?;
                let value = self.pop()?;
                let object = self.peek_object(0)?;
                self.heap.object_mut(object)?.insert_data(PropertyKey::from_string(name), value);
            }
            OpCode::DefineComputed => {
                let value = self.pop()?;
                let key = self.pop()?;
                let key = self.to_property_key(&key)?;
                let object = self.peek_object(0)?;
                self.heap.object_mut(object)?.insert_data(key, value);
            }
            OpCode::DefineGetter | OpCode::DefineSetter => {
                let function = self.pop()?.as_object();
                let key = self.pop()?;
                let key = self.to_property_key(&key)?;
                let object = self.peek_object(0)?;
                let mut descriptor = PropertyDescriptor {
                    enumerable: Some(true),
                    configurable: Some(true),
                    ..PropertyDescriptor::default()
                };
                if opcode == OpCode::DefineGetter {
                    descriptor.get = Some(function);
                } else {
                    descriptor.set = Some(function);
                }
                self.heap.object_mut(object)?.define_own(key, descriptor);
            }
            OpCode::ObjectSpread => {
                let source = self.pop()?;
                let object = self.peek_object(0)?;
                self.copy_data_properties(object, &source, &[])?;
            }
            OpCode::SetProto => {
                let prototype = self.pop()?;
                let object = self.peek_object(0)?;
                match prototype {
                    Value::Object(prototype) => {
                        self.set_prototype_of(object, Some(prototype))?;
                    }
                    Value::Null => {
                        self.set_prototype_of(object, None)?;
                    }
                    _ => {}
                }
            }
            OpCode::CopyDataProperties => {
                let count = index(operand)? as usize;
                let keys = self.pop_n(count)?;
                let source = self.pop()?;
                let mut excluded = Vec::with_capacity(keys.len());
                for key in &keys {
                    excluded.push(self.to_property_key(key)?);
                }
                let rest = self.new_object();
                self.copy_data_properties(rest, &source, &excluded)?;
                self.push(Value::Object(rest))?;
            }

            // Property access
            OpCode::GetProperty => {
                let key = self.pop()?;
                let base = self.pop()?;
                if base.is_nullish() && key.is_object() {
                    return type_error(format!("Cannot read properties of {base}"));
                }
                let key = self.to_property_key(&key)?;
                let value = self.get_value(&base, &key)?;
                self.push(value)?;
            }
            OpCode::GetNamed => {
                let name = self.name(index(operand)?)?;
                let base = self.pop()?;
                let value = self.get_value(&base, &PropertyKey::from_string(name))?;
                self.push(value)?;
            }
            OpCode::SetProperty => {
                let value = self.pop()?;
                let key = self.pop()?;
                let base = self.pop()?;
                if base.is_nullish() && key.is_object() {
                    return type_error(format!("Cannot set properties of {base}"));
                }
                let key = self.to_property_key(&key)?;
                let strict = self.strict()?;
                self.set_value(&base, key, value.clone(), strict)?;
                self.push(value)?;
            }
            OpCode::SetNamed => {
                let name = self.name(index(operand)?)?;
                let value = self.pop()?;
                let base = self.pop()?;
                let strict = self.strict()?;
                self.set_value(&base, PropertyKey::from_string(name), value.clone(), strict)?;
                self.push(value)?;
            }
            OpCode::DeleteProperty => {
                let key = self.pop()?;
                let base = self.pop()?;
                if base.is_nullish() {
                    return type_error(format!("Cannot convert {base} to object"));
                }
                let object = self.to_object(&base)?;
                let key = self.to_property_key(&key)?;
                let deleted = self.delete_property(object, &key)?;
                if !deleted && self.strict()? {
                    return type_error(format!("Cannot delete property '{key}' of {}", self.describe(&base)));
                }
                self.push(Value::Boolean(deleted))?;
            }
            OpCode::In => {
                let object = self.pop()?;
                let key = self.pop()?;
                let Value::Object(target) = object else {
                    let key = self.to_string(&key)?;
                    return type_error(format!(
                        "Cannot use 'in' operator to search for '{key}' in {}",
                        self.describe(&object)
                    ));
                };
                let key = self.to_property_key(&key)?;
                let found = self.has_property(target, &key)?;
                self.push(Value::Boolean(found))?;
            }
            OpCode::InstanceOf => {
                let constructor = self.pop()?;
                let value = self.pop()?;
                let result = self.instance_of(&value, &constructor)?;
                self.push(Value::Boolean(result))?;
            }

            // Calls
            OpCode::Call => {
                self.checkpoint()?;
                let args = self.pop_n(index(operand)? as usize)?;
                let this = self.pop()?;
                let function = self.pop()?;
                let invocation = self.prepare_call(&function, this, args)?;
                self.invoke(invocation)?;
            }
            OpCode::CallSpread => {
                self.checkpoint()?;
                let array = self.pop()?;
                let args = self.array_like_to_vec(&array)?;
                let this = self.pop()?;
                let function = self.pop()?;
                let invocation = self.prepare_call(&function, this, args)?;
                self.invoke(invocation)?;
            }
            OpCode::New => {
                self.checkpoint()?;
                let args = self.pop_n(index(operand)? as usize)?;
                let constructor = self.pop()?;
                self.construct_from_stack(constructor, args)?;
            }
            OpCode::NewSpread => {
                self.checkpoint()?;
                let array = self.pop()?;
                let args = self.array_like_to_vec(&array)?;
                let constructor = self.pop()?;
                self.construct_from_stack(constructor, args)?;
            }
            OpCode::CallEval => {
                self.checkpoint()?;
                let args = self.pop_n(index(operand)? as usize)?;
                let this = self.pop()?;
                let function = self.pop()?;
                if function.as_object() == Some(self.realm.intrinsics.eval) {
                    match args.into_iter().next() {
                        Some(Value::String(source)) => {
                            let frame = self.direct_eval_frame(&source.to_std_string_lossy())?;
                            self.push_frame(frame)?;
                        }
                        other => self.push(other.unwrap_or_default())?,
                    }
                } else {
                    let invocation = self.prepare_call(&function, this, args)?;
                    self.invoke(invocation)?;
                }
            }
            OpCode::Return => {
                let value = self.pop()?;
                return self.finish_frame(base, value);
            }
            OpCode::Closure => {
                let Constant::Function(code) = self.constant(index(operand)?)? else {
                    return internal_error("Closure without a function constant");
                };
                let frame = self.frame()?;
                let scope = frame.scope();
                let (this_value, new_target) = if code.kind.is_arrow() {
                    (Some(frame.this.clone()), Some(frame.new_target.clone()))
                } else {
                    (None, None)
                };
                let closure = self.create_closure(code, scope, this_value, new_target)?;
                self.push(Value::Object(closure))?;
            }

            // Arithmetic
            OpCode::Add => {
                let right = self.pop()?;
                let left = self.pop()?;
                let result = self.add(&left, &right)?;
                self.push(result)?;
            }
            OpCode::Sub => self.numeric(NumericOp::Sub)?,
            OpCode::Mul => self.numeric(NumericOp::Mul)?,
            OpCode::Div => self.numeric(NumericOp::Div)?,
            OpCode::Mod => self.numeric(NumericOp::Mod)?,
            OpCode::Exp => self.numeric(NumericOp::Exp)?,
            OpCode::BitAnd => self.numeric(NumericOp::BitAnd)?,
            OpCode::BitOr => self.numeric(NumericOp::BitOr)?,
            OpCode::BitXor => self.numeric(NumericOp::BitXor)?,
            OpCode::Shl => self.numeric(NumericOp::Shl)?,
            OpCode::Shr => self.numeric(NumericOp::Shr)?,
            OpCode::UShr => self.numeric(NumericOp::UShr)?,
            OpCode::Neg => {
                let value = self.pop()?;
                let result = self.negate(&value)?;
                self.push(result)?;
            }
            OpCode::Plus => {
                let value = self.pop()?;
                let number = self.to_number(&value)?;
                self.push(Value::Number(number))?;
            }
            OpCode::Inc | OpCode::Dec => {
                let value = self.pop()?;
                let delta = if opcode == OpCode::Inc { 1 } else { -1 };
                let result = self.increment(&value, delta)?;
                self.push(result)?;
            }
            OpCode::ToNumeric => {
                let value = self.pop()?;
                let result = self.to_numeric(&value)?;
                self.push(result)?;
            }
            OpCode::BitNot => {
                let value = self.pop()?;
                let result = self.bitwise_not(&value)?;
                self.push(result)?;
            }

            // Comparison
            OpCode::Eq | OpCode::Ne => {
                let right = self.pop()?;
                let left = self.pop()?;
                let equal = self.loose_equals(&left, &right)?;
                self.push(Value::Boolean(equal == (opcode == OpCode::Eq)))?;
            }
            OpCode::StrictEq | OpCode::StrictNe => {
                let right = self.pop()?;
                let left = self.pop()?;
                let equal = left.strict_equals(&right);
                self.push(Value::Boolean(equal == (opcode == OpCode::StrictEq)))?;
            }
            OpCode::Lt | OpCode::Gt | OpCode::Le | OpCode::Ge => {
                let right = self.pop()?;
                let left = self.pop()?;
                let result = match opcode {
                    OpCode::Lt => self.less_than(&left, &right, true)? == Some(true),
                    OpCode::Gt => self.less_than(&right, &left, false)? == Some(true),
                    OpCode::Le => self.less_than(&right, &left, false)? == Some(false),
                    _ => self.less_than(&left, &right, true)? == Some(false),
                };
                self.push(Value::Boolean(result))?;
            }

            // Unary
            OpCode::Not => {
                let value = self.pop()?;
                self.push(Value::Boolean(!value.to_boolean()))?;
            }
            OpCode::TypeOf => {
                let value = self.pop()?;
                let kind = self.type_of(&value);
                self.push(Value::from(kind))?;
            }
            OpCode::ToPropertyKey => {
                let value = self.pop()?;
                let key = self.to_property_key(&value)?;
                self.push(key.to_value())?;
            }
            OpCode::ToString => {
                let value = self.pop()?;
                let string = self.to_string(&value)?;
                self.push(Value::String(string))?;
            }

            // Control flow
            OpCode::Jump => self.jump(operand)?,
            OpCode::JumpIfFalse => {
                if !self.pop()?.to_boolean() {
                    self.jump(operand)?;
                }
            }
            OpCode::JumpIfTrue => {
                if self.pop()?.to_boolean() {
                    self.jump(operand)?;
                }
            }
            OpCode::JumpIfFalseKeep => {
                if !self.peek(0)?.to_boolean() {
                    self.jump(operand)?;
                }
            }
            OpCode::JumpIfTrueKeep => {
                if self.peek(0)?.to_boolean() {
                    self.jump(operand)?;
                }
            }
            OpCode::JumpIfNotNullishKeep => {
                if !self.peek(0)?.is_nullish() {
                    self.jump(operand)?;
                }
            }
            OpCode::JumpIfNotUndefined => {
                if !self.peek(0)?.is_undefined() {
                    self.jump(operand)?;
                }
            }
            OpCode::OptionalJump => {
                let Some(Operand::Branch { target, pop }) = operand else {
                    return internal_error("OptionalJump without a branch operand");
                };
                if self.peek(0)?.is_nullish() {
                    let frame = self.frame_mut()?;
                    let keep = frame.stack.len().saturating_sub(pop as usize);
                    frame.stack.truncate(keep);
                    frame.stack.push(Value::Undefined);
                    frame.ip = target as usize;
                }
            }

            // Exceptions
            OpCode::Throw => {
                let value = self.pop()?;
                return Err(Error::Thrown(value));
            }
            OpCode::ThrowTypeError => {
                let Constant::String(message) = self.constant(index(operand)?)? else {
                    return internal_error("ThrowTypeError without a message");
                };
                return type_error(message.to_string());
            }
            OpCode::EndFinally => {
                let kind = self.pop()?;
                let value = self.pop()?;
                if kind == Value::Number(COMPLETION_RETURN) {
                    return self.unwind_return(base, value);
                }
                return Err(Error::Thrown(value));
            }

            // Iteration
            OpCode::GetIterator => {
                let iterable = self.pop()?;
                let (iterator, next) = self.get_iterator(&iterable)?;
                self.push(iterator)?;
                self.push(next)?;
            }
            OpCode::ForOfStep => match self.iterator_slot_step(0)? {
                Some(value) => self.push(value)?,
                None => self.jump(operand)?,
            },
            OpCode::IteratorClose | OpCode::DestructureClose => {
                let next = self.pop()?;
                let iterator = self.pop()?;
                if !next.is_undefined() {
                    self.iterator_close(&iterator)?;
                }
            }
            OpCode::CloseIteratorAbrupt => {
                let next = self.pop()?;
                let iterator = self.pop()?;
                if !next.is_undefined() {
                    if *self.peek(0)? == Value::Number(COMPLETION_RETURN) {
                        self.iterator_close(&iterator)?;
                    } else {
                        self.iterator_close_quietly(&iterator)?;
                    }
                }
            }
            OpCode::DestructureStep => {
                let value = self.iterator_slot_step(index(operand)? as usize)?;
                self.push(value.unwrap_or_default())?;
            }
            OpCode::DestructureRest => {
                let depth = index(operand)? as usize;
                let mut rest = Vec::new();
                while let Some(value) = self.iterator_slot_step(depth)? {
                    rest.push(value);
                }
                let array = self.new_array(rest);
                self.push(Value::Object(array))?;
            }
            OpCode::ForInPrepare => {
                let value = self.pop()?;
                let (object, keys) = if value.is_nullish() {
                    (None, Vec::new())
                } else {
                    let object = self.to_object(&value)?;
                    (Some(object), self.for_in_keys(object)?)
                };
                let state = ObjectKind::ForIn(ForInState {
                    object,
                    keys,
                    position: 0,
                });
                let iterator = self.alloc(JsObject::with_kind(None, state));
                self.push(Value::Object(iterator))?;
            }
            OpCode::ForInNext => match self.for_in_next()? {
                Some(key) => self.push(key)?,
                None => self.jump(operand)?,
            },

            // Generators
            OpCode::GeneratorStart => return self.generator_start(base),
            OpCode::Yield => return self.suspend(base, false),
            OpCode::YieldRaw => return self.suspend(base, true),
            OpCode::DelegateStep => return self.delegate_step(base, operand),

            // Miscellaneous
            OpCode::TemplateObject => {
                let Constant::Template(site) = self.constant(index(operand)?)? else {
                    return internal_error("TemplateObject without a template site");
                };
                let template = self.template_object(&site)?;
                self.push(Value::Object(template))?;
            }
            OpCode::RegExp => {
                let Constant::RegExp { pattern, flags } = self.constant(index(operand)?)? else {
                    return internal_error("RegExp without a pattern");
                };
                let regexp = builtins::regexp::create(self, &pattern, &flags)?;
                self.push(Value::Object(regexp))?;
            }
            OpCode::ImportModule => {
                let Constant::String(specifier) = self.constant(index(operand)?)? else {
                    return internal_error("ImportModule without a specifier");
                };
                let referrer = self.frame()?.code.source.url.clone();
                let exports = self.require_module(&specifier.to_std_string_lossy(), referrer.as_deref())?;
                self.push(exports)?;
            }
            OpCode::ImportDefault => {
                let namespace = self.pop()?;
                let value = if namespace.is_object() && self.get_named(&namespace, "__esModule")?.to_boolean() {
                    self.get_named(&namespace, "default")?
                } else {
                    namespace
                };
                self.push(value)?;
            }
            OpCode::RequireObjectCoercible => {
                let value = self.peek(0)?;
                if value.is_nullish() {
                    return type_error(format!("Cannot destructure '{value}' as it is {value}."));
                }
            }
            OpCode::Debugger | OpCode::Nop => {}
        }
        Ok(None)
    }

    // ========================================================================
    // Frame and stack access
    // ========================================================================

    fn frame(&self) -> Result<&CallFrame> {
        self.frames
            .last()
            .ok_or_else(|| Error::InternalError("no running frame".into()))
    }

    fn frame_mut(&mut self) -> Result<&mut CallFrame> {
        self.frames
            .last_mut()
            .ok_or_else(|| Error::InternalError("no running frame".into()))
    }

    fn strict(&self) -> Result<bool> {
        Ok(self.frame()?.code.strict)
    }

    fn push(&mut self, value: Value) -> Result<()> {
        self.frame_mut()?.stack.push(value);
        Ok(())
    }

    fn pop(&mut self) -> Result<Value> {
        self.frame_mut()?
            .stack
            .pop()
            .ok_or_else(|| Error::InternalError("stack underflow".into()))
    }

    fn pop_n(&mut self, count: usize) -> Result<Vec<Value>> {
        let stack = &mut self.frame_mut()?.stack;
        if stack.len() < count {
            return internal_error("stack underflow");
        }
        let at = stack.len() - count;
        Ok(stack.split_off(at))
    }

    /// The value `depth` slots below the top.
    fn peek(&self, depth: usize) -> Result<&Value> {
        let stack = &self.frame()?.stack;
        stack
            .len()
            .checked_sub(depth + 1)
            .and_then(|at| stack.get(at))
            .ok_or_else(|| Error::InternalError("stack underflow".into()))
    }

    fn peek_object(&self, depth: usize) -> Result<ObjectRef> {
        self.peek(depth)?
            .as_object()
            .ok_or_else(|| Error::InternalError("expected an object on the stack".into()))
    }

    /// Moves the top value below the next `count - 1` values.
    fn rotate(&mut self, count: usize) -> Result<()> {
        let stack = &mut self.frame_mut()?.stack;
        if stack.len() < count {
            return internal_error("stack underflow");
        }
        let at = stack.len() - count;
        stack[at..].rotate_right(1);
        Ok(())
    }

    fn constant(&self, index: u32) -> Result<Constant> {
        self.frame()?
            .code
            .bytecode
            .constants
            .get(index as usize)
            .cloned()
            .ok_or_else(|| Error::InternalError(format!("constant {index} out of range")))
    }

    fn name(&self, index: u32) -> Result<JsString> {
        self.frame()?
            .code
            .bytecode
            .name(index)
            .cloned()
            .ok_or_else(|| Error::InternalError(format!("name constant {index} missing")))
    }

    fn jump(&mut self, operand: Option<Operand>) -> Result<()> {
        let target = index(operand)? as usize;
        let frame = self.frame_mut()?;
        let backward = target < frame.ip;
        frame.ip = target;
        if backward {
            self.checkpoint()?;
        }
        Ok(())
    }

    fn set_local(&mut self, slot: usize, value: Value) -> Result<()> {
        match self.frame_mut()?.locals.get_mut(slot) {
            Some(local) => {
                *local = value;
                Ok(())
            }
            None => internal_error("local slot out of range"),
        }
    }

    fn local_tdz_error(&self, slot: usize) -> Error {
        let name = self
            .frames
            .last()
            .and_then(|frame| frame.code.local_names.get(slot).cloned())
            .unwrap_or_else(|| Arc::from("variable"));
        tdz_error(&name)
    }

    fn numeric(&mut self, op: NumericOp) -> Result<()> {
        let right = self.pop()?;
        let left = self.pop()?;
        let result = self.numeric_binary(op, &left, &right)?;
        self.push(result)
    }

    /// A `SyntaxError` raised at run time, positioned at the running
    /// instruction.
    pub(crate) fn syntax_error(&self, message: impl Into<String>) -> Error {
        let (line, column, source_url) = match self.frames.last() {
            Some(frame) => {
                let (line, column) = frame.code.line_col(frame.ip.saturating_sub(1)).unwrap_or((0, 0));
                (line, column, frame.code.source.url.clone())
            }
            None => (0, 0, None),
        };
        Error::SyntaxError(CompileError {
            kind: CompileErrorKind::Syntax,
            message: message.into(),
            line,
            column,
            source_url,
        })
    }

    // ========================================================================
    // Calls
    // ========================================================================

    fn invoke(&mut self, invocation: Invocation) -> Result<()> {
        match invocation {
            Invocation::Frame(frame) => self.push_frame(*frame),
            Invocation::Value(value) => self.push(value),
        }
    }

    fn construct_from_stack(&mut self, constructor: Value, args: Vec<Value>) -> Result<()> {
        let Some(new_target) = constructor.as_object() else {
            return type_error(format!("{} is not a constructor", self.describe(&constructor)));
        };
        let invocation = self.prepare_construct(&constructor, args, new_target)?;
        self.invoke(invocation)
    }

    fn create_arguments(&mut self) -> Result<ObjectRef> {
        let frame = self.frame()?;
        let arguments = frame.arguments.clone();
        let callee = frame.callee;
        let strict = frame.code.strict;
        let mut object = JsObject::with_kind(Some(self.realm.intrinsics.object_prototype), ObjectKind::Arguments);
        object.insert_hidden(PropertyKey::from("length"), Value::from(arguments.len()));
        for (position, value) in arguments.into_iter().enumerate() {
            object.insert_data(PropertyKey::Index(position as u32), value);
        }
        object.insert_hidden(
            PropertyKey::Symbol(self.realm.symbols.iterator.clone()),
            Value::Object(self.realm.intrinsics.array_values),
        );
        if !strict && let Some(callee) = callee {
            object.insert_hidden(PropertyKey::from("callee"), Value::Object(callee));
        }
        Ok(self.alloc(object))
    }

    fn array_append(&mut self, array: ObjectRef, value: Value) -> Result<()> {
        let object = self.heap.object_mut(array)?;
        let length = object.array_data().map_or(0, |data| data.length);
        object.insert_data(PropertyKey::Index(length), value);
        Ok(())
    }

    // ========================================================================
    // Bindings
    // ========================================================================

    fn scope_operand(&self, operand: Option<Operand>) -> Result<(ScopeRef, u32)> {
        let Some(Operand::Scope { hops, slot }) = operand else {
            return internal_error("expected a scope operand");
        };
        let mut scope = self.frame()?.scope();
        for _ in 0..hops {
            scope = self
                .heap
                .scope(scope)?
                .parent
                .ok_or_else(|| Error::InternalError("scope chain too short".into()))?;
        }
        Ok((scope, slot))
    }

    fn read_binding(&self, scope: ScopeRef, slot: u32) -> Result<Value> {
        let binding = self
            .heap
            .scope(scope)?
            .binding(slot)
            .ok_or_else(|| Error::InternalError("binding slot out of range".into()))?;
        if matches!(binding.value, Value::Empty) {
            return Err(tdz_error(&binding.name));
        }
        Ok(binding.value.clone())
    }

    fn init_binding(&mut self, scope: ScopeRef, slot: u32, value: Value) -> Result<()> {
        let binding = self
            .heap
            .scope_mut(scope)?
            .binding_mut(slot)
            .ok_or_else(|| Error::InternalError("binding slot out of range".into()))?;
        binding.value = value;
        Ok(())
    }

    fn assign_binding(&mut self, scope: ScopeRef, slot: u32, value: Value, strict: bool) -> Result<()> {
        let binding = self
            .heap
            .scope_mut(scope)?
            .binding_mut(slot)
            .ok_or_else(|| Error::InternalError("binding slot out of range".into()))?;
        if matches!(binding.value, Value::Empty) {
            return Err(tdz_error(&binding.name));
        }
        if !binding.mutable {
            if binding.silent && !strict {
                return Ok(());
            }
            return type_error("Assignment to constant variable.");
        }
        binding.value = value;
        Ok(())
    }

    /// Walks the scope chain for `name`; `with` objects and the global
    /// object are searched by property.
    fn resolve_name(&mut self, name: &JsString) -> Result<NameRef> {
        let mut current = Some(self.frame()?.scope());
        while let Some(scope_ref) = current {
            let scope = self.heap.scope(scope_ref)?;
            let parent = scope.parent;
            match scope.kind {
                ScopeKind::With(object) => {
                    if self.has_property(object, &PropertyKey::from_string(name.clone()))? {
                        return Ok(NameRef::Object(object));
                    }
                }
                ScopeKind::Global => break,
                ScopeKind::Declarative | ScopeKind::Function => {
                    if let Some(slot) = scope.lookup(name) {
                        return Ok(NameRef::Binding(scope_ref, slot));
                    }
                }
            }
            current = parent;
        }
        self.resolve_global(name)
    }

    fn resolve_global(&mut self, name: &JsString) -> Result<NameRef> {
        let global_scope = self.realm.global_scope;
        if let Some(slot) = self.heap.scope(global_scope)?.lookup(name) {
            return Ok(NameRef::Binding(global_scope, slot));
        }
        let global = self.realm.global_object;
        if self.has_property(global, &PropertyKey::from_string(name.clone()))? {
            return Ok(NameRef::Object(global));
        }
        Ok(NameRef::Unresolved)
    }

    fn get_name(&mut self, name: &JsString) -> Result<Value> {
        match self.resolve_name(name)? {
            NameRef::Binding(scope, slot) => self.read_binding(scope, slot),
            NameRef::Object(object) => self.get(object, &PropertyKey::from_string(name.clone()), &Value::Object(object)),
            NameRef::Unresolved => Err(not_defined(name)),
        }
    }

    fn assign_name(&mut self, name: &JsString, target: NameRef, value: Value) -> Result<()> {
        let strict = self.strict()?;
        match target {
            NameRef::Binding(scope, slot) => self.assign_binding(scope, slot, value, strict),
            NameRef::Object(object) => self.set_value(
                &Value::Object(object),
                PropertyKey::from_string(name.clone()),
                value,
                strict,
            ),
            NameRef::Unresolved => {
                if strict || !self.config.implicit_globals {
                    return Err(not_defined(name));
                }
                let global = self.realm.global_object;
                self.set(global, PropertyKey::from_string(name.clone()), value, &Value::Object(global))?;
                Ok(())
            }
        }
    }

    /// The scope receiving `var` declarations of the running code.
    fn var_scope(&self) -> Result<ScopeRef> {
        let mut current = Some(self.frame()?.scope());
        while let Some(scope_ref) = current {
            let scope = self.heap.scope(scope_ref)?;
            if scope.var_scope {
                return Ok(scope_ref);
            }
            current = scope.parent;
        }
        Ok(self.realm.global_scope)
    }

    fn declare_var(&mut self, name: JsString) -> Result<()> {
        let scope = self.var_scope()?;
        let target = self.heap.scope(scope)?;
        if target.kind != ScopeKind::Global {
            self.heap.scope_mut(scope)?.declare(name, Value::Undefined, true);
            return Ok(());
        }
        if target.lookup(&name).is_some() {
            return Err(self.syntax_error(format!("Identifier '{name}' has already been declared")));
        }
        let global = self.realm.global_object;
        let key = PropertyKey::from_string(name);
        if self.own_property(global, &key)?.is_some() {
            return Ok(());
        }
        let configurable = self.frame()?.code.kind == CodeKind::Eval;
        self.heap.object_mut(global)?.insert(
            key,
            PropertySlot::data(Value::Undefined, Attributes::new(true, true, configurable)),
        );
        Ok(())
    }

    fn declare_lexical(&mut self, name: JsString, mutable: bool) -> Result<()> {
        let global_scope = self.realm.global_scope;
        let global = self.realm.global_object;
        let restricted = self
            .own_property(global, &PropertyKey::from_string(name.clone()))?
            .is_some_and(|slot| !slot.configurable());
        if restricted || self.heap.scope(global_scope)?.lookup(&name).is_some() {
            return Err(self.syntax_error(format!("Identifier '{name}' has already been declared")));
        }
        self.heap.scope_mut(global_scope)?.declare(name, Value::Empty, mutable);
        Ok(())
    }

    fn init_var(&mut self, name: JsString, value: Value) -> Result<()> {
        let scope = self.var_scope()?;
        if self.heap.scope(scope)?.kind == ScopeKind::Global {
            let global = self.realm.global_object;
            self.set(global, PropertyKey::from_string(name), value, &Value::Object(global))?;
            return Ok(());
        }
        let target = self.heap.scope_mut(scope)?;
        let slot = target.declare(name, Value::Undefined, true);
        if let Some(binding) = target.binding_mut(slot) {
            binding.value = value;
        }
        Ok(())
    }

    // ========================================================================
    // Iteration
    // ========================================================================

    /// Steps the iterator sitting `depth` values below the top as
    /// `[iterator next ...]`. A finished or failed iterator gets its `next`
    /// slot cleared so it is not closed again.
    fn iterator_slot_step(&mut self, depth: usize) -> Result<Option<Value>> {
        let next = self.peek(depth)?.clone();
        if next.is_undefined() {
            return Ok(None);
        }
        let iterator = self.peek(depth + 1)?.clone();
        let result = self.iterator_step(&iterator, &next);
        if !matches!(result, Ok(Some(_))) {
            let stack = &mut self.frame_mut()?.stack;
            let at = stack.len() - 1 - depth;
            stack[at] = Value::Undefined;
        }
        result
    }

    fn for_in_next(&mut self) -> Result<Option<Value>> {
        let state = self.peek_object(0)?;
        loop {
            let (object, key) = match &mut self.heap.object_mut(state)?.kind {
                ObjectKind::ForIn(state) => {
                    let key = state.keys.get(state.position).cloned();
                    state.position += 1;
                    (state.object, key)
                }
                _ => return internal_error("ForInNext without a for-in state"),
            };
            let Some(key) = key else {
                return Ok(None);
            };
            if let Some(object) = object
                && !self.has_property(object, &key)?
            {
                continue;
            }
            return Ok(Some(key.to_value()));
        }
    }

    // ========================================================================
    // Generators
    // ========================================================================

    /// Turns the frame of a freshly called generator function into a
    /// suspended generator object and returns that to the caller.
    fn generator_start(&mut self, base: usize) -> Result<Option<Exit>> {
        let Some(mut frame) = self.frames.pop() else {
            return internal_error("GeneratorStart without a frame");
        };
        let fallback = self.realm.intrinsics.generator_prototype;
        let prototype = match frame.callee {
            Some(callee) => self.prototype_from_constructor(callee, fallback)?,
            None => fallback,
        };
        let generator = self.alloc(JsObject::with_kind(
            Some(prototype),
            ObjectKind::Generator(Box::new(GeneratorData {
                state: GeneratorState::SuspendedStart,
                frame: None,
            })),
        ));
        frame.generator = Some(generator);
        if let ObjectKind::Generator(data) = &mut self.heap.object_mut(generator)?.kind {
            data.frame = Some(Box::new(frame));
        }
        self.return_to_caller(base, Value::Object(generator))
    }

    /// Saves the running generator frame and yields the top value.
    fn suspend(&mut self, base: usize, raw: bool) -> Result<Option<Exit>> {
        if self.frames.len() != base + 1 {
            return internal_error("yield outside of a resumed generator");
        }
        let Some(mut frame) = self.frames.pop() else {
            return internal_error("yield without a frame");
        };
        let value = frame.stack.pop().unwrap_or_default();
        let Some(generator) = frame.generator else {
            return internal_error("yield outside of a generator");
        };
        if let ObjectKind::Generator(data) = &mut self.heap.object_mut(generator)?.kind {
            data.state = GeneratorState::SuspendedYield;
            data.frame = Some(Box::new(frame));
        }
        let result = if raw { value } else { self.iter_result(value, false) };
        Ok(Some(Exit::Yield(result)))
    }

    /// One round of `yield*`: forwards the pending resumption to the inner
    /// iterator. Stack: `iterator next received`.
    fn delegate_step(&mut self, base: usize, operand: Option<Operand>) -> Result<Option<Exit>> {
        let received = self.pop()?;
        let next = self.peek(0)?.clone();
        let iterator = self.peek(1)?.clone();
        let mode = std::mem::take(&mut self.frame_mut()?.resume_mode);
        let result = match mode {
            ResumeMode::Next => self.call(&next, &iterator, &[received])?,
            ResumeMode::Throw => match self.get_method(&iterator, &PropertyKey::from("throw"))? {
                Some(throw) => self.call(&throw, &iterator, &[received])?,
                None => {
                    self.iterator_close(&iterator)?;
                    return type_error("The iterator does not provide a 'throw' method");
                }
            },
            ResumeMode::Return => match self.get_method(&iterator, &PropertyKey::from("return"))? {
                Some(method) => self.call(&method, &iterator, &[received])?,
                None => return self.unwind_return(base, received),
            },
        };
        if !result.is_object() {
            return type_error(format!("Iterator result {} is not an object", self.describe(&result)));
        }
        if self.get_named(&result, "done")?.to_boolean() {
            let value = self.get_named(&result, "value")?;
            if mode == ResumeMode::Return {
                return self.unwind_return(base, value);
            }
            self.push(value)?;
            self.jump(operand)?;
        } else {
            self.push(result)?;
        }
        Ok(None)
    }

    // ========================================================================
    // Literals
    // ========================================================================

    /// The frozen strings array of a tagged template call site, created once
    /// per site.
    fn template_object(&mut self, site: &TemplateSite) -> Result<ObjectRef> {
        if let Some(template) = self.realm.template_cache.get(&site.id) {
            return Ok(*template);
        }
        let cooked = site
            .cooked
            .iter()
            .map(|s| s.clone().map(Value::String).unwrap_or_default())
            .collect();
        let raw = site.raw.iter().map(|s| Value::String(s.clone())).collect();
        let raw = self.new_array(raw);
        self.heap.object_mut(raw)?.seal(true);
        let template = self.new_array(cooked);
        let object = self.heap.object_mut(template)?;
        object.insert(
            PropertyKey::from("raw"),
            PropertySlot::data(Value::Object(raw), Attributes::FROZEN),
        );
        object.seal(true);
        self.realm.template_cache.insert(site.id, template);
        Ok(template)
    }
}

impl Default for VM {
    fn default() -> Self {
        Self::new(EngineConfig::default())
    }
}

/// The `u32` payload of an operand.
fn index(operand: Option<Operand>) -> Result<u32> {
    match operand {
        Some(
            Operand::Constant(value)
            | Operand::Local(value)
            | Operand::Jump(value)
            | Operand::ArgCount(value)
            | Operand::Name(value),
        ) => Ok(value),
        _ => internal_error("missing instruction operand"),
    }
}

fn not_defined(name: impl fmt::Display) -> Error {
    Error::ReferenceError(format!("{name} is not defined"))
}

fn tdz_error(name: impl fmt::Display) -> Error {
    Error::ReferenceError(format!("Cannot access '{name}' before initialization"))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::compiler::compile;
    use crate::options::CompileOptions;

    fn run_with(vm: &mut VM, src: &str) -> Result<Value> {
        let code = compile(src, &CompileOptions::default())?;
        let this = Value::Object(vm.global_object());
        vm.run_script(code, this, Vec::new())
    }

    fn eval(src: &str) -> Result<Value> {
        run_with(&mut VM::default(), src)
    }

    fn eval_ok(src: &str) -> Value {
        eval(src).expect("evaluation should succeed")
    }

    fn thrown_message(vm: &mut VM, result: Result<Value>) -> String {
        match result {
            Err(Error::Thrown(value)) => {
                let message = vm.get_named(&value, "message").unwrap();
                vm.to_string(&message).unwrap().to_string()
            }
            other => panic!("expected a thrown error, got {other:?}"),
        }
    }

    #[test]
    fn test_vm_default() {
        let vm = VM::default();
        assert!(vm.frames.is_empty());
        assert_eq!(vm.config().max_stack_depth, 10_000);
    }

    #[test]
    fn test_arithmetic_and_strings() {
        assert_eq!(eval_ok("1 + 2 * 3"), Value::from(7));
        assert_eq!(eval_ok("'a' + 1 + 2"), Value::from("a12"));
        assert_eq!(eval_ok("2 ** 10"), Value::from(1024));
        assert_eq!(eval_ok("7 % -3"), Value::from(1));
        assert_eq!(eval_ok("-1 >>> 28"), Value::from(15));
    }

    #[test]
    fn test_comparisons() {
        assert_eq!(eval_ok("1 < 2 && 2 <= 2 && 3 > 2 && 3 >= 3"), Value::Boolean(true));
        assert_eq!(eval_ok("NaN < 1 || NaN >= 1"), Value::Boolean(false));
        assert_eq!(eval_ok("'10' == 10 && null == undefined && 0 !== -0 === false"), Value::Boolean(true));
        assert_eq!(eval_ok("'b' > 'a'"), Value::Boolean(true));
    }

    #[test]
    fn test_var_let_const() {
        assert_eq!(eval_ok("var a = 1; let b = 2; const c = 3; a + b + c"), Value::from(6));
        assert_eq!(eval_ok("let x = 1; { let x = 2; } x"), Value::from(1));
    }

    #[test]
    fn test_temporal_dead_zone() {
        let mut vm = VM::default();
        let result = run_with(&mut vm, "x; let x = 1;");
        assert!(thrown_message(&mut vm, result).contains("before initialization"));
    }

    #[test]
    fn test_closures_capture_bindings() {
        let src = "
            function counter() { let n = 0; return function () { n += 1; return n; }; }
            const c = counter();
            c(); c(); c();
        ";
        assert_eq!(eval_ok(src), Value::from(3));
    }

    #[test]
    fn test_per_iteration_bindings() {
        let src = "
            var fs = [];
            for (let i = 0; i < 3; i++) { fs.push(function () { return i; }); }
            fs[0]() + fs[1]() * 10 + fs[2]() * 100;
        ";
        assert_eq!(eval_ok(src), Value::from(210));
    }

    #[test]
    fn test_try_catch_finally() {
        let src = "
            var log = '';
            function f() {
                try { throw 'x'; }
                catch (e) { log += 'c' + e; return 1; }
                finally { log += 'f'; }
            }
            f();
            log;
        ";
        assert_eq!(eval_ok(src), Value::from("cxf"));
    }

    #[test]
    fn test_finally_overrides_return() {
        assert_eq!(eval_ok("(function () { try { return 1; } finally { return 2; } })()"), Value::from(2));
    }

    #[test]
    fn test_uncaught_throw() {
        match eval("throw 42") {
            Err(Error::Thrown(value)) => assert_eq!(value, Value::from(42)),
            other => panic!("unexpected {other:?}"),
        }
    }

    #[test]
    fn test_runtime_errors_are_catchable() {
        let src = "
            var r;
            try { undefined.x; } catch (e) { r = e instanceof TypeError; }
            r;
        ";
        assert_eq!(eval_ok(src), Value::Boolean(true));
    }

    #[test]
    fn test_unresolved_name() {
        let mut vm = VM::default();
        let result = run_with(&mut vm, "missing + 1");
        assert_eq!(thrown_message(&mut vm, result), "missing is not defined");
    }

    #[test]
    fn test_implicit_globals() {
        assert_eq!(eval_ok("(function () { implicit = 5; })(); implicit"), Value::from(5));
        let mut vm = VM::default();
        let result = run_with(&mut vm, "'use strict'; (function () { implicit = 5; })();");
        assert!(thrown_message(&mut vm, result).contains("not defined"));

        let config = EngineConfig {
            implicit_globals: false,
            ..EngineConfig::default()
        };
        let mut vm = VM::new(config);
        let result = run_with(&mut vm, "implicit = 5;");
        assert!(thrown_message(&mut vm, result).contains("not defined"));
    }

    #[test]
    fn test_global_let_conflicts() {
        let mut vm = VM::default();
        run_with(&mut vm, "var a = 1; let b = 2;").unwrap();
        assert!(run_with(&mut vm, "let a = 3;").is_err());
        assert!(run_with(&mut vm, "var b = 3;").is_err());
        assert_eq!(run_with(&mut vm, "a + b").unwrap(), Value::from(3));
    }

    #[test]
    fn test_with_statement() {
        assert_eq!(eval_ok("var o = { p: 2 }; var p = 1; with (o) { p * 10 }"), Value::from(20));
    }

    #[test]
    fn test_direct_and_indirect_eval() {
        let src = "
            var x = 'global';
            function f() { var x = 'local'; return [eval('x'), (0, eval)('x')]; }
            f().join(',');
        ";
        assert_eq!(eval_ok(src), Value::from("local,global"));
        assert_eq!(eval_ok("eval('var z = 4'); z"), Value::from(4));
        assert_eq!(eval_ok("eval(42)"), Value::from(42));
    }

    #[test]
    fn test_generators() {
        let src = "
            function* g() { var x = yield 1; yield x * 2; return 'done'; }
            var it = g();
            var a = it.next().value;
            var b = it.next(5).value;
            var c = it.next();
            a + ',' + b + ',' + c.value + ',' + c.done;
        ";
        assert_eq!(eval_ok(src), Value::from("1,10,done,true"));
    }

    #[test]
    fn test_generator_return_runs_finally() {
        let src = "
            var log = [];
            function* g() { try { yield 1; yield 2; } finally { log.push('cleanup'); } }
            var it = g();
            it.next();
            var r = it.return(7);
            log.join() + ':' + r.value + ':' + r.done;
        ";
        assert_eq!(eval_ok(src), Value::from("cleanup:7:true"));
    }

    #[test]
    fn test_yield_delegation() {
        let src = "
            function* inner() { yield 1; yield 2; return 3; }
            function* outer() { var r = yield* inner(); yield r; }
            var out = [];
            for (var v of outer()) out.push(v);
            out.join();
        ";
        assert_eq!(eval_ok(src), Value::from("1,2,3"));
    }

    #[test]
    fn test_for_of_break_closes_iterator() {
        let src = "
            var closed = false;
            var iterable = {};
            iterable[Symbol.iterator] = function () {
                var i = 0;
                return {
                    next: function () { i++; return { value: i, done: false }; },
                    return: function () { closed = true; return {}; }
                };
            };
            for (var v of iterable) { if (v === 2) break; }
            closed;
        ";
        assert_eq!(eval_ok(src), Value::Boolean(true));
    }

    #[test]
    fn test_stack_overflow_is_uncatchable_by_default() {
        let config = EngineConfig {
            max_stack_depth: 64,
            ..EngineConfig::default()
        };
        let mut vm = VM::new(config);
        let result = run_with(&mut vm, "function f() { return f(); } try { f(); } catch (e) {}");
        assert!(matches!(result, Err(Error::StackOverflow)));
        assert!(vm.frames.is_empty());
    }

    #[test]
    fn test_catchable_stack_overflow() {
        let config = EngineConfig {
            max_stack_depth: 64,
            catchable_stack_overflow: true,
            ..EngineConfig::default()
        };
        let mut vm = VM::new(config);
        let result = run_with(&mut vm, "function f() { return f(); } try { f(); } catch (e) { e instanceof RangeError }");
        assert_eq!(result.unwrap(), Value::Boolean(true));
    }

    #[test]
    fn test_observer_terminates_loop() {
        let config = EngineConfig {
            instruction_threshold: 1000,
            ..EngineConfig::default()
        };
        let mut vm = VM::new(config);
        vm.set_observer(Box::new(|count: u64| {
            if count > 50_000 {
                ObserverAction::Terminate("budget exhausted".into())
            } else {
                ObserverAction::Continue
            }
        }));
        let result = run_with(&mut vm, "while (true) {}");
        assert_eq!(result, Err(Error::Terminated("budget exhausted".into())));
        let result = run_with(&mut vm, "try { for (;;) {} } catch (e) {} 1");
        assert!(matches!(result, Err(Error::Terminated(_))));
    }

    #[test]
    fn test_template_objects_are_cached_per_site() {
        let src = "
            function tag(s) { return s; }
            function site() { return tag`a${1}b`; }
            var first = site();
            first === site() && first.raw[1] === 'b' && Object.isFrozen(first);
        ";
        assert_eq!(eval_ok(src), Value::Boolean(true));
    }

    #[test]
    fn test_constructors() {
        let src = "
            function Point(x, y) { this.x = x; this.y = y; }
            Point.prototype.sum = function () { return this.x + this.y; };
            var p = new Point(2, 3);
            p.sum() + (p instanceof Point ? 100 : 0);
        ";
        assert_eq!(eval_ok(src), Value::from(105));
    }

    #[test]
    fn test_collect_garbage_between_runs() {
        let mut vm = VM::default();
        run_with(&mut vm, "(function () { var tmp = []; for (var i = 0; i < 100; i++) tmp.push({}); })();")
            .unwrap();
        let before = vm.heap().object_count();
        let stats = vm.collect_garbage().unwrap();
        assert!(vm.heap().object_count() < before);
        assert!(stats.objects_freed > 0);
    }
}
