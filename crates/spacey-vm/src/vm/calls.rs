//! Calls, construction, closures, `eval` and module loading.

use std::sync::Arc;

use super::VM;
use super::interpreter::Exit;
use crate::builtins;
use crate::compiler::{CompiledFunction, compile_eval};
use crate::error::{Error, Result, internal_error, type_error};
use crate::gc::{ObjectRef, ScopeRef};
use crate::runtime::environment::{Scope, ScopeKind};
use crate::runtime::function::{BoundFunction, CallFrame, Callable, ScriptFunction};
use crate::runtime::object::{Attributes, JsObject, ObjectKind, PropertyKey, PropertySlot};
use crate::runtime::value::Value;
use crate::stack;

/// What calling a function produced: a frame still to run, or the result
/// of a native function.
pub(crate) enum Invocation {
    Frame(Box<CallFrame>),
    Value(Value),
}

impl VM {
    /// Calls `function` with `this` and `args`.
    pub fn call(&mut self, function: &Value, this: &Value, args: &[Value]) -> Result<Value> {
        match self.prepare_call(function, this.clone(), args.to_vec())? {
            Invocation::Value(value) => Ok(value),
            Invocation::Frame(frame) => self.run_frame(*frame),
        }
    }

    /// `new function(...args)`. `new_target` defaults to `function`.
    pub fn construct(&mut self, function: &Value, args: &[Value], new_target: Option<ObjectRef>) -> Result<Value> {
        let new_target = match (new_target, function) {
            (Some(target), _) => target,
            (None, Value::Object(object)) => *object,
            (None, _) => return type_error(format!("{} is not a constructor", self.describe(function))),
        };
        match self.prepare_construct(function, args.to_vec(), new_target)? {
            Invocation::Value(value) => Ok(value),
            Invocation::Frame(frame) => self.run_frame(*frame),
        }
    }

    /// Runs a frame to completion from native code.
    pub(crate) fn run_frame(&mut self, frame: CallFrame) -> Result<Value> {
        match self.reenter(|vm| vm.execute(frame, None))? {
            Exit::Return(value) => Ok(value),
            Exit::Yield(_) => internal_error("yield outside of a generator frame"),
        }
    }

    /// Runs `f` as one more level of native code calling into scripts,
    /// bounded by `max_native_depth`.
    pub(crate) fn reenter<T>(&mut self, f: impl FnOnce(&mut VM) -> Result<T>) -> Result<T> {
        if self.native_depth >= self.config.max_native_depth {
            return Err(Error::StackOverflow);
        }
        self.native_depth += 1;
        let result = stack::guarded(|| f(self));
        self.native_depth -= 1;
        result
    }

    /// `[[Call]]`: builds the frame of a script function, or runs anything
    /// else directly.
    pub(crate) fn prepare_call(&mut self, function: &Value, this: Value, args: Vec<Value>) -> Result<Invocation> {
        let Value::Object(object) = function else {
            return type_error(format!("{} is not a function", self.describe(function)));
        };
        let callable = match &self.heap.object(*object)?.kind {
            ObjectKind::Function(callable) => callable.clone(),
            ObjectKind::Host(host) if host.0.is_callable() => {
                let host = host.0.clone();
                return host.call(self, &this, &args).map(Invocation::Value);
            }
            _ => return type_error(format!("{} is not a function", self.describe(function))),
        };
        match callable {
            Callable::Script(script) => {
                let frame = self.prepare_script_frame(*object, script, this, args, Value::Undefined)?;
                Ok(Invocation::Frame(Box::new(frame)))
            }
            Callable::Native(native) => (native.call)(self, &this, &args).map(Invocation::Value),
            Callable::Bound(bound) => {
                let mut all = bound.args;
                all.extend(args);
                self.prepare_call(&Value::Object(bound.target), bound.this, all)
            }
        }
    }

    /// `[[Construct]]`.
    pub(crate) fn prepare_construct(
        &mut self,
        function: &Value,
        args: Vec<Value>,
        new_target: ObjectRef,
    ) -> Result<Invocation> {
        let object = match function {
            Value::Object(object) if self.is_constructor(function) => *object,
            _ => return type_error(format!("{} is not a constructor", self.describe(function))),
        };
        let callable = match &self.heap.object(object)?.kind {
            ObjectKind::Function(callable) => callable.clone(),
            _ => return type_error(format!("{} is not a constructor", self.describe(function))),
        };
        match callable {
            Callable::Script(script) => {
                let fallback = self.realm.intrinsics.object_prototype;
                let prototype = self.prototype_from_constructor(new_target, fallback)?;
                let this = self.alloc(JsObject::ordinary(Some(prototype)));
                let mut frame =
                    self.prepare_script_frame(object, script, Value::Object(this), args, Value::Object(new_target))?;
                frame.construct = true;
                Ok(Invocation::Frame(Box::new(frame)))
            }
            Callable::Native(native) => match native.construct {
                Some(construct) => construct(self, &args, new_target).map(Invocation::Value),
                None => type_error(format!("{} is not a constructor", native.name)),
            },
            Callable::Bound(bound) => {
                let mut all = bound.args;
                all.extend(args);
                let new_target = if new_target == object { bound.target } else { new_target };
                self.prepare_construct(&Value::Object(bound.target), all, new_target)
            }
        }
    }

    fn prepare_script_frame(
        &mut self,
        callee: ObjectRef,
        function: ScriptFunction,
        this: Value,
        args: Vec<Value>,
        new_target: Value,
    ) -> Result<CallFrame> {
        let code = function.code;
        let (this, new_target) = if code.kind.is_arrow() {
            (
                function.this_value.unwrap_or_default(),
                function.new_target.unwrap_or_default(),
            )
        } else if code.strict {
            (this, new_target)
        } else if this.is_nullish() {
            (Value::Object(self.realm.global_object), new_target)
        } else {
            (Value::Object(self.to_object(&this)?), new_target)
        };
        let mut frame = CallFrame::new(code, function.scope, this, args);
        frame.callee = Some(callee);
        frame.new_target = new_target;
        self.enter_function_scope(&mut frame);
        Ok(frame)
    }

    /// Pushes the heap scope of the frame's code, if it has one.
    pub(super) fn enter_function_scope(&mut self, frame: &mut CallFrame) {
        if let Some(template) = frame.code.function_scope.clone() {
            let scope = Scope::from_template(&template, ScopeKind::Function, Some(frame.scope()));
            let scope = self.heap.alloc_scope(scope);
            frame.scopes.push(scope);
            frame.base_scopes = frame.scopes.len();
        }
    }

    /// Instantiates a function literal as a closure over `scope`.
    pub fn create_closure(
        &mut self,
        code: Arc<CompiledFunction>,
        scope: ScopeRef,
        this_value: Option<Value>,
        new_target: Option<Value>,
    ) -> Result<ObjectRef> {
        let intrinsics = &self.realm.intrinsics;
        let prototype = if code.is_generator {
            intrinsics.generator_function_prototype
        } else {
            intrinsics.function_prototype
        };
        let generator_prototype = intrinsics.generator_prototype;
        let mut function = JsObject::with_kind(
            Some(prototype),
            ObjectKind::Function(Callable::Script(ScriptFunction {
                code: code.clone(),
                scope,
                this_value,
                new_target,
            })),
        );
        function.insert(
            PropertyKey::from("length"),
            PropertySlot::data(Value::from(code.param_count), Attributes::CONFIGURABLE),
        );
        function.insert(
            PropertyKey::from("name"),
            PropertySlot::data(Value::String(code.name.clone()), Attributes::CONFIGURABLE),
        );
        let function = self.alloc(function);

        let instance_prototype = if code.is_generator {
            Some(self.alloc(JsObject::ordinary(Some(generator_prototype))))
        } else if code.is_constructor() {
            let object = self.new_object();
            self.heap
                .object_mut(object)?
                .insert_hidden(PropertyKey::from("constructor"), Value::Object(function));
            Some(object)
        } else {
            None
        };
        if let Some(instance_prototype) = instance_prototype {
            self.heap.object_mut(function)?.insert(
                PropertyKey::from("prototype"),
                PropertySlot::data(Value::Object(instance_prototype), Attributes::new(true, false, false)),
            );
        }
        Ok(function)
    }

    /// Builds the frame of a direct `eval` running in the caller's scope.
    pub(super) fn direct_eval_frame(&mut self, source: &str) -> Result<CallFrame> {
        let Some(caller) = self.frames.last() else {
            return internal_error("direct eval without a calling frame");
        };
        let code = compile_eval(source, caller.code.strict, caller.callee.is_some())?;
        let mut frame = CallFrame::new(code, caller.scope(), caller.this.clone(), Vec::new());
        frame.callee = caller.callee;
        frame.new_target = caller.new_target.clone();
        self.enter_function_scope(&mut frame);
        Ok(frame)
    }

    /// Indirect `eval`: sloppy code in the global scope.
    pub fn eval_indirect(&mut self, source: &str) -> Result<Value> {
        let code = compile_eval(source, false, false)?;
        let this = Value::Object(self.realm.global_object);
        let mut frame = CallFrame::new(code, self.realm.global_scope, this, Vec::new());
        self.enter_function_scope(&mut frame);
        self.run_frame(frame)
    }

    /// `require(specifier)`: loads a module through the host loader and
    /// returns its `module.exports`. Modules run once and are cached by id.
    pub fn require_module(&mut self, specifier: &str, referrer: Option<&str>) -> Result<Value> {
        let Some(loader) = self.loader.clone() else {
            return type_error(format!("Cannot find module '{specifier}'"));
        };
        let record = loader.resolve(specifier, referrer)?;
        if let Some(module) = self.realm.module_cache.get(&record.id).copied() {
            return self.get_named(&Value::Object(module), "exports");
        }
        let code = loader.load(&record)?;

        let exports = Value::Object(self.new_object());
        let module = self.new_object();
        self.put(module, "id", Value::from(&*record.id))?;
        self.put(module, "exports", exports.clone())?;
        self.realm.module_cache.insert(record.id.clone(), module);

        let require = self.module_require(&record.id)?;
        let args = vec![exports.clone(), Value::Object(require), Value::Object(module)];
        let mut frame = CallFrame::new(code, self.realm.global_scope, exports, args);
        self.enter_function_scope(&mut frame);
        tracing::debug!(module = %record.id, "loaded module");
        if let Err(error) = self.run_frame(frame) {
            self.realm.module_cache.remove(&record.id);
            return Err(error);
        }
        self.get_named(&Value::Object(module), "exports")
    }

    /// The `require` function handed to a module; resolves relative to it.
    fn module_require(&mut self, id: &Arc<str>) -> Result<ObjectRef> {
        let target = self.new_native_function("require", 1, builtins::require::require, None);
        let prototype = self.realm.intrinsics.function_prototype;
        let mut bound = JsObject::with_kind(
            Some(prototype),
            ObjectKind::Function(Callable::Bound(BoundFunction {
                target,
                this: Value::from(&**id),
                args: Vec::new(),
            })),
        );
        bound.insert(
            PropertyKey::from("name"),
            PropertySlot::data(Value::from("require"), Attributes::CONFIGURABLE),
        );
        Ok(self.alloc(bound))
    }
}
