//! Callable objects and interpreter frames.

use std::fmt;
use std::sync::Arc;

use super::value::Value;
use crate::compiler::CompiledFunction;
use crate::error::Result;
use crate::gc::{ObjectRef, ScopeRef, Trace, Tracer};
use crate::vm::VM;

/// A native (Rust) function: `(vm, this, args) -> result`.
pub type NativeFn = fn(&mut VM, &Value, &[Value]) -> Result<Value>;

/// The `[[Construct]]` behavior of a native constructor:
/// `(vm, args, new_target) -> object`.
pub type NativeConstructor = fn(&mut VM, &[Value], ObjectRef) -> Result<Value>;

/// A closure over compiled code.
#[derive(Debug, Clone)]
pub struct ScriptFunction {
    /// The compiled body
    pub code: Arc<CompiledFunction>,
    /// The scope the closure was created in
    pub scope: ScopeRef,
    /// Lexical `this` of an arrow function
    pub this_value: Option<Value>,
    /// Lexical `new.target` of an arrow function
    pub new_target: Option<Value>,
}

/// A function implemented in Rust.
#[derive(Clone)]
pub struct NativeFunction {
    /// The function name
    pub name: Arc<str>,
    /// Behavior when called
    pub call: NativeFn,
    /// Behavior under `new`; `None` if not a constructor
    pub construct: Option<NativeConstructor>,
}

impl fmt::Debug for NativeFunction {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "NativeFunction({})", self.name)
    }
}

/// A function created by `Function.prototype.bind`.
#[derive(Debug, Clone)]
pub struct BoundFunction {
    /// The wrapped function
    pub target: ObjectRef,
    /// The bound `this`
    pub this: Value,
    /// Arguments prepended to every call
    pub args: Vec<Value>,
}

/// The `[[Call]]` slot of a function object.
#[derive(Debug, Clone)]
pub enum Callable {
    /// A JavaScript function
    Script(ScriptFunction),
    /// A native Rust function
    Native(NativeFunction),
    /// A bound function
    Bound(BoundFunction),
}

impl Callable {
    /// Whether the function can be used with `new`.
    pub fn is_constructor(&self) -> bool {
        match self {
            Callable::Script(function) => function.code.is_constructor(),
            Callable::Native(function) => function.construct.is_some(),
            // Resolved against the target by the caller.
            Callable::Bound(_) => true,
        }
    }
}

impl Trace for Callable {
    fn trace(&self, tracer: &mut Tracer) {
        match self {
            Callable::Script(function) => {
                tracer.scope(function.scope);
                if let Some(this) = &function.this_value {
                    tracer.value(this);
                }
                if let Some(new_target) = &function.new_target {
                    tracer.value(new_target);
                }
            }
            Callable::Native(_) => {}
            Callable::Bound(bound) => {
                tracer.object(bound.target);
                tracer.value(&bound.this);
                tracer.values(&bound.args);
            }
        }
    }
}

/// How a suspended generator is being resumed.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum ResumeMode {
    /// `next(v)`: the yield evaluates to `v`
    #[default]
    Next,
    /// `throw(e)`: the yield throws `e`
    Throw,
    /// `return(v)`: the generator returns `v`, running `finally` blocks
    Return,
}

/// A call frame for function execution.
#[derive(Debug, Clone)]
pub struct CallFrame {
    /// The code being executed
    pub code: Arc<CompiledFunction>,
    /// Index of the next instruction
    pub ip: usize,
    /// Operand stack
    pub stack: Vec<Value>,
    /// Local variable slots
    pub locals: Vec<Value>,
    /// Scope chain; the last entry is the innermost scope
    pub scopes: Vec<ScopeRef>,
    /// Scopes present when the body started (closure scope plus function scope)
    pub base_scopes: usize,
    /// Arguments as passed
    pub arguments: Vec<Value>,
    /// `this`
    pub this: Value,
    /// The running function object
    pub callee: Option<ObjectRef>,
    /// `new.target`
    pub new_target: Value,
    /// Called with `new`; a non-object return value yields `this`
    pub construct: bool,
    /// Pending resumption of a generator frame
    pub resume_mode: ResumeMode,
    /// The generator object owning this frame
    pub generator: Option<ObjectRef>,
}

impl CallFrame {
    /// Creates a frame about to run `code` in `scope`.
    pub fn new(code: Arc<CompiledFunction>, scope: ScopeRef, this: Value, arguments: Vec<Value>) -> Self {
        let locals = vec![Value::Undefined; code.local_count as usize];
        let stack = Vec::with_capacity(code.max_stack as usize);
        Self {
            code,
            ip: 0,
            stack,
            locals,
            scopes: vec![scope],
            base_scopes: 1,
            arguments,
            this,
            callee: None,
            new_target: Value::Undefined,
            construct: false,
            resume_mode: ResumeMode::Next,
            generator: None,
        }
    }

    /// The innermost scope.
    pub fn scope(&self) -> ScopeRef {
        // `scopes` is never empty: frames start with their closure scope.
        self.scopes[self.scopes.len() - 1]
    }

    /// Line of the instruction that is executing, for error objects.
    pub fn current_line(&self) -> Option<u32> {
        self.code.line_col(self.ip.saturating_sub(1)).map(|(line, _)| line)
    }
}

impl Trace for CallFrame {
    fn trace(&self, tracer: &mut Tracer) {
        tracer.values(&self.stack);
        tracer.values(&self.locals);
        tracer.values(&self.arguments);
        for scope in &self.scopes {
            tracer.scope(*scope);
        }
        tracer.value(&self.this);
        tracer.value(&self.new_target);
        if let Some(callee) = self.callee {
            tracer.object(callee);
        }
        if let Some(generator) = self.generator {
            tracer.object(generator);
        }
    }
}

/// Lifecycle of a generator object.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum GeneratorState {
    /// Created, body not entered yet
    SuspendedStart,
    /// Paused at a `yield`
    SuspendedYield,
    /// Currently executing
    Running,
    /// Returned or threw
    Completed,
}

/// The internal slots of a generator object.
#[derive(Debug, Clone)]
pub struct GeneratorData {
    /// Lifecycle state
    pub state: GeneratorState,
    /// The frozen frame while suspended
    pub frame: Option<Box<CallFrame>>,
}

impl Trace for GeneratorData {
    fn trace(&self, tracer: &mut Tracer) {
        if let Some(frame) = &self.frame {
            frame.trace(tracer);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::compiler::compile;
    use crate::options::CompileOptions;
    use crate::gc::Heap;
    use crate::runtime::environment::Scope;

    #[test]
    fn test_call_frame_new() {
        let code = compile("let a = 1; a + 1;", &CompileOptions::default()).unwrap();
        let mut heap = Heap::new();
        let scope = heap.alloc_scope(Scope::global());
        let frame = CallFrame::new(code.clone(), scope, Value::Undefined, vec![Value::from(1)]);
        assert_eq!(frame.ip, 0);
        assert_eq!(frame.locals.len(), code.local_count as usize);
        assert_eq!(frame.scope(), scope);
        assert_eq!(frame.base_scopes, 1);
        assert_eq!(frame.resume_mode, ResumeMode::Next);
    }

    #[test]
    fn test_native_function_debug() {
        fn identity(_vm: &mut VM, _this: &Value, args: &[Value]) -> Result<Value> {
            Ok(args.first().cloned().unwrap_or_default())
        }
        let callable = Callable::Native(NativeFunction {
            name: Arc::from("identity"),
            call: identity,
            construct: None,
        });
        assert!(format!("{callable:?}").contains("identity"));
        assert!(!callable.is_constructor());
    }
}
