//! Error constructors: `Error` and the native error types.

use super::{Builder, arg};
use crate::error::{Result, type_error};
use crate::gc::ObjectRef;
use crate::runtime::context::ErrorType;
use crate::runtime::function::{NativeConstructor, NativeFn};
use crate::runtime::object::PropertyKey;
use crate::runtime::string::JsString;
use crate::runtime::value::Value;
use crate::vm::VM;

/// Defines the call and construct entry points of one error constructor.
macro_rules! error_constructor {
    ($($kind:ident => $call:ident, $construct:ident;)*) => {
        $(
            fn $call(vm: &mut VM, _this: &Value, args: &[Value]) -> Result<Value> {
                create_error(vm, ErrorType::$kind, args, None)
            }

            fn $construct(vm: &mut VM, args: &[Value], new_target: ObjectRef) -> Result<Value> {
                create_error(vm, ErrorType::$kind, args, Some(new_target))
            }
        )*

        fn entry_points(kind: ErrorType) -> (NativeFn, NativeConstructor) {
            match kind {
                $(ErrorType::$kind => ($call, $construct),)*
            }
        }
    };
}

error_constructor! {
    Error => error_call, error_construct;
    Eval => eval_error_call, eval_error_construct;
    Range => range_error_call, range_error_construct;
    Reference => reference_error_call, reference_error_construct;
    Syntax => syntax_error_call, syntax_error_construct;
    Type => type_error_call, type_error_construct;
    Uri => uri_error_call, uri_error_construct;
}

pub(super) fn register(builder: &mut Builder<'_>) {
    let base_constructor = {
        let prototype = builder.intrinsics.error_prototype(ErrorType::Error);
        let (call, construct) = entry_points(ErrorType::Error);
        let constructor = builder.constructor("Error", 1, call, Some(construct), prototype);
        builder.method(prototype, "toString", 0, to_string);
        constructor
    };
    for kind in ErrorType::ALL {
        let prototype = builder.intrinsics.error_prototype(kind);
        if kind != ErrorType::Error {
            let (call, construct) = entry_points(kind);
            let constructor = builder.constructor(kind.name(), 1, call, Some(construct), prototype);
            builder.set_prototype(constructor, base_constructor);
        }
        builder.value(prototype, "name", Value::from(kind.name()));
        builder.value(prototype, "message", Value::from(""));
    }
}

/// Creates an error object for `new XError(message, options)` or a plain
/// call. The prototype comes from `new_target` when given.
fn create_error(vm: &mut VM, kind: ErrorType, args: &[Value], new_target: Option<ObjectRef>) -> Result<Value> {
    let message = match arg(args, 0) {
        Value::Undefined => None,
        value => Some(vm.to_rust_string(&value)?),
    };
    let error = vm.new_error(kind, message.as_deref().unwrap_or(""));
    if message.as_deref() == Some("") {
        vm.heap.object_mut(error)?.insert_hidden(PropertyKey::from("message"), Value::from(""));
    }
    if let Some(new_target) = new_target {
        let fallback = vm.realm.intrinsics.error_prototype(kind);
        let prototype = vm.prototype_from_constructor(new_target, fallback)?;
        vm.heap.object_mut(error)?.prototype = Some(prototype);
    }
    if let Value::Object(options) = arg(args, 1)
        && vm.has_property(options, &PropertyKey::from("cause"))?
    {
        let cause = vm.get_named(&Value::Object(options), "cause")?;
        vm.heap.object_mut(error)?.insert_hidden(PropertyKey::from("cause"), cause);
    }
    Ok(Value::Object(error))
}

/// Error.prototype.toString()
fn to_string(vm: &mut VM, this: &Value, _args: &[Value]) -> Result<Value> {
    if this.as_object().is_none() {
        return type_error("Error.prototype.toString called on non-object");
    }
    let name = match vm.get_named(this, "name")? {
        Value::Undefined => JsString::from("Error"),
        value => vm.to_string(&value)?,
    };
    let message = match vm.get_named(this, "message")? {
        Value::Undefined => JsString::empty(),
        value => vm.to_string(&value)?,
    };
    Ok(Value::String(match (name.is_empty(), message.is_empty()) {
        (true, _) => message,
        (false, true) => name,
        (false, false) => name.concat(&JsString::from(": ")).concat(&message),
    }))
}

#[cfg(test)]
mod tests {
    use crate::builtins::testing::{eval_str, thrown};

    #[test]
    fn test_constructors() {
        assert_eq!(eval_str("String(new Error('boom'))"), "Error: boom");
        assert_eq!(eval_str("String(TypeError('bad'))"), "TypeError: bad");
        assert_eq!(eval_str("var e = new RangeError(); e.message === '' && !e.hasOwnProperty('message')"), "true");
        assert_eq!(eval_str("new Error('x', { cause: 42 }).cause"), "42");
        assert_eq!(eval_str("'cause' in new Error('x', {})"), "false");
    }

    #[test]
    fn test_prototype_chain() {
        assert_eq!(eval_str("var e = new SyntaxError('s'); [e instanceof SyntaxError, e instanceof Error].join()"), "true,true");
        assert_eq!(eval_str("Object.getPrototypeOf(URIError) === Error"), "true");
        assert_eq!(eval_str("URIError.prototype.name + ',' + Object.getPrototypeOf(URIError.prototype).name"), "URIError,Error");
        assert_eq!(eval_str("Object.keys(new Error('x')).length"), "0");
    }

    #[test]
    fn test_engine_errors_share_prototypes() {
        assert_eq!(eval_str("try { null.x } catch (e) { e instanceof TypeError && e.constructor === TypeError }"), "true");
        assert_eq!(eval_str("try { undefinedName } catch (e) { e.name }"), "ReferenceError");
    }

    #[test]
    fn test_subclassing() {
        let src = "function MyError(m) { this.message = m; } \
                   MyError.prototype = Object.create(Error.prototype); MyError.prototype.name = 'MyError'; \
                   var e = new MyError('oops'); [String(e), e instanceof MyError, e instanceof Error].join()";
        assert_eq!(eval_str(src), "MyError: oops,true,true");
    }

    #[test]
    fn test_to_string() {
        assert_eq!(eval_str("Error.prototype.toString.call({ name: '', message: 'm' })"), "m");
        assert_eq!(eval_str("Error.prototype.toString.call({ message: 'm' })"), "Error: m");
        assert!(thrown("Error.prototype.toString.call(1)").starts_with("TypeError"));
        assert_eq!(thrown("throw new Error('up')"), "Error: up");
    }
}
