//! Boolean built-in object.

use super::Builder;
use crate::error::{Result, type_error};
use crate::gc::ObjectRef;
use crate::runtime::object::{JsObject, ObjectKind};
use crate::runtime::value::Value;
use crate::vm::VM;

pub(super) fn register(builder: &mut Builder<'_>) {
    let prototype = builder.intrinsics.boolean_prototype;
    builder.constructor("Boolean", 1, boolean_call, Some(boolean_construct), prototype);
    builder.method(prototype, "toString", 0, to_string);
    builder.method(prototype, "valueOf", 0, value_of);
}

/// Boolean(value)
fn boolean_call(_vm: &mut VM, _this: &Value, args: &[Value]) -> Result<Value> {
    Ok(Value::Boolean(args.first().is_some_and(Value::to_boolean)))
}

/// new Boolean(value)
fn boolean_construct(vm: &mut VM, args: &[Value], new_target: ObjectRef) -> Result<Value> {
    let b = args.first().is_some_and(Value::to_boolean);
    let fallback = vm.realm.intrinsics.boolean_prototype;
    let prototype = vm.prototype_from_constructor(new_target, fallback)?;
    Ok(Value::Object(vm.alloc(JsObject::with_kind(Some(prototype), ObjectKind::Boolean(b)))))
}

/// thisBooleanValue
fn this_boolean(vm: &VM, this: &Value, method: &str) -> Result<bool> {
    match this {
        Value::Boolean(b) => Ok(*b),
        Value::Object(object) => match vm.heap.object(*object)?.kind {
            ObjectKind::Boolean(b) => Ok(b),
            _ => type_error(format!("Boolean.prototype.{method} requires that 'this' be a Boolean")),
        },
        _ => type_error(format!("Boolean.prototype.{method} requires that 'this' be a Boolean")),
    }
}

/// Boolean.prototype.toString()
fn to_string(vm: &mut VM, this: &Value, _args: &[Value]) -> Result<Value> {
    let b = this_boolean(vm, this, "toString")?;
    Ok(Value::from(if b { "true" } else { "false" }))
}

/// Boolean.prototype.valueOf()
fn value_of(vm: &mut VM, this: &Value, _args: &[Value]) -> Result<Value> {
    Ok(Value::Boolean(this_boolean(vm, this, "valueOf")?))
}

#[cfg(test)]
mod tests {
    use crate::builtins::testing::{eval_str, thrown};

    #[test]
    fn test_conversion() {
        assert_eq!(eval_str("[Boolean(''), Boolean('0'), Boolean(0), Boolean({}), Boolean()].join()"), "false,true,false,true,false");
    }

    #[test]
    fn test_wrapper_objects() {
        assert_eq!(eval_str("var b = new Boolean(false); typeof b + (b ? 'truthy' : 'falsy')"), "objecttruthy");
        assert_eq!(eval_str("new Boolean(false).valueOf() + ',' + true.toString()"), "false,true");
        assert!(thrown("Boolean.prototype.toString.call(1)").starts_with("TypeError"));
    }
}
