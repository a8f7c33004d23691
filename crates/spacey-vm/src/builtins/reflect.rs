//! The Reflect namespace: the object internal methods as functions that
//! report failure as `false` instead of throwing.

use super::object::{from_property_descriptor, to_property_descriptor};
use super::{Builder, arg};
use crate::error::{Result, type_error};
use crate::gc::ObjectRef;
use crate::runtime::value::Value;
use crate::vm::VM;

pub(super) fn register(builder: &mut Builder<'_>) {
    let reflect = builder.namespace("Reflect");
    builder.method(reflect, "apply", 3, apply);
    builder.method(reflect, "construct", 2, construct);
    builder.method(reflect, "defineProperty", 3, define_property);
    builder.method(reflect, "deleteProperty", 2, delete_property);
    builder.method(reflect, "get", 2, get);
    builder.method(reflect, "getOwnPropertyDescriptor", 2, get_own_property_descriptor);
    builder.method(reflect, "getPrototypeOf", 1, get_prototype_of);
    builder.method(reflect, "has", 2, has);
    builder.method(reflect, "isExtensible", 1, is_extensible);
    builder.method(reflect, "ownKeys", 1, own_keys);
    builder.method(reflect, "preventExtensions", 1, prevent_extensions);
    builder.method(reflect, "set", 3, set);
    builder.method(reflect, "setPrototypeOf", 2, set_prototype_of);
}

fn target(vm: &VM, args: &[Value], method: &str) -> Result<ObjectRef> {
    match args.first() {
        Some(Value::Object(object)) => Ok(*object),
        other => type_error(format!(
            "Reflect.{method} called on non-object {}",
            vm.describe(other.unwrap_or(&Value::Undefined))
        )),
    }
}

fn argument_list(vm: &mut VM, list: &Value, method: &str) -> Result<Vec<Value>> {
    if !list.is_object() {
        return type_error(format!("Reflect.{method}: argument list must be an object"));
    }
    vm.array_like_to_vec(list)
}

/// Reflect.apply(target, thisArgument, argumentsList)
fn apply(vm: &mut VM, _this: &Value, args: &[Value]) -> Result<Value> {
    let function = arg(args, 0);
    if !vm.is_callable(&function) {
        return type_error(format!("{} is not a function", vm.describe(&function)));
    }
    let list = argument_list(vm, &arg(args, 2), "apply")?;
    vm.call(&function, &arg(args, 1), &list)
}

/// Reflect.construct(target, argumentsList, newTarget)
fn construct(vm: &mut VM, _this: &Value, args: &[Value]) -> Result<Value> {
    let function = arg(args, 0);
    if !vm.is_constructor(&function) {
        return type_error(format!("{} is not a constructor", vm.describe(&function)));
    }
    let new_target = match args.get(2) {
        Some(new_target) if !vm.is_constructor(new_target) => {
            return type_error(format!("{} is not a constructor", vm.describe(new_target)));
        }
        Some(new_target) => new_target.as_object(),
        None => function.as_object(),
    };
    let list = argument_list(vm, &arg(args, 1), "construct")?;
    vm.construct(&function, &list, new_target)
}

/// Reflect.defineProperty(target, key, attributes)
fn define_property(vm: &mut VM, _this: &Value, args: &[Value]) -> Result<Value> {
    let object = target(vm, args, "defineProperty")?;
    let key = vm.to_property_key(&arg(args, 1))?;
    let descriptor = to_property_descriptor(vm, &arg(args, 2))?;
    Ok(Value::Boolean(vm.heap.object_mut(object)?.define_own(key, descriptor)))
}

/// Reflect.deleteProperty(target, key)
fn delete_property(vm: &mut VM, _this: &Value, args: &[Value]) -> Result<Value> {
    let object = target(vm, args, "deleteProperty")?;
    let key = vm.to_property_key(&arg(args, 1))?;
    Ok(Value::Boolean(vm.delete_property(object, &key)?))
}

/// Reflect.get(target, key, receiver)
fn get(vm: &mut VM, _this: &Value, args: &[Value]) -> Result<Value> {
    let object = target(vm, args, "get")?;
    let key = vm.to_property_key(&arg(args, 1))?;
    let receiver = args.get(2).cloned().unwrap_or(Value::Object(object));
    vm.get(object, &key, &receiver)
}

/// Reflect.getOwnPropertyDescriptor(target, key)
fn get_own_property_descriptor(vm: &mut VM, _this: &Value, args: &[Value]) -> Result<Value> {
    let object = target(vm, args, "getOwnPropertyDescriptor")?;
    let key = vm.to_property_key(&arg(args, 1))?;
    let slot = vm.own_property(object, &key)?;
    from_property_descriptor(vm, slot)
}

/// Reflect.getPrototypeOf(target)
fn get_prototype_of(vm: &mut VM, _this: &Value, args: &[Value]) -> Result<Value> {
    let object = target(vm, args, "getPrototypeOf")?;
    Ok(vm.get_prototype_of(object)?.map(Value::Object).unwrap_or(Value::Null))
}

/// Reflect.has(target, key)
fn has(vm: &mut VM, _this: &Value, args: &[Value]) -> Result<Value> {
    let object = target(vm, args, "has")?;
    let key = vm.to_property_key(&arg(args, 1))?;
    Ok(Value::Boolean(vm.has_property(object, &key)?))
}

/// Reflect.isExtensible(target)
fn is_extensible(vm: &mut VM, _this: &Value, args: &[Value]) -> Result<Value> {
    let object = target(vm, args, "isExtensible")?;
    Ok(Value::Boolean(vm.heap.object(object)?.extensible))
}

/// Reflect.ownKeys(target): strings and symbols, in property order
fn own_keys(vm: &mut VM, _this: &Value, args: &[Value]) -> Result<Value> {
    let object = target(vm, args, "ownKeys")?;
    let keys = vm.own_keys(object)?.iter().map(|key| key.to_value()).collect();
    Ok(Value::Object(vm.new_array(keys)))
}

/// Reflect.preventExtensions(target)
fn prevent_extensions(vm: &mut VM, _this: &Value, args: &[Value]) -> Result<Value> {
    let object = target(vm, args, "preventExtensions")?;
    vm.heap.object_mut(object)?.extensible = false;
    Ok(Value::Boolean(true))
}

/// Reflect.set(target, key, value, receiver)
fn set(vm: &mut VM, _this: &Value, args: &[Value]) -> Result<Value> {
    let object = target(vm, args, "set")?;
    let key = vm.to_property_key(&arg(args, 1))?;
    let receiver = args.get(3).cloned().unwrap_or(Value::Object(object));
    Ok(Value::Boolean(vm.set(object, key, arg(args, 2), &receiver)?))
}

/// Reflect.setPrototypeOf(target, proto)
fn set_prototype_of(vm: &mut VM, _this: &Value, args: &[Value]) -> Result<Value> {
    let object = target(vm, args, "setPrototypeOf")?;
    let prototype = match arg(args, 1) {
        Value::Object(prototype) => Some(prototype),
        Value::Null => None,
        other => return type_error(format!("Object prototype may only be an Object or null: {}", vm.describe(&other))),
    };
    Ok(Value::Boolean(vm.set_prototype_of(object, prototype)?))
}

#[cfg(test)]
mod tests {
    use crate::builtins::testing::{eval_str, thrown};

    #[test]
    fn test_apply_and_construct() {
        assert_eq!(eval_str("Reflect.apply(Math.max, null, [1, 3, 2])"), "3");
        assert_eq!(eval_str("Reflect.apply(function () { return this.x; }, {x: 7}, [])"), "7");
        let src = "function P(a) { this.a = a; } function Q() {} Q.prototype.tag = 'q'; \
                   var o = Reflect.construct(P, [5], Q); [o.a, o.tag, o instanceof Q].join()";
        assert_eq!(eval_str(src), "5,q,true");
        assert!(thrown("Reflect.apply(1, null, [])").starts_with("TypeError"));
        assert!(thrown("Reflect.apply(Math.max, null)").starts_with("TypeError"));
        assert!(thrown("Reflect.construct(Math.max, [])").starts_with("TypeError"));
        assert!(thrown("Reflect.construct(Object, [], Math.max)").starts_with("TypeError"));
    }

    #[test]
    fn test_failures_are_booleans() {
        let src = "var o = Object.freeze({a: 1}); \
                   [Reflect.defineProperty(o, 'b', {value: 2}), Reflect.set(o, 'a', 3), Reflect.deleteProperty(o, 'a'), o.a].join()";
        assert_eq!(eval_str(src), "false,false,false,1");
        let src = "var o = {}; [Reflect.defineProperty(o, 'x', {value: 1, enumerable: true}), Reflect.set(o, 'y', 2), o.x + o.y].join()";
        assert_eq!(eval_str(src), "true,true,3");
        assert_eq!(eval_str("var a = {}, b = Object.create(a); Reflect.setPrototypeOf(a, b)"), "false");
    }

    #[test]
    fn test_receivers() {
        let src = "var o = { get x() { return this.y; } }; Reflect.get(o, 'x', {y: 'r'})";
        assert_eq!(eval_str(src), "r");
        let src = "var target = {}, receiver = {}; Reflect.set(target, 'k', 1, receiver); \
                   [target.k, receiver.k].join()";
        assert_eq!(eval_str(src), ",1");
    }

    #[test]
    fn test_introspection() {
        let src = "var s = Symbol('s'); var o = {b: 1, 1: 0, a: 2}; o[s] = 3; \
                   Reflect.ownKeys(o).map(String).join()";
        assert_eq!(eval_str(src), "1,b,a,Symbol(s)");
        assert_eq!(eval_str("[Reflect.has({a: 1}, 'a'), Reflect.has({}, 'toString'), Reflect.has({}, 'nope')].join()"), "true,true,false");
        assert_eq!(eval_str("Reflect.getOwnPropertyDescriptor({a: 1}, 'a').writable"), "true");
        assert_eq!(eval_str("Reflect.getPrototypeOf([]) === Array.prototype"), "true");
        assert_eq!(eval_str("var o = {}; [Reflect.isExtensible(o), Reflect.preventExtensions(o), Reflect.isExtensible(o)].join()"), "true,true,false");
        assert_eq!(eval_str("Object.prototype.toString.call(Reflect)"), "[object Reflect]");
        assert!(thrown("Reflect.getPrototypeOf(1)").starts_with("TypeError"));
        assert!(thrown("Reflect.ownKeys('abc')").starts_with("TypeError"));
    }
}
