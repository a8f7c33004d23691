//! WeakMap and WeakSet. Keys must be objects and do not keep them alive.

use super::collection::{add_entries_from_iterable, require_new};
use super::{Builder, arg};
use crate::error::{Result, type_error};
use crate::gc::ObjectRef;
use crate::runtime::collections::WeakTable;
use crate::runtime::object::{JsObject, ObjectKind};
use crate::runtime::value::Value;
use crate::vm::VM;

pub(super) fn register(builder: &mut Builder<'_>) {
    let weak_map = builder.intrinsics.weak_map_prototype;
    builder.constructor("WeakMap", 0, require_new, Some(weak_map_construct), weak_map);
    builder.method(weak_map, "get", 1, weak_map_get);
    builder.method(weak_map, "set", 2, weak_map_set);
    builder.method(weak_map, "has", 1, weak_map_has);
    builder.method(weak_map, "delete", 1, weak_map_delete);
    builder.to_string_tag(weak_map, "WeakMap");

    let weak_set = builder.intrinsics.weak_set_prototype;
    builder.constructor("WeakSet", 0, require_new, Some(weak_set_construct), weak_set);
    builder.method(weak_set, "add", 1, weak_set_add);
    builder.method(weak_set, "has", 1, weak_set_has);
    builder.method(weak_set, "delete", 1, weak_set_delete);
    builder.to_string_tag(weak_set, "WeakSet");
}

fn construct(vm: &mut VM, args: &[Value], new_target: ObjectRef, is_set: bool) -> Result<Value> {
    let (fallback, kind, adder) = if is_set {
        (
            vm.realm.intrinsics.weak_set_prototype,
            ObjectKind::WeakSet(Box::new(WeakTable::new())),
            "add",
        )
    } else {
        (
            vm.realm.intrinsics.weak_map_prototype,
            ObjectKind::WeakMap(Box::new(WeakTable::new())),
            "set",
        )
    };
    let prototype = vm.prototype_from_constructor(new_target, fallback)?;
    let table = vm.alloc(JsObject::with_kind(Some(prototype), kind));
    let iterable = arg(args, 0);
    if !iterable.is_nullish() {
        add_entries_from_iterable(vm, table, &iterable, adder, !is_set)?;
    }
    Ok(Value::Object(table))
}

/// new WeakMap(iterable)
fn weak_map_construct(vm: &mut VM, args: &[Value], new_target: ObjectRef) -> Result<Value> {
    construct(vm, args, new_target, false)
}

/// new WeakSet(iterable)
fn weak_set_construct(vm: &mut VM, args: &[Value], new_target: ObjectRef) -> Result<Value> {
    construct(vm, args, new_target, true)
}

fn this_table<'a>(vm: &'a mut VM, this: &Value, method: &str, is_set: bool) -> Result<&'a mut WeakTable> {
    let target = match this.as_object() {
        Some(object) => match vm.heap.object(object)?.kind {
            ObjectKind::WeakMap(_) if !is_set => Some(object),
            ObjectKind::WeakSet(_) if is_set => Some(object),
            _ => None,
        },
        None => None,
    };
    let class = if is_set { "WeakSet" } else { "WeakMap" };
    let Some(object) = target else {
        return type_error(format!(
            "Method {class}.prototype.{method} called on incompatible receiver {}",
            vm.describe(this)
        ));
    };
    match vm.heap.object_mut(object)?.weak_table_mut() {
        Some(table) => Ok(table),
        None => type_error(format!("Method {class}.prototype.{method} called on incompatible receiver")),
    }
}

/// The key as an object, or a TypeError for primitives.
fn weak_key(vm: &VM, key: &Value, is_set: bool) -> Result<ObjectRef> {
    match key.as_object() {
        Some(object) => Ok(object),
        None if is_set => type_error(format!("Invalid value used in weak set: {}", vm.describe(key))),
        None => type_error(format!("Invalid value used as weak map key: {}", vm.describe(key))),
    }
}

/// WeakMap.prototype.get(key)
fn weak_map_get(vm: &mut VM, this: &Value, args: &[Value]) -> Result<Value> {
    let key = arg(args, 0);
    let table = this_table(vm, this, "get", false)?;
    Ok(key.as_object().and_then(|key| table.get(key).cloned()).unwrap_or_default())
}

/// WeakMap.prototype.set(key, value)
fn weak_map_set(vm: &mut VM, this: &Value, args: &[Value]) -> Result<Value> {
    this_table(vm, this, "set", false)?;
    let key = weak_key(vm, &arg(args, 0), false)?;
    this_table(vm, this, "set", false)?.set(key, arg(args, 1));
    Ok(this.clone())
}

/// WeakMap.prototype.has(key)
fn weak_map_has(vm: &mut VM, this: &Value, args: &[Value]) -> Result<Value> {
    let key = arg(args, 0);
    let table = this_table(vm, this, "has", false)?;
    Ok(Value::Boolean(key.as_object().is_some_and(|key| table.has(key))))
}

/// WeakMap.prototype.delete(key)
fn weak_map_delete(vm: &mut VM, this: &Value, args: &[Value]) -> Result<Value> {
    let key = arg(args, 0);
    let table = this_table(vm, this, "delete", false)?;
    Ok(Value::Boolean(key.as_object().is_some_and(|key| table.delete(key))))
}

/// WeakSet.prototype.add(value)
fn weak_set_add(vm: &mut VM, this: &Value, args: &[Value]) -> Result<Value> {
    this_table(vm, this, "add", true)?;
    let key = weak_key(vm, &arg(args, 0), true)?;
    this_table(vm, this, "add", true)?.set(key, Value::Undefined);
    Ok(this.clone())
}

/// WeakSet.prototype.has(value)
fn weak_set_has(vm: &mut VM, this: &Value, args: &[Value]) -> Result<Value> {
    let key = arg(args, 0);
    let table = this_table(vm, this, "has", true)?;
    Ok(Value::Boolean(key.as_object().is_some_and(|key| table.has(key))))
}

/// WeakSet.prototype.delete(value)
fn weak_set_delete(vm: &mut VM, this: &Value, args: &[Value]) -> Result<Value> {
    let key = arg(args, 0);
    let table = this_table(vm, this, "delete", true)?;
    Ok(Value::Boolean(key.as_object().is_some_and(|key| table.delete(key))))
}

#[cfg(test)]
mod tests {
    use crate::builtins::testing::{eval_str, thrown};

    #[test]
    fn test_weak_map() {
        let src = "var k = {}, j = function () {}; var w = new WeakMap([[k, 1]]); w.set(j, 2); \
                   [w.get(k), w.get(j), w.has({}), w.get('x'), w.delete(k), w.has(k)].join()";
        assert_eq!(eval_str(src), "1,2,false,,true,false");
        assert_eq!(eval_str("Object.prototype.toString.call(new WeakMap())"), "[object WeakMap]");
        assert_eq!(eval_str("typeof WeakMap.prototype.clear + typeof WeakMap.prototype.size"), "undefinedundefined");
    }

    #[test]
    fn test_weak_set() {
        let src = "var k = {}; var w = new WeakSet([k]); [w.has(k), w.add(k) === w, w.delete(k), w.has(k), w.has(1)].join()";
        assert_eq!(eval_str(src), "true,true,true,false,false");
    }

    #[test]
    fn test_primitive_keys_are_rejected() {
        assert!(thrown("new WeakMap().set(1, 1)").starts_with("TypeError"));
        assert!(thrown("new WeakSet().add('a')").starts_with("TypeError"));
        assert!(thrown("new WeakSet([Symbol()])").starts_with("TypeError"));
        assert!(thrown("WeakMap.prototype.get.call(new Map(), {})").starts_with("TypeError"));
        assert!(thrown("WeakSet()").starts_with("TypeError"));
    }
}
