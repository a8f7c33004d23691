//! Map and Set, with their iterators.
//!
//! Iterators hold the collection and a position into its entry list. Deleted
//! entries leave tombstones, so an iterator resumes correctly after the
//! collection changes under it and sees entries appended meanwhile.

use super::{Builder, arg};
use crate::error::{Result, type_error};
use crate::gc::ObjectRef;
use crate::runtime::collections::OrderedMap;
use crate::runtime::object::{Attributes, IterationKind, JsObject, ListIterator, ObjectKind, PropertyKey, PropertySlot};
use crate::runtime::value::Value;
use crate::vm::VM;

pub(super) fn register(builder: &mut Builder<'_>) {
    let iterator = builder.symbols.iterator.clone();

    let map = builder.intrinsics.map_prototype;
    builder.constructor("Map", 0, require_new, Some(map_construct), map);
    builder.method(map, "get", 1, map_get);
    builder.method(map, "set", 2, map_set);
    builder.method(map, "has", 1, map_has);
    builder.method(map, "delete", 1, map_delete);
    builder.method(map, "clear", 0, map_clear);
    builder.method(map, "forEach", 1, map_for_each);
    builder.accessor(map, PropertyKey::from("size"), map_size, None);
    builder.method(map, "keys", 0, map_keys);
    builder.method(map, "values", 0, map_values);
    let entries = builder.method(map, "entries", 0, map_entries);
    builder.define(
        map,
        PropertyKey::Symbol(iterator.clone()),
        PropertySlot::data(Value::Object(entries), Attributes::HIDDEN),
    );
    builder.to_string_tag(map, "Map");

    let set = builder.intrinsics.set_prototype;
    builder.constructor("Set", 0, require_new, Some(set_construct), set);
    builder.method(set, "add", 1, set_add);
    builder.method(set, "has", 1, set_has);
    builder.method(set, "delete", 1, set_delete);
    builder.method(set, "clear", 0, set_clear);
    builder.method(set, "forEach", 1, set_for_each);
    builder.accessor(set, PropertyKey::from("size"), set_size, None);
    builder.method(set, "entries", 0, set_entries);
    let values = builder.method(set, "values", 0, set_values);
    builder.value(set, "keys", Value::Object(values));
    builder.define(
        set,
        PropertyKey::Symbol(iterator),
        PropertySlot::data(Value::Object(values), Attributes::HIDDEN),
    );
    builder.to_string_tag(set, "Set");

    let map_iterator = builder.intrinsics.map_iterator_prototype;
    builder.method(map_iterator, "next", 0, map_iterator_next);
    builder.to_string_tag(map_iterator, "Map Iterator");

    let set_iterator = builder.intrinsics.set_iterator_prototype;
    builder.method(set_iterator, "next", 0, set_iterator_next);
    builder.to_string_tag(set_iterator, "Set Iterator");
}

/// Calling `Map()` or `Set()` without `new`.
pub(super) fn require_new(_vm: &mut VM, _this: &Value, _args: &[Value]) -> Result<Value> {
    type_error("Constructor requires 'new'")
}

/// Feeds every element of `iterable` to `adder` called on `target`,
/// closing the iterator if an addition throws.
pub(super) fn add_entries_from_iterable(
    vm: &mut VM,
    target: ObjectRef,
    iterable: &Value,
    adder_name: &str,
    pairs: bool,
) -> Result<()> {
    let receiver = Value::Object(target);
    let adder = vm.get_named(&receiver, adder_name)?;
    if !vm.is_callable(&adder) {
        return type_error(format!("'{adder_name}' returned for {} is not callable", vm.describe(&receiver)));
    }
    let (iterator, next) = vm.get_iterator(iterable)?;
    while let Some(item) = vm.iterator_step(&iterator, &next)? {
        let added = if pairs {
            add_pair(vm, &adder, &receiver, &item)
        } else {
            vm.call(&adder, &receiver, &[item]).map(|_| ())
        };
        if let Err(error) = added {
            vm.iterator_close_quietly(&iterator)?;
            return Err(error);
        }
    }
    Ok(())
}

fn add_pair(vm: &mut VM, adder: &Value, receiver: &Value, item: &Value) -> Result<()> {
    if !item.is_object() {
        return type_error(format!("Iterator value {} is not an entry object", vm.describe(item)));
    }
    let key = vm.get_named(item, "0")?;
    let value = vm.get_named(item, "1")?;
    vm.call(adder, receiver, &[key, value])?;
    Ok(())
}

// ============================================================================
// Map
// ============================================================================

/// new Map(iterable)
fn map_construct(vm: &mut VM, args: &[Value], new_target: ObjectRef) -> Result<Value> {
    let fallback = vm.realm.intrinsics.map_prototype;
    let prototype = vm.prototype_from_constructor(new_target, fallback)?;
    let map = vm.alloc(JsObject::with_kind(
        Some(prototype),
        ObjectKind::Map(Box::new(OrderedMap::new())),
    ));
    let iterable = arg(args, 0);
    if !iterable.is_nullish() {
        add_entries_from_iterable(vm, map, &iterable, "set", true)?;
    }
    Ok(Value::Object(map))
}

fn this_map<'a>(vm: &'a mut VM, this: &Value, method: &str) -> Result<&'a mut OrderedMap> {
    entries_mut(vm, this, method, false)
}

fn this_set<'a>(vm: &'a mut VM, this: &Value, method: &str) -> Result<&'a mut OrderedMap> {
    entries_mut(vm, this, method, true)
}

fn entries_mut<'a>(vm: &'a mut VM, this: &Value, method: &str, is_set: bool) -> Result<&'a mut OrderedMap> {
    let target = match this.as_object() {
        Some(object) => match vm.heap.object(object)?.kind {
            ObjectKind::Map(_) if !is_set => Some(object),
            ObjectKind::Set(_) if is_set => Some(object),
            _ => None,
        },
        None => None,
    };
    let class = if is_set { "Set" } else { "Map" };
    let Some(object) = target else {
        return type_error(format!(
            "Method {class}.prototype.{method} called on incompatible receiver {}",
            vm.describe(this)
        ));
    };
    match &mut vm.heap.object_mut(object)?.kind {
        ObjectKind::Map(entries) | ObjectKind::Set(entries) => Ok(&mut **entries),
        _ => type_error(format!("Method {class}.prototype.{method} called on incompatible receiver")),
    }
}

/// Map.prototype.get(key)
fn map_get(vm: &mut VM, this: &Value, args: &[Value]) -> Result<Value> {
    let key = arg(args, 0);
    Ok(this_map(vm, this, "get")?.get(&key).cloned().unwrap_or_default())
}

/// Map.prototype.set(key, value)
fn map_set(vm: &mut VM, this: &Value, args: &[Value]) -> Result<Value> {
    this_map(vm, this, "set")?.set(arg(args, 0), arg(args, 1));
    Ok(this.clone())
}

/// Map.prototype.has(key)
fn map_has(vm: &mut VM, this: &Value, args: &[Value]) -> Result<Value> {
    let key = arg(args, 0);
    Ok(Value::Boolean(this_map(vm, this, "has")?.has(&key)))
}

/// Map.prototype.delete(key)
fn map_delete(vm: &mut VM, this: &Value, args: &[Value]) -> Result<Value> {
    let key = arg(args, 0);
    Ok(Value::Boolean(this_map(vm, this, "delete")?.delete(&key)))
}

/// Map.prototype.clear()
fn map_clear(vm: &mut VM, this: &Value, _args: &[Value]) -> Result<Value> {
    this_map(vm, this, "clear")?.clear();
    Ok(Value::Undefined)
}

/// get Map.prototype.size
fn map_size(vm: &mut VM, this: &Value, _args: &[Value]) -> Result<Value> {
    Ok(Value::from(this_map(vm, this, "size")?.len()))
}

/// Map.prototype.forEach(callback, thisArg)
fn map_for_each(vm: &mut VM, this: &Value, args: &[Value]) -> Result<Value> {
    this_map(vm, this, "forEach")?;
    for_each(vm, this, args, false)
}

/// Map.prototype.keys()
fn map_keys(vm: &mut VM, this: &Value, _args: &[Value]) -> Result<Value> {
    this_map(vm, this, "keys")?;
    create_iterator(vm, this, IterationKind::Keys, false)
}

/// Map.prototype.values()
fn map_values(vm: &mut VM, this: &Value, _args: &[Value]) -> Result<Value> {
    this_map(vm, this, "values")?;
    create_iterator(vm, this, IterationKind::Values, false)
}

/// Map.prototype.entries()
fn map_entries(vm: &mut VM, this: &Value, _args: &[Value]) -> Result<Value> {
    this_map(vm, this, "entries")?;
    create_iterator(vm, this, IterationKind::Entries, false)
}

// ============================================================================
// Set
// ============================================================================

/// new Set(iterable)
fn set_construct(vm: &mut VM, args: &[Value], new_target: ObjectRef) -> Result<Value> {
    let fallback = vm.realm.intrinsics.set_prototype;
    let prototype = vm.prototype_from_constructor(new_target, fallback)?;
    let set = vm.alloc(JsObject::with_kind(
        Some(prototype),
        ObjectKind::Set(Box::new(OrderedMap::new())),
    ));
    let iterable = arg(args, 0);
    if !iterable.is_nullish() {
        add_entries_from_iterable(vm, set, &iterable, "add", false)?;
    }
    Ok(Value::Object(set))
}

/// Set.prototype.add(value)
fn set_add(vm: &mut VM, this: &Value, args: &[Value]) -> Result<Value> {
    let value = arg(args, 0);
    let entries = this_set(vm, this, "add")?;
    if !entries.has(&value) {
        entries.set(value, Value::Undefined);
    }
    Ok(this.clone())
}

/// Set.prototype.has(value)
fn set_has(vm: &mut VM, this: &Value, args: &[Value]) -> Result<Value> {
    let value = arg(args, 0);
    Ok(Value::Boolean(this_set(vm, this, "has")?.has(&value)))
}

/// Set.prototype.delete(value)
fn set_delete(vm: &mut VM, this: &Value, args: &[Value]) -> Result<Value> {
    let value = arg(args, 0);
    Ok(Value::Boolean(this_set(vm, this, "delete")?.delete(&value)))
}

/// Set.prototype.clear()
fn set_clear(vm: &mut VM, this: &Value, _args: &[Value]) -> Result<Value> {
    this_set(vm, this, "clear")?.clear();
    Ok(Value::Undefined)
}

/// get Set.prototype.size
fn set_size(vm: &mut VM, this: &Value, _args: &[Value]) -> Result<Value> {
    Ok(Value::from(this_set(vm, this, "size")?.len()))
}

/// Set.prototype.forEach(callback, thisArg)
fn set_for_each(vm: &mut VM, this: &Value, args: &[Value]) -> Result<Value> {
    this_set(vm, this, "forEach")?;
    for_each(vm, this, args, true)
}

/// Set.prototype.values(), also `keys` and `@@iterator`
fn set_values(vm: &mut VM, this: &Value, _args: &[Value]) -> Result<Value> {
    this_set(vm, this, "values")?;
    create_iterator(vm, this, IterationKind::Values, true)
}

/// Set.prototype.entries()
fn set_entries(vm: &mut VM, this: &Value, _args: &[Value]) -> Result<Value> {
    this_set(vm, this, "entries")?;
    create_iterator(vm, this, IterationKind::Entries, true)
}

// ============================================================================
// Shared
// ============================================================================

/// Calls `callback(value, key, collection)` per live entry, re-reading the
/// entry list after every call so additions and deletions are observed.
fn for_each(vm: &mut VM, this: &Value, args: &[Value], is_set: bool) -> Result<Value> {
    let callback = arg(args, 0);
    if !vm.is_callable(&callback) {
        return type_error(format!("{} is not a function", vm.describe(&callback)));
    }
    let this_arg = arg(args, 1);
    let mut position = 0;
    loop {
        let entries = if is_set {
            this_set(vm, this, "forEach")?
        } else {
            this_map(vm, this, "forEach")?
        };
        let Some((at, key, value)) = entries.entry_from(position) else {
            break;
        };
        let (key, value) = (key.clone(), if is_set { key.clone() } else { value.clone() });
        position = at + 1;
        vm.call(&callback, &this_arg, &[value, key, this.clone()])?;
    }
    Ok(Value::Undefined)
}

fn create_iterator(vm: &mut VM, this: &Value, kind: IterationKind, is_set: bool) -> Result<Value> {
    let prototype = if is_set {
        vm.realm.intrinsics.set_iterator_prototype
    } else {
        vm.realm.intrinsics.map_iterator_prototype
    };
    let state = ListIterator::Collection {
        target: this.as_object(),
        position: 0,
        kind,
    };
    Ok(Value::Object(vm.alloc(JsObject::with_kind(Some(prototype), ObjectKind::Iterator(state)))))
}

/// %MapIteratorPrototype%.next()
fn map_iterator_next(vm: &mut VM, this: &Value, _args: &[Value]) -> Result<Value> {
    collection_iterator_next(vm, this, "Map Iterator")
}

/// %SetIteratorPrototype%.next()
fn set_iterator_next(vm: &mut VM, this: &Value, _args: &[Value]) -> Result<Value> {
    collection_iterator_next(vm, this, "Set Iterator")
}

fn collection_iterator_next(vm: &mut VM, this: &Value, name: &str) -> Result<Value> {
    let state = match this.as_object() {
        Some(object) => match &vm.heap.object(object)?.kind {
            ObjectKind::Iterator(state @ ListIterator::Collection { .. }) => Some((object, state.clone())),
            _ => None,
        },
        None => None,
    };
    let Some((object, ListIterator::Collection { target, position, kind })) = state else {
        return type_error(format!("{name}.prototype.next called on incompatible receiver {}", vm.describe(this)));
    };
    let Some(target) = target else {
        return Ok(vm.iter_result(Value::Undefined, true));
    };
    let next = match &vm.heap.object(target)?.kind {
        ObjectKind::Map(entries) | ObjectKind::Set(entries) => entries
            .entry_from(position)
            .map(|(at, key, value)| (at, key.clone(), value.clone())),
        _ => None,
    };
    let is_set = matches!(vm.heap.object(target)?.kind, ObjectKind::Set(_));
    let Some((at, key, value)) = next else {
        vm.heap.object_mut(object)?.kind = ObjectKind::Iterator(ListIterator::Collection {
            target: None,
            position,
            kind,
        });
        return Ok(vm.iter_result(Value::Undefined, true));
    };
    vm.heap.object_mut(object)?.kind = ObjectKind::Iterator(ListIterator::Collection {
        target: Some(target),
        position: at + 1,
        kind,
    });
    let value = if is_set { key.clone() } else { value };
    let result = match kind {
        IterationKind::Keys => key,
        IterationKind::Values => value,
        IterationKind::Entries => Value::Object(vm.new_array(vec![key, value])),
    };
    Ok(vm.iter_result(result, false))
}

#[cfg(test)]
mod tests {
    use crate::builtins::testing::{eval_str, thrown};

    #[test]
    fn test_map_basics() {
        let src = "var m = new Map([[1, 'a'], ['1', 'b']]); m.set(NaN, 'n').set(-0, 'z'); \
                   [m.get(1), m.get('1'), m.get(NaN), m.get(0), m.size, m.has(2)].join()";
        assert_eq!(eval_str(src), "a,b,n,z,4,false");
        assert_eq!(eval_str("var m = new Map([[1, 2]]); [m.delete(1), m.delete(1), m.size].join()"), "true,false,0");
        assert_eq!(eval_str("Object.prototype.toString.call(new Map())"), "[object Map]");
        assert_eq!(eval_str("var k = {}; var m = new Map(); m.set(k, 1); m.get(k) + (m.get({}) === undefined ? 1 : 0)"), "2");
    }

    #[test]
    fn test_map_iteration_order() {
        let src = "var m = new Map(); m.set('b', 1); m.set('a', 2); m.set('b', 3); \
                   var out = []; for (var [k, v] of m) out.push(k + v); out.join()";
        assert_eq!(eval_str(src), "b3,a2");
        assert_eq!(eval_str("[...new Map([[1, 2], [3, 4]]).keys()].join()"), "1,3");
        assert_eq!(eval_str("[...new Map([[1, 2], [3, 4]]).values()].join()"), "2,4");
        assert_eq!(eval_str("Object.prototype.toString.call(new Map().entries())"), "[object Map Iterator]");
    }

    #[test]
    fn test_iteration_observes_mutation() {
        let src = "var m = new Map([[1, 1], [2, 2], [3, 3]]); var seen = []; \
                   for (var [k] of m) { seen.push(k); if (k === 1) { m.delete(2); m.set(4, 4); } } seen.join()";
        assert_eq!(eval_str(src), "1,3,4");
        let src = "var s = new Set([1]); var n = 0; s.forEach(function (v) { n++; if (v < 5) s.add(v + 1); }); n";
        assert_eq!(eval_str(src), "5");
        let src = "var s = new Set([1, 2]); var it = s.values(); it.next(); s.clear(); s.add(9); it.next().value";
        assert_eq!(eval_str(src), "9");
    }

    #[test]
    fn test_set_basics() {
        let src = "var s = new Set([1, 1, '1', NaN, NaN]); [s.size, s.has(NaN), s.has('1'), s.add(2) === s].join()";
        assert_eq!(eval_str(src), "4,true,true,true");
        assert_eq!(eval_str("[...new Set('hello')].join('')"), "helo");
        assert_eq!(eval_str("Set.prototype.keys === Set.prototype.values"), "true");
        assert_eq!(eval_str("[...new Set([1, 2]).entries()].join(';')"), "1,1;2,2");
        let src = "var out = []; new Map([['k', 'v']]).forEach(function (v, k, m) { out.push(v, k, m.size, this.x); }, {x: 'x'}); out.join()";
        assert_eq!(eval_str(src), "v,k,1,x");
    }

    #[test]
    fn test_receiver_and_constructor_checks() {
        assert!(thrown("Map()").starts_with("TypeError"));
        assert!(thrown("Map.prototype.get.call({}, 1)").starts_with("TypeError"));
        assert!(thrown("Set.prototype.add.call(new Map(), 1)").starts_with("TypeError"));
        assert!(thrown("new Map([1])").starts_with("TypeError"));
        assert!(thrown("new Set(5)").starts_with("TypeError"));
    }

    #[test]
    fn test_constructor_closes_iterator_on_error() {
        let src = "var closed = false; var it = { [Symbol.iterator]() { return this; }, \
                   next() { return { value: 7, done: false }; }, return() { closed = true; return {}; } }; \
                   try { new Map(it); } catch (e) { } closed";
        assert_eq!(eval_str(src), "true");
    }

    #[test]
    fn test_subclass_uses_overridden_adder() {
        let src = "function Counted() {} Counted.prototype = Object.create(Set.prototype); \
                   Counted.prototype.add = function (v) { this.n = (this.n || 0) + 1; return Set.prototype.add.call(this, v); }; \
                   var s = Reflect.construct(Set, [[1, 2, 2]], Counted); [s.n, s.size, s instanceof Counted].join()";
        assert_eq!(eval_str(src), "3,2,true");
    }
}
