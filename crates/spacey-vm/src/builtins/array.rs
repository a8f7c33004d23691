//! Array built-in constructor and prototype methods.
//!
//! The prototype methods are generic: they work on any array-like `this`
//! through `[[Get]]`, `[[Set]]` and `length`, so holes and inherited
//! elements behave as they do in scripts.

use std::cmp::Ordering;

use super::{Builder, arg};
use crate::error::{Error, Result, range_error, type_error};
use crate::gc::ObjectRef;
use crate::runtime::object::{Attributes, IterationKind, JsObject, ListIterator, ObjectKind, PropertyKey, PropertySlot};
use crate::runtime::string::JsString;
use crate::runtime::value::Value;
use crate::vm::VM;
use crate::vm::conversions::{relative_index, to_integer_or_infinity};

/// Largest length an array-like may reach.
const MAX_SAFE_LENGTH: f64 = 9_007_199_254_740_991.0;

pub(super) fn register(builder: &mut Builder<'_>) {
    let prototype = builder.intrinsics.array_prototype;
    let constructor = builder.constructor("Array", 1, array_call, Some(array_construct), prototype);
    builder.method(constructor, "isArray", 1, is_array);
    builder.method(constructor, "of", 0, of);
    builder.method(constructor, "from", 1, from);

    builder.method(prototype, "at", 1, at);
    builder.method(prototype, "concat", 1, concat);
    builder.method(prototype, "copyWithin", 2, copy_within);
    builder.method(prototype, "entries", 0, entries);
    builder.method(prototype, "every", 1, every);
    builder.method(prototype, "fill", 1, fill);
    builder.method(prototype, "filter", 1, filter);
    builder.method(prototype, "find", 1, find);
    builder.method(prototype, "findIndex", 1, find_index);
    builder.method(prototype, "findLast", 1, find_last);
    builder.method(prototype, "findLastIndex", 1, find_last_index);
    builder.method(prototype, "flat", 0, flat);
    builder.method(prototype, "flatMap", 1, flat_map);
    builder.method(prototype, "forEach", 1, for_each);
    builder.method(prototype, "includes", 1, includes);
    builder.method(prototype, "indexOf", 1, index_of);
    builder.method(prototype, "join", 1, join);
    builder.method(prototype, "keys", 0, keys);
    builder.method(prototype, "lastIndexOf", 1, last_index_of);
    builder.method(prototype, "map", 1, map);
    builder.method(prototype, "pop", 0, pop);
    builder.method(prototype, "push", 1, push);
    builder.method(prototype, "reduce", 1, reduce);
    builder.method(prototype, "reduceRight", 1, reduce_right);
    builder.method(prototype, "reverse", 0, reverse);
    builder.method(prototype, "shift", 0, shift);
    builder.method(prototype, "slice", 2, slice);
    builder.method(prototype, "some", 1, some);
    builder.method(prototype, "sort", 1, sort);
    builder.method(prototype, "splice", 2, splice);
    builder.method(prototype, "toLocaleString", 0, to_locale_string);
    builder.method(prototype, "toString", 0, to_string);
    builder.method(prototype, "unshift", 1, unshift);

    // `values` and `[Symbol.iterator]` are the same function object.
    let values = builder.intrinsics.array_values;
    builder.define(
        values,
        PropertyKey::from("length"),
        PropertySlot::data(Value::from(0), Attributes::CONFIGURABLE),
    );
    builder.define(
        values,
        PropertyKey::from("name"),
        PropertySlot::data(Value::from("values"), Attributes::CONFIGURABLE),
    );
    builder.value(prototype, "values", Value::Object(values));
    let iterator = builder.symbols.iterator.clone();
    builder.define(
        prototype,
        PropertyKey::Symbol(iterator),
        PropertySlot::data(Value::Object(values), Attributes::HIDDEN),
    );
}

// ============================================================================
// Helpers
// ============================================================================

fn key(index: f64) -> PropertyKey {
    PropertyKey::from_number(index)
}

fn get_index(vm: &mut VM, object: ObjectRef, index: f64) -> Result<Value> {
    vm.get(object, &key(index), &Value::Object(object))
}

fn set_index(vm: &mut VM, object: ObjectRef, index: f64, value: Value) -> Result<()> {
    vm.set_value(&Value::Object(object), key(index), value, true)
}

fn has_index(vm: &mut VM, object: ObjectRef, index: f64) -> Result<bool> {
    vm.has_property(object, &key(index))
}

fn delete_index(vm: &mut VM, object: ObjectRef, index: f64) -> Result<()> {
    if !vm.delete_property(object, &key(index))? {
        return type_error(format!("Cannot delete property '{}' of array", key(index)));
    }
    Ok(())
}

fn set_length(vm: &mut VM, object: ObjectRef, length: f64) -> Result<()> {
    vm.put(object, "length", Value::Number(length))
}

/// `this` as an object with its length.
fn this_array(vm: &mut VM, this: &Value) -> Result<(ObjectRef, f64)> {
    let object = vm.to_object(this)?;
    let length = vm.length_of_array_like(object)? as f64;
    Ok((object, length))
}

fn callback(vm: &VM, args: &[Value]) -> Result<Value> {
    let function = arg(args, 0);
    if !vm.is_callable(&function) {
        return type_error(format!("{} is not a function", vm.describe(&function)));
    }
    Ok(function)
}

/// ToIntegerOrInfinity of an optional argument, resolved against `length`.
fn relative_arg(vm: &mut VM, value: &Value, length: f64, default: f64) -> Result<f64> {
    if value.is_undefined() {
        return Ok(default);
    }
    let relative = vm.to_integer(value)?;
    Ok(relative_index(relative, length))
}

/// Creates an array of `length` holes with the prototype of `new_target`.
fn array_create(vm: &mut VM, length: f64, prototype: Option<ObjectRef>) -> Result<ObjectRef> {
    if length > u32::MAX as f64 {
        return range_error("Invalid array length");
    }
    let prototype = prototype.unwrap_or(vm.realm.intrinsics.array_prototype);
    let array = vm.alloc(JsObject::array(Some(prototype), Vec::new()));
    vm.heap.object_mut(array)?.set_array_length(length as u32);
    Ok(array)
}

// ============================================================================
// Constructor
// ============================================================================

/// Array(...items)
fn array_call(vm: &mut VM, _this: &Value, args: &[Value]) -> Result<Value> {
    construct_with_prototype(vm, args, None)
}

/// new Array(...items)
fn array_construct(vm: &mut VM, args: &[Value], new_target: ObjectRef) -> Result<Value> {
    let fallback = vm.realm.intrinsics.array_prototype;
    let prototype = vm.prototype_from_constructor(new_target, fallback)?;
    construct_with_prototype(vm, args, Some(prototype))
}

fn construct_with_prototype(vm: &mut VM, args: &[Value], prototype: Option<ObjectRef>) -> Result<Value> {
    if let [Value::Number(length)] = args {
        if *length < 0.0 || length.fract() != 0.0 || *length > u32::MAX as f64 {
            return range_error("Invalid array length");
        }
        return Ok(Value::Object(array_create(vm, *length, prototype)?));
    }
    let prototype = prototype.unwrap_or(vm.realm.intrinsics.array_prototype);
    Ok(Value::Object(vm.alloc(JsObject::array(Some(prototype), args.to_vec()))))
}

/// Array.isArray(value)
fn is_array(vm: &mut VM, _this: &Value, args: &[Value]) -> Result<Value> {
    Ok(Value::Boolean(match arg(args, 0) {
        Value::Object(object) => vm.heap.object(object)?.is_array(),
        _ => false,
    }))
}

/// Array.of(...items)
fn of(vm: &mut VM, _this: &Value, args: &[Value]) -> Result<Value> {
    Ok(Value::Object(vm.new_array(args.to_vec())))
}

/// Array.from(items, mapFn, thisArg)
fn from(vm: &mut VM, _this: &Value, args: &[Value]) -> Result<Value> {
    let items = arg(args, 0);
    let map_fn = arg(args, 1);
    if !map_fn.is_undefined() && !vm.is_callable(&map_fn) {
        return type_error(format!("{} is not a function", vm.describe(&map_fn)));
    }
    if items.is_nullish() {
        return type_error(format!("{} is not iterable", vm.describe(&items)));
    }
    let iterator_key = PropertyKey::Symbol(vm.realm.symbols.iterator.clone());
    let values = match vm.get_method(&items, &iterator_key)? {
        Some(_) => vm.iterate_to_vec(&items)?,
        None => vm.array_like_to_vec(&items)?,
    };
    let values = if map_fn.is_undefined() {
        values
    } else {
        let this_arg = arg(args, 2);
        let mut mapped = Vec::with_capacity(values.len());
        for (index, value) in values.into_iter().enumerate() {
            mapped.push(vm.call(&map_fn, &this_arg, &[value, Value::from(index)])?);
        }
        mapped
    };
    Ok(Value::Object(vm.new_array(values)))
}

// ============================================================================
// Iteration
// ============================================================================

/// Array.prototype.values()
pub fn values(vm: &mut VM, this: &Value, _args: &[Value]) -> Result<Value> {
    create_iterator(vm, this, IterationKind::Values)
}

/// Array.prototype.keys()
fn keys(vm: &mut VM, this: &Value, _args: &[Value]) -> Result<Value> {
    create_iterator(vm, this, IterationKind::Keys)
}

/// Array.prototype.entries()
fn entries(vm: &mut VM, this: &Value, _args: &[Value]) -> Result<Value> {
    create_iterator(vm, this, IterationKind::Entries)
}

fn create_iterator(vm: &mut VM, this: &Value, kind: IterationKind) -> Result<Value> {
    let object = vm.to_object(this)?;
    let prototype = vm.realm.intrinsics.array_iterator_prototype;
    let iterator = JsObject::with_kind(
        Some(prototype),
        ObjectKind::Iterator(ListIterator::Array {
            target: Some(Value::Object(object)),
            index: 0,
            kind,
        }),
    );
    Ok(Value::Object(vm.alloc(iterator)))
}

/// Which element a search visits first.
#[derive(Clone, Copy, PartialEq)]
enum Direction {
    Forward,
    Backward,
}

/// Calls the predicate on every index (holes included) until it returns
/// true. Returns the index and value found.
fn find_by(vm: &mut VM, this: &Value, args: &[Value], direction: Direction) -> Result<Option<(f64, Value)>> {
    let (object, length) = this_array(vm, this)?;
    let predicate = callback(vm, args)?;
    let this_arg = arg(args, 1);
    let this_value = Value::Object(object);
    let visit = |vm: &mut VM, index: f64| -> Result<Option<(f64, Value)>> {
        let value = get_index(vm, object, index)?;
        let hit = vm.call(&predicate, &this_arg, &[value.clone(), Value::Number(index), this_value.clone()])?;
        Ok(hit.to_boolean().then_some((index, value)))
    };
    let mut index = 0.0;
    while index < length {
        let at = if direction == Direction::Forward { index } else { length - 1.0 - index };
        if let Some(found) = visit(vm, at)? {
            return Ok(Some(found));
        }
        index += 1.0;
    }
    Ok(None)
}

/// Array.prototype.find(predicate, thisArg)
fn find(vm: &mut VM, this: &Value, args: &[Value]) -> Result<Value> {
    Ok(find_by(vm, this, args, Direction::Forward)?.map(|(_, v)| v).unwrap_or_default())
}

/// Array.prototype.findIndex(predicate, thisArg)
fn find_index(vm: &mut VM, this: &Value, args: &[Value]) -> Result<Value> {
    Ok(Value::Number(find_by(vm, this, args, Direction::Forward)?.map_or(-1.0, |(i, _)| i)))
}

/// Array.prototype.findLast(predicate, thisArg)
fn find_last(vm: &mut VM, this: &Value, args: &[Value]) -> Result<Value> {
    Ok(find_by(vm, this, args, Direction::Backward)?.map(|(_, v)| v).unwrap_or_default())
}

/// Array.prototype.findLastIndex(predicate, thisArg)
fn find_last_index(vm: &mut VM, this: &Value, args: &[Value]) -> Result<Value> {
    Ok(Value::Number(find_by(vm, this, args, Direction::Backward)?.map_or(-1.0, |(i, _)| i)))
}

/// Calls `f(element, index, array)` for each present element, stopping
/// when `visit` returns `false`.
fn each_present(
    vm: &mut VM,
    this: &Value,
    args: &[Value],
    mut visit: impl FnMut(&mut VM, f64, Value, Value) -> Result<bool>,
) -> Result<()> {
    let (object, length) = this_array(vm, this)?;
    let function = callback(vm, args)?;
    let this_arg = arg(args, 1);
    let mut index = 0.0;
    while index < length {
        if has_index(vm, object, index)? {
            let value = get_index(vm, object, index)?;
            let result = vm.call(&function, &this_arg, &[value.clone(), Value::Number(index), Value::Object(object)])?;
            if !visit(vm, index, value, result)? {
                break;
            }
        }
        index += 1.0;
    }
    Ok(())
}

/// Array.prototype.forEach(callback, thisArg)
fn for_each(vm: &mut VM, this: &Value, args: &[Value]) -> Result<Value> {
    each_present(vm, this, args, |_, _, _, _| Ok(true))?;
    Ok(Value::Undefined)
}

/// Array.prototype.map(callback, thisArg)
fn map(vm: &mut VM, this: &Value, args: &[Value]) -> Result<Value> {
    let (_, length) = this_array(vm, this)?;
    let result = array_create(vm, length, None)?;
    each_present(vm, this, args, |vm, index, _, mapped| {
        vm.create_data_property(result, key(index), mapped)?;
        Ok(true)
    })?;
    Ok(Value::Object(result))
}

/// Array.prototype.filter(callback, thisArg)
fn filter(vm: &mut VM, this: &Value, args: &[Value]) -> Result<Value> {
    let mut kept = Vec::new();
    each_present(vm, this, args, |_, _, value, selected| {
        if selected.to_boolean() {
            kept.push(value);
        }
        Ok(true)
    })?;
    Ok(Value::Object(vm.new_array(kept)))
}

/// Array.prototype.every(callback, thisArg)
fn every(vm: &mut VM, this: &Value, args: &[Value]) -> Result<Value> {
    let mut all = true;
    each_present(vm, this, args, |_, _, _, result| {
        all = result.to_boolean();
        Ok(all)
    })?;
    Ok(Value::Boolean(all))
}

/// Array.prototype.some(callback, thisArg)
fn some(vm: &mut VM, this: &Value, args: &[Value]) -> Result<Value> {
    let mut any = false;
    each_present(vm, this, args, |_, _, _, result| {
        any = result.to_boolean();
        Ok(!any)
    })?;
    Ok(Value::Boolean(any))
}

fn reduce_impl(vm: &mut VM, this: &Value, args: &[Value], direction: Direction) -> Result<Value> {
    let (object, length) = this_array(vm, this)?;
    let function = callback(vm, args)?;
    let indices: Box<dyn Iterator<Item = f64>> = match direction {
        Direction::Forward => Box::new((0..length as u64).map(|i| i as f64)),
        Direction::Backward => Box::new((0..length as u64).rev().map(|i| i as f64)),
    };
    let mut accumulator = if args.len() >= 2 { Some(args[1].clone()) } else { None };
    for index in indices {
        if !has_index(vm, object, index)? {
            continue;
        }
        let value = get_index(vm, object, index)?;
        accumulator = Some(match accumulator {
            None => value,
            Some(previous) => vm.call(
                &function,
                &Value::Undefined,
                &[previous, value, Value::Number(index), Value::Object(object)],
            )?,
        });
    }
    match accumulator {
        Some(value) => Ok(value),
        None => type_error("Reduce of empty array with no initial value"),
    }
}

/// Array.prototype.reduce(callback, initialValue)
fn reduce(vm: &mut VM, this: &Value, args: &[Value]) -> Result<Value> {
    reduce_impl(vm, this, args, Direction::Forward)
}

/// Array.prototype.reduceRight(callback, initialValue)
fn reduce_right(vm: &mut VM, this: &Value, args: &[Value]) -> Result<Value> {
    reduce_impl(vm, this, args, Direction::Backward)
}

// ============================================================================
// Searching
// ============================================================================

/// Array.prototype.indexOf(search, fromIndex)
fn index_of(vm: &mut VM, this: &Value, args: &[Value]) -> Result<Value> {
    let (object, length) = this_array(vm, this)?;
    let search = arg(args, 0);
    let mut index = relative_arg(vm, &arg(args, 1), length, 0.0)?;
    while index < length {
        if has_index(vm, object, index)? && get_index(vm, object, index)?.strict_equals(&search) {
            return Ok(Value::Number(index));
        }
        index += 1.0;
    }
    Ok(Value::Number(-1.0))
}

/// Array.prototype.lastIndexOf(search, fromIndex)
fn last_index_of(vm: &mut VM, this: &Value, args: &[Value]) -> Result<Value> {
    let (object, length) = this_array(vm, this)?;
    let search = arg(args, 0);
    let mut index = if args.len() > 1 {
        let from = vm.to_integer(&args[1])?;
        if from < 0.0 { length + from } else { from.min(length - 1.0) }
    } else {
        length - 1.0
    };
    while index >= 0.0 {
        if has_index(vm, object, index)? && get_index(vm, object, index)?.strict_equals(&search) {
            return Ok(Value::Number(index));
        }
        index -= 1.0;
    }
    Ok(Value::Number(-1.0))
}

/// Array.prototype.includes(search, fromIndex)
fn includes(vm: &mut VM, this: &Value, args: &[Value]) -> Result<Value> {
    let (object, length) = this_array(vm, this)?;
    let search = arg(args, 0);
    let mut index = relative_arg(vm, &arg(args, 1), length, 0.0)?;
    while index < length {
        if get_index(vm, object, index)?.same_value_zero(&search) {
            return Ok(Value::Boolean(true));
        }
        index += 1.0;
    }
    Ok(Value::Boolean(false))
}

/// Array.prototype.at(index)
fn at(vm: &mut VM, this: &Value, args: &[Value]) -> Result<Value> {
    let (object, length) = this_array(vm, this)?;
    let relative = vm.to_integer(&arg(args, 0))?;
    let index = if relative < 0.0 { length + relative } else { relative };
    if index < 0.0 || index >= length {
        return Ok(Value::Undefined);
    }
    get_index(vm, object, index)
}

// ============================================================================
// Mutation
// ============================================================================

/// Array.prototype.push(...items)
fn push(vm: &mut VM, this: &Value, args: &[Value]) -> Result<Value> {
    let (object, length) = this_array(vm, this)?;
    if length + args.len() as f64 > MAX_SAFE_LENGTH {
        return type_error("Pushing elements past the maximum array length");
    }
    let mut length = length;
    for value in args {
        set_index(vm, object, length, value.clone())?;
        length += 1.0;
    }
    set_length(vm, object, length)?;
    Ok(Value::Number(length))
}

/// Array.prototype.pop()
fn pop(vm: &mut VM, this: &Value, _args: &[Value]) -> Result<Value> {
    let (object, length) = this_array(vm, this)?;
    if length == 0.0 {
        set_length(vm, object, 0.0)?;
        return Ok(Value::Undefined);
    }
    let last = length - 1.0;
    let value = get_index(vm, object, last)?;
    delete_index(vm, object, last)?;
    set_length(vm, object, last)?;
    Ok(value)
}

/// Array.prototype.shift()
fn shift(vm: &mut VM, this: &Value, _args: &[Value]) -> Result<Value> {
    let (object, length) = this_array(vm, this)?;
    if length == 0.0 {
        set_length(vm, object, 0.0)?;
        return Ok(Value::Undefined);
    }
    let first = get_index(vm, object, 0.0)?;
    move_elements(vm, object, 1.0, 0.0, length - 1.0)?;
    delete_index(vm, object, length - 1.0)?;
    set_length(vm, object, length - 1.0)?;
    Ok(first)
}

/// Array.prototype.unshift(...items)
fn unshift(vm: &mut VM, this: &Value, args: &[Value]) -> Result<Value> {
    let (object, length) = this_array(vm, this)?;
    let count = args.len() as f64;
    if count > 0.0 {
        if length + count > MAX_SAFE_LENGTH {
            return type_error("Unshifting elements past the maximum array length");
        }
        move_elements(vm, object, 0.0, count, length)?;
        for (offset, value) in args.iter().enumerate() {
            set_index(vm, object, offset as f64, value.clone())?;
        }
    }
    set_length(vm, object, length + count)?;
    Ok(Value::Number(length + count))
}

/// Moves `count` elements from `from` to `to`, preserving holes. The copy
/// runs in the direction that never overwrites unread elements.
fn move_elements(vm: &mut VM, object: ObjectRef, from: f64, to: f64, count: f64) -> Result<()> {
    let step = |vm: &mut VM, offset: f64| -> Result<()> {
        let source = from + offset;
        let target = to + offset;
        if has_index(vm, object, source)? {
            let value = get_index(vm, object, source)?;
            set_index(vm, object, target, value)
        } else {
            delete_index(vm, object, target)
        }
    };
    if from < to {
        let mut offset = count - 1.0;
        while offset >= 0.0 {
            step(vm, offset)?;
            offset -= 1.0;
        }
    } else {
        let mut offset = 0.0;
        while offset < count {
            step(vm, offset)?;
            offset += 1.0;
        }
    }
    Ok(())
}

/// Array.prototype.splice(start, deleteCount, ...items)
fn splice(vm: &mut VM, this: &Value, args: &[Value]) -> Result<Value> {
    let (object, length) = this_array(vm, this)?;
    let start = relative_arg(vm, &arg(args, 0), length, 0.0)?;
    let delete_count = match args.len() {
        0 => 0.0,
        1 => length - start,
        _ => vm.to_integer(&args[1])?.clamp(0.0, length - start),
    };
    let items = args.get(2..).unwrap_or(&[]);
    let item_count = items.len() as f64;
    if length + item_count - delete_count > MAX_SAFE_LENGTH {
        return type_error("Splice result exceeds the maximum array length");
    }

    let mut removed = Vec::new();
    let mut offset = 0.0;
    while offset < delete_count {
        let index = start + offset;
        removed.push(if has_index(vm, object, index)? {
            get_index(vm, object, index)?
        } else {
            Value::Empty
        });
        offset += 1.0;
    }
    let removed_array = vm.new_array(removed);

    let tail = length - start - delete_count;
    if item_count < delete_count {
        move_elements(vm, object, start + delete_count, start + item_count, tail)?;
        let mut index = length;
        while index > length - delete_count + item_count {
            delete_index(vm, object, index - 1.0)?;
            index -= 1.0;
        }
    } else if item_count > delete_count {
        move_elements(vm, object, start + delete_count, start + item_count, tail)?;
    }
    for (offset, item) in items.iter().enumerate() {
        set_index(vm, object, start + offset as f64, item.clone())?;
    }
    set_length(vm, object, length - delete_count + item_count)?;
    Ok(Value::Object(removed_array))
}

/// Array.prototype.reverse()
fn reverse(vm: &mut VM, this: &Value, _args: &[Value]) -> Result<Value> {
    let (object, length) = this_array(vm, this)?;
    let mut lower = 0.0;
    while lower < (length / 2.0).floor() {
        let upper = length - 1.0 - lower;
        let lower_exists = has_index(vm, object, lower)?;
        let upper_exists = has_index(vm, object, upper)?;
        let lower_value = get_index(vm, object, lower)?;
        let upper_value = get_index(vm, object, upper)?;
        match (lower_exists, upper_exists) {
            (true, true) => {
                set_index(vm, object, lower, upper_value)?;
                set_index(vm, object, upper, lower_value)?;
            }
            (false, true) => {
                set_index(vm, object, lower, upper_value)?;
                delete_index(vm, object, upper)?;
            }
            (true, false) => {
                delete_index(vm, object, lower)?;
                set_index(vm, object, upper, lower_value)?;
            }
            (false, false) => {}
        }
        lower += 1.0;
    }
    Ok(Value::Object(object))
}

/// Array.prototype.fill(value, start, end)
fn fill(vm: &mut VM, this: &Value, args: &[Value]) -> Result<Value> {
    let (object, length) = this_array(vm, this)?;
    let value = arg(args, 0);
    let mut index = relative_arg(vm, &arg(args, 1), length, 0.0)?;
    let end = relative_arg(vm, &arg(args, 2), length, length)?;
    while index < end {
        set_index(vm, object, index, value.clone())?;
        index += 1.0;
    }
    Ok(Value::Object(object))
}

/// Array.prototype.copyWithin(target, start, end)
fn copy_within(vm: &mut VM, this: &Value, args: &[Value]) -> Result<Value> {
    let (object, length) = this_array(vm, this)?;
    let target = relative_arg(vm, &arg(args, 0), length, 0.0)?;
    let start = relative_arg(vm, &arg(args, 1), length, 0.0)?;
    let end = relative_arg(vm, &arg(args, 2), length, length)?;
    let count = (end - start).min(length - target);
    if count > 0.0 {
        move_elements(vm, object, start, target, count)?;
    }
    Ok(Value::Object(object))
}

// ============================================================================
// Sorting
// ============================================================================

/// Array.prototype.sort(comparefn)
fn sort(vm: &mut VM, this: &Value, args: &[Value]) -> Result<Value> {
    let compare = arg(args, 0);
    if !compare.is_undefined() && !vm.is_callable(&compare) {
        return type_error("The comparison function must be either a function or undefined");
    }
    let (object, length) = this_array(vm, this)?;
    let mut values = Vec::new();
    let mut undefined_count = 0.0;
    let mut index = 0.0;
    while index < length {
        if has_index(vm, object, index)? {
            match get_index(vm, object, index)? {
                Value::Undefined => undefined_count += 1.0,
                value => values.push(value),
            }
        }
        index += 1.0;
    }
    let present = values.len() as f64;
    let sorted = merge_sort(vm, values, &compare)?;

    let mut index = 0.0;
    for value in sorted {
        set_index(vm, object, index, value)?;
        index += 1.0;
    }
    while index < present + undefined_count {
        set_index(vm, object, index, Value::Undefined)?;
        index += 1.0;
    }
    while index < length {
        delete_index(vm, object, index)?;
        index += 1.0;
    }
    Ok(Value::Object(object))
}

/// SortCompare for two non-undefined values.
fn sort_compare(vm: &mut VM, compare: &Value, a: &Value, b: &Value) -> Result<Ordering> {
    if !compare.is_undefined() {
        let result = vm.call(compare, &Value::Undefined, &[a.clone(), b.clone()])?;
        let n = vm.to_number(&result)?;
        return Ok(n.partial_cmp(&0.0).unwrap_or(Ordering::Equal));
    }
    let a = vm.to_string(a)?;
    let b = vm.to_string(b)?;
    Ok(a.cmp(&b))
}

/// A stable merge sort that propagates comparator errors.
fn merge_sort(vm: &mut VM, mut values: Vec<Value>, compare: &Value) -> Result<Vec<Value>> {
    if values.len() <= 1 {
        return Ok(values);
    }
    let right = values.split_off(values.len() / 2);
    let left = merge_sort(vm, values, compare)?;
    let right = merge_sort(vm, right, compare)?;
    let mut merged = Vec::with_capacity(left.len() + right.len());
    let mut left = left.into_iter().peekable();
    let mut right = right.into_iter().peekable();
    while let (Some(a), Some(b)) = (left.peek(), right.peek()) {
        if sort_compare(vm, compare, a, b)? == Ordering::Greater {
            merged.extend(right.next());
        } else {
            merged.extend(left.next());
        }
    }
    merged.extend(left);
    merged.extend(right);
    Ok(merged)
}

// ============================================================================
// Copying
// ============================================================================

/// Array.prototype.slice(start, end)
fn slice(vm: &mut VM, this: &Value, args: &[Value]) -> Result<Value> {
    let (object, length) = this_array(vm, this)?;
    let mut index = relative_arg(vm, &arg(args, 0), length, 0.0)?;
    let end = relative_arg(vm, &arg(args, 1), length, length)?;
    let mut values = Vec::new();
    while index < end {
        values.push(if has_index(vm, object, index)? {
            get_index(vm, object, index)?
        } else {
            Value::Empty
        });
        index += 1.0;
    }
    Ok(Value::Object(vm.new_array(values)))
}

/// Array.prototype.concat(...items)
fn concat(vm: &mut VM, this: &Value, args: &[Value]) -> Result<Value> {
    let first = Value::Object(vm.to_object(this)?);
    let mut values = Vec::new();
    for item in std::iter::once(&first).chain(args) {
        let spread = match item {
            Value::Object(object) if vm.heap.object(*object)?.is_array() => Some(*object),
            _ => None,
        };
        let Some(object) = spread else {
            values.push(item.clone());
            continue;
        };
        let length = vm.length_of_array_like(object)? as f64;
        let mut index = 0.0;
        while index < length {
            values.push(if has_index(vm, object, index)? {
                get_index(vm, object, index)?
            } else {
                Value::Empty
            });
            index += 1.0;
        }
    }
    Ok(Value::Object(vm.new_array(values)))
}

fn flatten_into(vm: &mut VM, out: &mut Vec<Value>, source: ObjectRef, depth: f64) -> Result<()> {
    let length = vm.length_of_array_like(source)? as f64;
    let mut index = 0.0;
    while index < length {
        if has_index(vm, source, index)? {
            let value = get_index(vm, source, index)?;
            match &value {
                Value::Object(inner) if depth > 0.0 && vm.heap.object(*inner)?.is_array() => {
                    let inner = *inner;
                    vm.reenter(|vm| flatten_into(vm, out, inner, depth - 1.0))?;
                }
                _ => out.push(value),
            }
        }
        index += 1.0;
    }
    Ok(())
}

/// Array.prototype.flat(depth)
fn flat(vm: &mut VM, this: &Value, args: &[Value]) -> Result<Value> {
    let object = vm.to_object(this)?;
    let depth = match arg(args, 0) {
        Value::Undefined => 1.0,
        value => to_integer_or_infinity(vm.to_number(&value)?).max(0.0),
    };
    let mut values = Vec::new();
    flatten_into(vm, &mut values, object, depth)?;
    Ok(Value::Object(vm.new_array(values)))
}

/// Array.prototype.flatMap(callback, thisArg)
fn flat_map(vm: &mut VM, this: &Value, args: &[Value]) -> Result<Value> {
    let mut values = Vec::new();
    each_present(vm, this, args, |vm, _, _, mapped| {
        match &mapped {
            Value::Object(inner) if vm.heap.object(*inner)?.is_array() => flatten_into(vm, &mut values, *inner, 0.0)?,
            _ => values.push(mapped),
        }
        Ok(true)
    })?;
    Ok(Value::Object(vm.new_array(values)))
}

// ============================================================================
// Conversion
// ============================================================================

/// Array.prototype.join(separator)
fn join(vm: &mut VM, this: &Value, args: &[Value]) -> Result<Value> {
    let (object, length) = this_array(vm, this)?;
    let separator = match arg(args, 0) {
        Value::Undefined => JsString::from(","),
        value => vm.to_string(&value)?,
    };
    if vm.join_stack.contains(&object) {
        return Ok(Value::from(""));
    }
    if vm.join_stack.len() >= vm.config.max_native_depth {
        return Err(Error::StackOverflow);
    }
    vm.join_stack.push(object);
    let result = join_elements(vm, object, length, &separator);
    vm.join_stack.pop();
    Ok(Value::String(result?))
}

fn join_elements(vm: &mut VM, object: ObjectRef, length: f64, separator: &JsString) -> Result<JsString> {
    let mut out = Vec::new();
    let mut index = 0.0;
    while index < length {
        if index > 0.0 {
            out.extend_from_slice(separator.as_units());
        }
        let value = get_index(vm, object, index)?;
        if !value.is_nullish() {
            out.extend_from_slice(vm.to_string(&value)?.as_units());
        }
        index += 1.0;
    }
    Ok(JsString::from(out))
}

/// Array.prototype.toString()
fn to_string(vm: &mut VM, this: &Value, _args: &[Value]) -> Result<Value> {
    let object = vm.to_object(this)?;
    let join = vm.get_named(&Value::Object(object), "join")?;
    if vm.is_callable(&join) {
        return vm.call(&join, &Value::Object(object), &[]);
    }
    super::object::to_string(vm, &Value::Object(object), &[])
}

/// Array.prototype.toLocaleString()
fn to_locale_string(vm: &mut VM, this: &Value, _args: &[Value]) -> Result<Value> {
    let (object, length) = this_array(vm, this)?;
    let mut parts = Vec::new();
    let mut index = 0.0;
    while index < length {
        let value = get_index(vm, object, index)?;
        parts.push(if value.is_nullish() {
            String::new()
        } else {
            let method = vm.get_named(&value, "toLocaleString")?;
            let result = vm.call(&method, &value, &[])?;
            vm.to_string(&result)?.to_string()
        });
        index += 1.0;
    }
    Ok(Value::from(parts.join(",")))
}

#[cfg(test)]
mod tests {
    use crate::builtins::testing::{eval_str, thrown};

    #[test]
    fn test_constructor() {
        assert_eq!(eval_str("new Array(3).length"), "3");
        assert_eq!(eval_str("Array(1, 2, 3).join('-')"), "1-2-3");
        assert_eq!(eval_str("Array.of(7).length"), "1");
        assert_eq!(eval_str("Array.isArray([]) + ',' + Array.isArray({ length: 0 })"), "true,false");
        assert!(thrown("new Array(-1)").starts_with("RangeError"));
    }

    #[test]
    fn test_from() {
        assert_eq!(eval_str("Array.from('abc').join()"), "a,b,c");
        assert_eq!(eval_str("Array.from({ length: 2, 0: 'x', 1: 'y' }).join()"), "x,y");
        assert_eq!(eval_str("Array.from([1, 2], function (x) { return x * 10; }).join()"), "10,20");
    }

    #[test]
    fn test_push_pop_shift_unshift() {
        assert_eq!(eval_str("var a = [1]; a.push(2, 3) + ':' + a.join()"), "3:1,2,3");
        assert_eq!(eval_str("var a = [1, 2]; a.pop() + ':' + a.length"), "2:1");
        assert_eq!(eval_str("var a = [1, 2, 3]; a.shift() + ':' + a.join()"), "1:2,3");
        assert_eq!(eval_str("var a = [3]; a.unshift(1, 2) + ':' + a.join()"), "3:1,2,3");
        assert_eq!(eval_str("var o = { length: 0 }; Array.prototype.push.call(o, 'a'); o.length + o[0]"), "1a");
    }

    #[test]
    fn test_splice() {
        assert_eq!(eval_str("var a = [1, 2, 3, 4]; a.splice(1, 2).join() + '|' + a.join()"), "2,3|1,4");
        assert_eq!(eval_str("var a = [1, 4]; a.splice(1, 0, 2, 3); a.join()"), "1,2,3,4");
        assert_eq!(eval_str("var a = [1, 2, 3]; a.splice(-1); a.join()"), "1,2");
    }

    #[test]
    fn test_higher_order() {
        assert_eq!(eval_str("[1, 2, 3].map(function (x) { return x * 2; }).join()"), "2,4,6");
        assert_eq!(eval_str("[1, 2, 3, 4].filter(function (x) { return x % 2; }).join()"), "1,3");
        assert_eq!(eval_str("[1, 2, 3].reduce(function (a, b) { return a + b; })"), "6");
        assert_eq!(eval_str("['a', 'b'].reduceRight(function (a, b) { return a + b; }, '')"), "ba");
        assert_eq!(eval_str("[1, 2].every(function (x) { return x > 0; }) + ',' + [1, 2].some(function (x) { return x > 1; })"), "true,true");
        assert_eq!(eval_str("[5, 12, 8].find(function (x) { return x > 6; })"), "12");
        assert_eq!(eval_str("[5, 12, 8].findLastIndex(function (x) { return x > 6; })"), "2");
        assert!(thrown("[].reduce(function () {})").starts_with("TypeError"));
    }

    #[test]
    fn test_holes_are_skipped() {
        assert_eq!(eval_str("var n = 0; [1, , 3].forEach(function () { n++; }); n"), "2");
        assert_eq!(eval_str("var a = [1, , 3].map(function (x) { return x; }); 1 in a"), "false");
        assert_eq!(eval_str("[1, , 3].indexOf(undefined) + ',' + [1, , 3].includes(undefined)"), "-1,true");
    }

    #[test]
    fn test_sort() {
        assert_eq!(eval_str("[10, 9, 1, 100].sort().join()"), "1,10,100,9");
        assert_eq!(eval_str("[10, 9, 1, 100].sort(function (a, b) { return a - b; }).join()"), "1,9,10,100");
        assert_eq!(eval_str("var a = [3, undefined, 1, , 2]; a.sort(); a.length + ':' + a.join() + ':' + (4 in a)"), "5:1,2,3,,:false");
        let stable = "var a = [{k: 1, v: 'a'}, {k: 0, v: 'b'}, {k: 1, v: 'c'}]; \
                      a.sort(function (x, y) { return x.k - y.k; }).map(function (x) { return x.v; }).join('')";
        assert_eq!(eval_str(stable), "bac");
        assert!(thrown("[2, 1].sort(function () { throw new Error('cmp'); })").contains("cmp"));
    }

    #[test]
    fn test_slice_concat_flat() {
        assert_eq!(eval_str("[1, 2, 3, 4].slice(1, -1).join()"), "2,3");
        assert_eq!(eval_str("[1].concat([2, 3], 4).join()"), "1,2,3,4");
        assert_eq!(eval_str("[1, [2, [3, [4]]]].flat(Infinity).join()"), "1,2,3,4");
        assert_eq!(eval_str("[1, 2].flatMap(function (x) { return [x, x]; }).join()"), "1,1,2,2");
    }

    #[test]
    fn test_misc_mutators() {
        assert_eq!(eval_str("[1, 2, 3].reverse().join()"), "3,2,1");
        assert_eq!(eval_str("new Array(3).fill(0).join()"), "0,0,0");
        assert_eq!(eval_str("[1, 2, 3, 4, 5].copyWithin(0, 3).join()"), "4,5,3,4,5");
        assert_eq!(eval_str("[1, 2, 3].at(-1)"), "3");
        assert_eq!(eval_str("[1, 2, 3].lastIndexOf(3, -2)"), "-1");
    }

    #[test]
    fn test_join_and_to_string() {
        assert_eq!(eval_str("[1, null, undefined, 'x'].join()"), "1,,,x");
        assert_eq!(eval_str("String([1, [2, 3]])"), "1,2,3");
        assert_eq!(eval_str("var a = [1]; a.push(a); a.join()"), "1,");
    }

    #[test]
    fn test_iterators() {
        assert_eq!(eval_str("var r = []; for (var k of ['a', 'b'].keys()) r.push(k); r.join()"), "0,1");
        assert_eq!(eval_str("var r = []; for (var e of ['a', 'b'].entries()) r.push(e.join(':')); r.join()"), "0:a,1:b");
        assert_eq!(eval_str("[][Symbol.iterator] === [].values"), "true");
    }
}
