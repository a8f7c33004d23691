//! Object built-in constructor and prototype methods.

use super::{Builder, arg};
use crate::error::{Result, type_error};
use crate::gc::ObjectRef;
use crate::runtime::object::{JsObject, ObjectKind, PropertyDescriptor, PropertyKey, PropertySlot};
use crate::runtime::string::JsString;
use crate::runtime::value::Value;
use crate::vm::VM;

pub(super) fn register(builder: &mut Builder<'_>) {
    let prototype = builder.intrinsics.object_prototype;
    let constructor = builder.constructor("Object", 1, object_call, Some(object_construct), prototype);

    builder.method(constructor, "keys", 1, keys);
    builder.method(constructor, "values", 1, values);
    builder.method(constructor, "entries", 1, entries);
    builder.method(constructor, "fromEntries", 1, from_entries);
    builder.method(constructor, "assign", 2, assign);
    builder.method(constructor, "create", 2, create);
    builder.method(constructor, "defineProperty", 3, define_property);
    builder.method(constructor, "defineProperties", 2, define_properties);
    builder.method(constructor, "getOwnPropertyDescriptor", 2, get_own_property_descriptor);
    builder.method(constructor, "getOwnPropertyDescriptors", 1, get_own_property_descriptors);
    builder.method(constructor, "getOwnPropertyNames", 1, get_own_property_names);
    builder.method(constructor, "getOwnPropertySymbols", 1, get_own_property_symbols);
    builder.method(constructor, "getPrototypeOf", 1, get_prototype_of);
    builder.method(constructor, "setPrototypeOf", 2, set_prototype_of);
    builder.method(constructor, "freeze", 1, freeze);
    builder.method(constructor, "isFrozen", 1, is_frozen);
    builder.method(constructor, "seal", 1, seal);
    builder.method(constructor, "isSealed", 1, is_sealed);
    builder.method(constructor, "preventExtensions", 1, prevent_extensions);
    builder.method(constructor, "isExtensible", 1, is_extensible);
    builder.method(constructor, "is", 2, is);

    builder.method(prototype, "hasOwnProperty", 1, has_own_property);
    builder.method(prototype, "isPrototypeOf", 1, is_prototype_of);
    builder.method(prototype, "propertyIsEnumerable", 1, property_is_enumerable);
    builder.method(prototype, "toString", 0, to_string);
    builder.method(prototype, "toLocaleString", 0, to_locale_string);
    builder.method(prototype, "valueOf", 0, value_of);
    builder.accessor(prototype, PropertyKey::from("__proto__"), proto_getter, Some(proto_setter));
}

// ============================================================================
// Constructor
// ============================================================================

/// Object(value)
fn object_call(vm: &mut VM, _this: &Value, args: &[Value]) -> Result<Value> {
    let value = arg(args, 0);
    if value.is_nullish() {
        return Ok(Value::Object(vm.new_object()));
    }
    Ok(Value::Object(vm.to_object(&value)?))
}

/// new Object(value)
fn object_construct(vm: &mut VM, args: &[Value], new_target: ObjectRef) -> Result<Value> {
    let fallback = vm.realm.intrinsics.object_prototype;
    let prototype = vm.prototype_from_constructor(new_target, fallback)?;
    if prototype != fallback {
        return Ok(Value::Object(vm.alloc(JsObject::ordinary(Some(prototype)))));
    }
    object_call(vm, &Value::Undefined, args)
}

fn require_object(vm: &VM, value: &Value, method: &str) -> Result<ObjectRef> {
    match value {
        Value::Object(object) => Ok(*object),
        other => type_error(format!("{method} called on non-object {}", vm.describe(other))),
    }
}

// ============================================================================
// Property enumeration
// ============================================================================

/// Object.keys(o)
fn keys(vm: &mut VM, _this: &Value, args: &[Value]) -> Result<Value> {
    let object = vm.to_object(&arg(args, 0))?;
    let keys = vm.enumerable_own_keys(object)?;
    let names = keys.iter().map(PropertyKey::to_value).collect();
    Ok(Value::Object(vm.new_array(names)))
}

/// Object.values(o)
fn values(vm: &mut VM, _this: &Value, args: &[Value]) -> Result<Value> {
    let target = arg(args, 0);
    let object = vm.to_object(&target)?;
    let mut values = Vec::new();
    for key in vm.enumerable_own_keys(object)? {
        values.push(vm.get(object, &key, &Value::Object(object))?);
    }
    Ok(Value::Object(vm.new_array(values)))
}

/// Object.entries(o)
fn entries(vm: &mut VM, _this: &Value, args: &[Value]) -> Result<Value> {
    let object = vm.to_object(&arg(args, 0))?;
    let mut entries = Vec::new();
    for key in vm.enumerable_own_keys(object)? {
        let value = vm.get(object, &key, &Value::Object(object))?;
        let pair = vm.new_array(vec![key.to_value(), value]);
        entries.push(Value::Object(pair));
    }
    Ok(Value::Object(vm.new_array(entries)))
}

/// Object.fromEntries(iterable)
fn from_entries(vm: &mut VM, _this: &Value, args: &[Value]) -> Result<Value> {
    let iterable = arg(args, 0);
    if iterable.is_nullish() {
        return type_error(format!("{} is not iterable", vm.describe(&iterable)));
    }
    let object = vm.new_object();
    for entry in vm.iterate_to_vec(&iterable)? {
        if !entry.is_object() {
            return type_error(format!("Iterator value {} is not an entry object", vm.describe(&entry)));
        }
        let key = vm.get_value(&entry, &PropertyKey::Index(0))?;
        let value = vm.get_value(&entry, &PropertyKey::Index(1))?;
        let key = vm.to_property_key(&key)?;
        vm.create_data_property(object, key, value)?;
    }
    Ok(Value::Object(object))
}

/// Object.assign(target, ...sources)
fn assign(vm: &mut VM, _this: &Value, args: &[Value]) -> Result<Value> {
    let target = vm.to_object(&arg(args, 0))?;
    let target_value = Value::Object(target);
    for source in args.iter().skip(1) {
        if source.is_nullish() {
            continue;
        }
        let from = vm.to_object(source)?;
        for key in vm.own_keys(from)? {
            if !vm.own_property(from, &key)?.is_some_and(|slot| slot.enumerable()) {
                continue;
            }
            let value = vm.get(from, &key, source)?;
            vm.set_value(&target_value, key, value, true)?;
        }
    }
    Ok(target_value)
}

/// Object.getOwnPropertyNames(o)
fn get_own_property_names(vm: &mut VM, _this: &Value, args: &[Value]) -> Result<Value> {
    let object = vm.to_object(&arg(args, 0))?;
    let names = vm
        .own_keys(object)?
        .iter()
        .filter(|key| !key.is_symbol())
        .map(PropertyKey::to_value)
        .collect();
    Ok(Value::Object(vm.new_array(names)))
}

/// Object.getOwnPropertySymbols(o)
fn get_own_property_symbols(vm: &mut VM, _this: &Value, args: &[Value]) -> Result<Value> {
    let object = vm.to_object(&arg(args, 0))?;
    let symbols = vm
        .own_keys(object)?
        .iter()
        .filter(|key| key.is_symbol())
        .map(PropertyKey::to_value)
        .collect();
    Ok(Value::Object(vm.new_array(symbols)))
}

// ============================================================================
// Descriptors
// ============================================================================

/// ToPropertyDescriptor.
pub fn to_property_descriptor(vm: &mut VM, value: &Value) -> Result<PropertyDescriptor> {
    let Value::Object(object) = value else {
        return type_error(format!("Property description must be an object: {}", vm.describe(value)));
    };
    let object = *object;
    let mut descriptor = PropertyDescriptor::default();
    let field = |vm: &mut VM, name: &str| -> Result<Option<Value>> {
        let key = PropertyKey::from(name);
        if vm.has_property(object, &key)? {
            Ok(Some(vm.get(object, &key, value)?))
        } else {
            Ok(None)
        }
    };
    descriptor.enumerable = field(vm, "enumerable")?.map(|v| v.to_boolean());
    descriptor.configurable = field(vm, "configurable")?.map(|v| v.to_boolean());
    descriptor.value = field(vm, "value")?;
    descriptor.writable = field(vm, "writable")?.map(|v| v.to_boolean());
    for (name, slot) in [("get", &mut descriptor.get), ("set", &mut descriptor.set)] {
        if let Some(function) = field(vm, name)? {
            *slot = match function {
                Value::Undefined => Some(None),
                Value::Object(f) if vm.is_callable(&function) => Some(Some(f)),
                other => return type_error(format!("{name}ter must be a function: {}", vm.describe(&other))),
            };
        }
    }
    if descriptor.is_accessor() && descriptor.is_data() {
        return type_error("Invalid property descriptor. Cannot both specify accessors and a value or writable attribute");
    }
    Ok(descriptor)
}

/// FromPropertyDescriptor.
pub fn from_property_descriptor(vm: &mut VM, slot: Option<PropertySlot>) -> Result<Value> {
    let Some(slot) = slot else {
        return Ok(Value::Undefined);
    };
    let object = vm.new_object();
    let attributes = slot.attributes();
    let function = |f: Option<ObjectRef>| f.map(Value::Object).unwrap_or_default();
    let fields = match slot {
        PropertySlot::Data { value, attributes } => {
            vec![("value", value), ("writable", Value::Boolean(attributes.writable))]
        }
        PropertySlot::Accessor { get, set, .. } => vec![("get", function(get)), ("set", function(set))],
    };
    let cell = vm.heap.object_mut(object)?;
    for (name, value) in fields {
        cell.insert_data(PropertyKey::from(name), value);
    }
    cell.insert_data(PropertyKey::from("enumerable"), Value::Boolean(attributes.enumerable));
    cell.insert_data(PropertyKey::from("configurable"), Value::Boolean(attributes.configurable));
    Ok(Value::Object(object))
}

/// Object.defineProperty(o, key, descriptor)
fn define_property(vm: &mut VM, _this: &Value, args: &[Value]) -> Result<Value> {
    let target = arg(args, 0);
    let object = require_object(vm, &target, "Object.defineProperty")?;
    let key = vm.to_property_key(&arg(args, 1))?;
    let descriptor = to_property_descriptor(vm, &arg(args, 2))?;
    vm.define_property_or_throw(object, key, descriptor)?;
    Ok(target)
}

/// Object.defineProperties(o, properties)
fn define_properties(vm: &mut VM, _this: &Value, args: &[Value]) -> Result<Value> {
    let target = arg(args, 0);
    let object = require_object(vm, &target, "Object.defineProperties")?;
    define_properties_from(vm, object, &arg(args, 1))?;
    Ok(target)
}

fn define_properties_from(vm: &mut VM, object: ObjectRef, properties: &Value) -> Result<()> {
    let source = vm.to_object(properties)?;
    let mut descriptors = Vec::new();
    for key in vm.own_keys(source)? {
        if !vm.own_property(source, &key)?.is_some_and(|slot| slot.enumerable()) {
            continue;
        }
        let value = vm.get(source, &key, properties)?;
        descriptors.push((key, to_property_descriptor(vm, &value)?));
    }
    for (key, descriptor) in descriptors {
        vm.define_property_or_throw(object, key, descriptor)?;
    }
    Ok(())
}

/// Object.getOwnPropertyDescriptor(o, key)
fn get_own_property_descriptor(vm: &mut VM, _this: &Value, args: &[Value]) -> Result<Value> {
    let object = vm.to_object(&arg(args, 0))?;
    let key = vm.to_property_key(&arg(args, 1))?;
    let slot = vm.own_property(object, &key)?;
    from_property_descriptor(vm, slot)
}

/// Object.getOwnPropertyDescriptors(o)
fn get_own_property_descriptors(vm: &mut VM, _this: &Value, args: &[Value]) -> Result<Value> {
    let object = vm.to_object(&arg(args, 0))?;
    let result = vm.new_object();
    for key in vm.own_keys(object)? {
        let slot = vm.own_property(object, &key)?;
        let descriptor = from_property_descriptor(vm, slot)?;
        vm.create_data_property(result, key, descriptor)?;
    }
    Ok(Value::Object(result))
}

// ============================================================================
// Prototypes and integrity
// ============================================================================

/// Object.create(proto, properties)
fn create(vm: &mut VM, _this: &Value, args: &[Value]) -> Result<Value> {
    let prototype = match arg(args, 0) {
        Value::Object(prototype) => Some(prototype),
        Value::Null => None,
        other => return type_error(format!("Object prototype may only be an Object or null: {}", vm.describe(&other))),
    };
    let object = vm.alloc(JsObject::ordinary(prototype));
    let properties = arg(args, 1);
    if !properties.is_undefined() {
        define_properties_from(vm, object, &properties)?;
    }
    Ok(Value::Object(object))
}

/// Object.getPrototypeOf(o)
fn get_prototype_of(vm: &mut VM, _this: &Value, args: &[Value]) -> Result<Value> {
    let object = vm.to_object(&arg(args, 0))?;
    Ok(vm.get_prototype_of(object)?.map(Value::Object).unwrap_or(Value::Null))
}

/// Object.setPrototypeOf(o, proto)
fn set_prototype_of(vm: &mut VM, _this: &Value, args: &[Value]) -> Result<Value> {
    let target = arg(args, 0);
    if target.is_nullish() {
        return type_error("Object.setPrototypeOf called on null or undefined");
    }
    let prototype = match arg(args, 1) {
        Value::Object(prototype) => Some(prototype),
        Value::Null => None,
        other => return type_error(format!("Object prototype may only be an Object or null: {}", vm.describe(&other))),
    };
    if let Value::Object(object) = target
        && !vm.set_prototype_of(object, prototype)?
    {
        return type_error("Cyclic __proto__ value or non-extensible object");
    }
    Ok(target)
}

/// Object.freeze(o)
fn freeze(vm: &mut VM, _this: &Value, args: &[Value]) -> Result<Value> {
    let target = arg(args, 0);
    if let Value::Object(object) = target {
        vm.heap.object_mut(object)?.seal(true);
    }
    Ok(target)
}

/// Object.isFrozen(o)
fn is_frozen(vm: &mut VM, _this: &Value, args: &[Value]) -> Result<Value> {
    Ok(Value::Boolean(match arg(args, 0) {
        Value::Object(object) => vm.heap.object(object)?.is_sealed(true),
        _ => true,
    }))
}

/// Object.seal(o)
fn seal(vm: &mut VM, _this: &Value, args: &[Value]) -> Result<Value> {
    let target = arg(args, 0);
    if let Value::Object(object) = target {
        vm.heap.object_mut(object)?.seal(false);
    }
    Ok(target)
}

/// Object.isSealed(o)
fn is_sealed(vm: &mut VM, _this: &Value, args: &[Value]) -> Result<Value> {
    Ok(Value::Boolean(match arg(args, 0) {
        Value::Object(object) => vm.heap.object(object)?.is_sealed(false),
        _ => true,
    }))
}

/// Object.preventExtensions(o)
fn prevent_extensions(vm: &mut VM, _this: &Value, args: &[Value]) -> Result<Value> {
    let target = arg(args, 0);
    if let Value::Object(object) = target {
        vm.heap.object_mut(object)?.extensible = false;
    }
    Ok(target)
}

/// Object.isExtensible(o)
fn is_extensible(vm: &mut VM, _this: &Value, args: &[Value]) -> Result<Value> {
    Ok(Value::Boolean(match arg(args, 0) {
        Value::Object(object) => vm.heap.object(object)?.extensible,
        _ => false,
    }))
}

/// Object.is(a, b)
fn is(_vm: &mut VM, _this: &Value, args: &[Value]) -> Result<Value> {
    Ok(Value::Boolean(arg(args, 0).same_value(&arg(args, 1))))
}

// ============================================================================
// Object.prototype
// ============================================================================

/// Object.prototype.hasOwnProperty(key)
fn has_own_property(vm: &mut VM, this: &Value, args: &[Value]) -> Result<Value> {
    let key = vm.to_property_key(&arg(args, 0))?;
    let object = vm.to_object(this)?;
    Ok(Value::Boolean(vm.own_property(object, &key)?.is_some()))
}

/// Object.prototype.isPrototypeOf(v)
fn is_prototype_of(vm: &mut VM, this: &Value, args: &[Value]) -> Result<Value> {
    let Value::Object(mut current) = arg(args, 0) else {
        return Ok(Value::Boolean(false));
    };
    let object = vm.to_object(this)?;
    while let Some(prototype) = vm.get_prototype_of(current)? {
        if prototype == object {
            return Ok(Value::Boolean(true));
        }
        current = prototype;
    }
    Ok(Value::Boolean(false))
}

/// Object.prototype.propertyIsEnumerable(key)
fn property_is_enumerable(vm: &mut VM, this: &Value, args: &[Value]) -> Result<Value> {
    let key = vm.to_property_key(&arg(args, 0))?;
    let object = vm.to_object(this)?;
    Ok(Value::Boolean(vm.own_property(object, &key)?.is_some_and(|slot| slot.enumerable())))
}

/// Object.prototype.toString()
pub fn to_string(vm: &mut VM, this: &Value, _args: &[Value]) -> Result<Value> {
    let object = match this {
        Value::Undefined => return Ok(Value::from("[object Undefined]")),
        Value::Null => return Ok(Value::from("[object Null]")),
        other => vm.to_object(other)?,
    };
    let builtin_tag = JsString::from(match &vm.heap.object(object)?.kind {
        ObjectKind::Array(_) => "Array",
        ObjectKind::Function(_) => "Function",
        ObjectKind::Error => "Error",
        ObjectKind::Boolean(_) => "Boolean",
        ObjectKind::Number(_) => "Number",
        ObjectKind::String(_) => "String",
        ObjectKind::RegExp(_) => "RegExp",
        ObjectKind::Arguments => "Arguments",
        ObjectKind::Date(_) => "Date",
        ObjectKind::Host(host) if host.0.is_callable() => "Function",
        ObjectKind::Host(host) => host.0.class_name(),
        _ => "Object",
    });
    let key = PropertyKey::Symbol(vm.realm.symbols.to_string_tag.clone());
    let tag = match vm.get(object, &key, this)? {
        Value::String(tag) => tag,
        _ => builtin_tag,
    };
    let tagged = JsString::from("[object ").concat(&tag).concat(&JsString::from("]"));
    Ok(Value::String(tagged))
}

/// Object.prototype.toLocaleString()
fn to_locale_string(vm: &mut VM, this: &Value, _args: &[Value]) -> Result<Value> {
    let method = vm.get_named(this, "toString")?;
    vm.call(&method, this, &[])
}

/// Object.prototype.valueOf()
fn value_of(vm: &mut VM, this: &Value, _args: &[Value]) -> Result<Value> {
    Ok(Value::Object(vm.to_object(this)?))
}

/// get Object.prototype.__proto__
fn proto_getter(vm: &mut VM, this: &Value, _args: &[Value]) -> Result<Value> {
    let object = vm.to_object(this)?;
    Ok(vm.get_prototype_of(object)?.map(Value::Object).unwrap_or(Value::Null))
}

/// set Object.prototype.__proto__
fn proto_setter(vm: &mut VM, this: &Value, args: &[Value]) -> Result<Value> {
    if this.is_nullish() {
        return type_error("Object.prototype.__proto__ called on null or undefined");
    }
    let prototype = match arg(args, 0) {
        Value::Object(prototype) => Some(prototype),
        Value::Null => None,
        _ => return Ok(Value::Undefined),
    };
    if let Value::Object(object) = this
        && !vm.set_prototype_of(*object, prototype)?
    {
        return type_error("Cyclic __proto__ value");
    }
    Ok(Value::Undefined)
}

#[cfg(test)]
mod tests {
    use crate::builtins::testing::{eval_str, thrown};

    #[test]
    fn test_keys_values_entries() {
        assert_eq!(eval_str("Object.keys({b: 1, a: 2, 1: 3}).join()"), "1,b,a");
        assert_eq!(eval_str("Object.values({a: 1, b: 2}).join()"), "1,2");
        assert_eq!(eval_str("JSON.stringify(Object.entries({a: 1}))"), "[[\"a\",1]]");
        assert_eq!(eval_str("Object.keys('ab').join()"), "0,1");
    }

    #[test]
    fn test_define_property() {
        let src = "var o = {}; Object.defineProperty(o, 'x', { value: 1 }); o.x = 2; \
                   var d = Object.getOwnPropertyDescriptor(o, 'x'); \
                   [o.x, d.writable, d.enumerable, d.configurable, Object.keys(o).length].join()";
        assert_eq!(eval_str(src), "1,false,false,false,0");
        assert_eq!(
            thrown("var o = {}; Object.defineProperty(o, 'x', { value: 1 }); Object.defineProperty(o, 'x', { value: 2 })"),
            "TypeError: Cannot redefine property: x"
        );
    }

    #[test]
    fn test_accessor_descriptor() {
        let src = "var o = {}; var seen; Object.defineProperty(o, 'x', { get: function () { return 7; }, \
                   set: function (v) { seen = v; }, enumerable: true }); o.x = 3; [o.x, seen].join()";
        assert_eq!(eval_str(src), "7,3");
        assert!(thrown("Object.defineProperty({}, 'x', { get: 1 })").starts_with("TypeError"));
    }

    #[test]
    fn test_create_and_prototypes() {
        assert_eq!(eval_str("var p = { hi: 'x' }; var o = Object.create(p); o.hi + (Object.getPrototypeOf(o) === p)"), "xtrue");
        assert_eq!(eval_str("Object.getPrototypeOf(Object.create(null))"), "null");
        assert_eq!(eval_str("var o = {}; o.__proto__ = Array.prototype; o instanceof Array"), "true");
        assert_eq!(eval_str("({ __proto__: null }).toString"), "undefined");
        assert!(thrown("var a = {}; var b = Object.create(a); Object.setPrototypeOf(a, b)").starts_with("TypeError"));
    }

    #[test]
    fn test_freeze_seal() {
        let src = "'use strict'; var o = Object.freeze({ a: 1 }); \
                   try { o.a = 2; } catch (e) { e.name + ':' + Object.isFrozen(o) + ':' + Object.isSealed(o) }";
        assert_eq!(eval_str(src), "TypeError:true:true");
        assert_eq!(eval_str("var o = Object.seal({ a: 1 }); o.a = 2; delete o.a; o.b = 1; [o.a, o.b, Object.isFrozen(o)].join()"), "2,,false");
        assert_eq!(eval_str("var o = Object.preventExtensions({}); o.x = 1; [o.x, Object.isExtensible(o)].join()"), ",false");
    }

    #[test]
    fn test_assign_and_from_entries() {
        assert_eq!(eval_str("JSON.stringify(Object.assign({ a: 1 }, { b: 2 }, null, { a: 3 }))"), "{\"a\":3,\"b\":2}");
        assert_eq!(eval_str("JSON.stringify(Object.fromEntries([['a', 1], ['b', 2]]))"), "{\"a\":1,\"b\":2}");
    }

    #[test]
    fn test_prototype_methods() {
        assert_eq!(eval_str("({ a: 1 }).hasOwnProperty('a') && !({}).hasOwnProperty('toString')"), "true");
        assert_eq!(eval_str("Object.prototype.isPrototypeOf([])"), "true");
        assert_eq!(eval_str("[].propertyIsEnumerable('length')"), "false");
        assert_eq!(eval_str("Object.prototype.toString.call([])"), "[object Array]");
        assert_eq!(eval_str("Object.prototype.toString.call(null)"), "[object Null]");
        assert_eq!(eval_str("var o = {}; o[Symbol.toStringTag] = 'Custom'; String(o)"), "[object Custom]");
        assert_eq!(eval_str("Object.is(NaN, NaN) + ',' + Object.is(0, -0)"), "true,false");
    }
}
