//! Object operations: allocation, property access along the prototype chain,
//! definitions, deletion and key enumeration.
//!
//! Accessors are always invoked with the receiver of the original access,
//! which is not necessarily the object the accessor was found on.

use std::sync::Arc;

use rustc_hash::FxHashSet;

use super::VM;
use super::conversions::to_length;
use crate::error::{Result, range_error, type_error};
use crate::gc::ObjectRef;
use crate::runtime::context::ErrorType;
use crate::runtime::function::{Callable, NativeConstructor, NativeFn, NativeFunction};
use crate::runtime::object::{
    Attributes, JsObject, ObjectKind, PropertyDescriptor, PropertyKey, PropertySlot,
};
use crate::runtime::string::JsString;
use crate::runtime::value::Value;

/// Longest prototype chain a lookup follows.
pub const MAX_PROTOTYPE_CHAIN: usize = 10_000;

impl VM {
    // ========================================================================
    // Allocation
    // ========================================================================

    /// Allocates an object.
    pub fn alloc(&mut self, object: JsObject) -> ObjectRef {
        self.heap.alloc_object(object)
    }

    /// Allocates a plain object inheriting from `Object.prototype`.
    pub fn new_object(&mut self) -> ObjectRef {
        let prototype = self.realm.intrinsics.object_prototype;
        self.alloc(JsObject::ordinary(Some(prototype)))
    }

    /// Allocates an array holding `elements`.
    pub fn new_array(&mut self, elements: Vec<Value>) -> ObjectRef {
        let prototype = self.realm.intrinsics.array_prototype;
        self.alloc(JsObject::array(Some(prototype), elements))
    }

    /// Allocates a native function object.
    pub fn new_native_function(
        &mut self,
        name: &str,
        length: u32,
        call: NativeFn,
        construct: Option<NativeConstructor>,
    ) -> ObjectRef {
        let prototype = self.realm.intrinsics.function_prototype;
        let mut function = JsObject::with_kind(
            Some(prototype),
            ObjectKind::Function(Callable::Native(NativeFunction {
                name: Arc::from(name),
                call,
                construct,
            })),
        );
        function.insert(
            PropertyKey::from("length"),
            PropertySlot::data(Value::from(length), Attributes::CONFIGURABLE),
        );
        function.insert(
            PropertyKey::from("name"),
            PropertySlot::data(Value::from(name), Attributes::CONFIGURABLE),
        );
        self.alloc(function)
    }

    /// Allocates an error object of `kind`. Location properties come from the
    /// running frame.
    pub fn new_error(&mut self, kind: ErrorType, message: &str) -> ObjectRef {
        let prototype = self.realm.intrinsics.error_prototype(kind);
        let mut error = JsObject::with_kind(Some(prototype), ObjectKind::Error);
        if !message.is_empty() {
            error.insert_hidden(PropertyKey::from("message"), Value::from(message));
        }
        let location = self.frames.last().map(|frame| {
            let url = frame.code.source.url.clone().unwrap_or_else(|| "<anonymous>".to_string());
            (url, frame.current_line())
        });
        let header = if message.is_empty() {
            kind.name().to_string()
        } else {
            format!("{}: {message}", kind.name())
        };
        match location {
            Some((url, line)) => {
                let line = line.unwrap_or(0);
                error.insert_hidden(PropertyKey::from("fileName"), Value::from(url.as_str()));
                error.insert_hidden(PropertyKey::from("lineNumber"), Value::from(line));
                error.insert_hidden(
                    PropertyKey::from("stack"),
                    Value::from(format!("{header}\n    at {url}:{line}")),
                );
            }
            None => error.insert_hidden(PropertyKey::from("stack"), Value::from(header)),
        }
        self.alloc(error)
    }

    /// `{ value, done }`
    pub fn iter_result(&mut self, value: Value, done: bool) -> Value {
        let object = self.new_object();
        if let Ok(result) = self.heap.object_mut(object) {
            result.insert_data(PropertyKey::from("value"), value);
            result.insert_data(PropertyKey::from("done"), Value::Boolean(done));
        }
        Value::Object(object)
    }

    /// The elements of an array as a vector, reading through `get` so holes
    /// and inherited elements behave as in scripts.
    pub fn array_like_to_vec(&mut self, value: &Value) -> Result<Vec<Value>> {
        let object = self.to_object(value)?;
        if let Some(data) = self.heap.object(object)?.array_data()
            && !data.sparse
            && data.elements.len() == data.length as usize
            && data.elements.iter().all(|v| !matches!(v, Value::Empty))
        {
            return Ok(data.elements.clone());
        }
        let length = self.length_of_array_like(object)?;
        let mut values = Vec::with_capacity(length.min(1 << 16) as usize);
        for index in 0..length {
            values.push(self.get(object, &PropertyKey::from_number(index as f64), value)?);
        }
        Ok(values)
    }

    // ========================================================================
    // Property access
    // ========================================================================

    /// `[[Get]]`: looks `key` up along the prototype chain of `object`.
    pub fn get(&mut self, object: ObjectRef, key: &PropertyKey, receiver: &Value) -> Result<Value> {
        let mut current = Some(object);
        let mut depth = 0;
        while let Some(target) = current {
            depth += 1;
            if depth > MAX_PROTOTYPE_CHAIN {
                return range_error("Maximum prototype chain length exceeded");
            }
            if let ObjectKind::Host(host) = &self.heap.object(target)?.kind {
                let host = host.0.clone();
                if let Some(value) = host.get(self, key)? {
                    return Ok(value);
                }
            }
            let cell = self.heap.object(target)?;
            match cell.own_property(key) {
                Some(PropertySlot::Data { value, .. }) => return Ok(value),
                Some(PropertySlot::Accessor { get, .. }) => {
                    return match get {
                        Some(getter) => self.call(&Value::Object(getter), receiver, &[]),
                        None => Ok(Value::Undefined),
                    };
                }
                None => current = cell.prototype,
            }
        }
        Ok(Value::Undefined)
    }

    /// Property read on any value; primitives read through their prototype.
    pub fn get_value(&mut self, base: &Value, key: &PropertyKey) -> Result<Value> {
        let intrinsics = &self.realm.intrinsics;
        let prototype = match base {
            Value::Object(object) => return self.get(*object, key, base),
            Value::String(s) => {
                match key {
                    PropertyKey::Index(index) => {
                        if let Some(unit) = s.get(*index as usize) {
                            return Ok(Value::String(JsString::from_units(&[unit])));
                        }
                    }
                    PropertyKey::String(name) if name.eq_str("length") => {
                        return Ok(Value::from(s.len()));
                    }
                    _ => {}
                }
                intrinsics.string_prototype
            }
            Value::Number(_) => intrinsics.number_prototype,
            Value::Boolean(_) => intrinsics.boolean_prototype,
            Value::Symbol(_) => intrinsics.symbol_prototype,
            Value::BigInt(_) => intrinsics.bigint_prototype,
            Value::Undefined | Value::Null | Value::Empty => {
                return type_error(format!("Cannot read properties of {base} (reading '{key}')"));
            }
        };
        self.get(prototype, key, base)
    }

    /// Reads a named property of any value.
    pub fn get_named(&mut self, base: &Value, name: &str) -> Result<Value> {
        self.get_value(base, &PropertyKey::from(name))
    }

    /// `[[Set]]` (OrdinarySet). Returns `false` when the assignment is
    /// rejected; the caller decides whether that throws.
    pub fn set(&mut self, object: ObjectRef, key: PropertyKey, value: Value, receiver: &Value) -> Result<bool> {
        let mut current = Some(object);
        let mut depth = 0;
        while let Some(target) = current {
            depth += 1;
            if depth > MAX_PROTOTYPE_CHAIN {
                return range_error("Maximum prototype chain length exceeded");
            }
            if let ObjectKind::Host(host) = &self.heap.object(target)?.kind {
                let host = host.0.clone();
                if host.set(self, &key, value.clone())? {
                    return Ok(true);
                }
            }
            let cell = self.heap.object(target)?;
            match cell.own_property(&key) {
                Some(PropertySlot::Data { attributes, .. }) => {
                    if !attributes.writable {
                        return Ok(false);
                    }
                    break;
                }
                Some(PropertySlot::Accessor { set, .. }) => {
                    return match set {
                        Some(setter) => {
                            self.call(&Value::Object(setter), receiver, &[value])?;
                            Ok(true)
                        }
                        None => Ok(false),
                    };
                }
                None => current = cell.prototype,
            }
        }

        let Value::Object(receiver) = receiver else {
            return Ok(false);
        };
        let receiver = *receiver;
        if key.is("length") && self.heap.object(receiver)?.is_array() {
            let number = self.to_number(&value)?;
            let length = super::conversions::to_uint32(number);
            if length as f64 != number {
                return range_error("Invalid array length");
            }
            return Ok(self.heap.object_mut(receiver)?.set_array_length(length));
        }
        let cell = self.heap.object_mut(receiver)?;
        match cell.own_property(&key) {
            Some(PropertySlot::Accessor { .. }) => Ok(false),
            Some(PropertySlot::Data { attributes, .. }) if !attributes.writable => Ok(false),
            _ => Ok(cell.write_own(key, value)),
        }
    }

    /// Assignment `base[key] = value`, throwing in strict code when the
    /// assignment is rejected.
    pub fn set_value(&mut self, base: &Value, key: PropertyKey, value: Value, strict: bool) -> Result<()> {
        let intrinsics = &self.realm.intrinsics;
        let prototype = match base {
            Value::Object(object) => {
                let described = if strict { Some(key.clone()) } else { None };
                if !self.set(*object, key, value, base)?
                    && let Some(key) = described
                {
                    return type_error(format!("Cannot assign to read only property '{key}' of object"));
                }
                return Ok(());
            }
            Value::Undefined | Value::Null | Value::Empty => {
                return type_error(format!("Cannot set properties of {base} (setting '{key}')"));
            }
            Value::String(_) => intrinsics.string_prototype,
            Value::Number(_) => intrinsics.number_prototype,
            Value::Boolean(_) => intrinsics.boolean_prototype,
            Value::Symbol(_) => intrinsics.symbol_prototype,
            Value::BigInt(_) => intrinsics.bigint_prototype,
        };
        let described = key.to_string();
        if !self.set(prototype, key, value, base)? && strict {
            return type_error(format!("Cannot create property '{described}' on {}", self.type_of(base)));
        }
        Ok(())
    }

    /// Sets a named property, throwing when rejected.
    pub fn put(&mut self, object: ObjectRef, name: &str, value: Value) -> Result<()> {
        self.set_value(&Value::Object(object), PropertyKey::from(name), value, true)
    }

    /// The own property of `object`, asking host objects through their trait.
    pub fn own_property(&mut self, object: ObjectRef, key: &PropertyKey) -> Result<Option<PropertySlot>> {
        if let ObjectKind::Host(host) = &self.heap.object(object)?.kind {
            let host = host.0.clone();
            if let Some(value) = host.get(self, key)? {
                return Ok(Some(PropertySlot::data(value, Attributes::ALL)));
            }
        }
        Ok(self.heap.object(object)?.own_property(key))
    }

    /// `[[DefineOwnProperty]]`, throwing when rejected.
    pub fn define_property_or_throw(
        &mut self,
        object: ObjectRef,
        key: PropertyKey,
        descriptor: PropertyDescriptor,
    ) -> Result<()> {
        let described = key.to_string();
        if !self.heap.object_mut(object)?.define_own(key, descriptor) {
            return type_error(format!("Cannot redefine property: {described}"));
        }
        Ok(())
    }

    /// CreateDataProperty: an enumerable, writable, configurable property.
    pub fn create_data_property(&mut self, object: ObjectRef, key: PropertyKey, value: Value) -> Result<bool> {
        Ok(self
            .heap
            .object_mut(object)?
            .define_own(key, PropertyDescriptor::data(value, Attributes::ALL)))
    }

    /// `[[Delete]]`.
    pub fn delete_property(&mut self, object: ObjectRef, key: &PropertyKey) -> Result<bool> {
        Ok(self.heap.object_mut(object)?.delete_own(key))
    }

    /// `[[HasProperty]]`: own or inherited.
    pub fn has_property(&mut self, object: ObjectRef, key: &PropertyKey) -> Result<bool> {
        let mut current = Some(object);
        let mut depth = 0;
        while let Some(target) = current {
            depth += 1;
            if depth > MAX_PROTOTYPE_CHAIN {
                return range_error("Maximum prototype chain length exceeded");
            }
            if self.own_property(target, key)?.is_some() {
                return Ok(true);
            }
            current = self.heap.object(target)?.prototype;
        }
        Ok(false)
    }

    /// Own property keys in enumeration order, host keys included.
    pub fn own_keys(&mut self, object: ObjectRef) -> Result<Vec<PropertyKey>> {
        let cell = self.heap.object(object)?;
        let mut keys = cell.own_keys();
        if let ObjectKind::Host(host) = &cell.kind {
            for key in host.0.keys() {
                if !keys.contains(&key) {
                    keys.push(key);
                }
            }
        }
        Ok(keys)
    }

    /// Own enumerable string keys, as used by `Object.keys` and spreads.
    pub fn enumerable_own_keys(&mut self, object: ObjectRef) -> Result<Vec<PropertyKey>> {
        let keys = self.own_keys(object)?;
        let mut enumerable = Vec::with_capacity(keys.len());
        for key in keys {
            if key.is_symbol() {
                continue;
            }
            if self.own_property(object, &key)?.is_some_and(|slot| slot.enumerable()) {
                enumerable.push(key);
            }
        }
        Ok(enumerable)
    }

    /// Keys visited by `for-in`: enumerable string keys of the object and its
    /// prototypes, each name once, shadowed names skipped.
    pub fn for_in_keys(&mut self, object: ObjectRef) -> Result<Vec<PropertyKey>> {
        let mut seen: FxHashSet<PropertyKey> = FxHashSet::default();
        let mut keys = Vec::new();
        let mut current = Some(object);
        let mut depth = 0;
        while let Some(target) = current {
            depth += 1;
            if depth > MAX_PROTOTYPE_CHAIN {
                return range_error("Maximum prototype chain length exceeded");
            }
            for key in self.own_keys(target)? {
                if key.is_symbol() || !seen.insert(key.clone()) {
                    continue;
                }
                if self.own_property(target, &key)?.is_some_and(|slot| slot.enumerable()) {
                    keys.push(key);
                }
            }
            current = self.heap.object(target)?.prototype;
        }
        Ok(keys)
    }

    /// Copies own enumerable properties of `source` onto `target`, skipping
    /// `excluded`. Nullish sources copy nothing.
    pub fn copy_data_properties(&mut self, target: ObjectRef, source: &Value, excluded: &[PropertyKey]) -> Result<()> {
        if source.is_nullish() {
            return Ok(());
        }
        let source_object = self.to_object(source)?;
        for key in self.own_keys(source_object)? {
            if excluded.contains(&key) {
                continue;
            }
            if !self.own_property(source_object, &key)?.is_some_and(|slot| slot.enumerable()) {
                continue;
            }
            let value = self.get(source_object, &key, source)?;
            self.create_data_property(target, key, value)?;
        }
        Ok(())
    }

    // ========================================================================
    // Functions
    // ========================================================================

    /// Whether a value has a `[[Call]]` slot.
    pub fn is_callable(&self, value: &Value) -> bool {
        match value {
            Value::Object(object) => self.heap.object(*object).is_ok_and(|cell| cell.is_callable()),
            _ => false,
        }
    }

    /// Whether a value can be used with `new`.
    pub fn is_constructor(&self, value: &Value) -> bool {
        let mut current = value.as_object();
        let mut depth = 0;
        while let Some(object) = current {
            depth += 1;
            let Ok(cell) = self.heap.object(object) else {
                return false;
            };
            match &cell.kind {
                ObjectKind::Function(Callable::Bound(bound)) if depth < MAX_PROTOTYPE_CHAIN => {
                    current = Some(bound.target);
                }
                ObjectKind::Function(callable) => return callable.is_constructor(),
                _ => return false,
            }
        }
        false
    }

    /// GetMethod: `undefined` and `null` mean absent, anything else must be
    /// callable.
    pub fn get_method(&mut self, base: &Value, key: &PropertyKey) -> Result<Option<Value>> {
        let method = self.get_value(base, key)?;
        if method.is_nullish() {
            return Ok(None);
        }
        if !self.is_callable(&method) {
            return type_error(format!("{key} is not a function"));
        }
        Ok(Some(method))
    }

    /// LengthOfArrayLike.
    pub fn length_of_array_like(&mut self, object: ObjectRef) -> Result<u64> {
        if let Some(data) = self.heap.object(object)?.array_data() {
            return Ok(data.length as u64);
        }
        let length = self.get(object, &PropertyKey::from("length"), &Value::Object(object))?;
        let length = self.to_number(&length)?;
        Ok(to_length(length) as u64)
    }

    /// `value instanceof constructor`.
    pub fn instance_of(&mut self, value: &Value, constructor: &Value) -> Result<bool> {
        if !constructor.is_object() {
            return type_error("Right-hand side of 'instanceof' is not an object");
        }
        let key = PropertyKey::Symbol(self.realm.symbols.has_instance.clone());
        if let Some(handler) = self.get_method(constructor, &key)? {
            let result = self.call(&handler, constructor, std::slice::from_ref(value))?;
            return Ok(result.to_boolean());
        }
        if !self.is_callable(constructor) {
            return type_error("Right-hand side of 'instanceof' is not callable");
        }
        self.ordinary_has_instance(constructor, value)
    }

    /// OrdinaryHasInstance.
    pub fn ordinary_has_instance(&mut self, constructor: &Value, value: &Value) -> Result<bool> {
        let Some(function) = constructor.as_object() else {
            return Ok(false);
        };
        if let ObjectKind::Function(Callable::Bound(bound)) = &self.heap.object(function)?.kind {
            let target = Value::Object(bound.target);
            return self.instance_of(value, &target);
        }
        let Value::Object(object) = value else {
            return Ok(false);
        };
        let prototype = self.get(function, &PropertyKey::from("prototype"), constructor)?;
        let Value::Object(prototype) = prototype else {
            return type_error("Function has non-object prototype in instanceof check");
        };
        let mut current = self.heap.object(*object)?.prototype;
        let mut depth = 0;
        while let Some(candidate) = current {
            if candidate == prototype {
                return Ok(true);
            }
            depth += 1;
            if depth > MAX_PROTOTYPE_CHAIN {
                return range_error("Maximum prototype chain length exceeded");
            }
            current = self.heap.object(candidate)?.prototype;
        }
        Ok(false)
    }

    // ========================================================================
    // Prototypes
    // ========================================================================

    /// `[[GetPrototypeOf]]`.
    pub fn get_prototype_of(&self, object: ObjectRef) -> Result<Option<ObjectRef>> {
        Ok(self.heap.object(object)?.prototype)
    }

    /// `[[SetPrototypeOf]]`; `false` for non-extensible objects and cycles.
    pub fn set_prototype_of(&mut self, object: ObjectRef, prototype: Option<ObjectRef>) -> Result<bool> {
        let cell = self.heap.object(object)?;
        if cell.prototype == prototype {
            return Ok(true);
        }
        if !cell.extensible {
            return Ok(false);
        }
        let mut current = prototype;
        let mut depth = 0;
        while let Some(candidate) = current {
            if candidate == object {
                return Ok(false);
            }
            depth += 1;
            if depth > MAX_PROTOTYPE_CHAIN {
                return Ok(false);
            }
            current = self.heap.object(candidate)?.prototype;
        }
        self.heap.object_mut(object)?.prototype = prototype;
        Ok(true)
    }

    /// The `prototype` property of `constructor` when it is an object,
    /// otherwise `fallback`.
    pub fn prototype_from_constructor(&mut self, constructor: ObjectRef, fallback: ObjectRef) -> Result<ObjectRef> {
        let prototype = self.get(
            constructor,
            &PropertyKey::from("prototype"),
            &Value::Object(constructor),
        )?;
        Ok(prototype.as_object().unwrap_or(fallback))
    }

    /// A short description of a value for error messages.
    pub fn describe(&self, value: &Value) -> String {
        match value {
            Value::String(s) => format!("\"{s}\""),
            Value::Object(object) => match self.heap.object(*object).map(|cell| &cell.kind) {
                Ok(ObjectKind::Function(Callable::Native(native))) => format!("function {}", native.name),
                Ok(ObjectKind::Function(Callable::Script(script))) => format!("function {}", script.code.name),
                Ok(ObjectKind::Function(_)) => "function".to_string(),
                Ok(ObjectKind::Array(_)) => "array".to_string(),
                _ => "object".to_string(),
            },
            Value::Symbol(symbol) => symbol.to_string(),
            other => other.to_string(),
        }
    }
}
