//! The `JSON` namespace.
//!
//! `JSON.parse` reads text with `serde_json` (key order preserved, numbers
//! kept as written) and converts the tree into script values.
//! `JSON.stringify` walks script values and quotes strings by code unit, so
//! lone surrogates come out as `\uXXXX` escapes.

use super::{Builder, arg};
use crate::error::{Error, Result, type_error};
use crate::gc::ObjectRef;
use crate::runtime::object::{ObjectKind, PropertyKey};
use crate::runtime::string::JsString;
use crate::runtime::value::{Value, number_to_string};
use crate::vm::VM;

pub(super) fn register(builder: &mut Builder<'_>) {
    let json = builder.namespace("JSON");
    builder.method(json, "parse", 2, parse);
    builder.method(json, "stringify", 3, stringify);
}

// ============================================================================
// JSON.parse
// ============================================================================

/// JSON.parse(text, reviver)
fn parse(vm: &mut VM, _this: &Value, args: &[Value]) -> Result<Value> {
    let text = vm.to_rust_string(&arg(args, 0))?;
    let tree: serde_json::Value = match serde_json::from_str(&text) {
        Ok(tree) => tree,
        Err(e) => return Err(vm.syntax_error(format!("JSON.parse: {e}"))),
    };
    let value = from_json(vm, &tree)?;

    let reviver = arg(args, 1);
    if !vm.is_callable(&reviver) {
        return Ok(value);
    }
    let root = vm.new_object();
    vm.create_data_property(root, PropertyKey::from(""), value)?;
    internalize(vm, root, PropertyKey::from(""), &reviver)
}

fn from_json(vm: &mut VM, tree: &serde_json::Value) -> Result<Value> {
    Ok(match tree {
        serde_json::Value::Null => Value::Null,
        serde_json::Value::Bool(b) => Value::Boolean(*b),
        serde_json::Value::Number(n) => Value::Number(json_number(n)),
        serde_json::Value::String(s) => Value::from(s.as_str()),
        serde_json::Value::Array(items) => {
            let mut elements = Vec::with_capacity(items.len());
            for item in items {
                elements.push(from_json(vm, item)?);
            }
            Value::Object(vm.new_array(elements))
        }
        serde_json::Value::Object(map) => {
            let object = vm.new_object();
            for (key, item) in map {
                let item = from_json(vm, item)?;
                vm.create_data_property(object, PropertyKey::from(key.as_str()), item)?;
            }
            Value::Object(object)
        }
    })
}

/// The number a JSON numeral denotes. Magnitudes beyond `f64` round to an
/// infinity, as in a numeric literal.
fn json_number(n: &serde_json::Number) -> f64 {
    n.as_f64()
        .or_else(|| n.to_string().parse::<f64>().ok())
        .unwrap_or(f64::NAN)
}

/// InternalizeJSONProperty: applies the reviver bottom-up.
fn internalize(vm: &mut VM, holder: ObjectRef, name: PropertyKey, reviver: &Value) -> Result<Value> {
    let holder_value = Value::Object(holder);
    let value = vm.get(holder, &name, &holder_value)?;
    if let Value::Object(object) = value {
        let keys = if vm.heap.object(object)?.is_array() {
            let length = vm.length_of_array_like(object)?;
            (0..length).map(|index| PropertyKey::from_number(index as f64)).collect()
        } else {
            vm.enumerable_own_keys(object)?
                .into_iter()
                .filter(|key| !key.is_symbol())
                .collect::<Vec<_>>()
        };
        for key in keys {
            let revived = vm.reenter(|vm| internalize(vm, object, key.clone(), reviver))?;
            if revived.is_undefined() {
                vm.delete_property(object, &key)?;
            } else {
                vm.create_data_property(object, key, revived)?;
            }
        }
    }
    let value = vm.get(holder, &name, &holder_value)?;
    vm.call(reviver, &holder_value, &[name.to_value(), value])
}

// ============================================================================
// JSON.stringify
// ============================================================================

struct Serializer {
    replacer: Option<Value>,
    property_list: Option<Vec<PropertyKey>>,
    gap: String,
    indent: String,
    stack: Vec<ObjectRef>,
}

/// JSON.stringify(value, replacer, space)
fn stringify(vm: &mut VM, _this: &Value, args: &[Value]) -> Result<Value> {
    let replacer = arg(args, 1);
    let mut serializer = Serializer {
        replacer: None,
        property_list: None,
        gap: gap(vm, &arg(args, 2))?,
        indent: String::new(),
        stack: Vec::new(),
    };
    if vm.is_callable(&replacer) {
        serializer.replacer = Some(replacer);
    } else if let Value::Object(list) = replacer
        && vm.heap.object(list)?.is_array()
    {
        serializer.property_list = Some(property_list(vm, list)?);
    }

    let wrapper = vm.new_object();
    vm.create_data_property(wrapper, PropertyKey::from(""), arg(args, 0))?;
    match serializer.property(vm, wrapper, PropertyKey::from(""))? {
        Some(text) => Ok(Value::from(text)),
        None => Ok(Value::Undefined),
    }
}

/// The indentation unit from the `space` argument.
fn gap(vm: &mut VM, space: &Value) -> Result<String> {
    let space = match space {
        Value::Object(object) => unwrap_primitive(vm, *object)?.unwrap_or_else(|| space.clone()),
        _ => space.clone(),
    };
    Ok(match space {
        Value::Number(n) => " ".repeat(n.clamp(0.0, 10.0) as usize),
        Value::String(s) => s.slice(0, 10).to_std_string_lossy(),
        _ => String::new(),
    })
}

/// The allow-list form of the replacer: strings and numbers, deduplicated.
fn property_list(vm: &mut VM, list: ObjectRef) -> Result<Vec<PropertyKey>> {
    let mut keys: Vec<PropertyKey> = Vec::new();
    for item in vm.array_like_to_vec(&Value::Object(list))? {
        let name = match &item {
            Value::String(s) => Some(s.clone()),
            Value::Number(_) => Some(vm.to_string(&item)?),
            Value::Object(object) => match unwrap_primitive(vm, *object)? {
                Some(primitive @ (Value::String(_) | Value::Number(_))) => Some(vm.to_string(&primitive)?),
                _ => None,
            },
            _ => None,
        };
        if let Some(name) = name {
            let key = PropertyKey::from_string(name);
            if !keys.contains(&key) {
                keys.push(key);
            }
        }
    }
    Ok(keys)
}

/// The primitive inside a Number, String, Boolean or BigInt wrapper.
fn unwrap_primitive(vm: &VM, object: ObjectRef) -> Result<Option<Value>> {
    Ok(match &vm.heap.object(object)?.kind {
        ObjectKind::Number(n) => Some(Value::Number(*n)),
        ObjectKind::String(s) => Some(Value::String(s.clone())),
        ObjectKind::Boolean(b) => Some(Value::Boolean(*b)),
        ObjectKind::BigInt(n) => Some(Value::BigInt(n.clone())),
        _ => None,
    })
}

/// QuoteJSONString: escapes by code unit; lone surrogates become `\uXXXX`.
fn quote(s: &JsString) -> String {
    let mut out = String::with_capacity(s.len() + 2);
    out.push('"');
    for decoded in char::decode_utf16(s.as_units().iter().copied()) {
        match decoded {
            Ok('"') => out.push_str("\\\""),
            Ok('\\') => out.push_str("\\\\"),
            Ok('\u{08}') => out.push_str("\\b"),
            Ok('\u{0C}') => out.push_str("\\f"),
            Ok('\n') => out.push_str("\\n"),
            Ok('\r') => out.push_str("\\r"),
            Ok('\t') => out.push_str("\\t"),
            Ok(c) if (c as u32) < 0x20 => out.push_str(&format!("\\u{:04x}", c as u32)),
            Ok(c) => out.push(c),
            Err(error) => out.push_str(&format!("\\u{:04x}", error.unpaired_surrogate())),
        }
    }
    out.push('"');
    out
}

impl Serializer {
    /// SerializeJSONProperty; `None` for values JSON cannot represent.
    fn property(&mut self, vm: &mut VM, holder: ObjectRef, key: PropertyKey) -> Result<Option<String>> {
        let holder_value = Value::Object(holder);
        let mut value = vm.get(holder, &key, &holder_value)?;
        if matches!(value, Value::Object(_) | Value::BigInt(_)) {
            let to_json = vm.get_named(&value, "toJSON")?;
            if vm.is_callable(&to_json) {
                value = vm.call(&to_json, &value, &[key.to_value()])?;
            }
        }
        if let Some(replacer) = self.replacer.clone() {
            value = vm.call(&replacer, &holder_value, &[key.to_value(), value])?;
        }
        if let Value::Object(object) = value
            && let Some(primitive) = unwrap_primitive(vm, object)?
        {
            value = primitive;
        }

        Ok(match value {
            Value::Null => Some("null".to_string()),
            Value::Boolean(b) => Some(b.to_string()),
            Value::String(s) => Some(quote(&s)),
            Value::Number(n) if n.is_finite() => Some(number_to_string(n)),
            Value::Number(_) => Some("null".to_string()),
            Value::BigInt(_) => return type_error("Do not know how to serialize a BigInt"),
            Value::Object(object) if vm.is_callable(&Value::Object(object)) => None,
            Value::Object(object) if vm.heap.object(object)?.is_array() => Some(self.array(vm, object)?),
            Value::Object(object) => Some(self.object(vm, object)?),
            _ => None,
        })
    }

    fn enter(&mut self, vm: &VM, object: ObjectRef) -> Result<String> {
        if self.stack.contains(&object) {
            return type_error("Converting circular structure to JSON");
        }
        if self.stack.len() >= vm.config.max_native_depth {
            return Err(Error::StackOverflow);
        }
        self.stack.push(object);
        let stepback = self.indent.clone();
        self.indent.push_str(&self.gap);
        Ok(stepback)
    }

    fn leave(&mut self, stepback: String) {
        self.stack.pop();
        self.indent = stepback;
    }

    /// Joins serialized members the way the gap asks for.
    fn wrap(&self, open: char, close: char, members: &[String], stepback: &str) -> String {
        if members.is_empty() {
            return format!("{open}{close}");
        }
        if self.gap.is_empty() {
            return format!("{open}{}{close}", members.join(","));
        }
        let separator = format!(",\n{}", self.indent);
        format!("{open}\n{}{}\n{stepback}{close}", self.indent, members.join(&separator))
    }

    /// SerializeJSONObject
    fn object(&mut self, vm: &mut VM, object: ObjectRef) -> Result<String> {
        let stepback = self.enter(vm, object)?;
        let result = self.object_members(vm, object).map(|members| self.wrap('{', '}', &members, &stepback));
        self.leave(stepback);
        result
    }

    fn object_members(&mut self, vm: &mut VM, object: ObjectRef) -> Result<Vec<String>> {
        let keys = match &self.property_list {
            Some(keys) => keys.clone(),
            None => vm
                .enumerable_own_keys(object)?
                .into_iter()
                .filter(|key| !key.is_symbol())
                .collect(),
        };
        let separator = if self.gap.is_empty() { ":" } else { ": " };
        let mut members = Vec::with_capacity(keys.len());
        for key in keys {
            if let Some(text) = self.property(vm, object, key.clone())? {
                members.push(format!("{}{separator}{text}", quote(&key.to_js_string())));
            }
        }
        Ok(members)
    }

    /// SerializeJSONArray
    fn array(&mut self, vm: &mut VM, object: ObjectRef) -> Result<String> {
        let stepback = self.enter(vm, object)?;
        let result = self.array_members(vm, object).map(|members| self.wrap('[', ']', &members, &stepback));
        self.leave(stepback);
        result
    }

    fn array_members(&mut self, vm: &mut VM, object: ObjectRef) -> Result<Vec<String>> {
        let length = vm.length_of_array_like(object)?;
        let mut members = Vec::with_capacity(length.min(1 << 16) as usize);
        for index in 0..length {
            let key = PropertyKey::from_number(index as f64);
            members.push(self.property(vm, object, key)?.unwrap_or_else(|| "null".to_string()));
        }
        Ok(members)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::builtins::testing::{eval_str, thrown};

    #[test]
    fn test_quote() {
        assert_eq!(quote(&JsString::from("a\"b\\c\n")), "\"a\\\"b\\\\c\\n\"");
        assert_eq!(quote(&JsString::from("\u{1}é")), "\"\\u0001é\"");
        assert_eq!(quote(&JsString::from(vec![0xD800, 0x61])), "\"\\ud800a\"");
        assert_eq!(quote(&JsString::from("\u{1F600}")), "\"\u{1F600}\"");
    }

    #[test]
    fn test_parse_out_of_range_numbers() {
        assert_eq!(eval_str("JSON.parse('1e400') === Infinity"), "true");
        assert_eq!(eval_str("JSON.parse('-1e400') === -Infinity"), "true");
        assert_eq!(eval_str("JSON.parse('[1e-400]')[0]"), "0");
        assert_eq!(eval_str("JSON.parse('123456789012345678901234567890')"), "1.2345678901234568e+29");
    }

    #[test]
    fn test_stringify_lone_surrogates() {
        assert_eq!(eval_str("JSON.stringify('\\ud800')"), r#""\ud800""#);
        assert_eq!(eval_str("JSON.stringify('\\udead\\ud83d\\ude00')"), "\"\\udead\u{1F600}\"");
        assert_eq!(eval_str("JSON.parse(JSON.stringify('\\u{1F600}')) === '\\u{1F600}'"), "true");
    }

    #[test]
    fn test_parse() {
        assert_eq!(eval_str("var o = JSON.parse('{\"a\": [1, 2.5, true, null], \"b\": \"x\"}'); o.a[1] + o.b + o.a.length"), "2.5x4");
        assert_eq!(eval_str("Object.keys(JSON.parse('{\"z\": 1, \"a\": 2, \"m\": 3}')).join()"), "z,a,m");
        assert_eq!(eval_str("JSON.parse('\"\\\\u0041\"')"), "A");
        assert_eq!(eval_str("JSON.parse(' 42 ')"), "42");
        assert!(thrown("JSON.parse('{a: 1}')").starts_with("SyntaxError"));
        assert!(thrown("JSON.parse('[1,]')").starts_with("SyntaxError"));
    }

    #[test]
    fn test_parse_reviver() {
        let src = "JSON.parse('{\"a\": 1, \"b\": {\"c\": 2}}', function (k, v) { return typeof v === 'number' ? v * 10 : v; }).b.c";
        assert_eq!(eval_str(src), "20");
        let src = "var o = JSON.parse('{\"keep\": 1, \"drop\": 2}', function (k, v) { return k === 'drop' ? undefined : v; }); \
                   Object.keys(o).join()";
        assert_eq!(eval_str(src), "keep");
    }

    #[test]
    fn test_stringify_values() {
        assert_eq!(eval_str("JSON.stringify({ a: 1, b: 'x', c: [true, null], d: undefined, e: function () {} })"), r#"{"a":1,"b":"x","c":[true,null]}"#);
        assert_eq!(eval_str("JSON.stringify([undefined, NaN, Infinity, function () {}])"), "[null,null,null,null]");
        assert_eq!(eval_str("String(JSON.stringify(undefined)) + String(JSON.stringify(function () {}))"), "undefinedundefined");
        assert_eq!(eval_str("JSON.stringify('he said \"hi\"\\n')"), r#""he said \"hi\"\n""#);
        assert_eq!(eval_str("JSON.stringify(new String('s')) + JSON.stringify(new Number(3)) + JSON.stringify(Object(false))"), r#""s"3false"#);
        assert_eq!(eval_str("JSON.stringify({ [Symbol('s')]: 1, k: Symbol('v') })"), "{}");
    }

    #[test]
    fn test_stringify_indent() {
        assert_eq!(eval_str("JSON.stringify({ a: [1, 2], b: {} }, null, 2)"), "{\n  \"a\": [\n    1,\n    2\n  ],\n  \"b\": {}\n}");
        assert_eq!(eval_str("JSON.stringify([1], null, '--')"), "[\n--1\n]");
        assert_eq!(eval_str("JSON.stringify({ a: 1 }, null, 20)"), "{\n          \"a\": 1\n}");
    }

    #[test]
    fn test_stringify_replacer() {
        assert_eq!(eval_str("JSON.stringify({ a: 1, b: 2, c: 3 }, ['c', 'a'])"), r#"{"c":3,"a":1}"#);
        let src = "JSON.stringify({ a: 1, b: 'x' }, function (k, v) { return typeof v === 'number' ? v + 1 : v; })";
        assert_eq!(eval_str(src), r#"{"a":2,"b":"x"}"#);
    }

    #[test]
    fn test_stringify_to_json() {
        assert_eq!(eval_str("JSON.stringify({ x: { toJSON: function (key) { return 'key:' + key; } } })"), r#"{"x":"key:x"}"#);
    }

    #[test]
    fn test_stringify_errors() {
        assert_eq!(thrown("var o = {}; o.self = o; JSON.stringify(o)"), "TypeError: Converting circular structure to JSON");
        assert!(thrown("JSON.stringify({ n: 1n })").starts_with("TypeError"));
        assert_eq!(eval_str("var shared = {}; JSON.stringify([shared, shared])"), "[{},{}]");
    }
}
