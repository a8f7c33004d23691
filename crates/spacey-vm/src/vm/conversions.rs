//! Type conversions (ToPrimitive, ToNumber, ToString, ToObject, ...).

use num_bigint::BigInt;
use num_traits::{Num, Zero};

use super::VM;
use crate::error::{Result, type_error};
use crate::gc::ObjectRef;
use crate::lexer::{is_line_terminator, is_whitespace};
use crate::runtime::object::{JsObject, ObjectKind, PropertyKey};
use crate::runtime::string::JsString;
use crate::runtime::value::{Value, number_to_string};

/// Preferred type for [`VM::to_primitive`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Hint {
    /// No preference (`+`, `==`)
    Default,
    /// Numeric context
    Number,
    /// String context
    String,
}

impl Hint {
    fn as_str(self) -> &'static str {
        match self {
            Hint::Default => "default",
            Hint::Number => "number",
            Hint::String => "string",
        }
    }
}

impl VM {
    /// ToPrimitive: `@@toPrimitive` first, then `valueOf`/`toString` in
    /// hint order.
    pub fn to_primitive(&mut self, value: &Value, hint: Hint) -> Result<Value> {
        let Value::Object(object) = value else {
            return Ok(value.clone());
        };
        let key = PropertyKey::Symbol(self.realm.symbols.to_primitive.clone());
        let exotic = self.get(*object, &key, value)?;
        if !exotic.is_nullish() {
            if !self.is_callable(&exotic) {
                return type_error("Symbol.toPrimitive is not a function");
            }
            let result = self.call(&exotic, value, &[Value::from(hint.as_str())])?;
            if result.is_object() {
                return type_error("Cannot convert object to primitive value");
            }
            return Ok(result);
        }
        self.ordinary_to_primitive(*object, hint)
    }

    /// OrdinaryToPrimitive: `valueOf` then `toString`, or the reverse for
    /// string hints.
    pub fn ordinary_to_primitive(&mut self, object: ObjectRef, hint: Hint) -> Result<Value> {
        let value = &Value::Object(object);
        let order = match hint {
            Hint::String => ["toString", "valueOf"],
            _ => ["valueOf", "toString"],
        };
        for name in order {
            let method = self.get(object, &PropertyKey::from(name), value)?;
            if self.is_callable(&method) {
                let result = self.call(&method, value, &[])?;
                if !result.is_object() {
                    return Ok(result);
                }
            }
        }
        type_error("Cannot convert object to primitive value")
    }

    /// ToNumber.
    pub fn to_number(&mut self, value: &Value) -> Result<f64> {
        match value {
            Value::Undefined | Value::Empty => Ok(f64::NAN),
            Value::Null => Ok(0.0),
            Value::Boolean(b) => Ok(if *b { 1.0 } else { 0.0 }),
            Value::Number(n) => Ok(*n),
            Value::String(s) => Ok(string_to_number(&s.to_std_string_lossy())),
            Value::Symbol(_) => type_error("Cannot convert a Symbol value to a number"),
            Value::BigInt(_) => type_error("Cannot convert a BigInt value to a number"),
            Value::Object(_) => {
                let primitive = self.to_primitive(value, Hint::Number)?;
                self.to_number(&primitive)
            }
        }
    }

    /// ToNumeric: a Number or a BigInt.
    pub fn to_numeric(&mut self, value: &Value) -> Result<Value> {
        match value {
            Value::Number(_) | Value::BigInt(_) => Ok(value.clone()),
            _ => {
                let primitive = self.to_primitive(value, Hint::Number)?;
                if let Value::BigInt(_) = primitive {
                    return Ok(primitive);
                }
                Ok(Value::Number(self.to_number(&primitive)?))
            }
        }
    }

    /// ToString.
    pub fn to_string(&mut self, value: &Value) -> Result<JsString> {
        match value {
            Value::String(s) => Ok(s.clone()),
            Value::Number(n) => Ok(JsString::from(number_to_string(*n))),
            Value::Symbol(_) => type_error("Cannot convert a Symbol value to a string"),
            Value::Object(_) => {
                let primitive = self.to_primitive(value, Hint::String)?;
                self.to_string(&primitive)
            }
            other => Ok(JsString::from(other.to_string())),
        }
    }

    /// ToString, then converted to Rust text for APIs that work on `str`.
    /// Lone surrogates become U+FFFD.
    pub fn to_rust_string(&mut self, value: &Value) -> Result<String> {
        Ok(self.to_string(value)?.to_std_string_lossy())
    }

    /// ToPropertyKey.
    pub fn to_property_key(&mut self, value: &Value) -> Result<PropertyKey> {
        match value {
            Value::String(s) => Ok(PropertyKey::from_string(s.clone())),
            Value::Number(n) => Ok(PropertyKey::from_number(*n)),
            Value::Symbol(symbol) => Ok(PropertyKey::Symbol(symbol.clone())),
            Value::Object(_) => {
                let primitive = self.to_primitive(value, Hint::String)?;
                self.to_property_key(&primitive)
            }
            other => Ok(PropertyKey::from_name(&other.to_string())),
        }
    }

    /// ToObject: wraps primitives, rejects `null` and `undefined`.
    pub fn to_object(&mut self, value: &Value) -> Result<ObjectRef> {
        let intrinsics = &self.realm.intrinsics;
        let (prototype, kind) = match value {
            Value::Object(object) => return Ok(*object),
            Value::Undefined | Value::Null | Value::Empty => {
                return type_error("Cannot convert undefined or null to object");
            }
            Value::Boolean(b) => (intrinsics.boolean_prototype, ObjectKind::Boolean(*b)),
            Value::Number(n) => (intrinsics.number_prototype, ObjectKind::Number(*n)),
            Value::String(s) => (intrinsics.string_prototype, ObjectKind::String(s.clone())),
            Value::Symbol(symbol) => (intrinsics.symbol_prototype, ObjectKind::Symbol(symbol.clone())),
            Value::BigInt(n) => (intrinsics.bigint_prototype, ObjectKind::BigInt(n.clone())),
        };
        Ok(self.heap.alloc_object(JsObject::with_kind(Some(prototype), kind)))
    }

    /// ToInt32 of an arbitrary value.
    pub fn to_int32(&mut self, value: &Value) -> Result<i32> {
        Ok(to_int32(self.to_number(value)?))
    }

    /// ToUint32 of an arbitrary value.
    pub fn to_uint32(&mut self, value: &Value) -> Result<u32> {
        Ok(to_uint32(self.to_number(value)?))
    }

    /// ToIntegerOrInfinity of an arbitrary value.
    pub fn to_integer(&mut self, value: &Value) -> Result<f64> {
        Ok(to_integer_or_infinity(self.to_number(value)?))
    }

    /// The `typeof` string of a value.
    pub fn type_of(&self, value: &Value) -> &'static str {
        match value {
            Value::Undefined | Value::Empty => "undefined",
            Value::Null => "object",
            Value::Boolean(_) => "boolean",
            Value::Number(_) => "number",
            Value::String(_) => "string",
            Value::Symbol(_) => "symbol",
            Value::BigInt(_) => "bigint",
            Value::Object(_) if self.is_callable(value) => "function",
            Value::Object(_) => "object",
        }
    }
}

/// ToInt32 of a number.
pub fn to_int32(n: f64) -> i32 {
    to_uint32(n) as i32
}

/// ToUint32 of a number.
pub fn to_uint32(n: f64) -> u32 {
    if !n.is_finite() || n == 0.0 {
        return 0;
    }
    let n = n.trunc().rem_euclid(4_294_967_296.0);
    n as u32
}

/// ToIntegerOrInfinity of a number.
pub fn to_integer_or_infinity(n: f64) -> f64 {
    if n.is_nan() {
        0.0
    } else if n.is_infinite() {
        n
    } else {
        n.trunc() + 0.0
    }
}

/// ToLength of a number.
pub fn to_length(n: f64) -> f64 {
    let n = to_integer_or_infinity(n);
    if n <= 0.0 { 0.0 } else { n.min(9_007_199_254_740_991.0) }
}

/// Resolves a relative index (negative counts from the end) against
/// `length`, clamped to `0..=length`.
pub fn relative_index(relative: f64, length: f64) -> f64 {
    if relative < 0.0 {
        (length + relative).max(0.0)
    } else {
        relative.min(length)
    }
}

/// Trims ECMAScript white space and line terminators.
pub fn trim_js(s: &str) -> &str {
    s.trim_matches(|c| is_whitespace(c) || is_line_terminator(c))
}

/// StringToNumber: the grammar of numeric strings, not Rust's.
pub fn string_to_number(s: &str) -> f64 {
    let s = trim_js(s);
    if s.is_empty() {
        return 0.0;
    }
    let radix = match s.get(..2) {
        Some("0x" | "0X") => Some(16),
        Some("0o" | "0O") => Some(8),
        Some("0b" | "0B") => Some(2),
        _ => None,
    };
    if let Some(radix) = radix {
        return parse_radix_digits(&s[2..], radix).unwrap_or(f64::NAN);
    }
    let (sign, unsigned) = match s.as_bytes()[0] {
        b'-' => (-1.0, &s[1..]),
        b'+' => (1.0, &s[1..]),
        _ => (1.0, s),
    };
    if unsigned == "Infinity" {
        return sign * f64::INFINITY;
    }
    if !is_decimal_literal(unsigned) {
        return f64::NAN;
    }
    unsigned.parse::<f64>().map(|n| sign * n).unwrap_or(f64::NAN)
}

/// Parses digits in `radix` without sign or prefix.
pub fn parse_radix_digits(digits: &str, radix: u32) -> Option<f64> {
    if digits.is_empty() {
        return None;
    }
    let mut value = 0.0f64;
    for c in digits.chars() {
        value = value * radix as f64 + c.to_digit(radix)? as f64;
    }
    Some(value)
}

fn is_decimal_literal(s: &str) -> bool {
    let bytes = s.as_bytes();
    let mut i = 0;
    let digits = |i: &mut usize| {
        let start = *i;
        while *i < bytes.len() && bytes[*i].is_ascii_digit() {
            *i += 1;
        }
        *i - start
    };
    let integer = digits(&mut i);
    let mut fraction = 0;
    if i < bytes.len() && bytes[i] == b'.' {
        i += 1;
        fraction = digits(&mut i);
    }
    if integer == 0 && fraction == 0 {
        return false;
    }
    if i < bytes.len() && (bytes[i] == b'e' || bytes[i] == b'E') {
        i += 1;
        if i < bytes.len() && (bytes[i] == b'+' || bytes[i] == b'-') {
            i += 1;
        }
        if digits(&mut i) == 0 {
            return false;
        }
    }
    i == bytes.len()
}

/// StringToBigInt; `None` when the string is not a valid integer literal.
pub fn string_to_bigint(s: &str) -> Option<BigInt> {
    let s = trim_js(s);
    if s.is_empty() {
        return Some(BigInt::zero());
    }
    let radix = match s.get(..2) {
        Some("0x" | "0X") => Some(16),
        Some("0o" | "0O") => Some(8),
        Some("0b" | "0B") => Some(2),
        _ => None,
    };
    if let Some(radix) = radix {
        let digits = &s[2..];
        if digits.is_empty() || !digits.chars().all(|c| c.is_digit(radix)) {
            return None;
        }
        return BigInt::from_str_radix(digits, radix).ok();
    }
    let unsigned = s.strip_prefix(['+', '-']).unwrap_or(s);
    if unsigned.is_empty() || !unsigned.bytes().all(|b| b.is_ascii_digit()) {
        return None;
    }
    BigInt::from_str_radix(s, 10).ok()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_string_to_number() {
        assert_eq!(string_to_number("  42  "), 42.0);
        assert_eq!(string_to_number(""), 0.0);
        assert_eq!(string_to_number("0x1F"), 31.0);
        assert_eq!(string_to_number("0b101"), 5.0);
        assert_eq!(string_to_number("-Infinity"), f64::NEG_INFINITY);
        assert_eq!(string_to_number(".5e1"), 5.0);
        assert_eq!(string_to_number("5."), 5.0);
        assert!(string_to_number("inf").is_nan());
        assert!(string_to_number("nan").is_nan());
        assert!(string_to_number("1_000").is_nan());
        assert!(string_to_number("-0x10").is_nan());
        assert!(string_to_number("12px").is_nan());
    }

    #[test]
    fn test_int32_wrapping() {
        assert_eq!(to_int32(4_294_967_296.0 + 5.0), 5);
        assert_eq!(to_int32(2_147_483_648.0), -2_147_483_648);
        assert_eq!(to_int32(-1.5), -1);
        assert_eq!(to_uint32(-1.0), 4_294_967_295);
        assert_eq!(to_int32(f64::NAN), 0);
    }

    #[test]
    fn test_string_to_bigint() {
        assert_eq!(string_to_bigint("123"), Some(BigInt::from(123)));
        assert_eq!(string_to_bigint(" -7 "), Some(BigInt::from(-7)));
        assert_eq!(string_to_bigint("0xff"), Some(BigInt::from(255)));
        assert_eq!(string_to_bigint("1.5"), None);
        assert_eq!(string_to_bigint(""), Some(BigInt::zero()));
    }

    #[test]
    fn test_relative_index() {
        assert_eq!(relative_index(-2.0, 5.0), 3.0);
        assert_eq!(relative_index(-9.0, 5.0), 0.0);
        assert_eq!(relative_index(9.0, 5.0), 5.0);
    }
}
