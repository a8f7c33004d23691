//! JavaScript value representation.

use std::fmt;
use std::hash::{Hash, Hasher};
use std::sync::Arc;

use num_bigint::BigInt;

use super::string::JsString;
use crate::gc::ObjectRef;

/// A JavaScript value.
///
/// Values are cheap to clone: strings and BigInts are shared through `Arc`
/// and objects are heap handles.
#[derive(Debug, Clone, PartialEq, Default)]
pub enum Value {
    /// undefined
    #[default]
    Undefined,
    /// null
    Null,
    /// Boolean value
    Boolean(bool),
    /// Number (IEEE 754 double)
    Number(f64),
    /// String of UTF-16 code units
    String(JsString),
    /// Symbol
    Symbol(Symbol),
    /// Arbitrary precision integer
    BigInt(Arc<BigInt>),
    /// Object reference
    Object(ObjectRef),
    /// An uninitialized lexical binding or an array hole; never visible to scripts
    Empty,
}

impl Value {
    /// Creates a string value.
    pub fn string(s: impl Into<JsString>) -> Self {
        Value::String(s.into())
    }

    /// Returns true if this value is undefined.
    pub fn is_undefined(&self) -> bool {
        matches!(self, Value::Undefined)
    }

    /// Returns true if this value is null.
    pub fn is_null(&self) -> bool {
        matches!(self, Value::Null)
    }

    /// Returns true if this value is nullish (null or undefined).
    pub fn is_nullish(&self) -> bool {
        matches!(self, Value::Undefined | Value::Null)
    }

    /// Returns true if this value is an object.
    pub fn is_object(&self) -> bool {
        matches!(self, Value::Object(_))
    }

    /// The object handle, if this is an object.
    pub fn as_object(&self) -> Option<ObjectRef> {
        match self {
            Value::Object(object) => Some(*object),
            _ => None,
        }
    }

    /// The string contents, if this is a string.
    pub fn as_string(&self) -> Option<&JsString> {
        match self {
            Value::String(s) => Some(s),
            _ => None,
        }
    }

    /// The number, if this is a number.
    pub fn as_number(&self) -> Option<f64> {
        match self {
            Value::Number(n) => Some(*n),
            _ => None,
        }
    }

    /// Converts the value to a boolean (ToBoolean).
    pub fn to_boolean(&self) -> bool {
        match self {
            Value::Undefined | Value::Null | Value::Empty => false,
            Value::Boolean(b) => *b,
            Value::Number(n) => !n.is_nan() && *n != 0.0,
            Value::String(s) => !s.is_empty(),
            Value::BigInt(n) => !num_traits::Zero::is_zero(n.as_ref()),
            Value::Symbol(_) | Value::Object(_) => true,
        }
    }

    /// SameValue: like `===` but `NaN` equals itself and `+0` differs from `-0`.
    pub fn same_value(&self, other: &Value) -> bool {
        match (self, other) {
            (Value::Number(a), Value::Number(b)) => {
                (a.is_nan() && b.is_nan()) || (a == b && a.is_sign_negative() == b.is_sign_negative())
            }
            _ => self.strict_equals(other),
        }
    }

    /// SameValueZero, used by `includes`.
    pub fn same_value_zero(&self, other: &Value) -> bool {
        match (self, other) {
            (Value::Number(a), Value::Number(b)) => (a.is_nan() && b.is_nan()) || a == b,
            _ => self.strict_equals(other),
        }
    }

    /// Strict equality (`===`).
    pub fn strict_equals(&self, other: &Value) -> bool {
        match (self, other) {
            (Value::Number(a), Value::Number(b)) => a == b,
            (Value::String(a), Value::String(b)) => a == b,
            (Value::BigInt(a), Value::BigInt(b)) => a == b,
            _ => self == other,
        }
    }
}

impl From<bool> for Value {
    fn from(b: bool) -> Self {
        Value::Boolean(b)
    }
}

impl From<f64> for Value {
    fn from(n: f64) -> Self {
        Value::Number(n)
    }
}

impl From<i32> for Value {
    fn from(n: i32) -> Self {
        Value::Number(n as f64)
    }
}

impl From<u32> for Value {
    fn from(n: u32) -> Self {
        Value::Number(n as f64)
    }
}

impl From<usize> for Value {
    fn from(n: usize) -> Self {
        Value::Number(n as f64)
    }
}

impl From<&str> for Value {
    fn from(s: &str) -> Self {
        Value::String(JsString::from(s))
    }
}

impl From<String> for Value {
    fn from(s: String) -> Self {
        Value::String(JsString::from(s))
    }
}

impl From<JsString> for Value {
    fn from(s: JsString) -> Self {
        Value::String(s)
    }
}

impl From<ObjectRef> for Value {
    fn from(object: ObjectRef) -> Self {
        Value::Object(object)
    }
}

impl fmt::Display for Value {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Value::Undefined => write!(f, "undefined"),
            Value::Null => write!(f, "null"),
            Value::Boolean(b) => write!(f, "{b}"),
            Value::Number(n) => f.write_str(&number_to_string(*n)),
            Value::String(s) => write!(f, "{s}"),
            Value::Symbol(symbol) => write!(f, "{symbol}"),
            Value::BigInt(n) => write!(f, "{n}"),
            Value::Object(_) => write!(f, "[object Object]"),
            Value::Empty => write!(f, "<uninitialized>"),
        }
    }
}

/// A symbol. Symbols compare by identity.
#[derive(Clone)]
pub struct Symbol(Arc<SymbolData>);

#[derive(Debug)]
struct SymbolData {
    description: Option<JsString>,
}

impl Symbol {
    /// Creates a fresh symbol.
    pub fn new(description: Option<JsString>) -> Self {
        Symbol(Arc::new(SymbolData { description }))
    }

    /// The description given at creation.
    pub fn description(&self) -> Option<&JsString> {
        self.0.description.as_ref()
    }
}

impl PartialEq for Symbol {
    fn eq(&self, other: &Self) -> bool {
        Arc::ptr_eq(&self.0, &other.0)
    }
}

impl Eq for Symbol {}

impl Hash for Symbol {
    fn hash<H: Hasher>(&self, state: &mut H) {
        (Arc::as_ptr(&self.0) as usize).hash(state);
    }
}

impl fmt::Debug for Symbol {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{self}")
    }
}

impl fmt::Display for Symbol {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self.description() {
            Some(description) => write!(f, "Symbol({description})"),
            None => write!(f, "Symbol()"),
        }
    }
}

/// Number::toString with radix 10.
pub fn number_to_string(n: f64) -> String {
    if n.is_nan() {
        "NaN".to_string()
    } else if n == 0.0 {
        "0".to_string()
    } else if n.is_infinite() {
        if n > 0.0 { "Infinity" } else { "-Infinity" }.to_string()
    } else {
        ryu_js::Buffer::new().format_finite(n).to_string()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_to_boolean() {
        assert!(!Value::Undefined.to_boolean());
        assert!(!Value::Number(f64::NAN).to_boolean());
        assert!(!Value::from("").to_boolean());
        assert!(Value::from("0").to_boolean());
        assert!(!Value::BigInt(Arc::new(BigInt::from(0))).to_boolean());
        assert!(Value::Symbol(Symbol::new(None)).to_boolean());
    }

    #[test]
    fn test_number_to_string() {
        assert_eq!(number_to_string(1.0), "1");
        assert_eq!(number_to_string(-0.0), "0");
        assert_eq!(number_to_string(0.1), "0.1");
        assert_eq!(number_to_string(1e21), "1e+21");
        assert_eq!(number_to_string(123456789.0), "123456789");
        assert_eq!(number_to_string(f64::NEG_INFINITY), "-Infinity");
    }

    #[test]
    fn test_same_value() {
        let nan = Value::Number(f64::NAN);
        assert!(nan.same_value(&nan));
        assert!(!nan.strict_equals(&nan));
        assert!(!Value::Number(0.0).same_value(&Value::Number(-0.0)));
        assert!(Value::Number(0.0).same_value_zero(&Value::Number(-0.0)));
    }

    #[test]
    fn test_symbols_compare_by_identity() {
        let a = Symbol::new(Some(JsString::from("x")));
        let b = Symbol::new(Some(JsString::from("x")));
        assert_ne!(a, b);
        assert_eq!(a, a.clone());
        assert_eq!(a.to_string(), "Symbol(x)");
    }
}
