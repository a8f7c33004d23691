//! Equality and relational comparison.

use std::cmp::Ordering;

use num_bigint::BigInt;
use num_traits::FromPrimitive;

use super::VM;
use super::conversions::{Hint, string_to_bigint, string_to_number};
use crate::error::Result;
use crate::runtime::value::Value;

impl VM {
    /// Abstract (loose) equality, `==`.
    pub fn loose_equals(&mut self, a: &Value, b: &Value) -> Result<bool> {
        match (a, b) {
            (Value::Undefined | Value::Null, Value::Undefined | Value::Null) => Ok(true),
            (Value::Undefined | Value::Null, _) | (_, Value::Undefined | Value::Null) => Ok(false),
            (Value::Number(_), Value::Number(_))
            | (Value::String(_), Value::String(_))
            | (Value::Boolean(_), Value::Boolean(_))
            | (Value::Symbol(_), Value::Symbol(_))
            | (Value::BigInt(_), Value::BigInt(_))
            | (Value::Object(_), Value::Object(_)) => Ok(a.strict_equals(b)),
            (Value::Number(n), Value::String(s)) | (Value::String(s), Value::Number(n)) => {
                Ok(*n == string_to_number(&s.to_std_string_lossy()))
            }
            (Value::BigInt(n), Value::String(s)) | (Value::String(s), Value::BigInt(n)) => {
                Ok(string_to_bigint(&s.to_std_string_lossy()).is_some_and(|parsed| parsed == **n))
            }
            (Value::Boolean(flag), other) | (other, Value::Boolean(flag)) => {
                let number = Value::Number(if *flag { 1.0 } else { 0.0 });
                self.loose_equals(&number, other)
            }
            (Value::Object(_), Value::Number(_) | Value::String(_) | Value::BigInt(_) | Value::Symbol(_)) => {
                let primitive = self.to_primitive(a, Hint::Default)?;
                self.loose_equals(&primitive, b)
            }
            (Value::Number(_) | Value::String(_) | Value::BigInt(_) | Value::Symbol(_), Value::Object(_)) => {
                let primitive = self.to_primitive(b, Hint::Default)?;
                self.loose_equals(a, &primitive)
            }
            (Value::BigInt(big), Value::Number(n)) | (Value::Number(n), Value::BigInt(big)) => {
                Ok(compare_bigint_number(big, *n) == Some(Ordering::Equal))
            }
            _ => Ok(false),
        }
    }

    /// IsLessThan. `None` stands for `undefined` (a NaN was involved).
    /// `left_first` controls which operand is converted first.
    pub fn less_than(&mut self, a: &Value, b: &Value, left_first: bool) -> Result<Option<bool>> {
        if let (Value::Number(x), Value::Number(y)) = (a, b) {
            return Ok(x.partial_cmp(y).map(|ordering| ordering == Ordering::Less));
        }
        let (px, py) = if left_first {
            let px = self.to_primitive(a, Hint::Number)?;
            (px, self.to_primitive(b, Hint::Number)?)
        } else {
            let py = self.to_primitive(b, Hint::Number)?;
            (self.to_primitive(a, Hint::Number)?, py)
        };
        match (&px, &py) {
            (Value::String(x), Value::String(y)) => return Ok(Some(x < y)),
            (Value::BigInt(x), Value::String(y)) => {
                return Ok(string_to_bigint(&y.to_std_string_lossy()).map(|y| **x < y));
            }
            (Value::String(x), Value::BigInt(y)) => {
                return Ok(string_to_bigint(&x.to_std_string_lossy()).map(|x| x < **y));
            }
            _ => {}
        }
        let nx = self.to_numeric(&px)?;
        let ny = self.to_numeric(&py)?;
        Ok(match (&nx, &ny) {
            (Value::Number(x), Value::Number(y)) => x.partial_cmp(y).map(|o| o == Ordering::Less),
            (Value::BigInt(x), Value::BigInt(y)) => Some(x < y),
            (Value::BigInt(x), Value::Number(y)) => compare_bigint_number(x, *y).map(|o| o == Ordering::Less),
            (Value::Number(x), Value::BigInt(y)) => {
                compare_bigint_number(y, *x).map(|o| o == Ordering::Greater)
            }
            _ => None,
        })
    }
}

/// Orders a BigInt against a Number; `None` for NaN.
fn compare_bigint_number(big: &BigInt, n: f64) -> Option<Ordering> {
    if n.is_nan() {
        return None;
    }
    if n.is_infinite() {
        return Some(if n > 0.0 { Ordering::Less } else { Ordering::Greater });
    }
    let floor = BigInt::from_f64(n.floor())?;
    match big.cmp(&floor) {
        Ordering::Equal if n.fract() != 0.0 => Some(Ordering::Less),
        other => Some(other),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_compare_bigint_number() {
        let ten = BigInt::from(10);
        assert_eq!(compare_bigint_number(&ten, 10.0), Some(Ordering::Equal));
        assert_eq!(compare_bigint_number(&ten, 10.5), Some(Ordering::Less));
        assert_eq!(compare_bigint_number(&ten, 9.5), Some(Ordering::Greater));
        assert_eq!(compare_bigint_number(&ten, f64::INFINITY), Some(Ordering::Less));
        assert_eq!(compare_bigint_number(&ten, f64::NAN), None);
    }
}
