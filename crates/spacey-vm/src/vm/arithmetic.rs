//! Numeric operators over Numbers and BigInts.

use std::sync::Arc;

use num_bigint::BigInt;
use num_traits::{One, Pow, Signed, ToPrimitive, Zero};

use super::VM;
use super::conversions::{Hint, to_int32, to_uint32};
use crate::error::{Result, range_error, type_error};
use crate::runtime::string::JsString;
use crate::runtime::value::Value;

/// Binary operators that take two numeric operands.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum NumericOp {
    /// `-`
    Sub,
    /// `*`
    Mul,
    /// `/`
    Div,
    /// `%`
    Mod,
    /// `**`
    Exp,
    /// `&`
    BitAnd,
    /// `|`
    BitOr,
    /// `^`
    BitXor,
    /// `<<`
    Shl,
    /// `>>`
    Shr,
    /// `>>>`
    UShr,
}

const MIXED_TYPES: &str = "Cannot mix BigInt and other types, use explicit conversions";

impl VM {
    /// The `+` operator: both operands go through ToPrimitive (left first),
    /// then a string on either side means concatenation.
    pub fn add(&mut self, left: &Value, right: &Value) -> Result<Value> {
        match (left, right) {
            (Value::Number(a), Value::Number(b)) => return Ok(Value::Number(a + b)),
            (Value::String(a), Value::String(b)) => return Ok(concat(a, b)),
            _ => {}
        }
        let left = self.to_primitive(left, Hint::Default)?;
        let right = self.to_primitive(right, Hint::Default)?;
        if matches!(left, Value::String(_)) || matches!(right, Value::String(_)) {
            let a = self.to_string(&left)?;
            let b = self.to_string(&right)?;
            return Ok(concat(&a, &b));
        }
        let a = self.to_numeric(&left)?;
        let b = self.to_numeric(&right)?;
        match (a, b) {
            (Value::Number(a), Value::Number(b)) => Ok(Value::Number(a + b)),
            (Value::BigInt(a), Value::BigInt(b)) => Ok(Value::BigInt(Arc::new(a.as_ref() + b.as_ref()))),
            _ => type_error(MIXED_TYPES),
        }
    }

    /// Every other binary numeric operator.
    pub fn numeric_binary(&mut self, op: NumericOp, left: &Value, right: &Value) -> Result<Value> {
        if let (Value::Number(a), Value::Number(b)) = (left, right) {
            return Ok(Value::Number(number_op(op, *a, *b)));
        }
        let a = self.to_numeric(left)?;
        let b = self.to_numeric(right)?;
        match (a, b) {
            (Value::Number(a), Value::Number(b)) => Ok(Value::Number(number_op(op, a, b))),
            (Value::BigInt(a), Value::BigInt(b)) => Ok(Value::BigInt(Arc::new(bigint_op(op, &a, &b)?))),
            _ => type_error(MIXED_TYPES),
        }
    }

    /// Unary `-`.
    pub fn negate(&mut self, value: &Value) -> Result<Value> {
        match self.to_numeric(value)? {
            Value::BigInt(n) => Ok(Value::BigInt(Arc::new(-n.as_ref()))),
            other => Ok(Value::Number(-self.to_number(&other)?)),
        }
    }

    /// Unary `~`.
    pub fn bitwise_not(&mut self, value: &Value) -> Result<Value> {
        match self.to_numeric(value)? {
            Value::BigInt(n) => Ok(Value::BigInt(Arc::new(-n.as_ref() - BigInt::one()))),
            other => Ok(Value::Number(!to_int32(self.to_number(&other)?) as f64)),
        }
    }

    /// `++` and `--` on an already numeric value.
    pub fn increment(&mut self, value: &Value, delta: i32) -> Result<Value> {
        match self.to_numeric(value)? {
            Value::BigInt(n) => Ok(Value::BigInt(Arc::new(n.as_ref() + BigInt::from(delta)))),
            other => Ok(Value::Number(self.to_number(&other)? + delta as f64)),
        }
    }
}

fn concat(a: &JsString, b: &JsString) -> Value {
    Value::String(a.concat(b))
}

/// A numeric operator on two Numbers.
pub fn number_op(op: NumericOp, a: f64, b: f64) -> f64 {
    match op {
        NumericOp::Sub => a - b,
        NumericOp::Mul => a * b,
        NumericOp::Div => a / b,
        NumericOp::Mod => a % b,
        NumericOp::Exp => number_pow(a, b),
        NumericOp::BitAnd => (to_int32(a) & to_int32(b)) as f64,
        NumericOp::BitOr => (to_int32(a) | to_int32(b)) as f64,
        NumericOp::BitXor => (to_int32(a) ^ to_int32(b)) as f64,
        NumericOp::Shl => to_int32(a).wrapping_shl(to_uint32(b) & 31) as f64,
        NumericOp::Shr => (to_int32(a) >> (to_uint32(b) & 31)) as f64,
        NumericOp::UShr => (to_uint32(a) >> (to_uint32(b) & 31)) as f64,
    }
}

/// `**` on Numbers; differs from `powf` for NaN exponents and `(±1) ** ±∞`.
pub fn number_pow(base: f64, exponent: f64) -> f64 {
    if exponent.is_nan() || (base.abs() == 1.0 && exponent.is_infinite()) {
        return f64::NAN;
    }
    base.powf(exponent)
}

fn bigint_op(op: NumericOp, a: &BigInt, b: &BigInt) -> Result<BigInt> {
    Ok(match op {
        NumericOp::Sub => a - b,
        NumericOp::Mul => a * b,
        NumericOp::Div => {
            if b.is_zero() {
                return range_error("Division by zero");
            }
            a / b
        }
        NumericOp::Mod => {
            if b.is_zero() {
                return range_error("Division by zero");
            }
            a % b
        }
        NumericOp::Exp => {
            if b.is_negative() {
                return range_error("Exponent must be non-negative");
            }
            let Some(exponent) = b.to_u32() else {
                return range_error("Maximum BigInt size exceeded");
            };
            Pow::pow(a, exponent)
        }
        NumericOp::BitAnd => a & b,
        NumericOp::BitOr => a | b,
        NumericOp::BitXor => a ^ b,
        NumericOp::Shl => shift_left(a, b)?,
        NumericOp::Shr => shift_left(a, &-b)?,
        NumericOp::UShr => return type_error("BigInts have no unsigned right shift, use >> instead"),
    })
}

fn shift_left(a: &BigInt, shift: &BigInt) -> Result<BigInt> {
    let Some(amount) = shift.abs().to_usize() else {
        return range_error("Maximum BigInt size exceeded");
    };
    if shift.is_negative() {
        Ok(a >> amount)
    } else if amount > 1 << 24 {
        range_error("Maximum BigInt size exceeded")
    } else {
        Ok(a << amount)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_number_ops() {
        assert_eq!(number_op(NumericOp::Mod, -5.0, 3.0), -2.0);
        assert_eq!(number_op(NumericOp::Shl, 1.0, 33.0), 2.0);
        assert_eq!(number_op(NumericOp::UShr, -1.0, 0.0), 4_294_967_295.0);
        assert_eq!(number_op(NumericOp::Shr, -8.0, 1.0), -4.0);
        assert!(number_pow(1.0, f64::INFINITY).is_nan());
        assert!(number_pow(1.0, f64::NAN).is_nan());
        assert_eq!(number_pow(2.0, 10.0), 1024.0);
    }

    #[test]
    fn test_bigint_ops() {
        let a = BigInt::from(-7);
        let b = BigInt::from(2);
        assert_eq!(bigint_op(NumericOp::Div, &a, &b).unwrap(), BigInt::from(-3));
        assert_eq!(bigint_op(NumericOp::Mod, &a, &b).unwrap(), BigInt::from(-1));
        assert_eq!(bigint_op(NumericOp::Shr, &a, &BigInt::from(1)).unwrap(), BigInt::from(-4));
        assert_eq!(bigint_op(NumericOp::Exp, &b, &BigInt::from(64)).unwrap().to_string(), "18446744073709551616");
        assert!(bigint_op(NumericOp::Div, &a, &BigInt::zero()).is_err());
        assert!(bigint_op(NumericOp::UShr, &a, &b).is_err());
    }
}
