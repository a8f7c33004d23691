//! BigInt built-in object.

use std::sync::Arc;

use num_bigint::BigInt;
use num_traits::{FromPrimitive, One, Zero};

use super::{Builder, arg};
use crate::error::{Result, range_error, type_error};
use crate::runtime::object::ObjectKind;
use crate::runtime::value::{Value, number_to_string};
use crate::vm::conversions::string_to_bigint;
use crate::vm::{Hint, VM};

pub(super) fn register(builder: &mut Builder<'_>) {
    let prototype = builder.intrinsics.bigint_prototype;
    // `new BigInt()` throws: no construct behaviour.
    let constructor = builder.constructor("BigInt", 1, bigint_call, None, prototype);
    builder.method(constructor, "asIntN", 2, as_int_n);
    builder.method(constructor, "asUintN", 2, as_uint_n);

    builder.method(prototype, "toString", 0, to_string);
    builder.method(prototype, "toLocaleString", 0, to_string);
    builder.method(prototype, "valueOf", 0, value_of);
    builder.to_string_tag(prototype, "BigInt");
}

/// ToBigInt.
pub fn to_bigint(vm: &mut VM, value: &Value) -> Result<Arc<BigInt>> {
    let primitive = vm.to_primitive(value, Hint::Number)?;
    match primitive {
        Value::BigInt(n) => Ok(n),
        Value::Boolean(b) => Ok(Arc::new(if b { BigInt::one() } else { BigInt::zero() })),
        Value::String(s) => match string_to_bigint(&s.to_std_string_lossy()) {
            Some(n) => Ok(Arc::new(n)),
            None => Err(vm.syntax_error(format!("Cannot convert {s} to a BigInt"))),
        },
        other => type_error(format!("Cannot convert {} to a BigInt", vm.describe(&other))),
    }
}

/// BigInt(value)
fn bigint_call(vm: &mut VM, _this: &Value, args: &[Value]) -> Result<Value> {
    let primitive = vm.to_primitive(&arg(args, 0), Hint::Number)?;
    if let Value::Number(n) = primitive {
        if !n.is_finite() || n.trunc() != n {
            return range_error(format!(
                "The number {} cannot be converted to a BigInt because it is not an integer",
                number_to_string(n)
            ));
        }
        return match BigInt::from_f64(n) {
            Some(n) => Ok(Value::BigInt(Arc::new(n))),
            None => range_error("Invalid BigInt"),
        };
    }
    Ok(Value::BigInt(to_bigint(vm, &primitive)?))
}

/// ToIndex for the `bits` argument of asIntN/asUintN.
fn bits_arg(vm: &mut VM, value: &Value) -> Result<u32> {
    let bits = vm.to_integer(value)?;
    if !(0.0..=9_007_199_254_740_991.0).contains(&bits) {
        return range_error("Invalid value: not (convertible to) a safe integer");
    }
    if bits > f64::from(u32::MAX) {
        return range_error("Maximum BigInt size exceeded");
    }
    Ok(bits as u32)
}

/// `n` modulo 2^bits, in `0..2^bits`.
fn wrap_unsigned(n: &BigInt, bits: u32) -> BigInt {
    let modulus = BigInt::one() << bits;
    let rem = n % &modulus;
    if rem < BigInt::zero() { rem + modulus } else { rem }
}

/// BigInt.asUintN(bits, bigint)
fn as_uint_n(vm: &mut VM, _this: &Value, args: &[Value]) -> Result<Value> {
    let bits = bits_arg(vm, &arg(args, 0))?;
    let n = to_bigint(vm, &arg(args, 1))?;
    Ok(Value::BigInt(Arc::new(wrap_unsigned(&n, bits))))
}

/// BigInt.asIntN(bits, bigint)
fn as_int_n(vm: &mut VM, _this: &Value, args: &[Value]) -> Result<Value> {
    let bits = bits_arg(vm, &arg(args, 0))?;
    let n = to_bigint(vm, &arg(args, 1))?;
    if bits == 0 {
        return Ok(Value::BigInt(Arc::new(BigInt::zero())));
    }
    let wrapped = wrap_unsigned(&n, bits);
    let result = if wrapped >= BigInt::one() << (bits - 1) {
        wrapped - (BigInt::one() << bits)
    } else {
        wrapped
    };
    Ok(Value::BigInt(Arc::new(result)))
}

/// thisBigIntValue
fn this_bigint(vm: &VM, this: &Value, method: &str) -> Result<Arc<BigInt>> {
    match this {
        Value::BigInt(n) => Ok(n.clone()),
        Value::Object(object) => match &vm.heap.object(*object)?.kind {
            ObjectKind::BigInt(n) => Ok(n.clone()),
            _ => type_error(format!("BigInt.prototype.{method} requires that 'this' be a BigInt")),
        },
        _ => type_error(format!("BigInt.prototype.{method} requires that 'this' be a BigInt")),
    }
}

/// BigInt.prototype.toString(radix)
fn to_string(vm: &mut VM, this: &Value, args: &[Value]) -> Result<Value> {
    let n = this_bigint(vm, this, "toString")?;
    let radix = match arg(args, 0) {
        Value::Undefined => 10.0,
        value => vm.to_integer(&value)?,
    };
    if !(2.0..=36.0).contains(&radix) {
        return range_error("toString() radix must be between 2 and 36");
    }
    Ok(Value::from(n.to_str_radix(radix as u32)))
}

/// BigInt.prototype.valueOf()
fn value_of(vm: &mut VM, this: &Value, _args: &[Value]) -> Result<Value> {
    Ok(Value::BigInt(this_bigint(vm, this, "valueOf")?))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::builtins::testing::{eval_str, thrown};

    #[test]
    fn test_wrap_unsigned() {
        assert_eq!(wrap_unsigned(&BigInt::from(-1), 8), BigInt::from(255));
        assert_eq!(wrap_unsigned(&BigInt::from(257), 8), BigInt::from(1));
    }

    #[test]
    fn test_conversion() {
        assert_eq!(eval_str("String(BigInt(42)) + ',' + BigInt('0x10') + ',' + BigInt(true)"), "42,16,1");
        assert_eq!(eval_str("typeof BigInt(1) + ',' + (BigInt(2 ** 53) + 1n)"), "bigint,9007199254740993");
        assert!(thrown("BigInt(1.5)").starts_with("RangeError"));
        assert!(thrown("BigInt('1.5')").starts_with("SyntaxError"));
        assert!(thrown("BigInt(undefined)").starts_with("TypeError"));
        assert!(thrown("new BigInt(1)").starts_with("TypeError"));
    }

    #[test]
    fn test_as_int_n() {
        assert_eq!(eval_str("String(BigInt.asUintN(8, -1n)) + ',' + BigInt.asIntN(8, 255n) + ',' + BigInt.asIntN(8, 127n)"), "255,-1,127");
        assert_eq!(eval_str("String(BigInt.asIntN(0, 5n))"), "0");
    }

    #[test]
    fn test_prototype() {
        assert_eq!(eval_str("(255n).toString(16) + ',' + (-8n).toString(2) + ',' + Object(3n).valueOf()"), "ff,-1000,3");
        assert_eq!(eval_str("Object.prototype.toString.call(1n)"), "[object BigInt]");
        assert!(thrown("BigInt.prototype.valueOf.call(1)").starts_with("TypeError"));
    }
}
