//! Math built-in object.
//!
//! The Math object provides mathematical constants and functions.
//! Unlike other built-in objects, Math is not a constructor.

use std::time::{SystemTime, UNIX_EPOCH};

use super::{Builder, arg};
use crate::error::Result;
use crate::runtime::value::Value;
use crate::vm::VM;
use crate::vm::arithmetic::number_pow;
use crate::vm::conversions::{to_int32, to_uint32};

pub(super) fn register(builder: &mut Builder<'_>) {
    let math = builder.namespace("Math");

    builder.constant(math, "E", Value::Number(std::f64::consts::E));
    builder.constant(math, "LN10", Value::Number(std::f64::consts::LN_10));
    builder.constant(math, "LN2", Value::Number(std::f64::consts::LN_2));
    builder.constant(math, "LOG2E", Value::Number(std::f64::consts::LOG2_E));
    builder.constant(math, "LOG10E", Value::Number(std::f64::consts::LOG10_E));
    builder.constant(math, "PI", Value::Number(std::f64::consts::PI));
    builder.constant(math, "SQRT1_2", Value::Number(std::f64::consts::FRAC_1_SQRT_2));
    builder.constant(math, "SQRT2", Value::Number(std::f64::consts::SQRT_2));

    builder.method(math, "abs", 1, abs);
    builder.method(math, "acos", 1, acos);
    builder.method(math, "acosh", 1, acosh);
    builder.method(math, "asin", 1, asin);
    builder.method(math, "asinh", 1, asinh);
    builder.method(math, "atan", 1, atan);
    builder.method(math, "atanh", 1, atanh);
    builder.method(math, "atan2", 2, atan2);
    builder.method(math, "cbrt", 1, cbrt);
    builder.method(math, "ceil", 1, ceil);
    builder.method(math, "clz32", 1, clz32);
    builder.method(math, "cos", 1, cos);
    builder.method(math, "cosh", 1, cosh);
    builder.method(math, "exp", 1, exp);
    builder.method(math, "expm1", 1, expm1);
    builder.method(math, "floor", 1, floor);
    builder.method(math, "fround", 1, fround);
    builder.method(math, "hypot", 2, hypot);
    builder.method(math, "imul", 2, imul);
    builder.method(math, "log", 1, log);
    builder.method(math, "log1p", 1, log1p);
    builder.method(math, "log10", 1, log10);
    builder.method(math, "log2", 1, log2);
    builder.method(math, "max", 2, max);
    builder.method(math, "min", 2, min);
    builder.method(math, "pow", 2, pow);
    builder.method(math, "random", 0, random);
    builder.method(math, "round", 1, round);
    builder.method(math, "sign", 1, sign);
    builder.method(math, "sin", 1, sin);
    builder.method(math, "sinh", 1, sinh);
    builder.method(math, "sqrt", 1, sqrt);
    builder.method(math, "tan", 1, tan);
    builder.method(math, "tanh", 1, tanh);
    builder.method(math, "trunc", 1, trunc);
}

fn number(vm: &mut VM, args: &[Value], index: usize) -> Result<f64> {
    vm.to_number(&arg(args, index))
}

/// Defines `Math.<name>(x)` as `f(ToNumber(x))`.
macro_rules! unary {
    ($($name:ident => $f:expr;)*) => {
        $(
            fn $name(vm: &mut VM, _this: &Value, args: &[Value]) -> Result<Value> {
                let f: fn(f64) -> f64 = $f;
                Ok(Value::Number(f(number(vm, args, 0)?)))
            }
        )*
    };
}

unary! {
    abs => f64::abs;
    acos => f64::acos;
    acosh => f64::acosh;
    asin => f64::asin;
    asinh => f64::asinh;
    atan => f64::atan;
    atanh => f64::atanh;
    cbrt => f64::cbrt;
    ceil => f64::ceil;
    cos => f64::cos;
    cosh => f64::cosh;
    exp => f64::exp;
    expm1 => f64::exp_m1;
    floor => f64::floor;
    fround => |x| x as f32 as f64;
    log => f64::ln;
    log1p => f64::ln_1p;
    log10 => f64::log10;
    log2 => f64::log2;
    round => round_half_up;
    sign => |x| if x.is_nan() || x == 0.0 { x } else { x.signum() };
    sin => f64::sin;
    sinh => f64::sinh;
    sqrt => f64::sqrt;
    tan => f64::tan;
    tanh => f64::tanh;
    trunc => f64::trunc;
}

/// Rounds half-way cases towards +∞, keeping -0 for `-0.5 <= x < 0`.
fn round_half_up(x: f64) -> f64 {
    if !x.is_finite() || x == 0.0 {
        return x;
    }
    if (-0.5..0.0).contains(&x) {
        return -0.0;
    }
    let floor = x.floor();
    if x - floor >= 0.5 { floor + 1.0 } else { floor }
}

/// Math.atan2(y, x)
fn atan2(vm: &mut VM, _this: &Value, args: &[Value]) -> Result<Value> {
    let y = number(vm, args, 0)?;
    let x = number(vm, args, 1)?;
    Ok(Value::Number(y.atan2(x)))
}

/// Math.pow(base, exponent)
fn pow(vm: &mut VM, _this: &Value, args: &[Value]) -> Result<Value> {
    let base = number(vm, args, 0)?;
    let exponent = number(vm, args, 1)?;
    Ok(Value::Number(number_pow(base, exponent)))
}

/// Math.clz32(x)
fn clz32(vm: &mut VM, _this: &Value, args: &[Value]) -> Result<Value> {
    let n = to_uint32(number(vm, args, 0)?);
    Ok(Value::from(n.leading_zeros()))
}

/// Math.imul(a, b)
fn imul(vm: &mut VM, _this: &Value, args: &[Value]) -> Result<Value> {
    let a = to_int32(number(vm, args, 0)?);
    let b = to_int32(number(vm, args, 1)?);
    Ok(Value::from(a.wrapping_mul(b)))
}

/// Math.hypot(...values)
fn hypot(vm: &mut VM, _this: &Value, args: &[Value]) -> Result<Value> {
    let mut values = Vec::with_capacity(args.len());
    for value in args {
        values.push(vm.to_number(value)?);
    }
    if values.iter().any(|v| v.is_infinite()) {
        return Ok(Value::Number(f64::INFINITY));
    }
    if values.iter().any(|v| v.is_nan()) {
        return Ok(Value::Number(f64::NAN));
    }
    let largest = values.iter().fold(0.0f64, |acc, v| acc.max(v.abs()));
    if largest == 0.0 {
        return Ok(Value::Number(0.0));
    }
    let sum: f64 = values.iter().map(|v| (v / largest).powi(2)).sum();
    Ok(Value::Number(largest * sum.sqrt()))
}

/// Math.max(...values)
fn max(vm: &mut VM, _this: &Value, args: &[Value]) -> Result<Value> {
    let mut result = f64::NEG_INFINITY;
    for value in args {
        let n = vm.to_number(value)?;
        if n.is_nan() || result.is_nan() {
            result = f64::NAN;
        } else if n > result || (n == 0.0 && result == 0.0 && result.is_sign_negative()) {
            result = n;
        }
    }
    Ok(Value::Number(result))
}

/// Math.min(...values)
fn min(vm: &mut VM, _this: &Value, args: &[Value]) -> Result<Value> {
    let mut result = f64::INFINITY;
    for value in args {
        let n = vm.to_number(value)?;
        if n.is_nan() || result.is_nan() {
            result = f64::NAN;
        } else if n < result || (n == 0.0 && result == 0.0 && n.is_sign_negative()) {
            result = n;
        }
    }
    Ok(Value::Number(result))
}

/// Initial state for `Math.random`, taken from the clock. Never zero.
pub(crate) fn seed() -> u64 {
    let nanos = SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map(|elapsed| elapsed.as_nanos() as u64)
        .unwrap_or(0);
    // splitmix64 finaliser
    let mut z = nanos.wrapping_add(0x9E37_79B9_7F4A_7C15);
    z = (z ^ (z >> 30)).wrapping_mul(0xBF58_476D_1CE4_E5B9);
    z = (z ^ (z >> 27)).wrapping_mul(0x94D0_49BB_1331_11EB);
    (z ^ (z >> 31)) | 1
}

/// Math.random(): xorshift64* over the VM's state, in `[0, 1)`.
fn random(vm: &mut VM, _this: &Value, _args: &[Value]) -> Result<Value> {
    let mut x = vm.random_state;
    x ^= x >> 12;
    x ^= x << 25;
    x ^= x >> 27;
    vm.random_state = x;
    let bits = x.wrapping_mul(0x2545_F491_4F6C_DD1D) >> 11;
    Ok(Value::Number(bits as f64 / (1u64 << 53) as f64))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::builtins::testing::eval_str;

    #[test]
    fn test_round_half_up() {
        assert_eq!(round_half_up(2.5), 3.0);
        assert_eq!(round_half_up(-2.5), -2.0);
        assert_eq!(round_half_up(-2.6), -3.0);
        assert!(round_half_up(-0.4).is_sign_negative());
        assert_eq!(round_half_up(0.49999999999999994), 0.0);
    }

    #[test]
    fn test_seed_is_nonzero() {
        assert_ne!(seed(), 0);
    }

    #[test]
    fn test_random_in_range() {
        let mut vm = VM::default();
        for _ in 0..1000 {
            let Value::Number(n) = random(&mut vm, &Value::Undefined, &[]).unwrap() else {
                panic!("Math.random returned a non-number");
            };
            assert!((0.0..1.0).contains(&n));
        }
    }

    #[test]
    fn test_constants_are_read_only() {
        assert_eq!(eval_str("Math.PI = 3; Math.PI > 3.14"), "true");
        assert_eq!(eval_str("Object.prototype.toString.call(Math)"), "[object Math]");
    }

    #[test]
    fn test_functions() {
        assert_eq!(eval_str("[Math.abs(-3), Math.floor(1.7), Math.ceil(1.2), Math.trunc(-1.7)].join()"), "3,1,2,-1");
        assert_eq!(eval_str("[Math.max(1, 5, 3), Math.min(1, 5, 3), Math.max(), Math.min()].join()"), "5,1,-Infinity,Infinity");
        assert_eq!(eval_str("Math.max(1, NaN) + ',' + Object.is(Math.max(-0, 0), 0) + ',' + Object.is(Math.min(0, -0), -0)"), "NaN,true,true");
        assert_eq!(eval_str("[Math.pow(2, 10), Math.pow(1, Infinity), Math.sqrt(16), Math.cbrt(27)].join()"), "1024,NaN,4,3");
        assert_eq!(eval_str("[Math.sign(-5), Math.hypot(3, 4), Math.clz32(1), Math.imul(0xffffffff, 5)].join()"), "-1,5,31,-5");
        assert_eq!(eval_str("Math.round(2.5) + ',' + Math.round(-2.5) + ',' + Object.is(Math.round(-0.2), -0)"), "3,-2,true");
        assert_eq!(eval_str("Math.fround(5.5) + ',' + Math.log2(8) + ',' + Math.log10(1000)"), "5.5,3,3");
    }
}
