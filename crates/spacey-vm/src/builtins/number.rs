//! Number built-in object.
//!
//! Provides the Number constructor, its constants and predicates, and the
//! formatting methods on `Number.prototype`.

use num_traits::ToPrimitive;

use super::global::{parse_float, parse_int};
use super::{Builder, arg};
use crate::error::{Result, range_error, type_error};
use crate::gc::ObjectRef;
use crate::runtime::object::{JsObject, ObjectKind};
use crate::runtime::value::{Value, number_to_string};
use crate::vm::VM;

const DIGITS: &[u8] = b"0123456789abcdefghijklmnopqrstuvwxyz";

/// Largest argument `toFixed`, `toExponential` and `toPrecision` accept.
const MAX_FRACTION_DIGITS: f64 = 100.0;

pub(super) fn register(builder: &mut Builder<'_>) {
    let prototype = builder.intrinsics.number_prototype;
    let constructor = builder.constructor("Number", 1, number_call, Some(number_construct), prototype);

    builder.constant(constructor, "EPSILON", Value::Number(f64::EPSILON));
    builder.constant(constructor, "MAX_SAFE_INTEGER", Value::Number(9_007_199_254_740_991.0));
    builder.constant(constructor, "MIN_SAFE_INTEGER", Value::Number(-9_007_199_254_740_991.0));
    builder.constant(constructor, "MAX_VALUE", Value::Number(f64::MAX));
    builder.constant(constructor, "MIN_VALUE", Value::Number(5e-324));
    builder.constant(constructor, "NaN", Value::Number(f64::NAN));
    builder.constant(constructor, "POSITIVE_INFINITY", Value::Number(f64::INFINITY));
    builder.constant(constructor, "NEGATIVE_INFINITY", Value::Number(f64::NEG_INFINITY));

    builder.method(constructor, "isFinite", 1, is_finite);
    builder.method(constructor, "isInteger", 1, is_integer);
    builder.method(constructor, "isNaN", 1, is_nan);
    builder.method(constructor, "isSafeInteger", 1, is_safe_integer);

    // Number.parseInt === parseInt
    let global = builder.global;
    let parse_int = builder.method(constructor, "parseInt", 2, parse_int);
    builder.value(global, "parseInt", Value::Object(parse_int));
    let parse_float = builder.method(constructor, "parseFloat", 1, parse_float);
    builder.value(global, "parseFloat", Value::Object(parse_float));

    builder.method(prototype, "toString", 1, to_string);
    builder.method(prototype, "toLocaleString", 0, to_locale_string);
    builder.method(prototype, "valueOf", 0, value_of);
    builder.method(prototype, "toFixed", 1, to_fixed);
    builder.method(prototype, "toExponential", 1, to_exponential);
    builder.method(prototype, "toPrecision", 1, to_precision);
}

// ============================================================================
// Constructor
// ============================================================================

fn to_number_arg(vm: &mut VM, args: &[Value]) -> Result<f64> {
    let Some(value) = args.first() else {
        return Ok(0.0);
    };
    match vm.to_numeric(value)? {
        Value::BigInt(n) => Ok(n.to_f64().unwrap_or(f64::NAN)),
        numeric => vm.to_number(&numeric),
    }
}

/// Number(value)
fn number_call(vm: &mut VM, _this: &Value, args: &[Value]) -> Result<Value> {
    Ok(Value::Number(to_number_arg(vm, args)?))
}

/// new Number(value)
fn number_construct(vm: &mut VM, args: &[Value], new_target: ObjectRef) -> Result<Value> {
    let n = to_number_arg(vm, args)?;
    let fallback = vm.realm.intrinsics.number_prototype;
    let prototype = vm.prototype_from_constructor(new_target, fallback)?;
    Ok(Value::Object(vm.alloc(JsObject::with_kind(Some(prototype), ObjectKind::Number(n)))))
}

// ============================================================================
// Predicates
// ============================================================================

fn number_arg(args: &[Value]) -> Option<f64> {
    match args.first() {
        Some(Value::Number(n)) => Some(*n),
        _ => None,
    }
}

/// Number.isFinite(value)
fn is_finite(_vm: &mut VM, _this: &Value, args: &[Value]) -> Result<Value> {
    Ok(Value::Boolean(number_arg(args).is_some_and(f64::is_finite)))
}

/// Number.isInteger(value)
fn is_integer(_vm: &mut VM, _this: &Value, args: &[Value]) -> Result<Value> {
    Ok(Value::Boolean(number_arg(args).is_some_and(|n| n.is_finite() && n.trunc() == n)))
}

/// Number.isNaN(value)
fn is_nan(_vm: &mut VM, _this: &Value, args: &[Value]) -> Result<Value> {
    Ok(Value::Boolean(number_arg(args).is_some_and(f64::is_nan)))
}

/// Number.isSafeInteger(value)
fn is_safe_integer(_vm: &mut VM, _this: &Value, args: &[Value]) -> Result<Value> {
    Ok(Value::Boolean(number_arg(args).is_some_and(|n| {
        n.is_finite() && n.trunc() == n && n.abs() <= 9_007_199_254_740_991.0
    })))
}

// ============================================================================
// Prototype methods
// ============================================================================

/// thisNumberValue
fn this_number(vm: &VM, this: &Value, method: &str) -> Result<f64> {
    match this {
        Value::Number(n) => Ok(*n),
        Value::Object(object) => match vm.heap.object(*object)?.kind {
            ObjectKind::Number(n) => Ok(n),
            _ => type_error(format!("Number.prototype.{method} requires that 'this' be a Number")),
        },
        _ => type_error(format!("Number.prototype.{method} requires that 'this' be a Number")),
    }
}

/// A digit-count argument: an integer in `min..=100`.
fn digits_arg(vm: &mut VM, value: &Value, min: f64, method: &str) -> Result<usize> {
    let digits = vm.to_integer(value)?;
    if !(min..=MAX_FRACTION_DIGITS).contains(&digits) {
        return range_error(format!("{method}() argument must be between {min} and 100"));
    }
    Ok(digits as usize)
}

/// Number.prototype.toString(radix)
fn to_string(vm: &mut VM, this: &Value, args: &[Value]) -> Result<Value> {
    let n = this_number(vm, this, "toString")?;
    let radix = match arg(args, 0) {
        Value::Undefined => 10.0,
        value => vm.to_integer(&value)?,
    };
    if !(2.0..=36.0).contains(&radix) {
        return range_error("toString() radix must be between 2 and 36");
    }
    if radix == 10.0 || !n.is_finite() {
        return Ok(Value::from(number_to_string(n)));
    }
    Ok(Value::from(format_radix(n, radix as u32)))
}

/// Number.prototype.toLocaleString()
fn to_locale_string(vm: &mut VM, this: &Value, _args: &[Value]) -> Result<Value> {
    let n = this_number(vm, this, "toLocaleString")?;
    Ok(Value::from(number_to_string(n)))
}

/// Number.prototype.valueOf()
fn value_of(vm: &mut VM, this: &Value, _args: &[Value]) -> Result<Value> {
    Ok(Value::Number(this_number(vm, this, "valueOf")?))
}

/// Number.prototype.toFixed(fractionDigits)
fn to_fixed(vm: &mut VM, this: &Value, args: &[Value]) -> Result<Value> {
    let x = this_number(vm, this, "toFixed")?;
    let fraction = digits_arg(vm, &arg(args, 0), 0.0, "toFixed")?;
    if !x.is_finite() || x.abs() >= 1e21 {
        return Ok(Value::from(number_to_string(x)));
    }
    let sign = if x < 0.0 { "-" } else { "" };
    Ok(Value::from(format!("{sign}{}", fixed(x.abs(), fraction))))
}

/// Number.prototype.toExponential(fractionDigits)
fn to_exponential(vm: &mut VM, this: &Value, args: &[Value]) -> Result<Value> {
    let x = this_number(vm, this, "toExponential")?;
    let requested = arg(args, 0);
    let fraction = vm.to_integer(&requested)?;
    if !x.is_finite() {
        return Ok(Value::from(number_to_string(x)));
    }
    if !(0.0..=MAX_FRACTION_DIGITS).contains(&fraction) {
        return range_error("toExponential() argument must be between 0 and 100");
    }
    let sign = if x < 0.0 { "-" } else { "" };
    let (digits, exponent) = if x == 0.0 {
        (vec![0; fraction as usize + 1], 0)
    } else if requested.is_undefined() {
        shortest_digits(x.abs())
    } else {
        let (digits, exponent) = exact_digits(x.abs());
        round_digits(&digits, exponent, fraction as usize + 1)
    };
    Ok(Value::from(format!("{sign}{}", exponential(&digits, exponent))))
}

/// Number.prototype.toPrecision(precision)
fn to_precision(vm: &mut VM, this: &Value, args: &[Value]) -> Result<Value> {
    let x = this_number(vm, this, "toPrecision")?;
    let requested = arg(args, 0);
    if requested.is_undefined() {
        return Ok(Value::from(number_to_string(x)));
    }
    let precision = vm.to_integer(&requested)?;
    if !x.is_finite() {
        return Ok(Value::from(number_to_string(x)));
    }
    if !(1.0..=MAX_FRACTION_DIGITS).contains(&precision) {
        return range_error("toPrecision() argument must be between 1 and 100");
    }
    let precision = precision as usize;
    let sign = if x < 0.0 { "-" } else { "" };
    let (digits, exponent) = if x == 0.0 {
        (vec![0; precision], 0)
    } else {
        let (digits, exponent) = exact_digits(x.abs());
        round_digits(&digits, exponent, precision)
    };
    let text = if exponent < -6 || exponent >= precision as i32 {
        exponential(&digits, exponent)
    } else {
        let fraction = (precision as i32 - exponent - 1).max(0) as usize;
        positional(&digits, exponent, fraction)
    };
    Ok(Value::from(format!("{sign}{text}")))
}

// ============================================================================
// Formatting
// ============================================================================

/// The exact decimal expansion of a finite positive `x` as digits
/// `d0 d1 d2 ...` and the exponent of `d0`. Every double has at most 767
/// significant decimal digits.
fn exact_digits(x: f64) -> (Vec<u8>, i32) {
    split_scientific(&format!("{x:.767e}"))
}

/// The shortest digits that round-trip to `x`.
fn shortest_digits(x: f64) -> (Vec<u8>, i32) {
    split_scientific(&format!("{x:e}"))
}

fn split_scientific(text: &str) -> (Vec<u8>, i32) {
    let (mantissa, exponent) = text.split_once('e').unwrap_or((text, "0"));
    let mut digits: Vec<u8> = mantissa.bytes().filter(u8::is_ascii_digit).map(|b| b - b'0').collect();
    while digits.len() > 1 && digits.last() == Some(&0) {
        digits.pop();
    }
    (digits, exponent.parse().unwrap_or(0))
}

/// Rounds to `count` significant digits, ties away from zero. The result
/// has exactly `count` digits; the exponent grows when rounding carries.
fn round_digits(digits: &[u8], exponent: i32, count: usize) -> (Vec<u8>, i32) {
    let mut kept: Vec<u8> = digits.iter().copied().take(count).collect();
    kept.resize(count, 0);
    if digits.get(count).is_some_and(|&d| d >= 5) {
        let mut carry = true;
        for digit in kept.iter_mut().rev() {
            if *digit == 9 {
                *digit = 0;
            } else {
                *digit += 1;
                carry = false;
                break;
            }
        }
        if carry {
            kept.insert(0, 1);
            kept.truncate(count.max(1));
            return (kept, exponent + 1);
        }
    }
    (kept, exponent)
}

/// `d.ddd` followed by `e+n` / `e-n`.
fn exponential(digits: &[u8], exponent: i32) -> String {
    let mut out = String::with_capacity(digits.len() + 6);
    for (index, digit) in digits.iter().enumerate() {
        if index == 1 {
            out.push('.');
        }
        out.push((b'0' + digit) as char);
    }
    let sign = if exponent < 0 { '-' } else { '+' };
    out.push('e');
    out.push(sign);
    out.push_str(&exponent.abs().to_string());
    out
}

/// Positional notation with `fraction` digits after the point, for digits
/// starting at 10^exponent.
fn positional(digits: &[u8], exponent: i32, fraction: usize) -> String {
    let digit_at = |power: i32| -> char {
        let index = exponent - power;
        if index < 0 {
            return '0';
        }
        (b'0' + digits.get(index as usize).copied().unwrap_or(0)) as char
    };
    let mut out = String::new();
    for power in (0..=exponent.max(0)).rev() {
        out.push(digit_at(power));
    }
    if fraction > 0 {
        out.push('.');
        for power in 1..=fraction as i32 {
            out.push(digit_at(-power));
        }
    }
    out
}

/// `x` (finite, non-negative) with exactly `fraction` digits after the
/// point, rounding ties away from zero.
fn fixed(x: f64, fraction: usize) -> String {
    if x == 0.0 {
        return positional(&[0], 0, fraction);
    }
    let (digits, exponent) = exact_digits(x);
    let significant = exponent + 1 + fraction as i32;
    if significant < 0 {
        return positional(&[0], 0, fraction);
    }
    if significant == 0 {
        let rounded_up = digits.first().is_some_and(|&d| d >= 5);
        return if rounded_up {
            positional(&[1], exponent + 1, fraction)
        } else {
            positional(&[0], 0, fraction)
        };
    }
    let (digits, exponent) = round_digits(&digits, exponent, significant as usize);
    positional(&digits, exponent, fraction)
}

/// A finite number in a radix other than 10, with as many fraction digits
/// as it takes to identify the value.
fn format_radix(n: f64, radix: u32) -> String {
    let negative = n < 0.0;
    let value = n.abs();
    let base = radix as f64;
    let mut integer = value.trunc();
    let mut fraction = value - integer;

    // Half the distance to the next double, but at least the smallest one.
    let next = f64::from_bits(value.to_bits() + 1);
    let mut delta = (0.5 * (next - value)).max(f64::from_bits(1));
    let mut fraction_digits: Vec<u32> = Vec::new();
    if fraction >= delta {
        loop {
            fraction *= base;
            delta *= base;
            let digit = fraction as u32;
            fraction_digits.push(digit);
            fraction -= digit as f64;
            if fraction > 0.5 || (fraction == 0.5 && digit & 1 == 1) {
                if fraction + delta > 1.0 {
                    // Round up, carrying into the integer part if needed.
                    loop {
                        match fraction_digits.pop() {
                            None => {
                                integer += 1.0;
                                break;
                            }
                            Some(last) if last + 1 < radix => {
                                fraction_digits.push(last + 1);
                                break;
                            }
                            Some(_) => {}
                        }
                    }
                    break;
                }
            }
            if fraction < delta {
                break;
            }
        }
    }

    let mut integer_digits: Vec<u8> = Vec::new();
    while integer / base >= 9_007_199_254_740_992.0 {
        integer = (integer / base).trunc();
        integer_digits.push(b'0');
    }
    loop {
        let remainder = integer % base;
        integer_digits.push(DIGITS[remainder as usize]);
        integer = (integer - remainder) / base;
        if integer <= 0.0 {
            break;
        }
    }

    let mut out = String::with_capacity(integer_digits.len() + fraction_digits.len() + 2);
    if negative {
        out.push('-');
    }
    out.extend(integer_digits.iter().rev().map(|&b| b as char));
    if !fraction_digits.is_empty() {
        out.push('.');
        out.extend(fraction_digits.iter().map(|&d| DIGITS[d as usize] as char));
    }
    out
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::builtins::testing::{eval_str, thrown};

    #[test]
    fn test_format_radix() {
        assert_eq!(format_radix(255.0, 16), "ff");
        assert_eq!(format_radix(-255.0, 2), "-11111111");
        assert_eq!(format_radix(0.5, 2), "0.1");
        assert_eq!(format_radix(35.0, 36), "z");
    }

    #[test]
    fn test_round_digits() {
        assert_eq!(round_digits(&[1, 2, 5], 0, 2), (vec![1, 3], 0));
        assert_eq!(round_digits(&[9, 9, 5], 2, 2), (vec![1, 0], 3));
        assert_eq!(round_digits(&[1], 0, 3), (vec![1, 0, 0], 0));
    }

    #[test]
    fn test_fixed() {
        assert_eq!(fixed(1.005, 2), "1.00");
        assert_eq!(fixed(2.5, 0), "3");
        assert_eq!(fixed(0.5, 0), "1");
        assert_eq!(fixed(0.0004, 2), "0.00");
        assert_eq!(fixed(0.006, 2), "0.01");
        assert_eq!(fixed(123.456, 1), "123.5");
        assert_eq!(fixed(0.0, 3), "0.000");
    }

    #[test]
    fn test_constructor() {
        assert_eq!(eval_str("Number('42') + Number() + Number(true)"), "43");
        assert_eq!(eval_str("Number(10n) + ',' + Number('0x10') + ',' + Number('abc')"), "10,16,NaN");
        assert_eq!(eval_str("typeof new Number(1) + (new Number(5) + 1)"), "object6");
    }

    #[test]
    fn test_constants_and_predicates() {
        assert_eq!(eval_str("Number.MAX_SAFE_INTEGER === 2 ** 53 - 1"), "true");
        assert_eq!(eval_str("Number.isInteger(5) + ',' + Number.isInteger(5.5) + ',' + Number.isInteger('5')"), "true,false,false");
        assert_eq!(eval_str("Number.isNaN(NaN) + ',' + Number.isNaN('x') + ',' + isNaN('x')"), "true,false,true");
        assert_eq!(eval_str("Number.isSafeInteger(2 ** 53) + ',' + Number.isFinite(Infinity)"), "false,false");
        assert_eq!(eval_str("Number.parseInt === parseInt && Number.parseFloat === parseFloat"), "true");
        assert_eq!(eval_str("Number.MIN_VALUE > 0 && Number.EPSILON < 1e-15"), "true");
    }

    #[test]
    fn test_to_string_radix() {
        assert_eq!(eval_str("(255).toString(16) + ',' + (255).toString(2) + ',' + (-10).toString(36)"), "ff,11111111,-a");
        assert_eq!(eval_str("(0.5).toString(2) + ',' + (1.5).toString()"), "0.1,1.5");
        assert!(thrown("(1).toString(1)").starts_with("RangeError"));
        assert!(thrown("Number.prototype.toString.call('1')").starts_with("TypeError"));
    }

    #[test]
    fn test_to_fixed() {
        assert_eq!(eval_str("(3.14159).toFixed(2) + ',' + (1e21).toFixed(2) + ',' + (-1.5).toFixed(0)"), "3.14,1e+21,-2");
        assert_eq!(eval_str("(0).toFixed(2) + ',' + (-0.0001).toFixed(2)"), "0.00,-0.00");
        assert!(thrown("(1).toFixed(101)").starts_with("RangeError"));
    }

    #[test]
    fn test_to_exponential() {
        assert_eq!(eval_str("(123456).toExponential(2)"), "1.23e+5");
        assert_eq!(eval_str("(123456).toExponential()"), "1.23456e+5");
        assert_eq!(eval_str("(0.00015).toExponential(1)"), "1.5e-4");
        assert_eq!(eval_str("(0).toExponential() + ',' + (0).toExponential(2)"), "0e+0,0.00e+0");
        assert_eq!(eval_str("(NaN).toExponential(200)"), "NaN");
    }

    #[test]
    fn test_to_precision() {
        assert_eq!(eval_str("(123.456).toPrecision(4)"), "123.5");
        assert_eq!(eval_str("(0.000123).toPrecision(2)"), "0.00012");
        assert_eq!(eval_str("(123456).toPrecision(2)"), "1.2e+5");
        assert_eq!(eval_str("(1e-7).toPrecision(1)"), "1e-7");
        assert_eq!(eval_str("(5).toPrecision()"), "5");
        assert!(thrown("(1).toPrecision(0)").starts_with("RangeError"));
    }
}
