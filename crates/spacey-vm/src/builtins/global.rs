//! Global functions and value properties.

use super::{Builder, arg};
use crate::error::{Error, Result};
use crate::runtime::context::ErrorType;
use crate::runtime::object::{Attributes, PropertyKey, PropertySlot};
use crate::runtime::value::Value;
use crate::vm::VM;
use crate::vm::conversions::trim_js;

pub(super) fn register(builder: &mut Builder<'_>) {
    let global = builder.global;
    builder.constant(global, "NaN", Value::Number(f64::NAN));
    builder.constant(global, "Infinity", Value::Number(f64::INFINITY));
    builder.constant(global, "undefined", Value::Undefined);

    let eval = builder.intrinsics.eval;
    builder.define(eval, PropertyKey::from("length"), PropertySlot::data(Value::from(1), Attributes::CONFIGURABLE));
    builder.define(eval, PropertyKey::from("name"), PropertySlot::data(Value::from("eval"), Attributes::CONFIGURABLE));
    builder.value(global, "eval", Value::Object(eval));

    // parseInt and parseFloat are shared with Number; see number.rs.
    builder.method(global, "isNaN", 1, is_nan);
    builder.method(global, "isFinite", 1, is_finite);
    builder.method(global, "encodeURI", 1, encode_uri);
    builder.method(global, "decodeURI", 1, decode_uri);
    builder.method(global, "encodeURIComponent", 1, encode_uri_component);
    builder.method(global, "decodeURIComponent", 1, decode_uri_component);
}

/// eval(x) called indirectly. Direct calls never reach this function.
pub fn eval(vm: &mut VM, _this: &Value, args: &[Value]) -> Result<Value> {
    match arg(args, 0) {
        Value::String(source) => vm.eval_indirect(&source.to_std_string_lossy()),
        other => Ok(other),
    }
}

/// parseInt(string, radix)
pub fn parse_int(vm: &mut VM, _this: &Value, args: &[Value]) -> Result<Value> {
    let input = vm.to_rust_string(&arg(args, 0))?;
    let radix = vm.to_int32(&arg(args, 1))?;
    Ok(Value::Number(parse_int_str(&input, radix)))
}

/// The digits of `input` in `radix` (0 picks 10 or 16 from the prefix),
/// up to the first invalid character.
pub fn parse_int_str(input: &str, radix: i32) -> f64 {
    let s = trim_js(input);
    let (sign, s) = match s.as_bytes().first() {
        Some(b'-') => (-1.0, &s[1..]),
        Some(b'+') => (1.0, &s[1..]),
        _ => (1.0, s),
    };
    let has_hex_prefix = s.starts_with("0x") || s.starts_with("0X");
    let (radix, s) = match radix {
        0 if has_hex_prefix => (16, &s[2..]),
        0 => (10, s),
        16 if has_hex_prefix => (16, &s[2..]),
        2..=36 => (radix as u32, s),
        _ => return f64::NAN,
    };
    let digits: &str = match s.find(|c: char| !c.is_digit(radix)) {
        Some(end) => &s[..end],
        None => s,
    };
    if digits.is_empty() {
        return f64::NAN;
    }
    let value = if radix == 10 {
        // Decimal digits round like a numeric literal.
        digits.parse::<f64>().unwrap_or(f64::NAN)
    } else {
        digits
            .chars()
            .filter_map(|c| c.to_digit(radix))
            .fold(0.0, |acc, d| acc * radix as f64 + d as f64)
    };
    sign * value
}

/// parseFloat(string)
pub fn parse_float(vm: &mut VM, _this: &Value, args: &[Value]) -> Result<Value> {
    let input = vm.to_rust_string(&arg(args, 0))?;
    Ok(Value::Number(parse_float_str(&input)))
}

/// The longest prefix of `input` that is a decimal literal.
pub fn parse_float_str(input: &str) -> f64 {
    let s = trim_js(input);
    let unsigned = s.strip_prefix(['+', '-']).unwrap_or(s);
    let sign = if s.starts_with('-') { -1.0 } else { 1.0 };
    if unsigned.starts_with("Infinity") {
        return sign * f64::INFINITY;
    }

    let bytes = unsigned.as_bytes();
    let digits_from = |mut i: usize| {
        while i < bytes.len() && bytes[i].is_ascii_digit() {
            i += 1;
        }
        i
    };
    let mut end = digits_from(0);
    let integer_digits = end;
    let mut fraction_digits = 0;
    if end < bytes.len() && bytes[end] == b'.' {
        let after = digits_from(end + 1);
        fraction_digits = after - end - 1;
        end = after;
    }
    if integer_digits == 0 && fraction_digits == 0 {
        return f64::NAN;
    }
    if end < bytes.len() && (bytes[end] == b'e' || bytes[end] == b'E') {
        let mut i = end + 1;
        if i < bytes.len() && (bytes[i] == b'+' || bytes[i] == b'-') {
            i += 1;
        }
        let after = digits_from(i);
        if after > i {
            end = after;
        }
    }
    unsigned[..end].parse::<f64>().map(|n| sign * n).unwrap_or(f64::NAN)
}

/// isNaN(number)
pub fn is_nan(vm: &mut VM, _this: &Value, args: &[Value]) -> Result<Value> {
    Ok(Value::Boolean(vm.to_number(&arg(args, 0))?.is_nan()))
}

/// isFinite(number)
pub fn is_finite(vm: &mut VM, _this: &Value, args: &[Value]) -> Result<Value> {
    Ok(Value::Boolean(vm.to_number(&arg(args, 0))?.is_finite()))
}

// ============================================================================
// URI handling
// ============================================================================

const URI_RESERVED: &str = ";/?:@&=+$,#";
const URI_MARK: &str = "-_.!~*'()";

fn uri_error<T>(vm: &mut VM) -> Result<T> {
    Err(Error::Thrown(Value::Object(vm.new_error(ErrorType::Uri, "URI malformed"))))
}

fn encode(input: &str, keep: &str) -> String {
    let mut out = String::with_capacity(input.len());
    let mut buffer = [0u8; 4];
    for c in input.chars() {
        if c.is_ascii_alphanumeric() || URI_MARK.contains(c) || keep.contains(c) {
            out.push(c);
        } else {
            for byte in c.encode_utf8(&mut buffer).bytes() {
                out.push_str(&format!("%{byte:02X}"));
            }
        }
    }
    out
}

/// Decodes escapes, leaving the escapes of characters in `keep` as they
/// are. `None` for malformed input.
fn decode(input: &str, keep: &str) -> Option<String> {
    let bytes = input.as_bytes();
    let mut out: Vec<u8> = Vec::with_capacity(bytes.len());
    let mut i = 0;
    while i < bytes.len() {
        if bytes[i] != b'%' {
            out.push(bytes[i]);
            i += 1;
            continue;
        }
        let byte = hex_byte(bytes, i)?;
        if byte < 0x80 {
            if keep.contains(byte as char) {
                out.extend_from_slice(&bytes[i..i + 3]);
            } else {
                out.push(byte);
            }
            i += 3;
            continue;
        }
        let width = match byte {
            0xC0..=0xDF => 2,
            0xE0..=0xEF => 3,
            0xF0..=0xF7 => 4,
            _ => return None,
        };
        let mut sequence = vec![byte];
        for n in 1..width {
            let continuation = hex_byte(bytes, i + 3 * n)?;
            if continuation & 0xC0 != 0x80 {
                return None;
            }
            sequence.push(continuation);
        }
        std::str::from_utf8(&sequence).ok()?;
        out.extend_from_slice(&sequence);
        i += 3 * width;
    }
    String::from_utf8(out).ok()
}

fn hex_byte(bytes: &[u8], at: usize) -> Option<u8> {
    if bytes.get(at) != Some(&b'%') {
        return None;
    }
    let hex = std::str::from_utf8(bytes.get(at + 1..at + 3)?).ok()?;
    u8::from_str_radix(hex, 16).ok()
}

/// encodeURI(uri)
pub fn encode_uri(vm: &mut VM, _this: &Value, args: &[Value]) -> Result<Value> {
    // A lone surrogate has no UTF-8 encoding
    let Some(input) = vm.to_string(&arg(args, 0))?.to_std_string() else {
        return uri_error(vm);
    };
    Ok(Value::from(encode(&input, URI_RESERVED)))
}

/// encodeURIComponent(component)
pub fn encode_uri_component(vm: &mut VM, _this: &Value, args: &[Value]) -> Result<Value> {
    // A lone surrogate has no UTF-8 encoding
    let Some(input) = vm.to_string(&arg(args, 0))?.to_std_string() else {
        return uri_error(vm);
    };
    Ok(Value::from(encode(&input, "")))
}

/// decodeURI(uri)
pub fn decode_uri(vm: &mut VM, _this: &Value, args: &[Value]) -> Result<Value> {
    let input = vm.to_rust_string(&arg(args, 0))?;
    match decode(&input, URI_RESERVED) {
        Some(decoded) => Ok(Value::from(decoded)),
        None => uri_error(vm),
    }
}

/// decodeURIComponent(component)
pub fn decode_uri_component(vm: &mut VM, _this: &Value, args: &[Value]) -> Result<Value> {
    let input = vm.to_rust_string(&arg(args, 0))?;
    match decode(&input, "") {
        Some(decoded) => Ok(Value::from(decoded)),
        None => uri_error(vm),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::builtins::testing::{eval_str, thrown};

    #[test]
    fn test_parse_int_decimal() {
        assert_eq!(parse_int_str("42", 0), 42.0);
        assert_eq!(parse_int_str("-42", 0), -42.0);
        assert_eq!(parse_int_str("  42px", 0), 42.0);
        assert_eq!(parse_int_str("08", 0), 8.0);
    }

    #[test]
    fn test_parse_int_radix() {
        assert_eq!(parse_int_str("0xFF", 0), 255.0);
        assert_eq!(parse_int_str("0x10", 16), 16.0);
        assert_eq!(parse_int_str("1010", 2), 10.0);
        assert_eq!(parse_int_str("zz", 36), 1295.0);
        assert!(parse_int_str("10", 37).is_nan());
        assert!(parse_int_str("abc", 0).is_nan());
    }

    #[test]
    fn test_parse_float() {
        assert_eq!(parse_float_str("3.14abc"), 3.14);
        assert_eq!(parse_float_str(".5"), 0.5);
        assert_eq!(parse_float_str("1e3x"), 1000.0);
        assert_eq!(parse_float_str("1e"), 1.0);
        assert_eq!(parse_float_str("-Infinityx"), f64::NEG_INFINITY);
        assert!(parse_float_str("e5").is_nan());
        assert!(parse_float_str(".").is_nan());
    }

    #[test]
    fn test_is_nan_and_is_finite() {
        assert_eq!(eval_str("isNaN('hello') + ',' + isNaN('12')"), "true,false");
        assert_eq!(eval_str("isFinite(Infinity) + ',' + isFinite('1e3')"), "false,true");
    }

    #[test]
    fn test_uri_round_trip() {
        assert_eq!(eval_str("encodeURIComponent('a b=ü')"), "a%20b%3D%C3%BC");
        assert_eq!(eval_str("encodeURI('/a b?x=1#y')"), "/a%20b?x=1#y");
        assert_eq!(eval_str("decodeURIComponent('a%20b%3D%C3%BC')"), "a b=ü");
        assert_eq!(eval_str("decodeURI('%3Fa%20')"), "%3Fa ");
    }

    #[test]
    fn test_malformed_uri_throws_uri_error() {
        assert_eq!(thrown("decodeURIComponent('%E0%A4%A')"), "URIError: URI malformed");
        assert_eq!(thrown("decodeURIComponent('%')"), "URIError: URI malformed");
        assert_eq!(thrown("encodeURIComponent('\\ud800')"), "URIError: URI malformed");
        assert_eq!(eval_str("encodeURIComponent('\\ud83d\\ude00')"), "%F0%9F%98%80");
    }

    #[test]
    fn test_indirect_eval_uses_global_scope() {
        assert_eq!(eval_str("var x = 'global'; function f() { var x = 'local'; return (0, eval)('x'); } f()"), "global");
        assert_eq!(eval_str("eval(42)"), "42");
    }
}
