//! String built-in constructor and prototype methods.
//!
//! Positions and lengths are in UTF-16 code units, as scripts see them.
//! Methods that index into a string work on its code units and convert
//! back at the end.

use super::{Builder, arg, regexp};
use crate::error::{Result, range_error, type_error};
use crate::gc::ObjectRef;
use crate::runtime::object::{JsObject, ListIterator, ObjectKind};
use crate::runtime::string::{JsString, push_str};
use crate::runtime::value::Value;
use crate::vm::VM;
use crate::lexer::{is_line_terminator, is_whitespace};
use crate::vm::conversions::{relative_index, to_uint32};

pub(super) fn register(builder: &mut Builder<'_>) {
    let prototype = builder.intrinsics.string_prototype;
    let constructor = builder.constructor("String", 1, string_call, Some(string_construct), prototype);
    builder.method(constructor, "fromCharCode", 1, from_char_code);
    builder.method(constructor, "fromCodePoint", 1, from_code_point);
    builder.method(constructor, "raw", 1, raw);

    builder.method(prototype, "at", 1, at);
    builder.method(prototype, "charAt", 1, char_at);
    builder.method(prototype, "charCodeAt", 1, char_code_at);
    builder.method(prototype, "codePointAt", 1, code_point_at);
    builder.method(prototype, "concat", 1, concat);
    builder.method(prototype, "endsWith", 1, ends_with);
    builder.method(prototype, "includes", 1, includes);
    builder.method(prototype, "indexOf", 1, index_of);
    builder.method(prototype, "lastIndexOf", 1, last_index_of);
    builder.method(prototype, "localeCompare", 1, locale_compare);
    builder.method(prototype, "match", 1, match_method);
    builder.method(prototype, "matchAll", 1, match_all);
    builder.method(prototype, "padEnd", 1, pad_end);
    builder.method(prototype, "padStart", 1, pad_start);
    builder.method(prototype, "repeat", 1, repeat);
    builder.method(prototype, "replace", 2, replace);
    builder.method(prototype, "replaceAll", 2, replace_all);
    builder.method(prototype, "search", 1, search);
    builder.method(prototype, "slice", 2, slice);
    builder.method(prototype, "split", 2, split);
    builder.method(prototype, "startsWith", 1, starts_with);
    builder.method(prototype, "substr", 2, substr);
    builder.method(prototype, "substring", 2, substring);
    builder.method(prototype, "toLowerCase", 0, to_lower_case);
    builder.method(prototype, "toLocaleLowerCase", 0, to_lower_case);
    builder.method(prototype, "toUpperCase", 0, to_upper_case);
    builder.method(prototype, "toLocaleUpperCase", 0, to_upper_case);
    builder.method(prototype, "toString", 0, to_string);
    builder.method(prototype, "trim", 0, trim);
    builder.method(prototype, "trimStart", 0, trim_start);
    builder.method(prototype, "trimEnd", 0, trim_end);
    builder.method(prototype, "valueOf", 0, to_string);
    let iterator = builder.symbols.iterator.clone();
    builder.symbol_method(prototype, iterator, "[Symbol.iterator]", 0, iterator_method);
}

// ============================================================================
// Helpers
// ============================================================================

/// RequireObjectCoercible(this) followed by ToString.
fn this_string(vm: &mut VM, this: &Value, method: &str) -> Result<JsString> {
    if this.is_nullish() {
        return type_error(format!("String.prototype.{method} called on null or undefined"));
    }
    vm.to_string(this)
}

/// ToIntegerOrInfinity of an optional argument; `default` when undefined.
fn integer_arg(vm: &mut VM, value: &Value, default: f64) -> Result<f64> {
    if value.is_undefined() {
        return Ok(default);
    }
    vm.to_integer(value)
}

// ============================================================================
// Constructor
// ============================================================================

/// String(value)
fn string_call(vm: &mut VM, _this: &Value, args: &[Value]) -> Result<Value> {
    match args.first() {
        None => Ok(Value::from("")),
        Some(Value::Symbol(symbol)) => Ok(Value::from(symbol.to_string())),
        Some(value) => Ok(Value::String(vm.to_string(value)?)),
    }
}

/// new String(value)
fn string_construct(vm: &mut VM, args: &[Value], new_target: ObjectRef) -> Result<Value> {
    let value = match args.first() {
        None => JsString::empty(),
        Some(value) => vm.to_string(value)?,
    };
    let fallback = vm.realm.intrinsics.string_prototype;
    let prototype = vm.prototype_from_constructor(new_target, fallback)?;
    Ok(Value::Object(vm.alloc(JsObject::with_kind(Some(prototype), ObjectKind::String(value)))))
}

/// String.fromCharCode(...codes)
fn from_char_code(vm: &mut VM, _this: &Value, args: &[Value]) -> Result<Value> {
    let mut code_units = Vec::with_capacity(args.len());
    for value in args {
        code_units.push(to_uint32(vm.to_number(value)?) as u16);
    }
    Ok(Value::String(JsString::from(code_units)))
}

/// String.fromCodePoint(...codePoints)
fn from_code_point(vm: &mut VM, _this: &Value, args: &[Value]) -> Result<Value> {
    let mut out = Vec::with_capacity(args.len());
    for value in args {
        let n = vm.to_number(value)?;
        if n.fract() != 0.0 || !(0.0..=1_114_111.0).contains(&n) {
            return range_error(format!("Invalid code point {}", vm.to_string(value)?));
        }
        match char::from_u32(n as u32) {
            Some(c) => {
                let mut buffer = [0; 2];
                out.extend_from_slice(c.encode_utf16(&mut buffer));
            }
            // A surrogate code point is its own code unit
            None => out.push(n as u16),
        }
    }
    Ok(Value::String(JsString::from(out)))
}

/// String.raw(template, ...substitutions)
fn raw(vm: &mut VM, _this: &Value, args: &[Value]) -> Result<Value> {
    let template = vm.to_object(&arg(args, 0))?;
    let raw = vm.get_named(&Value::Object(template), "raw")?;
    let strings = vm.array_like_to_vec(&raw)?;
    let mut out = Vec::new();
    for (index, chunk) in strings.iter().enumerate() {
        out.extend_from_slice(vm.to_string(chunk)?.as_units());
        if index + 1 < strings.len()
            && let Some(substitution) = args.get(index + 1)
        {
            out.extend_from_slice(vm.to_string(substitution)?.as_units());
        }
    }
    Ok(Value::String(JsString::from(out)))
}

// ============================================================================
// Character access
// ============================================================================

/// String.prototype.charAt(pos)
fn char_at(vm: &mut VM, this: &Value, args: &[Value]) -> Result<Value> {
    let s = this_string(vm, this, "charAt")?;
    let position = integer_arg(vm, &arg(args, 0), 0.0)?;
    if position < 0.0 || position >= s.len() as f64 {
        return Ok(Value::from(""));
    }
    Ok(Value::String(s.slice(position as usize, position as usize + 1)))
}

/// String.prototype.charCodeAt(pos)
fn char_code_at(vm: &mut VM, this: &Value, args: &[Value]) -> Result<Value> {
    let s = this_string(vm, this, "charCodeAt")?;
    let position = integer_arg(vm, &arg(args, 0), 0.0)?;
    if position < 0.0 || position >= s.len() as f64 {
        return Ok(Value::Number(f64::NAN));
    }
    Ok(s.get(position as usize).map(|unit| Value::from(unit as u32)).unwrap_or(Value::Number(f64::NAN)))
}

/// String.prototype.codePointAt(pos)
fn code_point_at(vm: &mut VM, this: &Value, args: &[Value]) -> Result<Value> {
    let s = this_string(vm, this, "codePointAt")?;
    let position = integer_arg(vm, &arg(args, 0), 0.0)?;
    if position < 0.0 {
        return Ok(Value::Undefined);
    }
    Ok(s.code_point_at(position as usize).map(Value::from).unwrap_or_default())
}

/// String.prototype.at(index)
fn at(vm: &mut VM, this: &Value, args: &[Value]) -> Result<Value> {
    let s = this_string(vm, this, "at")?;
    let length = s.len() as f64;
    let relative = vm.to_integer(&arg(args, 0))?;
    let index = if relative < 0.0 { length + relative } else { relative };
    if index < 0.0 || index >= length {
        return Ok(Value::Undefined);
    }
    Ok(Value::String(s.slice(index as usize, index as usize + 1)))
}

// ============================================================================
// Searching
// ============================================================================

/// String.prototype.indexOf(search, position)
fn index_of(vm: &mut VM, this: &Value, args: &[Value]) -> Result<Value> {
    let s = this_string(vm, this, "indexOf")?;
    let search = vm.to_string(&arg(args, 0))?;
    let from = integer_arg(vm, &arg(args, 1), 0.0)?.clamp(0.0, s.len() as f64) as usize;
    Ok(Value::Number(s.find(search.as_units(), from).map_or(-1.0, |i| i as f64)))
}

/// String.prototype.lastIndexOf(search, position)
fn last_index_of(vm: &mut VM, this: &Value, args: &[Value]) -> Result<Value> {
    let s = this_string(vm, this, "lastIndexOf")?;
    let search = vm.to_string(&arg(args, 0))?;
    let position = vm.to_number(&arg(args, 1))?;
    let from = if position.is_nan() {
        s.len()
    } else {
        position.trunc().clamp(0.0, s.len() as f64) as usize
    };
    Ok(Value::Number(s.rfind(search.as_units(), from).map_or(-1.0, |i| i as f64)))
}

fn reject_regexp(vm: &VM, value: &Value, method: &str) -> Result<()> {
    if regexp::as_regexp(vm, value).is_some() {
        return type_error(format!(
            "First argument to String.prototype.{method} must not be a regular expression"
        ));
    }
    Ok(())
}

/// String.prototype.includes(search, position)
fn includes(vm: &mut VM, this: &Value, args: &[Value]) -> Result<Value> {
    let s = this_string(vm, this, "includes")?;
    reject_regexp(vm, &arg(args, 0), "includes")?;
    let search = vm.to_string(&arg(args, 0))?;
    let from = integer_arg(vm, &arg(args, 1), 0.0)?.clamp(0.0, s.len() as f64) as usize;
    Ok(Value::Boolean(s.find(search.as_units(), from).is_some()))
}

/// String.prototype.startsWith(search, position)
fn starts_with(vm: &mut VM, this: &Value, args: &[Value]) -> Result<Value> {
    let s = this_string(vm, this, "startsWith")?;
    reject_regexp(vm, &arg(args, 0), "startsWith")?;
    let search = vm.to_string(&arg(args, 0))?;
    let start = integer_arg(vm, &arg(args, 1), 0.0)?.clamp(0.0, s.len() as f64) as usize;
    Ok(Value::Boolean(s.as_units()[start..].starts_with(search.as_units())))
}

/// String.prototype.endsWith(search, endPosition)
fn ends_with(vm: &mut VM, this: &Value, args: &[Value]) -> Result<Value> {
    let s = this_string(vm, this, "endsWith")?;
    reject_regexp(vm, &arg(args, 0), "endsWith")?;
    let search = vm.to_string(&arg(args, 0))?;
    let length = s.len() as f64;
    let end = integer_arg(vm, &arg(args, 1), length)?.clamp(0.0, length) as usize;
    Ok(Value::Boolean(s.as_units()[..end].ends_with(search.as_units())))
}

/// String.prototype.localeCompare(that)
fn locale_compare(vm: &mut VM, this: &Value, args: &[Value]) -> Result<Value> {
    let s = this_string(vm, this, "localeCompare")?;
    let other = vm.to_string(&arg(args, 0))?;
    // Code point order, not code unit order
    Ok(Value::Number(match s.code_points().cmp(other.code_points()) {
        std::cmp::Ordering::Less => -1.0,
        std::cmp::Ordering::Equal => 0.0,
        std::cmp::Ordering::Greater => 1.0,
    }))
}

/// String.prototype.match(regexp)
fn match_method(vm: &mut VM, this: &Value, args: &[Value]) -> Result<Value> {
    let s = this_string(vm, this, "match")?;
    let rx = match regexp::as_regexp(vm, &arg(args, 0)) {
        Some(rx) => rx,
        None => regexp::from_pattern_arg(vm, &arg(args, 0), "")?,
    };
    regexp::match_regexp(vm, rx, &s)
}

/// String.prototype.matchAll(regexp)
fn match_all(vm: &mut VM, this: &Value, args: &[Value]) -> Result<Value> {
    let s = this_string(vm, this, "matchAll")?;
    let rx = match regexp::as_regexp(vm, &arg(args, 0)) {
        Some(rx) => {
            if !regexp::flags_of(vm, rx)?.contains('g') {
                return type_error("String.prototype.matchAll called with a non-global RegExp argument");
            }
            rx
        }
        None => regexp::from_pattern_arg(vm, &arg(args, 0), "g")?,
    };
    regexp::match_all(vm, rx, &s)
}

/// String.prototype.search(regexp)
fn search(vm: &mut VM, this: &Value, args: &[Value]) -> Result<Value> {
    let s = this_string(vm, this, "search")?;
    let rx = match regexp::as_regexp(vm, &arg(args, 0)) {
        Some(rx) => rx,
        None => regexp::from_pattern_arg(vm, &arg(args, 0), "")?,
    };
    regexp::search(vm, rx, &s)
}

// ============================================================================
// Replacement
// ============================================================================

/// One match, as seen by a replacement template or function.
pub(super) struct MatchInfo<'a> {
    /// The subject string
    pub subject: &'a [u16],
    /// Start of the match
    pub position: usize,
    /// The matched text
    pub matched: &'a [u16],
    /// Capture groups; `None` for non-participating groups
    pub captures: &'a [Option<Vec<u16>>],
    /// Named groups object, if the pattern has any
    pub groups: Option<&'a Value>,
}

/// GetSubstitution: expands `$$`, `$&`, `` $` ``, `$'`, `$n`, `$nn` and
/// `$<name>` in a replacement template.
pub(super) fn expand_template(vm: &mut VM, template: &[u16], info: &MatchInfo<'_>) -> Result<Vec<u16>> {
    let dollar = b'$' as u16;
    let mut out = Vec::with_capacity(template.len());
    let mut i = 0;
    while i < template.len() {
        let c = template[i];
        let next = template.get(i + 1).copied();
        if c != dollar || next.is_none() {
            out.push(c);
            i += 1;
            continue;
        }
        let next = next.unwrap_or_default();
        let digit = |u: Option<u16>| u.and_then(|u| char::from_u32(u as u32)).and_then(|c| c.to_digit(10));
        match next {
            n if n == dollar => {
                out.push(dollar);
                i += 2;
            }
            n if n == b'&' as u16 => {
                out.extend_from_slice(info.matched);
                i += 2;
            }
            n if n == b'`' as u16 => {
                out.extend_from_slice(&info.subject[..info.position]);
                i += 2;
            }
            n if n == b'\'' as u16 => {
                let end = (info.position + info.matched.len()).min(info.subject.len());
                out.extend_from_slice(&info.subject[end..]);
                i += 2;
            }
            n if n == b'<' as u16 && info.groups.is_some() => {
                let close = template[i + 2..].iter().position(|&u| u == b'>' as u16);
                match (close, info.groups) {
                    (Some(close), Some(groups)) => {
                        let name = String::from_utf16_lossy(&template[i + 2..i + 2 + close]);
                        let value = vm.get_named(groups, &name)?;
                        if !value.is_undefined() {
                            out.extend_from_slice(vm.to_string(&value)?.as_units());
                        }
                        i += close + 3;
                    }
                    _ => {
                        out.push(c);
                        i += 1;
                    }
                }
            }
            _ => match digit(Some(next)) {
                Some(first) => {
                    let count = info.captures.len();
                    let two = digit(template.get(i + 2).copied()).map(|second| first * 10 + second);
                    let (index, width) = match two {
                        Some(two) if two >= 1 && (two as usize) <= count => (two as usize, 3),
                        _ => (first as usize, 2),
                    };
                    if index >= 1 && index <= count {
                        if let Some(capture) = &info.captures[index - 1] {
                            out.extend_from_slice(capture);
                        }
                        i += width;
                    } else {
                        out.push(c);
                        i += 1;
                    }
                }
                None => {
                    out.push(c);
                    i += 1;
                }
            },
        }
    }
    Ok(out)
}

/// Computes the replacement text of one match: calls `replacement` if it is
/// a function, expands it as a template otherwise.
pub(super) fn replacement_text(vm: &mut VM, replacement: &Value, info: &MatchInfo<'_>) -> Result<Vec<u16>> {
    if vm.is_callable(replacement) {
        let mut call_args = vec![Value::String(JsString::from(info.matched))];
        for capture in info.captures {
            call_args.push(capture.as_deref().map(|c| Value::String(JsString::from(c))).unwrap_or_default());
        }
        call_args.push(Value::from(info.position));
        call_args.push(Value::String(JsString::from(info.subject)));
        if let Some(groups) = info.groups {
            call_args.push(groups.clone());
        }
        let result = vm.call(replacement, &Value::Undefined, &call_args)?;
        return Ok(vm.to_string(&result)?.as_units().to_vec());
    }
    let template = vm.to_string(replacement)?;
    expand_template(vm, template.as_units(), info)
}

fn replace_string(vm: &mut VM, this: &Value, args: &[Value], all: bool) -> Result<Value> {
    let method = if all { "replaceAll" } else { "replace" };
    let s = this_string(vm, this, method)?;
    let pattern = arg(args, 0);
    let replacement = arg(args, 1);
    if let Some(rx) = regexp::as_regexp(vm, &pattern) {
        if all && !regexp::flags_of(vm, rx)?.contains('g') {
            return type_error("replaceAll must be called with a global RegExp");
        }
        return regexp::replace(vm, rx, &s, &replacement);
    }
    let subject = s.as_units();
    let needle = vm.to_string(&pattern)?;
    let needle = needle.as_units();
    let replacement = if vm.is_callable(&replacement) {
        replacement
    } else {
        Value::String(vm.to_string(&replacement)?)
    };

    let mut positions = Vec::new();
    let mut from = 0;
    while let Some(found) = s.find(needle, from) {
        positions.push(found);
        if !all {
            break;
        }
        from = found + needle.len().max(1);
        if from > subject.len() {
            break;
        }
    }
    let mut out = Vec::with_capacity(subject.len());
    let mut last = 0;
    for position in positions {
        out.extend_from_slice(&subject[last..position]);
        let info = MatchInfo {
            subject,
            position,
            matched: needle,
            captures: &[],
            groups: None,
        };
        out.extend(replacement_text(vm, &replacement, &info)?);
        last = position + needle.len();
    }
    out.extend_from_slice(&subject[last.min(subject.len())..]);
    Ok(Value::String(JsString::from(out)))
}

/// String.prototype.replace(pattern, replacement)
fn replace(vm: &mut VM, this: &Value, args: &[Value]) -> Result<Value> {
    replace_string(vm, this, args, false)
}

/// String.prototype.replaceAll(pattern, replacement)
fn replace_all(vm: &mut VM, this: &Value, args: &[Value]) -> Result<Value> {
    replace_string(vm, this, args, true)
}

// ============================================================================
// Slicing
// ============================================================================

/// String.prototype.slice(start, end)
fn slice(vm: &mut VM, this: &Value, args: &[Value]) -> Result<Value> {
    let s = this_string(vm, this, "slice")?;
    let length = s.len() as f64;
    let start = relative_index(integer_arg(vm, &arg(args, 0), 0.0)?, length);
    let end = relative_index(integer_arg(vm, &arg(args, 1), length)?, length);
    if start >= end {
        return Ok(Value::from(""));
    }
    Ok(Value::String(s.slice(start as usize, end as usize)))
}

/// String.prototype.substring(start, end)
fn substring(vm: &mut VM, this: &Value, args: &[Value]) -> Result<Value> {
    let s = this_string(vm, this, "substring")?;
    let length = s.len() as f64;
    let start = integer_arg(vm, &arg(args, 0), 0.0)?.clamp(0.0, length);
    let end = integer_arg(vm, &arg(args, 1), length)?.clamp(0.0, length);
    let (from, to) = if start <= end { (start, end) } else { (end, start) };
    Ok(Value::String(s.slice(from as usize, to as usize)))
}

/// String.prototype.substr(start, length)
fn substr(vm: &mut VM, this: &Value, args: &[Value]) -> Result<Value> {
    let s = this_string(vm, this, "substr")?;
    let size = s.len() as f64;
    let start = relative_index(integer_arg(vm, &arg(args, 0), 0.0)?, size);
    let length = integer_arg(vm, &arg(args, 1), f64::INFINITY)?.clamp(0.0, size - start);
    Ok(Value::String(s.slice(start as usize, (start + length) as usize)))
}

/// String.prototype.split(separator, limit)
fn split(vm: &mut VM, this: &Value, args: &[Value]) -> Result<Value> {
    let s = this_string(vm, this, "split")?;
    let separator = arg(args, 0);
    let limit = match arg(args, 1) {
        Value::Undefined => u32::MAX,
        value => vm.to_uint32(&value)?,
    };
    if let Some(rx) = regexp::as_regexp(vm, &separator) {
        return regexp::split(vm, rx, &s, limit);
    }
    if limit == 0 {
        return Ok(Value::Object(vm.new_array(Vec::new())));
    }
    if separator.is_undefined() {
        return Ok(Value::Object(vm.new_array(vec![Value::String(s)])));
    }
    let separator = vm.to_string(&separator)?;
    let mut parts: Vec<Value> = Vec::new();
    if separator.is_empty() {
        parts.extend(
            s.as_units()
                .iter()
                .take(limit as usize)
                .map(|unit| Value::String(JsString::from_units(&[*unit]))),
        );
        return Ok(Value::Object(vm.new_array(parts)));
    }
    let mut start = 0;
    while let Some(found) = s.find(separator.as_units(), start) {
        parts.push(Value::String(s.slice(start, found)));
        if parts.len() as u32 >= limit {
            return Ok(Value::Object(vm.new_array(parts)));
        }
        start = found + separator.len();
    }
    parts.push(Value::String(s.slice(start, s.len())));
    Ok(Value::Object(vm.new_array(parts)))
}

// ============================================================================
// Transformation
// ============================================================================

/// String.prototype.concat(...strings)
fn concat(vm: &mut VM, this: &Value, args: &[Value]) -> Result<Value> {
    let mut out = this_string(vm, this, "concat")?.as_units().to_vec();
    for value in args {
        out.extend_from_slice(vm.to_string(value)?.as_units());
    }
    Ok(Value::String(JsString::from(out)))
}

/// String.prototype.repeat(count)
fn repeat(vm: &mut VM, this: &Value, args: &[Value]) -> Result<Value> {
    let s = this_string(vm, this, "repeat")?;
    let count = vm.to_integer(&arg(args, 0))?;
    if count < 0.0 || count.is_infinite() {
        return range_error(format!("Invalid count value: {}", vm.to_string(&arg(args, 0))?));
    }
    if s.len() as f64 * count > (1u64 << 30) as f64 {
        return range_error("Invalid string length");
    }
    Ok(Value::String(JsString::from(s.as_units().repeat(count as usize))))
}

fn pad(vm: &mut VM, this: &Value, args: &[Value], at_start: bool) -> Result<Value> {
    let s = this_string(vm, this, if at_start { "padStart" } else { "padEnd" })?;
    let target = vm.to_integer(&arg(args, 0))?;
    let current = s.as_units().to_vec();
    let filler = match arg(args, 1) {
        Value::Undefined => vec![b' ' as u16],
        value => vm.to_string(&value)?.as_units().to_vec(),
    };
    if target <= current.len() as f64 || filler.is_empty() {
        return Ok(Value::String(s));
    }
    if target > (1u64 << 30) as f64 {
        return range_error("Invalid string length");
    }
    let fill_length = target as usize - current.len();
    let padding: Vec<u16> = filler.iter().copied().cycle().take(fill_length).collect();
    let joined = if at_start {
        [padding, current].concat()
    } else {
        [current, padding].concat()
    };
    Ok(Value::String(JsString::from(joined)))
}

/// String.prototype.padStart(maxLength, fillString)
fn pad_start(vm: &mut VM, this: &Value, args: &[Value]) -> Result<Value> {
    pad(vm, this, args, true)
}

/// String.prototype.padEnd(maxLength, fillString)
fn pad_end(vm: &mut VM, this: &Value, args: &[Value]) -> Result<Value> {
    pad(vm, this, args, false)
}

/// Maps every well-formed run of the string through `convert`. Lone
/// surrogates are copied through unchanged.
fn map_text(s: &JsString, convert: impl Fn(&str) -> String) -> JsString {
    let mut out = Vec::with_capacity(s.len());
    let mut run = String::new();
    for decoded in char::decode_utf16(s.as_units().iter().copied()) {
        match decoded {
            Ok(c) => run.push(c),
            Err(error) => {
                push_str(&mut out, &convert(&run));
                run.clear();
                out.push(error.unpaired_surrogate());
            }
        }
    }
    push_str(&mut out, &convert(&run));
    JsString::from(out)
}

/// String.prototype.toLowerCase()
fn to_lower_case(vm: &mut VM, this: &Value, _args: &[Value]) -> Result<Value> {
    let s = this_string(vm, this, "toLowerCase")?;
    Ok(Value::String(map_text(&s, str::to_lowercase)))
}

/// String.prototype.toUpperCase()
fn to_upper_case(vm: &mut VM, this: &Value, _args: &[Value]) -> Result<Value> {
    let s = this_string(vm, this, "toUpperCase")?;
    Ok(Value::String(map_text(&s, str::to_uppercase)))
}

fn is_space_unit(unit: u16) -> bool {
    char::from_u32(unit as u32).is_some_and(|c| is_whitespace(c) || is_line_terminator(c))
}

fn trim_units(s: &JsString, start: bool, end: bool) -> JsString {
    let units = s.as_units();
    let mut from = 0;
    let mut to = units.len();
    if start {
        while from < to && is_space_unit(units[from]) {
            from += 1;
        }
    }
    if end {
        while to > from && is_space_unit(units[to - 1]) {
            to -= 1;
        }
    }
    s.slice(from, to)
}

/// String.prototype.trim()
fn trim(vm: &mut VM, this: &Value, _args: &[Value]) -> Result<Value> {
    let s = this_string(vm, this, "trim")?;
    Ok(Value::String(trim_units(&s, true, true)))
}

/// String.prototype.trimStart()
fn trim_start(vm: &mut VM, this: &Value, _args: &[Value]) -> Result<Value> {
    let s = this_string(vm, this, "trimStart")?;
    Ok(Value::String(trim_units(&s, true, false)))
}

/// String.prototype.trimEnd()
fn trim_end(vm: &mut VM, this: &Value, _args: &[Value]) -> Result<Value> {
    let s = this_string(vm, this, "trimEnd")?;
    Ok(Value::String(trim_units(&s, false, true)))
}

/// String.prototype.toString() and valueOf()
fn to_string(vm: &mut VM, this: &Value, _args: &[Value]) -> Result<Value> {
    match this {
        Value::String(s) => Ok(Value::String(s.clone())),
        Value::Object(object) => match &vm.heap.object(*object)?.kind {
            ObjectKind::String(s) => Ok(Value::String(s.clone())),
            _ => type_error("String.prototype.toString requires that 'this' be a String"),
        },
        _ => type_error("String.prototype.toString requires that 'this' be a String"),
    }
}

/// String.prototype[Symbol.iterator]()
fn iterator_method(vm: &mut VM, this: &Value, _args: &[Value]) -> Result<Value> {
    let s = this_string(vm, this, "[Symbol.iterator]")?;
    let prototype = vm.realm.intrinsics.string_iterator_prototype;
    let iterator = JsObject::with_kind(
        Some(prototype),
        ObjectKind::Iterator(ListIterator::String { string: s, position: 0 }),
    );
    Ok(Value::Object(vm.alloc(iterator)))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::builtins::testing::{eval_str, thrown};

    #[test]
    fn test_case_mapping_keeps_lone_surrogates() {
        let s = JsString::from(vec![u16::from(b'a'), 0xD800, u16::from(b'b')]);
        let upper = map_text(&s, str::to_uppercase);
        assert_eq!(upper.as_units(), &[u16::from(b'A'), 0xD800, u16::from(b'B')]);
    }

    #[test]
    fn test_constructor_and_statics() {
        assert_eq!(eval_str("String(123) + String(null) + String(Symbol('s'))"), "123nullSymbol(s)");
        assert_eq!(eval_str("typeof new String('a') + new String('ab').length"), "object2");
        assert_eq!(eval_str("String.fromCharCode(72, 105)"), "Hi");
        assert_eq!(eval_str("String.fromCodePoint(0x1F600).length"), "2");
        assert_eq!(eval_str("String.raw`a\\n${1}b`"), "a\\n1b");
        assert!(thrown("String.fromCodePoint(-1)").starts_with("RangeError"));
    }

    #[test]
    fn test_character_access_uses_utf16() {
        assert_eq!(eval_str("'héllo'.charAt(1) + 'abc'.charCodeAt(1)"), "é98");
        assert_eq!(eval_str("'😀'.length + ',' + '😀'.charCodeAt(0) + ',' + '😀'.codePointAt(0)"), "2,55357,128512");
        assert_eq!(eval_str("'abc'.at(-1) + 'abc'.charAt(5)"), "c");
    }

    #[test]
    fn test_searching() {
        assert_eq!(eval_str("'hello'.indexOf('l') + ',' + 'hello'.lastIndexOf('l') + ',' + 'hello'.indexOf('z')"), "2,3,-1");
        assert_eq!(eval_str("'hello'.includes('ell') + ',' + 'hello'.startsWith('he') + ',' + 'hello'.endsWith('lo')"), "true,true,true");
        assert_eq!(eval_str("'hello'.startsWith('l', 2) + ',' + 'hello'.endsWith('l', 4)"), "true,true");
        assert!(thrown("'a'.includes(/a/)").starts_with("TypeError"));
    }

    #[test]
    fn test_slicing() {
        assert_eq!(eval_str("'hello'.slice(1, -1) + '|' + 'hello'.slice(-3)"), "ell|llo");
        assert_eq!(eval_str("'hello'.substring(3, 1) + '|' + 'hello'.substr(-3, 2)"), "el|ll");
    }

    #[test]
    fn test_split() {
        assert_eq!(eval_str("'a,b,,c'.split(',').length"), "4");
        assert_eq!(eval_str("'abc'.split('').join('-')"), "a-b-c");
        assert_eq!(eval_str("'a,b,c'.split(',', 2).join()"), "a,b");
        assert_eq!(eval_str("'abc'.split().length"), "1");
        assert_eq!(eval_str("'a1b2c'.split(/\\d/).join()"), "a,b,c");
    }

    #[test]
    fn test_replace() {
        assert_eq!(eval_str("'aaa'.replace('a', 'b')"), "baa");
        assert_eq!(eval_str("'aaa'.replaceAll('a', 'b')"), "bbb");
        assert_eq!(eval_str("'abc'.replace('b', '[$&$`$\\'$$]')"), "a[bac$]c");
        assert_eq!(eval_str("'abc'.replace('b', function (m, i) { return m.toUpperCase() + i; })"), "aB1c");
        assert_eq!(eval_str("'john smith'.replace(/(\\w+)\\s(\\w+)/, '$2 $1')"), "smith john");
        assert_eq!(eval_str("'a-b-c'.replace(/-/g, '+')"), "a+b+c");
        assert!(thrown("'a'.replaceAll(/a/, 'b')").starts_with("TypeError"));
    }

    #[test]
    fn test_transformation() {
        assert_eq!(eval_str("'ab'.repeat(3) + 'x'.padStart(3, '-') + 'x'.padEnd(4, 'ab')"), "ababab--xxaba");
        assert_eq!(eval_str("'  hi \\n'.trim() + '|' + '  hi '.trimStart() + '|' + '  hi '.trimEnd() + '|'"), "hi|hi |  hi|");
        assert_eq!(eval_str("'MiXeD'.toLowerCase() + 'MiXeD'.toUpperCase()"), "mixedMIXED");
        assert_eq!(eval_str("'a'.concat(1, null)"), "a1null");
        assert!(thrown("'a'.repeat(-1)").starts_with("RangeError"));
    }

    #[test]
    fn test_lone_surrogates_round_trip() {
        assert_eq!(eval_str("var s = '\\u{1F600}'; s.substring(0, 1) + s.substring(1) === s"), "true");
        assert_eq!(eval_str("String.fromCharCode(0xD83D).charCodeAt(0)"), "55357");
        assert_eq!(eval_str("('\\ud83d' + '\\ude00') === '\\u{1F600}'"), "true");
        assert_eq!(eval_str("'\\ud83d'.length + ',' + '\\ud83d\\ude00'.length"), "1,2");
        assert_eq!(eval_str("'\\u{1F600}'.split('').map(function (c) { return c.charCodeAt(0); }).join()"), "55357,56832");
        assert_eq!(eval_str("String.fromCodePoint(0xDC00).charCodeAt(0)"), "56320");
        assert_eq!(eval_str("'x\\udc00'.toUpperCase().charCodeAt(1)"), "56320");
        assert_eq!(eval_str("'\\ud83d' < '\\uff61'"), "true");
    }

    #[test]
    fn test_iteration_by_code_point() {
        assert_eq!(eval_str("var n = 0; for (var c of 'a😀b') n++; n"), "3");
        assert_eq!(eval_str("Array.from('a😀').length"), "2");
    }

    #[test]
    fn test_methods_on_null_throw() {
        assert!(thrown("String.prototype.trim.call(null)").starts_with("TypeError"));
        assert!(thrown("String.prototype.toString.call(1)").starts_with("TypeError"));
    }
}
