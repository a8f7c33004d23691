//! UTF-16 strings.
//!
//! Scripts observe strings as sequences of UTF-16 code units, lone
//! surrogates included. A [`JsString`] stores exactly that, shared through an
//! `Arc`. Conversion to a Rust `String` happens at the host boundary only,
//! where unpaired surrogates become U+FFFD.

use std::fmt;
use std::sync::Arc;

/// An immutable string of UTF-16 code units.
#[derive(Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct JsString(Arc<[u16]>);

impl JsString {
    /// The empty string.
    pub fn empty() -> Self {
        JsString(Arc::from(Vec::<u16>::new()))
    }

    /// A string holding a copy of `units`.
    pub fn from_units(units: &[u16]) -> Self {
        JsString(Arc::from(units))
    }

    /// The code units.
    pub fn as_units(&self) -> &[u16] {
        &self.0
    }

    /// Length in code units.
    pub fn len(&self) -> usize {
        self.0.len()
    }

    /// Whether the string has no code units.
    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    /// The code unit at `index`.
    pub fn get(&self, index: usize) -> Option<u16> {
        self.0.get(index).copied()
    }

    /// The code units in `start..end`, clamped to the string.
    pub fn slice(&self, start: usize, end: usize) -> JsString {
        let end = end.min(self.len());
        let start = start.min(end);
        if start == 0 && end == self.len() {
            return self.clone();
        }
        JsString::from_units(&self.0[start..end])
    }

    /// `self` followed by `other`.
    pub fn concat(&self, other: &JsString) -> JsString {
        if other.is_empty() {
            return self.clone();
        }
        if self.is_empty() {
            return other.clone();
        }
        let mut units = Vec::with_capacity(self.len() + other.len());
        units.extend_from_slice(&self.0);
        units.extend_from_slice(&other.0);
        JsString::from(units)
    }

    /// Index of the first occurrence of `needle` at or after `from`.
    pub fn find(&self, needle: &[u16], from: usize) -> Option<usize> {
        let haystack = self.as_units();
        if needle.is_empty() {
            return (from <= haystack.len()).then_some(from);
        }
        if needle.len() > haystack.len() {
            return None;
        }
        (from..=haystack.len() - needle.len()).find(|&i| haystack[i..i + needle.len()] == *needle)
    }

    /// Index of the last occurrence of `needle` starting at or before `from`.
    pub fn rfind(&self, needle: &[u16], from: usize) -> Option<usize> {
        let haystack = self.as_units();
        if needle.len() > haystack.len() {
            return None;
        }
        let last = from.min(haystack.len() - needle.len());
        (0..=last).rev().find(|&i| haystack[i..i + needle.len()] == *needle)
    }

    /// The code point starting at `index`. A lone surrogate is returned as is.
    pub fn code_point_at(&self, index: usize) -> Option<u32> {
        let first = self.get(index)?;
        if is_lead_surrogate(first)
            && let Some(second) = self.get(index + 1)
            && is_trail_surrogate(second)
        {
            return Some(0x10000 + ((first as u32 - 0xD800) << 10) + (second as u32 - 0xDC00));
        }
        Some(first as u32)
    }

    /// Code points, with lone surrogates yielded as their own value.
    pub fn code_points(&self) -> CodePoints<'_> {
        CodePoints {
            string: self,
            index: 0,
        }
    }

    /// Whether every code unit is ASCII.
    pub fn is_ascii(&self) -> bool {
        self.0.iter().all(|&unit| unit < 0x80)
    }

    /// The string as Rust text, or `None` if it holds a lone surrogate.
    pub fn to_std_string(&self) -> Option<String> {
        String::from_utf16(&self.0).ok()
    }

    /// The string as Rust text with lone surrogates replaced by U+FFFD.
    pub fn to_std_string_lossy(&self) -> String {
        String::from_utf16_lossy(&self.0)
    }

    /// Compares with Rust text without allocating.
    pub fn eq_str(&self, other: &str) -> bool {
        self.0.iter().copied().eq(other.encode_utf16())
    }
}

/// Whether `unit` is a high (leading) surrogate.
pub fn is_lead_surrogate(unit: u16) -> bool {
    (0xD800..=0xDBFF).contains(&unit)
}

/// Whether `unit` is a low (trailing) surrogate.
pub fn is_trail_surrogate(unit: u16) -> bool {
    (0xDC00..=0xDFFF).contains(&unit)
}

/// Iterator returned by [`JsString::code_points`].
pub struct CodePoints<'a> {
    string: &'a JsString,
    index: usize,
}

impl Iterator for CodePoints<'_> {
    type Item = u32;

    fn next(&mut self) -> Option<u32> {
        let code_point = self.string.code_point_at(self.index)?;
        self.index += if code_point > 0xFFFF { 2 } else { 1 };
        Some(code_point)
    }
}

impl Default for JsString {
    fn default() -> Self {
        JsString::empty()
    }
}

impl From<&str> for JsString {
    fn from(s: &str) -> Self {
        JsString(s.encode_utf16().collect::<Vec<_>>().into())
    }
}

impl From<String> for JsString {
    fn from(s: String) -> Self {
        JsString::from(s.as_str())
    }
}

impl From<&String> for JsString {
    fn from(s: &String) -> Self {
        JsString::from(s.as_str())
    }
}

impl From<char> for JsString {
    fn from(c: char) -> Self {
        let mut buffer = [0; 2];
        JsString::from_units(c.encode_utf16(&mut buffer))
    }
}

impl From<Vec<u16>> for JsString {
    fn from(units: Vec<u16>) -> Self {
        JsString(units.into())
    }
}

impl From<&[u16]> for JsString {
    fn from(units: &[u16]) -> Self {
        JsString::from_units(units)
    }
}

impl FromIterator<u16> for JsString {
    fn from_iter<I: IntoIterator<Item = u16>>(iter: I) -> Self {
        JsString::from(iter.into_iter().collect::<Vec<_>>())
    }
}

impl PartialEq<str> for JsString {
    fn eq(&self, other: &str) -> bool {
        self.eq_str(other)
    }
}

impl PartialEq<&str> for JsString {
    fn eq(&self, other: &&str) -> bool {
        self.eq_str(other)
    }
}

impl fmt::Display for JsString {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        for c in char::decode_utf16(self.0.iter().copied()) {
            fmt::Write::write_char(f, c.unwrap_or(char::REPLACEMENT_CHARACTER))?;
        }
        Ok(())
    }
}

impl fmt::Debug for JsString {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{:?}", self.to_std_string_lossy())
    }
}

/// Appends Rust text to a buffer of code units.
pub fn push_str(buffer: &mut Vec<u16>, s: &str) {
    buffer.extend(s.encode_utf16());
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_lone_surrogates_survive_slicing() {
        let s = JsString::from("\u{1F600}");
        assert_eq!(s.len(), 2);
        let joined = s.slice(0, 1).concat(&s.slice(1, 2));
        assert_eq!(joined, s);
        assert_eq!(s.slice(0, 1).to_std_string(), None);
        assert_eq!(s.slice(0, 1).to_std_string_lossy(), "\u{FFFD}");
    }

    #[test]
    fn test_code_points() {
        let s = JsString::from(vec![0x61, 0xD83D, 0xDE00, 0xDC00]);
        assert_eq!(s.code_points().collect::<Vec<_>>(), vec![0x61, 0x1F600, 0xDC00]);
        assert_eq!(s.code_point_at(2), Some(0xDE00));
    }

    #[test]
    fn test_search() {
        let s = JsString::from("abcabc");
        let needle: Vec<u16> = "bc".encode_utf16().collect();
        assert_eq!(s.find(&needle, 0), Some(1));
        assert_eq!(s.find(&needle, 2), Some(4));
        assert_eq!(s.rfind(&needle, 6), Some(4));
        assert_eq!(s.rfind(&needle, 3), Some(1));
        assert_eq!(s.find(&[], 6), Some(6));
    }

    #[test]
    fn test_ordering_is_by_code_unit() {
        assert!(JsString::from("B") < JsString::from("a"));
        // A surrogate (0xD83D) sorts before U+FF61 even though the code point is larger
        assert!(JsString::from("\u{1F600}") < JsString::from("\u{FF61}"));
        assert_eq!(JsString::from("abc"), "abc");
    }
}
