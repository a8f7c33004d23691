//! Literal scanning: numbers, strings, templates and regular expressions.
//!
//! ## Numeric Literals
//!
//! | Form | Example | Notes |
//! |------|---------|-------|
//! | Decimal | `42`, `3.14`, `.5`, `1e-3` | `_` separators between digits |
//! | Hex / octal / binary | `0xFF`, `0o17`, `0b101` | |
//! | Legacy octal | `017` | sloppy mode only |
//! | BigInt | `42n`, `0xFFn` | normalized to base 10 |
//!
//! ## String Escapes
//!
//! `\n \r \t \b \f \v \0`, `\xHH`, `\uHHHH`, `\u{H...}`, line continuations and
//! legacy octal escapes. String values are built as UTF-16 code units, so a
//! `\u` escape naming a lone surrogate keeps exactly that unit and two
//! adjacent surrogate escapes form a pair.

use num_bigint::BigInt;

use crate::runtime::string::JsString;

use super::scanner::{LexError, LexResult, Scanner, is_id_continue, is_id_start, is_line_terminator};
use super::{Span, TokenKind};

impl Scanner<'_> {
    pub(super) fn scan_number(&mut self, start: usize) -> LexResult<TokenKind> {
        self.pos = start;
        if self.peek() == Some('0') {
            let radix = match self.peek_next() {
                Some('x' | 'X') => Some(16),
                Some('o' | 'O') => Some(8),
                Some('b' | 'B') => Some(2),
                _ => None,
            };
            if let Some(radix) = radix {
                self.pos += 2;
                return self.scan_radix_number(start, radix);
            }
            if matches!(self.peek_next(), Some('0'..='9')) {
                return self.scan_legacy_octal(start);
            }
        }

        let mut text = String::new();
        self.scan_decimal_digits(&mut text, start)?;
        let mut is_integer = true;
        if self.peek() == Some('.') {
            self.bump();
            text.push('.');
            is_integer = false;
            self.scan_decimal_digits(&mut text, start)?;
        }
        if matches!(self.peek(), Some('e' | 'E')) {
            self.bump();
            text.push('e');
            is_integer = false;
            if let Some(sign @ ('+' | '-')) = self.peek() {
                self.bump();
                text.push(sign);
            }
            if !matches!(self.peek(), Some('0'..='9')) {
                return Err(self.number_error(start));
            }
            self.scan_decimal_digits(&mut text, start)?;
        }

        if is_integer && self.eat('n') {
            self.check_number_end(start)?;
            return Ok(TokenKind::BigInt(text));
        }
        self.check_number_end(start)?;

        let value = text.parse::<f64>().map_err(|_| self.number_error(start))?;
        Ok(TokenKind::Number(value))
    }

    fn scan_decimal_digits(&mut self, text: &mut String, start: usize) -> LexResult<()> {
        let mut last_was_separator = false;
        while let Some(ch) = self.peek() {
            match ch {
                '0'..='9' => {
                    text.push(ch);
                    last_was_separator = false;
                }
                '_' if !text.is_empty() && !last_was_separator => last_was_separator = true,
                '_' => return Err(self.number_error(start)),
                _ => break,
            }
            self.bump();
        }
        if last_was_separator {
            return Err(LexError::new(
                "Numeric separators are not allowed at the end of numeric literals",
                Span::new(start, self.pos),
            ));
        }
        Ok(())
    }

    fn scan_radix_number(&mut self, start: usize, radix: u32) -> LexResult<TokenKind> {
        let mut digits = String::new();
        let mut last_was_separator = false;
        while let Some(ch) = self.peek() {
            if ch == '_' && !digits.is_empty() && !last_was_separator {
                last_was_separator = true;
                self.bump();
                continue;
            }
            if !ch.is_digit(radix) {
                break;
            }
            digits.push(ch);
            last_was_separator = false;
            self.bump();
        }
        if digits.is_empty() || last_was_separator {
            return Err(self.number_error(start));
        }

        if self.eat('n') {
            self.check_number_end(start)?;
            let value = BigInt::parse_bytes(digits.as_bytes(), radix)
                .ok_or_else(|| self.number_error(start))?;
            return Ok(TokenKind::BigInt(value.to_string()));
        }
        self.check_number_end(start)?;

        let value = digits.chars().fold(0.0f64, |acc, ch| {
            acc * f64::from(radix) + f64::from(ch.to_digit(radix).unwrap_or(0))
        });
        Ok(TokenKind::Number(value))
    }

    fn scan_legacy_octal(&mut self, start: usize) -> LexResult<TokenKind> {
        // `0` followed by digits: octal unless an 8 or 9 shows up.
        let mut digits = String::new();
        while let Some(ch @ '0'..='9') = self.peek() {
            digits.push(ch);
            self.bump();
        }
        self.legacy_octal = true;
        if digits.chars().all(|ch| ch.is_digit(8)) {
            self.check_number_end(start)?;
            let value = digits
                .chars()
                .fold(0.0f64, |acc, ch| acc * 8.0 + f64::from(ch.to_digit(8).unwrap_or(0)));
            return Ok(TokenKind::Number(value));
        }

        // Decimal with a leading zero, e.g. `08.5`
        let mut text = digits;
        if self.peek() == Some('.') {
            self.bump();
            text.push('.');
            self.scan_decimal_digits(&mut text, start)?;
        }
        self.check_number_end(start)?;
        let value = text.parse::<f64>().map_err(|_| self.number_error(start))?;
        Ok(TokenKind::Number(value))
    }

    fn check_number_end(&self, start: usize) -> LexResult<()> {
        match self.peek() {
            Some(ch) if is_id_start(ch) || ch.is_ascii_digit() || ch == '\\' => {
                Err(self.number_error(start))
            }
            _ => Ok(()),
        }
    }

    fn number_error(&self, start: usize) -> LexError {
        LexError::new("Invalid or unexpected token", Span::new(start, self.pos.max(start + 1)))
    }

    pub(super) fn scan_string(&mut self, quote: char, start: usize) -> LexResult<TokenKind> {
        let mut value = Vec::new();
        loop {
            let Some(ch) = self.bump() else {
                return Err(LexError::new("Unterminated string literal", Span::new(start, self.pos)));
            };
            match ch {
                _ if ch == quote => break,
                '\\' => {
                    if let Some(code) = self.scan_escape(start, EscapeMode::String)? {
                        push_code_point(&mut value, code);
                    }
                }
                // U+2028/2029 are allowed inside string literals since ES2019
                '\n' | '\r' => {
                    return Err(LexError::new("Unterminated string literal", Span::new(start, self.pos)));
                }
                _ => push_char(&mut value, ch),
            }
        }
        Ok(TokenKind::String(JsString::from(value)))
    }

    /// Scans a template chunk. The opening `` ` `` or `}` has been consumed.
    pub(super) fn scan_template(&mut self, start: usize) -> LexResult<TokenKind> {
        let mut cooked = Some(Vec::new());
        let mut raw = String::new();
        loop {
            let Some(ch) = self.bump() else {
                return Err(LexError::new("Unterminated template literal", Span::new(start, self.pos)));
            };
            match ch {
                '`' => {
                    return Ok(TokenKind::Template {
                        cooked: cooked.map(JsString::from),
                        raw,
                        tail: true,
                    });
                }
                '$' if self.eat('{') => {
                    return Ok(TokenKind::Template {
                        cooked: cooked.map(JsString::from),
                        raw,
                        tail: false,
                    });
                }
                '\\' => {
                    let escape_start = self.pos;
                    let result = self.scan_escape(start, EscapeMode::Template);
                    raw.push('\\');
                    raw.push_str(&self.source[escape_start..self.pos].replace("\r\n", "\n").replace('\r', "\n"));
                    match result {
                        Ok(Some(code)) => {
                            if let Some(cooked) = cooked.as_mut() {
                                push_code_point(cooked, code);
                            }
                        }
                        Ok(None) => {}
                        // Only tagged templates may contain these; the parser
                        // rejects an untagged template without a cooked value.
                        Err(_) => cooked = None,
                    }
                }
                '\r' => {
                    self.eat('\n');
                    raw.push('\n');
                    if let Some(cooked) = cooked.as_mut() {
                        cooked.push(u16::from(b'\n'));
                    }
                }
                _ => {
                    raw.push(ch);
                    if let Some(cooked) = cooked.as_mut() {
                        push_char(cooked, ch);
                    }
                }
            }
        }
    }

    /// Scans one escape sequence after a backslash and returns the code
    /// point it denotes, which may be a lone surrogate.
    ///
    /// Returns `None` for a line continuation, which contributes nothing.
    fn scan_escape(&mut self, start: usize, mode: EscapeMode) -> LexResult<Option<u32>> {
        let Some(ch) = self.bump() else {
            return Err(LexError::new("Unterminated string literal", Span::new(start, self.pos)));
        };
        let escaped = match ch {
            'n' => 0x0A,
            't' => 0x09,
            'r' => 0x0D,
            'b' => 0x08,
            'f' => 0x0C,
            'v' => 0x0B,
            '\r' => {
                self.eat('\n');
                return Ok(None);
            }
            _ if is_line_terminator(ch) => return Ok(None),
            '0' if !matches!(self.peek(), Some('0'..='9')) => 0,
            '0'..='7' => {
                if mode == EscapeMode::Template {
                    return Err(LexError::new(
                        "Octal escape sequences are not allowed in template strings",
                        Span::new(start, self.pos),
                    ));
                }
                self.legacy_octal = true;
                let mut value = ch.to_digit(8).unwrap_or(0);
                // At most three digits, and the value stays within a byte.
                let max_digits = if ch <= '3' { 2 } else { 1 };
                for _ in 0..max_digits {
                    match self.peek().and_then(|c| c.to_digit(8)) {
                        Some(digit) => {
                            value = value * 8 + digit;
                            self.bump();
                        }
                        None => break,
                    }
                }
                value
            }
            '8' | '9' => {
                if mode == EscapeMode::Template {
                    return Err(LexError::new("Invalid escape sequence", Span::new(start, self.pos)));
                }
                self.legacy_octal = true;
                ch as u32
            }
            'x' => self.scan_hex_digits(2, start)?,
            'u' => self.scan_unicode_escape(start)?,
            other => other as u32,
        };
        Ok(Some(escaped))
    }

    /// Scans the part of a `\u` escape after the `u`: `HHHH` or `{H...}`.
    pub(super) fn scan_unicode_escape(&mut self, start: usize) -> LexResult<u32> {
        if self.eat('{') {
            let mut value: u32 = 0;
            let mut digits = 0;
            while let Some(digit) = self.peek().and_then(|c| c.to_digit(16)) {
                self.bump();
                digits += 1;
                value = value.saturating_mul(16).saturating_add(digit);
            }
            if digits == 0 || !self.eat('}') || value > 0x10FFFF {
                return Err(LexError::new(
                    "Invalid Unicode escape sequence",
                    Span::new(start, self.pos),
                ));
            }
            return Ok(value);
        }
        self.scan_hex_digits(4, start)
    }

    fn scan_hex_digits(&mut self, count: usize, start: usize) -> LexResult<u32> {
        let mut value = 0;
        for _ in 0..count {
            let Some(digit) = self.peek().and_then(|c| c.to_digit(16)) else {
                return Err(LexError::new(
                    "Invalid hexadecimal escape sequence",
                    Span::new(start, self.pos),
                ));
            };
            self.bump();
            value = value * 16 + digit;
        }
        Ok(value)
    }

    /// Scans a regular expression body and flags. The opening `/` has been consumed.
    pub(super) fn scan_regexp(&mut self, start: usize) -> LexResult<TokenKind> {
        let mut pattern = String::new();
        let mut in_class = false;
        loop {
            let Some(ch) = self.bump() else {
                return Err(LexError::new(
                    "Invalid regular expression: missing /",
                    Span::new(start, self.pos),
                ));
            };
            match ch {
                _ if is_line_terminator(ch) => {
                    return Err(LexError::new(
                        "Invalid regular expression: missing /",
                        Span::new(start, self.pos),
                    ));
                }
                '/' if !in_class => break,
                '[' => in_class = true,
                ']' => in_class = false,
                '\\' => {
                    pattern.push(ch);
                    match self.bump() {
                        Some(next) if !is_line_terminator(next) => pattern.push(next),
                        _ => {
                            return Err(LexError::new(
                                "Invalid regular expression: missing /",
                                Span::new(start, self.pos),
                            ));
                        }
                    }
                    continue;
                }
                _ => {}
            }
            pattern.push(ch);
        }

        let mut flags = String::new();
        while let Some(ch) = self.peek() {
            if !is_id_continue(ch) {
                break;
            }
            if !"dgimsuyv".contains(ch) || flags.contains(ch) {
                return Err(LexError::new(
                    format!("Invalid regular expression flags '{}'", ch),
                    Span::new(start, self.pos + ch.len_utf8()),
                ));
            }
            flags.push(ch);
            self.bump();
        }
        Ok(TokenKind::RegExp { pattern, flags })
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum EscapeMode {
    String,
    Template,
}

fn push_char(buffer: &mut Vec<u16>, ch: char) {
    let mut units = [0; 2];
    buffer.extend_from_slice(ch.encode_utf16(&mut units));
}

/// Appends a code point. Surrogate values are kept as single units.
fn push_code_point(buffer: &mut Vec<u16>, code: u32) {
    match char::from_u32(code) {
        Some(ch) => push_char(buffer, ch),
        None => buffer.push(code as u16),
    }
}

#[cfg(test)]
mod tests {
    use crate::lexer::{LexContext, Scanner, TokenKind};

    fn scan(source: &str) -> TokenKind {
        Scanner::new(source).next_token(LexContext::RegExp).unwrap().kind
    }

    fn scan_err(source: &str) -> String {
        Scanner::new(source)
            .next_token(LexContext::RegExp)
            .unwrap_err()
            .message
    }

    #[test]
    fn test_decimal_numbers() {
        assert!(matches!(scan("42"), TokenKind::Number(n) if n == 42.0));
        assert!(matches!(scan("3.25"), TokenKind::Number(n) if n == 3.25));
        assert!(matches!(scan(".5"), TokenKind::Number(n) if n == 0.5));
        assert!(matches!(scan("1e3"), TokenKind::Number(n) if n == 1000.0));
        assert!(matches!(scan("1.5e-3"), TokenKind::Number(n) if n == 0.0015));
        assert!(matches!(scan("1_000_000"), TokenKind::Number(n) if n == 1_000_000.0));
    }

    #[test]
    fn test_radix_numbers() {
        assert!(matches!(scan("0xFF"), TokenKind::Number(n) if n == 255.0));
        assert!(matches!(scan("0o17"), TokenKind::Number(n) if n == 15.0));
        assert!(matches!(scan("0b101"), TokenKind::Number(n) if n == 5.0));
    }

    #[test]
    fn test_legacy_octal() {
        let mut scanner = Scanner::new("017");
        let token = scanner.next_token(LexContext::RegExp).unwrap();
        assert_eq!(token.kind, TokenKind::Number(15.0));
        assert!(scanner.saw_legacy_octal());
        assert!(matches!(scan("019"), TokenKind::Number(n) if n == 19.0));
    }

    #[test]
    fn test_bigint_literals() {
        assert_eq!(scan("123n"), TokenKind::BigInt("123".into()));
        assert_eq!(scan("0xFFn"), TokenKind::BigInt("255".into()));
    }

    #[test]
    fn test_malformed_numbers() {
        assert_eq!(scan_err("3in"), "Invalid or unexpected token");
        assert_eq!(scan_err("0x"), "Invalid or unexpected token");
        assert!(scan_err("1_").contains("separators"));
        assert_eq!(scan_err("1e"), "Invalid or unexpected token");
    }

    #[test]
    fn test_string_escapes() {
        assert_eq!(scan(r#""a\nb\t""#), TokenKind::String("a\nb\t".into()));
        assert_eq!(scan(r#"'\x41B\u{43}'"#), TokenKind::String("ABC".into()));
        assert_eq!(scan(r#""\uD83D\uDE00""#), TokenKind::String("\u{1F600}".into()));
        assert_eq!(scan("'a\\\nb'"), TokenKind::String("ab".into()));
        assert_eq!(scan(r#""\101""#), TokenKind::String("A".into()));
    }

    #[test]
    fn test_lone_surrogate_escape_keeps_its_code_unit() {
        let TokenKind::String(value) = scan(r#""\uD83Dx""#) else {
            panic!("expected string");
        };
        assert_eq!(value.as_units(), &[0xD83D, u16::from(b'x')]);
        let TokenKind::String(value) = scan(r#""\u{DE00}""#) else {
            panic!("expected string");
        };
        assert_eq!(value.as_units(), &[0xDE00]);
    }

    #[test]
    fn test_unterminated_string() {
        assert_eq!(scan_err("\"abc"), "Unterminated string literal");
        assert_eq!(scan_err("'a\nb'"), "Unterminated string literal");
    }

    #[test]
    fn test_template_chunks() {
        assert_eq!(
            scan("`a${"),
            TokenKind::Template {
                cooked: Some("a".into()),
                raw: "a".into(),
                tail: false
            }
        );
        assert_eq!(
            scan(r"`x\ny`"),
            TokenKind::Template {
                cooked: Some("x\ny".into()),
                raw: r"x\ny".into(),
                tail: true
            }
        );
    }

    #[test]
    fn test_template_invalid_escape_has_no_cooked_value() {
        match scan(r"`\unicode`") {
            TokenKind::Template { cooked, raw, tail } => {
                assert_eq!(cooked, None);
                assert!(raw.starts_with(r"\u"));
                assert!(tail);
            }
            other => panic!("expected template, got {:?}", other),
        }
    }

    #[test]
    fn test_regexp_with_class_and_escape() {
        assert_eq!(
            scan(r"/[/]\/x/u"),
            TokenKind::RegExp {
                pattern: r"[/]\/x".into(),
                flags: "u".into()
            }
        );
    }

    #[test]
    fn test_regexp_errors() {
        assert!(scan_err("/abc").contains("missing /"));
        assert!(scan_err("/a/gg").contains("flags"));
    }
}
