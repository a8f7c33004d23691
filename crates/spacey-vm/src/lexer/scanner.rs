//! The scanner that produces tokens from source text.

use std::fmt;

use super::{Span, Token, TokenKind};

/// How the scanner should read a `/` at the start of the next token.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LexContext {
    /// An operand is expected: `/` starts a regular expression literal.
    RegExp,
    /// An operator is expected: `/` and `/=` are division.
    Division,
}

/// A malformed token, reported with the offending span.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LexError {
    /// What went wrong
    pub message: String,
    /// Where it went wrong
    pub span: Span,
}

impl LexError {
    pub(crate) fn new(message: impl Into<String>, span: Span) -> Self {
        Self {
            message: message.into(),
            span,
        }
    }
}

impl fmt::Display for LexError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} at offset {}", self.message, self.span.start)
    }
}

impl std::error::Error for LexError {}

/// Result alias for scanning operations.
pub type LexResult<T> = Result<T, LexError>;

/// A scanner that tokenizes JavaScript source code.
///
/// The scanner is a cheap `Clone` (a source slice and an offset), which is
/// what the parser relies on for look-ahead and speculative parsing.
#[derive(Debug, Clone)]
pub struct Scanner<'a> {
    pub(super) source: &'a str,
    pub(super) pos: usize,
    pub(super) newline_before: bool,
    pub(super) legacy_octal: bool,
    previous: Option<TokenKind>,
}

impl<'a> Scanner<'a> {
    /// Creates a new scanner for the given source code.
    pub fn new(source: &'a str) -> Self {
        Self {
            source,
            pos: 0,
            newline_before: false,
            legacy_octal: false,
            previous: None,
        }
    }

    /// The source being scanned.
    pub fn source(&self) -> &'a str {
        self.source
    }

    /// The current byte offset.
    pub fn position(&self) -> usize {
        self.pos
    }

    /// Moves the scanner back (or forward) to `pos`.
    pub fn reset(&mut self, pos: usize) {
        self.pos = pos;
    }

    /// Whether the last scanned literal used a legacy octal form
    /// (`010`, `"\07"`), which strict code rejects.
    pub fn saw_legacy_octal(&self) -> bool {
        self.legacy_octal
    }

    /// Returns the next token from the source.
    pub fn next_token(&mut self, context: LexContext) -> LexResult<Token> {
        self.legacy_octal = false;
        self.newline_before = self.pos == 0;
        self.skip_whitespace_and_comments()?;
        let newline_before = self.newline_before;

        let start = self.pos;
        let Some(ch) = self.bump() else {
            let mut token = Token::new(TokenKind::Eof, Span::new(start, start));
            token.newline_before = newline_before;
            return Ok(token);
        };

        let kind = match ch {
            // Single-character tokens
            '{' => TokenKind::LeftBrace,
            '}' => TokenKind::RightBrace,
            '(' => TokenKind::LeftParen,
            ')' => TokenKind::RightParen,
            '[' => TokenKind::LeftBracket,
            ']' => TokenKind::RightBracket,
            ';' => TokenKind::Semicolon,
            ',' => TokenKind::Comma,
            ':' => TokenKind::Colon,
            '~' => TokenKind::Tilde,

            // Multi-character tokens
            '.' => {
                if matches!(self.peek(), Some('0'..='9')) {
                    self.scan_number(start)?
                } else {
                    self.scan_dot()
                }
            }
            '+' => self.scan_plus(),
            '-' => self.scan_minus(),
            '*' => self.scan_star(),
            '/' if context == LexContext::RegExp => self.scan_regexp(start)?,
            '/' => self.scan_slash(),
            '%' => self.scan_percent(),
            '<' => self.scan_less_than(),
            '>' => self.scan_greater_than(),
            '=' => self.scan_equal(),
            '!' => self.scan_bang(),
            '&' => self.scan_ampersand(),
            '|' => self.scan_pipe(),
            '^' => self.scan_caret(),
            '?' => self.scan_question(),

            // String literals
            '"' | '\'' => self.scan_string(ch, start)?,

            // Template literals
            '`' => self.scan_template(start)?,

            // Numbers
            '0'..='9' => self.scan_number(start)?,

            // Identifiers and keywords
            '\\' => self.scan_identifier(start)?,
            _ if is_id_start(ch) => self.scan_identifier(start)?,

            _ => {
                return Err(LexError::new(
                    format!("Invalid or unexpected token '{}'", ch),
                    Span::new(start, self.pos),
                ));
            }
        };

        let mut token = Token::new(kind, Span::new(start, self.pos));
        token.newline_before = newline_before;
        self.previous = Some(token.kind.clone());
        Ok(token)
    }

    /// Re-reads the token starting at `start` as a regular expression literal.
    ///
    /// The parser calls this when it finds `/` or `/=` in operand position.
    pub fn rescan_regexp(&mut self, start: usize, newline_before: bool) -> LexResult<Token> {
        self.pos = start;
        self.legacy_octal = false;
        self.bump();
        let kind = self.scan_regexp(start)?;
        let mut token = Token::new(kind, Span::new(start, self.pos));
        token.newline_before = newline_before;
        Ok(token)
    }

    /// Re-reads a `}` at `start` as the continuation of a template literal.
    pub fn rescan_template_continuation(&mut self, start: usize) -> LexResult<Token> {
        self.pos = start;
        self.bump();
        let kind = self.scan_template(start)?;
        Ok(Token::new(kind, Span::new(start, self.pos)))
    }

    pub(super) fn peek(&self) -> Option<char> {
        self.source[self.pos..].chars().next()
    }

    pub(super) fn peek_next(&self) -> Option<char> {
        let mut chars = self.source[self.pos..].chars();
        chars.next();
        chars.next()
    }

    pub(super) fn bump(&mut self) -> Option<char> {
        let ch = self.peek()?;
        self.pos += ch.len_utf8();
        Some(ch)
    }

    pub(super) fn eat(&mut self, expected: char) -> bool {
        if self.peek() == Some(expected) {
            self.pos += expected.len_utf8();
            true
        } else {
            false
        }
    }

    fn skip_whitespace_and_comments(&mut self) -> LexResult<()> {
        loop {
            match self.peek() {
                Some(ch) if is_line_terminator(ch) => {
                    self.newline_before = true;
                    self.bump();
                }
                Some(ch) if is_whitespace(ch) => {
                    self.bump();
                }
                Some('/') => match self.peek_next() {
                    Some('/') => {
                        while let Some(ch) = self.peek() {
                            if is_line_terminator(ch) {
                                break;
                            }
                            self.bump();
                        }
                    }
                    Some('*') => {
                        let start = self.pos;
                        self.pos += 2;
                        loop {
                            match self.bump() {
                                Some('*') if self.eat('/') => break,
                                Some(ch) if is_line_terminator(ch) => self.newline_before = true,
                                Some(_) => {}
                                None => {
                                    return Err(LexError::new(
                                        "Unterminated comment",
                                        Span::new(start, self.pos),
                                    ));
                                }
                            }
                        }
                    }
                    _ => break,
                },
                // Hashbang comment at the very start of a script
                Some('#') if self.pos == 0 && self.peek_next() == Some('!') => {
                    while let Some(ch) = self.peek() {
                        if is_line_terminator(ch) {
                            break;
                        }
                        self.bump();
                    }
                }
                _ => break,
            }
        }
        Ok(())
    }

    fn scan_identifier(&mut self, start: usize) -> LexResult<TokenKind> {
        // Rewind one character so the loop sees the first one again,
        // which keeps escape handling in one place.
        self.pos = start;
        let mut name = String::new();
        let mut escaped = false;
        loop {
            match self.peek() {
                Some('\\') => {
                    self.bump();
                    if !self.eat('u') {
                        return Err(LexError::new(
                            "Invalid Unicode escape sequence",
                            Span::new(start, self.pos),
                        ));
                    }
                    let code = self.scan_unicode_escape(start)?;
                    let ch = char::from_u32(code).ok_or_else(|| {
                        LexError::new("Invalid Unicode escape sequence", Span::new(start, self.pos))
                    })?;
                    let valid = if name.is_empty() { is_id_start(ch) } else { is_id_continue(ch) };
                    if !valid {
                        return Err(LexError::new(
                            "Invalid Unicode escape sequence",
                            Span::new(start, self.pos),
                        ));
                    }
                    escaped = true;
                    name.push(ch);
                }
                Some(ch) if (name.is_empty() && is_id_start(ch)) || (!name.is_empty() && is_id_continue(ch)) => {
                    self.bump();
                    name.push(ch);
                }
                _ => break,
            }
        }

        if !escaped && let Some(keyword) = TokenKind::keyword(&name) {
            return Ok(keyword);
        }
        Ok(TokenKind::Identifier(name))
    }

    fn scan_dot(&mut self) -> TokenKind {
        if self.peek() == Some('.') && self.peek_next() == Some('.') {
            self.pos += 2;
            TokenKind::Ellipsis
        } else {
            TokenKind::Dot
        }
    }

    fn scan_plus(&mut self) -> TokenKind {
        if self.eat('+') {
            TokenKind::PlusPlus
        } else if self.eat('=') {
            TokenKind::PlusEqual
        } else {
            TokenKind::Plus
        }
    }

    fn scan_minus(&mut self) -> TokenKind {
        if self.eat('-') {
            TokenKind::MinusMinus
        } else if self.eat('=') {
            TokenKind::MinusEqual
        } else {
            TokenKind::Minus
        }
    }

    fn scan_star(&mut self) -> TokenKind {
        if self.eat('*') {
            if self.eat('=') {
                TokenKind::StarStarEqual
            } else {
                TokenKind::StarStar
            }
        } else if self.eat('=') {
            TokenKind::StarEqual
        } else {
            TokenKind::Star
        }
    }

    fn scan_slash(&mut self) -> TokenKind {
        if self.eat('=') {
            TokenKind::SlashEqual
        } else {
            TokenKind::Slash
        }
    }

    fn scan_percent(&mut self) -> TokenKind {
        if self.eat('=') {
            TokenKind::PercentEqual
        } else {
            TokenKind::Percent
        }
    }

    fn scan_less_than(&mut self) -> TokenKind {
        if self.eat('<') {
            if self.eat('=') {
                TokenKind::LeftShiftEqual
            } else {
                TokenKind::LeftShift
            }
        } else if self.eat('=') {
            TokenKind::LessThanEqual
        } else {
            TokenKind::LessThan
        }
    }

    fn scan_greater_than(&mut self) -> TokenKind {
        if self.eat('>') {
            if self.eat('>') {
                if self.eat('=') {
                    TokenKind::UnsignedRightShiftEqual
                } else {
                    TokenKind::UnsignedRightShift
                }
            } else if self.eat('=') {
                TokenKind::RightShiftEqual
            } else {
                TokenKind::RightShift
            }
        } else if self.eat('=') {
            TokenKind::GreaterThanEqual
        } else {
            TokenKind::GreaterThan
        }
    }

    fn scan_equal(&mut self) -> TokenKind {
        if self.eat('=') {
            if self.eat('=') {
                TokenKind::StrictEqual
            } else {
                TokenKind::EqualEqual
            }
        } else if self.eat('>') {
            TokenKind::Arrow
        } else {
            TokenKind::Equal
        }
    }

    fn scan_bang(&mut self) -> TokenKind {
        if self.eat('=') {
            if self.eat('=') {
                TokenKind::StrictNotEqual
            } else {
                TokenKind::NotEqual
            }
        } else {
            TokenKind::Bang
        }
    }

    fn scan_ampersand(&mut self) -> TokenKind {
        if self.eat('&') {
            if self.eat('=') {
                TokenKind::AmpersandAmpersandEqual
            } else {
                TokenKind::AmpersandAmpersand
            }
        } else if self.eat('=') {
            TokenKind::AmpersandEqual
        } else {
            TokenKind::Ampersand
        }
    }

    fn scan_pipe(&mut self) -> TokenKind {
        if self.eat('|') {
            if self.eat('=') {
                TokenKind::PipePipeEqual
            } else {
                TokenKind::PipePipe
            }
        } else if self.eat('=') {
            TokenKind::PipeEqual
        } else {
            TokenKind::Pipe
        }
    }

    fn scan_caret(&mut self) -> TokenKind {
        if self.eat('=') {
            TokenKind::CaretEqual
        } else {
            TokenKind::Caret
        }
    }

    fn scan_question(&mut self) -> TokenKind {
        if self.peek() == Some('?') {
            self.bump();
            if self.eat('=') {
                TokenKind::QuestionQuestionEqual
            } else {
                TokenKind::QuestionQuestion
            }
        } else if self.peek() == Some('.') && !matches!(self.peek_next(), Some('0'..='9')) {
            // `a?.5:b` is a conditional, not optional chaining
            self.bump();
            TokenKind::QuestionDot
        } else {
            TokenKind::Question
        }
    }
}

impl Iterator for Scanner<'_> {
    type Item = LexResult<Token>;

    /// Tokenizes with the classic previous-token heuristic for `/`.
    fn next(&mut self) -> Option<Self::Item> {
        let context = match &self.previous {
            Some(kind) if kind.ends_expression() => LexContext::Division,
            _ => LexContext::RegExp,
        };
        match self.next_token(context) {
            Ok(token) if token.kind == TokenKind::Eof => None,
            other => Some(other),
        }
    }
}

/// Checks if a character can start an identifier.
pub fn is_id_start(ch: char) -> bool {
    ch == '$' || ch == '_' || ch.is_ascii_alphabetic() || unicode_xid::UnicodeXID::is_xid_start(ch)
}

/// Checks if a character can continue an identifier.
pub fn is_id_continue(ch: char) -> bool {
    ch == '$'
        || ch == '_'
        || ch == '\u{200C}'
        || ch == '\u{200D}'
        || ch.is_ascii_alphanumeric()
        || unicode_xid::UnicodeXID::is_xid_continue(ch)
}

/// ECMAScript line terminators.
pub fn is_line_terminator(ch: char) -> bool {
    matches!(ch, '\n' | '\r' | '\u{2028}' | '\u{2029}')
}

/// ECMAScript white space (excluding line terminators).
pub fn is_whitespace(ch: char) -> bool {
    matches!(ch, '\t' | '\u{0B}' | '\u{0C}' | ' ' | '\u{A0}' | '\u{FEFF}')
        || (!is_line_terminator(ch) && ch.is_whitespace())
}

#[cfg(test)]
mod tests {
    use super::*;

    fn kinds(source: &str) -> Vec<TokenKind> {
        Scanner::new(source)
            .map(|token| token.unwrap().kind)
            .collect()
    }

    #[test]
    fn test_empty_source() {
        let mut scanner = Scanner::new("");
        let token = scanner.next_token(LexContext::RegExp).unwrap();
        assert_eq!(token.kind, TokenKind::Eof);
    }

    #[test]
    fn test_punctuators() {
        assert_eq!(
            kinds("a ?. b ?? c ??= d ** e >>>= f => ..."),
            vec![
                TokenKind::Identifier("a".into()),
                TokenKind::QuestionDot,
                TokenKind::Identifier("b".into()),
                TokenKind::QuestionQuestion,
                TokenKind::Identifier("c".into()),
                TokenKind::QuestionQuestionEqual,
                TokenKind::Identifier("d".into()),
                TokenKind::StarStar,
                TokenKind::Identifier("e".into()),
                TokenKind::UnsignedRightShiftEqual,
                TokenKind::Identifier("f".into()),
                TokenKind::Arrow,
                TokenKind::Ellipsis,
            ]
        );
    }

    #[test]
    fn test_conditional_with_decimal_is_not_optional_chain() {
        assert_eq!(
            kinds("a?.5:1"),
            vec![
                TokenKind::Identifier("a".into()),
                TokenKind::Question,
                TokenKind::Number(0.5),
                TokenKind::Colon,
                TokenKind::Number(1.0),
            ]
        );
    }

    #[test]
    fn test_keywords_and_identifiers() {
        assert_eq!(
            kinds("let yield of instanceof"),
            vec![
                TokenKind::Let,
                TokenKind::Identifier("yield".into()),
                TokenKind::Identifier("of".into()),
                TokenKind::Instanceof,
            ]
        );
    }

    #[test]
    fn test_unicode_identifiers() {
        assert_eq!(kinds("café"), vec![TokenKind::Identifier("café".into())]);
        assert_eq!(kinds("\\u0061b"), vec![TokenKind::Identifier("ab".into())]);
    }

    #[test]
    fn test_newline_before_flag() {
        let mut scanner = Scanner::new("a\nb c /* x\n */ d // e\nf");
        let flags: Vec<bool> = std::iter::from_fn(|| {
            let token = scanner.next_token(LexContext::Division).unwrap();
            (token.kind != TokenKind::Eof).then_some(token.newline_before)
        })
        .collect();
        assert_eq!(flags, vec![true, true, false, true, true]);
    }

    #[test]
    fn test_slash_depends_on_context() {
        let mut scanner = Scanner::new("/ab+c/gi");
        let token = scanner.next_token(LexContext::RegExp).unwrap();
        assert_eq!(
            token.kind,
            TokenKind::RegExp {
                pattern: "ab+c".into(),
                flags: "gi".into()
            }
        );

        let mut scanner = Scanner::new("/ab");
        let token = scanner.next_token(LexContext::Division).unwrap();
        assert_eq!(token.kind, TokenKind::Slash);
    }

    #[test]
    fn test_iterator_uses_previous_token() {
        assert_eq!(
            kinds("a / b"),
            vec![
                TokenKind::Identifier("a".into()),
                TokenKind::Slash,
                TokenKind::Identifier("b".into()),
            ]
        );
        assert!(matches!(kinds("x = /y/")[2], TokenKind::RegExp { .. }));
    }

    #[test]
    fn test_rescan_regexp() {
        let mut scanner = Scanner::new("/=x/g");
        let token = scanner.next_token(LexContext::Division).unwrap();
        assert_eq!(token.kind, TokenKind::SlashEqual);
        let token = scanner.rescan_regexp(token.span.start, false).unwrap();
        assert_eq!(
            token.kind,
            TokenKind::RegExp {
                pattern: "=x".into(),
                flags: "g".into()
            }
        );
    }

    #[test]
    fn test_unterminated_comment() {
        let mut scanner = Scanner::new("/* never closed");
        assert!(scanner.next_token(LexContext::RegExp).is_err());
    }

    #[test]
    fn test_invalid_character() {
        let mut scanner = Scanner::new("@");
        let err = scanner.next_token(LexContext::RegExp).unwrap_err();
        assert_eq!(err.span, Span::new(0, 1));
    }

    #[test]
    fn test_hashbang() {
        assert_eq!(kinds("#!/usr/bin/env node\n1"), vec![TokenKind::Number(1.0)]);
    }
}
