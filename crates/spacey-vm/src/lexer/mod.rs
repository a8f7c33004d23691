//! Lexical analysis (tokenization) for JavaScript source code.
//!
//! The lexer transforms JavaScript source text into a stream of tokens
//! that can be consumed by the parser.
//!
//! ## Structure
//!
//! - `scanner.rs` - Main `Scanner` struct, punctuators, identifiers, comments
//! - `literals.rs` - Number, string, template and regular expression literals
//! - `token.rs` - `Token` and `TokenKind` definitions
//!
//! A `/` is ambiguous between division and the start of a regular
//! expression; [`Scanner::next_token`] takes a [`LexContext`] and the parser
//! re-reads the token with [`Scanner::rescan_regexp`] when it finds `/` in
//! operand position. Each token records whether a line terminator preceded
//! it, which drives automatic semicolon insertion.
//!
//! ## Usage
//!
//! ```rust
//! use spacey_vm::lexer::{LexContext, Scanner, TokenKind};
//!
//! let mut scanner = Scanner::new("let x = 42;");
//!
//! loop {
//!     let token = scanner.next_token(LexContext::RegExp).unwrap();
//!     if matches!(token.kind, TokenKind::Eof) {
//!         break;
//!     }
//!     println!("{:?}", token.kind);
//! }
//! ```

mod literals;
mod scanner;
mod token;

pub use scanner::{
    LexContext, LexError, LexResult, Scanner, is_id_continue, is_id_start, is_line_terminator,
    is_whitespace,
};
pub use token::{Span, Token, TokenKind};

/// Maps byte offsets to 1-based line and column numbers.
#[derive(Debug, Clone)]
pub struct LineIndex {
    line_starts: Vec<usize>,
}

impl LineIndex {
    /// Builds the index for `source`.
    pub fn new(source: &str) -> Self {
        let mut line_starts = vec![0];
        let mut chars = source.char_indices().peekable();
        while let Some((offset, ch)) = chars.next() {
            match ch {
                '\r' => {
                    if let Some((_, '\n')) = chars.peek() {
                        chars.next();
                        line_starts.push(offset + 2);
                    } else {
                        line_starts.push(offset + 1);
                    }
                }
                '\n' => line_starts.push(offset + 1),
                '\u{2028}' | '\u{2029}' => line_starts.push(offset + ch.len_utf8()),
                _ => {}
            }
        }
        Self { line_starts }
    }

    /// Line and column (both 1-based, column in characters) of `offset`.
    pub fn line_col(&self, source: &str, offset: usize) -> (u32, u32) {
        let line = match self.line_starts.binary_search(&offset) {
            Ok(line) => line,
            Err(next) => next - 1,
        };
        let start = self.line_starts[line];
        let end = offset.min(source.len()).max(start);
        let column = source.get(start..end).map_or(0, |text| text.chars().count());
        (line as u32 + 1, column as u32 + 1)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_line_index() {
        let source = "a\nbc\r\nd";
        let index = LineIndex::new(source);
        assert_eq!(index.line_col(source, 0), (1, 1));
        assert_eq!(index.line_col(source, 3), (2, 2));
        assert_eq!(index.line_col(source, 6), (3, 1));
    }
}
