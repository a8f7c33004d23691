//! Parser for JavaScript source code.
//!
//! Transforms a stream of tokens into an Abstract Syntax Tree (AST).
//!
//! ## Structure
//!
//! - `parser` - The `Parser` struct, token plumbing, early-error bookkeeping, functions
//! - `statements` - Statement and module declaration parsing
//! - `expressions` - Expression parsing (operators, literals, calls)
//! - `patterns` - Destructuring patterns and assignment-target conversion
//!
//! ## Usage
//!
//! ```rust
//! use spacey_vm::parser::Parser;
//!
//! let mut parser = Parser::new("let x = 1 + 2;");
//! let program = parser.parse_program().expect("Should parse");
//! assert_eq!(program.body.len(), 1);
//! ```

mod expressions;
#[allow(clippy::module_inception)]
mod parser;
mod patterns;
mod statements;

pub use parser::{ParseResult, Parser};
