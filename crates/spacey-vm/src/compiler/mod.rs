//! Bytecode compiler for JavaScript.
//!
//! Transforms source text into bytecode that can be executed by the VM.
//!
//! # Module Structure
//!
//! - `bytecode`: Bytecode definitions and instructions
//! - `codegen`: Code generation from AST
//!   - `codegen::scope`: Scope analysis for variable resolution

pub mod bytecode;
pub mod codegen;

use std::sync::Arc;

pub use bytecode::{Bytecode, CompiledFunction, Constant, Instruction, OpCode, Operand};
pub use codegen::{Compiler, RootKind};

use bytecode::SourceText;

use crate::error::CompileError;
use crate::options::CompileOptions;
use crate::parser::Parser;

/// Compiles a script.
pub fn compile(source: &str, options: &CompileOptions) -> Result<Arc<CompiledFunction>, CompileError> {
    let program = Parser::with_options(source, options).parse_program()?;
    let text = Arc::new(SourceText::new(source, options.source_url.clone()));
    Compiler::compile_program(&program, RootKind::Script, text)
}

/// Compiles a CommonJS-style module body taking `(exports, require, module)`.
pub fn compile_module(source: &str, options: &CompileOptions) -> Result<Arc<CompiledFunction>, CompileError> {
    let program = Parser::with_options(source, options).module().parse_program()?;
    let text = Arc::new(SourceText::new(source, options.source_url.clone()));
    Compiler::compile_program(&program, RootKind::Module, text)
}

/// Compiles the argument of a direct or indirect `eval`.
///
/// `strict` is the strictness of the calling code and `in_function` whether
/// the call appears inside a function (which allows `new.target`).
pub fn compile_eval(source: &str, strict: bool, in_function: bool) -> Result<Arc<CompiledFunction>, CompileError> {
    let mut parser = Parser::new(source).strict(strict);
    if in_function {
        parser = parser.in_function_context();
    }
    let program = parser.parse_program()?;
    let text = Arc::new(SourceText::new(source, None));
    Compiler::compile_program(&program, RootKind::Eval, text)
}
