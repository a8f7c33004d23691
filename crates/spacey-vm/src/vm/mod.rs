//! The bytecode virtual machine.
//!
//! ## Structure
//!
//! - `interpreter` - The VM struct, frame management and instruction dispatch
//! - `calls` - `[[Call]]`, `[[Construct]]`, closures, `eval` and `require`
//! - `iteration` - The iteration protocol and generator resumption
//! - `operations` - Property access and other abstract operations
//! - `conversions` - Type conversions (ToPrimitive, ToNumber, ToString, ...)
//! - `arithmetic` - Numeric operators over Numbers and BigInts
//! - `comparison` - Equality and relational comparison

mod interpreter;

pub mod arithmetic;
pub mod calls;
pub mod comparison;
pub mod conversions;
pub mod iteration;
pub mod operations;

pub use conversions::Hint;
pub use interpreter::VM;
