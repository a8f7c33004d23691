//! JavaScript runtime types and execution context.

pub mod collections;
pub mod context;
pub mod environment;
pub mod function;
pub mod object;
pub mod string;
pub mod value;

pub use function::{CallFrame, Callable, GeneratorData, GeneratorState, NativeFn, ResumeMode};
pub use string::JsString;
