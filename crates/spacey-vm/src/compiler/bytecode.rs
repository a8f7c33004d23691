//! Bytecode definitions.
//!
//! A [`CompiledFunction`] is immutable once produced and is shared through an
//! `Arc` by every closure instantiated from the same function literal, across
//! threads if needed. It therefore holds no heap handles: literals live in the
//! constant pool as [`Constant`]s and are turned into values by the
//! interpreter.

use std::sync::Arc;

use num_bigint::BigInt;

use crate::lexer::LineIndex;
use crate::runtime::string::JsString;

/// A compiled bytecode chunk.
#[derive(Debug, Clone, Default)]
pub struct Bytecode {
    /// The instructions
    pub instructions: Vec<Instruction>,
    /// The constant pool
    pub constants: Vec<Constant>,
}

impl Bytecode {
    /// Creates a new empty bytecode chunk.
    pub fn new() -> Self {
        Self::default()
    }

    /// Adds an instruction and returns its index.
    pub fn emit(&mut self, instruction: Instruction) -> usize {
        let index = self.instructions.len();
        self.instructions.push(instruction);
        index
    }

    /// Adds a constant and returns its index.
    pub fn add_constant(&mut self, constant: Constant) -> u32 {
        let index = self.constants.len();
        self.constants.push(constant);
        index as u32
    }

    /// Returns the string constant at `index`, if there is one.
    pub fn name(&self, index: u32) -> Option<&JsString> {
        match self.constants.get(index as usize) {
            Some(Constant::String(s)) => Some(s),
            _ => None,
        }
    }
}

/// An entry of the constant pool.
#[derive(Debug, Clone)]
pub enum Constant {
    /// A number literal
    Number(f64),
    /// A string literal or a property/variable name
    String(JsString),
    /// A BigInt literal
    BigInt(Arc<BigInt>),
    /// A nested function literal
    Function(Arc<CompiledFunction>),
    /// The bindings of a block scope pushed by `PushScope`
    Scope(Arc<ScopeTemplate>),
    /// The strings of a tagged template call site
    Template(Arc<TemplateSite>),
    /// A regular expression literal
    RegExp {
        /// Pattern source
        pattern: Arc<str>,
        /// Flags
        flags: Arc<str>,
    },
}

/// The cooked and raw strings of one tagged template call site.
#[derive(Debug, Clone)]
pub struct TemplateSite {
    /// Unique per call site; the template object is cached under it
    pub id: u64,
    /// Cooked strings (`None` for invalid escapes)
    pub cooked: Vec<Option<JsString>>,
    /// Raw strings
    pub raw: Vec<JsString>,
}

/// Layout of a scope allocated on the heap at run time.
#[derive(Debug, Clone, Default)]
pub struct ScopeTemplate {
    /// Whether this scope receives `var` declarations made by `eval`
    pub var_scope: bool,
    /// The bindings, indexed by slot
    pub bindings: Vec<BindingTemplate>,
}

/// One binding of a [`ScopeTemplate`].
#[derive(Debug, Clone)]
pub struct BindingTemplate {
    /// Binding name
    pub name: JsString,
    /// `false` for `const` and the name of a function expression
    pub mutable: bool,
    /// Lexical bindings start uninitialized (temporal dead zone)
    pub lexical: bool,
    /// Sloppy assignments to an immutable binding are silently ignored
    pub silent: bool,
}

/// What a compiled function was compiled from.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CodeKind {
    /// Top-level script code
    Script,
    /// Code run by `eval`
    Eval,
    /// A CommonJS-style module body
    Module,
    /// `function` declarations and expressions
    Normal,
    /// Arrow functions
    Arrow,
    /// Object literal methods
    Method,
    /// Getters
    Getter,
    /// Setters
    Setter,
}

impl CodeKind {
    /// Whether `this`, `arguments` and `new.target` come from the enclosing code.
    pub fn is_arrow(self) -> bool {
        matches!(self, CodeKind::Arrow)
    }

    /// Whether this is a function body rather than top-level code.
    pub fn is_function(self) -> bool {
        !matches!(self, CodeKind::Script | CodeKind::Eval)
    }
}

/// Exception handler kinds.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum HandlerKind {
    /// Entered with the thrown value on the stack
    Catch,
    /// Entered with `[value, completion kind]` on the stack; ends in `EndFinally`
    Finally,
}

/// Completion kinds pushed for a `Finally` handler.
pub const COMPLETION_THROW: f64 = 0.0;
/// See [`COMPLETION_THROW`].
pub const COMPLETION_RETURN: f64 = 1.0;

/// An entry of the exception handler table.
///
/// Entries are ordered innermost first; the interpreter takes the first
/// entry whose range covers the faulting instruction.
#[derive(Debug, Clone, PartialEq)]
pub struct ExceptionHandler {
    /// First covered instruction
    pub start: u32,
    /// One past the last covered instruction
    pub end: u32,
    /// Handler entry point
    pub target: u32,
    /// Operand stack height to restore
    pub stack_depth: u32,
    /// Number of scopes pushed by this function to keep
    pub scope_depth: u32,
    /// Handler kind
    pub kind: HandlerKind,
}

/// Source text shared by every function compiled from one compilation unit.
#[derive(Debug)]
pub struct SourceText {
    /// The full text
    pub text: Arc<str>,
    /// Where it came from, for error messages only
    pub url: Option<String>,
    lines: LineIndex,
}

impl SourceText {
    /// Indexes `text` for position lookups.
    pub fn new(text: &str, url: Option<String>) -> Self {
        Self {
            text: Arc::from(text),
            url,
            lines: LineIndex::new(text),
        }
    }

    /// 1-based line and column of a byte offset.
    pub fn line_col(&self, offset: u32) -> (u32, u32) {
        self.lines.line_col(&self.text, offset as usize)
    }
}

/// The output of compiling one function literal, script or eval body.
#[derive(Debug, Clone)]
pub struct CompiledFunction {
    /// Function name (possibly inferred, empty if anonymous)
    pub name: JsString,
    /// What this code was compiled from
    pub kind: CodeKind,
    /// `function*`
    pub is_generator: bool,
    /// Strict mode code
    pub strict: bool,
    /// Value of the `length` property
    pub param_count: u32,
    /// Instructions and constants
    pub bytecode: Bytecode,
    /// Number of frame-local slots
    pub local_count: u32,
    /// Names of the local slots, for diagnostics
    pub local_names: Vec<Arc<str>>,
    /// Highest operand stack height reached
    pub max_stack: u32,
    /// Exception handler table
    pub handlers: Vec<ExceptionHandler>,
    /// `(instruction index, source offset)` pairs, ascending
    pub positions: Vec<(u32, u32)>,
    /// Names of outer bindings this function reads or writes
    pub captures: Vec<Arc<str>>,
    /// Heap scope created on entry, when any binding is captured
    pub function_scope: Option<Arc<ScopeTemplate>>,
    /// Contains a direct `eval`
    pub has_direct_eval: bool,
    /// Source text of the compilation unit
    pub source: Arc<SourceText>,
    /// Byte range of this function within the source
    pub span: (u32, u32),
}

impl CompiledFunction {
    /// Whether instances can be called with `new`.
    pub fn is_constructor(&self) -> bool {
        self.kind == CodeKind::Normal && !self.is_generator
    }

    /// Source offset of the instruction at `ip`.
    pub fn offset_at(&self, ip: usize) -> Option<u32> {
        let ip = ip as u32;
        match self.positions.binary_search_by_key(&ip, |&(at, _)| at) {
            Ok(index) => Some(self.positions[index].1),
            Err(0) => None,
            Err(index) => Some(self.positions[index - 1].1),
        }
    }

    /// 1-based line and column of the instruction at `ip`.
    pub fn line_col(&self, ip: usize) -> Option<(u32, u32)> {
        self.offset_at(ip).map(|offset| self.source.line_col(offset))
    }

    /// The function's source text, as returned by `Function.prototype.toString`.
    pub fn source_text(&self) -> &str {
        self.source
            .text
            .get(self.span.0 as usize..self.span.1 as usize)
            .unwrap_or("")
    }
}

/// A single bytecode instruction.
#[derive(Debug, Clone, PartialEq)]
pub struct Instruction {
    /// The operation code
    pub opcode: OpCode,
    /// Optional operand
    pub operand: Option<Operand>,
}

impl Instruction {
    /// Creates a new instruction with no operand.
    pub fn simple(opcode: OpCode) -> Self {
        Self {
            opcode,
            operand: None,
        }
    }

    /// Creates a new instruction with an operand.
    pub fn with_operand(opcode: OpCode, operand: Operand) -> Self {
        Self {
            opcode,
            operand: Some(operand),
        }
    }

    /// Net change in operand stack height when execution falls through.
    pub fn stack_effect(&self) -> i32 {
        let count = match self.operand {
            Some(Operand::ArgCount(n)) => n as i32,
            _ => 0,
        };
        use OpCode::*;
        match self.opcode {
            OpCode::Constant | Undefined | Null | True | False | Dup | Pick | GetLocal | GetScope | GetName
            | TypeofName | DeleteName | GetGlobal | GetArg | RestArgs | CreateArguments | This
            | NewTarget | Callee | NewObject | NewArray | Closure | GetIterator | ForOfStep
            | DestructureStep | DestructureRest | ForInNext | TemplateObject | RegExp
            | ImportModule => 1,
            Dup2 | GetNameForCall => 2,
            Pop | InitLocal | InitScope | InitVar | InitName | PushWith | ArrayPush
            | ArraySpread | DefineField | ObjectSpread | SetProto | GetProperty | SetNamed
            | DeleteProperty | In | InstanceOf | NewSpread | Return | JumpIfFalse | JumpIfTrue
            | Throw | Add | Sub | Mul | Div | Mod | Exp | BitAnd | BitOr | BitXor | Shl | Shr
            | UShr | Eq | Ne | StrictEq | StrictNe | Lt | Le | Gt | Ge => -1,
            DefineComputed | DefineGetter | DefineSetter | SetProperty | CallSpread
            | EndFinally | IteratorClose | CloseIteratorAbrupt | DestructureClose => -2,
            Call | CallEval => -(count + 1),
            New => -count,
            CopyDataProperties => -count,
            Swap | Rot3 | Rot4 | SetLocal | ClearLocal | SetScope | SetName | SetGlobal
            | DeclareVar | DeclareLet | DeclareConst | PushScope | PopScope | CopyScope
            | ArrayHole | GetNamed | Neg | Plus | Not | BitNot | TypeOf | ToNumeric | Inc | Dec
            | ToPropertyKey | ToString | Jump | JumpIfFalseKeep | JumpIfTrueKeep
            | JumpIfNotNullishKeep | JumpIfNotUndefined | OptionalJump | ThrowTypeError
            | ForInPrepare | GeneratorStart | Yield | YieldRaw | DelegateStep | ImportDefault
            | RequireObjectCoercible | Debugger | Nop => 0,
        }
    }
}

/// Instruction operands.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Operand {
    /// Constant pool index
    Constant(u32),
    /// Frame-local slot
    Local(u32),
    /// Heap binding: scopes to walk outward, then slot
    Scope {
        /// Number of scope links to follow
        hops: u32,
        /// Binding slot in the target scope
        slot: u32,
    },
    /// Absolute instruction index
    Jump(u32),
    /// Argument count for calls, argument index for `GetArg`
    ArgCount(u32),
    /// Constant pool index of a name
    Name(u32),
    /// Jump target plus a number of values to discard first
    Branch {
        /// Absolute instruction index
        target: u32,
        /// Values popped before jumping
        pop: u32,
    },
}

/// Bytecode operation codes.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[repr(u8)]
pub enum OpCode {
    // Constants
    /// Push a constant from the pool
    Constant,
    /// Push undefined
    Undefined,
    /// Push null
    Null,
    /// Push true
    True,
    /// Push false
    False,

    // Stack operations
    /// Discard the top value
    Pop,
    /// Duplicate the top value
    Dup,
    /// Duplicate the top two values: `a b -> a b a b`
    Dup2,
    /// Swap the top two values
    Swap,
    /// Move the top value below the next two: `a b c -> c a b`
    Rot3,
    /// Move the top value below the next three: `a b c d -> d a b c`
    Rot4,
    /// Push a copy of the value `n` slots below the top (`Pick 0` is `Dup`)
    Pick,

    // Frame locals
    /// Push a local, throwing if it is uninitialized
    GetLocal,
    /// Store the top value in an initialized local
    SetLocal,
    /// Pop into a local, initializing it
    InitLocal,
    /// Put a local back into its temporal dead zone
    ClearLocal,

    // Heap bindings
    /// Push a binding of an enclosing heap scope
    GetScope,
    /// Store the top value in a heap binding
    SetScope,
    /// Pop into a heap binding, initializing it
    InitScope,

    // Dynamic name resolution
    /// Resolve a name along the scope chain and push its value
    GetName,
    /// Assign the top value to a name resolved along the scope chain
    SetName,
    /// `typeof name`, which does not throw for unresolvable names
    TypeofName,
    /// `delete name`
    DeleteName,
    /// Push a function and the `this` value its reference implies
    GetNameForCall,
    /// Read a global binding or global object property
    GetGlobal,
    /// Assign a global binding or global object property
    SetGlobal,

    // Declarations
    /// Create a `var` binding in the variable environment if missing
    DeclareVar,
    /// Create an uninitialized `let` binding in the global scope
    DeclareLet,
    /// Create an uninitialized `const` binding in the global scope
    DeclareConst,
    /// Pop into a binding of the variable environment
    InitVar,
    /// Pop into the nearest binding with this name, initializing it
    InitName,

    // Scopes
    /// Push a block scope built from a template
    PushScope,
    /// Leave the innermost scope
    PopScope,
    /// Pop an object and push a `with` scope over it
    PushWith,
    /// Replace the innermost scope with a copy (per-iteration bindings)
    CopyScope,

    // Function context
    /// Push argument `n` or undefined
    GetArg,
    /// Push an array of the arguments from index `n` on
    RestArgs,
    /// Push a new `arguments` object
    CreateArguments,
    /// Push `this`
    This,
    /// Push `new.target`
    NewTarget,
    /// Push the running function
    Callee,

    // Literals
    /// Push a new empty object
    NewObject,
    /// Push a new empty array
    NewArray,
    /// `arr v -> arr`, appending v
    ArrayPush,
    /// Append a hole
    ArrayHole,
    /// `arr iterable -> arr`, appending every iterated value
    ArraySpread,
    /// `obj v -> obj`, defining a named data property
    DefineField,
    /// `obj key v -> obj`, defining a data property
    DefineComputed,
    /// `obj key f -> obj`, defining a getter
    DefineGetter,
    /// `obj key f -> obj`, defining a setter
    DefineSetter,
    /// `obj src -> obj`, copying own enumerable properties
    ObjectSpread,
    /// `obj proto -> obj`, for `__proto__: v`
    SetProto,
    /// `src k1..kn -> rest`, copying properties except the listed keys
    CopyDataProperties,

    // Property access
    /// `obj key -> value`
    GetProperty,
    /// `obj -> value`
    GetNamed,
    /// `obj key value -> value`
    SetProperty,
    /// `obj value -> value`
    SetNamed,
    /// `obj key -> bool`
    DeleteProperty,
    /// `key obj -> bool`
    In,
    /// `value ctor -> bool`
    InstanceOf,

    // Calls
    /// `f this args.. -> result`
    Call,
    /// `f this array -> result`
    CallSpread,
    /// `ctor args.. -> object`
    New,
    /// `ctor array -> object`
    NewSpread,
    /// A call that is a direct eval when the callee is the intrinsic `eval`
    CallEval,
    /// Return the top value from the current frame
    Return,
    /// Create a closure over the current scope
    Closure,

    // Arithmetic
    /// Addition or string concatenation
    Add,
    /// Subtraction
    Sub,
    /// Multiplication
    Mul,
    /// Division
    Div,
    /// Remainder
    Mod,
    /// Exponentiation
    Exp,
    /// Unary minus
    Neg,
    /// Unary plus
    Plus,
    /// Increment a numeric value
    Inc,
    /// Decrement a numeric value
    Dec,
    /// Convert to a Number or BigInt
    ToNumeric,

    // Bitwise
    /// Bitwise AND
    BitAnd,
    /// Bitwise OR
    BitOr,
    /// Bitwise XOR
    BitXor,
    /// Bitwise NOT
    BitNot,
    /// Left shift
    Shl,
    /// Signed right shift
    Shr,
    /// Unsigned right shift
    UShr,

    // Comparison
    /// Loose equality
    Eq,
    /// Loose inequality
    Ne,
    /// Strict equality
    StrictEq,
    /// Strict inequality
    StrictNe,
    /// Less than
    Lt,
    /// Less than or equal
    Le,
    /// Greater than
    Gt,
    /// Greater than or equal
    Ge,

    // Unary
    /// Logical NOT
    Not,
    /// `typeof` of a value
    TypeOf,
    /// Convert to a property key
    ToPropertyKey,
    /// Convert to a string (template substitutions)
    ToString,

    // Control flow
    /// Unconditional jump
    Jump,
    /// Pop and jump if falsy
    JumpIfFalse,
    /// Pop and jump if truthy
    JumpIfTrue,
    /// Jump if falsy, keeping the value
    JumpIfFalseKeep,
    /// Jump if truthy, keeping the value
    JumpIfTrueKeep,
    /// Jump if neither null nor undefined, keeping the value
    JumpIfNotNullishKeep,
    /// Jump if not undefined, keeping the value
    JumpIfNotUndefined,
    /// Optional chain: if null or undefined, pop values, push undefined and jump
    OptionalJump,

    // Exceptions
    /// Throw the top value
    Throw,
    /// Throw a TypeError with a constant message
    ThrowTypeError,
    /// Finish a `Finally` handler: rethrow or resume the pending return
    EndFinally,

    // Iteration
    /// `iterable -> iterator next`
    GetIterator,
    /// Push the next value, or jump when the iterator is done
    ForOfStep,
    /// `iterator next ->`, calling `return` if present
    IteratorClose,
    /// Like `IteratorClose` but ignores errors; skips finished iterators
    CloseIteratorAbrupt,
    /// Push the next value or undefined once done; the iterator sits
    /// below `n` other values
    DestructureStep,
    /// Push an array of the remaining values; operand as `DestructureStep`
    DestructureRest,
    /// `iterator next ->`, closing it unless done
    DestructureClose,
    /// `object -> key iterator`
    ForInPrepare,
    /// Push the next key, or jump when there are none left
    ForInNext,

    // Generators
    /// Suspend a freshly called generator and hand its object to the caller
    GeneratorStart,
    /// Yield the top value wrapped in an iterator result
    Yield,
    /// Yield an inner iterator result as is (`yield*`)
    YieldRaw,
    /// Forward the resumption of a `yield*` to the inner iterator
    DelegateStep,

    // Miscellaneous
    /// Push the cached template object of a call site
    TemplateObject,
    /// Push a new RegExp object
    RegExp,
    /// Load a module through the host loader and push its exports
    ImportModule,
    /// Pick the default export of a loaded module
    ImportDefault,
    /// Throw a TypeError if the top value is null or undefined
    RequireObjectCoercible,
    /// `debugger` statement
    Debugger,
    /// No operation
    Nop,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_emit_and_constants() {
        let mut bytecode = Bytecode::new();
        let index = bytecode.add_constant(Constant::String(JsString::from("x")));
        assert_eq!(index, 0);
        let at = bytecode.emit(Instruction::with_operand(OpCode::GetName, Operand::Name(index)));
        assert_eq!(at, 0);
        assert!(bytecode.name(0).is_some_and(|s| s == "x"));
        assert!(bytecode.name(1).is_none());
    }

    #[test]
    fn test_stack_effects() {
        assert_eq!(Instruction::simple(OpCode::Add).stack_effect(), -1);
        assert_eq!(
            Instruction::with_operand(OpCode::Call, Operand::ArgCount(2)).stack_effect(),
            -3
        );
        assert_eq!(
            Instruction::with_operand(OpCode::New, Operand::ArgCount(2)).stack_effect(),
            -2
        );
        assert_eq!(Instruction::simple(OpCode::GetIterator).stack_effect(), 1);
    }

    #[test]
    fn test_offsets() {
        let source = Arc::new(SourceText::new("a;\nb;", None));
        let function = CompiledFunction {
            name: JsString::empty(),
            kind: CodeKind::Script,
            is_generator: false,
            strict: false,
            param_count: 0,
            bytecode: Bytecode::new(),
            local_count: 0,
            local_names: Vec::new(),
            max_stack: 0,
            handlers: Vec::new(),
            positions: vec![(0, 0), (3, 3)],
            captures: Vec::new(),
            function_scope: None,
            has_direct_eval: false,
            source,
            span: (0, 5),
        };
        assert_eq!(function.line_col(2), Some((1, 1)));
        assert_eq!(function.line_col(4), Some((2, 1)));
        assert_eq!(function.source_text(), "a;\nb;");
    }
}
