//! Abstract Syntax Tree (AST) definitions for JavaScript.
//!
//! These structures are designed to be ESTree-compatible where possible.
//! Nodes that introduce a scope carry a [`NodeId`] assigned by the parser,
//! which the compiler's scope analysis uses as a key.

use crate::lexer::Span;
use crate::runtime::string::JsString;

/// Identifies a scope-introducing node within one parsed source.
pub type NodeId = u32;

/// A complete JavaScript program.
#[derive(Debug, Clone, PartialEq)]
pub struct Program {
    /// The statements in the program
    pub body: Vec<Statement>,
    /// Whether the program starts with a `"use strict"` directive
    pub strict: bool,
    /// Scope id of the top level
    pub id: NodeId,
}

/// An identifier.
#[derive(Debug, Clone, PartialEq)]
pub struct Identifier {
    /// The name of the identifier
    pub name: String,
    /// Where it appears
    pub span: Span,
}

/// A JavaScript statement.
#[derive(Debug, Clone, PartialEq)]
pub enum Statement {
    /// Variable declaration (var, let, const)
    VariableDeclaration(VariableDeclaration),
    /// Function or generator declaration
    FunctionDeclaration(Box<FunctionLiteral>),
    /// Expression statement
    Expression(ExpressionStatement),
    /// Block statement { ... }
    Block(BlockStatement),
    /// If statement
    If(IfStatement),
    /// Switch statement
    Switch(SwitchStatement),
    /// While statement
    While(WhileStatement),
    /// Do-while statement
    DoWhile(DoWhileStatement),
    /// For statement
    For(ForStatement),
    /// For-in statement
    ForIn(ForInStatement),
    /// For-of statement
    ForOf(ForOfStatement),
    /// Return statement
    Return(ReturnStatement),
    /// Break statement, with optional label
    Break(JumpStatement),
    /// Continue statement, with optional label
    Continue(JumpStatement),
    /// Throw statement
    Throw(ThrowStatement),
    /// Try statement
    Try(TryStatement),
    /// With statement (sloppy mode only)
    With(WithStatement),
    /// Labeled statement
    Labeled(LabeledStatement),
    /// Import declaration (module code)
    Import(ImportDeclaration),
    /// Export declaration (module code)
    Export(ExportDeclaration),
    /// Debugger statement
    Debugger,
    /// Empty statement (;)
    Empty,
}

/// Variable declaration kind.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum VariableKind {
    /// var declaration
    Var,
    /// let declaration
    Let,
    /// const declaration
    Const,
}

/// A variable declaration statement.
#[derive(Debug, Clone, PartialEq)]
pub struct VariableDeclaration {
    /// The kind of declaration
    pub kind: VariableKind,
    /// The declarators
    pub declarations: Vec<VariableDeclarator>,
    /// Source span
    pub span: Span,
}

/// A single variable declarator.
#[derive(Debug, Clone, PartialEq)]
pub struct VariableDeclarator {
    /// The binding pattern being declared
    pub id: Pattern,
    /// Optional initializer expression
    pub init: Option<Expression>,
}

/// The grammatical flavour of a function literal.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FunctionKind {
    /// `function f() {}` declarations and expressions
    Normal,
    /// `(a) => a`
    Arrow,
    /// `{ m() {} }`
    Method,
    /// `{ get x() {} }`
    Getter,
    /// `{ set x(v) {} }`
    Setter,
}

/// A function literal of any kind: declaration, expression, arrow or method.
#[derive(Debug, Clone, PartialEq)]
pub struct FunctionLiteral {
    /// The function name, if it has one in source
    pub name: Option<Identifier>,
    /// Formal parameters, each possibly a pattern with a default
    pub params: Vec<Pattern>,
    /// Trailing `...rest` parameter
    pub rest: Option<Pattern>,
    /// The function body
    pub body: Vec<Statement>,
    /// Grammatical kind
    pub kind: FunctionKind,
    /// Whether this is a generator (`function*`, `*m() {}`)
    pub is_generator: bool,
    /// Whether the function body is strict code
    pub strict: bool,
    /// Whether the parameter list is a plain list of identifiers
    pub simple_params: bool,
    /// Whether this is a concise arrow body (`=> expr`)
    pub expression_body: bool,
    /// Source span of the whole literal
    pub span: Span,
    /// Scope id of the function
    pub id: NodeId,
}

impl FunctionLiteral {
    /// Number of parameters before the first default or rest, the `length` of the function.
    pub fn expected_arguments(&self) -> u32 {
        self.params
            .iter()
            .take_while(|p| !matches!(p, Pattern::Assignment(_)))
            .count() as u32
    }
}

/// An expression statement.
#[derive(Debug, Clone, PartialEq)]
pub struct ExpressionStatement {
    /// The expression
    pub expression: Expression,
    /// Source span
    pub span: Span,
}

/// A block statement.
#[derive(Debug, Clone, PartialEq)]
pub struct BlockStatement {
    /// The statements in the block
    pub body: Vec<Statement>,
    /// Scope id of the block
    pub id: NodeId,
}

/// An if statement.
#[derive(Debug, Clone, PartialEq)]
pub struct IfStatement {
    /// The test condition
    pub test: Expression,
    /// The consequent (then branch)
    pub consequent: Box<Statement>,
    /// The alternate (else branch)
    pub alternate: Option<Box<Statement>>,
}

/// A switch statement.
#[derive(Debug, Clone, PartialEq)]
pub struct SwitchStatement {
    /// The discriminant expression
    pub discriminant: Expression,
    /// The cases
    pub cases: Vec<SwitchCase>,
    /// Scope id of the case block
    pub id: NodeId,
}

/// A switch case.
#[derive(Debug, Clone, PartialEq)]
pub struct SwitchCase {
    /// The test expression (None for default)
    pub test: Option<Expression>,
    /// The consequent statements
    pub consequent: Vec<Statement>,
}

/// A while statement.
#[derive(Debug, Clone, PartialEq)]
pub struct WhileStatement {
    /// The test condition
    pub test: Expression,
    /// The loop body
    pub body: Box<Statement>,
}

/// A do-while statement.
#[derive(Debug, Clone, PartialEq)]
pub struct DoWhileStatement {
    /// The loop body
    pub body: Box<Statement>,
    /// The test condition
    pub test: Expression,
}

/// The initializer clause of a `for` statement.
#[derive(Debug, Clone, PartialEq)]
pub enum ForInit {
    /// `for (var i = 0; ...)`
    Declaration(VariableDeclaration),
    /// `for (i = 0; ...)`
    Expression(Expression),
}

/// A for statement.
#[derive(Debug, Clone, PartialEq)]
pub struct ForStatement {
    /// Initialization
    pub init: Option<ForInit>,
    /// Test condition
    pub test: Option<Expression>,
    /// Update expression
    pub update: Option<Expression>,
    /// Loop body
    pub body: Box<Statement>,
    /// Scope id of the loop head
    pub id: NodeId,
}

/// The left-hand side of `for-in` / `for-of`.
#[derive(Debug, Clone, PartialEq)]
pub enum ForHead {
    /// `for (let [a, b] of ...)`
    Declaration {
        /// Declaration kind
        kind: VariableKind,
        /// The bound pattern
        pattern: Pattern,
    },
    /// `for (obj.key in ...)`
    Pattern(Pattern),
}

/// A for-in statement.
#[derive(Debug, Clone, PartialEq)]
pub struct ForInStatement {
    /// Left side
    pub left: ForHead,
    /// Object being enumerated
    pub right: Expression,
    /// Loop body
    pub body: Box<Statement>,
    /// Scope id of the per-iteration bindings
    pub id: NodeId,
}

/// A for-of statement.
#[derive(Debug, Clone, PartialEq)]
pub struct ForOfStatement {
    /// Left side
    pub left: ForHead,
    /// Iterable being consumed
    pub right: Expression,
    /// Loop body
    pub body: Box<Statement>,
    /// Scope id of the per-iteration bindings
    pub id: NodeId,
}

/// A return statement.
#[derive(Debug, Clone, PartialEq)]
pub struct ReturnStatement {
    /// The return value
    pub argument: Option<Expression>,
    /// Source span
    pub span: Span,
}

/// `break` or `continue`.
#[derive(Debug, Clone, PartialEq)]
pub struct JumpStatement {
    /// Optional target label
    pub label: Option<String>,
    /// Source span
    pub span: Span,
}

/// A throw statement.
#[derive(Debug, Clone, PartialEq)]
pub struct ThrowStatement {
    /// The thrown value
    pub argument: Expression,
    /// Source span
    pub span: Span,
}

/// A try statement.
#[derive(Debug, Clone, PartialEq)]
pub struct TryStatement {
    /// The try block
    pub block: BlockStatement,
    /// The catch clause
    pub handler: Option<CatchClause>,
    /// The finally block
    pub finalizer: Option<BlockStatement>,
}

/// A catch clause.
#[derive(Debug, Clone, PartialEq)]
pub struct CatchClause {
    /// The exception binding; `catch { }` has none
    pub param: Option<Pattern>,
    /// The catch body
    pub body: BlockStatement,
    /// Scope id of the parameter scope
    pub id: NodeId,
}

/// A with statement.
#[derive(Debug, Clone, PartialEq)]
pub struct WithStatement {
    /// The object expression
    pub object: Expression,
    /// The body
    pub body: Box<Statement>,
    /// Scope id of the object environment
    pub id: NodeId,
}

/// A labeled statement.
#[derive(Debug, Clone, PartialEq)]
pub struct LabeledStatement {
    /// The label
    pub label: String,
    /// The body
    pub body: Box<Statement>,
}

/// `import ... from "specifier"`.
#[derive(Debug, Clone, PartialEq)]
pub struct ImportDeclaration {
    /// Bindings introduced by the import
    pub specifiers: Vec<ImportSpecifier>,
    /// The module specifier
    pub source: String,
    /// Source span
    pub span: Span,
}

/// One binding of an import declaration.
#[derive(Debug, Clone, PartialEq)]
pub enum ImportSpecifier {
    /// `import x from "m"`
    Default(Identifier),
    /// `import * as ns from "m"`
    Namespace(Identifier),
    /// `import { a as b } from "m"`
    Named {
        /// Exported name in the source module
        imported: String,
        /// Local binding
        local: Identifier,
    },
}

/// An export declaration.
#[derive(Debug, Clone, PartialEq)]
pub enum ExportDeclaration {
    /// `export var/let/const/function ...`
    Declaration(Box<Statement>),
    /// `export { a, b as c }` or `export { a } from "m"`
    Named {
        /// `(local, exported)` pairs
        specifiers: Vec<(String, String)>,
        /// Re-export source
        source: Option<String>,
        /// Source span
        span: Span,
    },
    /// `export * from "m"`
    All {
        /// Re-export source
        source: String,
        /// Source span
        span: Span,
    },
    /// `export default expr`
    Default(Expression),
}

/// A JavaScript expression.
#[derive(Debug, Clone, PartialEq)]
pub enum Expression {
    /// Identifier reference
    Identifier(Identifier),
    /// Literal value
    Literal(Literal),
    /// Template literal
    Template(TemplateLiteral),
    /// Tagged template: tag`...`
    TaggedTemplate(TaggedTemplateExpression),
    /// Array literal
    Array(ArrayExpression),
    /// Object literal
    Object(ObjectExpression),
    /// Function expression, arrow function or method
    Function(Box<FunctionLiteral>),
    /// Unary operation
    Unary(UnaryExpression),
    /// Update operation (++/--)
    Update(UpdateExpression),
    /// Binary operation
    Binary(BinaryExpression),
    /// Short-circuit operation (&&, ||, ??)
    Logical(LogicalExpression),
    /// Assignment, including compound and destructuring assignment
    Assignment(AssignmentExpression),
    /// Conditional (ternary) expression
    Conditional(ConditionalExpression),
    /// Function call
    Call(CallExpression),
    /// New expression
    New(NewExpression),
    /// Member access
    Member(MemberExpression),
    /// An optional chain `a?.b.c`; short-circuits to the end of this node
    OptionalChain(Box<Expression>),
    /// Sequence expression (comma operator)
    Sequence(Vec<Expression>),
    /// `yield` / `yield*`
    Yield(YieldExpression),
    /// this keyword
    This,
    /// `new.target`
    NewTarget,
    /// Parenthesized expression, kept to validate assignment targets
    Parenthesized(Box<Expression>),
}

impl Expression {
    /// Strips any parentheses around the expression.
    pub fn unparenthesized(&self) -> &Expression {
        match self {
            Expression::Parenthesized(inner) => inner.unparenthesized(),
            other => other,
        }
    }

    /// True for anonymous function literals, whose name is inferred from
    /// the binding or property they are assigned to.
    pub fn is_anonymous_function(&self) -> bool {
        matches!(self, Expression::Function(f) if f.name.is_none())
    }
}

/// Literal values.
#[derive(Debug, Clone, PartialEq)]
pub enum Literal {
    /// Numeric literal
    Number(f64),
    /// BigInt literal (base-10 digits)
    BigInt(String),
    /// String literal
    String(JsString),
    /// Boolean literal
    Boolean(bool),
    /// Null literal
    Null,
    /// Regular expression literal
    RegExp {
        /// The pattern
        pattern: String,
        /// The flags
        flags: String,
    },
}

/// A template literal.
#[derive(Debug, Clone, PartialEq)]
pub struct TemplateLiteral {
    /// The string chunks, one more than `expressions`
    pub quasis: Vec<TemplateElement>,
    /// The embedded expressions
    pub expressions: Vec<Expression>,
}

/// One string chunk of a template.
#[derive(Debug, Clone, PartialEq)]
pub struct TemplateElement {
    /// The cooked value; `None` for an invalid escape in a tagged template
    pub cooked: Option<JsString>,
    /// The raw source text
    pub raw: String,
}

/// A tagged template.
#[derive(Debug, Clone, PartialEq)]
pub struct TaggedTemplateExpression {
    /// The tag function
    pub tag: Box<Expression>,
    /// The template
    pub quasi: TemplateLiteral,
    /// Source span
    pub span: Span,
}

/// An element of an array literal.
#[derive(Debug, Clone, PartialEq)]
pub enum ArrayElement {
    /// `[, x]`
    Hole,
    /// `[x]`
    Expression(Expression),
    /// `[...xs]`
    Spread(Expression),
}

/// An array literal.
#[derive(Debug, Clone, PartialEq)]
pub struct ArrayExpression {
    /// The elements
    pub elements: Vec<ArrayElement>,
}

/// A property name in an object literal or pattern.
#[derive(Debug, Clone, PartialEq)]
pub enum PropertyName {
    /// Identifier, string or numeric key, already in canonical string form
    Named(String),
    /// `[expr]`
    Computed(Box<Expression>),
}

/// A member of an object literal.
#[derive(Debug, Clone, PartialEq)]
pub enum ObjectProperty {
    /// `key: value`, shorthand `key`, or a method
    KeyValue {
        /// The key
        key: PropertyName,
        /// The value
        value: Expression,
        /// Whether written as shorthand `{ a }`
        shorthand: bool,
    },
    /// `get key() {}`
    Getter {
        /// The key
        key: PropertyName,
        /// The accessor function
        function: Box<FunctionLiteral>,
    },
    /// `set key(v) {}`
    Setter {
        /// The key
        key: PropertyName,
        /// The accessor function
        function: Box<FunctionLiteral>,
    },
    /// `...source`
    Spread(Expression),
    /// `__proto__: value`
    Proto(Expression),
    /// `{ a = 1 }`, only valid once reinterpreted as a pattern
    CoverInitialized {
        /// The shorthand name
        name: Identifier,
        /// The default value
        default: Expression,
    },
}

/// An object literal.
#[derive(Debug, Clone, PartialEq)]
pub struct ObjectExpression {
    /// The properties
    pub properties: Vec<ObjectProperty>,
    /// Source span
    pub span: Span,
}

/// Unary operators.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum UnaryOperator {
    /// -
    Minus,
    /// +
    Plus,
    /// !
    Not,
    /// ~
    BitwiseNot,
    /// typeof
    Typeof,
    /// void
    Void,
    /// delete
    Delete,
}

/// A unary expression.
#[derive(Debug, Clone, PartialEq)]
pub struct UnaryExpression {
    /// The operator
    pub operator: UnaryOperator,
    /// The operand
    pub argument: Box<Expression>,
    /// Source span
    pub span: Span,
}

/// Update operators.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum UpdateOperator {
    /// ++
    Increment,
    /// --
    Decrement,
}

/// An update expression.
#[derive(Debug, Clone, PartialEq)]
pub struct UpdateExpression {
    /// The operator
    pub operator: UpdateOperator,
    /// Whether the operator is prefix
    pub prefix: bool,
    /// The target, an identifier or member expression
    pub argument: Box<Expression>,
    /// Source span
    pub span: Span,
}

/// Binary operators.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BinaryOperator {
    /// +
    Add,
    /// -
    Subtract,
    /// *
    Multiply,
    /// /
    Divide,
    /// %
    Modulo,
    /// **
    Exponent,
    /// ==
    Equal,
    /// !=
    NotEqual,
    /// ===
    StrictEqual,
    /// !==
    StrictNotEqual,
    /// <
    LessThan,
    /// <=
    LessThanEqual,
    /// >
    GreaterThan,
    /// >=
    GreaterThanEqual,
    /// <<
    LeftShift,
    /// >>
    RightShift,
    /// >>>
    UnsignedRightShift,
    /// &
    BitwiseAnd,
    /// |
    BitwiseOr,
    /// ^
    BitwiseXor,
    /// in
    In,
    /// instanceof
    Instanceof,
}

/// A binary expression.
#[derive(Debug, Clone, PartialEq)]
pub struct BinaryExpression {
    /// The operator
    pub operator: BinaryOperator,
    /// Left operand
    pub left: Box<Expression>,
    /// Right operand
    pub right: Box<Expression>,
}

/// Short-circuit operators.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LogicalOperator {
    /// &&
    And,
    /// ||
    Or,
    /// ??
    Nullish,
}

/// A logical expression.
#[derive(Debug, Clone, PartialEq)]
pub struct LogicalExpression {
    /// The operator
    pub operator: LogicalOperator,
    /// Left operand
    pub left: Box<Expression>,
    /// Right operand
    pub right: Box<Expression>,
}

/// Assignment operators.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AssignmentOperator {
    /// =
    Assign,
    /// Compound arithmetic or bitwise assignment, e.g. `+=`
    Compound(BinaryOperator),
    /// Logical assignment, e.g. `??=`
    Logical(LogicalOperator),
}

/// An assignment expression.
#[derive(Debug, Clone, PartialEq)]
pub struct AssignmentExpression {
    /// The operator
    pub operator: AssignmentOperator,
    /// The target; only `=` accepts object and array patterns
    pub target: Box<Pattern>,
    /// The value
    pub value: Box<Expression>,
    /// Source span
    pub span: Span,
}

/// A conditional expression.
#[derive(Debug, Clone, PartialEq)]
pub struct ConditionalExpression {
    /// The test
    pub test: Box<Expression>,
    /// The consequent
    pub consequent: Box<Expression>,
    /// The alternate
    pub alternate: Box<Expression>,
}

/// A call or `new` argument.
#[derive(Debug, Clone, PartialEq)]
pub enum Argument {
    /// A plain argument
    Expression(Expression),
    /// `...xs`
    Spread(Expression),
}

/// A call expression.
#[derive(Debug, Clone, PartialEq)]
pub struct CallExpression {
    /// The callee
    pub callee: Box<Expression>,
    /// The arguments
    pub arguments: Vec<Argument>,
    /// `f?.()`
    pub optional: bool,
    /// Source span
    pub span: Span,
}

/// A new expression.
#[derive(Debug, Clone, PartialEq)]
pub struct NewExpression {
    /// The constructor
    pub callee: Box<Expression>,
    /// The arguments
    pub arguments: Vec<Argument>,
    /// Source span
    pub span: Span,
}

/// The property part of a member access.
#[derive(Debug, Clone, PartialEq)]
pub enum MemberProperty {
    /// `a.b`
    Named(String),
    /// `a[b]`
    Computed(Box<Expression>),
}

/// A member expression.
#[derive(Debug, Clone, PartialEq)]
pub struct MemberExpression {
    /// The object
    pub object: Box<Expression>,
    /// The property
    pub property: MemberProperty,
    /// `a?.b`
    pub optional: bool,
    /// Source span
    pub span: Span,
}

/// A yield expression.
#[derive(Debug, Clone, PartialEq)]
pub struct YieldExpression {
    /// The yielded value
    pub argument: Option<Box<Expression>>,
    /// `yield*`
    pub delegate: bool,
}

/// A binding or assignment target.
///
/// Declarations, parameters and destructuring assignments share this type;
/// only assignment targets may contain [`Pattern::Member`].
#[derive(Debug, Clone, PartialEq)]
pub enum Pattern {
    /// A plain binding
    Identifier(Identifier),
    /// `obj.prop` or `obj[key]` as an assignment target
    Member(Box<Expression>),
    /// `{ a, b: c, ...rest }`
    Object(ObjectPattern),
    /// `[a, , b, ...rest]`
    Array(ArrayPattern),
    /// `target = default`
    Assignment(Box<AssignmentPattern>),
}

impl Pattern {
    /// Collects every identifier bound by this pattern, in source order.
    pub fn bound_names<'a>(&'a self, names: &mut Vec<&'a Identifier>) {
        match self {
            Pattern::Identifier(id) => names.push(id),
            Pattern::Member(_) => {}
            Pattern::Object(object) => {
                for property in &object.properties {
                    property.value.bound_names(names);
                }
                if let Some(rest) = &object.rest {
                    rest.bound_names(names);
                }
            }
            Pattern::Array(array) => {
                for element in array.elements.iter().flatten() {
                    element.bound_names(names);
                }
                if let Some(rest) = &array.rest {
                    rest.bound_names(names);
                }
            }
            Pattern::Assignment(assignment) => assignment.target.bound_names(names),
        }
    }
}

/// An object destructuring pattern.
#[derive(Debug, Clone, PartialEq)]
pub struct ObjectPattern {
    /// The properties
    pub properties: Vec<PatternProperty>,
    /// `...rest`
    pub rest: Option<Box<Pattern>>,
}

/// One property of an object pattern.
#[derive(Debug, Clone, PartialEq)]
pub struct PatternProperty {
    /// The source key
    pub key: PropertyName,
    /// The target
    pub value: Pattern,
}

/// An array destructuring pattern.
#[derive(Debug, Clone, PartialEq)]
pub struct ArrayPattern {
    /// The elements; `None` is a hole
    pub elements: Vec<Option<Pattern>>,
    /// `...rest`
    pub rest: Option<Box<Pattern>>,
}

/// `target = default`.
#[derive(Debug, Clone, PartialEq)]
pub struct AssignmentPattern {
    /// The target
    pub target: Pattern,
    /// The default value
    pub default: Expression,
}

#[cfg(test)]
mod tests {
    use super::*;

    fn ident(name: &str) -> Identifier {
        Identifier {
            name: name.to_string(),
            span: Span::default(),
        }
    }

    #[test]
    fn test_bound_names_in_source_order() {
        let pattern = Pattern::Object(ObjectPattern {
            properties: vec![
                PatternProperty {
                    key: PropertyName::Named("a".into()),
                    value: Pattern::Identifier(ident("x")),
                },
                PatternProperty {
                    key: PropertyName::Named("b".into()),
                    value: Pattern::Array(ArrayPattern {
                        elements: vec![
                            None,
                            Some(Pattern::Assignment(Box::new(AssignmentPattern {
                                target: Pattern::Identifier(ident("y")),
                                default: Expression::Literal(Literal::Number(1.0)),
                            }))),
                        ],
                        rest: Some(Box::new(Pattern::Identifier(ident("z")))),
                    }),
                },
            ],
            rest: None,
        });
        let mut names = Vec::new();
        pattern.bound_names(&mut names);
        let names: Vec<&str> = names.iter().map(|id| id.name.as_str()).collect();
        assert_eq!(names, vec!["x", "y", "z"]);
    }

    #[test]
    fn test_unparenthesized() {
        let expr = Expression::Parenthesized(Box::new(Expression::Parenthesized(Box::new(
            Expression::This,
        ))));
        assert_eq!(expr.unparenthesized(), &Expression::This);
    }
}
