//! The main parser implementation: token plumbing, error reporting,
//! declaration bookkeeping for early errors, and function literals.

use rustc_hash::FxHashSet;

use crate::ast::*;
use crate::error::{CompileError, CompileErrorKind};
use crate::lexer::{LexContext, LexError, LineIndex, Scanner, Span, Token, TokenKind};
use crate::options::CompileOptions;
use crate::stack;

/// Result alias for parsing operations.
pub type ParseResult<T> = Result<T, CompileError>;

/// Nesting of expressions, statements and patterns allowed in one source.
const MAX_NESTING_DEPTH: u32 = 1_500;

/// Words reserved only in strict mode code.
const STRICT_RESERVED: &[&str] = &[
    "implements",
    "interface",
    "let",
    "package",
    "private",
    "protected",
    "public",
    "static",
    "yield",
];

/// A recursive descent parser for JavaScript.
pub struct Parser<'a> {
    pub(super) scanner: Scanner<'a>,
    pub(super) current: Token,
    /// Whether `current` is a legacy octal number or string
    pub(super) current_octal: bool,
    pub(super) previous_end: usize,
    pub(super) source_url: Option<String>,
    pub(super) function: FunctionState,
    pub(super) scopes: Vec<DeclScope>,
    /// Cleared while parsing a `for` head so `in` is not taken as an operator
    pub(super) allow_in: bool,
    pub(super) module: bool,
    /// Current syntactic nesting, bounded by `MAX_NESTING_DEPTH`
    depth: u32,
    next_id: NodeId,
    started: bool,
}

/// Per-function parsing context.
#[derive(Debug, Clone, Default)]
pub(super) struct FunctionState {
    pub(super) strict: bool,
    pub(super) in_function: bool,
    pub(super) generator: bool,
    pub(super) new_target: bool,
    pub(super) labels: Vec<Label>,
    /// Labels directly attached to the statement being parsed
    pub(super) pending_labels: usize,
    pub(super) loop_depth: u32,
    pub(super) breakable_depth: u32,
}

#[derive(Debug, Clone)]
pub(super) struct Label {
    pub(super) name: String,
    pub(super) is_loop: bool,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(super) enum DeclScopeKind {
    Function,
    Block,
    Catch,
}

/// Names declared in one scope, for redeclaration errors.
#[derive(Debug)]
pub(super) struct DeclScope {
    kind: DeclScopeKind,
    lexical: FxHashSet<String>,
    vars: FxHashSet<String>,
    functions: FxHashSet<String>,
}

impl DeclScope {
    fn new(kind: DeclScopeKind) -> Self {
        Self {
            kind,
            lexical: FxHashSet::default(),
            vars: FxHashSet::default(),
            functions: FxHashSet::default(),
        }
    }
}

impl<'a> Parser<'a> {
    /// Creates a new parser for the given source code.
    pub fn new(source: &'a str) -> Self {
        Self {
            scanner: Scanner::new(source),
            current: Token::new(TokenKind::Eof, Span::default()),
            current_octal: false,
            previous_end: 0,
            source_url: None,
            function: FunctionState::default(),
            scopes: Vec::new(),
            allow_in: true,
            module: false,
            depth: 0,
            next_id: 0,
            started: false,
        }
    }

    /// Creates a parser honoring `strict_mode` and `source_url`.
    pub fn with_options(source: &'a str, options: &CompileOptions) -> Self {
        let mut parser = Self::new(source);
        parser.function.strict = options.strict_mode;
        parser.source_url = options.source_url.clone();
        parser
    }

    /// Treats the source as strict code from the start.
    pub fn strict(mut self, strict: bool) -> Self {
        self.function.strict = strict;
        self
    }

    /// Allows `import` and `export` declarations at the top level.
    pub fn module(mut self) -> Self {
        self.module = true;
        self
    }

    /// Parses eval code appearing inside a function, where `new.target` is legal.
    pub fn in_function_context(mut self) -> Self {
        self.function.new_target = true;
        self
    }

    /// Parses the source code into a Program AST node.
    pub fn parse_program(&mut self) -> ParseResult<Program> {
        if !self.started {
            self.started = true;
            self.advance()?;
        }
        let id = self.fresh_id();
        self.scopes.push(DeclScope::new(DeclScopeKind::Function));
        let body = self.parse_directives_and_body(|parser| parser.is_at_end())?;
        self.scopes.pop();
        Ok(Program {
            body,
            strict: self.function.strict,
            id,
        })
    }

    /// Parses statements until `at_end`, recognizing a leading `"use strict"`.
    pub(super) fn parse_directives_and_body(
        &mut self,
        at_end: impl Fn(&Self) -> bool,
    ) -> ParseResult<Vec<Statement>> {
        let mut body = Vec::new();
        let mut in_prologue = true;
        while !at_end(self) {
            if self.is_at_end() {
                return Err(self.unexpected());
            }
            let directive_token = match &self.current.kind {
                TokenKind::String(_) if in_prologue => Some(self.current.span),
                _ => None,
            };
            let statement = self.parse_statement_list_item()?;
            match (&statement, directive_token) {
                (Statement::Expression(stmt), Some(span))
                    if stmt.span.start == span.start
                        && matches!(stmt.expression, Expression::Literal(Literal::String(_))) =>
                {
                    let raw = &self.scanner.source()[span.start..span.end];
                    if raw == "\"use strict\"" || raw == "'use strict'" {
                        self.function.strict = true;
                    }
                }
                _ => in_prologue = false,
            }
            body.push(statement);
        }
        Ok(body)
    }

    pub(super) fn fresh_id(&mut self) -> NodeId {
        let id = self.next_id;
        self.next_id += 1;
        id
    }

    // ==================== Token plumbing ====================

    /// Moves to the next token, returning the one just consumed.
    pub(super) fn advance(&mut self) -> ParseResult<Token> {
        let context = if self.current.kind.ends_expression() {
            LexContext::Division
        } else {
            LexContext::RegExp
        };
        let next = self
            .scanner
            .next_token(context)
            .map_err(|e| self.lex_error(e))?;
        self.current_octal = self.scanner.saw_legacy_octal();
        self.previous_end = self.current.span.end;
        Ok(std::mem::replace(&mut self.current, next))
    }

    /// Returns the token after `current` without consuming anything.
    pub(super) fn peek(&self) -> ParseResult<Token> {
        let mut scanner = self.scanner.clone();
        let context = if self.current.kind.ends_expression() {
            LexContext::Division
        } else {
            LexContext::RegExp
        };
        scanner.next_token(context).map_err(|e| self.lex_error(e))
    }

    /// Re-reads a `/` or `/=` in operand position as a regular expression.
    pub(super) fn rescan_regexp(&mut self) -> ParseResult<()> {
        let start = self.current.span.start;
        let newline = self.current.newline_before;
        self.current = self
            .scanner
            .rescan_regexp(start, newline)
            .map_err(|e| self.lex_error(e))?;
        Ok(())
    }

    /// Re-reads the `}` closing a template substitution as the next chunk.
    pub(super) fn rescan_template(&mut self) -> ParseResult<()> {
        if !self.check(&TokenKind::RightBrace) {
            return Err(self.unexpected());
        }
        let start = self.current.span.start;
        self.current = self
            .scanner
            .rescan_template_continuation(start)
            .map_err(|e| self.lex_error(e))?;
        Ok(())
    }

    pub(super) fn check(&self, kind: &TokenKind) -> bool {
        &self.current.kind == kind
    }

    pub(super) fn check_identifier(&self, name: &str) -> bool {
        matches!(&self.current.kind, TokenKind::Identifier(id) if id == name)
    }

    pub(super) fn eat(&mut self, kind: &TokenKind) -> ParseResult<bool> {
        if self.check(kind) {
            self.advance()?;
            Ok(true)
        } else {
            Ok(false)
        }
    }

    pub(super) fn expect(&mut self, kind: &TokenKind) -> ParseResult<Token> {
        if self.check(kind) {
            self.advance()
        } else {
            Err(self.unexpected())
        }
    }

    /// Consumes a `;`, or accepts an automatically inserted one.
    pub(super) fn consume_semicolon(&mut self) -> ParseResult<()> {
        match self.current.kind {
            TokenKind::Semicolon => {
                self.advance()?;
                Ok(())
            }
            TokenKind::RightBrace | TokenKind::Eof => Ok(()),
            _ if self.current.newline_before => Ok(()),
            _ => Err(self.unexpected()),
        }
    }

    pub(super) fn is_at_end(&self) -> bool {
        matches!(self.current.kind, TokenKind::Eof)
    }

    // ==================== Errors ====================

    /// Runs one recursive production one level deeper. Levels added with
    /// [`Parser::deepen`] inside it are released when it returns.
    pub(super) fn nested<T>(&mut self, parse: impl FnOnce(&mut Self) -> ParseResult<T>) -> ParseResult<T> {
        let depth = self.depth;
        self.deepen()?;
        let result = stack::guarded(|| parse(self));
        self.depth = depth;
        result
    }

    /// Accounts for one more level of nesting built without recursion, as in
    /// a long operator or member chain.
    pub(super) fn deepen(&mut self) -> ParseResult<()> {
        if self.depth >= MAX_NESTING_DEPTH {
            return Err(self.error_at(self.current.span, "Maximum nesting depth exceeded"));
        }
        self.depth += 1;
        Ok(())
    }

    pub(super) fn error_at(&self, span: Span, message: impl Into<String>) -> CompileError {
        self.error_kind_at(CompileErrorKind::Syntax, span, message)
    }

    pub(super) fn error_kind_at(
        &self,
        kind: CompileErrorKind,
        span: Span,
        message: impl Into<String>,
    ) -> CompileError {
        let source = self.scanner.source();
        let (line, column) = LineIndex::new(source).line_col(source, span.start);
        CompileError {
            kind,
            message: message.into(),
            line,
            column,
            source_url: self.source_url.clone(),
        }
    }

    pub(super) fn unexpected(&self) -> CompileError {
        let message = match &self.current.kind {
            TokenKind::Eof => "Unexpected end of input".to_string(),
            TokenKind::Template { .. } => "Unexpected template string".to_string(),
            TokenKind::String(_) => "Unexpected string".to_string(),
            TokenKind::Number(_) | TokenKind::BigInt(_) => "Unexpected number".to_string(),
            TokenKind::Identifier(name) if self.function.strict && is_strict_reserved(name) => {
                "Unexpected strict mode reserved word".to_string()
            }
            _ => format!(
                "Unexpected token '{}'",
                self.current.lexeme(self.scanner.source())
            ),
        };
        self.error_at(self.current.span, message)
    }

    fn lex_error(&self, error: LexError) -> CompileError {
        self.error_at(error.span, error.message)
    }

    // ==================== Identifiers ====================

    /// Consumes an identifier in binding position (`var x`, parameters, ...).
    pub(super) fn parse_binding_identifier(&mut self) -> ParseResult<Identifier> {
        let name = match &self.current.kind {
            TokenKind::Identifier(name) => name.clone(),
            TokenKind::Let if !self.function.strict => "let".to_string(),
            _ => return Err(self.unexpected()),
        };
        let span = self.current.span;
        self.check_binding_name(&name, span)?;
        self.advance()?;
        Ok(Identifier { name, span })
    }

    pub(super) fn check_binding_name(&self, name: &str, span: Span) -> ParseResult<()> {
        if self.function.strict {
            if name == "eval" || name == "arguments" {
                return Err(self.error_at(span, "Unexpected eval or arguments in strict mode"));
            }
            if is_strict_reserved(name) {
                return Err(self.error_at(span, "Unexpected strict mode reserved word"));
            }
        }
        if name == "yield" && self.function.generator {
            return Err(self.error_at(span, "Yield expression not allowed in formal parameter"));
        }
        Ok(())
    }

    /// Consumes any IdentifierName, including reserved words (`o.default`).
    pub(super) fn parse_identifier_name(&mut self) -> ParseResult<String> {
        let name = match &self.current.kind {
            TokenKind::Identifier(name) => name.clone(),
            other => match other.word() {
                Some(word) => word.to_string(),
                None => return Err(self.unexpected()),
            },
        };
        self.advance()?;
        Ok(name)
    }

    // ==================== Declarations ====================

    pub(super) fn push_scope(&mut self, kind: DeclScopeKind) {
        self.scopes.push(DeclScope::new(kind));
    }

    pub(super) fn pop_scope(&mut self) {
        self.scopes.pop();
    }

    fn redeclared(&self, name: &str, span: Span) -> CompileError {
        self.error_at(span, format!("Identifier '{}' has already been declared", name))
    }

    /// Records a `let`, `const`, or block-level function binding.
    pub(super) fn declare_lexical(&mut self, id: &Identifier, is_function: bool) -> ParseResult<()> {
        let strict = self.function.strict;
        let Some(scope) = self.scopes.last() else {
            return Ok(());
        };
        if id.name == "let" {
            return Err(self.error_at(id.span, "let is disallowed as a lexically bound name"));
        }
        let duplicate_function =
            is_function && !strict && scope.functions.contains(&id.name) && !scope.vars.contains(&id.name);
        if !duplicate_function
            && (scope.lexical.contains(&id.name) || scope.vars.contains(&id.name))
        {
            return Err(self.redeclared(&id.name, id.span));
        }
        if let Some(scope) = self.scopes.last_mut() {
            scope.lexical.insert(id.name.clone());
            if is_function {
                scope.functions.insert(id.name.clone());
            }
        }
        Ok(())
    }

    /// Records a `var` binding, which is visible up to the enclosing function.
    pub(super) fn declare_var(&mut self, id: &Identifier) -> ParseResult<()> {
        for scope in self.scopes.iter().rev() {
            if scope.kind != DeclScopeKind::Catch && scope.lexical.contains(&id.name) {
                let top_level_function =
                    scope.kind == DeclScopeKind::Function && scope.functions.contains(&id.name);
                if !top_level_function {
                    return Err(self.redeclared(&id.name, id.span));
                }
            }
            if scope.kind == DeclScopeKind::Function {
                break;
            }
        }
        for scope in self.scopes.iter_mut().rev() {
            scope.vars.insert(id.name.clone());
            if scope.kind == DeclScopeKind::Function {
                break;
            }
        }
        Ok(())
    }

    /// Records a catch clause parameter.
    pub(super) fn declare_catch_param(&mut self, id: &Identifier) -> ParseResult<()> {
        if let Some(scope) = self.scopes.last_mut()
            && !scope.lexical.insert(id.name.clone())
        {
            return Err(self.redeclared(&id.name, id.span));
        }
        Ok(())
    }

    /// Whether a lexical declaration in the innermost block clashes with a
    /// catch parameter (`catch (e) { let e; }`).
    pub(super) fn check_catch_body_conflicts(
        &self,
        params: &[&Identifier],
        body: &BlockStatement,
    ) -> ParseResult<()> {
        for statement in &body.body {
            if let Statement::VariableDeclaration(decl) = statement
                && decl.kind != VariableKind::Var
            {
                let mut names = Vec::new();
                for declarator in &decl.declarations {
                    declarator.id.bound_names(&mut names);
                }
                if let Some(clash) = names.iter().find(|n| params.iter().any(|p| p.name == n.name)) {
                    return Err(self.redeclared(&clash.name, clash.span));
                }
            }
        }
        Ok(())
    }

    /// Declares a function declaration's name in the current scope.
    pub(super) fn declare_function_name(&mut self, id: &Identifier) -> ParseResult<()> {
        let top_level = self
            .scopes
            .last()
            .is_some_and(|scope| scope.kind == DeclScopeKind::Function);
        if top_level {
            let Some(scope) = self.scopes.last() else {
                return Ok(());
            };
            if scope.lexical.contains(&id.name) && !scope.functions.contains(&id.name) {
                return Err(self.redeclared(&id.name, id.span));
            }
            if let Some(scope) = self.scopes.last_mut() {
                scope.vars.insert(id.name.clone());
                scope.functions.insert(id.name.clone());
            }
            Ok(())
        } else {
            self.declare_lexical(id, true)
        }
    }

    pub(super) fn declare_pattern(&mut self, kind: VariableKind, pattern: &Pattern) -> ParseResult<()> {
        let mut names = Vec::new();
        pattern.bound_names(&mut names);
        for id in names {
            match kind {
                VariableKind::Var => self.declare_var(id)?,
                VariableKind::Let | VariableKind::Const => self.declare_lexical(id, false)?,
            }
        }
        Ok(())
    }

    // ==================== Functions ====================

    /// Parses `function name(params) { body }` or `function* ...`.
    /// `current` is the `function` keyword.
    pub(super) fn parse_function(&mut self, declaration: bool) -> ParseResult<FunctionLiteral> {
        let start = self.expect(&TokenKind::Function)?.span.start;
        let is_generator = self.eat(&TokenKind::Star)?;
        let name = if declaration || !self.check(&TokenKind::LeftParen) {
            // A generator expression's own name may not be `yield`.
            let saved = self.function.generator;
            if !declaration {
                self.function.generator = is_generator;
            }
            let id = self.parse_binding_identifier();
            self.function.generator = saved;
            Some(id?)
        } else {
            None
        };
        if declaration && let Some(id) = &name {
            self.declare_function_name(id)?;
        }
        self.parse_function_rest(name, FunctionKind::Normal, is_generator, start)
    }

    /// Parses the parameter list and body of a non-arrow function.
    pub(super) fn parse_function_rest(
        &mut self,
        name: Option<Identifier>,
        kind: FunctionKind,
        is_generator: bool,
        start: usize,
    ) -> ParseResult<FunctionLiteral> {
        let outer = self.enter_function(is_generator, true);
        let result = self.parse_function_parts(name, kind, is_generator, start);
        self.leave_function(outer);
        result
    }

    fn parse_function_parts(
        &mut self,
        name: Option<Identifier>,
        kind: FunctionKind,
        is_generator: bool,
        start: usize,
    ) -> ParseResult<FunctionLiteral> {
        let id = self.fresh_id();
        let (params, rest) = self.parse_formal_parameters()?;
        self.expect(&TokenKind::LeftBrace)?;
        let body = self.parse_directives_and_body(|p| p.check(&TokenKind::RightBrace))?;
        let end = self.expect(&TokenKind::RightBrace)?.span.end;
        let function = FunctionLiteral {
            name,
            simple_params: rest.is_none() && params.iter().all(|p| matches!(p, Pattern::Identifier(_))),
            params,
            rest,
            body,
            kind,
            is_generator,
            strict: self.function.strict,
            expression_body: false,
            span: Span::new(start, end),
            id,
        };
        self.validate_function(&function)?;
        Ok(function)
    }

    /// Parses an arrow function whose parameters start at `current`
    /// (either an identifier or a parenthesized list).
    pub(super) fn parse_arrow_function(&mut self) -> ParseResult<Expression> {
        let start = self.current.span.start;
        // Arrows inherit `new.target` from their surroundings.
        let new_target = self.function.new_target;
        let outer = self.enter_function(false, new_target);
        let result = self.parse_arrow_parts(start);
        self.leave_function(outer);
        Ok(Expression::Function(Box::new(result?)))
    }

    fn parse_arrow_parts(&mut self, start: usize) -> ParseResult<FunctionLiteral> {
        let id = self.fresh_id();
        let (params, rest) = if self.check(&TokenKind::LeftParen) {
            self.parse_formal_parameters()?
        } else {
            let param = self.parse_binding_identifier()?;
            self.declare_var(&param)?;
            (vec![Pattern::Identifier(param)], None)
        };
        if !self.check(&TokenKind::Arrow) || self.current.newline_before {
            return Err(self.unexpected());
        }
        self.advance()?;
        let (body, expression_body) = if self.check(&TokenKind::LeftBrace) {
            self.advance()?;
            let body = self.parse_directives_and_body(|p| p.check(&TokenKind::RightBrace))?;
            (body, false)
        } else {
            let expression = self.parse_assignment()?;
            let span = Span::new(start, self.previous_end);
            let body = vec![Statement::Return(ReturnStatement {
                argument: Some(expression),
                span,
            })];
            (body, true)
        };
        let end = if expression_body {
            self.previous_end
        } else {
            self.expect(&TokenKind::RightBrace)?.span.end
        };
        let function = FunctionLiteral {
            name: None,
            simple_params: rest.is_none() && params.iter().all(|p| matches!(p, Pattern::Identifier(_))),
            params,
            rest,
            body,
            kind: FunctionKind::Arrow,
            is_generator: false,
            strict: self.function.strict,
            expression_body,
            span: Span::new(start, end),
            id,
        };
        self.validate_function(&function)?;
        Ok(function)
    }

    /// Parses `(a, [b, c] = d, ...rest)`, declaring each bound name.
    pub(super) fn parse_formal_parameters(&mut self) -> ParseResult<(Vec<Pattern>, Option<Pattern>)> {
        self.expect(&TokenKind::LeftParen)?;
        let mut params = Vec::new();
        let mut rest = None;
        while !self.check(&TokenKind::RightParen) {
            if self.eat(&TokenKind::Ellipsis)? {
                rest = Some(self.parse_binding_target()?);
                if !self.check(&TokenKind::RightParen) {
                    return Err(self.error_at(
                        self.current.span,
                        "Rest parameter must be last formal parameter",
                    ));
                }
                break;
            }
            params.push(self.parse_binding_element()?);
            if !self.check(&TokenKind::RightParen) {
                self.expect(&TokenKind::Comma)?;
            }
        }
        self.expect(&TokenKind::RightParen)?;
        let mut names = Vec::new();
        for param in params.iter().chain(rest.iter()) {
            param.bound_names(&mut names);
        }
        for name in names {
            if let Some(scope) = self.scopes.last_mut() {
                scope.vars.insert(name.name.clone());
            }
        }
        Ok((params, rest))
    }

    /// Early errors that can only be checked once the body's strictness is known.
    fn validate_function(&self, function: &FunctionLiteral) -> ParseResult<()> {
        let strict = function.strict;
        if strict && !function.simple_params && self.has_use_strict_directive(function) {
            return Err(self.error_at(
                function.span,
                "Illegal 'use strict' directive in function with non-simple parameter list",
            ));
        }
        if strict && let Some(name) = &function.name {
            if name.name == "eval" || name.name == "arguments" {
                return Err(self.error_at(name.span, "Unexpected eval or arguments in strict mode"));
            }
            if is_strict_reserved(&name.name) {
                return Err(self.error_at(name.span, "Unexpected strict mode reserved word"));
            }
        }
        let mut names = Vec::new();
        for param in function.params.iter().chain(function.rest.iter()) {
            param.bound_names(&mut names);
        }
        let duplicates_allowed =
            !strict && function.simple_params && function.kind == FunctionKind::Normal;
        let mut seen = FxHashSet::default();
        for id in names {
            if strict && (id.name == "eval" || id.name == "arguments") {
                return Err(self.error_at(id.span, "Unexpected eval or arguments in strict mode"));
            }
            if strict && is_strict_reserved(&id.name) {
                return Err(self.error_at(id.span, "Unexpected strict mode reserved word"));
            }
            if !seen.insert(id.name.as_str()) && !duplicates_allowed {
                return Err(self.error_at(id.span, "Duplicate parameter name not allowed in this context"));
            }
        }
        match function.kind {
            FunctionKind::Getter if !function.params.is_empty() || function.rest.is_some() => Err(
                self.error_at(function.span, "Getter must not have any formal parameters."),
            ),
            FunctionKind::Setter if function.params.len() != 1 || function.rest.is_some() => Err(
                self.error_at(function.span, "Setter must have exactly one formal parameter."),
            ),
            _ => Ok(()),
        }
    }

    fn has_use_strict_directive(&self, function: &FunctionLiteral) -> bool {
        let source = self.scanner.source();
        function
            .body
            .iter()
            .map_while(|statement| match statement {
                Statement::Expression(ExpressionStatement {
                    expression: Expression::Literal(Literal::String(_)),
                    span,
                }) => Some(*span),
                _ => None,
            })
            .any(|span| {
                let text = source.get(span.start..span.end).unwrap_or("");
                text.starts_with("\"use strict\"") || text.starts_with("'use strict'")
            })
    }

    /// Saves the current function state and starts a fresh one.
    fn enter_function(&mut self, generator: bool, new_target: bool) -> (FunctionState, bool) {
        let state = FunctionState {
            strict: self.function.strict,
            in_function: true,
            generator,
            new_target,
            ..FunctionState::default()
        };
        self.scopes.push(DeclScope::new(DeclScopeKind::Function));
        let outer = std::mem::replace(&mut self.function, state);
        let allow_in = std::mem::replace(&mut self.allow_in, true);
        (outer, allow_in)
    }

    fn leave_function(&mut self, (outer, allow_in): (FunctionState, bool)) {
        self.scopes.pop();
        self.function = outer;
        self.allow_in = allow_in;
    }

    /// Looks ahead from a `(` to decide whether it opens arrow function
    /// parameters, i.e. whether the matching `)` is followed by `=>`.
    pub(super) fn is_arrow_ahead(&self) -> bool {
        let mut scanner = self.scanner.clone();
        let mut stack: Vec<TokenKind> = vec![TokenKind::RightParen];
        let mut previous = self.current.kind.clone();
        loop {
            let context = if previous.ends_expression() {
                LexContext::Division
            } else {
                LexContext::RegExp
            };
            let Ok(token) = scanner.next_token(context) else {
                return false;
            };
            match &token.kind {
                TokenKind::Eof => return false,
                TokenKind::LeftParen => stack.push(TokenKind::RightParen),
                TokenKind::LeftBracket => stack.push(TokenKind::RightBracket),
                TokenKind::LeftBrace => stack.push(TokenKind::RightBrace),
                TokenKind::Template { tail: false, .. } => stack.push(TokenKind::Template {
                    cooked: None,
                    raw: String::new(),
                    tail: false,
                }),
                TokenKind::RightParen | TokenKind::RightBracket => {
                    if stack.pop().as_ref() != Some(&token.kind) {
                        return false;
                    }
                    if stack.is_empty() {
                        return matches!(
                            scanner.next_token(LexContext::Division),
                            Ok(Token { kind: TokenKind::Arrow, newline_before: false, .. })
                        );
                    }
                }
                TokenKind::RightBrace => match stack.pop() {
                    Some(TokenKind::RightBrace) => {}
                    Some(TokenKind::Template { .. }) => {
                        match scanner.rescan_template_continuation(token.span.start) {
                            Ok(Token { kind: TokenKind::Template { tail: false, .. }, .. }) => {
                                stack.push(TokenKind::Template {
                                    cooked: None,
                                    raw: String::new(),
                                    tail: false,
                                });
                            }
                            Ok(_) => {}
                            Err(_) => return false,
                        }
                        previous = TokenKind::Template {
                            cooked: None,
                            raw: String::new(),
                            tail: true,
                        };
                        continue;
                    }
                    _ => return false,
                },
                _ => {}
            }
            previous = token.kind;
        }
    }
}

/// Whether `name` is reserved in strict mode code only.
pub(super) fn is_strict_reserved(name: &str) -> bool {
    STRICT_RESERVED.contains(&name)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn parse_ok(src: &str) -> Program {
        let mut parser = Parser::new(src);
        parser.parse_program().unwrap()
    }

    fn parse_err(src: &str) -> CompileError {
        let mut parser = Parser::new(src);
        parser.parse_program().unwrap_err()
    }

    fn first_function(program: &Program) -> &FunctionLiteral {
        match &program.body[0] {
            Statement::FunctionDeclaration(f) => f,
            Statement::Expression(ExpressionStatement {
                expression: Expression::Function(f),
                ..
            }) => f,
            other => panic!("expected function, got {:?}", other),
        }
    }

    #[test]
    fn test_parse_function_declaration() {
        let program = parse_ok("function add(a, b) { return a + b; }");
        let function = first_function(&program);
        assert_eq!(function.name.as_ref().unwrap().name, "add");
        assert_eq!(function.params.len(), 2);
        assert!(function.simple_params);
        assert!(!function.is_generator);
    }

    #[test]
    fn test_parse_generator_declaration() {
        let program = parse_ok("function* g() { yield 1; }");
        assert!(first_function(&program).is_generator);
    }

    #[test]
    fn test_use_strict_directive() {
        let program = parse_ok("'use strict'; var x = 1;");
        assert!(program.strict);
        let program = parse_ok("'use\\x20strict'; var x = 1;");
        assert!(!program.strict);
        let program = parse_ok("var x; 'use strict';");
        assert!(!program.strict);
    }

    #[test]
    fn test_function_directive_is_local() {
        let program = parse_ok("function f() { 'use strict'; } with (o) {}");
        assert!(!program.strict);
        assert!(first_function(&program).strict);
    }

    #[test]
    fn test_duplicate_params() {
        parse_ok("function f(a, a) {}");
        let err = parse_err("function f(a, a) { 'use strict'; }");
        assert!(err.message.contains("Duplicate parameter"));
        parse_err("function f(a, [a]) {}");
        parse_err("(a, a) => 1");
    }

    #[test]
    fn test_strict_eval_arguments_binding() {
        parse_ok("var eval = 1;");
        let err = parse_err("'use strict'; var arguments;");
        assert!(err.message.contains("eval or arguments"));
        parse_err("function eval() { 'use strict'; }");
    }

    #[test]
    fn test_use_strict_with_non_simple_params() {
        parse_err("function f(a = 1) { 'use strict'; }");
        parse_ok("'use strict'; function f(a = 1) {}");
    }

    #[test]
    fn test_accessor_arity() {
        parse_ok("({ get a() { return 1; }, set a(v) {} })");
        parse_err("({ get a(x) {} })");
        parse_err("({ set a() {} })");
    }

    #[test]
    fn test_error_position() {
        let err = parse_err("var a = 1;\nvar = 2;");
        assert_eq!(err.line, 2);
        assert_eq!(err.column, 5);
        assert_eq!(err.kind, CompileErrorKind::Syntax);
    }

    #[test]
    fn test_source_url_in_error() {
        let options = CompileOptions {
            strict_mode: false,
            source_url: Some("lib.js".into()),
        };
        let err = Parser::with_options("}", &options).parse_program().unwrap_err();
        assert_eq!(err.source_url.as_deref(), Some("lib.js"));
    }

    #[test]
    fn test_strict_option() {
        let options = CompileOptions {
            strict_mode: true,
            source_url: None,
        };
        let err = Parser::with_options("with (a) {}", &options).parse_program().unwrap_err();
        assert!(err.message.contains("Strict mode"));
    }

    #[test]
    fn test_node_ids_are_unique() {
        let program = parse_ok("{ } function f() { { } }");
        let mut ids = vec![program.id];
        if let Statement::Block(block) = &program.body[0] {
            ids.push(block.id);
        }
        if let Statement::FunctionDeclaration(f) = &program.body[1] {
            ids.push(f.id);
            if let Statement::Block(block) = &f.body[0] {
                ids.push(block.id);
            }
        }
        ids.sort_unstable();
        ids.dedup();
        assert_eq!(ids.len(), 4);
    }

    #[test]
    fn test_arrow_lookahead() {
        let program = parse_ok("x = (a, b) => a + b; y = (a, b); z = (a = `${(1)}`) => a;");
        assert_eq!(program.body.len(), 3);
    }

    #[test]
    fn test_deep_nesting_is_a_syntax_error() {
        let n = 10_000;
        let sources = [
            format!("{}1{}", "(".repeat(n), ")".repeat(n)),
            "[".repeat(n),
            "{".repeat(n),
            format!("x = {}0", "!".repeat(n)),
            format!("a{}", ".b".repeat(n)),
            format!("f{}", "()".repeat(n)),
            format!("1{}", " + 1".repeat(n)),
            format!("2{}", " ** 2".repeat(n)),
            format!("var {}a{} = 0;", "[".repeat(n), "]".repeat(n)),
            "function f() {".repeat(n),
        ];
        for source in &sources {
            let error = parse_err(source);
            assert_eq!(error.kind, CompileErrorKind::Syntax);
            assert_eq!(error.message, "Maximum nesting depth exceeded", "{:.24}", source);
        }
    }

    #[test]
    fn test_moderate_nesting_parses() {
        let n = 200;
        parse_ok(&format!("x = {}1{};", "(".repeat(n), ")".repeat(n)));
        parse_ok(&format!("x = {}1{};", "[".repeat(n), "]".repeat(n)));
        parse_ok(&format!("{}{}", "{".repeat(n), "}".repeat(n)));
        parse_ok(&format!("a{};", ".b".repeat(1_000)));
        parse_ok(&format!("x = 1{};", " + 1".repeat(1_000)));
    }
}
