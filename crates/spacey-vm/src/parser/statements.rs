//! Statement parsing.
//!
//! | Statement | Method |
//! |-----------|--------|
//! | Variable | `parse_variable_statement` |
//! | Function | `parse_function` (in `parser.rs`) |
//! | If | `parse_if_statement` |
//! | Switch | `parse_switch_statement` |
//! | While / Do-While | `parse_while_statement`, `parse_do_while_statement` |
//! | For / For-In / For-Of | `parse_for_statement` |
//! | Return / Break / Continue / Throw | `parse_return_statement`, `parse_jump_statement`, `parse_throw_statement` |
//! | Try | `parse_try_statement` |
//! | With | `parse_with_statement` |
//! | Labeled | `parse_labeled_statement` |
//! | Import / Export | `parse_import_declaration`, `parse_export_declaration` |
//!
//! Declarations (`let`, `const`, functions) are only legal as statement list
//! items; the bodies of `if`, loops and labels go through `parse_statement`,
//! which rejects them.

use crate::ast::*;
use crate::lexer::{Span, TokenKind};

use super::parser::{DeclScopeKind, Label, ParseResult, Parser};

impl Parser<'_> {
    /// Parses a statement or declaration.
    pub(super) fn parse_statement_list_item(&mut self) -> ParseResult<Statement> {
        self.nested(Self::parse_declaration_or_statement)
    }

    fn parse_declaration_or_statement(&mut self) -> ParseResult<Statement> {
        match &self.current.kind {
            TokenKind::Function => {
                let function = self.parse_function(true)?;
                Ok(Statement::FunctionDeclaration(Box::new(function)))
            }
            TokenKind::Const => self.parse_variable_statement(),
            TokenKind::Let if self.let_starts_declaration()? => self.parse_variable_statement(),
            TokenKind::Class => Err(self.error_at(self.current.span, "Classes are not supported")),
            TokenKind::Import if self.module && self.scopes.len() == 1 => {
                self.parse_import_declaration()
            }
            TokenKind::Export if self.module && self.scopes.len() == 1 => {
                self.parse_export_declaration()
            }
            _ if self.check_identifier("async") => {
                let next = self.peek()?;
                if next.kind == TokenKind::Function && !next.newline_before {
                    Err(self.error_at(self.current.span, "Async functions are not supported"))
                } else {
                    self.parse_statement()
                }
            }
            _ => self.parse_statement(),
        }
    }

    /// `let` starts a declaration only when followed by a binding.
    fn let_starts_declaration(&self) -> ParseResult<bool> {
        if self.function.strict {
            return Ok(true);
        }
        let next = self.peek()?;
        Ok(matches!(
            next.kind,
            TokenKind::Identifier(_) | TokenKind::LeftBracket | TokenKind::LeftBrace | TokenKind::Let
        ))
    }

    /// Parses a single statement.
    pub fn parse_statement(&mut self) -> ParseResult<Statement> {
        self.nested(Self::parse_single_statement)
    }

    fn parse_single_statement(&mut self) -> ParseResult<Statement> {
        let pending = std::mem::take(&mut self.function.pending_labels);
        if matches!(
            self.current.kind,
            TokenKind::For | TokenKind::While | TokenKind::Do
        ) {
            let count = self.function.labels.len();
            for label in &mut self.function.labels[count - pending..] {
                label.is_loop = true;
            }
        }
        match &self.current.kind {
            TokenKind::Var => self.parse_variable_statement(),
            TokenKind::If => self.parse_if_statement(),
            TokenKind::Switch => self.parse_switch_statement(),
            TokenKind::While => self.parse_while_statement(),
            TokenKind::Do => self.parse_do_while_statement(),
            TokenKind::For => self.parse_for_statement(),
            TokenKind::Return => self.parse_return_statement(),
            TokenKind::Break | TokenKind::Continue => self.parse_jump_statement(),
            TokenKind::Throw => self.parse_throw_statement(),
            TokenKind::Try => self.parse_try_statement(),
            TokenKind::With => self.parse_with_statement(),
            TokenKind::Debugger => {
                self.advance()?;
                self.consume_semicolon()?;
                Ok(Statement::Debugger)
            }
            TokenKind::LeftBrace => Ok(Statement::Block(self.parse_block(DeclScopeKind::Block)?)),
            TokenKind::Semicolon => {
                self.advance()?;
                Ok(Statement::Empty)
            }
            TokenKind::Function => {
                if self.function.strict {
                    return Err(self.error_at(
                        self.current.span,
                        "In strict mode code, functions can only be declared at top level or inside a block.",
                    ));
                }
                // Sloppy `if (x) function f() {}` behaves like a braced block.
                let id = self.fresh_id();
                self.push_scope(DeclScopeKind::Block);
                let function = self.parse_function(true);
                self.pop_scope();
                Ok(Statement::Block(BlockStatement {
                    body: vec![Statement::FunctionDeclaration(Box::new(function?))],
                    id,
                }))
            }
            TokenKind::Const | TokenKind::Class => Err(self.error_at(
                self.current.span,
                "Lexical declaration cannot appear in a single-statement context",
            )),
            TokenKind::Let if self.function.strict || self.peek()?.kind == TokenKind::LeftBracket => {
                Err(self.error_at(
                    self.current.span,
                    "Lexical declaration cannot appear in a single-statement context",
                ))
            }
            TokenKind::Identifier(_) if self.peek()?.kind == TokenKind::Colon => {
                self.function.pending_labels = pending;
                self.parse_labeled_statement()
            }
            _ => self.parse_expression_statement(),
        }
    }

    /// Parses `{ ... }` in its own declaration scope.
    pub(super) fn parse_block(&mut self, kind: DeclScopeKind) -> ParseResult<BlockStatement> {
        self.expect(&TokenKind::LeftBrace)?;
        let id = self.fresh_id();
        self.push_scope(kind);
        let body = self.parse_block_body();
        self.pop_scope();
        let body = body?;
        self.expect(&TokenKind::RightBrace)?;
        Ok(BlockStatement { body, id })
    }

    fn parse_block_body(&mut self) -> ParseResult<Vec<Statement>> {
        let mut body = Vec::new();
        while !self.check(&TokenKind::RightBrace) {
            if self.is_at_end() {
                return Err(self.unexpected());
            }
            body.push(self.parse_statement_list_item()?);
        }
        Ok(body)
    }

    fn parse_variable_statement(&mut self) -> ParseResult<Statement> {
        let declaration = self.parse_variable_declaration()?;
        self.consume_semicolon()?;
        Ok(Statement::VariableDeclaration(declaration))
    }

    /// Parses `var|let|const` declarators without the trailing semicolon.
    /// Initializers are checked by the caller when in a `for` head.
    pub(super) fn parse_variable_declaration(&mut self) -> ParseResult<VariableDeclaration> {
        let start = self.current.span.start;
        let kind = match self.advance()?.kind {
            TokenKind::Var => VariableKind::Var,
            TokenKind::Let => VariableKind::Let,
            TokenKind::Const => VariableKind::Const,
            _ => return Err(self.error_at(Span::new(start, start), "Expected variable keyword")),
        };
        let mut declarations = Vec::new();
        loop {
            let id = self.parse_binding_target()?;
            self.declare_pattern(kind, &id)?;
            let init = if self.eat(&TokenKind::Equal)? {
                Some(self.parse_assignment()?)
            } else {
                None
            };
            let in_for_head = !self.allow_in
                && (self.check(&TokenKind::In) || self.check_identifier("of"));
            if init.is_none() && !in_for_head {
                if kind == VariableKind::Const {
                    return Err(self.error_at(self.current.span, "Missing initializer in const declaration"));
                }
                if !matches!(id, Pattern::Identifier(_)) {
                    return Err(self.error_at(
                        self.current.span,
                        "Missing initializer in destructuring declaration",
                    ));
                }
            }
            declarations.push(VariableDeclarator { id, init });
            if !self.eat(&TokenKind::Comma)? {
                break;
            }
        }
        Ok(VariableDeclaration {
            kind,
            declarations,
            span: Span::new(start, self.previous_end),
        })
    }

    fn parse_if_statement(&mut self) -> ParseResult<Statement> {
        self.advance()?;
        self.expect(&TokenKind::LeftParen)?;
        let test = self.parse_expression()?;
        self.expect(&TokenKind::RightParen)?;
        let consequent = Box::new(self.parse_statement()?);
        let alternate = if self.eat(&TokenKind::Else)? {
            Some(Box::new(self.parse_statement()?))
        } else {
            None
        };
        Ok(Statement::If(IfStatement {
            test,
            consequent,
            alternate,
        }))
    }

    fn parse_switch_statement(&mut self) -> ParseResult<Statement> {
        self.advance()?;
        self.expect(&TokenKind::LeftParen)?;
        let discriminant = self.parse_expression()?;
        self.expect(&TokenKind::RightParen)?;
        self.expect(&TokenKind::LeftBrace)?;
        let id = self.fresh_id();
        self.push_scope(DeclScopeKind::Block);
        self.function.breakable_depth += 1;
        let cases = self.parse_switch_cases();
        self.function.breakable_depth -= 1;
        self.pop_scope();
        let cases = cases?;
        self.expect(&TokenKind::RightBrace)?;
        Ok(Statement::Switch(SwitchStatement {
            discriminant,
            cases,
            id,
        }))
    }

    fn parse_switch_cases(&mut self) -> ParseResult<Vec<SwitchCase>> {
        let mut cases = Vec::new();
        let mut seen_default = false;
        while !self.check(&TokenKind::RightBrace) {
            let test = match self.current.kind {
                TokenKind::Case => {
                    self.advance()?;
                    Some(self.parse_expression()?)
                }
                TokenKind::Default => {
                    if seen_default {
                        return Err(self.error_at(
                            self.current.span,
                            "More than one default clause in switch statement",
                        ));
                    }
                    seen_default = true;
                    self.advance()?;
                    None
                }
                _ => return Err(self.unexpected()),
            };
            self.expect(&TokenKind::Colon)?;
            let mut consequent = Vec::new();
            while !matches!(
                self.current.kind,
                TokenKind::Case | TokenKind::Default | TokenKind::RightBrace | TokenKind::Eof
            ) {
                consequent.push(self.parse_statement_list_item()?);
            }
            cases.push(SwitchCase { test, consequent });
        }
        Ok(cases)
    }

    /// Parses a loop body with `break`/`continue` enabled.
    fn parse_loop_body(&mut self) -> ParseResult<Box<Statement>> {
        self.function.loop_depth += 1;
        self.function.breakable_depth += 1;
        let body = self.parse_statement();
        self.function.loop_depth -= 1;
        self.function.breakable_depth -= 1;
        Ok(Box::new(body?))
    }

    fn parse_while_statement(&mut self) -> ParseResult<Statement> {
        self.advance()?;
        self.expect(&TokenKind::LeftParen)?;
        let test = self.parse_expression()?;
        self.expect(&TokenKind::RightParen)?;
        let body = self.parse_loop_body()?;
        Ok(Statement::While(WhileStatement { test, body }))
    }

    fn parse_do_while_statement(&mut self) -> ParseResult<Statement> {
        self.advance()?;
        let body = self.parse_loop_body()?;
        self.expect(&TokenKind::While)?;
        self.expect(&TokenKind::LeftParen)?;
        let test = self.parse_expression()?;
        self.expect(&TokenKind::RightParen)?;
        // The semicolon after `do ... while (x)` is always optional.
        self.eat(&TokenKind::Semicolon)?;
        Ok(Statement::DoWhile(DoWhileStatement { body, test }))
    }

    fn parse_for_statement(&mut self) -> ParseResult<Statement> {
        self.advance()?;
        self.expect(&TokenKind::LeftParen)?;
        let id = self.fresh_id();
        self.push_scope(DeclScopeKind::Block);
        let result = self.parse_for_rest(id);
        self.pop_scope();
        result
    }

    fn parse_for_rest(&mut self, id: NodeId) -> ParseResult<Statement> {
        let is_declaration = match self.current.kind {
            TokenKind::Var | TokenKind::Const => true,
            TokenKind::Let => self.let_starts_declaration()?,
            _ => false,
        };
        let init = if self.check(&TokenKind::Semicolon) {
            None
        } else if is_declaration {
            let allow_in = std::mem::replace(&mut self.allow_in, false);
            let declaration = self.parse_variable_declaration();
            self.allow_in = allow_in;
            let declaration = declaration?;
            if self.check(&TokenKind::In) || self.check_identifier("of") {
                return self.parse_for_in_of_declaration(declaration, id);
            }
            Some(ForInit::Declaration(declaration))
        } else {
            let start = self.current.span;
            let allow_in = std::mem::replace(&mut self.allow_in, false);
            let expression = self.parse_expression();
            self.allow_in = allow_in;
            let expression = expression?;
            let is_of = self.check_identifier("of");
            if self.check(&TokenKind::In) || is_of {
                if is_of && matches!(&expression, Expression::Identifier(i) if i.name == "async") {
                    return Err(self.error_at(start, "The left-hand side of a for-of loop may not be 'async'."));
                }
                let target = self.expression_to_pattern(expression, start)?;
                return self.parse_for_in_of_tail(ForHead::Pattern(target), id);
            }
            Some(ForInit::Expression(expression))
        };
        self.expect(&TokenKind::Semicolon)?;
        let test = if self.check(&TokenKind::Semicolon) {
            None
        } else {
            Some(self.parse_expression()?)
        };
        self.expect(&TokenKind::Semicolon)?;
        let update = if self.check(&TokenKind::RightParen) {
            None
        } else {
            Some(self.parse_expression()?)
        };
        self.expect(&TokenKind::RightParen)?;
        let body = self.parse_loop_body()?;
        Ok(Statement::For(ForStatement {
            init,
            test,
            update,
            body,
            id,
        }))
    }

    fn parse_for_in_of_declaration(
        &mut self,
        mut declaration: VariableDeclaration,
        id: NodeId,
    ) -> ParseResult<Statement> {
        let span = self.current.span;
        if declaration.declarations.len() != 1 {
            return Err(self.error_at(
                span,
                "Invalid left-hand side in for-in loop: Must have a single binding.",
            ));
        }
        let declarator = declaration.declarations.remove(0);
        if declarator.init.is_some() {
            return Err(self.error_at(span, "for-in/of loop variable declaration may not have an initializer."));
        }
        let head = ForHead::Declaration {
            kind: declaration.kind,
            pattern: declarator.id,
        };
        self.parse_for_in_of_tail(head, id)
    }

    /// Parses from the `in`/`of` keyword to the end of the loop.
    fn parse_for_in_of_tail(&mut self, left: ForHead, id: NodeId) -> ParseResult<Statement> {
        let is_of = self.check_identifier("of");
        self.advance()?;
        let right = if is_of {
            self.parse_assignment()?
        } else {
            self.parse_expression()?
        };
        self.expect(&TokenKind::RightParen)?;
        let body = self.parse_loop_body()?;
        Ok(if is_of {
            Statement::ForOf(ForOfStatement {
                left,
                right,
                body,
                id,
            })
        } else {
            Statement::ForIn(ForInStatement {
                left,
                right,
                body,
                id,
            })
        })
    }

    fn parse_return_statement(&mut self) -> ParseResult<Statement> {
        let start = self.current.span;
        if !self.function.in_function {
            return Err(self.error_at(start, "Illegal return statement"));
        }
        self.advance()?;
        let argument = if self.ends_statement() {
            None
        } else {
            Some(self.parse_expression()?)
        };
        self.consume_semicolon()?;
        Ok(Statement::Return(ReturnStatement {
            argument,
            span: Span::new(start.start, self.previous_end),
        }))
    }

    /// True where an optional trailing operand (`return`, `break L`) is absent.
    fn ends_statement(&self) -> bool {
        matches!(
            self.current.kind,
            TokenKind::Semicolon | TokenKind::RightBrace | TokenKind::Eof
        ) || self.current.newline_before
    }

    /// Parses `break` or `continue` with an optional label.
    fn parse_jump_statement(&mut self) -> ParseResult<Statement> {
        let keyword = self.advance()?;
        let is_break = keyword.kind == TokenKind::Break;
        let label = match &self.current.kind {
            TokenKind::Identifier(name) if !self.current.newline_before => {
                let name = name.clone();
                let span = self.current.span;
                let Some(target) = self.function.labels.iter().rev().find(|l| l.name == name) else {
                    return Err(self.error_at(span, format!("Undefined label '{}'", name)));
                };
                if !is_break && !target.is_loop {
                    return Err(self.error_at(span, format!("Illegal continue statement: '{}' does not denote an iteration statement", name)));
                }
                self.advance()?;
                Some(name)
            }
            _ => {
                if is_break && self.function.breakable_depth == 0 {
                    return Err(self.error_at(keyword.span, "Illegal break statement"));
                }
                if !is_break && self.function.loop_depth == 0 {
                    return Err(self.error_at(
                        keyword.span,
                        "Illegal continue statement: no surrounding iteration statement",
                    ));
                }
                None
            }
        };
        self.consume_semicolon()?;
        let jump = JumpStatement {
            label,
            span: Span::new(keyword.span.start, self.previous_end),
        };
        Ok(if is_break {
            Statement::Break(jump)
        } else {
            Statement::Continue(jump)
        })
    }

    fn parse_throw_statement(&mut self) -> ParseResult<Statement> {
        let start = self.advance()?.span.start;
        if self.current.newline_before {
            return Err(self.error_at(self.current.span, "Illegal newline after throw"));
        }
        let argument = self.parse_expression()?;
        self.consume_semicolon()?;
        Ok(Statement::Throw(ThrowStatement {
            argument,
            span: Span::new(start, self.previous_end),
        }))
    }

    fn parse_try_statement(&mut self) -> ParseResult<Statement> {
        self.advance()?;
        let block = self.parse_block(DeclScopeKind::Block)?;
        let handler = if self.eat(&TokenKind::Catch)? {
            Some(self.parse_catch_clause()?)
        } else {
            None
        };
        let finalizer = if self.eat(&TokenKind::Finally)? {
            Some(self.parse_block(DeclScopeKind::Block)?)
        } else {
            None
        };
        if handler.is_none() && finalizer.is_none() {
            return Err(self.error_at(self.current.span, "Missing catch or finally after try"));
        }
        Ok(Statement::Try(TryStatement {
            block,
            handler,
            finalizer,
        }))
    }

    fn parse_catch_clause(&mut self) -> ParseResult<CatchClause> {
        let id = self.fresh_id();
        self.push_scope(DeclScopeKind::Catch);
        let result = self.parse_catch_rest(id);
        self.pop_scope();
        result
    }

    fn parse_catch_rest(&mut self, id: NodeId) -> ParseResult<CatchClause> {
        let param = if self.eat(&TokenKind::LeftParen)? {
            let param = self.parse_binding_target()?;
            let mut names = Vec::new();
            param.bound_names(&mut names);
            for name in &names {
                self.declare_catch_param(name)?;
            }
            self.expect(&TokenKind::RightParen)?;
            Some(param)
        } else {
            None
        };
        let body = self.parse_block(DeclScopeKind::Block)?;
        if let Some(param) = &param {
            let mut names = Vec::new();
            param.bound_names(&mut names);
            self.check_catch_body_conflicts(&names, &body)?;
        }
        Ok(CatchClause { param, body, id })
    }

    fn parse_with_statement(&mut self) -> ParseResult<Statement> {
        let span = self.current.span;
        if self.function.strict {
            return Err(self.error_at(span, "Strict mode code may not include a with statement"));
        }
        self.advance()?;
        self.expect(&TokenKind::LeftParen)?;
        let object = self.parse_expression()?;
        self.expect(&TokenKind::RightParen)?;
        let id = self.fresh_id();
        let body = Box::new(self.parse_statement()?);
        Ok(Statement::With(WithStatement { object, body, id }))
    }

    fn parse_labeled_statement(&mut self) -> ParseResult<Statement> {
        let token = self.advance()?;
        let TokenKind::Identifier(label) = token.kind else {
            return Err(self.error_at(token.span, "Expected label"));
        };
        self.check_binding_name(&label, token.span)?;
        if self.function.labels.iter().any(|l| l.name == label) {
            return Err(self.error_at(token.span, format!("Label '{}' has already been declared", label)));
        }
        self.expect(&TokenKind::Colon)?;
        self.function.labels.push(Label {
            name: label.clone(),
            is_loop: false,
        });
        self.function.pending_labels += 1;
        let body = if self.check(&TokenKind::Function) && !self.function.strict {
            self.function.pending_labels = 0;
            self.parse_function(true)
                .map(|function| Statement::FunctionDeclaration(Box::new(function)))
        } else {
            self.parse_statement()
        };
        self.function.labels.pop();
        Ok(Statement::Labeled(LabeledStatement {
            label,
            body: Box::new(body?),
        }))
    }

    fn parse_expression_statement(&mut self) -> ParseResult<Statement> {
        let start = self.current.span.start;
        let expression = self.parse_expression()?;
        self.consume_semicolon()?;
        Ok(Statement::Expression(ExpressionStatement {
            expression,
            span: Span::new(start, self.previous_end),
        }))
    }

    // ==================== Modules ====================

    fn parse_module_specifier(&mut self) -> ParseResult<String> {
        match self.advance()?.kind {
            TokenKind::String(source) => Ok(source.to_std_string_lossy()),
            _ => Err(self.error_at(Span::new(self.previous_end, self.previous_end), "Expected module specifier")),
        }
    }

    fn parse_import_declaration(&mut self) -> ParseResult<Statement> {
        let start = self.advance()?.span.start;
        let mut specifiers = Vec::new();
        if !matches!(self.current.kind, TokenKind::String(_)) {
            if matches!(self.current.kind, TokenKind::Identifier(_)) {
                specifiers.push(ImportSpecifier::Default(self.parse_binding_identifier()?));
                if !self.eat(&TokenKind::Comma)? {
                    return self.finish_import(specifiers, start);
                }
            }
            if self.eat(&TokenKind::Star)? {
                if !self.check_identifier("as") {
                    return Err(self.unexpected());
                }
                self.advance()?;
                specifiers.push(ImportSpecifier::Namespace(self.parse_binding_identifier()?));
            } else {
                self.expect(&TokenKind::LeftBrace)?;
                while !self.check(&TokenKind::RightBrace) {
                    let imported_span = self.current.span;
                    let imported = self.parse_identifier_name()?;
                    let local = if self.check_identifier("as") {
                        self.advance()?;
                        self.parse_binding_identifier()?
                    } else {
                        self.check_binding_name(&imported, imported_span)?;
                        if TokenKind::keyword(&imported).is_some() {
                            return Err(self.error_at(imported_span, "Unexpected reserved word"));
                        }
                        Identifier {
                            name: imported.clone(),
                            span: imported_span,
                        }
                    };
                    specifiers.push(ImportSpecifier::Named { imported, local });
                    if !self.check(&TokenKind::RightBrace) {
                        self.expect(&TokenKind::Comma)?;
                    }
                }
                self.advance()?;
            }
        }
        self.finish_import(specifiers, start)
    }

    fn finish_import(&mut self, specifiers: Vec<ImportSpecifier>, start: usize) -> ParseResult<Statement> {
        if !specifiers.is_empty() {
            if !self.check_identifier("from") {
                return Err(self.unexpected());
            }
            self.advance()?;
        }
        let source = self.parse_module_specifier()?;
        self.consume_semicolon()?;
        for specifier in &specifiers {
            let local = match specifier {
                ImportSpecifier::Default(local) | ImportSpecifier::Namespace(local) => local,
                ImportSpecifier::Named { local, .. } => local,
            };
            self.declare_lexical(local, false)?;
        }
        Ok(Statement::Import(ImportDeclaration {
            specifiers,
            source,
            span: Span::new(start, self.previous_end),
        }))
    }

    fn parse_export_declaration(&mut self) -> ParseResult<Statement> {
        let start = self.advance()?.span.start;
        let export = match self.current.kind {
            TokenKind::Default => {
                self.advance()?;
                let expression = self.parse_assignment()?;
                self.consume_semicolon()?;
                ExportDeclaration::Default(expression)
            }
            TokenKind::Star => {
                self.advance()?;
                if !self.check_identifier("from") {
                    return Err(self.unexpected());
                }
                self.advance()?;
                let source = self.parse_module_specifier()?;
                self.consume_semicolon()?;
                ExportDeclaration::All {
                    source,
                    span: Span::new(start, self.previous_end),
                }
            }
            TokenKind::LeftBrace => {
                self.advance()?;
                let mut specifiers = Vec::new();
                while !self.check(&TokenKind::RightBrace) {
                    let local = self.parse_identifier_name()?;
                    let exported = if self.check_identifier("as") {
                        self.advance()?;
                        self.parse_identifier_name()?
                    } else {
                        local.clone()
                    };
                    specifiers.push((local, exported));
                    if !self.check(&TokenKind::RightBrace) {
                        self.expect(&TokenKind::Comma)?;
                    }
                }
                self.advance()?;
                let source = if self.check_identifier("from") {
                    self.advance()?;
                    Some(self.parse_module_specifier()?)
                } else {
                    None
                };
                self.consume_semicolon()?;
                ExportDeclaration::Named {
                    specifiers,
                    source,
                    span: Span::new(start, self.previous_end),
                }
            }
            TokenKind::Var | TokenKind::Let | TokenKind::Const => {
                ExportDeclaration::Declaration(Box::new(self.parse_variable_statement()?))
            }
            TokenKind::Function => {
                let function = self.parse_function(true)?;
                ExportDeclaration::Declaration(Box::new(Statement::FunctionDeclaration(Box::new(
                    function,
                ))))
            }
            _ => return Err(self.unexpected()),
        };
        Ok(Statement::Export(export))
    }
}

#[cfg(test)]
mod tests {
    use crate::ast::*;
    use crate::error::CompileError;
    use crate::parser::Parser;

    fn parse_stmt(src: &str) -> Statement {
        let mut parser = Parser::new(src);
        let program = parser.parse_program().unwrap();
        program.body.into_iter().next().unwrap()
    }

    fn parse_ok(src: &str) -> Program {
        Parser::new(src).parse_program().unwrap()
    }

    fn parse_err(src: &str) -> CompileError {
        Parser::new(src).parse_program().unwrap_err()
    }

    #[test]
    fn test_parse_var_let_const() {
        for (src, kind) in [
            ("var x = 1;", VariableKind::Var),
            ("let x = 1;", VariableKind::Let),
            ("const x = 1;", VariableKind::Const),
        ] {
            match parse_stmt(src) {
                Statement::VariableDeclaration(decl) => assert_eq!(decl.kind, kind),
                other => panic!("unexpected {:?}", other),
            }
        }
    }

    #[test]
    fn test_parse_multiple_declarations() {
        match parse_stmt("var a = 1, b, c = 3;") {
            Statement::VariableDeclaration(decl) => assert_eq!(decl.declarations.len(), 3),
            other => panic!("unexpected {:?}", other),
        }
    }

    #[test]
    fn test_automatic_semicolon_insertion() {
        let program = parse_ok("var a = 1\nvar b = 2\na\n++b");
        assert_eq!(program.body.len(), 4);
        match &program.body[3] {
            Statement::Expression(stmt) => {
                assert!(matches!(stmt.expression, Expression::Update(UpdateExpression { prefix: true, .. })))
            }
            other => panic!("unexpected {:?}", other),
        }
    }

    #[test]
    fn test_return_restricted_production() {
        let program = parse_ok("function f() { return\n42; }");
        let Statement::FunctionDeclaration(f) = &program.body[0] else {
            panic!("expected function");
        };
        assert!(matches!(&f.body[0], Statement::Return(ReturnStatement { argument: None, .. })));
        assert_eq!(f.body.len(), 2);
    }

    #[test]
    fn test_missing_semicolon_is_error() {
        parse_err("var a = 1 var b = 2");
        parse_err("a b");
    }

    #[test]
    fn test_parse_for_variants() {
        assert!(matches!(parse_stmt("for (var i = 0; i < 10; i++) {}"), Statement::For(_)));
        assert!(matches!(parse_stmt("for (;;) break;"), Statement::For(_)));
        assert!(matches!(parse_stmt("for (var k in o) {}"), Statement::ForIn(_)));
        assert!(matches!(parse_stmt("for (const [a, b] of pairs) {}"), Statement::ForOf(_)));
        assert!(matches!(parse_stmt("for (o.k in o) {}"), Statement::ForIn(_)));
        assert!(matches!(parse_stmt("for (var i = 0, n = ('a' in o) ? 1 : 2; i < n; i++) {}"), Statement::For(_)));
    }

    #[test]
    fn test_for_in_of_errors() {
        parse_err("for (let a, b of c) {}");
        parse_err("for (let a = 1 of c) {}");
        parse_err("for (1 of c) {}");
    }

    #[test]
    fn test_parse_switch_statement() {
        match parse_stmt("switch (x) { case 1: a(); break; default: b(); case 2: }") {
            Statement::Switch(switch) => {
                assert_eq!(switch.cases.len(), 3);
                assert!(switch.cases[1].test.is_none());
            }
            other => panic!("unexpected {:?}", other),
        }
        parse_err("switch (x) { default: default: }");
    }

    #[test]
    fn test_parse_try_forms() {
        assert!(matches!(parse_stmt("try {} catch (e) {}"), Statement::Try(_)));
        assert!(matches!(parse_stmt("try {} finally {}"), Statement::Try(_)));
        match parse_stmt("try {} catch {}") {
            Statement::Try(t) => assert!(t.handler.unwrap().param.is_none()),
            other => panic!("unexpected {:?}", other),
        }
        parse_err("try {}");
    }

    #[test]
    fn test_break_continue_validation() {
        parse_ok("while (1) { break; }");
        parse_ok("outer: for (;;) { for (;;) { continue outer; } }");
        parse_ok("block: { break block; }");
        parse_err("block: { break; }");
        parse_ok("a: b: while (1) continue a;");
        let err = parse_err("break;");
        assert!(err.message.contains("Illegal break"));
        parse_err("switch (1) { case 1: continue; }");
        parse_err("block: { continue block; }");
        parse_err("while (1) { break nowhere; }");
        parse_err("function f() { while (1) { (function () { break; }); } }");
        parse_err("a: a: ;");
    }

    #[test]
    fn test_duplicate_lexical_declarations() {
        let err = parse_err("let a; let a;");
        assert!(err.message.contains("already been declared"));
        parse_err("let a; var a;");
        parse_err("var a; let a;");
        parse_err("const a = 1; function a() {}");
        parse_err("{ var a; } let a;");
        parse_err("try {} catch (e) { let e; }");
        parse_err("function f(a) { let a; }");
        parse_err("for (let i;;) { var i; }");
        parse_ok("var a; var a;");
        parse_ok("let a; { let a; }");
        parse_ok("function f() {} var f;");
        parse_ok("try {} catch (e) { var e; }");
        parse_ok("for (let i;;) { let i; }");
        parse_ok("{ function g() {} function g() {} }");
    }

    #[test]
    fn test_const_requires_initializer() {
        parse_err("const a;");
        parse_err("var [a];");
        parse_ok("for (const a of b) {}");
    }

    #[test]
    fn test_return_outside_function() {
        parse_err("return 1;");
    }

    #[test]
    fn test_strict_mode_restrictions() {
        parse_ok("with (o) { x; }");
        parse_err("'use strict'; with (o) {}");
        parse_err("'use strict'; if (a) function f() {}");
        parse_ok("if (a) function f() {}");
    }

    #[test]
    fn test_lexical_in_single_statement_context() {
        parse_err("if (a) let b = 1;");
        parse_err("while (a) const b = 1;");
    }

    #[test]
    fn test_let_as_identifier_in_sloppy_code() {
        parse_ok("var let = 1; let;");
    }

    #[test]
    fn test_classes_and_async_are_rejected() {
        let err = parse_err("class A {}");
        assert!(err.message.contains("Classes"));
        let err = parse_err("async function f() {}");
        assert!(err.message.contains("Async"));
    }

    #[test]
    fn test_module_declarations() {
        let program = Parser::new(
            "import a, { b as c } from 'm'; import * as ns from 'n'; export const x = 1; export { x as y }; export default 42; export * from 'o';",
        )
        .module()
        .parse_program()
        .unwrap();
        assert_eq!(program.body.len(), 6);
        match &program.body[0] {
            Statement::Import(import) => {
                assert_eq!(import.source, "m");
                assert_eq!(import.specifiers.len(), 2);
            }
            other => panic!("unexpected {:?}", other),
        }
        parse_err("import a from 'm';");
    }
}
