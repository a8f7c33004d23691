//! Statement compilation.
//!
//! ## Control Flow Compilation
//!
//! ### If Statement
//!
//! ```text
//!   [condition]
//!   JumpIfFalse -> else_label
//!   [then]
//!   Jump -> end_label
//! else_label:
//!   [else]
//! end_label:
//! ```
//!
//! ### For-Of Loop
//!
//! The iterator and its `next` method stay on the operand stack for the
//! whole loop. The body is covered by a `Finally` handler that closes the
//! iterator when an exception leaves the loop.
//!
//! ```text
//!   [iterable]
//!   GetIterator                  ; iterator next
//! loop_label:
//!   ForOfStep -> exit_label      ; iterator next value
//!   [bind value]
//!   [body]
//!   Jump -> loop_label
//! exit_label:
//!   Pop
//!   Pop
//! ```
//!
//! ### Try Statement
//!
//! ```text
//!   [try block]                  ; covered by catch and finally handlers
//!   Jump -> after_catch
//! catch_handler:                 ; exception
//!   [bind and run catch body]    ; covered by the finally handler
//! after_catch:
//!   [finally block]
//!   Jump -> end_label
//! finally_handler:               ; value kind
//!   [finally block]
//!   EndFinally
//! end_label:
//! ```
//!
//! `break`, `continue` and `return` that leave a `try` with a `finally`
//! block get their own inlined copy of the block.

use super::{Compiler, CompileResult, ControlKind, RangeSet, StoreMode, TryControl};
use crate::ast::*;
use crate::compiler::bytecode::{HandlerKind, OpCode, Operand};
use crate::stack;

impl<'a> Compiler<'a> {
    // ========================================================================
    // Statements
    // ========================================================================

    pub(super) fn compile_statement(&mut self, statement: &'a Statement) -> CompileResult<()> {
        stack::guarded(|| self.compile_statement_kind(statement))
    }

    fn compile_statement_kind(&mut self, statement: &'a Statement) -> CompileResult<()> {
        match statement {
            Statement::VariableDeclaration(declaration) => self.compile_variable_declaration(declaration),
            Statement::FunctionDeclaration(function) => self.compile_function_declaration(function),
            Statement::Expression(statement) => {
                self.mark(statement.span.start);
                self.compile_expression(&statement.expression)?;
                match self.state.completion {
                    Some(slot) => self.emit_with(OpCode::InitLocal, Operand::Local(slot)),
                    None => self.emit_op(OpCode::Pop),
                };
                Ok(())
            }
            Statement::Block(block) => self.compile_block(block),
            Statement::If(statement) => self.compile_if(statement),
            Statement::Switch(statement) => self.compile_switch(statement),
            Statement::While(statement) => self.compile_while(statement),
            Statement::DoWhile(statement) => self.compile_do_while(statement),
            Statement::For(statement) => self.compile_for(statement),
            Statement::ForIn(statement) => self.compile_for_in(statement),
            Statement::ForOf(statement) => self.compile_for_of(statement),
            Statement::Return(statement) => {
                self.mark(statement.span.start);
                match &statement.argument {
                    Some(argument) => self.compile_expression(argument)?,
                    None => {
                        self.emit_op(OpCode::Undefined);
                    }
                }
                self.compile_return_value(statement.span)
            }
            Statement::Break(jump) => self.compile_break(jump.label.as_deref(), jump.span),
            Statement::Continue(jump) => self.compile_continue(jump.label.as_deref(), jump.span),
            Statement::Throw(statement) => {
                self.compile_expression(&statement.argument)?;
                self.mark(statement.span.start);
                self.emit_op(OpCode::Throw);
                Ok(())
            }
            Statement::Try(statement) => self.compile_try(statement),
            Statement::With(statement) => self.compile_with(statement),
            Statement::Labeled(statement) => self.compile_labeled(statement),
            Statement::Import(_) => Ok(()),
            Statement::Export(export) => self.compile_export(export),
            Statement::Debugger => {
                self.emit_op(OpCode::Debugger);
                Ok(())
            }
            Statement::Empty => Ok(()),
        }
    }

    /// Resets the completion value, for statements whose value may be empty.
    fn reset_completion(&mut self) {
        if let Some(slot) = self.state.completion {
            self.emit_op(OpCode::Undefined);
            self.emit_with(OpCode::InitLocal, Operand::Local(slot));
        }
    }

    pub(super) fn compile_block(&mut self, block: &'a BlockStatement) -> CompileResult<()> {
        self.enter_scope(block.id);
        self.instantiate_functions(&block.body, false)?;
        for statement in &block.body {
            self.compile_statement(statement)?;
        }
        self.leave_scope(block.id);
        Ok(())
    }

    // ========================================================================
    // Declarations
    // ========================================================================

    pub(super) fn compile_variable_declaration(&mut self, declaration: &'a VariableDeclaration) -> CompileResult<()> {
        self.mark(declaration.span.start);
        let mode = match declaration.kind {
            VariableKind::Var => StoreMode::Assign,
            VariableKind::Let | VariableKind::Const => StoreMode::Init,
        };
        for declarator in &declaration.declarations {
            match &declarator.init {
                Some(init) => {
                    match &declarator.id {
                        Pattern::Identifier(id) => self.compile_named_expression(init, &id.name)?,
                        _ => self.compile_expression(init)?,
                    }
                    self.bind_pattern(&declarator.id, mode)?;
                }
                None if mode == StoreMode::Init => {
                    self.emit_op(OpCode::Undefined);
                    self.bind_pattern(&declarator.id, mode)?;
                }
                None => {}
            }
        }
        Ok(())
    }

    /// Function declarations are instantiated when their scope is entered;
    /// sloppy block-level ones are also copied to the `var` binding here.
    fn compile_function_declaration(&mut self, function: &'a FunctionLiteral) -> CompileResult<()> {
        if self.is_annex_b(function.id)
            && let Some(name) = &function.name
        {
            self.load_name(&name.name);
            self.store_annex_b(&name.name, name.span)?;
        }
        Ok(())
    }

    // ========================================================================
    // Conditionals
    // ========================================================================

    fn compile_if(&mut self, statement: &'a IfStatement) -> CompileResult<()> {
        self.reset_completion();
        self.compile_expression(&statement.test)?;
        let else_jump = self.emit_jump(OpCode::JumpIfFalse);
        self.compile_statement(&statement.consequent)?;
        match &statement.alternate {
            Some(alternate) => {
                let end_jump = self.emit_jump(OpCode::Jump);
                self.patch(else_jump);
                self.compile_statement(alternate)?;
                self.patch(end_jump);
            }
            None => self.patch(else_jump),
        }
        Ok(())
    }

    fn compile_switch(&mut self, statement: &'a SwitchStatement) -> CompileResult<()> {
        self.reset_completion();
        self.compile_expression(&statement.discriminant)?;
        self.push_control(ControlKind::Switch);
        self.enter_scope(statement.id);
        for case in &statement.cases {
            self.instantiate_functions(&case.consequent, false)?;
        }

        let mut case_jumps = Vec::with_capacity(statement.cases.len());
        for case in &statement.cases {
            match &case.test {
                Some(test) => {
                    self.emit_op(OpCode::Dup);
                    self.compile_expression(test)?;
                    self.emit_op(OpCode::StrictEq);
                    case_jumps.push(Some(self.emit_jump(OpCode::JumpIfTrue)));
                }
                None => case_jumps.push(None),
            }
        }
        let default_jump = self.emit_jump(OpCode::Jump);
        let mut has_default = false;

        for (case, jump) in statement.cases.iter().zip(case_jumps) {
            match jump {
                Some(jump) => self.patch(jump),
                None => {
                    self.patch(default_jump);
                    has_default = true;
                }
            }
            for statement in &case.consequent {
                self.compile_statement(statement)?;
            }
        }
        if !has_default {
            self.patch(default_jump);
        }

        self.leave_scope(statement.id);
        self.emit_op(OpCode::Pop);
        if let Some(control) = self.pop_control() {
            self.patch_breaks(&control);
        }
        Ok(())
    }

    // ========================================================================
    // Loops
    // ========================================================================

    fn compile_while(&mut self, statement: &'a WhileStatement) -> CompileResult<()> {
        self.reset_completion();
        self.push_control(ControlKind::Loop);
        let top = self.ip();
        self.compile_expression(&statement.test)?;
        let exit = self.emit_jump(OpCode::JumpIfFalse);
        self.compile_statement(&statement.body)?;
        self.patch_continues(top);
        self.emit_loop(OpCode::Jump, top);
        self.patch(exit);
        if let Some(control) = self.pop_control() {
            self.patch_breaks(&control);
        }
        Ok(())
    }

    fn compile_do_while(&mut self, statement: &'a DoWhileStatement) -> CompileResult<()> {
        self.reset_completion();
        self.push_control(ControlKind::Loop);
        let top = self.ip();
        self.compile_statement(&statement.body)?;
        let test = self.ip();
        self.patch_continues(test);
        self.compile_expression(&statement.test)?;
        self.emit_loop(OpCode::JumpIfTrue, top);
        if let Some(control) = self.pop_control() {
            self.patch_breaks(&control);
        }
        Ok(())
    }

    fn compile_for(&mut self, statement: &'a ForStatement) -> CompileResult<()> {
        self.reset_completion();
        self.enter_scope(statement.id);
        let per_iteration = matches!(
            &statement.init,
            Some(ForInit::Declaration(VariableDeclaration { kind: VariableKind::Let, .. }))
        ) && self.scope_is_materialized(statement.id);

        match &statement.init {
            Some(ForInit::Declaration(declaration)) => self.compile_variable_declaration(declaration)?,
            Some(ForInit::Expression(expression)) => {
                self.compile_expression(expression)?;
                self.emit_op(OpCode::Pop);
            }
            None => {}
        }
        if per_iteration {
            self.emit_op(OpCode::CopyScope);
        }

        self.push_control(ControlKind::Loop);
        let top = self.ip();
        let exit = match &statement.test {
            Some(test) => {
                self.compile_expression(test)?;
                Some(self.emit_jump(OpCode::JumpIfFalse))
            }
            None => None,
        };
        self.compile_statement(&statement.body)?;
        let update = self.ip();
        self.patch_continues(update);
        if per_iteration {
            self.emit_op(OpCode::CopyScope);
        }
        if let Some(expression) = &statement.update {
            self.compile_expression(expression)?;
            self.emit_op(OpCode::Pop);
        }
        self.emit_loop(OpCode::Jump, top);
        if let Some(exit) = exit {
            self.patch(exit);
        }
        if let Some(control) = self.pop_control() {
            self.patch_breaks(&control);
        }
        self.leave_scope(statement.id);
        Ok(())
    }

    fn compile_for_head(&mut self, head: &'a ForHead) -> CompileResult<()> {
        match head {
            ForHead::Declaration { kind, pattern } => {
                let mode = match kind {
                    VariableKind::Var => StoreMode::Assign,
                    VariableKind::Let | VariableKind::Const => StoreMode::Init,
                };
                self.bind_pattern(pattern, mode)
            }
            ForHead::Pattern(pattern) => self.bind_pattern(pattern, StoreMode::Assign),
        }
    }

    fn compile_for_in(&mut self, statement: &'a ForInStatement) -> CompileResult<()> {
        self.reset_completion();
        self.compile_expression(&statement.right)?;
        self.emit_op(OpCode::ForInPrepare);
        let depth = self.depth();

        self.push_control(ControlKind::ForIn);
        let top = self.ip();
        let exit = self.emit_jump(OpCode::ForInNext);
        self.enter_scope(statement.id);
        self.compile_for_head(&statement.left)?;
        self.compile_statement(&statement.body)?;
        self.leave_scope(statement.id);
        self.patch_continues(top);
        self.emit_loop(OpCode::Jump, top);

        self.patch(exit);
        self.set_depth(depth);
        self.emit_op(OpCode::Pop);
        if let Some(control) = self.pop_control() {
            self.patch_breaks(&control);
        }
        Ok(())
    }

    fn compile_for_of(&mut self, statement: &'a ForOfStatement) -> CompileResult<()> {
        self.reset_completion();
        let base = self.depth();
        self.compile_expression(&statement.right)?;
        self.emit_op(OpCode::GetIterator);

        self.push_control(ControlKind::ForOf(RangeSet::default()));
        let top = self.ip();
        let exit = self.emit_jump(OpCode::ForOfStep);
        let body_start = self.ip();
        if let Some(control) = self.last_control_mut()
            && let ControlKind::ForOf(ranges) = &mut control.kind
        {
            ranges.reopen(body_start);
        }
        self.enter_scope(statement.id);
        self.compile_for_head(&statement.left)?;
        self.compile_statement(&statement.body)?;
        self.leave_scope(statement.id);
        self.patch_continues(top);
        let body_end = self.ip();
        let control = self.pop_control();
        self.emit_loop(OpCode::Jump, top);

        self.patch(exit);
        self.set_depth(base + 2);
        self.emit_op(OpCode::Pop);
        self.emit_op(OpCode::Pop);
        if let Some(control) = control {
            self.patch_breaks(&control);
            if let ControlKind::ForOf(mut ranges) = control.kind {
                ranges.close(body_end);
                self.close_iterator_region(ranges, base);
            }
        }
        Ok(())
    }

    // ========================================================================
    // Exceptions
    // ========================================================================

    fn compile_try(&mut self, statement: &'a TryStatement) -> CompileResult<()> {
        self.reset_completion();
        let control = TryControl::new(self, statement.handler.is_some(), statement.finalizer.as_ref());
        let stack_depth = control.stack_depth;
        let scope_depth = control.scope_depth;
        self.push_control(ControlKind::Try(control));
        self.compile_block(&statement.block)?;

        let at = self.ip();
        let mut catch_ranges = None;
        if let Some(control) = self.last_control_mut()
            && let ControlKind::Try(control) = &mut control.kind
            && let Some(mut ranges) = control.catch.take()
        {
            ranges.close(at);
            catch_ranges = Some(ranges);
        }

        let mut catch_target = 0;
        if let Some(handler) = &statement.handler {
            let skip = self.emit_jump(OpCode::Jump);
            catch_target = self.ip();
            self.set_depth(stack_depth + 1);
            self.enter_scope(handler.id);
            match &handler.param {
                Some(param) => self.bind_pattern(param, StoreMode::Init)?,
                None => {
                    self.emit_op(OpCode::Pop);
                }
            }
            self.compile_block(&handler.body)?;
            self.leave_scope(handler.id);
            self.patch(skip);
        }

        let control = self.pop_control();
        if let Some(ranges) = catch_ranges {
            self.add_handlers(ranges, catch_target, stack_depth, scope_depth, HandlerKind::Catch);
        }

        if let (Some(finalizer), Some(control)) = (&statement.finalizer, control)
            && let ControlKind::Try(TryControl {
                finally: Some((mut ranges, _)),
                ..
            }) = control.kind
        {
            let at = self.ip();
            ranges.close(at);
            let saved_completion = self.state.completion.take();
            self.compile_block(finalizer)?;
            let end = self.emit_jump(OpCode::Jump);

            let finally_target = self.ip();
            self.set_depth(stack_depth + 2);
            self.push_control(ControlKind::FinallyBody { items: 2 });
            self.compile_block(finalizer)?;
            self.pop_control();
            self.emit_op(OpCode::EndFinally);
            self.state.completion = saved_completion;

            self.patch(end);
            self.set_depth(stack_depth);
            self.add_handlers(ranges, finally_target, stack_depth, scope_depth, HandlerKind::Finally);
        }
        Ok(())
    }

    // ========================================================================
    // Other statements
    // ========================================================================

    fn compile_with(&mut self, statement: &'a WithStatement) -> CompileResult<()> {
        self.reset_completion();
        self.compile_expression(&statement.object)?;
        self.emit_op(OpCode::PushWith);
        let outer = self.state.scope;
        if let Some(scope) = self.analysis.scope_of(statement.id) {
            self.state.scope = scope;
        }
        self.state.scope_depth += 1;
        self.push_control(ControlKind::Scope);
        self.compile_statement(&statement.body)?;
        self.pop_control();
        self.state.scope_depth -= 1;
        self.state.scope = outer;
        self.emit_op(OpCode::PopScope);
        Ok(())
    }

    fn compile_labeled(&mut self, statement: &'a LabeledStatement) -> CompileResult<()> {
        let mut labels = self.take_pending_labels();
        labels.push(statement.label.clone());
        match statement.body.as_ref() {
            Statement::While(_)
            | Statement::DoWhile(_)
            | Statement::For(_)
            | Statement::ForIn(_)
            | Statement::ForOf(_)
            | Statement::Labeled(_) => {
                self.set_pending_labels(labels);
                self.compile_statement(&statement.body)
            }
            body => {
                self.set_pending_labels(labels);
                self.push_control(ControlKind::Labeled);
                self.compile_statement(body)?;
                if let Some(control) = self.pop_control() {
                    self.patch_breaks(&control);
                }
                Ok(())
            }
        }
    }

    // ========================================================================
    // Modules
    // ========================================================================

    /// Loads every imported module and initializes the import bindings.
    pub(super) fn compile_imports(&mut self, body: &'a [Statement]) -> CompileResult<()> {
        for statement in body {
            let Statement::Import(import) = statement else { continue };
            let source = self.name_constant(&import.source);
            self.mark(import.span.start);
            self.emit_with(OpCode::ImportModule, Operand::Constant(source));
            for specifier in &import.specifiers {
                self.emit_op(OpCode::Dup);
                let local = match specifier {
                    ImportSpecifier::Default(local) => {
                        self.emit_op(OpCode::ImportDefault);
                        local
                    }
                    ImportSpecifier::Namespace(local) => local,
                    ImportSpecifier::Named { imported, local } => {
                        let name = self.name_constant(imported);
                        self.emit_with(OpCode::GetNamed, Operand::Name(name));
                        local
                    }
                };
                self.store_name(&local.name, StoreMode::Init, local.span)?;
            }
            self.emit_op(OpCode::Pop);
        }
        Ok(())
    }

    /// Marks the exports object and exports hoisted function declarations.
    pub(super) fn compile_hoisted_exports(&mut self, body: &'a [Statement]) -> CompileResult<()> {
        if !body.iter().any(|s| matches!(s, Statement::Export(_))) {
            return Ok(());
        }
        self.emit_with(OpCode::GetArg, Operand::ArgCount(0));
        self.emit_op(OpCode::True);
        let marker = self.name_constant("__esModule");
        self.emit_with(OpCode::SetNamed, Operand::Name(marker));
        self.emit_op(OpCode::Pop);
        for statement in body {
            if let Statement::Export(ExportDeclaration::Declaration(inner)) = statement
                && let Statement::FunctionDeclaration(function) = inner.as_ref()
                && let Some(name) = &function.name
            {
                self.export_binding(&name.name, &name.name);
            }
        }
        Ok(())
    }

    /// `exports[exported] = local`
    fn export_binding(&mut self, local: &str, exported: &str) {
        self.emit_with(OpCode::GetArg, Operand::ArgCount(0));
        self.load_name(local);
        let name = self.name_constant(exported);
        self.emit_with(OpCode::SetNamed, Operand::Name(name));
        self.emit_op(OpCode::Pop);
    }

    fn compile_export(&mut self, export: &'a ExportDeclaration) -> CompileResult<()> {
        match export {
            ExportDeclaration::Declaration(statement) => {
                self.compile_statement(statement)?;
                if let Statement::VariableDeclaration(declaration) = statement.as_ref() {
                    let mut names = Vec::new();
                    for declarator in &declaration.declarations {
                        declarator.id.bound_names(&mut names);
                    }
                    for id in names {
                        self.export_binding(&id.name, &id.name);
                    }
                }
            }
            ExportDeclaration::Named {
                specifiers,
                source: None,
                ..
            } => {
                for (local, exported) in specifiers {
                    self.export_binding(local, exported);
                }
            }
            ExportDeclaration::Named {
                specifiers,
                source: Some(source),
                span,
            } => {
                let source = self.name_constant(source);
                self.mark(span.start);
                self.emit_with(OpCode::ImportModule, Operand::Constant(source));
                for (imported, exported) in specifiers {
                    self.emit_op(OpCode::Dup);
                    if imported == "default" {
                        self.emit_op(OpCode::ImportDefault);
                    } else {
                        let name = self.name_constant(imported);
                        self.emit_with(OpCode::GetNamed, Operand::Name(name));
                    }
                    self.emit_with(OpCode::GetArg, Operand::ArgCount(0));
                    self.emit_op(OpCode::Swap);
                    let name = self.name_constant(exported);
                    self.emit_with(OpCode::SetNamed, Operand::Name(name));
                    self.emit_op(OpCode::Pop);
                }
                self.emit_op(OpCode::Pop);
            }
            ExportDeclaration::All { source, span } => {
                let source = self.name_constant(source);
                self.mark(span.start);
                self.emit_with(OpCode::ImportModule, Operand::Constant(source));
                self.emit_string("default");
                self.emit_with(OpCode::CopyDataProperties, Operand::ArgCount(1));
                self.emit_with(OpCode::GetArg, Operand::ArgCount(0));
                self.emit_op(OpCode::Swap);
                self.emit_op(OpCode::ObjectSpread);
                self.emit_op(OpCode::Pop);
            }
            ExportDeclaration::Default(expression) => {
                self.compile_named_expression(expression, "default")?;
                self.emit_with(OpCode::GetArg, Operand::ArgCount(0));
                self.emit_op(OpCode::Swap);
                let name = self.name_constant("default");
                self.emit_with(OpCode::SetNamed, Operand::Name(name));
                self.emit_op(OpCode::Pop);
            }
        }
        Ok(())
    }
}

