//! Destructuring and assignment targets.
//!
//! Every binding routine consumes the value on top of the stack. Member
//! targets inside patterns are evaluated before the value they receive is
//! read, so their object (and key) sit on the stack above the source while
//! the value is fetched with `Pick` or `DestructureStep`.

use super::{Compiler, CompileResult, StoreMode};
use crate::ast::*;
use crate::compiler::bytecode::{OpCode, Operand};
use crate::error::CompileErrorKind;
use crate::lexer::Span;

/// A target whose reference has been evaluated.
enum Target<'a> {
    /// An identifier or nested pattern; nothing on the stack
    Pattern(&'a Pattern),
    /// `obj.name`; the object is on the stack
    Named(&'a str),
    /// `obj[key]`; the object and key are on the stack
    Computed,
}

impl<'a> Compiler<'a> {
    /// Stores the top value into `pattern`, consuming it.
    pub(super) fn bind_pattern(&mut self, pattern: &'a Pattern, mode: StoreMode) -> CompileResult<()> {
        match pattern {
            Pattern::Identifier(id) => {
                self.store_name(&id.name, mode, id.span)?;
                if mode == StoreMode::Assign {
                    self.emit_op(OpCode::Pop);
                }
                Ok(())
            }
            Pattern::Member(expression) => self.store_member_late(expression),
            Pattern::Object(object) => self.bind_object_pattern(object, mode),
            Pattern::Array(array) => self.bind_array_pattern(array, mode),
            Pattern::Assignment(assignment) => {
                self.apply_default(&assignment.target, &assignment.default)?;
                self.bind_pattern(&assignment.target, mode)
            }
        }
    }

    /// Replaces an undefined value on top with the default.
    fn apply_default(&mut self, target: &'a Pattern, default: &'a Expression) -> CompileResult<()> {
        let skip = self.emit_jump(OpCode::JumpIfNotUndefined);
        self.emit_op(OpCode::Pop);
        match target {
            Pattern::Identifier(id) => self.compile_named_expression(default, &id.name)?,
            _ => self.compile_expression(default)?,
        }
        self.patch(skip);
        Ok(())
    }

    /// Stores into a member expression evaluated after the value.
    fn store_member_late(&mut self, expression: &'a Expression) -> CompileResult<()> {
        let Expression::Member(member) = expression.unparenthesized() else {
            return Err(self.invalid_target(Span::default()));
        };
        self.compile_expression(&member.object)?;
        match &member.property {
            MemberProperty::Named(name) => {
                self.emit_op(OpCode::Swap);
                let name = self.name_constant(name);
                self.emit_with(OpCode::SetNamed, Operand::Name(name));
            }
            MemberProperty::Computed(key) => {
                self.compile_expression(key)?;
                self.emit_op(OpCode::Rot3);
                self.emit_op(OpCode::Rot3);
                self.emit_op(OpCode::SetProperty);
            }
        }
        self.emit_op(OpCode::Pop);
        Ok(())
    }

    fn invalid_target(&self, span: Span) -> crate::error::CompileError {
        self.error_kind(
            CompileErrorKind::Reference,
            span,
            "Invalid destructuring assignment target",
        )
    }

    /// Evaluates the reference part of a target. Returns the target and the
    /// number of values it left on the stack.
    fn prepare_target(&mut self, pattern: &'a Pattern) -> CompileResult<(Target<'a>, u32)> {
        let Pattern::Member(expression) = pattern else {
            return Ok((Target::Pattern(pattern), 0));
        };
        let Expression::Member(member) = expression.unparenthesized() else {
            return Err(self.invalid_target(Span::default()));
        };
        self.compile_expression(&member.object)?;
        match &member.property {
            MemberProperty::Named(name) => Ok((Target::Named(name.as_str()), 1)),
            MemberProperty::Computed(key) => {
                self.compile_expression(key)?;
                self.emit_op(OpCode::ToPropertyKey);
                Ok((Target::Computed, 2))
            }
        }
    }

    /// Stores the top value into a prepared target, consuming the value and
    /// the target's stack items.
    fn store_prepared(&mut self, target: Target<'a>, mode: StoreMode) -> CompileResult<()> {
        match target {
            Target::Pattern(pattern) => return self.bind_pattern(pattern, mode),
            Target::Named(name) => {
                let name = self.name_constant(name);
                self.emit_with(OpCode::SetNamed, Operand::Name(name));
            }
            Target::Computed => {
                self.emit_op(OpCode::SetProperty);
            }
        }
        self.emit_op(OpCode::Pop);
        Ok(())
    }

    fn split_default(element: &'a Pattern) -> (&'a Pattern, Option<&'a Expression>) {
        match element {
            Pattern::Assignment(assignment) => (&assignment.target, Some(&assignment.default)),
            other => (other, None),
        }
    }

    // ========================================================================
    // Object patterns
    // ========================================================================

    fn bind_object_pattern(&mut self, pattern: &'a ObjectPattern, mode: StoreMode) -> CompileResult<()> {
        self.emit_op(OpCode::RequireObjectCoercible);
        // Keys already read, for the rest element.
        let mut keys: Vec<Result<&'a str, u32>> = Vec::new();

        for property in &pattern.properties {
            let (target, default) = Self::split_default(&property.value);
            match &property.key {
                PropertyName::Named(name) => {
                    let (prepared, items) = self.prepare_target(target)?;
                    self.emit_with(OpCode::Pick, Operand::ArgCount(items));
                    let index = self.name_constant(name);
                    self.emit_with(OpCode::GetNamed, Operand::Name(index));
                    if let Some(default) = default {
                        self.apply_default(target, default)?;
                    }
                    self.store_prepared(prepared, mode)?;
                    keys.push(Ok(name.as_str()));
                }
                PropertyName::Computed(key) => {
                    self.compile_expression(key)?;
                    self.emit_op(OpCode::ToPropertyKey);
                    if pattern.rest.is_some() {
                        let slot = self.alloc_local("%key");
                        self.emit_op(OpCode::Dup);
                        self.emit_with(OpCode::InitLocal, Operand::Local(slot));
                        keys.push(Err(slot));
                    }
                    let (prepared, items) = self.prepare_target(target)?;
                    self.emit_with(OpCode::Pick, Operand::ArgCount(items + 1));
                    self.emit_with(OpCode::Pick, Operand::ArgCount(items + 1));
                    self.emit_op(OpCode::GetProperty);
                    if let Some(default) = default {
                        self.apply_default(target, default)?;
                    }
                    self.store_prepared(prepared, mode)?;
                    self.emit_op(OpCode::Pop);
                }
            }
        }

        match &pattern.rest {
            Some(rest) => {
                for key in &keys {
                    match key {
                        Ok(name) => self.emit_string(name),
                        Err(slot) => {
                            self.emit_with(OpCode::GetLocal, Operand::Local(*slot));
                        }
                    }
                }
                self.emit_with(OpCode::CopyDataProperties, Operand::ArgCount(keys.len() as u32));
                self.bind_pattern(rest, mode)
            }
            None => {
                self.emit_op(OpCode::Pop);
                Ok(())
            }
        }
    }

    // ========================================================================
    // Array patterns
    // ========================================================================

    fn bind_array_pattern(&mut self, pattern: &'a ArrayPattern, mode: StoreMode) -> CompileResult<()> {
        let base = self.depth() - 1;
        self.emit_op(OpCode::GetIterator);
        let mut ranges = self.open_iterator_region();

        for element in &pattern.elements {
            let Some(element) = element else {
                self.emit_with(OpCode::DestructureStep, Operand::ArgCount(0));
                self.emit_op(OpCode::Pop);
                continue;
            };
            let (target, default) = Self::split_default(element);
            let (prepared, items) = self.prepare_target(target)?;
            self.emit_with(OpCode::DestructureStep, Operand::ArgCount(items));
            if let Some(default) = default {
                self.apply_default(target, default)?;
            }
            self.store_prepared(prepared, mode)?;
        }
        if let Some(rest) = &pattern.rest {
            let (prepared, items) = self.prepare_target(rest)?;
            self.emit_with(OpCode::DestructureRest, Operand::ArgCount(items));
            self.store_prepared(prepared, mode)?;
        }

        let at = self.ip();
        ranges.close(at);
        self.emit_op(OpCode::DestructureClose);
        self.close_iterator_region(ranges, base);
        Ok(())
    }
}
