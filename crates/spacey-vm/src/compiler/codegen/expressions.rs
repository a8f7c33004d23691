//! Expression compilation.
//!
//! Every expression leaves exactly one value on the operand stack.
//!
//! ## Stack Machine Model
//!
//! ```text
//! Expression: 1 + 2 * 3
//!
//! Bytecode:
//!   Constant 1      ; stack: [1]
//!   Constant 2      ; stack: [1, 2]
//!   Constant 3      ; stack: [1, 2, 3]
//!   Mul             ; stack: [1, 6]
//!   Add             ; stack: [7]
//! ```
//!
//! ## Calls
//!
//! A call pushes the function, the `this` value and the arguments:
//!
//! ```text
//! Expression: o.m(x)
//!
//! Bytecode:
//!   [o]             ; stack: [o]
//!   Dup             ; stack: [o, o]
//!   GetNamed m      ; stack: [o, f]
//!   Swap            ; stack: [f, o]
//!   [x]             ; stack: [f, o, x]
//!   Call 1          ; stack: [result]
//! ```
//!
//! ## Optional Chains
//!
//! Each `?.` link emits an `OptionalJump` that, on a null or undefined
//! value, drops everything the chain pushed so far, pushes `undefined` and
//! jumps to the end of the chain.

use std::sync::Arc;

use num_bigint::BigInt;

use super::{Compiler, CompileResult, StoreMode};
use crate::ast::*;
use crate::compiler::bytecode::{Constant, OpCode, Operand, TemplateSite};
use crate::error::CompileErrorKind;
use crate::lexer::Span;
use crate::runtime::string::JsString;
use crate::stack;

use super::scope::Resolution;

/// What to do with the last link of a member expression.
#[derive(Clone, Copy, PartialEq, Eq)]
enum MemberAccess {
    Get,
    Delete,
}

impl<'a> Compiler<'a> {
    pub(super) fn compile_expression(&mut self, expression: &'a Expression) -> CompileResult<()> {
        stack::guarded(|| self.compile_expression_kind(expression))
    }

    fn compile_expression_kind(&mut self, expression: &'a Expression) -> CompileResult<()> {
        match expression {
            Expression::Identifier(id) => {
                self.mark(id.span.start);
                self.load_name(&id.name);
            }
            Expression::Literal(literal) => self.compile_literal(literal)?,
            Expression::Template(template) => self.compile_template(template)?,
            Expression::TaggedTemplate(tagged) => self.compile_tagged_template(tagged)?,
            Expression::Array(array) => self.compile_array(array)?,
            Expression::Object(object) => self.compile_object(object)?,
            Expression::Function(function) => {
                let index = self.compile_function(function, None)?;
                self.emit_with(OpCode::Closure, Operand::Constant(index));
            }
            Expression::Unary(unary) => self.compile_unary(unary)?,
            Expression::Update(update) => self.compile_update(update)?,
            Expression::Binary(binary) => {
                self.compile_expression(&binary.left)?;
                self.compile_expression(&binary.right)?;
                self.emit_op(binary_opcode(binary.operator));
            }
            Expression::Logical(logical) => {
                self.compile_expression(&logical.left)?;
                let end = self.emit_jump(short_circuit_opcode(logical.operator));
                self.emit_op(OpCode::Pop);
                self.compile_expression(&logical.right)?;
                self.patch(end);
            }
            Expression::Assignment(assignment) => self.compile_assignment(assignment)?,
            Expression::Conditional(conditional) => {
                self.compile_expression(&conditional.test)?;
                let else_jump = self.emit_jump(OpCode::JumpIfFalse);
                let depth = self.depth();
                self.compile_expression(&conditional.consequent)?;
                let end = self.emit_jump(OpCode::Jump);
                self.patch(else_jump);
                self.set_depth(depth);
                self.compile_expression(&conditional.alternate)?;
                self.patch(end);
            }
            Expression::Call(call) => self.compile_call(call)?,
            Expression::New(new) => {
                self.compile_expression(&new.callee)?;
                let spread = self.compile_arguments(&new.arguments)?;
                self.mark(new.span.start);
                match spread {
                    Some(count) => self.emit_with(OpCode::New, Operand::ArgCount(count)),
                    None => self.emit_op(OpCode::NewSpread),
                };
            }
            Expression::Member(member) => self.compile_member(member, MemberAccess::Get)?,
            Expression::OptionalChain(inner) => {
                self.open_chain();
                self.compile_expression(inner)?;
                self.close_chain();
            }
            Expression::Sequence(expressions) => {
                for (index, expression) in expressions.iter().enumerate() {
                    if index > 0 {
                        self.emit_op(OpCode::Pop);
                    }
                    self.compile_expression(expression)?;
                }
            }
            Expression::Yield(expression) => self.compile_yield(expression)?,
            Expression::This => {
                self.emit_op(OpCode::This);
            }
            Expression::NewTarget => {
                self.emit_op(OpCode::NewTarget);
            }
            Expression::Parenthesized(inner) => self.compile_expression(inner)?,
        }
        Ok(())
    }

    /// Compiles an expression whose anonymous function takes `name`.
    pub(super) fn compile_named_expression(&mut self, expression: &'a Expression, name: &str) -> CompileResult<()> {
        match expression {
            Expression::Function(function) if function.name.is_none() => {
                let index = self.compile_function(function, Some(name))?;
                self.emit_with(OpCode::Closure, Operand::Constant(index));
                Ok(())
            }
            other => self.compile_expression(other),
        }
    }

    // ========================================================================
    // Literals
    // ========================================================================

    fn compile_literal(&mut self, literal: &'a Literal) -> CompileResult<()> {
        match literal {
            Literal::Number(n) => {
                let index = self.add_constant(Constant::Number(*n));
                self.emit_with(OpCode::Constant, Operand::Constant(index));
            }
            Literal::BigInt(digits) => {
                let value: BigInt = digits
                    .parse()
                    .map_err(|_| self.error(Span::default(), format!("Invalid BigInt literal {digits}")))?;
                let index = self.add_constant(Constant::BigInt(Arc::new(value)));
                self.emit_with(OpCode::Constant, Operand::Constant(index));
            }
            Literal::String(s) => self.emit_js_string(s),
            Literal::Boolean(true) => {
                self.emit_op(OpCode::True);
            }
            Literal::Boolean(false) => {
                self.emit_op(OpCode::False);
            }
            Literal::Null => {
                self.emit_op(OpCode::Null);
            }
            Literal::RegExp { pattern, flags } => {
                let index = self.add_constant(Constant::RegExp {
                    pattern: Arc::from(pattern.as_str()),
                    flags: Arc::from(flags.as_str()),
                });
                self.emit_with(OpCode::RegExp, Operand::Constant(index));
            }
        }
        Ok(())
    }

    fn compile_template(&mut self, template: &'a TemplateLiteral) -> CompileResult<()> {
        let cooked = |element: &TemplateElement| element.cooked.clone().unwrap_or_default();
        let first = template.quasis.first().map(cooked).unwrap_or_default();
        self.emit_js_string(&first);
        for (index, expression) in template.expressions.iter().enumerate() {
            self.compile_expression(expression)?;
            self.emit_op(OpCode::ToString);
            self.emit_op(OpCode::Add);
            let chunk = template.quasis.get(index + 1).map(cooked).unwrap_or_default();
            if !chunk.is_empty() {
                self.emit_js_string(&chunk);
                self.emit_op(OpCode::Add);
            }
        }
        Ok(())
    }

    fn compile_tagged_template(&mut self, tagged: &'a TaggedTemplateExpression) -> CompileResult<()> {
        self.compile_callee(&tagged.tag, false)?;
        let site = TemplateSite {
            id: Self::next_template_site(),
            cooked: tagged
                .quasi
                .quasis
                .iter()
                .map(|q| q.cooked.clone())
                .collect(),
            raw: tagged.quasi.quasis.iter().map(|q| JsString::from(q.raw.as_str())).collect(),
        };
        let index = self.add_constant(Constant::Template(Arc::new(site)));
        self.emit_with(OpCode::TemplateObject, Operand::Constant(index));
        for expression in &tagged.quasi.expressions {
            self.compile_expression(expression)?;
        }
        self.mark(tagged.span.start);
        let count = tagged.quasi.expressions.len() as u32 + 1;
        self.emit_with(OpCode::Call, Operand::ArgCount(count));
        Ok(())
    }

    fn compile_array(&mut self, array: &'a ArrayExpression) -> CompileResult<()> {
        self.emit_op(OpCode::NewArray);
        for element in &array.elements {
            match element {
                ArrayElement::Hole => {
                    self.emit_op(OpCode::ArrayHole);
                }
                ArrayElement::Expression(expression) => {
                    self.compile_expression(expression)?;
                    self.emit_op(OpCode::ArrayPush);
                }
                ArrayElement::Spread(expression) => {
                    self.compile_expression(expression)?;
                    self.emit_op(OpCode::ArraySpread);
                }
            }
        }
        Ok(())
    }

    fn compile_property_key(&mut self, key: &'a PropertyName) -> CompileResult<()> {
        match key {
            PropertyName::Named(name) => self.emit_string(name),
            PropertyName::Computed(expression) => {
                self.compile_expression(expression)?;
                self.emit_op(OpCode::ToPropertyKey);
            }
        }
        Ok(())
    }

    fn compile_object(&mut self, object: &'a ObjectExpression) -> CompileResult<()> {
        self.emit_op(OpCode::NewObject);
        for property in &object.properties {
            match property {
                ObjectProperty::KeyValue {
                    key: PropertyName::Named(name),
                    value,
                    ..
                } => {
                    self.compile_named_expression(value, name)?;
                    let index = self.name_constant(name);
                    self.emit_with(OpCode::DefineField, Operand::Name(index));
                }
                ObjectProperty::KeyValue { key, value, .. } => {
                    self.compile_property_key(key)?;
                    self.compile_expression(value)?;
                    self.emit_op(OpCode::DefineComputed);
                }
                ObjectProperty::Getter { key, function } | ObjectProperty::Setter { key, function } => {
                    self.compile_property_key(key)?;
                    let is_getter = matches!(property, ObjectProperty::Getter { .. });
                    let hint = match key {
                        PropertyName::Named(name) if is_getter => format!("get {name}"),
                        PropertyName::Named(name) => format!("set {name}"),
                        PropertyName::Computed(_) => String::new(),
                    };
                    let index = self.compile_function(function, Some(&hint))?;
                    self.emit_with(OpCode::Closure, Operand::Constant(index));
                    self.emit_op(if is_getter { OpCode::DefineGetter } else { OpCode::DefineSetter });
                }
                ObjectProperty::Spread(expression) => {
                    self.compile_expression(expression)?;
                    self.emit_op(OpCode::ObjectSpread);
                }
                ObjectProperty::Proto(expression) => {
                    self.compile_expression(expression)?;
                    self.emit_op(OpCode::SetProto);
                }
                ObjectProperty::CoverInitialized { name, .. } => {
                    return Err(self.error(name.span, "Invalid shorthand property initializer"));
                }
            }
        }
        Ok(())
    }

    // ========================================================================
    // Operators
    // ========================================================================

    fn compile_unary(&mut self, unary: &'a UnaryExpression) -> CompileResult<()> {
        match unary.operator {
            UnaryOperator::Typeof => {
                if let Expression::Identifier(id) = unary.argument.unparenthesized()
                    && matches!(self.resolve(&id.name), Resolution::Global | Resolution::Dynamic)
                {
                    let index = self.name_constant(&id.name);
                    self.emit_with(OpCode::TypeofName, Operand::Name(index));
                } else {
                    self.compile_expression(&unary.argument)?;
                    self.emit_op(OpCode::TypeOf);
                }
            }
            UnaryOperator::Delete => self.compile_delete(&unary.argument, unary.span)?,
            UnaryOperator::Void => {
                self.compile_expression(&unary.argument)?;
                self.emit_op(OpCode::Pop);
                self.emit_op(OpCode::Undefined);
            }
            operator => {
                self.compile_expression(&unary.argument)?;
                self.emit_op(match operator {
                    UnaryOperator::Minus => OpCode::Neg,
                    UnaryOperator::Plus => OpCode::Plus,
                    UnaryOperator::Not => OpCode::Not,
                    _ => OpCode::BitNot,
                });
            }
        }
        Ok(())
    }

    fn compile_delete(&mut self, argument: &'a Expression, span: Span) -> CompileResult<()> {
        self.mark(span.start);
        match argument.unparenthesized() {
            Expression::Member(member) => self.compile_member(member, MemberAccess::Delete),
            Expression::OptionalChain(inner) => match inner.as_ref() {
                Expression::Member(member) => {
                    self.open_chain();
                    self.compile_member(member, MemberAccess::Delete)?;
                    self.close_chain();
                    Ok(())
                }
                other => {
                    self.compile_expression(other)?;
                    self.emit_op(OpCode::Pop);
                    self.emit_op(OpCode::True);
                    Ok(())
                }
            },
            Expression::Identifier(id) => {
                match self.resolve(&id.name) {
                    Resolution::Global | Resolution::Dynamic => {
                        let index = self.name_constant(&id.name);
                        self.emit_with(OpCode::DeleteName, Operand::Name(index));
                    }
                    _ => {
                        self.emit_op(OpCode::False);
                    }
                }
                Ok(())
            }
            other => {
                self.compile_expression(other)?;
                self.emit_op(OpCode::Pop);
                self.emit_op(OpCode::True);
                Ok(())
            }
        }
    }

    fn compile_update(&mut self, update: &'a UpdateExpression) -> CompileResult<()> {
        let step = match update.operator {
            UpdateOperator::Increment => OpCode::Inc,
            UpdateOperator::Decrement => OpCode::Dec,
        };
        self.mark(update.span.start);
        match update.argument.unparenthesized() {
            Expression::Identifier(id) => {
                self.load_name(&id.name);
                self.emit_op(OpCode::ToNumeric);
                if !update.prefix {
                    self.emit_op(OpCode::Dup);
                }
                self.emit_op(step);
                self.store_name(&id.name, StoreMode::Assign, id.span)?;
                if !update.prefix {
                    self.emit_op(OpCode::Pop);
                }
            }
            Expression::Member(member) => {
                self.compile_expression(&member.object)?;
                match &member.property {
                    MemberProperty::Named(name) => {
                        let index = self.name_constant(name);
                        self.emit_op(OpCode::Dup);
                        self.emit_with(OpCode::GetNamed, Operand::Name(index));
                        self.emit_op(OpCode::ToNumeric);
                        if !update.prefix {
                            self.emit_op(OpCode::Dup);
                            self.emit_op(OpCode::Rot3);
                        }
                        self.emit_op(step);
                        self.emit_with(OpCode::SetNamed, Operand::Name(index));
                    }
                    MemberProperty::Computed(key) => {
                        self.compile_expression(key)?;
                        self.emit_op(OpCode::ToPropertyKey);
                        self.emit_op(OpCode::Dup2);
                        self.emit_op(OpCode::GetProperty);
                        self.emit_op(OpCode::ToNumeric);
                        if !update.prefix {
                            self.emit_op(OpCode::Dup);
                            self.emit_op(OpCode::Rot4);
                        }
                        self.emit_op(step);
                        self.emit_op(OpCode::SetProperty);
                    }
                }
                if !update.prefix {
                    self.emit_op(OpCode::Pop);
                }
            }
            _ => {
                return Err(self.error_kind(
                    CompileErrorKind::Reference,
                    update.span,
                    "Invalid left-hand side expression in update operation",
                ));
            }
        }
        Ok(())
    }

    fn compile_assignment(&mut self, assignment: &'a AssignmentExpression) -> CompileResult<()> {
        self.mark(assignment.span.start);
        match (assignment.operator, assignment.target.as_ref()) {
            (AssignmentOperator::Assign, Pattern::Identifier(id)) => {
                self.compile_named_expression(&assignment.value, &id.name)?;
                self.store_name(&id.name, StoreMode::Assign, id.span)
            }
            (AssignmentOperator::Assign, Pattern::Member(target)) => {
                let member = self.assignment_member(target, assignment.span)?;
                self.compile_expression(&member.object)?;
                match &member.property {
                    MemberProperty::Named(name) => {
                        self.compile_expression(&assignment.value)?;
                        let index = self.name_constant(name);
                        self.emit_with(OpCode::SetNamed, Operand::Name(index));
                    }
                    MemberProperty::Computed(key) => {
                        self.compile_expression(key)?;
                        self.compile_expression(&assignment.value)?;
                        self.emit_op(OpCode::SetProperty);
                    }
                }
                Ok(())
            }
            (AssignmentOperator::Assign, pattern) => {
                self.compile_expression(&assignment.value)?;
                self.emit_op(OpCode::Dup);
                self.bind_pattern(pattern, StoreMode::Assign)
            }
            (AssignmentOperator::Compound(operator), target) => {
                let opcode = binary_opcode(operator);
                match target {
                    Pattern::Identifier(id) => {
                        self.load_name(&id.name);
                        self.compile_expression(&assignment.value)?;
                        self.emit_op(opcode);
                        self.store_name(&id.name, StoreMode::Assign, id.span)
                    }
                    Pattern::Member(target) => {
                        let member = self.assignment_member(target, assignment.span)?;
                        self.compile_expression(&member.object)?;
                        match &member.property {
                            MemberProperty::Named(name) => {
                                let index = self.name_constant(name);
                                self.emit_op(OpCode::Dup);
                                self.emit_with(OpCode::GetNamed, Operand::Name(index));
                                self.compile_expression(&assignment.value)?;
                                self.emit_op(opcode);
                                self.emit_with(OpCode::SetNamed, Operand::Name(index));
                            }
                            MemberProperty::Computed(key) => {
                                self.compile_expression(key)?;
                                self.emit_op(OpCode::ToPropertyKey);
                                self.emit_op(OpCode::Dup2);
                                self.emit_op(OpCode::GetProperty);
                                self.compile_expression(&assignment.value)?;
                                self.emit_op(opcode);
                                self.emit_op(OpCode::SetProperty);
                            }
                        }
                        Ok(())
                    }
                    _ => Err(self.invalid_assignment(assignment.span)),
                }
            }
            (AssignmentOperator::Logical(operator), target) => {
                let jump = short_circuit_opcode(operator);
                match target {
                    Pattern::Identifier(id) => {
                        self.load_name(&id.name);
                        let end = self.emit_jump(jump);
                        self.emit_op(OpCode::Pop);
                        self.compile_named_expression(&assignment.value, &id.name)?;
                        self.store_name(&id.name, StoreMode::Assign, id.span)?;
                        self.patch(end);
                        Ok(())
                    }
                    Pattern::Member(target) => {
                        let member = self.assignment_member(target, assignment.span)?;
                        self.compile_expression(&member.object)?;
                        let computed = matches!(member.property, MemberProperty::Computed(_));
                        match &member.property {
                            MemberProperty::Named(name) => {
                                let index = self.name_constant(name);
                                self.emit_op(OpCode::Dup);
                                self.emit_with(OpCode::GetNamed, Operand::Name(index));
                            }
                            MemberProperty::Computed(key) => {
                                self.compile_expression(key)?;
                                self.emit_op(OpCode::ToPropertyKey);
                                self.emit_op(OpCode::Dup2);
                                self.emit_op(OpCode::GetProperty);
                            }
                        }
                        let depth = self.depth();
                        let short = self.emit_jump(jump);
                        self.emit_op(OpCode::Pop);
                        self.compile_expression(&assignment.value)?;
                        match &member.property {
                            MemberProperty::Named(name) => {
                                let index = self.name_constant(name);
                                self.emit_with(OpCode::SetNamed, Operand::Name(index));
                            }
                            MemberProperty::Computed(_) => {
                                self.emit_op(OpCode::SetProperty);
                            }
                        }
                        let end = self.emit_jump(OpCode::Jump);
                        let after = self.depth();
                        self.patch(short);
                        self.set_depth(depth);
                        if computed {
                            self.emit_op(OpCode::Rot3);
                            self.emit_op(OpCode::Pop);
                        } else {
                            self.emit_op(OpCode::Swap);
                        }
                        self.emit_op(OpCode::Pop);
                        self.patch(end);
                        self.set_depth(after);
                        Ok(())
                    }
                    _ => Err(self.invalid_assignment(assignment.span)),
                }
            }
        }
    }

    fn assignment_member(&self, target: &'a Expression, span: Span) -> CompileResult<&'a MemberExpression> {
        match target.unparenthesized() {
            Expression::Member(member) => Ok(member),
            _ => Err(self.invalid_assignment(span)),
        }
    }

    fn invalid_assignment(&self, span: Span) -> crate::error::CompileError {
        self.error_kind(
            CompileErrorKind::Reference,
            span,
            "Invalid left-hand side in assignment",
        )
    }

    // ========================================================================
    // Member access and calls
    // ========================================================================

    fn open_chain(&mut self) {
        let depth = self.depth();
        self.state.chains.push((depth, Vec::new()));
    }

    fn close_chain(&mut self) {
        if let Some((_, jumps)) = self.state.chains.pop() {
            for jump in jumps {
                self.patch(jump);
            }
        }
    }

    /// Short-circuits the innermost optional chain when the top value is
    /// null or undefined.
    fn emit_optional_check(&mut self) {
        let Some(&(base, _)) = self.state.chains.last() else {
            return;
        };
        let pop = (self.depth() - base).max(0) as u32;
        let jump = self.emit_with(OpCode::OptionalJump, Operand::Branch { target: u32::MAX, pop });
        if let Some((_, jumps)) = self.state.chains.last_mut() {
            jumps.push(jump);
        }
    }

    fn compile_member(&mut self, member: &'a MemberExpression, access: MemberAccess) -> CompileResult<()> {
        self.compile_expression(&member.object)?;
        if member.optional {
            self.emit_optional_check();
        }
        match &member.property {
            MemberProperty::Named(name) => {
                let index = self.name_constant(name);
                self.mark(member.span.start);
                match access {
                    MemberAccess::Get => {
                        self.emit_with(OpCode::GetNamed, Operand::Name(index));
                    }
                    MemberAccess::Delete => {
                        self.emit_with(OpCode::Constant, Operand::Constant(index));
                        self.emit_op(OpCode::DeleteProperty);
                    }
                }
            }
            MemberProperty::Computed(key) => {
                self.compile_expression(key)?;
                self.mark(member.span.start);
                self.emit_op(match access {
                    MemberAccess::Get => OpCode::GetProperty,
                    MemberAccess::Delete => OpCode::DeleteProperty,
                });
            }
        }
        Ok(())
    }

    /// Pushes a function and its `this` value.
    fn compile_callee(&mut self, callee: &'a Expression, optional: bool) -> CompileResult<()> {
        match callee.unparenthesized() {
            Expression::Member(member) => {
                self.compile_expression(&member.object)?;
                if member.optional {
                    self.emit_optional_check();
                }
                self.emit_op(OpCode::Dup);
                match &member.property {
                    MemberProperty::Named(name) => {
                        let index = self.name_constant(name);
                        self.mark(member.span.start);
                        self.emit_with(OpCode::GetNamed, Operand::Name(index));
                    }
                    MemberProperty::Computed(key) => {
                        self.compile_expression(key)?;
                        self.mark(member.span.start);
                        self.emit_op(OpCode::GetProperty);
                    }
                }
                if optional {
                    self.emit_optional_check();
                }
                self.emit_op(OpCode::Swap);
            }
            Expression::Identifier(id) => {
                self.mark(id.span.start);
                if self.resolve(&id.name) == Resolution::Dynamic {
                    let index = self.name_constant(&id.name);
                    self.emit_with(OpCode::GetNameForCall, Operand::Name(index));
                    if optional {
                        self.emit_op(OpCode::Swap);
                        self.emit_optional_check();
                        self.emit_op(OpCode::Swap);
                    }
                } else {
                    self.load_name(&id.name);
                    if optional {
                        self.emit_optional_check();
                    }
                    self.emit_op(OpCode::Undefined);
                }
            }
            other => {
                self.compile_expression(other)?;
                if optional {
                    self.emit_optional_check();
                }
                self.emit_op(OpCode::Undefined);
            }
        }
        Ok(())
    }

    /// Pushes call arguments. Returns the count, or `None` when they were
    /// collected into an array because of a spread.
    fn compile_arguments(&mut self, arguments: &'a [Argument]) -> CompileResult<Option<u32>> {
        let spread = arguments.iter().any(|a| matches!(a, Argument::Spread(_)));
        if spread {
            self.emit_op(OpCode::NewArray);
        }
        for argument in arguments {
            match argument {
                Argument::Expression(expression) => {
                    self.compile_expression(expression)?;
                    if spread {
                        self.emit_op(OpCode::ArrayPush);
                    }
                }
                Argument::Spread(expression) => {
                    self.compile_expression(expression)?;
                    self.emit_op(OpCode::ArraySpread);
                }
            }
        }
        Ok(if spread { None } else { Some(arguments.len() as u32) })
    }

    fn compile_call(&mut self, call: &'a CallExpression) -> CompileResult<()> {
        self.compile_callee(&call.callee, call.optional)?;
        let direct_eval = matches!(
            call.callee.as_ref(),
            Expression::Identifier(Identifier { name, .. }) if name == "eval"
        );
        let count = self.compile_arguments(&call.arguments)?;
        self.mark(call.span.start);
        match count {
            Some(count) if direct_eval => self.emit_with(OpCode::CallEval, Operand::ArgCount(count)),
            Some(count) => self.emit_with(OpCode::Call, Operand::ArgCount(count)),
            None => self.emit_op(OpCode::CallSpread),
        };
        Ok(())
    }

    // ========================================================================
    // Generators
    // ========================================================================

    fn compile_yield(&mut self, expression: &'a YieldExpression) -> CompileResult<()> {
        match &expression.argument {
            Some(argument) => self.compile_expression(argument)?,
            None => {
                self.emit_op(OpCode::Undefined);
            }
        }
        if !expression.delegate {
            self.emit_op(OpCode::Yield);
            return Ok(());
        }

        // iterator next received
        self.emit_op(OpCode::GetIterator);
        self.emit_op(OpCode::Undefined);
        let top = self.ip();
        let done = self.emit_jump(OpCode::DelegateStep);
        self.emit_op(OpCode::YieldRaw);
        self.emit_loop(OpCode::Jump, top);
        self.patch(done);
        self.emit_op(OpCode::Rot3);
        self.emit_op(OpCode::Pop);
        self.emit_op(OpCode::Pop);
        Ok(())
    }
}

fn binary_opcode(operator: BinaryOperator) -> OpCode {
    match operator {
        BinaryOperator::Add => OpCode::Add,
        BinaryOperator::Subtract => OpCode::Sub,
        BinaryOperator::Multiply => OpCode::Mul,
        BinaryOperator::Divide => OpCode::Div,
        BinaryOperator::Modulo => OpCode::Mod,
        BinaryOperator::Exponent => OpCode::Exp,
        BinaryOperator::Equal => OpCode::Eq,
        BinaryOperator::NotEqual => OpCode::Ne,
        BinaryOperator::StrictEqual => OpCode::StrictEq,
        BinaryOperator::StrictNotEqual => OpCode::StrictNe,
        BinaryOperator::LessThan => OpCode::Lt,
        BinaryOperator::LessThanEqual => OpCode::Le,
        BinaryOperator::GreaterThan => OpCode::Gt,
        BinaryOperator::GreaterThanEqual => OpCode::Ge,
        BinaryOperator::LeftShift => OpCode::Shl,
        BinaryOperator::RightShift => OpCode::Shr,
        BinaryOperator::UnsignedRightShift => OpCode::UShr,
        BinaryOperator::BitwiseAnd => OpCode::BitAnd,
        BinaryOperator::BitwiseOr => OpCode::BitOr,
        BinaryOperator::BitwiseXor => OpCode::BitXor,
        BinaryOperator::In => OpCode::In,
        BinaryOperator::Instanceof => OpCode::InstanceOf,
    }
}

/// Jump taken when the left operand decides the result.
fn short_circuit_opcode(operator: LogicalOperator) -> OpCode {
    match operator {
        LogicalOperator::And => OpCode::JumpIfFalseKeep,
        LogicalOperator::Or => OpCode::JumpIfTrueKeep,
        LogicalOperator::Nullish => OpCode::JumpIfNotNullishKeep,
    }
}
