//! Expression parsing.
//!
//! Binary operators use precedence climbing (`parse_binary`); everything
//! above and below it is plain recursive descent.
//!
//! ## Precedence Table (lowest to highest)
//!
//! | Precedence | Operators | Method |
//! |------------|-----------|--------|
//! | - | `,` | `parse_expression` |
//! | - | `=` `+=` `&&=` ... `=>` `yield` | `parse_assignment` |
//! | - | `?:` | `parse_conditional` |
//! | 1 | `??` | `parse_binary` |
//! | 2 | `\|\|` | `parse_binary` |
//! | 3 | `&&` | `parse_binary` |
//! | 4 | `\|` | `parse_binary` |
//! | 5 | `^` | `parse_binary` |
//! | 6 | `&` | `parse_binary` |
//! | 7 | `==` `!=` `===` `!==` | `parse_binary` |
//! | 8 | `<` `>` `<=` `>=` `in` `instanceof` | `parse_binary` |
//! | 9 | `<<` `>>` `>>>` | `parse_binary` |
//! | 10 | `+` `-` | `parse_binary` |
//! | 11 | `*` `/` `%` | `parse_binary` |
//! | 12 | `**` (right associative) | `parse_binary` |
//! | - | `!` `~` `+` `-` `typeof` `void` `delete` `++x` | `parse_unary` |
//! | - | `x++` `x--` | `parse_postfix` |
//! | - | `.` `?.` `[]` `()` tagged templates | `parse_call_tail` |
//! | - | `new` | `parse_new_expression` |
//! | - | literals, identifiers, `( )` | `parse_primary` |

use crate::ast::*;
use crate::error::CompileErrorKind;
use crate::lexer::{Span, TokenKind};
use crate::runtime::value::number_to_string;

use super::parser::{ParseResult, Parser, is_strict_reserved};

/// A binary-level operator, short-circuiting or not.
#[derive(Debug, Clone, Copy)]
enum BinaryToken {
    Binary(BinaryOperator),
    Logical(LogicalOperator),
}

impl Parser<'_> {
    /// Parses a comma-separated expression.
    pub fn parse_expression(&mut self) -> ParseResult<Expression> {
        let first = self.parse_assignment()?;
        if !self.check(&TokenKind::Comma) {
            return Ok(first);
        }
        let mut expressions = vec![first];
        while self.eat(&TokenKind::Comma)? {
            expressions.push(self.parse_assignment()?);
        }
        Ok(Expression::Sequence(expressions))
    }

    /// Parses an AssignmentExpression, including arrows and `yield`.
    pub(super) fn parse_assignment(&mut self) -> ParseResult<Expression> {
        self.nested(Self::parse_assignment_expression)
    }

    fn parse_assignment_expression(&mut self) -> ParseResult<Expression> {
        if self.function.generator && self.check_identifier("yield") {
            return self.parse_yield();
        }
        match &self.current.kind {
            TokenKind::Identifier(_) | TokenKind::Let => {
                let next = self.peek()?;
                if next.kind == TokenKind::Arrow && !next.newline_before {
                    return self.parse_arrow_function();
                }
                if self.check_identifier("async")
                    && !next.newline_before
                    && matches!(next.kind, TokenKind::Identifier(_) | TokenKind::LeftParen | TokenKind::Function)
                    && (next.kind != TokenKind::LeftParen || self.async_arrow_ahead()?)
                {
                    return Err(self.error_at(self.current.span, "Async functions are not supported"));
                }
            }
            TokenKind::LeftParen if self.is_arrow_ahead() => return self.parse_arrow_function(),
            _ => {}
        }

        let start = self.current.span;
        let left = self.parse_conditional()?;
        let operator = match self.current.kind {
            TokenKind::Equal => AssignmentOperator::Assign,
            TokenKind::PlusEqual => AssignmentOperator::Compound(BinaryOperator::Add),
            TokenKind::MinusEqual => AssignmentOperator::Compound(BinaryOperator::Subtract),
            TokenKind::StarEqual => AssignmentOperator::Compound(BinaryOperator::Multiply),
            TokenKind::SlashEqual => AssignmentOperator::Compound(BinaryOperator::Divide),
            TokenKind::PercentEqual => AssignmentOperator::Compound(BinaryOperator::Modulo),
            TokenKind::StarStarEqual => AssignmentOperator::Compound(BinaryOperator::Exponent),
            TokenKind::LeftShiftEqual => AssignmentOperator::Compound(BinaryOperator::LeftShift),
            TokenKind::RightShiftEqual => AssignmentOperator::Compound(BinaryOperator::RightShift),
            TokenKind::UnsignedRightShiftEqual => {
                AssignmentOperator::Compound(BinaryOperator::UnsignedRightShift)
            }
            TokenKind::AmpersandEqual => AssignmentOperator::Compound(BinaryOperator::BitwiseAnd),
            TokenKind::PipeEqual => AssignmentOperator::Compound(BinaryOperator::BitwiseOr),
            TokenKind::CaretEqual => AssignmentOperator::Compound(BinaryOperator::BitwiseXor),
            TokenKind::AmpersandAmpersandEqual => AssignmentOperator::Logical(LogicalOperator::And),
            TokenKind::PipePipeEqual => AssignmentOperator::Logical(LogicalOperator::Or),
            TokenKind::QuestionQuestionEqual => AssignmentOperator::Logical(LogicalOperator::Nullish),
            _ => return Ok(left),
        };
        let target = if operator == AssignmentOperator::Assign {
            self.expression_to_pattern(left, start)?
        } else {
            self.simple_assignment_target(left, start)?
        };
        self.advance()?;
        let value = self.parse_assignment()?;
        Ok(Expression::Assignment(AssignmentExpression {
            operator,
            target: Box::new(target),
            value: Box::new(value),
            span: Span::new(start.start, self.previous_end),
        }))
    }

    /// `async (a) => ...` is detected only to report it as unsupported.
    fn async_arrow_ahead(&mut self) -> ParseResult<bool> {
        let saved_scanner = self.scanner.clone();
        let saved_current = self.current.clone();
        let saved_end = self.previous_end;
        self.advance()?;
        let is_arrow = self.is_arrow_ahead();
        self.scanner = saved_scanner;
        self.current = saved_current;
        self.previous_end = saved_end;
        Ok(is_arrow)
    }

    fn parse_yield(&mut self) -> ParseResult<Expression> {
        self.advance()?;
        if self.current.newline_before {
            return Ok(Expression::Yield(YieldExpression {
                argument: None,
                delegate: false,
            }));
        }
        let delegate = self.eat(&TokenKind::Star)?;
        let has_argument = delegate
            || !matches!(
                self.current.kind,
                TokenKind::RightParen
                    | TokenKind::RightBracket
                    | TokenKind::RightBrace
                    | TokenKind::Comma
                    | TokenKind::Semicolon
                    | TokenKind::Colon
                    | TokenKind::Question
                    | TokenKind::In
                    | TokenKind::Eof
            );
        let argument = if has_argument {
            Some(Box::new(self.parse_assignment()?))
        } else {
            None
        };
        Ok(Expression::Yield(YieldExpression { argument, delegate }))
    }

    fn parse_conditional(&mut self) -> ParseResult<Expression> {
        let test = self.parse_binary(1)?;
        if !self.eat(&TokenKind::Question)? {
            return Ok(test);
        }
        let allow_in = std::mem::replace(&mut self.allow_in, true);
        let consequent = self.parse_assignment();
        self.allow_in = allow_in;
        let consequent = consequent?;
        self.expect(&TokenKind::Colon)?;
        let alternate = self.parse_assignment()?;
        Ok(Expression::Conditional(ConditionalExpression {
            test: Box::new(test),
            consequent: Box::new(consequent),
            alternate: Box::new(alternate),
        }))
    }

    /// The binary operator at `current` and its precedence.
    fn binary_operator(&self) -> Option<(BinaryToken, u8)> {
        use BinaryOperator as B;
        use BinaryToken::{Binary, Logical};
        let op = match self.current.kind {
            TokenKind::QuestionQuestion => (Logical(LogicalOperator::Nullish), 1),
            TokenKind::PipePipe => (Logical(LogicalOperator::Or), 2),
            TokenKind::AmpersandAmpersand => (Logical(LogicalOperator::And), 3),
            TokenKind::Pipe => (Binary(B::BitwiseOr), 4),
            TokenKind::Caret => (Binary(B::BitwiseXor), 5),
            TokenKind::Ampersand => (Binary(B::BitwiseAnd), 6),
            TokenKind::EqualEqual => (Binary(B::Equal), 7),
            TokenKind::NotEqual => (Binary(B::NotEqual), 7),
            TokenKind::StrictEqual => (Binary(B::StrictEqual), 7),
            TokenKind::StrictNotEqual => (Binary(B::StrictNotEqual), 7),
            TokenKind::LessThan => (Binary(B::LessThan), 8),
            TokenKind::GreaterThan => (Binary(B::GreaterThan), 8),
            TokenKind::LessThanEqual => (Binary(B::LessThanEqual), 8),
            TokenKind::GreaterThanEqual => (Binary(B::GreaterThanEqual), 8),
            TokenKind::Instanceof => (Binary(B::Instanceof), 8),
            TokenKind::In if self.allow_in => (Binary(B::In), 8),
            TokenKind::LeftShift => (Binary(B::LeftShift), 9),
            TokenKind::RightShift => (Binary(B::RightShift), 9),
            TokenKind::UnsignedRightShift => (Binary(B::UnsignedRightShift), 9),
            TokenKind::Plus => (Binary(B::Add), 10),
            TokenKind::Minus => (Binary(B::Subtract), 10),
            TokenKind::Star => (Binary(B::Multiply), 11),
            TokenKind::Slash => (Binary(B::Divide), 11),
            TokenKind::Percent => (Binary(B::Modulo), 11),
            TokenKind::StarStar => (Binary(B::Exponent), 12),
            _ => return None,
        };
        Some(op)
    }

    /// Precedence climbing over the binary and logical operators.
    fn parse_binary(&mut self, min_precedence: u8) -> ParseResult<Expression> {
        self.nested(|parser| parser.parse_binary_operators(min_precedence))
    }

    fn parse_binary_operators(&mut self, min_precedence: u8) -> ParseResult<Expression> {
        let mut left = self.parse_unary()?;
        while let Some((operator, precedence)) = self.binary_operator() {
            if precedence < min_precedence {
                break;
            }
            let operator_span = self.current.span;
            let exponent = matches!(operator, BinaryToken::Binary(BinaryOperator::Exponent));
            if exponent && matches!(left, Expression::Unary(_)) {
                return Err(self.error_at(
                    operator_span,
                    "Unary operator used immediately before exponentiation expression. Parenthesis must be used to disambiguate operator precedence",
                ));
            }
            self.advance()?;
            self.deepen()?;
            let next_min = if exponent { precedence } else { precedence + 1 };
            let right = self.parse_binary(next_min)?;
            left = match operator {
                BinaryToken::Binary(operator) => Expression::Binary(BinaryExpression {
                    operator,
                    left: Box::new(left),
                    right: Box::new(right),
                }),
                BinaryToken::Logical(operator) => {
                    let mixes = |e: &Expression| match e {
                        Expression::Logical(inner) => {
                            (inner.operator == LogicalOperator::Nullish)
                                != (operator == LogicalOperator::Nullish)
                        }
                        _ => false,
                    };
                    if mixes(&left) || mixes(&right) {
                        return Err(self.error_at(operator_span, "Unexpected token"));
                    }
                    Expression::Logical(LogicalExpression {
                        operator,
                        left: Box::new(left),
                        right: Box::new(right),
                    })
                }
            };
        }
        Ok(left)
    }

    fn parse_unary(&mut self) -> ParseResult<Expression> {
        self.nested(Self::parse_unary_expression)
    }

    fn parse_unary_expression(&mut self) -> ParseResult<Expression> {
        let start = self.current.span;
        let operator = match self.current.kind {
            TokenKind::Minus => UnaryOperator::Minus,
            TokenKind::Plus => UnaryOperator::Plus,
            TokenKind::Bang => UnaryOperator::Not,
            TokenKind::Tilde => UnaryOperator::BitwiseNot,
            TokenKind::Typeof => UnaryOperator::Typeof,
            TokenKind::Void => UnaryOperator::Void,
            TokenKind::Delete => UnaryOperator::Delete,
            TokenKind::PlusPlus | TokenKind::MinusMinus => {
                let operator = if self.advance()?.kind == TokenKind::PlusPlus {
                    UpdateOperator::Increment
                } else {
                    UpdateOperator::Decrement
                };
                let operand_span = self.current.span;
                let argument = self.parse_unary()?;
                let argument = self.check_update_target(argument, operand_span)?;
                return Ok(Expression::Update(UpdateExpression {
                    operator,
                    prefix: true,
                    argument: Box::new(argument),
                    span: Span::new(start.start, self.previous_end),
                }));
            }
            _ => return self.parse_postfix(),
        };
        self.advance()?;
        let argument = self.parse_unary()?;
        if operator == UnaryOperator::Delete
            && self.function.strict
            && matches!(argument.unparenthesized(), Expression::Identifier(_))
        {
            return Err(self.error_at(start, "Delete of an unqualified identifier in strict mode."));
        }
        Ok(Expression::Unary(UnaryExpression {
            operator,
            argument: Box::new(argument),
            span: Span::new(start.start, self.previous_end),
        }))
    }

    fn parse_postfix(&mut self) -> ParseResult<Expression> {
        let start = self.current.span;
        let expression = self.parse_left_hand_side()?;
        let operator = match self.current.kind {
            TokenKind::PlusPlus if !self.current.newline_before => UpdateOperator::Increment,
            TokenKind::MinusMinus if !self.current.newline_before => UpdateOperator::Decrement,
            _ => return Ok(expression),
        };
        let argument = self.check_update_target(expression, start)?;
        self.advance()?;
        Ok(Expression::Update(UpdateExpression {
            operator,
            prefix: false,
            argument: Box::new(argument),
            span: Span::new(start.start, self.previous_end),
        }))
    }

    fn check_update_target(&self, expression: Expression, span: Span) -> ParseResult<Expression> {
        match expression.unparenthesized() {
            Expression::Identifier(id) => {
                self.check_assignable_name(id)?;
                Ok(expression)
            }
            Expression::Member(_) => Ok(expression),
            _ => Err(self.error_kind_at(
                CompileErrorKind::Reference,
                span,
                "Invalid left-hand side expression in update operation",
            )),
        }
    }

    pub(super) fn check_assignable_name(&self, id: &Identifier) -> ParseResult<()> {
        if self.function.strict && (id.name == "eval" || id.name == "arguments") {
            return Err(self.error_at(id.span, "Unexpected eval or arguments in strict mode"));
        }
        Ok(())
    }

    /// Parses member accesses, calls and tagged templates.
    fn parse_left_hand_side(&mut self) -> ParseResult<Expression> {
        let start = self.current.span.start;
        let expression = if self.check(&TokenKind::New) {
            self.parse_new_expression()?
        } else {
            self.parse_primary()?
        };
        self.parse_call_tail(expression, start, true)
    }

    fn parse_call_tail(
        &mut self,
        mut expression: Expression,
        start: usize,
        allow_call: bool,
    ) -> ParseResult<Expression> {
        let mut in_chain = false;
        loop {
            let wraps = match &self.current.kind {
                TokenKind::Dot | TokenKind::LeftBracket | TokenKind::Template { .. } => true,
                TokenKind::LeftParen | TokenKind::QuestionDot => allow_call,
                _ => false,
            };
            if wraps {
                self.deepen()?;
            }
            match &self.current.kind {
                TokenKind::Dot => {
                    self.advance()?;
                    let property = self.parse_identifier_name()?;
                    expression = Expression::Member(MemberExpression {
                        object: Box::new(expression),
                        property: MemberProperty::Named(property),
                        optional: false,
                        span: Span::new(start, self.previous_end),
                    });
                }
                TokenKind::LeftBracket => {
                    self.advance()?;
                    let property = self.parse_expression_allow_in()?;
                    self.expect(&TokenKind::RightBracket)?;
                    expression = Expression::Member(MemberExpression {
                        object: Box::new(expression),
                        property: MemberProperty::Computed(Box::new(property)),
                        optional: false,
                        span: Span::new(start, self.previous_end),
                    });
                }
                TokenKind::Template { .. } => {
                    if in_chain {
                        return Err(self.error_at(
                            self.current.span,
                            "Invalid tagged template on optional chain",
                        ));
                    }
                    let quasi = self.parse_template_literal(true)?;
                    expression = Expression::TaggedTemplate(TaggedTemplateExpression {
                        tag: Box::new(expression),
                        quasi,
                        span: Span::new(start, self.previous_end),
                    });
                }
                TokenKind::LeftParen if allow_call => {
                    let arguments = self.parse_arguments()?;
                    expression = Expression::Call(CallExpression {
                        callee: Box::new(expression),
                        arguments,
                        optional: false,
                        span: Span::new(start, self.previous_end),
                    });
                }
                TokenKind::QuestionDot if allow_call => {
                    self.advance()?;
                    in_chain = true;
                    expression = match &self.current.kind {
                        TokenKind::LeftParen => {
                            let arguments = self.parse_arguments()?;
                            Expression::Call(CallExpression {
                                callee: Box::new(expression),
                                arguments,
                                optional: true,
                                span: Span::new(start, self.previous_end),
                            })
                        }
                        TokenKind::LeftBracket => {
                            self.advance()?;
                            let property = self.parse_expression_allow_in()?;
                            self.expect(&TokenKind::RightBracket)?;
                            Expression::Member(MemberExpression {
                                object: Box::new(expression),
                                property: MemberProperty::Computed(Box::new(property)),
                                optional: true,
                                span: Span::new(start, self.previous_end),
                            })
                        }
                        _ => {
                            let property = self.parse_identifier_name()?;
                            Expression::Member(MemberExpression {
                                object: Box::new(expression),
                                property: MemberProperty::Named(property),
                                optional: true,
                                span: Span::new(start, self.previous_end),
                            })
                        }
                    };
                }
                _ => break,
            }
        }
        if in_chain {
            expression = Expression::OptionalChain(Box::new(expression));
        }
        Ok(expression)
    }

    fn parse_expression_allow_in(&mut self) -> ParseResult<Expression> {
        let allow_in = std::mem::replace(&mut self.allow_in, true);
        let expression = self.parse_expression();
        self.allow_in = allow_in;
        expression
    }

    /// Parses `new Callee(args)`, `new Callee`, or `new.target`.
    fn parse_new_expression(&mut self) -> ParseResult<Expression> {
        self.nested(Self::parse_new_callee)
    }

    fn parse_new_callee(&mut self) -> ParseResult<Expression> {
        let start = self.expect(&TokenKind::New)?.span;
        if self.eat(&TokenKind::Dot)? {
            if !self.check_identifier("target") {
                return Err(self.unexpected());
            }
            if !self.function.new_target {
                return Err(self.error_at(start, "new.target expression is not allowed here"));
            }
            self.advance()?;
            return Ok(Expression::NewTarget);
        }
        let callee_start = self.current.span.start;
        let callee = if self.check(&TokenKind::New) {
            self.parse_new_expression()?
        } else {
            self.parse_primary()?
        };
        if matches!(self.current.kind, TokenKind::QuestionDot) {
            return Err(self.error_at(self.current.span, "Invalid optional chain from new expression"));
        }
        let callee = self.parse_call_tail(callee, callee_start, false)?;
        let arguments = if self.check(&TokenKind::LeftParen) {
            self.parse_arguments()?
        } else {
            Vec::new()
        };
        Ok(Expression::New(NewExpression {
            callee: Box::new(callee),
            arguments,
            span: Span::new(start.start, self.previous_end),
        }))
    }

    fn parse_arguments(&mut self) -> ParseResult<Vec<Argument>> {
        self.expect(&TokenKind::LeftParen)?;
        let allow_in = std::mem::replace(&mut self.allow_in, true);
        let arguments = self.parse_argument_list();
        self.allow_in = allow_in;
        arguments
    }

    fn parse_argument_list(&mut self) -> ParseResult<Vec<Argument>> {
        let mut arguments = Vec::new();
        while !self.check(&TokenKind::RightParen) {
            if self.eat(&TokenKind::Ellipsis)? {
                arguments.push(Argument::Spread(self.parse_assignment()?));
            } else {
                arguments.push(Argument::Expression(self.parse_assignment()?));
            }
            if !self.check(&TokenKind::RightParen) {
                self.expect(&TokenKind::Comma)?;
            }
        }
        self.advance()?;
        Ok(arguments)
    }

    fn parse_primary(&mut self) -> ParseResult<Expression> {
        if self.current_octal && self.function.strict {
            return Err(self.error_at(
                self.current.span,
                "Octal literals are not allowed in strict mode.",
            ));
        }
        let span = self.current.span;
        match &self.current.kind {
            TokenKind::This => {
                self.advance()?;
                Ok(Expression::This)
            }
            TokenKind::Identifier(_) | TokenKind::Let => {
                let token = self.advance()?;
                let name = match token.kind {
                    TokenKind::Identifier(name) => name,
                    _ => "let".to_string(),
                };
                if self.function.strict && is_strict_reserved(&name) {
                    return Err(self.error_at(span, "Unexpected strict mode reserved word"));
                }
                Ok(Expression::Identifier(Identifier { name, span }))
            }
            TokenKind::Number(_)
            | TokenKind::BigInt(_)
            | TokenKind::String(_)
            | TokenKind::True
            | TokenKind::False
            | TokenKind::Null
            | TokenKind::RegExp { .. } => {
                let literal = match self.advance()?.kind {
                    TokenKind::Number(n) => Literal::Number(n),
                    TokenKind::BigInt(digits) => Literal::BigInt(digits),
                    TokenKind::String(s) => Literal::String(s),
                    TokenKind::True => Literal::Boolean(true),
                    TokenKind::False => Literal::Boolean(false),
                    TokenKind::RegExp { pattern, flags } => Literal::RegExp { pattern, flags },
                    _ => Literal::Null,
                };
                Ok(Expression::Literal(literal))
            }
            TokenKind::Slash | TokenKind::SlashEqual => {
                self.rescan_regexp()?;
                self.parse_primary()
            }
            TokenKind::Template { .. } => Ok(Expression::Template(self.parse_template_literal(false)?)),
            TokenKind::LeftBracket => self.parse_array_literal(),
            TokenKind::LeftBrace => self.parse_object_literal(),
            TokenKind::Function => {
                let function = self.parse_function(false)?;
                Ok(Expression::Function(Box::new(function)))
            }
            TokenKind::LeftParen => {
                self.advance()?;
                let expression = self.parse_expression_allow_in()?;
                self.expect(&TokenKind::RightParen)?;
                Ok(Expression::Parenthesized(Box::new(expression)))
            }
            TokenKind::Class => Err(self.error_at(span, "Classes are not supported")),
            TokenKind::Super => Err(self.error_at(span, "'super' keyword unexpected here")),
            TokenKind::Import => Err(self.error_at(span, "Cannot use import outside a module")),
            _ => Err(self.unexpected()),
        }
    }

    /// Parses a template whose first chunk is `current`.
    pub(super) fn parse_template_literal(&mut self, tagged: bool) -> ParseResult<TemplateLiteral> {
        let mut quasis = Vec::new();
        let mut expressions = Vec::new();
        loop {
            let token = self.advance()?;
            let TokenKind::Template { cooked, raw, tail } = token.kind else {
                return Err(self.error_at(token.span, "Expected template literal"));
            };
            if cooked.is_none() && !tagged {
                return Err(self.error_at(token.span, "Invalid escape sequence in template"));
            }
            quasis.push(TemplateElement { cooked, raw });
            if tail {
                break;
            }
            expressions.push(self.parse_expression_allow_in()?);
            self.rescan_template()?;
        }
        Ok(TemplateLiteral {
            quasis,
            expressions,
        })
    }

    fn parse_array_literal(&mut self) -> ParseResult<Expression> {
        self.expect(&TokenKind::LeftBracket)?;
        let allow_in = std::mem::replace(&mut self.allow_in, true);
        let elements = self.parse_array_elements();
        self.allow_in = allow_in;
        Ok(Expression::Array(ArrayExpression { elements: elements? }))
    }

    fn parse_array_elements(&mut self) -> ParseResult<Vec<ArrayElement>> {
        let mut elements = Vec::new();
        while !self.check(&TokenKind::RightBracket) {
            if self.eat(&TokenKind::Comma)? {
                elements.push(ArrayElement::Hole);
                continue;
            }
            if self.eat(&TokenKind::Ellipsis)? {
                elements.push(ArrayElement::Spread(self.parse_assignment()?));
            } else {
                elements.push(ArrayElement::Expression(self.parse_assignment()?));
            }
            if !self.check(&TokenKind::RightBracket) {
                self.expect(&TokenKind::Comma)?;
            }
        }
        self.advance()?;
        Ok(elements)
    }

    fn parse_object_literal(&mut self) -> ParseResult<Expression> {
        let start = self.expect(&TokenKind::LeftBrace)?.span.start;
        let allow_in = std::mem::replace(&mut self.allow_in, true);
        let properties = self.parse_object_properties();
        self.allow_in = allow_in;
        Ok(Expression::Object(ObjectExpression {
            properties: properties?,
            span: Span::new(start, self.previous_end),
        }))
    }

    fn parse_object_properties(&mut self) -> ParseResult<Vec<ObjectProperty>> {
        let mut properties = Vec::new();
        let mut has_proto = false;
        while !self.check(&TokenKind::RightBrace) {
            let property = self.parse_object_property()?;
            if let ObjectProperty::Proto(_) = property {
                if has_proto {
                    return Err(self.error_at(
                        Span::new(self.previous_end, self.previous_end),
                        "Duplicate __proto__ fields are not allowed in object literals",
                    ));
                }
                has_proto = true;
            }
            properties.push(property);
            if !self.check(&TokenKind::RightBrace) {
                self.expect(&TokenKind::Comma)?;
            }
        }
        self.advance()?;
        Ok(properties)
    }

    fn parse_object_property(&mut self) -> ParseResult<ObjectProperty> {
        let start = self.current.span.start;
        if self.eat(&TokenKind::Ellipsis)? {
            return Ok(ObjectProperty::Spread(self.parse_assignment()?));
        }
        if self.eat(&TokenKind::Star)? {
            let key = self.parse_property_name()?;
            let function = self.parse_function_rest(None, FunctionKind::Method, true, start)?;
            return Ok(ObjectProperty::KeyValue {
                key,
                value: Expression::Function(Box::new(function)),
                shorthand: false,
            });
        }
        if (self.check_identifier("get") || self.check_identifier("set"))
            && self.peek()?.kind.starts_property_name()
        {
            let is_getter = self.check_identifier("get");
            self.advance()?;
            let key = self.parse_property_name()?;
            let kind = if is_getter {
                FunctionKind::Getter
            } else {
                FunctionKind::Setter
            };
            let function = Box::new(self.parse_function_rest(None, kind, false, start)?);
            return Ok(if is_getter {
                ObjectProperty::Getter { key, function }
            } else {
                ObjectProperty::Setter { key, function }
            });
        }
        if self.check_identifier("async") && self.peek()?.kind.starts_property_name() {
            return Err(self.error_at(self.current.span, "Async functions are not supported"));
        }

        let key_token = self.current.clone();
        let key = self.parse_property_name()?;
        match self.current.kind {
            TokenKind::LeftParen => {
                let function = self.parse_function_rest(None, FunctionKind::Method, false, start)?;
                Ok(ObjectProperty::KeyValue {
                    key,
                    value: Expression::Function(Box::new(function)),
                    shorthand: false,
                })
            }
            TokenKind::Colon => {
                self.advance()?;
                let value = self.parse_assignment()?;
                let is_proto = matches!(&key, PropertyName::Named(name) if name == "__proto__")
                    && !matches!(key_token.kind, TokenKind::LeftBracket);
                Ok(if is_proto {
                    ObjectProperty::Proto(value)
                } else {
                    ObjectProperty::KeyValue {
                        key,
                        value,
                        shorthand: false,
                    }
                })
            }
            _ => {
                // Shorthand `{ a }` or cover-initialized `{ a = 1 }`.
                let name = match key_token.kind {
                    TokenKind::Identifier(name) => name,
                    TokenKind::Let if !self.function.strict => "let".to_string(),
                    _ => return Err(self.unexpected()),
                };
                if self.function.strict && is_strict_reserved(&name) {
                    return Err(self.error_at(key_token.span, "Unexpected strict mode reserved word"));
                }
                let id = Identifier {
                    name,
                    span: key_token.span,
                };
                if self.eat(&TokenKind::Equal)? {
                    let default = self.parse_assignment()?;
                    return Ok(ObjectProperty::CoverInitialized { name: id, default });
                }
                Ok(ObjectProperty::KeyValue {
                    key,
                    value: Expression::Identifier(id),
                    shorthand: true,
                })
            }
        }
    }

    /// Parses an object literal or pattern key.
    pub(super) fn parse_property_name(&mut self) -> ParseResult<PropertyName> {
        if self.current_octal && self.function.strict {
            return Err(self.error_at(
                self.current.span,
                "Octal literals are not allowed in strict mode.",
            ));
        }
        match &self.current.kind {
            TokenKind::LeftBracket => {
                self.advance()?;
                let key = self.parse_assignment_allow_in()?;
                self.expect(&TokenKind::RightBracket)?;
                Ok(PropertyName::Computed(Box::new(key)))
            }
            TokenKind::String(_) | TokenKind::Number(_) | TokenKind::BigInt(_) => {
                let name = match self.advance()?.kind {
                    TokenKind::String(s) => match s.to_std_string() {
                        Some(name) => name,
                        // A key holding a lone surrogate has no UTF-8 spelling
                        None => {
                            return Ok(PropertyName::Computed(Box::new(Expression::Literal(Literal::String(s)))));
                        }
                    },
                    TokenKind::Number(n) => number_to_string(n),
                    TokenKind::BigInt(digits) => digits,
                    _ => String::new(),
                };
                Ok(PropertyName::Named(name))
            }
            _ => Ok(PropertyName::Named(self.parse_identifier_name()?)),
        }
    }

    fn parse_assignment_allow_in(&mut self) -> ParseResult<Expression> {
        let allow_in = std::mem::replace(&mut self.allow_in, true);
        let expression = self.parse_assignment();
        self.allow_in = allow_in;
        expression
    }
}

impl TokenKind {
    /// Whether this token can begin a property name, used to tell
    /// `{ get x() {} }` from `{ get: 1 }` and `{ get() {} }`.
    fn starts_property_name(&self) -> bool {
        matches!(
            self,
            TokenKind::Identifier(_)
                | TokenKind::String(_)
                | TokenKind::Number(_)
                | TokenKind::BigInt(_)
                | TokenKind::LeftBracket
        ) || self.word().is_some()
    }
}
