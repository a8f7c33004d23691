//! Destructuring patterns.
//!
//! Binding patterns (declarations, parameters, catch clauses) are parsed
//! directly. Assignment patterns are first parsed as object or array
//! literals and converted once the `=` is seen, with stricter target rules:
//! bindings accept only identifiers, assignments also accept member
//! expressions.

use crate::ast::*;
use crate::error::CompileErrorKind;
use crate::lexer::{Span, TokenKind};

use super::parser::{ParseResult, Parser};

impl Parser<'_> {
    /// Parses an identifier, object pattern or array pattern.
    pub(super) fn parse_binding_target(&mut self) -> ParseResult<Pattern> {
        self.nested(Self::parse_binding_target_kind)
    }

    fn parse_binding_target_kind(&mut self) -> ParseResult<Pattern> {
        match self.current.kind {
            TokenKind::LeftBracket => self.parse_array_binding(),
            TokenKind::LeftBrace => self.parse_object_binding(),
            _ => Ok(Pattern::Identifier(self.parse_binding_identifier()?)),
        }
    }

    /// Parses a binding target with an optional `= default`.
    pub(super) fn parse_binding_element(&mut self) -> ParseResult<Pattern> {
        let target = self.parse_binding_target()?;
        if self.eat(&TokenKind::Equal)? {
            let allow_in = std::mem::replace(&mut self.allow_in, true);
            let default = self.parse_assignment();
            self.allow_in = allow_in;
            return Ok(Pattern::Assignment(Box::new(AssignmentPattern {
                target,
                default: default?,
            })));
        }
        Ok(target)
    }

    fn parse_array_binding(&mut self) -> ParseResult<Pattern> {
        self.expect(&TokenKind::LeftBracket)?;
        let mut elements = Vec::new();
        let mut rest = None;
        while !self.check(&TokenKind::RightBracket) {
            if self.eat(&TokenKind::Comma)? {
                elements.push(None);
                continue;
            }
            if self.eat(&TokenKind::Ellipsis)? {
                rest = Some(Box::new(self.parse_binding_target()?));
                if !self.check(&TokenKind::RightBracket) {
                    return Err(self.error_at(self.current.span, "Rest element must be last element"));
                }
                break;
            }
            elements.push(Some(self.parse_binding_element()?));
            if !self.check(&TokenKind::RightBracket) {
                self.expect(&TokenKind::Comma)?;
            }
        }
        self.expect(&TokenKind::RightBracket)?;
        Ok(Pattern::Array(ArrayPattern { elements, rest }))
    }

    fn parse_object_binding(&mut self) -> ParseResult<Pattern> {
        self.expect(&TokenKind::LeftBrace)?;
        let mut properties = Vec::new();
        let mut rest = None;
        while !self.check(&TokenKind::RightBrace) {
            if self.eat(&TokenKind::Ellipsis)? {
                rest = Some(Box::new(Pattern::Identifier(self.parse_binding_identifier()?)));
                if !self.check(&TokenKind::RightBrace) {
                    return Err(self.error_at(self.current.span, "Rest element must be last element"));
                }
                break;
            }
            let key_token = self.current.clone();
            let key = self.parse_property_name()?;
            let value = if self.eat(&TokenKind::Colon)? {
                self.parse_binding_element()?
            } else {
                let name = match key_token.kind {
                    TokenKind::Identifier(name) => name,
                    TokenKind::Let if !self.function.strict => "let".to_string(),
                    _ => return Err(self.error_at(key_token.span, "Unexpected token in object pattern")),
                };
                self.check_binding_name(&name, key_token.span)?;
                let target = Pattern::Identifier(Identifier {
                    name,
                    span: key_token.span,
                });
                if self.eat(&TokenKind::Equal)? {
                    let default = self.parse_assignment_in_pattern()?;
                    Pattern::Assignment(Box::new(AssignmentPattern { target, default }))
                } else {
                    target
                }
            };
            properties.push(PatternProperty { key, value });
            if !self.check(&TokenKind::RightBrace) {
                self.expect(&TokenKind::Comma)?;
            }
        }
        self.expect(&TokenKind::RightBrace)?;
        Ok(Pattern::Object(ObjectPattern { properties, rest }))
    }

    fn parse_assignment_in_pattern(&mut self) -> ParseResult<Expression> {
        let allow_in = std::mem::replace(&mut self.allow_in, true);
        let default = self.parse_assignment();
        self.allow_in = allow_in;
        default
    }

    fn invalid_target(&self, span: Span) -> crate::error::CompileError {
        self.error_kind_at(
            CompileErrorKind::Reference,
            span,
            "Invalid left-hand side in assignment",
        )
    }

    /// Converts the left side of a compound or logical assignment.
    pub(super) fn simple_assignment_target(
        &self,
        expression: Expression,
        span: Span,
    ) -> ParseResult<Pattern> {
        match expression.unparenthesized() {
            Expression::Identifier(id) => {
                self.check_assignable_name(id)?;
                Ok(Pattern::Identifier(id.clone()))
            }
            Expression::Member(_) => Ok(Pattern::Member(Box::new(strip_parens(expression)))),
            _ => Err(self.invalid_target(span)),
        }
    }

    /// Reinterprets an expression as the target of `=`, `for-in` or `for-of`.
    pub(super) fn expression_to_pattern(&self, expression: Expression, span: Span) -> ParseResult<Pattern> {
        match expression {
            Expression::Identifier(id) => {
                self.check_assignable_name(&id)?;
                Ok(Pattern::Identifier(id))
            }
            Expression::Member(_) => Ok(Pattern::Member(Box::new(expression))),
            Expression::Parenthesized(_) => match expression.unparenthesized() {
                Expression::Identifier(_) | Expression::Member(_) => {
                    self.simple_assignment_target(expression, span)
                }
                _ => Err(self.invalid_target(span)),
            },
            Expression::Array(array) => self.array_to_pattern(array, span),
            Expression::Object(object) => self.object_to_pattern(object, span),
            _ => Err(self.invalid_target(span)),
        }
    }

    /// A target nested inside an array or object assignment pattern.
    fn nested_target(&self, expression: Expression, span: Span) -> ParseResult<Pattern> {
        let valid = match &expression {
            Expression::Array(_) | Expression::Object(_) => true,
            other => matches!(other.unparenthesized(), Expression::Identifier(_) | Expression::Member(_)),
        };
        if !valid {
            return Err(self.error_at(span, "Invalid destructuring assignment target"));
        }
        self.expression_to_pattern(expression, span)
    }

    /// An element of an assignment pattern, which may carry a default.
    fn element_to_pattern(&self, expression: Expression, span: Span) -> ParseResult<Pattern> {
        match expression {
            Expression::Assignment(AssignmentExpression {
                operator: AssignmentOperator::Assign,
                target,
                value,
                ..
            }) => Ok(Pattern::Assignment(Box::new(AssignmentPattern {
                target: *target,
                default: *value,
            }))),
            other => self.nested_target(other, span),
        }
    }

    fn array_to_pattern(&self, array: ArrayExpression, span: Span) -> ParseResult<Pattern> {
        let mut elements = Vec::new();
        let mut rest = None;
        let count = array.elements.len();
        for (index, element) in array.elements.into_iter().enumerate() {
            match element {
                ArrayElement::Hole => elements.push(None),
                ArrayElement::Expression(expression) => {
                    elements.push(Some(self.element_to_pattern(expression, span)?))
                }
                ArrayElement::Spread(expression) => {
                    if index + 1 != count || matches!(expression, Expression::Assignment(_)) {
                        return Err(self.error_at(span, "Rest element must be last element"));
                    }
                    rest = Some(Box::new(self.nested_target(expression, span)?));
                }
            }
        }
        Ok(Pattern::Array(ArrayPattern { elements, rest }))
    }

    fn object_to_pattern(&self, object: ObjectExpression, span: Span) -> ParseResult<Pattern> {
        let mut properties = Vec::new();
        let mut rest = None;
        let count = object.properties.len();
        for (index, property) in object.properties.into_iter().enumerate() {
            match property {
                ObjectProperty::KeyValue { key, value, .. } => properties.push(PatternProperty {
                    key,
                    value: self.element_to_pattern(value, span)?,
                }),
                ObjectProperty::Proto(value) => properties.push(PatternProperty {
                    key: PropertyName::Named("__proto__".to_string()),
                    value: self.element_to_pattern(value, span)?,
                }),
                ObjectProperty::CoverInitialized { name, default } => {
                    self.check_assignable_name(&name)?;
                    properties.push(PatternProperty {
                        key: PropertyName::Named(name.name.clone()),
                        value: Pattern::Assignment(Box::new(AssignmentPattern {
                            target: Pattern::Identifier(name),
                            default,
                        })),
                    });
                }
                ObjectProperty::Spread(expression) => {
                    if index + 1 != count {
                        return Err(self.error_at(span, "Rest element must be last element"));
                    }
                    if !matches!(expression, Expression::Identifier(_) | Expression::Member(_)) {
                        return Err(self.error_at(span, "Invalid destructuring assignment target"));
                    }
                    rest = Some(Box::new(self.expression_to_pattern(expression, span)?));
                }
                ObjectProperty::Getter { .. } | ObjectProperty::Setter { .. } => {
                    return Err(self.error_at(span, "Invalid destructuring assignment target"));
                }
            }
        }
        Ok(Pattern::Object(ObjectPattern { properties, rest }))
    }
}

fn strip_parens(expression: Expression) -> Expression {
    match expression {
        Expression::Parenthesized(inner) => strip_parens(*inner),
        other => other,
    }
}

#[cfg(test)]
mod tests {
    use crate::ast::*;
    use crate::error::CompileErrorKind;
    use crate::parser::Parser;

    fn declarator(src: &str) -> Pattern {
        let program = Parser::new(src).parse_program().unwrap();
        match program.body.into_iter().next() {
            Some(Statement::VariableDeclaration(mut decl)) => decl.declarations.remove(0).id,
            other => panic!("unexpected {:?}", other),
        }
    }

    #[test]
    fn test_object_binding_pattern() {
        match declarator("let { a, b: c, d = 1, ...rest } = o;") {
            Pattern::Object(object) => {
                assert_eq!(object.properties.len(), 3);
                assert!(matches!(object.properties[1].value, Pattern::Identifier(ref id) if id.name == "c"));
                assert!(matches!(object.properties[2].value, Pattern::Assignment(_)));
                assert!(object.rest.is_some());
            }
            other => panic!("unexpected {:?}", other),
        }
    }

    #[test]
    fn test_array_binding_pattern() {
        match declarator("var [, a, [b], ...c] = arr;") {
            Pattern::Array(array) => {
                assert_eq!(array.elements.len(), 3);
                assert!(array.elements[0].is_none());
                assert!(matches!(array.elements[2], Some(Pattern::Array(_))));
                assert!(array.rest.is_some());
            }
            other => panic!("unexpected {:?}", other),
        }
    }

    #[test]
    fn test_binding_rejects_member_targets() {
        assert!(Parser::new("let { a: b.c } = o;").parse_program().is_err());
        assert!(Parser::new("function f([a.b]) {}").parse_program().is_err());
    }

    #[test]
    fn test_rest_must_be_last() {
        assert!(Parser::new("let [...a, b] = c;").parse_program().is_err());
        assert!(Parser::new("[...a, b] = c;").parse_program().is_err());
        assert!(Parser::new("({...a, b} = c);").parse_program().is_err());
    }

    #[test]
    fn test_assignment_pattern_member_targets() {
        Parser::new("[o.a, o['b']] = [1, 2]; ({ x: o.c } = p);").parse_program().unwrap();
    }

    #[test]
    fn test_parenthesized_pattern_is_invalid() {
        assert!(Parser::new("({a}) = o;").parse_program().is_err());
        Parser::new("(a) = 1; (o.p) = 2;").parse_program().unwrap();
    }

    #[test]
    fn test_invalid_nested_target_is_syntax_error() {
        for src in ["({a: 1} = 1);", "[1] = [];", "[a, ...f()] = c;", "({...{}} = o);", "({ get x() {} } = o);"] {
            let err = Parser::new(src).parse_program().unwrap_err();
            assert_eq!(err.kind, CompileErrorKind::Syntax, "{src}");
        }
        let err = Parser::new("1 = 2;").parse_program().unwrap_err();
        assert_eq!(err.kind, CompileErrorKind::Reference);
        Parser::new("({a: (b), c: [d], e: {f}} = o);").parse_program().unwrap();
    }

    #[test]
    fn test_strict_eval_assignment() {
        assert!(Parser::new("'use strict'; eval = 1;").parse_program().is_err());
        assert!(Parser::new("'use strict'; [arguments] = [];").parse_program().is_err());
        Parser::new("eval = 1;").parse_program().unwrap();
    }
}
