use crate::{
    ast::ast::{NodeId, NodeKind, Operator},
    errors::errors::{Error, ErrorImpl},
    lexer::tokens::TokenKind,
    Span,
};

use super::{lookups::BindingPower, parser::Parser};

pub fn parse_expr(parser: &mut Parser, bp: BindingPower) -> Result<NodeId, Error> {
    // First parse NUD
    let token_kind = parser.current_token_kind();
    let nud = match parser.get_nud_lookup().get(&token_kind) {
        Some(nud) => *nud,
        None => {
            return Err(Error::new(
                ErrorImpl::UnexpectedToken {
                    token: parser.current_token().value.clone(),
                },
                parser.get_position(),
            ))
        }
    };

    let mut left = nud(parser)?;

    // While LED and current BP is less than BP of current token, continue parsing lhs
    while parser.current_binding_power() > bp {
        let token_kind = parser.current_token_kind();
        let led = match parser.get_led_lookup().get(&token_kind) {
            Some(led) => *led,
            None => {
                return Err(Error::new(
                    ErrorImpl::UnexpectedToken {
                        token: parser.current_token().value.clone(),
                    },
                    parser.get_position(),
                ))
            }
        };

        let led_bp = parser.current_binding_power();
        left = led(parser, left, led_bp)?;
    }

    Ok(left)
}

/// Parses an expression and wraps it in an `Expression` node, marking the
/// boundary between statement structure and value positions.
pub fn parse_wrapped_expr(parser: &mut Parser) -> Result<NodeId, Error> {
    let inner = parse_expr(parser, BindingPower::Default)?;
    let span = parser.span_of(inner).clone();

    Ok(parser.add_node(NodeKind::Expression, vec![inner], None, span))
}

pub fn parse_primary_expr(parser: &mut Parser) -> Result<NodeId, Error> {
    match parser.current_token_kind() {
        TokenKind::Number => {
            let token = parser.current_token();
            if token.value.parse::<i64>().is_err() {
                return Err(Error::new(
                    ErrorImpl::NumberParseError {
                        token: token.value.clone(),
                    },
                    token.span.start.clone(),
                ));
            }

            let token = parser.advance();
            Ok(parser.add_leaf(NodeKind::IntegerLiteral, token))
        }
        TokenKind::Identifier => {
            let token = parser.advance();
            Ok(parser.add_leaf(NodeKind::Identifier, token))
        }
        _ => Err(Error::new(
            ErrorImpl::UnexpectedToken {
                token: parser.current_token().value.clone(),
            },
            parser.get_position(),
        )),
    }
}

fn operator_for(kind: TokenKind) -> Option<Operator> {
    match kind {
        TokenKind::Plus => Some(Operator::Add),
        TokenKind::Dash => Some(Operator::Sub),
        TokenKind::Star => Some(Operator::Mul),
        TokenKind::Slash => Some(Operator::Div),
        TokenKind::Greater => Some(Operator::GreaterThan),
        TokenKind::Less => Some(Operator::LessThan),
        TokenKind::Equals => Some(Operator::Equal),
        TokenKind::NotEquals => Some(Operator::NotEqual),
        _ => None,
    }
}

pub fn parse_binary_expr(
    parser: &mut Parser,
    left: NodeId,
    bp: BindingPower,
) -> Result<NodeId, Error> {
    let operator_token = parser.advance();
    let operator = operator_for(operator_token.kind).ok_or_else(|| {
        Error::new(
            ErrorImpl::UnexpectedToken {
                token: operator_token.value.clone(),
            },
            operator_token.span.start.clone(),
        )
    })?;

    let right = parse_expr(parser, bp)?;

    let span = Span {
        start: parser.span_of(left).start.clone(),
        end: parser.span_of(right).end.clone(),
    };
    Ok(parser.add_node(
        NodeKind::BinaryOp(operator),
        vec![left, right],
        Some(operator_token),
        span,
    ))
}

pub fn parse_range_expr(
    parser: &mut Parser,
    left: NodeId,
    bp: BindingPower,
) -> Result<NodeId, Error> {
    let operator_token = parser.advance();
    let right = parse_expr(parser, bp)?;

    let span = Span {
        start: parser.span_of(left).start.clone(),
        end: parser.span_of(right).end.clone(),
    };
    Ok(parser.add_node(
        NodeKind::Range,
        vec![left, right],
        Some(operator_token),
        span,
    ))
}

pub fn parse_index_expr(
    parser: &mut Parser,
    left: NodeId,
    _bp: BindingPower,
) -> Result<NodeId, Error> {
    parser.advance();
    let index = parse_expr(parser, BindingPower::Default)?;
    parser.expect(TokenKind::CloseBracket)?;

    let span = parser.span_from(parser.span_of(left).start.clone());
    Ok(parser.add_node(NodeKind::Index, vec![left, index], None, span))
}

pub fn parse_grouping_expr(parser: &mut Parser) -> Result<NodeId, Error> {
    let start = parser.advance().span.start;
    let inner = parse_expr(parser, BindingPower::Default)?;
    parser.expect(TokenKind::CloseParen)?;

    let span = parser.span_from(start);
    Ok(parser.add_node(NodeKind::Parenthesis, vec![inner], None, span))
}

/// `[x in domain | body]` (generator) or `[x in domain & predicate]` (filter).
pub fn parse_comprehension_expr(parser: &mut Parser) -> Result<NodeId, Error> {
    let start = parser.advance().span.start;

    let error = Error::new(
        ErrorImpl::UnexpectedTokenDetailed {
            token: parser.current_token().value.clone(),
            message: String::from("expected bound variable name in comprehension"),
        },
        parser.get_position(),
    );
    let name = parser.expect_error(TokenKind::Identifier, Some(error))?;
    let bound = parser.add_leaf(NodeKind::Identifier, name);

    parser.expect(TokenKind::In)?;
    let domain = parse_wrapped_expr(parser)?;

    let kind = match parser.current_token_kind() {
        TokenKind::Pipe => NodeKind::Generator,
        TokenKind::Ampersand => NodeKind::Filter,
        _ => {
            return Err(Error::new(
                ErrorImpl::UnexpectedTokenDetailed {
                    token: parser.current_token().value.clone(),
                    message: String::from("expected `|` or `&` after comprehension domain"),
                },
                parser.get_position(),
            ))
        }
    };
    parser.advance();

    let body = parse_wrapped_expr(parser)?;
    parser.expect(TokenKind::CloseBracket)?;

    let span = parser.span_from(start);
    Ok(parser.add_node(kind, vec![bound, domain, body], None, span))
}
