use crate::{
    ast::ast::{NodeId, NodeKind},
    errors::errors::{Error, ErrorImpl},
    lexer::tokens::TokenKind,
    parser::expr::parse_wrapped_expr,
};

use super::parser::Parser;

pub fn parse_stmt(parser: &mut Parser) -> Result<NodeId, Error> {
    let handler = parser
        .get_stmt_lookup()
        .get(&parser.current_token_kind())
        .copied();

    match handler {
        Some(handler) => handler(parser),
        None => Err(Error::new(
            ErrorImpl::UnexpectedTokenDetailed {
                token: parser.current_token().value.clone(),
                message: String::from("expected a statement"),
            },
            parser.get_position(),
        )),
    }
}

/// Parses statements up to (not including) `terminator` into a `Block`.
pub fn parse_block_until(parser: &mut Parser, terminator: TokenKind) -> Result<NodeId, Error> {
    let start = parser.get_position();
    let mut body = vec![];

    while parser.current_token_kind() != terminator {
        if !parser.has_tokens() {
            return Err(Error::new(
                ErrorImpl::UnexpectedTokenDetailed {
                    token: parser.current_token().value.clone(),
                    message: format!("expected {} before end of file", terminator),
                },
                parser.get_position(),
            ));
        }
        body.push(parse_stmt(parser)?);
    }

    let span = parser.span_from(start);
    Ok(parser.add_node(NodeKind::Block, body, None, span))
}

pub fn parse_var_decl_stmt(parser: &mut Parser) -> Result<NodeId, Error> {
    let type_token = parser.advance();
    let start = type_token.span.start.clone();
    let type_name = parser.add_leaf(NodeKind::TypeName, type_token);

    let error = Error::new(
        ErrorImpl::UnexpectedTokenDetailed {
            token: parser.current_token().value.clone(),
            message: String::from("expected identifier during variable declaration"),
        },
        parser.get_position(),
    );
    let name = parser.expect_error(TokenKind::Identifier, Some(error))?;
    let identifier = parser.add_leaf(NodeKind::Identifier, name);

    let mut children = vec![type_name, identifier];
    if parser.current_token_kind() == TokenKind::Assignment {
        parser.advance();
        children.push(parse_wrapped_expr(parser)?);
    }

    parser.expect(TokenKind::Semicolon)?;

    let span = parser.span_from(start);
    Ok(parser.add_node(NodeKind::VarDeclaration, children, None, span))
}

pub fn parse_assignment_stmt(parser: &mut Parser) -> Result<NodeId, Error> {
    let name = parser.advance();
    let start = name.span.start.clone();
    let identifier = parser.add_leaf(NodeKind::Identifier, name);

    parser.expect(TokenKind::Assignment)?;
    let value = parse_wrapped_expr(parser)?;
    parser.expect(TokenKind::Semicolon)?;

    let span = parser.span_from(start);
    Ok(parser.add_node(NodeKind::Assignment, vec![identifier, value], None, span))
}

/// `if (cond) ... fi;`
pub fn parse_conditional_stmt(parser: &mut Parser) -> Result<NodeId, Error> {
    let start = parser.advance().span.start;

    parser.expect(TokenKind::OpenParen)?;
    let condition = parse_wrapped_expr(parser)?;
    parser.expect(TokenKind::CloseParen)?;

    let block = parse_block_until(parser, TokenKind::Fi)?;
    parser.expect(TokenKind::Fi)?;
    parser.expect(TokenKind::Semicolon)?;

    let span = parser.span_from(start);
    Ok(parser.add_node(NodeKind::Conditional, vec![condition, block], None, span))
}

/// `loop (cond) ... pool;`
pub fn parse_loop_stmt(parser: &mut Parser) -> Result<NodeId, Error> {
    let start = parser.advance().span.start;

    parser.expect(TokenKind::OpenParen)?;
    let condition = parse_wrapped_expr(parser)?;
    parser.expect(TokenKind::CloseParen)?;

    let block = parse_block_until(parser, TokenKind::Pool)?;
    parser.expect(TokenKind::Pool)?;
    parser.expect(TokenKind::Semicolon)?;

    let span = parser.span_from(start);
    Ok(parser.add_node(NodeKind::Loop, vec![condition, block], None, span))
}

pub fn parse_print_stmt(parser: &mut Parser) -> Result<NodeId, Error> {
    let start = parser.advance().span.start;

    parser.expect(TokenKind::OpenParen)?;
    let value = parse_wrapped_expr(parser)?;
    parser.expect(TokenKind::CloseParen)?;
    parser.expect(TokenKind::Semicolon)?;

    let span = parser.span_from(start);
    Ok(parser.add_node(NodeKind::Print, vec![value], None, span))
}
