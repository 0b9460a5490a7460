use std::collections::HashMap;

use crate::{ast::ast::NodeId, errors::errors::Error, lexer::tokens::TokenKind};

use super::{expr::*, parser::Parser, stmt::*};

#[derive(PartialEq, PartialOrd, Clone, Copy, Debug)]
pub enum BindingPower {
    Default,
    Equality,
    Relational,
    Additive,
    Multiplicative,
    Range,
    Index,
    Primary,
}

pub type StmtHandler = fn(&mut Parser) -> Result<NodeId, Error>;
pub type NUDHandler = fn(&mut Parser) -> Result<NodeId, Error>;
pub type LEDHandler = fn(&mut Parser, NodeId, BindingPower) -> Result<NodeId, Error>;

pub fn create_token_lookups(parser: &mut Parser) {
    // Equality and relational
    parser.led(TokenKind::Equals, BindingPower::Equality, parse_binary_expr);
    parser.led(TokenKind::NotEquals, BindingPower::Equality, parse_binary_expr);
    parser.led(TokenKind::Less, BindingPower::Relational, parse_binary_expr);
    parser.led(TokenKind::Greater, BindingPower::Relational, parse_binary_expr);

    // Additive and multiplicative
    parser.led(TokenKind::Plus, BindingPower::Additive, parse_binary_expr);
    parser.led(TokenKind::Dash, BindingPower::Additive, parse_binary_expr);
    parser.led(TokenKind::Star, BindingPower::Multiplicative, parse_binary_expr);
    parser.led(TokenKind::Slash, BindingPower::Multiplicative, parse_binary_expr);

    parser.led(TokenKind::DotDot, BindingPower::Range, parse_range_expr);
    parser.led(TokenKind::OpenBracket, BindingPower::Index, parse_index_expr);

    // Literals, symbols and comprehensions
    parser.nud(TokenKind::Number, parse_primary_expr);
    parser.nud(TokenKind::Identifier, parse_primary_expr);
    parser.nud(TokenKind::OpenParen, parse_grouping_expr);
    parser.nud(TokenKind::OpenBracket, parse_comprehension_expr);

    // Statements
    parser.stmt(TokenKind::Int, parse_var_decl_stmt);
    parser.stmt(TokenKind::Vector, parse_var_decl_stmt);
    parser.stmt(TokenKind::Identifier, parse_assignment_stmt);
    parser.stmt(TokenKind::If, parse_conditional_stmt);
    parser.stmt(TokenKind::Loop, parse_loop_stmt);
    parser.stmt(TokenKind::Print, parse_print_stmt);
}

// Lookup tables inside parser struct, so it's easier
pub type StmtLookup = HashMap<TokenKind, StmtHandler>;
pub type NUDLookup = HashMap<TokenKind, NUDHandler>;
pub type LEDLookup = HashMap<TokenKind, LEDHandler>;
pub type BPLookup = HashMap<TokenKind, BindingPower>;
