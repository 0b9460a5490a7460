use lazy_static::lazy_static;
use std::{collections::HashMap, fmt::Display};

use crate::Span;

lazy_static! {
    pub static ref RESERVED_LOOKUP: HashMap<&'static str, TokenKind> = {
        let mut map = HashMap::new();
        map.insert("int", TokenKind::Int);
        map.insert("vector", TokenKind::Vector);
        map.insert("if", TokenKind::If);
        map.insert("fi", TokenKind::Fi);
        map.insert("loop", TokenKind::Loop);
        map.insert("pool", TokenKind::Pool);
        map.insert("print", TokenKind::Print);
        map.insert("in", TokenKind::In);
        map
    };
}

#[derive(Debug, PartialEq, Eq, Clone, Copy, Hash)]
pub enum TokenKind {
    EOF,
    Number,
    Identifier,

    OpenBracket,
    CloseBracket,
    OpenParen,
    CloseParen,

    Assignment, // =
    Equals,     // ==
    NotEquals,  // !=
    Less,
    Greater,

    DotDot,
    Semicolon,
    Pipe,
    Ampersand,

    Plus,
    Dash,
    Slash,
    Star,

    // Reserved
    Int,
    Vector,
    If,
    Fi,
    Loop,
    Pool,
    Print,
    In,
}

impl Display for TokenKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{:?}", self)
    }
}

#[derive(Debug, Clone)]
pub struct Token {
    pub kind: TokenKind,
    pub value: String,
    pub span: Span,
}

impl Display for Token {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "Token {{\nkind: {},\nvalue: {}}}", self.kind, self.value)
    }
}

impl Token {
    pub fn is_one_of_many(&self, kinds: &[TokenKind]) -> bool {
        kinds.contains(&self.kind)
    }

    /// Source text shown in AST dumps: the literal for value-carrying tokens,
    /// the kind otherwise.
    pub fn text(&self) -> String {
        if self.is_one_of_many(&[TokenKind::Identifier, TokenKind::Number]) {
            self.value.clone()
        } else {
            self.kind.to_string()
        }
    }
}
