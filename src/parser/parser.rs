//! Parser implementation for building the Abstract Syntax Tree.
//!
//! This module contains the main Parser struct and the `parse` entry point.
//! The parser uses a Pratt parser approach with NUD/LED handlers for
//! expression parsing and specialized functions for statement parsing.
//!
//! It maintains lookup tables for:
//! - Statement handlers
//! - NUD (null denotation) handlers for prefix expressions
//! - LED (left denotation) handlers for infix expressions
//! - Binding powers for operator precedence
//!
//! Nodes are appended to an [`Ast`] arena as they are recognised.

use std::{collections::HashMap, rc::Rc};

use tracing::debug;

use crate::{
    ast::ast::{Ast, NodeId, NodeKind},
    errors::errors::{Error, ErrorImpl},
    lexer::tokens::{Token, TokenKind},
    Position, Span,
};

use super::{
    lookups::{
        create_token_lookups, BPLookup, BindingPower, LEDHandler, LEDLookup, NUDHandler, NUDLookup,
        StmtHandler, StmtLookup,
    },
    stmt::parse_stmt,
};

/// The main parser structure that maintains parsing state.
pub struct Parser {
    /// The list of tokens to parse, always terminated by EOF
    tokens: Vec<Token>,
    /// Current position in the token stream
    pos: usize,
    /// The name of the source file being parsed
    file: Rc<String>,
    /// Lookup table for statement parsing handlers
    stmt_lookup: StmtLookup,
    /// Lookup table for null denotation (prefix) expression handlers
    nud_lookup: NUDLookup,
    /// Lookup table for left denotation (infix) expression handlers
    led_lookup: LEDLookup,
    /// Lookup table for expression binding powers (precedence)
    binding_power_lookup: BPLookup,
    /// Arena receiving the parsed nodes
    ast: Ast,
}

impl Parser {
    /// Creates a new Parser instance over a token stream produced by
    /// [`tokenize`](crate::lexer::lexer::tokenize).
    pub fn new(tokens: Vec<Token>, file: Rc<String>) -> Self {
        Parser {
            tokens,
            pos: 0,
            file,
            stmt_lookup: HashMap::new(),
            nud_lookup: HashMap::new(),
            led_lookup: HashMap::new(),
            binding_power_lookup: HashMap::new(),
            ast: Ast::new(),
        }
    }

    /// Returns the current token without advancing.
    ///
    /// Past the end of the stream this keeps returning the final EOF token.
    pub fn current_token(&self) -> &Token {
        let last = self.tokens.len().saturating_sub(1);
        &self.tokens[self.pos.min(last)]
    }

    /// Returns the kind of the current token.
    pub fn current_token_kind(&self) -> TokenKind {
        self.current_token().kind
    }

    /// Advances to the next token and returns the previous token.
    pub fn advance(&mut self) -> Token {
        let token = self.current_token().clone();
        if token.kind != TokenKind::EOF {
            self.pos += 1;
        }
        token
    }

    /// Expects a token of the specified kind, with optional custom error.
    pub fn expect_error(
        &mut self,
        expected_kind: TokenKind,
        error: Option<Error>,
    ) -> Result<Token, Error> {
        let token = self.current_token();
        if token.kind != expected_kind {
            match error {
                Some(error) => Err(error),
                None => Err(Error::new(
                    ErrorImpl::UnexpectedTokenDetailed {
                        token: token.value.clone(),
                        message: format!("expected {}", expected_kind),
                    },
                    token.span.start.clone(),
                )),
            }
        } else {
            Ok(self.advance())
        }
    }

    /// Expects a token of the specified kind with default error message.
    pub fn expect(&mut self, expected_kind: TokenKind) -> Result<Token, Error> {
        self.expect_error(expected_kind, None)
    }

    /// Checks if there are more tokens to parse.
    pub fn has_tokens(&self) -> bool {
        self.current_token_kind() != TokenKind::EOF
    }

    pub fn get_stmt_lookup(&self) -> &StmtLookup {
        &self.stmt_lookup
    }

    pub fn get_nud_lookup(&self) -> &NUDLookup {
        &self.nud_lookup
    }

    pub fn get_led_lookup(&self) -> &LEDLookup {
        &self.led_lookup
    }

    pub fn get_bp_lookup(&self) -> &BPLookup {
        &self.binding_power_lookup
    }

    /// Binding power of the current token, `Default` when it has none.
    pub fn current_binding_power(&self) -> BindingPower {
        *self
            .binding_power_lookup
            .get(&self.current_token_kind())
            .unwrap_or(&BindingPower::Default)
    }

    /// Registers a left denotation (infix) handler for a token.
    pub fn led(&mut self, kind: TokenKind, binding_power: BindingPower, led_fn: LEDHandler) {
        self.binding_power_lookup.insert(kind, binding_power);
        self.led_lookup.insert(kind, led_fn);
    }

    /// Registers a null denotation (prefix) handler for a token.
    ///
    /// Does not touch the binding power table: `[` is both the index
    /// operator and the start of a comprehension.
    pub fn nud(&mut self, kind: TokenKind, nud_fn: NUDHandler) {
        self.nud_lookup.insert(kind, nud_fn);
    }

    /// Registers a statement handler for a token.
    pub fn stmt(&mut self, kind: TokenKind, stmt_fn: StmtHandler) {
        self.binding_power_lookup
            .entry(kind)
            .or_insert(BindingPower::Default);
        self.stmt_lookup.insert(kind, stmt_fn);
    }

    /// Appends a node to the arena.
    pub fn add_node(
        &mut self,
        kind: NodeKind,
        children: Vec<NodeId>,
        token: Option<Token>,
        span: Span,
    ) -> NodeId {
        self.ast.add_node(kind, children, token, span)
    }

    /// Appends a leaf node carrying `token`.
    pub fn add_leaf(&mut self, kind: NodeKind, token: Token) -> NodeId {
        let span = token.span.clone();
        self.ast.add_node(kind, vec![], Some(token), span)
    }

    pub fn span_of(&self, id: NodeId) -> &Span {
        &self.ast.node(id).span
    }

    /// Span running from `start` to the end of the last consumed token.
    pub fn span_from(&self, start: Position) -> Span {
        let end = match self.pos.checked_sub(1) {
            Some(previous) => self.tokens[previous].span.end.clone(),
            None => start.clone(),
        };
        Span { start, end }
    }

    /// Returns the current position in the source file.
    pub fn get_position(&self) -> Position {
        self.current_token().span.start.clone()
    }

    pub fn get_file(&self) -> Rc<String> {
        Rc::clone(&self.file)
    }
}

/// Parses a stream of tokens into an Abstract Syntax Tree rooted at a
/// `Program` node.
///
/// Parsing stops at the first syntax error.
pub fn parse(tokens: Vec<Token>, file: Rc<String>) -> Result<Ast, Error> {
    let mut parser = Parser::new(tokens, Rc::clone(&file));
    create_token_lookups(&mut parser);

    let mut body = vec![];

    while parser.has_tokens() {
        body.push(parse_stmt(&mut parser)?);
    }

    let span = Span {
        start: Position(0, Rc::clone(&file)),
        end: parser.get_position(),
    };
    let program = parser.add_node(NodeKind::Program, body, None, span);

    let mut ast = parser.ast;
    ast.set_root(program);

    debug!(nodes = ast.len(), "parsed program");
    Ok(ast)
}
