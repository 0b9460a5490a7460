//! Unit tests for the AST arena and the type model.

use std::rc::Rc;

use crate::{
    lexer::tokens::{Token, TokenKind},
    Position, Span,
};

use super::{
    ast::{Ast, NodeKind, Operator},
    types::{promote, Type},
};

fn span() -> Span {
    Span {
        start: Position(0, Rc::new("test.vcalc".to_string())),
        end: Position(0, Rc::new("test.vcalc".to_string())),
    }
}

fn token(kind: TokenKind, value: &str) -> Option<Token> {
    Some(Token {
        kind,
        value: value.to_string(),
        span: span(),
    })
}

#[test]
fn test_promotion_table_is_total() {
    let all = [Type::Int, Type::Vector];

    for left in all {
        for right in all {
            let promotion = promote(left, right);
            let expected = if left.is_vector() || right.is_vector() {
                Type::Vector
            } else {
                Type::Int
            };

            assert_eq!(promotion.result, expected);
            // A side is promoted exactly when it is the lone scalar.
            assert_eq!(
                promotion.promote_left.is_some(),
                left == Type::Int && right == Type::Vector
            );
            assert_eq!(
                promotion.promote_right.is_some(),
                left == Type::Vector && right == Type::Int
            );
        }
    }
}

#[test]
fn test_promotion_targets_vector() {
    assert_eq!(promote(Type::Int, Type::Vector).promote_left, Some(Type::Vector));
    assert_eq!(promote(Type::Vector, Type::Int).promote_right, Some(Type::Vector));
}

#[test]
fn test_type_names() {
    assert_eq!(Type::from_name("int"), Some(Type::Int));
    assert_eq!(Type::from_name("vector"), Some(Type::Vector));
    assert_eq!(Type::from_name("float"), None);
    assert_eq!(Type::Vector.to_string(), "vector");
}

#[test]
fn test_arena_ids_are_stable() {
    let mut ast = Ast::new();
    let left = ast.add_node(NodeKind::IntegerLiteral, vec![], token(TokenKind::Number, "1"), span());
    let right = ast.add_node(NodeKind::IntegerLiteral, vec![], token(TokenKind::Number, "2"), span());
    let add = ast.add_node(NodeKind::BinaryOp(Operator::Add), vec![left, right], None, span());
    ast.set_root(add);

    ast.node_mut(left).eval_type = Some(Type::Int);

    assert_eq!(ast.root(), add);
    assert_eq!(ast.children(add), &[left, right]);
    assert_eq!(ast.child(add, 1), Some(right));
    assert_eq!(ast.child(add, 2), None);
    assert_eq!(ast.node(left).eval_type, Some(Type::Int));
    assert_eq!(ast.len(), 3);
}

#[test]
fn test_string_tree() {
    let mut ast = Ast::new();
    let value = ast.add_node(NodeKind::IntegerLiteral, vec![], token(TokenKind::Number, "5"), span());
    let name = ast.add_node(NodeKind::Identifier, vec![], token(TokenKind::Identifier, "x"), span());
    let less = ast.add_node(NodeKind::BinaryOp(Operator::LessThan), vec![name, value], None, span());
    let expr = ast.add_node(NodeKind::Expression, vec![less], None, span());
    let print = ast.add_node(NodeKind::Print, vec![expr], None, span());
    let program = ast.add_node(NodeKind::Program, vec![print], None, span());
    ast.set_root(program);

    assert_eq!(ast.to_string_tree(), "(Program (Print (Expression (< x 5))))");
}
