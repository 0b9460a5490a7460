//! Unit tests for the parser module.
//!
//! Each test parses a small program and compares the parenthesised tree
//! dump, which pins down both node kinds and operator precedence.

use std::rc::Rc;

use pretty_assertions::assert_eq;

use super::parser::parse;
use crate::{ast::ast::Ast, errors::errors::Error, lexer::lexer::tokenize};

fn parse_source(source: &str) -> Result<Ast, Error> {
    let tokens = tokenize(source.to_string(), Some("test.vcalc".to_string()))?;
    parse(tokens, Rc::new("test.vcalc".to_string()))
}

fn tree(source: &str) -> String {
    parse_source(source).unwrap().to_string_tree()
}

#[test]
fn test_parse_variable_declaration() {
    assert_eq!(
        tree("int x = 1 + 2 * 3;"),
        "(Program (VarDeclaration int x (Expression (+ 1 (* 2 3)))))"
    );
}

#[test]
fn test_parse_declaration_without_initializer() {
    assert_eq!(tree("vector v;"), "(Program (VarDeclaration vector v))");
}

#[test]
fn test_parse_assignment() {
    assert_eq!(
        tree("x = x - 1;"),
        "(Program (Assignment x (Expression (- x 1))))"
    );
}

#[test]
fn test_range_binds_tighter_than_arithmetic() {
    assert_eq!(
        tree("print(1..3 + 2);"),
        "(Program (Print (Expression (+ (Range 1 3) 2))))"
    );
}

#[test]
fn test_index_binds_tightest() {
    assert_eq!(
        tree("print(v[1..2]);"),
        "(Program (Print (Expression (Index v (Range 1 2)))))"
    );
    assert_eq!(
        tree("print(1..v[0]);"),
        "(Program (Print (Expression (Range 1 (Index v 0)))))"
    );
}

#[test]
fn test_equality_binds_loosest() {
    assert_eq!(
        tree("print(1 < 2 == 3 > 4);"),
        "(Program (Print (Expression (== (< 1 2) (> 3 4)))))"
    );
}

#[test]
fn test_binary_operators_are_left_associative() {
    assert_eq!(
        tree("print(10 - 3 - 2);"),
        "(Program (Print (Expression (- (- 10 3) 2))))"
    );
}

#[test]
fn test_parse_parenthesis() {
    assert_eq!(
        tree("print((1 + 2) * 3);"),
        "(Program (Print (Expression (* (Parenthesis (+ 1 2)) 3))))"
    );
}

#[test]
fn test_parse_generator() {
    assert_eq!(
        tree("vector v = [i in 1..3 | i * 2];"),
        "(Program (VarDeclaration vector v (Expression (Generator i (Expression (Range 1 3)) (Expression (* i 2))))))"
    );
}

#[test]
fn test_parse_filter() {
    assert_eq!(
        tree("vector v = [i in 0..5 & i > 2];"),
        "(Program (VarDeclaration vector v (Expression (Filter i (Expression (Range 0 5)) (Expression (> i 2))))))"
    );
}

#[test]
fn test_parse_conditional() {
    assert_eq!(
        tree("if (x) print(x); fi;"),
        "(Program (Conditional (Expression x) (Block (Print (Expression x)))))"
    );
}

#[test]
fn test_parse_empty_conditional_block() {
    assert_eq!(
        tree("if (1) fi;"),
        "(Program (Conditional (Expression 1) (Block)))"
    );
}

#[test]
fn test_parse_loop() {
    assert_eq!(
        tree("loop (i < 3) i = i + 1; pool;"),
        "(Program (Loop (Expression (< i 3)) (Block (Assignment i (Expression (+ i 1))))))"
    );
}

#[test]
fn test_missing_declaration_name() {
    let error = parse_source("int = 5;").unwrap_err();
    assert_eq!(error.get_error_name(), "UnexpectedTokenDetailed");
    assert_eq!(error.get_position().0, 4);
}

#[test]
fn test_unterminated_conditional() {
    let error = parse_source("if (1) print(1);").unwrap_err();
    assert_eq!(error.get_error_name(), "UnexpectedTokenDetailed");
}

#[test]
fn test_comprehension_needs_separator() {
    let error = parse_source("print([i in 1..3 i]);").unwrap_err();
    assert_eq!(error.get_error_name(), "UnexpectedTokenDetailed");
}

#[test]
fn test_number_out_of_range() {
    let error = parse_source("print(99999999999999999999);").unwrap_err();
    assert_eq!(error.get_error_name(), "NumberParseError");
}

#[test]
fn test_expression_is_not_a_statement() {
    let error = parse_source("5;").unwrap_err();
    assert_eq!(error.get_error_name(), "UnexpectedTokenDetailed");
}

#[test]
fn test_node_spans_cover_source() {
    let ast = parse_source("int abc = 12;").unwrap();
    let program = ast.node(ast.root());
    let declaration = ast.node(program.children[0]);

    assert_eq!(declaration.span.start.0, 0);
    assert_eq!(declaration.span.end.0, 13);
}
