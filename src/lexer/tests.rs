//! Unit tests for the lexer module.

use super::{lexer::tokenize, tokens::TokenKind};

fn kinds(source: &str) -> Vec<TokenKind> {
    tokenize(source.to_string(), Some("test.vcalc".to_string()))
        .unwrap()
        .into_iter()
        .map(|token| token.kind)
        .collect()
}

#[test]
fn test_tokenize_keywords() {
    assert_eq!(
        kinds("int vector if fi loop pool print in"),
        vec![
            TokenKind::Int,
            TokenKind::Vector,
            TokenKind::If,
            TokenKind::Fi,
            TokenKind::Loop,
            TokenKind::Pool,
            TokenKind::Print,
            TokenKind::In,
            TokenKind::EOF,
        ]
    );
}

#[test]
fn test_tokenize_identifiers() {
    let tokens = tokenize(
        "foo baz_123 _under integer".to_string(),
        Some("test.vcalc".to_string()),
    )
    .unwrap();

    assert_eq!(tokens[0].kind, TokenKind::Identifier);
    assert_eq!(tokens[0].value, "foo");
    assert_eq!(tokens[1].value, "baz_123");
    assert_eq!(tokens[2].value, "_under");
    // Keywords are only matched as whole identifiers.
    assert_eq!(tokens[3].kind, TokenKind::Identifier);
    assert_eq!(tokens[3].value, "integer");
}

#[test]
fn test_tokenize_numbers() {
    let tokens = tokenize("0 42 1000".to_string(), None).unwrap();

    assert_eq!(tokens[0].kind, TokenKind::Number);
    assert_eq!(tokens[0].value, "0");
    assert_eq!(tokens[1].value, "42");
    assert_eq!(tokens[2].value, "1000");
}

#[test]
fn test_range_is_not_two_numbers_with_dots() {
    assert_eq!(
        kinds("1..10"),
        vec![
            TokenKind::Number,
            TokenKind::DotDot,
            TokenKind::Number,
            TokenKind::EOF
        ]
    );
}

#[test]
fn test_tokenize_operators() {
    assert_eq!(
        kinds("+ - * / < > == != = | & ;"),
        vec![
            TokenKind::Plus,
            TokenKind::Dash,
            TokenKind::Star,
            TokenKind::Slash,
            TokenKind::Less,
            TokenKind::Greater,
            TokenKind::Equals,
            TokenKind::NotEquals,
            TokenKind::Assignment,
            TokenKind::Pipe,
            TokenKind::Ampersand,
            TokenKind::Semicolon,
            TokenKind::EOF,
        ]
    );
}

#[test]
fn test_tokenize_generator() {
    assert_eq!(
        kinds("[x in 1..3 | x * 2]"),
        vec![
            TokenKind::OpenBracket,
            TokenKind::Identifier,
            TokenKind::In,
            TokenKind::Number,
            TokenKind::DotDot,
            TokenKind::Number,
            TokenKind::Pipe,
            TokenKind::Identifier,
            TokenKind::Star,
            TokenKind::Number,
            TokenKind::CloseBracket,
            TokenKind::EOF,
        ]
    );
}

#[test]
fn test_comments_are_skipped() {
    assert_eq!(
        kinds("int a = 1; // trailing comment\nprint(a);"),
        vec![
            TokenKind::Int,
            TokenKind::Identifier,
            TokenKind::Assignment,
            TokenKind::Number,
            TokenKind::Semicolon,
            TokenKind::Print,
            TokenKind::OpenParen,
            TokenKind::Identifier,
            TokenKind::CloseParen,
            TokenKind::Semicolon,
            TokenKind::EOF,
        ]
    );
}

#[test]
fn test_token_spans() {
    let tokens = tokenize("int  abc".to_string(), None).unwrap();

    assert_eq!(tokens[0].span.start.0, 0);
    assert_eq!(tokens[0].span.end.0, 3);
    assert_eq!(tokens[1].span.start.0, 5);
    assert_eq!(tokens[1].span.end.0, 8);
    assert_eq!(tokens[2].span.start.0, 8);
}

#[test]
fn test_unrecognised_token() {
    let error = tokenize("int a = 1 @ 2;".to_string(), None).unwrap_err();

    assert_eq!(error.get_error_name(), "UnrecognisedToken");
    assert_eq!(error.get_position().0, 10);
}

#[test]
fn test_empty_source_is_only_eof() {
    assert_eq!(kinds(""), vec![TokenKind::EOF]);
    assert_eq!(kinds("   \n\t"), vec![TokenKind::EOF]);
}
