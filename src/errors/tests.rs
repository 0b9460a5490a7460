//! Unit tests for error handling.

use crate::errors::errors::{Error, ErrorImpl, ErrorTip};
use crate::Position;
use std::rc::Rc;

#[test]
fn test_error_creation() {
    let error = Error::new(
        ErrorImpl::UnrecognisedToken {
            token: "@".to_string(),
        },
        Position(10, Rc::new("test.vcalc".to_string())),
    );

    assert_eq!(error.get_error_name(), "UnrecognisedToken");
}

#[test]
fn test_error_position() {
    let pos = Position(42, Rc::new("test.vcalc".to_string()));
    let error = Error::new(
        ErrorImpl::VariableNotDeclared {
            variable: "x".to_string(),
        },
        pos.clone(),
    );

    assert_eq!(error.get_position().0, 42);
}

#[test]
fn test_redeclaration_error() {
    let error = Error::new(
        ErrorImpl::VariableAlreadyDeclared {
            variable: "x".to_string(),
        },
        Position::null(),
    );

    assert_eq!(error.get_error_name(), "VariableAlreadyDeclared");
    assert_eq!(
        error.get_tip().to_string(),
        "Variable `x` already declared in this scope"
    );
}

#[test]
fn test_type_mismatch_error() {
    let error = Error::new(
        ErrorImpl::TypeMatchError {
            expected: "int".to_string(),
            received: "vector".to_string(),
        },
        Position::null(),
    );

    assert_eq!(error.get_error_name(), "TypeMatchError");
    assert_eq!(
        error.get_tip().to_string(),
        "Expected type `int`, received `vector`"
    );
}

#[test]
fn test_invalid_range_bounds_error() {
    let error = Error::new(
        ErrorImpl::InvalidRangeBounds { lower: 3, upper: 1 },
        Position::null(),
    );

    assert_eq!(error.get_error_name(), "InvalidRangeBounds");
    assert_eq!(error.get_impl().to_string(), "invalid range bounds: 3..1");
}

#[test]
fn test_codegen_shorthand() {
    let error = Error::codegen("no storage for `v`", Position::null());

    assert_eq!(error.get_error_name(), "CodegenError");
    assert!(matches!(error.get_tip(), ErrorTip::Suggestion(ref s) if s == "no storage for `v`"));
}

#[test]
fn test_error_tip_none() {
    let error = Error::new(
        ErrorImpl::UnrecognisedToken {
            token: "@".to_string(),
        },
        Position::null(),
    );

    assert!(matches!(error.get_tip(), ErrorTip::None));
}

#[test]
fn test_error_tip_display() {
    let tip = ErrorTip::Suggestion("Try this instead".to_string());
    assert_eq!(tip.to_string(), "Try this instead");

    let tip = ErrorTip::None;
    assert_eq!(tip.to_string(), "");
}

#[test]
fn test_error_display_includes_offset() {
    let error = Error::new(
        ErrorImpl::VariableNotDeclared {
            variable: "y".to_string(),
        },
        Position(7, Rc::new("test.vcalc".to_string())),
    );

    assert_eq!(error.to_string(), "variable \"y\" not declared at offset 7");
}
