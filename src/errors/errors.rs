use std::fmt::Display;

use inkwell::builder::BuilderError;
use thiserror::Error;

use crate::Position;

#[derive(Debug, Clone)]
pub struct Error {
    internal_error: ErrorImpl,
    position: Position,
}

impl Error {
    pub fn new(error_impl: ErrorImpl, position: Position) -> Self {
        Error {
            internal_error: error_impl,
            position,
        }
    }

    /// Shorthand for failures that only the code generator can hit.
    pub fn codegen(message: impl Into<String>, position: Position) -> Self {
        Error::new(
            ErrorImpl::CodegenError {
                message: message.into(),
            },
            position,
        )
    }

    pub fn get_position(&self) -> &Position {
        &self.position
    }

    pub fn get_impl(&self) -> &ErrorImpl {
        &self.internal_error
    }

    pub fn get_error_name(&self) -> &str {
        match &self.internal_error {
            ErrorImpl::UnrecognisedToken { .. } => "UnrecognisedToken",
            ErrorImpl::UnexpectedToken { .. } => "UnexpectedToken",
            ErrorImpl::UnexpectedTokenDetailed { .. } => "UnexpectedTokenDetailed",
            ErrorImpl::NumberParseError { .. } => "NumberParseError",
            ErrorImpl::VariableAlreadyDeclared { .. } => "VariableAlreadyDeclared",
            ErrorImpl::VariableNotDeclared { .. } => "VariableNotDeclared",
            ErrorImpl::VariableUsedInOwnInitializer { .. } => "VariableUsedInOwnInitializer",
            ErrorImpl::UnknownType { .. } => "UnknownType",
            ErrorImpl::ScopeClosed { .. } => "ScopeClosed",
            ErrorImpl::TypeMatchError { .. } => "TypeMatchError",
            ErrorImpl::InvalidRangeBounds { .. } => "InvalidRangeBounds",
            ErrorImpl::CodegenError { .. } => "CodegenError",
            ErrorImpl::BuilderError { .. } => "BuilderError",
        }
    }

    pub fn get_tip(&self) -> ErrorTip {
        match &self.internal_error {
            ErrorImpl::UnrecognisedToken { .. } => ErrorTip::None,
            ErrorImpl::UnexpectedToken { token } => ErrorTip::Suggestion(format!(
                "Unexpected token: `{}`, did you miss a semicolon?",
                token
            )),
            ErrorImpl::UnexpectedTokenDetailed { token, message } => {
                ErrorTip::Suggestion(format!("Unexpected token: `{}`, {}", token, message))
            }
            ErrorImpl::NumberParseError { token } => ErrorTip::Suggestion(format!(
                "Invalid number: `{}`, is it above the integer limit?",
                token
            )),
            ErrorImpl::VariableAlreadyDeclared { variable } => ErrorTip::Suggestion(format!(
                "Variable `{}` already declared in this scope",
                variable
            )),
            ErrorImpl::VariableNotDeclared { variable } => {
                ErrorTip::Suggestion(format!("Variable `{}` not declared", variable))
            }
            ErrorImpl::VariableUsedInOwnInitializer { variable } => ErrorTip::Suggestion(format!(
                "Variable `{}` is used in its own initializer",
                variable
            )),
            ErrorImpl::UnknownType { type_ } => {
                ErrorTip::Suggestion(format!("Unknown type `{}` found", type_))
            }
            ErrorImpl::ScopeClosed { variable } => ErrorTip::Suggestion(format!(
                "Cannot declare `{}` in a scope that has already been left",
                variable
            )),
            ErrorImpl::TypeMatchError { expected, received } => ErrorTip::Suggestion(format!(
                "Expected type `{}`, received `{}`",
                expected, received
            )),
            ErrorImpl::InvalidRangeBounds { lower, upper } => ErrorTip::Suggestion(format!(
                "Range upper bound {} is less than lower bound {}",
                upper, lower
            )),
            ErrorImpl::CodegenError { message } => ErrorTip::Suggestion(message.clone()),
            ErrorImpl::BuilderError { message } => ErrorTip::Suggestion(message.clone()),
        }
    }
}

impl Display for Error {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{} at offset {}", self.internal_error, self.position.0)
    }
}

impl std::error::Error for Error {}

impl From<BuilderError> for Error {
    fn from(error: BuilderError) -> Self {
        Error::new(
            ErrorImpl::BuilderError {
                message: error.to_string(),
            },
            Position::null(),
        )
    }
}

pub enum ErrorTip {
    None,
    Suggestion(String),
}

impl Display for ErrorTip {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            ErrorTip::None => write!(f, ""),
            ErrorTip::Suggestion(suggestion) => write!(f, "{}", suggestion),
        }
    }
}

#[derive(Error, Debug, Clone, PartialEq)]
pub enum ErrorImpl {
    #[error("unrecognised token: {token:?}")]
    UnrecognisedToken { token: String },
    #[error("unexpected token: {token:?}")]
    UnexpectedToken { token: String },
    #[error("unexpected token ({message:?}): {token:?}")]
    UnexpectedTokenDetailed { token: String, message: String },
    #[error("error parsing number: {token:?}")]
    NumberParseError { token: String },
    #[error("variable {variable:?} already declared")]
    VariableAlreadyDeclared { variable: String },
    #[error("variable {variable:?} not declared")]
    VariableNotDeclared { variable: String },
    #[error("variable {variable:?} used in its own initializer")]
    VariableUsedInOwnInitializer { variable: String },
    #[error("unknown type {type_} found")]
    UnknownType { type_: String },
    #[error("variable {variable:?} declared in a closed scope")]
    ScopeClosed { variable: String },
    #[error("types do not match: expected {expected:?}, received {received:?}")]
    TypeMatchError { expected: String, received: String },
    #[error("invalid range bounds: {lower}..{upper}")]
    InvalidRangeBounds { lower: i64, upper: i64 },
    #[error("code generation failed: {message}")]
    CodegenError { message: String },
    #[error("llvm builder error: {message}")]
    BuilderError { message: String },
}
