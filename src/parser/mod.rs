//! Parser module for building an Abstract Syntax Tree (AST).
//!
//! This module contains the parser that transforms a stream of tokens
//! into the node arena described in [`crate::ast`]. It uses a Pratt parser
//! for expressions with proper operator precedence and handles:
//!
//! - Statement parsing (declarations, assignments, `if`/`loop`, `print`)
//! - Expression parsing (ranges, indexing, comprehensions, binary operators)
//! - Syntax error reporting with source positions
//!
//! The parser uses NUD (null denotation) and LED (left denotation) functions
//! for expression parsing with binding power for precedence handling.

pub mod expr;
pub mod lookups;
pub mod parser;
pub mod stmt;

#[cfg(test)]
mod tests;
