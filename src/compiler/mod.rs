//! Code generation.
//!
//! Lowers a resolved and typed AST into LLVM IR. Every program becomes a
//! single `main` function; output and runtime faults go through the hooks
//! declared in [`runtime`].

pub mod compiler;
pub mod expr;
pub mod runtime;
pub mod stmt;
pub mod vector;

#[cfg(test)]
mod tests;
