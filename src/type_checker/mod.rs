//! Semantic analysis module.
//!
//! This module performs the two analysis passes that run between parsing
//! and code generation:
//!
//! - Name resolution (`def_ref`): builds the scope tree, defines variables
//!   and binds every identifier in an expression to its declaration
//! - Type computation (`type_checker`): assigns `int`/`vector` to every
//!   expression node and marks scalar operands that must be broadcast
//!
//! Both passes annotate the AST in place and collect every error they find
//! instead of stopping at the first one.

pub mod def_ref;
pub mod symbol_table;
pub mod type_checker;
