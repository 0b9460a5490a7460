/// AST (Abstract Syntax Tree) module
/// Contains all definitions related to the AST structure
///
/// Submodules:
/// - ast: The node arena, node kinds and annotation fields
/// - types: The `int`/`vector` type model and promotion table
pub mod ast;
pub mod types;

#[cfg(test)]
mod tests;
