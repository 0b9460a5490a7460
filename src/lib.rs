#![allow(clippy::module_inception)]

use std::{rc::Rc, sync::Once};

use inkwell::context::Context;
use tracing::debug;
use tracing_subscriber::{fmt, prelude::*, EnvFilter};

use crate::{
    ast::ast::Ast,
    compiler::compiler::{compile, CompileOptions, Compiler},
    errors::errors::{Error, ErrorTip},
    lexer::lexer::tokenize,
    parser::parser::parse,
    type_checker::{def_ref::resolve_names, symbol_table::SymbolTable, type_checker::compute_types},
};

pub mod ast;
pub mod compiler;
pub mod errors;
pub mod lexer;
pub mod macros;
pub mod parser;
pub mod type_checker;

extern crate regex;

#[derive(Debug, Clone)]
pub struct Position(pub u32, pub Rc<String>);

impl Position {
    pub fn null() -> Self {
        Position(0, Rc::new(String::from("<null>")))
    }
}

#[derive(Debug, Clone)]
pub struct Span {
    pub start: Position,
    pub end: Position,
}

static TRACING: Once = Once::new();

/// Installs a `fmt` subscriber filtered by `RUST_LOG`. Does nothing when
/// the variable is unset; later calls are no-ops.
pub fn init_tracing() {
    TRACING.call_once(|| {
        if std::env::var("RUST_LOG").is_err() {
            return;
        }

        let _ = tracing_subscriber::registry()
            .with(fmt::layer().with_writer(std::io::stderr))
            .with(EnvFilter::from_default_env())
            .try_init();
    });
}

/// Runs the front end and both analysis passes.
///
/// Lexing and parsing stop at the first error. Types are only computed when
/// every name resolved.
pub fn analyze(source: &str, file: &str) -> Result<(Ast, SymbolTable), Vec<Error>> {
    let tokens = tokenize(source.to_string(), Some(file.to_string())).map_err(|error| vec![error])?;
    let mut ast = parse(tokens, Rc::new(file.to_string())).map_err(|error| vec![error])?;

    let mut symbols = SymbolTable::new();
    let errors = resolve_names(&mut ast, &mut symbols);
    if !errors.is_empty() {
        return Err(errors);
    }

    let errors = compute_types(&mut ast, &symbols);
    if !errors.is_empty() {
        return Err(errors);
    }

    debug!(nodes = ast.len(), file, "analysis finished");
    Ok((ast, symbols))
}

/// Full pipeline from source text to an LLVM module.
pub fn compile_source<'a>(
    source: &str,
    file: &str,
    context: &'a Context,
    options: CompileOptions,
) -> Result<Compiler<'a>, Vec<Error>> {
    let (ast, symbols) = analyze(source, file)?;
    compile(ast, symbols, context, options).map_err(|error| vec![error])
}

/// Line number (1-based), text and column of `position` in `source`.
pub fn get_line_at_position(source: &str, position: u32) -> Option<(usize, String, usize)> {
    let pos = position as usize;

    let mut start = 0;
    for (index, line) in source.split_inclusive('\n').enumerate() {
        let end = start + line.len();

        if (start..end).contains(&pos) {
            return Some((index + 1, line.to_string(), pos - start));
        }

        start = end;
    }

    None
}

pub fn display_error(error: &Error, source: &str, file: &str) {
    /*
        error: message
        -> program.vcl
           |
        20 | int a = @;
           | --------^
    */

    if let ErrorTip::None = error.get_tip() {
        eprintln!("Error: {}", error.get_error_name());
    } else {
        eprintln!("Error: {} ({})", error.get_error_name(), error.get_tip());
    }
    eprintln!("-> {}", file);

    // Errors raised after the front end may point at the end of the file.
    let Some((line, line_text, line_pos)) = get_line_at_position(source, error.get_position().0) else {
        return;
    };

    let line_string = line.to_string();
    let padding = line_string.len() + 2;
    eprintln!("{:>padding$}", "|");

    let (line_text_removed, removed_whitespace) = remove_starting_whitespace(&line_text);
    eprintln!("{} | {}", line_string, line_text_removed.trim_end());

    let arrows = line_pos.saturating_sub(removed_whitespace) + 1;
    eprintln!("{:>padding$} {:->arrows$}", "|", "^");
}

fn remove_starting_whitespace(string: &str) -> (String, usize) {
    let start = string.len() - string.trim_start_matches([' ', '\t']).len();
    (String::from(&string[start..]), start)
}

#[cfg(test)]
mod tests {
    #[test]
    fn test_get_line_at_position() {
        let source = "Hello, world!\nint x = 1;\n\n  Testing { }\n";

        let (line_number, line, line_pos) = super::get_line_at_position(source, 10).unwrap();
        assert_eq!(line_number, 1);
        assert_eq!(line, "Hello, world!\n");
        assert_eq!(line_pos, 10);

        let (line_number, line, line_pos) = super::get_line_at_position(source, 36).unwrap();
        assert_eq!(line_number, 4);
        assert_eq!(line, "  Testing { }\n");
        assert_eq!(line_pos, 10);

        assert!(super::get_line_at_position(source, 400).is_none());
    }

    #[test]
    fn test_remove_starting_whitespace() {
        assert_eq!(
            super::remove_starting_whitespace("  \tprint(x);"),
            (String::from("print(x);"), 3)
        );
    }

    #[test]
    fn test_analyze_reports_every_resolution_error() {
        let errors = super::analyze("print(a); print(b);", "test.vcl").unwrap_err();
        assert_eq!(errors.len(), 2);
    }
}
