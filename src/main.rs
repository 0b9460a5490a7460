use std::{env, fs::read_to_string, io::Write, path::{Path, PathBuf}, process::ExitCode, time::Instant};

use inkwell::context::Context;
use tracing::info;
use vcalc::{
    analyze,
    compiler::{
        compiler::{compile, CompileOptions, RuntimeLinkage},
        runtime::execute,
    },
    display_error,
    errors::errors::Error,
    init_tracing,
};

const USAGE: &str = "usage: vcalc <input> <output>\n       vcalc --run <input>";

enum Mode {
    Emit { input: String, output: String },
    Run { input: String },
}

fn main() -> ExitCode {
    init_tracing();

    let args: Vec<String> = env::args().skip(1).collect();
    let mode = match args.as_slice() {
        [flag, input] if flag == "--run" => Mode::Run {
            input: input.clone(),
        },
        [input, output] => Mode::Emit {
            input: input.clone(),
            output: output.clone(),
        },
        _ => {
            eprintln!("{}", USAGE);
            return ExitCode::from(2);
        }
    };

    let input = match &mode {
        Mode::Emit { input, .. } | Mode::Run { input } => input.clone(),
    };

    let file_name = Path::new(&input)
        .file_name()
        .map(|name| name.to_string_lossy().into_owned())
        .unwrap_or_else(|| input.clone());

    let source = match read_to_string(&input) {
        Ok(source) => source,
        Err(error) => {
            eprintln!("Failed to read `{}`: {}", input, error);
            return ExitCode::FAILURE;
        }
    };

    let start = Instant::now();

    let (ast, symbols) = match analyze(&source, &file_name) {
        Ok(analysis) => analysis,
        Err(errors) => return report(&errors, &source, &input),
    };

    info!(elapsed = ?start.elapsed(), "analysed");

    let mut options = CompileOptions::named(&file_name);
    if let Mode::Run { .. } = mode {
        options.runtime = RuntimeLinkage::External;
    }

    let context = Context::create();
    let compile_start = Instant::now();
    let compiled = match compile(ast, symbols, &context, options) {
        Ok(compiled) => compiled,
        Err(error) => return report(&[error], &source, &input),
    };

    info!(elapsed = ?compile_start.elapsed(), "compiled");
    info!(elapsed = ?start.elapsed(), "total time for IR generation");

    match mode {
        Mode::Emit { output, .. } => {
            if let Err(error) = compiled.save_module_to_file(PathBuf::from(&output)) {
                return report(&[error], &source, &input);
            }
            info!(output = %output, "wrote module");
            ExitCode::SUCCESS
        }
        Mode::Run { .. } => {
            let execution = match execute(&compiled) {
                Ok(execution) => execution,
                Err(error) => return report(&[error], &source, &input),
            };

            print!("{}", execution.output);
            let _ = std::io::stdout().flush();

            if let Some(fault) = &execution.fault {
                eprintln!(
                    "runtime error: {} ({}, {})",
                    fault.message, fault.operands.0, fault.operands.1
                );
            }

            info!(elapsed = ?start.elapsed(), exit_code = execution.exit_code, "executed");
            ExitCode::from(execution.exit_code.clamp(0, 255) as u8)
        }
    }
}

fn report(errors: &[Error], source: &str, file: &str) -> ExitCode {
    for error in errors {
        display_error(error, source, file);
    }
    ExitCode::FAILURE
}
