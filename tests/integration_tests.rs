//! Integration tests for end-to-end compilation.
//!
//! These tests run the complete pipeline, from tokenization through name
//! resolution, type computation and LLVM IR generation, then execute the
//! module in the JIT harness and compare what the program printed.

use inkwell::context::Context;
use pretty_assertions::assert_eq;
use vcalc::{
    analyze, compile_source,
    compiler::{
        compiler::{CompileOptions, RuntimeLinkage},
        runtime::{execute, Execution},
    },
    errors::errors::Error,
};

fn options() -> CompileOptions {
    CompileOptions {
        runtime: RuntimeLinkage::External,
        ..CompileOptions::named("integration")
    }
}

fn execute_source(source: &str) -> Execution {
    let context = Context::create();
    let compiler = compile_source(source, "test.vcalc", &context, options())
        .unwrap_or_else(|errors| panic!("compilation failed: {:?}", errors));
    execute(&compiler).unwrap()
}

fn output_of(source: &str) -> String {
    let execution = execute_source(source);
    assert_eq!(execution.exit_code, 0, "program faulted: {:?}", execution.fault);
    execution.output
}

fn compile_errors(source: &str) -> Vec<String> {
    let context = Context::create();
    let names = match compile_source(source, "test.vcalc", &context, options()) {
        Ok(_) => vec![],
        Err(errors) => errors
            .iter()
            .map(|error: &Error| error.get_error_name().to_string())
            .collect(),
    };
    names
}

#[test]
fn test_single_element_range() {
    assert_eq!(output_of("print(5..5);"), "[5]\n");
}

#[test]
fn test_reversed_range_is_rejected() {
    assert_eq!(compile_errors("print(3..1);"), vec!["InvalidRangeBounds"]);
}

#[test]
fn test_generator() {
    assert_eq!(output_of("print([x in 1..3 | x * 2]);"), "[2 4 6]\n");
}

#[test]
fn test_generator_preserves_domain_length() {
    assert_eq!(output_of("vector v = [i in 0..9 | 0]; print(v);"), "[0 0 0 0 0 0 0 0 0 0]\n");
}

#[test]
fn test_filter() {
    assert_eq!(output_of("print([x in 0..5 & x > 2]);"), "[3 4 5]\n");
}

#[test]
fn test_filter_keeping_nothing() {
    assert_eq!(output_of("print([x in 0..5 & x > 100]);"), "[]\n");
}

#[test]
fn test_filter_keeps_domain_order() {
    let source = "vector v = [x in 0..9 | 9 - x]; print([y in v & y / 2 * 2 == y]);";
    assert_eq!(output_of(source), "[8 6 4 2 0]\n");
}

#[test]
fn test_elementwise_vector_vector() {
    assert_eq!(output_of("print((0..2) + (10..12));"), "[10 12 14]\n");
}

#[test]
fn test_scalar_broadcast_on_either_side() {
    assert_eq!(output_of("print((0..2) + 5);"), "[5 6 7]\n");
    assert_eq!(output_of("print(10 - (1..3));"), "[9 8 7]\n");
}

#[test]
fn test_elementwise_comparison() {
    assert_eq!(output_of("print((1..5) > 2);"), "[0 0 1 1 1]\n");
}

#[test]
fn test_indexing() {
    assert_eq!(output_of("vector v = 10..20; print(v[3]); print((1..3)[0]);"), "13\n1\n");
}

#[test]
fn test_precedence() {
    assert_eq!(output_of("print(1 + 2 * 3); print((1 + 2) * 3);"), "7\n9\n");
    assert_eq!(output_of("print(1..2 + 2);"), "[3 4]\n");
}

#[test]
fn test_shadowing_in_nested_block() {
    let source = "
        int x = 1;
        if (1)
            int x = 2;
            print(x);
        fi;
        print(x);
    ";
    assert_eq!(output_of(source), "2\n1\n");
}

#[test]
fn test_comprehension_variable_shadows_outer() {
    let source = "int x = 100; print([x in 1..3 | x + 1]); print(x);";
    assert_eq!(output_of(source), "[2 3 4]\n100\n");
}

#[test]
fn test_int_assignment_from_vector_element_does_not_alias() {
    let source = "
        vector v = 1..3;
        int first = v[0];
        v = 7..9;
        print(first);
        print(v);
    ";
    assert_eq!(output_of(source), "1\n[7 8 9]\n");
}

#[test]
fn test_counting_loop() {
    let source = "
        int i = 0;
        int sum = 0;
        loop (i < 5)
            sum = sum + i;
            i = i + 1;
        pool;
        print(sum);
    ";
    assert_eq!(output_of(source), "10\n");
}

#[test]
fn test_conditional() {
    let source = "
        int x = 3;
        if (x == 3) print(1); fi;
        if (x != 3) print(2); fi;
    ";
    assert_eq!(output_of(source), "1\n");
}

#[test]
fn test_undeclared_variable() {
    assert_eq!(compile_errors("print(y);"), vec!["VariableNotDeclared"]);
}

#[test]
fn test_redeclaration() {
    assert_eq!(compile_errors("int x; int x;"), vec!["VariableAlreadyDeclared"]);
}

#[test]
fn test_type_mismatch_is_reported_before_codegen() {
    assert_eq!(compile_errors("int x = 1..3;"), vec!["TypeMatchError"]);
}

#[test]
fn test_syntax_error_stops_the_pipeline() {
    let errors = analyze("print(1", "test.vcalc").unwrap_err();
    assert_eq!(errors.len(), 1);
}

#[test]
fn test_runtime_fault_stops_execution() {
    let execution = execute_source("print(1); print((1..2) * (1..3)); print(2);");
    assert_eq!(execution.exit_code, 1);
    assert_eq!(execution.output, "1\n");
    assert!(execution.fault.is_some());
}

#[test]
fn test_redeclaration_with_self_reference() {
    assert_eq!(
        compile_errors("int x = 1; int x = x + 1;"),
        vec!["VariableAlreadyDeclared"]
    );
}

#[test]
fn test_vector_accumulated_across_loop_iterations() {
    let source = "
        vector total = [i in 1..50 | 0];
        vector step = 1..50;
        int n = 0;
        loop (n < 100000)
            total = total + step;
            n = n + 1;
        pool;
        print(total[0]);
        print(total[49]);
        print(step[49]);
    ";
    assert_eq!(output_of(source), "100000\n5000000\n50\n");
}

#[test]
fn test_minimum_divided_by_minus_one_faults() {
    let execution = execute_source("int m = 0 - 9223372036854775807 - 1; print(m / (0 - 1)); print(2);");
    assert_eq!(execution.exit_code, 5);
    assert_eq!(execution.output, "");
    assert!(execution.fault.is_some());
}
