//! Unit tests for code generation.
//!
//! Programs are compiled with the runtime hooks left external and run in
//! the JIT harness, which captures what they print.

use inkwell::context::Context;
use pretty_assertions::assert_eq;

use super::{
    compiler::{CompileOptions, RuntimeLinkage},
    expr::gen_expression,
    runtime::{execute, Execution, RuntimeFault},
};
use crate::{ast::ast::NodeKind, compile_source, errors::errors::Error};

fn external() -> CompileOptions {
    CompileOptions {
        runtime: RuntimeLinkage::External,
        ..CompileOptions::named("test")
    }
}

fn ir_of(source: &str, options: CompileOptions) -> Result<String, Vec<Error>> {
    let context = Context::create();
    let compiler = compile_source(source, "test.vcalc", &context, options)?;
    Ok(compiler.ir())
}

fn run_with(source: &str, options: CompileOptions) -> Execution {
    let context = Context::create();
    let compiler = compile_source(source, "test.vcalc", &context, options).unwrap();
    execute(&compiler).unwrap()
}

fn run(source: &str) -> Execution {
    run_with(source, external())
}

#[test]
fn test_main_returns_zero() {
    let execution = run("int x = 1;");
    assert_eq!(execution.exit_code, 0);
    assert_eq!(execution.output, "");
    assert!(execution.fault.is_none());
}

#[test]
fn test_ir_declares_main_and_named_slots() {
    let ir = ir_of("int total = 3; vector v = 1..3;", external()).unwrap();

    assert!(ir.contains("define i32 @main()"));
    assert!(ir.contains("%total.0 = alloca i64"));
    assert!(ir.contains("v.data"));
    assert!(ir.contains("v.len"));
    assert!(ir.contains("declare void @vcalc_print_int(i64)"));
}

#[test]
fn test_embedded_runtime_defines_hooks_with_printf() {
    let ir = ir_of("print(1);", CompileOptions::named("test")).unwrap();

    assert!(ir.contains("@printf"));
    assert!(ir.contains("define void @vcalc_print_int(i64"));
    assert!(!ir.contains("declare void @vcalc_print_int"));
}

#[test]
fn test_module_name() {
    let ir = ir_of("int x;", external()).unwrap();
    assert!(ir.contains("; ModuleID = 'test'"));
}

#[test]
fn test_print_int() {
    assert_eq!(run("print(2 + 3 * 4);").output, "14\n");
}

#[test]
fn test_print_negative_result() {
    assert_eq!(run("print(1 - 5);").output, "-4\n");
}

#[test]
fn test_integer_division_truncates() {
    assert_eq!(run("print(7 / 2); print((0 - 7) / 2);").output, "3\n-3\n");
}

#[test]
fn test_comparisons_yield_zero_or_one() {
    assert_eq!(
        run("print(1 < 2); print(2 < 1); print(3 == 3); print(3 != 3); print(4 > 1);").output,
        "1\n0\n1\n0\n1\n"
    );
}

#[test]
fn test_print_vector() {
    assert_eq!(run("print(1..3);").output, "[1 2 3]\n");
}

#[test]
fn test_print_empty_vector() {
    assert_eq!(run("vector v; print(v);").output, "[]\n");
}

#[test]
fn test_default_int_is_zero() {
    assert_eq!(run("int x; print(x);").output, "0\n");
}

#[test]
fn test_large_constant_range_uses_fill_loop() {
    let ir = ir_of("vector v = 1..100;", external()).unwrap();
    assert!(ir.contains("range.cond"));

    let execution = run("vector v = 1..100; print(v[0]); print(v[99]);");
    assert_eq!(execution.output, "1\n100\n");
}

#[test]
fn test_small_constant_range_is_unrolled() {
    let ir = ir_of("vector v = 1..3;", external()).unwrap();
    assert!(!ir.contains("range.cond"));
}

#[test]
fn test_constant_range_with_reversed_bounds_is_an_error() {
    let errors = ir_of("vector v = 3..1;", external()).unwrap_err();
    assert_eq!(errors.len(), 1);
    assert_eq!(errors[0].get_error_name(), "InvalidRangeBounds");
}

#[test]
fn test_constant_arithmetic_bounds_are_checked() {
    let errors = ir_of("vector v = (2 + 2)..(1 * 3);", external()).unwrap_err();
    assert_eq!(errors[0].get_error_name(), "InvalidRangeBounds");
}

#[test]
fn test_range_with_variable_bounds() {
    let execution = run("int n = 4; print(2..n);");
    assert_eq!(execution.output, "[2 3 4]\n");
}

#[test]
fn test_range_with_reversed_variable_bounds_faults() {
    let execution = run("int n = 0; print(1); print(3..n); print(2);");

    assert_eq!(execution.exit_code, RuntimeFault::InvalidRangeBounds.code() as i32);
    assert_eq!(execution.output, "1\n");

    let fault = execution.fault.unwrap();
    assert_eq!(fault.fault, Some(RuntimeFault::InvalidRangeBounds));
    assert_eq!(fault.message, "invalid range bounds");
    assert_eq!(fault.operands, (3, 0));
}

#[test]
fn test_division_by_zero_faults() {
    let execution = run("int z = 0; print(1 / z);");

    assert_eq!(execution.exit_code, 3);
    assert_eq!(execution.output, "");
    assert_eq!(execution.fault.unwrap().fault, Some(RuntimeFault::DivisionByZero));
}

#[test]
fn test_index_out_of_bounds_faults() {
    let execution = run("vector v = 1..3; print(v[3]);");

    assert_eq!(execution.exit_code, 4);
    let fault = execution.fault.unwrap();
    assert_eq!(fault.fault, Some(RuntimeFault::IndexOutOfBounds));
    assert_eq!(fault.operands, (3, 3));
}

#[test]
fn test_negative_index_faults() {
    let execution = run("vector v = 1..3; print(v[0 - 1]);");
    assert_eq!(execution.exit_code, 4);
}

#[test]
fn test_length_mismatch_faults() {
    let execution = run("print((1..3) + (1..4));");

    assert_eq!(execution.exit_code, 1);
    let fault = execution.fault.unwrap();
    assert_eq!(fault.fault, Some(RuntimeFault::LengthMismatch));
    assert_eq!(fault.operands, (3, 4));
}

#[test]
fn test_length_checks_can_be_disabled() {
    let options = CompileOptions {
        check_lengths: false,
        ..external()
    };
    let ir = ir_of("vector v = (1..3) + (1..4);", options).unwrap();
    assert!(!ir.contains("len.mismatch"));
}

#[test]
fn test_emitted_values_are_recorded() {
    let context = Context::create();
    let compiler = compile_source("print(1 + 2);", "test.vcalc", &context, external()).unwrap();

    let expression = compiler
        .ast
        .ids()
        .find(|id| compiler.ast.kind(*id) == NodeKind::Expression)
        .unwrap();
    assert!(compiler.emitted.contains_key(&expression));
}

#[test]
fn test_conditional_branches_on_nonzero() {
    assert_eq!(
        run("if (1) print(1); fi; if (0) print(2); fi; if (5) print(3); fi;").output,
        "1\n3\n"
    );
}

#[test]
fn test_loop_runs_until_condition_is_zero() {
    let execution = run("int i = 0; loop (i < 3) print(i); i = i + 1; pool;");
    assert_eq!(execution.output, "0\n1\n2\n");
}

#[test]
fn test_loop_with_false_condition_never_runs() {
    assert_eq!(run("loop (0) print(1); pool; print(2);").output, "2\n");
}

#[test]
fn test_nested_control_flow() {
    let source = "
        int i = 0;
        loop (i < 4)
            if (i == 1) print(10); fi;
            if (i > 2) print(i); fi;
            i = i + 1;
        pool;
    ";
    assert_eq!(run(source).output, "10\n3\n");
}

#[test]
fn test_vector_assignment_rebinds() {
    let source = "vector v = 1..3; v = 10..11; print(v); v = [x in v | x * 2]; print(v);";
    assert_eq!(run(source).output, "[10 11]\n[20 22]\n");
}

#[test]
fn test_generator_inside_loop() {
    let source = "
        int n = 1;
        loop (n < 4)
            print([x in 1..n | x * n]);
            n = n + 1;
        pool;
    ";
    assert_eq!(run(source).output, "[1]\n[2 4]\n[3 6 9]\n");
}

#[test]
fn test_division_overflow_faults() {
    let execution = run("int m = 0 - 9223372036854775807 - 1; int d = 0 - 1; print(1); print(m / d);");

    assert_eq!(execution.exit_code, RuntimeFault::DivisionOverflow.code() as i32);
    assert_eq!(execution.output, "1\n");

    let fault = execution.fault.unwrap();
    assert_eq!(fault.fault, Some(RuntimeFault::DivisionOverflow));
    assert_eq!(fault.message, "division overflow");
    assert_eq!(fault.operands, (i64::MIN, -1));
}

#[test]
fn test_elementwise_division_overflow_faults() {
    let execution = run("int m = 0 - 9223372036854775807 - 1; print((1..2) * m / (0 - 1));");
    assert_eq!(execution.exit_code, 5);
}

#[test]
fn test_range_too_long_for_i64_faults() {
    let execution = run("int a = 0 - 9000000000000000000; int b = 9000000000000000000; print(a..b);");

    assert_eq!(execution.exit_code, RuntimeFault::InvalidRangeBounds.code() as i32);
    assert_eq!(execution.output, "");
    assert_eq!(
        execution.fault.unwrap().operands,
        (-9000000000000000000, 9000000000000000000)
    );

    let execution = run("int a = 0 - 9223372036854775807 - 1; int b = 9223372036854775807; print(a..b);");
    assert_eq!(execution.exit_code, 2);
}

#[test]
fn test_identifier_outside_expression_is_rejected() {
    let context = Context::create();
    let mut compiler = compile_source("int x = 1; print(x);", "test.vcalc", &context, external()).unwrap();

    let identifier = compiler
        .ast
        .ids()
        .filter(|id| compiler.ast.kind(*id) == NodeKind::Identifier && compiler.ast.node(*id).text() == "x")
        .last()
        .unwrap();
    assert_eq!(compiler.num_expr_ancestors, 0);

    let error = gen_expression(&mut compiler, identifier).unwrap_err();
    assert_eq!(error.get_error_name(), "CodegenError");
}

#[test]
fn test_loop_bodies_release_stack() {
    let ir = ir_of("int i = 0; loop (i < 3) print(1..i); i = i + 1; pool;", external()).unwrap();
    assert!(ir.contains("call i8* @llvm.stacksave()"));
    assert!(ir.contains("call void @llvm.stackrestore(i8*"));
}

#[test]
fn test_filter_with_range_per_element() {
    // Each predicate evaluation allocates a 100 element range.
    let execution = run("print([x in 1..50000 & (x..x + 99)[0] == 50000]);");
    assert_eq!(execution.exit_code, 0);
    assert_eq!(execution.output, "[50000]\n");
}

#[test]
fn test_loop_condition_allocations_are_released() {
    let source = "int i = 0; loop ((i..i + 99)[0] < 100000) i = i + 1; pool; print(i);";
    assert_eq!(run(source).output, "100000\n");
}

#[test]
fn test_vector_assigned_in_long_loop() {
    let source = "
        int i = 0;
        vector v = 1..100;
        loop (i < 200000)
            v = v + 1;
            i = i + 1;
        pool;
        print(v[0]);
        print(v[99]);
    ";
    let execution = run(source);
    assert_eq!(execution.exit_code, 0);
    assert_eq!(execution.output, "200001\n200100\n");
}

#[test]
fn test_loop_assignment_uses_heap_buffer() {
    let ir = ir_of("vector v; int i = 0; loop (i < 2) v = 1..3; i = i + 1; pool;", external()).unwrap();

    assert!(ir.contains("v.heap"));
    assert!(ir.contains("call i8* @realloc("));
    assert!(ir.contains("call void @free("));
}

#[test]
fn test_heap_buffer_grows_and_shrinks() {
    let source = "
        vector v;
        int i = 1;
        loop (i < 4)
            v = 1..i;
            i = i + 1;
        pool;
        print(v);
        loop (i > 1)
            i = i - 1;
            v = [x in 1..i | x * 10];
        pool;
        print(v);
    ";
    assert_eq!(run(source).output, "[1 2 3]\n[10]\n");
}

#[test]
fn test_copied_vector_keeps_its_elements() {
    let source = "
        vector v = 1..3;
        vector w = v;
        int i = 0;
        loop (i < 2)
            v = v + 1;
            i = i + 1;
        pool;
        print(w);
        print(v);
    ";
    assert_eq!(run(source).output, "[1 2 3]\n[3 4 5]\n");
}

#[test]
fn test_loop_assignment_between_vectors_copies() {
    let source = "
        vector v = 1..3;
        vector w;
        int i = 0;
        loop (i < 2)
            w = (v);
            v = v + 1;
            i = i + 1;
        pool;
        print(w);
        print(v);
    ";
    assert_eq!(run(source).output, "[2 3 4]\n[3 4 5]\n");
}

#[test]
fn test_vector_declared_in_loop_assigned_in_inner_loop() {
    let source = "
        int i = 0;
        loop (i < 3)
            vector row = 0..0;
            int j = 0;
            loop (j < i)
                row = row + 1;
                j = j + 1;
            pool;
            print(row);
            i = i + 1;
        pool;
    ";
    assert_eq!(run(source).output, "[0]\n[1]\n[2]\n");
}
