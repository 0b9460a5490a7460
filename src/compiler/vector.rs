//! Lowering of vector-producing expressions: ranges, generators, filters and
//! elementwise binary operators. Every result is a fresh stack allocation.

use inkwell::{
    values::{IntValue, PointerValue},
    IntPredicate,
};
use tracing::trace;

use crate::{
    ast::ast::{NodeId, Operator},
    errors::errors::{Error, ErrorImpl},
};

use super::{
    compiler::{Compiler, Storage, Value, VectorValue},
    expr::{build_scalar_op, child, constant_value, expect_int, expect_vector, gen_expression},
    runtime::RuntimeFault,
};

/// Ranges no longer than this with constant bounds are stored element by
/// element; longer ones use a fill loop.
const UNROLLED_RANGE_LIMIT: i64 = 64;

/// `lower..upper`, both bounds inclusive.
pub fn gen_range<'a>(compiler: &mut Compiler<'a>, id: NodeId) -> Result<Value<'a>, Error> {
    let lower_id = child(compiler, id, 0)?;
    let upper_id = child(compiler, id, 1)?;

    let constant_bounds = constant_value(compiler, lower_id).zip(constant_value(compiler, upper_id));

    let lower = gen_expression(compiler, lower_id)?;
    let lower = expect_int(compiler, lower, lower_id).map_err(|_| range_bound_error(compiler, lower_id))?;
    let upper = gen_expression(compiler, upper_id)?;
    let upper = expect_int(compiler, upper, upper_id).map_err(|_| range_bound_error(compiler, upper_id))?;

    if let Some((low, high)) = constant_bounds {
        if high < low {
            return Err(Error::new(
                ErrorImpl::InvalidRangeBounds {
                    lower: low,
                    upper: high,
                },
                compiler.position_of(id),
            ));
        }

        let count = high
            .checked_sub(low)
            .and_then(|span| span.checked_add(1))
            .ok_or_else(|| Error::codegen("range is too large", compiler.position_of(id)))?;
        trace!(low, high, "constant range");

        if count <= UNROLLED_RANGE_LIMIT {
            let vector = compiler.alloc_vector(compiler.i64_const(count), "range")?;
            for offset in 0..count {
                compiler.store_element(
                    vector,
                    compiler.i64_const(offset),
                    compiler.i64_const(low + offset),
                )?;
            }
            return Ok(Value::Vector(vector));
        }
    }

    let span = compiler.builder.build_int_sub(upper, lower, "range.span")?;
    let count = compiler
        .builder
        .build_int_add(span, compiler.i64_const(1), "range.len")?;

    if constant_bounds.is_none() {
        // A reversed range, or one whose length does not fit in i64, wraps
        // to a count below 1.
        let reversed = compiler
            .builder
            .build_int_compare(IntPredicate::SLT, upper, lower, "range.reversed")?;
        let too_long = compiler.builder.build_int_compare(
            IntPredicate::SLT,
            count,
            compiler.i64_const(1),
            "range.too.long",
        )?;
        let invalid = compiler.builder.build_or(reversed, too_long, "range.invalid")?;
        compiler.build_fault_check(invalid, RuntimeFault::InvalidRangeBounds, (lower, upper))?;
    }

    let vector = compiler.alloc_vector(count, "range")?;

    compiler.build_counted_loop(count, "range", |compiler, index| {
        let value = compiler.builder.build_int_add(lower, index, "range.value")?;
        compiler.store_element(vector, index, value)
    })?;

    Ok(Value::Vector(vector))
}

fn range_bound_error(compiler: &Compiler, id: NodeId) -> Error {
    Error::codegen("range bounds must be int", compiler.position_of(id))
}

/// Gives the bound variable a fresh integer slot and lowers the domain of a
/// comprehension.
///
/// The domain is resolved inside the comprehension scope, so it may name
/// the bound variable; it reads as 0 there.
fn comprehension_domain<'a>(
    compiler: &mut Compiler<'a>,
    id: NodeId,
) -> Result<(VectorValue<'a>, PointerValue<'a>), Error> {
    let bound_id = child(compiler, id, 0)?;
    let domain_id = child(compiler, id, 1)?;

    let symbol = compiler.ast.node(bound_id).symbol.ok_or_else(|| {
        Error::codegen("comprehension variable was not resolved", compiler.position_of(bound_id))
    })?;
    let name = compiler.ast.node(bound_id).text().to_string();
    let slot = compiler.build_int_slot(&name, compiler.i64_const(0))?;
    compiler.storage.insert(symbol, Storage::Int(slot));

    let domain = gen_expression(compiler, domain_id)?;
    let domain = expect_vector(compiler, domain, domain_id)?;

    Ok((domain, slot))
}

/// `[x in domain | body]`: one result element per domain element.
pub fn gen_generator<'a>(compiler: &mut Compiler<'a>, id: NodeId) -> Result<Value<'a>, Error> {
    let body_id = child(compiler, id, 2)?;
    let (domain, bound) = comprehension_domain(compiler, id)?;

    let result = compiler.alloc_vector(domain.len, "gen")?;

    compiler.build_counted_loop(domain.len, "gen", |compiler, index| {
        let element = compiler.load_element(domain, index)?;
        compiler.builder.build_store(bound, element)?;

        let value = gen_expression(compiler, body_id)?;
        let value = expect_int(compiler, value, body_id)?;
        compiler.store_element(result, index, value)
    })?;

    Ok(Value::Vector(result))
}

/// `[x in domain & predicate]`.
///
/// The result length is only known after every element has been tested,
/// so the domain is walked twice: once to count matches, once to copy
/// them into a result of that size. Domain order is preserved.
pub fn gen_filter<'a>(compiler: &mut Compiler<'a>, id: NodeId) -> Result<Value<'a>, Error> {
    let predicate_id = child(compiler, id, 2)?;
    let (domain, bound) = comprehension_domain(compiler, id)?;

    let count_slot = compiler.build_int_slot("filter.count", compiler.i64_const(0))?;

    compiler.build_counted_loop(domain.len, "filter.count", |compiler, index| {
        let element = compiler.load_element(domain, index)?;
        compiler.builder.build_store(bound, element)?;

        let keep = predicate(compiler, predicate_id)?;
        let keep = compiler
            .builder
            .build_int_z_extend(keep, compiler.context.i64_type(), "keep.int")?;
        let count = compiler.load_int(count_slot, "count")?;
        let count = compiler.builder.build_int_add(count, keep, "count.next")?;
        compiler.builder.build_store(count_slot, count)?;
        Ok(())
    })?;

    let count = compiler.load_int(count_slot, "filter.len")?;
    let result = compiler.alloc_vector(count, "filter")?;
    let write_slot = compiler.build_int_slot("filter.write", compiler.i64_const(0))?;

    compiler.build_counted_loop(domain.len, "filter.fill", |compiler, index| {
        let element = compiler.load_element(domain, index)?;
        compiler.builder.build_store(bound, element)?;

        let keep = predicate(compiler, predicate_id)?;
        let keep_block = compiler.append_block("filter.keep")?;
        let next_block = compiler.append_block("filter.next")?;
        compiler
            .builder
            .build_conditional_branch(keep, keep_block, next_block)?;

        compiler.builder.position_at_end(keep_block);
        let write = compiler.load_int(write_slot, "write")?;
        compiler.store_element(result, write, element)?;
        let write = compiler
            .builder
            .build_int_add(write, compiler.i64_const(1), "write.next")?;
        compiler.builder.build_store(write_slot, write)?;
        compiler.builder.build_unconditional_branch(next_block)?;

        compiler.builder.position_at_end(next_block);
        Ok(())
    })?;

    Ok(Value::Vector(result))
}

/// Lowers a filter predicate to an `i1` that is set for nonzero values.
fn predicate<'a>(compiler: &mut Compiler<'a>, id: NodeId) -> Result<IntValue<'a>, Error> {
    let value = gen_expression(compiler, id)?;
    let value = expect_int(compiler, value, id)?;
    Ok(compiler
        .builder
        .build_int_compare(IntPredicate::NE, value, compiler.i64_const(0), "keep")?)
}

/// Elementwise binary operator with at least one vector operand. A scalar
/// operand is broadcast by reusing its value for every element.
pub fn gen_elementwise<'a>(
    compiler: &mut Compiler<'a>,
    id: NodeId,
    operator: Operator,
    left: Value<'a>,
    right: Value<'a>,
) -> Result<Value<'a>, Error> {
    let len = match (left, right) {
        (Value::Vector(left), Value::Vector(right)) => {
            if compiler.options.check_lengths {
                let mismatch = compiler.builder.build_int_compare(
                    IntPredicate::NE,
                    left.len,
                    right.len,
                    "len.mismatch",
                )?;
                compiler.build_fault_check(mismatch, RuntimeFault::LengthMismatch, (left.len, right.len))?;
            }
            left.len
        }
        (Value::Vector(vector), Value::Int(_)) | (Value::Int(_), Value::Vector(vector)) => vector.len,
        (Value::Int(_), Value::Int(_)) => {
            return Err(Error::codegen(
                "elementwise operator needs a vector operand",
                compiler.position_of(id),
            ))
        }
    };

    let result = compiler.alloc_vector(len, "binop")?;

    compiler.build_counted_loop(len, "binop", |compiler, index| {
        let left = operand(compiler, left, index)?;
        let right = operand(compiler, right, index)?;
        let value = build_scalar_op(compiler, operator, left, right)?;
        compiler.store_element(result, index, value)
    })?;

    Ok(Value::Vector(result))
}

fn operand<'a>(
    compiler: &Compiler<'a>,
    value: Value<'a>,
    index: IntValue<'a>,
) -> Result<IntValue<'a>, Error> {
    match value {
        Value::Int(scalar) => Ok(scalar),
        Value::Vector(vector) => compiler.load_element(vector, index),
    }
}
