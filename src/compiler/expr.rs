use inkwell::{values::IntValue, IntPredicate};
use tracing::trace;

use crate::{
    ast::{
        ast::{NodeId, NodeKind, Operator},
        types::Type,
    },
    errors::errors::{Error, ErrorImpl},
};

use super::{
    compiler::{Compiler, Storage, Value, VectorValue},
    runtime::RuntimeFault,
    vector::{gen_elementwise, gen_filter, gen_generator, gen_range},
};

/// Lowers an expression node and records the result as the node's emitted
/// value. A node lowered more than once keeps its first value.
pub fn gen_expression<'a>(compiler: &mut Compiler<'a>, id: NodeId) -> Result<Value<'a>, Error> {
    let value = match compiler.ast.kind(id) {
        NodeKind::Expression => {
            let inner = child(compiler, id, 0)?;
            compiler.num_expr_ancestors += 1;
            let value = gen_expression(compiler, inner);
            compiler.num_expr_ancestors -= 1;
            value?
        }
        NodeKind::Parenthesis => {
            let inner = child(compiler, id, 0)?;
            gen_expression(compiler, inner)?
        }
        NodeKind::IntegerLiteral => Value::Int(compiler.i64_const(literal_value(compiler, id)?)),
        NodeKind::Identifier => gen_identifier(compiler, id)?,
        NodeKind::Range => gen_range(compiler, id)?,
        NodeKind::Index => gen_index(compiler, id)?,
        NodeKind::Generator => gen_generator(compiler, id)?,
        NodeKind::Filter => gen_filter(compiler, id)?,
        NodeKind::BinaryOp(operator) => gen_binary(compiler, id, operator)?,
        kind => {
            return Err(Error::codegen(
                format!("{} is not an expression", kind),
                compiler.position_of(id),
            ))
        }
    };

    compiler.emitted.entry(id).or_insert(value);
    Ok(value)
}

pub fn child(compiler: &Compiler, id: NodeId, index: usize) -> Result<NodeId, Error> {
    compiler.ast.child(id, index).ok_or_else(|| {
        Error::codegen(
            format!("{} is missing operand {}", compiler.ast.kind(id), index),
            compiler.position_of(id),
        )
    })
}

fn literal_value(compiler: &Compiler, id: NodeId) -> Result<i64, Error> {
    let text = compiler.ast.node(id).text();
    text.parse::<i64>().map_err(|_| {
        Error::new(
            ErrorImpl::NumberParseError {
                token: text.to_string(),
            },
            compiler.position_of(id),
        )
    })
}

/// Value of an expression built only from literals, parentheses and
/// `+ - * /`, if it can be computed without running the program.
pub fn constant_value(compiler: &Compiler, id: NodeId) -> Option<i64> {
    match compiler.ast.kind(id) {
        NodeKind::IntegerLiteral => literal_value(compiler, id).ok(),
        NodeKind::Expression | NodeKind::Parenthesis => {
            constant_value(compiler, compiler.ast.child(id, 0)?)
        }
        NodeKind::BinaryOp(operator) => {
            let left = constant_value(compiler, compiler.ast.child(id, 0)?)?;
            let right = constant_value(compiler, compiler.ast.child(id, 1)?)?;
            match operator {
                Operator::Add => left.checked_add(right),
                Operator::Sub => left.checked_sub(right),
                Operator::Mul => left.checked_mul(right),
                Operator::Div => left.checked_div(right),
                _ => None,
            }
        }
        _ => None,
    }
}

pub fn expect_int<'a>(compiler: &Compiler<'a>, value: Value<'a>, id: NodeId) -> Result<IntValue<'a>, Error> {
    match value {
        Value::Int(value) => Ok(value),
        Value::Vector(_) => Err(Error::new(
            ErrorImpl::TypeMatchError {
                expected: Type::Int.to_string(),
                received: Type::Vector.to_string(),
            },
            compiler.position_of(id),
        )),
    }
}

pub fn expect_vector<'a>(compiler: &Compiler<'a>, value: Value<'a>, id: NodeId) -> Result<VectorValue<'a>, Error> {
    match value {
        Value::Vector(value) => Ok(value),
        Value::Int(_) => Err(Error::new(
            ErrorImpl::TypeMatchError {
                expected: Type::Vector.to_string(),
                received: Type::Int.to_string(),
            },
            compiler.position_of(id),
        )),
    }
}

/// Integer variables are loaded; vector variables yield their current
/// allocation without copying.
///
/// Only value references are lowered here. Declaration and assignment
/// targets never sit below an `Expression` node.
fn gen_identifier<'a>(compiler: &mut Compiler<'a>, id: NodeId) -> Result<Value<'a>, Error> {
    let symbol = compiler.ast.node(id).symbol;
    let name = compiler.ast.node(id).text().to_string();

    if compiler.num_expr_ancestors == 0 {
        return Err(Error::codegen(
            format!("`{}` is not inside an expression", name),
            compiler.position_of(id),
        ));
    }

    match compiler.storage_of(symbol, id)? {
        Storage::Int(slot) => Ok(Value::Int(compiler.load_int(slot, &name)?)),
        Storage::Vector { data, len, .. } => {
            let data = compiler
                .builder
                .build_load(data, &format!("{}.data", name))?
                .into_pointer_value();
            let len = compiler.load_int(len, &format!("{}.len", name))?;
            Ok(Value::Vector(VectorValue { data, len }))
        }
    }
}

fn gen_index<'a>(compiler: &mut Compiler<'a>, id: NodeId) -> Result<Value<'a>, Error> {
    let base_id = child(compiler, id, 0)?;
    let index_id = child(compiler, id, 1)?;

    let base = gen_expression(compiler, base_id)?;
    let base = expect_vector(compiler, base, base_id)?;
    let index = gen_expression(compiler, index_id)?;
    let index = expect_int(compiler, index, index_id)?;

    // Unsigned comparison also catches negative indices.
    let out_of_bounds = compiler
        .builder
        .build_int_compare(IntPredicate::UGE, index, base.len, "oob")?;
    compiler.build_fault_check(out_of_bounds, RuntimeFault::IndexOutOfBounds, (index, base.len))?;

    Ok(Value::Int(compiler.load_element(base, index)?))
}

fn gen_binary<'a>(compiler: &mut Compiler<'a>, id: NodeId, operator: Operator) -> Result<Value<'a>, Error> {
    let left_id = child(compiler, id, 0)?;
    let right_id = child(compiler, id, 1)?;

    let left = gen_expression(compiler, left_id)?;
    let right = gen_expression(compiler, right_id)?;

    let promote_left = compiler.ast.node(left_id).promote_to_type == Some(Type::Vector);
    let promote_right = compiler.ast.node(right_id).promote_to_type == Some(Type::Vector);

    match (left, right) {
        (Value::Int(left), Value::Int(right)) => {
            Ok(Value::Int(build_scalar_op(compiler, operator, left, right)?))
        }
        (Value::Int(_), Value::Vector(_)) if !promote_left => Err(missing_promotion(compiler, left_id)),
        (Value::Vector(_), Value::Int(_)) if !promote_right => Err(missing_promotion(compiler, right_id)),
        (left, right) => {
            trace!(operator = operator.symbol(), promote_left, promote_right, "elementwise");
            gen_elementwise(compiler, id, operator, left, right)
        }
    }
}

fn missing_promotion(compiler: &Compiler, id: NodeId) -> Error {
    Error::codegen(
        "scalar operand of a vector operator was not marked for promotion",
        compiler.position_of(id),
    )
}

/// The scalar form of every binary operator. Comparisons yield 0 or 1.
pub fn build_scalar_op<'a>(
    compiler: &mut Compiler<'a>,
    operator: Operator,
    left: IntValue<'a>,
    right: IntValue<'a>,
) -> Result<IntValue<'a>, Error> {
    let builder = &compiler.builder;

    let value = match operator {
        Operator::Add => builder.build_int_add(left, right, "add")?,
        Operator::Sub => builder.build_int_sub(left, right, "sub")?,
        Operator::Mul => builder.build_int_mul(left, right, "mul")?,
        Operator::Div => {
            let is_zero = builder.build_int_compare(
                IntPredicate::EQ,
                right,
                compiler.i64_const(0),
                "div.zero",
            )?;
            compiler.build_fault_check(is_zero, RuntimeFault::DivisionByZero, (left, right))?;

            // i64::MIN / -1 does not fit in i64.
            let builder = &compiler.builder;
            let is_min = builder.build_int_compare(
                IntPredicate::EQ,
                left,
                compiler.i64_const(i64::MIN),
                "div.min",
            )?;
            let is_negative_one = builder.build_int_compare(
                IntPredicate::EQ,
                right,
                compiler.i64_const(-1),
                "div.neg1",
            )?;
            let overflows = builder.build_and(is_min, is_negative_one, "div.overflow")?;
            compiler.build_fault_check(overflows, RuntimeFault::DivisionOverflow, (left, right))?;

            compiler.builder.build_int_signed_div(left, right, "div")?
        }
        Operator::GreaterThan | Operator::LessThan | Operator::Equal | Operator::NotEqual => {
            let predicate = match operator {
                Operator::GreaterThan => IntPredicate::SGT,
                Operator::LessThan => IntPredicate::SLT,
                Operator::Equal => IntPredicate::EQ,
                _ => IntPredicate::NE,
            };
            let flag = builder.build_int_compare(predicate, left, right, "cmp")?;
            builder.build_int_z_extend(flag, compiler.context.i64_type(), "cmp.int")?
        }
    };

    Ok(value)
}
