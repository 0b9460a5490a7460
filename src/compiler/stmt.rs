use inkwell::{
    basic_block::BasicBlock,
    values::{IntValue, PointerValue},
    AddressSpace, IntPredicate,
};
use tracing::trace;

use crate::{
    ast::{
        ast::{NodeId, NodeKind},
        types::Type,
    },
    errors::errors::Error,
    type_checker::symbol_table::SymbolId,
    Position,
};

use super::{
    compiler::{Compiler, HeapBuffer, Storage, Value, VectorValue},
    expr::{child, expect_int, expect_vector, gen_expression},
    runtime::{PRINT_INT, PRINT_VECTOR_BEGIN, PRINT_VECTOR_ELEMENT, PRINT_VECTOR_END, REALLOC},
};

pub fn gen_statement<'a>(compiler: &mut Compiler<'a>, statement: NodeId) -> Result<(), Error> {
    match compiler.ast.kind(statement) {
        NodeKind::VarDeclaration => gen_declaration(compiler, statement),
        NodeKind::Assignment => gen_assignment(compiler, statement),
        NodeKind::Conditional => gen_conditional(compiler, statement),
        NodeKind::Loop => gen_loop(compiler, statement),
        NodeKind::Print => gen_print(compiler, statement),
        NodeKind::Block => {
            // Blocks only appear under `if` and `loop`, which lower them
            // with an explicit exit.
            let after = compiler.append_block("after")?;
            let block = gen_block(compiler, statement, after, None)?;
            compiler.builder.build_unconditional_branch(block)?;
            compiler.builder.position_at_end(after);
            Ok(())
        }
        kind => Err(Error::codegen(
            format!("{} is not a statement", kind),
            compiler.position_of(statement),
        )),
    }
}

/// Lowers the statements of `block` into a new basic block that ends by
/// jumping to `exit`, and returns that block. The builder is left where it
/// was before the call.
///
/// With `restore` set, the stack is reset to that saved pointer before the
/// jump, releasing everything the block allocated.
pub fn gen_block<'a>(
    compiler: &mut Compiler<'a>,
    block: NodeId,
    exit: BasicBlock<'a>,
    restore: Option<PointerValue<'a>>,
) -> Result<BasicBlock<'a>, Error> {
    let saved = compiler.builder.get_insert_block();

    let entry = compiler.append_block("block")?;
    compiler.builder.position_at_end(entry);

    let statements = compiler.ast.children(block).to_vec();
    trace!(statements = statements.len(), "lowering block");
    for statement in statements {
        gen_statement(compiler, statement)?;
    }
    if let Some(stack) = restore {
        compiler.build_stack_restore(stack)?;
    }
    compiler.builder.build_unconditional_branch(exit)?;

    if let Some(saved) = saved {
        compiler.builder.position_at_end(saved);
    }
    Ok(entry)
}

fn declared_symbol(compiler: &Compiler, id: NodeId) -> Result<SymbolId, Error> {
    compiler.ast.node(id).symbol.ok_or_else(|| {
        Error::codegen("declaration was not resolved", compiler.position_of(id))
    })
}

/// Whether `id` names a variable, possibly through `Expression` and
/// `Parenthesis` wrappers. Such a value is another variable's buffer.
fn aliases_variable(compiler: &Compiler, id: NodeId) -> bool {
    match compiler.ast.kind(id) {
        NodeKind::Identifier => true,
        NodeKind::Expression | NodeKind::Parenthesis => compiler
            .ast
            .child(id, 0)
            .map_or(false, |inner| aliases_variable(compiler, inner)),
        _ => false,
    }
}

/// Lowers the value of a declaration or assignment. A vector read straight
/// from another variable is copied, so no two variables share a buffer.
fn gen_stored_value<'a>(compiler: &mut Compiler<'a>, id: NodeId) -> Result<Value<'a>, Error> {
    let value = gen_expression(compiler, id)?;
    match value {
        Value::Vector(vector) if aliases_variable(compiler, id) => {
            trace!("copying aliased vector");
            Ok(Value::Vector(compiler.build_vector_clone(vector, "alias")?))
        }
        value => Ok(value),
    }
}

fn gen_declaration<'a>(compiler: &mut Compiler<'a>, id: NodeId) -> Result<(), Error> {
    let symbol = declared_symbol(compiler, id)?;
    let ty = compiler.symbols.symbol(symbol).get_type();
    let name = compiler.symbols.symbol(symbol).name.clone();

    let value = match compiler.ast.child(id, 2) {
        Some(initializer) => gen_stored_value(compiler, initializer)?,
        None => default_value(compiler, ty)?,
    };
    let value_id = compiler.ast.child(id, 2).unwrap_or(id);

    let storage = match ty {
        Type::Int => {
            let value = expect_int(compiler, value, value_id)?;
            Storage::Int(compiler.build_int_slot(&name, value)?)
        }
        Type::Vector => {
            let value = expect_vector(compiler, value, value_id)?;
            let pointer_type = compiler.context.i64_type().ptr_type(AddressSpace::default());
            let data = compiler.build_entry_alloca(pointer_type, &format!("{}.data", name))?;
            let len = compiler.build_entry_alloca(compiler.context.i64_type(), &format!("{}.len", name))?;
            compiler.builder.build_store(data, value.data)?;
            compiler.builder.build_store(len, value.len)?;
            Storage::Vector {
                data,
                len,
                depth: compiler.loop_depth,
            }
        }
    };

    compiler.storage.insert(symbol, storage);
    Ok(())
}

/// `0` for `int`, an empty allocation for `vector`.
fn default_value<'a>(compiler: &mut Compiler<'a>, ty: Type) -> Result<Value<'a>, Error> {
    match ty {
        Type::Int => Ok(Value::Int(compiler.i64_const(0))),
        Type::Vector => Ok(Value::Vector(
            compiler.alloc_vector(compiler.i64_const(0), "empty")?,
        )),
    }
}

/// Overwrites the target's storage.
///
/// A vector target is rebound to the new allocation, unless the assignment
/// sits in a `loop` nested deeper than the declaration. The allocation
/// would be released at the end of the iteration there, so the elements
/// are copied into the variable's heap buffer instead.
fn gen_assignment<'a>(compiler: &mut Compiler<'a>, id: NodeId) -> Result<(), Error> {
    let target = child(compiler, id, 0)?;
    let value_id = child(compiler, id, 1)?;

    let value = gen_stored_value(compiler, value_id)?;
    let symbol = compiler.ast.node(id).symbol;

    match compiler.storage_of(symbol, target)? {
        Storage::Int(slot) => {
            let value = expect_int(compiler, value, value_id)?;
            compiler.builder.build_store(slot, value)?;
        }
        Storage::Vector { data, len, depth } => {
            let value = expect_vector(compiler, value, value_id)?;
            let VectorValue {
                data: new_data,
                len: new_len,
            } = match symbol {
                Some(symbol) if compiler.loop_depth > depth => {
                    let name = compiler.ast.node(target).text().to_string();
                    let buffer = heap_buffer(compiler, symbol, &name)?;
                    build_heap_store(compiler, buffer, value)?
                }
                _ => value,
            };
            compiler.builder.build_store(data, new_data)?;
            compiler.builder.build_store(len, new_len)?;
        }
    }

    Ok(())
}

/// The heap buffer of `symbol`, created empty on first use.
fn heap_buffer<'a>(compiler: &mut Compiler<'a>, symbol: SymbolId, name: &str) -> Result<HeapBuffer<'a>, Error> {
    if let Some(buffer) = compiler.heap_buffers.get(&symbol) {
        return Ok(*buffer);
    }

    let pointer_type = compiler.context.i64_type().ptr_type(AddressSpace::default());
    let data = compiler.build_entry_slot(pointer_type, &format!("{}.heap", name), pointer_type.const_null())?;
    let zero = compiler.i64_const(0);
    let capacity = compiler.build_entry_slot(compiler.context.i64_type(), &format!("{}.cap", name), zero)?;

    let buffer = HeapBuffer { data, capacity };
    compiler.heap_buffers.insert(symbol, buffer);
    Ok(buffer)
}

/// Copies `value` into `buffer`, growing it first when it is too small,
/// and returns the buffer as a vector of `value.len` elements.
fn build_heap_store<'a>(
    compiler: &mut Compiler<'a>,
    buffer: HeapBuffer<'a>,
    value: VectorValue<'a>,
) -> Result<VectorValue<'a>, Error> {
    let grow_block = compiler.append_block("heap.grow")?;
    let copy_block = compiler.append_block("heap.copy")?;

    let capacity = compiler.load_int(buffer.capacity, "heap.cap")?;
    let too_small = compiler
        .builder
        .build_int_compare(IntPredicate::SGT, value.len, capacity, "heap.too.small")?;
    compiler
        .builder
        .build_conditional_branch(too_small, grow_block, copy_block)?;

    compiler.builder.position_at_end(grow_block);
    let raw_type = compiler.context.i8_type().ptr_type(AddressSpace::default());
    let pointer_type = compiler.context.i64_type().ptr_type(AddressSpace::default());
    let old = compiler
        .builder
        .build_load(buffer.data, "heap.old")?
        .into_pointer_value();
    let old = compiler.builder.build_pointer_cast(old, raw_type, "heap.old.raw")?;
    let size = compiler
        .builder
        .build_int_mul(value.len, compiler.i64_const(8), "heap.size")?;
    let grown = compiler
        .build_runtime_call(REALLOC, &[old.into(), size.into()], "heap.new")?
        .ok_or_else(|| Error::codegen("`realloc` returned nothing", Position::null()))?
        .into_pointer_value();
    let grown = compiler.builder.build_pointer_cast(grown, pointer_type, "heap.data")?;
    compiler.builder.build_store(buffer.data, grown)?;
    compiler.builder.build_store(buffer.capacity, value.len)?;
    compiler.builder.build_unconditional_branch(copy_block)?;

    compiler.builder.position_at_end(copy_block);
    let data = compiler
        .builder
        .build_load(buffer.data, "heap")?
        .into_pointer_value();
    let target = VectorValue { data, len: value.len };
    compiler.build_vector_copy(value, target)?;
    Ok(target)
}

fn gen_condition<'a>(compiler: &mut Compiler<'a>, id: NodeId) -> Result<IntValue<'a>, Error> {
    let value = gen_expression(compiler, id)?;
    let value = expect_int(compiler, value, id)?;
    Ok(compiler
        .builder
        .build_int_compare(IntPredicate::NE, value, compiler.i64_const(0), "cond")?)
}

/// `if (cond) block fi;` runs the block when the condition is nonzero.
fn gen_conditional<'a>(compiler: &mut Compiler<'a>, id: NodeId) -> Result<(), Error> {
    let condition_id = child(compiler, id, 0)?;
    let block_id = child(compiler, id, 1)?;

    let condition = gen_condition(compiler, condition_id)?;

    let merge = compiler.append_block("if.end")?;
    let then = gen_block(compiler, block_id, merge, None)?;

    compiler
        .builder
        .build_conditional_branch(condition, then, merge)?;
    compiler.builder.position_at_end(merge);
    Ok(())
}

/// `loop (cond) block pool;` is a pre-test loop.
///
/// The stack pointer is saved before each test of the condition and
/// restored after the body and on exit, so an iteration releases whatever
/// the condition and the body allocated.
fn gen_loop<'a>(compiler: &mut Compiler<'a>, id: NodeId) -> Result<(), Error> {
    let condition_id = child(compiler, id, 0)?;
    let block_id = child(compiler, id, 1)?;

    let cond_block = compiler.append_block("loop.cond")?;
    let exit = compiler.append_block("loop.end")?;

    compiler.builder.build_unconditional_branch(cond_block)?;
    compiler.builder.position_at_end(cond_block);

    let stack = compiler.build_stack_save()?;
    let condition = gen_condition(compiler, condition_id)?;

    compiler.loop_depth += 1;
    let body = gen_block(compiler, block_id, cond_block, Some(stack));
    compiler.loop_depth -= 1;
    let body = body?;

    compiler
        .builder
        .build_conditional_branch(condition, body, exit)?;
    compiler.builder.position_at_end(exit);
    compiler.build_stack_restore(stack)?;
    Ok(())
}

fn gen_print<'a>(compiler: &mut Compiler<'a>, id: NodeId) -> Result<(), Error> {
    let value_id = child(compiler, id, 0)?;
    let value = gen_expression(compiler, value_id)?;

    let hook = |compiler: &Compiler<'a>, name: &str| {
        compiler.module.get_function(name).ok_or_else(|| {
            Error::codegen(format!("runtime hook `{}` missing", name), compiler.position_of(id))
        })
    };

    match value {
        Value::Int(value) => {
            let print = hook(compiler, PRINT_INT)?;
            compiler.builder.build_call(print, &[value.into()], "")?;
        }
        Value::Vector(vector) => {
            let begin = hook(compiler, PRINT_VECTOR_BEGIN)?;
            let element = hook(compiler, PRINT_VECTOR_ELEMENT)?;
            let end = hook(compiler, PRINT_VECTOR_END)?;

            compiler.builder.build_call(begin, &[], "")?;
            compiler.build_counted_loop(vector.len, "print", |compiler, index| {
                let value = compiler.load_element(vector, index)?;
                compiler
                    .builder
                    .build_call(element, &[value.into(), index.into()], "")?;
                Ok(())
            })?;
            compiler.builder.build_call(end, &[], "")?;
        }
    }

    Ok(())
}
