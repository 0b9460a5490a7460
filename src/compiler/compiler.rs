//! Main compiler module.
//!
//! This module contains the core Compiler structure and drives lowering of a
//! resolved, typed AST into an LLVM module with a single `main` function.
//! It also owns the small building blocks the statement and expression
//! lowering share: entry-block stack slots, vector allocations, counted loops
//! and runtime fault checks.

use std::{
    collections::{BTreeMap, HashMap},
    path::PathBuf,
};

use inkwell::{
    basic_block::BasicBlock,
    builder::Builder,
    context::Context,
    module::Module,
    targets::{CodeModel, InitializationConfig, RelocMode, Target, TargetMachine},
    types::BasicType,
    values::{BasicValue, FunctionValue, IntValue, PointerValue},
    AddressSpace, IntPredicate, OptimizationLevel,
};
use tracing::{debug, trace};

use crate::{
    ast::ast::{Ast, NodeId},
    errors::errors::Error,
    type_checker::symbol_table::{SymbolId, SymbolTable},
    Position,
};

use super::{
    runtime::{declare_runtime, RuntimeFault, FAULT, FREE, STACK_RESTORE, STACK_SAVE},
    stmt::gen_statement,
};

/// How the runtime hooks reach the emitted module.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RuntimeLinkage {
    /// Hooks are defined in the module on top of `printf`.
    Embedded,
    /// Hooks are only declared and must be supplied by the host.
    External,
}

#[derive(Debug, Clone)]
pub struct CompileOptions {
    pub module_name: String,
    pub runtime: RuntimeLinkage,
    /// Emit a `LengthMismatch` fault for vector operands of unequal length.
    pub check_lengths: bool,
    /// Run the LLVM verifier on the finished module.
    pub verify: bool,
}

impl Default for CompileOptions {
    fn default() -> Self {
        CompileOptions {
            module_name: String::from("vcalc"),
            runtime: RuntimeLinkage::Embedded,
            check_lengths: true,
            verify: true,
        }
    }
}

impl CompileOptions {
    pub fn named(module_name: &str) -> Self {
        CompileOptions {
            module_name: module_name.to_string(),
            ..CompileOptions::default()
        }
    }
}

/// A vector at runtime: a pointer to `len` contiguous `i64` elements.
#[derive(Debug, Clone, Copy)]
pub struct VectorValue<'a> {
    pub data: PointerValue<'a>,
    pub len: IntValue<'a>,
}

/// The IR value produced by lowering an expression.
#[derive(Debug, Clone, Copy)]
pub enum Value<'a> {
    Int(IntValue<'a>),
    Vector(VectorValue<'a>),
}

/// Stack slots backing a variable. A vector variable holds its data
/// pointer and length, so rebinding it never copies elements.
#[derive(Debug, Clone, Copy)]
pub enum Storage<'a> {
    Int(PointerValue<'a>),
    Vector {
        data: PointerValue<'a>,
        len: PointerValue<'a>,
        /// `loop` nesting depth of the declaration
        depth: usize,
    },
}

/// Heap buffer owned by a vector variable that is assigned inside a loop
/// nested deeper than its declaration. Stack temporaries of a loop body
/// are released every iteration, so such values are copied here instead.
#[derive(Debug, Clone, Copy)]
pub struct HeapBuffer<'a> {
    /// Slot holding the `i64*` buffer, null until first use
    pub data: PointerValue<'a>,
    /// Slot holding the element capacity of the buffer
    pub capacity: PointerValue<'a>,
}

/// The main compiler structure that holds the state of the compilation process.
///
/// # Type Parameters
///
/// * `'a` - Lifetime of the LLVM context
pub struct Compiler<'a> {
    /// The resolved and typed abstract syntax tree being compiled
    pub ast: Ast,
    /// Scope tree and symbols left by name resolution
    pub symbols: SymbolTable,
    pub options: CompileOptions,

    /// Storage assigned to each variable symbol
    pub storage: HashMap<SymbolId, Storage<'a>>,
    /// Value produced by each lowered expression node
    pub emitted: HashMap<NodeId, Value<'a>>,
    /// Heap buffers of loop-assigned vector variables, freed when `main` returns
    pub heap_buffers: BTreeMap<SymbolId, HeapBuffer<'a>>,
    /// Nesting depth of `Expression` nodes being lowered
    pub num_expr_ancestors: usize,
    /// Nesting depth of `loop` bodies being lowered
    pub loop_depth: usize,
    slot_counter: usize,
    strings: HashMap<String, PointerValue<'a>>,

    /// Reference to the LLVM context
    pub context: &'a Context,
    /// The LLVM module being built
    pub module: Module<'a>,
    /// The LLVM IR builder
    pub builder: Builder<'a>,
}

impl<'a> Compiler<'a> {
    pub fn new(ast: Ast, symbols: SymbolTable, context: &'a Context, options: CompileOptions) -> Self {
        Compiler {
            ast,
            symbols,
            storage: HashMap::new(),
            emitted: HashMap::new(),
            heap_buffers: BTreeMap::new(),
            num_expr_ancestors: 0,
            loop_depth: 0,
            slot_counter: 0,
            strings: HashMap::new(),
            module: context.create_module(&options.module_name),
            builder: context.create_builder(),
            context,
            options,
        }
    }

    /// Saves the current LLVM module to a file as textual IR.
    pub fn save_module_to_file(&self, output_file: PathBuf) -> Result<(), Error> {
        self.module
            .print_to_file(&output_file)
            .map_err(|error| Error::codegen(error.to_string(), Position::null()))
    }

    /// Textual IR of the module.
    pub fn ir(&self) -> String {
        self.module.print_to_string().to_string()
    }

    /// Sets up the target, declares the runtime, and lowers the program
    /// into `main`.
    fn compile(&mut self) -> Result<(), Error> {
        Target::initialize_native(&InitializationConfig::default())
            .map_err(|error| Error::codegen(error, Position::null()))?;
        let target_triple = TargetMachine::get_default_triple();
        let target = Target::from_triple(&target_triple)
            .map_err(|error| Error::codegen(error.to_string(), Position::null()))?;
        let target_machine = target
            .create_target_machine(
                &target_triple,
                "generic",
                "",
                OptimizationLevel::None,
                RelocMode::PIC,
                CodeModel::Default,
            )
            .ok_or_else(|| Error::codegen("could not create target machine", Position::null()))?;

        self.module.set_triple(&target_triple);
        self.module
            .set_data_layout(&target_machine.get_target_data().get_data_layout());

        declare_runtime(self)?;

        let main = self.module.add_function(
            "main",
            self.context.i32_type().fn_type(&[], false),
            None,
        );
        let entry = self.context.append_basic_block(main, "entry");
        self.builder.position_at_end(entry);

        let root = self.ast.root();
        let statements = self.ast.children(root).to_vec();
        for statement in statements {
            gen_statement(self, statement)?;
        }

        self.build_heap_release()?;
        self.builder
            .build_return(Some(&self.context.i32_type().const_zero()))?;

        debug!(
            blocks = main.count_basic_blocks(),
            slots = self.slot_counter,
            "lowered program"
        );

        if self.options.verify {
            self.module
                .verify()
                .map_err(|error| Error::codegen(error.to_string(), Position::null()))?;
        }

        Ok(())
    }

    /// Source position of a node, for errors raised during lowering.
    pub fn position_of(&self, id: NodeId) -> Position {
        self.ast.node(id).span.start.clone()
    }

    pub fn current_function(&self) -> Result<FunctionValue<'a>, Error> {
        self.builder
            .get_insert_block()
            .and_then(|block| block.get_parent())
            .ok_or_else(|| Error::codegen("builder is not inside a function", Position::null()))
    }

    pub fn append_block(&self, name: &str) -> Result<BasicBlock<'a>, Error> {
        Ok(self
            .context
            .append_basic_block(self.current_function()?, name))
    }

    /// Unique slot name of the form `<base>.<n>`.
    pub fn next_slot_name(&mut self, base: &str) -> String {
        let name = format!("{}.{}", base, self.slot_counter);
        self.slot_counter += 1;
        name
    }

    /// Builder positioned at the top of the current function's entry block.
    fn entry_builder(&self) -> Result<Builder<'a>, Error> {
        let entry = self
            .current_function()?
            .get_first_basic_block()
            .ok_or_else(|| Error::codegen("function has no entry block", Position::null()))?;

        let builder = self.context.create_builder();
        match entry.get_first_instruction() {
            Some(first) => builder.position_before(&first),
            None => builder.position_at_end(entry),
        }
        Ok(builder)
    }

    /// Allocates a named stack slot at the top of the entry block, so the
    /// slot is allocated once no matter how often its block runs.
    pub fn build_entry_alloca<T: BasicType<'a>>(
        &mut self,
        ty: T,
        base: &str,
    ) -> Result<PointerValue<'a>, Error> {
        let name = self.next_slot_name(base);
        let builder = self.entry_builder()?;

        trace!(slot = %name, "entry alloca");
        Ok(builder.build_alloca(ty, &name)?)
    }

    /// Entry-block slot that holds `initial` when the function starts. The
    /// store runs once, even when the slot is first used inside a loop.
    pub fn build_entry_slot<T: BasicType<'a>, V: BasicValue<'a>>(
        &mut self,
        ty: T,
        base: &str,
        initial: V,
    ) -> Result<PointerValue<'a>, Error> {
        let name = self.next_slot_name(base);
        let builder = self.entry_builder()?;

        trace!(slot = %name, "initialised entry slot");
        let slot = builder.build_alloca(ty, &name)?;
        builder.build_store(slot, initial)?;
        Ok(slot)
    }

    /// Entry-block `i64` slot holding `initial`.
    pub fn build_int_slot(&mut self, base: &str, initial: IntValue<'a>) -> Result<PointerValue<'a>, Error> {
        let slot = self.build_entry_alloca(self.context.i64_type(), base)?;
        self.builder.build_store(slot, initial)?;
        Ok(slot)
    }

    /// Stack allocation for `len` elements at the current insertion point.
    pub fn alloc_vector(&mut self, len: IntValue<'a>, base: &str) -> Result<VectorValue<'a>, Error> {
        let name = self.next_slot_name(base);
        let data = self
            .builder
            .build_array_alloca(self.context.i64_type(), len, &name)?;
        Ok(VectorValue { data, len })
    }

    pub fn element_ptr(&self, data: PointerValue<'a>, index: IntValue<'a>) -> Result<PointerValue<'a>, Error> {
        Ok(unsafe { self.builder.build_in_bounds_gep(data, &[index], "elem.ptr")? })
    }

    pub fn load_element(&self, vector: VectorValue<'a>, index: IntValue<'a>) -> Result<IntValue<'a>, Error> {
        let ptr = self.element_ptr(vector.data, index)?;
        Ok(self.builder.build_load(ptr, "elem")?.into_int_value())
    }

    pub fn store_element(
        &self,
        vector: VectorValue<'a>,
        index: IntValue<'a>,
        value: IntValue<'a>,
    ) -> Result<(), Error> {
        let ptr = self.element_ptr(vector.data, index)?;
        self.builder.build_store(ptr, value)?;
        Ok(())
    }

    pub fn load_int(&self, slot: PointerValue<'a>, name: &str) -> Result<IntValue<'a>, Error> {
        Ok(self.builder.build_load(slot, name)?.into_int_value())
    }

    pub fn i64_const(&self, value: i64) -> IntValue<'a> {
        self.context.i64_type().const_int(value as u64, true)
    }

    /// Copies the first `source.len` elements of `source` into `target`.
    pub fn build_vector_copy(&mut self, source: VectorValue<'a>, target: VectorValue<'a>) -> Result<(), Error> {
        self.build_counted_loop(source.len, "copy", |compiler, index| {
            let element = compiler.load_element(source, index)?;
            compiler.store_element(target, index, element)
        })
    }

    /// Fresh stack allocation holding the elements of `source`.
    pub fn build_vector_clone(&mut self, source: VectorValue<'a>, base: &str) -> Result<VectorValue<'a>, Error> {
        let target = self.alloc_vector(source.len, base)?;
        self.build_vector_copy(source, target)?;
        Ok(target)
    }

    /// Calls a function the runtime declared in the module and returns its
    /// result, if it has one.
    pub fn build_runtime_call(
        &self,
        name: &str,
        args: &[inkwell::values::BasicMetadataValueEnum<'a>],
        result: &str,
    ) -> Result<Option<inkwell::values::BasicValueEnum<'a>>, Error> {
        let function = self
            .module
            .get_function(name)
            .ok_or_else(|| Error::codegen(format!("runtime function `{}` missing", name), Position::null()))?;
        Ok(self
            .builder
            .build_call(function, args, result)?
            .try_as_basic_value()
            .left())
    }

    /// Current stack pointer, for [`Compiler::build_stack_restore`].
    pub fn build_stack_save(&self) -> Result<PointerValue<'a>, Error> {
        self.build_runtime_call(STACK_SAVE, &[], "stack")?
            .map(|value| value.into_pointer_value())
            .ok_or_else(|| Error::codegen("`llvm.stacksave` returned nothing", Position::null()))
    }

    /// Releases every stack allocation made since `saved` was taken.
    pub fn build_stack_restore(&self, saved: PointerValue<'a>) -> Result<(), Error> {
        self.build_runtime_call(STACK_RESTORE, &[saved.into()], "")?;
        Ok(())
    }

    /// Frees every heap buffer. Emitted once, before `main` returns normally.
    fn build_heap_release(&mut self) -> Result<(), Error> {
        let raw_type = self.context.i8_type().ptr_type(AddressSpace::default());
        let buffers: Vec<HeapBuffer<'a>> = self.heap_buffers.values().copied().collect();

        for buffer in buffers {
            let data = self
                .builder
                .build_load(buffer.data, "heap")?
                .into_pointer_value();
            let raw = self.builder.build_pointer_cast(data, raw_type, "heap.raw")?;
            self.build_runtime_call(FREE, &[raw.into()], "")?;
        }
        Ok(())
    }

    /// Emits `for (i = 0; i < count; i++) body(i)`.
    ///
    /// `body` may leave the builder in a different block than it started
    /// in; the increment is emitted wherever it ends. Stack allocations made
    /// by `body` are released at the end of every iteration, so nothing it
    /// allocates may outlive the iteration.
    pub fn build_counted_loop<F>(&mut self, count: IntValue<'a>, name: &str, mut body: F) -> Result<(), Error>
    where
        F: FnMut(&mut Compiler<'a>, IntValue<'a>) -> Result<(), Error>,
    {
        let index_slot = self.build_int_slot(&format!("{}.idx", name), self.i64_const(0))?;

        let cond_block = self.append_block(&format!("{}.cond", name))?;
        let body_block = self.append_block(&format!("{}.body", name))?;
        let exit_block = self.append_block(&format!("{}.exit", name))?;

        self.builder.build_unconditional_branch(cond_block)?;

        self.builder.position_at_end(cond_block);
        let index = self.load_int(index_slot, "i")?;
        let in_range = self
            .builder
            .build_int_compare(IntPredicate::SLT, index, count, "in.range")?;
        self.builder
            .build_conditional_branch(in_range, body_block, exit_block)?;

        self.builder.position_at_end(body_block);
        let index = self.load_int(index_slot, "i")?;
        let stack = self.build_stack_save()?;
        body(self, index)?;
        self.build_stack_restore(stack)?;

        let index = self.load_int(index_slot, "i")?;
        let next = self
            .builder
            .build_int_add(index, self.i64_const(1), "i.next")?;
        self.builder.build_store(index_slot, next)?;
        self.builder.build_unconditional_branch(cond_block)?;

        self.builder.position_at_end(exit_block);
        Ok(())
    }

    /// Branches to a fault exit when `failed` (an `i1`) is set and continues
    /// in a fresh block otherwise. The fault exit reports through the
    /// runtime hook and returns the fault code from `main`.
    pub fn build_fault_check(
        &mut self,
        failed: IntValue<'a>,
        fault: RuntimeFault,
        operands: (IntValue<'a>, IntValue<'a>),
    ) -> Result<(), Error> {
        let fault_block = self.append_block("fault")?;
        let ok_block = self.append_block("ok")?;

        self.builder
            .build_conditional_branch(failed, fault_block, ok_block)?;

        self.builder.position_at_end(fault_block);
        let hook = self
            .module
            .get_function(FAULT)
            .ok_or_else(|| Error::codegen("runtime hook `vcalc_fault` missing", Position::null()))?;
        let message = self.string_constant(fault.message())?;
        let code = self.i64_const(fault.code());

        self.builder.build_call(
            hook,
            &[code.into(), message.into(), operands.0.into(), operands.1.into()],
            "",
        )?;
        self.builder.build_return(Some(
            &self.context.i32_type().const_int(fault.code() as u64, false),
        ))?;

        self.builder.position_at_end(ok_block);
        Ok(())
    }

    /// Pointer to a NUL-terminated global string, created once per text.
    pub fn string_constant(&mut self, text: &str) -> Result<PointerValue<'a>, Error> {
        if let Some(pointer) = self.strings.get(text) {
            return Ok(*pointer);
        }

        let global = self.builder.build_global_string_ptr(text, "str")?;
        let pointer = global.as_pointer_value();
        self.strings.insert(text.to_string(), pointer);
        Ok(pointer)
    }

    /// Storage of a variable symbol that has already been declared.
    pub fn storage_of(&self, symbol: Option<SymbolId>, id: NodeId) -> Result<Storage<'a>, Error> {
        symbol
            .and_then(|symbol| self.storage.get(&symbol).copied())
            .ok_or_else(|| {
                Error::codegen(
                    format!("no storage for `{}`", self.ast.node(id).text()),
                    self.position_of(id),
                )
            })
    }
}

/// Lowers a resolved and typed program into an LLVM module.
///
/// Takes ownership of the AST and the symbol table; both stay reachable
/// through the returned compiler. Stops at the first error.
pub fn compile<'a>(
    ast: Ast,
    symbols: SymbolTable,
    context: &'a Context,
    options: CompileOptions,
) -> Result<Compiler<'a>, Error> {
    let mut compiler = Compiler::new(ast, symbols, context, options);

    compiler.compile()?;

    Ok(compiler)
}
