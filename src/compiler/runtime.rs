//! Runtime interface of emitted programs.
//!
//! Emitted code never formats output itself; it calls a handful of C-ABI
//! hooks. With [`RuntimeLinkage::Embedded`] the hooks are defined inside the
//! module on top of `printf`. With [`RuntimeLinkage::External`] they are
//! only declared, and [`execute`] maps them to the Rust functions below
//! while running `main` in a JIT.

use std::{
    cell::RefCell,
    ffi::{c_char, c_void, CStr},
    fmt::Write,
};

use inkwell::{module::Linkage, AddressSpace, IntPredicate, OptimizationLevel};
use tracing::debug;

use crate::{errors::errors::Error, Position};

use super::compiler::{Compiler, RuntimeLinkage};

pub const PRINT_INT: &str = "vcalc_print_int";
pub const PRINT_VECTOR_BEGIN: &str = "vcalc_print_vector_begin";
pub const PRINT_VECTOR_ELEMENT: &str = "vcalc_print_vector_element";
pub const PRINT_VECTOR_END: &str = "vcalc_print_vector_end";
pub const FAULT: &str = "vcalc_fault";

pub const STACK_SAVE: &str = "llvm.stacksave";
pub const STACK_RESTORE: &str = "llvm.stackrestore";
pub const REALLOC: &str = "realloc";
pub const FREE: &str = "free";

/// Runtime faults. The discriminant is the exit status of `main`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RuntimeFault {
    LengthMismatch = 1,
    InvalidRangeBounds = 2,
    DivisionByZero = 3,
    IndexOutOfBounds = 4,
    DivisionOverflow = 5,
}

impl RuntimeFault {
    pub fn code(&self) -> i64 {
        *self as i64
    }

    pub fn from_code(code: i64) -> Option<RuntimeFault> {
        match code {
            1 => Some(RuntimeFault::LengthMismatch),
            2 => Some(RuntimeFault::InvalidRangeBounds),
            3 => Some(RuntimeFault::DivisionByZero),
            4 => Some(RuntimeFault::IndexOutOfBounds),
            5 => Some(RuntimeFault::DivisionOverflow),
            _ => None,
        }
    }

    pub fn message(&self) -> &'static str {
        match self {
            RuntimeFault::LengthMismatch => "vector length mismatch",
            RuntimeFault::InvalidRangeBounds => "invalid range bounds",
            RuntimeFault::DivisionByZero => "division by zero",
            RuntimeFault::IndexOutOfBounds => "index out of bounds",
            RuntimeFault::DivisionOverflow => "division overflow",
        }
    }
}

/// Declares every runtime hook in the module, defining them as well when
/// the runtime is embedded. Also declares the stack intrinsics and the C
/// allocator functions emitted code relies on.
pub fn declare_runtime(compiler: &mut Compiler) -> Result<(), Error> {
    let context = compiler.context;
    let i64_type = context.i64_type();
    let void_type = context.void_type();
    let i8_ptr_type = context.i8_type().ptr_type(AddressSpace::default());

    let support = [
        (STACK_SAVE, i8_ptr_type.fn_type(&[], false)),
        (STACK_RESTORE, void_type.fn_type(&[i8_ptr_type.into()], false)),
        (
            REALLOC,
            i8_ptr_type.fn_type(&[i8_ptr_type.into(), i64_type.into()], false),
        ),
        (FREE, void_type.fn_type(&[i8_ptr_type.into()], false)),
    ];

    for (name, function_type) in support {
        compiler
            .module
            .add_function(name, function_type, Some(Linkage::External));
    }

    let hooks = [
        (PRINT_INT, void_type.fn_type(&[i64_type.into()], false)),
        (PRINT_VECTOR_BEGIN, void_type.fn_type(&[], false)),
        (
            PRINT_VECTOR_ELEMENT,
            void_type.fn_type(&[i64_type.into(), i64_type.into()], false),
        ),
        (PRINT_VECTOR_END, void_type.fn_type(&[], false)),
        (
            FAULT,
            void_type.fn_type(
                &[
                    i64_type.into(),
                    i8_ptr_type.into(),
                    i64_type.into(),
                    i64_type.into(),
                ],
                false,
            ),
        ),
    ];

    for (name, function_type) in hooks {
        compiler
            .module
            .add_function(name, function_type, Some(Linkage::External));
    }

    if compiler.options.runtime == RuntimeLinkage::Embedded {
        define_embedded_runtime(compiler)?;
    }

    Ok(())
}

fn hook_param<'a>(
    compiler: &Compiler<'a>,
    name: &str,
    index: u32,
) -> Result<inkwell::values::BasicValueEnum<'a>, Error> {
    compiler
        .module
        .get_function(name)
        .and_then(|function| function.get_nth_param(index))
        .ok_or_else(|| Error::codegen(format!("runtime hook `{}` missing", name), Position::null()))
}

/// Gives each hook a body that prints through `printf`.
fn define_embedded_runtime(compiler: &mut Compiler) -> Result<(), Error> {
    let context = compiler.context;
    let i8_ptr_type = context.i8_type().ptr_type(AddressSpace::default());
    let printf = compiler.module.add_function(
        "printf",
        context.i32_type().fn_type(&[i8_ptr_type.into()], true),
        Some(Linkage::External),
    );

    for name in [
        PRINT_INT,
        PRINT_VECTOR_BEGIN,
        PRINT_VECTOR_ELEMENT,
        PRINT_VECTOR_END,
        FAULT,
    ] {
        let function = compiler
            .module
            .get_function(name)
            .ok_or_else(|| Error::codegen(format!("runtime hook `{}` missing", name), Position::null()))?;
        let entry = context.append_basic_block(function, "entry");
        compiler.builder.position_at_end(entry);

        match name {
            PRINT_INT => {
                let format = compiler.string_constant("%lld\n")?;
                let value = hook_param(compiler, name, 0)?;
                compiler
                    .builder
                    .build_call(printf, &[format.into(), value.into()], "")?;
            }
            PRINT_VECTOR_BEGIN => {
                let format = compiler.string_constant("[")?;
                compiler.builder.build_call(printf, &[format.into()], "")?;
            }
            PRINT_VECTOR_ELEMENT => {
                let first = compiler.string_constant("%lld")?;
                let rest = compiler.string_constant(" %lld")?;
                let value = hook_param(compiler, name, 0)?;
                let index = hook_param(compiler, name, 1)?.into_int_value();

                let is_first = compiler.builder.build_int_compare(
                    IntPredicate::EQ,
                    index,
                    context.i64_type().const_zero(),
                    "is.first",
                )?;
                let format = compiler.builder.build_select(is_first, first, rest, "format")?;
                compiler
                    .builder
                    .build_call(printf, &[format.into(), value.into()], "")?;
            }
            PRINT_VECTOR_END => {
                let format = compiler.string_constant("]\n")?;
                compiler.builder.build_call(printf, &[format.into()], "")?;
            }
            _ => {
                let format = compiler.string_constant("runtime error: %s (%lld, %lld)\n")?;
                let message = hook_param(compiler, name, 1)?;
                let left = hook_param(compiler, name, 2)?;
                let right = hook_param(compiler, name, 3)?;
                compiler.builder.build_call(
                    printf,
                    &[format.into(), message.into(), left.into(), right.into()],
                    "",
                )?;
            }
        }

        compiler.builder.build_return(None)?;
    }

    Ok(())
}

/// A fault reported by a running program.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FaultReport {
    pub fault: Option<RuntimeFault>,
    pub message: String,
    pub operands: (i64, i64),
}

/// Result of running a compiled program in the JIT.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Execution {
    pub exit_code: i32,
    pub output: String,
    pub fault: Option<FaultReport>,
}

thread_local! {
    static OUTPUT: RefCell<String> = RefCell::new(String::new());
    static FAULT_REPORT: RefCell<Option<FaultReport>> = RefCell::new(None);
}

#[no_mangle]
pub extern "C" fn vcalc_print_int(value: i64) {
    OUTPUT.with(|output| {
        let _ = writeln!(output.borrow_mut(), "{}", value);
    });
}

#[no_mangle]
pub extern "C" fn vcalc_print_vector_begin() {
    OUTPUT.with(|output| output.borrow_mut().push('['));
}

#[no_mangle]
pub extern "C" fn vcalc_print_vector_element(value: i64, index: i64) {
    OUTPUT.with(|output| {
        let mut output = output.borrow_mut();
        if index != 0 {
            output.push(' ');
        }
        let _ = write!(output, "{}", value);
    });
}

#[no_mangle]
pub extern "C" fn vcalc_print_vector_end() {
    OUTPUT.with(|output| output.borrow_mut().push_str("]\n"));
}

/// # Safety
///
/// `message` must point to a NUL-terminated string.
#[no_mangle]
pub unsafe extern "C" fn vcalc_fault(code: i64, message: *const c_char, a: i64, b: i64) {
    let message = if message.is_null() {
        String::new()
    } else {
        CStr::from_ptr(message).to_string_lossy().into_owned()
    };

    FAULT_REPORT.with(|report| {
        *report.borrow_mut() = Some(FaultReport {
            fault: RuntimeFault::from_code(code),
            message,
            operands: (a, b),
        });
    });
}

extern "C" {
    fn realloc(pointer: *mut c_void, size: usize) -> *mut c_void;
    fn free(pointer: *mut c_void);
}

/// Runs `main` of a compiled module in an MCJIT engine on the current
/// thread, capturing everything it prints.
///
/// Declared hooks are bound to this module's Rust functions; hooks the
/// module defines itself run as emitted. A module can be executed once.
pub fn execute(compiler: &Compiler) -> Result<Execution, Error> {
    OUTPUT.with(|output| output.borrow_mut().clear());
    FAULT_REPORT.with(|report| *report.borrow_mut() = None);

    let engine = compiler
        .module
        .create_jit_execution_engine(OptimizationLevel::None)
        .map_err(|error| Error::codegen(error.to_string(), Position::null()))?;

    let hooks: [(&str, usize); 7] = [
        (PRINT_INT, vcalc_print_int as *const () as usize),
        (PRINT_VECTOR_BEGIN, vcalc_print_vector_begin as *const () as usize),
        (PRINT_VECTOR_ELEMENT, vcalc_print_vector_element as *const () as usize),
        (PRINT_VECTOR_END, vcalc_print_vector_end as *const () as usize),
        (FAULT, vcalc_fault as *const () as usize),
        (REALLOC, realloc as *const () as usize),
        (FREE, free as *const () as usize),
    ];

    for (name, address) in hooks {
        if let Some(function) = compiler.module.get_function(name) {
            if function.count_basic_blocks() == 0 {
                engine.add_global_mapping(&function, address);
            }
        }
    }

    let main = unsafe { engine.get_function::<unsafe extern "C" fn() -> i32>("main") }
        .map_err(|error| Error::codegen(format!("{:?}", error), Position::null()))?;

    let exit_code = unsafe { main.call() };

    let output = OUTPUT.with(|output| std::mem::take(&mut *output.borrow_mut()));
    let fault = FAULT_REPORT.with(|report| report.borrow_mut().take());

    debug!(exit_code, faulted = fault.is_some(), "program finished");
    Ok(Execution {
        exit_code,
        output,
        fault,
    })
}
