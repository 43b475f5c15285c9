//! LLVM integration.
//!
//! [`LlvmAdaptor`] lets the pass instrument a real LLVM module. The helpers
//! here cover the common driver flow of parsing textual IR, running the pass
//! and printing the result.
//!
//! # Example
//! ```ignore
//! use symbolize::{SymbolizeOptions, SymbolizeSession};
//!
//! let session = SymbolizeSession::new();
//! let output = symbolize::llvm::instrument_ir(&source, "input.ll", SymbolizeOptions::default(), &session)?;
//! ```

pub mod adaptor;

pub use adaptor::LlvmAdaptor;

use inkwell::context::Context;
use inkwell::memory_buffer::MemoryBuffer;
use inkwell::module::Module;

use crate::core::{SymbolizeError, SymbolizeResult, SymbolizeSession};
use crate::pass::{SymbolizeOptions, SymbolizePass};

/// Parse textual LLVM IR into a module owned by `context`.
pub fn parse_ir<'ctx>(context: &'ctx Context, source: &str, name: &str) -> SymbolizeResult<Module<'ctx>> {
    let buffer = MemoryBuffer::create_from_memory_range_copy(source.as_bytes(), name);
    context
        .create_module_from_ir(buffer)
        .map_err(|err| SymbolizeError::Host { reason: err.to_string() })
}

/// Instrument a module in place and check that the result is well formed.
pub fn symbolize_module(
    module: &mut Module<'_>,
    options: SymbolizeOptions,
    session: &SymbolizeSession,
) -> SymbolizeResult<()> {
    {
        let mut adaptor = LlvmAdaptor::new(module);
        SymbolizePass::new(options, session).run(&mut adaptor)?;
    }
    module
        .verify()
        .map_err(|err| SymbolizeError::Host { reason: format!("instrumented module is invalid: {err}") })
}

/// Parse, instrument and print textual LLVM IR.
pub fn instrument_ir(
    source: &str,
    name: &str,
    options: SymbolizeOptions,
    session: &SymbolizeSession,
) -> SymbolizeResult<String> {
    let context = Context::create();
    let mut module = parse_ir(&context, source, name)?;
    symbolize_module(&mut module, options, session)?;
    Ok(module.print_to_string().to_string())
}
