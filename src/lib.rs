//! symbolize - Compile-time symbolization of SSA IR.
//!
//! This crate instruments a program's intermediate representation so that,
//! at run time, every concrete computation is accompanied by calls into a
//! symbolic runtime that build the expression describing how the value
//! depends on program inputs. Branch conditions are recorded as path
//! constraints. The runtime itself (expression construction, solving) lives
//! outside this crate; only its call contract is encoded here.
//!
//! # Primary Usage
//!
//! ```
//! use symbolize::core::SymbolizeSession;
//! use symbolize::pass::{SymbolizeOptions, SymbolizePass};
//! use symbolize::test_ir::{Module, TestIRAdaptor};
//!
//! let mut module = Module::parse(
//!     "define i32 @f(i32 %a) {\n\
//!      entry:\n\
//!        %x = add i32 3, %a\n\
//!        ret i32 %x\n\
//!      }\n",
//! )
//! .unwrap();
//!
//! let session = SymbolizeSession::new();
//! let pass = SymbolizePass::new(SymbolizeOptions::default(), &session);
//! pass.run(&mut TestIRAdaptor::new(&mut module)).unwrap();
//!
//! assert!(module.to_string().contains("@_sym_build_add"));
//! ```
//!
//! # Architecture
//!
//! - [`core`] - Host-independent infrastructure (IR types, layout, adaptor seam, errors, session)
//! - [`pass`] - The pass: runtime bindings, expression cache, translator, global shadows
//! - [`test_ir`] - Textual LLVM-subset IR used by tests and the CLI
//! - `llvm` - LLVM host adaptor over inkwell (feature `llvm`)

pub mod core;
pub mod pass;
pub mod test_ir;

#[cfg(feature = "llvm")]
pub mod llvm;

// Re-export common types from organized modules
pub use crate::core::{
    // Framework traits
    IrAdaptor,
    // Types and layout
    DataLayout, IrType, ShadowType,
    // Session management
    Diagnostic, DiagnosticKind, SessionStats, SymbolizeSession,
    // Errors
    SymbolizeError, SymbolizeResult,
};
pub use crate::pass::{RuntimeBindings, SymbolizeOptions, SymbolizePass, Symbolizer};
