// This module serves as the central hub for the symbolizer's host-independent infrastructure,
// shared by the pass, the test IR and the LLVM host. It exports and organizes the key
// subsystems: the IR type descriptor with shadow type derivation and the operator
// enumerations, the data layout rules used for address arithmetic, the IrAdaptor seam that
// every host implements, the fatal error and diagnostic types, and the session that collects
// statistics and diagnostics across a run.

//! Core symbolizer infrastructure.
//!
//! # Key Components
//!
//! ## Types (`types`)
//! - Closed IR type descriptor and its shadow counterpart
//! - Binary operators, comparison predicates, casts and linkage
//!
//! ## Layout (`layout`)
//! - Pointer width, allocation sizes and struct field offsets
//!
//! ## Adaptor (`adaptor`)
//! - The `IrAdaptor` trait with decoded instruction and operand views
//!
//! ## Session (`session`)
//! - Statistics and diagnostics shared by every translation

pub mod adaptor;
pub mod error;
pub mod layout;
pub mod session;
pub mod types;

pub use adaptor::{Callee, Gep, Instruction, IrAdaptor, Operand};
pub use error::{Diagnostic, DiagnosticKind, SymbolizeError, SymbolizeResult};
pub use layout::DataLayout;
pub use session::{SessionStats, SymbolizeSession};
pub use types::{
    shadow_type, BinaryOp, CastOp, IntPredicate, IrType, Linkage, ShadowType, Signature,
};
