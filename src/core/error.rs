// This module defines the error and diagnostic types of the symbolizer using the thiserror
// crate. SymbolizeError is the fatal error enum: every variant aborts the transformation of
// the current module and carries the offending construct rendered as text (an operator
// mnemonic, a type, a value description). Missing runtime handlers, shadow types for
// aggregates without a defined layout, operands without a derivable expression, malformed
// address computations and unsupported global initialisers all end up here. Conditions that
// only lose precision are not errors: they become Diagnostic values that the translator logs
// and records in the session before moving on. SymbolizeResult<T> is the convenience alias.

//! Error types for the symbolizer.
//!
//! Using thiserror for more idiomatic error handling.

use std::fmt;

use thiserror::Error;

/// Fatal translation errors.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum SymbolizeError {
    #[error("No runtime handler for binary operator {op}")]
    MissingBinaryHandler { op: String },

    #[error("No runtime handler for comparison predicate {predicate}")]
    MissingComparisonHandler { predicate: String },

    #[error("Unable to determine expression type for {ty}")]
    UnsupportedShadowType { ty: String },

    #[error("No symbolic expression for value {value}")]
    MissingExpression { value: String },

    #[error("Unhandled non-pointer bit cast from {from} to {to}")]
    NonPointerBitCast { from: String, to: String },

    #[error("Struct {ty} indexed with non-constant {index}")]
    NonConstantStructIndex { ty: String, index: String },

    #[error("Address computation indexes into non-aggregate type {ty}")]
    InvalidGepIndex { ty: String },

    #[error("Unhandled global array element type {ty}")]
    UnsupportedArrayElement { ty: String },

    #[error("Don't know how to initialize expression for global {global} of type {ty}")]
    UnsupportedGlobalShape { global: String, ty: String },

    #[error("Integer constant of {bits} bits does not fit the runtime's integer constructor")]
    UnsupportedConstantWidth { bits: u32 },

    #[error("Runtime argument {what} = {value} does not fit in 8 bits")]
    ImmediateOutOfRange { what: String, value: u64 },

    #[error("Function not found: {name}")]
    FunctionNotFound { name: String },

    #[error("Host IR error: {reason}")]
    Host { reason: String },
}

/// Result type alias for symbolization.
pub type SymbolizeResult<T> = Result<T, SymbolizeError>;

/// Kind of a non-fatal translation problem.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum DiagnosticKind {
    IndirectCall,
    UnhandledIntrinsic,
    UnsupportedCast,
    DynamicAlloca,
    UnknownInstruction,
}

impl DiagnosticKind {
    pub fn as_str(self) -> &'static str {
        match self {
            DiagnosticKind::IndirectCall => "indirect call",
            DiagnosticKind::UnhandledIntrinsic => "unhandled intrinsic",
            DiagnosticKind::UnsupportedCast => "unsupported cast",
            DiagnosticKind::DynamicAlloca => "dynamic alloca",
            DiagnosticKind::UnknownInstruction => "unknown instruction",
        }
    }
}

/// A construct the translator skipped; the affected value has no shadow.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Diagnostic {
    pub function: String,
    pub kind: DiagnosticKind,
    pub message: String,
}

impl fmt::Display for Diagnostic {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "warning: {} in {}: {}", self.kind.as_str(), self.function, self.message)
    }
}
