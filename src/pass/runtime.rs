// This module declares the call-boundary contract with the external symbolic runtime. Every
// entry point is declared once per module through the adaptor's get-or-insert mechanism, with a
// fixed signature in which `ptr` is an opaque expression handle. RuntimeBindings keeps the
// resulting function handles: named fields for the fixed-purpose entry points and maps keyed by
// the closed operator enumerations for the binary and comparison builders. The table is built
// during module setup and only read afterwards. Lookups for operators the runtime has no builder
// for (the floating-point operators) are fatal errors rather than silent skips.

//! Runtime binding table.

use std::collections::HashMap;

use crate::core::{
    BinaryOp, IntPredicate, IrAdaptor, IrType, Signature, SymbolizeError, SymbolizeResult,
};

/// Runtime builders for integer binary operators.
pub const BINARY_HANDLERS: [(BinaryOp, &str); 13] = [
    (BinaryOp::Add, "_sym_build_add"),
    (BinaryOp::Sub, "_sym_build_sub"),
    (BinaryOp::Mul, "_sym_build_mul"),
    (BinaryOp::UDiv, "_sym_build_unsigned_div"),
    (BinaryOp::SDiv, "_sym_build_signed_div"),
    (BinaryOp::URem, "_sym_build_unsigned_rem"),
    (BinaryOp::SRem, "_sym_build_signed_rem"),
    (BinaryOp::Shl, "_sym_build_shift_left"),
    (BinaryOp::LShr, "_sym_build_logical_shift_right"),
    (BinaryOp::AShr, "_sym_build_arithmetic_shift_right"),
    (BinaryOp::And, "_sym_build_and"),
    (BinaryOp::Or, "_sym_build_or"),
    (BinaryOp::Xor, "_sym_build_xor"),
];

/// Runtime builders for integer comparisons.
pub const COMPARISON_HANDLERS: [(IntPredicate, &str); 10] = [
    (IntPredicate::Eq, "_sym_build_equal"),
    (IntPredicate::Ne, "_sym_build_not_equal"),
    (IntPredicate::Ugt, "_sym_build_unsigned_greater_than"),
    (IntPredicate::Uge, "_sym_build_unsigned_greater_equal"),
    (IntPredicate::Ult, "_sym_build_unsigned_less_than"),
    (IntPredicate::Ule, "_sym_build_unsigned_less_equal"),
    (IntPredicate::Sgt, "_sym_build_signed_greater_than"),
    (IntPredicate::Sge, "_sym_build_signed_greater_equal"),
    (IntPredicate::Slt, "_sym_build_signed_less_than"),
    (IntPredicate::Sle, "_sym_build_signed_less_equal"),
];

/// Element widths with a bulk array initializer.
pub const ARRAY_INITIALIZER_WIDTHS: [u32; 4] = [8, 16, 32, 64];

/// Declared runtime entry points of one module.
#[derive(Debug, Clone)]
pub struct RuntimeBindings<F> {
    pub build_integer: F,
    pub build_null_pointer: F,
    pub build_neg: F,
    pub build_sext: F,
    pub build_zext: F,
    pub build_trunc: F,
    pub push_path_constraint: F,
    pub get_parameter_expression: F,
    pub set_parameter_expression: F,
    pub set_return_expression: F,
    pub get_return_expression: F,
    pub memcpy: F,
    pub initialize: F,
    binary_handlers: HashMap<BinaryOp, F>,
    comparison_handlers: HashMap<IntPredicate, F>,
    array_initializers: HashMap<u32, F>,
}

impl<F: Copy> RuntimeBindings<F> {
    /// Declare every runtime entry point in the module behind `ir`.
    pub fn declare<A>(ir: &mut A) -> SymbolizeResult<Self>
    where
        A: IrAdaptor<Func = F>,
    {
        let ptr = || IrType::Ptr;
        let i8 = || IrType::Int(8);
        let expr_binary = Signature::new(ptr(), [ptr(), ptr()]);
        let expr_with_width = Signature::new(ptr(), [ptr(), i8()]);

        let mut binary_handlers = HashMap::new();
        for (op, name) in BINARY_HANDLERS {
            binary_handlers.insert(op, ir.declare_function(name, &expr_binary)?);
        }

        let mut comparison_handlers = HashMap::new();
        for (predicate, name) in COMPARISON_HANDLERS {
            comparison_handlers.insert(predicate, ir.declare_function(name, &expr_binary)?);
        }

        let mut array_initializers = HashMap::new();
        for bits in ARRAY_INITIALIZER_WIDTHS {
            let signature = Signature::new(IrType::Void, [ptr(), ptr(), IrType::Int(64)]);
            let func = ir.declare_function(&format!("_sym_initialize_array_{bits}"), &signature)?;
            array_initializers.insert(bits, func);
        }

        let int_ptr = IrType::Int(ir.pointer_bits());

        Ok(Self {
            build_integer: ir
                .declare_function("_sym_build_integer", &Signature::new(ptr(), [IrType::Int(64), i8()]))?,
            build_null_pointer: ir.declare_function("_sym_build_null_pointer", &Signature::new(ptr(), []))?,
            build_neg: ir.declare_function("_sym_build_neg", &Signature::new(ptr(), [ptr()]))?,
            build_sext: ir.declare_function("_sym_build_sext", &expr_with_width)?,
            build_zext: ir.declare_function("_sym_build_zext", &expr_with_width)?,
            build_trunc: ir.declare_function("_sym_build_trunc", &expr_with_width)?,
            push_path_constraint: ir.declare_function(
                "_sym_push_path_constraint",
                &Signature::new(ptr(), [ptr(), IrType::Int(1)]),
            )?,
            get_parameter_expression: ir
                .declare_function("_sym_get_parameter_expression", &Signature::new(ptr(), [i8()]))?,
            set_parameter_expression: ir.declare_function(
                "_sym_set_parameter_expression",
                &Signature::new(IrType::Void, [i8(), ptr()]),
            )?,
            set_return_expression: ir
                .declare_function("_sym_set_return_expression", &Signature::new(IrType::Void, [ptr()]))?,
            get_return_expression: ir.declare_function("_sym_get_return_expression", &Signature::new(ptr(), []))?,
            memcpy: ir.declare_function("_sym_memcpy", &Signature::new(IrType::Void, [ptr(), ptr(), int_ptr]))?,
            initialize: ir.declare_function("_sym_initialize", &Signature::new(IrType::Void, []))?,
            binary_handlers,
            comparison_handlers,
            array_initializers,
        })
    }

    /// Builder for a binary operator.
    pub fn binary_handler(&self, op: BinaryOp) -> SymbolizeResult<F> {
        self.binary_handlers
            .get(&op)
            .copied()
            .ok_or_else(|| SymbolizeError::MissingBinaryHandler { op: op.to_string() })
    }

    /// Builder for a comparison predicate.
    pub fn comparison_handler(&self, predicate: IntPredicate) -> SymbolizeResult<F> {
        self.comparison_handlers
            .get(&predicate)
            .copied()
            .ok_or_else(|| SymbolizeError::MissingComparisonHandler { predicate: predicate.to_string() })
    }

    /// Bulk initializer for arrays of `element`.
    pub fn array_initializer(&self, element: &IrType) -> SymbolizeResult<F> {
        element
            .int_width()
            .and_then(|bits| self.array_initializers.get(&bits).copied())
            .ok_or_else(|| SymbolizeError::UnsupportedArrayElement { ty: element.to_string() })
    }
}
