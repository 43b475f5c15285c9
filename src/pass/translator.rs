// This module implements the per-function instruction translator. A Symbolizer is created for
// one function, walks a snapshot of its original instructions, and inserts alongside each one
// the runtime calls that build its symbolic expression. Shadows live in an arena-backed cache
// keyed by value identity. Lookups go through get_or_build, which materialises shadows for
// literals, parameters, constant address computations and global addresses at the entry
// anchor (the first original instruction of the entry block) so that one handle dominates
// every use. Null pointers are rebuilt at each use. Address computations are expanded into
// add/mul expressions over byte offsets taken from the data layout. Merge nodes get a shadow
// phi immediately; its incoming edges are filled after the whole function has been visited,
// each built right before the predecessor's terminator, so loop back-edges see their values.
// Constructs that cannot be tracked are reported as diagnostics and leave the value without a
// shadow; using such a value later is a fatal MissingExpression error.

//! Instruction translator.

use bumpalo::collections::Vec as BumpVec;
use bumpalo::Bump;

use super::cache::ExpressionCache;
use super::options::SymbolizeOptions;
use super::runtime::RuntimeBindings;
use crate::core::{
    shadow_type, BinaryOp, Callee, CastOp, DiagnosticKind, Gep, Instruction, IrAdaptor, IrType, Operand,
    SymbolizeError, SymbolizeResult, SymbolizeSession,
};

/// A shadow merge node waiting for its incoming edges.
struct PendingMerge<V, B> {
    shadow: V,
    incoming: Vec<(V, B)>,
}

/// Translator for the function currently selected in the adaptor.
pub struct Symbolizer<'a, 'arena, A: IrAdaptor> {
    ir: &'a mut A,
    bindings: &'a RuntimeBindings<A::Func>,
    options: &'a SymbolizeOptions,
    session: &'a SymbolizeSession,

    /// Shadows of the values translated so far.
    cache: ExpressionCache<'arena, A::Value>,

    pending_merges: BumpVec<'arena, PendingMerge<A::Value, A::Block>>,

    /// First original instruction of the entry block.
    entry_anchor: A::Value,

    /// Instruction new code is inserted before.
    cursor: A::Value,
}

impl<'a, 'arena, A: IrAdaptor> Symbolizer<'a, 'arena, A> {
    /// Prepare the translation of the function selected in `ir`.
    pub fn new(
        ir: &'a mut A,
        bindings: &'a RuntimeBindings<A::Func>,
        options: &'a SymbolizeOptions,
        session: &'a SymbolizeSession,
        arena: &'arena Bump,
    ) -> SymbolizeResult<Self> {
        let entry = ir.entry_block();
        let entry_anchor = ir.first_non_phi(entry).ok_or_else(|| SymbolizeError::Host {
            reason: "entry block has no instructions".to_string(),
        })?;

        Ok(Self {
            ir,
            bindings,
            options,
            session,
            cache: ExpressionCache::new_in(arena),
            pending_merges: BumpVec::new_in(arena),
            entry_anchor,
            cursor: entry_anchor,
        })
    }

    /// Instrument every original instruction of the function.
    pub fn symbolize_function(&mut self) -> SymbolizeResult<()> {
        let blocks: Vec<_> = self.ir.blocks().collect();
        let instructions: Vec<_> = blocks
            .iter()
            .flat_map(|&block| self.ir.block_insts(block).collect::<Vec<_>>())
            .collect();

        // Nested calls overwrite the runtime's parameter slots, so read them all first.
        self.set_cursor(self.entry_anchor);
        let params: Vec<_> = self.ir.params().collect();
        for (index, param) in params.into_iter().enumerate() {
            let expr = self.parameter_expression(index as u32)?;
            self.remember(param, expr);
        }

        for inst in instructions {
            self.visit(inst)?;
        }

        self.resolve_merges()
    }

    /// Load or create the symbolic expression for a value.
    pub fn get_or_build(&mut self, value: A::Value) -> SymbolizeResult<A::Value> {
        if let Some(expr) = self.cache.get(value) {
            return Ok(expr);
        }

        let expr = match self.ir.operand(value) {
            Operand::ConstInt { bits, value: literal } => {
                self.at_entry(|s| s.integer_literal(bits, literal))?
            }
            Operand::Param(index) => self.at_entry(|s| s.parameter_expression(index))?,
            Operand::Gep(gep) => self.at_entry(|s| s.expand_gep(&gep))?,
            Operand::BitCast { value: inner, from, to } => {
                self.at_entry(|s| s.pointer_cast(inner, &from, &to))?
            }
            Operand::Global => self.at_entry(|s| s.global_expression(value))?,
            // The same null constant shows up in unrelated places; never bind one handle to all.
            Operand::NullPointer => return self.call(self.bindings.build_null_pointer, &[]),
            Operand::Instruction | Operand::Other => {
                return Err(SymbolizeError::MissingExpression {
                    value: self.ir.describe(value),
                });
            }
        };

        self.remember(value, expr);
        Ok(expr)
    }

    /// Build the expression of an address computation from its base and indices.
    ///
    /// The result describes the computed address; memory is never accessed.
    pub fn expand_gep(&mut self, gep: &Gep<A::Value>) -> SymbolizeResult<A::Value> {
        let mut expr = self.get_or_build(gep.base)?;
        let add = self.bindings.binary_handler(BinaryOp::Add)?;
        let mut indexed = gep.source.clone();

        for (position, &index) in gep.indices.iter().enumerate() {
            let offset = if position == 0 {
                self.element_offset(index, &gep.source)?
            } else {
                match indexed {
                    IrType::Array(element, _) | IrType::Vector(element, _) => {
                        let offset = self.element_offset(index, &element)?;
                        indexed = *element;
                        offset
                    }
                    IrType::Struct(ref fields) | IrType::PackedStruct(ref fields) => {
                        let member = self.struct_member(index, &indexed, fields.len())?;
                        let offset = self.ir.struct_field_offset(&indexed, member);
                        let field = fields[member].clone();
                        indexed = field;
                        Some(self.pointer_sized_integer(offset)?)
                    }
                    other => {
                        return Err(SymbolizeError::InvalidGepIndex { ty: other.to_string() });
                    }
                }
            };

            if let Some(offset) = offset {
                expr = self.call(add, &[expr, offset])?;
            }
        }

        Ok(expr)
    }

    fn visit(&mut self, inst: A::Value) -> SymbolizeResult<()> {
        let decoded = self.ir.instruction(inst);
        log::trace!("visiting {}", self.ir.describe(inst));
        self.session.record_instruction_visited(decoded.kind());
        self.set_cursor(inst);

        match decoded {
            Instruction::Binary { op, lhs, rhs } => {
                let handler = self.bindings.binary_handler(op)?;
                let lhs = self.get_or_build(lhs)?;
                let rhs = self.get_or_build(rhs)?;
                let expr = self.call(handler, &[lhs, rhs])?;
                self.remember(inst, expr);
            }
            Instruction::ICmp { predicate, lhs, rhs } => {
                let handler = self.bindings.comparison_handler(predicate)?;
                let lhs = self.get_or_build(lhs)?;
                let rhs = self.get_or_build(rhs)?;
                let expr = self.call(handler, &[lhs, rhs])?;
                self.remember(inst, expr);
            }
            Instruction::Select { condition, then_value, else_value } => {
                self.push_path_constraint(condition)?;
                let then_expr = self.get_or_build(then_value)?;
                let else_expr = self.get_or_build(else_value)?;
                let expr = self.ir.build_select(condition, then_expr, else_expr)?;
                self.remember(inst, expr);
            }
            Instruction::Ret { value: Some(value) } => {
                let expr = self.get_or_build(value)?;
                self.call(self.bindings.set_return_expression, &[expr])?;
            }
            Instruction::Ret { value: None } => {}
            Instruction::Br { condition: Some(condition) } => {
                self.push_path_constraint(condition)?;
            }
            Instruction::Br { condition: None } => {}
            Instruction::Call { callee, args, ret } => self.visit_call(inst, callee, &args, &ret)?,
            Instruction::Alloca { allocated, count } => self.visit_alloca(inst, &allocated, count)?,
            Instruction::Load { ty, ptr } => {
                let shadow_ptr = self.get_or_build(ptr)?;
                let shadow_ty = shadow_type(&ty)?.ir_type();
                let expr = self.ir.build_load(&shadow_ty, shadow_ptr)?;
                self.remember(inst, expr);
            }
            Instruction::Store { value, ptr } => {
                let expr = self.get_or_build(value)?;
                let shadow_ptr = self.get_or_build(ptr)?;
                self.ir.build_store(expr, shadow_ptr)?;
            }
            Instruction::GetElementPtr(gep) => {
                let expr = self.expand_gep(&gep)?;
                self.remember(inst, expr);
            }
            Instruction::Cast { op, value, from, to } => self.visit_cast(inst, op, value, &from, &to)?,
            Instruction::Phi { incoming, .. } => {
                let shadow = self.ir.build_phi(&IrType::Ptr)?;
                self.remember(inst, shadow);
                self.pending_merges.push(PendingMerge { shadow, incoming });
            }
            Instruction::Other { opcode } => {
                let message = format!("{opcode}: {}", self.ir.describe(inst));
                self.session.report(DiagnosticKind::UnknownInstruction, message);
            }
        }

        Ok(())
    }

    fn visit_call(
        &mut self,
        inst: A::Value,
        callee: Callee<A::Value>,
        args: &[A::Value],
        ret: &IrType,
    ) -> SymbolizeResult<()> {
        let name = match callee {
            Callee::Direct(name) => name,
            Callee::Indirect(_) => {
                let message = format!("losing track of symbolic expressions at {}", self.ir.describe(inst));
                self.session.report(DiagnosticKind::IndirectCall, message);
                return Ok(());
            }
        };

        if self.options.is_runtime_function(&name) {
            return Ok(());
        }

        if name.starts_with("llvm.") {
            return self.visit_intrinsic(inst, &name, args);
        }

        if name != self.options.symbolic_input_hook {
            for (index, &arg) in args.iter().enumerate() {
                let expr = self.get_or_build(arg)?;
                let index = self.byte_immediate(index as u64, "argument index")?;
                self.call(self.bindings.set_parameter_expression, &[index, expr])?;
            }
        }

        if ret.is_void() {
            return Ok(());
        }

        let next = self.ir.next_inst(inst).ok_or_else(|| SymbolizeError::Host {
            reason: format!("call {name} is the last instruction of its block"),
        })?;
        self.set_cursor(next);
        let expr = self.call(self.bindings.get_return_expression, &[])?;
        self.remember(inst, expr);
        log::debug!("return expression of {name} fetched");
        Ok(())
    }

    fn visit_intrinsic(&mut self, inst: A::Value, name: &str, args: &[A::Value]) -> SymbolizeResult<()> {
        if name.starts_with("llvm.lifetime.") || name.starts_with("llvm.dbg.") {
            return Ok(());
        }

        if name.starts_with("llvm.memcpy.") {
            let &[dest, src, size, ..] = args else {
                return Err(SymbolizeError::Host {
                    reason: format!("{name} called with {} arguments", args.len()),
                });
            };
            let size = self.fit_to_pointer_width(size)?;
            self.call(self.bindings.memcpy, &[dest, src, size])?;
            return Ok(());
        }

        let message = format!("unhandled LLVM intrinsic {name} in {}", self.ir.describe(inst));
        self.session.report(DiagnosticKind::UnhandledIntrinsic, message);
        Ok(())
    }

    fn visit_alloca(&mut self, inst: A::Value, allocated: &IrType, count: Option<A::Value>) -> SymbolizeResult<()> {
        let single = match count {
            None => true,
            Some(count) => matches!(self.ir.operand(count), Operand::ConstInt { value: 1, .. }),
        };
        if !single {
            let message = format!("stack-allocated arrays are not supported: {}", self.ir.describe(inst));
            self.session.report(DiagnosticKind::DynamicAlloca, message);
            return Ok(());
        }

        let shadow_ty = shadow_type(allocated)?.ir_type();
        let storage = self.ir.build_alloca(&shadow_ty)?;
        self.remember(inst, storage);
        log::debug!("shadow storage {shadow_ty} allocated");
        Ok(())
    }

    fn visit_cast(
        &mut self,
        inst: A::Value,
        op: CastOp,
        value: A::Value,
        from: &IrType,
        to: &IrType,
    ) -> SymbolizeResult<()> {
        let expr = match (op, from.int_width(), to.int_width()) {
            (CastOp::Trunc, Some(_), Some(to_bits)) => {
                let source = self.get_or_build(value)?;
                let bits = self.byte_immediate(u64::from(to_bits), "truncation width")?;
                self.call(self.bindings.build_trunc, &[source, bits])?
            }
            // i1 is a boolean for the runtime and has no bit-vector width to extend.
            (CastOp::ZExt | CastOp::SExt, Some(1), Some(_)) => self.get_or_build(value)?,
            (CastOp::ZExt | CastOp::SExt, Some(from_bits), Some(to_bits)) => {
                let target = if op == CastOp::ZExt {
                    self.bindings.build_zext
                } else {
                    self.bindings.build_sext
                };
                let source = self.get_or_build(value)?;
                let added = u64::from(to_bits.saturating_sub(from_bits));
                let delta = self.byte_immediate(added, "extension width")?;
                self.call(target, &[source, delta])?
            }
            (CastOp::BitCast, _, _) => self.pointer_cast(value, from, to)?,
            _ => {
                let message = format!("unhandled cast instruction {}", self.ir.describe(inst));
                self.session.report(DiagnosticKind::UnsupportedCast, message);
                return Ok(());
            }
        };

        self.remember(inst, expr);
        Ok(())
    }

    fn resolve_merges(&mut self) -> SymbolizeResult<()> {
        for position in 0..self.pending_merges.len() {
            let shadow = self.pending_merges[position].shadow;
            let incoming = std::mem::take(&mut self.pending_merges[position].incoming);
            for (value, block) in incoming {
                // Merge nodes can't be preceded by regular code in their own block.
                let terminator = self.ir.block_terminator(block).ok_or_else(|| SymbolizeError::Host {
                    reason: "predecessor block has no terminator".to_string(),
                })?;
                self.set_cursor(terminator);
                let expr = self.get_or_build(value)?;
                self.ir.add_incoming(shadow, expr, block);
            }
            self.session.record_merge_resolved();
        }
        Ok(())
    }

    // Helpers

    fn push_path_constraint(&mut self, condition: A::Value) -> SymbolizeResult<()> {
        let expr = self.get_or_build(condition)?;
        self.call(self.bindings.push_path_constraint, &[expr, condition])?;
        Ok(())
    }

    /// Pointer reinterpretation keeps the operand's shadow.
    fn pointer_cast(&mut self, value: A::Value, from: &IrType, to: &IrType) -> SymbolizeResult<A::Value> {
        if !(from.is_pointer() && to.is_pointer()) {
            return Err(SymbolizeError::NonPointerBitCast {
                from: from.to_string(),
                to: to.to_string(),
            });
        }
        self.get_or_build(value)
    }

    fn integer_literal(&mut self, bits: u32, literal: u64) -> SymbolizeResult<A::Value> {
        if bits > 64 {
            return Err(SymbolizeError::UnsupportedConstantWidth { bits });
        }
        let literal = self.ir.const_int(64, literal);
        let bits = self.ir.const_int(8, u64::from(bits));
        self.call(self.bindings.build_integer, &[literal, bits])
    }

    fn parameter_expression(&mut self, index: u32) -> SymbolizeResult<A::Value> {
        let index = self.byte_immediate(u64::from(index), "parameter index")?;
        self.call(self.bindings.get_parameter_expression, &[index])
    }

    /// The runtime takes widths and indices as `i8`.
    fn byte_immediate(&mut self, value: u64, what: &str) -> SymbolizeResult<A::Value> {
        if value > u64::from(u8::MAX) {
            return Err(SymbolizeError::ImmediateOutOfRange { what: what.to_string(), value });
        }
        Ok(self.ir.const_int(8, value))
    }

    /// A global's identity is its address.
    fn global_expression(&mut self, global: A::Value) -> SymbolizeResult<A::Value> {
        let address = self.ir.build_cast(CastOp::PtrToInt, global, &IrType::Int(64))?;
        let bits = self.ir.const_int(8, u64::from(self.ir.pointer_bits()));
        self.call(self.bindings.build_integer, &[address, bits])
    }

    fn pointer_sized_integer(&mut self, value: u64) -> SymbolizeResult<A::Value> {
        let value = self.ir.const_int(64, value);
        let bits = self.ir.const_int(8, u64::from(self.ir.pointer_bits()));
        self.call(self.bindings.build_integer, &[value, bits])
    }

    /// Offset contributed by stepping `index` elements of type `element`.
    fn element_offset(&mut self, index: A::Value, element: &IrType) -> SymbolizeResult<Option<A::Value>> {
        if matches!(self.ir.operand(index), Operand::ConstInt { value: 0, .. }) {
            return Ok(None);
        }

        let mul = self.bindings.binary_handler(BinaryOp::Mul)?;
        let element_size = self.ir.type_alloc_size(element);
        let size_expr = self.pointer_sized_integer(element_size)?;
        let index_expr = self.get_or_build(index)?;
        Ok(Some(self.call(mul, &[index_expr, size_expr])?))
    }

    /// Structs can only be indexed with constants.
    fn struct_member(&self, index: A::Value, ty: &IrType, field_count: usize) -> SymbolizeResult<usize> {
        match self.ir.operand(index) {
            Operand::ConstInt { value, .. } if (value as usize) < field_count => Ok(value as usize),
            Operand::ConstInt { .. } => Err(SymbolizeError::InvalidGepIndex { ty: ty.to_string() }),
            _ => Err(SymbolizeError::NonConstantStructIndex {
                ty: ty.to_string(),
                index: self.ir.describe(index),
            }),
        }
    }

    fn fit_to_pointer_width(&mut self, value: A::Value) -> SymbolizeResult<A::Value> {
        let pointer_bits = self.ir.pointer_bits();
        match self.ir.value_type(value).int_width() {
            Some(bits) if bits < pointer_bits => self.ir.build_cast(CastOp::ZExt, value, &IrType::Int(pointer_bits)),
            Some(bits) if bits > pointer_bits => self.ir.build_cast(CastOp::Trunc, value, &IrType::Int(pointer_bits)),
            _ => Ok(value),
        }
    }

    /// Build shadows that must dominate every use at the entry anchor.
    fn at_entry<T>(&mut self, build: impl FnOnce(&mut Self) -> SymbolizeResult<T>) -> SymbolizeResult<T> {
        let saved = self.cursor;
        self.set_cursor(self.entry_anchor);
        let result = build(self);
        self.set_cursor(saved);
        result
    }

    fn set_cursor(&mut self, inst: A::Value) {
        self.cursor = inst;
        self.ir.position_before(inst);
    }

    fn call(&mut self, func: A::Func, args: &[A::Value]) -> SymbolizeResult<A::Value> {
        let call = self.ir.build_call(func, args)?;
        self.session.record_runtime_call();
        Ok(call)
    }

    fn remember(&mut self, value: A::Value, expr: A::Value) {
        self.cache.insert(value, expr);
        self.session.record_expression_cached();
    }
}
