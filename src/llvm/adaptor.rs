// This module implements IrAdaptor over a real LLVM module. Handles are the raw LLVMValueRef and
// LLVMBasicBlockRef pointers of the C API, which are stable for the lifetime of the module and
// satisfy the Copy + Eq + Hash bounds of the trait. The adaptor borrows an inkwell Module
// mutably for its whole lifetime, owns one IRBuilder that is disposed on drop, and answers size
// and offset queries from the module's own data layout. Instructions are decoded by opcode into
// the closed Instruction enumeration; anything the symbolizer does not know becomes Other with
// the opcode name. The run-before-main table is rebuilt on every registration, the same way
// LLVM's appendToGlobalCtors does it: existing entries are kept and the old table is replaced
// by a new appending global with one more element.

//! LLVM IR adaptor.

use std::ffi::{CStr, CString};
use std::marker::PhantomData;

use inkwell::module::Module;
use llvm_sys::core::*;
use llvm_sys::prelude::*;
use llvm_sys::target::{LLVMABISizeOfType, LLVMGetModuleDataLayout, LLVMOffsetOfElement, LLVMPointerSize, LLVMTargetDataRef};
use llvm_sys::{LLVMIntPredicate, LLVMLinkage, LLVMOpcode, LLVMTypeKind};

use crate::core::{
    BinaryOp, Callee, CastOp, Gep, Instruction, IntPredicate, IrAdaptor, IrType, Linkage, Operand, Signature,
    SymbolizeError, SymbolizeResult,
};

const GLOBAL_CTORS: &CStr = c"llvm.global_ctors";

/// Adaptor that implements IrAdaptor for an LLVM module.
pub struct LlvmAdaptor<'m> {
    module: LLVMModuleRef,
    context: LLVMContextRef,
    builder: LLVMBuilderRef,
    target_data: LLVMTargetDataRef,
    cur_func: LLVMValueRef,
    _module: PhantomData<&'m mut ()>,
}

impl<'m> LlvmAdaptor<'m> {
    pub fn new<'ctx>(module: &'m mut Module<'ctx>) -> Self {
        let raw = module.as_mut_ptr();
        unsafe {
            let context = LLVMGetModuleContext(raw);
            Self {
                module: raw,
                context,
                builder: LLVMCreateBuilderInContext(context),
                target_data: LLVMGetModuleDataLayout(raw),
                cur_func: std::ptr::null_mut(),
                _module: PhantomData,
            }
        }
    }

    /// Convert an LLVM type. Kinds the symbolizer has no model for map to void.
    fn lift_type(&self, ty: LLVMTypeRef) -> IrType {
        unsafe {
            match LLVMGetTypeKind(ty) {
                LLVMTypeKind::LLVMIntegerTypeKind => IrType::Int(LLVMGetIntTypeWidth(ty)),
                LLVMTypeKind::LLVMHalfTypeKind => IrType::Half,
                LLVMTypeKind::LLVMBFloatTypeKind => IrType::BFloat,
                LLVMTypeKind::LLVMFloatTypeKind => IrType::Float,
                LLVMTypeKind::LLVMDoubleTypeKind => IrType::Double,
                LLVMTypeKind::LLVMX86_FP80TypeKind => IrType::X86Fp80,
                LLVMTypeKind::LLVMFP128TypeKind => IrType::Fp128,
                LLVMTypeKind::LLVMPPC_FP128TypeKind => IrType::PpcFp128,
                LLVMTypeKind::LLVMPointerTypeKind => IrType::Ptr,
                LLVMTypeKind::LLVMArrayTypeKind => {
                    IrType::Array(Box::new(self.lift_type(LLVMGetElementType(ty))), LLVMGetArrayLength2(ty))
                }
                LLVMTypeKind::LLVMVectorTypeKind => {
                    IrType::Vector(Box::new(self.lift_type(LLVMGetElementType(ty))), LLVMGetVectorSize(ty))
                }
                LLVMTypeKind::LLVMStructTypeKind => {
                    let count = LLVMCountStructElementTypes(ty);
                    let fields = (0..count).map(|i| self.lift_type(LLVMStructGetTypeAtIndex(ty, i))).collect();
                    if LLVMIsPackedStruct(ty) != 0 {
                        IrType::PackedStruct(fields)
                    } else {
                        IrType::Struct(fields)
                    }
                }
                _ => IrType::Void,
            }
        }
    }

    fn lower_type(&self, ty: &IrType) -> LLVMTypeRef {
        unsafe {
            match ty {
                IrType::Void => LLVMVoidTypeInContext(self.context),
                IrType::Int(bits) => LLVMIntTypeInContext(self.context, *bits),
                IrType::Half => LLVMHalfTypeInContext(self.context),
                IrType::BFloat => LLVMBFloatTypeInContext(self.context),
                IrType::Float => LLVMFloatTypeInContext(self.context),
                IrType::Double => LLVMDoubleTypeInContext(self.context),
                IrType::X86Fp80 => LLVMX86FP80TypeInContext(self.context),
                IrType::Fp128 => LLVMFP128TypeInContext(self.context),
                IrType::PpcFp128 => LLVMPPCFP128TypeInContext(self.context),
                IrType::Ptr => LLVMPointerTypeInContext(self.context, 0),
                IrType::Array(element, len) => LLVMArrayType2(self.lower_type(element), *len),
                IrType::Vector(element, len) => LLVMVectorType(self.lower_type(element), *len),
                IrType::Struct(fields) => self.lower_struct(fields, false),
                IrType::PackedStruct(fields) => self.lower_struct(fields, true),
            }
        }
    }

    fn lower_struct(&self, fields: &[IrType], packed: bool) -> LLVMTypeRef {
        let mut fields: Vec<_> = fields.iter().map(|f| self.lower_type(f)).collect();
        unsafe { LLVMStructTypeInContext(self.context, fields.as_mut_ptr(), fields.len() as u32, i32::from(packed)) }
    }

    fn operands(&self, inst: LLVMValueRef, range: std::ops::Range<u32>) -> Vec<LLVMValueRef> {
        range.map(|i| unsafe { LLVMGetOperand(inst, i) }).collect()
    }

    fn decode_gep(&self, gep: LLVMValueRef) -> Gep<LLVMValueRef> {
        unsafe {
            let count = LLVMGetNumOperands(gep) as u32;
            Gep {
                source: self.lift_type(LLVMGetGEPSourceElementType(gep)),
                base: LLVMGetOperand(gep, 0),
                indices: self.operands(gep, 1..count),
            }
        }
    }
}

impl Drop for LlvmAdaptor<'_> {
    fn drop(&mut self) {
        unsafe { LLVMDisposeBuilder(self.builder) }
    }
}

fn value_name(value: LLVMValueRef) -> String {
    let mut len = 0usize;
    unsafe {
        let ptr = LLVMGetValueName2(value, &mut len);
        if ptr.is_null() {
            return String::new();
        }
        String::from_utf8_lossy(std::slice::from_raw_parts(ptr as *const u8, len)).into_owned()
    }
}

fn c_name(name: &str) -> SymbolizeResult<CString> {
    CString::new(name).map_err(|_| SymbolizeError::Host {
        reason: format!("symbol name {name:?} contains a NUL byte"),
    })
}

fn built(value: LLVMValueRef, what: &str) -> SymbolizeResult<LLVMValueRef> {
    if value.is_null() {
        return Err(SymbolizeError::Host {
            reason: format!("LLVM failed to build {what}"),
        });
    }
    Ok(value)
}

fn lift_linkage(linkage: LLVMLinkage) -> Linkage {
    match linkage {
        LLVMLinkage::LLVMInternalLinkage => Linkage::Internal,
        LLVMLinkage::LLVMPrivateLinkage | LLVMLinkage::LLVMLinkerPrivateLinkage => Linkage::Private,
        LLVMLinkage::LLVMWeakAnyLinkage | LLVMLinkage::LLVMLinkerPrivateWeakLinkage => Linkage::Weak,
        LLVMLinkage::LLVMWeakODRLinkage => Linkage::WeakOdr,
        LLVMLinkage::LLVMLinkOnceAnyLinkage => Linkage::LinkOnce,
        LLVMLinkage::LLVMLinkOnceODRLinkage | LLVMLinkage::LLVMLinkOnceODRAutoHideLinkage => Linkage::LinkOnceOdr,
        LLVMLinkage::LLVMCommonLinkage => Linkage::Common,
        LLVMLinkage::LLVMAvailableExternallyLinkage => Linkage::AvailableExternally,
        LLVMLinkage::LLVMExternalWeakLinkage => Linkage::ExternWeak,
        LLVMLinkage::LLVMAppendingLinkage => Linkage::Appending,
        _ => Linkage::External,
    }
}

fn lift_binary(opcode: LLVMOpcode) -> Option<BinaryOp> {
    let op = match opcode {
        LLVMOpcode::LLVMAdd => BinaryOp::Add,
        LLVMOpcode::LLVMSub => BinaryOp::Sub,
        LLVMOpcode::LLVMMul => BinaryOp::Mul,
        LLVMOpcode::LLVMUDiv => BinaryOp::UDiv,
        LLVMOpcode::LLVMSDiv => BinaryOp::SDiv,
        LLVMOpcode::LLVMURem => BinaryOp::URem,
        LLVMOpcode::LLVMSRem => BinaryOp::SRem,
        LLVMOpcode::LLVMShl => BinaryOp::Shl,
        LLVMOpcode::LLVMLShr => BinaryOp::LShr,
        LLVMOpcode::LLVMAShr => BinaryOp::AShr,
        LLVMOpcode::LLVMAnd => BinaryOp::And,
        LLVMOpcode::LLVMOr => BinaryOp::Or,
        LLVMOpcode::LLVMXor => BinaryOp::Xor,
        LLVMOpcode::LLVMFAdd => BinaryOp::FAdd,
        LLVMOpcode::LLVMFSub => BinaryOp::FSub,
        LLVMOpcode::LLVMFMul => BinaryOp::FMul,
        LLVMOpcode::LLVMFDiv => BinaryOp::FDiv,
        LLVMOpcode::LLVMFRem => BinaryOp::FRem,
        _ => return None,
    };
    Some(op)
}

fn lift_cast(opcode: LLVMOpcode) -> Option<CastOp> {
    let op = match opcode {
        LLVMOpcode::LLVMTrunc => CastOp::Trunc,
        LLVMOpcode::LLVMZExt => CastOp::ZExt,
        LLVMOpcode::LLVMSExt => CastOp::SExt,
        LLVMOpcode::LLVMBitCast => CastOp::BitCast,
        LLVMOpcode::LLVMPtrToInt => CastOp::PtrToInt,
        LLVMOpcode::LLVMIntToPtr => CastOp::IntToPtr,
        LLVMOpcode::LLVMFPTrunc => CastOp::FPTrunc,
        LLVMOpcode::LLVMFPExt => CastOp::FPExt,
        LLVMOpcode::LLVMFPToUI => CastOp::FPToUI,
        LLVMOpcode::LLVMFPToSI => CastOp::FPToSI,
        LLVMOpcode::LLVMUIToFP => CastOp::UIToFP,
        LLVMOpcode::LLVMSIToFP => CastOp::SIToFP,
        LLVMOpcode::LLVMAddrSpaceCast => CastOp::AddrSpaceCast,
        _ => return None,
    };
    Some(op)
}

fn lower_cast(op: CastOp) -> LLVMOpcode {
    match op {
        CastOp::Trunc => LLVMOpcode::LLVMTrunc,
        CastOp::ZExt => LLVMOpcode::LLVMZExt,
        CastOp::SExt => LLVMOpcode::LLVMSExt,
        CastOp::BitCast => LLVMOpcode::LLVMBitCast,
        CastOp::PtrToInt => LLVMOpcode::LLVMPtrToInt,
        CastOp::IntToPtr => LLVMOpcode::LLVMIntToPtr,
        CastOp::FPTrunc => LLVMOpcode::LLVMFPTrunc,
        CastOp::FPExt => LLVMOpcode::LLVMFPExt,
        CastOp::FPToUI => LLVMOpcode::LLVMFPToUI,
        CastOp::FPToSI => LLVMOpcode::LLVMFPToSI,
        CastOp::UIToFP => LLVMOpcode::LLVMUIToFP,
        CastOp::SIToFP => LLVMOpcode::LLVMSIToFP,
        CastOp::AddrSpaceCast => LLVMOpcode::LLVMAddrSpaceCast,
    }
}

fn lift_predicate(predicate: LLVMIntPredicate) -> IntPredicate {
    match predicate {
        LLVMIntPredicate::LLVMIntEQ => IntPredicate::Eq,
        LLVMIntPredicate::LLVMIntNE => IntPredicate::Ne,
        LLVMIntPredicate::LLVMIntUGT => IntPredicate::Ugt,
        LLVMIntPredicate::LLVMIntUGE => IntPredicate::Uge,
        LLVMIntPredicate::LLVMIntULT => IntPredicate::Ult,
        LLVMIntPredicate::LLVMIntULE => IntPredicate::Ule,
        LLVMIntPredicate::LLVMIntSGT => IntPredicate::Sgt,
        LLVMIntPredicate::LLVMIntSGE => IntPredicate::Sge,
        LLVMIntPredicate::LLVMIntSLT => IntPredicate::Slt,
        LLVMIntPredicate::LLVMIntSLE => IntPredicate::Sle,
    }
}

/// `LLVMSwitch` becomes `switch`.
fn opcode_name(opcode: LLVMOpcode) -> String {
    let name = format!("{opcode:?}");
    name.strip_prefix("LLVM").unwrap_or(&name).to_lowercase()
}

impl IrAdaptor for LlvmAdaptor<'_> {
    type Value = LLVMValueRef;
    type Block = LLVMBasicBlockRef;
    type Func = LLVMValueRef;
    type Global = LLVMValueRef;

    fn funcs(&self) -> Box<dyn Iterator<Item = LLVMValueRef> + '_> {
        let mut funcs = Vec::new();
        unsafe {
            let mut func = LLVMGetFirstFunction(self.module);
            while !func.is_null() {
                funcs.push(func);
                func = LLVMGetNextFunction(func);
            }
        }
        Box::new(funcs.into_iter())
    }

    fn func_name(&self, func: LLVMValueRef) -> String {
        value_name(func)
    }

    fn func_is_declaration(&self, func: LLVMValueRef) -> bool {
        unsafe { LLVMIsDeclaration(func) != 0 }
    }

    fn globals(&self) -> Box<dyn Iterator<Item = LLVMValueRef> + '_> {
        let mut globals = Vec::new();
        unsafe {
            let mut global = LLVMGetFirstGlobal(self.module);
            while !global.is_null() {
                globals.push(global);
                global = LLVMGetNextGlobal(global);
            }
        }
        Box::new(globals.into_iter())
    }

    fn global_name(&self, global: LLVMValueRef) -> String {
        value_name(global)
    }

    fn global_value_type(&self, global: LLVMValueRef) -> IrType {
        self.lift_type(unsafe { LLVMGlobalGetValueType(global) })
    }

    fn global_linkage(&self, global: LLVMValueRef) -> Linkage {
        lift_linkage(unsafe { LLVMGetLinkage(global) })
    }

    fn pointer_bits(&self) -> u32 {
        unsafe { LLVMPointerSize(self.target_data) * 8 }
    }

    fn type_alloc_size(&self, ty: &IrType) -> u64 {
        // ABI size is the allocation size: it includes tail padding.
        unsafe { LLVMABISizeOfType(self.target_data, self.lower_type(ty)) }
    }

    fn struct_field_offset(&self, ty: &IrType, index: usize) -> u64 {
        unsafe { LLVMOffsetOfElement(self.target_data, self.lower_type(ty), index as u32) }
    }

    fn declare_function(&mut self, name: &str, signature: &Signature) -> SymbolizeResult<LLVMValueRef> {
        let c_name = c_name(name)?;
        unsafe {
            let existing = LLVMGetNamedFunction(self.module, c_name.as_ptr());
            if !existing.is_null() {
                return Ok(existing);
            }
            let mut params: Vec<_> = signature.params.iter().map(|p| self.lower_type(p)).collect();
            let fn_ty = LLVMFunctionType(
                self.lower_type(&signature.ret),
                params.as_mut_ptr(),
                params.len() as u32,
                0,
            );
            built(LLVMAddFunction(self.module, c_name.as_ptr(), fn_ty), name)
        }
    }

    fn add_shadow_global(
        &mut self,
        original: LLVMValueRef,
        name: &str,
        ty: &IrType,
    ) -> SymbolizeResult<LLVMValueRef> {
        let c_name = c_name(name)?;
        let ty = self.lower_type(ty);
        unsafe {
            let shadow = built(LLVMAddGlobal(self.module, ty, c_name.as_ptr()), name)?;
            LLVMSetInitializer(shadow, LLVMConstNull(ty));
            LLVMSetLinkage(shadow, LLVMGetLinkage(original));
            Ok(shadow)
        }
    }

    fn add_constructor(&mut self, name: &str) -> SymbolizeResult<LLVMValueRef> {
        let c_name = c_name(name)?;
        unsafe {
            let fn_ty = LLVMFunctionType(LLVMVoidTypeInContext(self.context), std::ptr::null_mut(), 0, 0);
            let ctor = built(LLVMAddFunction(self.module, c_name.as_ptr(), fn_ty), name)?;
            LLVMSetLinkage(ctor, LLVMLinkage::LLVMInternalLinkage);
            let entry = LLVMAppendBasicBlockInContext(self.context, ctor, c"entry".as_ptr());
            LLVMPositionBuilderAtEnd(self.builder, entry);
            LLVMBuildRetVoid(self.builder);
            Ok(ctor)
        }
    }

    fn register_constructor(&mut self, func: LLVMValueRef, priority: u32) -> SymbolizeResult<()> {
        unsafe {
            let mut entries = Vec::new();
            let existing = LLVMGetNamedGlobal(self.module, GLOBAL_CTORS.as_ptr());
            if !existing.is_null() {
                let init = LLVMGetInitializer(existing);
                if !init.is_null() {
                    let len = LLVMGetArrayLength2(LLVMGlobalGetValueType(existing));
                    entries.extend((0..len).map(|i| LLVMGetAggregateElement(init, i as u32)));
                }
                LLVMDeleteGlobal(existing);
            }

            let i32_ty = LLVMInt32TypeInContext(self.context);
            let ptr_ty = LLVMPointerTypeInContext(self.context, 0);
            let mut fields = [
                LLVMConstInt(i32_ty, u64::from(priority), 0),
                func,
                LLVMConstPointerNull(ptr_ty),
            ];
            let entry = LLVMConstStructInContext(self.context, fields.as_mut_ptr(), fields.len() as u32, 0);
            entries.push(entry);

            let table = LLVMConstArray2(LLVMTypeOf(entry), entries.as_mut_ptr(), entries.len() as u64);
            let global = built(
                LLVMAddGlobal(self.module, LLVMTypeOf(table), GLOBAL_CTORS.as_ptr()),
                "llvm.global_ctors",
            )?;
            LLVMSetLinkage(global, LLVMLinkage::LLVMAppendingLinkage);
            LLVMSetInitializer(global, table);
        }
        Ok(())
    }

    fn switch_func(&mut self, func: LLVMValueRef) -> bool {
        if func.is_null() || self.func_is_declaration(func) {
            return false;
        }
        self.cur_func = func;
        true
    }

    fn params(&self) -> Box<dyn Iterator<Item = LLVMValueRef> + '_> {
        let func = self.cur_func;
        let count = unsafe { LLVMCountParams(func) };
        Box::new((0..count).map(move |i| unsafe { LLVMGetParam(func, i) }))
    }

    fn entry_block(&self) -> LLVMBasicBlockRef {
        unsafe { LLVMGetEntryBasicBlock(self.cur_func) }
    }

    fn blocks(&self) -> Box<dyn Iterator<Item = LLVMBasicBlockRef> + '_> {
        let mut blocks = Vec::new();
        unsafe {
            let mut block = LLVMGetFirstBasicBlock(self.cur_func);
            while !block.is_null() {
                blocks.push(block);
                block = LLVMGetNextBasicBlock(block);
            }
        }
        Box::new(blocks.into_iter())
    }

    fn block_insts(&self, block: LLVMBasicBlockRef) -> Box<dyn Iterator<Item = LLVMValueRef> + '_> {
        let mut insts = Vec::new();
        unsafe {
            let mut inst = LLVMGetFirstInstruction(block);
            while !inst.is_null() {
                insts.push(inst);
                inst = LLVMGetNextInstruction(inst);
            }
        }
        Box::new(insts.into_iter())
    }

    fn block_terminator(&self, block: LLVMBasicBlockRef) -> Option<LLVMValueRef> {
        let terminator = unsafe { LLVMGetBasicBlockTerminator(block) };
        (!terminator.is_null()).then_some(terminator)
    }

    fn first_non_phi(&self, block: LLVMBasicBlockRef) -> Option<LLVMValueRef> {
        self.block_insts(block)
            .find(|&inst| unsafe { LLVMGetInstructionOpcode(inst) } != LLVMOpcode::LLVMPHI)
    }

    fn next_inst(&self, inst: LLVMValueRef) -> Option<LLVMValueRef> {
        let next = unsafe { LLVMGetNextInstruction(inst) };
        (!next.is_null()).then_some(next)
    }

    fn value_type(&self, value: LLVMValueRef) -> IrType {
        self.lift_type(unsafe { LLVMTypeOf(value) })
    }

    fn describe(&self, value: LLVMValueRef) -> String {
        unsafe {
            let raw = LLVMPrintValueToString(value);
            let text = CStr::from_ptr(raw).to_string_lossy().trim().to_string();
            LLVMDisposeMessage(raw);
            text
        }
    }

    fn operand(&self, value: LLVMValueRef) -> Operand<LLVMValueRef> {
        unsafe {
            if !LLVMIsAInstruction(value).is_null() {
                return Operand::Instruction;
            }
            if !LLVMIsAConstantInt(value).is_null() {
                let bits = LLVMGetIntTypeWidth(LLVMTypeOf(value));
                // Wider literals are rejected by the translator before their value matters.
                let literal = if bits <= 64 { LLVMConstIntGetZExtValue(value) } else { 0 };
                return Operand::ConstInt { bits, value: literal };
            }
            if !LLVMIsAArgument(value).is_null() {
                let parent = LLVMGetParamParent(value);
                let index = (0..LLVMCountParams(parent))
                    .find(|&i| LLVMGetParam(parent, i) == value)
                    .unwrap_or(0);
                return Operand::Param(index);
            }
            if !LLVMIsAConstantExpr(value).is_null() {
                return match LLVMGetConstOpcode(value) {
                    LLVMOpcode::LLVMGetElementPtr => Operand::Gep(self.decode_gep(value)),
                    LLVMOpcode::LLVMBitCast => {
                        let inner = LLVMGetOperand(value, 0);
                        Operand::BitCast {
                            value: inner,
                            from: self.value_type(inner),
                            to: self.value_type(value),
                        }
                    }
                    _ => Operand::Other,
                };
            }
            if !LLVMIsAGlobalValue(value).is_null() {
                return Operand::Global;
            }
            if !LLVMIsAConstantPointerNull(value).is_null() {
                return Operand::NullPointer;
            }
        }
        Operand::Other
    }

    fn instruction(&self, inst: LLVMValueRef) -> Instruction<LLVMValueRef, LLVMBasicBlockRef> {
        unsafe {
            let opcode = LLVMGetInstructionOpcode(inst);
            if let Some(op) = lift_binary(opcode) {
                return Instruction::Binary {
                    op,
                    lhs: LLVMGetOperand(inst, 0),
                    rhs: LLVMGetOperand(inst, 1),
                };
            }
            if let Some(op) = lift_cast(opcode) {
                let value = LLVMGetOperand(inst, 0);
                return Instruction::Cast {
                    op,
                    value,
                    from: self.value_type(value),
                    to: self.value_type(inst),
                };
            }

            match opcode {
                LLVMOpcode::LLVMICmp => Instruction::ICmp {
                    predicate: lift_predicate(LLVMGetICmpPredicate(inst)),
                    lhs: LLVMGetOperand(inst, 0),
                    rhs: LLVMGetOperand(inst, 1),
                },
                LLVMOpcode::LLVMSelect => Instruction::Select {
                    condition: LLVMGetOperand(inst, 0),
                    then_value: LLVMGetOperand(inst, 1),
                    else_value: LLVMGetOperand(inst, 2),
                },
                LLVMOpcode::LLVMRet => Instruction::Ret {
                    value: (LLVMGetNumOperands(inst) > 0).then(|| LLVMGetOperand(inst, 0)),
                },
                LLVMOpcode::LLVMBr => Instruction::Br {
                    condition: (LLVMIsConditional(inst) != 0).then(|| LLVMGetCondition(inst)),
                },
                LLVMOpcode::LLVMCall => {
                    let called = LLVMGetCalledValue(inst);
                    let callee = if LLVMIsAFunction(called).is_null() {
                        Callee::Indirect(called)
                    } else {
                        Callee::Direct(value_name(called))
                    };
                    Instruction::Call {
                        callee,
                        args: self.operands(inst, 0..LLVMGetNumArgOperands(inst)),
                        ret: self.value_type(inst),
                    }
                }
                LLVMOpcode::LLVMAlloca => Instruction::Alloca {
                    allocated: self.lift_type(LLVMGetAllocatedType(inst)),
                    count: Some(LLVMGetOperand(inst, 0)),
                },
                LLVMOpcode::LLVMLoad => Instruction::Load {
                    ty: self.value_type(inst),
                    ptr: LLVMGetOperand(inst, 0),
                },
                LLVMOpcode::LLVMStore => Instruction::Store {
                    value: LLVMGetOperand(inst, 0),
                    ptr: LLVMGetOperand(inst, 1),
                },
                LLVMOpcode::LLVMGetElementPtr => Instruction::GetElementPtr(self.decode_gep(inst)),
                LLVMOpcode::LLVMPHI => Instruction::Phi {
                    ty: self.value_type(inst),
                    incoming: (0..LLVMCountIncoming(inst))
                        .map(|i| (LLVMGetIncomingValue(inst, i), LLVMGetIncomingBlock(inst, i)))
                        .collect(),
                },
                other => Instruction::Other {
                    opcode: opcode_name(other),
                },
            }
        }
    }

    fn position_before(&mut self, inst: LLVMValueRef) {
        unsafe { LLVMPositionBuilderBefore(self.builder, inst) }
    }

    fn const_int(&mut self, bits: u32, value: u64) -> LLVMValueRef {
        unsafe { LLVMConstInt(LLVMIntTypeInContext(self.context, bits), value, 0) }
    }

    fn global_address(&mut self, global: LLVMValueRef) -> LLVMValueRef {
        global
    }

    fn build_call(&mut self, callee: LLVMValueRef, args: &[LLVMValueRef]) -> SymbolizeResult<LLVMValueRef> {
        let mut args = args.to_vec();
        unsafe {
            let fn_ty = LLVMGlobalGetValueType(callee);
            let call = LLVMBuildCall2(
                self.builder,
                fn_ty,
                callee,
                args.as_mut_ptr(),
                args.len() as u32,
                c"".as_ptr(),
            );
            built(call, "call")
        }
    }

    fn build_cast(&mut self, op: CastOp, value: LLVMValueRef, to: &IrType) -> SymbolizeResult<LLVMValueRef> {
        let to = self.lower_type(to);
        unsafe { built(LLVMBuildCast(self.builder, lower_cast(op), value, to, c"".as_ptr()), op.mnemonic()) }
    }

    fn build_select(
        &mut self,
        condition: LLVMValueRef,
        then_value: LLVMValueRef,
        else_value: LLVMValueRef,
    ) -> SymbolizeResult<LLVMValueRef> {
        unsafe {
            built(
                LLVMBuildSelect(self.builder, condition, then_value, else_value, c"".as_ptr()),
                "select",
            )
        }
    }

    fn build_phi(&mut self, ty: &IrType) -> SymbolizeResult<LLVMValueRef> {
        let ty = self.lower_type(ty);
        unsafe { built(LLVMBuildPhi(self.builder, ty, c"".as_ptr()), "phi") }
    }

    fn add_incoming(&mut self, phi: LLVMValueRef, value: LLVMValueRef, block: LLVMBasicBlockRef) {
        let mut values = [value];
        let mut blocks = [block];
        unsafe { LLVMAddIncoming(phi, values.as_mut_ptr(), blocks.as_mut_ptr(), 1) }
    }

    fn build_alloca(&mut self, ty: &IrType) -> SymbolizeResult<LLVMValueRef> {
        let ty = self.lower_type(ty);
        unsafe { built(LLVMBuildAlloca(self.builder, ty, c"".as_ptr()), "alloca") }
    }

    fn build_load(&mut self, ty: &IrType, ptr: LLVMValueRef) -> SymbolizeResult<LLVMValueRef> {
        let ty = self.lower_type(ty);
        unsafe { built(LLVMBuildLoad2(self.builder, ty, ptr, c"".as_ptr()), "load") }
    }

    fn build_store(&mut self, value: LLVMValueRef, ptr: LLVMValueRef) -> SymbolizeResult<()> {
        unsafe { built(LLVMBuildStore(self.builder, value, ptr), "store")? };
        Ok(())
    }

    fn build_struct_gep(&mut self, ty: &IrType, ptr: LLVMValueRef, index: u32) -> SymbolizeResult<LLVMValueRef> {
        let ty = self.lower_type(ty);
        unsafe { built(LLVMBuildStructGEP2(self.builder, ty, ptr, index, c"".as_ptr()), "struct gep") }
    }
}
