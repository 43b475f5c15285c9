//! TestIR adaptor implementation.
//!
//! Lets the symbolizer instrument a parsed TIR [`Module`] in place. Inserted
//! instructions that produce a value are named `%sym.N` in creation order,
//! which keeps printed output stable between runs.

use super::*;
use crate::core::{
    Callee, DataLayout, Gep, Instruction, IrAdaptor, Operand, Signature, SymbolizeError, SymbolizeResult,
};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct ValueRef(pub u32);

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct BlockRef(pub u32);

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct FuncRef(pub u32);

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct GlobalRef(pub u32);

/// Name of the run-before-main table.
const GLOBAL_CTORS: &str = "llvm.global_ctors";

/// Adaptor that implements IrAdaptor for TIR.
pub struct TestIRAdaptor<'m> {
    module: &'m mut Module,
    layout: DataLayout,
    cur_func: usize,
    insert_before: Option<ValueRef>,
}

impl<'m> TestIRAdaptor<'m> {
    pub fn new(module: &'m mut Module) -> Self {
        let layout = module.datalayout.as_deref().map(DataLayout::parse).unwrap_or_default();
        Self {
            module,
            layout,
            cur_func: 0,
            insert_before: None,
        }
    }

    pub fn module(&self) -> &Module {
        &*self.module
    }

    pub fn layout(&self) -> &DataLayout {
        &self.layout
    }

    fn func(&self) -> &Function {
        &self.module.functions[self.cur_func]
    }

    fn func_mut(&mut self) -> &mut Function {
        &mut self.module.functions[self.cur_func]
    }

    fn push_operand(&mut self, ty: IrType, kind: ValueKind) -> ValueRef {
        self.func_mut().push_value(ValueData::new(ty, kind))
    }

    /// Insert a new instruction before the insertion point.
    fn insert(&mut self, ty: IrType, inst: Inst) -> SymbolizeResult<ValueRef> {
        let before = self.insert_before.ok_or_else(|| SymbolizeError::Host {
            reason: "no insertion point selected".to_string(),
        })?;

        let func = &mut self.module.functions[self.cur_func];
        let block = func.value(before).block.ok_or_else(|| SymbolizeError::Host {
            reason: format!("cannot insert before {}", func.format_ref(before)),
        })?;

        let name = if ty.is_void() {
            None
        } else {
            let name = format!("sym.{}", func.next_sym);
            func.next_sym += 1;
            Some(name)
        };

        let value = func.push_value(ValueData {
            name,
            ty,
            kind: ValueKind::Inst(inst),
            block: Some(block),
        });

        let insts = &mut func.blocks[block.0 as usize].insts;
        let position = insts.iter().position(|&inst| inst == before).ok_or_else(|| SymbolizeError::Host {
            reason: "insertion point is not in its block".to_string(),
        })?;
        insts.insert(position, value);
        Ok(value)
    }
}

impl IrAdaptor for TestIRAdaptor<'_> {
    type Value = ValueRef;
    type Block = BlockRef;
    type Func = FuncRef;
    type Global = GlobalRef;

    fn funcs(&self) -> Box<dyn Iterator<Item = FuncRef> + '_> {
        Box::new((0..self.module.functions.len()).map(|i| FuncRef(i as u32)))
    }

    fn func_name(&self, func: FuncRef) -> String {
        self.module.functions[func.0 as usize].name.clone()
    }

    fn func_is_declaration(&self, func: FuncRef) -> bool {
        self.module.functions[func.0 as usize].declaration
    }

    fn globals(&self) -> Box<dyn Iterator<Item = GlobalRef> + '_> {
        Box::new((0..self.module.globals.len()).map(|i| GlobalRef(i as u32)))
    }

    fn global_name(&self, global: GlobalRef) -> String {
        self.module.globals[global.0 as usize].name.clone()
    }

    fn global_value_type(&self, global: GlobalRef) -> IrType {
        self.module.globals[global.0 as usize].ty.clone()
    }

    fn global_linkage(&self, global: GlobalRef) -> Linkage {
        self.module.globals[global.0 as usize].linkage
    }

    fn pointer_bits(&self) -> u32 {
        self.layout.pointer_bits()
    }

    fn type_alloc_size(&self, ty: &IrType) -> u64 {
        self.layout.alloc_size(ty)
    }

    fn struct_field_offset(&self, ty: &IrType, index: usize) -> u64 {
        self.layout.struct_field_offset(ty, index)
    }

    fn declare_function(&mut self, name: &str, signature: &Signature) -> SymbolizeResult<FuncRef> {
        if let Some(idx) = self.module.functions.iter().position(|f| f.name == name) {
            return Ok(FuncRef(idx as u32));
        }

        let mut func = Function {
            name: name.to_string(),
            linkage: Linkage::External,
            ret: signature.ret.clone(),
            declaration: true,
            params: Vec::new(),
            blocks: Vec::new(),
            values: Vec::new(),
            next_sym: 0,
        };
        for (index, ty) in signature.params.iter().enumerate() {
            let param = func.push_value(ValueData::new(ty.clone(), ValueKind::Param(index as u32)));
            func.params.push(param);
        }

        self.module.functions.push(func);
        Ok(FuncRef(self.module.functions.len() as u32 - 1))
    }

    fn add_shadow_global(&mut self, original: GlobalRef, name: &str, ty: &IrType) -> SymbolizeResult<GlobalRef> {
        let linkage = self.global_linkage(original);
        self.module.globals.push(Global {
            name: name.to_string(),
            linkage,
            constant: false,
            ty: ty.clone(),
            init: Some(Constant::ZeroInitializer),
        });
        Ok(GlobalRef(self.module.globals.len() as u32 - 1))
    }

    fn add_constructor(&mut self, name: &str) -> SymbolizeResult<FuncRef> {
        let ret = ValueData {
            name: None,
            ty: IrType::Void,
            kind: ValueKind::Inst(Inst::Ret { value: None }),
            block: Some(BlockRef(0)),
        };
        self.module.functions.push(Function {
            name: name.to_string(),
            linkage: Linkage::Internal,
            ret: IrType::Void,
            declaration: false,
            params: Vec::new(),
            blocks: vec![Block {
                name: "entry".to_string(),
                insts: vec![ValueRef(0)],
            }],
            values: vec![ret],
            next_sym: 0,
        });
        Ok(FuncRef(self.module.functions.len() as u32 - 1))
    }

    fn register_constructor(&mut self, func: FuncRef, priority: u32) -> SymbolizeResult<()> {
        let name = self.func_name(func);
        let idx = match self.module.globals.iter().position(|g| g.name == GLOBAL_CTORS) {
            Some(idx) => idx,
            None => {
                self.module.globals.push(Global {
                    name: GLOBAL_CTORS.to_string(),
                    linkage: Linkage::Appending,
                    constant: false,
                    ty: IrType::Void,
                    init: None,
                });
                self.module.globals.len() - 1
            }
        };

        let table = &mut self.module.globals[idx];
        let mut entries = match table.init.take() {
            Some(Constant::Aggregate(entries)) => entries,
            _ => Vec::new(),
        };
        entries.push(Constant::Aggregate(vec![
            Constant::Int(u64::from(priority)),
            Constant::Symbol(name),
            Constant::Null,
        ]));

        let entry_ty = IrType::Struct(vec![IrType::Int(32), IrType::Ptr, IrType::Ptr]);
        table.ty = IrType::array(entry_ty, entries.len() as u64);
        table.init = Some(Constant::Aggregate(entries));
        Ok(())
    }

    fn switch_func(&mut self, func: FuncRef) -> bool {
        match self.module.functions.get(func.0 as usize) {
            Some(f) if !f.declaration => {
                self.cur_func = func.0 as usize;
                self.insert_before = None;
                true
            }
            _ => false,
        }
    }

    fn params(&self) -> Box<dyn Iterator<Item = ValueRef> + '_> {
        Box::new(self.func().params.iter().copied())
    }

    fn entry_block(&self) -> BlockRef {
        BlockRef(0)
    }

    fn blocks(&self) -> Box<dyn Iterator<Item = BlockRef> + '_> {
        Box::new((0..self.func().blocks.len()).map(|i| BlockRef(i as u32)))
    }

    fn block_insts(&self, block: BlockRef) -> Box<dyn Iterator<Item = ValueRef> + '_> {
        Box::new(self.func().blocks[block.0 as usize].insts.iter().copied())
    }

    fn block_terminator(&self, block: BlockRef) -> Option<ValueRef> {
        let func = self.func();
        let last = *func.blocks[block.0 as usize].insts.last()?;
        func.value(last).inst().filter(|inst| inst.is_terminator()).map(|_| last)
    }

    fn first_non_phi(&self, block: BlockRef) -> Option<ValueRef> {
        let func = self.func();
        func.blocks[block.0 as usize]
            .insts
            .iter()
            .copied()
            .find(|&inst| !func.value(inst).inst().is_some_and(Inst::is_phi))
    }

    fn next_inst(&self, inst: ValueRef) -> Option<ValueRef> {
        let func = self.func();
        let block = func.value(inst).block?;
        let insts = &func.blocks[block.0 as usize].insts;
        let position = insts.iter().position(|&i| i == inst)?;
        insts.get(position + 1).copied()
    }

    fn value_type(&self, value: ValueRef) -> IrType {
        self.func().value(value).ty.clone()
    }

    fn describe(&self, value: ValueRef) -> String {
        let func = self.func();
        if func.value(value).inst().is_some() {
            func.format_inst(value)
        } else {
            func.format_operand(value)
        }
    }

    fn operand(&self, value: ValueRef) -> Operand<ValueRef> {
        let func = self.func();
        let data = func.value(value);
        match &data.kind {
            ValueKind::Inst(_) => Operand::Instruction,
            ValueKind::ConstInt { bits, value } => Operand::ConstInt {
                bits: *bits,
                value: *value,
            },
            ValueKind::Param(index) => Operand::Param(*index),
            ValueKind::ConstGep {
                source, base, indices, ..
            } => Operand::Gep(Gep {
                source: source.clone(),
                base: *base,
                indices: indices.clone(),
            }),
            ValueKind::ConstBitCast { value: inner } => Operand::BitCast {
                value: *inner,
                from: func.value(*inner).ty.clone(),
                to: data.ty.clone(),
            },
            ValueKind::Global(_) => Operand::Global,
            ValueKind::Null => Operand::NullPointer,
            ValueKind::Float(_)
            | ValueKind::Undef
            | ValueKind::Poison
            | ValueKind::ZeroInitializer
            | ValueKind::Forward => Operand::Other,
        }
    }

    fn instruction(&self, inst: ValueRef) -> Instruction<ValueRef, BlockRef> {
        let func = self.func();
        let data = func.value(inst);
        let Some(kind) = data.inst() else {
            return Instruction::Other {
                opcode: "value".to_string(),
            };
        };

        match kind {
            Inst::Binary { op, lhs, rhs } => Instruction::Binary {
                op: *op,
                lhs: *lhs,
                rhs: *rhs,
            },
            Inst::ICmp { predicate, lhs, rhs } => Instruction::ICmp {
                predicate: *predicate,
                lhs: *lhs,
                rhs: *rhs,
            },
            Inst::Select {
                condition,
                then_value,
                else_value,
            } => Instruction::Select {
                condition: *condition,
                then_value: *then_value,
                else_value: *else_value,
            },
            Inst::Ret { value } => Instruction::Ret { value: *value },
            Inst::Br { condition, .. } => Instruction::Br { condition: *condition },
            Inst::Call { callee, args } => {
                let callee = match &func.value(*callee).kind {
                    ValueKind::Global(name) => Callee::Direct(name.clone()),
                    _ => Callee::Indirect(*callee),
                };
                Instruction::Call {
                    callee,
                    args: args.clone(),
                    ret: data.ty.clone(),
                }
            }
            Inst::Alloca { allocated, count } => Instruction::Alloca {
                allocated: allocated.clone(),
                count: *count,
            },
            Inst::Load { ptr } => Instruction::Load {
                ty: data.ty.clone(),
                ptr: *ptr,
            },
            Inst::Store { value, ptr } => Instruction::Store {
                value: *value,
                ptr: *ptr,
            },
            Inst::Gep {
                source, base, indices, ..
            } => Instruction::GetElementPtr(Gep {
                source: source.clone(),
                base: *base,
                indices: indices.clone(),
            }),
            Inst::Cast { op, value } => Instruction::Cast {
                op: *op,
                value: *value,
                from: func.value(*value).ty.clone(),
                to: data.ty.clone(),
            },
            Inst::Phi { incoming } => Instruction::Phi {
                ty: data.ty.clone(),
                incoming: incoming.clone(),
            },
            Inst::Unary { opcode, .. } => Instruction::Other { opcode: opcode.clone() },
            Inst::Unreachable => Instruction::Other {
                opcode: "unreachable".to_string(),
            },
        }
    }

    fn position_before(&mut self, inst: ValueRef) {
        self.insert_before = Some(inst);
    }

    fn const_int(&mut self, bits: u32, value: u64) -> ValueRef {
        let value = if bits >= 64 { value } else { value & ((1u64 << bits) - 1) };
        self.push_operand(IrType::Int(bits), ValueKind::ConstInt { bits, value })
    }

    fn global_address(&mut self, global: GlobalRef) -> ValueRef {
        let name = self.global_name(global);
        self.push_operand(IrType::Ptr, ValueKind::Global(name))
    }

    fn build_call(&mut self, callee: FuncRef, args: &[ValueRef]) -> SymbolizeResult<ValueRef> {
        let target = &self.module.functions[callee.0 as usize];
        let (name, ret) = (target.name.clone(), target.ret.clone());
        let callee = self.push_operand(IrType::Ptr, ValueKind::Global(name));
        self.insert(
            ret,
            Inst::Call {
                callee,
                args: args.to_vec(),
            },
        )
    }

    fn build_cast(&mut self, op: CastOp, value: ValueRef, to: &IrType) -> SymbolizeResult<ValueRef> {
        self.insert(to.clone(), Inst::Cast { op, value })
    }

    fn build_select(
        &mut self,
        condition: ValueRef,
        then_value: ValueRef,
        else_value: ValueRef,
    ) -> SymbolizeResult<ValueRef> {
        let ty = self.value_type(then_value);
        self.insert(
            ty,
            Inst::Select {
                condition,
                then_value,
                else_value,
            },
        )
    }

    fn build_phi(&mut self, ty: &IrType) -> SymbolizeResult<ValueRef> {
        self.insert(ty.clone(), Inst::Phi { incoming: Vec::new() })
    }

    fn add_incoming(&mut self, phi: ValueRef, value: ValueRef, block: BlockRef) {
        if let ValueKind::Inst(Inst::Phi { incoming }) = &mut self.func_mut().values[phi.0 as usize].kind {
            incoming.push((value, block));
        }
    }

    fn build_alloca(&mut self, ty: &IrType) -> SymbolizeResult<ValueRef> {
        self.insert(
            IrType::Ptr,
            Inst::Alloca {
                allocated: ty.clone(),
                count: None,
            },
        )
    }

    fn build_load(&mut self, ty: &IrType, ptr: ValueRef) -> SymbolizeResult<ValueRef> {
        self.insert(ty.clone(), Inst::Load { ptr })
    }

    fn build_store(&mut self, value: ValueRef, ptr: ValueRef) -> SymbolizeResult<()> {
        self.insert(IrType::Void, Inst::Store { value, ptr })?;
        Ok(())
    }

    fn build_struct_gep(&mut self, ty: &IrType, ptr: ValueRef, index: u32) -> SymbolizeResult<ValueRef> {
        let zero = self.const_int(32, 0);
        let index = self.const_int(32, u64::from(index));
        self.insert(
            IrType::Ptr,
            Inst::Gep {
                inbounds: true,
                source: ty.clone(),
                base: ptr,
                indices: vec![zero, index],
            },
        )
    }
}
