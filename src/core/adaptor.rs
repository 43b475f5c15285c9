// This module defines the IrAdaptor trait, the bridge between the symbolizer and any
// LLVM-like SSA intermediate representation. The translator never touches a concrete compiler
// API: it enumerates functions and globals, walks blocks and instructions, classifies operands,
// and inserts new instructions only through this trait. Associated types name the host's handles
// for values, blocks, functions and globals. Instructions and operands are decoded into the
// closed enumerations Instruction and Operand so the translator can dispatch with an exhaustive
// match. Builder methods insert at the position chosen with position_before. Module edits cover
// what the pass needs at setup: get-or-insert declarations of runtime functions, shadow globals
// with the original's linkage, and a startup routine registered in the run-before-main table.

//! IrAdaptor responsibilities.
//!
//! The adaptor is the glue between the symbolizer and the host's SSA IR. The
//! framework assumes:
//! - Each function has a single entry block with no merge nodes.
//! - Basic blocks contain a list of instructions ending with a terminator.
//! - Merge (phi) nodes are grouped at the start of their block.
//! - Pointers are opaque; loads, allocas and address computations carry the
//!   type they operate on.
//!
//! Handles returned by the query methods stay valid while instructions are
//! inserted, so the translator can snapshot a function before rewriting it.

use std::fmt::Debug;
use std::hash::Hash;

use super::error::SymbolizeResult;
use super::types::{BinaryOp, CastOp, IntPredicate, IrType, Linkage, Signature};

/// Target of a call instruction.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Callee<V> {
    /// Call of a named function.
    Direct(String),
    /// Call through a function pointer.
    Indirect(V),
}

/// An address computation, either an instruction or a constant expression.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Gep<V> {
    /// Type the first index strides over.
    pub source: IrType,
    pub base: V,
    pub indices: Vec<V>,
}

/// Decoded view of one instruction.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Instruction<V, B> {
    Binary { op: BinaryOp, lhs: V, rhs: V },
    ICmp { predicate: IntPredicate, lhs: V, rhs: V },
    Select { condition: V, then_value: V, else_value: V },
    Ret { value: Option<V> },
    Br { condition: Option<V> },
    Call { callee: Callee<V>, args: Vec<V>, ret: IrType },
    /// `count` is absent for single-element allocations.
    Alloca { allocated: IrType, count: Option<V> },
    Load { ty: IrType, ptr: V },
    Store { value: V, ptr: V },
    GetElementPtr(Gep<V>),
    Cast { op: CastOp, value: V, from: IrType, to: IrType },
    Phi { ty: IrType, incoming: Vec<(V, B)> },
    /// Anything else, named by its opcode.
    Other { opcode: String },
}

impl<V, B> Instruction<V, B> {
    /// Short kind name used in statistics.
    pub fn kind(&self) -> &'static str {
        match self {
            Instruction::Binary { .. } => "binary",
            Instruction::ICmp { .. } => "icmp",
            Instruction::Select { .. } => "select",
            Instruction::Ret { .. } => "ret",
            Instruction::Br { .. } => "br",
            Instruction::Call { .. } => "call",
            Instruction::Alloca { .. } => "alloca",
            Instruction::Load { .. } => "load",
            Instruction::Store { .. } => "store",
            Instruction::GetElementPtr(_) => "getelementptr",
            Instruction::Cast { .. } => "cast",
            Instruction::Phi { .. } => "phi",
            Instruction::Other { .. } => "other",
        }
    }
}

/// Classification of a value used as an operand.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Operand<V> {
    /// Result of an instruction in the current function.
    Instruction,
    /// Integer or boolean literal. `value` holds the low 64 bits.
    ConstInt { bits: u32, value: u64 },
    /// Function parameter at the given position.
    Param(u32),
    /// Constant address computation.
    Gep(Gep<V>),
    /// Constant reinterpretation of another value.
    BitCast { value: V, from: IrType, to: IrType },
    /// Address of a module-scope symbol.
    Global,
    NullPointer,
    /// Undef, poison, floating-point literals, aggregate constants, ...
    Other,
}

/// Bridge between an SSA IR and the symbolizer.
///
/// Query methods that take instructions or blocks refer to the function
/// selected with [`IrAdaptor::switch_func`].
pub trait IrAdaptor {
    type Value: Copy + Eq + Hash + Debug;
    type Block: Copy + Eq + Hash + Debug;
    type Func: Copy + Eq + Hash + Debug;
    type Global: Copy + Eq + Hash + Debug;

    /// Iterator over all functions in the module, declarations included.
    fn funcs(&self) -> Box<dyn Iterator<Item = Self::Func> + '_>;

    fn func_name(&self, func: Self::Func) -> String;

    /// Functions without a body.
    fn func_is_declaration(&self, func: Self::Func) -> bool;

    /// Iterator over the module-scope variables.
    fn globals(&self) -> Box<dyn Iterator<Item = Self::Global> + '_>;

    fn global_name(&self, global: Self::Global) -> String;

    /// Type of the storage behind a module-scope variable.
    fn global_value_type(&self, global: Self::Global) -> IrType;

    fn global_linkage(&self, global: Self::Global) -> Linkage;

    /// Width in bits of pointers in the module.
    fn pointer_bits(&self) -> u32;

    /// Distance in bytes between consecutive elements of type `ty`.
    fn type_alloc_size(&self, ty: &IrType) -> u64;

    /// Byte offset of field `index` in the struct type `ty`, packed or not.
    fn struct_field_offset(&self, ty: &IrType, index: usize) -> u64;

    /// Get or insert an external function declaration.
    fn declare_function(&mut self, name: &str, signature: &Signature) -> SymbolizeResult<Self::Func>;

    /// Add a zero-initialised, writable global with the linkage of `original`.
    fn add_shadow_global(
        &mut self,
        original: Self::Global,
        name: &str,
        ty: &IrType,
    ) -> SymbolizeResult<Self::Global>;

    /// Add an internal `void ()` function whose entry block holds only `ret void`.
    fn add_constructor(&mut self, name: &str) -> SymbolizeResult<Self::Func>;

    /// Append `func` to the module's run-before-main table.
    fn register_constructor(&mut self, func: Self::Func, priority: u32) -> SymbolizeResult<()>;

    /// Select the function later queries and insertions refer to.
    fn switch_func(&mut self, func: Self::Func) -> bool;

    /// Parameters of the current function, in order.
    fn params(&self) -> Box<dyn Iterator<Item = Self::Value> + '_>;

    /// Entry block of the current function.
    fn entry_block(&self) -> Self::Block;

    /// Iterator over blocks in the current function.
    ///
    /// ```ignore
    /// adaptor.switch_func(func);
    /// for block in adaptor.blocks() {
    ///     for inst in adaptor.block_insts(block) {
    ///         let _ = adaptor.instruction(inst).kind();
    ///     }
    /// }
    /// ```
    fn blocks(&self) -> Box<dyn Iterator<Item = Self::Block> + '_>;

    /// Iterator over instructions of the given block, terminator included.
    fn block_insts(&self, block: Self::Block) -> Box<dyn Iterator<Item = Self::Value> + '_>;

    fn block_terminator(&self, block: Self::Block) -> Option<Self::Value>;

    /// First instruction of the block that is not a merge node.
    fn first_non_phi(&self, block: Self::Block) -> Option<Self::Value>;

    /// Instruction following `inst` in its block.
    fn next_inst(&self, inst: Self::Value) -> Option<Self::Value>;

    fn value_type(&self, value: Self::Value) -> IrType;

    /// Printable description of a value for diagnostics.
    fn describe(&self, value: Self::Value) -> String;

    /// Classify a value used as an operand.
    fn operand(&self, value: Self::Value) -> Operand<Self::Value>;

    /// Decode an instruction of the current function.
    fn instruction(&self, inst: Self::Value) -> Instruction<Self::Value, Self::Block>;

    /// Insert subsequent instructions right before `inst`.
    fn position_before(&mut self, inst: Self::Value);

    /// Integer literal of the given width.
    fn const_int(&mut self, bits: u32, value: u64) -> Self::Value;

    /// Value denoting the address of a module-scope variable.
    fn global_address(&mut self, global: Self::Global) -> Self::Value;

    fn build_call(&mut self, callee: Self::Func, args: &[Self::Value]) -> SymbolizeResult<Self::Value>;

    fn build_cast(&mut self, op: CastOp, value: Self::Value, to: &IrType) -> SymbolizeResult<Self::Value>;

    fn build_select(
        &mut self,
        condition: Self::Value,
        then_value: Self::Value,
        else_value: Self::Value,
    ) -> SymbolizeResult<Self::Value>;

    /// Merge node without incoming edges.
    fn build_phi(&mut self, ty: &IrType) -> SymbolizeResult<Self::Value>;

    fn add_incoming(&mut self, phi: Self::Value, value: Self::Value, block: Self::Block);

    fn build_alloca(&mut self, ty: &IrType) -> SymbolizeResult<Self::Value>;

    fn build_load(&mut self, ty: &IrType, ptr: Self::Value) -> SymbolizeResult<Self::Value>;

    fn build_store(&mut self, value: Self::Value, ptr: Self::Value) -> SymbolizeResult<()>;

    /// Address of field `index` of the aggregate of type `ty` at `ptr`.
    fn build_struct_gep(&mut self, ty: &IrType, ptr: Self::Value, index: u32) -> SymbolizeResult<Self::Value>;
}
