//! Test IR (TIR) data structures for exercising the symbolizer.
//!
//! TIR is a textual subset of LLVM IR that can be parsed, instrumented in
//! place through [`TestIRAdaptor`], and printed back. It lets the pass be
//! tested without an LLVM installation while keeping test inputs readable by
//! anyone who knows LLVM.
//!
//! # TIR Format
//!
//! ```text
//! ; Comments start with semicolon
//! target datalayout = "e-p:64:64"
//!
//! @counter = internal global i32 0
//!
//! declare void @consume(i32)
//!
//! define i32 @f(i32 %a) {
//! entry:
//!   %x = add nsw i32 %a, 1
//!   %c = icmp slt i32 %x, 10
//!   br i1 %c, label %small, label %done
//! small:
//!   br label %done
//! done:
//!   %r = phi i32 [ %x, %entry ], [ 0, %small ]
//!   ret i32 %r
//! }
//! ```
//!
//! Every occurrence of a literal or a global reference inside a function is
//! its own value, as in LLVM before uniquing.

use crate::core::{BinaryOp, CastOp, IntPredicate, IrType, Linkage};

pub mod adaptor;
pub mod parser;
pub mod printer;

pub use adaptor::{BlockRef, FuncRef, GlobalRef, TestIRAdaptor, ValueRef};
pub use parser::ParseError;

/// A parsed TIR module.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Module {
    pub datalayout: Option<String>,
    pub triple: Option<String>,
    pub globals: Vec<Global>,
    pub functions: Vec<Function>,
}

/// Module-scope variable.
#[derive(Debug, Clone, PartialEq)]
pub struct Global {
    pub name: String,
    pub linkage: Linkage,
    pub constant: bool,
    pub ty: IrType,
    /// `None` for external declarations.
    pub init: Option<Constant>,
}

/// Initializer of a module-scope variable.
#[derive(Debug, Clone, PartialEq)]
pub enum Constant {
    /// Integer literal, masked to the width of its type.
    Int(u64),
    Float(String),
    Null,
    ZeroInitializer,
    Undef,
    /// Address of a function or global.
    Symbol(String),
    /// Array or struct elements, typed by the enclosing type.
    Aggregate(Vec<Constant>),
}

#[derive(Debug, Clone, PartialEq)]
pub struct Function {
    pub name: String,
    pub linkage: Linkage,
    pub ret: IrType,
    pub declaration: bool,
    pub params: Vec<ValueRef>,
    pub blocks: Vec<Block>,
    pub values: Vec<ValueData>,
    /// Counter for names of inserted values.
    pub next_sym: u32,
}

#[derive(Debug, Clone, PartialEq)]
pub struct Block {
    pub name: String,
    pub insts: Vec<ValueRef>,
}

/// A value local to one function.
#[derive(Debug, Clone, PartialEq)]
pub struct ValueData {
    pub name: Option<String>,
    pub ty: IrType,
    pub kind: ValueKind,
    /// Block holding the instruction, for instructions.
    pub block: Option<BlockRef>,
}

#[derive(Debug, Clone, PartialEq)]
pub enum ValueKind {
    Param(u32),
    Inst(Inst),
    ConstInt { bits: u32, value: u64 },
    Float(String),
    Null,
    Undef,
    Poison,
    ZeroInitializer,
    /// Reference to a global variable or function.
    Global(String),
    ConstGep {
        inbounds: bool,
        source: IrType,
        base: ValueRef,
        indices: Vec<ValueRef>,
    },
    ConstBitCast { value: ValueRef },
    /// Used before its definition; only exists while parsing.
    Forward,
}

#[derive(Debug, Clone, PartialEq)]
pub enum Inst {
    Binary { op: BinaryOp, lhs: ValueRef, rhs: ValueRef },
    ICmp { predicate: IntPredicate, lhs: ValueRef, rhs: ValueRef },
    Select { condition: ValueRef, then_value: ValueRef, else_value: ValueRef },
    Ret { value: Option<ValueRef> },
    Br { condition: Option<ValueRef>, targets: Vec<BlockRef> },
    Call { callee: ValueRef, args: Vec<ValueRef> },
    Alloca { allocated: IrType, count: Option<ValueRef> },
    Load { ptr: ValueRef },
    Store { value: ValueRef, ptr: ValueRef },
    Gep { inbounds: bool, source: IrType, base: ValueRef, indices: Vec<ValueRef> },
    Cast { op: CastOp, value: ValueRef },
    Phi { incoming: Vec<(ValueRef, BlockRef)> },
    /// `fneg`, `freeze`
    Unary { opcode: String, value: ValueRef },
    Unreachable,
}

impl Inst {
    pub fn is_terminator(&self) -> bool {
        matches!(self, Inst::Ret { .. } | Inst::Br { .. } | Inst::Unreachable)
    }

    pub fn is_phi(&self) -> bool {
        matches!(self, Inst::Phi { .. })
    }
}

impl Module {
    pub fn parse(text: &str) -> Result<Self, ParseError> {
        parser::parse_module(text)
    }

    pub fn function(&self, name: &str) -> Option<&Function> {
        self.functions.iter().find(|f| f.name == name)
    }

    pub fn global(&self, name: &str) -> Option<&Global> {
        self.globals.iter().find(|g| g.name == name)
    }

    /// Startup routines registered in `@llvm.global_ctors`, as (priority, name).
    pub fn constructors(&self) -> Vec<(u64, String)> {
        let Some(Constant::Aggregate(entries)) = self.global("llvm.global_ctors").and_then(|g| g.init.as_ref())
        else {
            return Vec::new();
        };

        entries
            .iter()
            .filter_map(|entry| match entry {
                Constant::Aggregate(fields) => match fields.as_slice() {
                    [Constant::Int(priority), Constant::Symbol(name), ..] => Some((*priority, name.clone())),
                    _ => None,
                },
                _ => None,
            })
            .collect()
    }
}

impl Function {
    pub fn value(&self, value: ValueRef) -> &ValueData {
        &self.values[value.0 as usize]
    }

    pub fn block(&self, name: &str) -> Option<&Block> {
        self.blocks.iter().find(|b| b.name == name)
    }

    /// Value defined under `%name`.
    pub fn find_value(&self, name: &str) -> Option<ValueRef> {
        self.values
            .iter()
            .position(|v| v.name.as_deref() == Some(name))
            .map(|idx| ValueRef(idx as u32))
    }

    /// Printed instructions of a block, one line each.
    pub fn block_lines(&self, name: &str) -> Vec<String> {
        self.block(name)
            .map(|block| block.insts.iter().map(|&inst| self.format_inst(inst)).collect())
            .unwrap_or_default()
    }

    /// Printed instructions that call `callee`, across all blocks.
    pub fn calls_to(&self, callee: &str) -> Vec<String> {
        let needle = format!("@{callee}(");
        self.blocks
            .iter()
            .flat_map(|block| block.insts.iter())
            .map(|&inst| self.format_inst(inst))
            .filter(|line| line.contains(&needle))
            .collect()
    }

    pub(crate) fn push_value(&mut self, data: ValueData) -> ValueRef {
        self.values.push(data);
        ValueRef(self.values.len() as u32 - 1)
    }
}

impl ValueData {
    pub fn new(ty: IrType, kind: ValueKind) -> Self {
        Self {
            name: None,
            ty,
            kind,
            block: None,
        }
    }

    pub fn inst(&self) -> Option<&Inst> {
        match &self.kind {
            ValueKind::Inst(inst) => Some(inst),
            _ => None,
        }
    }
}
