//! Printing TIR back as LLVM-syntax text.
//!
//! Instrumented modules are checked by their printed form, so every
//! instruction prints on one line and inserted values carry stable names.

use std::fmt::{self, Write as _};

use super::*;

impl fmt::Display for Module {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if let Some(datalayout) = &self.datalayout {
            writeln!(f, "target datalayout = \"{datalayout}\"")?;
        }
        if let Some(triple) = &self.triple {
            writeln!(f, "target triple = \"{triple}\"")?;
        }
        if self.datalayout.is_some() || self.triple.is_some() {
            writeln!(f)?;
        }

        for global in &self.globals {
            writeln!(f, "{global}")?;
        }
        if !self.globals.is_empty() {
            writeln!(f)?;
        }

        for (i, func) in self.functions.iter().enumerate() {
            if i > 0 {
                writeln!(f)?;
            }
            write!(f, "{func}")?;
        }
        Ok(())
    }
}

impl fmt::Display for Global {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "@{} = ", self.name)?;
        match &self.init {
            Some(_) if self.linkage == Linkage::External => {}
            _ => write!(f, "{} ", self.linkage)?,
        }
        let keyword = if self.constant { "constant" } else { "global" };
        write!(f, "{keyword} {}", self.ty)?;
        if let Some(init) = &self.init {
            write!(f, " {}", format_constant(init, &self.ty))?;
        }
        Ok(())
    }
}

/// Print an initializer of type `ty`, without the leading type.
pub fn format_constant(constant: &Constant, ty: &IrType) -> String {
    match constant {
        Constant::Int(value) if *ty == IrType::Int(1) => {
            if *value != 0 { "true" } else { "false" }.to_string()
        }
        Constant::Int(value) => value.to_string(),
        Constant::Float(text) => text.clone(),
        Constant::Null => "null".to_string(),
        Constant::ZeroInitializer => "zeroinitializer".to_string(),
        Constant::Undef => "undef".to_string(),
        Constant::Symbol(name) => format!("@{name}"),
        Constant::Aggregate(elements) => {
            let element_types: Vec<IrType> = match ty {
                IrType::Array(element, _) | IrType::Vector(element, _) => {
                    vec![(**element).clone(); elements.len()]
                }
                IrType::Struct(fields) | IrType::PackedStruct(fields) => fields.clone(),
                _ => vec![IrType::Void; elements.len()],
            };
            let body = elements
                .iter()
                .zip(&element_types)
                .map(|(element, element_ty)| format!("{element_ty} {}", format_constant(element, element_ty)))
                .collect::<Vec<_>>()
                .join(", ");
            match ty {
                IrType::Struct(_) => format!("{{ {body} }}"),
                IrType::PackedStruct(_) => format!("<{{ {body} }}>"),
                IrType::Vector(..) => format!("<{body}>"),
                _ => format!("[{body}]"),
            }
        }
    }
}

impl fmt::Display for Function {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let keyword = if self.declaration { "declare" } else { "define" };
        write!(f, "{keyword} ")?;
        if self.linkage != Linkage::External {
            write!(f, "{} ", self.linkage)?;
        }
        write!(f, "{} @{}(", self.ret, self.name)?;
        for (i, &param) in self.params.iter().enumerate() {
            if i > 0 {
                write!(f, ", ")?;
            }
            if self.declaration {
                write!(f, "{}", self.value(param).ty)?;
            } else {
                write!(f, "{}", self.format_operand(param))?;
            }
        }
        write!(f, ")")?;

        if self.declaration {
            return writeln!(f);
        }

        writeln!(f, " {{")?;
        for block in &self.blocks {
            writeln!(f, "{}:", block.name)?;
            for &inst in &block.insts {
                writeln!(f, "  {}", self.format_inst(inst))?;
            }
        }
        writeln!(f, "}}")
    }
}

impl Function {
    /// Print a value as it appears in an operand position, without its type.
    pub fn format_ref(&self, value: ValueRef) -> String {
        let data = self.value(value);
        match &data.kind {
            ValueKind::ConstInt { bits: 1, value } => if *value != 0 { "true" } else { "false" }.to_string(),
            ValueKind::ConstInt { value, .. } => value.to_string(),
            ValueKind::Float(text) => text.clone(),
            ValueKind::Null => "null".to_string(),
            ValueKind::Undef => "undef".to_string(),
            ValueKind::Poison => "poison".to_string(),
            ValueKind::ZeroInitializer => "zeroinitializer".to_string(),
            ValueKind::Global(name) => format!("@{name}"),
            ValueKind::ConstGep {
                inbounds,
                source,
                base,
                indices,
            } => {
                let mut text = String::from("getelementptr ");
                if *inbounds {
                    text.push_str("inbounds ");
                }
                let _ = write!(text, "({source}, {}", self.format_operand(*base));
                for &index in indices {
                    let _ = write!(text, ", {}", self.format_operand(index));
                }
                text.push(')');
                text
            }
            ValueKind::ConstBitCast { value: inner } => {
                format!("bitcast ({} to {})", self.format_operand(*inner), data.ty)
            }
            ValueKind::Param(_) | ValueKind::Inst(_) | ValueKind::Forward => match &data.name {
                Some(name) => format!("%{name}"),
                None => format!("%v{}", value.0),
            },
        }
    }

    /// Print a value with its type, as in `i32 %x`.
    pub fn format_operand(&self, value: ValueRef) -> String {
        format!("{} {}", self.value(value).ty, self.format_ref(value))
    }

    /// Print one instruction on a single line.
    pub fn format_inst(&self, inst: ValueRef) -> String {
        let data = self.value(inst);
        let Some(kind) = data.inst() else {
            return self.format_operand(inst);
        };

        let mut line = String::new();
        if !data.ty.is_void() {
            let _ = write!(line, "{} = ", self.format_ref(inst));
        }

        let body = match kind {
            Inst::Binary { op, lhs, rhs } => {
                format!("{op} {} {}, {}", data.ty, self.format_ref(*lhs), self.format_ref(*rhs))
            }
            Inst::ICmp { predicate, lhs, rhs } => format!(
                "icmp {predicate} {} {}, {}",
                self.value(*lhs).ty,
                self.format_ref(*lhs),
                self.format_ref(*rhs)
            ),
            Inst::Select {
                condition,
                then_value,
                else_value,
            } => format!(
                "select {}, {}, {}",
                self.format_operand(*condition),
                self.format_operand(*then_value),
                self.format_operand(*else_value)
            ),
            Inst::Ret { value: None } => "ret void".to_string(),
            Inst::Ret { value: Some(value) } => format!("ret {}", self.format_operand(*value)),
            Inst::Br { condition, targets } => {
                let labels: Vec<String> = targets
                    .iter()
                    .map(|target| format!("label %{}", self.blocks[target.0 as usize].name))
                    .collect();
                match condition {
                    Some(condition) => format!("br {}, {}", self.format_operand(*condition), labels.join(", ")),
                    None => format!("br {}", labels.join(", ")),
                }
            }
            Inst::Call { callee, args } => {
                let args: Vec<String> = args.iter().map(|&arg| self.format_operand(arg)).collect();
                format!("call {} {}({})", data.ty, self.format_ref(*callee), args.join(", "))
            }
            Inst::Alloca { allocated, count } => match count {
                Some(count) => format!("alloca {allocated}, {}", self.format_operand(*count)),
                None => format!("alloca {allocated}"),
            },
            Inst::Load { ptr } => format!("load {}, {}", data.ty, self.format_operand(*ptr)),
            Inst::Store { value, ptr } => {
                format!("store {}, {}", self.format_operand(*value), self.format_operand(*ptr))
            }
            Inst::Gep {
                inbounds,
                source,
                base,
                indices,
            } => {
                let mut text = String::from("getelementptr ");
                if *inbounds {
                    text.push_str("inbounds ");
                }
                let _ = write!(text, "{source}, {}", self.format_operand(*base));
                for &index in indices {
                    let _ = write!(text, ", {}", self.format_operand(index));
                }
                text
            }
            Inst::Cast { op, value } => {
                format!("{op} {} to {}", self.format_operand(*value), data.ty)
            }
            Inst::Phi { incoming } => {
                let edges: Vec<String> = incoming
                    .iter()
                    .map(|(value, block)| {
                        format!("[ {}, %{} ]", self.format_ref(*value), self.blocks[block.0 as usize].name)
                    })
                    .collect();
                format!("phi {} {}", data.ty, edges.join(", "))
            }
            Inst::Unary { opcode, value } => format!("{opcode} {}", self.format_operand(*value)),
            Inst::Unreachable => "unreachable".to_string(),
        };

        line.push_str(&body);
        line
    }
}
