// This module defines the closed type and operator vocabulary shared by every part of the
// symbolizer. IrType is a host-independent descriptor of IR data types (integers, floats,
// pointers, arrays, structs, vectors, void) that each adaptor converts its native types to
// and from. ShadowType mirrors an IrType with every scalar leaf replaced by an expression
// handle; shadow_type() is the structural recursion that derives it and is the single source
// of truth for shadow allocas, shadow globals, shadow loads and global initialisation, so
// their shapes can never diverge. BinaryOp, IntPredicate and CastOp enumerate the operators
// the translator dispatches on, spelled the way LLVM spells them.

//! IR type descriptors, shadow types and operator enumerations.

use std::fmt;

use super::error::{SymbolizeError, SymbolizeResult};

/// Host-independent description of an IR data type.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum IrType {
    Void,
    /// Integer of the given bit width (`i1`, `i8`, ...).
    Int(u32),
    Half,
    BFloat,
    Float,
    Double,
    /// x87 extended precision: 80 bits of data in a 16-byte slot.
    X86Fp80,
    Fp128,
    /// Pair of doubles.
    PpcFp128,
    /// Opaque pointer.
    Ptr,
    /// `[n x T]`
    Array(Box<IrType>, u64),
    /// `{ T1, T2, ... }`, fields in declaration order.
    Struct(Vec<IrType>),
    /// `<{ T1, T2, ... }>`: no padding between fields, byte aligned.
    PackedStruct(Vec<IrType>),
    /// `<n x T>`
    Vector(Box<IrType>, u32),
}

impl IrType {
    pub fn array(element: IrType, len: u64) -> Self {
        IrType::Array(Box::new(element), len)
    }

    /// Scalars get a single expression handle as their shadow.
    pub fn is_scalar(&self) -> bool {
        matches!(self, IrType::Int(_) | IrType::Ptr) || self.is_floating_point()
    }

    pub fn is_floating_point(&self) -> bool {
        matches!(
            self,
            IrType::Half
                | IrType::BFloat
                | IrType::Float
                | IrType::Double
                | IrType::X86Fp80
                | IrType::Fp128
                | IrType::PpcFp128
        )
    }

    /// Field types of a struct, packed or not.
    pub fn struct_fields(&self) -> Option<&[IrType]> {
        match self {
            IrType::Struct(fields) | IrType::PackedStruct(fields) => Some(fields),
            _ => None,
        }
    }

    pub fn is_pointer(&self) -> bool {
        matches!(self, IrType::Ptr)
    }

    pub fn is_void(&self) -> bool {
        matches!(self, IrType::Void)
    }

    /// Bit width of an integer type.
    pub fn int_width(&self) -> Option<u32> {
        match self {
            IrType::Int(bits) => Some(*bits),
            _ => None,
        }
    }
}

impl fmt::Display for IrType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            IrType::Void => write!(f, "void"),
            IrType::Int(bits) => write!(f, "i{bits}"),
            IrType::Half => write!(f, "half"),
            IrType::BFloat => write!(f, "bfloat"),
            IrType::Float => write!(f, "float"),
            IrType::Double => write!(f, "double"),
            IrType::X86Fp80 => write!(f, "x86_fp80"),
            IrType::Fp128 => write!(f, "fp128"),
            IrType::PpcFp128 => write!(f, "ppc_fp128"),
            IrType::Ptr => write!(f, "ptr"),
            IrType::Array(element, len) => write!(f, "[{len} x {element}]"),
            IrType::Struct(fields) => write_fields(f, fields),
            IrType::PackedStruct(fields) => {
                write!(f, "<")?;
                write_fields(f, fields)?;
                write!(f, ">")
            }
            IrType::Vector(element, len) => write!(f, "<{len} x {element}>"),
        }
    }
}

fn write_fields(f: &mut fmt::Formatter<'_>, fields: &[IrType]) -> fmt::Result {
    if fields.is_empty() {
        return write!(f, "{{}}");
    }
    write!(f, "{{ ")?;
    for (i, field) in fields.iter().enumerate() {
        if i > 0 {
            write!(f, ", ")?;
        }
        write!(f, "{field}")?;
    }
    write!(f, " }}")
}

/// Type of the storage that holds the symbolic shadow of a value.
///
/// Always has the same aggregate shape as the type it was derived from.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum ShadowType {
    /// A single expression handle.
    Expr,
    Array(Box<ShadowType>, u64),
    Struct(Vec<ShadowType>),
}

impl ShadowType {
    /// Lower the shadow type to the IR type used to store it.
    pub fn ir_type(&self) -> IrType {
        match self {
            ShadowType::Expr => IrType::Ptr,
            ShadowType::Array(element, len) => IrType::Array(Box::new(element.ir_type()), *len),
            ShadowType::Struct(fields) => {
                IrType::Struct(fields.iter().map(ShadowType::ir_type).collect())
            }
        }
    }
}

/// Return the appropriate type for storing symbolic expressions of `ty`.
pub fn shadow_type(ty: &IrType) -> SymbolizeResult<ShadowType> {
    match ty {
        ty if ty.is_scalar() => Ok(ShadowType::Expr),
        IrType::Array(element, len) => Ok(ShadowType::Array(Box::new(shadow_type(element)?), *len)),
        // Shadows of packed structs are ordinary structs of handles.
        IrType::Struct(fields) | IrType::PackedStruct(fields) => fields
            .iter()
            .map(shadow_type)
            .collect::<SymbolizeResult<Vec<_>>>()
            .map(ShadowType::Struct),
        other => Err(SymbolizeError::UnsupportedShadowType { ty: other.to_string() }),
    }
}

/// Binary arithmetic and bitwise operators.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum BinaryOp {
    Add,
    Sub,
    Mul,
    UDiv,
    SDiv,
    URem,
    SRem,
    Shl,
    LShr,
    AShr,
    And,
    Or,
    Xor,
    FAdd,
    FSub,
    FMul,
    FDiv,
    FRem,
}

impl BinaryOp {
    pub const ALL: [BinaryOp; 18] = [
        BinaryOp::Add,
        BinaryOp::Sub,
        BinaryOp::Mul,
        BinaryOp::UDiv,
        BinaryOp::SDiv,
        BinaryOp::URem,
        BinaryOp::SRem,
        BinaryOp::Shl,
        BinaryOp::LShr,
        BinaryOp::AShr,
        BinaryOp::And,
        BinaryOp::Or,
        BinaryOp::Xor,
        BinaryOp::FAdd,
        BinaryOp::FSub,
        BinaryOp::FMul,
        BinaryOp::FDiv,
        BinaryOp::FRem,
    ];

    pub fn mnemonic(self) -> &'static str {
        match self {
            BinaryOp::Add => "add",
            BinaryOp::Sub => "sub",
            BinaryOp::Mul => "mul",
            BinaryOp::UDiv => "udiv",
            BinaryOp::SDiv => "sdiv",
            BinaryOp::URem => "urem",
            BinaryOp::SRem => "srem",
            BinaryOp::Shl => "shl",
            BinaryOp::LShr => "lshr",
            BinaryOp::AShr => "ashr",
            BinaryOp::And => "and",
            BinaryOp::Or => "or",
            BinaryOp::Xor => "xor",
            BinaryOp::FAdd => "fadd",
            BinaryOp::FSub => "fsub",
            BinaryOp::FMul => "fmul",
            BinaryOp::FDiv => "fdiv",
            BinaryOp::FRem => "frem",
        }
    }

    pub fn parse(mnemonic: &str) -> Option<Self> {
        Self::ALL.into_iter().find(|op| op.mnemonic() == mnemonic)
    }
}

impl fmt::Display for BinaryOp {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.mnemonic())
    }
}

/// Integer comparison predicates.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum IntPredicate {
    Eq,
    Ne,
    Ugt,
    Uge,
    Ult,
    Ule,
    Sgt,
    Sge,
    Slt,
    Sle,
}

impl IntPredicate {
    pub const ALL: [IntPredicate; 10] = [
        IntPredicate::Eq,
        IntPredicate::Ne,
        IntPredicate::Ugt,
        IntPredicate::Uge,
        IntPredicate::Ult,
        IntPredicate::Ule,
        IntPredicate::Sgt,
        IntPredicate::Sge,
        IntPredicate::Slt,
        IntPredicate::Sle,
    ];

    pub fn mnemonic(self) -> &'static str {
        match self {
            IntPredicate::Eq => "eq",
            IntPredicate::Ne => "ne",
            IntPredicate::Ugt => "ugt",
            IntPredicate::Uge => "uge",
            IntPredicate::Ult => "ult",
            IntPredicate::Ule => "ule",
            IntPredicate::Sgt => "sgt",
            IntPredicate::Sge => "sge",
            IntPredicate::Slt => "slt",
            IntPredicate::Sle => "sle",
        }
    }

    pub fn parse(mnemonic: &str) -> Option<Self> {
        Self::ALL.into_iter().find(|pred| pred.mnemonic() == mnemonic)
    }
}

impl fmt::Display for IntPredicate {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.mnemonic())
    }
}

/// Conversion operators.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum CastOp {
    Trunc,
    ZExt,
    SExt,
    BitCast,
    PtrToInt,
    IntToPtr,
    FPTrunc,
    FPExt,
    FPToUI,
    FPToSI,
    UIToFP,
    SIToFP,
    AddrSpaceCast,
}

impl CastOp {
    pub const ALL: [CastOp; 13] = [
        CastOp::Trunc,
        CastOp::ZExt,
        CastOp::SExt,
        CastOp::BitCast,
        CastOp::PtrToInt,
        CastOp::IntToPtr,
        CastOp::FPTrunc,
        CastOp::FPExt,
        CastOp::FPToUI,
        CastOp::FPToSI,
        CastOp::UIToFP,
        CastOp::SIToFP,
        CastOp::AddrSpaceCast,
    ];

    pub fn mnemonic(self) -> &'static str {
        match self {
            CastOp::Trunc => "trunc",
            CastOp::ZExt => "zext",
            CastOp::SExt => "sext",
            CastOp::BitCast => "bitcast",
            CastOp::PtrToInt => "ptrtoint",
            CastOp::IntToPtr => "inttoptr",
            CastOp::FPTrunc => "fptrunc",
            CastOp::FPExt => "fpext",
            CastOp::FPToUI => "fptoui",
            CastOp::FPToSI => "fptosi",
            CastOp::UIToFP => "uitofp",
            CastOp::SIToFP => "sitofp",
            CastOp::AddrSpaceCast => "addrspacecast",
        }
    }

    pub fn parse(mnemonic: &str) -> Option<Self> {
        Self::ALL.into_iter().find(|op| op.mnemonic() == mnemonic)
    }
}

impl fmt::Display for CastOp {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.mnemonic())
    }
}

/// Linkage of module-scope symbols.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub enum Linkage {
    #[default]
    External,
    Internal,
    Private,
    Weak,
    WeakOdr,
    LinkOnce,
    LinkOnceOdr,
    Common,
    AvailableExternally,
    ExternWeak,
    Appending,
}

impl Linkage {
    pub fn keyword(self) -> &'static str {
        match self {
            Linkage::External => "external",
            Linkage::Internal => "internal",
            Linkage::Private => "private",
            Linkage::Weak => "weak",
            Linkage::WeakOdr => "weak_odr",
            Linkage::LinkOnce => "linkonce",
            Linkage::LinkOnceOdr => "linkonce_odr",
            Linkage::Common => "common",
            Linkage::AvailableExternally => "available_externally",
            Linkage::ExternWeak => "extern_weak",
            Linkage::Appending => "appending",
        }
    }

    pub fn parse(keyword: &str) -> Option<Self> {
        let linkage = match keyword {
            "external" => Linkage::External,
            "internal" => Linkage::Internal,
            "private" => Linkage::Private,
            "weak" => Linkage::Weak,
            "weak_odr" => Linkage::WeakOdr,
            "linkonce" => Linkage::LinkOnce,
            "linkonce_odr" => Linkage::LinkOnceOdr,
            "common" => Linkage::Common,
            "available_externally" => Linkage::AvailableExternally,
            "extern_weak" => Linkage::ExternWeak,
            "appending" => Linkage::Appending,
            _ => return None,
        };
        Some(linkage)
    }
}

impl fmt::Display for Linkage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.keyword())
    }
}

/// Signature of a function declared by the pass.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Signature {
    pub ret: IrType,
    pub params: Vec<IrType>,
}

impl Signature {
    pub fn new(ret: IrType, params: impl Into<Vec<IrType>>) -> Self {
        Self {
            ret,
            params: params.into(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_scalar_shadow_is_single_handle() {
        for ty in [IrType::Int(1), IrType::Int(32), IrType::Ptr, IrType::Double] {
            assert_eq!(shadow_type(&ty).unwrap(), ShadowType::Expr, "{ty}");
        }
    }

    #[test]
    fn test_every_float_kind_is_scalar() {
        let kinds = [
            IrType::Half,
            IrType::BFloat,
            IrType::Float,
            IrType::Double,
            IrType::X86Fp80,
            IrType::Fp128,
            IrType::PpcFp128,
        ];
        for ty in kinds {
            assert!(ty.is_floating_point(), "{ty}");
            assert_eq!(shadow_type(&ty).unwrap(), ShadowType::Expr, "{ty}");
        }
        assert_eq!(IrType::X86Fp80.to_string(), "x86_fp80");
        assert_eq!(IrType::BFloat.to_string(), "bfloat");
    }

    #[test]
    fn test_packed_struct_shadow_is_plain_struct() {
        let packed = IrType::PackedStruct(vec![IrType::Int(8), IrType::Int(32)]);
        assert_eq!(packed.to_string(), "<{ i8, i32 }>");
        assert_eq!(packed.struct_fields(), Some(&[IrType::Int(8), IrType::Int(32)][..]));

        let shadow = shadow_type(&packed).unwrap();
        assert_eq!(shadow.ir_type().to_string(), "{ ptr, ptr }");
    }

    #[test]
    fn test_aggregate_shadow_preserves_shape() {
        // { [4 x i32], i32, { ptr, i8 } }
        let ty = IrType::Struct(vec![
            IrType::array(IrType::Int(32), 4),
            IrType::Int(32),
            IrType::Struct(vec![IrType::Ptr, IrType::Int(8)]),
        ]);

        let shadow = shadow_type(&ty).unwrap();
        assert_eq!(
            shadow,
            ShadowType::Struct(vec![
                ShadowType::Array(Box::new(ShadowType::Expr), 4),
                ShadowType::Expr,
                ShadowType::Struct(vec![ShadowType::Expr, ShadowType::Expr]),
            ])
        );
        assert_eq!(shadow.ir_type().to_string(), "{ [4 x ptr], ptr, { ptr, ptr } }");
    }

    #[test]
    fn test_vector_and_void_have_no_shadow() {
        let vector = IrType::Vector(Box::new(IrType::Int(32)), 4);
        assert!(matches!(
            shadow_type(&vector),
            Err(SymbolizeError::UnsupportedShadowType { .. })
        ));
        assert!(shadow_type(&IrType::Void).is_err());

        // Nested inside an aggregate the failure still surfaces.
        let nested = IrType::Struct(vec![IrType::Int(8), vector]);
        assert!(shadow_type(&nested).is_err());
    }

    #[test]
    fn test_mnemonics_round_trip() {
        for op in BinaryOp::ALL {
            assert_eq!(BinaryOp::parse(op.mnemonic()), Some(op));
        }
        for pred in IntPredicate::ALL {
            assert_eq!(IntPredicate::parse(pred.mnemonic()), Some(pred));
        }
        for op in CastOp::ALL {
            assert_eq!(CastOp::parse(op.mnemonic()), Some(op));
        }
        assert_eq!(Linkage::parse("internal"), Some(Linkage::Internal));
        assert_eq!(BinaryOp::parse("fneg"), None);
    }

    #[test]
    fn test_type_display() {
        assert_eq!(IrType::array(IrType::Int(8), 16).to_string(), "[16 x i8]");
        assert_eq!(IrType::Struct(vec![]).to_string(), "{}");
        assert_eq!(
            IrType::Vector(Box::new(IrType::Float), 2).to_string(),
            "<2 x float>"
        );
    }
}
