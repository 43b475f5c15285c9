//! Data layout rules used for address arithmetic.
//!
//! Hosts without a native target description (the test IR) answer size and
//! offset queries through [`DataLayout`]; the LLVM adaptor asks the module's
//! target data instead.

use super::types::IrType;

/// Minimal target data layout: pointer width plus C-like aggregate layout.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct DataLayout {
    pointer_bits: u32,
}

impl Default for DataLayout {
    fn default() -> Self {
        Self { pointer_bits: 64 }
    }
}

impl DataLayout {
    pub fn new(pointer_bits: u32) -> Self {
        Self { pointer_bits }
    }

    /// Parse an LLVM datalayout string. Only the `p:<bits>` entry is honoured.
    ///
    /// ```
    /// use symbolize::core::DataLayout;
    /// let layout = DataLayout::parse("e-m:e-p:32:32-i64:64");
    /// assert_eq!(layout.pointer_bits(), 32);
    /// ```
    pub fn parse(spec: &str) -> Self {
        let mut layout = Self::default();
        for entry in spec.split('-') {
            let mut parts = entry.split(':');
            // `p` is the default address space; `p0` is spelled out by some frontends.
            if !matches!(parts.next(), Some("p") | Some("p0")) {
                continue;
            }
            if let Some(bits) = parts.next().and_then(|bits| bits.parse().ok()) {
                layout.pointer_bits = bits;
            }
        }
        layout
    }

    pub fn pointer_bits(&self) -> u32 {
        self.pointer_bits
    }

    pub fn pointer_bytes(&self) -> u64 {
        u64::from(self.pointer_bits.div_ceil(8))
    }

    /// ABI alignment in bytes.
    pub fn abi_align(&self, ty: &IrType) -> u64 {
        match ty {
            IrType::Void => 1,
            IrType::Int(bits) => u64::from(bits.div_ceil(8)).next_power_of_two().min(16),
            IrType::Half | IrType::BFloat => 2,
            IrType::Float => 4,
            IrType::Double => 8,
            IrType::X86Fp80 | IrType::Fp128 | IrType::PpcFp128 => 16,
            IrType::Ptr => self.pointer_bytes(),
            IrType::Array(element, _) => self.abi_align(element),
            IrType::Struct(fields) => fields.iter().map(|f| self.abi_align(f)).max().unwrap_or(1),
            IrType::PackedStruct(_) => 1,
            IrType::Vector(element, len) => {
                (self.store_size(element) * u64::from(*len)).next_power_of_two().min(16)
            }
        }
    }

    /// Bytes written by a store of `ty`, without tail padding.
    pub fn store_size(&self, ty: &IrType) -> u64 {
        match ty {
            IrType::Void => 0,
            IrType::Int(bits) => u64::from(bits.div_ceil(8)),
            IrType::Half | IrType::BFloat => 2,
            IrType::Float => 4,
            IrType::Double => 8,
            IrType::X86Fp80 => 10,
            IrType::Fp128 | IrType::PpcFp128 => 16,
            IrType::Ptr => self.pointer_bytes(),
            IrType::Array(element, len) => self.alloc_size(element) * len,
            IrType::Struct(fields) => self.struct_size(fields),
            IrType::PackedStruct(fields) => self.field_offset(fields, true, fields.len()),
            IrType::Vector(element, len) => self.store_size(element) * u64::from(*len),
        }
    }

    /// Distance in bytes between consecutive elements of type `ty`.
    pub fn alloc_size(&self, ty: &IrType) -> u64 {
        align_to(self.store_size(ty), self.abi_align(ty))
    }

    /// Byte offset of field `index` within the struct type `ty`.
    ///
    /// Types other than structs have no fields and yield 0.
    pub fn struct_field_offset(&self, ty: &IrType, index: usize) -> u64 {
        match ty {
            IrType::Struct(fields) => self.field_offset(fields, false, index),
            IrType::PackedStruct(fields) => self.field_offset(fields, true, index),
            _ => 0,
        }
    }

    fn field_offset(&self, fields: &[IrType], packed: bool, index: usize) -> u64 {
        let mut offset = 0;
        for (i, field) in fields.iter().enumerate() {
            if !packed {
                offset = align_to(offset, self.abi_align(field));
            }
            if i == index {
                return offset;
            }
            offset += self.alloc_size(field);
        }
        offset
    }

    fn struct_size(&self, fields: &[IrType]) -> u64 {
        let end = self.field_offset(fields, false, fields.len());
        let align = fields.iter().map(|f| self.abi_align(f)).max().unwrap_or(1);
        align_to(end, align)
    }
}

fn align_to(value: u64, align: u64) -> u64 {
    if align <= 1 {
        return value;
    }
    value.div_ceil(align) * align
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_layout() {
        let layout = DataLayout::default();
        assert_eq!(layout.pointer_bits(), 64);
        assert_eq!(layout.alloc_size(&IrType::Ptr), 8);
        assert_eq!(layout.alloc_size(&IrType::Int(1)), 1);
        assert_eq!(layout.alloc_size(&IrType::Int(24)), 4);
        assert_eq!(layout.alloc_size(&IrType::Int(128)), 16);
        assert_eq!(layout.alloc_size(&IrType::Double), 8);
    }

    #[test]
    fn test_parse_pointer_width() {
        assert_eq!(DataLayout::parse("e-p:32:32").pointer_bits(), 32);
        assert_eq!(DataLayout::parse("e-m:e-i64:64-n8:16:32:64").pointer_bits(), 64);
        // Non-default address spaces don't affect the default pointer width.
        assert_eq!(DataLayout::parse("p270:32:32-p:64:64").pointer_bits(), 64);
    }

    #[test]
    fn test_struct_layout() {
        let layout = DataLayout::default();
        // { i8, i32, i8, ptr }
        let ty = IrType::Struct(vec![IrType::Int(8), IrType::Int(32), IrType::Int(8), IrType::Ptr]);
        assert_eq!(layout.struct_field_offset(&ty, 0), 0);
        assert_eq!(layout.struct_field_offset(&ty, 1), 4);
        assert_eq!(layout.struct_field_offset(&ty, 2), 8);
        assert_eq!(layout.struct_field_offset(&ty, 3), 16);
        assert_eq!(layout.alloc_size(&ty), 24);
    }

    #[test]
    fn test_packed_struct_layout() {
        let layout = DataLayout::default();
        // <{ i8, i32, i8, ptr }>
        let ty = IrType::PackedStruct(vec![IrType::Int(8), IrType::Int(32), IrType::Int(8), IrType::Ptr]);
        assert_eq!(layout.struct_field_offset(&ty, 1), 1);
        assert_eq!(layout.struct_field_offset(&ty, 2), 5);
        assert_eq!(layout.struct_field_offset(&ty, 3), 6);
        assert_eq!(layout.abi_align(&ty), 1);
        assert_eq!(layout.alloc_size(&ty), 14);

        // A packed struct nested in a regular one is byte aligned.
        let outer = IrType::Struct(vec![IrType::Int(8), ty]);
        assert_eq!(layout.struct_field_offset(&outer, 1), 1);
    }

    #[test]
    fn test_float_layout() {
        let layout = DataLayout::default();
        assert_eq!(layout.alloc_size(&IrType::Half), 2);
        assert_eq!(layout.alloc_size(&IrType::BFloat), 2);
        assert_eq!(layout.store_size(&IrType::X86Fp80), 10);
        assert_eq!(layout.alloc_size(&IrType::X86Fp80), 16);
        assert_eq!(layout.alloc_size(&IrType::Fp128), 16);
        assert_eq!(layout.alloc_size(&IrType::PpcFp128), 16);
    }

    #[test]
    fn test_array_layout() {
        let layout = DataLayout::default();
        let ty = IrType::Struct(vec![IrType::array(IrType::Int(32), 4), IrType::Int(32)]);
        assert_eq!(layout.alloc_size(&IrType::array(IrType::Int(32), 4)), 16);
        assert_eq!(layout.struct_field_offset(&ty, 1), 16);
        assert_eq!(layout.alloc_size(&ty), 20);
    }

    #[test]
    fn test_narrow_pointers() {
        let layout = DataLayout::new(32);
        let ty = IrType::Struct(vec![IrType::Ptr, IrType::Ptr]);
        assert_eq!(layout.struct_field_offset(&ty, 1), 4);
        assert_eq!(layout.alloc_size(&IrType::array(IrType::Ptr, 3)), 12);
    }
}
