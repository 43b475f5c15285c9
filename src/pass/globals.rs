// This module creates the shadow storage of module-scope variables and the code that fills it
// at program startup. Every variable (except host metadata tables named llvm.*) is paired with
// a writable, zero-initialised shadow global of its shadow type, named after it with a fixed
// suffix and carrying its linkage. GlobalInitializer then walks each variable's type and the
// shadow type derived from it in lock-step, emitting into the startup routine: scalars are
// loaded and turned into integer expressions, integer arrays are handed to the runtime's bulk
// array initializers, and structs recurse field by field. Every other shape is fatal.

//! Global shadow pairs and their startup initialisation.

use crate::core::{
    shadow_type, CastOp, IrAdaptor, IrType, SymbolizeError, SymbolizeResult, SymbolizeSession,
};

use super::options::SymbolizeOptions;
use super::runtime::RuntimeBindings;

/// A module-scope variable and the global holding its shadow.
#[derive(Debug, Clone)]
pub struct GlobalShadowPair<G> {
    pub original: G,
    pub shadow: G,
    pub name: String,
    pub ty: IrType,
}

/// Create a shadow global for every module-scope variable.
pub fn create_shadow_globals<A: IrAdaptor>(
    ir: &mut A,
    options: &SymbolizeOptions,
    session: &SymbolizeSession,
) -> SymbolizeResult<Vec<GlobalShadowPair<A::Global>>> {
    let globals: Vec<_> = ir.globals().collect();
    let mut pairs = Vec::with_capacity(globals.len());

    for original in globals {
        let name = ir.global_name(original);
        if name.starts_with("llvm.") {
            continue;
        }

        let ty = ir.global_value_type(original);
        // The shadow is filled at run time and can never be constant, even if the original is.
        let shadow_ty = shadow_type(&ty)?.ir_type();
        let shadow = ir.add_shadow_global(original, &options.shadow_name(&name), &shadow_ty)?;
        session.record_shadow_global();
        log::debug!("shadow global {name}{} : {shadow_ty}", options.shadow_suffix);

        pairs.push(GlobalShadowPair {
            original,
            shadow,
            name,
            ty,
        });
    }

    Ok(pairs)
}

/// Emits the startup code that initialises global shadows.
///
/// The adaptor must be positioned inside the startup routine.
pub struct GlobalInitializer<'a, A: IrAdaptor> {
    ir: &'a mut A,
    bindings: &'a RuntimeBindings<A::Func>,
    session: &'a SymbolizeSession,
}

impl<'a, A: IrAdaptor> GlobalInitializer<'a, A> {
    pub fn new(ir: &'a mut A, bindings: &'a RuntimeBindings<A::Func>, session: &'a SymbolizeSession) -> Self {
        Self { ir, bindings, session }
    }

    /// Initialise the shadow of one module-scope variable.
    pub fn initialize(&mut self, pair: &GlobalShadowPair<A::Global>) -> SymbolizeResult<()> {
        let shadow = self.ir.global_address(pair.shadow);
        let original = self.ir.global_address(pair.original);
        self.emit(shadow, original, &pair.ty, &pair.name)
    }

    fn emit(&mut self, shadow: A::Value, value: A::Value, ty: &IrType, global: &str) -> SymbolizeResult<()> {
        match ty {
            IrType::Int(bits) if *bits <= 64 => {
                let loaded = self.ir.build_load(ty, value)?;
                let widened = if *bits < 64 {
                    self.ir.build_cast(CastOp::ZExt, loaded, &IrType::Int(64))?
                } else {
                    loaded
                };
                self.store_integer(widened, *bits, shadow)
            }
            IrType::Ptr => {
                let loaded = self.ir.build_load(ty, value)?;
                let address = self.ir.build_cast(CastOp::PtrToInt, loaded, &IrType::Int(64))?;
                let bits = self.ir.pointer_bits();
                self.store_integer(address, bits, shadow)
            }
            IrType::Array(element, len) => {
                let initializer = self.bindings.array_initializer(element)?;
                let count = self.ir.const_int(64, *len);
                self.ir.build_call(initializer, &[shadow, value, count])?;
                self.session.record_runtime_call();
                Ok(())
            }
            IrType::Struct(fields) | IrType::PackedStruct(fields) => {
                let shadow_ty = shadow_type(ty)?.ir_type();
                for (index, field) in fields.iter().enumerate() {
                    let field_shadow = self.ir.build_struct_gep(&shadow_ty, shadow, index as u32)?;
                    let field_value = self.ir.build_struct_gep(ty, value, index as u32)?;
                    self.emit(field_shadow, field_value, field, global)?;
                }
                Ok(())
            }
            _ => Err(SymbolizeError::UnsupportedGlobalShape {
                global: global.to_string(),
                ty: ty.to_string(),
            }),
        }
    }

    fn store_integer(&mut self, value: A::Value, bits: u32, shadow: A::Value) -> SymbolizeResult<()> {
        let bits = self.ir.const_int(8, u64::from(bits));
        let expr = self.ir.build_call(self.bindings.build_integer, &[value, bits])?;
        self.session.record_runtime_call();
        self.ir.build_store(expr, shadow)
    }
}
