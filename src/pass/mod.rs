// This module contains the symbolization pass proper. SymbolizePass drives one run over a
// module through any IrAdaptor: module setup declares the runtime binding table, pairs every
// global with its shadow, and builds the startup routine that initialises the runtime and the
// global shadows before main. Then every function with a body that does not belong to the
// runtime is handed to a fresh Symbolizer with its own arena, so expression caches never
// outlive the function they were built for. Fatal errors stop the run and propagate to the
// caller; skipped constructs are recorded in the session.

//! The symbolization pass.
//!
//! # Components
//!
//! - [`options`] - names and priorities used when talking to the runtime
//! - [`runtime`] - the runtime binding table
//! - [`cache`] - the per-function expression cache
//! - [`translator`] - the instruction translator
//! - [`globals`] - global shadow pairs and their initialisation

pub mod cache;
pub mod globals;
pub mod options;
pub mod runtime;
pub mod translator;

use bumpalo::Bump;

use crate::core::{IrAdaptor, SymbolizeError, SymbolizeResult, SymbolizeSession};

pub use cache::ExpressionCache;
pub use globals::{GlobalInitializer, GlobalShadowPair};
pub use options::SymbolizeOptions;
pub use runtime::RuntimeBindings;
pub use translator::Symbolizer;

/// Instruments a module for symbolic execution.
///
/// The emitted code calls into the runtime from whatever threads the program
/// runs on; making concurrent shadow updates safe is up to the runtime.
pub struct SymbolizePass<'s> {
    options: SymbolizeOptions,
    session: &'s SymbolizeSession,
}

impl<'s> SymbolizePass<'s> {
    pub fn new(options: SymbolizeOptions, session: &'s SymbolizeSession) -> Self {
        Self { options, session }
    }

    pub fn options(&self) -> &SymbolizeOptions {
        &self.options
    }

    /// Set up the module and instrument every eligible function.
    pub fn run<A: IrAdaptor>(&self, ir: &mut A) -> SymbolizeResult<()> {
        log::info!("🔧 Symbolizer module init");
        let bindings = self.initialize_module(ir)?;

        let funcs: Vec<_> = ir.funcs().collect();
        for func in funcs {
            self.run_on_function(ir, &bindings, func)?;
        }

        let stats = self.session.stats();
        log::info!(
            "✅ Symbolized {} functions ({} skipped), {} runtime calls emitted",
            stats.functions_symbolized,
            stats.functions_skipped,
            stats.runtime_calls_emitted
        );
        Ok(())
    }

    /// Instrument a single function by name.
    pub fn run_on_function_named<A: IrAdaptor>(
        &self,
        ir: &mut A,
        bindings: &RuntimeBindings<A::Func>,
        name: &str,
    ) -> SymbolizeResult<bool> {
        let func = ir
            .funcs()
            .find(|&func| ir.func_name(func) == name)
            .ok_or_else(|| SymbolizeError::FunctionNotFound { name: name.to_string() })?;
        self.run_on_function(ir, bindings, func)
    }

    /// Declare the runtime, create global shadows and the startup routine.
    pub fn initialize_module<A: IrAdaptor>(&self, ir: &mut A) -> SymbolizeResult<RuntimeBindings<A::Func>> {
        let bindings = RuntimeBindings::declare(ir)?;
        let pairs = globals::create_shadow_globals(ir, &self.options, self.session)?;

        let ctor = ir.add_constructor(&self.options.constructor_name)?;
        ir.switch_func(ctor);
        let entry = ir.entry_block();
        let ret = ir.block_terminator(entry).ok_or_else(|| SymbolizeError::Host {
            reason: format!("{} has no terminator", self.options.constructor_name),
        })?;
        ir.position_before(ret);

        // The runtime must be up before any global shadow is built.
        ir.build_call(bindings.initialize, &[])?;
        self.session.record_runtime_call();

        let mut initializer = GlobalInitializer::new(ir, &bindings, self.session);
        for pair in &pairs {
            initializer.initialize(pair)?;
        }

        ir.register_constructor(ctor, self.options.constructor_priority)?;
        log::debug!(
            "startup routine {} initialises {} global shadows",
            self.options.constructor_name,
            pairs.len()
        );
        Ok(bindings)
    }

    /// Instrument one function. Returns `false` if the function was skipped.
    pub fn run_on_function<A: IrAdaptor>(
        &self,
        ir: &mut A,
        bindings: &RuntimeBindings<A::Func>,
        func: A::Func,
    ) -> SymbolizeResult<bool> {
        let name = ir.func_name(func);
        if ir.func_is_declaration(func)
            || name == self.options.constructor_name
            || name.starts_with(&self.options.runtime_prefix)
        {
            self.session.record_function_skipped();
            return Ok(false);
        }

        log::info!("Symbolizing function {name}");
        if !ir.switch_func(func) {
            return Err(SymbolizeError::FunctionNotFound { name });
        }
        self.session.set_current_function(&name);

        let arena = Bump::new();
        let result = Symbolizer::new(ir, bindings, &self.options, self.session, &arena)
            .and_then(|mut symbolizer| symbolizer.symbolize_function());
        self.session.clear_current_function();
        result?;

        self.session.record_function_symbolized();
        Ok(true)
    }
}
