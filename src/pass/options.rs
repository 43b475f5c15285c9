//! Pass configuration.

/// Names and priorities the pass uses when talking to the symbolic runtime.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SymbolizeOptions {
    /// Functions with this prefix belong to the runtime and are never instrumented.
    pub runtime_prefix: String,

    /// Runtime function through which external input becomes symbolic.
    pub symbolic_input_hook: String,

    /// Name of the startup routine that initialises the runtime and global shadows.
    pub constructor_name: String,

    /// Appended to a global's name to form its shadow's name.
    pub shadow_suffix: String,

    /// Priority bucket of the startup routine in the run-before-main table.
    pub constructor_priority: u32,
}

impl Default for SymbolizeOptions {
    fn default() -> Self {
        Self {
            runtime_prefix: "_sym_".to_string(),
            symbolic_input_hook: "_sym_build_variable".to_string(),
            constructor_name: "__sym_ctor".to_string(),
            shadow_suffix: ".sym_expr".to_string(),
            constructor_priority: 0,
        }
    }
}

impl SymbolizeOptions {
    /// Runtime-owned functions, except the input hook.
    pub fn is_runtime_function(&self, name: &str) -> bool {
        name.starts_with(&self.runtime_prefix) && name != self.symbolic_input_hook
    }

    pub fn shadow_name(&self, global: &str) -> String {
        format!("{global}{}", self.shadow_suffix)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_runtime_functions() {
        let options = SymbolizeOptions::default();
        assert!(options.is_runtime_function("_sym_build_add"));
        assert!(!options.is_runtime_function("_sym_build_variable"));
        assert!(!options.is_runtime_function("main"));
        assert_eq!(options.shadow_name("counter"), "counter.sym_expr");
    }
}
