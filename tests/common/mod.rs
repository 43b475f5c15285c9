//! Shared helpers for the symbolization integration tests.

#![allow(dead_code)]

use symbolize::core::{SymbolizeResult, SymbolizeSession};
use symbolize::pass::{SymbolizeOptions, SymbolizePass};
use symbolize::test_ir::{Module, TestIRAdaptor};

pub fn init_logging() {
    let _ = env_logger::builder().is_test(true).try_init();
}

/// Parse a TIR module, panicking with the parser's message on failure.
pub fn parse(source: &str) -> Module {
    match Module::parse(source) {
        Ok(module) => module,
        Err(e) => panic!("failed to parse test module: {e}\n{source}"),
    }
}

/// Run the pass with `options`, returning the module even when it fails.
pub fn try_symbolize_with(
    source: &str,
    options: SymbolizeOptions,
) -> (Module, SymbolizeSession, SymbolizeResult<()>) {
    init_logging();
    let mut module = parse(source);
    let session = SymbolizeSession::new();
    let result = SymbolizePass::new(options, &session).run(&mut TestIRAdaptor::new(&mut module));
    (module, session, result)
}

pub fn try_symbolize(source: &str) -> (Module, SymbolizeSession, SymbolizeResult<()>) {
    try_symbolize_with(source, SymbolizeOptions::default())
}

/// Run the pass with default options and expect success.
pub fn symbolize(source: &str) -> (Module, SymbolizeSession) {
    let (module, session, result) = try_symbolize(source);
    if let Err(e) = result {
        panic!("symbolization failed: {e}\n{module}");
    }
    (module, session)
}

/// Printed lines of `block` in `func`.
pub fn lines(module: &Module, func: &str, block: &str) -> Vec<String> {
    module
        .function(func)
        .unwrap_or_else(|| panic!("no function @{func}"))
        .block_lines(block)
}

/// Assert a block prints exactly as `expected`.
pub fn assert_block(module: &Module, func: &str, block: &str, expected: &[&str]) {
    let actual = lines(module, func, block);
    assert_eq!(
        actual, expected,
        "block {block} of @{func} differs\n--- module ---\n{module}"
    );
}

/// Check that each pattern occurs somewhere in the output.
pub fn check_output_contains(output: &str, patterns: &[&str]) {
    for pattern in patterns {
        assert!(
            output.contains(pattern),
            "Expected pattern '{}' not found in output:\n{}",
            pattern,
            output
        );
    }
}
