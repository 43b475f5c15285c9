// This module provides the symbolization session shared by reference with every translation
// of a module. SymbolizeSession owns interior-mutable statistics and the list of diagnostics
// raised while translating, plus the name of the function currently being translated so
// diagnostics can be attributed. The pass and the per-function translator only ever hold a
// shared reference, so recording goes through RefCell. SessionStats tracks functions
// symbolized and skipped, instructions visited with a per-kind breakdown, runtime calls
// emitted, expressions cached, merge nodes resolved, shadow globals created and diagnostics
// raised. Its Display implementation is what the command-line driver prints for --stats.

//! Symbolization session management.
//!
//! The session outlives every per-function translation and collects what
//! happened during a run: counters and the diagnostics for constructs that
//! were skipped.

use std::cell::RefCell;
use std::collections::HashMap;
use std::fmt;

use super::error::{Diagnostic, DiagnosticKind};

/// Symbolization session.
#[derive(Debug, Default)]
pub struct SymbolizeSession {
    /// Session statistics.
    stats: RefCell<SessionStats>,

    /// Diagnostics in the order they were raised.
    diagnostics: RefCell<Vec<Diagnostic>>,

    /// Function currently being translated.
    current_function: RefCell<Option<String>>,
}

impl SymbolizeSession {
    pub fn new() -> Self {
        Self::default()
    }

    /// Set current function being translated.
    pub fn set_current_function(&self, name: &str) {
        *self.current_function.borrow_mut() = Some(name.to_string());
    }

    pub fn clear_current_function(&self) {
        *self.current_function.borrow_mut() = None;
    }

    pub fn current_function(&self) -> Option<String> {
        self.current_function.borrow().clone()
    }

    /// Record a skipped construct in the current function and log it.
    pub fn report(&self, kind: DiagnosticKind, message: impl Into<String>) {
        let diagnostic = Diagnostic {
            function: self.current_function().unwrap_or_default(),
            kind,
            message: message.into(),
        };
        log::warn!("⚠️  {diagnostic}");
        self.stats.borrow_mut().diagnostics_raised += 1;
        self.diagnostics.borrow_mut().push(diagnostic);
    }

    /// All diagnostics raised so far.
    pub fn diagnostics(&self) -> Vec<Diagnostic> {
        self.diagnostics.borrow().clone()
    }

    pub fn record_function_symbolized(&self) {
        self.stats.borrow_mut().functions_symbolized += 1;
    }

    pub fn record_function_skipped(&self) {
        self.stats.borrow_mut().functions_skipped += 1;
    }

    /// Record a visited instruction of the given kind.
    pub fn record_instruction_visited(&self, kind: &str) {
        let mut stats = self.stats.borrow_mut();
        stats.instructions_visited += 1;
        *stats.instruction_counts.entry(kind.to_string()).or_insert(0) += 1;
    }

    pub fn record_runtime_call(&self) {
        self.stats.borrow_mut().runtime_calls_emitted += 1;
    }

    pub fn record_expression_cached(&self) {
        self.stats.borrow_mut().expressions_cached += 1;
    }

    pub fn record_merge_resolved(&self) {
        self.stats.borrow_mut().merge_nodes_resolved += 1;
    }

    pub fn record_shadow_global(&self) {
        self.stats.borrow_mut().shadow_globals_created += 1;
    }

    /// Get session statistics.
    pub fn stats(&self) -> SessionStats {
        self.stats.borrow().clone()
    }
}

/// Symbolization statistics.
#[derive(Debug, Default, Clone)]
pub struct SessionStats {
    /// Functions that were instrumented.
    pub functions_symbolized: usize,

    /// Declarations, runtime functions and the startup routine.
    pub functions_skipped: usize,

    /// Original instructions visited.
    pub instructions_visited: usize,

    /// Count of each instruction kind visited.
    pub instruction_counts: HashMap<String, usize>,

    /// Calls into the symbolic runtime inserted.
    pub runtime_calls_emitted: usize,

    /// Values that received a cached shadow expression.
    pub expressions_cached: usize,

    /// Shadow merge nodes whose incoming edges were filled in.
    pub merge_nodes_resolved: usize,

    /// Shadow globals created during module setup.
    pub shadow_globals_created: usize,

    pub diagnostics_raised: usize,
}

impl fmt::Display for SessionStats {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        writeln!(f, "Symbolization Session Statistics:")?;
        writeln!(f, "  Functions symbolized: {}", self.functions_symbolized)?;
        writeln!(f, "  Functions skipped: {}", self.functions_skipped)?;
        writeln!(f, "  Instructions visited: {}", self.instructions_visited)?;
        writeln!(f, "  Runtime calls emitted: {}", self.runtime_calls_emitted)?;
        writeln!(f, "  Expressions cached: {}", self.expressions_cached)?;
        writeln!(f, "  Merge nodes resolved: {}", self.merge_nodes_resolved)?;
        writeln!(f, "  Shadow globals created: {}", self.shadow_globals_created)?;
        writeln!(f, "  Diagnostics raised: {}", self.diagnostics_raised)?;

        if !self.instruction_counts.is_empty() {
            writeln!(f, "  Instruction breakdown:")?;
            let mut sorted: Vec<_> = self.instruction_counts.iter().collect();
            sorted.sort_by(|(a_kind, a), (b_kind, b)| b.cmp(a).then(a_kind.cmp(b_kind)));

            for (kind, count) in sorted.into_iter().take(10) {
                writeln!(f, "    {}: {}", kind, count)?;
            }
        }

        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_session_creation() {
        let session = SymbolizeSession::new();

        let stats = session.stats();
        assert_eq!(stats.functions_symbolized, 0);
        assert_eq!(stats.instructions_visited, 0);
        assert!(session.diagnostics().is_empty());
        assert_eq!(session.current_function(), None);
    }

    #[test]
    fn test_session_statistics() {
        let session = SymbolizeSession::new();

        session.record_function_symbolized();
        session.record_function_skipped();
        session.record_function_skipped();
        session.record_instruction_visited("add");
        session.record_instruction_visited("icmp");
        session.record_instruction_visited("add");
        session.record_runtime_call();
        session.record_expression_cached();
        session.record_merge_resolved();
        session.record_shadow_global();

        let stats = session.stats();
        assert_eq!(stats.functions_symbolized, 1);
        assert_eq!(stats.functions_skipped, 2);
        assert_eq!(stats.instructions_visited, 3);
        assert_eq!(stats.instruction_counts["add"], 2);
        assert_eq!(stats.instruction_counts["icmp"], 1);
        assert_eq!(stats.runtime_calls_emitted, 1);
        assert_eq!(stats.expressions_cached, 1);
        assert_eq!(stats.merge_nodes_resolved, 1);
        assert_eq!(stats.shadow_globals_created, 1);
    }

    #[test]
    fn test_diagnostics_are_attributed() {
        let session = SymbolizeSession::new();

        session.set_current_function("parse_header");
        session.report(DiagnosticKind::IndirectCall, "call ptr %fp()");
        session.clear_current_function();
        session.report(DiagnosticKind::UnknownInstruction, "unreachable");

        let diagnostics = session.diagnostics();
        assert_eq!(diagnostics.len(), 2);
        assert_eq!(diagnostics[0].function, "parse_header");
        assert_eq!(diagnostics[0].kind, DiagnosticKind::IndirectCall);
        assert_eq!(diagnostics[1].function, "");
        assert_eq!(session.stats().diagnostics_raised, 2);
        assert_eq!(
            diagnostics[0].to_string(),
            "warning: indirect call in parse_header: call ptr %fp()"
        );
    }

    #[test]
    fn test_statistics_display() {
        let session = SymbolizeSession::new();

        session.record_function_symbolized();
        session.record_instruction_visited("add");
        session.record_instruction_visited("icmp");

        let output = format!("{}", session.stats());
        assert!(output.contains("Functions symbolized: 1"));
        assert!(output.contains("Instructions visited: 2"));
        assert!(output.contains("    add: 1"));
    }
}
