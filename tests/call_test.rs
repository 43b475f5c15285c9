//! Test symbolization of calls, the input hook and intrinsics.

mod common;

use common::{assert_block, lines, symbolize, try_symbolize};
use symbolize::{DiagnosticKind, SymbolizeError};

#[test]
fn test_arguments_and_return_value() {
    let (module, _session) = symbolize(
        "declare i32 @callee(i32, i32)

define i32 @caller(i32 %x) {
entry:
  %r = call i32 @callee(i32 %x, i32 5)
  ret i32 %r
}
",
    );

    assert_block(
        &module,
        "caller",
        "entry",
        &[
            "%sym.0 = call ptr @_sym_get_parameter_expression(i8 0)",
            "call void @_sym_set_parameter_expression(i8 0, ptr %sym.0)",
            "%sym.1 = call ptr @_sym_build_integer(i64 5, i8 32)",
            "call void @_sym_set_parameter_expression(i8 1, ptr %sym.1)",
            "%r = call i32 @callee(i32 %x, i32 5)",
            "%sym.2 = call ptr @_sym_get_return_expression()",
            "call void @_sym_set_return_expression(ptr %sym.2)",
            "ret i32 %r",
        ],
    );
}

#[test]
fn test_void_call_fetches_no_return_expression() {
    let (module, _session) = symbolize(
        "declare void @sink(i32)

define void @f(i32 %a) {
entry:
  call void @sink(i32 %a)
  ret void
}
",
    );

    assert_block(
        &module,
        "f",
        "entry",
        &[
            "%sym.0 = call ptr @_sym_get_parameter_expression(i8 0)",
            "call void @_sym_set_parameter_expression(i8 0, ptr %sym.0)",
            "call void @sink(i32 %a)",
            "ret void",
        ],
    );
}

#[test]
fn test_symbolic_input_hook() {
    let (module, _session) = symbolize(
        "declare i32 @_sym_build_variable(i32)

define i32 @input() {
entry:
  %v = call i32 @_sym_build_variable(i32 0)
  ret i32 %v
}
",
    );

    assert_block(
        &module,
        "input",
        "entry",
        &[
            "%v = call i32 @_sym_build_variable(i32 0)",
            "%sym.0 = call ptr @_sym_get_return_expression()",
            "call void @_sym_set_return_expression(ptr %sym.0)",
            "ret i32 %v",
        ],
    );
}

#[test]
fn test_runtime_calls_are_not_instrumented() {
    let (module, session) = symbolize(
        "declare void @_sym_initialize()

define void @start() {
entry:
  call void @_sym_initialize()
  ret void
}

define void @_sym_helper(i32 %a) {
entry:
  %b = add i32 %a, 1
  ret void
}
",
    );

    assert_block(&module, "start", "entry", &["call void @_sym_initialize()", "ret void"]);
    assert_block(&module, "_sym_helper", "entry", &["%b = add i32 %a, 1", "ret void"]);
    assert_eq!(session.stats().functions_symbolized, 1);
}

#[test]
fn test_indirect_call_is_reported() {
    let (module, session) = symbolize(
        "define void @f(ptr %fp) {
entry:
  call void %fp(i32 1)
  ret void
}
",
    );

    let diagnostics = session.diagnostics();
    assert_eq!(diagnostics.len(), 1);
    assert_eq!(diagnostics[0].kind, DiagnosticKind::IndirectCall);
    assert_eq!(diagnostics[0].function, "f");
    assert!(diagnostics[0].to_string().starts_with("warning: indirect call in f:"));

    let func = module.function("f").unwrap();
    assert!(func.calls_to("_sym_set_parameter_expression").is_empty());
    assert!(func.calls_to("_sym_build_integer").is_empty());
}

#[test]
fn test_indirect_call_result_has_no_expression() {
    let (_module, session, result) = try_symbolize(
        "define i32 @f(ptr %fp) {
entry:
  %r = call i32 %fp(i32 1)
  ret i32 %r
}
",
    );

    assert!(matches!(result, Err(SymbolizeError::MissingExpression { .. })), "{result:?}");
    assert_eq!(session.diagnostics().len(), 1);
}

#[test]
fn test_memcpy_is_forwarded() {
    let (module, _session) = symbolize(
        "declare void @llvm.memcpy.p0.p0.i32(ptr, ptr, i32, i1)

define void @copy(ptr %d, ptr %s, i32 %n) {
entry:
  call void @llvm.memcpy.p0.p0.i32(ptr %d, ptr %s, i32 %n, i1 false)
  ret void
}
",
    );

    assert_block(
        &module,
        "copy",
        "entry",
        &[
            "%sym.0 = call ptr @_sym_get_parameter_expression(i8 0)",
            "%sym.1 = call ptr @_sym_get_parameter_expression(i8 1)",
            "%sym.2 = call ptr @_sym_get_parameter_expression(i8 2)",
            "%sym.3 = zext i32 %n to i64",
            "call void @_sym_memcpy(ptr %d, ptr %s, i64 %sym.3)",
            "call void @llvm.memcpy.p0.p0.i32(ptr %d, ptr %s, i32 %n, i1 false)",
            "ret void",
        ],
    );
}

#[test]
fn test_memcpy_with_pointer_sized_length() {
    let (module, _session) = symbolize(
        "declare void @llvm.memcpy.p0.p0.i64(ptr, ptr, i64, i1)

define void @copy(ptr %d, ptr %s, i64 %n) {
entry:
  call void @llvm.memcpy.p0.p0.i64(ptr %d, ptr %s, i64 %n, i1 false)
  ret void
}
",
    );

    let func = module.function("copy").unwrap();
    assert_eq!(
        func.calls_to("_sym_memcpy"),
        vec!["call void @_sym_memcpy(ptr %d, ptr %s, i64 %n)".to_string()]
    );
}

#[test]
fn test_lifetime_markers_and_unknown_intrinsics() {
    let (module, session) = symbolize(
        "declare void @llvm.lifetime.start.p0(i64, ptr)
declare i32 @llvm.ctpop.i32(i32)

define i32 @f(i32 %a) {
entry:
  %slot = alloca i32
  call void @llvm.lifetime.start.p0(i64 4, ptr %slot)
  %p = call i32 @llvm.ctpop.i32(i32 %a)
  ret i32 %a
}
",
    );

    let diagnostics = session.diagnostics();
    assert_eq!(diagnostics.len(), 1, "{diagnostics:?}");
    assert_eq!(diagnostics[0].kind, DiagnosticKind::UnhandledIntrinsic);
    assert!(diagnostics[0].message.contains("llvm.ctpop.i32"));

    let entry = lines(&module, "f", "entry");
    assert!(!entry.iter().any(|line| line.contains("_sym_set_parameter_expression")));
    assert!(!entry.iter().any(|line| line.contains("_sym_get_return_expression")));
}
