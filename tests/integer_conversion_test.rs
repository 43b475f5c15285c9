//! Test symbolization of integer conversions (TRUNC, ZEXT, SEXT) and casts.
//!
//! Extensions pass the number of added bits to the runtime, truncations the
//! target width. Extending an i1 reuses the boolean's expression.

mod common;

use common::{assert_block, symbolize, try_symbolize};
use symbolize::{DiagnosticKind, SymbolizeError};

#[test]
fn test_truncate_and_extend() {
    let (module, _session) = symbolize(
        "define i64 @conv(i32 %a, i1 %b) {
entry:
  %t = trunc i32 %a to i8
  %z = zext i8 %t to i64
  %s = sext i1 %b to i64
  %w = sext i32 %a to i64
  %sum = add i64 %z, %s
  %sum2 = add i64 %sum, %w
  ret i64 %sum2
}
",
    );

    assert_block(
        &module,
        "conv",
        "entry",
        &[
            "%sym.0 = call ptr @_sym_get_parameter_expression(i8 0)",
            "%sym.1 = call ptr @_sym_get_parameter_expression(i8 1)",
            "%sym.2 = call ptr @_sym_build_trunc(ptr %sym.0, i8 8)",
            "%t = trunc i32 %a to i8",
            "%sym.3 = call ptr @_sym_build_zext(ptr %sym.2, i8 56)",
            "%z = zext i8 %t to i64",
            "%s = sext i1 %b to i64",
            "%sym.4 = call ptr @_sym_build_sext(ptr %sym.0, i8 32)",
            "%w = sext i32 %a to i64",
            "%sym.5 = call ptr @_sym_build_add(ptr %sym.3, ptr %sym.1)",
            "%sum = add i64 %z, %s",
            "%sym.6 = call ptr @_sym_build_add(ptr %sym.5, ptr %sym.4)",
            "%sum2 = add i64 %sum, %w",
            "call void @_sym_set_return_expression(ptr %sym.6)",
            "ret i64 %sum2",
        ],
    );
}

#[test]
fn test_boolean_zext_reuses_expression() {
    let (module, _session) = symbolize(
        "define i32 @flag(i32 %a, i32 %b) {
entry:
  %c = icmp eq i32 %a, %b
  %r = zext i1 %c to i32
  ret i32 %r
}
",
    );

    let func = module.function("flag").unwrap();
    assert!(func.calls_to("_sym_build_zext").is_empty());
    assert_eq!(
        func.calls_to("_sym_set_return_expression"),
        vec!["call void @_sym_set_return_expression(ptr %sym.2)".to_string()]
    );
}

#[test]
fn test_pointer_bitcast_keeps_expression() {
    let (module, _session) = symbolize(
        "define ptr @same(ptr %p) {
entry:
  %q = bitcast ptr %p to ptr
  ret ptr %q
}
",
    );

    assert_block(
        &module,
        "same",
        "entry",
        &[
            "%sym.0 = call ptr @_sym_get_parameter_expression(i8 0)",
            "%q = bitcast ptr %p to ptr",
            "call void @_sym_set_return_expression(ptr %sym.0)",
            "ret ptr %q",
        ],
    );
}

#[test]
fn test_non_pointer_bitcast_is_fatal() {
    let (_module, _session, result) = try_symbolize(
        "define float @punned(i32 %a) {
entry:
  %f = bitcast i32 %a to float
  ret float %f
}
",
    );

    assert_eq!(
        result,
        Err(SymbolizeError::NonPointerBitCast {
            from: "i32".to_string(),
            to: "float".to_string(),
        })
    );
}

#[test]
fn test_unsupported_casts_are_reported() {
    let (module, session) = symbolize(
        "define void @casts(i32 %a, ptr %p) {
entry:
  %d = sitofp i32 %a to double
  %i = ptrtoint ptr %p to i64
  ret void
}
",
    );

    let diagnostics = session.diagnostics();
    assert_eq!(diagnostics.len(), 2, "{diagnostics:?}");
    assert!(diagnostics.iter().all(|d| d.kind == DiagnosticKind::UnsupportedCast));
    assert!(diagnostics[0].message.contains("sitofp"));

    let func = module.function("casts").unwrap();
    assert_eq!(session.stats().instruction_counts["cast"], 2);
    assert!(func.calls_to("_sym_build_zext").is_empty());
}

#[test]
fn test_cast_of_literal() {
    let (module, _session) = symbolize(
        "define i64 @widen() {
entry:
  %w = zext i16 7 to i64
  ret i64 %w
}
",
    );

    assert_block(
        &module,
        "widen",
        "entry",
        &[
            "%sym.0 = call ptr @_sym_build_integer(i64 7, i8 16)",
            "%sym.1 = call ptr @_sym_build_zext(ptr %sym.0, i8 48)",
            "%w = zext i16 7 to i64",
            "call void @_sym_set_return_expression(ptr %sym.1)",
            "ret i64 %w",
        ],
    );
}

#[test]
fn test_extension_wider_than_a_byte_is_fatal() {
    let (_module, _session, result) = try_symbolize(
        "define i512 @wide(i8 %a) {
entry:
  %z = zext i8 %a to i512
  ret i512 %z
}
",
    );

    assert_eq!(
        result,
        Err(SymbolizeError::ImmediateOutOfRange {
            what: "extension width".to_string(),
            value: 504,
        })
    );
}

#[test]
fn test_truncation_to_wide_integer_is_fatal() {
    let (_module, _session, result) = try_symbolize(
        "define i300 @narrow(i512 %a) {
entry:
  %t = trunc i512 %a to i300
  ret i300 %t
}
",
    );

    assert_eq!(
        result,
        Err(SymbolizeError::ImmediateOutOfRange {
            what: "truncation width".to_string(),
            value: 300,
        })
    );
}
