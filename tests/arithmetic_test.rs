//! Test symbolization of arithmetic, comparisons and path constraints.

mod common;

use common::{assert_block, check_output_contains, lines, symbolize, try_symbolize};
use symbolize::SymbolizeError;

#[test]
fn test_add_with_literal() {
    let (module, _session) = symbolize(
        "define i32 @f(i32 %a) {
entry:
  %x = add i32 3, %a
  ret i32 %x
}
",
    );

    assert_block(
        &module,
        "f",
        "entry",
        &[
            "%sym.0 = call ptr @_sym_get_parameter_expression(i8 0)",
            "%sym.1 = call ptr @_sym_build_integer(i64 3, i8 32)",
            "%sym.2 = call ptr @_sym_build_add(ptr %sym.1, ptr %sym.0)",
            "%x = add i32 3, %a",
            "call void @_sym_set_return_expression(ptr %sym.2)",
            "ret i32 %x",
        ],
    );

    let output = module.to_string();
    check_output_contains(
        &output,
        &[
            "declare ptr @_sym_build_add(ptr, ptr)",
            "declare void @_sym_initialize()",
            "define internal void @__sym_ctor() {",
        ],
    );
}

#[test]
fn test_comparison_pushes_path_constraint() {
    let (module, _session) = symbolize(
        "define i32 @max(i32 %a, i32 %b) {
entry:
  %c = icmp sgt i32 %a, %b
  br i1 %c, label %then, label %else
then:
  ret i32 %a
else:
  ret i32 %b
}
",
    );

    assert_block(
        &module,
        "max",
        "entry",
        &[
            "%sym.0 = call ptr @_sym_get_parameter_expression(i8 0)",
            "%sym.1 = call ptr @_sym_get_parameter_expression(i8 1)",
            "%sym.2 = call ptr @_sym_build_signed_greater_than(ptr %sym.0, ptr %sym.1)",
            "%c = icmp sgt i32 %a, %b",
            "%sym.3 = call ptr @_sym_push_path_constraint(ptr %sym.2, i1 %c)",
            "br i1 %c, label %then, label %else",
        ],
    );
    assert_block(
        &module,
        "max",
        "then",
        &["call void @_sym_set_return_expression(ptr %sym.0)", "ret i32 %a"],
    );
    assert_block(
        &module,
        "max",
        "else",
        &["call void @_sym_set_return_expression(ptr %sym.1)", "ret i32 %b"],
    );
}

#[test]
fn test_every_operator_has_a_handler() {
    let (module, session) = symbolize(
        "define i32 @ops(i32 %a, i32 %b) {
entry:
  %1 = sub i32 %a, %b
  %2 = mul nsw i32 %1, %b
  %3 = udiv i32 %2, %b
  %4 = sdiv exact i32 %3, %b
  %5 = urem i32 %4, %b
  %6 = srem i32 %5, %b
  %7 = shl nuw i32 %6, %b
  %8 = lshr i32 %7, %b
  %9 = ashr i32 %8, %b
  %10 = and i32 %9, %b
  %11 = or i32 %10, %b
  %12 = xor i32 %11, %b
  ret i32 %12
}
",
    );

    let func = module.function("ops").unwrap();
    for handler in [
        "_sym_build_sub",
        "_sym_build_mul",
        "_sym_build_unsigned_div",
        "_sym_build_signed_div",
        "_sym_build_unsigned_rem",
        "_sym_build_signed_rem",
        "_sym_build_shift_left",
        "_sym_build_logical_shift_right",
        "_sym_build_arithmetic_shift_right",
        "_sym_build_and",
        "_sym_build_or",
        "_sym_build_xor",
    ] {
        assert_eq!(func.calls_to(handler).len(), 1, "expected one call to {handler}");
    }
    assert_eq!(session.stats().instruction_counts["binary"], 12);
}

#[test]
fn test_all_predicates() {
    let mut body = String::new();
    let predicates = [
        ("eq", "_sym_build_equal"),
        ("ne", "_sym_build_not_equal"),
        ("ugt", "_sym_build_unsigned_greater_than"),
        ("uge", "_sym_build_unsigned_greater_equal"),
        ("ult", "_sym_build_unsigned_less_than"),
        ("ule", "_sym_build_unsigned_less_equal"),
        ("sgt", "_sym_build_signed_greater_than"),
        ("sge", "_sym_build_signed_greater_equal"),
        ("slt", "_sym_build_signed_less_than"),
        ("sle", "_sym_build_signed_less_equal"),
    ];
    for (i, (predicate, _)) in predicates.iter().enumerate() {
        body.push_str(&format!("  %c{i} = icmp {predicate} i64 %a, %b\n"));
    }
    let source = format!("define void @cmp(i64 %a, i64 %b) {{\nentry:\n{body}  ret void\n}}\n");

    let (module, _session) = symbolize(&source);
    let func = module.function("cmp").unwrap();
    for (i, (_, handler)) in predicates.iter().enumerate() {
        let calls = func.calls_to(handler);
        assert_eq!(calls.len(), 1, "expected one call to {handler}");
        assert!(calls[0].ends_with("(ptr %sym.0, ptr %sym.1)"), "{}", calls[0]);
        assert!(lines(&module, "cmp", "entry").contains(&format!("%c{i} = icmp {} i64 %a, %b", predicates[i].0)));
    }
}

#[test]
fn test_literals_are_built_in_entry_block() {
    let (module, _session) = symbolize(
        "define i32 @g(i32 %a, i1 %c) {
entry:
  br i1 %c, label %more, label %done
more:
  %x = mul i32 %a, 7
  ret i32 %x
done:
  ret i32 0
}
",
    );

    let entry = lines(&module, "g", "entry");
    assert!(entry.iter().any(|l| l.ends_with("call ptr @_sym_build_integer(i64 7, i8 32)")));
    assert!(entry.iter().any(|l| l.ends_with("call ptr @_sym_build_integer(i64 0, i8 32)")));
    assert_eq!(entry.last().map(String::as_str), Some("br i1 %c, label %more, label %done"));

    for block in ["more", "done"] {
        assert!(
            !lines(&module, "g", block).iter().any(|l| l.contains("_sym_build_integer")),
            "literal built outside the entry block in {block}"
        );
    }
}

#[test]
fn test_select_constrains_condition() {
    let (module, _session) = symbolize(
        "define i32 @sel(i1 %c, i32 %a, i32 %b) {
entry:
  %r = select i1 %c, i32 %a, i32 %b
  ret i32 %r
}
",
    );

    assert_block(
        &module,
        "sel",
        "entry",
        &[
            "%sym.0 = call ptr @_sym_get_parameter_expression(i8 0)",
            "%sym.1 = call ptr @_sym_get_parameter_expression(i8 1)",
            "%sym.2 = call ptr @_sym_get_parameter_expression(i8 2)",
            "%sym.3 = call ptr @_sym_push_path_constraint(ptr %sym.0, i1 %c)",
            "%sym.4 = select i1 %c, ptr %sym.1, ptr %sym.2",
            "%r = select i1 %c, i32 %a, i32 %b",
            "call void @_sym_set_return_expression(ptr %sym.4)",
            "ret i32 %r",
        ],
    );
}

#[test]
fn test_float_arithmetic_is_fatal() {
    let (_module, _session, result) = try_symbolize(
        "define float @f(float %a, float %b) {
entry:
  %x = fadd float %a, %b
  ret float %x
}
",
    );

    assert_eq!(result, Err(SymbolizeError::MissingBinaryHandler { op: "fadd".to_string() }));
}

#[test]
fn test_wide_literal_is_fatal() {
    let (_module, _session, result) = try_symbolize(
        "define i128 @f(i128 %a) {
entry:
  %x = add i128 %a, 1
  ret i128 %x
}
",
    );

    assert_eq!(result, Err(SymbolizeError::UnsupportedConstantWidth { bits: 128 }));
}

#[test]
fn test_output_is_deterministic() {
    let source = "define i32 @f(i32 %a, i32 %b) {
entry:
  %x = add i32 %a, 3
  %c = icmp ult i32 %x, %b
  br i1 %c, label %yes, label %no
yes:
  ret i32 %x
no:
  ret i32 %b
}
";

    let (first, _) = symbolize(source);
    let (second, _) = symbolize(source);
    assert_eq!(first.to_string(), second.to_string());
}

#[test]
fn test_session_statistics() {
    let (_module, session) = symbolize(
        "declare i32 @ext(i32)

define i32 @f(i32 %a) {
entry:
  %x = add i32 3, %a
  ret i32 %x
}
",
    );

    let stats = session.stats();
    assert_eq!(stats.functions_symbolized, 1);
    assert!(stats.functions_skipped >= 2, "declarations and the startup routine are skipped");
    assert_eq!(stats.instructions_visited, 2);
    assert_eq!(stats.instruction_counts["binary"], 1);
    assert_eq!(stats.instruction_counts["ret"], 1);
    // initialize, parameter, literal, add, set return
    assert_eq!(stats.runtime_calls_emitted, 5);
    assert!(session.diagnostics().is_empty());

    let report = stats.to_string();
    check_output_contains(&report, &["Symbolization Session Statistics:", "Functions symbolized: 1"]);
}
