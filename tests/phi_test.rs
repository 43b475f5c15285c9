//! Test symbolization of phi nodes.
//!
//! Shadow phis are created empty while the function is walked and receive
//! their incoming expressions once every block has been translated, so
//! back-edges see the expressions built later in the loop body.

mod common;

use common::{assert_block, lines, symbolize, try_symbolize};
use symbolize::SymbolizeError;

#[test]
fn test_diamond_merge() {
    let (module, session) = symbolize(
        "define i32 @max(i32 %a, i32 %b) {
entry:
  %c = icmp sgt i32 %a, %b
  br i1 %c, label %then, label %else
then:
  br label %merge
else:
  br label %merge
merge:
  %r = phi i32 [ %a, %then ], [ %b, %else ]
  ret i32 %r
}
",
    );

    assert_block(
        &module,
        "max",
        "merge",
        &[
            "%sym.4 = phi ptr [ %sym.0, %then ], [ %sym.1, %else ]",
            "%r = phi i32 [ %a, %then ], [ %b, %else ]",
            "call void @_sym_set_return_expression(ptr %sym.4)",
            "ret i32 %r",
        ],
    );
    assert_eq!(session.stats().merge_nodes_resolved, 1);
}

#[test]
fn test_null_incoming_is_built_in_its_predecessor() {
    let (module, _session) = symbolize(
        "define ptr @pick(i1 %c, ptr %p) {
entry:
  br i1 %c, label %a, label %b
a:
  br label %m
b:
  br label %m
m:
  %r = phi ptr [ null, %a ], [ %p, %b ]
  ret ptr %r
}
",
    );

    assert_block(
        &module,
        "pick",
        "a",
        &["%sym.4 = call ptr @_sym_build_null_pointer()", "br label %m"],
    );
    assert_block(&module, "pick", "b", &["br label %m"]);
    assert_block(
        &module,
        "pick",
        "m",
        &[
            "%sym.3 = phi ptr [ %sym.4, %a ], [ %sym.1, %b ]",
            "%r = phi ptr [ null, %a ], [ %p, %b ]",
            "call void @_sym_set_return_expression(ptr %sym.3)",
            "ret ptr %r",
        ],
    );
    assert!(lines(&module, "pick", "m").iter().all(|line| !line.contains("@_sym_build")));
}

#[test]
fn test_loop_back_edge() {
    let (module, session) = symbolize(
        "define i32 @count(i32 %n) {
entry:
  br label %loop
loop:
  %i = phi i32 [ 0, %entry ], [ %next, %loop ]
  %next = add i32 %i, 1
  %c = icmp slt i32 %next, %n
  br i1 %c, label %loop, label %exit
exit:
  ret i32 %next
}
",
    );

    assert_block(
        &module,
        "count",
        "entry",
        &[
            "%sym.0 = call ptr @_sym_get_parameter_expression(i8 0)",
            "%sym.2 = call ptr @_sym_build_integer(i64 1, i8 32)",
            "%sym.6 = call ptr @_sym_build_integer(i64 0, i8 32)",
            "br label %loop",
        ],
    );
    assert_block(
        &module,
        "count",
        "loop",
        &[
            "%sym.1 = phi ptr [ %sym.6, %entry ], [ %sym.3, %loop ]",
            "%i = phi i32 [ 0, %entry ], [ %next, %loop ]",
            "%sym.3 = call ptr @_sym_build_add(ptr %sym.1, ptr %sym.2)",
            "%next = add i32 %i, 1",
            "%sym.4 = call ptr @_sym_build_signed_less_than(ptr %sym.3, ptr %sym.0)",
            "%c = icmp slt i32 %next, %n",
            "%sym.5 = call ptr @_sym_push_path_constraint(ptr %sym.4, i1 %c)",
            "br i1 %c, label %loop, label %exit",
        ],
    );
    assert_block(
        &module,
        "count",
        "exit",
        &["call void @_sym_set_return_expression(ptr %sym.3)", "ret i32 %next"],
    );
    assert_eq!(session.stats().merge_nodes_resolved, 1);
}

#[test]
fn test_shadow_phis_stay_grouped() {
    let (module, session) = symbolize(
        "define i32 @swap(i32 %a, i32 %b, i1 %c) {
entry:
  br i1 %c, label %left, label %join
left:
  br label %join
join:
  %x = phi i32 [ %a, %entry ], [ %b, %left ]
  %y = phi i32 [ %b, %entry ], [ %a, %left ]
  %d = sub i32 %x, %y
  ret i32 %d
}
",
    );

    let join = lines(&module, "swap", "join");
    let phis = join.iter().take_while(|line| line.contains(" = phi ")).count();
    assert_eq!(phis, 4, "{join:#?}");
    assert!(join[0].starts_with("%sym.") && join[0].contains("phi ptr"));
    assert_eq!(join[1], "%x = phi i32 [ %a, %entry ], [ %b, %left ]");
    assert!(join[2].starts_with("%sym.") && join[2].contains("phi ptr"));
    assert_eq!(join[3], "%y = phi i32 [ %b, %entry ], [ %a, %left ]");
    assert_eq!(session.stats().merge_nodes_resolved, 2);
}

#[test]
fn test_incoming_literal_built_in_entry() {
    let (module, _session) = symbolize(
        "define i32 @pick(i1 %c, i32 %a) {
entry:
  br i1 %c, label %other, label %done
other:
  br label %done
done:
  %r = phi i32 [ %a, %entry ], [ 42, %other ]
  ret i32 %r
}
",
    );

    assert!(lines(&module, "pick", "entry")
        .iter()
        .any(|line| line.ends_with("call ptr @_sym_build_integer(i64 42, i8 32)")));
    assert_eq!(lines(&module, "pick", "other"), vec!["br label %done".to_string()]);
}

#[test]
fn test_incoming_without_expression_is_fatal() {
    let (_module, _session, result) = try_symbolize(
        "define i32 @f(ptr %fp, i1 %c) {
entry:
  %v = call i32 %fp()
  br i1 %c, label %next, label %done
next:
  br label %done
done:
  %r = phi i32 [ %v, %entry ], [ 0, %next ]
  ret i32 %r
}
",
    );

    assert!(matches!(result, Err(SymbolizeError::MissingExpression { .. })), "{result:?}");
}
