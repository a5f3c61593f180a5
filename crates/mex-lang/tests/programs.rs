//! End-to-end compile tests driving whole programs through
//! [`mex_lang::compile`] and inspecting the resulting quads/diagnostics.

use mex_lang::diagnostics::ErrorCode;
use mex_lang::quad::{JumpTarget, Operand, QuadOp};

#[test]
fn scope_hygiene_shadow_and_restore() {
    let out = mex_lang::compile(
        r#"
        void f() begin
            string x;
            begin
                byte x;
                x = 5;
            end
            x = "ok";
        end
        "#,
    );
    assert!(out.is_success(), "{:?}", out.diagnostics);
    assert!(out.diagnostics.iter().all(|d| d.code != ErrorCode::Duplicate));
}

#[test]
fn if_else_back_patches_to_quad_indices() {
    let out = mex_lang::compile("void f() begin byte x, y; if x then y = 1 else y = 2; end");
    assert!(out.is_success(), "{:?}", out.diagnostics);
    let quads = out.quads.as_slice();

    let jz = quads.iter().find(|q| q.op == QuadOp::Jz).expect("a jz quad");
    let jmp = quads.iter().find(|q| q.op == QuadOp::Jmp).expect("a jmp quad");

    let else_start = quads.iter().position(|q| q.op == QuadOp::Jmp).unwrap() + 1;
    assert_eq!(jz.dest, Operand::Target(JumpTarget::Resolved(else_start)));

    let after_else = quads.len() - 1; // epilogue is the last quad
    assert_eq!(jmp.dest, Operand::Target(JumpTarget::Resolved(after_else)));
}

#[test]
fn for_loop_emits_one_test_and_three_branch_quads() {
    let out = mex_lang::compile("void f() begin word n; for (n = 0; n < 3; n = n + 1) n = n; end");
    assert!(out.is_success(), "{:?}", out.diagnostics);
    let quads = out.quads.as_slice();

    let jz_count = quads.iter().filter(|q| q.op == QuadOp::Jz).count();
    let jmp_count = quads.iter().filter(|q| q.op == QuadOp::Jmp).count();
    assert_eq!(jz_count, 1);
    assert_eq!(jmp_count, 3);

    let test_count = quads.iter().filter(|q| q.op == QuadOp::Lt).count();
    assert_eq!(test_count, 1, "the loop test is evaluated by a single Lt quad, not re-emitted per iteration");
}

#[test]
fn goto_forward_reference_targets_the_statement_after_the_label() {
    let out = mex_lang::compile("void f() begin goto skip; byte x; x = 1; skip: x = 2; end");
    assert!(out.is_success(), "{:?}", out.diagnostics);
    let quads = out.quads.as_slice();

    let jmp = quads.iter().find(|q| q.op == QuadOp::Jmp).expect("the goto's jmp quad");
    let store_count_before_target = match jmp.dest {
        Operand::Target(JumpTarget::Resolved(idx)) => idx,
        other => panic!("expected a resolved jump target, got {other:?}"),
    };
    assert_eq!(quads[store_count_before_target].op, QuadOp::Store);
}

#[test]
fn array_out_of_range_index_reports_but_still_emits_a_store() {
    let out = mex_lang::compile("void f() begin array[1..5] of byte a; a[0] = 1; end");
    assert!(!out.is_success());
    assert!(out.diagnostics.iter().any(|d| d.code == ErrorCode::BadSubscript));
    assert!(out.quads.as_slice().iter().any(|q| q.op == QuadOp::IndexStore));
}

#[test]
fn struct_field_assignment_resolves_offset_zero_and_stores() {
    let out = mex_lang::compile("struct S { byte f; } s; void run() begin s.f = 7; end");
    assert!(out.is_success(), "{:?}", out.diagnostics);
    let store = out.quads.as_slice().iter().find(|q| q.op == QuadOp::FieldStore).expect("a field store quad");
    assert_eq!(store.src1, Operand::ConstInt(0));
    assert_eq!(store.src2, Operand::ConstInt(7));
}

#[test]
fn narrowing_conversion_emits_conv_quad_with_no_type_error() {
    let out = mex_lang::compile("void f() begin dword d; byte b; b = d; end");
    assert!(out.is_success(), "{:?}", out.diagnostics);
    let conv = out
        .quads
        .as_slice()
        .iter()
        .find(|q| q.op == QuadOp::Conv)
        .expect("assigning a wider integer into a narrower one emits a conversion");
    assert_eq!(conv.ty, Some(mex_lang::types::Primitive::UByte));
}

#[test]
fn widening_conversion_emits_conv_quad() {
    let out = mex_lang::compile("void f() begin byte b; word w; w = b; end");
    assert!(out.is_success(), "{:?}", out.diagnostics);
    let conv = out.quads.as_slice().iter().find(|q| q.op == QuadOp::Conv).expect("widening a byte into a word converts it");
    assert_eq!(conv.ty, Some(mex_lang::types::Primitive::UWord));
}

#[test]
fn forward_declared_struct_used_as_a_type_before_definition_is_an_error() {
    let out = mex_lang::compile("struct S; struct S s; void f() begin end");
    assert!(!out.is_success());
    assert!(out.diagnostics.iter().any(|d| d.code == ErrorCode::UndefinedStruct));
}

#[test]
fn explicit_cast_narrows_and_emits_conv_quad() {
    let out = mex_lang::compile("void f() begin dword d; byte b; b = (byte) d; end");
    assert!(out.is_success(), "{:?}", out.diagnostics);
    let conv = out
        .quads
        .as_slice()
        .iter()
        .find(|q| q.op == QuadOp::Conv)
        .expect("an explicit (byte) cast narrows a dword and emits a conversion");
    assert_eq!(conv.ty, Some(mex_lang::types::Primitive::UByte));
}

#[test]
fn meaningless_expression_statement_warns_without_blocking_success() {
    let out = mex_lang::compile("void f() begin byte x; x + 1; end");
    assert!(out.is_success(), "a warning alone must not fail the compile: {:?}", out.diagnostics);
    assert!(out.diagnostics.iter().any(|d| d.code == ErrorCode::WarnMeaninglessExpr));
}
