use std::collections::HashMap;
use std::rc::Rc;

use sluice_ir::{BinaryOp, Bound, CallKind, ConstValue, DeviceApi, Expr, Function, Stmt};

use crate::copy_elision;
use crate::test::helpers::{
    copy_fn, eval_outputs, index, int32, loop_nest, lower, lower_with_devices, params, pipeline, scalar_fn,
};

/// p computes, c copies p, out reads c.
fn copy_through_pipeline() -> sluice_ir::Pipeline {
    let p = scalar_fn("p", &["x"], Expr::binary(BinaryOp::Mul, Expr::var("x"), Expr::int(3)));
    let c = copy_fn("c", "p", &["x"], 1);
    let out = scalar_fn(
        "out",
        &["x"],
        Expr::binary(BinaryOp::Add, Expr::call("c", CallKind::Pipeline, 0, [Expr::var("x")]), Expr::int(1)),
    );
    pipeline([p, c, out], &["p", "c", "out"])
}

#[test]
fn test_elides_simple_copy() {
    let graph = copy_through_pipeline();
    let tree = lower(&graph, 8);
    let elided = copy_elision(&tree, &graph);

    let ix = index(&elided);
    assert!(!ix.realized.contains("c"), "consumer storage must not materialize");
    assert!(!ix.produced.contains("c"), "consumer produce section must be deleted");
    assert!(!ix.calls.contains_key("c"), "no reads of the consumer may remain");
    // out's former reads of c now hit p directly.
    assert_eq!(ix.calls["p"], 1);

    // The original tree is untouched.
    let original = index(&tree);
    assert!(original.realized.contains("c"));
}

#[test]
fn test_elided_tree_computes_identical_values() {
    let graph = copy_through_pipeline();
    let tree = lower(&graph, 8);
    let elided = copy_elision(&tree, &graph);

    let expected = eval_outputs(&tree, "out", 0..8);
    let actual = eval_outputs(&elided, "out", 0..8);
    assert_eq!(expected, actual);
    assert_eq!(actual[5], ConstValue::Int(16));
}

#[test]
fn test_cross_device_consumer_is_left_alone() {
    let graph = copy_through_pipeline();
    // out (the only reader of c) runs on CUDA while p is written on the
    // host: the copy is a real transfer and must stay.
    let devices = HashMap::from([("out", DeviceApi::Cuda)]);
    let tree = lower_with_devices(&graph, 8, &devices);

    let elided = copy_elision(&tree, &graph);
    assert!(Rc::ptr_eq(&tree, &elided), "tree must be untouched when elision is unsafe");
}

#[test]
fn test_same_device_elision_still_applies() {
    let graph = copy_through_pipeline();
    // Everything under the same CUDA context: the copy is an alias again.
    let devices =
        HashMap::from([("p", DeviceApi::Cuda), ("c", DeviceApi::Cuda), ("out", DeviceApi::Cuda)]);
    let tree = lower_with_devices(&graph, 8, &devices);

    let elided = copy_elision(&tree, &graph);
    let ix = index(&elided);
    assert!(!ix.realized.contains("c"));
    assert_eq!(ix.calls["p"], 1);
}

#[test]
fn test_chain_collapses_onto_ultimate_producer() {
    let c = scalar_fn("c", &["x"], Expr::binary(BinaryOp::Add, Expr::var("x"), Expr::int(5)));
    let b = copy_fn("b", "c", &["x"], 1);
    let a = copy_fn("a", "b", &["x"], 1);
    let out = scalar_fn(
        "out",
        &["x"],
        Expr::binary(BinaryOp::Mul, Expr::call("a", CallKind::Pipeline, 0, [Expr::var("x")]), Expr::int(2)),
    );
    let graph = pipeline([c, b, a, out], &["c", "b", "a", "out"]);
    let tree = lower(&graph, 6);

    let elided = copy_elision(&tree, &graph);
    let ix = index(&elided);
    assert!(!ix.realized.contains("a"), "a's storage must be gone");
    assert!(!ix.realized.contains("b"), "b's storage must be gone");
    assert!(!ix.calls.contains_key("a"));
    assert!(!ix.calls.contains_key("b"));
    // out reads the ultimate producer directly.
    assert_eq!(ix.calls["c"], 1);

    let actual = eval_outputs(&elided, "out", 0..6);
    let expected: Vec<ConstValue> = (0..6).map(|x| ConstValue::Int((x + 5) * 2)).collect();
    assert_eq!(actual, expected);
}

#[test]
fn test_unread_copy_is_deleted_unconditionally() {
    let p = scalar_fn("p", &["x"], Expr::var("x"));
    let c = copy_fn("c", "p", &["x"], 1);
    // out reads p directly; c exists purely as an unused intermediate.
    let out = scalar_fn("out", &["x"], Expr::call("p", CallKind::Pipeline, 0, [Expr::var("x")]));
    let graph = pipeline([p, c, out], &["p", "c", "out"]);
    let tree = lower(&graph, 4);

    let elided = copy_elision(&tree, &graph);
    let ix = index(&elided);
    assert!(!ix.realized.contains("c"));
    assert!(!ix.produced.contains("c"));

    assert_eq!(eval_outputs(&elided, "out", 0..4), eval_outputs(&tree, "out", 0..4));
}

#[test]
fn test_opaque_buffer_reference_blocks_elision() {
    let p = scalar_fn("p", &["x"], Expr::var("x"));
    let c = copy_fn("c", "p", &["x"], 1);
    // An extern stage takes c's whole buffer: its storage must exist.
    let out = scalar_fn(
        "out",
        &["x"],
        Expr::call("process", CallKind::Extern, 0, [Expr::buffer_ref("c"), Expr::var("x")]),
    );
    let graph = pipeline([p, c, out], &["p", "c", "out"]);
    let tree = lower(&graph, 4);

    let elided = copy_elision(&tree, &graph);
    assert!(Rc::ptr_eq(&tree, &elided));
}

#[test]
fn test_tuple_copy_elision_preserves_components() {
    let p = Function::new(
        "p",
        params(&["x"]),
        [Expr::var("x"), Expr::binary(BinaryOp::Mul, Expr::var("x"), Expr::int(10))],
        [int32(), int32()],
    );
    let c = copy_fn("c", "p", &["x"], 2);
    let out = scalar_fn(
        "out",
        &["x"],
        Expr::binary(
            BinaryOp::Add,
            Expr::call("c", CallKind::Pipeline, 0, [Expr::var("x")]),
            Expr::call("c", CallKind::Pipeline, 1, [Expr::var("x")]),
        ),
    );
    let graph = pipeline([p, c, out], &["p", "c", "out"]);
    let tree = lower(&graph, 5);

    let elided = copy_elision(&tree, &graph);
    let ix = index(&elided);
    assert!(!ix.realized.contains("c"));
    assert_eq!(ix.calls["p"], 2);

    let actual = eval_outputs(&elided, "out", 0..5);
    let expected: Vec<ConstValue> = (0..5).map(|x| ConstValue::Int(x * 11)).collect();
    assert_eq!(actual, expected);
}

#[test]
fn test_pipeline_without_copies_is_untouched() {
    let p = scalar_fn("p", &["x"], Expr::var("x"));
    let out = scalar_fn(
        "out",
        &["x"],
        Expr::binary(BinaryOp::Add, Expr::call("p", CallKind::Pipeline, 0, [Expr::var("x")]), Expr::int(1)),
    );
    let graph = pipeline([p, out], &["p", "out"]);
    let tree = lower(&graph, 4);

    let elided = copy_elision(&tree, &graph);
    assert!(Rc::ptr_eq(&tree, &elided));
}

/// Hand-built tree where the consumer's domain sits strictly inside the
/// producer's: `realize p([0,8)) { realize c([2,6)) { realize out([2,6)) } }`.
fn nested_domain_tree(graph: &sluice_ir::Pipeline, c_bounds: Bound) -> Rc<Stmt> {
    let p = graph.function("p").unwrap();
    let c = graph.function("c").unwrap();
    let out = graph.function("out").unwrap();

    let out_realize = Stmt::realize(
        "out",
        [int32()],
        [Bound::new(Expr::int(2), Expr::int(4))],
        Stmt::produce("out", loop_nest(out, 2, 4, DeviceApi::None)),
    );
    let c_realize = Stmt::realize(
        "c",
        [int32()],
        [c_bounds],
        Stmt::block([Stmt::produce("c", loop_nest(c, 2, 4, DeviceApi::None)), out_realize]),
    );
    Stmt::realize(
        "p",
        [int32()],
        [Bound::new(Expr::int(0), Expr::int(8))],
        Stmt::block([Stmt::produce("p", loop_nest(p, 0, 8, DeviceApi::None)), c_realize]),
    )
}

fn nested_domain_pipeline() -> sluice_ir::Pipeline {
    let p = scalar_fn("p", &["x"], Expr::var("x"));
    let c = copy_fn("c", "p", &["x"], 1);
    let out = scalar_fn(
        "out",
        &["x"],
        Expr::binary(BinaryOp::Mul, Expr::call("c", CallKind::Pipeline, 0, [Expr::var("x")]), Expr::int(2)),
    );
    pipeline([p, c, out], &["p", "c", "out"])
}

#[test]
fn test_contained_domain_elides_without_growing_producer() {
    let graph = nested_domain_pipeline();
    let tree = nested_domain_tree(&graph, Bound::new(Expr::int(2), Expr::int(4)));

    let elided = copy_elision(&tree, &graph);
    let ix = index(&elided);
    assert!(!ix.realized.contains("c"));
    // p's domain already covered c's: its bounds are unchanged.
    assert_eq!(ix.bounds["p"], [Bound::new(Expr::int(0), Expr::int(8))]);

    let actual = eval_outputs(&elided, "out", 2..6);
    let expected: Vec<ConstValue> = (2..6).map(|x| ConstValue::Int(i64::from(x) * 2)).collect();
    assert_eq!(actual, expected);
}

#[test]
fn test_symbolic_domain_mismatch_blocks_elision() {
    let graph = nested_domain_pipeline();
    // c's domain depends on a symbolic origin the pass cannot compare
    // with p's constant domain.
    let tree = nested_domain_tree(&graph, Bound::new(Expr::var("t"), Expr::int(4)));

    let elided = copy_elision(&tree, &graph);
    assert!(Rc::ptr_eq(&tree, &elided));
}
