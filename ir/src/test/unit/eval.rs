use std::rc::Rc;

use sluice_device::Buffer;
use sluice_dtype::{DType, ScalarDType};

use crate::{BinaryOp, Bound, CallKind, ConstValue, DeviceApi, Error, Evaluator, Expr, Stmt};

fn float32() -> DType {
    DType::Scalar(ScalarDType::Float32)
}

fn int32() -> DType {
    DType::Scalar(ScalarDType::Int32)
}

/// `for x in [0, extent): name[x] = value`
fn pointwise_loop(name: &str, extent: i64, value: Rc<Expr>) -> Rc<Stmt> {
    Stmt::for_loop("x", Expr::int(0), Expr::int(extent), DeviceApi::None, Stmt::provide(name, [value], [Expr::var("x")]))
}

#[test]
fn test_simple_realization() {
    // realize f([0, 8)) { produce f { for x: f[x] = x * 2 } }
    let tree = Stmt::realize(
        "f",
        [int32()],
        [Bound::new(Expr::int(0), Expr::int(8))],
        Stmt::produce("f", pointwise_loop("f", 8, Expr::binary(BinaryOp::Mul, Expr::var("x"), Expr::int(2)))),
    );

    let mut evaluator = Evaluator::new();
    evaluator.run(&tree).unwrap();

    for x in 0..8 {
        assert_eq!(evaluator.value_at("f", 0, &[x]).unwrap(), ConstValue::Int(i64::from(x) * 2));
    }
}

#[test]
fn test_tuple_realization_uses_one_buffer_per_component() {
    let store = Stmt::provide(
        "f",
        [Expr::var("x"), Expr::binary(BinaryOp::Add, Expr::var("x"), Expr::int(100))],
        [Expr::var("x")],
    );
    let tree = Stmt::realize(
        "f",
        [int32(), int32()],
        [Bound::new(Expr::int(0), Expr::int(4))],
        Stmt::produce("f", Stmt::for_loop("x", Expr::int(0), Expr::int(4), DeviceApi::None, store)),
    );

    let mut evaluator = Evaluator::new();
    evaluator.run(&tree).unwrap();

    assert!(!evaluator.buffer("f", 0).unwrap().same_as(evaluator.buffer("f", 1).unwrap()));
    assert_eq!(evaluator.value_at("f", 0, &[3]).unwrap(), ConstValue::Int(3));
    assert_eq!(evaluator.value_at("f", 1, &[3]).unwrap(), ConstValue::Int(103));
}

#[test]
fn test_realize_with_nonzero_min() {
    let store = Stmt::provide("f", [Expr::var("x")], [Expr::var("x")]);
    let tree = Stmt::realize(
        "f",
        [int32()],
        [Bound::new(Expr::int(-2), Expr::int(5))],
        Stmt::produce("f", Stmt::for_loop("x", Expr::int(-2), Expr::int(5), DeviceApi::None, store)),
    );

    let mut evaluator = Evaluator::new();
    evaluator.run(&tree).unwrap();

    assert_eq!(evaluator.buffer("f", 0).unwrap().min(0).unwrap(), -2);
    assert_eq!(evaluator.value_at("f", 0, &[-2]).unwrap(), ConstValue::Int(-2));
    assert_eq!(evaluator.value_at("f", 0, &[2]).unwrap(), ConstValue::Int(2));
}

#[test]
fn test_pre_bound_output_buffer_is_written_in_place() {
    let output = Buffer::with_extents(int32(), &[4], Some("f")).unwrap();

    let mut evaluator = Evaluator::new();
    evaluator.bind("f", 0, output.clone());
    // No realize: the output buffer is externally supplied.
    evaluator.run(&Stmt::produce("f", pointwise_loop("f", 4, Expr::var("x")))).unwrap();

    assert!(evaluator.buffer("f", 0).unwrap().same_as(&output));
    assert_eq!(evaluator.value_at("f", 0, &[2]).unwrap(), ConstValue::Int(2));
}

#[test]
fn test_image_input_read() {
    let mut evaluator = Evaluator::new();
    evaluator.bind("in", 0, Buffer::with_extents(int32(), &[4], Some("in")).unwrap());
    // Fill the input through a store loop, then read it as an image.
    evaluator.run(&pointwise_loop("in", 4, Expr::binary(BinaryOp::Mul, Expr::var("x"), Expr::var("x")))).unwrap();

    let read = Stmt::realize(
        "g",
        [int32()],
        [Bound::new(Expr::int(0), Expr::int(4))],
        Stmt::produce("g", pointwise_loop("g", 4, Expr::call("in", CallKind::Image, 0, [Expr::var("x")]))),
    );
    evaluator.run(&read).unwrap();

    assert_eq!(evaluator.value_at("g", 0, &[3]).unwrap(), ConstValue::Int(9));
}

#[test]
fn test_float_arithmetic_and_branches() {
    let value = Expr::binary(
        BinaryOp::Add,
        Expr::float(0.5),
        Expr::binary(BinaryOp::Mul, Expr::var("x"), Expr::float(2.0)),
    );
    let body = Stmt::if_then_else(
        Expr::binary(BinaryOp::Lt, Expr::var("x"), Expr::int(2)),
        Stmt::provide("f", [value], [Expr::var("x")]),
        Some(Stmt::provide("f", [Expr::float(-1.0)], [Expr::var("x")])),
    );
    let tree = Stmt::realize(
        "f",
        [float32()],
        [Bound::new(Expr::int(0), Expr::int(4))],
        Stmt::produce("f", Stmt::for_loop("x", Expr::int(0), Expr::int(4), DeviceApi::None, body)),
    );

    let mut evaluator = Evaluator::new();
    evaluator.run(&tree).unwrap();

    assert_eq!(evaluator.value_at("f", 0, &[1]).unwrap(), ConstValue::Float(2.5));
    assert_eq!(evaluator.value_at("f", 0, &[3]).unwrap(), ConstValue::Float(-1.0));
}

#[test]
fn test_scalar_binding_and_loop_scoping() {
    let mut evaluator = Evaluator::new();
    evaluator.bind_scalar("x", ConstValue::Int(42));

    let tree = Stmt::realize(
        "f",
        [int32()],
        [Bound::new(Expr::int(0), Expr::int(3))],
        Stmt::produce("f", pointwise_loop("f", 3, Expr::var("x"))),
    );
    evaluator.run(&tree).unwrap();

    // Inside the loop, x is the loop index.
    assert_eq!(evaluator.value_at("f", 0, &[2]).unwrap(), ConstValue::Int(2));

    // After the loop, the outer binding is restored.
    evaluator.run(&Stmt::realize(
        "g",
        [int32()],
        [Bound::new(Expr::int(0), Expr::int(1))],
        Stmt::provide("g", [Expr::var("x")], [Expr::int(0)]),
    )).unwrap();
    assert_eq!(evaluator.value_at("g", 0, &[0]).unwrap(), ConstValue::Int(42));
}

#[test]
fn test_unbound_variable_is_an_error() {
    let mut evaluator = Evaluator::new();
    let result = evaluator.run(&Stmt::evaluate(Expr::var("ghost")));
    assert!(matches!(result, Err(Error::UndefinedVariable { name }) if name == "ghost"));
}

#[test]
fn test_division_by_zero_is_an_error() {
    let mut evaluator = Evaluator::new();
    let result = evaluator.run(&Stmt::evaluate(Expr::binary(BinaryOp::Div, Expr::int(1), Expr::int(0))));
    assert!(matches!(result, Err(Error::DivisionByZero)));
}

#[test]
fn test_extern_call_is_unsupported() {
    let mut evaluator = Evaluator::new();
    let result = evaluator.run(&Stmt::evaluate(Expr::call("blur", CallKind::Extern, 0, [Expr::int(0)])));
    assert!(matches!(result, Err(Error::ExternUnsupported { .. })));
}

#[test]
fn test_provide_without_realization_is_an_error() {
    let mut evaluator = Evaluator::new();
    let result = evaluator.run(&Stmt::provide("f", [Expr::int(1)], [Expr::int(0)]));
    assert!(matches!(result, Err(Error::UnrealizedFunction { .. })));
}

#[test]
fn test_out_of_bounds_store_is_caught() {
    let tree = Stmt::realize(
        "f",
        [int32()],
        [Bound::new(Expr::int(0), Expr::int(4))],
        Stmt::produce("f", pointwise_loop("f", 5, Expr::var("x"))),
    );
    let mut evaluator = Evaluator::new();
    assert!(matches!(evaluator.run(&tree), Err(Error::Buffer { .. })));
}
