use sluice_dtype::DType;
use snafu::Snafu;

use crate::expr::{BinaryOp, UnaryOp};

pub type Result<T, E = Error> = std::result::Result<T, E>;

#[derive(Debug, Snafu)]
#[snafu(visibility(pub))]
pub enum Error {
    /// Realization order names a function missing from the environment.
    #[snafu(display("realization order names unknown function {name}"))]
    UnknownFunctionInOrder { name: String },

    #[snafu(display("realization order names function {name} more than once"))]
    DuplicateInOrder { name: String },

    #[snafu(display("pipeline defines function {name} more than once"))]
    DuplicateFunction { name: String },

    #[snafu(display("undefined variable {name}"))]
    UndefinedVariable { name: String },

    /// A load or store hit a function with no realized storage.
    #[snafu(display("function {name} (component {component}) has no realized storage"))]
    UnrealizedFunction { name: String, component: usize },

    #[snafu(display("index into {name} did not evaluate to an integer"))]
    NonIntegerIndex { name: String },

    #[snafu(display("index {value} into {name} does not fit 32-bit addressing"))]
    IndexOutOfRange { name: String, value: i64 },

    #[snafu(display("cannot store value of this kind in a {dtype} buffer"))]
    ValueTypeMismatch { dtype: DType },

    #[snafu(display("realization bound of {name} did not evaluate to an integer"))]
    NonIntegerBound { name: String },

    #[snafu(display("realization bound of {name} is out of range: {value}"))]
    BoundOutOfRange { name: String, value: i64 },

    #[snafu(display("loop bound of {var} did not evaluate to an integer"))]
    NonIntegerLoopBound { var: String },

    #[snafu(display("branch condition did not evaluate to a boolean"))]
    InvalidCondition,

    #[snafu(display("division by zero"))]
    DivisionByZero,

    #[snafu(display("invalid operands for binary operation {op:?}"))]
    InvalidBinaryOperands { op: BinaryOp },

    #[snafu(display("invalid operand for unary operation {op:?}"))]
    InvalidUnaryOperand { op: UnaryOp },

    /// Extern stages run outside this runtime.
    #[snafu(display("cannot evaluate extern call to {name}"))]
    ExternUnsupported { name: String },

    #[snafu(display("cannot evaluate whole-buffer reference to {name}"))]
    BufferRefUnsupported { name: String },

    #[snafu(display("element type {dtype} is not supported by the evaluator"))]
    UnsupportedEvalDType { dtype: DType },

    #[snafu(display("buffer {name} has no host storage"))]
    UnallocatedHost { name: String },

    #[snafu(context(false), display("buffer error: {source}"))]
    Buffer { source: sluice_device::Error },
}
