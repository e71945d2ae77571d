//! Host evaluation of lowered trees.
//!
//! The evaluator runs a statement tree directly against
//! [`sluice_device::Buffer`] storage, the way the embedded/just-in-time
//! execution mode does: everything runs on the host, so device hooks
//! never fire and `For` device annotations are ignored. Tuple-valued
//! functions realize one buffer per component, keyed `(name, component)`.
//!
//! Buffers realized during a run stay bound after it so intermediates
//! can be inspected; pre-bound buffers (pipeline inputs and outputs)
//! are written in place.

use std::collections::HashMap;
use std::rc::Rc;

use sluice_device::Buffer;
use sluice_dtype::{DType, ScalarDType};
use smallvec::SmallVec;
use snafu::{OptionExt, ensure};
use tracing::trace;

use crate::error::{
    BoundOutOfRangeSnafu, BufferRefUnsupportedSnafu, DivisionByZeroSnafu, ExternUnsupportedSnafu,
    IndexOutOfRangeSnafu, InvalidBinaryOperandsSnafu, InvalidConditionSnafu, InvalidUnaryOperandSnafu,
    NonIntegerBoundSnafu, NonIntegerIndexSnafu, NonIntegerLoopBoundSnafu, Result, UnallocatedHostSnafu,
    UndefinedVariableSnafu, UnrealizedFunctionSnafu, UnsupportedEvalDTypeSnafu, ValueTypeMismatchSnafu,
};
use crate::expr::{BinaryOp, CallKind, ConstValue, Expr, UnaryOp};
use crate::stmt::Stmt;

/// Executes lowered statement trees against buffer storage.
#[derive(Debug, Default)]
pub struct Evaluator {
    buffers: HashMap<(String, usize), Buffer>,
    bindings: HashMap<String, ConstValue>,
}

impl Evaluator {
    pub fn new() -> Self {
        Self::default()
    }

    /// Pre-bind storage for one tuple component of a function. Pre-bound
    /// buffers win over `Realize`: the tree writes into them in place.
    pub fn bind(&mut self, name: impl Into<String>, component: usize, buffer: Buffer) {
        self.buffers.insert((name.into(), component), buffer);
    }

    /// Bind a scalar pipeline parameter.
    pub fn bind_scalar(&mut self, name: impl Into<String>, value: ConstValue) {
        self.bindings.insert(name.into(), value);
    }

    pub fn buffer(&self, name: &str, component: usize) -> Option<&Buffer> {
        self.buffers.get(&(name.to_owned(), component))
    }

    /// Read one element of a function's realized storage.
    pub fn value_at(&self, name: &str, component: usize, pos: &[i32]) -> Result<ConstValue> {
        let buffer =
            self.buffers.get(&(name.to_owned(), component)).context(UnrealizedFunctionSnafu { name, component })?;
        load_element(buffer, pos)
    }

    pub fn run(&mut self, stmt: &Rc<Stmt>) -> Result<()> {
        self.exec(stmt)
    }

    fn exec(&mut self, stmt: &Rc<Stmt>) -> Result<()> {
        match &**stmt {
            Stmt::Block { stmts } => {
                for s in stmts {
                    self.exec(s)?;
                }
                Ok(())
            }
            Stmt::For { var, min, extent, device_api: _, body } => {
                let min = to_int(self.eval(min)?).context(NonIntegerLoopBoundSnafu { var })?;
                let extent = to_int(self.eval(extent)?).context(NonIntegerLoopBoundSnafu { var })?;

                let saved = self.bindings.remove(var);
                let mut result = Ok(());
                for i in min..min + extent {
                    self.bindings.insert(var.clone(), ConstValue::Int(i));
                    if let Err(error) = self.exec(body) {
                        result = Err(error);
                        break;
                    }
                }
                match saved {
                    Some(value) => self.bindings.insert(var.clone(), value),
                    None => self.bindings.remove(var),
                };
                result
            }
            Stmt::Realize { name, types, bounds, body } => {
                let mut mins = SmallVec::<[i32; 4]>::new();
                let mut extents = SmallVec::<[i32; 4]>::new();
                for bound in bounds {
                    mins.push(self.eval_bound(name, &bound.min)?);
                    extents.push(self.eval_bound(name, &bound.extent)?);
                }

                for (component, dtype) in types.iter().enumerate() {
                    let key = (name.clone(), component);
                    if self.buffers.contains_key(&key) {
                        continue;
                    }
                    let label =
                        if types.len() == 1 { name.clone() } else { format!("{name}.{component}") };
                    trace!(buffer = %label, ?extents, "realizing storage");
                    let buffer = Buffer::with_extents(dtype.clone(), &extents, Some(label.as_str()))?;
                    buffer.set_min(&mins)?;
                    self.buffers.insert(key, buffer);
                }

                self.exec(body)
            }
            Stmt::Produce { body, .. } => self.exec(body),
            Stmt::Provide { name, values, indices } => {
                let pos = self.eval_coords(name, indices)?;
                for (component, value) in values.iter().enumerate() {
                    let value = self.eval(value)?;
                    let buffer = self
                        .buffers
                        .get(&(name.clone(), component))
                        .context(UnrealizedFunctionSnafu { name, component })?;
                    store_element(buffer, &pos, value)?;
                }
                Ok(())
            }
            Stmt::IfThenElse { condition, then_case, else_case } => {
                match self.eval(condition)? {
                    ConstValue::Bool(true) => self.exec(then_case),
                    ConstValue::Bool(false) => match else_case {
                        Some(else_case) => self.exec(else_case),
                        None => Ok(()),
                    },
                    _ => InvalidConditionSnafu.fail(),
                }
            }
            Stmt::Evaluate { value } => {
                self.eval(value)?;
                Ok(())
            }
        }
    }

    fn eval(&self, expr: &Rc<Expr>) -> Result<ConstValue> {
        match &**expr {
            Expr::Const(value) => Ok(*value),
            Expr::Var(name) => self.bindings.get(name).copied().context(UndefinedVariableSnafu { name }),
            Expr::Unary(op, operand) => eval_unary(*op, self.eval(operand)?),
            Expr::Binary(op, lhs, rhs) => eval_binary(*op, self.eval(lhs)?, self.eval(rhs)?),
            Expr::Call { name, kind, value_index, args } => match kind {
                CallKind::Pipeline | CallKind::Image => {
                    let pos = self.eval_coords(name, args)?;
                    let buffer = self
                        .buffers
                        .get(&(name.clone(), *value_index))
                        .context(UnrealizedFunctionSnafu { name, component: *value_index })?;
                    load_element(buffer, &pos)
                }
                CallKind::Extern => ExternUnsupportedSnafu { name }.fail(),
            },
            Expr::BufferRef { name } => BufferRefUnsupportedSnafu { name }.fail(),
        }
    }

    fn eval_coords(&self, name: &str, indices: &[Rc<Expr>]) -> Result<SmallVec<[i32; 4]>> {
        indices
            .iter()
            .map(|index| {
                let value = to_int(self.eval(index)?).context(NonIntegerIndexSnafu { name })?;
                i32::try_from(value).ok().context(IndexOutOfRangeSnafu { name, value })
            })
            .collect()
    }

    fn eval_bound(&self, name: &str, bound: &Rc<Expr>) -> Result<i32> {
        let value = to_int(self.eval(bound)?).context(NonIntegerBoundSnafu { name })?;
        i32::try_from(value).ok().context(BoundOutOfRangeSnafu { name, value })
    }
}

fn to_int(value: ConstValue) -> Option<i64> {
    match value {
        ConstValue::Int(v) => Some(v),
        _ => None,
    }
}

fn to_float(value: ConstValue) -> Option<f64> {
    match value {
        ConstValue::Int(v) => Some(v as f64),
        ConstValue::Float(v) => Some(v),
        ConstValue::Bool(_) => None,
    }
}

fn eval_unary(op: UnaryOp, operand: ConstValue) -> Result<ConstValue> {
    match (op, operand) {
        (UnaryOp::Neg, ConstValue::Int(v)) => Ok(ConstValue::Int(v.wrapping_neg())),
        (UnaryOp::Neg, ConstValue::Float(v)) => Ok(ConstValue::Float(-v)),
        (UnaryOp::Not, ConstValue::Bool(v)) => Ok(ConstValue::Bool(!v)),
        _ => InvalidUnaryOperandSnafu { op }.fail(),
    }
}

fn eval_binary(op: BinaryOp, lhs: ConstValue, rhs: ConstValue) -> Result<ConstValue> {
    use ConstValue::{Bool, Int};

    match (op, lhs, rhs) {
        (BinaryOp::And, Bool(a), Bool(b)) => Ok(Bool(a && b)),
        (BinaryOp::Or, Bool(a), Bool(b)) => Ok(Bool(a || b)),
        (BinaryOp::Eq, Bool(a), Bool(b)) => Ok(Bool(a == b)),
        (BinaryOp::Ne, Bool(a), Bool(b)) => Ok(Bool(a != b)),
        (_, Int(a), Int(b)) => eval_int_binary(op, a, b),
        (_, lhs, rhs) => match (to_float(lhs), to_float(rhs)) {
            (Some(a), Some(b)) => eval_float_binary(op, a, b),
            _ => InvalidBinaryOperandsSnafu { op }.fail(),
        },
    }
}

fn eval_int_binary(op: BinaryOp, a: i64, b: i64) -> Result<ConstValue> {
    use ConstValue::{Bool, Int};

    Ok(match op {
        BinaryOp::Add => Int(a.wrapping_add(b)),
        BinaryOp::Sub => Int(a.wrapping_sub(b)),
        BinaryOp::Mul => Int(a.wrapping_mul(b)),
        BinaryOp::Div => {
            ensure!(b != 0, DivisionByZeroSnafu);
            Int(a / b)
        }
        BinaryOp::Mod => {
            ensure!(b != 0, DivisionByZeroSnafu);
            Int(a % b)
        }
        BinaryOp::Min => Int(a.min(b)),
        BinaryOp::Max => Int(a.max(b)),
        BinaryOp::Eq => Bool(a == b),
        BinaryOp::Ne => Bool(a != b),
        BinaryOp::Lt => Bool(a < b),
        BinaryOp::Le => Bool(a <= b),
        BinaryOp::And | BinaryOp::Or => return InvalidBinaryOperandsSnafu { op }.fail(),
    })
}

fn eval_float_binary(op: BinaryOp, a: f64, b: f64) -> Result<ConstValue> {
    use ConstValue::{Bool, Float};

    Ok(match op {
        BinaryOp::Add => Float(a + b),
        BinaryOp::Sub => Float(a - b),
        BinaryOp::Mul => Float(a * b),
        BinaryOp::Div => Float(a / b),
        BinaryOp::Mod => Float(a % b),
        BinaryOp::Min => Float(a.min(b)),
        BinaryOp::Max => Float(a.max(b)),
        BinaryOp::Eq => Bool(a == b),
        BinaryOp::Ne => Bool(a != b),
        BinaryOp::Lt => Bool(a < b),
        BinaryOp::Le => Bool(a <= b),
        BinaryOp::And | BinaryOp::Or => return InvalidBinaryOperandsSnafu { op }.fail(),
    })
}

fn element_ptr(buffer: &Buffer, pos: &[i32]) -> Result<(*mut u8, ScalarDType)> {
    let offset = buffer.element_offset(pos)?;
    let host = buffer.host_ptr()?;
    ensure!(!host.is_null(), UnallocatedHostSnafu { name: buffer.name()? });
    let dtype = buffer.dtype()?;
    let byte = offset * dtype.bytes() as isize;
    // In bounds: element_offset checked the coordinates against the
    // buffer's extents, and offsets are whole elements, so the pointer is
    // element-aligned within the host allocation.
    Ok((unsafe { host.offset(byte) }, dtype.scalar()))
}

fn load_element(buffer: &Buffer, pos: &[i32]) -> Result<ConstValue> {
    let (ptr, scalar) = element_ptr(buffer, pos)?;
    unsafe {
        match scalar {
            ScalarDType::Bool => Ok(ConstValue::Bool(*ptr != 0)),
            ScalarDType::Int32 => Ok(ConstValue::Int((*(ptr as *const i32)).into())),
            ScalarDType::Int64 => Ok(ConstValue::Int(*(ptr as *const i64))),
            ScalarDType::Float32 => Ok(ConstValue::Float((*(ptr as *const f32)).into())),
            ScalarDType::Float64 => Ok(ConstValue::Float(*(ptr as *const f64))),
            _ => UnsupportedEvalDTypeSnafu { dtype: DType::Scalar(scalar) }.fail(),
        }
    }
}

fn store_element(buffer: &Buffer, pos: &[i32], value: ConstValue) -> Result<()> {
    let (ptr, scalar) = element_ptr(buffer, pos)?;
    let mismatch = || ValueTypeMismatchSnafu { dtype: DType::Scalar(scalar) };
    unsafe {
        match scalar {
            ScalarDType::Bool => match value {
                ConstValue::Bool(v) => *ptr = v as u8,
                _ => return mismatch().fail(),
            },
            ScalarDType::Int32 => *(ptr as *mut i32) = to_int(value).with_context(mismatch)? as i32,
            ScalarDType::Int64 => *(ptr as *mut i64) = to_int(value).with_context(mismatch)?,
            ScalarDType::Float32 => *(ptr as *mut f32) = to_float(value).with_context(mismatch)? as f32,
            ScalarDType::Float64 => *(ptr as *mut f64) = to_float(value).with_context(mismatch)?,
            _ => return UnsupportedEvalDTypeSnafu { dtype: DType::Scalar(scalar) }.fail(),
        }
    }
    Ok(())
}
