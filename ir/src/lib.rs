//! Lowered statement tree and pipeline graph for the sluice compiler.
//!
//! After the front end builds function definitions and the scheduler fixes
//! a realization order, the pipeline is lowered into the statement tree
//! defined here. Optimization passes rewrite that tree; the evaluator runs
//! it directly against buffers for the embedded execution mode.
//!
//! # Module Organization
//!
//! - [`expr`] - Expression nodes (constants, variables, calls)
//! - [`stmt`] - Statement nodes (loops, realizations, stores)
//! - [`function`] - Per-function definition records
//! - [`pipeline`] - The read-only pipeline graph: env + realization order
//! - [`transform`] - Tree mutator/visitor infrastructure
//! - [`eval`] - Host evaluation of lowered trees against buffers
//! - [`error`] - Error types and result handling

pub mod error;
pub mod eval;
pub mod expr;
pub mod function;
pub mod pipeline;
pub mod stmt;
pub mod transform;

#[cfg(test)]
pub mod test;

pub use error::{Error, Result};
pub use eval::Evaluator;
pub use expr::{BinaryOp, CallKind, ConstValue, Expr, UnaryOp};
pub use function::Function;
pub use pipeline::Pipeline;
pub use stmt::{Bound, DeviceApi, Stmt};
pub use transform::{Mutator, Visitor, mutate_expr_children, mutate_stmt_children, walk_expr, walk_stmt};

// Re-export external types for convenience
pub use sluice_dtype::{DType, ScalarDType};
