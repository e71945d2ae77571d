//! Optimization passes over lowered sluice pipeline trees.
//!
//! Passes run once, synchronously, during the single-threaded compilation
//! phase, between lowering and code generation. Each pass is
//! correctness-preserving: skipping a rewrite is always legal and only
//! costs run-time work, never changes observable values.
//!
//! # Module Organization
//!
//! - [`passes`] - The pass implementations

pub mod passes;

#[cfg(test)]
pub mod test;

pub use passes::copy_elision::{CopyPair, copy_elision, pointwise_copies, pointwise_copy_producer};
