//! Pipeline tree transformation passes.
//!
//! # Passes
//!
//! - [`copy_elision`] - Alias pointwise-copy stages onto their producer's
//!   storage so the copy never materializes
//!
//! These passes run after lowering and before code generation.

pub mod copy_elision;
