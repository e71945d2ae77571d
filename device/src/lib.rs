//! Buffer runtime for the sluice compiler.
//!
//! This crate is the shared vocabulary between the optimizer and generated
//! code: a reference-counted handle over an up-to-4-dimensional array with
//! independent host- and device-side dirty bits, and the fixed-layout
//! descriptor that crosses the boundary into compiled entry points.
//!
//! # Module Organization
//!
//! - [`size`] - Overflow-checked size arithmetic
//! - [`raw`] - The fixed-layout [`RawBuffer`] ABI descriptor
//! - [`module`] - Backend synchronization hooks ([`DeviceSync`], [`CompiledModule`])
//! - [`buffer`] - The reference-counted [`Buffer`] handle and its lifecycle
//! - [`argument`] - Conversion to pipeline-argument descriptors
//! - [`error`] - Error types and result handling

pub mod argument;
pub mod buffer;
pub mod error;
pub mod module;
pub mod raw;
pub mod size;

#[cfg(test)]
pub mod test;

pub use argument::{Argument, ArgumentKind};
pub use buffer::Buffer;
pub use error::{Error, Result};
pub use module::{CompiledModule, DeviceSync, HostSync};
pub use raw::RawBuffer;
pub use size::{checked_multiply, checked_multiply_assert};

// Re-export external types for convenience
pub use sluice_dtype::{DType, ScalarDType};
