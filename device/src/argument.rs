//! Conversion to pipeline-argument descriptors.
//!
//! Compiled entry points take a flat signature of scalar and buffer
//! parameters; an [`Argument`] records the name, kind, and element type
//! of one slot so callers can assemble the signature without the
//! backend's help.

use sluice_dtype::DType;

use crate::buffer::Buffer;
use crate::error::Result;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ArgumentKind {
    /// The slot takes a buffer descriptor.
    Buffer,
    /// The slot takes a scalar value.
    Scalar,
}

/// One parameter of a compiled entry point's signature.
#[derive(Debug, Clone, PartialEq)]
pub struct Argument {
    pub name: String,
    pub kind: ArgumentKind,
    pub dtype: DType,
}

impl Argument {
    pub fn buffer(name: impl Into<String>, dtype: DType) -> Self {
        Self { name: name.into(), kind: ArgumentKind::Buffer, dtype }
    }

    pub fn scalar(name: impl Into<String>, dtype: DType) -> Self {
        Self { name: name.into(), kind: ArgumentKind::Scalar, dtype }
    }

    pub fn is_buffer(&self) -> bool {
        self.kind == ArgumentKind::Buffer
    }
}

impl Buffer {
    /// The buffer-typed argument slot this buffer binds to.
    pub fn as_argument(&self) -> Result<Argument> {
        Ok(Argument::buffer(self.name()?, self.dtype()?))
    }
}
