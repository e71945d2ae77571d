//! Element type definitions for the sluice compiler.
//!
//! Buffers and pipeline values carry a [`DType`] describing their element
//! layout. A scalar type is one machine value; a vector type is `lanes`
//! adjacent scalars. The buffer runtime only accepts scalar element types
//! (one element per logical cell), so `lanes > 1` exists here mainly to be
//! rejected at that boundary.

use std::fmt;

#[cfg(any(test, feature = "proptest"))]
mod proptest_gen;

/// Scalar data types (base numeric types).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
#[derive(strum::EnumCount, strum::EnumIter, strum::VariantArray)]
#[cfg_attr(any(test, feature = "proptest"), derive(proptest_derive::Arbitrary))]
pub enum ScalarDType {
    Bool,

    Int8,
    UInt8,
    Int16,
    UInt16,
    Int32,
    UInt32,
    Int64,
    UInt64,

    Float16,
    BFloat16,
    Float32,
    Float64,
}

impl ScalarDType {
    /// Width of one value in bytes.
    pub const fn bytes(&self) -> usize {
        match self {
            Self::Bool | Self::Int8 | Self::UInt8 => 1,
            Self::Int16 | Self::UInt16 | Self::Float16 | Self::BFloat16 => 2,
            Self::Int32 | Self::UInt32 | Self::Float32 => 4,
            Self::Int64 | Self::UInt64 | Self::Float64 => 8,
        }
    }

    pub const fn is_bool(&self) -> bool {
        matches!(self, Self::Bool)
    }

    pub const fn is_signed(&self) -> bool {
        matches!(self, Self::Int8 | Self::Int16 | Self::Int32 | Self::Int64)
    }

    pub const fn is_unsigned(&self) -> bool {
        matches!(self, Self::UInt8 | Self::UInt16 | Self::UInt32 | Self::UInt64)
    }

    pub const fn is_int(&self) -> bool {
        self.is_signed() || self.is_unsigned()
    }

    pub const fn is_float(&self) -> bool {
        matches!(self, Self::Float16 | Self::BFloat16 | Self::Float32 | Self::Float64)
    }

    const fn name(&self) -> &'static str {
        match self {
            Self::Bool => "bool",
            Self::Int8 => "int8",
            Self::UInt8 => "uint8",
            Self::Int16 => "int16",
            Self::UInt16 => "uint16",
            Self::Int32 => "int32",
            Self::UInt32 => "uint32",
            Self::Int64 => "int64",
            Self::UInt64 => "uint64",
            Self::Float16 => "float16",
            Self::BFloat16 => "bfloat16",
            Self::Float32 => "float32",
            Self::Float64 => "float64",
        }
    }
}

impl fmt::Display for ScalarDType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

/// Data type of a buffer element or pipeline value.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum DType {
    /// Scalar type (single value).
    Scalar(ScalarDType),

    /// Vector type (SIMD), `lanes` adjacent scalars.
    Vector { scalar: ScalarDType, lanes: usize },
}

impl DType {
    /// Width of one element in bytes (scalar width times lane count).
    pub const fn bytes(&self) -> usize {
        match self {
            Self::Scalar(s) => s.bytes(),
            Self::Vector { scalar, lanes } => scalar.bytes() * *lanes,
        }
    }

    /// Number of lanes: 1 for scalars.
    pub const fn lanes(&self) -> usize {
        match self {
            Self::Scalar(_) => 1,
            Self::Vector { lanes, .. } => *lanes,
        }
    }

    /// The underlying scalar type.
    pub const fn scalar(&self) -> ScalarDType {
        match self {
            Self::Scalar(s) => *s,
            Self::Vector { scalar, .. } => *scalar,
        }
    }

    pub const fn is_float(&self) -> bool {
        self.scalar().is_float()
    }

    pub const fn is_int(&self) -> bool {
        self.scalar().is_int()
    }

    /// Vector type with the same scalar and the given lane count.
    pub const fn with_lanes(&self, lanes: usize) -> DType {
        if lanes == 1 { DType::Scalar(self.scalar()) } else { DType::Vector { scalar: self.scalar(), lanes } }
    }
}

impl From<ScalarDType> for DType {
    fn from(scalar: ScalarDType) -> Self {
        Self::Scalar(scalar)
    }
}

impl fmt::Display for DType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Scalar(s) => write!(f, "{s}"),
            Self::Vector { scalar, lanes } => write!(f, "{scalar}x{lanes}"),
        }
    }
}
