use proptest::prelude::*;
use strum::VariantArray;

use crate::{DType, ScalarDType};

impl ScalarDType {
    pub fn generator() -> impl Strategy<Value = Self> {
        proptest::sample::select(Self::VARIANTS)
    }
}

impl DType {
    pub fn scalar_generator() -> impl Strategy<Value = Self> {
        ScalarDType::generator().prop_map(DType::Scalar)
    }

    pub fn vector_generator() -> impl Strategy<Value = Self> {
        (ScalarDType::generator(), 2usize..=16).prop_map(|(scalar, lanes)| DType::Vector { scalar, lanes })
    }
}
