//! Per-function definition records.

use std::rc::Rc;

use sluice_dtype::DType;
use smallvec::SmallVec;

use crate::expr::Expr;

/// The front end's record of one pipeline function.
///
/// A function defines an array value pointwise: `params` are the free
/// variables of the pure definition (one per dimension, in order), and
/// `values` hold one expression per tuple component. The two flags mark
/// definitions this core treats as opaque: a function with an update or
/// extern definition can never participate in copy elision, on either
/// side of a pair.
#[derive(Debug, Clone, PartialEq)]
pub struct Function {
    name: String,
    params: Vec<String>,
    values: SmallVec<[Rc<Expr>; 2]>,
    value_types: SmallVec<[DType; 2]>,
    has_update_definition: bool,
    has_extern_definition: bool,
}

impl Function {
    pub fn new(
        name: impl Into<String>,
        params: impl IntoIterator<Item = String>,
        values: impl IntoIterator<Item = Rc<Expr>>,
        value_types: impl IntoIterator<Item = DType>,
    ) -> Self {
        let values: SmallVec<[Rc<Expr>; 2]> = values.into_iter().collect();
        let value_types: SmallVec<[DType; 2]> = value_types.into_iter().collect();
        assert_eq!(values.len(), value_types.len(), "one value type per tuple component");
        Self {
            name: name.into(),
            params: params.into_iter().collect(),
            values,
            value_types,
            has_update_definition: false,
            has_extern_definition: false,
        }
    }

    pub fn with_update_definition(mut self) -> Self {
        self.has_update_definition = true;
        self
    }

    pub fn with_extern_definition(mut self) -> Self {
        self.has_extern_definition = true;
        self
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn params(&self) -> &[String] {
        &self.params
    }

    pub fn values(&self) -> &[Rc<Expr>] {
        &self.values
    }

    pub fn value_types(&self) -> &[DType] {
        &self.value_types
    }

    /// Number of tuple components (1 for a scalar-valued function).
    pub fn arity(&self) -> usize {
        self.values.len()
    }

    pub fn has_update_definition(&self) -> bool {
        self.has_update_definition
    }

    pub fn has_extern_definition(&self) -> bool {
        self.has_extern_definition
    }
}
