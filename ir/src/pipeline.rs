//! The read-only pipeline graph.

use std::collections::HashMap;

use snafu::ensure;

use crate::error::{DuplicateFunctionSnafu, DuplicateInOrderSnafu, Result, UnknownFunctionInOrderSnafu};
use crate::function::Function;

/// The set of named functions and their fixed realization order forming
/// one compiled program.
///
/// Built once by the caller and only ever queried by this core: the
/// classifier and the elision pass read function definitions and walk
/// the order, but never mutate either.
#[derive(Debug, Clone)]
pub struct Pipeline {
    env: HashMap<String, Function>,
    order: Vec<String>,
}

impl Pipeline {
    /// Build a pipeline graph, validating that the realization order
    /// names each function at most once and only names known functions.
    pub fn new(functions: impl IntoIterator<Item = Function>, order: Vec<String>) -> Result<Self> {
        let mut env = HashMap::new();
        for function in functions {
            let name = function.name().to_owned();
            ensure!(env.insert(name.clone(), function).is_none(), DuplicateFunctionSnafu { name });
        }
        let mut seen = std::collections::HashSet::new();
        for name in &order {
            ensure!(env.contains_key(name), UnknownFunctionInOrderSnafu { name });
            ensure!(seen.insert(name), DuplicateInOrderSnafu { name });
        }
        Ok(Self { env, order })
    }

    pub fn function(&self, name: &str) -> Option<&Function> {
        self.env.get(name)
    }

    pub fn contains(&self, name: &str) -> bool {
        self.env.contains_key(name)
    }

    /// The fixed realization order, producers before their consumers.
    pub fn order(&self) -> &[String] {
        &self.order
    }

    pub fn functions(&self) -> impl Iterator<Item = &Function> {
        self.env.values()
    }
}
