//! Statement nodes of the lowered tree.

use std::rc::Rc;

use sluice_dtype::DType;
use smallvec::SmallVec;

use crate::expr::Expr;

/// The execution domain a loop's iterations run under.
///
/// `None` inherits the enclosing scope's domain; the tree root runs on
/// the host. Crossing domains requires real data movement, which is why
/// passes track the current domain while walking.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum DeviceApi {
    /// Inherit the enclosing scope's device API.
    None,
    Host,
    Cuda,
    OpenCl,
    Metal,
}

/// One dimension of a realization: `[min, min + extent)`.
#[derive(Debug, Clone, PartialEq)]
pub struct Bound {
    pub min: Rc<Expr>,
    pub extent: Rc<Expr>,
}

impl Bound {
    pub fn new(min: Rc<Expr>, extent: Rc<Expr>) -> Self {
        Self { min, extent }
    }
}

/// Statement node.
#[derive(Debug, Clone, PartialEq)]
pub enum Stmt {
    /// Statements executed in sequence.
    Block {
        stmts: Vec<Rc<Stmt>>,
    },
    For {
        var: String,
        min: Rc<Expr>,
        extent: Rc<Expr>,
        device_api: DeviceApi,
        body: Rc<Stmt>,
    },
    /// Storage for one function over the given bounds, one element type
    /// per tuple component, live for the duration of `body`.
    Realize {
        name: String,
        types: SmallVec<[DType; 2]>,
        bounds: SmallVec<[Bound; 4]>,
        body: Rc<Stmt>,
    },
    /// Marks the statements that define `name`'s storage.
    Produce {
        name: String,
        body: Rc<Stmt>,
    },
    /// Multi-dimensional store: `name[indices...] = values`, one value
    /// per tuple component.
    Provide {
        name: String,
        values: SmallVec<[Rc<Expr>; 2]>,
        indices: SmallVec<[Rc<Expr>; 4]>,
    },
    IfThenElse {
        condition: Rc<Expr>,
        then_case: Rc<Stmt>,
        else_case: Option<Rc<Stmt>>,
    },
    /// Evaluate an expression for its effect, discarding the value.
    Evaluate {
        value: Rc<Expr>,
    },
}

impl Stmt {
    pub fn block(stmts: impl IntoIterator<Item = Rc<Stmt>>) -> Rc<Stmt> {
        Rc::new(Stmt::Block { stmts: stmts.into_iter().collect() })
    }

    pub fn for_loop(
        var: impl Into<String>,
        min: Rc<Expr>,
        extent: Rc<Expr>,
        device_api: DeviceApi,
        body: Rc<Stmt>,
    ) -> Rc<Stmt> {
        Rc::new(Stmt::For { var: var.into(), min, extent, device_api, body })
    }

    pub fn realize(
        name: impl Into<String>,
        types: impl IntoIterator<Item = DType>,
        bounds: impl IntoIterator<Item = Bound>,
        body: Rc<Stmt>,
    ) -> Rc<Stmt> {
        Rc::new(Stmt::Realize {
            name: name.into(),
            types: types.into_iter().collect(),
            bounds: bounds.into_iter().collect(),
            body,
        })
    }

    pub fn produce(name: impl Into<String>, body: Rc<Stmt>) -> Rc<Stmt> {
        Rc::new(Stmt::Produce { name: name.into(), body })
    }

    pub fn provide(
        name: impl Into<String>,
        values: impl IntoIterator<Item = Rc<Expr>>,
        indices: impl IntoIterator<Item = Rc<Expr>>,
    ) -> Rc<Stmt> {
        Rc::new(Stmt::Provide {
            name: name.into(),
            values: values.into_iter().collect(),
            indices: indices.into_iter().collect(),
        })
    }

    pub fn if_then_else(condition: Rc<Expr>, then_case: Rc<Stmt>, else_case: Option<Rc<Stmt>>) -> Rc<Stmt> {
        Rc::new(Stmt::IfThenElse { condition, then_case, else_case })
    }

    pub fn evaluate(value: Rc<Expr>) -> Rc<Stmt> {
        Rc::new(Stmt::Evaluate { value })
    }

    /// An empty statement.
    pub fn no_op() -> Rc<Stmt> {
        Stmt::evaluate(Expr::int(0))
    }

    pub fn is_no_op(&self) -> bool {
        matches!(self, Stmt::Evaluate { value } if value.is_const_zero())
    }
}
