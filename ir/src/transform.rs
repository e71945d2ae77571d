//! Tree mutator/visitor infrastructure.
//!
//! Passes override the node cases they care about and fall through to the
//! `walk_*`/`mutate_*_children` helpers for everything else. Mutation is
//! sparing with allocation: a node is rebuilt only when one of its
//! children actually changed, so untouched subtrees keep their identity.

use std::rc::Rc;

use crate::expr::Expr;
use crate::stmt::{Bound, Stmt};

/// Read-only traversal over statements and expressions.
pub trait Visitor {
    fn visit_stmt(&mut self, stmt: &Rc<Stmt>) {
        walk_stmt(self, stmt);
    }

    fn visit_expr(&mut self, expr: &Rc<Expr>) {
        walk_expr(self, expr);
    }
}

/// Visit every child of `stmt`.
pub fn walk_stmt<V: Visitor + ?Sized>(visitor: &mut V, stmt: &Rc<Stmt>) {
    match &**stmt {
        Stmt::Block { stmts } => {
            for s in stmts {
                visitor.visit_stmt(s);
            }
        }
        Stmt::For { min, extent, body, .. } => {
            visitor.visit_expr(min);
            visitor.visit_expr(extent);
            visitor.visit_stmt(body);
        }
        Stmt::Realize { bounds, body, .. } => {
            for bound in bounds {
                visitor.visit_expr(&bound.min);
                visitor.visit_expr(&bound.extent);
            }
            visitor.visit_stmt(body);
        }
        Stmt::Produce { body, .. } => visitor.visit_stmt(body),
        Stmt::Provide { values, indices, .. } => {
            for value in values {
                visitor.visit_expr(value);
            }
            for index in indices {
                visitor.visit_expr(index);
            }
        }
        Stmt::IfThenElse { condition, then_case, else_case } => {
            visitor.visit_expr(condition);
            visitor.visit_stmt(then_case);
            if let Some(else_case) = else_case {
                visitor.visit_stmt(else_case);
            }
        }
        Stmt::Evaluate { value } => visitor.visit_expr(value),
    }
}

/// Visit every child of `expr`.
pub fn walk_expr<V: Visitor + ?Sized>(visitor: &mut V, expr: &Rc<Expr>) {
    match &**expr {
        Expr::Const(_) | Expr::Var(_) | Expr::BufferRef { .. } => {}
        Expr::Unary(_, operand) => visitor.visit_expr(operand),
        Expr::Binary(_, lhs, rhs) => {
            visitor.visit_expr(lhs);
            visitor.visit_expr(rhs);
        }
        Expr::Call { args, .. } => {
            for arg in args {
                visitor.visit_expr(arg);
            }
        }
    }
}

/// Rewriting traversal over statements and expressions.
pub trait Mutator {
    fn mutate_stmt(&mut self, stmt: &Rc<Stmt>) -> Rc<Stmt> {
        mutate_stmt_children(self, stmt)
    }

    fn mutate_expr(&mut self, expr: &Rc<Expr>) -> Rc<Expr> {
        mutate_expr_children(self, expr)
    }
}

fn all_same<T>(old: &[Rc<T>], new: &[Rc<T>]) -> bool {
    old.len() == new.len() && old.iter().zip(new).all(|(a, b)| Rc::ptr_eq(a, b))
}

/// Rebuild `stmt` from mutated children, reusing the node when nothing
/// changed.
pub fn mutate_stmt_children<M: Mutator + ?Sized>(mutator: &mut M, stmt: &Rc<Stmt>) -> Rc<Stmt> {
    match &**stmt {
        Stmt::Block { stmts } => {
            let new: Vec<Rc<Stmt>> = stmts.iter().map(|s| mutator.mutate_stmt(s)).collect();
            if all_same(stmts, &new) { stmt.clone() } else { Rc::new(Stmt::Block { stmts: new }) }
        }
        Stmt::For { var, min, extent, device_api, body } => {
            let new_min = mutator.mutate_expr(min);
            let new_extent = mutator.mutate_expr(extent);
            let new_body = mutator.mutate_stmt(body);
            if Rc::ptr_eq(min, &new_min) && Rc::ptr_eq(extent, &new_extent) && Rc::ptr_eq(body, &new_body) {
                stmt.clone()
            } else {
                Rc::new(Stmt::For {
                    var: var.clone(),
                    min: new_min,
                    extent: new_extent,
                    device_api: *device_api,
                    body: new_body,
                })
            }
        }
        Stmt::Realize { name, types, bounds, body } => {
            let new_bounds: Vec<Bound> = bounds
                .iter()
                .map(|b| Bound::new(mutator.mutate_expr(&b.min), mutator.mutate_expr(&b.extent)))
                .collect();
            let new_body = mutator.mutate_stmt(body);
            let bounds_same = bounds
                .iter()
                .zip(&new_bounds)
                .all(|(a, b)| Rc::ptr_eq(&a.min, &b.min) && Rc::ptr_eq(&a.extent, &b.extent));
            if bounds_same && Rc::ptr_eq(body, &new_body) {
                stmt.clone()
            } else {
                Rc::new(Stmt::Realize {
                    name: name.clone(),
                    types: types.clone(),
                    bounds: new_bounds.into_iter().collect(),
                    body: new_body,
                })
            }
        }
        Stmt::Produce { name, body } => {
            let new_body = mutator.mutate_stmt(body);
            if Rc::ptr_eq(body, &new_body) {
                stmt.clone()
            } else {
                Rc::new(Stmt::Produce { name: name.clone(), body: new_body })
            }
        }
        Stmt::Provide { name, values, indices } => {
            let new_values: Vec<Rc<Expr>> = values.iter().map(|v| mutator.mutate_expr(v)).collect();
            let new_indices: Vec<Rc<Expr>> = indices.iter().map(|i| mutator.mutate_expr(i)).collect();
            if all_same(values, &new_values) && all_same(indices, &new_indices) {
                stmt.clone()
            } else {
                Rc::new(Stmt::Provide {
                    name: name.clone(),
                    values: new_values.into_iter().collect(),
                    indices: new_indices.into_iter().collect(),
                })
            }
        }
        Stmt::IfThenElse { condition, then_case, else_case } => {
            let new_condition = mutator.mutate_expr(condition);
            let new_then = mutator.mutate_stmt(then_case);
            let new_else = else_case.as_ref().map(|e| mutator.mutate_stmt(e));
            let else_same = match (else_case, &new_else) {
                (Some(a), Some(b)) => Rc::ptr_eq(a, b),
                (None, None) => true,
                _ => false,
            };
            if Rc::ptr_eq(condition, &new_condition) && Rc::ptr_eq(then_case, &new_then) && else_same {
                stmt.clone()
            } else {
                Rc::new(Stmt::IfThenElse { condition: new_condition, then_case: new_then, else_case: new_else })
            }
        }
        Stmt::Evaluate { value } => {
            let new_value = mutator.mutate_expr(value);
            if Rc::ptr_eq(value, &new_value) { stmt.clone() } else { Rc::new(Stmt::Evaluate { value: new_value }) }
        }
    }
}

/// Rebuild `expr` from mutated children, reusing the node when nothing
/// changed.
pub fn mutate_expr_children<M: Mutator + ?Sized>(mutator: &mut M, expr: &Rc<Expr>) -> Rc<Expr> {
    match &**expr {
        Expr::Const(_) | Expr::Var(_) | Expr::BufferRef { .. } => expr.clone(),
        Expr::Unary(op, operand) => {
            let new_operand = mutator.mutate_expr(operand);
            if Rc::ptr_eq(operand, &new_operand) { expr.clone() } else { Rc::new(Expr::Unary(*op, new_operand)) }
        }
        Expr::Binary(op, lhs, rhs) => {
            let new_lhs = mutator.mutate_expr(lhs);
            let new_rhs = mutator.mutate_expr(rhs);
            if Rc::ptr_eq(lhs, &new_lhs) && Rc::ptr_eq(rhs, &new_rhs) {
                expr.clone()
            } else {
                Rc::new(Expr::Binary(*op, new_lhs, new_rhs))
            }
        }
        Expr::Call { name, kind, value_index, args } => {
            let new_args: Vec<Rc<Expr>> = args.iter().map(|a| mutator.mutate_expr(a)).collect();
            if all_same(args, &new_args) {
                expr.clone()
            } else {
                Rc::new(Expr::Call {
                    name: name.clone(),
                    kind: *kind,
                    value_index: *value_index,
                    args: new_args.into_iter().collect(),
                })
            }
        }
    }
}
