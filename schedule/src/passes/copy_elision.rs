//! Copy elision pass.
//!
//! A stage whose entire definition is a pointwise, identity-indexed read
//! of one other function performs no computation; it only duplicates the
//! producer's storage. This pass finds such stages and rewrites the tree
//! so the copy never materializes: every former reader of the copy reads
//! the producer's storage directly, and the copy's realization and
//! produce sections are deleted.
//!
//! # Classification
//!
//! [`pointwise_copy_producer`] accepts a function only when every tuple
//! component is a pipeline call to the *same* producer, component `i`
//! reading component `i`, with the function's own free variables as call
//! arguments in definition order. Anything else, including functions
//! with update or extern definitions and partial-tuple copies, is not a
//! copy at all. Copying part of a tuple is rejected outright: aliasing
//! some components would leave the rest unaliased and unallocated.
//!
//! # Safety
//!
//! Eliding a pair is skipped, never a failure, when the rewrite could
//! change behavior:
//! - the consumer is read under a different device context than the one
//!   its producer was written in (the copy is a real data transfer);
//! - the consumer's storage is referenced opaquely (extern stages);
//! - producer and consumer realize different element types or
//!   incompatible bounds.
//!
//! Pairs are applied in realization order through a substitution map, so
//! chains (A copies B, B copies C) collapse onto the ultimate producer
//! regardless of where in the chain each pair sits.

use std::collections::{HashMap, HashSet};
use std::rc::Rc;

use itertools::Itertools;
use sluice_dtype::DType;
use sluice_ir::{
    Bound, CallKind, ConstValue, DeviceApi, Expr, Function, Mutator, Pipeline, Stmt, Visitor, mutate_expr_children,
    mutate_stmt_children, walk_expr, walk_stmt,
};
use smallvec::SmallVec;
use tracing::{debug, trace};

/// One elidable copy: `consumer`'s definition is a pointwise copy of
/// `producer`. The names are distinct, both present in the pipeline
/// graph, and a consumer appears in at most one pair.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CopyPair {
    /// Copied from.
    pub producer: String,
    /// Stored into.
    pub consumer: String,
}

/// If `function`'s operation only involves pointwise copy from another
/// function, return the name of the function it copies from.
///
/// For a tuple-valued function the whole tuple must be copied: every
/// component must read the same producer at the same component index,
/// and the arities must match. For a non-pointwise copy, or if the
/// function has update or extern definitions, return `None`.
pub fn pointwise_copy_producer(function: &Function, pipeline: &Pipeline) -> Option<String> {
    if function.has_update_definition() || function.has_extern_definition() {
        return None;
    }

    let mut producers = Vec::with_capacity(function.arity());
    for (component, value) in function.values().iter().enumerate() {
        let (callee, value_index, args) = value.as_pipeline_call()?;
        // Component i must read component i; shuffled or partially
        // copied tuples are not copies at all.
        if value_index != component || !is_identity_indexing(args, function.params()) {
            return None;
        }
        producers.push(callee);
    }

    let producer = *producers.first()?;
    if !producers.iter().all_equal() {
        return None;
    }

    let producer_function = pipeline.function(producer)?;
    if producer == function.name() || producer_function.arity() != function.arity() {
        return None;
    }
    Some(producer.to_owned())
}

/// Identity indexing: the call arguments are exactly the consumer's own
/// free variables, in definition order, one per dimension. No offset, no
/// reordering, no computation.
fn is_identity_indexing(args: &[Rc<Expr>], params: &[String]) -> bool {
    args.len() == params.len()
        && args.iter().zip(params).all(|(arg, param)| matches!(&**arg, Expr::Var(v) if v == param))
}

/// All pointwise-copy pairs over the pipeline's realization order.
///
/// One classifier run per function; chains are discovered per-function,
/// not transitively, and collapse when the pass applies the pairs.
pub fn pointwise_copies(pipeline: &Pipeline) -> Vec<CopyPair> {
    let mut pairs = Vec::new();
    for name in pipeline.order() {
        let Some(function) = pipeline.function(name) else { continue };
        if let Some(producer) = pointwise_copy_producer(function, pipeline) {
            trace!(producer = %producer, consumer = %name, "found pointwise copy");
            pairs.push(CopyPair { producer, consumer: name.clone() });
        }
    }
    pairs
}

/// Shape of one function's realization, recorded during the usage scan.
#[derive(Debug)]
struct RealizeInfo {
    types: SmallVec<[DType; 2]>,
    bounds: SmallVec<[Bound; 4]>,
}

/// Single walk over the tree collecting everything the eligibility
/// checks need: per-function read/write device contexts, opaque buffer
/// references, and realization shapes.
#[derive(Default)]
struct UsageScan {
    /// Innermost explicit device annotation; the tree root is host.
    context: Vec<DeviceApi>,
    writes: HashMap<String, HashSet<DeviceApi>>,
    reads: HashMap<String, HashSet<DeviceApi>>,
    opaque: HashSet<String>,
    realizations: HashMap<String, RealizeInfo>,
}

impl UsageScan {
    fn current(&self) -> DeviceApi {
        self.context.last().copied().unwrap_or(DeviceApi::Host)
    }
}

impl Visitor for UsageScan {
    fn visit_stmt(&mut self, stmt: &Rc<Stmt>) {
        match &**stmt {
            Stmt::For { device_api, .. } if *device_api != DeviceApi::None => {
                self.context.push(*device_api);
                walk_stmt(self, stmt);
                self.context.pop();
            }
            Stmt::Realize { name, types, bounds, .. } => {
                self.realizations.insert(name.clone(), RealizeInfo { types: types.clone(), bounds: bounds.clone() });
                walk_stmt(self, stmt);
            }
            Stmt::Provide { name, .. } => {
                let current = self.current();
                self.writes.entry(name.clone()).or_default().insert(current);
                walk_stmt(self, stmt);
            }
            _ => walk_stmt(self, stmt),
        }
    }

    fn visit_expr(&mut self, expr: &Rc<Expr>) {
        match &**expr {
            Expr::Call { name, kind: CallKind::Pipeline, .. } => {
                let current = self.current();
                self.reads.entry(name.clone()).or_default().insert(current);
            }
            Expr::BufferRef { name } => {
                self.opaque.insert(name.clone());
            }
            _ => {}
        }
        walk_expr(self, expr);
    }
}

/// Why one pair cannot be elided, or `None` when it can (bounds aside).
fn skip_reason(pair: &CopyPair, target: &str, pipeline: &Pipeline, scan: &UsageScan) -> Option<&'static str> {
    // A copy cycle (malformed input) would substitute a name onto itself.
    if target == pair.consumer {
        return Some("copy cycle");
    }
    // The classifier never emits such pairs; re-check before deleting.
    if pipeline.function(&pair.consumer).is_none_or(Function::has_update_definition) {
        return Some("consumer has an update definition");
    }
    if scan.opaque.contains(&pair.consumer) {
        return Some("consumer storage is referenced opaquely");
    }
    if !scan.realizations.contains_key(&pair.consumer) {
        return Some("consumer is never materialized");
    }
    let Some(target_realize) = scan.realizations.get(target) else {
        return Some("producer is never materialized");
    };
    if scan.realizations[&pair.consumer].types != target_realize.types {
        return Some("element types differ");
    }

    let Some(write_context) = single_context(scan.writes.get(target)) else {
        return Some("producer does not live under a single device context");
    };
    // A copy whose readers sit under a different device context than the
    // producer's storage is a real data transfer, not an alias.
    if scan.reads.get(&pair.consumer).is_some_and(|contexts| contexts.iter().any(|c| *c != write_context)) {
        return Some("consumer is read under a different device context");
    }
    None
}

fn single_context(contexts: Option<&HashSet<DeviceApi>>) -> Option<DeviceApi> {
    let mut iter = contexts?.iter();
    match (iter.next(), iter.next()) {
        (Some(context), None) => Some(*context),
        _ => None,
    }
}

fn const_bound(bound: &Bound) -> Option<(i64, i64)> {
    match (&*bound.min, &*bound.extent) {
        (Expr::Const(ConstValue::Int(min)), Expr::Const(ConstValue::Int(extent))) => Some((*min, *extent)),
        _ => None,
    }
}

/// Per-dimension union of two realization domains. Dimensions that are
/// structurally identical carry over; anything else must be constant so
/// the union can be computed. `None` means the bounds are incompatible.
fn union_bounds(a: &[Bound], b: &[Bound]) -> Option<SmallVec<[Bound; 4]>> {
    if a.len() != b.len() {
        return None;
    }
    a.iter()
        .zip(b)
        .map(|(a, b)| {
            if a == b {
                return Some(a.clone());
            }
            let (a_min, a_extent) = const_bound(a)?;
            let (b_min, b_extent) = const_bound(b)?;
            let min = a_min.min(b_min);
            let end = (a_min + a_extent).max(b_min + b_extent);
            Some(Bound::new(Expr::int(min), Expr::int(end - min)))
        })
        .collect()
}

/// The rewrites one elision run will apply.
#[derive(Default)]
struct ElisionPlan {
    /// Consumer name -> the storage its readers are redirected onto.
    substitutions: HashMap<String, String>,
    /// Expanded realization bounds, when a target's domain had to grow to
    /// cover an elided consumer's domain.
    bounds_override: HashMap<String, SmallVec<[Bound; 4]>>,
}

fn plan_rewrites(pairs: &[CopyPair], pipeline: &Pipeline, scan: &UsageScan) -> ElisionPlan {
    let mut plan = ElisionPlan::default();

    for pair in pairs {
        // Resolve through prior eliminations so a chain lands on the
        // ultimate producer no matter how it is ordered.
        let target = plan.substitutions.get(&pair.producer).cloned().unwrap_or_else(|| pair.producer.clone());

        if let Some(reason) = skip_reason(pair, &target, pipeline, scan) {
            debug!(producer = %pair.producer, consumer = %pair.consumer, reason, "skipping copy elision");
            continue;
        }

        // Resolve any min-offset difference between the two iteration
        // domains before rewriting: grow the target's realization to the
        // union, then reads carry over at the same indices.
        let consumer_bounds = &scan.realizations[&pair.consumer].bounds;
        let target_bounds =
            plan.bounds_override.get(&target).cloned().unwrap_or_else(|| scan.realizations[&target].bounds.clone());
        let Some(union) = union_bounds(&target_bounds, consumer_bounds) else {
            debug!(
                producer = %pair.producer,
                consumer = %pair.consumer,
                reason = "realization bounds are incompatible",
                "skipping copy elision"
            );
            continue;
        };
        if union != target_bounds {
            plan.bounds_override.insert(target.clone(), union);
        }

        trace!(consumer = %pair.consumer, target = %target, "eliding pointwise copy");
        plan.substitutions.insert(pair.consumer.clone(), target);
    }

    plan
}

/// Applies an [`ElisionPlan`]: redirects reads, deletes the elided
/// consumers' produce sections and realizations, and sweeps the no-ops
/// that deletion leaves behind in blocks.
struct CopyElision {
    plan: ElisionPlan,
}

impl Mutator for CopyElision {
    fn mutate_stmt(&mut self, stmt: &Rc<Stmt>) -> Rc<Stmt> {
        match &**stmt {
            // The consumer's storage never materializes: splice the body.
            Stmt::Realize { name, body, .. } if self.plan.substitutions.contains_key(name) => self.mutate_stmt(body),
            Stmt::Realize { name, types, body, .. } if self.plan.bounds_override.contains_key(name) => {
                let body = self.mutate_stmt(body);
                Rc::new(Stmt::Realize {
                    name: name.clone(),
                    types: types.clone(),
                    bounds: self.plan.bounds_override[name].clone(),
                    body,
                })
            }
            // The statements that would have produced the copy.
            Stmt::Produce { name, .. } if self.plan.substitutions.contains_key(name) => Stmt::no_op(),
            Stmt::Block { stmts } => {
                let rebuilt: Vec<Rc<Stmt>> = stmts
                    .iter()
                    .map(|s| (s, self.mutate_stmt(s)))
                    // Sweep statements that deletion just turned into
                    // no-ops; pre-existing no-ops stay put.
                    .filter(|(original, mutated)| !mutated.is_no_op() || original.is_no_op())
                    .map(|(_, mutated)| mutated)
                    .collect();
                let unchanged =
                    rebuilt.len() == stmts.len() && rebuilt.iter().zip(stmts).all(|(a, b)| Rc::ptr_eq(a, b));
                if unchanged { stmt.clone() } else { Stmt::block(rebuilt) }
            }
            _ => mutate_stmt_children(self, stmt),
        }
    }

    fn mutate_expr(&mut self, expr: &Rc<Expr>) -> Rc<Expr> {
        if let Expr::Call { name, kind: CallKind::Pipeline, value_index, args } = &**expr
            && let Some(target) = self.plan.substitutions.get(name)
        {
            // Identity-indexed copy: the same indices and the same tuple
            // component address the producer's storage directly.
            let target = target.clone();
            let args: SmallVec<[Rc<Expr>; 4]> = args.iter().map(|a| self.mutate_expr(a)).collect();
            return Expr::call(target, CallKind::Pipeline, *value_index, args);
        }
        mutate_expr_children(self, expr)
    }
}

/// Remove pointwise-copy stages from a lowered pipeline tree.
///
/// The returned tree computes the same externally observable values with
/// one buffer fewer materialized per elided pair. The pass never fails:
/// any pair that cannot be proven safe is left untouched, which only
/// costs a redundant copy at run time.
pub fn copy_elision(stmt: &Rc<Stmt>, pipeline: &Pipeline) -> Rc<Stmt> {
    let pairs = pointwise_copies(pipeline);
    if pairs.is_empty() {
        return stmt.clone();
    }

    let mut scan = UsageScan::default();
    scan.visit_stmt(stmt);

    let plan = plan_rewrites(&pairs, pipeline, &scan);
    if plan.substitutions.is_empty() {
        return stmt.clone();
    }

    debug!(elided = plan.substitutions.len(), "eliding pointwise copies");
    CopyElision { plan }.mutate_stmt(stmt)
}
