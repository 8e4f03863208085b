//! Verification Target Engine
//!
//! Collects `(scope, kind, from, constraints, error-id-expr)` triples
//! (spec §3 `Verification Target`) as the rest of the encoder discovers
//! them, generates the arithmetic/array/assert target conditions of spec
//! §4.5, allocates the per-site error ids of spec §3 invariant "Error
//! ids... unique per target-site and never zero," and — once traversal is
//! complete — expands `Assert` targets into the one-query-per-assertion-site
//! form spec §4.6 requires.

use crate::ast::{BinaryOp, NodeId, Type};
use crate::call_graph::{Callee, CallGraph, FunctionAssertions};
use crate::diagnostics::error_ids;
use crate::term::Term;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;

#[derive(Copy, Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub enum TargetKind {
    Assert,
    Underflow,
    Overflow,
    UnderOverflow,
    DivByZero,
    PopEmptyArray,
}

impl TargetKind {
    pub fn category_error_id(self) -> u32 {
        match self {
            TargetKind::Assert => error_ids::ASSERT,
            TargetKind::Underflow => error_ids::UNDERFLOW,
            TargetKind::Overflow | TargetKind::UnderOverflow => error_ids::OVERFLOW,
            TargetKind::DivByZero => error_ids::DIV_BY_ZERO,
            TargetKind::PopEmptyArray => error_ids::POP_EMPTY_ARRAY,
        }
    }
}

#[derive(Copy, Clone, Debug, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct TargetId(pub u32);

/// One `(scope, kind, from, constraints, error-id-expr)` triple (spec §3).
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct VerificationTarget {
    pub id: TargetId,
    pub scope: Callee,
    pub kind: TargetKind,
    pub node: NodeId,
    pub from: Term,
    pub constraints: Term,
    pub error_id_expr: Term,
    /// Unique, nonzero per-site id bound into the CHC encoding (distinct
    /// from `TargetKind::category_error_id`, which is the stable
    /// diagnostic code reported to the user).
    pub site_error_id: u32,
}

/// A fully resolved query, ready for spec §4.6 step 2
/// (`from ∧ constraints ∧ (error-id-expr = target-error-id) ⇒ error`).
/// Most targets produce exactly one; a public function's root `Assert`
/// target expands into one per reachable assertion site.
#[derive(Clone, Debug)]
pub struct TargetQuery {
    pub name: String,
    pub kind: TargetKind,
    pub origin_node: NodeId,
    pub from: Term,
    pub constraints: Term,
    pub error_id_expr: Term,
    pub site_error_id: u32,
}

/// Allocates strictly increasing, nonzero error ids (spec §3 invariant,
/// spec §8 "Error ids registered via `newErrorId` are unique and nonzero").
#[derive(Default)]
pub struct ErrorIdAllocator(u32);

impl ErrorIdAllocator {
    pub fn next(&mut self) -> u32 {
        self.0 += 1;
        self.0
    }
}

#[derive(Default)]
pub struct TargetEngine {
    ids: ErrorIdAllocator,
    next_target_id: u32,
    targets: Vec<VerificationTarget>,
    by_site: HashMap<(Callee, NodeId), Vec<TargetId>>,
    /// Root-level `Assert` targets registered at a public function's
    /// `interface-pre ⇒ interface(C)` exit (spec §4.3 non-constructor
    /// exit); expanded by `finalize_assert_roots`.
    assert_roots: Vec<(Callee, Term, Term)>,
}

impl TargetEngine {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn reset(&mut self) {
        *self = Self::default();
    }

    pub fn new_error_id(&mut self) -> u32 {
        self.ids.next()
    }

    pub fn register(
        &mut self,
        scope: Callee,
        kind: TargetKind,
        node: NodeId,
        from: Term,
        constraints: Term,
        error_id_expr: Term,
        site_error_id: u32,
    ) -> TargetId {
        let id = TargetId(self.next_target_id);
        self.next_target_id += 1;
        self.by_site.entry((scope, node)).or_default().push(id);
        self.targets.push(VerificationTarget { id, scope, kind, node, from, constraints, error_id_expr, site_error_id });
        id
    }

    /// Record a public function's transaction-level assert obligation
    /// (spec §4.3): `from = interface-pre`, `constraints = summary(f)`.
    /// Expanded into concrete per-assertion-site queries by
    /// `finalize_assert_roots`.
    pub fn register_assert_root(&mut self, scope: Callee, interface_pre: Term, summary_applied: Term) {
        self.assert_roots.push((scope, interface_pre, summary_applied));
    }

    pub fn targets(&self) -> &[VerificationTarget] {
        &self.targets
    }

    /// Non-`Assert` targets map 1:1 onto a query; `Assert` targets are
    /// aggregated separately by `finalize_assert_roots` and must not be
    /// double-queried here.
    pub fn direct_queries(&self) -> Vec<TargetQuery> {
        self.targets
            .iter()
            .filter(|t| t.kind != TargetKind::Assert)
            .map(|t| TargetQuery {
                name: format!("target_{}_{:?}", t.id.0, t.kind),
                kind: t.kind,
                origin_node: t.node,
                from: t.from.clone(),
                constraints: t.constraints.clone(),
                error_id_expr: t.error_id_expr.clone(),
                site_error_id: t.site_error_id,
            })
            .collect()
    }

    /// Expand every registered root into one query per assertion site BFS-
    /// reachable from its scope (spec §4.6): the root's own `(from,
    /// constraints)` stand in for "this transaction occurred and reached
    /// `f`'s exit"; each reachable `assert` site contributes its own
    /// already-computed `constraints`/`error_id_expr`/`site_error_id`.
    pub fn finalize_assert_roots(&self, call_graph: &CallGraph, assertions: &FunctionAssertions) -> Vec<TargetQuery> {
        let mut out = Vec::new();
        for (root_scope, interface_pre, summary_applied) in &self.assert_roots {
            let root_from = Term::and(vec![interface_pre.clone(), summary_applied.clone()]);
            for reached in call_graph.reachable_from(*root_scope) {
                for node in assertions.in_scope(reached) {
                    let Some(site_target) = self.lookup_assert_site(reached, node) else { continue };
                    out.push(TargetQuery {
                        name: format!("assert_root_{}_{}", root_scope.function.0 .0, node.0),
                        kind: TargetKind::Assert,
                        origin_node: node,
                        from: root_from.clone(),
                        constraints: site_target.constraints.clone(),
                        error_id_expr: site_target.error_id_expr.clone(),
                        site_error_id: site_target.site_error_id,
                    });
                }
            }
        }
        out
    }

    fn lookup_assert_site(&self, scope: Callee, node: NodeId) -> Option<&VerificationTarget> {
        self.by_site
            .get(&(scope, node))
            .into_iter()
            .flatten()
            .filter_map(|id| self.targets.iter().find(|t| t.id == *id))
            .find(|t| t.kind == TargetKind::Assert)
    }
}

/// One arithmetic bug condition discovered at a binary/unary operator node
/// (spec §4.5), still missing the per-site error id and `from`/scope that
/// only the caller (which knows the current path) can supply.
pub struct ArithmeticTargetSpec {
    pub kind: TargetKind,
    /// The condition under which this direction of the bug fires, e.g.
    /// `result > T.max`.
    pub fires_when: Term,
}

/// `T.min`/`T.max` as a background-theory term. Bit widths up to 64 get an
/// exact literal; wider integer types (the common `uint256`/`int256` case)
/// get a named symbolic bound (`uint256_max`, `int128_min`, ...) for the
/// base symbolic encoder to materialize — the exact 256-bit literal itself
/// belongs to the out-of-scope symbolic-expression library (spec §1), not
/// to this crate.
pub fn type_bound(ty: &Type, max: bool) -> Term {
    match ty {
        Type::Integer { bits, signed } => {
            if *bits <= 64 {
                let bound = if *signed {
                    if max { (1i128 << (*bits - 1)) - 1 } else { -(1i128 << (*bits - 1)) }
                } else if max {
                    (1i128 << *bits) - 1
                } else {
                    0
                };
                Term::int(bound)
            } else {
                let kind = if *signed { "int" } else { "uint" };
                let which = if max { "max" } else { "min" };
                Term::sym(format!("{kind}{bits}_{which}"))
            }
        }
        _ => Term::int(0),
    }
}

/// Spec §4.5's arithmetic target table, as a pure function of operator
/// shape and the already-lowered operand/result terms.
pub fn arithmetic_target_specs(op: BinaryOp, common_type: &Type, result: &Term) -> Vec<ArithmeticTargetSpec> {
    let Type::Integer { signed, .. } = common_type else { return Vec::new() };
    let signed = *signed;
    let min = type_bound(common_type, false);
    let max = type_bound(common_type, true);

    match op {
        BinaryOp::Mod => Vec::new(),
        BinaryOp::Div => {
            if signed {
                // min / -1 is the only signed division overflow.
                vec![ArithmeticTargetSpec { kind: TargetKind::Overflow, fires_when: result.clone().eq(min) }]
            } else {
                Vec::new()
            }
        }
        BinaryOp::Sub if !signed => {
            vec![ArithmeticTargetSpec { kind: TargetKind::Underflow, fires_when: result.clone().lt(min) }]
        }
        BinaryOp::Add | BinaryOp::Mul if !signed => {
            vec![ArithmeticTargetSpec { kind: TargetKind::Overflow, fires_when: result.clone().gt(max) }]
        }
        BinaryOp::Add | BinaryOp::Sub | BinaryOp::Mul if signed => vec![
            ArithmeticTargetSpec { kind: TargetKind::UnderOverflow, fires_when: result.clone().lt(min) },
            ArithmeticTargetSpec { kind: TargetKind::UnderOverflow, fires_when: result.clone().gt(max) },
        ],
        _ => Vec::new(),
    }
}

/// `addmod`/`mulmod`: div-by-zero when the modulus argument is zero (spec
/// §4.5).
pub fn addmod_mulmod_target(modulus: &Term) -> ArithmeticTargetSpec {
    ArithmeticTargetSpec { kind: TargetKind::DivByZero, fires_when: modulus.clone().eq(Term::int(0)) }
}

/// `a.pop()` on a length-`ℓ` array: fires when `ℓ ≤ 0` (spec §4.5).
pub fn pop_empty_array_target(length: &Term) -> ArithmeticTargetSpec {
    ArithmeticTargetSpec { kind: TargetKind::PopEmptyArray, fires_when: length.clone().le(Term::int(0)) }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ast::{ContractId, FunctionId};

    fn scope() -> Callee {
        Callee { function: FunctionId(NodeId(1)), contract: ContractId(NodeId(0)) }
    }

    #[test]
    fn unsigned_add_is_overflow_only() {
        let ty = Type::Integer { bits: 8, signed: false };
        let specs = arithmetic_target_specs(BinaryOp::Add, &ty, &Term::sym("r"));
        assert_eq!(specs.len(), 1);
        assert_eq!(specs[0].kind, TargetKind::Overflow);
    }

    #[test]
    fn unsigned_sub_is_underflow_only() {
        let ty = Type::Integer { bits: 256, signed: false };
        let specs = arithmetic_target_specs(BinaryOp::Sub, &ty, &Term::sym("r"));
        assert_eq!(specs.len(), 1);
        assert_eq!(specs[0].kind, TargetKind::Underflow);
    }

    #[test]
    fn signed_add_is_under_and_overflow_two_directions() {
        let ty = Type::Integer { bits: 256, signed: true };
        let specs = arithmetic_target_specs(BinaryOp::Add, &ty, &Term::sym("r"));
        assert_eq!(specs.len(), 2);
        assert!(specs.iter().all(|s| s.kind == TargetKind::UnderOverflow));
    }

    #[test]
    fn mod_has_no_target() {
        let ty = Type::Integer { bits: 256, signed: false };
        assert!(arithmetic_target_specs(BinaryOp::Mod, &ty, &Term::sym("r")).is_empty());
    }

    #[test]
    fn unsigned_div_has_no_target() {
        let ty = Type::Integer { bits: 256, signed: false };
        assert!(arithmetic_target_specs(BinaryOp::Div, &ty, &Term::sym("r")).is_empty());
    }

    #[test]
    fn signed_div_overflow_is_min_over_neg_one() {
        let ty = Type::Integer { bits: 8, signed: true };
        let specs = arithmetic_target_specs(BinaryOp::Div, &ty, &Term::sym("r"));
        assert_eq!(specs.len(), 1);
        assert_eq!(specs[0].kind, TargetKind::Overflow);
    }

    #[test]
    fn error_ids_are_unique_and_nonzero() {
        let mut engine = TargetEngine::new();
        let a = engine.new_error_id();
        let b = engine.new_error_id();
        assert_ne!(a, b);
        assert_ne!(a, 0);
        assert_ne!(b, 0);
    }

    #[test]
    fn finalize_assert_roots_expands_per_reachable_site() {
        let mut engine = TargetEngine::new();
        let mut cg = CallGraph::new();
        let mut fa = FunctionAssertions::new();

        let root = scope();
        let callee = Callee { function: FunctionId(NodeId(2)), contract: ContractId(NodeId(0)) };
        cg.record_call(root, callee);

        let id = engine.new_error_id();
        engine.register(
            callee,
            TargetKind::Assert,
            NodeId(99),
            Term::bool(true),
            Term::sym("c"),
            Term::sym("e"),
            id,
        );
        fa.record(callee, NodeId(99));

        engine.register_assert_root(root, Term::bool(true), Term::sym("summary_applied"));
        let queries = engine.finalize_assert_roots(&cg, &fa);
        assert_eq!(queries.len(), 1);
        assert_eq!(queries[0].site_error_id, id);
    }

    #[test]
    fn type_bound_uses_exact_literal_below_65_bits_and_symbol_above() {
        let small = Type::Integer { bits: 8, signed: false };
        assert_eq!(type_bound(&small, true), Term::int(255));
        let wide = Type::Integer { bits: 256, signed: false };
        assert_eq!(type_bound(&wide, true), Term::sym("uint256_max"));
    }
}
