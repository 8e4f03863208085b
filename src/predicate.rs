//! Predicate Registry
//!
//! Allocates uninterpreted relation symbols with typed signatures, names
//! them deterministically, and hands them to the solver via
//! `ChcSolver::register_relation`. Spec §3 invariant 1: predicates are
//! created exactly once per `(kind, node)` and live for the lifetime of one
//! analysis — `PredicateRegistry` owns that dedup so every other component
//! can freely ask for "the interface predicate of contract C" without
//! tracking whether it already exists.

use crate::ast::{ContractId, FunctionId, NodeId};
use crate::sort::Sort;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;

/// Stable handle to a [`Predicate`]. Cheap to copy, used everywhere a term
/// needs to refer to a relation (`Term::App`).
#[derive(Copy, Clone, Debug, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct PredicateId(pub u32);

#[derive(Copy, Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub enum PredicateKind {
    Interface,
    NondetInterface,
    ImplicitConstructor,
    ConstructorSummary,
    FunctionEntry,
    FunctionSummary,
    FunctionBlock,
    Error,
    Custom,
}

/// For a [`PredicateKind::FunctionSummary`] (or `ConstructorSummary`), which
/// prefix of the argument vector encodes which logical group. Lets
/// `call_encoder.rs` and `counterexample.rs` slice a summary application
/// without re-deriving the layout from scratch (spec §3 `Predicate`).
#[derive(Copy, Clone, Debug, Default, Serialize, Deserialize)]
pub struct SummaryLayout {
    pub state_vars: usize,
    pub inputs: usize,
    pub outputs: usize,
}

/// Identifies what a predicate was created *for*, used both to dedup
/// (spec §3 invariant 1) and to recover it later by description rather than
/// by raw `PredicateId`.
#[derive(Clone, Debug, PartialEq, Eq, Hash)]
pub enum PredicateKey {
    Interface(ContractId),
    NondetInterface(ContractId),
    ImplicitConstructor(ContractId),
    ConstructorSummary(ContractId),
    FunctionEntry(FunctionId, ContractId),
    FunctionSummary(FunctionId, ContractId),
    /// A control-flow block site. Sites are minted by `block_graph.rs` via
    /// `PredicateRegistry::fresh_block_site` and are unique by
    /// construction, so this key never collides across two different
    /// blocks (including synthetic/ghost blocks that have no AST node).
    FunctionBlock(u32),
    /// A verification target's error predicate; always fresh (one per
    /// target, spec §4.6 step 1).
    Error(u32),
    Custom(String),
}

#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct Predicate {
    pub id: PredicateId,
    pub kind: PredicateKind,
    pub name: String,
    pub sort: Vec<Sort>,
    /// Back-reference to the AST node this predicate was created for, if
    /// any (ghost blocks and error predicates have none).
    pub node: Option<NodeId>,
    pub summary_layout: Option<SummaryLayout>,
}

impl Predicate {
    pub fn arity(&self) -> usize {
        self.sort.len()
    }
}

#[derive(Default)]
pub struct PredicateRegistry {
    next_id: u32,
    next_block_site: u32,
    next_error_site: u32,
    by_key: HashMap<PredicateKey, PredicateId>,
    predicates: HashMap<PredicateId, Predicate>,
}

impl PredicateRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Drop every predicate and counter — part of `Analyzer::reset`'s
    /// explicit teardown (spec §5).
    pub fn reset(&mut self) {
        *self = Self::default();
    }

    pub fn fresh_block_site(&mut self) -> u32 {
        let site = self.next_block_site;
        self.next_block_site += 1;
        site
    }

    pub fn fresh_error_site(&mut self) -> u32 {
        let site = self.next_error_site;
        self.next_error_site += 1;
        site
    }

    /// Fetch the predicate registered under `key`, creating it via `make`
    /// on first use. `make` is only invoked on a cache miss, so callers can
    /// build `name`/`sort` lazily.
    pub fn get_or_create(
        &mut self,
        key: PredicateKey,
        kind: PredicateKind,
        node: Option<NodeId>,
        make: impl FnOnce() -> (String, Vec<Sort>, Option<SummaryLayout>),
    ) -> PredicateId {
        if let Some(id) = self.by_key.get(&key) {
            return *id;
        }
        let id = PredicateId(self.next_id);
        self.next_id += 1;
        let (name, sort, summary_layout) = make();
        self.predicates.insert(id, Predicate { id, kind, name, sort, node, summary_layout });
        self.by_key.insert(key, id);
        id
    }

    pub fn get(&self, id: PredicateId) -> &Predicate {
        self.predicates.get(&id).expect("PredicateId must come from this registry")
    }

    pub fn lookup(&self, key: &PredicateKey) -> Option<PredicateId> {
        self.by_key.get(key).copied()
    }

    pub fn iter(&self) -> impl Iterator<Item = &Predicate> {
        self.predicates.values()
    }

    pub fn len(&self) -> usize {
        self.predicates.len()
    }

    pub fn is_empty(&self) -> bool {
        self.predicates.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ast::NodeId;

    fn cid(n: u32) -> ContractId {
        ContractId(NodeId(n))
    }

    #[test]
    fn same_key_returns_same_id() {
        let mut reg = PredicateRegistry::new();
        let k = PredicateKey::Interface(cid(1));
        let a = reg.get_or_create(k.clone(), PredicateKind::Interface, None, || {
            ("interface_C1".into(), vec![], None)
        });
        let b = reg.get_or_create(k, PredicateKind::Interface, None, || {
            panic!("make() must not run on cache hit")
        });
        assert_eq!(a, b);
        assert_eq!(reg.len(), 1);
    }

    #[test]
    fn block_sites_are_unique() {
        let mut reg = PredicateRegistry::new();
        let s1 = reg.fresh_block_site();
        let s2 = reg.fresh_block_site();
        assert_ne!(s1, s2);
    }

    #[test]
    fn reset_clears_everything() {
        let mut reg = PredicateRegistry::new();
        reg.get_or_create(PredicateKey::Interface(cid(1)), PredicateKind::Interface, None, || {
            ("x".into(), vec![], None)
        });
        reg.reset();
        assert!(reg.is_empty());
        assert_eq!(reg.fresh_block_site(), 0);
    }
}
