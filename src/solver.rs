//! CHC solver driver interface (spec §6)
//!
//! The concrete solver is explicitly out of scope (spec §1): this module
//! only declares the trait boundary the core programs against, the result
//! vocabulary, the counterexample DAG shape, and a content-addressed query
//! hash a real driver can use as an external cache key (spec §6 "Persisted
//! state").

use crate::predicate::Predicate;
use crate::rule::Rule;
use crate::term::Term;
use blake3::Hasher;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;

#[derive(Copy, Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub enum QueryResult {
    Sat,
    Unsat,
    Unknown,
    Conflicting,
    Error,
}

#[derive(Copy, Clone, Debug, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct CexNodeId(pub u32);

#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct CexNode {
    pub predicate_name: String,
    pub arguments: Vec<String>,
}

/// A labelled DAG witnessing a `Sat` verdict (spec §6). The root is the
/// reachable error predicate; `counterexample.rs` walks it into a
/// transaction trace.
#[derive(Clone, Debug, Default, Serialize, Deserialize)]
pub struct CexGraph {
    pub root: Option<CexNodeId>,
    pub nodes: HashMap<CexNodeId, CexNode>,
    pub edges: HashMap<CexNodeId, Vec<CexNodeId>>,
}

impl CexGraph {
    pub fn children(&self, id: CexNodeId) -> &[CexNodeId] {
        self.edges.get(&id).map(Vec::as_slice).unwrap_or(&[])
    }

    pub fn node(&self, id: CexNodeId) -> Option<&CexNode> {
        self.nodes.get(&id)
    }
}

/// Narrow interface onto the CHC solver (spec §6). `push`/`pop` bracket
/// block-local constraints (spec §5) so they don't leak across queries.
pub trait ChcSolver {
    fn register_relation(&mut self, functor: &Predicate) -> anyhow::Result<()>;
    fn add_rule(&mut self, rule: &Rule) -> anyhow::Result<()>;
    fn query(&mut self, goal: &Term) -> anyhow::Result<(QueryResult, Option<CexGraph>)>;
    fn push(&mut self);
    fn pop(&mut self);
}

/// Stable 32-byte hash of a rule slice, suitable as an external cache key
/// for a `ChcSolver` implementation (spec §6: "SMT-LIB2 driver may receive
/// a map of cached responses keyed by a 256-bit hash of the query"). The
/// core itself never reads or writes such a cache — it only computes the
/// key so a caller-supplied solver can.
pub fn query_hash(rules: &[Rule]) -> [u8; 32] {
    let mut hasher = Hasher::new();
    for rule in rules {
        let bytes = serde_json::to_vec(rule).expect("Rule serializes");
        hasher.update(&(bytes.len() as u64).to_le_bytes());
        hasher.update(&bytes);
    }
    *hasher.finalize().as_bytes()
}
