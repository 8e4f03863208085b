//! Call Graph & Function Assertions (spec §3)
//!
//! Two maps populated during traversal and consulted afterward by
//! `targets.rs` when aggregating `assert` sites reachable from a
//! transaction root (spec §4.6): `CallGraph` records which functions a
//! scope may invoke internally, `FunctionAssertions` records which
//! `assert` nodes live textually inside which scope.

use crate::ast::{ContractId, FunctionId, NodeId};
use serde::{Deserialize, Serialize};
use std::collections::{HashMap, HashSet, VecDeque};

/// A function is identified together with the contract context it's being
/// called *as* (spec §9: "choose the calling-contract context at the call
/// site" under multiple inheritance).
#[derive(Copy, Clone, Debug, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct Callee {
    pub function: FunctionId,
    pub contract: ContractId,
}

#[derive(Default)]
pub struct CallGraph {
    edges: HashMap<Callee, HashSet<Callee>>,
}

impl CallGraph {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn reset(&mut self) {
        self.edges.clear();
    }

    pub fn record_call(&mut self, caller: Callee, callee: Callee) {
        self.edges.entry(caller).or_default().insert(callee);
    }

    pub fn direct_callees(&self, caller: Callee) -> impl Iterator<Item = &Callee> {
        self.edges.get(&caller).into_iter().flatten()
    }

    /// Every scope reachable from `root` by following internal calls
    /// (including `root` itself), via BFS — spec §4.6: "collects all
    /// assertion sites reachable in the transaction via BFS over the call
    /// graph from the target's scope."
    pub fn reachable_from(&self, root: Callee) -> Vec<Callee> {
        let mut seen = HashSet::new();
        let mut queue = VecDeque::new();
        let mut order = Vec::new();
        queue.push_back(root);
        seen.insert(root);
        while let Some(scope) = queue.pop_front() {
            order.push(scope);
            for callee in self.direct_callees(scope) {
                if seen.insert(*callee) {
                    queue.push_back(*callee);
                }
            }
        }
        order
    }
}

#[derive(Default)]
pub struct FunctionAssertions {
    assertions: HashMap<Callee, HashSet<NodeId>>,
}

impl FunctionAssertions {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn reset(&mut self) {
        self.assertions.clear();
    }

    pub fn record(&mut self, scope: Callee, assert_node: NodeId) {
        self.assertions.entry(scope).or_default().insert(assert_node);
    }

    pub fn in_scope(&self, scope: Callee) -> impl Iterator<Item = NodeId> + '_ {
        self.assertions.get(&scope).into_iter().flatten().copied()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn callee(f: u32, c: u32) -> Callee {
        Callee { function: FunctionId(NodeId(f)), contract: ContractId(NodeId(c)) }
    }

    #[test]
    fn reachable_from_includes_root_and_transitive_callees() {
        let mut g = CallGraph::new();
        let a = callee(1, 0);
        let b = callee(2, 0);
        let c = callee(3, 0);
        g.record_call(a, b);
        g.record_call(b, c);
        let reach = g.reachable_from(a);
        assert_eq!(reach, vec![a, b, c]);
    }

    #[test]
    fn reachable_from_handles_cycles() {
        let mut g = CallGraph::new();
        let a = callee(1, 0);
        let b = callee(2, 0);
        g.record_call(a, b);
        g.record_call(b, a);
        let reach = g.reachable_from(a);
        assert_eq!(reach.len(), 2);
    }

    #[test]
    fn assertions_scoped_by_callee() {
        let mut fa = FunctionAssertions::new();
        let a = callee(1, 0);
        fa.record(a, NodeId(10));
        fa.record(a, NodeId(11));
        let mut got: Vec<_> = fa.in_scope(a).collect();
        got.sort();
        assert_eq!(got, vec![NodeId(10), NodeId(11)]);
    }
}
