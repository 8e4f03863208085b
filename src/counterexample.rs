//! Counterexample Reconstructor (spec §4.6)
//!
//! Turns a solver's `CexGraph` (a labelled derivation DAG rooted at the
//! reached `Error` predicate) into the transaction sequence that produced
//! it: `root` is the error, its child is the last transaction's
//! `function-summary` application, that node's sibling is the `interface`
//! node of the pre-state the transaction started from, and so on — walking
//! toward the base `nondet-interface` fact inverts into forward
//! chronological order.

use crate::solver::{CexGraph, CexNode, CexNodeId};
use serde::{Deserialize, Serialize};

/// One step of a reconstructed counterexample trace: the summary
/// application (or constructor/interface fact) reached at that point,
/// rendered as `predicate(args...)` for display.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct TransactionStep {
    pub predicate_name: String,
    pub arguments: Vec<String>,
}

impl std::fmt::Display for TransactionStep {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}({})", self.predicate_name, self.arguments.join(", "))
    }
}

/// A full reconstructed trace, oldest transaction first (spec §4.6: "...and
/// invert the resulting list").
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct CounterexampleTrace {
    pub steps: Vec<TransactionStep>,
}

impl std::fmt::Display for CounterexampleTrace {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        for (i, step) in self.steps.iter().enumerate() {
            writeln!(f, "{i}: {step}")?;
        }
        Ok(())
    }
}

/// Walk `graph` from its root, collecting every node on the path, then
/// invert it. A DAG with no root (a malformed or missing counterexample)
/// reconstructs to an empty trace rather than failing — callers treat that
/// as "no further detail available," not an internal-invariant violation.
pub fn reconstruct(graph: &CexGraph) -> CounterexampleTrace {
    let Some(root) = graph.root else {
        return CounterexampleTrace::default();
    };
    let mut steps = Vec::new();
    walk(graph, root, &mut steps);
    steps.reverse();
    CounterexampleTrace { steps }
}

/// Depth-first, always following the first child — a counterexample DAG's
/// derivation path is a single chain by construction (each rule in this
/// crate's encoding has at most one predicate-application atom per
/// transaction step in its body), so there is never a branch to choose
/// between.
fn walk(graph: &CexGraph, id: CexNodeId, out: &mut Vec<TransactionStep>) {
    let Some(node) = graph.node(id) else { return };
    out.push(step_of(node));
    if let Some(child) = graph.children(id).first() {
        walk(graph, *child, out);
    }
}

fn step_of(node: &CexNode) -> TransactionStep {
    TransactionStep { predicate_name: node.predicate_name.clone(), arguments: node.arguments.clone() }
}
