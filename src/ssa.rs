//! SSA / Index Manager
//!
//! Maintains a monotonic version counter per tracked symbol — program
//! variables *and* the distinguished blockchain-state symbol (spec §1,
//! §3 invariant 3) — and lets callers snapshot/restore that counter map
//! around branches, loop back-edges, and call frames. This module only
//! manages *indices and names*; building the actual `Term::sym` and
//! threading it through rule bodies is the caller's job (`block_graph.rs`,
//! `call_encoder.rs`).

use crate::ast::VariableId;
use crate::term::Term;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use thiserror::Error;

/// Everything the manager assigns a version history to.
#[derive(Copy, Clone, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum SsaKey {
    Var(VariableId),
    /// The blockchain-state record (spec §6 `state()`/`newState()`).
    State,
    /// The integer error flag (spec §3 invariant 4): zero means no error.
    Error,
}

#[derive(Debug, Error)]
pub enum SsaError {
    #[error("SSA index for {0:?} would not be monotone: current={1} requested={2}")]
    NotMonotone(SsaKey, u32, u32),
}

/// An immutable copy of the index table, taken before entering a branch or
/// loop body and restored afterward so sibling branches start from the same
/// base (spec §4.2 "Block").
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct SsaSnapshot(HashMap<SsaKey, u32>);

impl SsaSnapshot {
    /// The index `key` held at snapshot time, or `0` if `key` hadn't been
    /// written yet.
    pub fn index_of(&self, key: SsaKey) -> u32 {
        self.0.get(&key).copied().unwrap_or(0)
    }

    pub fn keys(&self) -> impl Iterator<Item = SsaKey> + '_ {
        self.0.keys().copied()
    }
}

#[derive(Default)]
pub struct SsaIndexManager {
    indices: HashMap<SsaKey, u32>,
    names: HashMap<SsaKey, String>,
}

impl SsaIndexManager {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn reset(&mut self) {
        self.indices.clear();
        self.names.clear();
    }

    /// Register a human-readable base name for `key` (used only for symbol
    /// naming — solver diagnostics read better as `x!3` than `v42!3`).
    pub fn register_name(&mut self, key: SsaKey, name: impl Into<String>) {
        self.names.entry(key).or_insert_with(|| name.into());
    }

    pub fn current_index(&self, key: SsaKey) -> u32 {
        self.indices.get(&key).copied().unwrap_or(0)
    }

    /// Allocate the next version for `key`. Used both for an ordinary SSA
    /// write and for knowledge erasure (spec §4.4): erasure has no defining
    /// equality for the new version, so to the rest of the encoder a bump
    /// from erasure looks identical to a bump from an assignment.
    pub fn bump(&mut self, key: SsaKey) -> u32 {
        let next = self.current_index(key) + 1;
        self.indices.insert(key, next);
        next
    }

    /// Force `key` to a specific index, failing if that would move it
    /// backward (spec §3 invariant 3). Used when restoring a snapshot's
    /// value explicitly rather than via [`Self::restore`].
    pub fn set_index(&mut self, key: SsaKey, idx: u32) -> Result<(), SsaError> {
        let cur = self.current_index(key);
        if idx < cur {
            return Err(SsaError::NotMonotone(key, cur, idx));
        }
        self.indices.insert(key, idx);
        Ok(())
    }

    pub fn symbol(&self, key: SsaKey, idx: u32) -> Term {
        let base = self.names.get(&key).cloned().unwrap_or_else(|| default_name(key));
        Term::sym(format!("{base}!{idx}"))
    }

    pub fn current_symbol(&self, key: SsaKey) -> Term {
        self.symbol(key, self.current_index(key))
    }

    pub fn snapshot(&self) -> SsaSnapshot {
        SsaSnapshot(self.indices.clone())
    }

    /// Reset indices to exactly what `snap` recorded. Entries absent from
    /// `snap` but present now are left untouched (they were introduced
    /// after the snapshot and the snapshot has no opinion on them).
    pub fn restore(&mut self, snap: &SsaSnapshot) {
        for (k, v) in &snap.0 {
            self.indices.insert(*k, *v);
        }
    }

    /// The highest index assigned to `key` across two snapshots — used when
    /// merging sibling branches: whichever arm advanced a variable further
    /// determines the merge point's starting index for that variable, and
    /// `block_graph.rs` asserts a matching phi-like equality per predecessor.
    pub fn merged_index(a: &SsaSnapshot, b: &SsaSnapshot, key: SsaKey) -> u32 {
        a.0.get(&key).copied().unwrap_or(0).max(b.0.get(&key).copied().unwrap_or(0))
    }
}

fn default_name(key: SsaKey) -> String {
    match key {
        SsaKey::Var(v) => format!("var_{}", v.0 .0),
        SsaKey::State => "state".to_string(),
        SsaKey::Error => "error".to_string(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ast::NodeId;

    #[test]
    fn bump_is_monotone() {
        let mut m = SsaIndexManager::new();
        let k = SsaKey::Var(VariableId(NodeId(1)));
        assert_eq!(m.current_index(k), 0);
        assert_eq!(m.bump(k), 1);
        assert_eq!(m.bump(k), 2);
        assert_eq!(m.current_index(k), 2);
    }

    #[test]
    fn set_index_rejects_going_backward() {
        let mut m = SsaIndexManager::new();
        let k = SsaKey::Error;
        m.bump(k);
        m.bump(k);
        assert!(m.set_index(k, 1).is_err());
        assert!(m.set_index(k, 2).is_ok());
    }

    #[test]
    fn snapshot_restore_round_trips() {
        let mut m = SsaIndexManager::new();
        let k = SsaKey::State;
        m.bump(k);
        let snap = m.snapshot();
        m.bump(k);
        m.bump(k);
        assert_eq!(m.current_index(k), 3);
        m.restore(&snap);
        assert_eq!(m.current_index(k), 1);
    }

    #[test]
    fn symbol_naming_is_stable_per_key() {
        let mut m = SsaIndexManager::new();
        let k = SsaKey::Var(VariableId(NodeId(7)));
        m.register_name(k, "x");
        assert_eq!(m.symbol(k, 3), Term::sym("x!3"));
    }
}
