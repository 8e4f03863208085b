//! Rule construction and the clause store
//!
//! A [`Rule`] is the implication `body ⇒ head` of spec §3: `head` is a
//! predicate application, `body` a conjunction of predicate applications and
//! background-theory constraints. `RuleStore` is where every component
//! (`block_graph.rs`, `call_encoder.rs`, `summary.rs`, `targets.rs`) drops
//! the rules it emits; it enforces spec §3 invariant 2 (every free symbol of
//! `head` occurs in `body`) at the point of insertion rather than as a
//! separate pass, so a violation is an `AnalysisBug` right where it was
//! introduced.

use crate::term::Term;
use serde::{Deserialize, Serialize};
use std::collections::BTreeSet;
use thiserror::Error;

#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct Rule {
    pub name: String,
    pub body: Term,
    pub head: Term,
}

#[derive(Debug, Error)]
pub enum RuleError {
    #[error("rule `{rule}`: head references free symbol `{symbol}` not present in body")]
    FreeSymbolNotInBody { rule: String, symbol: String },
}

#[derive(Default)]
pub struct RuleStore {
    rules: Vec<Rule>,
}

impl RuleStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn reset(&mut self) {
        self.rules.clear();
    }

    /// Add `body ⇒ head` named `name`, rejecting it if it would violate
    /// spec §3 invariant 2. Internal-invariant violations here are encoder
    /// bugs (spec §7 regime 1): every call site is expected to construct
    /// `head`'s arguments out of symbols it just wrote into `body`.
    pub fn emit(&mut self, name: impl Into<String>, body: Term, head: Term) -> Result<(), RuleError> {
        let name = name.into();
        let body_symbols: BTreeSet<String> = body.free_symbols().into_iter().collect();
        for sym in head.free_symbols() {
            if !body_symbols.contains(&sym) {
                return Err(RuleError::FreeSymbolNotInBody { rule: name, symbol: sym });
            }
        }
        self.rules.push(Rule { name, body, head });
        Ok(())
    }

    pub fn iter(&self) -> impl Iterator<Item = &Rule> {
        self.rules.iter()
    }

    pub fn len(&self) -> usize {
        self.rules.len()
    }

    pub fn is_empty(&self) -> bool {
        self.rules.is_empty()
    }

    pub fn as_slice(&self) -> &[Rule] {
        &self.rules
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::predicate::PredicateId;

    #[test]
    fn rejects_head_with_symbol_absent_from_body() {
        let mut store = RuleStore::new();
        let head = Term::app(PredicateId(0), vec![Term::sym("x!1")]);
        let body = Term::bool(true);
        let err = store.emit("bad", body, head).unwrap_err();
        assert!(matches!(err, RuleError::FreeSymbolNotInBody { .. }));
        assert!(store.is_empty());
    }

    #[test]
    fn accepts_head_whose_symbols_are_bound_in_body() {
        let mut store = RuleStore::new();
        let body = Term::sym("x!1").eq(Term::int(0));
        let head = Term::app(PredicateId(0), vec![Term::sym("x!1")]);
        store.emit("ok", body, head).unwrap();
        assert_eq!(store.len(), 1);
    }
}
