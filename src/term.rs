//! Background-theory terms (narrow stand-in)
//!
//! The symbolic-expression library that lowers contract expressions into
//! SMT terms is out of scope (spec §1, §6: `SymbolicContext::expr`). What
//! the encoder itself needs is much smaller: a way to combine *opaque*
//! terms handed back by that library with predicate applications,
//! (in)equalities, and the handful of arithmetic operators spec §4.5 reasons
//! about directly (to state overflow/underflow bounds). `Term` is exactly
//! that — every leaf that isn't built here is an [`Term::Opaque`] produced
//! elsewhere.

use crate::predicate::PredicateId;
use serde::{Deserialize, Serialize};

/// A leaf produced by the base symbolic encoder. In production this wraps
/// whatever expression type the solver driver accepts (an SMT-LIB AST, a
/// `z3::Ast` handle, ...). This crate never interprets the payload — it
/// only threads it through rule bodies/heads and hands it to
/// `ChcSolver`/`fmt::Display` for diagnostics, so a small concrete
/// representation is enough to drive and test the encoder standalone.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub enum Opaque {
    IntConst(i128),
    BoolConst(bool),
    /// A named symbolic value, e.g. an SSA-indexed program variable
    /// (`x!3`) or a solver-side fresh symbol minted during havoc/erasure.
    Symbol(String),
}

impl std::fmt::Display for Opaque {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Opaque::IntConst(i) => write!(f, "{i}"),
            Opaque::BoolConst(b) => write!(f, "{b}"),
            Opaque::Symbol(s) => write!(f, "{s}"),
        }
    }
}

/// A background-theory term over integers, booleans, and predicate
/// applications.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub enum Term {
    Opaque(Opaque),
    /// Application of an uninterpreted predicate to an argument vector —
    /// the building block of every CHC rule body/head (spec §3 `Rule`).
    App(PredicateId, Vec<Term>),
    Not(Box<Term>),
    And(Vec<Term>),
    Or(Vec<Term>),
    Implies(Box<Term>, Box<Term>),
    Eq(Box<Term>, Box<Term>),
    Lt(Box<Term>, Box<Term>),
    Le(Box<Term>, Box<Term>),
    Gt(Box<Term>, Box<Term>),
    Ge(Box<Term>, Box<Term>),
    Add(Box<Term>, Box<Term>),
    Sub(Box<Term>, Box<Term>),
    Ite(Box<Term>, Box<Term>, Box<Term>),
}

impl Term {
    pub fn sym(name: impl Into<String>) -> Term {
        Term::Opaque(Opaque::Symbol(name.into()))
    }

    pub fn int(v: i128) -> Term {
        Term::Opaque(Opaque::IntConst(v))
    }

    pub fn bool(v: bool) -> Term {
        Term::Opaque(Opaque::BoolConst(v))
    }

    pub fn app(pred: PredicateId, args: Vec<Term>) -> Term {
        Term::App(pred, args)
    }

    pub fn not(self) -> Term {
        Term::Not(Box::new(self))
    }

    pub fn and(terms: Vec<Term>) -> Term {
        let mut flat = Vec::with_capacity(terms.len());
        for t in terms {
            match t {
                Term::And(inner) => flat.extend(inner),
                other => flat.push(other),
            }
        }
        match flat.len() {
            0 => Term::bool(true),
            1 => flat.into_iter().next().unwrap(),
            _ => Term::And(flat),
        }
    }

    pub fn or(terms: Vec<Term>) -> Term {
        let mut flat = Vec::with_capacity(terms.len());
        for t in terms {
            match t {
                Term::Or(inner) => flat.extend(inner),
                other => flat.push(other),
            }
        }
        match flat.len() {
            0 => Term::bool(false),
            1 => flat.into_iter().next().unwrap(),
            _ => Term::Or(flat),
        }
    }

    pub fn implies(self, head: Term) -> Term {
        Term::Implies(Box::new(self), Box::new(head))
    }

    pub fn eq(self, other: Term) -> Term {
        Term::Eq(Box::new(self), Box::new(other))
    }

    pub fn lt(self, other: Term) -> Term {
        Term::Lt(Box::new(self), Box::new(other))
    }

    pub fn le(self, other: Term) -> Term {
        Term::Le(Box::new(self), Box::new(other))
    }

    pub fn gt(self, other: Term) -> Term {
        Term::Gt(Box::new(self), Box::new(other))
    }

    pub fn ge(self, other: Term) -> Term {
        Term::Ge(Box::new(self), Box::new(other))
    }

    pub fn add(self, other: Term) -> Term {
        Term::Add(Box::new(self), Box::new(other))
    }

    pub fn sub(self, other: Term) -> Term {
        Term::Sub(Box::new(self), Box::new(other))
    }

    pub fn ite(cond: Term, then: Term, otherwise: Term) -> Term {
        Term::Ite(Box::new(cond), Box::new(then), Box::new(otherwise))
    }

    /// Tautological conjunction `t0 = t0 ∧ t1 = t1 ∧ ...`, generalizing
    /// `EncodeCtx::mark_free` to a whole symbol vector at once: syntactically
    /// satisfies the free-symbol-in-body requirement (spec §3 invariant 2)
    /// for every `sym` in `terms` while leaving its value unconstrained.
    pub fn free(terms: Vec<Term>) -> Term {
        Term::and(terms.into_iter().map(|t| t.clone().eq(t)).collect())
    }

    /// Every predicate this term applies, in traversal order (used by
    /// `rule.rs` to check invariant 2: every free symbol of the head
    /// appears in the body).
    pub fn predicate_applications(&self) -> Vec<PredicateId> {
        let mut out = Vec::new();
        self.collect_predicates(&mut out);
        out
    }

    fn collect_predicates(&self, out: &mut Vec<PredicateId>) {
        match self {
            Term::App(p, args) => {
                out.push(*p);
                for a in args {
                    a.collect_predicates(out);
                }
            }
            Term::Not(a) => a.collect_predicates(out),
            Term::And(ts) | Term::Or(ts) => ts.iter().for_each(|t| t.collect_predicates(out)),
            Term::Implies(a, b) | Term::Eq(a, b) | Term::Lt(a, b) | Term::Le(a, b) | Term::Gt(a, b) | Term::Ge(a, b)
            | Term::Add(a, b) | Term::Sub(a, b) => {
                a.collect_predicates(out);
                b.collect_predicates(out);
            }
            Term::Ite(c, t, e) => {
                c.collect_predicates(out);
                t.collect_predicates(out);
                e.collect_predicates(out);
            }
            Term::Opaque(_) => {}
        }
    }

    /// Free `Symbol` names occurring in this term (used by `rule.rs`
    /// invariant 2 for the non-predicate part of a head/body).
    pub fn free_symbols(&self) -> Vec<String> {
        let mut out = Vec::new();
        self.collect_symbols(&mut out);
        out
    }

    fn collect_symbols(&self, out: &mut Vec<String>) {
        match self {
            Term::Opaque(Opaque::Symbol(s)) => out.push(s.clone()),
            Term::Opaque(_) => {}
            Term::App(_, args) => args.iter().for_each(|a| a.collect_symbols(out)),
            Term::Not(a) => a.collect_symbols(out),
            Term::And(ts) | Term::Or(ts) => ts.iter().for_each(|t| t.collect_symbols(out)),
            Term::Implies(a, b) | Term::Eq(a, b) | Term::Lt(a, b) | Term::Le(a, b) | Term::Gt(a, b) | Term::Ge(a, b)
            | Term::Add(a, b) | Term::Sub(a, b) => {
                a.collect_symbols(out);
                b.collect_symbols(out);
            }
            Term::Ite(c, t, e) => {
                c.collect_symbols(out);
                t.collect_symbols(out);
                e.collect_symbols(out);
            }
        }
    }
}
