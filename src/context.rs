//! Base symbolic encoder interface (spec §6)
//!
//! The symbolic-expression library that actually lowers contract
//! expressions and variables into SMT terms is out of scope (spec §1): this
//! trait is the narrow boundary the rest of the crate programs against.
//! `NamedSymbolContext` is a minimal standalone implementation — it
//! materializes a symbol's value straight from the SSA index currently
//! recorded in an [`SsaIndexManager`] — good enough to drive the encoder
//! and its tests without a real SMT backend.

use crate::ast::{ContractId, NodeId, VariableDeclaration, VariableId};
use crate::ssa::{SsaIndexManager, SsaKey};
use crate::term::Term;

/// Consumed from the base symbolic encoder (spec §6).
pub trait SymbolicContext {
    fn current_value(&self, var: VariableId) -> Term;
    fn value_at_index(&self, var: VariableId, index: u32) -> Term;
    /// The already-lowered term for an arbitrary expression node (anything
    /// that isn't itself control flow: literals, arithmetic, comparisons,
    /// member/index access). The core combines these with predicate
    /// applications; it never inspects their internals.
    fn expr(&self, node: NodeId) -> Term;
    fn state(&self) -> Term;
    fn new_state(&self) -> Term;
    fn this_address(&self) -> Term;
    fn error_flag(&self) -> Term;
}

/// Reads straight through to an [`SsaIndexManager`]'s current indices;
/// `expr` falls back to naming the node directly since there is no real
/// expression lowering behind it.
pub struct NamedSymbolContext<'a> {
    ssa: &'a SsaIndexManager,
}

impl<'a> NamedSymbolContext<'a> {
    pub fn new(ssa: &'a SsaIndexManager) -> Self {
        Self { ssa }
    }
}

impl<'a> SymbolicContext for NamedSymbolContext<'a> {
    fn current_value(&self, var: VariableId) -> Term {
        self.ssa.current_symbol(SsaKey::Var(var))
    }

    fn value_at_index(&self, var: VariableId, index: u32) -> Term {
        self.ssa.symbol(SsaKey::Var(var), index)
    }

    fn expr(&self, node: NodeId) -> Term {
        Term::sym(format!("expr_{}", node.0))
    }

    fn state(&self) -> Term {
        self.ssa.current_symbol(SsaKey::State)
    }

    fn new_state(&self) -> Term {
        let next = self.ssa.current_index(SsaKey::State) + 1;
        self.ssa.symbol(SsaKey::State, next)
    }

    fn this_address(&self) -> Term {
        Term::sym("this_address")
    }

    fn error_flag(&self) -> Term {
        self.ssa.current_symbol(SsaKey::Error)
    }
}

/// `createVariable`/`stateVariablesIncludingInheritedAndPrivate` (spec §6)
/// are AST-level, not symbol-level, so they live on this small companion
/// trait rather than on `SymbolicContext` itself — an implementor can
/// delegate both to a `SourceUnit` directly (see `ast.rs`).
pub trait VariableCatalog {
    fn state_variables(&self, contract: ContractId) -> Vec<VariableDeclaration>;
    fn create_variable(&mut self, decl: &VariableDeclaration);
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ast::NodeId as N;

    #[test]
    fn current_value_tracks_ssa_bumps() {
        let mut ssa = SsaIndexManager::new();
        let var = VariableId(N(5));
        ssa.bump(SsaKey::Var(var));
        ssa.bump(SsaKey::Var(var));
        let ctx = NamedSymbolContext::new(&ssa);
        assert_eq!(ctx.current_value(var), ssa.symbol(SsaKey::Var(var), 2));
    }

    #[test]
    fn new_state_is_one_past_current_state() {
        let mut ssa = SsaIndexManager::new();
        ssa.bump(SsaKey::State);
        let ctx = NamedSymbolContext::new(&ssa);
        assert_eq!(ctx.new_state(), ssa.symbol(SsaKey::State, 2));
    }
}
