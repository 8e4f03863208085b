//! Call Encoder (spec §4.4)
//!
//! Lowers a `Call` expression once its arguments have already been encoded.
//! Three shapes, three different amounts of knowledge preserved across the
//! call:
//!
//! - **Internal**: apply the callee's `FunctionSummary` predicate as a body
//!   atom, binding fresh output symbols for its post-state/returns/error
//!   slot; SSA-save the caller's error flag across the frame and restore it
//!   with `ite(calleeErr ≠ 0, calleeErr, callerErr)`.
//! - **External/static**: no summary exists to apply (the callee's code may
//!   not even be known), so apply this contract's own `NondetInterface`
//!   predicate against a fresh address to link pre/post state, then havoc
//!   every state variable; a `view`/`pure` (`is_static`) callee cannot write
//!   state at all, so it skips the havoc.
//! - **Unknown** (`delegatecall`/low-level `call`/`create`): erase
//!   knowledge outright (spec §4.4) — the callee may execute arbitrary code
//!   against our own storage layout.
//!
//! `assert`/`require`/`arr.pop()`/`addmod`/`mulmod` are not really "calls"
//! in the inter-procedural sense; they are handled here too since they
//! share the same `CallKind` dispatch point, but they only ever touch the
//! current function's own target/assertion bookkeeping.

use crate::ast::{CallKind, NodeId, UnknownCallKind};
use crate::block_graph::{register_assert, register_target, Block, EncodeCtx};
use crate::call_graph::Callee;
use crate::ssa::SsaKey;
use crate::summary;
use crate::targets::{self, TargetKind};
use crate::term::Term;

pub fn encode_call(ctx: &mut EncodeCtx, current: &Block, node: NodeId, kind: &CallKind, args: &[Term]) -> Term {
    match kind {
        CallKind::Internal(callee_fn) => internal_call(ctx, *callee_fn, node, args),
        CallKind::External { is_static } => external_call(ctx, node, *is_static),
        CallKind::Unknown(k) => unknown_call(ctx, node, *k),
        CallKind::Assert => {
            let cond = args.first().cloned().unwrap_or_else(|| Term::bool(true));
            register_assert(ctx, current, node, cond);
            Term::bool(true)
        }
        CallKind::Require => {
            let cond = args.first().cloned().unwrap_or_else(|| Term::bool(true));
            ctx.push_pending(cond);
            Term::bool(true)
        }
        CallKind::ArrayPop => {
            let length = args.first().cloned().unwrap_or_else(|| Term::int(0));
            let spec = targets::pop_empty_array_target(&length);
            register_target(ctx, current, node, spec.kind, spec.fires_when);
            Term::bool(true)
        }
        CallKind::Addmod | CallKind::Mulmod => {
            let modulus = args.get(2).cloned().unwrap_or_else(|| Term::int(1));
            let spec = targets::addmod_mulmod_target(&modulus);
            register_target(ctx, current, node, TargetKind::DivByZero, spec.fires_when);
            ctx.expr_term(node)
        }
    }
}

/// `f(args)` where `f` resolves statically (spec §4.4 "internal").
fn internal_call(ctx: &mut EncodeCtx, callee_fn: crate::ast::FunctionId, node: NodeId, args: &[Term]) -> Term {
    let callee_scope = Callee { function: callee_fn, contract: ctx.contract };
    ctx.call_graph.record_call(ctx.scope(), callee_scope);

    let unit = ctx.unit;
    let contract = ctx.contract;
    let pred = summary::function_summary_predicate(unit, ctx.predicates, contract, callee_fn);

    let callee_def = unit.contract(contract).and_then(|c| c.functions.iter().find(|f| f.id == callee_fn));
    let returns_count = callee_def.map(|f| f.returns.len()).unwrap_or(0);
    let advances_state = callee_def.map(|f| f.mutability.advances_state()).unwrap_or(true);

    let state_vars = ctx.tracked_vars[..ctx.n_state_vars].to_vec();
    let fresh = |base: &str| Term::sym(format!("{base}_call{}", node.0));
    let callee_err = fresh("callee_err");
    let state_pre = ctx.ssa.current_symbol(SsaKey::State);
    let svars_pre: Vec<Term> = state_vars.iter().map(|v| ctx.ssa.current_symbol(SsaKey::Var(*v))).collect();

    // A `pure`/`view` callee cannot write storage (spec §4.4): its summary's
    // pre/post state slots coincide instead of minting a fresh post-call SSA
    // generation that nothing ever produces.
    let (state_post, svars_post) = if advances_state {
        let state_post_idx = ctx.ssa.bump(SsaKey::State);
        let state_post = ctx.ssa.symbol(SsaKey::State, state_post_idx);
        let svars_post: Vec<Term> = state_vars
            .iter()
            .map(|v| {
                let idx = ctx.ssa.bump(SsaKey::Var(*v));
                ctx.ssa.symbol(SsaKey::Var(*v), idx)
            })
            .collect();
        (state_post, svars_post)
    } else {
        (state_pre.clone(), svars_pre.clone())
    };
    let returns: Vec<Term> = (0..returns_count).map(|i| fresh(&format!("ret{i}"))).collect();

    let mut summary_args = vec![callee_err.clone(), Term::sym("this_address"), state_pre];
    summary_args.extend(svars_pre);
    summary_args.extend(args.iter().cloned());
    summary_args.push(state_post);
    summary_args.extend(svars_post);
    summary_args.extend(args.iter().cloned());
    summary_args.extend(returns.iter().cloned());

    ctx.push_pending(Term::app(pred, summary_args));

    let prev_error = ctx.ssa.current_symbol(SsaKey::Error);
    let new_idx = ctx.ssa.bump(SsaKey::Error);
    let new_error = ctx.ssa.symbol(SsaKey::Error, new_idx);
    ctx.push_pending(new_error.eq(Term::ite(callee_err.clone().eq(Term::int(0)).not(), callee_err, prev_error)));

    returns.into_iter().next().unwrap_or_else(|| Term::bool(true))
}

/// `c.f(args)` through a contract-typed expression (spec §4.4
/// "external/static"). The callee's code is not necessarily known, so no
/// summary is applied — instead this contract's own `NondetInterface` links
/// an arbitrary pre/post state pair for a fresh unknown address, modeling
/// "anything reachable via re-entrancy through a call out and back in."
fn external_call(ctx: &mut EncodeCtx, node: NodeId, is_static: bool) -> Term {
    ctx.call_graph.record_call(ctx.scope(), ctx.scope());

    if !is_static {
        let unit = ctx.unit;
        let contract = ctx.contract;
        let pred = summary::nondet_interface_predicate(unit, ctx.predicates, contract);

        let state_vars = ctx.tracked_vars[..ctx.n_state_vars].to_vec();
        let err = Term::sym(format!("ext_err_call{}", node.0));
        let addr = Term::sym(format!("ext_addr_call{}", node.0));
        let state_pre = ctx.ssa.current_symbol(SsaKey::State);
        let svars_pre: Vec<Term> = state_vars.iter().map(|v| ctx.ssa.current_symbol(SsaKey::Var(*v))).collect();

        ctx.erase_knowledge();

        let state_post = ctx.ssa.current_symbol(SsaKey::State);
        let svars_post: Vec<Term> = state_vars.iter().map(|v| ctx.ssa.current_symbol(SsaKey::Var(*v))).collect();

        let mut nondet_args = vec![err, addr, state_pre];
        nondet_args.extend(svars_pre);
        nondet_args.push(state_post);
        nondet_args.extend(svars_post);
        ctx.push_pending(Term::app(pred, nondet_args));
    }

    let result = Term::sym(format!("ext_result_call{}", node.0));
    ctx.mark_free(result.clone());
    result
}

/// `delegatecall`/low-level `call`/`new C(...)` (spec §4.4 "unknown"):
/// erase knowledge outright rather than modeling the callee at all.
fn unknown_call(ctx: &mut EncodeCtx, node: NodeId, _kind: UnknownCallKind) -> Term {
    ctx.erase_knowledge();
    ctx.saw_unknown_call = true;
    let result = Term::sym(format!("unknown_result_call{}", node.0));
    ctx.mark_free(result.clone());
    result
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ast::{ContractDefinition, ContractId, FunctionDefinition, SourceUnit, StateMutability, Statement, Type, VariableId, Visibility};
    use crate::call_graph::{CallGraph, FunctionAssertions};
    use crate::predicate::PredicateRegistry;
    use crate::rule::RuleStore;
    use crate::ssa::SsaIndexManager;
    use crate::targets::TargetEngine;

    fn fixture() -> (SourceUnit, ContractId, crate::ast::FunctionId, crate::ast::FunctionId, VariableId) {
        let cid = ContractId(NodeId(1));
        let caller = crate::ast::FunctionId(NodeId(2));
        let callee = crate::ast::FunctionId(NodeId(3));
        let svar = VariableId(NodeId(4));
        let unit = SourceUnit {
            contracts: vec![ContractDefinition {
                id: cid,
                name: "C".into(),
                bases: vec![],
                is_library: false,
                is_interface: false,
                state_variables: vec![crate::ast::VariableDeclaration {
                    id: svar,
                    name: "x".into(),
                    ty: Type::Integer { bits: 256, signed: false },
                }],
                constructor: None,
                functions: vec![
                    FunctionDefinition {
                        id: caller,
                        name: "caller".into(),
                        visibility: Visibility::Public,
                        mutability: StateMutability::Mutable,
                        params: vec![],
                        returns: vec![],
                        body: Statement::Block(vec![]),
                        is_constructor: false,
                    },
                    FunctionDefinition {
                        id: callee,
                        name: "callee".into(),
                        visibility: Visibility::Internal,
                        mutability: StateMutability::Mutable,
                        params: vec![],
                        returns: vec![crate::ast::VariableDeclaration {
                            id: VariableId(NodeId(5)),
                            name: "r".into(),
                            ty: Type::Integer { bits: 256, signed: false },
                        }],
                        body: Statement::Block(vec![]),
                        is_constructor: false,
                    },
                ],
            }],
        };
        (unit, cid, caller, callee, svar)
    }

    #[test]
    fn internal_call_records_call_graph_edge_and_preserves_error_via_ite() {
        let (unit, cid, caller, callee, svar) = fixture();
        let mut predicates = PredicateRegistry::new();
        let mut ssa = SsaIndexManager::new();
        let mut rules = RuleStore::new();
        let mut targets_engine = TargetEngine::new();
        let mut call_graph = CallGraph::new();
        let mut assertions = FunctionAssertions::new();
        let mut state_var_set = std::collections::HashSet::new();
        state_var_set.insert(svar);

        let mut ctx = EncodeCtx {
            unit: &unit,
            contract: cid,
            function: caller,
            predicates: &mut predicates,
            ssa: &mut ssa,
            rules: &mut rules,
            targets: &mut targets_engine,
            call_graph: &mut call_graph,
            assertions: &mut assertions,
            tracked_vars: vec![svar],
            n_state_vars: 1,
            n_params: 0,
            n_returns: 0,
            state_var_set,
            known_locals: Vec::new(),
            pending: Vec::new(),
            loop_stack: Vec::new(),
            saw_unknown_call: false,
        };

        let before_error_idx = ctx.ssa.current_index(SsaKey::Error);
        internal_call(&mut ctx, callee, NodeId(100), &[]);

        assert!(ctx.ssa.current_index(SsaKey::Error) > before_error_idx);
        assert!(!ctx.pending.is_empty());
        assert!(call_graph.direct_callees(Callee { function: caller, contract: cid }).any(|c| c.function == callee));
    }

    #[test]
    fn internal_call_to_view_callee_does_not_advance_state() {
        let (unit, cid, caller, callee, svar) = fixture();
        let mut unit = unit;
        unit.contracts[0].functions[1].mutability = StateMutability::View;

        let mut predicates = PredicateRegistry::new();
        let mut ssa = SsaIndexManager::new();
        let mut rules = RuleStore::new();
        let mut targets_engine = TargetEngine::new();
        let mut call_graph = CallGraph::new();
        let mut assertions = FunctionAssertions::new();
        let mut state_var_set = std::collections::HashSet::new();
        state_var_set.insert(svar);

        let mut ctx = EncodeCtx {
            unit: &unit,
            contract: cid,
            function: caller,
            predicates: &mut predicates,
            ssa: &mut ssa,
            rules: &mut rules,
            targets: &mut targets_engine,
            call_graph: &mut call_graph,
            assertions: &mut assertions,
            tracked_vars: vec![svar],
            n_state_vars: 1,
            n_params: 0,
            n_returns: 0,
            state_var_set,
            known_locals: Vec::new(),
            pending: Vec::new(),
            loop_stack: Vec::new(),
            saw_unknown_call: false,
        };

        let before_state = ctx.ssa.current_index(SsaKey::State);
        let before_svar = ctx.ssa.current_index(SsaKey::Var(svar));
        internal_call(&mut ctx, callee, NodeId(101), &[]);

        assert_eq!(ctx.ssa.current_index(SsaKey::State), before_state);
        assert_eq!(ctx.ssa.current_index(SsaKey::Var(svar)), before_svar);
    }

    #[test]
    fn unknown_call_sets_flag_and_bumps_state() {
        let (unit, cid, caller, _callee, svar) = fixture();
        let mut predicates = PredicateRegistry::new();
        let mut ssa = SsaIndexManager::new();
        let mut rules = RuleStore::new();
        let mut targets_engine = TargetEngine::new();
        let mut call_graph = CallGraph::new();
        let mut assertions = FunctionAssertions::new();
        let mut state_var_set = std::collections::HashSet::new();
        state_var_set.insert(svar);

        let mut ctx = EncodeCtx {
            unit: &unit,
            contract: cid,
            function: caller,
            predicates: &mut predicates,
            ssa: &mut ssa,
            rules: &mut rules,
            targets: &mut targets_engine,
            call_graph: &mut call_graph,
            assertions: &mut assertions,
            tracked_vars: vec![svar],
            n_state_vars: 1,
            n_params: 0,
            n_returns: 0,
            state_var_set,
            known_locals: Vec::new(),
            pending: Vec::new(),
            loop_stack: Vec::new(),
            saw_unknown_call: false,
        };

        let before = ctx.ssa.current_index(SsaKey::State);
        unknown_call(&mut ctx, NodeId(200), UnknownCallKind::Delegate);
        assert!(ctx.saw_unknown_call);
        assert!(ctx.ssa.current_index(SsaKey::State) > before);
    }
}
