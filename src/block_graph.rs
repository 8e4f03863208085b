//! Block Graph Builder (spec §4.2)
//!
//! Walks one function body depth-first, threading a "current block"
//! predicate and an accumulator of straight-line constraints (`pending`)
//! through statements, and emits one `RuleStore` rule per control-flow edge.
//! `if`/`while`/`do-while`/`for` each mint a fixed handful of blocks
//! (header/true/false/after, or header/body/after); `break`/`continue` jump
//! to whatever the innermost loop pushed onto `loop_stack`. An unknown call
//! anywhere inside a branch or loop body forces every merge point
//! downstream of it to erase knowledge before the walk continues (spec
//! §4.4) — resolved here by erasing unconditionally, not only on the
//! branch(es) that actually triggered it, since a future path exploring the
//! untaken branch must see the same erased state.

use crate::ast::{BinaryOp, ContractId, FunctionId, SourceUnit, Statement, Type, VariableId};
use crate::call_encoder;
use crate::call_graph::{CallGraph, Callee, FunctionAssertions};
use crate::context::{NamedSymbolContext, SymbolicContext};
use crate::predicate::{PredicateKey, PredicateKind, PredicateRegistry};
use crate::rule::RuleStore;
use crate::sort;
use crate::ssa::{SsaIndexManager, SsaKey, SsaSnapshot};
use crate::targets::{self, TargetEngine, TargetKind};
use crate::term::Term;

/// A control-flow vertex: a predicate plus the SSA indices its argument
/// vector was built from.
#[derive(Clone, Debug)]
pub struct Block {
    pub predicate: crate::predicate::PredicateId,
    pub entry: SsaSnapshot,
}

/// Everything one function-body walk shares, threaded through statement and
/// expression encoding by mutable reference. Lives only for the duration of
/// one `encode_function_body` call.
pub struct EncodeCtx<'a> {
    pub unit: &'a SourceUnit,
    pub contract: ContractId,
    pub function: FunctionId,
    pub predicates: &'a mut PredicateRegistry,
    pub ssa: &'a mut SsaIndexManager,
    pub rules: &'a mut RuleStore,
    pub targets: &'a mut TargetEngine,
    pub call_graph: &'a mut CallGraph,
    pub assertions: &'a mut FunctionAssertions,
    /// Fixed argument order for every block predicate in this function:
    /// state vars, then params, then returns (spec §4.1 `function-block`
    /// sort) — locals are tracked by SSA but never appear in a block's own
    /// signature.
    pub tracked_vars: Vec<VariableId>,
    /// How many of `tracked_vars`' leading/middle/trailing entries are state
    /// variables, parameters, and returns respectively — `summary.rs` needs
    /// the split to slice a block's argument vector when wiring a function
    /// or constructor summary.
    pub n_state_vars: usize,
    pub n_params: usize,
    pub n_returns: usize,
    pub state_var_set: std::collections::HashSet<VariableId>,
    /// Locals seen so far via `VariableDeclaration` statements, with their
    /// declared type — consulted by knowledge erasure to re-havoc
    /// reference/mapping locals (spec §4.4).
    pub known_locals: Vec<(VariableId, Type)>,
    pub pending: Vec<Term>,
    /// `(break_dest, continue_dest)` for the loop currently being walked.
    pub loop_stack: Vec<(Block, Block)>,
    /// Set by `call_encoder::encode_call` when it lowers an unknown call;
    /// consulted — and cleared — at the next merge point.
    pub saw_unknown_call: bool,
}

impl<'a> EncodeCtx<'a> {
    pub fn scope(&self) -> Callee {
        Callee { function: self.function, contract: self.contract }
    }

    pub fn expr_term(&self, node: crate::ast::NodeId) -> Term {
        NamedSymbolContext::new(self.ssa).expr(node)
    }

    pub fn push_pending(&mut self, t: Term) {
        self.pending.push(t);
    }

    fn flush_pending(&mut self) -> Term {
        Term::and(std::mem::take(&mut self.pending))
    }

    pub fn entry_args(&self, entry: &SsaSnapshot) -> Vec<Term> {
        let mut args = vec![
            self.ssa.symbol(SsaKey::Error, entry.index_of(SsaKey::Error)),
            Term::sym("this_address"),
            self.ssa.symbol(SsaKey::State, entry.index_of(SsaKey::State)),
        ];
        for v in &self.tracked_vars {
            let key = SsaKey::Var(*v);
            args.push(self.ssa.symbol(key, entry.index_of(key)));
        }
        args
    }

    pub fn block_app(&self, block: &Block) -> Term {
        Term::app(block.predicate, self.entry_args(&block.entry))
    }

    /// Current-state application: the same shape as `block_app`, but built
    /// from the SSA manager's *live* indices rather than a stored snapshot
    /// — used when minting the block this point in the walk transitions
    /// into.
    pub fn live_args(&self) -> Vec<Term> {
        let mut args =
            vec![self.ssa.current_symbol(SsaKey::Error), Term::sym("this_address"), self.ssa.current_symbol(SsaKey::State)];
        args.extend(self.tracked_vars.iter().map(|v| self.ssa.current_symbol(SsaKey::Var(*v))));
        args
    }

    /// Mint a fresh block predicate (spec §4.1 `function-block` sort) whose
    /// entry snapshot is the SSA manager's current state.
    pub fn new_block(&mut self, node: Option<crate::ast::NodeId>) -> Block {
        let site = self.predicates.fresh_block_site();
        let unit = self.unit;
        let contract = self.contract;
        let function = self.function;
        let pred = self.predicates.get_or_create(PredicateKey::FunctionBlock(site), PredicateKind::FunctionBlock, node, || {
            (format!("block_{site}"), sort::function_block_sort(unit, contract, function), None)
        });
        Block { predicate: pred, entry: self.ssa.snapshot() }
    }

    /// Emit `from_app ∧ pending ⇒ to_app`, flushing `pending`.
    pub fn transition(&mut self, name: impl Into<String>, from: &Block, to: &Block) {
        let body = Term::and(vec![self.block_app(from), self.flush_pending()]);
        let head = self.block_app(to);
        self.rules.emit(name, body, head).expect("block transition must be well-formed by construction");
    }

    /// Reset state-variable SSA and re-havoc reference/mapping locals (spec
    /// §4.4 "unknown call"); also used at any merge point downstream of an
    /// unknown call (spec §4.2, resolved per this crate's open-question
    /// note: erase unconditionally on both branches, not only the one that
    /// actually saw the call).
    pub fn erase_knowledge(&mut self) {
        let idx = self.ssa.bump(SsaKey::State);
        self.mark_free(self.ssa.symbol(SsaKey::State, idx));
        for v in self.state_var_set.clone() {
            let idx = self.ssa.bump(SsaKey::Var(v));
            self.mark_free(self.ssa.symbol(SsaKey::Var(v), idx));
        }
        for (v, ty) in self.known_locals.clone() {
            if matches!(ty, Type::Array { .. } | Type::Mapping { .. }) {
                let idx = self.ssa.bump(SsaKey::Var(v));
                self.mark_free(self.ssa.symbol(SsaKey::Var(v), idx));
            }
        }
    }

    /// Record that `sym` is a genuinely fresh/havoced value by pushing a
    /// tautological `sym = sym` conjunct into `pending`. `RuleStore::emit`
    /// requires every free symbol of a rule's head to occur somewhere in
    /// its body (spec §3 invariant 2); a havoc introduces a value with no
    /// real constraint, so this is the syntactic no-op that keeps the
    /// symbol present without actually bounding it.
    pub fn mark_free(&mut self, sym: Term) {
        self.pending.push(sym.clone().eq(sym));
    }

    /// Every SSA key that appears in a block's own argument vector — the
    /// keys a phi equality must be supplied for at a merge or back-edge
    /// (spec §4.2 "restores SSA indices", §3 invariant 2).
    pub fn phi_keys(&self) -> Vec<SsaKey> {
        let mut keys = vec![SsaKey::Error, SsaKey::State];
        keys.extend(self.tracked_vars.iter().map(|v| SsaKey::Var(*v)));
        keys
    }

    /// Whether `erase_knowledge` just handed `key` a fresh, unconstrained
    /// value (via `mark_free`) — if so, a merge must not also phi-bind it to
    /// a predecessor's pre-erasure value, which would re-constrain exactly
    /// what the erasure was meant to forget.
    fn is_erased_by_knowledge_erasure(&self, key: SsaKey) -> bool {
        match key {
            SsaKey::State => true,
            SsaKey::Var(v) => self.state_var_set.contains(&v),
            SsaKey::Error => false,
        }
    }

    /// Force any outstanding `pending` into a transition so the returned
    /// block's `entry` reflects live SSA state with nothing left
    /// unflushed. Needed before holding two or more block handles at once
    /// (e.g. sibling `if`/`else` exits about to be merged) — `pending` and
    /// the SSA manager are each one shared accumulator, not branch-local,
    /// so a predecessor's trailing straight-line writes must be baked into
    /// its own `entry` before the next predecessor starts accumulating.
    pub fn seal(&mut self, block: Block) -> Block {
        if self.pending.is_empty() {
            return block;
        }
        let sealed = self.new_block(None);
        self.transition("seal", &block, &sealed);
        sealed
    }

    /// Transition into a block whose `entry` was fixed before `from`'s own
    /// SSA advanced past it — a loop header, break destination, or continue
    /// target, each reused across every edge that reaches it. Binds every
    /// tracked key's now-stale destination symbol to the walk's live value
    /// via a phi equality pushed into `pending` first, so the destination's
    /// free symbols are always present in the body (spec §3 invariant 2).
    pub fn bind_transition(&mut self, name: impl Into<String>, from: &Block, to: &Block) {
        for key in self.phi_keys() {
            let to_sym = self.ssa.symbol(key, to.entry.index_of(key));
            let live_sym = self.ssa.current_symbol(key);
            if to_sym != live_sym {
                self.push_pending(to_sym.eq(live_sym));
            }
        }
        self.transition(name, from, to);
    }
}

/// The highest index `key` reaches across every block in `incoming` —
/// pairwise via [`SsaIndexManager::merged_index`] for the common two-
/// predecessor case, folded for any other arity.
fn widest_index(incoming: &[Block], key: SsaKey) -> u32 {
    match incoming {
        [] => 0,
        [only] => only.entry.index_of(key),
        [a, b] => SsaIndexManager::merged_index(&a.entry, &b.entry, key),
        [first, rest @ ..] => rest.iter().fold(first.entry.index_of(key), |acc, b| acc.max(b.entry.index_of(key))),
    }
}

/// `if (c) true_body else false_body` (spec §4.2): `header, true, [false,]
/// after`.
fn encode_if(
    ctx: &mut EncodeCtx,
    current: Block,
    cond: &crate::ast::Expression,
    true_body: &Statement,
    false_body: Option<&Statement>,
) -> Option<Block> {
    let header = current;
    let cond_t = encode_expression(ctx, &header, cond);

    let true_entry_pending = ctx.flush_pending_into_new(cond_t.clone());
    let true_block = ctx.new_block(None);
    ctx.push_pending(true_entry_pending);
    ctx.transition("if_true", &header, &true_block);
    let saw_before = ctx.saw_unknown_call;
    ctx.saw_unknown_call = false;
    let true_exit = encode_statement(ctx, true_block, true_body).map(|b| ctx.seal(b));
    let true_triggered = ctx.saw_unknown_call;

    // Sibling branches must restart from the header's own base state (spec
    // §4.2 "restores SSA indices", §3 invariant 3) — without this the false
    // branch would be encoded on top of whatever the true branch left
    // behind in `ctx.ssa`/`ctx.pending`, both of which are shared, not
    // branch-local.
    ctx.ssa.restore(&header.entry);
    ctx.pending.clear();
    ctx.saw_unknown_call = false;
    let (false_exit, false_triggered) = if let Some(fb) = false_body {
        let neg_pending = ctx.flush_pending_into_new(cond_t.clone().not());
        let false_block = ctx.new_block(None);
        ctx.push_pending(neg_pending);
        ctx.transition("if_false", &header, &false_block);
        let exit = encode_statement(ctx, false_block, fb).map(|b| ctx.seal(b));
        (exit, ctx.saw_unknown_call)
    } else {
        let neg_pending = ctx.flush_pending_into_new(cond_t.not());
        let implicit_false = ctx.new_block(None);
        ctx.push_pending(neg_pending);
        ctx.transition("if_implicit_false", &header, &implicit_false);
        (Some(implicit_false), false)
    };

    ctx.saw_unknown_call = saw_before || true_triggered || false_triggered;

    let incoming: Vec<Block> = [true_exit, false_exit].into_iter().flatten().collect();
    merge(ctx, incoming, "if_after")
}

/// `while (c) body`: `header, body, after`; the back-edge re-enters
/// `header`.
fn encode_while(ctx: &mut EncodeCtx, current: Block, cond: &crate::ast::Expression, body: &Statement) -> Option<Block> {
    let pre = current;
    let header = ctx.new_block(None);
    ctx.transition("while_pre", &pre, &header);

    let cond_t = encode_expression(ctx, &header, cond);
    let body_pending = ctx.flush_pending_into_new(cond_t.clone());
    let body_block = ctx.new_block(None);
    ctx.push_pending(body_pending);
    ctx.transition("while_enter", &header, &body_block);

    let after = ctx.new_block(None);
    ctx.loop_stack.push((after.clone(), header.clone()));
    let saw_before = ctx.saw_unknown_call;
    ctx.saw_unknown_call = false;
    let body_exit = encode_statement(ctx, body_block, body);
    let triggered = ctx.saw_unknown_call;
    ctx.loop_stack.pop();
    ctx.saw_unknown_call = saw_before || triggered;

    if let Some(exit) = body_exit {
        if triggered {
            ctx.erase_knowledge();
        }
        ctx.bind_transition("while_back_edge", &exit, &header);
    }

    let after_pending = ctx.flush_pending_into_new(cond_t.not());
    ctx.push_pending(after_pending);
    ctx.transition("while_exit", &header, &after);
    Some(after)
}

fn encode_do_while(ctx: &mut EncodeCtx, current: Block, cond: &crate::ast::Expression, body: &Statement) -> Option<Block> {
    let pre = current;
    let body_block = ctx.new_block(None);
    ctx.transition("do_while_enter", &pre, &body_block);

    let after = ctx.new_block(None);
    ctx.loop_stack.push((after.clone(), body_block.clone()));
    ctx.saw_unknown_call = false;
    let body_exit = encode_statement(ctx, body_block.clone(), body);
    let triggered = ctx.saw_unknown_call;
    ctx.loop_stack.pop();

    if let Some(exit) = body_exit {
        let cond_t = encode_expression(ctx, &exit, cond);
        if triggered {
            ctx.erase_knowledge();
        }
        // Both edges leave from the same `exit` and must each see the
        // body's full straight-line `pending` — `transition`'s own flush
        // drains it via `mem::take`, so the first edge would otherwise
        // consume what the second edge also needs.
        let base_pending = ctx.pending.clone();

        ctx.pending = base_pending.clone();
        ctx.push_pending(cond_t.clone());
        ctx.bind_transition("do_while_back_edge", &exit, &body_block);

        ctx.pending = base_pending;
        ctx.push_pending(cond_t.not());
        ctx.bind_transition("do_while_exit", &exit, &after);
    }
    Some(after)
}

fn encode_for(
    ctx: &mut EncodeCtx,
    current: Block,
    init: Option<&Statement>,
    cond: Option<&crate::ast::Expression>,
    post: Option<&Statement>,
    body: &Statement,
) -> Option<Block> {
    let mut pre = current;
    if let Some(init) = init {
        pre = encode_statement(ctx, pre, init)?;
    }
    let header = ctx.new_block(None);
    ctx.transition("for_pre", &pre, &header);

    let cond_t = cond.map(|c| encode_expression(ctx, &header, c)).unwrap_or_else(|| Term::bool(true));
    let body_pending = ctx.flush_pending_into_new(cond_t.clone());
    let body_block = ctx.new_block(None);
    ctx.push_pending(body_pending);
    ctx.transition("for_enter", &header, &body_block);

    // `continue` must land on the post-step, not skip past it (spec §4.2):
    // mint a distinct block for it now, before the body runs, so the loop
    // stack can point `continue` there. Its entry coincides with
    // `body_block`'s — nothing advances SSA between minting the two.
    let post_block = ctx.new_block(None);
    let after = ctx.new_block(None);
    ctx.loop_stack.push((after.clone(), post_block.clone()));
    ctx.saw_unknown_call = false;
    let body_exit = encode_statement(ctx, body_block, body);
    let triggered = ctx.saw_unknown_call;
    ctx.loop_stack.pop();

    if let Some(exit) = body_exit {
        ctx.bind_transition("for_fallthrough", &exit, &post_block);
    }

    ctx.ssa.restore(&post_block.entry);
    ctx.pending.clear();
    let post_exit = if let Some(post) = post { encode_statement(ctx, post_block.clone(), post) } else { Some(post_block.clone()) };
    if let Some(pe) = post_exit {
        if triggered {
            ctx.erase_knowledge();
        }
        ctx.bind_transition("for_back_edge", &pe, &header);
    }

    let after_pending = ctx.flush_pending_into_new(cond_t.not());
    ctx.push_pending(after_pending);
    ctx.transition("for_exit", &header, &after);
    Some(after)
}

/// Join `incoming` into a fresh merge block, erasing knowledge first if any
/// incoming path saw an unknown call. Zero incoming blocks means every path
/// diverged (both arms returned, say) — there is no `after` to return to.
fn merge(ctx: &mut EncodeCtx, incoming: Vec<Block>, label: &str) -> Option<Block> {
    if incoming.is_empty() {
        return None;
    }
    let erased = ctx.saw_unknown_call;
    if erased {
        ctx.erase_knowledge();
        ctx.saw_unknown_call = false;
    }

    // Every predecessor may carry a different SSA generation for a tracked
    // key (one branch assigned, the other didn't); the merge block's own
    // argument for that key must sit at or past the widest one seen, and
    // each predecessor's transition gets a phi equality binding its own
    // value to that argument (spec §4.2, §3 invariant 2). Keys `erase`
    // just havoced are skipped — rebinding them to a predecessor's
    // pre-erasure value would defeat the erasure.
    let keys: Vec<SsaKey> =
        ctx.phi_keys().into_iter().filter(|k| !(erased && ctx.is_erased_by_knowledge_erasure(*k))).collect();

    for key in &keys {
        let widest = widest_index(&incoming, *key);
        if widest > ctx.ssa.current_index(*key) {
            ctx.ssa.set_index(*key, widest).expect("merge widening only ever moves an index forward");
        }
        ctx.ssa.bump(*key);
    }

    let after = ctx.new_block(None);
    for from in &incoming {
        for key in &keys {
            let merged_sym = ctx.ssa.symbol(*key, after.entry.index_of(*key));
            let pred_sym = ctx.ssa.symbol(*key, from.entry.index_of(*key));
            if merged_sym != pred_sym {
                ctx.push_pending(merged_sym.eq(pred_sym));
            }
        }
        ctx.transition(label, from, &after);
    }
    Some(after)
}

fn encode_statement(ctx: &mut EncodeCtx, current: Block, stmt: &Statement) -> Option<Block> {
    match stmt {
        Statement::Block(stmts) => {
            let mut cur = Some(current);
            for s in stmts {
                cur = match cur {
                    Some(b) => encode_statement(ctx, b, s),
                    None => return None,
                };
            }
            cur
        }
        Statement::Expression(e) => {
            encode_expression(ctx, &current, e);
            Some(current)
        }
        Statement::VariableDeclaration { decl, init } => {
            ctx.known_locals.push((decl.id, decl.ty.clone()));
            ctx.ssa.register_name(SsaKey::Var(decl.id), decl.name.clone());
            if let Some(init) = init {
                let v = encode_expression(ctx, &current, init);
                let idx = ctx.ssa.bump(SsaKey::Var(decl.id));
                let sym = ctx.ssa.symbol(SsaKey::Var(decl.id), idx);
                ctx.push_pending(sym.eq(v));
            } else {
                ctx.ssa.bump(SsaKey::Var(decl.id));
            }
            Some(current)
        }
        Statement::If { cond, true_body, false_body } => {
            encode_if(ctx, current, cond, true_body, false_body.as_deref())
        }
        Statement::While { cond, body } => encode_while(ctx, current, cond, body),
        Statement::DoWhile { cond, body } => encode_do_while(ctx, current, cond, body),
        Statement::For { init, cond, post, body } => {
            encode_for(ctx, current, init.as_deref(), cond.as_ref(), post.as_deref(), body)
        }
        Statement::Break => {
            let (dest, _) = ctx.loop_stack.last().cloned().expect("break outside a loop is an encoder precondition violation");
            ctx.bind_transition("break", &current, &dest);
            None
        }
        Statement::Continue => {
            let (_, dest) = ctx.loop_stack.last().cloned().expect("continue outside a loop is an encoder precondition violation");
            ctx.bind_transition("continue", &current, &dest);
            None
        }
        Statement::Return(value) => {
            if let Some(v) = value {
                encode_expression(ctx, &current, v);
            }
            None
        }
    }
}

/// Entry point: `FunctionEntry` asserts parameter identity at SSA-0,
/// `err = 0`, `state = state(0)` (spec §4.2), then walks `body`. Returns
/// every block the walk fell through to without diverging — the non-
/// constructor exit (spec §4.3) wires a `FunctionSummary` rule from each.
pub fn encode_function_body(ctx: &mut EncodeCtx, entry_predicate: crate::predicate::PredicateId, body: &Statement) -> Vec<Block> {
    let entry = Block { predicate: entry_predicate, entry: ctx.ssa.snapshot() };
    ctx.push_pending(ctx.ssa.current_symbol(SsaKey::Error).eq(Term::int(0)));
    let root = ctx.new_block(None);
    ctx.transition("function_entry", &entry, &root);

    match encode_statement(ctx, root, body) {
        Some(exit) => vec![exit],
        None => Vec::new(),
    }
}

impl<'a> EncodeCtx<'a> {
    /// Build `Term::and([extra, *pending])` without disturbing `pending`
    /// itself — used where a branch condition must be folded in without yet
    /// committing to a transition (the transition's own `flush_pending`
    /// does that once the destination block exists).
    fn flush_pending_into_new(&self, extra: Term) -> Term {
        let mut all = vec![extra];
        all.extend(self.pending.iter().cloned());
        Term::and(all)
    }
}

fn encode_expression(ctx: &mut EncodeCtx, current: &Block, expr: &crate::ast::Expression) -> Term {
    use crate::ast::ExpressionKind as K;
    match &expr.kind {
        K::Literal | K::Identifier(_) | K::IndexAccess { .. } | K::MemberAccess { .. } => ctx.expr_term(expr.id),
        K::Binary { op, common_type, lhs, rhs } => {
            encode_expression(ctx, current, lhs);
            encode_expression(ctx, current, rhs);
            let result = ctx.expr_term(expr.id);
            if !op.is_comparison() {
                for spec in targets::arithmetic_target_specs(*op, common_type, &result) {
                    register_target(ctx, current, expr.id, spec.kind, spec.fires_when);
                }
            }
            result
        }
        K::Unary { operand, .. } => {
            encode_expression(ctx, current, operand);
            ctx.expr_term(expr.id)
        }
        K::Assignment { target, value } => {
            let v = encode_expression(ctx, current, value);
            let idx = ctx.ssa.bump(SsaKey::Var(*target));
            let sym = ctx.ssa.symbol(SsaKey::Var(*target), idx);
            ctx.push_pending(sym.clone().eq(v));
            sym
        }
        K::Call { kind, args } => {
            let arg_terms: Vec<Term> = args.iter().map(|a| encode_expression(ctx, current, a)).collect();
            call_encoder::encode_call(ctx, current, expr.id, kind, &arg_terms)
        }
    }
}

/// Shared by arithmetic/pop/addmod targets (spec §4.5): carry the error
/// flag forward as `new = ite(fires_when, site_id, old)`, then register the
/// `(from, fires_when, new)` triple.
pub fn register_target(ctx: &mut EncodeCtx, current: &Block, node: crate::ast::NodeId, kind: TargetKind, fires_when: Term) {
    let from = Term::and(vec![ctx.block_app(current), Term::and(ctx.pending.clone())]);
    let site_id = ctx.targets.new_error_id();
    let prev_error = ctx.ssa.current_symbol(SsaKey::Error);
    let idx = ctx.ssa.bump(SsaKey::Error);
    let new_error = ctx.ssa.symbol(SsaKey::Error, idx);
    ctx.push_pending(new_error.clone().eq(Term::ite(fires_when.clone(), Term::int(site_id as i128), prev_error)));
    ctx.targets.register(ctx.scope(), kind, node, from, fires_when, new_error, site_id);
}

/// `assert(cond)` (spec §4.5): unlike arithmetic targets, also records the
/// site in `FunctionAssertions` for the BFS aggregation `targets.rs`
/// performs at a public function's exit.
pub fn register_assert(ctx: &mut EncodeCtx, current: &Block, node: crate::ast::NodeId, cond: Term) {
    register_target(ctx, current, node, TargetKind::Assert, cond.not());
    ctx.assertions.record(ctx.scope(), node);
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ast::{
        CallKind, ContractDefinition, Expression, ExpressionKind, FunctionDefinition, NodeId, SourceUnit, StateMutability,
        Statement, Visibility,
    };

    fn int_ty() -> Type {
        Type::Integer { bits: 256, signed: false }
    }

    fn fixture() -> (SourceUnit, ContractId, FunctionId, VariableId) {
        let cid = ContractId(NodeId(1));
        let fid = FunctionId(NodeId(2));
        let svar = VariableId(NodeId(3));
        let unit = SourceUnit {
            contracts: vec![ContractDefinition {
                id: cid,
                name: "C".into(),
                bases: vec![],
                is_library: false,
                is_interface: false,
                state_variables: vec![crate::ast::VariableDeclaration { id: svar, name: "x".into(), ty: int_ty() }],
                constructor: None,
                functions: vec![FunctionDefinition {
                    id: fid,
                    name: "f".into(),
                    visibility: Visibility::Public,
                    mutability: StateMutability::Mutable,
                    params: vec![],
                    returns: vec![],
                    body: Statement::Block(vec![]),
                    is_constructor: false,
                }],
            }],
        };
        (unit, cid, fid, svar)
    }

    fn new_ctx<'a>(
        unit: &'a SourceUnit,
        contract: ContractId,
        function: FunctionId,
        svar: VariableId,
        predicates: &'a mut PredicateRegistry,
        ssa: &'a mut SsaIndexManager,
        rules: &'a mut RuleStore,
        targets: &'a mut TargetEngine,
        call_graph: &'a mut CallGraph,
        assertions: &'a mut FunctionAssertions,
    ) -> EncodeCtx<'a> {
        let mut state_var_set = std::collections::HashSet::new();
        state_var_set.insert(svar);
        EncodeCtx {
            unit,
            contract,
            function,
            predicates,
            ssa,
            rules,
            targets,
            call_graph,
            assertions,
            tracked_vars: vec![svar],
            n_state_vars: 1,
            n_params: 0,
            n_returns: 0,
            state_var_set,
            known_locals: Vec::new(),
            pending: Vec::new(),
            loop_stack: Vec::new(),
            saw_unknown_call: false,
        }
    }

    #[test]
    fn if_else_merges_both_branches_into_one_after_block() {
        let (unit, cid, fid, svar) = fixture();
        let (mut predicates, mut ssa, mut rules, mut targets_engine, mut call_graph, mut assertions) =
            (PredicateRegistry::new(), SsaIndexManager::new(), RuleStore::new(), TargetEngine::new(), CallGraph::new(), FunctionAssertions::new());
        let mut ctx = new_ctx(&unit, cid, fid, svar, &mut predicates, &mut ssa, &mut rules, &mut targets_engine, &mut call_graph, &mut assertions);

        let entry_pred = ctx.predicates.get_or_create(PredicateKey::FunctionEntry(fid, cid), PredicateKind::FunctionEntry, None, || {
            ("entry".into(), sort::function_block_sort(&unit, cid, fid), None)
        });
        let cond = Expression { id: NodeId(10), kind: ExpressionKind::Literal };
        let true_body = Statement::Block(vec![]);
        let false_body = Statement::Block(vec![]);
        let if_stmt = Statement::If { cond, true_body: Box::new(true_body), false_body: Some(Box::new(false_body)) };

        let exits = encode_function_body(&mut ctx, entry_pred, &if_stmt);
        assert_eq!(exits.len(), 1);
        // function_entry + if_true + if_false + one merge transition per
        // predecessor (2) == 5 rules
        assert_eq!(rules.len(), 5);
    }

    #[test]
    fn if_without_else_bumping_state_var_does_not_panic_on_merge() {
        let (unit, cid, fid, svar) = fixture();
        let (mut predicates, mut ssa, mut rules, mut targets_engine, mut call_graph, mut assertions) =
            (PredicateRegistry::new(), SsaIndexManager::new(), RuleStore::new(), TargetEngine::new(), CallGraph::new(), FunctionAssertions::new());
        let mut ctx = new_ctx(&unit, cid, fid, svar, &mut predicates, &mut ssa, &mut rules, &mut targets_engine, &mut call_graph, &mut assertions);

        let entry_pred = ctx.predicates.get_or_create(PredicateKey::FunctionEntry(fid, cid), PredicateKind::FunctionEntry, None, || {
            ("entry".into(), sort::function_block_sort(&unit, cid, fid), None)
        });
        let cond = Expression { id: NodeId(10), kind: ExpressionKind::Literal };
        let assign = Expression {
            id: NodeId(11),
            kind: ExpressionKind::Assignment { target: svar, value: Box::new(Expression { id: NodeId(12), kind: ExpressionKind::Literal }) },
        };
        let true_body = Statement::Block(vec![Statement::Expression(assign)]);
        let if_stmt = Statement::If { cond, true_body: Box::new(true_body), false_body: None };

        // Before the phi fix, `block_app(after)` named a symbol for `x`'s
        // bumped SSA generation that the false-branch predecessor never
        // produced, and `RuleStore::emit` panicked inside `transition`.
        let exits = encode_function_body(&mut ctx, entry_pred, &if_stmt);
        assert_eq!(exits.len(), 1);
    }

    #[test]
    fn if_without_else_containing_assert_does_not_panic_on_merge() {
        let (unit, cid, fid, svar) = fixture();
        let (mut predicates, mut ssa, mut rules, mut targets_engine, mut call_graph, mut assertions) =
            (PredicateRegistry::new(), SsaIndexManager::new(), RuleStore::new(), TargetEngine::new(), CallGraph::new(), FunctionAssertions::new());
        let mut ctx = new_ctx(&unit, cid, fid, svar, &mut predicates, &mut ssa, &mut rules, &mut targets_engine, &mut call_graph, &mut assertions);

        let entry_pred = ctx.predicates.get_or_create(PredicateKey::FunctionEntry(fid, cid), PredicateKind::FunctionEntry, None, || {
            ("entry".into(), sort::function_block_sort(&unit, cid, fid), None)
        });
        let cond = Expression { id: NodeId(10), kind: ExpressionKind::Literal };
        let assert_call = Expression {
            id: NodeId(11),
            kind: ExpressionKind::Call {
                kind: CallKind::Assert,
                args: vec![Expression { id: NodeId(12), kind: ExpressionKind::Literal }],
            },
        };
        let true_body = Statement::Block(vec![Statement::Expression(assert_call)]);
        let if_stmt = Statement::If { cond, true_body: Box::new(true_body), false_body: None };

        // `assert` bumps the error-flag SSA key inside the true branch only;
        // the merge's phi equality must bind it for the false predecessor
        // too, or `block_app(after)` names a symbol the false branch never
        // produced.
        let exits = encode_function_body(&mut ctx, entry_pred, &if_stmt);
        assert_eq!(exits.len(), 1);
    }

    #[test]
    fn unknown_call_in_branch_forces_erasure_at_merge() {
        let (unit, cid, fid, svar) = fixture();
        let (mut predicates, mut ssa, mut rules, mut targets_engine, mut call_graph, mut assertions) =
            (PredicateRegistry::new(), SsaIndexManager::new(), RuleStore::new(), TargetEngine::new(), CallGraph::new(), FunctionAssertions::new());
        let mut ctx = new_ctx(&unit, cid, fid, svar, &mut predicates, &mut ssa, &mut rules, &mut targets_engine, &mut call_graph, &mut assertions);

        let before = ctx.ssa.current_index(SsaKey::Var(svar));
        ctx.saw_unknown_call = true;
        let entry_block = ctx.new_block(None);
        let after = merge(&mut ctx, vec![entry_block], "merge").unwrap();
        assert!(ctx.ssa.current_index(SsaKey::Var(svar)) > before);
        assert_eq!(after.entry.index_of(SsaKey::Var(svar)), ctx.ssa.current_index(SsaKey::Var(svar)));
    }

    #[test]
    fn for_continue_targets_post_step_not_header() {
        let (unit, cid, fid, svar) = fixture();
        let (mut predicates, mut ssa, mut rules, mut targets_engine, mut call_graph, mut assertions) =
            (PredicateRegistry::new(), SsaIndexManager::new(), RuleStore::new(), TargetEngine::new(), CallGraph::new(), FunctionAssertions::new());
        let mut ctx = new_ctx(&unit, cid, fid, svar, &mut predicates, &mut ssa, &mut rules, &mut targets_engine, &mut call_graph, &mut assertions);

        let entry_pred = ctx.predicates.get_or_create(PredicateKey::FunctionEntry(fid, cid), PredicateKind::FunctionEntry, None, || {
            ("entry".into(), sort::function_block_sort(&unit, cid, fid), None)
        });
        let inner_cond = Expression { id: NodeId(20), kind: ExpressionKind::Literal };
        let body = Statement::If { cond: inner_cond, true_body: Box::new(Statement::Continue), false_body: None };
        let post = Statement::Expression(Expression {
            id: NodeId(21),
            kind: ExpressionKind::Assignment { target: svar, value: Box::new(Expression { id: NodeId(22), kind: ExpressionKind::Literal }) },
        });
        let for_stmt = Statement::For { init: None, cond: None, post: Some(Box::new(post)), body: Box::new(body) };

        encode_function_body(&mut ctx, entry_pred, &for_stmt);

        let for_pre_head: Vec<_> = rules.as_slice().iter().find(|r| r.name == "for_pre").unwrap().head.predicate_applications();
        let continue_head: Vec<_> = rules.as_slice().iter().find(|r| r.name == "continue").unwrap().head.predicate_applications();
        assert_ne!(for_pre_head, continue_head, "continue must not jump straight to the loop header");

        let back_edge_head: Vec<_> = rules.as_slice().iter().find(|r| r.name == "for_back_edge").unwrap().head.predicate_applications();
        assert_eq!(for_pre_head, back_edge_head, "the post-step must still close the loop back to the header");
    }

    #[test]
    fn break_outside_block_jumps_to_loop_destination() {
        let (unit, cid, fid, svar) = fixture();
        let (mut predicates, mut ssa, mut rules, mut targets_engine, mut call_graph, mut assertions) =
            (PredicateRegistry::new(), SsaIndexManager::new(), RuleStore::new(), TargetEngine::new(), CallGraph::new(), FunctionAssertions::new());
        let mut ctx = new_ctx(&unit, cid, fid, svar, &mut predicates, &mut ssa, &mut rules, &mut targets_engine, &mut call_graph, &mut assertions);

        let current = ctx.new_block(None);
        let dest = ctx.new_block(None);
        let continue_dest = ctx.new_block(None);
        ctx.loop_stack.push((dest, continue_dest));
        let result = encode_statement(&mut ctx, current, &Statement::Break);
        assert!(result.is_none());
        assert_eq!(rules.len(), 1);
    }
}
