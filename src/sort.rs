//! Sort Builder
//!
//! Computes the sort tuple (background-theory signature) of each predicate
//! family from contract/function shape, deterministically — spec §4.1:
//! "Sorts must be generated deterministically from AST identity so that
//! repeated runs produce the same predicates." Mirrors how the teacher's
//! `domain.rs` derives a `Domain`'s shape deterministically from
//! `(n, omega, zh_c)` and exposes a stable digest (`domain_digest`) for
//! round-trip tests; `sort_digest` plays the same role here (spec §8
//! round-trip laws).

use crate::ast::{ContractId, FunctionId, SourceUnit, Type};
use blake3::Hasher;
use serde::{Deserialize, Serialize};

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub enum Sort {
    Bool,
    Int,
    Address,
    /// The opaque blockchain-state record (balance, block, msg, ...) —
    /// spec §6 `state()`/`newState()`.
    State,
    Array(Box<Sort>),
}

impl Sort {
    fn tag(&self) -> &'static str {
        match self {
            Sort::Bool => "bool",
            Sort::Int => "int",
            Sort::Address => "address",
            Sort::State => "state",
            Sort::Array(_) => "array",
        }
    }

    fn hash_into(&self, hasher: &mut Hasher) {
        hasher.update(self.tag().as_bytes());
        if let Sort::Array(inner) = self {
            inner.hash_into(hasher);
        }
    }
}

/// Map a contract-language type onto its background-theory sort. Arrays of
/// any element type collapse to an uninterpreted `Sort::Array` wrapper —
/// the encoder only ever needs array *length* (for `PopEmptyArray`, spec
/// §4.5), never element access, so the element sort is not tracked further.
pub fn sort_of_type(ty: &Type) -> Sort {
    match ty {
        Type::Bool => Sort::Bool,
        Type::Integer { .. } => Sort::Int,
        Type::Address => Sort::Address,
        Type::Array { base } => Sort::Array(Box::new(sort_of_type(base))),
        Type::Mapping { value } => Sort::Array(Box::new(sort_of_type(value))),
        Type::Other(_) => Sort::Int,
    }
}

fn state_var_sorts(unit: &SourceUnit, contract: ContractId) -> Vec<Sort> {
    unit.state_variables_including_inherited(contract).iter().map(|v| sort_of_type(&v.ty)).collect()
}

/// `interface(C)` sort: `(address, state, S̄)` — spec §4.1.
pub fn interface_sort(unit: &SourceUnit, contract: ContractId) -> Vec<Sort> {
    let mut sort = vec![Sort::Address, Sort::State];
    sort.extend(state_var_sorts(unit, contract));
    sort
}

/// `nondet-interface(C)` sort: `(err, address, state0, S̄0, state1, S̄1)`.
pub fn nondet_interface_sort(unit: &SourceUnit, contract: ContractId) -> Vec<Sort> {
    let svars = state_var_sorts(unit, contract);
    let mut sort = vec![Sort::Int, Sort::Address, Sort::State];
    sort.extend(svars.clone());
    sort.push(Sort::State);
    sort.extend(svars);
    sort
}

/// `implicit-constructor(C)` sort: `(err, address, state)`.
pub fn implicit_constructor_sort() -> Vec<Sort> {
    vec![Sort::Int, Sort::Address, Sort::State]
}

/// `constructor-summary(C)` sort, matching a constructor call shape:
/// `(err, address, state_pre, S̄_pre, params, state_post, S̄_post)`.
pub fn constructor_summary_sort(unit: &SourceUnit, contract: ContractId) -> Vec<Sort> {
    let svars = state_var_sorts(unit, contract);
    let params = unit
        .contract(contract)
        .and_then(|c| c.constructor.as_ref())
        .map(|f| f.params.iter().map(|p| sort_of_type(&p.ty)).collect::<Vec<_>>())
        .unwrap_or_default();
    let mut sort = vec![Sort::Int, Sort::Address, Sort::State];
    sort.extend(svars.clone());
    sort.extend(params);
    sort.push(Sort::State);
    sort.extend(svars);
    sort
}

/// `function-summary(f,C)` sort:
/// `(err, address, state_pre, S̄_pre, params, state_post, S̄_post, params_post, returns)`.
pub fn function_summary_sort(unit: &SourceUnit, contract: ContractId, function: FunctionId) -> Vec<Sort> {
    let svars = state_var_sorts(unit, contract);
    let f = unit
        .contract(contract)
        .and_then(|c| c.functions.iter().find(|f| f.id == function))
        .expect("function must belong to contract");
    let params: Vec<Sort> = f.params.iter().map(|p| sort_of_type(&p.ty)).collect();
    let returns: Vec<Sort> = f.returns.iter().map(|r| sort_of_type(&r.ty)).collect();

    let mut sort = vec![Sort::Int, Sort::Address, Sort::State];
    sort.extend(svars.clone());
    sort.extend(params.clone());
    sort.push(Sort::State);
    sort.extend(svars);
    sort.extend(params);
    sort.extend(returns);
    sort
}

/// Block-predicate sort for the constructor's own body walk: `(err, address,
/// state, S̄, params)` — a constructor never has return values, so this is
/// `function_block_sort` minus the trailing `returns` segment. Contracts with
/// no explicit constructor still walk a (trivial) body under this sort with
/// `params = []` (spec §8 "no explicit constructor" boundary case).
pub fn constructor_block_sort(unit: &SourceUnit, contract: ContractId) -> Vec<Sort> {
    let svars = state_var_sorts(unit, contract);
    let params: Vec<Sort> =
        unit.contract(contract).and_then(|c| c.constructor.as_ref()).map(|f| f.params.iter().map(|p| sort_of_type(&p.ty)).collect()).unwrap_or_default();
    let mut sort = vec![Sort::Int, Sort::Address, Sort::State];
    sort.extend(svars);
    sort.extend(params);
    sort
}

/// `function-entry(f)` / per-block sort: the live state threaded through a
/// function body — `(err, address, state, S̄, params, returns)`. Locals
/// declared mid-body are tracked by the SSA manager but are not part of the
/// block predicate's own signature; they are folded away at `endVisit`
/// (spec §4.2/§4.3), matching how the teacher's `AirSpec`/`Locals` keep a
/// block's *shape* fixed while row-local values flow through separately.
pub fn function_block_sort(unit: &SourceUnit, contract: ContractId, function: FunctionId) -> Vec<Sort> {
    let svars = state_var_sorts(unit, contract);
    let f = unit
        .contract(contract)
        .and_then(|c| c.functions.iter().find(|f| f.id == function))
        .or_else(|| unit.contract(contract).and_then(|c| c.constructor.as_ref()).filter(|f| f.id == function))
        .expect("function must belong to contract");
    let params: Vec<Sort> = f.params.iter().map(|p| sort_of_type(&p.ty)).collect();
    let returns: Vec<Sort> = f.returns.iter().map(|r| sort_of_type(&r.ty)).collect();

    let mut sort = vec![Sort::Int, Sort::Address, Sort::State];
    sort.extend(svars);
    sort.extend(params);
    sort.extend(returns);
    sort
}

/// Stable 32-byte digest of a sort tuple, used by round-trip tests to
/// assert that re-running `analyze` on the same input produces identical
/// predicate signatures (spec §8).
pub fn sort_digest(sort: &[Sort]) -> [u8; 32] {
    let mut hasher = Hasher::new();
    hasher.update(&(sort.len() as u64).to_le_bytes());
    for s in sort {
        s.hash_into(&mut hasher);
    }
    *hasher.finalize().as_bytes()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ast::{ContractDefinition, NodeId, VariableDeclaration, VariableId};

    fn unit_with_two_uint_state_vars() -> (SourceUnit, ContractId) {
        let cid = ContractId(NodeId(1));
        let unit = SourceUnit {
            contracts: vec![ContractDefinition {
                id: cid,
                name: "C".into(),
                bases: vec![],
                is_library: false,
                is_interface: false,
                state_variables: vec![
                    VariableDeclaration { id: VariableId(NodeId(10)), name: "a".into(), ty: Type::Integer { bits: 256, signed: false } },
                    VariableDeclaration { id: VariableId(NodeId(11)), name: "b".into(), ty: Type::Bool },
                ],
                constructor: None,
                functions: vec![],
            }],
        };
        (unit, cid)
    }

    #[test]
    fn interface_sort_is_address_state_then_state_vars() {
        let (unit, cid) = unit_with_two_uint_state_vars();
        let sort = interface_sort(&unit, cid);
        assert_eq!(sort, vec![Sort::Address, Sort::State, Sort::Int, Sort::Bool]);
    }

    #[test]
    fn sort_digest_is_deterministic_and_order_sensitive() {
        let (unit, cid) = unit_with_two_uint_state_vars();
        let s1 = interface_sort(&unit, cid);
        let s2 = interface_sort(&unit, cid);
        assert_eq!(sort_digest(&s1), sort_digest(&s2));

        let reordered = vec![Sort::Address, Sort::State, Sort::Bool, Sort::Int];
        assert_ne!(sort_digest(&s1), sort_digest(&reordered));
    }
}
