//! Narrow AST stand-in
//!
//! The source-language parser and type checker are explicitly out of scope
//! (spec §1): this crate never parses Solidity-like source. What follows is
//! the minimal *typed* shape the encoder needs to walk — contracts,
//! functions, statements, and just enough expression structure to recognize
//! the call/operator patterns that drive target generation (§4.5) and call
//! encoding (§4.4). It is deliberately not a general expression AST: operand
//! *values* are never interpreted here, only shapes (operator kind, operand
//! static type, call kind). Turning a node into an SMT term is the base
//! symbolic encoder's job (`SymbolicContext::expr`, see `context.rs`).
//!
//! Fixtures for tests/CLI live as JSON and deserialize straight into
//! `SourceUnit` via `serde`.

use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

/// Identity of any AST node, unique within one `SourceUnit`. Stable across
/// re-runs as long as the caller constructs the unit the same way (spec §3
/// invariant 1 relies on this for predicate-name determinism).
#[derive(Copy, Clone, Debug, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct NodeId(pub u32);

/// A variable declaration's identity (state variable, parameter, return, or
/// local). Wraps `NodeId` rather than reusing it bare so call sites can't
/// mix up "some node" and "a variable."
#[derive(Copy, Clone, Debug, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct VariableId(pub NodeId);

/// Identity of a `ContractDefinition`.
#[derive(Copy, Clone, Debug, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct ContractId(pub NodeId);

/// Identity of a `FunctionDefinition` (constructors included).
#[derive(Copy, Clone, Debug, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct FunctionId(pub NodeId);

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub enum Type {
    Bool,
    Integer { bits: u16, signed: bool },
    Address,
    Array { base: Box<Type> },
    Mapping { value: Box<Type> },
    Other(String),
}

impl Type {
    /// `T.min` for integer types, as an i128 (wide enough for uint256 is not
    /// representable in i128 — callers needing the exact 256-bit bound
    /// consult `Type::bound_literal` instead; this helper is for the common
    /// narrower widths used in tests and small contracts).
    pub fn signed(&self) -> bool {
        matches!(self, Type::Integer { signed: true, .. })
    }

    pub fn bits(&self) -> Option<u16> {
        match self {
            Type::Integer { bits, .. } => Some(*bits),
            _ => None,
        }
    }

    pub fn is_integer(&self) -> bool {
        matches!(self, Type::Integer { .. })
    }
}

#[derive(Copy, Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub enum Visibility {
    Public,
    External,
    Internal,
    Private,
}

impl Visibility {
    pub fn is_externally_callable(self) -> bool {
        matches!(self, Visibility::Public | Visibility::External)
    }
}

#[derive(Copy, Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub enum StateMutability {
    Mutable,
    View,
    Pure,
}

impl StateMutability {
    pub fn advances_state(self) -> bool {
        matches!(self, StateMutability::Mutable)
    }
}

#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct VariableDeclaration {
    pub id: VariableId,
    pub name: String,
    pub ty: Type,
}

#[derive(Copy, Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub enum BinaryOp {
    Add,
    Sub,
    Mul,
    Div,
    Mod,
    Lt,
    Le,
    Gt,
    Ge,
    Eq,
    Ne,
    And,
    Or,
    BitAnd,
    BitOr,
    BitXor,
    Shl,
    Shr,
}

impl BinaryOp {
    pub fn is_comparison(self) -> bool {
        matches!(self, BinaryOp::Lt | BinaryOp::Le | BinaryOp::Gt | BinaryOp::Ge | BinaryOp::Eq | BinaryOp::Ne)
    }
}

#[derive(Copy, Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub enum UnknownCallKind {
    Delegate,
    LowLevel,
    Creation,
}

/// What kind of call a `Call` expression performs. This is the one piece of
/// "expression semantics" the encoder must recognize itself (§4.4, §4.5) —
/// everything else about a call's arguments is opaque.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub enum CallKind {
    /// Call to a function defined in the current contract or a base/library,
    /// resolved statically.
    Internal(FunctionId),
    /// Call through a contract-typed expression (`c.f(...)`). `is_static` is
    /// true for a `view`/`pure` callee as seen from the call site.
    External { is_static: bool },
    /// `delegatecall`/low-level `call`/`staticcall`/`new C(...)`.
    Unknown(UnknownCallKind),
    /// `assert(x)`.
    Assert,
    /// `require(x, ...)` — never generates a target (spec §4.5 only lists
    /// `assert`), but narrows path conditions the same way `if` does.
    Require,
    /// `arr.pop()`.
    ArrayPop,
    Addmod,
    Mulmod,
}

#[derive(Clone, Debug, Serialize, Deserialize)]
pub enum ExpressionKind {
    Literal,
    Identifier(VariableId),
    Binary { op: BinaryOp, common_type: Type, lhs: Box<Expression>, rhs: Box<Expression> },
    Unary { op: BinaryOp, operand: Box<Expression> },
    Assignment { target: VariableId, value: Box<Expression> },
    Call { kind: CallKind, args: Vec<Expression> },
    /// `base[index]`; `index` is `None` for `arr.length`-style bare access.
    IndexAccess { base: Box<Expression>, index: Option<Box<Expression>> },
    MemberAccess { base: Box<Expression>, member: String },
}

#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct Expression {
    pub id: NodeId,
    pub kind: ExpressionKind,
}

impl Expression {
    /// Visit `self` and every nested sub-expression, innermost-first call
    /// order not guaranteed — callers that care about evaluation order
    /// (none currently do: target registration and call recording are
    /// order-independent within one statement) should not rely on it.
    pub fn for_each_subexpression<'a>(&'a self, f: &mut impl FnMut(&'a Expression)) {
        f(self);
        match &self.kind {
            ExpressionKind::Literal | ExpressionKind::Identifier(_) => {}
            ExpressionKind::Binary { lhs, rhs, .. } => {
                lhs.for_each_subexpression(f);
                rhs.for_each_subexpression(f);
            }
            ExpressionKind::Unary { operand, .. } => operand.for_each_subexpression(f),
            ExpressionKind::Assignment { value, .. } => value.for_each_subexpression(f),
            ExpressionKind::Call { args, .. } => args.iter().for_each(|a| a.for_each_subexpression(f)),
            ExpressionKind::IndexAccess { base, index } => {
                base.for_each_subexpression(f);
                if let Some(i) = index {
                    i.for_each_subexpression(f);
                }
            }
            ExpressionKind::MemberAccess { base, .. } => base.for_each_subexpression(f),
        }
    }
}

#[derive(Clone, Debug, Serialize, Deserialize)]
pub enum Statement {
    Expression(Expression),
    VariableDeclaration { decl: VariableDeclaration, init: Option<Expression> },
    If { cond: Expression, true_body: Box<Statement>, false_body: Option<Box<Statement>> },
    While { cond: Expression, body: Box<Statement> },
    DoWhile { cond: Expression, body: Box<Statement> },
    For {
        init: Option<Box<Statement>>,
        cond: Option<Expression>,
        post: Option<Box<Statement>>,
        body: Box<Statement>,
    },
    Break,
    Continue,
    Return(Option<Expression>),
    Block(Vec<Statement>),
}

#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct FunctionDefinition {
    pub id: FunctionId,
    pub name: String,
    pub visibility: Visibility,
    pub mutability: StateMutability,
    pub params: Vec<VariableDeclaration>,
    pub returns: Vec<VariableDeclaration>,
    pub body: Statement,
    pub is_constructor: bool,
}

#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct ContractDefinition {
    pub id: ContractId,
    pub name: String,
    /// Base contracts in declaration order (nearest first); `linearize`
    /// turns this into the full C3-style list used by §4.1/§4.3.
    pub bases: Vec<ContractId>,
    pub is_library: bool,
    pub is_interface: bool,
    pub state_variables: Vec<VariableDeclaration>,
    pub constructor: Option<FunctionDefinition>,
    pub functions: Vec<FunctionDefinition>,
}

impl ContractDefinition {
    pub fn is_public_non_constructor(&self, f: &FunctionDefinition) -> bool {
        !f.is_constructor && f.visibility.is_externally_callable() && !self.is_library && !self.is_interface
    }
}

#[derive(Clone, Debug, Default, Serialize, Deserialize)]
pub struct SourceUnit {
    pub contracts: Vec<ContractDefinition>,
}

impl SourceUnit {
    pub fn contract(&self, id: ContractId) -> Option<&ContractDefinition> {
        self.contracts.iter().find(|c| c.id == id)
    }

    /// Linearize `contract`'s inheritance list as `[contract, bases...]`,
    /// most-derived first, matching spec §4.1. Depth-first over `bases`
    /// with later duplicates dropped (keeps the first, most-specific
    /// occurrence) — a simplification of full C3 linearization that is
    /// sufficient for single- and simple multiple-inheritance fixtures.
    pub fn linearize(&self, contract: ContractId) -> Vec<ContractId> {
        let mut order = Vec::new();
        let mut seen = BTreeMap::new();
        self.linearize_into(contract, &mut order, &mut seen);
        order
    }

    fn linearize_into(&self, id: ContractId, order: &mut Vec<ContractId>, seen: &mut BTreeMap<ContractId, ()>) {
        if seen.contains_key(&id) {
            return;
        }
        seen.insert(id, ());
        order.push(id);
        if let Some(c) = self.contract(id) {
            for base in &c.bases {
                self.linearize_into(*base, order, seen);
            }
        }
    }

    /// All state variables visible in `contract`, including inherited ones,
    /// most-derived first, de-duplicated by `VariableId` (spec §6
    /// `stateVariablesIncludingInheritedAndPrivate`).
    pub fn state_variables_including_inherited(&self, contract: ContractId) -> Vec<VariableDeclaration> {
        let mut out = Vec::new();
        let mut seen = BTreeMap::new();
        for cid in self.linearize(contract) {
            if let Some(c) = self.contract(cid) {
                for v in &c.state_variables {
                    if seen.insert(v.id, ()).is_none() {
                        out.push(v.clone());
                    }
                }
            }
        }
        out
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn cid(n: u32) -> ContractId {
        ContractId(NodeId(n))
    }

    #[test]
    fn linearize_is_most_derived_first_and_dedups_diamond() {
        let mut unit = SourceUnit::default();
        unit.contracts.push(ContractDefinition {
            id: cid(3),
            name: "Base".into(),
            bases: vec![],
            is_library: false,
            is_interface: false,
            state_variables: vec![],
            constructor: None,
            functions: vec![],
        });
        unit.contracts.push(ContractDefinition {
            id: cid(2),
            name: "Mid".into(),
            bases: vec![cid(3)],
            is_library: false,
            is_interface: false,
            state_variables: vec![],
            constructor: None,
            functions: vec![],
        });
        unit.contracts.push(ContractDefinition {
            id: cid(1),
            name: "Top".into(),
            bases: vec![cid(2), cid(3)],
            is_library: false,
            is_interface: false,
            state_variables: vec![],
            constructor: None,
            functions: vec![],
        });

        let order = unit.linearize(cid(1));
        assert_eq!(order, vec![cid(1), cid(2), cid(3)]);
    }
}
