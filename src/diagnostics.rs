//! Diagnostic reporter interface and the stable error-id table
//!
//! The diagnostic reporter itself is out of scope (spec §1); this module
//! only defines the narrow `DiagnosticSink` trait it must implement (spec
//! §6) and the stable ids golden-tested against spec §6's taxonomy.

use crate::ast::NodeId;
use serde::{Deserialize, Serialize};

/// Stable error ids (spec §6). Never renumber these — downstream tooling
/// keys off them.
pub mod error_ids {
    pub const ASSERT: u32 = 6328;
    pub const POP_EMPTY_ARRAY: u32 = 2529;
    pub const UNDERFLOW: u32 = 3944;
    pub const OVERFLOW: u32 = 4984;
    pub const DIV_BY_ZERO: u32 = 4281;
    pub const SOLVER_ERROR: u32 = 1218;
    pub const CONFLICTING_SOLVERS: u32 = 1988;
}

#[derive(Copy, Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct SourceLocation {
    pub node: NodeId,
}

/// A sink for user-facing warnings. The core never decides how/where a
/// warning is displayed — it only calls this once per reportable outcome
/// (spec §6, §7).
pub trait DiagnosticSink {
    fn warning(&mut self, error_id: u32, location: SourceLocation, message: &str, secondary: Option<SourceLocation>);
}

/// An in-memory sink that records every warning it receives, in order.
/// Used by tests and by the CLI (`--format json`) as a concrete
/// `DiagnosticSink` without wiring up real diagnostics plumbing.
#[derive(Default, Clone, Debug, Serialize, Deserialize)]
pub struct CollectingSink {
    pub warnings: Vec<Warning>,
}

#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct Warning {
    pub error_id: u32,
    pub location: SourceLocation,
    pub message: String,
    pub secondary: Option<SourceLocation>,
}

impl DiagnosticSink for CollectingSink {
    fn warning(&mut self, error_id: u32, location: SourceLocation, message: &str, secondary: Option<SourceLocation>) {
        self.warnings.push(Warning { error_id, location, message: message.to_string(), secondary });
    }
}
