//! chc-verify — "happy-path" crate API
//!
//! Wraps the encoder/orchestrator core with a small, ergonomic surface:
//! - `AnalyzerBuilder` hides config-resolution/reset wiring (safe defaults)
//! - one-shot `analyze_source_unit` for the common case (load, analyze, done)
//! - `adapters::load_source_unit_json` / `adapters::load_config_toml` for the
//!   two on-disk formats this crate reads
//! - `io::write_report_json` / `io::read_report_json` for persisting an
//!   `AnalysisReport`
//!
//! Everything here delegates to `analysis::Analyzer` and `config::*`; no
//! encoding logic lives in this module.

#![forbid(unsafe_code)]

use std::path::Path;

use crate::analysis::{AnalysisReport, Analyzer};
use crate::ast::SourceUnit;
use crate::config::{AnalyzerConfig, ConfigOverrides, Verbosity};
use crate::diagnostics::DiagnosticSink;
use crate::solver::ChcSolver;

/// Ergonomic constructor for an `Analyzer`.
///
/// Defaults: the built-in `AnalyzerConfig::default()` (10s solver timeout,
/// every target kind enabled, `Unknown` verdicts not reported, normal
/// verbosity).
pub struct AnalyzerBuilder {
    file_overrides: Option<ConfigOverrides>,
    cli_overrides: Option<ConfigOverrides>,
}

impl AnalyzerBuilder {
    pub fn new() -> Self {
        Self { file_overrides: None, cli_overrides: None }
    }

    /// Layer a TOML config file under any later CLI overrides.
    pub fn config_file(mut self, overrides: ConfigOverrides) -> Self {
        self.file_overrides = Some(overrides);
        self
    }

    /// Layer explicit overrides on top of the config file and defaults —
    /// the layer a CLI's flag parsing should populate.
    pub fn cli_overrides(mut self, overrides: ConfigOverrides) -> Self {
        self.cli_overrides = Some(overrides);
        self
    }

    pub fn verbosity(mut self, verbosity: Verbosity) -> Self {
        let mut cli = self.cli_overrides.unwrap_or_default();
        cli.verbosity = Some(verbosity);
        self.cli_overrides = Some(cli);
        self
    }

    pub fn report_unknown(mut self, report: bool) -> Self {
        let mut cli = self.cli_overrides.unwrap_or_default();
        cli.report_unknown = Some(report);
        self.cli_overrides = Some(cli);
        self
    }

    pub fn build<S: ChcSolver>(self, solver: S) -> Analyzer<S> {
        let config = AnalyzerConfig::resolve(self.file_overrides, self.cli_overrides);
        Analyzer::new(solver, config)
    }
}

impl Default for AnalyzerBuilder {
    fn default() -> Self {
        Self::new()
    }
}

/// Load, analyze, and return the report in one call — the common case for a
/// CLI or a one-shot library consumer that doesn't need to run more than one
/// `SourceUnit` through the same `Analyzer`.
pub fn analyze_source_unit<S: ChcSolver>(
    unit: &SourceUnit,
    solver: S,
    config: AnalyzerConfig,
    sink: &mut impl DiagnosticSink,
) -> AnalysisReport {
    let mut analyzer = Analyzer::new(solver, config);
    analyzer.analyze(unit, sink)
}

pub mod adapters {
    //! On-disk input loaders: a JSON `SourceUnit` fixture and a TOML config
    //! file. Both are thin `serde`/`toml` wrappers — the parsing itself
    //! belongs to those crates, not to this module.

    use super::*;
    use crate::config::ConfigError;

    pub fn load_source_unit_json(path: impl AsRef<Path>) -> anyhow::Result<SourceUnit> {
        let path = path.as_ref();
        let text = std::fs::read_to_string(path).map_err(|e| anyhow::anyhow!("read {}: {e}", path.display()))?;
        serde_json::from_str(&text).map_err(|e| anyhow::anyhow!("parse {} as a source unit: {e}", path.display()))
    }

    pub fn load_config_toml(path: impl AsRef<Path>) -> Result<ConfigOverrides, ConfigError> {
        ConfigOverrides::from_toml_file(path)
    }
}

pub mod io {
    //! `AnalysisReport` persistence. Unlike the CHC rules/predicates
    //! themselves (which only ever live in memory for one `analyze` call),
    //! a report is a natural thing to write to disk and diff across runs,
    //! so this is a plain JSON read/write pair rather than a bespoke binary
    //! format.

    use super::*;
    use std::fs;

    pub fn write_report_json(path: &Path, report: &AnalysisReport) -> anyhow::Result<()> {
        let text = serde_json::to_string_pretty(report).map_err(|e| anyhow::anyhow!("serialize report: {e}"))?;
        fs::write(path, text).map_err(|e| anyhow::anyhow!("write {}: {e}", path.display()))
    }

    pub fn read_report_json(path: &Path) -> anyhow::Result<AnalysisReport> {
        let text = fs::read_to_string(path).map_err(|e| anyhow::anyhow!("read {}: {e}", path.display()))?;
        serde_json::from_str(&text).map_err(|e| anyhow::anyhow!("parse {} as an analysis report: {e}", path.display()))
    }
}
