//! Analyzer configuration (spec §7)
//!
//! Precedence is CLI flags over a TOML file over built-in defaults, mirroring
//! how the teacher's `tinyzkp_api` binary layers `std::env::var` overrides on
//! top of hardcoded fallbacks. Here the file layer uses `toml`/`serde` instead
//! of environment variables since the analyzer is a library with an
//! orchestrating CLI (`bin/chc_verify.rs`), not a long-running service.

use crate::targets::TargetKind;
use serde::{Deserialize, Serialize};
use std::path::Path;
use std::time::Duration;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("failed to read config file {path}: {source}")]
    Read { path: String, #[source] source: std::io::Error },
    #[error("failed to parse config file {path}: {source}")]
    Parse { path: String, #[source] source: toml::de::Error },
}

/// How loudly `analysis.rs` should report a solver verdict of `Unknown`
/// (spec §4.6/§7: "Unknown ... warn-if-configured").
#[derive(Copy, Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Verbosity {
    Quiet,
    Normal,
    Verbose,
}

impl Default for Verbosity {
    fn default() -> Self {
        Verbosity::Normal
    }
}

/// On-disk/CLI-facing shape: every field optional so a partial TOML file (or
/// partial CLI override set) only overrides what it mentions, per the
/// file-then-defaults / CLI-then-file precedence chain.
#[derive(Clone, Debug, Default, Serialize, Deserialize)]
pub struct ConfigOverrides {
    pub solver_timeout_ms: Option<u64>,
    pub enabled_targets: Option<Vec<TargetKind>>,
    pub report_unknown: Option<bool>,
    pub verbosity: Option<Verbosity>,
}

impl ConfigOverrides {
    pub fn from_toml_file(path: impl AsRef<Path>) -> Result<Self, ConfigError> {
        let path = path.as_ref();
        let text = std::fs::read_to_string(path).map_err(|source| ConfigError::Read { path: path.display().to_string(), source })?;
        toml::from_str(&text).map_err(|source| ConfigError::Parse { path: path.display().to_string(), source })
    }

    fn merge(self, more_specific: ConfigOverrides) -> ConfigOverrides {
        ConfigOverrides {
            solver_timeout_ms: more_specific.solver_timeout_ms.or(self.solver_timeout_ms),
            enabled_targets: more_specific.enabled_targets.or(self.enabled_targets),
            report_unknown: more_specific.report_unknown.or(self.report_unknown),
            verbosity: more_specific.verbosity.or(self.verbosity),
        }
    }
}

/// The resolved configuration `analysis.rs` actually runs with.
#[derive(Clone, Debug, PartialEq)]
pub struct AnalyzerConfig {
    pub solver_timeout: Duration,
    pub enabled_targets: Vec<TargetKind>,
    pub report_unknown: bool,
    pub verbosity: Verbosity,
}

impl Default for AnalyzerConfig {
    fn default() -> Self {
        AnalyzerConfig {
            solver_timeout: Duration::from_millis(10_000),
            enabled_targets: vec![
                TargetKind::Assert,
                TargetKind::Underflow,
                TargetKind::Overflow,
                TargetKind::DivByZero,
                TargetKind::PopEmptyArray,
            ],
            report_unknown: false,
            verbosity: Verbosity::Normal,
        }
    }
}

impl AnalyzerConfig {
    /// Layer `file` over the built-in defaults, then `cli` over the result —
    /// CLI wins, file wins over defaults, an absent layer changes nothing.
    pub fn resolve(file: Option<ConfigOverrides>, cli: Option<ConfigOverrides>) -> AnalyzerConfig {
        let base = ConfigOverrides::default();
        let merged = base.merge(file.unwrap_or_default()).merge(cli.unwrap_or_default());
        let defaults = AnalyzerConfig::default();
        AnalyzerConfig {
            solver_timeout: merged.solver_timeout_ms.map(Duration::from_millis).unwrap_or(defaults.solver_timeout),
            enabled_targets: merged.enabled_targets.unwrap_or(defaults.enabled_targets),
            report_unknown: merged.report_unknown.unwrap_or(defaults.report_unknown),
            verbosity: merged.verbosity.unwrap_or(defaults.verbosity),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn resolve_with_no_layers_is_default() {
        assert_eq!(AnalyzerConfig::resolve(None, None), AnalyzerConfig::default());
    }

    #[test]
    fn cli_overrides_file_which_overrides_defaults() {
        let file = ConfigOverrides { solver_timeout_ms: Some(5_000), report_unknown: Some(true), ..Default::default() };
        let cli = ConfigOverrides { solver_timeout_ms: Some(1_000), ..Default::default() };
        let cfg = AnalyzerConfig::resolve(Some(file), Some(cli));

        assert_eq!(cfg.solver_timeout, Duration::from_millis(1_000));
        assert!(cfg.report_unknown);
        assert_eq!(cfg.verbosity, Verbosity::Normal);
    }

    #[test]
    fn parsing_malformed_toml_reports_parse_error() {
        let dir = std::env::temp_dir().join("chc_verify_config_test_malformed.toml");
        std::fs::write(&dir, "solver_timeout_ms = not_a_number").unwrap();
        let result = ConfigOverrides::from_toml_file(&dir);
        std::fs::remove_file(&dir).ok();
        assert!(matches!(result, Err(ConfigError::Parse { .. })));
    }
}
