//! chc_verify — CLI front door over the `chc_verify` library
//!
//! Usage:
//!   chc_verify --input contract.json [--config chc_verify.toml]
//!              [--format text|json] [--report-unknown] [--timeout-ms N]
//!
//! Loads a JSON `SourceUnit` fixture, runs `Analyzer::analyze` against a
//! stub solver (no real CHC backend ships in this crate — see
//! `solver::ChcSolver`), and prints a verdict summary.

#![forbid(unsafe_code)]

use std::process::ExitCode;

use chc_verify::api::adapters;
use chc_verify::config::{AnalyzerConfig, ConfigOverrides, Verbosity};
use chc_verify::diagnostics::CollectingSink;
use chc_verify::solver::{CexGraph, ChcSolver, QueryResult};
use chc_verify::{analyze_source_unit, AnalysisReport};
use tracing::{error, info};

fn parse_flag(args: &[String], key: &str) -> Option<String> {
    let mut it = args.iter();
    while let Some(a) = it.next() {
        if a == key {
            return it.next().cloned();
        }
    }
    None
}

fn has_flag(args: &[String], key: &str) -> bool {
    args.iter().any(|a| a == key)
}

/// Placeholder solver: every query reports `Unknown`. This crate encodes
/// contracts into CHC rules and queries; it does not bundle a solver
/// backend, so the CLI's out-of-the-box behavior is "every target
/// unresolved" until a real `ChcSolver` is wired in (spec §6 draws this
/// boundary deliberately).
struct UnresolvedSolver;

impl ChcSolver for UnresolvedSolver {
    fn register_relation(&mut self, _functor: &chc_verify::predicate::Predicate) -> anyhow::Result<()> {
        Ok(())
    }
    fn add_rule(&mut self, _rule: &chc_verify::rule::Rule) -> anyhow::Result<()> {
        Ok(())
    }
    fn query(&mut self, _goal: &chc_verify::term::Term) -> anyhow::Result<(QueryResult, Option<CexGraph>)> {
        Ok((QueryResult::Unknown, None))
    }
    fn push(&mut self) {}
    fn pop(&mut self) {}
}

fn print_text_report(report: &AnalysisReport) {
    println!("safe targets:      {}", report.safe.len());
    println!("unsafe targets:    {}", report.unsafe_.len());
    println!("unhandled targets: {}", report.unhandled.len());
    for outcome in &report.unsafe_ {
        println!("  UNSAFE [{:?}] {} (error_id={})", outcome.kind, outcome.query_name, outcome.error_id);
        if let chc_verify::Verdict::Unsafe { counterexample } = &outcome.verdict {
            print!("{counterexample}");
        }
    }
}

fn main() -> ExitCode {
    tracing_subscriber::fmt()
        .with_env_filter(std::env::var("RUST_LOG").unwrap_or_else(|_| "chc_verify=info".into()))
        .with_target(false)
        .compact()
        .init();

    let args: Vec<String> = std::env::args().skip(1).collect();
    let Some(input_path) = parse_flag(&args, "--input") else {
        eprintln!("usage: chc_verify --input <source_unit.json> [--config <chc_verify.toml>] [--format text|json] [--report-unknown] [--timeout-ms N]");
        return ExitCode::FAILURE;
    };

    let unit = match adapters::load_source_unit_json(&input_path) {
        Ok(unit) => unit,
        Err(e) => {
            error!("failed to load {input_path}: {e}");
            return ExitCode::FAILURE;
        }
    };

    let file_overrides = match parse_flag(&args, "--config") {
        Some(path) => match adapters::load_config_toml(&path) {
            Ok(overrides) => Some(overrides),
            Err(e) => {
                error!("failed to load config {path}: {e}");
                return ExitCode::FAILURE;
            }
        },
        None => None,
    };

    let mut cli_overrides = ConfigOverrides::default();
    if has_flag(&args, "--report-unknown") {
        cli_overrides.report_unknown = Some(true);
    }
    if let Some(ms) = parse_flag(&args, "--timeout-ms").and_then(|s| s.parse().ok()) {
        cli_overrides.solver_timeout_ms = Some(ms);
    }
    cli_overrides.verbosity = Some(Verbosity::Normal);

    let config = AnalyzerConfig::resolve(file_overrides, Some(cli_overrides));
    let format = parse_flag(&args, "--format").unwrap_or_else(|| "text".into());

    info!("analyzing {input_path}");
    let mut sink = CollectingSink::default();
    let report = analyze_source_unit(&unit, UnresolvedSolver, config, &mut sink);

    match format.as_str() {
        "json" => match serde_json::to_string_pretty(&report) {
            Ok(text) => println!("{text}"),
            Err(e) => {
                error!("failed to serialize report: {e}");
                return ExitCode::FAILURE;
            }
        },
        _ => print_text_report(&report),
    }

    for warning in sink.warnings {
        eprintln!("warning [{}]: {}", warning.error_id, warning.message);
    }

    if report.unsafe_.is_empty() {
        ExitCode::SUCCESS
    } else {
        ExitCode::FAILURE
    }
}
