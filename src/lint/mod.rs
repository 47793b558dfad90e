//! Static-analyzer invocation and on-diff filtering.
//!
//! The analyzer is a black-box per-file tool (flake8 by default) invoked
//! with a machine-readable format. Its run is captured as an explicit
//! [`AnalyzerOutcome`] value — exit status plus both output streams — and
//! classified three ways: clean, findings, failure. Only the failure class
//! is an error, and only for the affected file.
//!
//! Diagnostics that land outside the file's added-line set are discarded:
//! a warning on an unchanged or removed line cannot anchor an example.

use std::collections::HashSet;
use std::path::Path;
use std::process::Command;

use tracing::debug;

use crate::errors::LintError;
use crate::types::{FileSummary, LintWarning};

/// Output format handed to the analyzer: `path::row::code::text`.
pub const ANALYZER_FORMAT: &str = "%(path)s::%(row)d::%(code)s::%(text)s";

/// Which analyzer binary to run. The exit-status policy and output format
/// are fixed; only the program is configurable.
#[derive(Debug, Clone)]
pub struct AnalyzerConfig {
    pub program: String,
}

impl Default for AnalyzerConfig {
    fn default() -> Self {
        Self {
            program: "flake8".to_string(),
        }
    }
}

/// Captured result of one analyzer run.
#[derive(Debug, Clone)]
pub struct AnalyzerOutcome {
    /// Exit status code; `None` when terminated by a signal.
    pub status: Option<i32>,
    pub stdout: String,
    pub stderr: String,
}

/// Three-way classification of an analyzer exit status.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AnalyzerVerdict {
    /// Ran cleanly, no findings (status 0).
    Clean,
    /// Ran, findings reported (status 1).
    Findings,
    /// Anything else: crash, bad invocation, signal.
    Failure,
}

impl AnalyzerOutcome {
    pub fn verdict(&self) -> AnalyzerVerdict {
        match self.status {
            Some(0) => AnalyzerVerdict::Clean,
            Some(1) => AnalyzerVerdict::Findings,
            _ => AnalyzerVerdict::Failure,
        }
    }
}

/// Result of merging analyzer findings with a file's added-line set.
#[derive(Debug, Clone)]
pub struct MergedLint {
    /// Findings on added lines, in analyzer output order.
    pub warnings: Vec<LintWarning>,
    /// Total findings the analyzer reported for the file.
    pub reported: usize,
    /// Findings discarded because their line is off-diff.
    pub discarded: usize,
}

/// Run the analyzer against `rel_path` inside `checkout_root`.
pub fn run_analyzer(
    cfg: &AnalyzerConfig,
    checkout_root: &Path,
    rel_path: &str,
) -> Result<AnalyzerOutcome, LintError> {
    let output = Command::new(&cfg.program)
        .arg(format!("--format={ANALYZER_FORMAT}"))
        .arg(rel_path)
        .current_dir(checkout_root)
        .output()
        .map_err(|e| LintError::Spawn {
            program: cfg.program.clone(),
            source: e,
        })?;
    Ok(AnalyzerOutcome {
        status: output.status.code(),
        stdout: String::from_utf8_lossy(&output.stdout).into_owned(),
        stderr: String::from_utf8_lossy(&output.stderr).into_owned(),
    })
}

/// Parse `path::row::code::text` lines. Lines that do not split into four
/// fields, or whose row is not an integer, are skipped.
pub fn parse_findings(stdout: &str) -> Vec<LintWarning> {
    let mut out = Vec::new();
    for line in stdout.lines() {
        let parts: Vec<&str> = line.splitn(4, "::").collect();
        let [path, row, code, text] = parts.as_slice() else {
            continue;
        };
        let Ok(line_no) = row.parse::<u32>() else {
            continue;
        };
        out.push(LintWarning {
            path: path.to_string(),
            line: line_no,
            code: code.to_string(),
            message: text.to_string(),
        });
    }
    out
}

/// Run the analyzer for the file described by `summary` and keep only the
/// findings on its added lines.
pub fn merge(
    cfg: &AnalyzerConfig,
    checkout_root: &Path,
    summary: &FileSummary,
) -> Result<MergedLint, LintError> {
    let outcome = run_analyzer(cfg, checkout_root, &summary.path)?;
    merge_outcome(outcome, summary)
}

/// Apply the three-way exit policy and the added-line filter to a captured
/// outcome. Split from [`merge`] so the policy is testable without a
/// subprocess.
pub fn merge_outcome(
    outcome: AnalyzerOutcome,
    summary: &FileSummary,
) -> Result<MergedLint, LintError> {
    if outcome.verdict() == AnalyzerVerdict::Failure {
        return Err(LintError::Analyzer {
            path: summary.path.clone(),
            status: outcome.status,
            stderr: outcome.stderr.trim().to_string(),
        });
    }

    let added: HashSet<u32> = summary.added_lines.iter().copied().collect();
    let reported = parse_findings(&outcome.stdout);
    let total = reported.len();
    let warnings: Vec<LintWarning> = reported
        .into_iter()
        .filter(|w| added.contains(&w.line))
        .collect();
    let discarded = total - warnings.len();
    debug!(
        "lint: {} findings reported, {} off-diff discarded for {}",
        total, discarded, summary.path
    );

    Ok(MergedLint {
        warnings,
        reported: total,
        discarded,
    })
}
