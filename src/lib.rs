//! Builds correlated training examples for a review-comment generation
//! service: each example pairs one human review comment with the diff hunk,
//! enclosing-symbol context, and lint findings for its (path, line) anchor.
//!
//! Pipeline, in order:
//!
//! 1) **Step 1 — Diff parsing**
//!    - Parse the raw unified-diff patch into a changed-line summary and a
//!      full hunk/line structure
//!    - Any grammar violation is fatal for the whole batch
//!
//! 2) **Step 2 — Context extraction (changed source files only)**
//!    - One tree-sitter pass per file builds a line → enclosing-definition
//!      outline
//!    - Each added line resolves to its innermost function/class
//!    - Per-file failures (missing file, invalid syntax) skip that file only
//!
//! 3) **Step 3 — Lint merging (changed source files only)**
//!    - Run the external analyzer per file, classify its exit three ways
//!    - Keep findings on added lines, discard the rest, count what was
//!      dropped
//!    - Per-file analyzer failures skip that file only
//!
//! 4) **Step 4 — Example joining**
//!    - Match each comment to the hunk carrying its target line
//!    - Attach looked-up context and exact-line lint warnings
//!    - Unanchored/unmatched comments are counted and filtered, never errors
//!
//! Stages log with `tracing`; every filtering decision surfaces in
//! [`PrepStats`] so silent data loss stays observable.

pub mod artifacts;
pub mod context;
pub mod errors;
pub mod join;
pub mod lint;
pub mod parser;
pub mod types;

use std::path::Path;
use std::time::Instant;

use tracing::{debug, info, warn};

use context::ContextExtractor;
use lint::AnalyzerConfig;
use types::is_python_source;

/// Pipeline knobs. Only the analyzer binary is configurable; all matching
/// and filtering semantics are fixed.
#[derive(Debug, Clone, Default)]
pub struct PrepOptions {
    pub analyzer: AnalyzerConfig,
}

/// Counters describing one pipeline run.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct PrepStats {
    /// Files in the parsed patch.
    pub files: usize,
    pub comments_total: usize,
    pub examples_emitted: usize,
    /// Comments dropped as unanchored or unmatched.
    pub comments_dropped: usize,
    /// Lint findings the analyzer reported across all files.
    pub lint_reported: usize,
    /// Lint findings discarded as off-diff.
    pub lint_discarded: usize,
    /// Files whose context extraction failed and was skipped.
    pub context_failures: usize,
    /// Files whose analyzer run failed and was skipped.
    pub lint_failures: usize,
}

/// Result of a whole pipeline run.
#[derive(Debug, Clone)]
pub struct PrepOutput {
    pub examples: Vec<Example>,
    pub stats: PrepStats,
}

/// Run steps 1–4 for one patch against a read-only checkout.
///
/// `comments` come from an external comment source; `checkout_root` must
/// hold the post-change file tree the diff was produced against.
pub fn run_prep(
    patch_text: &str,
    checkout_root: &Path,
    comments: &[ReviewComment],
    opts: &PrepOptions,
) -> PrepResult<PrepOutput> {
    let mut stats = PrepStats::default();

    // ---------------------------
    // Step 1: parse the diff
    // ---------------------------
    let t1 = Instant::now();
    debug!("step1: parse unified diff");
    let (summary, full) = parser::parse(patch_text)?;
    stats.files = full.files.len();
    debug!(
        "step1: parsed {} files ({} ms)",
        stats.files,
        t1.elapsed().as_millis()
    );

    // -----------------------------------------
    // Step 2: enclosing symbols for added lines
    // -----------------------------------------
    let t2 = Instant::now();
    debug!("step2: extract context for changed source files");
    let extractor = ContextExtractor::new(checkout_root);
    let mut contexts: Vec<LineContext> = Vec::new();
    for file in &summary.files {
        if !is_python_source(&file.path) || file.added_lines.is_empty() {
            continue;
        }
        match extractor.contexts(&file.path, &file.added_lines) {
            Ok(mut list) => contexts.append(&mut list),
            Err(e) => {
                warn!("step2: context skipped for {}: {}", file.path, e);
                stats.context_failures += 1;
            }
        }
    }
    debug!(
        "step2: {} context records ({} ms)",
        contexts.len(),
        t2.elapsed().as_millis()
    );

    // ---------------------------------
    // Step 3: analyzer findings on-diff
    // ---------------------------------
    let t3 = Instant::now();
    debug!("step3: merge analyzer findings");
    let mut lints: Vec<LintWarning> = Vec::new();
    for file in &summary.files {
        if !is_python_source(&file.path) || file.added_lines.is_empty() {
            continue;
        }
        match lint::merge(&opts.analyzer, checkout_root, file) {
            Ok(mut merged) => {
                stats.lint_reported += merged.reported;
                stats.lint_discarded += merged.discarded;
                lints.append(&mut merged.warnings);
            }
            Err(e) => {
                warn!("step3: lint skipped for {}: {}", file.path, e);
                stats.lint_failures += 1;
            }
        }
    }
    debug!(
        "step3: {} warnings kept ({} ms)",
        lints.len(),
        t3.elapsed().as_millis()
    );

    // ---------------------------
    // Step 4: join into examples
    // ---------------------------
    let t4 = Instant::now();
    debug!("step4: join comments with diff/context/lint");
    let (examples, join_stats) = join::build_examples(&full, &contexts, &lints, comments);
    stats.comments_total = join_stats.comments_total;
    stats.examples_emitted = join_stats.emitted;
    stats.comments_dropped = join_stats.dropped_unanchored + join_stats.dropped_unmatched;
    debug!(
        "step4: {} examples ({} ms)",
        examples.len(),
        t4.elapsed().as_millis()
    );

    info!(
        "prep: {} examples emitted, {} comments dropped unmatched, {} lint findings discarded off-diff",
        stats.examples_emitted, stats.comments_dropped, stats.lint_discarded
    );

    Ok(PrepOutput { examples, stats })
}

// -----------------------------------------------------------------------------
// Convenience re-exports for downstream users
// -----------------------------------------------------------------------------

pub use errors::{Error, PrepResult};
pub use types::{
    DiffHunk, DiffLine, DiffPatch, DiffSummary, Example, FileDiff, FileSummary, LineContext,
    LintWarning, ReviewComment, SymbolType,
};
