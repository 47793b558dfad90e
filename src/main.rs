//! CLI front-end for the example-building pipeline.
//!
//! One subcommand per stage (mirroring the artifact flow) plus `run`, which
//! chains all stages in-process. Argument handling and file plumbing live
//! here; every semantic decision lives in the library.

use std::fs;
use std::path::{Path, PathBuf};

use anyhow::Context;
use clap::{Parser, Subcommand};
use tracing::{info, warn};
use tracing_subscriber::EnvFilter;

use review_prep::artifacts::{self, ContextDoc, FileContexts, FileLints, LintDoc};
use review_prep::context::ContextExtractor;
use review_prep::lint::{self, AnalyzerConfig};
use review_prep::types::{DiffPatch, DiffSummary, ReviewComment, is_python_source};
use review_prep::{PrepOptions, parser, run_prep};

#[derive(Parser)]
#[command(
    name = "review-prep",
    about = "Builds review-comment training examples from a diff, a checkout, and review comments"
)]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Parse a unified-diff patch into summary and full JSON artifacts.
    ParseDiff {
        /// Path to the patch file.
        patch: PathBuf,
        /// Directory for parsed artifacts (defaults to the patch directory).
        #[arg(long)]
        out_dir: Option<PathBuf>,
    },
    /// Enrich a diff summary with enclosing-symbol context records.
    AddContext {
        /// Path to diff_summary.json.
        #[arg(long)]
        summary: PathBuf,
        /// Read-only source checkout matching the diff's post-change state.
        #[arg(long)]
        checkout: PathBuf,
        /// Output file (defaults to diff_with_ctx.json next to the summary).
        #[arg(long)]
        out: Option<PathBuf>,
    },
    /// Run the static analyzer and keep findings on added lines.
    MergeLints {
        /// Path to diff_summary.json.
        #[arg(long)]
        summary: PathBuf,
        /// Read-only source checkout matching the diff's post-change state.
        #[arg(long)]
        checkout: PathBuf,
        /// Analyzer binary to invoke (defaults to flake8).
        #[arg(long)]
        analyzer: Option<String>,
        /// Output file (defaults to diff_with_lint.json next to the summary).
        #[arg(long)]
        out: Option<PathBuf>,
    },
    /// Join diff, context, and lint artifacts with review comments.
    BuildExamples {
        /// Path to diff_full.json.
        #[arg(long)]
        diff: PathBuf,
        /// Path to diff_with_ctx.json.
        #[arg(long)]
        ctx: PathBuf,
        /// Path to diff_with_lint.json.
        #[arg(long)]
        lints: PathBuf,
        /// Path to the review comment list (JSON array).
        #[arg(long)]
        comments: PathBuf,
        /// Output JSONL file (defaults to examples.jsonl next to comments).
        #[arg(long)]
        out: Option<PathBuf>,
    },
    /// Run the whole pipeline in-process and write examples.jsonl.
    Run {
        /// Path to the patch file.
        #[arg(long)]
        patch: PathBuf,
        /// Read-only source checkout matching the diff's post-change state.
        #[arg(long)]
        checkout: PathBuf,
        /// Path to the review comment list (JSON array).
        #[arg(long)]
        comments: PathBuf,
        /// Analyzer binary to invoke (defaults to flake8).
        #[arg(long)]
        analyzer: Option<String>,
        /// Output JSONL file (defaults to examples.jsonl next to comments).
        #[arg(long)]
        out: Option<PathBuf>,
    },
}

fn main() -> anyhow::Result<()> {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));
    tracing_subscriber::fmt().with_env_filter(filter).init();

    match Cli::parse().command {
        Commands::ParseDiff { patch, out_dir } => parse_diff(&patch, out_dir),
        Commands::AddContext {
            summary,
            checkout,
            out,
        } => add_context(&summary, &checkout, out),
        Commands::MergeLints {
            summary,
            checkout,
            analyzer,
            out,
        } => merge_lints(&summary, &checkout, analyzer, out),
        Commands::BuildExamples {
            diff,
            ctx,
            lints,
            comments,
            out,
        } => build_examples(&diff, &ctx, &lints, &comments, out),
        Commands::Run {
            patch,
            checkout,
            comments,
            analyzer,
            out,
        } => run_all(&patch, &checkout, &comments, analyzer, out),
    }
}

fn parse_diff(patch: &Path, out_dir: Option<PathBuf>) -> anyhow::Result<()> {
    let text =
        fs::read_to_string(patch).with_context(|| format!("read patch {}", patch.display()))?;
    let (summary, full) = parser::parse(&text)?;

    let out_dir = out_dir.unwrap_or_else(|| parent_dir(patch));
    artifacts::dump_json(&summary, &out_dir.join(artifacts::DIFF_SUMMARY_FILE))?;
    artifacts::dump_json(&full, &out_dir.join(artifacts::DIFF_FULL_FILE))?;
    info!(
        "wrote diff artifacts for {} files to {}",
        full.files.len(),
        out_dir.display()
    );
    Ok(())
}

fn add_context(summary: &Path, checkout: &Path, out: Option<PathBuf>) -> anyhow::Result<()> {
    let doc: DiffSummary = artifacts::load_json(summary)?;
    let extractor = ContextExtractor::new(checkout);

    let mut files = Vec::new();
    for file in &doc.files {
        let contexts = if is_python_source(&file.path) && !file.added_lines.is_empty() {
            match extractor.contexts(&file.path, &file.added_lines) {
                Ok(list) => list,
                Err(e) => {
                    warn!("context skipped for {}: {}", file.path, e);
                    Vec::new()
                }
            }
        } else {
            Vec::new()
        };
        files.push(FileContexts {
            path: file.path.clone(),
            contexts,
        });
    }

    let out = out.unwrap_or_else(|| sibling(summary, artifacts::DIFF_WITH_CTX_FILE));
    artifacts::dump_json(&ContextDoc { files }, &out)?;
    info!("wrote context-enriched diff to {}", out.display());
    Ok(())
}

fn merge_lints(
    summary: &Path,
    checkout: &Path,
    analyzer: Option<String>,
    out: Option<PathBuf>,
) -> anyhow::Result<()> {
    let doc: DiffSummary = artifacts::load_json(summary)?;
    let cfg = analyzer
        .map(|program| AnalyzerConfig { program })
        .unwrap_or_default();

    let mut files = Vec::new();
    for file in &doc.files {
        let warnings = if is_python_source(&file.path) && !file.added_lines.is_empty() {
            match lint::merge(&cfg, checkout, file) {
                Ok(merged) => merged.warnings,
                Err(e) => {
                    warn!("lint skipped for {}: {}", file.path, e);
                    Vec::new()
                }
            }
        } else {
            Vec::new()
        };
        files.push(FileLints {
            path: file.path.clone(),
            warnings,
        });
    }

    let out = out.unwrap_or_else(|| sibling(summary, artifacts::DIFF_WITH_LINT_FILE));
    artifacts::dump_json(&LintDoc { files }, &out)?;
    info!("wrote lint-enriched diff to {}", out.display());
    Ok(())
}

fn build_examples(
    diff: &Path,
    ctx: &Path,
    lints: &Path,
    comments: &Path,
    out: Option<PathBuf>,
) -> anyhow::Result<()> {
    let full: DiffPatch = artifacts::load_json(diff)?;
    let ctx_doc: ContextDoc = artifacts::load_json(ctx)?;
    let lint_doc: LintDoc = artifacts::load_json(lints)?;
    let comment_list: Vec<ReviewComment> = artifacts::load_json(comments)?;

    let (examples, stats) = review_prep::join::build_examples(
        &full,
        &ctx_doc.into_contexts(),
        &lint_doc.into_warnings(),
        &comment_list,
    );

    let out = out.unwrap_or_else(|| sibling(comments, artifacts::EXAMPLES_FILE));
    artifacts::write_examples_jsonl(&out, &examples)?;
    info!(
        "wrote {} examples to {} ({} comments dropped unmatched)",
        stats.emitted,
        out.display(),
        stats.dropped_unanchored + stats.dropped_unmatched
    );
    Ok(())
}

fn run_all(
    patch: &Path,
    checkout: &Path,
    comments: &Path,
    analyzer: Option<String>,
    out: Option<PathBuf>,
) -> anyhow::Result<()> {
    let text =
        fs::read_to_string(patch).with_context(|| format!("read patch {}", patch.display()))?;
    let comment_list: Vec<ReviewComment> = artifacts::load_json(comments)?;
    let opts = PrepOptions {
        analyzer: analyzer
            .map(|program| AnalyzerConfig { program })
            .unwrap_or_default(),
    };

    let output = run_prep(&text, checkout, &comment_list, &opts)?;

    let out = out.unwrap_or_else(|| sibling(comments, artifacts::EXAMPLES_FILE));
    artifacts::write_examples_jsonl(&out, &output.examples)?;
    info!(
        "wrote {} examples to {} ({} comments dropped, {} lint findings discarded)",
        output.stats.examples_emitted,
        out.display(),
        output.stats.comments_dropped,
        output.stats.lint_discarded
    );
    Ok(())
}

fn parent_dir(path: &Path) -> PathBuf {
    path.parent()
        .filter(|p| !p.as_os_str().is_empty())
        .map(Path::to_path_buf)
        .unwrap_or_else(|| PathBuf::from("."))
}

fn sibling(path: &Path, name: &str) -> PathBuf {
    parent_dir(path).join(name)
}
