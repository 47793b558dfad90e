//! On-disk interchange artifacts between pipeline stages.
//!
//! Every intermediate is a pretty-printed JSON document so stages can run
//! independently and artifacts stay diffable; final examples are JSON Lines,
//! one compact record per line, suitable for streaming into a downstream
//! trainer.

use std::fs::{self, File};
use std::io::{BufWriter, Write};
use std::path::Path;

use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use tracing::info;

use crate::errors::ArtifactError;
use crate::types::{Example, LineContext, LintWarning};

pub const DIFF_SUMMARY_FILE: &str = "diff_summary.json";
pub const DIFF_FULL_FILE: &str = "diff_full.json";
pub const DIFF_WITH_CTX_FILE: &str = "diff_with_ctx.json";
pub const DIFF_WITH_LINT_FILE: &str = "diff_with_lint.json";
pub const EXAMPLES_FILE: &str = "examples.jsonl";

/// Context records grouped per file.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FileContexts {
    pub path: String,
    pub contexts: Vec<LineContext>,
}

/// The context-enriched artifact.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ContextDoc {
    pub files: Vec<FileContexts>,
}

impl ContextDoc {
    pub fn into_contexts(self) -> Vec<LineContext> {
        self.files.into_iter().flat_map(|f| f.contexts).collect()
    }
}

/// Retained lint warnings grouped per file.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FileLints {
    pub path: String,
    pub warnings: Vec<LintWarning>,
}

/// The lint-enriched artifact.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct LintDoc {
    pub files: Vec<FileLints>,
}

impl LintDoc {
    pub fn into_warnings(self) -> Vec<LintWarning> {
        self.files.into_iter().flat_map(|f| f.warnings).collect()
    }
}

/// Load any JSON artifact.
pub fn load_json<T: DeserializeOwned>(path: &Path) -> Result<T, ArtifactError> {
    let data = fs::read(path)?;
    Ok(serde_json::from_slice(&data)?)
}

/// Write any JSON artifact, creating parent directories as needed.
pub fn dump_json<T: Serialize>(value: &T, path: &Path) -> Result<(), ArtifactError> {
    if let Some(dir) = path.parent() {
        fs::create_dir_all(dir)?;
    }
    let json = serde_json::to_vec_pretty(value)?;
    fs::write(path, json)?;
    Ok(())
}

/// Write examples as JSON Lines: one record, one example.
pub fn write_examples_jsonl(path: &Path, examples: &[Example]) -> Result<(), ArtifactError> {
    if let Some(dir) = path.parent() {
        fs::create_dir_all(dir)?;
    }
    let f = File::create(path)?;
    let mut w = BufWriter::new(f);
    for ex in examples {
        serde_json::to_writer(&mut w, ex)?;
        w.write_all(b"\n")?;
    }
    w.flush()?;
    info!("jsonl: wrote {} examples -> {}", examples.len(), path.display());
    Ok(())
}
