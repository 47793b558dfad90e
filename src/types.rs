//! Data model for the example-building pipeline.
//!
//! These types are the normalized output of diff parsing and the input of the
//! downstream stages (context extraction, lint merging, example joining).
//! Everything is serde-friendly so each intermediate can be persisted as a
//! JSON artifact and re-loaded by a later stage.

use serde::{Deserialize, Serialize};

/// One line inside a diff hunk.
///
/// The variant carries only the line numbers that exist for its side:
/// added lines live in the target file only, removed lines in the source
/// file only, context lines in both. Line numbers are 1-based.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type")]
pub enum DiffLine {
    #[serde(rename = "add")]
    Added { target: u32, text: String },
    #[serde(rename = "del")]
    Removed { source: u32, text: String },
    #[serde(rename = "ctx")]
    Context { source: u32, target: u32, text: String },
}

impl DiffLine {
    /// Line number in the target (post-change) file, if this line has one.
    pub fn target_line(&self) -> Option<u32> {
        match self {
            DiffLine::Added { target, .. } | DiffLine::Context { target, .. } => Some(*target),
            DiffLine::Removed { .. } => None,
        }
    }

    /// Line number in the source (pre-change) file, if this line has one.
    pub fn source_line(&self) -> Option<u32> {
        match self {
            DiffLine::Removed { source, .. } | DiffLine::Context { source, .. } => Some(*source),
            DiffLine::Added { .. } => None,
        }
    }

    /// Raw line content without the leading diff marker.
    pub fn text(&self) -> &str {
        match self {
            DiffLine::Added { text, .. }
            | DiffLine::Removed { text, .. }
            | DiffLine::Context { text, .. } => text,
        }
    }

    /// Unified-diff marker for this line kind.
    pub fn marker(&self) -> char {
        match self {
            DiffLine::Added { .. } => '+',
            DiffLine::Removed { .. } => '-',
            DiffLine::Context { .. } => ' ',
        }
    }
}

/// A diff hunk: one contiguous change region with range headers for both
/// file versions. Line order is fixed at parse time and never reordered.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DiffHunk {
    pub source_start: u32,
    pub source_length: u32,
    pub target_start: u32,
    pub target_length: u32,
    pub lines: Vec<DiffLine>,
}

impl DiffHunk {
    /// Render the hunk body as unified-diff text: one `+`/`-`/` `-prefixed
    /// row per line, newline-joined, no range header.
    pub fn render(&self) -> String {
        let rows: Vec<String> = self
            .lines
            .iter()
            .map(|ln| format!("{}{}", ln.marker(), ln.text()))
            .collect();
        rows.join("\n")
    }
}

/// File-level diff: the post-change path and its ordered hunks.
///
/// Files without textual hunks (binary patches, mode-only changes, pure
/// renames) keep an empty hunk list.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FileDiff {
    pub path: String,
    pub hunks: Vec<DiffHunk>,
}

/// Full line-level view of a parsed patch.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DiffPatch {
    pub files: Vec<FileDiff>,
}

/// Per-file changed-line summary: sorted, distinct line numbers.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FileSummary {
    pub path: String,
    /// Target-file line numbers of added lines.
    pub added_lines: Vec<u32>,
    /// Source-file line numbers of removed lines.
    pub removed_lines: Vec<u32>,
}

/// Lightweight view of a parsed patch used for downstream filtering.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DiffSummary {
    pub files: Vec<FileSummary>,
}

/// Kind of enclosing definition reported by context extraction.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SymbolType {
    Function,
    Class,
}

/// Enclosing function/class for one queried (path, line).
///
/// Lines with no enclosing definition carry `None` in all three symbol
/// fields.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct LineContext {
    pub path: String,
    pub line: u32,
    pub symbol: Option<String>,
    pub symbol_type: Option<SymbolType>,
    pub signature: Option<String>,
}

/// One static-analyzer diagnostic.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct LintWarning {
    pub path: String,
    pub line: u32,
    pub code: String,
    pub message: String,
}

/// A reviewer-authored comment anchored to a file/line of the change.
///
/// Supplied by an external comment source; both anchors are optional since
/// threads on outdated positions or whole files carry no usable line. Extra
/// provider fields are ignored on deserialization.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ReviewComment {
    #[serde(default)]
    pub path: Option<String>,
    #[serde(default)]
    pub line: Option<u32>,
    #[serde(default)]
    pub body: String,
}

/// Final joined record: one review comment plus the diff/context/lint data
/// that provoked it. Terminal output of the pipeline, serialized as JSONL.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Example {
    pub path: String,
    pub line: u32,
    pub comment: String,
    pub diff_hunk: String,
    pub context: Option<LineContext>,
    pub lint: Vec<LintWarning>,
}

/// True for paths the context and lint stages treat as analyzable source.
pub fn is_python_source(path: &str) -> bool {
    path.ends_with(".py")
}
