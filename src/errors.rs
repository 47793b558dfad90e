//! Crate-wide error hierarchy.
//!
//! Goals:
//! - Single root `Error` for all public functions.
//! - One sub-enum per pipeline stage so callers can apply the isolation
//!   policy: diff parse failures abort the batch, context/lint failures are
//!   fatal for one file only, join-time non-matches are never errors.
//! - Ergonomic `?` via `From` impls, no dynamic dispatch.

use thiserror::Error;

/// Convenient alias for crate-wide results.
pub type PrepResult<T> = Result<T, Error>;

/// Root error type for the review-prep crate.
#[derive(Debug, Error)]
pub enum Error {
    /// Patch text does not conform to the unified-diff grammar.
    #[error(transparent)]
    Parse(#[from] ParseError),

    /// Context extraction failure for a single file.
    #[error(transparent)]
    Context(#[from] ContextError),

    /// Static analyzer failure for a single file.
    #[error(transparent)]
    Lint(#[from] LintError),

    /// Artifact (file I/O / JSON) failure.
    #[error(transparent)]
    Artifact(#[from] ArtifactError),
}

/// Unified diff parser errors. Any of these aborts the whole parse; no
/// partial diff is ever returned.
#[derive(Debug, Error)]
pub enum ParseError {
    #[error("invalid hunk header: {0}")]
    InvalidHunkHeader(String),

    #[error("unexpected end of patch inside a hunk of {0}")]
    UnexpectedEof(String),

    #[error("unexpected line in {path}: {line:?}")]
    UnexpectedLine { path: String, line: String },

    #[error("input is not a unified diff")]
    NotAPatch,
}

/// Context extraction errors, fatal for the affected file only.
#[derive(Debug, Error)]
pub enum ContextError {
    #[error("source file unavailable: {path}: {source}")]
    Missing {
        path: String,
        #[source]
        source: std::io::Error,
    },

    #[error("tree-sitter language error")]
    Language,

    #[error("source file does not parse: {path}")]
    Parse { path: String },
}

/// Static analyzer errors, fatal for the affected file only.
#[derive(Debug, Error)]
pub enum LintError {
    #[error("failed to spawn analyzer {program:?}: {source}")]
    Spawn {
        program: String,
        #[source]
        source: std::io::Error,
    },

    #[error("analyzer failed on {path} (status {status:?}): {stderr}")]
    Analyzer {
        path: String,
        status: Option<i32>,
        stderr: String,
    },
}

/// Artifact I/O errors (reading/writing JSON and JSONL documents).
#[derive(Debug, Error)]
pub enum ArtifactError {
    #[error("io error: {0}")]
    Io(#[from] std::io::Error),

    #[error("serde error: {0}")]
    Serde(#[from] serde_json::Error),
}

// ===== Conversions for `?` ergonomics =====

impl From<std::io::Error> for Error {
    fn from(e: std::io::Error) -> Self {
        Error::Artifact(ArtifactError::Io(e))
    }
}

impl From<serde_json::Error> for Error {
    fn from(e: serde_json::Error) -> Self {
        Error::Artifact(ArtifactError::Serde(e))
    }
}
