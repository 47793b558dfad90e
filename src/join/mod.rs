//! Join review comments with diff, context, and lint data into examples.
//!
//! The join key is (path, line) on the target side of the diff. Context and
//! lint records are looked up, never embedded ahead of time, and comments
//! that cannot be anchored are filtered, not failed: most review threads
//! point at lines no longer present in the visible diff.

use std::collections::HashMap;

use tracing::debug;

use crate::types::{DiffHunk, DiffPatch, Example, FileDiff, LineContext, LintWarning, ReviewComment};

/// Counters for every filtering decision the join makes.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct JoinStats {
    pub comments_total: usize,
    pub emitted: usize,
    /// Comments with no path or no line to anchor on.
    pub dropped_unanchored: usize,
    /// Anchored comments whose (path, line) matched no hunk.
    pub dropped_unmatched: usize,
}

/// Build one [`Example`] per comment that anchors to a diff hunk.
///
/// Deterministic and side-effect-free; output order follows comment order.
pub fn build_examples(
    patch: &DiffPatch,
    contexts: &[LineContext],
    lints: &[LintWarning],
    comments: &[ReviewComment],
) -> (Vec<Example>, JoinStats) {
    let file_map: HashMap<&str, &FileDiff> =
        patch.files.iter().map(|f| (f.path.as_str(), f)).collect();
    let ctx_map: HashMap<(&str, u32), &LineContext> = contexts
        .iter()
        .map(|c| ((c.path.as_str(), c.line), c))
        .collect();
    let mut lint_map: HashMap<(&str, u32), Vec<&LintWarning>> = HashMap::new();
    for w in lints {
        lint_map.entry((w.path.as_str(), w.line)).or_default().push(w);
    }

    let mut stats = JoinStats {
        comments_total: comments.len(),
        ..JoinStats::default()
    };
    let mut out = Vec::new();

    for comment in comments {
        let (Some(path), Some(line)) = (comment.path.as_deref(), comment.line) else {
            stats.dropped_unanchored += 1;
            continue;
        };
        let Some(hunk) = file_map.get(path).and_then(|f| find_hunk(f, line)) else {
            stats.dropped_unmatched += 1;
            continue;
        };

        out.push(Example {
            path: path.to_string(),
            line,
            comment: comment.body.clone(),
            diff_hunk: hunk.render(),
            context: ctx_map.get(&(path, line)).map(|c| (*c).clone()),
            lint: lint_map
                .get(&(path, line))
                .map(|ws| ws.iter().map(|w| (*w).clone()).collect())
                .unwrap_or_default(),
        });
        stats.emitted += 1;
    }

    debug!(
        "join: {} comments, {} examples, {} unanchored, {} unmatched",
        stats.comments_total, stats.emitted, stats.dropped_unanchored, stats.dropped_unmatched
    );
    (out, stats)
}

/// Exact-match anchoring: the hunk qualifies only if one of its lines
/// reports `line` as its target line number. Removed lines never match.
fn find_hunk(file: &FileDiff, line: u32) -> Option<&DiffHunk> {
    file.hunks
        .iter()
        .find(|h| h.lines.iter().any(|l| l.target_line() == Some(line)))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::{DiffLine, SymbolType};

    fn patch_with_hunk() -> DiffPatch {
        DiffPatch {
            files: vec![FileDiff {
                path: "a.py".to_string(),
                hunks: vec![DiffHunk {
                    source_start: 8,
                    source_length: 2,
                    target_start: 8,
                    target_length: 3,
                    lines: vec![
                        DiffLine::Context {
                            source: 8,
                            target: 8,
                            text: "def f():".to_string(),
                        },
                        DiffLine::Removed {
                            source: 9,
                            text: "    return 0".to_string(),
                        },
                        DiffLine::Added {
                            target: 9,
                            text: "    total = 1".to_string(),
                        },
                        DiffLine::Added {
                            target: 10,
                            text: "    return total".to_string(),
                        },
                    ],
                }],
            }],
        }
    }

    fn comment(path: Option<&str>, line: Option<u32>, body: &str) -> ReviewComment {
        ReviewComment {
            path: path.map(str::to_string),
            line,
            body: body.to_string(),
        }
    }

    #[test]
    fn matched_comment_yields_one_example() {
        let (examples, stats) = build_examples(
            &patch_with_hunk(),
            &[],
            &[],
            &[comment(Some("a.py"), Some(10), "use sum()")],
        );
        assert_eq!(examples.len(), 1);
        assert_eq!(stats.emitted, 1);
        let ex = &examples[0];
        assert_eq!((ex.path.as_str(), ex.line), ("a.py", 10));
        assert!(ex.diff_hunk.contains("+    return total"));
        assert!(ex.diff_hunk.contains("-    return 0"));
        assert!(ex.diff_hunk.contains(" def f():"));
    }

    #[test]
    fn unmatched_line_yields_no_example() {
        let (examples, stats) = build_examples(
            &patch_with_hunk(),
            &[],
            &[],
            &[comment(Some("a.py"), Some(999), "stale thread")],
        );
        assert!(examples.is_empty());
        assert_eq!(stats.dropped_unmatched, 1);
    }

    #[test]
    fn unknown_path_counts_as_unmatched() {
        let (examples, stats) = build_examples(
            &patch_with_hunk(),
            &[],
            &[],
            &[comment(Some("other.py"), Some(9), "wrong file")],
        );
        assert!(examples.is_empty());
        assert_eq!(stats.dropped_unmatched, 1);
    }

    #[test]
    fn lineless_comment_counts_as_unanchored() {
        let (examples, stats) = build_examples(
            &patch_with_hunk(),
            &[],
            &[],
            &[comment(Some("a.py"), None, "file-level note")],
        );
        assert!(examples.is_empty());
        assert_eq!(stats.dropped_unanchored, 1);
    }

    #[test]
    fn context_line_target_also_anchors() {
        let (examples, _) = build_examples(
            &patch_with_hunk(),
            &[],
            &[],
            &[comment(Some("a.py"), Some(8), "naming")],
        );
        assert_eq!(examples.len(), 1);
    }

    #[test]
    fn context_and_exact_line_lint_are_attached() {
        let ctx = LineContext {
            path: "a.py".to_string(),
            line: 9,
            symbol: Some("f".to_string()),
            symbol_type: Some(SymbolType::Function),
            signature: Some("f()".to_string()),
        };
        let lints = vec![
            LintWarning {
                path: "a.py".to_string(),
                line: 9,
                code: "E501".to_string(),
                message: "line too long".to_string(),
            },
            LintWarning {
                path: "a.py".to_string(),
                line: 10,
                code: "E999".to_string(),
                message: "other line".to_string(),
            },
        ];
        let (examples, _) = build_examples(
            &patch_with_hunk(),
            std::slice::from_ref(&ctx),
            &lints,
            &[comment(Some("a.py"), Some(9), "ok")],
        );
        let ex = &examples[0];
        assert_eq!(ex.context.as_ref(), Some(&ctx));
        assert_eq!(ex.lint.len(), 1);
        assert_eq!(ex.lint[0].code, "E501");
    }

    #[test]
    fn comment_without_context_gets_none_and_empty_lint() {
        let (examples, _) = build_examples(
            &patch_with_hunk(),
            &[],
            &[],
            &[comment(Some("a.py"), Some(9), "ok")],
        );
        assert!(examples[0].context.is_none());
        assert!(examples[0].lint.is_empty());
    }
}
