//! Strict unified-diff parser.
//!
//! Decomposes raw patch text into per-file, per-hunk, per-line records and a
//! lightweight changed-line summary in a single pass.
//!
//! Accepted shape:
//! - optional preamble before the first file section (commit message text);
//! - file sections opened by `diff --git` or by a `---`/`+++` header pair;
//! - git metadata lines (`index`, mode changes, rename/copy markers);
//! - binary patches (`Binary files ... differ`, `GIT binary patch`) and
//!   mode-only changes, which yield a file entry with no hunks;
//! - `\ No newline at end of file` markers, which are ignored.
//!
//! Anything else is a fatal [`ParseError`] — no partial result is returned.
//! Hunk bodies are validated against their declared lengths, and per-side
//! line counters advance exactly as the markers dictate: the source counter
//! on removed/context lines, the target counter on added/context lines.

use tracing::debug;

use crate::errors::ParseError;
use crate::types::{DiffHunk, DiffLine, DiffPatch, DiffSummary, FileDiff, FileSummary};

/// Parse patch text into the summary and full views.
///
/// Empty (or whitespace-only) input yields empty views; non-empty input with
/// no recognizable file section is [`ParseError::NotAPatch`].
pub fn parse(patch: &str) -> Result<(DiffSummary, DiffPatch), ParseError> {
    let lines: Vec<&str> = patch.lines().collect();
    let mut i = 0usize;

    // Tolerate preamble (e.g. commit message text) before the first section.
    while i < lines.len() && !is_section_start(&lines, i) {
        i += 1;
    }
    if i == lines.len() && lines.iter().any(|l| !l.trim().is_empty()) {
        return Err(ParseError::NotAPatch);
    }

    let mut files: Vec<FileDiff> = Vec::new();
    while i < lines.len() {
        if lines[i].is_empty() {
            i += 1;
            continue;
        }
        files.push(parse_file_section(&lines, &mut i)?);
    }

    let summary = summarize(&files);
    debug!(
        "parse: {} files, {} hunks",
        files.len(),
        files.iter().map(|f| f.hunks.len()).sum::<usize>()
    );
    Ok((summary, DiffPatch { files }))
}

/// Build the sorted-distinct changed-line summary from the full view.
fn summarize(files: &[FileDiff]) -> DiffSummary {
    let entries = files
        .iter()
        .map(|f| {
            let mut added: Vec<u32> = f
                .hunks
                .iter()
                .flat_map(|h| &h.lines)
                .filter(|l| matches!(l, DiffLine::Added { .. }))
                .filter_map(|l| l.target_line())
                .collect();
            let mut removed: Vec<u32> = f
                .hunks
                .iter()
                .flat_map(|h| &h.lines)
                .filter(|l| matches!(l, DiffLine::Removed { .. }))
                .filter_map(|l| l.source_line())
                .collect();
            added.sort_unstable();
            added.dedup();
            removed.sort_unstable();
            removed.dedup();
            FileSummary {
                path: f.path.clone(),
                added_lines: added,
                removed_lines: removed,
            }
        })
        .collect();
    DiffSummary { files: entries }
}

/// True if `lines[i]` opens a new file section.
fn is_section_start(lines: &[&str], i: usize) -> bool {
    let line = lines[i];
    if line.starts_with("diff --git ") {
        return true;
    }
    // Headers without a git prelude: a `---` line immediately followed by `+++`.
    line.starts_with("--- ") && lines.get(i + 1).is_some_and(|n| n.starts_with("+++ "))
}

/// Git metadata lines allowed between `diff --git` and the `---`/`+++` pair.
fn is_file_meta(line: &str) -> bool {
    const META: [&str; 12] = [
        "index ",
        "mode ",
        "old mode ",
        "new mode ",
        "new file mode ",
        "deleted file mode ",
        "similarity index ",
        "dissimilarity index ",
        "rename from ",
        "rename to ",
        "copy from ",
        "copy to ",
    ];
    META.iter().any(|m| line.starts_with(m))
}

/// Strip the git `a/`/`b/` prefix and any trailing tab-separated timestamp.
fn clean_path(raw: &str) -> &str {
    let raw = raw.split('\t').next().unwrap_or(raw);
    raw.strip_prefix("a/")
        .or_else(|| raw.strip_prefix("b/"))
        .unwrap_or(raw)
}

/// Parse one file section starting at `lines[*i]`; advances `*i` past it.
fn parse_file_section(lines: &[&str], i: &mut usize) -> Result<FileDiff, ParseError> {
    let mut git_target: Option<String> = None;
    let mut rename_to: Option<String> = None;
    let mut copy_to: Option<String> = None;
    let mut source_path: Option<String> = None;
    let mut target_path: Option<String> = None;

    if let Some(rest) = lines[*i].strip_prefix("diff --git ") {
        // "diff --git a/old b/new" — keep the post-change side.
        if let Some((_, after)) = rest.split_once(" b/") {
            git_target = Some(after.to_string());
        }
        *i += 1;
    }

    while *i < lines.len() && is_file_meta(lines[*i]) {
        if let Some(p) = lines[*i].strip_prefix("rename to ") {
            rename_to = Some(p.to_string());
        } else if let Some(p) = lines[*i].strip_prefix("copy to ") {
            copy_to = Some(p.to_string());
        }
        *i += 1;
    }

    // Binary patches carry no hunks; skip their payload wholesale.
    let mut binary = false;
    if *i < lines.len() && lines[*i].starts_with("Binary files ") {
        binary = true;
        *i += 1;
    } else if *i < lines.len() && lines[*i].starts_with("GIT binary patch") {
        binary = true;
        *i += 1;
        while *i < lines.len() && !lines[*i].starts_with("diff --git ") {
            *i += 1;
        }
    }

    if !binary && *i < lines.len() && lines[*i].starts_with("--- ") {
        source_path = Some(clean_path(&lines[*i][4..]).to_string());
        *i += 1;
        let Some(tgt) = lines.get(*i).and_then(|l| l.strip_prefix("+++ ")) else {
            return Err(ParseError::UnexpectedLine {
                path: source_path.unwrap_or_default(),
                line: lines.get(*i).unwrap_or(&"<eof>").to_string(),
            });
        };
        target_path = Some(clean_path(tgt).to_string());
        *i += 1;
    }

    // Renamed files are addressed by their post-change path.
    let path = target_path
        .filter(|p| p != "/dev/null")
        .or_else(|| source_path.clone().filter(|p| p != "/dev/null"))
        .or(rename_to)
        .or(copy_to)
        .or(git_target)
        .ok_or(ParseError::NotAPatch)?;

    let mut hunks = Vec::new();
    while *i < lines.len() && lines[*i].starts_with("@@") {
        hunks.push(parse_hunk(lines, i, &path)?);
    }

    // The section must end cleanly at the next section or at EOF.
    if *i < lines.len() && !lines[*i].is_empty() && !is_section_start(lines, *i) {
        return Err(ParseError::UnexpectedLine {
            path,
            line: lines[*i].to_string(),
        });
    }

    Ok(FileDiff { path, hunks })
}

/// Parse a `@@ -a,b +c,d @@` header into (source_start, source_length,
/// target_start, target_length). Omitted lengths default to 1.
fn parse_hunk_header(line: &str) -> Result<(u32, u32, u32, u32), ParseError> {
    let bad = || ParseError::InvalidHunkHeader(line.to_string());
    let rest = line.strip_prefix("@@ -").ok_or_else(bad)?;
    let (ranges, _section) = rest.split_once(" @@").ok_or_else(bad)?;
    let (src, tgt) = ranges.split_once(" +").ok_or_else(bad)?;
    let (source_start, source_length) = split_range(src).ok_or_else(bad)?;
    let (target_start, target_length) = split_range(tgt).ok_or_else(bad)?;
    Ok((source_start, source_length, target_start, target_length))
}

/// Split `"12,7"` or `"12"` into (start, len); a bare start means len 1.
fn split_range(s: &str) -> Option<(u32, u32)> {
    match s.split_once(',') {
        Some((a, b)) => Some((a.parse().ok()?, b.parse().ok()?)),
        None => Some((s.parse().ok()?, 1)),
    }
}

/// Parse one hunk (header plus body) starting at `lines[*i]`.
///
/// The body is read until both declared lengths are satisfied; running out
/// of input, overshooting a side, or meeting an unknown marker is fatal.
fn parse_hunk(lines: &[&str], i: &mut usize, path: &str) -> Result<DiffHunk, ParseError> {
    let (source_start, source_length, target_start, target_length) =
        parse_hunk_header(lines[*i])?;
    *i += 1;

    let mut source_line = source_start;
    let mut target_line = target_start;
    let mut source_seen = 0u32;
    let mut target_seen = 0u32;
    let mut body: Vec<DiffLine> = Vec::new();

    while source_seen < source_length || target_seen < target_length {
        let Some(&line) = lines.get(*i) else {
            return Err(ParseError::UnexpectedEof(path.to_string()));
        };
        *i += 1;

        if line.starts_with('\\') {
            // "\ No newline at end of file" — not diff content.
            continue;
        }

        if let Some(text) = line.strip_prefix('+') {
            if target_seen >= target_length {
                return Err(ParseError::UnexpectedLine {
                    path: path.to_string(),
                    line: line.to_string(),
                });
            }
            body.push(DiffLine::Added {
                target: target_line,
                text: text.to_string(),
            });
            target_line += 1;
            target_seen += 1;
        } else if let Some(text) = line.strip_prefix('-') {
            if source_seen >= source_length {
                return Err(ParseError::UnexpectedLine {
                    path: path.to_string(),
                    line: line.to_string(),
                });
            }
            body.push(DiffLine::Removed {
                source: source_line,
                text: text.to_string(),
            });
            source_line += 1;
            source_seen += 1;
        } else if line.is_empty() || line.starts_with(' ') {
            // Some producers strip trailing whitespace, turning empty
            // context lines into truly empty ones.
            if source_seen >= source_length || target_seen >= target_length {
                return Err(ParseError::UnexpectedLine {
                    path: path.to_string(),
                    line: line.to_string(),
                });
            }
            let text = line.strip_prefix(' ').unwrap_or("");
            body.push(DiffLine::Context {
                source: source_line,
                target: target_line,
                text: text.to_string(),
            });
            source_line += 1;
            source_seen += 1;
            target_line += 1;
            target_seen += 1;
        } else {
            return Err(ParseError::UnexpectedLine {
                path: path.to_string(),
                line: line.to_string(),
            });
        }
    }

    // A trailing no-newline marker belongs to this hunk as well.
    if lines.get(*i).is_some_and(|l| l.starts_with('\\')) {
        *i += 1;
    }

    Ok(DiffHunk {
        source_start,
        source_length,
        target_start,
        target_length,
        lines: body,
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    const PATCH: &str = "\
diff --git a/a.py b/a.py
index 83db48f..bf269f4 100644
--- a/a.py
+++ b/a.py
@@ -1,4 +1,4 @@
 import os
-import sys
+import json

 VERSION = 1
@@ -10,2 +10,4 @@ def main():
     run()
+    flush()
+    close()
     exit()
";

    #[test]
    fn counters_advance_per_side() {
        let (_, full) = parse(PATCH).unwrap();
        assert_eq!(full.files.len(), 1);
        let hunk = &full.files[0].hunks[0];
        assert_eq!(
            hunk.lines[0],
            DiffLine::Context {
                source: 1,
                target: 1,
                text: "import os".into()
            }
        );
        assert_eq!(
            hunk.lines[1],
            DiffLine::Removed {
                source: 2,
                text: "import sys".into()
            }
        );
        assert_eq!(
            hunk.lines[2],
            DiffLine::Added {
                target: 2,
                text: "import json".into()
            }
        );
        // Context after the add/remove pair carries both counters.
        assert_eq!(
            hunk.lines[3],
            DiffLine::Context {
                source: 3,
                target: 3,
                text: "".into()
            }
        );
    }

    #[test]
    fn line_kind_invariant_holds() {
        let (_, full) = parse(PATCH).unwrap();
        for hunk in &full.files[0].hunks {
            for line in &hunk.lines {
                match line {
                    DiffLine::Added { .. } => {
                        assert!(line.target_line().is_some() && line.source_line().is_none())
                    }
                    DiffLine::Removed { .. } => {
                        assert!(line.source_line().is_some() && line.target_line().is_none())
                    }
                    DiffLine::Context { .. } => {
                        assert!(line.source_line().is_some() && line.target_line().is_some())
                    }
                }
            }
        }
    }

    #[test]
    fn target_lines_monotonic_within_and_across_hunks() {
        let (_, full) = parse(PATCH).unwrap();
        let file = &full.files[0];
        let mut last = 0u32;
        for hunk in &file.hunks {
            let mut prev_in_hunk = 0u32;
            for line in &hunk.lines {
                if let Some(t) = line.target_line() {
                    assert!(t >= prev_in_hunk, "non-decreasing within hunk");
                    assert!(t > last || prev_in_hunk > 0, "strictly increasing across hunks");
                    prev_in_hunk = t;
                }
            }
            last = prev_in_hunk;
        }
    }

    #[test]
    fn summary_is_sorted_and_distinct() {
        let (summary, _) = parse(PATCH).unwrap();
        let file = &summary.files[0];
        assert_eq!(file.path, "a.py");
        assert_eq!(file.added_lines, vec![2, 11, 12]);
        assert_eq!(file.removed_lines, vec![2]);
    }

    #[test]
    fn rename_uses_post_change_path() {
        let patch = "\
diff --git a/old_name.py b/new_name.py
similarity index 90%
rename from old_name.py
rename to new_name.py
--- a/old_name.py
+++ b/new_name.py
@@ -1,1 +1,1 @@
-x = 1
+x = 2
";
        let (summary, full) = parse(patch).unwrap();
        assert_eq!(full.files[0].path, "new_name.py");
        assert_eq!(summary.files[0].path, "new_name.py");
    }

    #[test]
    fn pure_rename_has_no_hunks() {
        let patch = "\
diff --git a/old.py b/new.py
similarity index 100%
rename from old.py
rename to new.py
";
        let (_, full) = parse(patch).unwrap();
        assert_eq!(full.files[0].path, "new.py");
        assert!(full.files[0].hunks.is_empty());
    }

    #[test]
    fn binary_file_yields_empty_hunk_list() {
        let patch = "\
diff --git a/logo.png b/logo.png
index 83db48f..bf269f4 100644
Binary files a/logo.png and b/logo.png differ
diff --git a/a.py b/a.py
--- a/a.py
+++ b/a.py
@@ -0,0 +1,1 @@
+x = 1
";
        let (_, full) = parse(patch).unwrap();
        assert_eq!(full.files.len(), 2);
        assert_eq!(full.files[0].path, "logo.png");
        assert!(full.files[0].hunks.is_empty());
        assert_eq!(full.files[1].hunks.len(), 1);
    }

    #[test]
    fn deleted_file_keeps_source_path() {
        let patch = "\
diff --git a/gone.py b/gone.py
deleted file mode 100644
--- a/gone.py
+++ /dev/null
@@ -1,1 +0,0 @@
-x = 1
";
        let (_, full) = parse(patch).unwrap();
        assert_eq!(full.files[0].path, "gone.py");
    }

    #[test]
    fn no_newline_marker_is_ignored() {
        let patch = "\
--- a/a.txt
+++ b/a.txt
@@ -1,1 +1,1 @@
-old
\\ No newline at end of file
+new
\\ No newline at end of file
";
        let (_, full) = parse(patch).unwrap();
        assert_eq!(full.files[0].hunks[0].lines.len(), 2);
    }

    #[test]
    fn malformed_hunk_header_is_fatal() {
        let patch = "--- a/a.py\n+++ b/a.py\n@@ -x,1 +1,1 @@\n-a\n+b\n";
        assert!(matches!(
            parse(patch),
            Err(ParseError::InvalidHunkHeader(_))
        ));
    }

    #[test]
    fn truncated_hunk_is_fatal() {
        let patch = "--- a/a.py\n+++ b/a.py\n@@ -1,2 +1,2 @@\n-a\n+b\n";
        assert!(matches!(parse(patch), Err(ParseError::UnexpectedEof(_))));
    }

    #[test]
    fn junk_inside_hunk_is_fatal() {
        let patch = "--- a/a.py\n+++ b/a.py\n@@ -1,2 +1,2 @@\n-a\n+b\n*weird*\n";
        assert!(matches!(
            parse(patch),
            Err(ParseError::UnexpectedLine { .. })
        ));
    }

    #[test]
    fn garbage_input_is_not_a_patch() {
        assert!(matches!(
            parse("just some prose, nothing else"),
            Err(ParseError::NotAPatch)
        ));
    }

    #[test]
    fn empty_input_yields_empty_views() {
        let (summary, full) = parse("").unwrap();
        assert!(summary.files.is_empty());
        assert!(full.files.is_empty());
    }

    #[test]
    fn parse_is_idempotent() {
        let first = parse(PATCH).unwrap();
        let second = parse(PATCH).unwrap();
        assert_eq!(first, second);
    }

    #[test]
    fn rendered_hunk_reparses_to_equivalent_lines() {
        let (_, full) = parse(PATCH).unwrap();
        let hunk = &full.files[0].hunks[1];
        let rebuilt = format!(
            "--- a/a.py\n+++ b/a.py\n@@ -{},{} +{},{} @@\n{}\n",
            hunk.source_start,
            hunk.source_length,
            hunk.target_start,
            hunk.target_length,
            hunk.render()
        );
        let (_, reparsed) = parse(&rebuilt).unwrap();
        assert_eq!(reparsed.files[0].hunks[0].lines, hunk.lines);
    }
}
