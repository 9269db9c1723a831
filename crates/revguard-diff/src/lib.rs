// crates/revguard-diff/src/lib.rs
// ============================================================================
// Module: Revguard Diff Parser
// Description: Parses unified diffs into changed-path sets and classified
//   add/modify/delete records with representative snippets.
// Purpose: Give both processors a single, pure way to turn a VCS-fetched
//   diff into the path sets the rest of the pipeline reasons about.
// Dependencies: none
// ============================================================================

//! ## Overview
//! [`DiffParser`] is a zero-state struct with `&self` methods — no interior
//! mutability, no I/O — so it composes as a plain dependency injected into
//! both processors, following the donor's "pure capability struct, trait
//! optional" shape. Every method is infallible: malformed or empty input
//! yields empty results rather than an error, matching §4.2's contract.
//!
//! Signature-line heuristics for snippet prioritisation are table-driven over
//! a small static list of per-language marker tokens rather than per-language
//! parsers, consistent with the donor's avoidance of inheritance-shaped
//! polymorphism for provider-like variation.

#![forbid(unsafe_code)]

// ============================================================================
// SECTION: Imports
// ============================================================================

use std::collections::BTreeSet;

// ============================================================================
// SECTION: Constants
// ============================================================================

/// Maximum length a snippet is truncated to (§4.2).
const SNIPPET_MAX_LEN: usize = 150;

/// Per-language marker tokens used to prioritise signature-like added lines
/// as snippets. Table-driven rather than a per-language parser.
const SIGNATURE_MARKERS: &[&str] = &[
    "fn ", "func ", "def ", "class ", "public ", "private ", "function ", "impl ",
];

// ============================================================================
// SECTION: Output Types
// ============================================================================

/// Result of [`DiffParser::parse_diff`]: the full classification of a
/// unified diff.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct ParsedDiff {
    /// Paths that were added or modified (including renamed-to paths).
    pub added_or_modified: BTreeSet<String>,
    /// Paths that were deleted.
    pub deleted: BTreeSet<String>,
    /// Representative `+`-added lines, signature-like lines prioritised,
    /// each truncated to [`SNIPPET_MAX_LEN`] characters, in diff order.
    pub snippets: Vec<String>,
}

/// Per-file classification while scanning a `diff --git` block.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum FileChangeKind {
    /// Default: file content changed, file still exists afterward.
    AddedOrModified,
    /// `deleted file mode` seen in this block.
    Deleted,
}

// ============================================================================
// SECTION: Parser
// ============================================================================

/// Pure unified-diff parser; safe to invoke concurrently.
#[derive(Debug, Clone, Copy, Default)]
pub struct DiffParser;

impl DiffParser {
    /// Creates a new parser. Carries no state.
    #[must_use]
    pub const fn new() -> Self {
        Self
    }

    /// Extracts the set of changed paths from a unified diff, preferring the
    /// `b/` path of each `diff --git a/<x> b/<y>` header. Blank and
    /// malformed lines are ignored. Empty input yields an empty set.
    #[must_use]
    pub fn parse_changed_paths(&self, unified_diff: &str) -> BTreeSet<String> {
        unified_diff
            .lines()
            .filter_map(parse_git_diff_header)
            .map(|(_, b_path)| b_path)
            .collect()
    }

    /// Parses a unified diff into classified add/modify/delete path sets
    /// plus representative snippets.
    #[must_use]
    pub fn parse_diff(&self, unified_diff: &str) -> ParsedDiff {
        let mut result = ParsedDiff::default();
        let mut current_path: Option<String> = None;
        let mut current_kind = FileChangeKind::AddedOrModified;

        for line in unified_diff.lines() {
            if let Some((_a_path, b_path)) = parse_git_diff_header(line) {
                commit_current_path(&mut result, current_path.take(), current_kind);
                current_path = Some(b_path);
                current_kind = FileChangeKind::AddedOrModified;
                continue;
            }

            if current_path.is_none() {
                continue;
            }

            if line.starts_with("new file mode") {
                current_kind = FileChangeKind::AddedOrModified;
            } else if line.starts_with("deleted file mode") {
                current_kind = FileChangeKind::Deleted;
            } else if line.starts_with("rename from ") {
                // Content now lives at the b/ path; treat as modified.
                current_kind = FileChangeKind::AddedOrModified;
            } else if is_added_content_line(line) {
                if let Some(snippet) = extract_signature_snippet(line) {
                    result.snippets.push(snippet);
                }
            }
        }
        commit_current_path(&mut result, current_path, current_kind);

        result
    }
}

/// Finalizes the pending path (if any) into the appropriate set.
fn commit_current_path(result: &mut ParsedDiff, path: Option<String>, kind: FileChangeKind) {
    let Some(path) = path else {
        return;
    };
    match kind {
        FileChangeKind::AddedOrModified => {
            result.added_or_modified.insert(path);
        }
        FileChangeKind::Deleted => {
            result.deleted.insert(path);
        }
    }
}

/// Parses a `diff --git a/<x> b/<y>` header line, returning `(a_path,
/// b_path)`. Returns `None` for any other line, including blank or malformed
/// headers.
fn parse_git_diff_header(line: &str) -> Option<(String, String)> {
    let rest = line.strip_prefix("diff --git ")?;
    let rest = rest.strip_prefix("a/")?;
    let (a_path, b_with_prefix) = rest.split_once(" b/")?;
    if a_path.is_empty() || b_with_prefix.is_empty() {
        return None;
    }
    Some((a_path.to_string(), b_with_prefix.to_string()))
}

/// Returns whether `line` is an added-content line (`+` prefixed, not the
/// `+++` file-header line).
fn is_added_content_line(line: &str) -> bool {
    line.starts_with('+') && !line.starts_with("+++")
}

/// Extracts a truncated snippet from an added line if it looks like a
/// function/class signature, per [`SIGNATURE_MARKERS`].
fn extract_signature_snippet(line: &str) -> Option<String> {
    let content = line.trim_start_matches('+').trim_start();
    let is_signature = SIGNATURE_MARKERS.iter().any(|marker| content.contains(marker));
    if !is_signature {
        return None;
    }
    Some(truncate_chars(content, SNIPPET_MAX_LEN))
}

/// Truncates `text` to at most `max_len` characters (not bytes), respecting
/// UTF-8 boundaries.
fn truncate_chars(text: &str, max_len: usize) -> String {
    text.chars().take(max_len).collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    const SAMPLE_DIFF: &str = concat!(
        "diff --git a/src/a.py b/src/a.py\n",
        "index 1111111..2222222 100644\n",
        "--- a/src/a.py\n",
        "+++ b/src/a.py\n",
        "@@ -1,3 +1,5 @@\n",
        " import os\n",
        "+def handle_request(req):\n",
        "+    return req\n",
        " value = 1\n",
        "diff --git a/src/new.py b/src/new.py\n",
        "new file mode 100644\n",
        "--- /dev/null\n",
        "+++ b/src/new.py\n",
        "@@ -0,0 +1,2 @@\n",
        "+class Handler:\n",
        "+    pass\n",
        "diff --git a/src/old.py b/src/old.py\n",
        "deleted file mode 100644\n",
        "--- a/src/old.py\n",
        "+++ /dev/null\n",
        "@@ -1,2 +0,0 @@\n",
        "-legacy = True\n",
    );

    #[test]
    fn parse_changed_paths_prefers_b_path() {
        let parser = DiffParser::new();
        let paths = parser.parse_changed_paths(SAMPLE_DIFF);
        assert_eq!(
            paths,
            BTreeSet::from([
                "src/a.py".to_string(),
                "src/new.py".to_string(),
                "src/old.py".to_string(),
            ])
        );
    }

    #[test]
    fn parse_changed_paths_on_empty_input_is_empty() {
        let parser = DiffParser::new();
        assert!(parser.parse_changed_paths("").is_empty());
    }

    #[test]
    fn parse_diff_classifies_add_modify_delete() {
        let parser = DiffParser::new();
        let parsed = parser.parse_diff(SAMPLE_DIFF);
        assert_eq!(
            parsed.added_or_modified,
            BTreeSet::from(["src/a.py".to_string(), "src/new.py".to_string()])
        );
        assert_eq!(parsed.deleted, BTreeSet::from(["src/old.py".to_string()]));
    }

    #[test]
    fn parse_diff_prioritises_signature_snippets() {
        let parser = DiffParser::new();
        let parsed = parser.parse_diff(SAMPLE_DIFF);
        assert_eq!(parsed.snippets.len(), 2);
        assert!(parsed.snippets[0].contains("def handle_request"));
        assert!(parsed.snippets[1].contains("class Handler"));
    }

    #[test]
    fn parse_diff_on_empty_input_is_empty() {
        let parser = DiffParser::new();
        let parsed = parser.parse_diff("");
        assert!(parsed.added_or_modified.is_empty());
        assert!(parsed.deleted.is_empty());
        assert!(parsed.snippets.is_empty());
    }

    #[test]
    fn parse_diff_is_idempotent() {
        let parser = DiffParser::new();
        assert_eq!(parser.parse_diff(SAMPLE_DIFF), parser.parse_diff(SAMPLE_DIFF));
    }

    #[test]
    fn rename_is_classified_as_modified() {
        let diff = concat!(
            "diff --git a/src/old_name.py b/src/new_name.py\n",
            "similarity index 100%\n",
            "rename from src/old_name.py\n",
            "rename to src/new_name.py\n",
        );
        let parser = DiffParser::new();
        let parsed = parser.parse_diff(diff);
        assert!(parsed.added_or_modified.contains("src/new_name.py"));
        assert!(parsed.deleted.is_empty());
    }

    #[test]
    fn snippet_is_truncated_to_150_chars() {
        let long_body = "x".repeat(200);
        let diff = format!("diff --git a/src/a.py b/src/a.py\n+def f({long_body}):\n");
        let parser = DiffParser::new();
        let parsed = parser.parse_diff(&diff);
        assert_eq!(parsed.snippets.len(), 1);
        assert_eq!(parsed.snippets[0].chars().count(), SNIPPET_MAX_LEN);
    }
}

#[cfg(test)]
mod proptests {
    use proptest::prelude::*;

    use super::*;

    proptest! {
        #[test]
        fn parse_diff_never_panics_on_arbitrary_text(text in ".*") {
            let parser = DiffParser::new();
            let _ = parser.parse_diff(&text);
            let _ = parser.parse_changed_paths(&text);
        }

        #[test]
        fn parse_diff_is_idempotent_on_arbitrary_text(text in ".*") {
            let parser = DiffParser::new();
            prop_assert_eq!(parser.parse_diff(&text), parser.parse_diff(&text));
        }
    }
}
