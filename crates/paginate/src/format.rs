//! Artifact stripping for upstream answers.
//!
//! Strips the decoration completion models like to emit: per-line leading
//! bullet glyphs, long horizontal-rule runs, and runs of blank lines.
//! `clean_text` is idempotent; applying it twice changes nothing.

use regex::Regex;
use std::sync::LazyLock;

/// Decorative bullet glyphs at the start of a line.
static LINE_MARKER: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"(?m)^[ \t]*[•◦▪‣][ \t]*").expect("valid regex"));

/// Horizontal-rule runs: 4+ separator characters alone on a line.
static RULE_RUN: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"(?m)^[ \t]*[-=_*]{4,}[ \t]*$").expect("valid regex"));

/// Three or more consecutive newlines.
static EXCESS_BLANKS: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"\n{3,}").expect("valid regex"));

/// Removes known decorative artifacts and trims the result.
pub fn clean_text(raw: &str) -> String {
    let stripped = LINE_MARKER.replace_all(raw, "");
    let stripped = RULE_RUN.replace_all(&stripped, "");
    let collapsed = EXCESS_BLANKS.replace_all(&stripped, "\n\n");
    collapsed.trim().to_string()
}
