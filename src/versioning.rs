//! Version-annotated title handling.
//!
//! Questionnaire titles embed their version label as a trailing marker,
//! e.g. `"ASQ-3 (versão: 2.0)"`. Only the literal `(versão: …)` marker is
//! recognised — unrelated parentheses in a title are left alone, and a
//! malformed marker falls back to treating the whole title as the base.

use std::sync::LazyLock;

use regex::Regex;

static VERSION_MARKER: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"\s*\(versão:\s*([^()]*)\)\s*$").expect("valid regex"));

/// Title with any trailing version marker removed.
pub fn base_title(title: &str) -> &str {
    match VERSION_MARKER.find(title) {
        Some(m) => title[..m.start()].trim(),
        None => title.trim(),
    }
}

/// The version label embedded in a title, if any.
pub fn version_label(title: &str) -> Option<&str> {
    VERSION_MARKER
        .captures(title)
        .and_then(|c| c.get(1))
        .map(|m| m.as_str().trim())
}

/// Canonical annotated title for a base title and version label.
pub fn versioned_title(base: &str, label: &str) -> String {
    format!("{} (versão: {})", base.trim(), label.trim())
}

/// Strip any existing marker from `raw_title` and annotate with `label`.
///
/// Idempotent for a fixed label: deriving from an already-derived title
/// reproduces the same string.
pub fn derive_title(raw_title: &str, label: &str) -> String {
    versioned_title(base_title(raw_title), label)
}
