//! Recovery of JSON fragments from free-form model output.
//!
//! Completions rarely come back as clean JSON: they are wrapped in prose,
//! markdown fences, or both. These helpers locate the fragment; decoding is
//! left to the caller. Matching is regex-based and best effort: deeply nested
//! or adversarial text can defeat it.

use std::sync::LazyLock;

use regex::Regex;

/// Smallest `{...}` span starting at the first `{`.
static RE_OBJECT: LazyLock<Regex> = LazyLock::new(|| Regex::new(r"(?s)\{.*?\}").unwrap());

/// A ```json fenced block; group 1 is the trimmed body.
static RE_FENCED_JSON: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"(?s)```json\s*(.*?)\s*```").unwrap());

/// A minimal array of object literals.
static RE_ARRAY: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"(?s)\[\s*\{.*?\}\s*\]").unwrap());

/// First brace-delimited block, non-greedy.
pub fn first_object(text: &str) -> Option<&str> {
    RE_OBJECT.find(text).map(|m| m.as_str())
}

/// Body of the first ```json fence.
pub fn fenced_json(text: &str) -> Option<&str> {
    RE_FENCED_JSON
        .captures(text)
        .and_then(|caps| caps.get(1))
        .map(|m| m.as_str())
}

/// First array-of-objects shaped span.
pub fn bare_array(text: &str) -> Option<&str> {
    RE_ARRAY.find(text).map(|m| m.as_str())
}
