//! Values produced by the parse pipeline.

use serde::{Deserialize, Deserializer, Serialize};
use serde_json::{Map, Value};

/// Owner and month inferred from the raw notes.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Metadata {
    /// Two-letter initials, e.g. `ML`.
    pub owner: String,
    /// `YYYY-MM`.
    pub month: String,
}

/// One structured time entry, as returned by the model and as persisted.
///
/// Every field is optional: the model output is only checked for shape, not
/// content. Fields the model adds beyond the known seven are kept in `extra`
/// so a saved entry round-trips verbatim.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ParsedEntry {
    /// `YYYY-MM-DD`.
    #[serde(default, deserialize_with = "lenient_string")]
    pub date: Option<String>,
    /// `HH:MM`.
    #[serde(default, deserialize_with = "lenient_string")]
    pub start: Option<String>,
    /// `HH:MM`.
    #[serde(default, deserialize_with = "lenient_string")]
    pub end: Option<String>,
    /// Official catalog task name, or null.
    #[serde(default, deserialize_with = "lenient_string")]
    pub task: Option<String>,
    #[serde(default, deserialize_with = "lenient_string")]
    pub description: Option<String>,
    #[serde(default, deserialize_with = "lenient_string")]
    pub owner: Option<String>,
    /// Official catalog project name, or null.
    #[serde(default, deserialize_with = "lenient_string")]
    pub project: Option<String>,
    #[serde(flatten)]
    pub extra: Map<String, Value>,
}

/// Accept strings, numbers and booleans for text fields; models are sloppy
/// about quoting things like `"start": 930`.
fn lenient_string<'de, D>(deserializer: D) -> Result<Option<String>, D::Error>
where
    D: Deserializer<'de>,
{
    let value = Option::<Value>::deserialize(deserializer)?;
    Ok(match value {
        None | Some(Value::Null) => None,
        Some(Value::String(s)) => Some(s),
        Some(other) => Some(other.to_string()),
    })
}
