//! Stage 1: infer owner and month from the raw notes.

use serde_json::Value;

use super::error::{BackendStage, ExtractionError, PipelineError};
use super::json::first_object;
use super::model::Metadata;
use crate::llm::TextCompletion;

/// Asks the backend whose notes these are and which month they cover.
pub struct MetadataExtractor<'a> {
    backend: &'a dyn TextCompletion,
}

impl<'a> MetadataExtractor<'a> {
    pub fn new(backend: &'a dyn TextCompletion) -> Self {
        Self { backend }
    }

    /// One completion round trip, then [`parse`].
    pub fn extract(&self, raw_text: &str) -> Result<Metadata, PipelineError> {
        let completion = self
            .backend
            .complete(&prompt(raw_text))
            .map_err(|source| PipelineError::Backend {
                stage: BackendStage::Metadata,
                source,
            })?;
        Ok(parse(&completion)?)
    }
}

/// Instruction for the metadata request, with `raw_text` embedded verbatim.
pub fn prompt(raw_text: &str) -> String {
    format!(
        "Read the time-tracking notes below and work out whose notes they are \
         and which month they cover.\n\
         \n\
         Reply with strict JSON only, exactly in this shape:\n\
         {{\n  \"owner\": \"ML\",\n  \"month\": \"2025-04\"\n}}\n\
         \n\
         \"owner\" is the employee's two-letter initials, \"month\" is YYYY-MM.\n\
         \n\
         Notes:\n\
         {raw_text}\n"
    )
}

/// Recover `{owner, month}` from a free-form completion. Values are kept as
/// given; an empty or whitespace-only string counts as missing.
pub fn parse(completion: &str) -> Result<Metadata, ExtractionError> {
    let block = first_object(completion).ok_or(ExtractionError::NoJsonBlock)?;
    let value: Value =
        serde_json::from_str(block).map_err(|e| ExtractionError::MalformedJson {
            message: e.to_string(),
        })?;

    let field = |name: &str| {
        value
            .get(name)
            .and_then(Value::as_str)
            .filter(|s| !s.trim().is_empty())
            .map(str::to_string)
    };

    match (field("owner"), field("month")) {
        (Some(owner), Some(month)) => Ok(Metadata { owner, month }),
        (None, Some(_)) => Err(ExtractionError::IncompleteMetadata {
            missing: "owner".into(),
        }),
        (Some(_), None) => Err(ExtractionError::IncompleteMetadata {
            missing: "month".into(),
        }),
        (None, None) => Err(ExtractionError::IncompleteMetadata {
            missing: "owner and month".into(),
        }),
    }
}
