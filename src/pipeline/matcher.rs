//! Stage 2: map the raw notes onto known catalog tasks.

use super::error::{BackendStage, MatchError, PipelineError};
use super::json::{bare_array, fenced_json};
use super::model::ParsedEntry;
use crate::catalog::ProjectGroup;
use crate::llm::TextCompletion;

/// Asks the backend for structured entries, given the owner's catalog context.
pub struct EntryMatcher<'a> {
    backend: &'a dyn TextCompletion,
}

impl<'a> EntryMatcher<'a> {
    pub fn new(backend: &'a dyn TextCompletion) -> Self {
        Self { backend }
    }

    /// One completion round trip, then [`parse`].
    ///
    /// `owner` and `month` are already reflected in `context`; they are
    /// logged but not sent separately.
    pub fn match_entries(
        &self,
        raw_text: &str,
        owner: &str,
        month: &str,
        context: &[ProjectGroup],
    ) -> Result<Vec<ParsedEntry>, PipelineError> {
        tracing::debug!(owner, month, projects = context.len(), "matching entries");
        let request = prompt(raw_text, context)?;
        let completion = self
            .backend
            .complete(&request)
            .map_err(|source| PipelineError::Backend {
                stage: BackendStage::Match,
                source,
            })?;
        Ok(parse(&completion)?)
    }
}

/// Instruction for the matching request: catalog context, output rules, then the notes.
pub fn prompt(raw_text: &str, context: &[ProjectGroup]) -> Result<String, MatchError> {
    let context_json =
        serde_json::to_string_pretty(context).map_err(|e| MatchError::ContextEncoding {
            message: e.to_string(),
        })?;
    Ok(format!(
        "You turn free-form employee time-tracking notes into structured records.\n\
         \n\
         Each line or fragment of the notes describes a work session. \
         These are the projects and tasks known for this employee and month:\n\
         {context_json}\n\
         \n\
         For every work session:\n\
         1. Take the date, start time, end time and description from the notes.\n\
         2. Pick the known task and project it most plausibly belongs to, \
         judging by meaning rather than exact wording.\n\
         3. \"task\" must be an official taskName from the list above \
         (for example \"(TS) - BD - April'25\").\n\
         4. \"project\" must be the matching official projectName.\n\
         5. \"description\" keeps the employee's own words (for example \"Figma-Export Konzept\").\n\
         6. If no task or project fits with confidence, use null.\n\
         \n\
         Output: a JSON array of objects with exactly these fields:\n\
         [\n\
         \x20 {{\n\
         \x20   \"date\": \"YYYY-MM-DD\",\n\
         \x20   \"start\": \"HH:MM\",\n\
         \x20   \"end\": \"HH:MM\",\n\
         \x20   \"task\": \"official task name or null\",\n\
         \x20   \"description\": \"what was done\",\n\
         \x20   \"owner\": \"two-letter initials\",\n\
         \x20   \"project\": \"official project name or null\"\n\
         \x20 }}\n\
         ]\n\
         \n\
         Return only the JSON array. No markdown, no comments, no explanation.\n\
         \n\
         Input:\n\
         {raw_text}"
    ))
}

/// Recover the entry array from a completion.
///
/// A ```json fence wins over a bare array anywhere else in the text.
pub fn parse(completion: &str) -> Result<Vec<ParsedEntry>, MatchError> {
    let block = fenced_json(completion)
        .or_else(|| bare_array(completion))
        .ok_or(MatchError::NoJsonBlock)?;
    serde_json::from_str(block).map_err(|e| MatchError::MalformedJson {
        message: e.to_string(),
    })
}
