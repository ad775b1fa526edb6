//! Two-stage parse pipeline: raw notes in, structured entries out.
//!
//! ```text
//! Received → MetadataPending → MetadataOk | MetadataFailed
//!          → CatalogFiltered → MatchPending → MatchOk | MatchFailed
//! ```
//!
//! The pipeline suspends only in the two `*Pending` stages, each a single
//! round trip to the generation backend. Any `*Failed` stage is terminal and
//! nothing is retried.

pub mod error;
pub mod json;
pub mod matcher;
pub mod metadata;
pub mod model;

use std::sync::Arc;

use crate::catalog::{group_by_project, CatalogIndex, ProjectGroup};
use crate::llm::TextCompletion;

pub use error::{BackendStage, ExtractionError, MatchError, PipelineError, PipelineResult};
pub use matcher::EntryMatcher;
pub use metadata::MetadataExtractor;
pub use model::{Metadata, ParsedEntry};

/// Where a parse request currently stands.
#[derive(Debug)]
pub enum ParseStage {
    Received,
    MetadataPending,
    MetadataOk(Metadata),
    MetadataFailed(PipelineError),
    CatalogFiltered {
        metadata: Metadata,
        context: Vec<ProjectGroup>,
    },
    MatchPending {
        metadata: Metadata,
        context: Vec<ProjectGroup>,
    },
    MatchOk(ParseOutcome),
    MatchFailed(PipelineError),
}

impl ParseStage {
    pub fn name(&self) -> &'static str {
        match self {
            Self::Received => "received",
            Self::MetadataPending => "metadata_pending",
            Self::MetadataOk(_) => "metadata_ok",
            Self::MetadataFailed(_) => "metadata_failed",
            Self::CatalogFiltered { .. } => "catalog_filtered",
            Self::MatchPending { .. } => "match_pending",
            Self::MatchOk(_) => "match_ok",
            Self::MatchFailed(_) => "match_failed",
        }
    }

    pub fn is_terminal(&self) -> bool {
        matches!(
            self,
            Self::MetadataFailed(_) | Self::MatchOk(_) | Self::MatchFailed(_)
        )
    }
}

/// Successful result of one parse request.
#[derive(Debug, Clone, PartialEq)]
pub struct ParseOutcome {
    pub metadata: Metadata,
    /// Catalog groups that were offered to the matcher.
    pub context: Vec<ProjectGroup>,
    pub entries: Vec<ParsedEntry>,
}

/// Runs parse requests against a shared, read-only catalog index.
pub struct ParsePipeline<C> {
    backend: C,
    index: Arc<CatalogIndex>,
}

impl<C: TextCompletion> ParsePipeline<C> {
    pub fn new(backend: C, index: Arc<CatalogIndex>) -> Self {
        Self { backend, index }
    }

    pub fn backend(&self) -> &C {
        &self.backend
    }

    pub fn index(&self) -> &Arc<CatalogIndex> {
        &self.index
    }

    /// Parse `raw_text` into entries.
    pub fn run(&self, raw_text: &str) -> PipelineResult<ParseOutcome> {
        self.run_observed(raw_text, |_| {})
    }

    /// Like [`run`](Self::run), calling `observe` on every stage entered.
    pub fn run_observed(
        &self,
        raw_text: &str,
        mut observe: impl FnMut(&ParseStage),
    ) -> PipelineResult<ParseOutcome> {
        if raw_text.trim().is_empty() {
            return Err(PipelineError::EmptyInput);
        }

        let mut stage = ParseStage::Received;
        observe(&stage);
        loop {
            stage = self.advance(stage, raw_text);
            tracing::debug!(stage = stage.name(), "parse pipeline transition");
            observe(&stage);

            match stage {
                ParseStage::MatchOk(outcome) => {
                    tracing::info!(
                        owner = %outcome.metadata.owner,
                        month = %outcome.metadata.month,
                        entries = outcome.entries.len(),
                        "parse complete"
                    );
                    return Ok(outcome);
                }
                ParseStage::MetadataFailed(err) | ParseStage::MatchFailed(err) => {
                    tracing::warn!(error = %err, "parse failed");
                    return Err(err);
                }
                pending => stage = pending,
            }
        }
    }

    /// Perform exactly one transition.
    pub fn advance(&self, stage: ParseStage, raw_text: &str) -> ParseStage {
        match stage {
            ParseStage::Received => ParseStage::MetadataPending,
            ParseStage::MetadataPending => {
                match MetadataExtractor::new(&self.backend).extract(raw_text) {
                    Ok(metadata) => ParseStage::MetadataOk(metadata),
                    Err(err) => ParseStage::MetadataFailed(err),
                }
            }
            ParseStage::MetadataOk(metadata) => {
                let records = self.index.query(&metadata.owner, &metadata.month);
                let context = group_by_project(&records);
                tracing::debug!(
                    owner = %metadata.owner,
                    month = %metadata.month,
                    tasks = records.len(),
                    projects = context.len(),
                    "catalog filtered"
                );
                ParseStage::CatalogFiltered { metadata, context }
            }
            ParseStage::CatalogFiltered { metadata, context } => {
                ParseStage::MatchPending { metadata, context }
            }
            ParseStage::MatchPending { metadata, context } => {
                let matched = EntryMatcher::new(&self.backend).match_entries(
                    raw_text,
                    &metadata.owner,
                    &metadata.month,
                    &context,
                );
                match matched {
                    Ok(entries) => ParseStage::MatchOk(ParseOutcome {
                        metadata,
                        context,
                        entries,
                    }),
                    Err(err) => ParseStage::MatchFailed(err),
                }
            }
            terminal => terminal,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Mutex;

    use crate::catalog::FlatTaskRecord;
    use crate::llm::LlmError;

    /// Replays canned completions in order and records the prompts it saw.
    struct Scripted {
        replies: Mutex<Vec<Result<String, LlmError>>>,
        prompts: Mutex<Vec<String>>,
    }

    impl Scripted {
        fn new(replies: Vec<Result<String, LlmError>>) -> Self {
            Self {
                replies: Mutex::new(replies.into_iter().rev().collect()),
                prompts: Mutex::new(Vec::new()),
            }
        }
    }

    impl TextCompletion for Scripted {
        fn complete(&self, prompt: &str) -> Result<String, LlmError> {
            self.prompts.lock().unwrap().push(prompt.to_string());
            self.replies
                .lock()
                .unwrap()
                .pop()
                .unwrap_or_else(|| Err(LlmError::RequestFailed {
                    message: "script exhausted".into(),
                }))
        }
    }

    fn index() -> Arc<CatalogIndex> {
        Arc::new(CatalogIndex::with_records(vec![FlatTaskRecord {
            project_id: Some(1258),
            project_name: Some("1258 - PDM".into()),
            task_name: "(SK) - BuP - April'25".into(),
            owner: Some("SK".into()),
            month: Some("2025-04".into()),
        }]))
    }

    fn stage_names(pipeline: &ParsePipeline<Scripted>, raw: &str) -> (Vec<&'static str>, PipelineResult<ParseOutcome>) {
        let mut names = Vec::new();
        let result = pipeline.run_observed(raw, |s| names.push(s.name()));
        (names, result)
    }

    #[test]
    fn happy_path_visits_every_stage() {
        let backend = Scripted::new(vec![
            Ok(r#"{"owner":"SK","month":"2025-04"}"#.into()),
            Ok(r#"[{"date":"2025-04-03","task":"(SK) - BuP - April'25"}]"#.into()),
        ]);
        let pipeline = ParsePipeline::new(backend, index());
        let (names, result) = stage_names(&pipeline, "03.04. 9-11 BuP");
        assert_eq!(
            names,
            vec![
                "received",
                "metadata_pending",
                "metadata_ok",
                "catalog_filtered",
                "match_pending",
                "match_ok"
            ]
        );
        let outcome = result.unwrap();
        assert_eq!(outcome.context.len(), 1);
        assert_eq!(outcome.entries[0].task.as_deref(), Some("(SK) - BuP - April'25"));

        let prompts = pipeline.backend().prompts.lock().unwrap();
        assert_eq!(prompts.len(), 2);
        assert!(prompts[1].contains("1258 - PDM"));
    }

    #[test]
    fn metadata_failure_stops_before_matching() {
        let backend = Scripted::new(vec![Ok("no idea".into())]);
        let pipeline = ParsePipeline::new(backend, index());
        let (names, result) = stage_names(&pipeline, "irgendwas");
        assert_eq!(names.last(), Some(&"metadata_failed"));
        let err = result.unwrap_err();
        assert!(matches!(err, PipelineError::Extraction(ExtractionError::NoJsonBlock)));
        assert!(err.is_metadata_failure());
        assert_eq!(pipeline.backend().prompts.lock().unwrap().len(), 1);
    }

    #[test]
    fn backend_error_is_reported_with_its_stage() {
        let backend = Scripted::new(vec![
            Ok(r#"{"owner":"SK","month":"2025-04"}"#.into()),
            Err(LlmError::Timeout { timeout_secs: 120 }),
        ]);
        let pipeline = ParsePipeline::new(backend, index());
        let (names, result) = stage_names(&pipeline, "03.04. 9-11 BuP");
        assert_eq!(names.last(), Some(&"match_failed"));
        let err = result.unwrap_err();
        assert!(matches!(
            err,
            PipelineError::Backend {
                stage: BackendStage::Match,
                source: LlmError::Timeout { .. }
            }
        ));
        assert!(!err.is_metadata_failure());
    }

    #[test]
    fn unknown_owner_gets_empty_context() {
        let backend = Scripted::new(vec![
            Ok(r#"{"owner":"ZZ","month":"2025-04"}"#.into()),
            Ok("[{\"date\":\"2025-04-03\",\"task\":null}]".into()),
        ]);
        let pipeline = ParsePipeline::new(backend, index());
        let outcome = pipeline.run("ZZ 03.04. 9-11").unwrap();
        assert!(outcome.context.is_empty());
        assert_eq!(outcome.entries.len(), 1);
    }

    #[test]
    fn empty_input_never_reaches_the_backend() {
        let pipeline = ParsePipeline::new(Scripted::new(vec![]), index());
        assert!(matches!(pipeline.run("   \n"), Err(PipelineError::EmptyInput)));
        assert!(pipeline.backend().prompts.lock().unwrap().is_empty());
    }

    #[test]
    fn terminal_stage_does_not_advance() {
        let pipeline = ParsePipeline::new(Scripted::new(vec![]), index());
        let stage = pipeline.advance(ParseStage::MatchFailed(MatchError::NoJsonBlock.into()), "x");
        assert_eq!(stage.name(), "match_failed");
        assert!(stage.is_terminal());
        assert!(!ParseStage::Received.is_terminal());
    }
}
