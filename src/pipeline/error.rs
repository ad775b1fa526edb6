//! Rich diagnostic error types for the two-stage parse pipeline.

use miette::Diagnostic;
use thiserror::Error;

use crate::llm::LlmError;

/// Stage-1 failures: owner/month could not be recovered from the completion.
#[derive(Debug, Error, Diagnostic)]
pub enum ExtractionError {
    #[error("no JSON object found in the metadata completion")]
    #[diagnostic(
        code(aufgaben::extract::no_json_block),
        help(
            "The model answered without any {{...}} block. Make sure the notes mention \
             whose they are and which month they cover, then try again."
        )
    )]
    NoJsonBlock,

    #[error("metadata completion contained invalid JSON: {message}")]
    #[diagnostic(
        code(aufgaben::extract::malformed_json),
        help("The model produced a brace-delimited block that is not valid JSON. Re-run the request.")
    )]
    MalformedJson { message: String },

    #[error("metadata is incomplete: missing {missing}")]
    #[diagnostic(
        code(aufgaben::extract::incomplete),
        help(
            "Both `owner` (two-letter initials) and `month` (YYYY-MM) are required. \
             Add the initials or a date to the notes."
        )
    )]
    IncompleteMetadata { missing: String },
}

/// Stage-2 failures: no entry array could be recovered from the completion.
#[derive(Debug, Error, Diagnostic)]
pub enum MatchError {
    #[error("no JSON array found in the matching completion")]
    #[diagnostic(
        code(aufgaben::matcher::no_json_block),
        help("The model answered without a ```json fence or a [{{...}}] array. Re-run the request.")
    )]
    NoJsonBlock,

    #[error("matching completion contained invalid JSON: {message}")]
    #[diagnostic(
        code(aufgaben::matcher::malformed_json),
        help("The extracted block is not a JSON array of objects. Re-run the request.")
    )]
    MalformedJson { message: String },

    #[error("catalog context could not be encoded for the matching prompt: {message}")]
    #[diagnostic(
        code(aufgaben::matcher::context_encoding),
        help("The catalog records for this owner and month could not be serialised. Re-import the catalog.")
    )]
    ContextEncoding { message: String },
}

/// The two points where the pipeline waits on the generation backend.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BackendStage {
    Metadata,
    Match,
}

impl std::fmt::Display for BackendStage {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Metadata => f.write_str("metadata extraction"),
            Self::Match => f.write_str("entry matching"),
        }
    }
}

/// Terminal failure of a parse request.
#[derive(Debug, Error, Diagnostic)]
pub enum PipelineError {
    #[error("input text is empty")]
    #[diagnostic(
        code(aufgaben::pipeline::empty_input),
        help("Provide the time-tracking notes to parse.")
    )]
    EmptyInput,

    #[error(transparent)]
    #[diagnostic(transparent)]
    Extraction(#[from] ExtractionError),

    #[error(transparent)]
    #[diagnostic(transparent)]
    Match(#[from] MatchError),

    #[error("generation backend failed during {stage}")]
    #[diagnostic(
        code(aufgaben::pipeline::backend),
        help("The request was not retried. Check the backend and submit the notes again.")
    )]
    Backend {
        stage: BackendStage,
        #[source]
        source: LlmError,
    },
}

impl PipelineError {
    /// Whether the notes themselves could not yield an owner and month.
    /// Backend failures never count, whatever stage they hit.
    pub fn is_metadata_failure(&self) -> bool {
        matches!(self, Self::EmptyInput | Self::Extraction(_))
    }
}

/// Convenience alias for pipeline results.
pub type PipelineResult<T> = std::result::Result<T, PipelineError>;

#[cfg(test)]
mod tests {
    use super::*;

    fn backend(stage: BackendStage, source: LlmError) -> PipelineError {
        PipelineError::Backend { stage, source }
    }

    #[test]
    fn input_and_extraction_failures_are_metadata_failures() {
        assert!(PipelineError::EmptyInput.is_metadata_failure());
        for err in [
            ExtractionError::NoJsonBlock,
            ExtractionError::MalformedJson {
                message: "eof".into(),
            },
            ExtractionError::IncompleteMetadata {
                missing: "month".into(),
            },
        ] {
            assert!(PipelineError::from(err).is_metadata_failure());
        }
    }

    #[test]
    fn backend_failures_are_never_metadata_failures() {
        let unavailable = || LlmError::Unavailable {
            url: "http://127.0.0.1:11434".into(),
        };
        assert!(!backend(BackendStage::Metadata, unavailable()).is_metadata_failure());
        assert!(
            !backend(BackendStage::Metadata, LlmError::Timeout { timeout_secs: 120 })
                .is_metadata_failure()
        );
        assert!(!backend(BackendStage::Match, unavailable()).is_metadata_failure());
    }

    #[test]
    fn match_failures_are_not_metadata_failures() {
        assert!(!PipelineError::from(MatchError::NoJsonBlock).is_metadata_failure());
        assert!(
            !PipelineError::from(MatchError::ContextEncoding {
                message: "key must be a string".into()
            })
            .is_metadata_failure()
        );
        assert!(
            !PipelineError::from(MatchError::MalformedJson {
                message: "eof".into()
            })
            .is_metadata_failure()
        );
    }

    #[test]
    fn backend_error_names_its_stage() {
        let err = backend(BackendStage::Metadata, LlmError::Timeout { timeout_secs: 5 });
        assert_eq!(
            err.to_string(),
            "generation backend failed during metadata extraction"
        );
    }
}
