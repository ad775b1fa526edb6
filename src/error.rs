//! Rich diagnostic error types for aufgaben.
//!
//! Each subsystem defines its own error type with miette `#[diagnostic]` derives,
//! providing error codes, help text, and source chains so users know exactly what
//! went wrong and how to fix it.

use miette::Diagnostic;
use thiserror::Error;

use crate::catalog::CatalogError;
use crate::config::ConfigError;
use crate::llm::LlmError;
use crate::paths::PathError;
use crate::pipeline::PipelineError;

/// Top-level error type.
///
/// Each variant wraps a subsystem-specific error, preserving the full diagnostic
/// chain (error codes, help text, sources) through to the user.
#[derive(Debug, Error, Diagnostic)]
pub enum AufgabenError {
    #[error(transparent)]
    #[diagnostic(transparent)]
    Catalog(#[from] CatalogError),

    #[error(transparent)]
    #[diagnostic(transparent)]
    Pipeline(#[from] PipelineError),

    #[error(transparent)]
    #[diagnostic(transparent)]
    Llm(#[from] LlmError),

    #[error(transparent)]
    #[diagnostic(transparent)]
    Store(#[from] StoreError),

    #[error(transparent)]
    #[diagnostic(transparent)]
    Config(#[from] ConfigError),

    #[error(transparent)]
    #[diagnostic(transparent)]
    Path(#[from] PathError),
}

// ---------------------------------------------------------------------------
// Store errors
// ---------------------------------------------------------------------------

#[derive(Debug, Error, Diagnostic)]
pub enum StoreError {
    #[error("I/O error: {source}")]
    #[diagnostic(
        code(aufgaben::store::io),
        help(
            "A filesystem operation failed. Check that the data directory exists, \
             has correct permissions, and that the disk is not full."
        )
    )]
    Io {
        #[source]
        source: std::io::Error,
    },

    #[error("redb transaction error: {message}")]
    #[diagnostic(
        code(aufgaben::store::redb),
        help(
            "The embedded database encountered a transaction error. \
             This may indicate corruption. Try running with a fresh data directory \
             and re-importing the catalog."
        )
    )]
    Redb { message: String },

    #[error("serialization error in collection \"{collection}\": {message}")]
    #[diagnostic(
        code(aufgaben::store::serde),
        help(
            "A stored record could not be encoded or decoded. \
             This usually means the record shape changed between versions."
        )
    )]
    Serialization { collection: String, message: String },
}

/// Convenience alias for top-level results.
pub type AufgabenResult<T> = std::result::Result<T, AufgabenError>;
