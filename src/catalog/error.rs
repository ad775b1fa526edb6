//! Rich diagnostic error types for catalog loading and flattening.

use miette::Diagnostic;
use thiserror::Error;

/// Errors from reading or flattening the task catalog.
#[derive(Debug, Error, Diagnostic)]
pub enum CatalogError {
    #[error("catalog leaf at {path} in project \"{project}\" has no name")]
    #[diagnostic(
        code(aufgaben::catalog::input_shape),
        help(
            "Every node without `subtasks` is a task and must carry a string `name`. \
             Fix the node at the given path in the catalog file and re-run the import."
        )
    )]
    InputShape { project: String, path: String },

    #[error("failed to read catalog file: {path}")]
    #[diagnostic(
        code(aufgaben::catalog::read),
        help("Check that the file exists, or point `catalog_path` / --catalog at the right location.")
    )]
    SourceRead {
        path: String,
        #[source]
        source: std::io::Error,
    },

    #[error("failed to parse catalog file {path}: {message}")]
    #[diagnostic(
        code(aufgaben::catalog::parse),
        help(
            "The catalog must be a JSON object of the form \
             {{\"projects\": [{{\"id\": 1, \"name\": \"...\", \"Tasks\": [...]}}]}}."
        )
    )]
    SourceParse { path: String, message: String },
}

/// Convenience alias for catalog results.
pub type CatalogResult<T> = std::result::Result<T, CatalogError>;
