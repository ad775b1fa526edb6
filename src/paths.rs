//! XDG-compliant path resolution.

use std::path::PathBuf;

use miette::Diagnostic;
use thiserror::Error;

/// Errors from path resolution.
#[derive(Debug, Error, Diagnostic)]
pub enum PathError {
    #[error("cannot determine home directory")]
    #[diagnostic(
        code(aufgaben::paths::no_home),
        help("Set the HOME environment variable, or pass --data-dir and --config explicitly.")
    )]
    NoHome,

    #[error("failed to create directory: {path}")]
    #[diagnostic(
        code(aufgaben::paths::create_dir),
        help("Check that the parent directory exists and you have write permissions.")
    )]
    CreateDir {
        path: String,
        #[source]
        source: std::io::Error,
    },
}

pub type PathResult<T> = std::result::Result<T, PathError>;

/// Global directories for aufgaben.
#[derive(Debug, Clone)]
pub struct AppPaths {
    /// `$XDG_CONFIG_HOME/aufgaben/`
    pub config_dir: PathBuf,
    /// `$XDG_DATA_HOME/aufgaben/`
    pub data_dir: PathBuf,
}

impl AppPaths {
    /// Resolve XDG directories from environment variables with standard fallbacks.
    pub fn resolve() -> PathResult<Self> {
        let home = std::env::var("HOME")
            .map(PathBuf::from)
            .map_err(|_| PathError::NoHome)?;

        let config_dir = std::env::var("XDG_CONFIG_HOME")
            .map(PathBuf::from)
            .unwrap_or_else(|_| home.join(".config"))
            .join("aufgaben");

        let data_dir = std::env::var("XDG_DATA_HOME")
            .map(PathBuf::from)
            .unwrap_or_else(|_| home.join(".local/share"))
            .join("aufgaben");

        Ok(Self {
            config_dir,
            data_dir,
        })
    }

    /// Create all base directories. Idempotent.
    pub fn ensure_dirs(&self) -> PathResult<()> {
        for dir in [&self.config_dir, &self.data_dir] {
            std::fs::create_dir_all(dir).map_err(|e| PathError::CreateDir {
                path: dir.display().to_string(),
                source: e,
            })?;
        }
        Ok(())
    }

    /// Path to the global config file.
    pub fn config_file(&self) -> PathBuf {
        self.config_dir.join("config.toml")
    }
}
