//! Application configuration, persisted as TOML.
//!
//! Looked up in order: an explicit `--config` path, then
//! `$XDG_CONFIG_HOME/aufgaben/config.toml`, then built-in defaults. Every
//! field has a default, so a partial file is fine.

use std::path::{Path, PathBuf};

use miette::Diagnostic;
use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::llm::OllamaConfig;
use crate::paths::AppPaths;

/// Errors from loading configuration.
#[derive(Debug, Error, Diagnostic)]
pub enum ConfigError {
    #[error("failed to read config: {path}")]
    #[diagnostic(
        code(aufgaben::config::read),
        help("Ensure the config file exists and is readable.")
    )]
    Read {
        path: String,
        #[source]
        source: std::io::Error,
    },

    #[error("failed to parse config {path}: {message}")]
    #[diagnostic(
        code(aufgaben::config::parse),
        help("Check the TOML syntax and field names in the config file.")
    )]
    Parse { path: String, message: String },
}

pub type ConfigResult<T> = std::result::Result<T, ConfigError>;

/// Which [`RecordStore`](crate::store::RecordStore) backend to use.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum StoreKind {
    /// redb file under the data directory.
    #[default]
    Durable,
    /// Nothing is written to disk.
    Memory,
}

/// HTTP server settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ServerConfig {
    #[serde(default = "default_bind")]
    pub bind: String,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            bind: default_bind(),
        }
    }
}

/// Top-level configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AppConfig {
    /// Catalog JSON imported at startup.
    #[serde(default = "default_catalog_path")]
    pub catalog_path: PathBuf,
    /// Where the durable store lives. Defaults to the XDG data directory.
    #[serde(default)]
    pub data_dir: Option<PathBuf>,
    #[serde(default)]
    pub store: StoreKind,
    /// Drop all saved entries on startup.
    #[serde(default)]
    pub reset_entries_on_start: bool,
    #[serde(default)]
    pub ollama: OllamaConfig,
    #[serde(default)]
    pub server: ServerConfig,
}

fn default_catalog_path() -> PathBuf {
    PathBuf::from("appendix2.json")
}
fn default_bind() -> String {
    "127.0.0.1:3001".into()
}

impl Default for AppConfig {
    fn default() -> Self {
        Self {
            catalog_path: default_catalog_path(),
            data_dir: None,
            store: StoreKind::default(),
            reset_entries_on_start: false,
            ollama: OllamaConfig::default(),
            server: ServerConfig::default(),
        }
    }
}

impl AppConfig {
    /// Load from `explicit` if given (must exist), else from the XDG config
    /// file if present, else defaults.
    pub fn load(explicit: Option<&Path>, paths: Option<&AppPaths>) -> ConfigResult<Self> {
        if let Some(path) = explicit {
            return Self::from_file(path);
        }
        if let Some(path) = paths.map(AppPaths::config_file).filter(|p| p.is_file()) {
            return Self::from_file(&path);
        }
        Ok(Self::default())
    }

    /// Read and parse a TOML config file.
    pub fn from_file(path: &Path) -> ConfigResult<Self> {
        let text = std::fs::read_to_string(path).map_err(|e| ConfigError::Read {
            path: path.display().to_string(),
            source: e,
        })?;
        let config: Self = toml::from_str(&text).map_err(|e| ConfigError::Parse {
            path: path.display().to_string(),
            message: e.to_string(),
        })?;
        tracing::debug!(path = %path.display(), "loaded config");
        Ok(config)
    }

    /// The configured data directory, or the XDG default.
    pub fn resolve_data_dir(&self, paths: Option<&AppPaths>) -> Option<PathBuf> {
        self.data_dir
            .clone()
            .or_else(|| paths.map(|p| p.data_dir.clone()))
    }
}
