//! Text-generation backend.
//!
//! The parse pipeline only needs "prompt in, completion out", expressed by the
//! [`TextCompletion`] trait. [`OllamaClient`] implements it against the Ollama
//! REST API; tests plug in scripted fakes instead.

use std::time::Duration;

use miette::Diagnostic;
use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Errors from the generation backend.
#[derive(Debug, Error, Diagnostic)]
pub enum LlmError {
    #[error("Ollama is not available at {url}")]
    #[diagnostic(
        code(aufgaben::llm::unavailable),
        help("Start Ollama with `ollama serve` or point `ollama.base_url` at a running instance.")
    )]
    Unavailable { url: String },

    #[error("Ollama request failed: {message}")]
    #[diagnostic(
        code(aufgaben::llm::request_failed),
        help("Check that Ollama is running and the model is pulled (`ollama pull <model>`).")
    )]
    RequestFailed { message: String },

    #[error("Failed to parse Ollama response: {message}")]
    #[diagnostic(
        code(aufgaben::llm::parse_error),
        help("The server answered, but not with the expected `{{\"response\": ...}}` body.")
    )]
    ParseError { message: String },

    #[error("Ollama request timed out after {timeout_secs}s")]
    #[diagnostic(
        code(aufgaben::llm::timeout),
        help("Increase `ollama.timeout_secs` or use a smaller model.")
    )]
    Timeout { timeout_secs: u64 },
}

/// A single-shot text completion capability.
pub trait TextCompletion: Send + Sync {
    /// Submit `prompt` and return the raw completion text.
    fn complete(&self, prompt: &str) -> Result<String, LlmError>;
}

impl<T: TextCompletion + ?Sized> TextCompletion for std::sync::Arc<T> {
    fn complete(&self, prompt: &str) -> Result<String, LlmError> {
        (**self).complete(prompt)
    }
}

/// Configuration for the Ollama client.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct OllamaConfig {
    /// Base URL for the Ollama API.
    pub base_url: String,
    /// Model name to use.
    pub model: String,
    /// Request timeout in seconds.
    pub timeout_secs: u64,
}

impl Default for OllamaConfig {
    fn default() -> Self {
        Self {
            base_url: "http://127.0.0.1:11434".into(),
            model: "gemma3:4b".into(),
            timeout_secs: 120,
        }
    }
}

/// Client for the Ollama `/api/generate` endpoint.
pub struct OllamaClient {
    config: OllamaConfig,
    agent: ureq::Agent,
    /// Models available locally after `probe()`.
    available_models: Vec<String>,
}

impl OllamaClient {
    /// Create a new Ollama client with the given configuration.
    pub fn new(config: OllamaConfig) -> Self {
        let agent = ureq::AgentBuilder::new()
            .timeout(Duration::from_secs(config.timeout_secs))
            .build();
        Self {
            config,
            agent,
            available_models: Vec::new(),
        }
    }

    /// Probe the server via `/api/tags` and record the locally available models.
    pub fn probe(&mut self) -> bool {
        let url = format!("{}/api/tags", self.config.base_url);
        let agent = ureq::AgentBuilder::new()
            .timeout(Duration::from_secs(5))
            .build();

        match agent.get(&url).call() {
            Ok(resp) => {
                if resp.status() != 200 {
                    self.available_models.clear();
                    return false;
                }
                if let Ok(json) = resp.into_json::<serde_json::Value>() {
                    self.available_models = json["models"]
                        .as_array()
                        .map(|arr| {
                            arr.iter()
                                .filter_map(|m| m["name"].as_str().map(|s| s.to_string()))
                                .collect()
                        })
                        .unwrap_or_default();
                }
                true
            }
            Err(e) => {
                tracing::debug!(error = %e, url = %url, "ollama probe failed");
                self.available_models.clear();
                false
            }
        }
    }

    /// Whether the configured model was listed by the last `probe()`.
    pub fn has_model(&self) -> bool {
        let target = &self.config.model;
        self.available_models
            .iter()
            .any(|m| m == target || m.split(':').next() == Some(target))
    }

    /// Models reported by the last `probe()`.
    pub fn available_models(&self) -> &[String] {
        &self.available_models
    }

    /// Get the model name being used.
    pub fn model(&self) -> &str {
        &self.config.model
    }

    /// Generate a completion from a prompt (non-streaming).
    pub fn generate(&self, prompt: &str) -> Result<String, LlmError> {
        let url = format!("{}/api/generate", self.config.base_url);
        let body = serde_json::json!({
            "model": self.config.model,
            "prompt": prompt,
            "stream": false,
        });

        let resp = self
            .agent
            .post(&url)
            .set("Content-Type", "application/json")
            .send_json(body)
            .map_err(|e| self.map_transport_error(e))?;

        let json: serde_json::Value = resp.into_json().map_err(|e| LlmError::ParseError {
            message: e.to_string(),
        })?;

        json["response"]
            .as_str()
            .map(|s| s.to_string())
            .ok_or_else(|| LlmError::ParseError {
                message: "missing 'response' field".into(),
            })
    }

    fn map_transport_error(&self, err: ureq::Error) -> LlmError {
        match err {
            ureq::Error::Status(code, _) => LlmError::RequestFailed {
                message: format!("server returned status {code}"),
            },
            ureq::Error::Transport(t) => {
                let message = t.to_string();
                if message.contains("timed out") {
                    LlmError::Timeout {
                        timeout_secs: self.config.timeout_secs,
                    }
                } else if matches!(t.kind(), ureq::ErrorKind::ConnectionFailed) {
                    LlmError::Unavailable {
                        url: self.config.base_url.clone(),
                    }
                } else {
                    LlmError::RequestFailed { message }
                }
            }
        }
    }
}

impl TextCompletion for OllamaClient {
    fn complete(&self, prompt: &str) -> Result<String, LlmError> {
        tracing::debug!(model = %self.config.model, prompt_len = prompt.len(), "ollama generate");
        let response = self.generate(prompt)?;
        tracing::debug!(response_len = response.len(), "ollama generate complete");
        Ok(response)
    }
}

impl std::fmt::Debug for OllamaClient {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("OllamaClient")
            .field("base_url", &self.config.base_url)
            .field("model", &self.config.model)
            .field("timeout_secs", &self.config.timeout_secs)
            .finish()
    }
}
