//! aufgaben HTTP server.
//!
//! **Parsing:**
//! - `POST /api/parse` — `{rawText}` → `{parsed: [...]}`
//!
//! **Entries:**
//! - `POST /api/save` — `{entries: [...]}` → `201 {message, saved}`
//! - `GET  /api/saved` — all saved entries
//! - `GET  /api/saved/by-date` — saved entries grouped by date
//!
//! **Catalog:**
//! - `GET  /api/tasks?owner=XX&month=YYYY-MM` — grouped catalog context
//!
//! **Health:**
//! - `GET  /health` — server status
//!
//! Configuration comes from `AUFGABEN_CONFIG` (a TOML file) or the XDG config
//! file; `AUFGABEN_BIND` overrides the listen address.
//!
//! Build and run: `cargo run --features server --bin aufgaben-server`

use std::path::PathBuf;
use std::sync::Arc;

use axum::extract::{Query, State};
use axum::http::StatusCode;
use axum::routing::{get, post};
use axum::{Json, Router};
use serde::{Deserialize, Serialize};
use tower_http::cors::CorsLayer;

use aufgaben::catalog::ProjectGroup;
use aufgaben::config::AppConfig;
use aufgaben::error::AufgabenError;
use aufgaben::llm::OllamaClient;
use aufgaben::paths::AppPaths;
use aufgaben::pipeline::{ParsedEntry, PipelineError};
use aufgaben::service::{bootstrap, DateGroup, SavedEntry, TimeTracker};

type Tracker = Arc<TimeTracker<OllamaClient>>;
type ApiError = (StatusCode, Json<ErrorResponse>);

// ── Request / response types ──────────────────────────────────────────────

#[derive(Serialize)]
struct ErrorResponse {
    error: String,
}

fn api_error(status: StatusCode, message: impl Into<String>) -> ApiError {
    (
        status,
        Json(ErrorResponse {
            error: message.into(),
        }),
    )
}

fn internal(e: impl std::fmt::Display) -> ApiError {
    api_error(StatusCode::INTERNAL_SERVER_ERROR, e.to_string())
}

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
struct ParseRequest {
    #[serde(default)]
    raw_text: Option<String>,
}

#[derive(Serialize)]
struct ParseResponse {
    parsed: Vec<ParsedEntry>,
}

#[derive(Serialize)]
struct SaveResponse {
    message: String,
    saved: Vec<SavedEntry>,
}

#[derive(Deserialize)]
struct TasksQuery {
    owner: String,
    month: String,
}

#[derive(Serialize)]
struct HealthResponse {
    status: String,
    version: String,
    catalog_tasks: usize,
}

// ── Handlers ──────────────────────────────────────────────────────────────

async fn health(State(tracker): State<Tracker>) -> Json<HealthResponse> {
    Json(HealthResponse {
        status: "ok".to_string(),
        version: env!("CARGO_PKG_VERSION").to_string(),
        catalog_tasks: tracker.index().len(),
    })
}

async fn parse(
    State(tracker): State<Tracker>,
    Json(request): Json<ParseRequest>,
) -> Result<Json<ParseResponse>, ApiError> {
    let raw_text = request.raw_text.unwrap_or_default();
    if raw_text.trim().is_empty() {
        return Err(api_error(StatusCode::BAD_REQUEST, "rawText is required"));
    }

    let outcome = tokio::task::spawn_blocking(move || tracker.parse(&raw_text))
        .await
        .map_err(internal)?;

    match outcome {
        Ok(outcome) => Ok(Json(ParseResponse {
            parsed: outcome.entries,
        })),
        Err(e) => Err(pipeline_error(e)),
    }
}

/// 400 when the notes could not yield owner and month, 500 otherwise.
fn pipeline_status(e: &PipelineError) -> StatusCode {
    if e.is_metadata_failure() {
        StatusCode::BAD_REQUEST
    } else {
        StatusCode::INTERNAL_SERVER_ERROR
    }
}

fn pipeline_error(e: PipelineError) -> ApiError {
    let status = pipeline_status(&e);
    tracing::warn!(error = %e, status = status.as_u16(), "parse failed");
    api_error(status, e.to_string())
}

async fn save(
    State(tracker): State<Tracker>,
    Json(body): Json<serde_json::Value>,
) -> Result<(StatusCode, Json<SaveResponse>), ApiError> {
    let entries: Vec<ParsedEntry> = match body.get("entries") {
        Some(value @ serde_json::Value::Array(_)) => serde_json::from_value(value.clone())
            .map_err(|e| api_error(StatusCode::BAD_REQUEST, format!("invalid entries: {e}")))?,
        _ => {
            return Err(api_error(
                StatusCode::BAD_REQUEST,
                "entries must be an array",
            ));
        }
    };

    let saved = blocking(move || tracker.save(entries)).await?;
    Ok((
        StatusCode::CREATED,
        Json(SaveResponse {
            message: format!("{} entries saved", saved.len()),
            saved,
        }),
    ))
}

async fn saved(State(tracker): State<Tracker>) -> Result<Json<Vec<SavedEntry>>, ApiError> {
    Ok(Json(blocking(move || tracker.saved()).await?))
}

async fn saved_by_date(
    State(tracker): State<Tracker>,
) -> Result<Json<Vec<DateGroup>>, ApiError> {
    Ok(Json(blocking(move || tracker.saved_by_date()).await?))
}

async fn tasks(
    State(tracker): State<Tracker>,
    Query(query): Query<TasksQuery>,
) -> Json<Vec<ProjectGroup>> {
    Json(tracker.catalog_context(&query.owner, &query.month))
}

/// Run a store operation off the async runtime.
async fn blocking<T, F>(f: F) -> Result<T, ApiError>
where
    T: Send + 'static,
    F: FnOnce() -> Result<T, AufgabenError> + Send + 'static,
{
    tokio::task::spawn_blocking(f)
        .await
        .map_err(internal)?
        .map_err(internal)
}

// ── Main ──────────────────────────────────────────────────────────────────

#[tokio::main]
async fn main() {
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("info")),
        )
        .init();

    let paths = AppPaths::resolve().ok();
    let explicit = std::env::var_os("AUFGABEN_CONFIG").map(PathBuf::from);
    let config = AppConfig::load(explicit.as_deref(), paths.as_ref()).unwrap_or_else(|e| {
        tracing::error!("failed to load config: {e}");
        std::process::exit(1);
    });
    let addr = std::env::var("AUFGABEN_BIND").unwrap_or_else(|_| config.server.bind.clone());

    let tracker = tokio::task::spawn_blocking(move || {
        let tracker = bootstrap(&config, paths.as_ref())?;
        let mut probe = OllamaClient::new(config.ollama.clone());
        if !probe.probe() {
            tracing::warn!(url = %config.ollama.base_url, "ollama not reachable; parsing will fail until it is");
        } else if !probe.has_model() {
            tracing::warn!(model = probe.model(), "model not available in ollama");
        }
        Ok::<_, AufgabenError>(tracker)
    })
    .await
    .unwrap_or_else(|e| {
        tracing::error!("startup task failed: {e}");
        std::process::exit(1);
    })
    .unwrap_or_else(|e| {
        tracing::error!("failed to start: {e}");
        std::process::exit(1);
    });

    tracing::info!(
        tasks = tracker.index().len(),
        model = tracker.backend().model(),
        "aufgaben server initialized"
    );
    let state: Tracker = Arc::new(tracker);

    let app = Router::new()
        .route("/health", get(health))
        // Parsing.
        .route("/api/parse", post(parse))
        // Entries.
        .route("/api/save", post(save))
        .route("/api/saved", get(saved))
        .route("/api/saved/by-date", get(saved_by_date))
        // Catalog.
        .route("/api/tasks", get(tasks))
        .layer(CorsLayer::permissive())
        .with_state(state);

    tracing::info!("aufgaben server listening on {addr}");

    let listener = tokio::net::TcpListener::bind(&addr)
        .await
        .unwrap_or_else(|e| {
            tracing::error!("failed to bind {addr}: {e}");
            std::process::exit(1);
        });
    if let Err(e) = axum::serve(listener, app).await {
        tracing::error!("server error: {e}");
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use aufgaben::llm::LlmError;
    use aufgaben::pipeline::{BackendStage, ExtractionError, MatchError};

    #[test]
    fn bad_notes_are_client_errors() {
        assert_eq!(
            pipeline_status(&PipelineError::EmptyInput),
            StatusCode::BAD_REQUEST
        );
        assert_eq!(
            pipeline_status(&ExtractionError::NoJsonBlock.into()),
            StatusCode::BAD_REQUEST
        );
        assert_eq!(
            pipeline_status(
                &ExtractionError::IncompleteMetadata {
                    missing: "owner".into()
                }
                .into()
            ),
            StatusCode::BAD_REQUEST
        );
    }

    #[test]
    fn backend_and_match_failures_are_server_errors() {
        for stage in [BackendStage::Metadata, BackendStage::Match] {
            let err = PipelineError::Backend {
                stage,
                source: LlmError::Unavailable {
                    url: "http://127.0.0.1:11434".into(),
                },
            };
            assert_eq!(pipeline_status(&err), StatusCode::INTERNAL_SERVER_ERROR);
        }
        assert_eq!(
            pipeline_status(&MatchError::NoJsonBlock.into()),
            StatusCode::INTERNAL_SERVER_ERROR
        );
    }

    #[test]
    fn error_body_carries_the_message() {
        let (status, Json(body)) = pipeline_error(PipelineError::EmptyInput);
        assert_eq!(status, StatusCode::BAD_REQUEST);
        assert_eq!(body.error, "input text is empty");
    }
}
