use axum::{
    extract::{Path, State},
    http::{header, HeaderValue, StatusCode},
    response::{IntoResponse, Response},
    routing::get,
    Json, Router,
};
use queuebench_common::{is_valid_queue_name, queue_file_name, ErrorResponse, RESULTS_FILE};
use serde::Serialize;
use std::net::SocketAddr;
use std::path::PathBuf;
use std::sync::Arc;
use thiserror::Error;
use tracing::{info, warn};

pub mod config;
use config::MAX_REPORT_BYTES;

#[derive(Debug, Error)]
pub enum PublishError {
    #[error("Failed to bind {0}: {1}")]
    Bind(SocketAddr, #[source] std::io::Error),

    #[error("Server error: {0}")]
    Serve(#[from] std::io::Error),
}

/// Shared handler state: the directory holding the run's JSON documents.
#[derive(Clone)]
pub struct AppState {
    pub dir: Arc<PathBuf>,
}

impl AppState {
    pub fn new(dir: impl Into<PathBuf>) -> Self {
        Self { dir: Arc::new(dir.into()) }
    }
}

/// Publisher configuration
#[derive(Debug, Clone)]
pub struct ServerConfig {
    pub address: SocketAddr,
    pub dir: PathBuf,
}

/// Read-only HTTP view of a results directory.
pub struct Server {
    config: ServerConfig,
}

impl Server {
    /// Create a new server with the given configuration
    pub fn new(config: ServerConfig) -> Self {
        Self { config }
    }

    /// Get the server's configured address
    pub fn address(&self) -> SocketAddr {
        self.config.address
    }

    /// Create the application router with the given state
    pub fn create_router(state: AppState) -> Router {
        Router::new()
            .route("/health", get(handle_health))
            .route("/results.json", get(handle_results))
            .route("/queues/:name", get(handle_queue))
            .with_state(state)
    }

    /// Run the server, signalling `ready_tx` with the bound address once accepting connections
    pub async fn run(self, ready_tx: tokio::sync::oneshot::Sender<SocketAddr>) -> Result<(), PublishError> {
        let app = Self::create_router(AppState::new(self.config.dir.clone()));
        let listener = tokio::net::TcpListener::bind(self.config.address)
            .await
            .map_err(|e| PublishError::Bind(self.config.address, e))?;
        let local_addr = listener.local_addr()?;
        info!(addr = %local_addr, dir = %self.config.dir.display(), "publishing results");
        ready_tx.send(local_addr).ok();
        axum::serve(listener, app).await?;
        Ok(())
    }
}

#[derive(Debug, Serialize)]
pub struct HealthResponse {
    pub status: &'static str,
}

pub async fn handle_health() -> Json<HealthResponse> {
    Json(HealthResponse { status: "ok" })
}

pub async fn handle_results(State(state): State<AppState>) -> Response {
    serve_json_file(state.dir.join(RESULTS_FILE)).await
}

pub async fn handle_queue(State(state): State<AppState>, Path(name): Path<String>) -> Response {
    if !is_valid_queue_name(&name) {
        return error_response(StatusCode::BAD_REQUEST, format!("Invalid queue name: {name}"));
    }
    serve_json_file(state.dir.join(queue_file_name(&name))).await
}

async fn serve_json_file(path: PathBuf) -> Response {
    match tokio::fs::metadata(&path).await {
        Ok(meta) if meta.len() > MAX_REPORT_BYTES => {
            return error_response(StatusCode::PAYLOAD_TOO_LARGE, "Report too large".to_string());
        }
        Ok(_) => {}
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
            return error_response(StatusCode::NOT_FOUND, "Not found".to_string());
        }
        Err(e) => return read_failure(&path, e),
    }

    match tokio::fs::read(&path).await {
        Ok(bytes) => (
            StatusCode::OK,
            [(header::CONTENT_TYPE, HeaderValue::from_static("application/json"))],
            bytes,
        )
            .into_response(),
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
            error_response(StatusCode::NOT_FOUND, "Not found".to_string())
        }
        Err(e) => read_failure(&path, e),
    }
}

fn read_failure(path: &std::path::Path, e: std::io::Error) -> Response {
    warn!(path = %path.display(), error = %e, "failed to read report file");
    error_response(StatusCode::INTERNAL_SERVER_ERROR, "Failed to read report".to_string())
}

fn error_response(status: StatusCode, error: String) -> Response {
    (status, Json(ErrorResponse { error })).into_response()
}
