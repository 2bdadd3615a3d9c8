use axum::{extract::State, http::StatusCode, response::Json};
use serde_json::json;
use std::path::PathBuf;
use std::sync::Arc;
use std::time::{Duration, Instant};
use utoipa::ToSchema;

use crate::application::ports::DedupRepository;

const PROBE_TIMEOUT: Duration = Duration::from_secs(2);

/// Basic health check response
#[derive(serde::Serialize, ToSchema)]
pub struct HealthResponse {
    pub status: String,
    pub service: String,
    pub version: String,
}

/// Readiness response
#[derive(serde::Serialize, ToSchema)]
pub struct ReadinessResponse {
    pub status: String,
    pub service: String,
    pub database: String,
    pub storage: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

/// What the readiness probe checks
pub struct ReadinessProbe {
    pub repository: Arc<dyn DedupRepository>,
    /// Directory that must exist for blobs to be written
    pub uploads_root: PathBuf,
}

/// GET /health
/// Basic health check endpoint (no database check)
#[utoipa::path(
    get,
    path = "/health",
    tag = "health",
    responses(
        (status = 200, description = "Service is healthy", body = HealthResponse)
    )
)]
pub async fn health_handler() -> (StatusCode, Json<serde_json::Value>) {
    (
        StatusCode::OK,
        Json(json!({
            "status": "healthy",
            "service": "dedup_storage",
            "version": env!("CARGO_PKG_VERSION"),
            "timestamp": chrono::Utc::now().to_rfc3339(),
        })),
    )
}

/// GET /health/ready
/// Readiness probe with metadata backend and storage checks
#[utoipa::path(
    get,
    path = "/health/ready",
    tag = "health",
    responses(
        (status = 200, description = "Service is ready", body = ReadinessResponse),
        (status = 503, description = "Service is not ready", body = ReadinessResponse)
    )
)]
pub async fn readiness_handler(
    State(probe): State<Arc<ReadinessProbe>>,
) -> (StatusCode, Json<serde_json::Value>) {
    let start_time = Instant::now();

    let (database, db_error) =
        match tokio::time::timeout(PROBE_TIMEOUT, probe.repository.ping()).await {
            Ok(Ok(())) => ("connected", None),
            Ok(Err(e)) => {
                tracing::warn!("Readiness database probe failed: {}", e);
                ("disconnected", Some("Database unavailable".to_string()))
            }
            Err(_) => (
                "timeout",
                Some(format!(
                    "Database probe timed out after {} seconds",
                    PROBE_TIMEOUT.as_secs()
                )),
            ),
        };

    let (storage, storage_error) = match tokio::fs::metadata(&probe.uploads_root).await {
        Ok(meta) if meta.is_dir() => ("available", None),
        Ok(_) => ("unavailable", Some("Storage root is not a directory".to_string())),
        Err(e) => {
            tracing::warn!(path = ?probe.uploads_root, "Readiness storage probe failed: {}", e);
            ("unavailable", Some("Storage root unavailable".to_string()))
        }
    };

    let error = db_error.or(storage_error);
    let (status, label) = if error.is_none() {
        (StatusCode::OK, "ready")
    } else {
        (StatusCode::SERVICE_UNAVAILABLE, "not_ready")
    };

    let mut body = json!({
        "status": label,
        "service": "dedup_storage",
        "database": database,
        "storage": storage,
        "timestamp": chrono::Utc::now().to_rfc3339(),
        "response_time_ms": start_time.elapsed().as_millis(),
    });
    if let Some(error) = error {
        body["error"] = json!(error);
    }

    (status, Json(body))
}
