use axum::{
    extract::DefaultBodyLimit,
    middleware as axum_middleware,
    routing::{get, post},
    Router,
};
use std::sync::Arc;

use crate::api::handlers::{
    delete_handler, download_handler, get_handler, health_handler, list_handler,
    readiness_handler, stats_handler, upload_handler, ReadinessProbe, UploadService,
};
use crate::api::middleware::{create_cors_layer_for_environment, metrics_middleware};
use crate::api::openapi::swagger_ui;
use crate::application::engine::DeduplicationEngine;
use crate::application::ports::DedupRepository;
use crate::application::use_cases::{DownloadFileUseCase, GetFileUseCase, ListFilesUseCase};
use crate::config::Config;
use crate::infrastructure::storage::PathBuilder;

/// Room for multipart boundaries and part headers on top of the file itself
const MULTIPART_OVERHEAD: usize = 64 * 1024;

/// Application state container
pub struct AppState {
    pub engine: Arc<DeduplicationEngine>,
    pub list_use_case: Arc<ListFilesUseCase>,
    pub get_use_case: Arc<GetFileUseCase>,
    pub download_use_case: Arc<DownloadFileUseCase>,
    pub repository: Arc<dyn DedupRepository>,
    pub config: Config,
}

/// Create router with all routes and middleware
pub fn create_router(state: AppState) -> Router {
    let paths = PathBuilder::new(state.config.storage_root.clone());

    let upload_state = Arc::new(UploadService {
        engine: Arc::clone(&state.engine),
        spool_dir: paths.temp_root(),
    });
    let readiness_state = Arc::new(ReadinessProbe {
        repository: Arc::clone(&state.repository),
        uploads_root: paths.uploads_root(),
    });

    let body_limit = usize::try_from(state.config.max_upload_bytes)
        .unwrap_or(usize::MAX)
        .saturating_add(MULTIPART_OVERHEAD);

    Router::new()
        .route("/health", get(health_handler))
        .route(
            "/health/ready",
            get(readiness_handler).with_state(readiness_state),
        )
        .route(
            "/v1/files",
            post(upload_handler)
                .with_state(upload_state)
                .layer(DefaultBodyLimit::max(body_limit)),
        )
        .route(
            "/v1/files",
            get(list_handler).with_state(Arc::clone(&state.list_use_case)),
        )
        .route(
            "/v1/files/{id}",
            get(get_handler).with_state(Arc::clone(&state.get_use_case)),
        )
        .route(
            "/v1/files/{id}",
            axum::routing::delete(delete_handler).with_state(Arc::clone(&state.engine)),
        )
        .route(
            "/v1/files/{id}/content",
            get(download_handler).with_state(Arc::clone(&state.download_use_case)),
        )
        .route(
            "/v1/stats",
            get(stats_handler).with_state(Arc::clone(&state.engine)),
        )
        .merge(swagger_ui())
        .layer(axum_middleware::from_fn(metrics_middleware))
        .layer(create_cors_layer_for_environment(&state.config))
}
