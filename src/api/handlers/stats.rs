use axum::{extract::State, response::Json};
use std::sync::Arc;

use crate::api::errors::ApiError;
use crate::application::dto::StatsDto;
use crate::application::engine::DeduplicationEngine;

/// GET /v1/stats
/// Store-wide deduplication counters
#[utoipa::path(
    get,
    path = "/v1/stats",
    tag = "stats",
    responses(
        (status = 200, description = "Current counters", body = StatsDto),
        (status = 500, description = "Internal server error")
    )
)]
pub async fn stats_handler(
    State(engine): State<Arc<DeduplicationEngine>>,
) -> Result<Json<StatsDto>, ApiError> {
    Ok(Json(engine.stats().await?))
}
