use axum::{
    extract::{Path, Query, State},
    http::StatusCode,
};
use serde::Deserialize;
use std::sync::Arc;
use utoipa::IntoParams;

use super::download::parse_id;
use crate::api::errors::ApiError;
use crate::application::engine::DeduplicationEngine;

#[derive(Debug, Default, Deserialize, IntoParams)]
#[into_params(parameter_in = Query)]
pub struct DeleteQuery {
    /// Remove the file regardless of how many references it has
    #[serde(default)]
    purge: bool,
}

/// DELETE /v1/files/{id}
/// Drop one reference to a file; the content is removed with its last reference
#[utoipa::path(
    delete,
    path = "/v1/files/{id}",
    tag = "files",
    params(
        ("id" = String, Path, description = "File UUID"),
        DeleteQuery
    ),
    responses(
        (status = 204, description = "Reference released or file purged"),
        (status = 400, description = "Invalid file ID"),
        (status = 404, description = "File not found"),
        (status = 503, description = "Storage busy, retry later"),
        (status = 500, description = "Internal server error")
    )
)]
pub async fn delete_handler(
    State(engine): State<Arc<DeduplicationEngine>>,
    Path(id): Path<String>,
    Query(query): Query<DeleteQuery>,
) -> Result<StatusCode, ApiError> {
    let id = parse_id(&id)?;

    if query.purge {
        engine.purge(&id).await?;
    } else {
        engine.release(&id).await?;
    }

    Ok(StatusCode::NO_CONTENT)
}
