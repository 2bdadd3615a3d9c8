use axum::{
    body::Body,
    extract::{Path, State},
    http::{header, StatusCode},
    response::{Json, Response},
};
use std::sync::Arc;
use tokio_util::io::ReaderStream;

use crate::api::errors::ApiError;
use crate::application::dto::FileDto;
use crate::application::use_cases::{DownloadFileUseCase, GetFileUseCase};
use crate::domain::value_objects::BlobId;

pub(crate) fn parse_id(id: &str) -> Result<BlobId, ApiError> {
    id.parse::<BlobId>()
        .map_err(|e| ApiError::bad_request(format!("Invalid file ID: {}", e)))
}

/// Quotes and control characters would break the header value
fn attachment_disposition(label: &str) -> String {
    let name: String = label
        .chars()
        .map(|c| if c == '"' || c == '\\' || c.is_control() { '_' } else { c })
        .collect();
    format!("attachment; filename=\"{}\"", name)
}

/// GET /v1/files/{id}
/// Fetch a file record
#[utoipa::path(
    get,
    path = "/v1/files/{id}",
    tag = "files",
    params(
        ("id" = String, Path, description = "File UUID")
    ),
    responses(
        (status = 200, description = "File found", body = FileDto),
        (status = 400, description = "Invalid file ID"),
        (status = 404, description = "File not found"),
        (status = 500, description = "Internal server error")
    )
)]
pub async fn get_handler(
    State(use_case): State<Arc<GetFileUseCase>>,
    Path(id): Path<String>,
) -> Result<Json<FileDto>, ApiError> {
    let id = parse_id(&id)?;
    let file = use_case.execute(&id).await?;
    Ok(Json(file))
}

/// GET /v1/files/{id}/content
/// Download file content with streaming response
#[utoipa::path(
    get,
    path = "/v1/files/{id}/content",
    tag = "files",
    params(
        ("id" = String, Path, description = "File UUID")
    ),
    responses(
        (status = 200, description = "File content", content_type = "application/octet-stream"),
        (status = 400, description = "Invalid file ID"),
        (status = 404, description = "File not found"),
        (status = 500, description = "Internal server error")
    )
)]
pub async fn download_handler(
    State(use_case): State<Arc<DownloadFileUseCase>>,
    Path(id): Path<String>,
) -> Result<Response, ApiError> {
    let id = parse_id(&id)?;

    let (metadata, reader) = use_case.execute(&id).await?;

    let body = Body::from_stream(ReaderStream::new(reader));

    let response = Response::builder()
        .status(StatusCode::OK)
        .header(header::CONTENT_LENGTH, metadata.byte_size.to_string())
        .header(header::CONTENT_TYPE, metadata.content_type.as_str())
        .header(
            header::CONTENT_DISPOSITION,
            attachment_disposition(&metadata.label),
        )
        .header("X-Content-Hash", metadata.fingerprint.as_str())
        .body(body)
        .map_err(|e| ApiError::internal_error(format!("Failed to build response: {}", e)))?;

    Ok(response)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_attachment_disposition_escapes_quotes() {
        assert_eq!(
            attachment_disposition("report \"final\".pdf"),
            "attachment; filename=\"report _final_.pdf\""
        );
    }

    #[test]
    fn test_parse_id_rejects_garbage() {
        let err = parse_id("not-a-uuid").unwrap_err();
        assert_eq!(err.status(), StatusCode::BAD_REQUEST);
    }
}
