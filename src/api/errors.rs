use axum::{
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use serde_json::json;
use tracing::error;
use validator::ValidationErrors;

use crate::application::errors::{EngineError, FileQueryError};
use crate::application::ports::{RepositoryError, StorageError};

/// API error response
#[derive(Debug)]
pub struct ApiError {
    status: StatusCode,
    message: String,
}

impl ApiError {
    pub fn new(status: StatusCode, message: impl Into<String>) -> Self {
        Self {
            status,
            message: message.into(),
        }
    }

    pub fn bad_request(message: impl Into<String>) -> Self {
        Self::new(StatusCode::BAD_REQUEST, message)
    }

    pub fn not_found(message: impl Into<String>) -> Self {
        Self::new(StatusCode::NOT_FOUND, message)
    }

    pub fn service_unavailable(message: impl Into<String>) -> Self {
        Self::new(StatusCode::SERVICE_UNAVAILABLE, message)
    }

    pub fn internal_error(message: impl Into<String>) -> Self {
        Self::new(StatusCode::INTERNAL_SERVER_ERROR, message)
    }

    pub fn status(&self) -> StatusCode {
        self.status
    }

    pub fn message(&self) -> &str {
        &self.message
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        // Client errors are the caller's business; server faults get logged
        if self.status().is_server_error() {
            error!(status = %self.status(), "Request failed: {}", self.message());
        }

        let body = Json(json!({
            "error": self.message,
        }));

        (self.status, body).into_response()
    }
}

// Convert application errors to API errors

impl From<EngineError> for ApiError {
    fn from(err: EngineError) -> Self {
        match err {
            EngineError::Validation(e) => ApiError::bad_request(e.to_string()),
            EngineError::NotFound(id) => ApiError::not_found(format!("File not found: {}", id)),
            e @ EngineError::Transient { .. } => ApiError::service_unavailable(e.to_string()),
            EngineError::StorageBackend(e) => e.into(),
            EngineError::Repository(e) => e.into(),
        }
    }
}

impl From<FileQueryError> for ApiError {
    fn from(err: FileQueryError) -> Self {
        match err {
            FileQueryError::InvalidRequest(msg) => ApiError::bad_request(msg),
            FileQueryError::NotFound(id) => ApiError::not_found(format!("File not found: {}", id)),
            FileQueryError::Repository(e) => e.into(),
            FileQueryError::Storage(e) => e.into(),
        }
    }
}

impl From<RepositoryError> for ApiError {
    fn from(err: RepositoryError) -> Self {
        match err {
            RepositoryError::NotFound(id) => ApiError::not_found(format!("File not found: {}", id)),
            RepositoryError::Transient(msg) => ApiError::service_unavailable(msg),
            e => ApiError::internal_error(format!("Repository error: {}", e)),
        }
    }
}

impl From<ValidationErrors> for ApiError {
    fn from(errors: ValidationErrors) -> Self {
        let mut details: Vec<String> = errors
            .field_errors()
            .iter()
            .flat_map(|(field, errors)| {
                errors.iter().map(move |error| {
                    error
                        .message
                        .as_ref()
                        .map(|cow| cow.to_string())
                        .unwrap_or_else(|| format!("{}: invalid value", field))
                })
            })
            .collect();
        details.sort();
        ApiError::bad_request(format!("Validation failed: {}", details.join("; ")))
    }
}

// Missing bytes for a live record are a server fault, not a client 404
impl From<StorageError> for ApiError {
    fn from(err: StorageError) -> Self {
        ApiError::internal_error(format!("Storage error: {}", err))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::errors::DomainError;

    #[test]
    fn test_validation_maps_to_bad_request() {
        let err: ApiError = EngineError::Validation(DomainError::SizeExceedsMaximum {
            size: 11,
            max: 10,
        })
        .into();
        assert_eq!(err.status(), StatusCode::BAD_REQUEST);
        assert!(err.message().contains("exceeds maximum"));
    }

    #[test]
    fn test_not_found_maps_to_404() {
        let err: ApiError = EngineError::NotFound("abc".to_string()).into();
        assert_eq!(err.status(), StatusCode::NOT_FOUND);

        let err: ApiError = FileQueryError::NotFound("abc".to_string()).into();
        assert_eq!(err.status(), StatusCode::NOT_FOUND);
    }

    #[test]
    fn test_transient_maps_to_503() {
        let err: ApiError = EngineError::Transient {
            attempts: 5,
            message: "could not serialize access".to_string(),
        }
        .into();
        assert_eq!(err.status(), StatusCode::SERVICE_UNAVAILABLE);
    }

    #[test]
    fn test_storage_failures_map_to_500() {
        let err: ApiError =
            EngineError::StorageBackend(StorageError::Internal("disk full".to_string())).into();
        assert_eq!(err.status(), StatusCode::INTERNAL_SERVER_ERROR);

        let err: ApiError =
            FileQueryError::Storage(StorageError::NotFound("uploads/ab/x".to_string())).into();
        assert_eq!(err.status(), StatusCode::INTERNAL_SERVER_ERROR);
    }

    #[test]
    fn test_invalid_request_maps_to_400() {
        let err: ApiError = FileQueryError::InvalidRequest("bad range".to_string()).into();
        assert_eq!(err.status(), StatusCode::BAD_REQUEST);
        assert_eq!(err.message(), "bad range");
    }

    #[tokio::test]
    async fn test_into_response_carries_status_and_message() {
        let response = ApiError::internal_error("Storage error: disk gone").into_response();
        assert_eq!(response.status(), StatusCode::INTERNAL_SERVER_ERROR);

        let bytes = axum::body::to_bytes(response.into_body(), usize::MAX)
            .await
            .unwrap();
        let body: serde_json::Value = serde_json::from_slice(&bytes).unwrap();
        assert_eq!(body["error"], "Storage error: disk gone");
    }
}
