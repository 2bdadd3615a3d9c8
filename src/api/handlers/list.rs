use axum::{
    extract::{Query, State},
    response::Json,
};
use chrono::NaiveDate;
use serde::Deserialize;
use std::sync::Arc;
use utoipa::IntoParams;
use validator::Validate;

use crate::api::errors::ApiError;
use crate::application::dto::{FileFilter, ListFilesRequest, ListFilesResponse};
use crate::application::use_cases::ListFilesUseCase;

#[derive(Debug, Default, Deserialize, IntoParams, Validate)]
#[into_params(parameter_in = Query)]
pub struct ListQuery {
    /// Case-insensitive substring of the file name
    #[validate(length(max = 255, message = "search must be at most 255 characters"))]
    search: Option<String>,
    /// Exact content type, e.g. `application/pdf`
    #[validate(length(max = 100, message = "file_type must be at most 100 characters"))]
    file_type: Option<String>,
    /// Minimum size in bytes (inclusive)
    min_size: Option<u64>,
    /// Maximum size in bytes (inclusive)
    max_size: Option<u64>,
    /// Upload date as `YYYY-MM-DD` (UTC)
    upload_date: Option<String>,
    /// Page number, starting at 1
    page: Option<u64>,
    /// Results per page (default: 5, max: 100)
    page_size: Option<u64>,
}

fn non_empty(value: Option<String>) -> Option<String> {
    value
        .map(|v| v.trim().to_string())
        .filter(|v| !v.is_empty())
}

impl ListQuery {
    fn into_request(self) -> Result<ListFilesRequest, ApiError> {
        self.validate()?;

        let created_on = match non_empty(self.upload_date) {
            Some(date) => Some(NaiveDate::parse_from_str(&date, "%Y-%m-%d").map_err(|_| {
                ApiError::bad_request(format!(
                    "Invalid upload_date '{}', expected YYYY-MM-DD",
                    date
                ))
            })?),
            None => None,
        };

        Ok(ListFilesRequest {
            filter: FileFilter {
                search: non_empty(self.search),
                content_type: non_empty(self.file_type),
                min_size: self.min_size,
                max_size: self.max_size,
                created_on,
            },
            page: self.page,
            page_size: self.page_size,
        })
    }
}

/// GET /v1/files
/// List files, newest first
#[utoipa::path(
    get,
    path = "/v1/files",
    tag = "files",
    params(ListQuery),
    responses(
        (status = 200, description = "Files retrieved successfully", body = ListFilesResponse),
        (status = 400, description = "Invalid request parameters"),
        (status = 500, description = "Internal server error")
    )
)]
pub async fn list_handler(
    State(use_case): State<Arc<ListFilesUseCase>>,
    Query(query): Query<ListQuery>,
) -> Result<Json<ListFilesResponse>, ApiError> {
    let request = query.into_request()?;
    let response = use_case.execute(request).await?;
    Ok(Json(response))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_blank_filters_are_ignored() {
        let request = ListQuery {
            search: Some("  ".to_string()),
            file_type: Some(String::new()),
            ..ListQuery::default()
        }
        .into_request()
        .unwrap();

        assert_eq!(request.filter, FileFilter::default());
    }

    #[test]
    fn test_upload_date_is_parsed() {
        let request = ListQuery {
            upload_date: Some("2024-03-15".to_string()),
            ..ListQuery::default()
        }
        .into_request()
        .unwrap();

        assert_eq!(
            request.filter.created_on,
            NaiveDate::from_ymd_opt(2024, 3, 15)
        );
    }

    #[test]
    fn test_overlong_search_is_rejected() {
        let err = ListQuery {
            search: Some("x".repeat(300)),
            ..ListQuery::default()
        }
        .into_request()
        .unwrap_err();

        assert_eq!(err.status(), axum::http::StatusCode::BAD_REQUEST);
        assert!(err.message().contains("search must be at most 255 characters"));
    }

    #[test]
    fn test_bad_upload_date_is_rejected() {
        let err = ListQuery {
            upload_date: Some("15/03/2024".to_string()),
            ..ListQuery::default()
        }
        .into_request()
        .unwrap_err();

        assert_eq!(err.status(), axum::http::StatusCode::BAD_REQUEST);
    }
}
