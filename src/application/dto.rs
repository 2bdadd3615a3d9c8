use chrono::NaiveDate;
use serde::{Deserialize, Serialize};
use utoipa::ToSchema;

use crate::domain::entities::{AggregateMetadata, BlobRecord};

/// DTO for file responses
#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
pub struct FileDto {
    pub id: String,
    pub label: String,
    pub content_type: String,
    pub byte_size: u64,
    pub fingerprint: String,
    pub reference_count: i64,
    pub created_at: String,
    /// Relative URL serving the file content
    pub content_url: String,
}

impl From<BlobRecord> for FileDto {
    fn from(record: BlobRecord) -> Self {
        Self::from(&record)
    }
}

impl From<&BlobRecord> for FileDto {
    fn from(record: &BlobRecord) -> Self {
        Self {
            id: record.id().to_string(),
            label: record.label().to_string(),
            content_type: record.content_type().to_string(),
            byte_size: record.byte_size(),
            fingerprint: record.fingerprint().to_string(),
            reference_count: record.reference_count(),
            created_at: record.created_at().to_rfc3339(),
            content_url: format!("/v1/files/{}/content", record.id()),
        }
    }
}

/// DTO for an ingest request; content travels separately as an `UploadReader`
#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
pub struct IngestRequest {
    /// Original file name
    pub label: String,
    pub declared_size: u64,
    pub content_type: String,
}

/// Filters accepted by the file listing
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct FileFilter {
    /// Case-insensitive substring match on the label
    pub search: Option<String>,
    /// Exact content type
    pub content_type: Option<String>,
    /// Inclusive lower size bound
    pub min_size: Option<u64>,
    /// Inclusive upper size bound
    pub max_size: Option<u64>,
    /// UTC calendar date of `created_at`
    pub created_on: Option<NaiveDate>,
}

/// Raw offset/limit window
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PageRequest {
    pub limit: i64,
    pub offset: i64,
}

/// DTO for list request
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ListFilesRequest {
    pub filter: FileFilter,
    pub page: Option<u64>,
    pub page_size: Option<u64>,
}

/// DTO for list response
#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
pub struct ListFilesResponse {
    pub results: Vec<FileDto>,
    pub total: u64,
    pub pages: u64,
    pub current_page: u64,
}

/// DTO for aggregate storage statistics
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, ToSchema)]
pub struct StatsDto {
    pub total_references: u64,
    pub unique_blobs: u64,
    pub duplicates_avoided: u64,
    pub bytes_saved: u64,
    pub bytes_saved_mb: f64,
    pub deduplication_ratio: f64,
}

impl From<AggregateMetadata> for StatsDto {
    fn from(metadata: AggregateMetadata) -> Self {
        Self {
            total_references: metadata.total_references(),
            unique_blobs: metadata.unique_blobs(),
            duplicates_avoided: metadata.duplicates_avoided(),
            bytes_saved: metadata.bytes_saved(),
            bytes_saved_mb: metadata.bytes_saved_mb(),
            deduplication_ratio: metadata.deduplication_ratio(),
        }
    }
}

/// DTO for download response metadata
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DownloadMetadata {
    pub id: String,
    pub label: String,
    pub content_type: String,
    pub byte_size: u64,
    pub fingerprint: String,
}

impl From<&BlobRecord> for DownloadMetadata {
    fn from(record: &BlobRecord) -> Self {
        Self {
            id: record.id().to_string(),
            label: record.label().to_string(),
            content_type: record.content_type().to_string(),
            byte_size: record.byte_size(),
            fingerprint: record.fingerprint().to_string(),
        }
    }
}
