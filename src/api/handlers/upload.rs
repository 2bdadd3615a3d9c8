use axum::{
    extract::{multipart::MultipartError, Multipart, State},
    http::StatusCode,
    response::Json,
};
use futures_util::TryStreamExt;
use std::path::PathBuf;
use std::sync::Arc;
use tokio_util::io::StreamReader;
use utoipa::ToSchema;

use crate::api::errors::ApiError;
use crate::application::dto::{FileDto, IngestRequest};
use crate::application::engine::{DeduplicationEngine, IngestOutcome};
use crate::application::ports::StorageError;
use crate::infrastructure::storage::SpooledUpload;

const FILE_FIELD: &str = "file";
const DEFAULT_CONTENT_TYPE: &str = "application/octet-stream";

/// Dependencies of the upload endpoint
pub struct UploadService {
    pub engine: Arc<DeduplicationEngine>,
    /// Where request bodies are buffered before ingest
    pub spool_dir: PathBuf,
}

/// Multipart body accepted by the upload endpoint
#[derive(ToSchema)]
#[allow(dead_code)]
pub struct UploadForm {
    #[schema(value_type = String, format = Binary)]
    file: Vec<u8>,
}

/// POST /v1/files
/// Upload a file; identical content is stored once
#[utoipa::path(
    post,
    path = "/v1/files",
    tag = "files",
    request_body(content = UploadForm, content_type = "multipart/form-data"),
    responses(
        (status = 201, description = "New content stored", body = FileDto),
        (status = 200, description = "Content already stored, reference added", body = FileDto),
        (status = 400, description = "Invalid upload"),
        (status = 503, description = "Storage busy, retry later"),
        (status = 500, description = "Internal server error")
    )
)]
pub async fn upload_handler(
    State(service): State<Arc<UploadService>>,
    mut multipart: Multipart,
) -> Result<(StatusCode, Json<FileDto>), ApiError> {
    let limit = service.engine.config().max_upload_bytes;

    while let Some(field) = multipart.next_field().await.map_err(multipart_error)? {
        if field.name() != Some(FILE_FIELD) {
            continue;
        }

        let label = field
            .file_name()
            .map(str::to_string)
            .ok_or_else(|| ApiError::bad_request("The file field must carry a file name"))?;
        let content_type = field
            .content_type()
            .unwrap_or(DEFAULT_CONTENT_TYPE)
            .to_string();

        // Buffer to disk: the engine hashes first and stores afterwards
        let reader = Box::pin(StreamReader::new(field.map_err(std::io::Error::other)));
        let spooled = SpooledUpload::spool(&service.spool_dir, reader, limit)
            .await
            .map_err(spool_error)?;

        let request = IngestRequest {
            label,
            declared_size: spooled.size(),
            content_type,
        };
        let content = spooled.open().await?;

        let outcome = service.engine.ingest(request, content).await?;
        let status = match outcome {
            IngestOutcome::Created(_) => StatusCode::CREATED,
            IngestOutcome::Duplicate(_) => StatusCode::OK,
        };

        return Ok((status, Json(FileDto::from(outcome.into_record()))));
    }

    Err(ApiError::bad_request("Missing multipart field 'file'"))
}

fn multipart_error(err: MultipartError) -> ApiError {
    ApiError::new(err.status(), err.body_text())
}

/// Body read failures surface as I/O errors wrapping the multipart error
fn spool_error(err: StorageError) -> ApiError {
    if let StorageError::Io(io) = &err {
        if let Some(inner) = io
            .get_ref()
            .and_then(|inner| inner.downcast_ref::<MultipartError>())
        {
            return ApiError::new(inner.status(), inner.body_text());
        }
    }
    err.into()
}
