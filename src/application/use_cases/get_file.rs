use std::sync::Arc;
use tracing::error;

use crate::application::dto::{DownloadMetadata, FileDto};
use crate::application::errors::FileQueryError;
use crate::application::ports::{BlobReader, BlobStore, DedupRepository, StorageError};
use crate::domain::entities::BlobRecord;
use crate::domain::value_objects::BlobId;

async fn load(
    repository: &dyn DedupRepository,
    id: &BlobId,
) -> Result<BlobRecord, FileQueryError> {
    repository
        .find_by_id(id)
        .await?
        .ok_or_else(|| FileQueryError::NotFound(id.to_string()))
}

/// Use case: Fetch a single file record
pub struct GetFileUseCase {
    repository: Arc<dyn DedupRepository>,
}

impl GetFileUseCase {
    pub fn new(repository: Arc<dyn DedupRepository>) -> Self {
        Self { repository }
    }

    pub async fn execute(&self, id: &BlobId) -> Result<FileDto, FileQueryError> {
        load(self.repository.as_ref(), id)
            .await
            .map(FileDto::from)
    }
}

/// Use case: Stream a file's bytes
pub struct DownloadFileUseCase {
    repository: Arc<dyn DedupRepository>,
    blob_store: Arc<dyn BlobStore>,
}

impl DownloadFileUseCase {
    pub fn new(repository: Arc<dyn DedupRepository>, blob_store: Arc<dyn BlobStore>) -> Self {
        Self {
            repository,
            blob_store,
        }
    }

    pub async fn execute(
        &self,
        id: &BlobId,
    ) -> Result<(DownloadMetadata, BlobReader), FileQueryError> {
        let record = load(self.repository.as_ref(), id).await?;

        let reader = match self.blob_store.get(record.locator()).await {
            Ok(reader) => reader,
            Err(StorageError::NotFound(locator)) => {
                // Record without bytes: the store and the backend disagree
                error!(id = %id, locator = %locator, "Blob bytes missing for live record");
                return Err(FileQueryError::Storage(StorageError::NotFound(locator)));
            }
            Err(e) => return Err(e.into()),
        };

        Ok((DownloadMetadata::from(&record), reader))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::application::ports::{MockBlobStore, MockDedupRepository};
    use crate::domain::value_objects::StorageLocator;
    use crate::infrastructure::storage::ContentHasher;
    use tokio::io::AsyncReadExt;

    fn record() -> BlobRecord {
        BlobRecord::new(
            ContentHasher::hash_bytes(b"hello"),
            5,
            "hello.pdf".to_string(),
            "application/pdf".to_string(),
            StorageLocator::new("uploads/ab/abcd.pdf").unwrap(),
        )
    }

    #[tokio::test]
    async fn test_get_file_found() {
        let stored = record();
        let id = *stored.id();

        let mut repository = MockDedupRepository::new();
        repository
            .expect_find_by_id()
            .times(1)
            .returning(move |_| Ok(Some(stored.clone())));

        let dto = GetFileUseCase::new(Arc::new(repository))
            .execute(&id)
            .await
            .unwrap();

        assert_eq!(dto.id, id.to_string());
        assert_eq!(dto.label, "hello.pdf");
        assert_eq!(dto.content_url, format!("/v1/files/{}/content", id));
    }

    #[tokio::test]
    async fn test_get_file_missing() {
        let mut repository = MockDedupRepository::new();
        repository.expect_find_by_id().returning(|_| Ok(None));

        let err = GetFileUseCase::new(Arc::new(repository))
            .execute(&BlobId::new())
            .await
            .unwrap_err();

        assert!(matches!(err, FileQueryError::NotFound(_)));
    }

    #[tokio::test]
    async fn test_download_streams_bytes() {
        let stored = record();
        let id = *stored.id();

        let mut repository = MockDedupRepository::new();
        repository
            .expect_find_by_id()
            .returning(move |_| Ok(Some(stored.clone())));

        let mut store = MockBlobStore::new();
        store
            .expect_get()
            .times(1)
            .returning(|_| Ok(Box::pin(std::io::Cursor::new(b"hello".to_vec()))));

        let (metadata, mut reader) = DownloadFileUseCase::new(Arc::new(repository), Arc::new(store))
            .execute(&id)
            .await
            .unwrap();

        let mut content = Vec::new();
        reader.read_to_end(&mut content).await.unwrap();
        assert_eq!(content, b"hello");
        assert_eq!(metadata.byte_size, 5);
        assert_eq!(metadata.content_type, "application/pdf");
    }

    #[tokio::test]
    async fn test_download_with_missing_bytes() {
        let stored = record();

        let mut repository = MockDedupRepository::new();
        repository
            .expect_find_by_id()
            .returning(move |_| Ok(Some(stored.clone())));

        let mut store = MockBlobStore::new();
        store
            .expect_get()
            .returning(|l| Err(StorageError::NotFound(l.to_string())));

        let result = DownloadFileUseCase::new(Arc::new(repository), Arc::new(store))
            .execute(&BlobId::new())
            .await;

        assert!(matches!(
            result,
            Err(FileQueryError::Storage(StorageError::NotFound(_)))
        ));
    }
}
