use async_trait::async_trait;
#[cfg(test)]
use mockall::automock;
use std::pin::Pin;
use std::time::Duration;
use thiserror::Error;
use tokio::io::{AsyncRead, AsyncSeek};

use crate::domain::errors::DomainError;
use crate::domain::value_objects::StorageLocator;

#[derive(Debug, Error)]
pub enum StorageError {
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Blob not found: {0}")]
    NotFound(String),

    #[error("Invalid locator: {0}")]
    InvalidLocator(String),

    #[error("Internal error: {0}")]
    Internal(String),
}

impl From<DomainError> for StorageError {
    fn from(err: DomainError) -> Self {
        match err {
            DomainError::InvalidLocator(locator) => StorageError::InvalidLocator(locator),
            other => StorageError::Internal(other.to_string()),
        }
    }
}

/// Type alias for async reader
pub type BlobReader = Pin<Box<dyn AsyncRead + Send>>;

/// Upload content must be rewindable: it is hashed first and then persisted
pub trait UploadSource: AsyncRead + AsyncSeek + Send + Unpin {}

impl<T: AsyncRead + AsyncSeek + Send + Unpin> UploadSource for T {}

/// Type alias for rewindable upload content
pub type UploadReader = Box<dyn UploadSource>;

/// Port for physical byte storage operations
#[cfg_attr(test, automock)]
#[async_trait]
pub trait BlobStore: Send + Sync {
    /// Persist the reader's bytes under a fresh locator. `extension` is a
    /// cosmetic suffix for the stored object.
    async fn put(
        &self,
        reader: BlobReader,
        extension: Option<String>,
    ) -> Result<StorageLocator, StorageError>;

    /// Open stored bytes for reading
    async fn get(&self, locator: &StorageLocator) -> Result<BlobReader, StorageError>;

    /// Remove stored bytes. Deleting a missing locator succeeds.
    async fn delete(&self, locator: &StorageLocator) -> Result<(), StorageError>;

    /// Locators whose bytes were last modified more than `older_than` ago,
    /// in ascending locator order and strictly after `after` when given
    async fn list(
        &self,
        older_than: Duration,
        after: Option<StorageLocator>,
        limit: usize,
    ) -> Result<Vec<StorageLocator>, StorageError>;
}
