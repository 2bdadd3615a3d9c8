use async_trait::async_trait;
#[cfg(test)]
use mockall::automock;
use thiserror::Error;

use crate::application::dto::{FileFilter, PageRequest};
use crate::domain::entities::{AggregateMetadata, BlobRecord, MetadataDelta};
use crate::domain::errors::DomainError;
use crate::domain::value_objects::{BlobId, ContentHash, StorageLocator};

#[derive(Debug, Error)]
pub enum RepositoryError {
    #[error("Blob record not found: {0}")]
    NotFound(String),

    /// Another writer already created a record with this fingerprint
    #[error("Fingerprint already exists: {0}")]
    Conflict(String),

    /// Serialization failure, deadlock or lock timeout; safe to retry
    #[error("Transient database failure: {0}")]
    Transient(String),

    #[error("Database error: {0}")]
    Database(#[from] sqlx::Error),

    #[error("Constraint violation: {0}")]
    ConstraintViolation(String),

    #[error("Serialization error: {0}")]
    SerializationError(String),

    #[error("Internal error: {0}")]
    Internal(String),
}

impl From<DomainError> for RepositoryError {
    fn from(err: DomainError) -> Self {
        match err {
            DomainError::CounterUnderflow { .. } => {
                RepositoryError::ConstraintViolation(err.to_string())
            }
            other => RepositoryError::SerializationError(other.to_string()),
        }
    }
}

/// Fields of a blob record about to be created
#[derive(Debug, Clone)]
pub struct NewBlobRecord {
    pub fingerprint: ContentHash,
    pub byte_size: u64,
    pub label: String,
    pub content_type: String,
    pub locator: StorageLocator,
}

impl NewBlobRecord {
    pub fn into_record(self) -> BlobRecord {
        BlobRecord::new(
            self.fingerprint,
            self.byte_size,
            self.label,
            self.content_type,
            self.locator,
        )
    }
}

/// Result of dropping a reference inside a transaction
#[derive(Debug, Clone)]
pub enum DecrementOutcome {
    /// Record still alive with the returned reference count
    Retained(BlobRecord),
    /// Record deleted; carries its last state so the bytes can be removed
    Destroyed(BlobRecord),
}

/// A page of records together with the total number of matches
#[derive(Debug, Clone, Default)]
pub struct RecordPage {
    pub records: Vec<BlobRecord>,
    pub total: u64,
}

/// Recomputed counters derived from the blob records themselves
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct RecordSummary {
    pub unique_blobs: u64,
    pub total_references: u64,
}

/// Blob record mutations available inside a transaction
#[async_trait]
pub trait BlobRecordStore: Send {
    async fn find_by_fingerprint(
        &mut self,
        fingerprint: &ContentHash,
    ) -> Result<Option<BlobRecord>, RepositoryError>;

    async fn find_by_id(&mut self, id: &BlobId) -> Result<Option<BlobRecord>, RepositoryError>;

    /// Insert a new record with reference_count = 1.
    /// Fails with [`RepositoryError::Conflict`] if the fingerprint exists.
    async fn create(&mut self, record: NewBlobRecord) -> Result<BlobRecord, RepositoryError>;

    async fn increment_reference(&mut self, id: &BlobId) -> Result<BlobRecord, RepositoryError>;

    /// Drop one reference; the record is deleted instead of reaching zero
    async fn decrement_reference(&mut self, id: &BlobId)
        -> Result<DecrementOutcome, RepositoryError>;

    /// Delete regardless of reference count, returning the removed record
    async fn delete_unconditionally(&mut self, id: &BlobId)
        -> Result<BlobRecord, RepositoryError>;
}

/// Singleton counter access inside a transaction
#[async_trait]
pub trait MetadataStore: Send {
    /// Return the singleton, creating it with zero counters if absent
    async fn get_or_init(&mut self) -> Result<AggregateMetadata, RepositoryError>;

    async fn apply_delta(
        &mut self,
        delta: &MetadataDelta,
    ) -> Result<AggregateMetadata, RepositoryError>;
}

/// One atomic unit of work spanning blob records and metadata.
///
/// Dropping a transaction without committing rolls it back.
#[async_trait]
pub trait DedupTransaction: BlobRecordStore + MetadataStore {
    async fn commit(self: Box<Self>) -> Result<(), RepositoryError>;

    async fn rollback(self: Box<Self>) -> Result<(), RepositoryError>;
}

/// Port for the durable deduplication store
#[cfg_attr(test, automock)]
#[async_trait]
pub trait DedupRepository: Send + Sync {
    /// Start a serializable transaction
    async fn begin(&self) -> Result<Box<dyn DedupTransaction>, RepositoryError>;

    async fn find_by_id(&self, id: &BlobId) -> Result<Option<BlobRecord>, RepositoryError>;

    /// Filtered listing, newest first
    async fn list(
        &self,
        filter: &FileFilter,
        page: PageRequest,
    ) -> Result<RecordPage, RepositoryError>;

    /// Read the singleton outside of any ingest/release transaction
    async fn metadata(&self) -> Result<AggregateMetadata, RepositoryError>;

    /// Recompute counters by scanning blob records
    async fn summarize(&self) -> Result<RecordSummary, RepositoryError>;

    async fn locator_in_use(&self, locator: &StorageLocator) -> Result<bool, RepositoryError>;

    /// Cheap connectivity probe for readiness checks
    async fn ping(&self) -> Result<(), RepositoryError>;
}
