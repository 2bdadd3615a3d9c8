//! Deduplication engine
//!
//! Decides whether incoming bytes are new or a duplicate, and keeps blob
//! records and the aggregate metadata singleton consistent under concurrent
//! ingest, release and purge. Every mutation is one store transaction covering
//! the fingerprint lookup, the record change and the metadata delta.

mod pending_blob;
mod retry;

pub use retry::RetryPolicy;

use std::future::Future;
use std::io::SeekFrom;
use std::sync::Arc;
use tokio::io::AsyncSeekExt;
use tracing::{debug, info, warn};

use crate::application::dto::{IngestRequest, StatsDto};
use crate::application::errors::EngineError;
use crate::application::ports::{
    BlobStore, DecrementOutcome, DedupRepository, DedupTransaction, NewBlobRecord,
    RepositoryError, StorageError, UploadDescriptor, UploadReader, UploadValidator,
};
use crate::domain::entities::{BlobRecord, MetadataDelta};
use crate::domain::errors::DomainError;
use crate::domain::validation::Validation;
use crate::domain::value_objects::{BlobId, ContentHash, StorageLocator};
use crate::infrastructure::storage::ContentHasher;
use pending_blob::PendingBlob;

/// Default upload ceiling: 10 MiB
pub const DEFAULT_MAX_UPLOAD_BYTES: u64 = 10 * 1024 * 1024;

#[derive(Debug, Clone)]
pub struct EngineConfig {
    pub max_upload_bytes: u64,
    pub retry: RetryPolicy,
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            max_upload_bytes: DEFAULT_MAX_UPLOAD_BYTES,
            retry: RetryPolicy::default(),
        }
    }
}

/// Result of a successful ingest
#[derive(Debug, Clone)]
pub enum IngestOutcome {
    /// First upload of this content
    Created(BlobRecord),
    /// Content already stored; its reference count was incremented
    Duplicate(BlobRecord),
}

impl IngestOutcome {
    pub fn record(&self) -> &BlobRecord {
        match self {
            IngestOutcome::Created(record) | IngestOutcome::Duplicate(record) => record,
        }
    }

    pub fn into_record(self) -> BlobRecord {
        match self {
            IngestOutcome::Created(record) | IngestOutcome::Duplicate(record) => record,
        }
    }

    pub fn is_duplicate(&self) -> bool {
        matches!(self, IngestOutcome::Duplicate(_))
    }
}

/// Result of a successful release
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ReleaseOutcome {
    Released { remaining_references: i64 },
    Destroyed,
}

/// Why a single transaction attempt failed
enum AttemptError {
    /// Contention or a lost creation race; start over
    Retry(String),
    Fatal(EngineError),
}

impl From<RepositoryError> for AttemptError {
    fn from(err: RepositoryError) -> Self {
        match err {
            RepositoryError::Transient(message) => AttemptError::Retry(message),
            RepositoryError::Conflict(message) => {
                AttemptError::Retry(format!("lost creation race: {}", message))
            }
            RepositoryError::NotFound(id) => AttemptError::Fatal(EngineError::NotFound(id)),
            other => AttemptError::Fatal(EngineError::Repository(other)),
        }
    }
}

impl From<EngineError> for AttemptError {
    fn from(err: EngineError) -> Self {
        AttemptError::Fatal(err)
    }
}

/// Commit on success, roll back on failure
async fn finish<T>(
    tx: Box<dyn DedupTransaction>,
    result: Result<T, AttemptError>,
) -> Result<T, AttemptError> {
    match result {
        Ok(value) => {
            tx.commit().await?;
            Ok(value)
        }
        Err(e) => {
            if let Err(rollback_err) = tx.rollback().await {
                debug!("Rollback failed: {}", rollback_err);
            }
            Err(e)
        }
    }
}

/// Orchestrates ingest, release, purge and statistics
pub struct DeduplicationEngine {
    repository: Arc<dyn DedupRepository>,
    blob_store: Arc<dyn BlobStore>,
    validator: Arc<dyn UploadValidator>,
    config: EngineConfig,
}

impl DeduplicationEngine {
    pub fn new(
        repository: Arc<dyn DedupRepository>,
        blob_store: Arc<dyn BlobStore>,
        validator: Arc<dyn UploadValidator>,
        config: EngineConfig,
    ) -> Self {
        Self {
            repository,
            blob_store,
            validator,
            config,
        }
    }

    pub fn config(&self) -> &EngineConfig {
        &self.config
    }

    /// Store `content` unless identical bytes are already stored.
    ///
    /// Validation failures leave no trace. Bytes are written to the backend
    /// at most once per call; if the call ends without a committed record
    /// pointing at them they are deleted again.
    pub async fn ingest(
        &self,
        request: IngestRequest,
        mut content: UploadReader,
    ) -> Result<IngestOutcome, EngineError> {
        Validation::validate_size(request.declared_size, self.config.max_upload_bytes)?;

        self.validator.validate(&UploadDescriptor {
            label: request.label.clone(),
            declared_size: request.declared_size,
            content_type: request.content_type.clone(),
        })?;

        let (fingerprint, actual_size) = ContentHasher::hash_and_rewind(&mut content).await?;
        if actual_size != request.declared_size {
            return Err(DomainError::SizeMismatch {
                declared: request.declared_size,
                actual: actual_size,
            }
            .into());
        }

        let mut content = Some(content);
        let mut pending: Option<PendingBlob> = None;
        let mut attempt = 0;

        let result = loop {
            attempt += 1;
            match self
                .attempt_ingest(&request, &fingerprint, actual_size, &mut content, &mut pending)
                .await
            {
                Ok(outcome) => break Ok(outcome),
                Err(AttemptError::Retry(reason)) => {
                    if let Err(e) = self.pause_before_retry("ingest", attempt, reason).await {
                        break Err(e);
                    }
                }
                Err(AttemptError::Fatal(e)) => break Err(e),
            }
        };

        match (&result, pending) {
            (Ok(IngestOutcome::Created(_)), Some(pending)) => pending.keep(),
            (_, Some(pending)) => pending.discard().await,
            (_, None) => {}
        }

        match &result {
            Ok(IngestOutcome::Created(record)) => info!(
                id = %record.id(),
                fingerprint = %fingerprint.short(),
                size = record.byte_size(),
                "Blob created"
            ),
            Ok(IngestOutcome::Duplicate(record)) => info!(
                id = %record.id(),
                fingerprint = %fingerprint.short(),
                references = record.reference_count(),
                "Duplicate upload"
            ),
            Err(e) => warn!(fingerprint = %fingerprint.short(), "Ingest failed: {}", e),
        }

        result
    }

    async fn attempt_ingest(
        &self,
        request: &IngestRequest,
        fingerprint: &ContentHash,
        byte_size: u64,
        content: &mut Option<UploadReader>,
        pending: &mut Option<PendingBlob>,
    ) -> Result<IngestOutcome, AttemptError> {
        let mut tx = self.repository.begin().await?;
        let result = self
            .ingest_in(&mut *tx, request, fingerprint, byte_size, content, pending)
            .await;

        // From here on a cancelled commit may still have landed; bytes it
        // turns out nobody owns are left to the sweeper.
        let creating = matches!(result, Ok(IngestOutcome::Created(_)));
        if creating {
            if let Some(blob) = pending.as_mut() {
                blob.disarm();
            }
        }

        let result = finish(tx, result).await;
        if creating && result.is_err() {
            if let Some(blob) = pending.as_mut() {
                blob.rearm();
            }
        }
        result
    }

    async fn ingest_in(
        &self,
        tx: &mut dyn DedupTransaction,
        request: &IngestRequest,
        fingerprint: &ContentHash,
        byte_size: u64,
        content: &mut Option<UploadReader>,
        pending: &mut Option<PendingBlob>,
    ) -> Result<IngestOutcome, AttemptError> {
        if let Some(existing) = tx.find_by_fingerprint(fingerprint).await? {
            let record = tx.increment_reference(existing.id()).await?;
            tx.apply_delta(&MetadataDelta::duplicate(record.byte_size()))
                .await?;
            return Ok(IngestOutcome::Duplicate(record));
        }

        let locator = match pending {
            Some(blob) => blob.locator().clone(),
            None => {
                let blob = self.store_content(content, &request.label).await?;
                let locator = blob.locator().clone();
                *pending = Some(blob);
                locator
            }
        };

        let record = tx
            .create(NewBlobRecord {
                fingerprint: fingerprint.clone(),
                byte_size,
                label: request.label.clone(),
                content_type: request.content_type.clone(),
                locator,
            })
            .await?;
        tx.apply_delta(&MetadataDelta::created()).await?;

        Ok(IngestOutcome::Created(record))
    }

    async fn store_content(
        &self,
        content: &mut Option<UploadReader>,
        label: &str,
    ) -> Result<PendingBlob, EngineError> {
        let mut reader = content
            .take()
            .ok_or_else(|| StorageError::Internal("upload content already consumed".to_string()))?;
        reader
            .seek(SeekFrom::Start(0))
            .await
            .map_err(StorageError::from)?;

        let locator = self
            .blob_store
            .put(Box::pin(reader), Validation::extension_of(label))
            .await?;
        Ok(PendingBlob::new(locator, Arc::clone(&self.blob_store)))
    }

    /// Drop one reference to a blob, destroying it with its bytes at zero
    pub async fn release(&self, id: &BlobId) -> Result<ReleaseOutcome, EngineError> {
        let id = *id;
        let (outcome, orphaned) = self
            .retrying("release", || async move {
                let mut tx = self.repository.begin().await?;
                let result = Self::release_in(&mut *tx, &id).await;
                finish(tx, result).await
            })
            .await?;

        if let Some(locator) = orphaned {
            self.delete_bytes(&locator).await;
        }

        info!(id = %id, outcome = ?outcome, "Reference released");
        Ok(outcome)
    }

    async fn release_in(
        tx: &mut dyn DedupTransaction,
        id: &BlobId,
    ) -> Result<(ReleaseOutcome, Option<StorageLocator>), AttemptError> {
        if tx.find_by_id(id).await?.is_none() {
            return Err(AttemptError::Fatal(EngineError::NotFound(id.to_string())));
        }

        match tx.decrement_reference(id).await? {
            DecrementOutcome::Retained(record) => {
                tx.apply_delta(&MetadataDelta::released()).await?;
                Ok((
                    ReleaseOutcome::Released {
                        remaining_references: record.reference_count(),
                    },
                    None,
                ))
            }
            DecrementOutcome::Destroyed(record) => {
                tx.apply_delta(&MetadataDelta::destroyed()).await?;
                Ok((ReleaseOutcome::Destroyed, Some(record.locator().clone())))
            }
        }
    }

    /// Remove a blob regardless of how many references it still has
    pub async fn purge(&self, id: &BlobId) -> Result<BlobRecord, EngineError> {
        let id = *id;
        let record = self
            .retrying("purge", || async move {
                let mut tx = self.repository.begin().await?;
                let result = Self::purge_in(&mut *tx, &id).await;
                finish(tx, result).await
            })
            .await?;

        self.delete_bytes(record.locator()).await;

        info!(
            id = %id,
            references = record.reference_count(),
            "Blob purged"
        );
        Ok(record)
    }

    async fn purge_in(
        tx: &mut dyn DedupTransaction,
        id: &BlobId,
    ) -> Result<BlobRecord, AttemptError> {
        let record = tx.delete_unconditionally(id).await?;
        tx.apply_delta(&MetadataDelta::purged(record.reference_count()))
            .await?;
        Ok(record)
    }

    /// Aggregate counters, initializing the singleton on first access
    pub async fn stats(&self) -> Result<StatsDto, EngineError> {
        let metadata = self.repository.metadata().await?;
        Ok(StatsDto::from(metadata))
    }

    async fn retrying<T, F, Fut>(
        &self,
        operation: &'static str,
        mut attempt_fn: F,
    ) -> Result<T, EngineError>
    where
        F: FnMut() -> Fut,
        Fut: Future<Output = Result<T, AttemptError>>,
    {
        let mut attempt = 0;
        loop {
            attempt += 1;
            match attempt_fn().await {
                Ok(value) => return Ok(value),
                Err(AttemptError::Retry(reason)) => {
                    self.pause_before_retry(operation, attempt, reason).await?
                }
                Err(AttemptError::Fatal(e)) => return Err(e),
            }
        }
    }

    /// Sleep before the next attempt, or give up once the budget is spent
    async fn pause_before_retry(
        &self,
        operation: &'static str,
        attempt: u32,
        reason: String,
    ) -> Result<(), EngineError> {
        let policy = &self.config.retry;
        if attempt >= policy.max_attempts {
            warn!(
                operation,
                attempts = attempt,
                "Giving up after repeated transaction failures: {}",
                reason
            );
            return Err(EngineError::Transient {
                attempts: attempt,
                message: reason,
            });
        }

        let delay = policy.backoff(attempt);
        debug!(
            operation,
            attempt,
            delay_ms = delay.as_millis() as u64,
            "Retrying transaction: {}",
            reason
        );
        tokio::time::sleep(delay).await;
        Ok(())
    }

    async fn delete_bytes(&self, locator: &StorageLocator) {
        if let Err(e) = self.blob_store.delete(locator).await {
            warn!(
                locator = %locator,
                "Failed to delete blob bytes after commit, leaving them to the sweeper: {}",
                e
            );
        }
    }
}
