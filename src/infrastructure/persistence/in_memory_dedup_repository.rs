//! In-memory deduplication store
//!
//! Not persistent. A transaction holds the store-wide lock for its whole
//! lifetime and mutates a private copy of the state; `commit` swaps the copy
//! in, while `rollback` or drop throws it away. That gives the same
//! all-or-nothing visibility as the Postgres store with trivially
//! serializable isolation.

use async_trait::async_trait;
use std::collections::HashMap;
use std::sync::Arc;
use tokio::sync::{Mutex, OwnedMutexGuard};

use crate::application::dto::{FileFilter, PageRequest};
use crate::application::ports::{
    BlobRecordStore, DecrementOutcome, DedupRepository, DedupTransaction, MetadataStore,
    NewBlobRecord, RecordPage, RecordSummary, RepositoryError,
};
use crate::domain::entities::{AggregateMetadata, BlobRecord, MetadataDelta, ReferenceRelease};
use crate::domain::value_objects::{BlobId, ContentHash, StorageLocator};

#[derive(Debug, Clone, Default)]
struct MemoryState {
    records: HashMap<BlobId, BlobRecord>,
    by_fingerprint: HashMap<ContentHash, BlobId>,
    // Created lazily, like the database row
    metadata: Option<AggregateMetadata>,
}

impl MemoryState {
    fn record_mut(&mut self, id: &BlobId) -> Result<&mut BlobRecord, RepositoryError> {
        self.records
            .get_mut(id)
            .ok_or_else(|| RepositoryError::NotFound(id.to_string()))
    }

    fn remove(&mut self, id: &BlobId) -> Result<BlobRecord, RepositoryError> {
        let record = self
            .records
            .remove(id)
            .ok_or_else(|| RepositoryError::NotFound(id.to_string()))?;
        self.by_fingerprint.remove(record.fingerprint());
        Ok(record)
    }
}

fn matches_filter(record: &BlobRecord, filter: &FileFilter) -> bool {
    if let Some(search) = filter.search.as_deref().filter(|s| !s.is_empty()) {
        if !record
            .label()
            .to_lowercase()
            .contains(&search.to_lowercase())
        {
            return false;
        }
    }
    if let Some(content_type) = &filter.content_type {
        if record.content_type() != content_type {
            return false;
        }
    }
    if filter.min_size.is_some_and(|min| record.byte_size() < min) {
        return false;
    }
    if filter.max_size.is_some_and(|max| record.byte_size() > max) {
        return false;
    }
    if let Some(date) = filter.created_on {
        if record.created_at().date_naive() != date {
            return false;
        }
    }
    true
}

/// Process-local implementation of [`DedupRepository`]
#[derive(Clone, Default)]
pub struct InMemoryDedupRepository {
    state: Arc<Mutex<MemoryState>>,
}

impl InMemoryDedupRepository {
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl DedupRepository for InMemoryDedupRepository {
    async fn begin(&self) -> Result<Box<dyn DedupTransaction>, RepositoryError> {
        let guard = Arc::clone(&self.state).lock_owned().await;
        let working = guard.clone();
        Ok(Box::new(InMemoryDedupTransaction { guard, working }))
    }

    async fn find_by_id(&self, id: &BlobId) -> Result<Option<BlobRecord>, RepositoryError> {
        Ok(self.state.lock().await.records.get(id).cloned())
    }

    async fn list(
        &self,
        filter: &FileFilter,
        page: PageRequest,
    ) -> Result<RecordPage, RepositoryError> {
        let state = self.state.lock().await;

        let mut matching: Vec<&BlobRecord> = state
            .records
            .values()
            .filter(|record| matches_filter(record, filter))
            .collect();
        // Newest first, id as a stable tie-break
        matching.sort_by(|a, b| {
            b.created_at()
                .cmp(&a.created_at())
                .then_with(|| b.id().as_uuid().cmp(a.id().as_uuid()))
        });

        let total = matching.len() as u64;
        let records = matching
            .into_iter()
            .skip(page.offset.max(0) as usize)
            .take(page.limit.max(0) as usize)
            .cloned()
            .collect();

        Ok(RecordPage { records, total })
    }

    async fn metadata(&self) -> Result<AggregateMetadata, RepositoryError> {
        let mut state = self.state.lock().await;
        Ok(*state.metadata.get_or_insert_with(AggregateMetadata::default))
    }

    async fn summarize(&self) -> Result<RecordSummary, RepositoryError> {
        let state = self.state.lock().await;
        Ok(RecordSummary {
            unique_blobs: state.records.len() as u64,
            total_references: state
                .records
                .values()
                .map(|record| record.reference_count().max(0) as u64)
                .sum(),
        })
    }

    async fn locator_in_use(&self, locator: &StorageLocator) -> Result<bool, RepositoryError> {
        let state = self.state.lock().await;
        Ok(state
            .records
            .values()
            .any(|record| record.locator() == locator))
    }

    async fn ping(&self) -> Result<(), RepositoryError> {
        Ok(())
    }
}

/// Exclusive unit of work over the in-memory state
pub struct InMemoryDedupTransaction {
    guard: OwnedMutexGuard<MemoryState>,
    working: MemoryState,
}

#[async_trait]
impl BlobRecordStore for InMemoryDedupTransaction {
    async fn find_by_fingerprint(
        &mut self,
        fingerprint: &ContentHash,
    ) -> Result<Option<BlobRecord>, RepositoryError> {
        Ok(self
            .working
            .by_fingerprint
            .get(fingerprint)
            .and_then(|id| self.working.records.get(id))
            .cloned())
    }

    async fn find_by_id(&mut self, id: &BlobId) -> Result<Option<BlobRecord>, RepositoryError> {
        Ok(self.working.records.get(id).cloned())
    }

    async fn create(&mut self, record: NewBlobRecord) -> Result<BlobRecord, RepositoryError> {
        if self.working.by_fingerprint.contains_key(&record.fingerprint) {
            return Err(RepositoryError::Conflict(record.fingerprint.to_string()));
        }

        let record = record.into_record();
        self.working
            .by_fingerprint
            .insert(record.fingerprint().clone(), *record.id());
        self.working.records.insert(*record.id(), record.clone());
        Ok(record)
    }

    async fn increment_reference(&mut self, id: &BlobId) -> Result<BlobRecord, RepositoryError> {
        let record = self.working.record_mut(id)?;
        record.increment_reference();
        Ok(record.clone())
    }

    async fn decrement_reference(
        &mut self,
        id: &BlobId,
    ) -> Result<DecrementOutcome, RepositoryError> {
        let record = self.working.record_mut(id)?;
        match record.release_reference() {
            ReferenceRelease::Retained => Ok(DecrementOutcome::Retained(record.clone())),
            ReferenceRelease::Exhausted => Ok(DecrementOutcome::Destroyed(self.working.remove(id)?)),
        }
    }

    async fn delete_unconditionally(
        &mut self,
        id: &BlobId,
    ) -> Result<BlobRecord, RepositoryError> {
        self.working.remove(id)
    }
}

#[async_trait]
impl MetadataStore for InMemoryDedupTransaction {
    async fn get_or_init(&mut self) -> Result<AggregateMetadata, RepositoryError> {
        Ok(*self
            .working
            .metadata
            .get_or_insert_with(AggregateMetadata::default))
    }

    async fn apply_delta(
        &mut self,
        delta: &MetadataDelta,
    ) -> Result<AggregateMetadata, RepositoryError> {
        let metadata = self
            .working
            .metadata
            .get_or_insert_with(AggregateMetadata::default);
        metadata.apply(delta)?;
        Ok(*metadata)
    }
}

#[async_trait]
impl DedupTransaction for InMemoryDedupTransaction {
    async fn commit(self: Box<Self>) -> Result<(), RepositoryError> {
        let InMemoryDedupTransaction { mut guard, working } = *self;
        *guard = working;
        Ok(())
    }

    async fn rollback(self: Box<Self>) -> Result<(), RepositoryError> {
        Ok(())
    }
}
