use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::domain::value_objects::{BlobId, ContentHash, StorageLocator};

/// Outcome of dropping one reference from a blob record
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ReferenceRelease {
    /// Other references remain; the record stays alive
    Retained,
    /// That was the last reference; the record and its bytes must go
    Exhausted,
}

/// Blob record entity - one unique payload with reference counting
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct BlobRecord {
    id: BlobId,
    fingerprint: ContentHash,
    byte_size: u64,
    reference_count: i64,
    label: String,
    content_type: String,
    locator: StorageLocator,
    created_at: DateTime<Utc>,
}

impl BlobRecord {
    /// Create new record with reference_count = 1
    pub fn new(
        fingerprint: ContentHash,
        byte_size: u64,
        label: String,
        content_type: String,
        locator: StorageLocator,
    ) -> Self {
        Self {
            id: BlobId::new(),
            fingerprint,
            byte_size,
            reference_count: 1,
            label,
            content_type,
            locator,
            created_at: Utc::now(),
        }
    }

    /// Reconstruct from storage
    #[allow(clippy::too_many_arguments)]
    pub fn reconstruct(
        id: BlobId,
        fingerprint: ContentHash,
        byte_size: u64,
        reference_count: i64,
        label: String,
        content_type: String,
        locator: StorageLocator,
        created_at: DateTime<Utc>,
    ) -> Self {
        Self {
            id,
            fingerprint,
            byte_size,
            reference_count,
            label,
            content_type,
            locator,
            created_at,
        }
    }

    /// Increment reference count
    pub fn increment_reference(&mut self) {
        self.reference_count += 1;
    }

    /// Drop one reference. The count never goes below 1: when the last
    /// reference is released the count is left untouched and the caller is
    /// expected to destroy the record.
    pub fn release_reference(&mut self) -> ReferenceRelease {
        if self.reference_count <= 1 {
            ReferenceRelease::Exhausted
        } else {
            self.reference_count -= 1;
            ReferenceRelease::Retained
        }
    }

    // Getters
    pub fn id(&self) -> &BlobId {
        &self.id
    }

    pub fn fingerprint(&self) -> &ContentHash {
        &self.fingerprint
    }

    pub fn byte_size(&self) -> u64 {
        self.byte_size
    }

    pub fn reference_count(&self) -> i64 {
        self.reference_count
    }

    pub fn label(&self) -> &str {
        &self.label
    }

    pub fn content_type(&self) -> &str {
        &self.content_type
    }

    pub fn locator(&self) -> &StorageLocator {
        &self.locator
    }

    pub fn created_at(&self) -> DateTime<Utc> {
        self.created_at
    }
}
