//! Store-wide deduplication counters.
//!
//! [`AggregateMetadata`] is a singleton: persistence layers pin it to
//! [`AggregateMetadata::SINGLETON_ID`] and only ever mutate it through a
//! [`MetadataDelta`] applied inside the same transaction as the blob record
//! change that caused it.

use serde::{Deserialize, Serialize};

use crate::domain::errors::DomainError;

const BYTES_PER_MB: f64 = 1024.0 * 1024.0;

/// Singleton counters summarizing the whole store
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct AggregateMetadata {
    total_references: u64,
    unique_blobs: u64,
    duplicates_avoided: u64,
    bytes_saved: u64,
}

/// Signed adjustments to the aggregate counters
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct MetadataDelta {
    pub total_references: i64,
    pub unique_blobs: i64,
    pub duplicates_avoided: i64,
    pub bytes_saved: i64,
}

impl MetadataDelta {
    /// A brand new blob was stored
    pub fn created() -> Self {
        Self {
            total_references: 1,
            unique_blobs: 1,
            ..Self::default()
        }
    }

    /// An upload matched an existing blob of `byte_size` bytes
    pub fn duplicate(byte_size: u64) -> Self {
        Self {
            total_references: 1,
            duplicates_avoided: 1,
            bytes_saved: i64::try_from(byte_size).unwrap_or(i64::MAX),
            ..Self::default()
        }
    }

    /// One reference dropped, blob still alive
    pub fn released() -> Self {
        Self {
            total_references: -1,
            ..Self::default()
        }
    }

    /// Last reference dropped, blob destroyed
    pub fn destroyed() -> Self {
        Self {
            total_references: -1,
            unique_blobs: -1,
            ..Self::default()
        }
    }

    /// Blob removed regardless of the `reference_count` it still had
    pub fn purged(reference_count: i64) -> Self {
        Self {
            total_references: -reference_count,
            unique_blobs: -1,
            ..Self::default()
        }
    }
}

impl AggregateMetadata {
    /// Fixed key of the one and only metadata row
    pub const SINGLETON_ID: i16 = 1;

    pub fn new(
        total_references: u64,
        unique_blobs: u64,
        duplicates_avoided: u64,
        bytes_saved: u64,
    ) -> Self {
        Self {
            total_references,
            unique_blobs,
            duplicates_avoided,
            bytes_saved,
        }
    }

    /// Apply a delta, failing without modification if any counter would go negative
    pub fn apply(&mut self, delta: &MetadataDelta) -> Result<(), DomainError> {
        let next = Self {
            total_references: shift(
                self.total_references,
                delta.total_references,
                "total_references",
            )?,
            unique_blobs: shift(self.unique_blobs, delta.unique_blobs, "unique_blobs")?,
            duplicates_avoided: shift(
                self.duplicates_avoided,
                delta.duplicates_avoided,
                "duplicates_avoided",
            )?,
            bytes_saved: shift(self.bytes_saved, delta.bytes_saved, "bytes_saved")?,
        };
        *self = next;
        Ok(())
    }

    pub fn total_references(&self) -> u64 {
        self.total_references
    }

    pub fn unique_blobs(&self) -> u64 {
        self.unique_blobs
    }

    pub fn duplicates_avoided(&self) -> u64 {
        self.duplicates_avoided
    }

    pub fn bytes_saved(&self) -> u64 {
        self.bytes_saved
    }

    pub fn bytes_saved_mb(&self) -> f64 {
        self.bytes_saved as f64 / BYTES_PER_MB
    }

    /// References per stored blob; 1.0 for an empty store
    pub fn deduplication_ratio(&self) -> f64 {
        if self.unique_blobs == 0 {
            1.0
        } else {
            self.total_references as f64 / self.unique_blobs as f64
        }
    }
}

fn shift(value: u64, delta: i64, counter: &'static str) -> Result<u64, DomainError> {
    let shifted = if delta >= 0 {
        value.checked_add(delta.unsigned_abs())
    } else {
        value.checked_sub(delta.unsigned_abs())
    };
    shifted.ok_or(DomainError::CounterUnderflow { counter })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_created_then_duplicate() {
        let mut metadata = AggregateMetadata::default();
        metadata.apply(&MetadataDelta::created()).unwrap();
        metadata.apply(&MetadataDelta::duplicate(18)).unwrap();

        assert_eq!(metadata.total_references(), 2);
        assert_eq!(metadata.unique_blobs(), 1);
        assert_eq!(metadata.duplicates_avoided(), 1);
        assert_eq!(metadata.bytes_saved(), 18);
        assert_eq!(metadata.deduplication_ratio(), 2.0);
    }

    #[test]
    fn test_bytes_saved_survives_release() {
        let mut metadata = AggregateMetadata::default();
        metadata.apply(&MetadataDelta::created()).unwrap();
        metadata.apply(&MetadataDelta::duplicate(100)).unwrap();
        metadata.apply(&MetadataDelta::released()).unwrap();
        metadata.apply(&MetadataDelta::destroyed()).unwrap();

        assert_eq!(metadata.total_references(), 0);
        assert_eq!(metadata.unique_blobs(), 0);
        assert_eq!(metadata.bytes_saved(), 100);
    }

    #[test]
    fn test_underflow_leaves_counters_untouched() {
        let mut metadata = AggregateMetadata::new(1, 0, 0, 0);
        let err = metadata.apply(&MetadataDelta::destroyed()).unwrap_err();

        assert_eq!(err, DomainError::CounterUnderflow { counter: "unique_blobs" });
        assert_eq!(metadata, AggregateMetadata::new(1, 0, 0, 0));
    }

    #[test]
    fn test_ratio_of_empty_store_is_one() {
        assert_eq!(AggregateMetadata::default().deduplication_ratio(), 1.0);
    }

    #[test]
    fn test_bytes_saved_mb() {
        let metadata = AggregateMetadata::new(0, 0, 0, 5 * 1024 * 1024);
        assert_eq!(metadata.bytes_saved_mb(), 5.0);
    }

    #[test]
    fn test_purged_delta() {
        let delta = MetadataDelta::purged(3);
        assert_eq!(delta.total_references, -3);
        assert_eq!(delta.unique_blobs, -1);
    }
}
