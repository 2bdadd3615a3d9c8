use parking_lot::Mutex;
use std::sync::Arc;
use tokio::time;
use tracing::{debug, error, info, warn};

use crate::application::gc::config::SweepConfig;
use crate::application::gc::results::SweepResult;
use crate::application::ports::{BlobStore, DedupRepository, StorageError};
use crate::domain::value_objects::StorageLocator;

/// Background task removing stored bytes that no blob record points at.
///
/// Such bytes are left behind when a post-commit delete fails or the process
/// dies between writing bytes and committing the record. Only objects older
/// than the grace period are considered, so in-flight ingests are never
/// affected.
///
/// Each pass resumes after the last locator the previous pass inspected and
/// wraps around once the backend is exhausted, so successive passes cover the
/// whole store however many live blobs it holds.
pub struct OrphanSweeper {
    repository: Arc<dyn DedupRepository>,
    blob_store: Arc<dyn BlobStore>,
    config: SweepConfig,
    cursor: Mutex<Option<StorageLocator>>,
}

impl OrphanSweeper {
    pub fn new(
        repository: Arc<dyn DedupRepository>,
        blob_store: Arc<dyn BlobStore>,
        config: SweepConfig,
    ) -> Self {
        Self {
            repository,
            blob_store,
            config,
            cursor: Mutex::new(None),
        }
    }

    /// Run sweeps forever at the configured interval
    pub async fn run(self: Arc<Self>) {
        info!(
            "Starting orphan sweeper with interval: {:?}, grace period: {:?}",
            self.config.interval, self.config.grace_period
        );

        let mut interval = time::interval(self.config.interval);

        loop {
            interval.tick().await;

            match self.sweep_once().await {
                Ok(result) => {
                    if result.has_deletions() {
                        info!("{}", result.summary());
                    } else {
                        debug!("{}", result.summary());
                    }
                    for e in &result.errors {
                        error!("Sweep error: {}", e);
                    }
                }
                Err(e) => error!("Orphan sweep failed: {}", e),
            }
        }
    }

    /// One pass over at most `batch_size` stored objects
    pub async fn sweep_once(&self) -> Result<SweepResult, StorageError> {
        let after = self.cursor.lock().clone();
        let candidates = self
            .blob_store
            .list(self.config.grace_period, after, self.config.batch_size)
            .await?;

        // A short batch means the end was reached; start over next time
        *self.cursor.lock() = if candidates.len() < self.config.batch_size {
            None
        } else {
            candidates.last().cloned()
        };

        let mut result = SweepResult {
            inspected: candidates.len(),
            ..SweepResult::default()
        };

        for locator in candidates {
            match self.repository.locator_in_use(&locator).await {
                Ok(true) => result.referenced += 1,
                Ok(false) => match self.blob_store.delete(&locator).await {
                    Ok(()) => {
                        debug!(locator = %locator, "Deleted orphaned blob");
                        result.deleted += 1;
                    }
                    Err(e) => result
                        .errors
                        .push(format!("failed to delete {}: {}", locator, e)),
                },
                Err(e) => {
                    // Never delete what we could not prove unreferenced
                    warn!(locator = %locator, "Reference check failed: {}", e);
                    result
                        .errors
                        .push(format!("failed to check {}: {}", locator, e));
                }
            }
        }

        Ok(result)
    }
}
