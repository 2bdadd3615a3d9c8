use std::sync::Arc;
use tracing::{debug, warn};

use crate::application::ports::BlobStore;
use crate::domain::value_objects::StorageLocator;

/// Bytes written to the backend that no committed record references yet.
///
/// Unless [`PendingBlob::keep`] is called, the bytes are deleted: explicitly
/// through [`PendingBlob::discard`], or from a spawned task when the guard is
/// dropped (e.g. the ingest future was cancelled mid-transaction).
///
/// A guard disarmed around a commit leaves the bytes alone on drop: once the
/// commit is sent a record may already own them, and the sweeper collects
/// them if it does not.
pub(crate) struct PendingBlob {
    locator: StorageLocator,
    blob_store: Arc<dyn BlobStore>,
    armed: bool,
}

impl PendingBlob {
    pub(crate) fn new(locator: StorageLocator, blob_store: Arc<dyn BlobStore>) -> Self {
        Self {
            locator,
            blob_store,
            armed: true,
        }
    }

    pub(crate) fn locator(&self) -> &StorageLocator {
        &self.locator
    }

    /// A committed record now owns the bytes
    pub(crate) fn keep(mut self) {
        self.armed = false;
    }

    pub(crate) fn disarm(&mut self) {
        self.armed = false;
    }

    pub(crate) fn rearm(&mut self) {
        self.armed = true;
    }

    pub(crate) async fn discard(mut self) {
        self.armed = false;
        match self.blob_store.delete(&self.locator).await {
            Ok(()) => debug!(locator = %self.locator, "Discarded unreferenced blob"),
            Err(e) => warn!(
                locator = %self.locator,
                "Failed to discard unreferenced blob, leaving it to the sweeper: {}", e
            ),
        }
    }
}

impl Drop for PendingBlob {
    fn drop(&mut self) {
        if !self.armed {
            return;
        }

        let locator = self.locator.clone();
        match tokio::runtime::Handle::try_current() {
            Ok(handle) => {
                let blob_store = Arc::clone(&self.blob_store);
                handle.spawn(async move {
                    if let Err(e) = blob_store.delete(&locator).await {
                        warn!(locator = %locator, "Failed to delete abandoned blob: {}", e);
                    }
                });
            }
            Err(_) => warn!(locator = %locator, "No runtime to delete abandoned blob"),
        }
    }
}
