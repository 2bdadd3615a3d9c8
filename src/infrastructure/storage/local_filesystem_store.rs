use async_trait::async_trait;
use parking_lot::RwLock;
use std::collections::HashSet;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::{Duration, SystemTime};
use tokio::fs::{self, File};
use tokio::io::{AsyncReadExt, AsyncWriteExt, BufReader, BufWriter};
use tracing::{debug, warn};
use uuid::Uuid;

use crate::application::ports::{BlobReader, BlobStore, StorageError};
use crate::domain::value_objects::StorageLocator;
use crate::infrastructure::storage::content_hasher::BUFFER_SIZE;
use crate::infrastructure::storage::path_builder::UPLOADS_DIR;
use crate::infrastructure::storage::PathBuilder;

/// Local filesystem blob store.
///
/// Every `put` lands under a fresh uuid-derived locator, so concurrent writers
/// of identical content never share a file. Bytes are written to `temp/`,
/// optionally fsynced, then renamed into `uploads/`.
pub struct LocalFilesystemStore {
    path_builder: PathBuilder,
    durable_writes: bool,
    // Shard directories already known to exist
    created_dirs: Arc<RwLock<HashSet<PathBuf>>>,
}

impl LocalFilesystemStore {
    pub fn new(root: PathBuf) -> Self {
        Self::with_durability(root, true)
    }

    pub fn with_durability(root: PathBuf, durable_writes: bool) -> Self {
        Self {
            path_builder: PathBuilder::new(root),
            durable_writes,
            created_dirs: Arc::new(RwLock::new(HashSet::new())),
        }
    }

    /// Initialize storage directories
    pub async fn init(&self) -> Result<(), StorageError> {
        fs::create_dir_all(self.path_builder.temp_root()).await?;
        fs::create_dir_all(self.path_builder.uploads_root()).await?;
        Ok(())
    }

    async fn ensure_dir(&self, dir: &Path) -> Result<(), StorageError> {
        if self.created_dirs.read().contains(dir) {
            return Ok(());
        }
        fs::create_dir_all(dir).await?;
        self.created_dirs.write().insert(dir.to_path_buf());
        Ok(())
    }

    async fn write_temp(&self, path: &Path, mut reader: BlobReader) -> Result<u64, StorageError> {
        let mut file = BufWriter::with_capacity(BUFFER_SIZE, File::create(path).await?);
        let mut buffer = vec![0u8; BUFFER_SIZE];
        let mut total_bytes = 0u64;

        loop {
            let n = reader.read(&mut buffer).await?;
            if n == 0 {
                break;
            }
            file.write_all(&buffer[..n]).await?;
            total_bytes += n as u64;
        }

        file.flush().await?;
        if self.durable_writes {
            file.get_mut().sync_all().await?;
        }
        Ok(total_bytes)
    }

    async fn sync_parent(&self, path: &Path) {
        let Some(parent) = path.parent() else {
            return;
        };
        match File::open(parent).await {
            Ok(dir) => {
                if let Err(e) = dir.sync_all().await {
                    warn!("Failed to sync parent directory after rename: {}", e);
                }
            }
            Err(e) => warn!("Failed to open parent directory for sync: {}", e),
        }
    }
}

#[async_trait]
impl BlobStore for LocalFilesystemStore {
    async fn put(
        &self,
        reader: BlobReader,
        extension: Option<String>,
    ) -> Result<StorageLocator, StorageError> {
        let id = Uuid::new_v4();
        let temp_path = self.path_builder.temp_path(id);
        if let Some(parent) = temp_path.parent() {
            self.ensure_dir(parent).await?;
        }

        let size = match self.write_temp(&temp_path, reader).await {
            Ok(size) => size,
            Err(e) => {
                warn!("Failed to write blob to temp file {:?}: {}", temp_path, e);
                let _ = fs::remove_file(&temp_path).await;
                return Err(e);
            }
        };

        let locator = self.path_builder.new_locator(id, extension.as_deref());
        let final_path = self.path_builder.resolve(&locator);

        if let Some(parent) = final_path.parent() {
            if let Err(e) = self.ensure_dir(parent).await {
                let _ = fs::remove_file(&temp_path).await;
                return Err(e);
            }
        }

        if let Err(e) = fs::rename(&temp_path, &final_path).await {
            let _ = fs::remove_file(&temp_path).await;
            return Err(StorageError::Io(e));
        }

        if self.durable_writes {
            self.sync_parent(&final_path).await;
        }

        debug!(locator = %locator, size, "Blob stored");
        Ok(locator)
    }

    async fn get(&self, locator: &StorageLocator) -> Result<BlobReader, StorageError> {
        let path = self.path_builder.resolve(locator);

        let file = File::open(&path).await.map_err(|e| {
            if e.kind() == std::io::ErrorKind::NotFound {
                StorageError::NotFound(locator.to_string())
            } else {
                StorageError::Io(e)
            }
        })?;

        Ok(Box::pin(BufReader::new(file)))
    }

    async fn delete(&self, locator: &StorageLocator) -> Result<(), StorageError> {
        let path = self.path_builder.resolve(locator);

        match fs::remove_file(&path).await {
            Ok(()) => {
                debug!(locator = %locator, "Blob deleted");
                Ok(())
            }
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
                debug!(locator = %locator, "Blob already absent");
                Ok(())
            }
            Err(e) => Err(StorageError::Io(e)),
        }
    }

    async fn list(
        &self,
        older_than: Duration,
        after: Option<StorageLocator>,
        limit: usize,
    ) -> Result<Vec<StorageLocator>, StorageError> {
        let cutoff = SystemTime::now()
            .checked_sub(older_than)
            .unwrap_or(SystemTime::UNIX_EPOCH);
        let resume = after.as_ref().and_then(resume_position);
        let mut found = Vec::new();

        let shards = match sorted_entries(&self.path_builder.uploads_root()).await {
            Ok(entries) => entries,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Ok(found),
            Err(e) => return Err(StorageError::Io(e)),
        };

        for (shard, shard_path) in shards {
            if matches!(&resume, Some((after_shard, _)) if shard < *after_shard) {
                continue;
            }
            if !fs::metadata(&shard_path).await?.is_dir() {
                continue;
            }
            for (name, path) in sorted_entries(&shard_path).await? {
                if matches!(&resume, Some((after_shard, after_name))
                    if shard == *after_shard && name <= *after_name)
                {
                    continue;
                }
                if found.len() >= limit {
                    return Ok(found);
                }
                let metadata = fs::metadata(&path).await?;
                if !metadata.is_file() || metadata.modified()? > cutoff {
                    continue;
                }
                match self.path_builder.locator_for(&path) {
                    Some(locator) => found.push(locator),
                    None => warn!("Skipping unaddressable file {:?}", path),
                }
            }
        }

        Ok(found)
    }
}

/// `(shard, file name)` of a locator under the uploads root
fn resume_position(locator: &StorageLocator) -> Option<(String, String)> {
    let mut segments = locator.as_str().split('/');
    if segments.next()? != UPLOADS_DIR {
        return None;
    }
    let shard = segments.next()?.to_string();
    let name = segments.next()?.to_string();
    Some((shard, name))
}

/// Directory entries sorted by name; non-utf8 names are skipped
async fn sorted_entries(dir: &Path) -> std::io::Result<Vec<(String, PathBuf)>> {
    let mut entries = fs::read_dir(dir).await?;
    let mut sorted = Vec::new();
    while let Some(entry) = entries.next_entry().await? {
        match entry.file_name().into_string() {
            Ok(name) => sorted.push((name, entry.path())),
            Err(name) => warn!("Skipping non-utf8 file name {:?}", name),
        }
    }
    sorted.sort_unstable_by(|a, b| a.0.cmp(&b.0));
    Ok(sorted)
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    async fn store() -> (TempDir, LocalFilesystemStore) {
        let dir = TempDir::new().unwrap();
        let store = LocalFilesystemStore::with_durability(dir.path().to_path_buf(), false);
        store.init().await.unwrap();
        (dir, store)
    }

    fn reader(content: &'static [u8]) -> BlobReader {
        Box::pin(std::io::Cursor::new(content))
    }

    #[tokio::test]
    async fn test_store_init_creates_directories() {
        let (dir, _store) = store().await;
        assert!(dir.path().join("uploads").exists());
        assert!(dir.path().join("temp").exists());
    }

    #[tokio::test]
    async fn test_put_and_get_blob() {
        let (_dir, store) = store().await;
        let content = b"Hello, World!";

        let locator = store
            .put(reader(content), Some("pdf".to_string()))
            .await
            .unwrap();
        assert!(locator.as_str().starts_with("uploads/"));
        assert!(locator.as_str().ends_with(".pdf"));

        let mut stored = store.get(&locator).await.unwrap();
        let mut buffer = Vec::new();
        stored.read_to_end(&mut buffer).await.unwrap();
        assert_eq!(buffer, content);
    }

    #[tokio::test]
    async fn test_identical_content_gets_distinct_locators() {
        let (_dir, store) = store().await;

        let a = store.put(reader(b"same"), None).await.unwrap();
        let b = store.put(reader(b"same"), None).await.unwrap();
        assert_ne!(a, b);

        store.delete(&a).await.unwrap();
        assert!(store.get(&b).await.is_ok());
    }

    #[tokio::test]
    async fn test_delete_is_idempotent() {
        let (_dir, store) = store().await;
        let locator = store.put(reader(b"to be deleted"), None).await.unwrap();

        store.delete(&locator).await.unwrap();
        store.delete(&locator).await.unwrap();

        assert!(matches!(
            store.get(&locator).await,
            Err(StorageError::NotFound(_))
        ));
    }

    #[tokio::test]
    async fn test_temp_dir_is_empty_after_put() {
        let (dir, store) = store().await;
        store.put(reader(b"data"), None).await.unwrap();

        let mut temp = std::fs::read_dir(dir.path().join("temp")).unwrap();
        assert!(temp.next().is_none());
    }

    #[tokio::test]
    async fn test_list_respects_age_and_limit() {
        let (_dir, store) = store().await;
        for _ in 0..3 {
            store.put(reader(b"x"), None).await.unwrap();
        }

        let fresh = store
            .list(Duration::from_secs(3600), None, 10)
            .await
            .unwrap();
        assert!(fresh.is_empty());

        let all = store.list(Duration::ZERO, None, 10).await.unwrap();
        assert_eq!(all.len(), 3);

        let limited = store.list(Duration::ZERO, None, 2).await.unwrap();
        assert_eq!(limited.len(), 2);
    }

    #[tokio::test]
    async fn test_list_resumes_after_cursor() {
        let (_dir, store) = store().await;
        let mut stored = Vec::new();
        for _ in 0..7 {
            stored.push(store.put(reader(b"x"), Some("bin".to_string())).await.unwrap());
        }
        stored.sort_by(|a, b| a.as_str().cmp(b.as_str()));

        let mut seen = Vec::new();
        let mut cursor = None;
        loop {
            let batch = store.list(Duration::ZERO, cursor, 3).await.unwrap();
            seen.extend(batch.iter().cloned());
            if batch.len() < 3 {
                break;
            }
            cursor = batch.last().cloned();
        }

        assert_eq!(seen, stored);
    }

    #[tokio::test]
    async fn test_list_past_last_locator_is_empty() {
        let (_dir, store) = store().await;
        store.put(reader(b"x"), None).await.unwrap();

        let all = store.list(Duration::ZERO, None, 10).await.unwrap();
        let rest = store
            .list(Duration::ZERO, all.last().cloned(), 10)
            .await
            .unwrap();
        assert!(rest.is_empty());
    }
}
