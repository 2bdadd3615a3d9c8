use std::path::{Path, PathBuf};
use tokio::fs::{self, File};
use tokio::io::{AsyncRead, AsyncReadExt, AsyncWriteExt, BufWriter};
use tracing::{debug, warn};
use uuid::Uuid;

use crate::application::ports::{StorageError, UploadReader};
use crate::infrastructure::storage::content_hasher::BUFFER_SIZE;

/// Request body buffered to local disk so it can be hashed and then stored.
///
/// At most `limit + 1` bytes are kept; anything larger is reported through
/// [`SpooledUpload::size`] as exceeding the limit without reading the rest.
/// The spool file is removed when the value is dropped.
#[derive(Debug)]
pub struct SpooledUpload {
    path: PathBuf,
    size: u64,
}

impl SpooledUpload {
    pub async fn spool<R>(dir: &Path, mut reader: R, limit: u64) -> Result<Self, StorageError>
    where
        R: AsyncRead + Unpin,
    {
        fs::create_dir_all(dir).await?;
        let path = dir.join(format!("spool-{}", Uuid::new_v4()));
        // Owns the file from here on, so early returns clean up
        let mut spooled = Self { path, size: 0 };

        let mut file = BufWriter::with_capacity(BUFFER_SIZE, File::create(&spooled.path).await?);
        let mut buffer = vec![0u8; BUFFER_SIZE];
        let cap = limit.saturating_add(1);

        while spooled.size < cap {
            let want = usize::try_from(cap - spooled.size)
                .unwrap_or(usize::MAX)
                .min(buffer.len());
            let n = reader.read(&mut buffer[..want]).await?;
            if n == 0 {
                break;
            }
            file.write_all(&buffer[..n]).await?;
            spooled.size += n as u64;
        }
        file.flush().await?;

        debug!(path = ?spooled.path, size = spooled.size, "Upload spooled");
        Ok(spooled)
    }

    /// Number of bytes spooled; `limit + 1` means the body was larger than allowed
    pub fn size(&self) -> u64 {
        self.size
    }

    /// Open the spooled bytes for hashing and storing
    pub async fn open(&self) -> Result<UploadReader, StorageError> {
        let file = File::open(&self.path).await?;
        Ok(Box::new(file))
    }
}

impl Drop for SpooledUpload {
    fn drop(&mut self) {
        if let Err(e) = std::fs::remove_file(&self.path) {
            if e.kind() != std::io::ErrorKind::NotFound {
                warn!(path = ?self.path, "Failed to remove spool file: {}", e);
            }
        }
    }
}
