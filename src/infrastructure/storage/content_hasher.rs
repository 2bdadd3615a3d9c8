use sha2::{Digest, Sha256};
use std::io::SeekFrom;
use tokio::io::{AsyncRead, AsyncReadExt, AsyncSeek, AsyncSeekExt};

use crate::application::ports::StorageError;
use crate::domain::value_objects::ContentHash;

/// Buffer size for I/O operations. 256KB provides optimal throughput
/// for most modern storage systems while balancing memory usage.
pub(crate) const BUFFER_SIZE: usize = 256 * 1024;

/// Utility for computing SHA-256 content fingerprints.
///
/// SHA-256 is the only supported algorithm: fingerprints are compared for
/// equality across the whole store, so every record must be produced the same
/// way. The `asm` feature of `sha2` provides hardware acceleration on x86_64
/// and ARM64.
pub struct ContentHasher;

impl ContentHasher {
    /// Hash the whole stream, then seek back to its start.
    ///
    /// Returns the fingerprint and the number of bytes read. The stream is
    /// left positioned at offset 0 so the caller can persist the same bytes.
    pub async fn hash_and_rewind<R>(reader: &mut R) -> Result<(ContentHash, u64), StorageError>
    where
        R: AsyncRead + AsyncSeek + Unpin + ?Sized,
    {
        reader.seek(SeekFrom::Start(0)).await?;

        let mut hasher = Sha256::new();
        let mut total_bytes = 0u64;
        let mut buffer = vec![0u8; BUFFER_SIZE];

        loop {
            let n = reader.read(&mut buffer).await?;
            if n == 0 {
                break;
            }
            hasher.update(&buffer[..n]);
            total_bytes += n as u64;
        }

        reader.seek(SeekFrom::Start(0)).await?;

        let digest: [u8; 32] = hasher.finalize().into();
        Ok((ContentHash::from_digest(digest), total_bytes))
    }

    /// Hash an in-memory buffer
    pub fn hash_bytes(data: &[u8]) -> ContentHash {
        ContentHash::from_digest(Sha256::digest(data).into())
    }
}
