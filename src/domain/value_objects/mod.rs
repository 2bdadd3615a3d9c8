mod blob_id;
mod content_hash;
mod storage_locator;

pub use blob_id::BlobId;
pub use content_hash::ContentHash;
pub use storage_locator::StorageLocator;
