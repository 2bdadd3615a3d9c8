mod blob_store;
mod dedup_repository;
mod upload_validator;

pub use blob_store::{BlobReader, BlobStore, StorageError, UploadReader, UploadSource};
pub use dedup_repository::{
    BlobRecordStore, DecrementOutcome, DedupRepository, DedupTransaction, MetadataStore,
    NewBlobRecord, RecordPage, RecordSummary, RepositoryError,
};
pub use upload_validator::{UploadDescriptor, UploadValidator};

#[cfg(test)]
pub use blob_store::MockBlobStore;
#[cfg(test)]
pub use dedup_repository::MockDedupRepository;
#[cfg(test)]
pub use upload_validator::MockUploadValidator;
