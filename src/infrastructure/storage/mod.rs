mod content_hasher;
mod local_filesystem_store;
mod path_builder;
mod upload_spool;

pub use content_hasher::ContentHasher;
pub use local_filesystem_store::LocalFilesystemStore;
pub use path_builder::PathBuilder;
pub use upload_spool::SpooledUpload;
