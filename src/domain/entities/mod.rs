mod aggregate_metadata;
mod blob_record;

pub use aggregate_metadata::{AggregateMetadata, MetadataDelta};
pub use blob_record::{BlobRecord, ReferenceRelease};
