#[cfg(test)]
use mockall::automock;

use crate::domain::errors::DomainError;

/// What the uploader claims about a file, before any byte is inspected
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct UploadDescriptor {
    pub label: String,
    pub declared_size: u64,
    pub content_type: String,
}

/// Port for the pre-ingest validation collaborator.
///
/// Runs before hashing; a rejection short-circuits ingestion.
#[cfg_attr(test, automock)]
pub trait UploadValidator: Send + Sync {
    fn validate(&self, upload: &UploadDescriptor) -> Result<(), DomainError>;
}
