//! Error types surfaced by the application layer
//!
//! [`EngineError`] covers the mutating operations of the deduplication engine
//! (ingest, release, purge). [`FileQueryError`] covers the read-only use cases.

use thiserror::Error;

use crate::application::ports::{RepositoryError, StorageError};
use crate::domain::errors::DomainError;

/// Errors from ingest, release and purge
#[derive(Debug, Error)]
pub enum EngineError {
    /// Rejected before any state was touched
    #[error("Validation failed: {0}")]
    Validation(#[from] DomainError),

    #[error("File not found: {0}")]
    NotFound(String),

    /// Contention did not clear within the retry budget; the caller may resubmit
    #[error("Transaction failed after {attempts} attempts: {message}")]
    Transient { attempts: u32, message: String },

    #[error("Storage backend error: {0}")]
    StorageBackend(#[from] StorageError),

    #[error("Repository error: {0}")]
    Repository(#[from] RepositoryError),
}

impl EngineError {
    pub fn is_retryable(&self) -> bool {
        matches!(self, EngineError::Transient { .. })
    }
}

/// Errors from list, get, download and stats
#[derive(Debug, Error)]
pub enum FileQueryError {
    #[error("Invalid request: {0}")]
    InvalidRequest(String),

    #[error("File not found: {0}")]
    NotFound(String),

    #[error("Repository error: {0}")]
    Repository(#[from] RepositoryError),

    #[error("Storage error: {0}")]
    Storage(#[from] StorageError),
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_engine_error_from_domain_error() {
        let err: EngineError = DomainError::SizeExceedsMaximum { size: 2, max: 1 }.into();
        assert!(matches!(err, EngineError::Validation(_)));
        assert!(err.to_string().contains("Validation failed"));
    }

    #[test]
    fn test_engine_error_from_storage_error() {
        let err: EngineError = StorageError::Internal("disk full".to_string()).into();
        assert!(matches!(err, EngineError::StorageBackend(_)));
        assert!(err.to_string().contains("disk full"));
    }

    #[test]
    fn test_transient_is_retryable() {
        let err = EngineError::Transient {
            attempts: 5,
            message: "could not serialize access".to_string(),
        };
        assert!(err.is_retryable());
        assert!(err.to_string().contains("5 attempts"));
        assert!(!EngineError::NotFound("x".to_string()).is_retryable());
    }

    #[test]
    fn test_file_query_error_from_repository_error() {
        let err: FileQueryError = RepositoryError::NotFound("test".to_string()).into();
        assert!(matches!(err, FileQueryError::Repository(_)));
        assert!(err.to_string().contains("Repository error"));
    }
}
