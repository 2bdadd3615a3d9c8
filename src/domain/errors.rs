use thiserror::Error;

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum DomainError {
    #[error("File size exceeds maximum allowed: {size} > {max}")]
    SizeExceedsMaximum { size: u64, max: u64 },

    #[error("Declared size {declared} does not match received content length {actual}")]
    SizeMismatch { declared: u64, actual: u64 },

    #[error("Invalid file name: {0}")]
    InvalidLabel(String),

    #[error("Invalid file type '{extension}'. Allowed types are: {allowed}")]
    ExtensionNotAllowed { extension: String, allowed: String },

    #[error("Invalid content type: {0}")]
    InvalidContentType(String),

    #[error("Content hash mismatch: expected {expected}, got {actual}")]
    ContentHashMismatch { expected: String, actual: String },

    #[error("Invalid storage locator: {0}")]
    InvalidLocator(String),

    #[error("Counter {counter} would become negative")]
    CounterUnderflow { counter: &'static str },
}

impl DomainError {
    /// True for errors caused by the uploaded file itself
    pub fn is_validation(&self) -> bool {
        matches!(
            self,
            DomainError::SizeExceedsMaximum { .. }
                | DomainError::SizeMismatch { .. }
                | DomainError::InvalidLabel(_)
                | DomainError::ExtensionNotAllowed { .. }
                | DomainError::InvalidContentType(_)
        )
    }
}
