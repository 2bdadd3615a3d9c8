use serde::{Deserialize, Serialize};

use crate::domain::errors::DomainError;

/// Backend-relative address of stored bytes, e.g. `uploads/3f/3f0c…e1.pdf`
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct StorageLocator(String);

impl StorageLocator {
    /// Locators are relative paths made of plain segments; anything that could
    /// escape the storage root is rejected.
    pub fn new(value: impl Into<String>) -> Result<Self, DomainError> {
        let value = value.into();
        if value.is_empty() {
            return Err(DomainError::InvalidLocator("empty locator".to_string()));
        }
        if value.starts_with('/') || value.contains('\\') || value.contains('\0') {
            return Err(DomainError::InvalidLocator(value));
        }
        if value
            .split('/')
            .any(|segment| segment.is_empty() || segment == "." || segment == "..")
        {
            return Err(DomainError::InvalidLocator(value));
        }
        Ok(Self(value))
    }

    /// Wrap a locator generated by a storage backend
    pub(crate) fn from_trusted(value: String) -> Self {
        debug_assert!(Self::new(value.clone()).is_ok(), "malformed locator {value}");
        Self(value)
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl std::fmt::Display for StorageLocator {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(&self.0)
    }
}
