//! Default upload validator
//!
//! Checks the declared name, extension and content type of an upload against
//! the configured policy. Size limits are enforced by the engine itself.

use crate::application::ports::{UploadDescriptor, UploadValidator};
use crate::domain::errors::DomainError;
use crate::domain::validation::Validation;

/// Extensions accepted when none are configured
pub const DEFAULT_ALLOWED_EXTENSIONS: [&str; 4] = ["pdf", "png", "jpg", "jpeg"];

/// Name / extension / content type policy for uploads
#[derive(Debug, Clone)]
pub struct UploadPolicy {
    allowed_extensions: Vec<String>,
}

impl UploadPolicy {
    pub fn new(allowed_extensions: Vec<String>) -> Self {
        Self {
            allowed_extensions: allowed_extensions
                .into_iter()
                .map(|ext| ext.trim().trim_start_matches('.').to_ascii_lowercase())
                .filter(|ext| !ext.is_empty())
                .collect(),
        }
    }

    pub fn allowed_extensions(&self) -> &[String] {
        &self.allowed_extensions
    }
}

impl Default for UploadPolicy {
    fn default() -> Self {
        Self::new(
            DEFAULT_ALLOWED_EXTENSIONS
                .iter()
                .map(|s| s.to_string())
                .collect(),
        )
    }
}

impl UploadValidator for UploadPolicy {
    fn validate(&self, upload: &UploadDescriptor) -> Result<(), DomainError> {
        Validation::validate_label(&upload.label)?;
        Validation::validate_extension(&upload.label, &self.allowed_extensions)?;
        Validation::validate_content_type(&upload.content_type)?;
        Ok(())
    }
}
