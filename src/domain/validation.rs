//! Validation rules for uploaded file descriptors
//!
//! These are pure functions over the name, content type and size an uploader
//! declares. They run before any hashing or persistence happens.

use crate::domain::errors::DomainError;
use once_cell::sync::Lazy;
use regex::Regex;

/// Maximum length of a display name, in characters
pub const MAX_LABEL_LENGTH: usize = 255;

/// Maximum length of a declared content type
pub const MAX_CONTENT_TYPE_LENGTH: usize = 100;

/// `type/subtype` with optional parameters, e.g. `text/plain; charset=utf-8`.
/// Parameters are limited to visible ASCII and spaces so the value is always
/// a valid header.
static CONTENT_TYPE_REGEX: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"^[A-Za-z0-9][A-Za-z0-9!#$&^_.+-]*/[A-Za-z0-9][A-Za-z0-9!#$&^_.+-]*( *;[ -~]*)?$")
        .expect("Invalid content type regex")
});

/// Validation result type
pub type ValidationResult<T> = Result<T, DomainError>;

/// File descriptor validation utilities
pub struct Validation;

impl Validation {
    /// Reject sizes above `max`; a size equal to `max` is accepted
    pub fn validate_size(size: u64, max: u64) -> ValidationResult<()> {
        if size > max {
            return Err(DomainError::SizeExceedsMaximum { size, max });
        }
        Ok(())
    }

    /// Display names must be non-empty, bounded and free of path separators
    /// and control characters
    pub fn validate_label(label: &str) -> ValidationResult<()> {
        if label.trim().is_empty() {
            return Err(DomainError::InvalidLabel("File name cannot be empty".to_string()));
        }

        if label.chars().count() > MAX_LABEL_LENGTH {
            return Err(DomainError::InvalidLabel(format!(
                "File name is too long. Maximum length is {} characters.",
                MAX_LABEL_LENGTH
            )));
        }

        if label.chars().any(|c| c.is_control() || c == '/' || c == '\\') {
            return Err(DomainError::InvalidLabel(
                "File name contains forbidden characters".to_string(),
            ));
        }

        Ok(())
    }

    /// Lowercased text after the last `.`, if any
    pub fn extension_of(label: &str) -> Option<String> {
        label
            .rsplit_once('.')
            .map(|(_, ext)| ext.to_ascii_lowercase())
            .filter(|ext| !ext.is_empty())
    }

    /// The label's extension must appear in `allowed` (case-insensitive)
    pub fn validate_extension(label: &str, allowed: &[String]) -> ValidationResult<String> {
        let allowed_list = allowed.join(", ");
        let extension = Self::extension_of(label).ok_or_else(|| {
            DomainError::ExtensionNotAllowed {
                extension: String::new(),
                allowed: allowed_list.clone(),
            }
        })?;

        if allowed.iter().any(|a| a.eq_ignore_ascii_case(&extension)) {
            Ok(extension)
        } else {
            Err(DomainError::ExtensionNotAllowed {
                extension,
                allowed: allowed_list,
            })
        }
    }

    pub fn validate_content_type(content_type: &str) -> ValidationResult<()> {
        if content_type.len() > MAX_CONTENT_TYPE_LENGTH {
            return Err(DomainError::InvalidContentType(format!(
                "Content type must be at most {} characters",
                MAX_CONTENT_TYPE_LENGTH
            )));
        }

        if !CONTENT_TYPE_REGEX.is_match(content_type) {
            return Err(DomainError::InvalidContentType(content_type.to_string()));
        }

        Ok(())
    }
}
