use std::path::{Path, PathBuf};
use uuid::Uuid;

use crate::domain::value_objects::StorageLocator;

/// Directory under the root holding stored blobs
pub const UPLOADS_DIR: &str = "uploads";
/// Directory under the root holding in-flight writes
pub const TEMP_DIR: &str = "temp";

/// Utility for generating storage paths
#[derive(Debug, Clone)]
pub struct PathBuilder {
    root: PathBuf,
}

impl PathBuilder {
    pub fn new(root: PathBuf) -> Self {
        Self { root }
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    pub fn uploads_root(&self) -> PathBuf {
        self.root.join(UPLOADS_DIR)
    }

    pub fn temp_root(&self) -> PathBuf {
        self.root.join(TEMP_DIR)
    }

    /// Generate temp upload path: /root/temp/{uuid}
    pub fn temp_path(&self, id: Uuid) -> PathBuf {
        self.temp_root().join(id.to_string())
    }

    /// Generate a fresh locator: uploads/{prefix}/{uuid}[.ext]
    ///
    /// The first two hex characters of the id shard blobs across 256
    /// directories.
    pub fn new_locator(&self, id: Uuid, extension: Option<&str>) -> StorageLocator {
        let name = id.simple().to_string();
        let file_name = match extension.map(sanitize_extension) {
            Some(ext) if !ext.is_empty() => format!("{}.{}", name, ext),
            _ => name.clone(),
        };
        // Every segment is built from hex digits and ascii alphanumerics
        StorageLocator::from_trusted(format!("{}/{}/{}", UPLOADS_DIR, &name[0..2], file_name))
    }

    /// Absolute path of a locator
    pub fn resolve(&self, locator: &StorageLocator) -> PathBuf {
        locator
            .as_str()
            .split('/')
            .fold(self.root.clone(), |path, segment| path.join(segment))
    }

    /// Map an absolute path under the root back to its locator
    pub fn locator_for(&self, path: &Path) -> Option<StorageLocator> {
        let relative = path.strip_prefix(&self.root).ok()?;
        let segments: Vec<&str> = relative
            .components()
            .map(|c| c.as_os_str().to_str())
            .collect::<Option<_>>()?;
        StorageLocator::new(segments.join("/")).ok()
    }
}

fn sanitize_extension(ext: &str) -> String {
    ext.chars()
        .filter(|c| c.is_ascii_alphanumeric())
        .take(16)
        .collect::<String>()
        .to_ascii_lowercase()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_new_locator_layout() {
        let builder = PathBuilder::new(PathBuf::from("/data"));
        let id = Uuid::new_v4();
        let locator = builder.new_locator(id, Some("PDF"));
        let name = id.simple().to_string();

        assert_eq!(
            locator.as_str(),
            format!("uploads/{}/{}.pdf", &name[0..2], name)
        );
    }

    #[test]
    fn test_new_locator_strips_unsafe_extension() {
        let builder = PathBuilder::new(PathBuf::from("/data"));
        let locator = builder.new_locator(Uuid::new_v4(), Some("../../x"));
        assert!(locator.as_str().ends_with(".x"));

        let locator = builder.new_locator(Uuid::new_v4(), Some("..."));
        assert!(!locator.as_str().contains('.'));
    }

    #[test]
    fn test_resolve_and_back() {
        let builder = PathBuilder::new(PathBuf::from("/data"));
        let locator = builder.new_locator(Uuid::new_v4(), None);
        let path = builder.resolve(&locator);

        assert!(path.starts_with("/data/uploads"));
        assert_eq!(builder.locator_for(&path), Some(locator));
    }

    #[test]
    fn test_locator_for_outside_root() {
        let builder = PathBuilder::new(PathBuf::from("/data"));
        assert!(builder.locator_for(Path::new("/elsewhere/x")).is_none());
    }
}
