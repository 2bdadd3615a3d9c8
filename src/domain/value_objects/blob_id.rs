use serde::{Deserialize, Serialize};
use utoipa::ToSchema;
use uuid::Uuid;

/// Unique identifier for a blob record
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, ToSchema)]
#[schema(value_type = String)]
pub struct BlobId(Uuid);

impl BlobId {
    pub fn new() -> Self {
        Self(Uuid::new_v4())
    }

    pub fn from_uuid(uuid: Uuid) -> Self {
        Self(uuid)
    }

    pub fn as_uuid(&self) -> &Uuid {
        &self.0
    }
}

impl Default for BlobId {
    fn default() -> Self {
        Self::new()
    }
}

impl std::fmt::Display for BlobId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl std::str::FromStr for BlobId {
    type Err = uuid::Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Ok(Self(Uuid::parse_str(s)?))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_blob_id_new_creates_unique_ids() {
        assert_ne!(BlobId::new(), BlobId::new());
    }

    #[test]
    fn test_blob_id_display_and_parse() {
        let uuid_str = "550e8400-e29b-41d4-a716-446655440000";
        let blob_id: BlobId = uuid_str.parse().unwrap();
        assert_eq!(blob_id.to_string(), uuid_str);
        assert_eq!(*blob_id.as_uuid(), Uuid::parse_str(uuid_str).unwrap());
    }

    #[test]
    fn test_blob_id_from_str_invalid() {
        assert!("not-a-uuid".parse::<BlobId>().is_err());
    }
}
