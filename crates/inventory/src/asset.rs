use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use stockroom_core::{AssetId, Entity, Timestamps};

/// An uploaded file waiting to be stored.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AssetUpload {
    pub file_name: String,
    pub content_type: String,
    pub bytes: Vec<u8>,
}

/// Entity: a stored file attached to any other entity via `(entity_id, entity_name)`.
///
/// An asset is usually stored before its owner is durable, so it is the thing
/// that gets cleaned up when the owner's persistence fails.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Asset {
    pub id: AssetId,
    pub entity_id: Uuid,
    pub entity_name: String,
    pub file_name: String,
    pub content_type: String,
    /// Location of the stored bytes, relative to the storage root.
    pub path: String,
    pub size: u64,
    pub timestamps: Timestamps,
}

impl Asset {
    pub fn new(
        entity_id: impl Into<Uuid>,
        entity_name: impl Into<String>,
        upload: &AssetUpload,
        now: DateTime<Utc>,
    ) -> Self {
        let id = AssetId::new();
        let entity_name = entity_name.into();
        Self {
            id,
            entity_id: entity_id.into(),
            path: format!("{entity_name}/{id}/{}", upload.file_name),
            entity_name,
            file_name: upload.file_name.clone(),
            content_type: upload.content_type.clone(),
            size: upload.bytes.len() as u64,
            timestamps: Timestamps::at(now),
        }
    }

    pub fn belongs_to(&self, entity_id: impl Into<Uuid>, entity_name: &str) -> bool {
        self.entity_id == entity_id.into() && self.entity_name == entity_name
    }
}

impl Entity for Asset {
    type Id = AssetId;

    fn id(&self) -> &Self::Id {
        &self.id
    }
}
