//! Asset (file attachment) management boundary.

use std::collections::HashMap;
use std::sync::RwLock;

use async_trait::async_trait;
use chrono::Utc;
use thiserror::Error;
use uuid::Uuid;

use stockroom_core::AssetId;
use stockroom_inventory::{Asset, AssetUpload};

use crate::repository::FaultSwitch;

#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum AssetError {
    /// The asset is unknown or already deleted.
    #[error("asset {0} not found")]
    NotFound(AssetId),

    #[error("asset storage failure: {0}")]
    Storage(String),
}

/// Stores uploaded files together with their asset rows.
#[async_trait]
pub trait AssetManager: Send + Sync {
    /// Store `upload` and attach it to `(entity_id, entity_name)`.
    async fn store(&self, entity_id: Uuid, entity_name: &str, upload: AssetUpload) -> Result<Asset, AssetError>;

    async fn get(&self, id: AssetId) -> Result<Asset, AssetError>;

    /// Delete the stored file and its row.
    ///
    /// Deleting an unknown or already deleted asset returns `AssetError::NotFound`;
    /// callers treat that as nothing left to clean up.
    async fn delete(&self, asset: &Asset) -> Result<(), AssetError>;
}

/// In-memory asset store for tests/dev.
#[derive(Debug, Default)]
pub struct InMemoryAssetManager {
    files: RwLock<HashMap<AssetId, (Asset, Vec<u8>)>>,
    store_faults: FaultSwitch,
    delete_faults: FaultSwitch,
}

impl InMemoryAssetManager {
    pub fn new() -> Self {
        Self::default()
    }

    /// While armed, `store` fails.
    pub fn store_faults(&self) -> &FaultSwitch {
        &self.store_faults
    }

    /// While armed, `delete` fails.
    pub fn delete_faults(&self) -> &FaultSwitch {
        &self.delete_faults
    }

    pub fn contains(&self, id: AssetId) -> bool {
        self.files.read().map(|f| f.contains_key(&id)).unwrap_or(false)
    }

    pub fn len(&self) -> usize {
        self.files.read().map(|f| f.len()).unwrap_or(0)
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

fn poisoned() -> AssetError {
    AssetError::Storage("lock poisoned".to_string())
}

#[async_trait]
impl AssetManager for InMemoryAssetManager {
    async fn store(&self, entity_id: Uuid, entity_name: &str, upload: AssetUpload) -> Result<Asset, AssetError> {
        if self.store_faults.is_armed() {
            return Err(AssetError::Storage("injected failure during asset store".to_string()));
        }

        let asset = Asset::new(entity_id, entity_name, &upload, Utc::now());
        let mut files = self.files.write().map_err(|_| poisoned())?;
        files.insert(asset.id, (asset.clone(), upload.bytes));
        Ok(asset)
    }

    async fn get(&self, id: AssetId) -> Result<Asset, AssetError> {
        let files = self.files.read().map_err(|_| poisoned())?;
        files
            .get(&id)
            .map(|(asset, _)| asset.clone())
            .ok_or(AssetError::NotFound(id))
    }

    async fn delete(&self, asset: &Asset) -> Result<(), AssetError> {
        if self.delete_faults.is_armed() {
            return Err(AssetError::Storage("injected failure during asset delete".to_string()));
        }

        let mut files = self.files.write().map_err(|_| poisoned())?;
        files
            .remove(&asset.id)
            .map(|_| ())
            .ok_or(AssetError::NotFound(asset.id))
    }
}
