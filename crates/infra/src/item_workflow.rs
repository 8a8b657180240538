//! Item creation: asset upload, item row, keyword rows.
//!
//! The three writes go to different stores and share no transaction. The
//! asset is stored first (it carries the item id), so when a later write
//! fails the workflow publishes `ItemCreationFailed` and the compensating
//! listener deletes the now-orphaned asset in the background. The caller gets
//! the original persistence error either way.

use std::sync::Arc;

use chrono::Utc;
use thiserror::Error;
use tracing::{info, warn};

use stockroom_core::{DomainError, ItemId};
use stockroom_events::EventPublisher;
use stockroom_inventory::{
    Asset, AssetUpload, InventoryEvent, Item, ItemCreationFailed, ItemCreationStage, Keyword, NewItem,
    derive_keywords,
};

use crate::assets::{AssetError, AssetManager};
use crate::repository::{ItemRepository, KeywordRepository, RepositoryError};

/// `entity_name` under which item attachments are stored.
pub const ITEM_ENTITY_NAME: &str = "item";

#[derive(Debug, Error)]
pub enum ItemCreationError {
    #[error(transparent)]
    Validation(#[from] DomainError),

    /// Storing the upload failed; nothing was written, nothing to undo.
    #[error("failed to store asset: {0}")]
    Asset(#[from] AssetError),

    #[error("failed to persist item at stage {stage:?}: {source}")]
    Persistence {
        stage: ItemCreationStage,
        #[source]
        source: RepositoryError,
    },
}

impl ItemCreationError {
    /// The repository error that aborted the workflow, if any.
    pub fn persistence_error(&self) -> Option<&RepositoryError> {
        match self {
            ItemCreationError::Persistence { source, .. } => Some(source),
            _ => None,
        }
    }
}

/// Everything written by a successful creation.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CreatedItem {
    pub item: Item,
    pub asset: Option<Asset>,
    pub keywords: Vec<Keyword>,
}

pub struct ItemCreationWorkflow {
    items: Arc<dyn ItemRepository>,
    keywords: Arc<dyn KeywordRepository>,
    assets: Arc<dyn AssetManager>,
    publisher: Arc<dyn EventPublisher<InventoryEvent>>,
}

impl ItemCreationWorkflow {
    pub fn new(
        items: Arc<dyn ItemRepository>,
        keywords: Arc<dyn KeywordRepository>,
        assets: Arc<dyn AssetManager>,
        publisher: Arc<dyn EventPublisher<InventoryEvent>>,
    ) -> Self {
        Self {
            items,
            keywords,
            assets,
            publisher,
        }
    }

    pub async fn create(&self, input: NewItem, upload: Option<AssetUpload>) -> Result<CreatedItem, ItemCreationError> {
        let item = Item::create(ItemId::new(), input, Utc::now())?;

        let asset = match upload {
            Some(upload) => Some(self.assets.store(item.id.into(), ITEM_ENTITY_NAME, upload).await?),
            None => None,
        };

        if let Err(err) = self.items.create(&item).await {
            return Err(self.abort(ItemCreationStage::ItemRow, item, asset, err));
        }

        let keywords = derive_keywords(&item);
        if !keywords.is_empty() {
            if let Err(err) = self.keywords.create_many(&keywords).await {
                return Err(self.abort(ItemCreationStage::Keywords, item, asset, err));
            }
        }

        info!(
            item_id = %item.id,
            sku = %item.sku,
            asset_id = ?asset.as_ref().map(|a| a.id),
            keywords = keywords.len(),
            "item created"
        );
        Ok(CreatedItem {
            item,
            asset,
            keywords,
        })
    }

    fn abort(
        &self,
        stage: ItemCreationStage,
        item: Item,
        asset: Option<Asset>,
        source: RepositoryError,
    ) -> ItemCreationError {
        warn!(item_id = %item.id, ?stage, error = %source, "item creation failed");

        if let Some(asset) = asset {
            self.publisher.publish(InventoryEvent::ItemCreationFailed(ItemCreationFailed {
                stage,
                item,
                asset,
                occurred_at: Utc::now(),
            }));
        }

        ItemCreationError::Persistence { stage, source }
    }
}

impl core::fmt::Debug for ItemCreationWorkflow {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        f.debug_struct("ItemCreationWorkflow").finish_non_exhaustive()
    }
}

#[cfg(test)]
mod tests {
    use std::sync::Mutex;

    use stockroom_events::{Event, PublishOutcome};
    use stockroom_inventory::InventoryEventShape;

    use super::*;
    use crate::assets::InMemoryAssetManager;
    use crate::repository::{InMemoryItemRepository, InMemoryKeywordRepository};

    #[derive(Default)]
    struct RecordingPublisher {
        events: Mutex<Vec<InventoryEvent>>,
    }

    impl EventPublisher<InventoryEvent> for RecordingPublisher {
        fn publish(&self, event: InventoryEvent) -> PublishOutcome<InventoryEventShape> {
            let shape = event.shape();
            self.events.lock().unwrap().push(event);
            PublishOutcome::new(shape, 0)
        }
    }

    struct Fixture {
        workflow: ItemCreationWorkflow,
        items: Arc<InMemoryItemRepository>,
        keywords: Arc<InMemoryKeywordRepository>,
        assets: Arc<InMemoryAssetManager>,
        published: Arc<RecordingPublisher>,
    }

    fn fixture() -> Fixture {
        let items = Arc::new(InMemoryItemRepository::new());
        let keywords = Arc::new(InMemoryKeywordRepository::new());
        let assets = Arc::new(InMemoryAssetManager::new());
        let published = Arc::new(RecordingPublisher::default());
        let workflow = ItemCreationWorkflow::new(
            items.clone(),
            keywords.clone(),
            assets.clone(),
            published.clone(),
        );
        Fixture {
            workflow,
            items,
            keywords,
            assets,
            published,
        }
    }

    fn input() -> NewItem {
        NewItem {
            sku: "CB-2".to_string(),
            name: "Cable tie".to_string(),
            unit: "pcs".to_string(),
            description: Some("black nylon".to_string()),
        }
    }

    fn upload() -> AssetUpload {
        AssetUpload {
            file_name: "tie.png".to_string(),
            content_type: "image/png".to_string(),
            bytes: vec![7; 16],
        }
    }

    #[tokio::test]
    async fn happy_path_writes_everything_and_publishes_nothing() {
        let f = fixture();

        let created = f.workflow.create(input(), Some(upload())).await.unwrap();

        let asset = created.asset.clone().unwrap();
        assert!(asset.belongs_to(created.item.id, ITEM_ENTITY_NAME));
        assert!(f.assets.contains(asset.id));
        assert_eq!(f.items.len(), 1);
        assert_eq!(
            f.keywords.list_for_item(created.item.id).await.unwrap(),
            created.keywords
        );
        assert!(f.published.events.lock().unwrap().is_empty());
    }

    #[tokio::test]
    async fn item_row_failure_publishes_rollback_and_returns_original_error() {
        let f = fixture();
        f.items.faults().arm();

        let err = f.workflow.create(input(), Some(upload())).await.unwrap_err();

        assert!(matches!(
            err,
            ItemCreationError::Persistence { stage: ItemCreationStage::ItemRow, .. }
        ));
        assert!(matches!(err.persistence_error(), Some(RepositoryError::Persistence(msg)) if msg.contains("item create")));

        let events = f.published.events.lock().unwrap().clone();
        assert_eq!(events.len(), 1);
        assert_eq!(events[0].shape(), InventoryEventShape::ItemRowInsertFailed);
        // Rollback is the listener's job; the workflow leaves the asset in place.
        assert_eq!(f.assets.len(), 1);
    }

    #[tokio::test]
    async fn keyword_failure_publishes_keyword_stage() {
        let f = fixture();
        f.keywords.faults().arm();

        let err = f.workflow.create(input(), Some(upload())).await.unwrap_err();

        assert!(matches!(
            err,
            ItemCreationError::Persistence { stage: ItemCreationStage::Keywords, .. }
        ));
        let events = f.published.events.lock().unwrap().clone();
        assert_eq!(events.len(), 1);
        assert_eq!(events[0].shape(), InventoryEventShape::KeywordInsertFailed);
        match &events[0] {
            InventoryEvent::ItemCreationFailed(failed) => assert_eq!(failed.item.sku, "CB-2"),
            other => panic!("unexpected event {other:?}"),
        }
    }

    #[tokio::test]
    async fn asset_failure_aborts_before_any_row() {
        let f = fixture();
        f.assets.store_faults().arm();

        let err = f.workflow.create(input(), Some(upload())).await.unwrap_err();

        assert!(matches!(err, ItemCreationError::Asset(AssetError::Storage(_))));
        assert!(f.items.is_empty());
        assert!(f.published.events.lock().unwrap().is_empty());
    }

    #[tokio::test]
    async fn invalid_input_stores_nothing() {
        let f = fixture();
        let mut bad = input();
        bad.name = "   ".to_string();

        let err = f.workflow.create(bad, Some(upload())).await.unwrap_err();

        assert!(matches!(err, ItemCreationError::Validation(DomainError::Validation(_))));
        assert!(f.assets.is_empty());
    }

    #[tokio::test]
    async fn failure_without_upload_has_nothing_to_compensate() {
        let f = fixture();
        f.items.faults().arm();

        let err = f.workflow.create(input(), None).await.unwrap_err();

        assert!(err.persistence_error().is_some());
        assert!(f.published.events.lock().unwrap().is_empty());
    }
}
