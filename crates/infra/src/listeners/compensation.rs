use std::sync::Arc;

use async_trait::async_trait;
use tracing::{debug, info};

use stockroom_events::{Event, EventHandler, HandlerError};
use stockroom_inventory::{InventoryEvent, InventoryEventShape, ItemCreationStage};
use stockroom_observability::{FailureSink, HandlerFailure};

use crate::assets::{AssetError, AssetManager};

/// Deletes the asset stored for an item whose creation failed at `stage`.
///
/// One instance is registered per failure stage.
pub struct AssetRollbackListener {
    stage: ItemCreationStage,
    assets: Arc<dyn AssetManager>,
    sink: Arc<dyn FailureSink>,
}

impl AssetRollbackListener {
    pub fn new(stage: ItemCreationStage, assets: Arc<dyn AssetManager>, sink: Arc<dyn FailureSink>) -> Self {
        Self { stage, assets, sink }
    }

    pub fn after_item_row(assets: Arc<dyn AssetManager>, sink: Arc<dyn FailureSink>) -> Self {
        Self::new(ItemCreationStage::ItemRow, assets, sink)
    }

    pub fn after_keywords(assets: Arc<dyn AssetManager>, sink: Arc<dyn FailureSink>) -> Self {
        Self::new(ItemCreationStage::Keywords, assets, sink)
    }

    /// The event shape this listener must be subscribed to.
    pub fn shape(&self) -> InventoryEventShape {
        InventoryEventShape::for_stage(self.stage)
    }
}

#[async_trait]
impl EventHandler<InventoryEvent> for AssetRollbackListener {
    fn name(&self) -> &'static str {
        match self.stage {
            ItemCreationStage::ItemRow => "asset_rollback.item_row",
            ItemCreationStage::Keywords => "asset_rollback.keywords",
        }
    }

    async fn handle(&self, event: InventoryEvent) -> Result<(), HandlerError> {
        let event_type = event.event_type();
        let failed = match event {
            InventoryEvent::ItemCreationFailed(failed) if failed.stage == self.stage => failed,
            other => {
                return Err(HandlerError::new(format!(
                    "{} cannot handle {}",
                    self.name(),
                    other.event_type()
                )));
            }
        };

        let asset = &failed.asset;
        match self.assets.delete(asset).await {
            Ok(()) => {
                info!(asset_id = %asset.id, item_id = %failed.item.id, stage = ?self.stage, "orphaned asset rolled back");
                Ok(())
            }
            Err(AssetError::NotFound(id)) => {
                debug!(asset_id = %id, "asset already gone; nothing to roll back");
                Ok(())
            }
            Err(err) => {
                self.sink
                    .record(HandlerFailure::new(self.name(), event_type, asset.id, &err));
                Err(HandlerError::new(err.to_string()))
            }
        }
    }
}
