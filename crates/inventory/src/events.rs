//! Inventory domain events.
//!
//! Events are immutable snapshots: they own copies of the entities they
//! mention, so later changes to those entities never leak into a payload
//! that has already been published.

use chrono::{DateTime, Utc};

use stockroom_core::{BoxId, Quantity};
use stockroom_events::Event;

use crate::asset::Asset;
use crate::item::Item;

/// Step of the item-creation workflow that failed after the asset was stored.
#[derive(Debug, Copy, Clone, PartialEq, Eq, Hash)]
pub enum ItemCreationStage {
    /// Inserting the item row failed.
    ItemRow,
    /// The item row was inserted but inserting its keyword rows failed.
    Keywords,
}

/// Event: ItemCreationFailed (the stored asset must be rolled back).
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ItemCreationFailed {
    pub stage: ItemCreationStage,
    pub item: Item,
    pub asset: Asset,
    pub occurred_at: DateTime<Utc>,
}

/// Event payload shared by BoxItemAdded and BoxItemRemoved.
#[derive(Debug, Clone, PartialEq)]
pub struct BoxItemMoved {
    pub quantity: Quantity,
    pub box_id: BoxId,
    pub item: Item,
    /// Business time of the movement, distinct from any row's creation time.
    pub happened_at: DateTime<Utc>,
}

#[derive(Debug, Clone, PartialEq)]
pub enum InventoryEvent {
    ItemCreationFailed(ItemCreationFailed),
    BoxItemAdded(BoxItemMoved),
    BoxItemRemoved(BoxItemMoved),
}

/// Routing key for [`InventoryEvent`]s.
///
/// The two creation-failure stages are separate shapes so each stage gets its
/// own subscribers.
#[derive(Debug, Copy, Clone, PartialEq, Eq, Hash)]
pub enum InventoryEventShape {
    ItemRowInsertFailed,
    KeywordInsertFailed,
    BoxItemAdded,
    BoxItemRemoved,
}

impl InventoryEventShape {
    pub const ALL: [InventoryEventShape; 4] = [
        InventoryEventShape::ItemRowInsertFailed,
        InventoryEventShape::KeywordInsertFailed,
        InventoryEventShape::BoxItemAdded,
        InventoryEventShape::BoxItemRemoved,
    ];

    pub fn for_stage(stage: ItemCreationStage) -> Self {
        match stage {
            ItemCreationStage::ItemRow => InventoryEventShape::ItemRowInsertFailed,
            ItemCreationStage::Keywords => InventoryEventShape::KeywordInsertFailed,
        }
    }
}

impl Event for InventoryEvent {
    type Shape = InventoryEventShape;

    fn shape(&self) -> InventoryEventShape {
        match self {
            InventoryEvent::ItemCreationFailed(e) => InventoryEventShape::for_stage(e.stage),
            InventoryEvent::BoxItemAdded(_) => InventoryEventShape::BoxItemAdded,
            InventoryEvent::BoxItemRemoved(_) => InventoryEventShape::BoxItemRemoved,
        }
    }

    fn event_type(&self) -> &'static str {
        match self.shape() {
            InventoryEventShape::ItemRowInsertFailed => "inventory.item.creation_failed.item_row",
            InventoryEventShape::KeywordInsertFailed => "inventory.item.creation_failed.keywords",
            InventoryEventShape::BoxItemAdded => "inventory.box_item.added",
            InventoryEventShape::BoxItemRemoved => "inventory.box_item.removed",
        }
    }

    fn occurred_at(&self) -> DateTime<Utc> {
        match self {
            InventoryEvent::ItemCreationFailed(e) => e.occurred_at,
            InventoryEvent::BoxItemAdded(e) | InventoryEvent::BoxItemRemoved(e) => e.happened_at,
        }
    }
}
