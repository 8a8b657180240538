//! Per-box balances (current state) and the box ledger (history).

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use stockroom_core::{
    BoxId, BoxItemId, DomainError, DomainResult, Entity, ItemId, Quantity, Timestamps, TransactionId,
};

use crate::events::BoxItemMoved;
use crate::item::ItemSnapshot;

/// Current quantity of one item in one box.
///
/// A row only exists while the quantity is strictly positive: a removal that
/// empties the box yields [`Remaining::Empty`] and the row must be deleted.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct BoxItem {
    pub id: BoxItemId,
    pub box_id: BoxId,
    pub item_id: ItemId,
    quantity: Quantity,
    pub timestamps: Timestamps,
}

/// What is left after a removal.
#[derive(Debug, Clone, PartialEq)]
pub enum Remaining {
    /// The box no longer holds the item.
    Empty,
    /// The updated row to persist.
    Left(BoxItem),
}

impl BoxItem {
    pub fn open(box_id: BoxId, item_id: ItemId, quantity: Quantity, now: DateTime<Utc>) -> Self {
        Self {
            id: BoxItemId::new(),
            box_id,
            item_id,
            quantity,
            timestamps: Timestamps::at(now),
        }
    }

    pub fn quantity(&self) -> f64 {
        self.quantity.value()
    }

    /// The exact balance held by this row.
    pub fn held(&self) -> Quantity {
        self.quantity
    }

    /// Put `quantity` into the box. Fails without touching the row on overflow.
    pub fn add(&mut self, quantity: Quantity, now: DateTime<Utc>) -> DomainResult<()> {
        self.quantity = self.quantity.checked_add(quantity)?;
        self.timestamps.touch(now);
        Ok(())
    }

    /// Take `quantity` out of the box.
    ///
    /// Fails without touching the row when the box holds less than requested.
    pub fn remove(mut self, quantity: Quantity, now: DateTime<Utc>) -> DomainResult<Remaining> {
        if quantity > self.quantity {
            return Err(DomainError::insufficient(quantity.value(), self.quantity.value()));
        }

        match self.quantity.checked_sub(quantity) {
            None => Ok(Remaining::Empty),
            Some(left) => {
                self.quantity = left;
                self.timestamps.touch(now);
                Ok(Remaining::Left(self))
            }
        }
    }
}

impl Entity for BoxItem {
    type Id = BoxItemId;

    fn id(&self) -> &Self::Id {
        &self.id
    }
}

/// Direction of a ledger movement.
#[derive(Debug, Copy, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TransactionKind {
    Add,
    Remove,
}

impl TransactionKind {
    pub fn as_str(self) -> &'static str {
        match self {
            TransactionKind::Add => "add",
            TransactionKind::Remove => "remove",
        }
    }
}

impl core::fmt::Display for TransactionKind {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Append-only ledger row describing one movement in or out of a box.
///
/// Item fields are copied at movement time so history stays readable after
/// the item is renamed.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct BoxTransaction {
    pub id: TransactionId,
    pub kind: TransactionKind,
    pub quantity: Quantity,
    pub box_id: BoxId,
    pub item: ItemSnapshot,
    /// Business time of the movement.
    pub happened_at: DateTime<Utc>,
    pub timestamps: Timestamps,
}

impl BoxTransaction {
    pub fn from_movement(kind: TransactionKind, movement: &BoxItemMoved, now: DateTime<Utc>) -> Self {
        Self {
            id: TransactionId::new(),
            kind,
            quantity: movement.quantity,
            box_id: movement.box_id,
            item: movement.item.snapshot(),
            happened_at: movement.happened_at,
            timestamps: Timestamps::at(now),
        }
    }

    pub fn item_id(&self) -> ItemId {
        self.item.item_id
    }
}

impl Entity for BoxTransaction {
    type Id = TransactionId;

    fn id(&self) -> &Self::Id {
        &self.id
    }
}
