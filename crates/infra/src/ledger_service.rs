//! Inventory ledger service: the only writer of per-box balances.
//!
//! Every quantity change follows the same pipeline:
//!
//! ```text
//! validate quantity
//!   ↓
//! load item snapshot
//!   ↓
//! read-modify-write the (box, item) balance under a per-pair lock
//!   ↓
//! publish BoxItemAdded / BoxItemRemoved (only after the write succeeded)
//!   ↓
//! ledger listeners append the BoxTransaction in the background
//! ```
//!
//! Balances are strongly consistent on the request path; the ledger is
//! written asynchronously and best-effort. A failed mutation never publishes.

use std::collections::HashMap;
use std::future::Future;
use std::sync::{Arc, Mutex, PoisonError};

use chrono::Utc;
use thiserror::Error;
use tracing::{debug, info, warn};

use stockroom_core::{BoxId, DomainError, ItemId, Quantity};
use stockroom_events::EventPublisher;
use stockroom_inventory::{
    BoxItem, BoxItemMoved, BoxTransaction, InventoryEvent, Item, Remaining, TransactionKind,
};

use crate::repository::{
    BoxItemRepository, BoxTransactionRepository, ItemRepository, PageFilter, RepositoryError,
};

#[derive(Debug, Error)]
pub enum LedgerError {
    /// Rejected before any state change (bad quantity, insufficient balance, ...).
    #[error(transparent)]
    Domain(#[from] DomainError),

    #[error("item {0} not found")]
    ItemNotFound(ItemId),

    #[error("repository error: {0}")]
    Repository(#[from] RepositoryError),
}

impl LedgerError {
    /// `true` for errors caused by the request itself rather than by storage.
    pub fn is_rejection(&self) -> bool {
        matches!(self, LedgerError::Domain(_) | LedgerError::ItemNotFound(_))
    }
}

/// Rows removed by [`InventoryLedgerService::delete_box_with_history`].
#[derive(Debug, Copy, Clone, PartialEq, Eq)]
pub struct BoxPurge {
    pub box_items: u64,
    pub transactions: u64,
}

/// Serializes read-modify-write cycles per `(box, item)` pair.
#[derive(Debug, Default)]
struct PairLocks {
    inner: Mutex<HashMap<(BoxId, ItemId), Arc<tokio::sync::Mutex<()>>>>,
}

impl PairLocks {
    async fn serialized<T>(&self, key: (BoxId, ItemId), work: impl Future<Output = T>) -> T {
        let slot = PairSlot::claim(self, key);
        let _held = slot.lock.lock().await;
        work.await
    }
}

/// One caller's claim on a pair lock.
///
/// Dropping it (normally or because the caller's future was cancelled while
/// waiting) forgets the map entry once no other caller shares it.
struct PairSlot<'a> {
    locks: &'a PairLocks,
    key: (BoxId, ItemId),
    lock: Arc<tokio::sync::Mutex<()>>,
}

impl<'a> PairSlot<'a> {
    fn claim(locks: &'a PairLocks, key: (BoxId, ItemId)) -> Self {
        let mut map = locks.inner.lock().unwrap_or_else(PoisonError::into_inner);
        let lock = Arc::clone(map.entry(key).or_default());
        Self { locks, key, lock }
    }
}

impl Drop for PairSlot<'_> {
    fn drop(&mut self) {
        let mut map = self.locks.inner.lock().unwrap_or_else(PoisonError::into_inner);
        // The map and this slot are the only holders.
        if map
            .get(&self.key)
            .is_some_and(|l| Arc::ptr_eq(l, &self.lock) && Arc::strong_count(l) == 2)
        {
            map.remove(&self.key);
        }
    }
}

/// Quantity-mutation surface for items stored in boxes.
pub struct InventoryLedgerService {
    items: Arc<dyn ItemRepository>,
    balances: Arc<dyn BoxItemRepository>,
    ledger: Arc<dyn BoxTransactionRepository>,
    publisher: Arc<dyn EventPublisher<InventoryEvent>>,
    locks: PairLocks,
}

impl InventoryLedgerService {
    pub fn new(
        items: Arc<dyn ItemRepository>,
        balances: Arc<dyn BoxItemRepository>,
        ledger: Arc<dyn BoxTransactionRepository>,
        publisher: Arc<dyn EventPublisher<InventoryEvent>>,
    ) -> Self {
        Self {
            items,
            balances,
            ledger,
            publisher,
            locks: PairLocks::default(),
        }
    }

    /// Put `quantity` of an item into a box, opening the balance row if needed.
    ///
    /// Returns the balance row after the change.
    pub async fn add_item(&self, quantity: f64, box_id: BoxId, item_id: ItemId) -> Result<BoxItem, LedgerError> {
        let quantity = Quantity::new(quantity)?;
        let item = self.load_item(item_id).await?;
        self.put(quantity, box_id, item).await
    }

    /// Take `quantity` of an item out of a box.
    ///
    /// Returns the remaining balance row, or `None` when the box no longer
    /// holds the item (the row is deleted rather than kept at zero).
    pub async fn remove_item(
        &self,
        quantity: f64,
        box_id: BoxId,
        item_id: ItemId,
    ) -> Result<Option<BoxItem>, LedgerError> {
        let quantity = Quantity::new(quantity)?;
        let item = self.load_item(item_id).await?;

        let remaining = self
            .locks
            .serialized((box_id, item_id), self.decrement(box_id, item_id, quantity))
            .await?;

        info!(
            %box_id,
            %item_id,
            %quantity,
            balance = remaining.as_ref().map(BoxItem::quantity).unwrap_or(0.0),
            "item removed from box"
        );
        self.publisher.publish(InventoryEvent::BoxItemRemoved(BoxItemMoved {
            quantity,
            box_id,
            item,
            happened_at: Utc::now(),
        }));
        Ok(remaining)
    }

    /// Move the whole balance of an item from one box to another.
    ///
    /// The source balance is taken in one locked step, so movements racing
    /// with the transfer are either fully included or applied afterwards.
    /// Each half publishes its own event. Returns the quantity moved.
    pub async fn transfer_item(&self, from_box: BoxId, to_box: BoxId, item_id: ItemId) -> Result<f64, LedgerError> {
        if from_box == to_box {
            return Err(DomainError::validation("source and destination boxes must differ").into());
        }

        let item = self.load_item(item_id).await?;
        let quantity = self.take_all(from_box, item.clone()).await?;

        if let Err(err) = self.put(quantity, to_box, item.clone()).await {
            warn!(%from_box, %to_box, %item_id, %quantity, error = %err, "transfer destination failed; restoring source");
            if let Err(restore_err) = self.put(quantity, from_box, item).await {
                warn!(%from_box, %item_id, %quantity, error = %restore_err, "failed to restore transfer source");
            }
            return Err(err);
        }

        info!(%from_box, %to_box, %item_id, %quantity, "item transferred");
        Ok(quantity.value())
    }

    /// Append the ledger row for a published movement.
    ///
    /// Called by the ledger listeners, never on the request path.
    pub async fn record_movement(
        &self,
        kind: TransactionKind,
        movement: &BoxItemMoved,
    ) -> Result<BoxTransaction, LedgerError> {
        let tx = BoxTransaction::from_movement(kind, movement, Utc::now());
        self.ledger.create_box_transaction(&tx).await?;
        debug!(transaction_id = %tx.id, box_id = %tx.box_id, kind = %kind, "box transaction recorded");
        Ok(tx)
    }

    /// Current quantity of an item in a box (`None` when the box does not hold it).
    pub async fn balance(&self, box_id: BoxId, item_id: ItemId) -> Result<Option<f64>, LedgerError> {
        Ok(self
            .balances
            .get_box_item(box_id, item_id)
            .await?
            .map(|row| row.quantity()))
    }

    pub async fn box_items(&self, box_id: BoxId) -> Result<Vec<BoxItem>, LedgerError> {
        Ok(self.balances.list_by_box(box_id).await?)
    }

    /// Ledger rows of a box, newest first.
    pub async fn list_transactions(&self, box_id: BoxId, page: PageFilter) -> Result<Vec<BoxTransaction>, LedgerError> {
        Ok(self.ledger.list_by_box(box_id, page).await?)
    }

    pub async fn count_transactions(&self, box_id: BoxId) -> Result<u64, LedgerError> {
        Ok(self.ledger.count_by_box(box_id).await?)
    }

    /// Remove a deleted box's balances and ledger.
    ///
    /// This is the only path that removes ledger rows; it publishes nothing.
    pub async fn delete_box_with_history(&self, box_id: BoxId) -> Result<BoxPurge, LedgerError> {
        let box_items = self.balances.delete_by_box(box_id).await?;
        let transactions = self.ledger.delete_by_box(box_id).await?;
        info!(%box_id, box_items, transactions, "box contents and history deleted");
        Ok(BoxPurge {
            box_items,
            transactions,
        })
    }

    async fn load_item(&self, item_id: ItemId) -> Result<Item, LedgerError> {
        match self.items.get_by_id(item_id).await {
            Ok(item) => Ok(item),
            Err(RepositoryError::NotFound(_)) => Err(LedgerError::ItemNotFound(item_id)),
            Err(err) => Err(err.into()),
        }
    }

    async fn put(&self, quantity: Quantity, box_id: BoxId, item: Item) -> Result<BoxItem, LedgerError> {
        let item_id = item.id;
        let row = self
            .locks
            .serialized((box_id, item_id), self.increment(box_id, item_id, quantity))
            .await?;

        info!(%box_id, %item_id, %quantity, balance = row.quantity(), "item added to box");
        self.publisher.publish(InventoryEvent::BoxItemAdded(BoxItemMoved {
            quantity,
            box_id,
            item,
            happened_at: Utc::now(),
        }));
        Ok(row)
    }

    /// Empty the `(box, item)` balance in one locked step and publish the removal.
    async fn take_all(&self, box_id: BoxId, item: Item) -> Result<Quantity, LedgerError> {
        let item_id = item.id;
        let quantity = self
            .locks
            .serialized((box_id, item_id), async {
                let Some(row) = self.balances.get_box_item(box_id, item_id).await? else {
                    return Err(LedgerError::from(DomainError::insufficient(0.0, 0.0)));
                };
                self.balances.delete_box_item(row.id).await?;
                Ok(row.held())
            })
            .await?;

        info!(%box_id, %item_id, %quantity, balance = 0.0, "item removed from box");
        self.publisher.publish(InventoryEvent::BoxItemRemoved(BoxItemMoved {
            quantity,
            box_id,
            item,
            happened_at: Utc::now(),
        }));
        Ok(quantity)
    }

    async fn increment(&self, box_id: BoxId, item_id: ItemId, quantity: Quantity) -> Result<BoxItem, LedgerError> {
        let now = Utc::now();
        match self.balances.get_box_item(box_id, item_id).await? {
            Some(mut row) => {
                row.add(quantity, now)?;
                self.balances.update_box_item(&row).await?;
                Ok(row)
            }
            None => {
                let row = BoxItem::open(box_id, item_id, quantity, now);
                self.balances.create_box_item(&row).await?;
                Ok(row)
            }
        }
    }

    async fn decrement(
        &self,
        box_id: BoxId,
        item_id: ItemId,
        quantity: Quantity,
    ) -> Result<Option<BoxItem>, LedgerError> {
        let Some(row) = self.balances.get_box_item(box_id, item_id).await? else {
            return Err(DomainError::insufficient(quantity.value(), 0.0).into());
        };

        let row_id = row.id;
        match row.remove(quantity, Utc::now())? {
            Remaining::Empty => {
                self.balances.delete_box_item(row_id).await?;
                Ok(None)
            }
            Remaining::Left(row) => {
                self.balances.update_box_item(&row).await?;
                Ok(Some(row))
            }
        }
    }
}

impl core::fmt::Debug for InventoryLedgerService {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        f.debug_struct("InventoryLedgerService").finish_non_exhaustive()
    }
}
