use std::collections::HashMap;
use std::sync::RwLock;
use std::sync::atomic::{AtomicBool, Ordering};

use async_trait::async_trait;

use stockroom_core::{BoxId, BoxItemId, ItemId};
use stockroom_inventory::{BoxItem, BoxTransaction, Item, Keyword};

use super::{
    BoxItemRepository, BoxTransactionRepository, ItemRepository, KeywordRepository, PageFilter,
    RepositoryError,
};

fn poisoned() -> RepositoryError {
    RepositoryError::persistence("lock poisoned")
}

/// Test hook: while armed, every operation of the owning store fails with
/// `RepositoryError::Persistence`.
#[derive(Debug, Default)]
pub struct FaultSwitch {
    armed: AtomicBool,
}

impl FaultSwitch {
    pub fn arm(&self) {
        self.armed.store(true, Ordering::SeqCst);
    }

    pub fn disarm(&self) {
        self.armed.store(false, Ordering::SeqCst);
    }

    pub fn is_armed(&self) -> bool {
        self.armed.load(Ordering::SeqCst)
    }

    fn check(&self, operation: &str) -> Result<(), RepositoryError> {
        if self.is_armed() {
            return Err(RepositoryError::persistence(format!("injected failure during {operation}")));
        }
        Ok(())
    }
}

/// In-memory item store for tests/dev.
#[derive(Debug, Default)]
pub struct InMemoryItemRepository {
    items: RwLock<HashMap<ItemId, Item>>,
    faults: FaultSwitch,
}

impl InMemoryItemRepository {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn faults(&self) -> &FaultSwitch {
        &self.faults
    }

    pub fn len(&self) -> usize {
        self.items.read().map(|m| m.len()).unwrap_or(0)
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

#[async_trait]
impl ItemRepository for InMemoryItemRepository {
    async fn create(&self, item: &Item) -> Result<(), RepositoryError> {
        self.faults.check("item create")?;
        let mut items = self.items.write().map_err(|_| poisoned())?;
        if items.contains_key(&item.id) {
            return Err(RepositoryError::persistence(format!("duplicate item id {}", item.id)));
        }
        items.insert(item.id, item.clone());
        Ok(())
    }

    async fn get_by_id(&self, id: ItemId) -> Result<Item, RepositoryError> {
        self.faults.check("item lookup")?;
        let items = self.items.read().map_err(|_| poisoned())?;
        items
            .get(&id)
            .cloned()
            .ok_or_else(|| RepositoryError::not_found(format!("item {id}")))
    }
}

/// In-memory keyword store for tests/dev.
#[derive(Debug, Default)]
pub struct InMemoryKeywordRepository {
    keywords: RwLock<Vec<Keyword>>,
    faults: FaultSwitch,
}

impl InMemoryKeywordRepository {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn faults(&self) -> &FaultSwitch {
        &self.faults
    }
}

#[async_trait]
impl KeywordRepository for InMemoryKeywordRepository {
    async fn create_many(&self, keywords: &[Keyword]) -> Result<(), RepositoryError> {
        self.faults.check("keyword insert")?;
        let mut rows = self.keywords.write().map_err(|_| poisoned())?;
        rows.extend_from_slice(keywords);
        Ok(())
    }

    async fn list_for_item(&self, item_id: ItemId) -> Result<Vec<Keyword>, RepositoryError> {
        self.faults.check("keyword listing")?;
        let rows = self.keywords.read().map_err(|_| poisoned())?;
        Ok(rows.iter().filter(|k| k.item_id == item_id).cloned().collect())
    }
}

/// In-memory balance store for tests/dev.
#[derive(Debug, Default)]
pub struct InMemoryBoxItemRepository {
    rows: RwLock<HashMap<BoxItemId, BoxItem>>,
    faults: FaultSwitch,
}

impl InMemoryBoxItemRepository {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn faults(&self) -> &FaultSwitch {
        &self.faults
    }

    pub fn len(&self) -> usize {
        self.rows.read().map(|m| m.len()).unwrap_or(0)
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

#[async_trait]
impl BoxItemRepository for InMemoryBoxItemRepository {
    async fn get_box_item(&self, box_id: BoxId, item_id: ItemId) -> Result<Option<BoxItem>, RepositoryError> {
        self.faults.check("box item lookup")?;
        let rows = self.rows.read().map_err(|_| poisoned())?;
        Ok(rows
            .values()
            .find(|r| r.box_id == box_id && r.item_id == item_id)
            .cloned())
    }

    async fn create_box_item(&self, row: &BoxItem) -> Result<(), RepositoryError> {
        self.faults.check("box item create")?;
        let mut rows = self.rows.write().map_err(|_| poisoned())?;
        if rows
            .values()
            .any(|r| r.box_id == row.box_id && r.item_id == row.item_id)
        {
            return Err(RepositoryError::persistence(format!(
                "box item already exists for box {} / item {}",
                row.box_id, row.item_id
            )));
        }
        rows.insert(row.id, row.clone());
        Ok(())
    }

    async fn update_box_item(&self, row: &BoxItem) -> Result<(), RepositoryError> {
        self.faults.check("box item update")?;
        let mut rows = self.rows.write().map_err(|_| poisoned())?;
        match rows.get_mut(&row.id) {
            Some(existing) => {
                *existing = row.clone();
                Ok(())
            }
            None => Err(RepositoryError::not_found(format!("box item {}", row.id))),
        }
    }

    async fn delete_box_item(&self, id: BoxItemId) -> Result<(), RepositoryError> {
        self.faults.check("box item delete")?;
        let mut rows = self.rows.write().map_err(|_| poisoned())?;
        rows.remove(&id)
            .map(|_| ())
            .ok_or_else(|| RepositoryError::not_found(format!("box item {id}")))
    }

    async fn list_by_box(&self, box_id: BoxId) -> Result<Vec<BoxItem>, RepositoryError> {
        self.faults.check("box item listing")?;
        let rows = self.rows.read().map_err(|_| poisoned())?;
        let mut found: Vec<_> = rows.values().filter(|r| r.box_id == box_id).cloned().collect();
        found.sort_by_key(|r| r.timestamps.created_at);
        Ok(found)
    }

    async fn delete_by_box(&self, box_id: BoxId) -> Result<u64, RepositoryError> {
        self.faults.check("box item purge")?;
        let mut rows = self.rows.write().map_err(|_| poisoned())?;
        let before = rows.len();
        rows.retain(|_, r| r.box_id != box_id);
        Ok((before - rows.len()) as u64)
    }
}

/// In-memory append-only ledger for tests/dev.
#[derive(Debug, Default)]
pub struct InMemoryBoxTransactionRepository {
    rows: RwLock<Vec<BoxTransaction>>,
    faults: FaultSwitch,
}

impl InMemoryBoxTransactionRepository {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn faults(&self) -> &FaultSwitch {
        &self.faults
    }

    /// Every row, in insertion order.
    pub fn all(&self) -> Vec<BoxTransaction> {
        self.rows.read().map(|r| r.clone()).unwrap_or_default()
    }
}

#[async_trait]
impl BoxTransactionRepository for InMemoryBoxTransactionRepository {
    async fn create_box_transaction(&self, tx: &BoxTransaction) -> Result<(), RepositoryError> {
        self.faults.check("box transaction insert")?;
        let mut rows = self.rows.write().map_err(|_| poisoned())?;
        rows.push(tx.clone());
        Ok(())
    }

    async fn list_by_box(&self, box_id: BoxId, page: PageFilter) -> Result<Vec<BoxTransaction>, RepositoryError> {
        self.faults.check("box transaction listing")?;
        let rows = self.rows.read().map_err(|_| poisoned())?;

        // Newest insert first, then a stable sort on business time keeps
        // same-instant rows newest-first as well.
        let mut found: Vec<_> = rows.iter().rev().filter(|t| t.box_id == box_id).cloned().collect();
        found.sort_by(|a, b| b.happened_at.cmp(&a.happened_at));

        Ok(found
            .into_iter()
            .skip(page.offset as usize)
            .take(page.limit as usize)
            .collect())
    }

    async fn count_by_box(&self, box_id: BoxId) -> Result<u64, RepositoryError> {
        self.faults.check("box transaction count")?;
        let rows = self.rows.read().map_err(|_| poisoned())?;
        Ok(rows.iter().filter(|t| t.box_id == box_id).count() as u64)
    }

    async fn delete_by_box(&self, box_id: BoxId) -> Result<u64, RepositoryError> {
        self.faults.check("box transaction purge")?;
        let mut rows = self.rows.write().map_err(|_| poisoned())?;
        let before = rows.len();
        rows.retain(|t| t.box_id != box_id);
        Ok((before - rows.len()) as u64)
    }
}
