//! Persistence boundary for items, balances and the box ledger.
//!
//! These traits are the contract the inventory services are written against.
//! Database-backed implementations live with the host application; the
//! in-memory versions here back tests and local development.

pub mod in_memory;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use thiserror::Error;

use stockroom_core::{BoxId, BoxItemId, ItemId};
use stockroom_inventory::{BoxItem, BoxTransaction, Item, Keyword};

pub use in_memory::{
    FaultSwitch, InMemoryBoxItemRepository, InMemoryBoxTransactionRepository,
    InMemoryItemRepository, InMemoryKeywordRepository,
};

/// Repository operation error.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum RepositoryError {
    #[error("{0} not found")]
    NotFound(String),

    #[error("persistence failure: {0}")]
    Persistence(String),
}

impl RepositoryError {
    pub fn not_found(what: impl Into<String>) -> Self {
        Self::NotFound(what.into())
    }

    pub fn persistence(msg: impl Into<String>) -> Self {
        Self::Persistence(msg.into())
    }
}

/// Pagination parameters for ledger listings.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct PageFilter {
    /// Maximum number of rows to return.
    pub limit: u32,
    /// Offset for pagination (0-based).
    pub offset: u32,
}

impl PageFilter {
    pub const DEFAULT_LIMIT: u32 = 20;
    pub const MAX_LIMIT: u32 = 100;

    pub fn new(limit: Option<u32>, offset: Option<u32>) -> Self {
        Self {
            limit: limit.unwrap_or(Self::DEFAULT_LIMIT).clamp(1, Self::MAX_LIMIT),
            offset: offset.unwrap_or(0),
        }
    }
}

impl Default for PageFilter {
    fn default() -> Self {
        Self::new(None, None)
    }
}

#[async_trait]
pub trait ItemRepository: Send + Sync {
    async fn create(&self, item: &Item) -> Result<(), RepositoryError>;

    async fn get_by_id(&self, id: ItemId) -> Result<Item, RepositoryError>;
}

#[async_trait]
pub trait KeywordRepository: Send + Sync {
    async fn create_many(&self, keywords: &[Keyword]) -> Result<(), RepositoryError>;

    async fn list_for_item(&self, item_id: ItemId) -> Result<Vec<Keyword>, RepositoryError>;
}

/// Current-state balances, one row per `(box, item)` pair.
#[async_trait]
pub trait BoxItemRepository: Send + Sync {
    async fn get_box_item(&self, box_id: BoxId, item_id: ItemId) -> Result<Option<BoxItem>, RepositoryError>;

    async fn create_box_item(&self, row: &BoxItem) -> Result<(), RepositoryError>;

    async fn update_box_item(&self, row: &BoxItem) -> Result<(), RepositoryError>;

    async fn delete_box_item(&self, id: BoxItemId) -> Result<(), RepositoryError>;

    async fn list_by_box(&self, box_id: BoxId) -> Result<Vec<BoxItem>, RepositoryError>;

    /// Remove every balance row of a box, returning how many were removed.
    async fn delete_by_box(&self, box_id: BoxId) -> Result<u64, RepositoryError>;
}

/// Append-only box ledger.
#[async_trait]
pub trait BoxTransactionRepository: Send + Sync {
    async fn create_box_transaction(&self, tx: &BoxTransaction) -> Result<(), RepositoryError>;

    /// Rows of one box, newest `happened_at` first.
    async fn list_by_box(&self, box_id: BoxId, page: PageFilter) -> Result<Vec<BoxTransaction>, RepositoryError>;

    async fn count_by_box(&self, box_id: BoxId) -> Result<u64, RepositoryError>;

    /// Remove the ledger of a deleted box, returning how many rows were removed.
    async fn delete_by_box(&self, box_id: BoxId) -> Result<u64, RepositoryError>;
}
