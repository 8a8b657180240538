//! Infrastructure layer: repositories, asset storage, listeners, and wiring.

pub mod assets;
pub mod config;
pub mod item_workflow;
pub mod ledger_service;
pub mod listeners;
pub mod repository;
pub mod wiring;

#[cfg(test)]
mod integration_tests;

pub use assets::{AssetError, AssetManager, InMemoryAssetManager};
pub use config::{BusConfig, StockroomConfig};
pub use item_workflow::{CreatedItem, ITEM_ENTITY_NAME, ItemCreationError, ItemCreationWorkflow};
pub use ledger_service::{BoxPurge, InventoryLedgerService, LedgerError};
pub use listeners::{AssetRollbackListener, BoxTransactionListener};
pub use repository::{
    BoxItemRepository, BoxTransactionRepository, ItemRepository, KeywordRepository, PageFilter,
    RepositoryError,
};
pub use wiring::{Collaborators, Stockroom, assemble, wire_listeners};
