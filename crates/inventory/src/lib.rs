//! Inventory domain module.
//!
//! Items, their file attachments, per-box balances and the append-only box
//! ledger, plus the domain events that tie them together. Everything here is
//! deterministic domain logic (no IO, no async, no storage).

pub mod asset;
pub mod box_item;
pub mod events;
pub mod item;

pub use asset::{Asset, AssetUpload};
pub use box_item::{BoxItem, BoxTransaction, Remaining, TransactionKind};
pub use events::{BoxItemMoved, InventoryEvent, InventoryEventShape, ItemCreationFailed, ItemCreationStage};
pub use item::{Item, ItemSnapshot, Keyword, NewItem, derive_keywords};
