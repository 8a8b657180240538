//! `stockroom-core`: domain foundation building blocks.
//!
//! This crate contains **pure domain** primitives (no infrastructure concerns):
//! identifiers, the domain error model and the validated `Quantity` value.

pub mod entity;
pub mod error;
pub mod id;
pub mod value_object;

pub use entity::{Entity, Timestamps};
pub use error::{DomainError, DomainResult};
pub use id::{AssetId, BoxId, BoxItemId, ItemId, TransactionId};
pub use value_object::{QUANTITY_SCALE, Quantity, ValueObject};

pub use rust_decimal::Decimal;
