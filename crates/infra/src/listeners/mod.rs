//! Background subscribers of inventory events.
//!
//! - `compensation`: undo the stored asset when item creation fails part-way
//! - `ledger`: append a `BoxTransaction` for every balance movement
//!
//! Listeners own their unit of work. Failures are reported to the injected
//! `FailureSink` and returned to the bus, which logs them; nothing is retried
//! and nothing reaches the original caller.

pub mod compensation;
pub mod ledger;

pub use compensation::AssetRollbackListener;
pub use ledger::BoxTransactionListener;
