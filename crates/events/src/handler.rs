use async_trait::async_trait;
use thiserror::Error;

use crate::Event;

/// Failure reported by an event handler.
///
/// The bus logs it and moves on; nothing is retried.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
#[error("{0}")]
pub struct HandlerError(String);

impl HandlerError {
    pub fn new(msg: impl Into<String>) -> Self {
        Self(msg.into())
    }

    pub fn message(&self) -> &str {
        &self.0
    }
}

impl From<String> for HandlerError {
    fn from(value: String) -> Self {
        Self(value)
    }
}

/// Subscriber invoked by the bus for each published event of a registered shape.
///
/// Each handler receives its own copy of the event, so nothing a handler (or
/// the publisher) does afterwards can change what another handler sees.
#[async_trait]
pub trait EventHandler<E: Event>: Send + Sync + 'static {
    /// Stable handler name used in logs.
    fn name(&self) -> &'static str;

    async fn handle(&self, event: E) -> Result<(), HandlerError>;
}
