use chrono::{DateTime, Utc};

/// A domain-agnostic event.
///
/// Events are:
/// - **immutable** (treat them as facts)
/// - **transient** (in-memory values, never serialized or replayed)
/// - **routed by shape**: a closed, hashable tag naming the concrete variant
pub trait Event: Clone + core::fmt::Debug + Send + Sync + 'static {
    /// Routing key used by the bus dispatch table.
    type Shape: Copy + Eq + core::hash::Hash + core::fmt::Debug + Send + Sync + 'static;

    /// The concrete variant of this event.
    fn shape(&self) -> Self::Shape;

    /// Stable event name/type identifier (e.g. "inventory.box_item.added").
    fn event_type(&self) -> &'static str;

    /// When the event occurred (business time).
    fn occurred_at(&self) -> DateTime<Utc>;
}
