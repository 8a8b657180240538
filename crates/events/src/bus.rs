//! Event publishing abstraction (mechanics only).
//!
//! ## Delivery contract
//!
//! - **Fire-and-forget**: `publish` hands each matching handler to the async
//!   runtime and returns immediately. It never waits for a handler to finish.
//! - **At-most-once per handler per publish**: no retries, no redelivery.
//! - **Errors stay with the handler**: a failing handler is logged by the bus
//!   and never surfaces to the publisher or to sibling handlers.
//! - **No persistence**: events are not stored; there is nothing to replay.
//!
//! Durability of a handler's side effects is the handler's own business.

use std::sync::{Arc, OnceLock, Weak};

use tracing::warn;

use crate::Event;

/// Result of a `publish` call.
///
/// Publishing always succeeds from the publisher's point of view; the outcome
/// only reports how many handlers the event was handed to.
#[derive(Debug, Copy, Clone, PartialEq, Eq)]
pub struct PublishOutcome<S> {
    pub shape: S,
    pub dispatched: usize,
}

impl<S> PublishOutcome<S> {
    pub fn new(shape: S, dispatched: usize) -> Self {
        Self { shape, dispatched }
    }

    /// `true` when no handler was registered for the event's shape.
    pub fn is_noop(&self) -> bool {
        self.dispatched == 0
    }
}

/// Publish side of the event bus.
///
/// Services depend on this trait (not on a concrete bus) so tests can swap in
/// a recording publisher.
///
/// ## Thread Safety
///
/// The trait requires `Send + Sync`; many request paths may publish concurrently.
pub trait EventPublisher<E: Event>: Send + Sync {
    fn publish(&self, event: E) -> PublishOutcome<E::Shape>;
}

impl<E, P> EventPublisher<E> for Arc<P>
where
    E: Event,
    P: EventPublisher<E> + ?Sized,
{
    fn publish(&self, event: E) -> PublishOutcome<E::Shape> {
        (**self).publish(event)
    }
}

/// Publisher whose target is bound after construction.
///
/// Breaks the wiring cycle where a service publishes to a bus whose
/// subscribers hold that same service. Only a weak reference to the target is
/// kept, so the owner of the bus decides its lifetime. Before `bind`, or after
/// the target is dropped, every publish is dropped with a warning.
pub struct DeferredPublisher<E: Event> {
    target: OnceLock<Weak<dyn EventPublisher<E>>>,
}

impl<E: Event> DeferredPublisher<E> {
    pub fn new() -> Self {
        Self {
            target: OnceLock::new(),
        }
    }

    /// Bind the real publisher. Returns `false` if one was already bound.
    pub fn bind(&self, target: &Arc<dyn EventPublisher<E>>) -> bool {
        self.target.set(Arc::downgrade(target)).is_ok()
    }

    pub fn is_bound(&self) -> bool {
        self.target.get().is_some_and(|t| t.strong_count() > 0)
    }
}

impl<E: Event> Default for DeferredPublisher<E> {
    fn default() -> Self {
        Self::new()
    }
}

impl<E: Event> EventPublisher<E> for DeferredPublisher<E> {
    fn publish(&self, event: E) -> PublishOutcome<E::Shape> {
        match self.target.get().and_then(Weak::upgrade) {
            Some(target) => target.publish(event),
            None => {
                warn!(event_type = event.event_type(), "publisher not bound; event dropped");
                PublishOutcome::new(event.shape(), 0)
            }
        }
    }
}
