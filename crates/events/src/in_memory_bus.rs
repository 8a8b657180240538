//! In-process event bus backed by the tokio scheduler.

use std::collections::HashMap;
use std::sync::Arc;
use std::sync::atomic::{AtomicUsize, Ordering};

use tokio::runtime::Handle;
use tokio::sync::{Notify, Semaphore};
use tracing::{debug, error, trace, warn};

use crate::bus::{EventPublisher, PublishOutcome};
use crate::{Event, EventHandler};

/// Default bound on concurrently executing handler tasks.
pub const DEFAULT_MAX_IN_FLIGHT: usize = 64;

type HandlerList<E> = Vec<Arc<dyn EventHandler<E>>>;

/// Wiring-time registry for an [`InMemoryEventBus`].
///
/// Subscriptions can only be added here. `build()` freezes the dispatch table,
/// so the running bus reads it without any locking.
pub struct EventBusBuilder<E: Event> {
    handlers: HashMap<E::Shape, HandlerList<E>>,
    max_in_flight: usize,
}

impl<E: Event> EventBusBuilder<E> {
    pub fn new() -> Self {
        Self {
            handlers: HashMap::new(),
            max_in_flight: DEFAULT_MAX_IN_FLIGHT,
        }
    }

    /// Bound the number of handler tasks executing at the same time (minimum 1).
    pub fn with_max_in_flight(mut self, max: usize) -> Self {
        self.max_in_flight = max.max(1);
        self
    }

    /// Register `handler` for events of `shape`.
    ///
    /// Several handlers may share a shape; they are dispatched in registration order.
    pub fn subscribe<H>(&mut self, shape: E::Shape, handler: H) -> &mut Self
    where
        H: EventHandler<E>,
    {
        self.subscribe_shared(shape, Arc::new(handler))
    }

    /// Register an already shared handler (e.g. one instance for several shapes).
    pub fn subscribe_shared(&mut self, shape: E::Shape, handler: Arc<dyn EventHandler<E>>) -> &mut Self {
        debug!(?shape, handler = handler.name(), "subscribing event handler");
        self.handlers.entry(shape).or_default().push(handler);
        self
    }

    pub fn build(self) -> InMemoryEventBus<E> {
        InMemoryEventBus {
            handlers: self.handlers,
            permits: Arc::new(Semaphore::new(self.max_in_flight)),
            in_flight: Arc::new(InFlight::default()),
        }
    }
}

impl<E: Event> Default for EventBusBuilder<E> {
    fn default() -> Self {
        Self::new()
    }
}

#[derive(Debug, Default)]
struct InFlight {
    count: AtomicUsize,
    idle: Notify,
}

/// Counts one spawned dispatch; released on drop, including on unwind.
struct InFlightGuard(Arc<InFlight>);

impl InFlightGuard {
    fn enter(tracker: &Arc<InFlight>) -> Self {
        tracker.count.fetch_add(1, Ordering::AcqRel);
        Self(Arc::clone(tracker))
    }
}

impl Drop for InFlightGuard {
    fn drop(&mut self) {
        if self.0.count.fetch_sub(1, Ordering::AcqRel) == 1 {
            self.0.idle.notify_waiters();
        }
    }
}

/// In-memory pub/sub bus.
///
/// - Dispatch table keyed by event shape, frozen at build time
/// - One spawned task per matching handler; `publish` never awaits them
/// - At most `max_in_flight` handlers execute at once; excess tasks queue on a semaphore
/// - Handler errors and panics are logged here and go no further
pub struct InMemoryEventBus<E: Event> {
    handlers: HashMap<E::Shape, HandlerList<E>>,
    permits: Arc<Semaphore>,
    in_flight: Arc<InFlight>,
}

impl<E: Event> InMemoryEventBus<E> {
    pub fn builder() -> EventBusBuilder<E> {
        EventBusBuilder::new()
    }

    /// Number of handlers registered for `shape`.
    pub fn subscriber_count(&self, shape: E::Shape) -> usize {
        self.handlers.get(&shape).map(Vec::len).unwrap_or(0)
    }

    /// Dispatches spawned but not yet finished.
    pub fn in_flight(&self) -> usize {
        self.in_flight.count.load(Ordering::Acquire)
    }

    /// Resolve once every dispatched handler has finished.
    ///
    /// Used for graceful shutdown and to bound waits in tests.
    pub async fn wait_idle(&self) {
        loop {
            let notified = self.in_flight.idle.notified();
            tokio::pin!(notified);
            notified.as_mut().enable();

            if self.in_flight.count.load(Ordering::Acquire) == 0 {
                return;
            }
            notified.await;
        }
    }

    fn dispatch(&self, runtime: &Handle, handler: Arc<dyn EventHandler<E>>, event: E) {
        let permits = Arc::clone(&self.permits);
        let guard = InFlightGuard::enter(&self.in_flight);
        let event_type = event.event_type();

        runtime.spawn(async move {
            let _guard = guard;
            // The semaphore is never closed; a failed acquire means shutdown.
            let Ok(_permit) = permits.acquire_owned().await else {
                return;
            };

            let name = handler.name();
            let task = tokio::spawn(async move { handler.handle(event).await });
            match task.await {
                Ok(Ok(())) => trace!(handler = name, event_type, "event handled"),
                Ok(Err(err)) => {
                    warn!(handler = name, event_type, error = %err, "event handler failed");
                }
                Err(join_err) if join_err.is_panic() => {
                    error!(handler = name, event_type, "event handler panicked");
                }
                Err(join_err) => {
                    warn!(handler = name, event_type, error = %join_err, "event handler aborted");
                }
            }
        });
    }
}

impl<E: Event> EventPublisher<E> for InMemoryEventBus<E> {
    fn publish(&self, event: E) -> PublishOutcome<E::Shape> {
        let shape = event.shape();

        let Some(handlers) = self.handlers.get(&shape).filter(|h| !h.is_empty()) else {
            trace!(?shape, "no subscribers for event");
            return PublishOutcome::new(shape, 0);
        };

        let Ok(runtime) = Handle::try_current() else {
            warn!(?shape, "publish outside of an async runtime; event dropped");
            return PublishOutcome::new(shape, 0);
        };

        for handler in handlers {
            self.dispatch(&runtime, Arc::clone(handler), event.clone());
        }

        PublishOutcome::new(shape, handlers.len())
    }
}

impl<E: Event> core::fmt::Debug for InMemoryEventBus<E> {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        f.debug_struct("InMemoryEventBus")
            .field("shapes", &self.handlers.keys().collect::<Vec<_>>())
            .field("available_permits", &self.permits.available_permits())
            .field("in_flight", &self.in_flight())
            .finish()
    }
}
