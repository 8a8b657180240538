//! In-process domain events: the `Event` contract and the publish/subscribe bus.

pub mod bus;
pub mod event;
pub mod handler;
pub mod in_memory_bus;

pub use bus::{DeferredPublisher, EventPublisher, PublishOutcome};
pub use event::Event;
pub use handler::{EventHandler, HandlerError};
pub use in_memory_bus::{DEFAULT_MAX_IN_FLIGHT, EventBusBuilder, InMemoryEventBus};
