//! Composition root: builds the bus, registers listeners, and hands out services.
//!
//! The ledger service publishes to the bus, and the ledger listeners on that
//! bus call back into the service. The service is therefore built against a
//! [`DeferredPublisher`] that is bound to the bus once it exists.

use std::sync::Arc;

use tracing::{debug, info};

use stockroom_events::{DeferredPublisher, EventBusBuilder, EventPublisher, InMemoryEventBus};
use stockroom_inventory::InventoryEvent;
use stockroom_observability::FailureSink;

use crate::assets::AssetManager;
use crate::config::StockroomConfig;
use crate::item_workflow::ItemCreationWorkflow;
use crate::ledger_service::InventoryLedgerService;
use crate::listeners::{AssetRollbackListener, BoxTransactionListener};
use crate::repository::{BoxItemRepository, BoxTransactionRepository, ItemRepository, KeywordRepository};

/// Register every inventory listener on `builder`.
///
/// - two asset rollback listeners, one per item-creation failure stage
/// - two ledger listeners, one per movement direction
pub fn wire_listeners(
    builder: &mut EventBusBuilder<InventoryEvent>,
    ledger: Arc<InventoryLedgerService>,
    assets: Arc<dyn AssetManager>,
    sink: Arc<dyn FailureSink>,
) {
    let after_item_row = AssetRollbackListener::after_item_row(assets.clone(), sink.clone());
    let after_keywords = AssetRollbackListener::after_keywords(assets, sink.clone());
    let added = BoxTransactionListener::added(ledger.clone(), sink.clone());
    let removed = BoxTransactionListener::removed(ledger, sink);

    builder
        .subscribe(after_item_row.shape(), after_item_row)
        .subscribe(after_keywords.shape(), after_keywords)
        .subscribe(added.shape(), added)
        .subscribe(removed.shape(), removed);
    debug!("inventory listeners registered");
}

/// Storage and observability backends the subsystem runs on.
#[derive(Clone)]
pub struct Collaborators {
    pub items: Arc<dyn ItemRepository>,
    pub keywords: Arc<dyn KeywordRepository>,
    pub balances: Arc<dyn BoxItemRepository>,
    pub ledger: Arc<dyn BoxTransactionRepository>,
    pub assets: Arc<dyn AssetManager>,
    pub sink: Arc<dyn FailureSink>,
}

/// A fully wired inventory subsystem.
pub struct Stockroom {
    pub bus: Arc<InMemoryEventBus<InventoryEvent>>,
    pub ledger: Arc<InventoryLedgerService>,
    pub items: ItemCreationWorkflow,
}

impl Stockroom {
    /// Wait for every background listener dispatched so far.
    pub async fn shutdown(&self) {
        self.bus.wait_idle().await;
        info!("inventory event bus drained");
    }
}

impl core::fmt::Debug for Stockroom {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        f.debug_struct("Stockroom")
            .field("bus", &self.bus)
            .finish_non_exhaustive()
    }
}

pub fn assemble(config: &StockroomConfig, collaborators: Collaborators) -> Stockroom {
    let Collaborators {
        items,
        keywords,
        balances,
        ledger,
        assets,
        sink,
    } = collaborators;

    let publisher = Arc::new(DeferredPublisher::<InventoryEvent>::new());
    let ledger_service = Arc::new(InventoryLedgerService::new(
        items.clone(),
        balances,
        ledger,
        publisher.clone(),
    ));

    let mut builder = InMemoryEventBus::builder().with_max_in_flight(config.bus.max_in_flight);
    wire_listeners(&mut builder, ledger_service.clone(), assets.clone(), sink);
    let bus = Arc::new(builder.build());

    let target: Arc<dyn EventPublisher<InventoryEvent>> = bus.clone();
    publisher.bind(&target);

    let workflow = ItemCreationWorkflow::new(items, keywords, assets, bus.clone());

    info!(max_in_flight = config.bus.max_in_flight, "inventory subsystem assembled");
    Stockroom {
        bus,
        ledger: ledger_service,
        items: workflow,
    }
}
