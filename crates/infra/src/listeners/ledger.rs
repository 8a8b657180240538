use std::sync::Arc;

use async_trait::async_trait;

use stockroom_events::{Event, EventHandler, HandlerError};
use stockroom_inventory::{InventoryEvent, InventoryEventShape, TransactionKind};
use stockroom_observability::{FailureSink, HandlerFailure};

use crate::ledger_service::InventoryLedgerService;

/// Appends the ledger row for one movement direction.
///
/// Goes through the ledger service rather than the ledger repository so that
/// row construction lives in one place. A failed insert leaves an audit gap;
/// the balance was already committed before the event was published.
pub struct BoxTransactionListener {
    kind: TransactionKind,
    service: Arc<InventoryLedgerService>,
    sink: Arc<dyn FailureSink>,
}

impl BoxTransactionListener {
    pub fn added(service: Arc<InventoryLedgerService>, sink: Arc<dyn FailureSink>) -> Self {
        Self {
            kind: TransactionKind::Add,
            service,
            sink,
        }
    }

    pub fn removed(service: Arc<InventoryLedgerService>, sink: Arc<dyn FailureSink>) -> Self {
        Self {
            kind: TransactionKind::Remove,
            service,
            sink,
        }
    }

    pub fn shape(&self) -> InventoryEventShape {
        match self.kind {
            TransactionKind::Add => InventoryEventShape::BoxItemAdded,
            TransactionKind::Remove => InventoryEventShape::BoxItemRemoved,
        }
    }
}

#[async_trait]
impl EventHandler<InventoryEvent> for BoxTransactionListener {
    fn name(&self) -> &'static str {
        match self.kind {
            TransactionKind::Add => "box_ledger.added",
            TransactionKind::Remove => "box_ledger.removed",
        }
    }

    async fn handle(&self, event: InventoryEvent) -> Result<(), HandlerError> {
        let event_type = event.event_type();
        let movement = match (self.kind, event) {
            (TransactionKind::Add, InventoryEvent::BoxItemAdded(m))
            | (TransactionKind::Remove, InventoryEvent::BoxItemRemoved(m)) => m,
            (_, other) => {
                return Err(HandlerError::new(format!(
                    "{} cannot handle {}",
                    self.name(),
                    other.event_type()
                )));
            }
        };

        if let Err(err) = self.service.record_movement(self.kind, &movement).await {
            self.sink
                .record(HandlerFailure::new(self.name(), event_type, movement.box_id, &err));
            return Err(HandlerError::new(err.to_string()));
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use chrono::Utc;

    use stockroom_core::{BoxId, ItemId, Quantity};
    use stockroom_events::DeferredPublisher;
    use stockroom_inventory::{BoxItemMoved, Item, NewItem};
    use stockroom_observability::InMemoryFailureSink;

    use super::*;
    use crate::repository::{
        InMemoryBoxItemRepository, InMemoryBoxTransactionRepository, InMemoryItemRepository,
    };

    fn service(ledger: Arc<InMemoryBoxTransactionRepository>) -> Arc<InventoryLedgerService> {
        Arc::new(InventoryLedgerService::new(
            Arc::new(InMemoryItemRepository::new()),
            Arc::new(InMemoryBoxItemRepository::new()),
            ledger,
            Arc::new(DeferredPublisher::<InventoryEvent>::new()),
        ))
    }

    fn movement() -> BoxItemMoved {
        BoxItemMoved {
            quantity: Quantity::new(3.0).unwrap(),
            box_id: BoxId::new(),
            item: Item::create(
                ItemId::new(),
                NewItem {
                    sku: "P-9".to_string(),
                    name: "Pin".to_string(),
                    unit: "pcs".to_string(),
                    description: None,
                },
                Utc::now(),
            )
            .unwrap(),
            happened_at: Utc::now(),
        }
    }

    #[tokio::test]
    async fn writes_one_row_of_its_direction() {
        let ledger = Arc::new(InMemoryBoxTransactionRepository::new());
        let sink = Arc::new(InMemoryFailureSink::new());
        let listener = BoxTransactionListener::removed(service(ledger.clone()), sink.clone());
        let m = movement();

        listener.handle(InventoryEvent::BoxItemRemoved(m.clone())).await.unwrap();

        let rows = ledger.all();
        assert_eq!(rows.len(), 1);
        assert_eq!(rows[0].kind, TransactionKind::Remove);
        assert_eq!(rows[0].quantity, m.quantity);
        assert_eq!(rows[0].box_id, m.box_id);
        assert_eq!(rows[0].item_id(), m.item.id);
        assert!(sink.is_empty());
    }

    #[tokio::test]
    async fn rejects_the_opposite_direction() {
        let ledger = Arc::new(InMemoryBoxTransactionRepository::new());
        let sink = Arc::new(InMemoryFailureSink::new());
        let listener = BoxTransactionListener::added(service(ledger.clone()), sink);

        assert!(listener.handle(InventoryEvent::BoxItemRemoved(movement())).await.is_err());
        assert!(ledger.all().is_empty());
        assert_eq!(listener.shape(), InventoryEventShape::BoxItemAdded);
    }

    #[tokio::test]
    async fn insert_failure_is_recorded_as_an_audit_gap() {
        let ledger = Arc::new(InMemoryBoxTransactionRepository::new());
        let sink = Arc::new(InMemoryFailureSink::new());
        let listener = BoxTransactionListener::added(service(ledger.clone()), sink.clone());
        let m = movement();
        ledger.faults().arm();

        assert!(listener.handle(InventoryEvent::BoxItemAdded(m.clone())).await.is_err());

        let failures = sink.failures();
        assert_eq!(failures.len(), 1);
        assert_eq!(failures[0].listener, "box_ledger.added");
        assert_eq!(failures[0].event_type, "inventory.box_item.added");
        assert_eq!(failures[0].subject, m.box_id.to_string());
    }
}
