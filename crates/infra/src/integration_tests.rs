//! Integration tests for the wired inventory subsystem.
//!
//! Tests: service call → balance write → EventBus → listener → ledger / asset store
//!
//! Verifies:
//! - Every committed movement yields exactly one ledger row of its direction
//! - Rejected movements publish nothing and write nothing
//! - Failed item creation rolls back the stored asset exactly once
//! - Listener failures stay in the background and reach the failure sink

#[cfg(test)]
mod tests {
    use std::sync::Arc;
    use std::time::Duration;

    use proptest::prelude::*;

    use stockroom_core::{BoxId, DomainError};
    use stockroom_events::{EventPublisher, InMemoryEventBus};
    use stockroom_inventory::{
        AssetUpload, InventoryEvent, InventoryEventShape, ItemCreationStage, NewItem, TransactionKind,
    };
    use stockroom_observability::InMemoryFailureSink;

    use crate::assets::InMemoryAssetManager;
    use crate::config::StockroomConfig;
    use crate::item_workflow::ItemCreationError;
    use crate::ledger_service::LedgerError;
    use crate::repository::{
        InMemoryBoxItemRepository, InMemoryBoxTransactionRepository, InMemoryItemRepository,
        InMemoryKeywordRepository, PageFilter,
    };
    use crate::wiring::{Collaborators, Stockroom, assemble};

    struct Harness {
        stockroom: Stockroom,
        items: Arc<InMemoryItemRepository>,
        keywords: Arc<InMemoryKeywordRepository>,
        ledger: Arc<InMemoryBoxTransactionRepository>,
        assets: Arc<InMemoryAssetManager>,
        sink: Arc<InMemoryFailureSink>,
    }

    impl Harness {
        fn new() -> Self {
            let items = Arc::new(InMemoryItemRepository::new());
            let keywords = Arc::new(InMemoryKeywordRepository::new());
            let ledger = Arc::new(InMemoryBoxTransactionRepository::new());
            let assets = Arc::new(InMemoryAssetManager::new());
            let sink = Arc::new(InMemoryFailureSink::new());
            let stockroom = assemble(
                &StockroomConfig::default().with_max_in_flight(4),
                Collaborators {
                    items: items.clone(),
                    keywords: keywords.clone(),
                    balances: Arc::new(InMemoryBoxItemRepository::new()),
                    ledger: ledger.clone(),
                    assets: assets.clone(),
                    sink: sink.clone(),
                },
            );
            Self {
                stockroom,
                items,
                keywords,
                ledger,
                assets,
                sink,
            }
        }

        async fn settle(&self) {
            tokio::time::timeout(Duration::from_secs(5), self.stockroom.shutdown())
                .await
                .expect("background listeners did not finish");
        }

        async fn seed_item(&self) -> stockroom_inventory::Item {
            self.stockroom
                .items
                .create(new_item("BLT-8"), None)
                .await
                .unwrap()
                .item
        }
    }

    fn new_item(sku: &str) -> NewItem {
        NewItem {
            sku: sku.to_string(),
            name: "Hex bolt M8".to_string(),
            unit: "pcs".to_string(),
            description: Some("zinc plated".to_string()),
        }
    }

    fn upload() -> AssetUpload {
        AssetUpload {
            file_name: "bolt.jpg".to_string(),
            content_type: "image/jpeg".to_string(),
            bytes: vec![1, 2, 3, 4],
        }
    }

    #[tokio::test]
    async fn add_then_remove_all_then_over_remove() {
        let h = Harness::new();
        let item = h.seed_item().await;
        let box_id = BoxId::new();
        let ledger = &h.stockroom.ledger;

        let row = ledger.add_item(10.0, box_id, item.id).await.unwrap();
        assert_eq!(row.quantity(), 10.0);

        let left = ledger.remove_item(10.0, box_id, item.id).await.unwrap();
        assert!(left.is_none());

        let err = ledger.remove_item(1.0, box_id, item.id).await.unwrap_err();
        assert!(matches!(
            err,
            LedgerError::Domain(DomainError::InsufficientQuantity { .. })
        ));
        assert_eq!(ledger.balance(box_id, item.id).await.unwrap(), None);

        h.settle().await;

        let rows = ledger.list_transactions(box_id, PageFilter::default()).await.unwrap();
        let mut kinds: Vec<_> = rows.iter().map(|tx| (tx.kind, tx.quantity.value())).collect();
        kinds.sort_by_key(|(kind, _)| kind.as_str());
        assert_eq!(
            kinds,
            vec![(TransactionKind::Add, 10.0), (TransactionKind::Remove, 10.0)]
        );
        assert!(rows.iter().all(|tx| tx.item.sku == "BLT-8"));
        assert!(h.sink.is_empty());
    }

    #[tokio::test]
    async fn one_ledger_row_per_committed_movement() {
        let h = Harness::new();
        let item = h.seed_item().await;
        let box_id = BoxId::new();
        let ledger = &h.stockroom.ledger;

        for q in [1.0, 2.0, 3.0] {
            ledger.add_item(q, box_id, item.id).await.unwrap();
        }
        ledger.remove_item(4.0, box_id, item.id).await.unwrap();
        // Rejected: nothing published, nothing recorded.
        assert!(ledger.remove_item(9.0, box_id, item.id).await.is_err());
        assert!(ledger.add_item(-1.0, box_id, item.id).await.is_err());

        h.settle().await;

        assert_eq!(ledger.count_transactions(box_id).await.unwrap(), 4);
        let removes = h
            .ledger
            .all()
            .into_iter()
            .filter(|tx| tx.kind == TransactionKind::Remove)
            .count();
        assert_eq!(removes, 1);
        assert_eq!(ledger.balance(box_id, item.id).await.unwrap(), Some(2.0));
    }

    #[tokio::test]
    async fn transfer_records_a_remove_and_an_add() {
        let h = Harness::new();
        let item = h.seed_item().await;
        let (from, to) = (BoxId::new(), BoxId::new());
        let ledger = &h.stockroom.ledger;
        ledger.add_item(5.0, from, item.id).await.unwrap();

        let moved = ledger.transfer_item(from, to, item.id).await.unwrap();
        h.settle().await;

        assert_eq!(moved, 5.0);
        assert_eq!(ledger.balance(to, item.id).await.unwrap(), Some(5.0));
        let source_rows = ledger.list_transactions(from, PageFilter::default()).await.unwrap();
        assert_eq!(source_rows.len(), 2);
        let dest_rows = ledger.list_transactions(to, PageFilter::default()).await.unwrap();
        assert_eq!(dest_rows.len(), 1);
        assert_eq!(dest_rows[0].kind, TransactionKind::Add);
    }

    #[tokio::test]
    async fn failed_item_row_rolls_back_the_asset_once() {
        let h = Harness::new();
        h.items.faults().arm();

        let err = h
            .stockroom
            .items
            .create(new_item("GAS-1"), Some(upload()))
            .await
            .unwrap_err();
        assert!(matches!(
            err,
            ItemCreationError::Persistence { stage: ItemCreationStage::ItemRow, .. }
        ));

        h.settle().await;

        assert!(h.assets.is_empty());
        assert!(h.sink.is_empty());
    }

    #[tokio::test]
    async fn failed_keywords_roll_back_the_asset_but_keep_the_item() {
        let h = Harness::new();
        h.keywords.faults().arm();

        let err = h
            .stockroom
            .items
            .create(new_item("GAS-2"), Some(upload()))
            .await
            .unwrap_err();
        assert!(matches!(
            err,
            ItemCreationError::Persistence { stage: ItemCreationStage::Keywords, .. }
        ));

        h.settle().await;

        assert!(h.assets.is_empty());
        assert_eq!(h.items.len(), 1);
    }

    #[tokio::test]
    async fn failed_rollback_reaches_the_sink_and_keeps_the_asset() {
        let h = Harness::new();
        h.items.faults().arm();
        h.assets.delete_faults().arm();

        let err = h
            .stockroom
            .items
            .create(new_item("GAS-3"), Some(upload()))
            .await
            .unwrap_err();
        assert!(err.persistence_error().is_some());

        h.settle().await;

        assert_eq!(h.assets.len(), 1);
        let failures = h.sink.failures();
        assert_eq!(failures.len(), 1);
        assert_eq!(failures[0].listener, "asset_rollback.item_row");
    }

    #[tokio::test]
    async fn ledger_write_failure_leaves_an_audit_gap() {
        let h = Harness::new();
        let item = h.seed_item().await;
        let box_id = BoxId::new();
        h.ledger.faults().arm();

        let row = h.stockroom.ledger.add_item(3.0, box_id, item.id).await.unwrap();
        h.settle().await;

        // The balance stands even though its ledger row is missing.
        assert_eq!(row.quantity(), 3.0);
        assert_eq!(h.stockroom.ledger.balance(box_id, item.id).await.unwrap(), Some(3.0));
        assert!(h.ledger.all().is_empty());
        let failures = h.sink.failures();
        assert_eq!(failures.len(), 1);
        assert_eq!(failures[0].listener, "box_ledger.added");
        assert_eq!(failures[0].subject, box_id.to_string());
    }

    #[tokio::test]
    async fn deleting_a_box_purges_its_history() {
        let h = Harness::new();
        let item = h.seed_item().await;
        let box_id = BoxId::new();
        h.stockroom.ledger.add_item(2.0, box_id, item.id).await.unwrap();
        h.stockroom.ledger.remove_item(1.0, box_id, item.id).await.unwrap();
        h.settle().await;

        let purge = h.stockroom.ledger.delete_box_with_history(box_id).await.unwrap();
        h.settle().await;

        assert_eq!(purge.box_items, 1);
        assert_eq!(purge.transactions, 2);
        assert!(h.ledger.all().is_empty());
    }

    #[tokio::test]
    async fn publishing_without_subscribers_is_a_noop() {
        let bus = InMemoryEventBus::<InventoryEvent>::builder().build();
        let h = Harness::new();
        let item = h.seed_item().await;

        let outcome = bus.publish(InventoryEvent::BoxItemAdded(stockroom_inventory::BoxItemMoved {
            quantity: stockroom_core::Quantity::new(1.0).unwrap(),
            box_id: BoxId::new(),
            item,
            happened_at: chrono::Utc::now(),
        }));

        assert!(outcome.is_noop());
        assert_eq!(outcome.shape, InventoryEventShape::BoxItemAdded);
        assert_eq!(bus.in_flight(), 0);
    }

    proptest! {
        #![proptest_config(ProptestConfig::with_cases(16))]

        #[test]
        fn ledger_replays_to_the_final_balance(
            moves in prop::collection::vec((any::<bool>(), 1u32..20), 1..25)
        ) {
            let runtime = tokio::runtime::Runtime::new().unwrap();
            runtime.block_on(async {
                let h = Harness::new();
                let item = h.seed_item().await;
                let box_id = BoxId::new();
                let ledger = &h.stockroom.ledger;

                let mut expected = 0.0;
                let mut committed = 0u64;
                for (add, q) in moves {
                    let q = f64::from(q);
                    if add {
                        ledger.add_item(q, box_id, item.id).await.unwrap();
                        expected += q;
                        committed += 1;
                    } else if q <= expected {
                        ledger.remove_item(q, box_id, item.id).await.unwrap();
                        expected -= q;
                        committed += 1;
                    } else {
                        assert!(ledger.remove_item(q, box_id, item.id).await.is_err());
                    }
                }
                h.settle().await;

                let replayed: f64 = h
                    .ledger
                    .all()
                    .iter()
                    .map(|tx| match tx.kind {
                        TransactionKind::Add => tx.quantity.value(),
                        TransactionKind::Remove => -tx.quantity.value(),
                    })
                    .sum();
                assert_eq!(ledger.count_transactions(box_id).await.unwrap(), committed);
                assert_eq!(replayed, expected);
                let balance = ledger.balance(box_id, item.id).await.unwrap().unwrap_or(0.0);
                assert_eq!(balance, expected);
            });
        }
    }
}
