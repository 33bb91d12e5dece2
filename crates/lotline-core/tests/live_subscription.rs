//! Live notifications through the subscription manager.

use std::sync::Arc;
use std::time::Duration;

use lotline_core::Engine;
use lotline_core::config::ProjectConfig;
use lotline_core::event::EventKind;
use lotline_core::ledger::{LedgerCall, MemoryLedger};
use lotline_core::model::{Address, EntryKind, Item, ItemId, Status};
use lotline_core::storage::MemoryDocuments;

const FARMER: &str = "0x00000000000000000000000000000000000000a1";
const INSPECTOR: &str = "0x00000000000000000000000000000000000000b1";

fn mint(ledger: &MemoryLedger) {
    ledger
        .execute(
            &Address::new(FARMER),
            &LedgerCall::Mint {
                metadata_pointer: "ipfs://QmPepper".to_string(),
            },
        )
        .unwrap();
}

async fn wait_for(engine: &Engine, id: ItemId, check: impl Fn(&Item) -> bool) -> Item {
    let deadline = tokio::time::Instant::now() + Duration::from_secs(2);
    loop {
        if let Some(item) = engine.get(id).filter(|item| check(item)) {
            return item;
        }
        assert!(
            tokio::time::Instant::now() < deadline,
            "timed out waiting for item {id}"
        );
        tokio::time::sleep(Duration::from_millis(10)).await;
    }
}

#[tokio::test]
async fn notifications_project_then_resync_fills_history() {
    let ledger = Arc::new(MemoryLedger::new());
    let engine = Engine::new(
        ledger.clone(),
        Arc::new(MemoryDocuments::new()),
        &ProjectConfig::default(),
    );
    let _live = engine.attach_live().await.unwrap();

    mint(&ledger);
    let item = wait_for(&engine, ItemId::new_unchecked(1), |item| {
        item.history.len() == 1
    })
    .await;
    assert_eq!(item.status, Status::Created);
    assert_eq!(item.history[0].kind, EntryKind::Registered);
    assert_eq!(item.history[0].timestamp, ledger.block_time(1));

    ledger
        .execute(
            &Address::new(INSPECTOR),
            &LedgerCall::Inspect {
                item: ItemId::new_unchecked(1),
                metadata_pointer: None,
            },
        )
        .unwrap();
    let item = wait_for(&engine, ItemId::new_unchecked(1), |item| {
        item.history.len() == 2
    })
    .await;
    assert_eq!(item.status, Status::Inspecting);
}

#[tokio::test]
async fn without_live_resync_history_stays_empty() {
    let ledger = Arc::new(MemoryLedger::new());
    let mut config = ProjectConfig::default();
    config.sync.resync_on_live_event = false;
    let engine = Engine::new(ledger.clone(), Arc::new(MemoryDocuments::new()), &config);
    let _live = engine.attach_live().await.unwrap();

    mint(&ledger);
    let item = wait_for(&engine, ItemId::new_unchecked(1), |_| true).await;
    assert_eq!(item.name, "Lot #1");
    tokio::time::sleep(Duration::from_millis(50)).await;
    assert!(engine.get(ItemId::new_unchecked(1)).unwrap().history.is_empty());
}

#[tokio::test]
async fn attaching_twice_shares_one_subscription() {
    let ledger = Arc::new(MemoryLedger::new());
    let engine = Engine::new(
        ledger.clone(),
        Arc::new(MemoryDocuments::new()),
        &ProjectConfig::default(),
    );

    let a = engine.attach_live().await.unwrap();
    let b = engine.clone().attach_live().await.unwrap();
    assert_eq!(engine.subscriptions().ref_count(), 2);
    for kind in EventKind::ALL {
        assert_eq!(ledger.subscriber_count(kind), 1, "{kind}");
    }

    drop(a);
    drop(b);
    for kind in EventKind::ALL {
        assert_eq!(ledger.subscriber_count(kind), 0, "{kind}");
    }

    // Re-attaching after a full detach subscribes again.
    let _c = engine.attach_live().await.unwrap();
    assert_eq!(ledger.subscriber_count(EventKind::Transfer), 1);
}
