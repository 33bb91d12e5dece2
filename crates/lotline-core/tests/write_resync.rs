//! Write-then-resync: local checks, classification, optimistic projection,
//! and the follow-up resync.

use std::sync::Arc;

use lotline_core::Engine;
use lotline_core::config::ProjectConfig;
use lotline_core::error::ErrorCode;
use lotline_core::event::EventKind;
use lotline_core::ledger::{LedgerCall, LedgerError, MemoryLedger};
use lotline_core::model::{Address, EntryKind, ItemId, Role, Status};
use lotline_core::storage::MemoryDocuments;
use lotline_core::sync::{WriteAction, WriteFailure};

const FARMER: &str = "0x00000000000000000000000000000000000000a1";
const INSPECTOR: &str = "0x00000000000000000000000000000000000000b1";
const CARRIER: &str = "0x00000000000000000000000000000000000000c1";
const RETAILER: &str = "0x00000000000000000000000000000000000000d1";

fn addr(raw: &str) -> Address {
    Address::new(raw)
}

fn id(raw: u64) -> ItemId {
    ItemId::new_unchecked(raw)
}

async fn registered() -> (Arc<MemoryLedger>, Engine) {
    let ledger = Arc::new(MemoryLedger::new());
    let engine = Engine::new(
        ledger.clone(),
        Arc::new(MemoryDocuments::new()),
        &ProjectConfig::default(),
    );
    engine
        .perform(
            &addr(FARMER),
            WriteAction::Register {
                metadata_pointer: "ipfs://QmLychee".to_string(),
            },
        )
        .await
        .unwrap();
    (ledger, engine)
}

async fn delivered() -> (Arc<MemoryLedger>, Engine) {
    let (ledger, engine) = registered().await;
    engine
        .perform(
            &addr(INSPECTOR),
            WriteAction::Attest {
                item: id(1),
                metadata_pointer: None,
            },
        )
        .await
        .unwrap();
    engine
        .perform(
            &addr(FARMER),
            WriteAction::Transfer {
                item: id(1),
                to: addr(CARRIER),
            },
        )
        .await
        .unwrap();
    engine
        .perform(
            &addr(CARRIER),
            WriteAction::Transfer {
                item: id(1),
                to: addr(RETAILER),
            },
        )
        .await
        .unwrap();
    (ledger, engine)
}

#[tokio::test]
async fn register_creates_shell_and_resyncs_registration() {
    let (_ledger, engine) = registered().await;
    let item = engine.get(id(1)).unwrap();
    assert_eq!(item.name, "Lot #1");
    assert_eq!(item.status, Status::Created);
    assert_eq!(item.holder_address, Some(addr(FARMER)));
    assert_eq!(item.metadata_ref.as_deref(), Some("ipfs://QmLychee"));
    assert_eq!(item.history.len(), 1);
    assert_eq!(item.history[0].kind, EntryKind::Registered);
}

#[tokio::test]
async fn attest_projects_and_replaces_pointer() {
    let (_ledger, engine) = registered().await;
    let outcome = engine
        .perform(
            &addr(INSPECTOR),
            WriteAction::Attest {
                item: id(1),
                metadata_pointer: Some("ipfs://QmCertified".to_string()),
            },
        )
        .await
        .unwrap();

    let change = outcome.projection.unwrap();
    assert_eq!(change.from, Status::Created);
    assert_eq!(change.to, Status::Inspecting);
    assert!(change.history.is_none());
    assert_eq!(outcome.resync.unwrap().appended, 1);

    let item = engine.get(id(1)).unwrap();
    assert_eq!(item.metadata_ref.as_deref(), Some("ipfs://QmCertified"));
    assert!(item.metadata.is_none());
    assert_eq!(
        item.timeline()[0].kind,
        EntryKind::Attested,
        "newest entry is the attestation"
    );
}

#[tokio::test]
async fn transfers_advance_status_and_role() {
    let (_ledger, engine) = delivered().await;
    let item = engine.get(id(1)).unwrap();
    assert_eq!(item.status, Status::Delivered);
    assert_eq!(item.holder_role, Role::Retailer);
    assert_eq!(item.holder_address, Some(addr(RETAILER)));
    // registered, attested, and two entries per custody hop
    assert_eq!(item.history.len(), 6);
}

#[tokio::test]
async fn retail_then_archive() {
    let (_ledger, engine) = delivered().await;
    for expected in [Status::Retailed, Status::Consumed] {
        let outcome = engine
            .perform(&addr(RETAILER), WriteAction::AdvanceRetail { item: id(1) })
            .await
            .unwrap();
        assert_eq!(outcome.projection.unwrap().to, expected);
    }

    engine
        .perform(&addr(RETAILER), WriteAction::Archive { item: id(1) })
        .await
        .unwrap();
    let item = engine.get(id(1)).unwrap();
    assert_eq!(item.status, Status::Consumed);
    assert_eq!(item.holder_role, Role::Archive);
    assert_eq!(item.holder_address, Some(addr(Address::ARCHIVE_VAULT)));

    // A full replay agrees with the optimistic projection.
    engine.load_all().await.unwrap();
    assert_eq!(engine.get(id(1)).unwrap().holder_role, Role::Archive);
}

#[tokio::test]
async fn recall_then_quarantine() {
    let (_ledger, engine) = registered().await;
    engine
        .perform(
            &addr(FARMER),
            WriteAction::Recall {
                item: id(1),
                reason: "QmReason".to_string(),
            },
        )
        .await
        .unwrap();
    engine
        .perform(&addr(FARMER), WriteAction::Quarantine { item: id(1) })
        .await
        .unwrap();

    let item = engine.get(id(1)).unwrap();
    assert_eq!(item.status, Status::Recalled);
    assert_eq!(item.holder_role, Role::Quarantine);
    assert_eq!(item.holder_address, Some(addr(Address::QUARANTINE_VAULT)));

    let err = engine
        .perform(&addr(FARMER), WriteAction::Quarantine { item: id(1) })
        .await
        .unwrap_err();
    assert!(err.to_string().contains("already in quarantine"));
}

#[tokio::test]
async fn precondition_failures_never_reach_the_ledger() {
    let (ledger, engine) = registered().await;
    let height = ledger.height();

    let err = engine
        .perform(
            &addr(CARRIER),
            WriteAction::Transfer {
                item: id(1),
                to: addr(RETAILER),
            },
        )
        .await
        .unwrap_err();
    assert!(matches!(err, WriteFailure::Precondition(_)));
    assert_eq!(err.code(), ErrorCode::PreconditionFailed);

    let err = engine
        .perform(&addr(FARMER), WriteAction::Archive { item: id(9) })
        .await
        .unwrap_err();
    assert_eq!(err, WriteFailure::UnknownItem(id(9)));
    assert_eq!(ledger.height(), height);
}

#[tokio::test]
async fn signer_rejection_is_classified() {
    let (ledger, engine) = registered().await;
    ledger.faults(|f| f.reject_next_write = Some(LedgerError::Rejected));

    let err = engine
        .perform(
            &addr(INSPECTOR),
            WriteAction::Attest {
                item: id(1),
                metadata_pointer: None,
            },
        )
        .await
        .unwrap_err();
    assert_eq!(err, WriteFailure::UserRejected);
    assert_eq!(err.to_string(), "Transaction rejected by user");
    assert_eq!(engine.get(id(1)).unwrap().status, Status::Created);
}

#[tokio::test]
async fn stale_projection_surfaces_revert_reason() {
    let (ledger, engine) = registered().await;
    // Recalled on the ledger behind the engine's back.
    ledger
        .execute(
            &addr(FARMER),
            &LedgerCall::Recall {
                item: id(1),
                reason: "QmOther".to_string(),
            },
        )
        .unwrap();

    let err = engine
        .perform(
            &addr(FARMER),
            WriteAction::Recall {
                item: id(1),
                reason: "QmReason".to_string(),
            },
        )
        .await
        .unwrap_err();
    assert_eq!(err, WriteFailure::Reverted("Already recalled".to_string()));
    assert_eq!(err.code(), ErrorCode::WriteReverted);
}

#[tokio::test]
async fn failed_resync_does_not_fail_the_write() {
    let (ledger, engine) = registered().await;
    ledger.faults(|f| {
        f.event_queries.insert(EventKind::Inspected);
    });

    let outcome = engine
        .perform(
            &addr(INSPECTOR),
            WriteAction::Attest {
                item: id(1),
                metadata_pointer: None,
            },
        )
        .await
        .unwrap();
    assert!(outcome.resync.is_none());
    let item = engine.get(id(1)).unwrap();
    assert_eq!(item.status, Status::Inspecting);
    assert_eq!(item.history.len(), 1);
}
