//! Ingestion against the on-disk store, including a process restart

#![allow(clippy::unwrap_used)]

use tally_core::effects::LedgerStoreEffects;
use tally_core::{
    Amount, BillId, BillStatus, Debt, DebtStatus, EventCursor, ParticipantId, TallyConfig,
};
use tally_effects::{FilesystemLedgerStore, FixtureInbox, TallyEffects};
use tally_sync::{SyncCoordinator, WakeSignal};
use tally_testkit::{roommates, FixedClock, RawEventBuilder, RecordingNotifier};

async fn open_store(root: &std::path::Path) -> FilesystemLedgerStore {
    let store = FilesystemLedgerStore::open(root).await.unwrap();
    for participant in roommates() {
        store.upsert_participant(&participant).await.unwrap();
    }
    store
}

#[tokio::test]
async fn test_restart_resumes_from_persisted_watermark() {
    let dir = tempfile::tempdir().unwrap();
    let mut config = TallyConfig::default();
    config.inbox.user = "house@example.com".into();
    let coordinator = SyncCoordinator::new(&config).unwrap();

    let inbox = FixtureInbox::new();
    inbox.deliver(
        RawEventBuilder::new("m1")
            .total_line("Total amount due: $1,234.56")
            .build(),
    );

    let effects = TallyEffects::new(
        inbox,
        open_store(dir.path()).await,
        RecordingNotifier::new(),
        FixedClock::default(),
    );
    let report = coordinator.run_batch(&effects, &WakeSignal::empty()).await.unwrap();
    assert_eq!(report.created(), 1);

    let (inbox, _, _, _) = effects.into_parts();
    inbox.deliver(RawEventBuilder::new("m2").total_line("Total: $9.00").build());
    inbox.redeliver(&"m1".into());

    let effects = TallyEffects::new(
        inbox,
        FilesystemLedgerStore::open(dir.path()).await.unwrap(),
        RecordingNotifier::new(),
        FixedClock::default(),
    );
    assert_eq!(effects.load_watermark().await.unwrap(), Some(EventCursor::new(2)));

    let report = coordinator.run_batch(&effects, &WakeSignal::empty()).await.unwrap();
    assert_eq!(report.processed(), 2);
    assert_eq!(report.created(), 1);
    assert_eq!(effects.notifier().messages().len(), 3);
    assert_eq!(effects.load_watermark().await.unwrap(), Some(EventCursor::new(4)));

    let debts = effects.list_debts(&BillId::new("m1")).await.unwrap();
    let total: Amount = debts.iter().map(|d| d.amount).sum();
    assert_eq!(total, Amount::from_cents(123_456));
    assert_eq!(effects.list_bills().await.unwrap().len(), 2);
}

#[tokio::test]
async fn test_creation_discards_debts_left_by_interrupted_commit() {
    let dir = tempfile::tempdir().unwrap();
    let store = open_store(dir.path()).await;

    // A commit that wrote debts and died before bill.json leaves these behind.
    let debts_dir = dir.path().join("bills/m1/debts");
    std::fs::create_dir_all(&debts_dir).unwrap();
    let mut leftover = Debt::pending(
        BillId::new("m1"),
        ParticipantId::new("zed"),
        Amount::from_cents(5_000),
    );
    leftover.status = DebtStatus::Paid;
    std::fs::write(
        debts_dir.join("zed.json"),
        serde_json::to_vec(&leftover).unwrap(),
    )
    .unwrap();
    let mut stale_alice = Debt::pending(
        BillId::new("m1"),
        ParticipantId::new("alice"),
        Amount::from_cents(1),
    );
    stale_alice.status = DebtStatus::Paid;
    std::fs::write(
        debts_dir.join("alice.json"),
        serde_json::to_vec(&stale_alice).unwrap(),
    )
    .unwrap();

    let inbox = FixtureInbox::new();
    inbox.deliver(RawEventBuilder::new("m1").total_line("Total: $90.00").build());
    let effects = TallyEffects::new(inbox, store, RecordingNotifier::new(), FixedClock::default());
    let mut config = TallyConfig::default();
    config.inbox.user = "house@example.com".into();
    let report = SyncCoordinator::new(&config)
        .unwrap()
        .run_batch(&effects, &WakeSignal::empty())
        .await
        .unwrap();
    assert_eq!(report.created(), 1);

    let bill = effects.get_bill(&BillId::new("m1")).await.unwrap().unwrap();
    let debts = effects.list_debts(&BillId::new("m1")).await.unwrap();
    let ids: Vec<_> = debts.iter().map(|d| d.participant_id.as_str()).collect();
    assert_eq!(ids, vec!["alice", "bob", "carol"]);
    assert!(debts.iter().all(|d| !d.is_paid()));
    let total: Amount = debts.iter().map(|d| d.amount).sum();
    assert_eq!(total, bill.total_amount);
    assert_eq!(bill.status, BillStatus::Unpaid);
    assert!(!debts_dir.join("zed.json").exists());
}
