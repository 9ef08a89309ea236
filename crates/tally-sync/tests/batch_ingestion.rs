//! End-to-end batch behaviour over in-memory handlers

#![allow(clippy::unwrap_used)]

use assert_matches::assert_matches;
use async_trait::async_trait;
use std::time::Duration;

use tally_core::effects::{InboxEffects, LedgerStoreEffects, TransportError};
use tally_core::{
    BillId, BillStatus, ChangePage, EventCursor, EventId, RawEvent, RetryConfig, TallyConfig,
};
use tally_effects::{FixtureInbox, MemoryLedgerStore, TallyEffects};
use tally_ledger::LedgerStateMachine;
use tally_sync::{
    Outcome, ProcessError, SkipReason, SyncCoordinator, SyncError, WakeSignal, WatermarkUpdate,
};
use tally_testkit::{
    roommates, FailingStore, FaultyInbox, FixedClock, RawEventBuilder, RecordingNotifier,
};

type Effects = TallyEffects<FaultyInbox, FailingStore, RecordingNotifier, FixedClock>;

fn config() -> TallyConfig {
    let mut config = TallyConfig::default();
    config.inbox.user = "house@example.com".into();
    config.sync.fetch_retry = RetryConfig::immediate(3);
    config
}

fn setup(inbox: FixtureInbox) -> Effects {
    TallyEffects::new(
        FaultyInbox::new(inbox),
        FailingStore::new(MemoryLedgerStore::with_participants(roommates())),
        RecordingNotifier::new(),
        FixedClock::default(),
    )
}

fn bill_event(id: &str, total: &str) -> RawEvent {
    RawEventBuilder::new(id)
        .total_line(&format!("Amount due: ${total}"))
        .build()
}

#[tokio::test]
async fn test_duplicate_delivery_records_one_bill() {
    let effects = setup(FixtureInbox::new());
    effects.inbox().inner().deliver(bill_event("m1", "90.00"));
    let coordinator = SyncCoordinator::new(&config()).unwrap();

    let first = coordinator.run_batch(&effects, &WakeSignal::empty()).await.unwrap();
    assert_eq!(first.created(), 1);
    assert_eq!(effects.notifier().messages().len(), 3);

    effects.inbox().inner().redeliver(&EventId::new("m1"));
    let second = coordinator.run_batch(&effects, &WakeSignal::empty()).await.unwrap();
    assert_eq!(second.start_cursor, EventCursor::new(2));
    assert_matches!(
        second.events[0].result,
        Ok(Outcome::Processed { created: false, .. })
    );
    assert_eq!(
        second.watermark,
        WatermarkUpdate::Advanced {
            from: Some(EventCursor::new(2)),
            to: EventCursor::new(3)
        }
    );

    assert_eq!(effects.list_bills().await.unwrap().len(), 1);
    assert_eq!(effects.notifier().messages().len(), 3);
}

#[tokio::test]
async fn test_replay_keeps_payments() {
    let effects = setup(FixtureInbox::new());
    effects.inbox().inner().deliver(bill_event("m1", "30.00"));
    let coordinator = SyncCoordinator::new(&config()).unwrap();
    coordinator.run_batch(&effects, &WakeSignal::empty()).await.unwrap();

    let bill_id = BillId::new("m1");
    let snapshot = LedgerStateMachine::new(&effects)
        .mark_debt_paid(&bill_id, &"bob".into(), effects.clock().current(), None)
        .await
        .unwrap();
    assert_eq!(snapshot.bill.status, BillStatus::Partial);

    effects.inbox().inner().redeliver(&EventId::new("m1"));
    coordinator.run_batch(&effects, &WakeSignal::empty()).await.unwrap();

    let bill = effects.get_bill(&bill_id).await.unwrap().unwrap();
    assert_eq!(bill.status, BillStatus::Partial);
    let paid = effects
        .list_debts(&bill_id)
        .await
        .unwrap()
        .into_iter()
        .filter(|d| d.is_paid())
        .count();
    assert_eq!(paid, 1);
}

#[tokio::test]
async fn test_expired_cursor_requires_manual_resync() {
    let effects = setup(FixtureInbox::new());
    effects.inbox().inner().deliver(bill_event("m1", "10.00"));
    let coordinator = SyncCoordinator::new(&config()).unwrap();
    coordinator.run_batch(&effects, &WakeSignal::empty()).await.unwrap();
    assert_eq!(effects.load_watermark().await.unwrap(), Some(EventCursor::new(2)));

    for id in ["m2", "m3", "m4"] {
        effects.inbox().inner().deliver(bill_event(id, "12.00"));
    }
    effects.inbox().inner().expire_before(EventCursor::new(4));

    assert_matches!(
        coordinator.run_batch(&effects, &WakeSignal::empty()).await,
        Err(SyncError::CursorExpired { cursor }) if cursor == EventCursor::new(2)
    );
    assert_eq!(effects.load_watermark().await.unwrap(), Some(EventCursor::new(2)));
    assert!(effects.get_bill(&BillId::new("m2")).await.unwrap().is_none());

    let report = coordinator
        .run_batch_from(&effects, EventCursor::new(4), &WakeSignal::empty())
        .await
        .unwrap();
    assert_eq!(report.events.len(), 1);
    assert_eq!(report.events[0].event_id, EventId::new("m4"));
    assert_eq!(effects.load_watermark().await.unwrap(), Some(EventCursor::new(5)));
}

#[tokio::test]
async fn test_crash_before_watermark_commit_resumes_cleanly() {
    let effects = setup(FixtureInbox::new());
    effects.inbox().inner().deliver(bill_event("m1", "60.00"));
    effects.inbox().inner().deliver(bill_event("m2", "15.00"));
    let coordinator = SyncCoordinator::new(&config()).unwrap();

    effects.store().fail_watermark_writes(true);
    assert_matches!(
        coordinator.run_batch(&effects, &WakeSignal::empty()).await,
        Err(SyncError::Store(_))
    );
    assert_eq!(effects.load_watermark().await.unwrap(), None);
    assert_eq!(effects.list_bills().await.unwrap().len(), 2);
    assert_eq!(effects.notifier().messages().len(), 6);

    effects.store().fail_watermark_writes(false);
    let report = coordinator.run_batch(&effects, &WakeSignal::empty()).await.unwrap();
    assert_eq!(report.processed(), 2);
    assert_eq!(report.created(), 0);
    assert_eq!(effects.list_bills().await.unwrap().len(), 2);
    assert_eq!(effects.notifier().messages().len(), 6);
    assert_eq!(effects.load_watermark().await.unwrap(), Some(EventCursor::new(3)));
}

#[tokio::test]
async fn test_persistence_failure_does_not_hold_watermark() {
    let effects = setup(FixtureInbox::new());
    effects.inbox().inner().deliver(bill_event("m1", "20.00"));
    effects.inbox().inner().deliver(bill_event("m2", "21.00"));
    effects.store().fail_bill("m1");
    let coordinator = SyncCoordinator::new(&config()).unwrap();

    let report = coordinator.run_batch(&effects, &WakeSignal::empty()).await.unwrap();
    assert_matches!(report.events[0].result, Err(ProcessError::Persistence { .. }));
    assert_matches!(report.events[1].result, Ok(Outcome::Processed { created: true, .. }));
    assert_eq!(report.failed().count(), 1);
    assert_eq!(effects.load_watermark().await.unwrap(), Some(EventCursor::new(3)));
}

#[tokio::test]
async fn test_unfetchable_event_holds_watermark() {
    let effects = setup(FixtureInbox::new());
    effects.inbox().inner().deliver(bill_event("m1", "20.00"));
    effects.inbox().inner().deliver(bill_event("m2", "21.00"));
    effects.inbox().fail_fetch_always("m2");
    let coordinator = SyncCoordinator::new(&config()).unwrap();

    assert_matches!(
        coordinator.run_batch(&effects, &WakeSignal::empty()).await,
        Err(SyncError::EventsUnfetched { unfetched }) if unfetched == vec![EventId::new("m2")]
    );
    assert_eq!(effects.inbox().fetch_attempts("m2"), 3);
    assert_eq!(effects.load_watermark().await.unwrap(), None);
    assert!(effects.get_bill(&BillId::new("m1")).await.unwrap().is_some());
}

#[tokio::test]
async fn test_skipped_events_advance_watermark() {
    let effects = setup(FixtureInbox::new());
    effects
        .inbox()
        .inner()
        .deliver(RawEventBuilder::new("chat").plain("Dinner at eight?").build());
    effects.inbox().inner().deliver(bill_event("gone", "5.00"));
    effects.inbox().inner().remove(&EventId::new("gone"));
    let coordinator = SyncCoordinator::new(&config()).unwrap();

    let report = coordinator.run_batch(&effects, &WakeSignal::empty()).await.unwrap();
    assert_eq!(
        report.events[0].result,
        Ok(Outcome::Skipped(SkipReason::NoBillDetected))
    );
    assert_eq!(report.events[1].result, Ok(Outcome::Skipped(SkipReason::Removed)));
    assert_eq!(report.skipped(), 2);
    assert_eq!(effects.load_watermark().await.unwrap(), Some(EventCursor::new(3)));
}

#[tokio::test(start_paused = true)]
async fn test_deadline_aborts_without_commit() {
    let effects = setup(FixtureInbox::new());
    effects.inbox().inner().deliver(bill_event("m1", "20.00"));
    effects.inbox().delay_fetches(Duration::from_secs(30));
    let mut config = config();
    config.sync.batch_deadline_secs = 5;
    let coordinator = SyncCoordinator::new(&config).unwrap();

    assert_matches!(
        coordinator.run_batch(&effects, &WakeSignal::empty()).await,
        Err(SyncError::DeadlineExceeded { seconds: 5 })
    );
    assert_eq!(effects.load_watermark().await.unwrap(), None);
    assert!(effects.list_bills().await.unwrap().is_empty());
}

#[tokio::test]
async fn test_concurrent_batches_never_regress_watermark() {
    let effects = setup(FixtureInbox::new());
    for i in 0..8 {
        effects
            .inbox()
            .inner()
            .deliver(bill_event(&format!("m{i}"), "9.99"));
    }
    let coordinator = SyncCoordinator::new(&config()).unwrap();

    let wake_a = WakeSignal::empty();
    let wake_b = WakeSignal::empty();
    let (a, b) = tokio::join!(
        coordinator.run_batch(&effects, &wake_a),
        coordinator.run_batch_from(&effects, EventCursor::new(5), &wake_b),
    );
    a.unwrap();
    b.unwrap();

    assert_eq!(effects.list_bills().await.unwrap().len(), 8);
    assert_eq!(effects.load_watermark().await.unwrap(), Some(EventCursor::new(9)));
    assert_eq!(effects.notifier().messages().len(), 24);
}

/// Inbox that never reports a cursor with its listings
struct CursorlessInbox(FixtureInbox);

#[async_trait]
impl InboxEffects for CursorlessInbox {
    async fn fetch_event(&self, id: &EventId) -> Result<RawEvent, TransportError> {
        self.0.fetch_event(id).await
    }

    async fn list_changes(
        &self,
        cursor: EventCursor,
        page_token: Option<&str>,
    ) -> Result<ChangePage, TransportError> {
        let mut page = self.0.list_changes(cursor, page_token).await?;
        page.cursor = None;
        Ok(page)
    }
}

#[tokio::test]
async fn test_wake_hint_is_the_fallback_candidate() {
    let inbox = FixtureInbox::new();
    inbox.deliver(bill_event("m1", "20.00"));
    let effects = TallyEffects::new(
        CursorlessInbox(inbox),
        MemoryLedgerStore::with_participants(roommates()),
        RecordingNotifier::new(),
        FixedClock::default(),
    );
    let coordinator = SyncCoordinator::new(&config()).unwrap();

    let report = coordinator.run_batch(&effects, &WakeSignal::empty()).await.unwrap();
    assert_eq!(report.watermark, WatermarkUpdate::NoCandidate);
    assert_eq!(effects.load_watermark().await.unwrap(), None);

    let report = coordinator
        .run_batch(&effects, &WakeSignal::with_hint(EventCursor::new(40)))
        .await
        .unwrap();
    assert_eq!(
        report.watermark,
        WatermarkUpdate::Advanced {
            from: None,
            to: EventCursor::new(40)
        }
    );
    assert_eq!(report.created(), 0);
}
