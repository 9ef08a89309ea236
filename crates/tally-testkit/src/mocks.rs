//! Fault-injecting handlers
//!
//! Each wrapper delegates to a real handler and fails selected calls on
//! demand, so tests can drive the retry, hold and continue paths of the sync
//! pipeline.

use async_trait::async_trait;
use parking_lot::Mutex;
use std::collections::{HashMap, HashSet};
use std::time::Duration;

use tally_core::effects::{
    BillTransaction, DirectoryEffects, InboxEffects, LedgerStoreEffects, NotificationEffects,
    NotifyError, OutboundMessage, StoreError, TransportError,
};
use tally_core::{Bill, BillId, ChangePage, Debt, EventCursor, EventId, Participant, RawEvent};
use tally_effects::{FixtureInbox, MemoryLedgerStore};

/// Inbox wrapper that fails fetches and listings on demand
#[derive(Debug)]
pub struct FaultyInbox<I = FixtureInbox> {
    inner: I,
    fetch_failures: Mutex<HashMap<EventId, u32>>,
    fetch_attempts: Mutex<HashMap<EventId, u32>>,
    listing_failure: Mutex<Option<TransportError>>,
    listing_calls: Mutex<u32>,
    fetch_delay: Mutex<Option<Duration>>,
}

impl<I> FaultyInbox<I> {
    /// Wrap `inner` with no faults configured
    pub fn new(inner: I) -> Self {
        Self {
            inner,
            fetch_failures: Mutex::new(HashMap::new()),
            fetch_attempts: Mutex::new(HashMap::new()),
            listing_failure: Mutex::new(None),
            listing_calls: Mutex::new(0),
            fetch_delay: Mutex::new(None),
        }
    }

    /// The wrapped inbox
    pub fn inner(&self) -> &I {
        &self.inner
    }

    /// Fail the next `times` fetches of `id` as unavailable
    pub fn fail_fetch(&self, id: impl Into<EventId>, times: u32) {
        self.fetch_failures.lock().insert(id.into(), times);
    }

    /// Fail every fetch of `id`
    pub fn fail_fetch_always(&self, id: impl Into<EventId>) {
        self.fail_fetch(id, u32::MAX);
    }

    /// Fail every listing with `error` until cleared
    pub fn fail_listing(&self, error: TransportError) {
        *self.listing_failure.lock() = Some(error);
    }

    /// Stop failing listings
    pub fn clear_listing_failure(&self) {
        *self.listing_failure.lock() = None;
    }

    /// Sleep before answering each fetch
    pub fn delay_fetches(&self, delay: Duration) {
        *self.fetch_delay.lock() = Some(delay);
    }

    /// Number of fetch calls seen for `id`
    pub fn fetch_attempts(&self, id: &str) -> u32 {
        self.fetch_attempts
            .lock()
            .get(&EventId::new(id))
            .copied()
            .unwrap_or(0)
    }

    /// Number of listing calls seen
    pub fn listing_calls(&self) -> u32 {
        *self.listing_calls.lock()
    }
}

#[async_trait]
impl<I: InboxEffects> InboxEffects for FaultyInbox<I> {
    async fn fetch_event(&self, id: &EventId) -> Result<RawEvent, TransportError> {
        *self.fetch_attempts.lock().entry(id.clone()).or_insert(0) += 1;

        let delay = *self.fetch_delay.lock();
        if let Some(delay) = delay {
            tokio::time::sleep(delay).await;
        }

        let injected = {
            let mut failures = self.fetch_failures.lock();
            match failures.get_mut(id) {
                Some(remaining) if *remaining > 0 => {
                    if *remaining != u32::MAX {
                        *remaining -= 1;
                    }
                    true
                }
                _ => false,
            }
        };
        if injected {
            return Err(TransportError::unavailable(format!("injected fetch failure for {id}")));
        }
        self.inner.fetch_event(id).await
    }

    async fn list_changes(
        &self,
        cursor: EventCursor,
        page_token: Option<&str>,
    ) -> Result<ChangePage, TransportError> {
        *self.listing_calls.lock() += 1;
        let failure = self.listing_failure.lock().clone();
        if let Some(error) = failure {
            return Err(error);
        }
        self.inner.list_changes(cursor, page_token).await
    }
}

/// Notifier that records every message and can reject chosen recipients
#[derive(Debug, Default)]
pub struct RecordingNotifier {
    sent: Mutex<Vec<OutboundMessage>>,
    rejected: Mutex<HashSet<String>>,
}

impl RecordingNotifier {
    /// Create an empty recorder
    pub fn new() -> Self {
        Self::default()
    }

    /// Reject every message to `recipient`
    pub fn reject(&self, recipient: impl Into<String>) {
        self.rejected.lock().insert(recipient.into());
    }

    /// Messages accepted so far
    pub fn messages(&self) -> Vec<OutboundMessage> {
        self.sent.lock().clone()
    }

    /// Messages accepted for one recipient
    pub fn messages_to(&self, recipient: &str) -> Vec<OutboundMessage> {
        self.sent
            .lock()
            .iter()
            .filter(|m| m.to == recipient)
            .cloned()
            .collect()
    }
}

#[async_trait]
impl NotificationEffects for RecordingNotifier {
    async fn send(&self, message: &OutboundMessage) -> Result<(), NotifyError> {
        if self.rejected.lock().contains(&message.to) {
            return Err(NotifyError::Rejected {
                recipient: message.to.clone(),
                reason: "injected rejection".into(),
            });
        }
        self.sent.lock().push(message.clone());
        Ok(())
    }
}

/// Store wrapper that fails chosen bills or watermark writes
#[derive(Debug, Default)]
pub struct FailingStore {
    inner: MemoryLedgerStore,
    failing_bills: Mutex<HashSet<BillId>>,
    fail_watermark: Mutex<bool>,
}

impl FailingStore {
    /// Wrap a memory store
    pub fn new(inner: MemoryLedgerStore) -> Self {
        Self {
            inner,
            ..Self::default()
        }
    }

    /// The wrapped store
    pub fn inner(&self) -> &MemoryLedgerStore {
        &self.inner
    }

    /// Fail every transaction on `id`
    pub fn fail_bill(&self, id: impl Into<BillId>) {
        self.failing_bills.lock().insert(id.into());
    }

    /// Fail (or stop failing) watermark writes
    pub fn fail_watermark_writes(&self, fail: bool) {
        *self.fail_watermark.lock() = fail;
    }
}

#[async_trait]
impl LedgerStoreEffects for FailingStore {
    async fn get_bill(&self, id: &BillId) -> Result<Option<Bill>, StoreError> {
        self.inner.get_bill(id).await
    }

    async fn list_debts(&self, id: &BillId) -> Result<Vec<Debt>, StoreError> {
        self.inner.list_debts(id).await
    }

    async fn list_bills(&self) -> Result<Vec<Bill>, StoreError> {
        self.inner.list_bills().await
    }

    async fn begin_bill(&self, id: &BillId) -> Result<Box<dyn BillTransaction>, StoreError> {
        if self.failing_bills.lock().contains(id) {
            return Err(StoreError::backend(format!("injected failure for bill {id}")));
        }
        self.inner.begin_bill(id).await
    }

    async fn load_watermark(&self) -> Result<Option<EventCursor>, StoreError> {
        self.inner.load_watermark().await
    }

    async fn compare_and_set_watermark(
        &self,
        expected: Option<EventCursor>,
        next: EventCursor,
    ) -> Result<bool, StoreError> {
        if *self.fail_watermark.lock() {
            return Err(StoreError::backend("injected watermark failure"));
        }
        self.inner.compare_and_set_watermark(expected, next).await
    }
}

#[async_trait]
impl DirectoryEffects for FailingStore {
    async fn active_participants(&self) -> Result<Vec<Participant>, StoreError> {
        self.inner.active_participants().await
    }
}
