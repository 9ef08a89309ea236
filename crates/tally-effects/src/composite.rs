//! Composite effect bundle
//!
//! Combines one inbox, one store (which also answers directory queries), one
//! notifier and one clock into a single value implementing every effect trait
//! by delegation.

use async_trait::async_trait;
use chrono::{DateTime, Utc};

use tally_core::effects::{
    BillTransaction, DirectoryEffects, InboxEffects, LedgerStoreEffects, NotificationEffects,
    NotifyError, OutboundMessage, StoreError, TimeEffects, TransportError,
};
use tally_core::{Bill, BillId, ChangePage, Debt, EventCursor, EventId, Participant, RawEvent};

/// One handler per effect trait
#[derive(Debug, Clone)]
pub struct TallyEffects<I, S, N, T> {
    inbox: I,
    store: S,
    notifier: N,
    clock: T,
}

impl<I, S, N, T> TallyEffects<I, S, N, T> {
    /// Bundle the given handlers
    pub fn new(inbox: I, store: S, notifier: N, clock: T) -> Self {
        Self {
            inbox,
            store,
            notifier,
            clock,
        }
    }

    /// Inbox handler
    pub fn inbox(&self) -> &I {
        &self.inbox
    }

    /// Store handler
    pub fn store(&self) -> &S {
        &self.store
    }

    /// Notification handler
    pub fn notifier(&self) -> &N {
        &self.notifier
    }

    /// Clock handler
    pub fn clock(&self) -> &T {
        &self.clock
    }

    /// Split back into the individual handlers
    pub fn into_parts(self) -> (I, S, N, T) {
        (self.inbox, self.store, self.notifier, self.clock)
    }
}

#[async_trait]
impl<I, S, N, T> InboxEffects for TallyEffects<I, S, N, T>
where
    I: InboxEffects,
    S: Send + Sync,
    N: Send + Sync,
    T: Send + Sync,
{
    async fn fetch_event(&self, id: &EventId) -> Result<RawEvent, TransportError> {
        self.inbox.fetch_event(id).await
    }

    async fn list_changes(
        &self,
        cursor: EventCursor,
        page_token: Option<&str>,
    ) -> Result<ChangePage, TransportError> {
        self.inbox.list_changes(cursor, page_token).await
    }
}

#[async_trait]
impl<I, S, N, T> LedgerStoreEffects for TallyEffects<I, S, N, T>
where
    I: Send + Sync,
    S: LedgerStoreEffects,
    N: Send + Sync,
    T: Send + Sync,
{
    async fn get_bill(&self, id: &BillId) -> Result<Option<Bill>, StoreError> {
        self.store.get_bill(id).await
    }

    async fn list_debts(&self, id: &BillId) -> Result<Vec<Debt>, StoreError> {
        self.store.list_debts(id).await
    }

    async fn list_bills(&self) -> Result<Vec<Bill>, StoreError> {
        self.store.list_bills().await
    }

    async fn begin_bill(&self, id: &BillId) -> Result<Box<dyn BillTransaction>, StoreError> {
        self.store.begin_bill(id).await
    }

    async fn load_watermark(&self) -> Result<Option<EventCursor>, StoreError> {
        self.store.load_watermark().await
    }

    async fn compare_and_set_watermark(
        &self,
        expected: Option<EventCursor>,
        next: EventCursor,
    ) -> Result<bool, StoreError> {
        self.store.compare_and_set_watermark(expected, next).await
    }
}

#[async_trait]
impl<I, S, N, T> DirectoryEffects for TallyEffects<I, S, N, T>
where
    I: Send + Sync,
    S: DirectoryEffects,
    N: Send + Sync,
    T: Send + Sync,
{
    async fn active_participants(&self) -> Result<Vec<Participant>, StoreError> {
        self.store.active_participants().await
    }
}

#[async_trait]
impl<I, S, N, T> NotificationEffects for TallyEffects<I, S, N, T>
where
    I: Send + Sync,
    S: Send + Sync,
    N: NotificationEffects,
    T: Send + Sync,
{
    async fn send(&self, message: &OutboundMessage) -> Result<(), NotifyError> {
        self.notifier.send(message).await
    }
}

#[async_trait]
impl<I, S, N, T> TimeEffects for TallyEffects<I, S, N, T>
where
    I: Send + Sync,
    S: Send + Sync,
    N: Send + Sync,
    T: TimeEffects,
{
    async fn now(&self) -> DateTime<Utc> {
        self.clock.now().await
    }
}
