//! In-memory ledger store
//!
//! Also serves as the participant directory. Used by tests and by the CLI when
//! no store path is configured.

use async_trait::async_trait;
use parking_lot::Mutex;
use std::collections::{BTreeMap, HashMap};
use std::sync::Arc;
use tokio::sync::{OwnedMutexGuard, RwLock};

use tally_core::effects::{
    BillTransaction, DirectoryEffects, LedgerStoreEffects, StagedBill, StoreError,
};
use tally_core::{Bill, BillId, BillStatus, Debt, EventCursor, Participant, ParticipantId};

use super::BillLocks;

#[derive(Debug, Default)]
struct LedgerState {
    bills: HashMap<BillId, Bill>,
    debts: HashMap<BillId, BTreeMap<ParticipantId, Debt>>,
}

/// In-memory ledger store and participant directory
#[derive(Debug, Default)]
pub struct MemoryLedgerStore {
    state: Arc<RwLock<LedgerState>>,
    participants: RwLock<BTreeMap<ParticipantId, Participant>>,
    watermark: Mutex<Option<EventCursor>>,
    locks: BillLocks,
}

impl MemoryLedgerStore {
    /// Create an empty store
    pub fn new() -> Self {
        Self::default()
    }

    /// Create a store whose directory holds `participants`
    pub fn with_participants(participants: impl IntoIterator<Item = Participant>) -> Self {
        let directory = participants
            .into_iter()
            .map(|p| (p.id.clone(), p))
            .collect();
        Self {
            participants: RwLock::new(directory),
            ..Self::default()
        }
    }

    /// Insert or replace a directory entry
    pub async fn upsert_participant(&self, participant: Participant) {
        self.participants
            .write()
            .await
            .insert(participant.id.clone(), participant);
    }

    /// Every directory entry, active or not, ordered by id
    pub async fn list_participants(&self) -> Vec<Participant> {
        self.participants.read().await.values().cloned().collect()
    }
}

#[async_trait]
impl LedgerStoreEffects for MemoryLedgerStore {
    async fn get_bill(&self, id: &BillId) -> Result<Option<Bill>, StoreError> {
        Ok(self.state.read().await.bills.get(id).cloned())
    }

    async fn list_debts(&self, id: &BillId) -> Result<Vec<Debt>, StoreError> {
        let state = self.state.read().await;
        Ok(state
            .debts
            .get(id)
            .map(|debts| debts.values().cloned().collect())
            .unwrap_or_default())
    }

    async fn list_bills(&self) -> Result<Vec<Bill>, StoreError> {
        let state = self.state.read().await;
        let mut bills: Vec<Bill> = state.bills.values().cloned().collect();
        bills.sort_by(|a, b| a.id.cmp(&b.id));
        Ok(bills)
    }

    async fn begin_bill(&self, id: &BillId) -> Result<Box<dyn BillTransaction>, StoreError> {
        let guard = self.locks.acquire(id).await;
        let (bill, debts) = {
            let state = self.state.read().await;
            let bill = state.bills.get(id).cloned();
            let debts = state
                .debts
                .get(id)
                .map(|debts| debts.values().cloned().collect())
                .unwrap_or_default();
            (bill, debts)
        };
        Ok(Box::new(MemoryBillTransaction {
            staged: StagedBill::new(id.clone(), bill, debts),
            state: Arc::clone(&self.state),
            _guard: guard,
        }))
    }

    async fn load_watermark(&self) -> Result<Option<EventCursor>, StoreError> {
        Ok(*self.watermark.lock())
    }

    async fn compare_and_set_watermark(
        &self,
        expected: Option<EventCursor>,
        next: EventCursor,
    ) -> Result<bool, StoreError> {
        let mut watermark = self.watermark.lock();
        if *watermark != expected {
            return Ok(false);
        }
        *watermark = Some(next);
        Ok(true)
    }
}

#[async_trait]
impl DirectoryEffects for MemoryLedgerStore {
    async fn active_participants(&self) -> Result<Vec<Participant>, StoreError> {
        let participants = self.participants.read().await;
        Ok(participants.values().filter(|p| p.active).cloned().collect())
    }
}

struct MemoryBillTransaction {
    staged: StagedBill,
    state: Arc<RwLock<LedgerState>>,
    _guard: OwnedMutexGuard<()>,
}

#[async_trait]
impl BillTransaction for MemoryBillTransaction {
    fn bill(&self) -> Option<&Bill> {
        self.staged.bill()
    }

    fn debts(&self) -> &[Debt] {
        self.staged.debts()
    }

    fn put_bill(&mut self, bill: Bill) -> Result<(), StoreError> {
        self.staged.put_bill(bill)
    }

    fn put_debt(&mut self, debt: Debt) -> Result<(), StoreError> {
        self.staged.put_debt(debt)
    }

    fn remove_debt(&mut self, participant_id: &ParticipantId) -> Result<(), StoreError> {
        self.staged.remove_debt(participant_id);
        Ok(())
    }

    fn set_status(&mut self, status: BillStatus) -> Result<(), StoreError> {
        self.staged.set_status(status)
    }

    async fn commit(self: Box<Self>) -> Result<(), StoreError> {
        self.staged.check_consistency()?;
        if !self.staged.is_dirty() {
            return Ok(());
        }

        let mut state = self.state.write().await;
        let debts = state.debts.entry(self.staged.id().clone()).or_default();
        for participant in self.staged.removed_debts() {
            debts.remove(participant);
        }
        for debt in self.staged.dirty_debts() {
            debts.insert(debt.participant_id.clone(), debt.clone());
        }
        if let Some(bill) = self.staged.dirty_bill() {
            state.bills.insert(bill.id.clone(), bill.clone());
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Utc;
    use tally_core::{Amount, EventId};

    fn bill(id: &str) -> Bill {
        Bill {
            id: BillId::new(id),
            biller_name: "gas@utility.example".into(),
            total_amount: Amount::from_cents(2000),
            status: BillStatus::Unpaid,
            due_date: None,
            date_received: Utc::now(),
            source_event_id: EventId::new(id),
            currency: "USD".into(),
            created_at: Utc::now(),
        }
    }

    #[tokio::test]
    async fn test_uncommitted_transaction_is_invisible() {
        let store = MemoryLedgerStore::new();
        let id = BillId::new("b1");

        let mut tx = store.begin_bill(&id).await.unwrap();
        tx.put_bill(bill("b1")).unwrap();
        assert!(store.get_bill(&id).await.unwrap().is_none());
        drop(tx);
        assert!(store.get_bill(&id).await.unwrap().is_none());

        let mut tx = store.begin_bill(&id).await.unwrap();
        tx.put_bill(bill("b1")).unwrap();
        tx.put_debt(Debt::pending(id.clone(), ParticipantId::new("amy"), Amount::from_cents(2000)))
            .unwrap();
        tx.commit().await.unwrap();

        assert!(store.get_bill(&id).await.unwrap().is_some());
        assert_eq!(store.list_debts(&id).await.unwrap().len(), 1);
    }

    #[tokio::test]
    async fn test_watermark_compare_and_set() {
        let store = MemoryLedgerStore::new();
        assert_eq!(store.load_watermark().await.unwrap(), None);

        assert!(store
            .compare_and_set_watermark(None, EventCursor::new(10))
            .await
            .unwrap());
        assert!(!store
            .compare_and_set_watermark(None, EventCursor::new(11))
            .await
            .unwrap());
        assert!(store
            .compare_and_set_watermark(Some(EventCursor::new(10)), EventCursor::new(12))
            .await
            .unwrap());
        assert_eq!(store.load_watermark().await.unwrap(), Some(EventCursor::new(12)));
    }

    #[tokio::test]
    async fn test_directory_filters_inactive_and_orders_by_id() {
        let store = MemoryLedgerStore::with_participants(vec![
            Participant::new("zoe", "zoe@example.com"),
            Participant::new("amy", "amy@example.com"),
            Participant::new("max", "max@example.com").with_active(false),
        ]);
        let active: Vec<_> = store
            .active_participants()
            .await
            .unwrap()
            .into_iter()
            .map(|p| p.id)
            .collect();
        assert_eq!(active, vec![ParticipantId::new("amy"), ParticipantId::new("zoe")]);
        assert_eq!(store.list_participants().await.len(), 3);
    }
}
