//! Ledger store effects
//!
//! The store persists bills, their debts and the process-wide sync watermark.
//! Writes to one bill and its debts go through a [`BillTransaction`], which the
//! handler must serialise against every other transaction on the same bill:
//! reads inside the transaction observe committed state plus the
//! transaction's own staged writes, and nothing is visible to other callers
//! until [`BillTransaction::commit`] succeeds. Dropping an uncommitted
//! transaction discards it.

use async_trait::async_trait;
use serde::{Deserialize, Serialize};

use crate::{Bill, BillId, BillStatus, Debt, EventCursor, ParticipantId};

/// Error type for store operations
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, thiserror::Error)]
pub enum StoreError {
    /// The backend failed to read or write
    #[error("Storage backend failed: {reason}")]
    Backend {
        /// Failure description
        reason: String,
    },
    /// A stored document could not be encoded or decoded
    #[error("Stored document is malformed: {reason}")]
    Serialization {
        /// Failure description
        reason: String,
    },
    /// A write was rejected because the record is inconsistent
    #[error("Invalid record: {reason}")]
    InvalidRecord {
        /// Failure description
        reason: String,
    },
}

impl StoreError {
    /// Create a backend error
    pub fn backend(reason: impl Into<String>) -> Self {
        Self::Backend {
            reason: reason.into(),
        }
    }

    /// Create a serialization error
    pub fn serialization(reason: impl Into<String>) -> Self {
        Self::Serialization {
            reason: reason.into(),
        }
    }

    /// Create an invalid record error
    pub fn invalid_record(reason: impl Into<String>) -> Self {
        Self::InvalidRecord {
            reason: reason.into(),
        }
    }
}

impl From<serde_json::Error> for StoreError {
    fn from(err: serde_json::Error) -> Self {
        Self::serialization(err.to_string())
    }
}

/// Persistence for bills, debts and the sync watermark
#[async_trait]
pub trait LedgerStoreEffects: Send + Sync {
    /// Read a committed bill
    async fn get_bill(&self, id: &BillId) -> Result<Option<Bill>, StoreError>;

    /// Read every committed debt of a bill, ordered by participant id
    async fn list_debts(&self, id: &BillId) -> Result<Vec<Debt>, StoreError>;

    /// Read every committed bill
    async fn list_bills(&self) -> Result<Vec<Bill>, StoreError>;

    /// Open a read-modify-write transaction scoped to one bill and its debts.
    ///
    /// The call waits until no other transaction on the same bill is open.
    async fn begin_bill(&self, id: &BillId) -> Result<Box<dyn BillTransaction>, StoreError>;

    /// Read the stored watermark, `None` before the first committed batch
    async fn load_watermark(&self) -> Result<Option<EventCursor>, StoreError>;

    /// Replace the watermark with `next` only if it still equals `expected`.
    ///
    /// Returns `false`, without writing, when another writer got there first.
    async fn compare_and_set_watermark(
        &self,
        expected: Option<EventCursor>,
        next: EventCursor,
    ) -> Result<bool, StoreError>;
}

/// Transactional view of one bill and its debts
#[async_trait]
pub trait BillTransaction: Send {
    /// The staged view of the bill, `None` if it does not exist
    fn bill(&self) -> Option<&Bill>;

    /// The staged view of every debt, ordered by participant id
    fn debts(&self) -> &[Debt];

    /// The staged debt for one participant
    fn debt(&self, participant_id: &ParticipantId) -> Option<&Debt> {
        self.debts().iter().find(|d| &d.participant_id == participant_id)
    }

    /// Stage a full overwrite of the bill document
    fn put_bill(&mut self, bill: Bill) -> Result<(), StoreError>;

    /// Stage a full overwrite of one debt document
    fn put_debt(&mut self, debt: Debt) -> Result<(), StoreError>;

    /// Stage deletion of one debt document; a no-op if it is not staged
    fn remove_debt(&mut self, participant_id: &ParticipantId) -> Result<(), StoreError>;

    /// Stage a status-only update; fails if the bill does not exist
    fn set_status(&mut self, status: BillStatus) -> Result<(), StoreError>;

    /// Atomically publish every staged write
    async fn commit(self: Box<Self>) -> Result<(), StoreError>;
}

/// Staged state shared by the bundled transaction implementations.
///
/// Keeps debts sorted by participant id and tracks what was written so a
/// handler only persists the touched documents.
#[derive(Debug, Clone)]
pub struct StagedBill {
    id: BillId,
    bill: Option<Bill>,
    debts: Vec<Debt>,
    bill_dirty: bool,
    dirty_debts: Vec<ParticipantId>,
    removed_debts: Vec<ParticipantId>,
}

impl StagedBill {
    /// Start from committed state
    pub fn new(id: BillId, bill: Option<Bill>, mut debts: Vec<Debt>) -> Self {
        debts.sort_by(|a, b| a.participant_id.cmp(&b.participant_id));
        Self {
            id,
            bill,
            debts,
            bill_dirty: false,
            dirty_debts: Vec::new(),
            removed_debts: Vec::new(),
        }
    }

    /// Bill being staged
    pub fn id(&self) -> &BillId {
        &self.id
    }

    /// Staged bill
    pub fn bill(&self) -> Option<&Bill> {
        self.bill.as_ref()
    }

    /// Staged debts
    pub fn debts(&self) -> &[Debt] {
        &self.debts
    }

    /// Stage a bill overwrite
    pub fn put_bill(&mut self, bill: Bill) -> Result<(), StoreError> {
        if bill.id != self.id {
            return Err(StoreError::invalid_record(format!(
                "Bill {} written inside transaction for {}",
                bill.id, self.id
            )));
        }
        self.bill = Some(bill);
        self.bill_dirty = true;
        Ok(())
    }

    /// Stage a debt overwrite
    pub fn put_debt(&mut self, debt: Debt) -> Result<(), StoreError> {
        if debt.bill_id != self.id {
            return Err(StoreError::invalid_record(format!(
                "Debt of bill {} written inside transaction for {}",
                debt.bill_id, self.id
            )));
        }
        let participant = debt.participant_id.clone();
        match self
            .debts
            .binary_search_by(|d| d.participant_id.cmp(&participant))
        {
            Ok(pos) => self.debts[pos] = debt,
            Err(pos) => self.debts.insert(pos, debt),
        }
        self.removed_debts.retain(|p| p != &participant);
        if !self.dirty_debts.contains(&participant) {
            self.dirty_debts.push(participant);
        }
        Ok(())
    }

    /// Stage a debt deletion
    pub fn remove_debt(&mut self, participant_id: &ParticipantId) {
        let Ok(pos) = self
            .debts
            .binary_search_by(|d| d.participant_id.cmp(participant_id))
        else {
            return;
        };
        self.debts.remove(pos);
        self.dirty_debts.retain(|p| p != participant_id);
        if !self.removed_debts.contains(participant_id) {
            self.removed_debts.push(participant_id.clone());
        }
    }

    /// Stage a status-only update
    pub fn set_status(&mut self, status: BillStatus) -> Result<(), StoreError> {
        match self.bill.as_mut() {
            Some(bill) => {
                if bill.status != status {
                    bill.status = status;
                    self.bill_dirty = true;
                }
                Ok(())
            }
            None => Err(StoreError::invalid_record(format!(
                "Status update on missing bill {}",
                self.id
            ))),
        }
    }

    /// Bill to persist on commit, if it changed
    pub fn dirty_bill(&self) -> Option<&Bill> {
        if self.bill_dirty {
            self.bill.as_ref()
        } else {
            None
        }
    }

    /// Debts to persist on commit
    pub fn dirty_debts(&self) -> impl Iterator<Item = &Debt> {
        self.debts
            .iter()
            .filter(move |d| self.dirty_debts.contains(&d.participant_id))
    }

    /// Debts to delete on commit
    pub fn removed_debts(&self) -> &[ParticipantId] {
        &self.removed_debts
    }

    /// Whether anything was staged
    pub fn is_dirty(&self) -> bool {
        self.bill_dirty || !self.dirty_debts.is_empty() || !self.removed_debts.is_empty()
    }

    /// Committing debts without their parent bill would orphan them
    pub fn check_consistency(&self) -> Result<(), StoreError> {
        if self.bill.is_none() && !self.dirty_debts.is_empty() {
            return Err(StoreError::invalid_record(format!(
                "Debts staged for missing bill {}",
                self.id
            )));
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{Amount, DebtStatus, EventId};
    use chrono::Utc;

    fn bill(id: &str) -> Bill {
        Bill {
            id: BillId::new(id),
            biller_name: "Power Co".into(),
            total_amount: Amount::from_cents(1000),
            status: BillStatus::Unpaid,
            due_date: None,
            date_received: Utc::now(),
            source_event_id: EventId::new(id),
            currency: "USD".into(),
            created_at: Utc::now(),
        }
    }

    fn debt(bill: &str, participant: &str) -> Debt {
        Debt::pending(
            BillId::new(bill),
            ParticipantId::new(participant),
            Amount::from_cents(500),
        )
    }

    #[test]
    fn test_staged_debts_stay_sorted() {
        let mut staged = StagedBill::new(BillId::new("b"), Some(bill("b")), vec![debt("b", "zoe")]);
        staged.put_debt(debt("b", "amy")).unwrap();
        let ids: Vec<_> = staged.debts().iter().map(|d| d.participant_id.as_str()).collect();
        assert_eq!(ids, vec!["amy", "zoe"]);
        assert_eq!(staged.dirty_debts().count(), 1);
    }

    #[test]
    fn test_put_debt_replaces_existing() {
        let mut staged = StagedBill::new(BillId::new("b"), Some(bill("b")), vec![debt("b", "amy")]);
        let mut paid = debt("b", "amy");
        paid.status = DebtStatus::Paid;
        staged.put_debt(paid).unwrap();
        assert_eq!(staged.debts().len(), 1);
        assert!(staged.debts()[0].is_paid());
    }

    #[test]
    fn test_rejects_foreign_records() {
        let mut staged = StagedBill::new(BillId::new("b"), None, vec![]);
        assert!(staged.put_bill(bill("other")).is_err());
        assert!(staged.put_debt(debt("other", "amy")).is_err());
        assert!(staged.set_status(BillStatus::Paid).is_err());
    }

    #[test]
    fn test_orphan_debts_are_inconsistent() {
        let mut staged = StagedBill::new(BillId::new("b"), None, vec![]);
        staged.put_debt(debt("b", "amy")).unwrap();
        assert!(staged.check_consistency().is_err());
    }

    #[test]
    fn test_remove_debt_stages_deletion() {
        let mut staged = StagedBill::new(
            BillId::new("b"),
            None,
            vec![debt("b", "amy"), debt("b", "zoe")],
        );
        staged.remove_debt(&ParticipantId::new("zoe"));
        staged.remove_debt(&ParticipantId::new("nobody"));
        assert_eq!(staged.debts().len(), 1);
        assert_eq!(staged.removed_debts(), &[ParticipantId::new("zoe")]);
        assert!(staged.is_dirty());

        staged.put_debt(debt("b", "zoe")).unwrap();
        assert!(staged.removed_debts().is_empty());
        assert_eq!(staged.dirty_debts().count(), 1);
    }

    #[test]
    fn test_status_update_only_dirty_on_change() {
        let mut staged = StagedBill::new(BillId::new("b"), Some(bill("b")), vec![]);
        staged.set_status(BillStatus::Unpaid).unwrap();
        assert!(!staged.is_dirty());
        staged.set_status(BillStatus::Paid).unwrap();
        assert!(staged.dirty_bill().is_some());
    }
}
