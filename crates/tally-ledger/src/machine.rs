//! Bill and debt lifecycle
//!
//! Bills move `unpaid -> partial -> paid` and debts move `pending -> paid`.
//! Every mutation opens a [`BillTransaction`] for the bill, so the status is
//! always derived from a rescan of debts that no other writer can touch until
//! the transaction commits.

use chrono::{DateTime, NaiveDate, Utc};
use std::collections::HashSet;
use tracing::{debug, info, warn};

use tally_core::effects::{BillTransaction, LedgerStoreEffects};
use tally_core::{
    Amount, Bill, BillId, BillSnapshot, BillStatus, Debt, DebtStatus, EventId, ParticipantId,
};

use crate::error::{LedgerError, LedgerResult};
use crate::split::Share;

/// A bill about to be recorded
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NewBill {
    /// Inbox event the bill was derived from
    pub source_event_id: EventId,
    /// Counterparty
    pub biller_name: String,
    /// Amount to split
    pub total: Amount,
    /// Optional due date
    pub due_date: Option<NaiveDate>,
    /// ISO currency code
    pub currency: String,
    /// Processing time, used for both `dateReceived` and `createdAt`
    pub received_at: DateTime<Utc>,
}

impl NewBill {
    /// Identifier the bill will be stored under
    pub fn bill_id(&self) -> BillId {
        BillId::for_event(&self.source_event_id)
    }
}

/// Result of recording a bill
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RecordOutcome {
    /// The bill and its debts were written
    Created(BillSnapshot),
    /// The bill already existed; stored state was left untouched
    AlreadyRecorded(BillSnapshot),
}

impl RecordOutcome {
    /// Whether this call wrote the bill
    pub fn is_created(&self) -> bool {
        matches!(self, RecordOutcome::Created(_))
    }

    /// The stored bill and debts
    pub fn snapshot(&self) -> &BillSnapshot {
        match self {
            RecordOutcome::Created(s) | RecordOutcome::AlreadyRecorded(s) => s,
        }
    }

    /// Consume into the stored bill and debts
    pub fn into_snapshot(self) -> BillSnapshot {
        match self {
            RecordOutcome::Created(s) | RecordOutcome::AlreadyRecorded(s) => s,
        }
    }
}

/// Bill creation and settlement over a ledger store
pub struct LedgerStateMachine<'a, S: ?Sized> {
    store: &'a S,
}

impl<'a, S> LedgerStateMachine<'a, S>
where
    S: LedgerStoreEffects + ?Sized,
{
    /// Create a state machine over `store`
    pub fn new(store: &'a S) -> Self {
        Self { store }
    }

    /// Record a bill and one pending debt per share.
    ///
    /// Keyed by the source event: when the bill already exists its stored
    /// state, including any paid debts, is returned unchanged.
    pub async fn record_bill(
        &self,
        new_bill: NewBill,
        shares: &[Share],
    ) -> LedgerResult<RecordOutcome> {
        let bill_id = new_bill.bill_id();
        validate_shares(&bill_id, new_bill.total, shares)?;

        let mut tx = self.store.begin_bill(&bill_id).await?;
        if let Some(existing) = tx.bill() {
            debug!(bill_id = %bill_id, status = %existing.status, "Bill already recorded");
            let snapshot = staged_snapshot(tx.as_ref(), &bill_id)?;
            return Ok(RecordOutcome::AlreadyRecorded(snapshot));
        }

        let stale: Vec<ParticipantId> = tx
            .debts()
            .iter()
            .map(|d| d.participant_id.clone())
            .filter(|p| !shares.iter().any(|s| &s.participant_id == p))
            .collect();
        for participant in &stale {
            warn!(bill_id = %bill_id, participant = %participant, "Removing orphaned debt");
            tx.remove_debt(participant)?;
        }

        tx.put_bill(Bill {
            id: bill_id.clone(),
            biller_name: new_bill.biller_name,
            total_amount: new_bill.total,
            status: BillStatus::Unpaid,
            due_date: new_bill.due_date,
            date_received: new_bill.received_at,
            source_event_id: new_bill.source_event_id,
            currency: new_bill.currency,
            created_at: new_bill.received_at,
        })?;
        for share in shares {
            tx.put_debt(Debt::pending(
                bill_id.clone(),
                share.participant_id.clone(),
                share.amount,
            ))?;
        }

        let snapshot = staged_snapshot(tx.as_ref(), &bill_id)?;
        tx.commit().await?;

        info!(
            bill_id = %bill_id,
            total = %snapshot.bill.total_amount,
            debts = snapshot.debts.len(),
            "Recorded bill"
        );
        Ok(RecordOutcome::Created(snapshot))
    }

    /// Mark one debt paid and re-derive the bill status.
    ///
    /// A missing bill or debt fails with [`LedgerError::NotFound`] without
    /// writing anything. Paying an already paid debt keeps the original
    /// payment details.
    pub async fn mark_debt_paid(
        &self,
        bill_id: &BillId,
        participant_id: &ParticipantId,
        paid_at: DateTime<Utc>,
        paid_by: Option<String>,
    ) -> LedgerResult<BillSnapshot> {
        let mut tx = self.store.begin_bill(bill_id).await?;
        if tx.bill().is_none() {
            return Err(LedgerError::bill_not_found(bill_id));
        }
        let debt = tx
            .debt(participant_id)
            .cloned()
            .ok_or_else(|| LedgerError::debt_not_found(bill_id, participant_id))?;

        if debt.is_paid() {
            debug!(bill_id = %bill_id, participant = %participant_id, "Debt already paid");
        } else {
            tx.put_debt(Debt {
                status: DebtStatus::Paid,
                paid_at: Some(paid_at),
                paid_by,
                ..debt
            })?;
        }

        let status = BillStatus::derive(tx.debts());
        tx.set_status(status)?;
        let snapshot = staged_snapshot(tx.as_ref(), bill_id)?;
        tx.commit().await?;

        info!(
            bill_id = %bill_id,
            participant = %participant_id,
            status = %status,
            "Marked debt paid"
        );
        Ok(snapshot)
    }

    /// Re-derive and store a bill's status from its debts
    pub async fn recompute_status(&self, bill_id: &BillId) -> LedgerResult<BillStatus> {
        let mut tx = self.store.begin_bill(bill_id).await?;
        if tx.bill().is_none() {
            return Err(LedgerError::bill_not_found(bill_id));
        }
        let status = BillStatus::derive(tx.debts());
        tx.set_status(status)?;
        tx.commit().await?;
        Ok(status)
    }

    /// Committed bill and debts
    pub async fn snapshot(&self, bill_id: &BillId) -> LedgerResult<BillSnapshot> {
        let bill = self
            .store
            .get_bill(bill_id)
            .await?
            .ok_or_else(|| LedgerError::bill_not_found(bill_id))?;
        let debts = self.store.list_debts(bill_id).await?;
        Ok(BillSnapshot { bill, debts })
    }
}

fn staged_snapshot(tx: &dyn BillTransaction, bill_id: &BillId) -> LedgerResult<BillSnapshot> {
    let bill = tx
        .bill()
        .cloned()
        .ok_or_else(|| LedgerError::bill_not_found(bill_id))?;
    Ok(BillSnapshot {
        bill,
        debts: tx.debts().to_vec(),
    })
}

fn validate_shares(bill_id: &BillId, total: Amount, shares: &[Share]) -> LedgerResult<()> {
    if total.is_negative() {
        return Err(LedgerError::invalid_split(
            bill_id,
            format!("negative total {total}"),
        ));
    }
    if shares.is_empty() {
        return Err(LedgerError::invalid_split(bill_id, "no participants"));
    }

    let mut seen = HashSet::with_capacity(shares.len());
    for share in shares {
        if !seen.insert(&share.participant_id) {
            return Err(LedgerError::invalid_split(
                bill_id,
                format!("participant {} appears twice", share.participant_id),
            ));
        }
    }

    let sum: Amount = shares.iter().map(|s| s.amount).sum();
    if sum != total {
        return Err(LedgerError::invalid_split(
            bill_id,
            format!("shares sum to {sum}, total is {total}"),
        ));
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::split::split;
    use assert_matches::assert_matches;
    use tally_core::Participant;
    use tally_effects::MemoryLedgerStore;

    fn new_bill(event: &str, cents: i64) -> NewBill {
        NewBill {
            source_event_id: EventId::new(event),
            biller_name: "billing@power.example".into(),
            total: Amount::from_cents(cents),
            due_date: None,
            currency: "USD".into(),
            received_at: Utc::now(),
        }
    }

    fn roommates(ids: &[&str]) -> Vec<Participant> {
        ids.iter()
            .map(|id| Participant::new(*id, format!("{id}@example.com")))
            .collect()
    }

    #[tokio::test]
    async fn test_single_participant_lifecycle() {
        let store = MemoryLedgerStore::new();
        let ledger = LedgerStateMachine::new(&store);
        let people = roommates(&["amy"]);

        let outcome = ledger
            .record_bill(new_bill("m1", 1000), &split(Amount::from_cents(1000), &people))
            .await
            .unwrap();
        assert!(outcome.is_created());
        assert_eq!(outcome.snapshot().bill.status, BillStatus::Unpaid);
        assert_eq!(outcome.snapshot().debts[0].amount, Amount::from_cents(1000));

        let bill_id = BillId::new("m1");
        let after = ledger
            .mark_debt_paid(&bill_id, &ParticipantId::new("amy"), Utc::now(), None)
            .await
            .unwrap();
        assert_eq!(after.bill.status, BillStatus::Paid);
        assert_eq!(ledger.snapshot(&bill_id).await.unwrap(), after);
    }

    #[tokio::test]
    async fn test_partial_then_paid() {
        let store = MemoryLedgerStore::new();
        let ledger = LedgerStateMachine::new(&store);
        let people = roommates(&["amy", "bo", "cy"]);
        ledger
            .record_bill(new_bill("m2", 10_000), &split(Amount::from_cents(10_000), &people))
            .await
            .unwrap();

        let bill_id = BillId::new("m2");
        let mut last = None;
        for (i, p) in people.iter().enumerate() {
            let snapshot = ledger
                .mark_debt_paid(&bill_id, &p.id, Utc::now(), Some("operator".into()))
                .await
                .unwrap();
            let expected = if i + 1 == people.len() {
                BillStatus::Paid
            } else {
                BillStatus::Partial
            };
            assert_eq!(snapshot.bill.status, expected);
            last = Some(snapshot);
        }
        let last = last.unwrap();
        assert_eq!(last.debt_total(), Amount::from_cents(10_000));
        assert!(last.debts.iter().all(|d| d.paid_by.as_deref() == Some("operator")));
    }

    #[tokio::test]
    async fn test_replay_keeps_paid_debts() {
        let store = MemoryLedgerStore::new();
        let ledger = LedgerStateMachine::new(&store);
        let people = roommates(&["amy", "bo"]);
        let shares = split(Amount::from_cents(5000), &people);
        ledger.record_bill(new_bill("m3", 5000), &shares).await.unwrap();

        let bill_id = BillId::new("m3");
        ledger
            .mark_debt_paid(&bill_id, &ParticipantId::new("amy"), Utc::now(), None)
            .await
            .unwrap();

        let replay = ledger.record_bill(new_bill("m3", 5000), &shares).await.unwrap();
        assert_matches!(replay, RecordOutcome::AlreadyRecorded(_));
        let stored = ledger.snapshot(&bill_id).await.unwrap();
        assert_eq!(stored.bill.status, BillStatus::Partial);
        assert!(stored.debt_for(&ParticipantId::new("amy")).unwrap().is_paid());
    }

    #[tokio::test]
    async fn test_repeat_payment_keeps_original_details() {
        let store = MemoryLedgerStore::new();
        let ledger = LedgerStateMachine::new(&store);
        let people = roommates(&["amy", "bo"]);
        ledger
            .record_bill(new_bill("m4", 2000), &split(Amount::from_cents(2000), &people))
            .await
            .unwrap();

        let bill_id = BillId::new("m4");
        let amy = ParticipantId::new("amy");
        let first_at = Utc::now();
        ledger
            .mark_debt_paid(&bill_id, &amy, first_at, Some("amy".into()))
            .await
            .unwrap();
        let again = ledger
            .mark_debt_paid(&bill_id, &amy, Utc::now(), Some("someone else".into()))
            .await
            .unwrap();

        let debt = again.debt_for(&amy).unwrap();
        assert_eq!(debt.paid_at, Some(first_at));
        assert_eq!(debt.paid_by.as_deref(), Some("amy"));
        assert_eq!(again.bill.status, BillStatus::Partial);
    }

    #[tokio::test]
    async fn test_unknown_bill_or_participant() {
        let store = MemoryLedgerStore::new();
        let ledger = LedgerStateMachine::new(&store);
        let people = roommates(&["amy"]);
        ledger
            .record_bill(new_bill("m5", 100), &split(Amount::from_cents(100), &people))
            .await
            .unwrap();

        let missing_bill = ledger
            .mark_debt_paid(&BillId::new("nope"), &ParticipantId::new("amy"), Utc::now(), None)
            .await
            .unwrap_err();
        assert_matches!(missing_bill, LedgerError::NotFound { participant_id: None, .. });

        let missing_debt = ledger
            .mark_debt_paid(&BillId::new("m5"), &ParticipantId::new("zed"), Utc::now(), None)
            .await
            .unwrap_err();
        assert!(missing_debt.is_not_found());
        assert_matches!(missing_debt, LedgerError::NotFound { participant_id: Some(_), .. });

        let stored = ledger.snapshot(&BillId::new("m5")).await.unwrap();
        assert_eq!(stored.bill.status, BillStatus::Unpaid);
        assert!(store.get_bill(&BillId::new("nope")).await.unwrap().is_none());
    }

    #[tokio::test]
    async fn test_rejects_inconsistent_shares() {
        let store = MemoryLedgerStore::new();
        let ledger = LedgerStateMachine::new(&store);

        let short = vec![Share {
            participant_id: ParticipantId::new("amy"),
            amount: Amount::from_cents(99),
        }];
        let err = ledger.record_bill(new_bill("m6", 100), &short).await.unwrap_err();
        assert_matches!(err, LedgerError::InvalidSplit { .. });

        let err = ledger.record_bill(new_bill("m6", 100), &[]).await.unwrap_err();
        assert_matches!(err, LedgerError::InvalidSplit { .. });

        let twice = vec![
            Share {
                participant_id: ParticipantId::new("amy"),
                amount: Amount::from_cents(50),
            },
            Share {
                participant_id: ParticipantId::new("amy"),
                amount: Amount::from_cents(50),
            },
        ];
        let err = ledger.record_bill(new_bill("m6", 100), &twice).await.unwrap_err();
        assert_matches!(err, LedgerError::InvalidSplit { .. });

        assert!(store.get_bill(&BillId::new("m6")).await.unwrap().is_none());
    }

    #[tokio::test]
    async fn test_recompute_status_repairs_drift() {
        let store = MemoryLedgerStore::new();
        let ledger = LedgerStateMachine::new(&store);
        let people = roommates(&["amy"]);
        ledger
            .record_bill(new_bill("m7", 100), &split(Amount::from_cents(100), &people))
            .await
            .unwrap();

        let bill_id = BillId::new("m7");
        let mut tx = store.begin_bill(&bill_id).await.unwrap();
        tx.set_status(BillStatus::Paid).unwrap();
        tx.commit().await.unwrap();

        assert_eq!(
            ledger.recompute_status(&bill_id).await.unwrap(),
            BillStatus::Unpaid
        );
        assert_eq!(
            ledger.snapshot(&bill_id).await.unwrap().bill.status,
            BillStatus::Unpaid
        );
    }
}
