//! Bill and payment commands

use anyhow::Result;

use tally_core::effects::{LedgerStoreEffects, TimeEffects};
use tally_core::{BillId, ParticipantId};
use tally_ledger::LedgerStateMachine;

use super::{print_json, CliEffects};

pub async fn handle_mark_paid(
    effects: &CliEffects,
    bill: &str,
    participant: &str,
    paid_by: Option<String>,
) -> Result<()> {
    let paid_at = effects.now().await;
    let snapshot = LedgerStateMachine::new(effects)
        .mark_debt_paid(
            &BillId::new(bill),
            &ParticipantId::new(participant),
            paid_at,
            paid_by,
        )
        .await?;
    tracing::info!(bill_id = %snapshot.bill.id, status = ?snapshot.bill.status, "Payment recorded");
    print_json(&snapshot)
}

pub async fn handle_recompute(effects: &CliEffects, bill: &str) -> Result<()> {
    let machine = LedgerStateMachine::new(effects);
    let id = BillId::new(bill);
    machine.recompute_status(&id).await?;
    print_json(&machine.snapshot(&id).await?)
}

pub async fn handle_bills(effects: &CliEffects) -> Result<()> {
    let bills = effects.list_bills().await?;
    print_json(&bills)
}

pub async fn handle_bill(effects: &CliEffects, id: &str) -> Result<()> {
    let snapshot = LedgerStateMachine::new(effects)
        .snapshot(&BillId::new(id))
        .await?;
    print_json(&snapshot)
}
