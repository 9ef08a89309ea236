//! Ledger records: participants, bills and debts
//!
//! A [`Bill`] owns one [`Debt`] per participant captured when it was split.
//! The bill's status is a pure function of its debts; see
//! [`BillStatus::derive`].

use chrono::{DateTime, NaiveDate, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;

use crate::{Amount, BillId, EventId, ParticipantId};

/// A directory entry eligible to owe a share of a bill
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Participant {
    /// Directory identifier
    pub id: ParticipantId,
    /// Address notifications are sent to
    pub email: String,
    /// Optional name used in notification greetings
    #[serde(default)]
    pub display_name: String,
    /// Inactive participants are excluded from new splits
    #[serde(default = "default_active")]
    pub active: bool,
}

fn default_active() -> bool {
    true
}

impl Participant {
    /// Create an active participant
    pub fn new(id: impl Into<ParticipantId>, email: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            email: email.into(),
            display_name: String::new(),
            active: true,
        }
    }

    /// Set the display name
    pub fn with_display_name(mut self, name: impl Into<String>) -> Self {
        self.display_name = name.into();
        self
    }

    /// Set the active flag
    pub fn with_active(mut self, active: bool) -> Self {
        self.active = active;
        self
    }
}

/// Aggregate payment status of a bill
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum BillStatus {
    /// No debt has been paid
    Unpaid,
    /// Some but not all debts are paid
    Partial,
    /// Every debt is paid
    Paid,
}

impl BillStatus {
    /// Derive the status from a full scan of a bill's debts.
    ///
    /// A bill with no debts is `Unpaid`; bills are never persisted without
    /// debts, so this only matters for malformed stored data.
    pub fn derive(debts: &[Debt]) -> Self {
        let total = debts.len();
        let paid = debts.iter().filter(|d| d.status == DebtStatus::Paid).count();

        if total > 0 && paid == total {
            BillStatus::Paid
        } else if paid > 0 {
            BillStatus::Partial
        } else {
            BillStatus::Unpaid
        }
    }
}

impl fmt::Display for BillStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            BillStatus::Unpaid => "unpaid",
            BillStatus::Partial => "partial",
            BillStatus::Paid => "paid",
        };
        f.write_str(s)
    }
}

/// Payment status of a single debt
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum DebtStatus {
    /// Awaiting payment
    Pending,
    /// Paid; terminal
    Paid,
}

/// A monetary obligation derived from one qualifying inbox event
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Bill {
    /// Bill identifier (equal to the source event id)
    pub id: BillId,
    /// Counterparty the bill came from
    pub biller_name: String,
    /// Total amount owed across all debts
    pub total_amount: Amount,
    /// Derived payment status
    pub status: BillStatus,
    /// Due date if the event stated one
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub due_date: Option<NaiveDate>,
    /// When the source event was processed
    pub date_received: DateTime<Utc>,
    /// Idempotency key: the inbox event this bill was derived from
    pub source_event_id: EventId,
    /// ISO currency code
    pub currency: String,
    /// Record creation time
    pub created_at: DateTime<Utc>,
}

/// One participant's share of a bill
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Debt {
    /// Parent bill
    pub bill_id: BillId,
    /// Participant who owes this share
    pub participant_id: ParticipantId,
    /// Share amount
    pub amount: Amount,
    /// Payment status
    pub status: DebtStatus,
    /// When the debt was marked paid
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub paid_at: Option<DateTime<Utc>>,
    /// Who recorded the payment
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub paid_by: Option<String>,
}

impl Debt {
    /// A new pending debt
    pub fn pending(bill_id: BillId, participant_id: ParticipantId, amount: Amount) -> Self {
        Self {
            bill_id,
            participant_id,
            amount,
            status: DebtStatus::Pending,
            paid_at: None,
            paid_by: None,
        }
    }

    /// Whether the debt has been paid
    pub fn is_paid(&self) -> bool {
        self.status == DebtStatus::Paid
    }
}

/// A bill together with its full debt set
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct BillSnapshot {
    /// The bill record
    pub bill: Bill,
    /// Every debt of the bill, ordered by participant id
    pub debts: Vec<Debt>,
}

impl BillSnapshot {
    /// Sum of all debt amounts
    pub fn debt_total(&self) -> Amount {
        self.debts.iter().map(|d| d.amount).sum()
    }

    /// Debt owed by a participant
    pub fn debt_for(&self, participant_id: &ParticipantId) -> Option<&Debt> {
        self.debts.iter().find(|d| &d.participant_id == participant_id)
    }
}
