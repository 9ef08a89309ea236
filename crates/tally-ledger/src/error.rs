//! Error types for the ledger

use tally_core::effects::StoreError;
use tally_core::{BillId, ParticipantId};
use thiserror::Error;

/// Ledger error types
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum LedgerError {
    /// The addressed bill, or the participant's debt on it, does not exist
    #[error("Not found: bill {bill_id}{}", participant_suffix(.participant_id))]
    NotFound {
        /// Requested bill
        bill_id: BillId,
        /// Requested participant, `None` when the bill itself is missing
        participant_id: Option<ParticipantId>,
    },

    /// Shares do not form a valid split of the bill total
    #[error("Invalid split for bill {bill_id}: {reason}")]
    InvalidSplit {
        /// Bill being created
        bill_id: BillId,
        /// What was wrong
        reason: String,
    },

    /// Storage operation failed
    #[error(transparent)]
    Store(#[from] StoreError),
}

impl LedgerError {
    /// Missing bill
    pub fn bill_not_found(bill_id: &BillId) -> Self {
        Self::NotFound {
            bill_id: bill_id.clone(),
            participant_id: None,
        }
    }

    /// Missing debt on an existing bill
    pub fn debt_not_found(bill_id: &BillId, participant_id: &ParticipantId) -> Self {
        Self::NotFound {
            bill_id: bill_id.clone(),
            participant_id: Some(participant_id.clone()),
        }
    }

    /// Rejected split
    pub fn invalid_split(bill_id: &BillId, reason: impl Into<String>) -> Self {
        Self::InvalidSplit {
            bill_id: bill_id.clone(),
            reason: reason.into(),
        }
    }

    /// Whether the error means the addressed bill or debt does not exist
    pub fn is_not_found(&self) -> bool {
        matches!(self, LedgerError::NotFound { .. })
    }
}

fn participant_suffix(participant_id: &Option<ParticipantId>) -> String {
    match participant_id {
        Some(id) => format!(", participant {id}"),
        None => String::new(),
    }
}

/// Result type for ledger operations
pub type LedgerResult<T> = std::result::Result<T, LedgerError>;
