//! Error types for ingestion

use thiserror::Error;

use tally_core::effects::{StoreError, TransportError};
use tally_core::{EventCursor, EventId, TallyError};
use tally_ledger::LedgerError;

/// Batch-level failures. Any of these means the watermark was not advanced.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum SyncError {
    /// The start cursor is no longer retained upstream; an operator must
    /// choose a new start cursor
    #[error("Start cursor {cursor} expired upstream; manual resync required")]
    CursorExpired {
        /// The rejected start cursor
        cursor: EventCursor,
    },

    /// Listing the change stream failed
    #[error("Change listing failed: {0}")]
    Transport(TransportError),

    /// Reading or writing the watermark failed
    #[error("Watermark store failed: {0}")]
    Store(#[from] StoreError),

    /// The batch did not finish within the configured deadline
    #[error("Batch exceeded its {seconds}s deadline")]
    DeadlineExceeded {
        /// Configured deadline
        seconds: u64,
    },

    /// Some events could not be fetched after retries; the watermark is held
    /// so the next trigger covers them again
    #[error("{} event(s) could not be fetched; watermark held", unfetched.len())]
    EventsUnfetched {
        /// Events that never reached processing
        unfetched: Vec<EventId>,
    },

    /// Concurrent writers kept moving the watermark
    #[error("Watermark kept changing during commit")]
    WatermarkContention,

    /// A push payload could not be decoded
    #[error("Invalid wake signal: {reason}")]
    InvalidWakeSignal {
        /// What was wrong
        reason: String,
    },

    /// Pipeline configuration is unusable
    #[error("Configuration error: {0}")]
    Configuration(#[from] TallyError),
}

impl SyncError {
    /// Create an invalid wake signal error
    pub fn invalid_wake_signal(reason: impl Into<String>) -> Self {
        Self::InvalidWakeSignal {
            reason: reason.into(),
        }
    }
}

impl From<TransportError> for SyncError {
    fn from(err: TransportError) -> Self {
        match err {
            TransportError::CursorExpired { cursor } => SyncError::CursorExpired { cursor },
            other => SyncError::Transport(other),
        }
    }
}

/// Per-event failures. Recorded in the batch report; never abort a batch.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ProcessError {
    /// The event content could not be fetched
    #[error("Failed to fetch event {id}: {source}")]
    Fetch {
        /// Event being processed
        id: EventId,
        /// Transport failure
        source: TransportError,
    },

    /// The participant directory could not be read
    #[error("Failed to read participants for event {id}: {source}")]
    Directory {
        /// Event being processed
        id: EventId,
        /// Store failure
        source: StoreError,
    },

    /// The bill could not be recorded
    #[error("Failed to record bill for event {id}: {source}")]
    Persistence {
        /// Event being processed
        id: EventId,
        /// Ledger failure
        source: LedgerError,
    },
}

impl ProcessError {
    /// Whether the event never got past fetching
    pub fn is_fetch(&self) -> bool {
        matches!(self, ProcessError::Fetch { .. })
    }

    /// Whether retrying the whole event may succeed
    pub fn is_retryable(&self) -> bool {
        match self {
            ProcessError::Fetch { source, .. } => source.is_retryable(),
            _ => false,
        }
    }
}

/// Result type for batch operations
pub type SyncResult<T> = std::result::Result<T, SyncError>;
