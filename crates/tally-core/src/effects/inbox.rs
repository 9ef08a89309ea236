//! Inbox transport effects
//!
//! The transport delivers the change stream at least once and paginated. A
//! listing that starts from a cursor the upstream no longer retains is reported
//! as [`TransportError::CursorExpired`], which callers must treat as fatal for
//! the batch.

use async_trait::async_trait;
use serde::{Deserialize, Serialize};

use crate::{ChangePage, EventCursor, EventId, RawEvent};

/// Error type for inbox transport operations
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, thiserror::Error)]
pub enum TransportError {
    /// The start cursor is older than the upstream retention window
    #[error("Cursor {cursor} expired or invalid upstream")]
    CursorExpired {
        /// The rejected start cursor
        cursor: EventCursor,
    },
    /// The requested event does not exist
    #[error("Event not found: {id}")]
    EventNotFound {
        /// Missing event id
        id: EventId,
    },
    /// Upstream could not be reached or answered with a transient failure
    #[error("Inbox unavailable: {reason}")]
    Unavailable {
        /// Failure description
        reason: String,
    },
    /// Upstream returned data that could not be interpreted
    #[error("Malformed inbox response: {reason}")]
    Malformed {
        /// Failure description
        reason: String,
    },
}

impl TransportError {
    /// Create an unavailable error
    pub fn unavailable(reason: impl Into<String>) -> Self {
        Self::Unavailable {
            reason: reason.into(),
        }
    }

    /// Create a malformed response error
    pub fn malformed(reason: impl Into<String>) -> Self {
        Self::Malformed {
            reason: reason.into(),
        }
    }

    /// Whether retrying the same call may succeed
    pub fn is_retryable(&self) -> bool {
        matches!(self, TransportError::Unavailable { .. })
    }
}

/// Read access to the monitored inbox
#[async_trait]
pub trait InboxEffects: Send + Sync {
    /// Fetch the full content of one event
    async fn fetch_event(&self, id: &EventId) -> Result<RawEvent, TransportError>;

    /// List item-added changes after `cursor`.
    ///
    /// `page_token` is `None` for the first page and the previous page's
    /// `next_page_token` afterwards.
    async fn list_changes(
        &self,
        cursor: EventCursor,
        page_token: Option<&str>,
    ) -> Result<ChangePage, TransportError>;
}
