//! Wake signals
//!
//! A wake signal only says "something changed". It may carry the mailbox and
//! a cursor hint, which is used as the watermark candidate when the listing
//! itself reports no cursor.

use base64::engine::general_purpose::{STANDARD, URL_SAFE};
use base64::Engine;
use serde::Deserialize;

use tally_core::EventCursor;

use crate::errors::{SyncError, SyncResult};

/// Trigger for one batch
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct WakeSignal {
    /// Mailbox the change belongs to
    pub mailbox: Option<String>,
    /// Stream position reported with the notification
    pub cursor_hint: Option<EventCursor>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct PushPayload {
    #[serde(default)]
    email_address: Option<String>,
    #[serde(default)]
    history_id: Option<EventCursor>,
}

impl WakeSignal {
    /// A signal with no payload
    pub fn empty() -> Self {
        Self::default()
    }

    /// A signal carrying only a cursor hint
    pub fn with_hint(cursor: EventCursor) -> Self {
        Self {
            mailbox: None,
            cursor_hint: Some(cursor),
        }
    }

    /// Decode the base64 `data` field of a push envelope holding
    /// `{"emailAddress": .., "historyId": ..}`
    pub fn from_push_message(data: &str) -> SyncResult<Self> {
        let data = data.trim();
        let bytes = STANDARD
            .decode(data)
            .or_else(|_| URL_SAFE.decode(data))
            .map_err(|e| SyncError::invalid_wake_signal(format!("payload is not base64: {e}")))?;
        let payload: PushPayload = serde_json::from_slice(&bytes)
            .map_err(|e| SyncError::invalid_wake_signal(format!("payload is not JSON: {e}")))?;
        Ok(Self {
            mailbox: payload.email_address.filter(|m| !m.is_empty()),
            cursor_hint: payload.history_id,
        })
    }
}
