//! Outbound notification effects

use async_trait::async_trait;
use serde::{Deserialize, Serialize};

/// Error type for notification dispatch
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, thiserror::Error)]
pub enum NotifyError {
    /// The transport refused the message
    #[error("Message to {recipient} rejected: {reason}")]
    Rejected {
        /// Intended recipient
        recipient: String,
        /// Rejection reason
        reason: String,
    },
    /// The transport could not be reached
    #[error("Notification transport unavailable: {reason}")]
    Unavailable {
        /// Failure description
        reason: String,
    },
}

/// A plain-text message to a single recipient
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct OutboundMessage {
    /// Sender address
    pub from: String,
    /// Recipient address
    pub to: String,
    /// Subject line
    pub subject: String,
    /// Plain text body
    pub body: String,
}

/// Dispatch of outbound messages
#[async_trait]
pub trait NotificationEffects: Send + Sync {
    /// Send one message
    async fn send(&self, message: &OutboundMessage) -> Result<(), NotifyError>;
}
