//! Log-only notification handler

use async_trait::async_trait;
use tracing::info;

use tally_core::effects::{NotificationEffects, NotifyError, OutboundMessage};

/// Writes every outbound message to the log instead of sending it
#[derive(Debug, Clone, Default)]
pub struct TracingNotifier;

impl TracingNotifier {
    /// Create a new notifier
    pub fn new() -> Self {
        Self
    }
}

#[async_trait]
impl NotificationEffects for TracingNotifier {
    async fn send(&self, message: &OutboundMessage) -> Result<(), NotifyError> {
        info!(
            from = %message.from,
            to = %message.to,
            subject = %message.subject,
            body_len = message.body.len(),
            "Notification"
        );
        Ok(())
    }
}
