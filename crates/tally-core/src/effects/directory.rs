//! Participant directory effects

use async_trait::async_trait;

use super::StoreError;
use crate::Participant;

/// Read-only view of the participant directory
#[async_trait]
pub trait DirectoryEffects: Send + Sync {
    /// Snapshot of the currently active participants in stable directory
    /// order. The order decides which participant absorbs split remainders.
    async fn active_participants(&self) -> Result<Vec<Participant>, StoreError>;
}
