//! Wall-clock effects

use async_trait::async_trait;
use chrono::{DateTime, Utc};

/// Source of the current time
#[async_trait]
pub trait TimeEffects: Send + Sync {
    /// Current wall-clock time
    async fn now(&self) -> DateTime<Utc>;
}
