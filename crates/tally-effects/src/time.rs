//! Wall-clock handler

use async_trait::async_trait;
use chrono::{DateTime, Utc};

use tally_core::effects::TimeEffects;

/// System wall clock
#[derive(Debug, Clone, Copy, Default)]
pub struct SystemClock;

impl SystemClock {
    /// Create a new clock
    pub fn new() -> Self {
        Self
    }
}

#[async_trait]
impl TimeEffects for SystemClock {
    async fn now(&self) -> DateTime<Utc> {
        Utc::now()
    }
}
