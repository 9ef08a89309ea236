//! Controllable clock

use async_trait::async_trait;
use chrono::{DateTime, Duration, TimeZone, Utc};
use parking_lot::Mutex;

use tally_core::effects::TimeEffects;

/// A clock that only moves when told to
#[derive(Debug)]
pub struct FixedClock {
    now: Mutex<DateTime<Utc>>,
}

impl Default for FixedClock {
    fn default() -> Self {
        Self::new(Utc.with_ymd_and_hms(2024, 3, 1, 9, 0, 0).unwrap())
    }
}

impl FixedClock {
    /// Freeze at `at`
    pub fn new(at: DateTime<Utc>) -> Self {
        Self { now: Mutex::new(at) }
    }

    /// Move to `at`
    pub fn set(&self, at: DateTime<Utc>) {
        *self.now.lock() = at;
    }

    /// Move forward by `by`
    pub fn advance(&self, by: Duration) {
        let mut now = self.now.lock();
        *now += by;
    }

    /// Current frozen time
    pub fn current(&self) -> DateTime<Utc> {
        *self.now.lock()
    }
}

#[async_trait]
impl TimeEffects for FixedClock {
    async fn now(&self) -> DateTime<Utc> {
        self.current()
    }
}
