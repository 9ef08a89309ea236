//! Tally Testing Infrastructure
//!
//! Shared helpers for unit and integration tests across the workspace:
//! deterministic handlers, fault-injecting wrappers around the bundled
//! handlers, event builders and household fixtures.

#![allow(clippy::unwrap_used)]
#![allow(clippy::expect_used)]
//!
//! # Usage
//!
//! ```rust,no_run
//! use tally_testkit::*;
//!
//! # async fn demo() {
//! let inbox = FaultyInbox::new(tally_effects::FixtureInbox::new());
//! inbox.inner().deliver(RawEventBuilder::new("m1").total_line("Total: $90.00").build());
//! inbox.fail_fetch("m1", 2);
//! # }
//! ```

pub mod builders;
pub mod fixtures;
pub mod mocks;
pub mod time;

pub use builders::RawEventBuilder;
pub use fixtures::*;
pub use mocks::{FailingStore, FaultyInbox, RecordingNotifier};
pub use time::FixedClock;
