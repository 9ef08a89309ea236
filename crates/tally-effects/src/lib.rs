//! Tally-Effects: Bundled Effect Handlers
//!
//! Concrete implementations of the effect traits in `tally_core::effects`:
//!
//! - [`MemoryLedgerStore`]: in-process store and directory
//! - [`FilesystemLedgerStore`]: one JSON document per record under a root
//!   directory, written atomically
//! - [`FixtureInbox`]: an in-memory, paginated change log with a retention
//!   horizon, loadable from a JSON fixture
//! - [`TracingNotifier`]: writes outbound messages to the log
//! - [`SystemClock`]: wall-clock time
//!
//! [`TallyEffects`] bundles one handler per trait into a single value the
//! pipeline can be parameterised by.

#![forbid(unsafe_code)]

pub mod composite;
pub mod inbox;
pub mod notify;
pub mod storage;
pub mod time;

pub use composite::TallyEffects;
pub use inbox::{FixtureFile, FixtureInbox};
pub use notify::TracingNotifier;
pub use storage::{FilesystemLedgerStore, MemoryLedgerStore};
pub use time::SystemClock;
