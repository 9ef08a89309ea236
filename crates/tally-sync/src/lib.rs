//! Tally-Sync: change-stream ingestion
//!
//! [`SyncCoordinator`] runs watermarked batches over the inbox change stream
//! and hands each listed event to the [`EventProcessor`], which filters it,
//! extracts a bill, splits it across the active participants and records it in
//! the ledger.
//!
//! Both are generic over the effect traits in `tally_core::effects`; nothing in
//! this crate performs I/O directly.

#![forbid(unsafe_code)]

pub mod coordinator;
pub mod errors;
pub mod extract;
pub mod filter;
pub mod notify;
pub mod processor;
pub mod wake;

pub use coordinator::{BatchReport, ChangeSet, EventReport, SyncCoordinator, WatermarkUpdate};
pub use errors::{ProcessError, SyncError, SyncResult};
pub use extract::{Extraction, Extractor};
pub use filter::EventFilter;
pub use notify::NotificationComposer;
pub use processor::{EventProcessor, Outcome, SkipReason};
pub use wake::WakeSignal;
