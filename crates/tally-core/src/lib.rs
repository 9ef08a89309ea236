//! Tally-Core: Ledger Foundation Types and Effect Interfaces
//!
//! This crate is the bottom layer of the tally workspace. It defines **what**
//! the ingestion pipeline and the ledger operate on, while the handler crates
//! define **how** those operations reach the outside world.
//!
//! # Contents
//!
//! - **Identifiers**: [`EventId`], [`BillId`], [`ParticipantId`]
//! - **Money**: [`Amount`], a cent-precision decimal that never touches floats
//! - **Cursors**: [`EventCursor`], the ordered change-stream position used as the
//!   sync watermark
//! - **Ledger records**: [`Participant`], [`Bill`], [`Debt`] and their derived
//!   statuses
//! - **Events**: [`RawEvent`] and [`ChangePage`] as delivered by the inbox
//! - **Effects**: async traits for the inbox, store, directory, notification and
//!   clock collaborators
//! - **Configuration**: [`TallyConfig`] loaded from TOML plus `TALLY_*` overrides
//!
//! Every effect-using component in the workspace is parameterised by the traits
//! in [`effects`], so tests swap in deterministic handlers without touching the
//! pipeline code.

#![forbid(unsafe_code)]

pub mod config;
pub mod cursor;
pub mod effects;
pub mod errors;
pub mod event;
pub mod identifiers;
pub mod ledger;
pub mod money;

pub use config::{
    ExtractionConfig, FilterSpec, InboxConfig, LedgerConfig, NotifyConfig, RetryConfig,
    StoreConfig, SyncConfig, TallyConfig,
};
pub use cursor::EventCursor;
pub use errors::{TallyError, TallyResult};
pub use event::{ChangePage, RawEvent};
pub use identifiers::{BillId, EventId, ParticipantId};
pub use ledger::{Bill, BillSnapshot, BillStatus, Debt, DebtStatus, Participant};
pub use money::Amount;
