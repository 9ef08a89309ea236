//! Effect Trait Definitions
//!
//! Pure trait definitions for every side effect the pipeline performs. This
//! module defines **what** can be done; `tally-effects` (bundled handlers) and
//! `tally-testkit` (fault-injecting handlers) define **how**.
//!
//! - **Inbox**: change-stream listing and event fetch ([`InboxEffects`])
//! - **Store**: bills, debts and the sync watermark ([`LedgerStoreEffects`])
//! - **Directory**: active participant snapshot ([`DirectoryEffects`])
//! - **Notification**: outbound messages ([`NotificationEffects`])
//! - **Time**: wall clock ([`TimeEffects`])
//!
//! Every call is an await point; callers must not hold in-memory state across
//! calls beyond the current batch.

pub mod directory;
pub mod inbox;
pub mod notify;
pub mod store;
pub mod time;

pub use directory::DirectoryEffects;
pub use inbox::{InboxEffects, TransportError};
pub use notify::{NotificationEffects, NotifyError, OutboundMessage};
pub use store::{BillTransaction, LedgerStoreEffects, StagedBill, StoreError};
pub use time::TimeEffects;
