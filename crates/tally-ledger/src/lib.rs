//! Tally-Ledger: Bill Splitting and Settlement
//!
//! Two pieces live here:
//!
//! - [`split`]: the pure split engine. An amount divided over an ordered
//!   participant list, rounded to cents, with the whole rounding remainder
//!   assigned to the first participant so the shares always sum to the total.
//! - [`LedgerStateMachine`]: bill creation and debt settlement. Every mutation
//!   runs inside a [`BillTransaction`](tally_core::effects::BillTransaction) and
//!   re-derives the bill status from a full scan of its debts.
//!
//! ```rust,no_run
//! use tally_core::{Amount, Participant};
//! use tally_ledger::split;
//!
//! let people = vec![
//!     Participant::new("amy", "amy@example.com"),
//!     Participant::new("bo", "bo@example.com"),
//!     Participant::new("cy", "cy@example.com"),
//! ];
//! let shares = split(Amount::from_cents(10_000), &people);
//! assert_eq!(shares[0].amount, Amount::from_cents(3334));
//! ```

#![forbid(unsafe_code)]

pub mod error;
pub mod machine;
pub mod split;

pub use error::{LedgerError, LedgerResult};
pub use machine::{LedgerStateMachine, NewBill, RecordOutcome};
pub use split::{split, Share};
