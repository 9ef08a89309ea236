//! Subcommand argument definitions

use clap::Subcommand;

use tally_core::EventCursor;

/// Watermark inspection and operator resync
#[derive(Debug, Clone, Subcommand)]
pub enum WatermarkAction {
    /// Print the stored watermark
    Show,
    /// Move the watermark
    Set {
        /// New cursor
        cursor: EventCursor,
        /// Allow moving the watermark backward
        #[arg(long)]
        force: bool,
    },
}

/// Participant directory management
#[derive(Debug, Clone, Subcommand)]
pub enum ParticipantAction {
    /// Print every participant as JSON
    List,
    /// Add or replace a participant
    Add {
        /// Participant id
        id: String,
        /// Notification address
        #[arg(long)]
        email: String,
        /// Name used in greetings
        #[arg(long)]
        name: Option<String>,
        /// Exclude from new splits
        #[arg(long)]
        inactive: bool,
    },
}
