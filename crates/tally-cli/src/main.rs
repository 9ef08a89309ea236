//! Tally operator CLI
//!
//! Runs sync batches against the filesystem store and a JSON inbox fixture,
//! and exposes the ledger operations for manual use.

use anyhow::Result;
use clap::{Parser, Subcommand};
use std::path::PathBuf;
use tracing_subscriber::EnvFilter;

use tally_core::EventCursor;

mod commands;
mod handlers;

use commands::{ParticipantAction, WatermarkAction};
use handlers::CliHandler;

#[derive(Parser)]
#[command(name = "tally")]
#[command(about = "Tally - split emailed bills across a household", long_about = None)]
struct Cli {
    #[command(subcommand)]
    command: Commands,

    /// Enable verbose logging
    #[arg(short, long, global = true)]
    verbose: bool,

    /// Config file path
    #[arg(short, long, global = true, default_value = "tally.toml")]
    config: PathBuf,
}

#[derive(Subcommand)]
enum Commands {
    /// Run one sync batch
    Sync {
        /// Base64 `data` field of a push notification
        #[arg(long, conflicts_with = "hint")]
        push_data: Option<String>,

        /// Cursor hint used when the listing reports none
        #[arg(long)]
        hint: Option<EventCursor>,

        /// Start from this cursor instead of the stored watermark
        #[arg(long)]
        from: Option<EventCursor>,
    },

    /// Mark one participant's share of a bill as paid
    MarkPaid {
        /// Bill id
        bill: String,
        /// Participant id
        participant: String,
        /// Who recorded the payment
        #[arg(long)]
        paid_by: Option<String>,
    },

    /// Re-derive a bill's status from its debts
    Recompute {
        /// Bill id
        bill: String,
    },

    /// Print every bill as JSON
    Bills,

    /// Print one bill and its debts as JSON
    Bill {
        /// Bill id
        id: String,
    },

    /// Inspect or move the sync watermark
    #[command(subcommand)]
    Watermark(WatermarkAction),

    /// Manage the participant directory
    #[command(subcommand)]
    Participants(ParticipantAction),
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    let log_level = if cli.verbose { "debug" } else { "info" };
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(log_level));
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .init();

    let handler = CliHandler::open(&cli.config).await?;

    match cli.command {
        Commands::Sync {
            push_data,
            hint,
            from,
        } => {
            handler.handle_sync(push_data.as_deref(), hint, from).await?;
        }

        Commands::MarkPaid {
            bill,
            participant,
            paid_by,
        } => {
            handler.handle_mark_paid(&bill, &participant, paid_by).await?;
        }

        Commands::Recompute { bill } => {
            handler.handle_recompute(&bill).await?;
        }

        Commands::Bills => {
            handler.handle_bills().await?;
        }

        Commands::Bill { id } => {
            handler.handle_bill(&id).await?;
        }

        Commands::Watermark(action) => {
            handler.handle_watermark(action).await?;
        }

        Commands::Participants(action) => {
            handler.handle_participants(action).await?;
        }
    }

    Ok(())
}
