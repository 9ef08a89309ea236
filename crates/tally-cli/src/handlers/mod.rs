//! CLI command handlers
//!
//! Each command runs against the same effect bundle: the filesystem store,
//! the fixture inbox named in the configuration, a tracing notifier and the
//! system clock.

use anyhow::{Context, Result};
use serde::Serialize;
use std::path::Path;

use tally_core::{EventCursor, TallyConfig};
use tally_effects::{FilesystemLedgerStore, FixtureInbox, SystemClock, TallyEffects, TracingNotifier};

use crate::commands::{ParticipantAction, WatermarkAction};

mod ledger;
mod participants;
mod sync;
mod watermark;

/// Effect bundle used by every command
pub type CliEffects = TallyEffects<FixtureInbox, FilesystemLedgerStore, TracingNotifier, SystemClock>;

/// Loaded configuration plus the effect bundle built from it
pub struct CliHandler {
    config: TallyConfig,
    effects: CliEffects,
}

impl CliHandler {
    /// Load configuration from `config_path` and open the handlers it names
    pub async fn open(config_path: &Path) -> Result<Self> {
        let config = TallyConfig::load(Some(config_path))
            .with_context(|| format!("loading {}", config_path.display()))?;

        let inbox = match &config.inbox.fixture {
            Some(path) => FixtureInbox::load(path).await?,
            None => FixtureInbox::new(),
        };
        let store = FilesystemLedgerStore::open(&config.store.path)
            .await
            .with_context(|| format!("opening store at {}", config.store.path.display()))?;

        tracing::debug!(
            store = %config.store.path.display(),
            fixture = ?config.inbox.fixture,
            "CLI handlers ready"
        );

        Ok(Self {
            effects: TallyEffects::new(inbox, store, TracingNotifier::new(), SystemClock::new()),
            config,
        })
    }

    /// Handle `sync`
    pub async fn handle_sync(
        &self,
        push_data: Option<&str>,
        hint: Option<EventCursor>,
        from: Option<EventCursor>,
    ) -> Result<()> {
        sync::handle_sync(&self.config, &self.effects, push_data, hint, from).await
    }

    /// Handle `mark-paid`
    pub async fn handle_mark_paid(
        &self,
        bill: &str,
        participant: &str,
        paid_by: Option<String>,
    ) -> Result<()> {
        ledger::handle_mark_paid(&self.effects, bill, participant, paid_by).await
    }

    /// Handle `recompute`
    pub async fn handle_recompute(&self, bill: &str) -> Result<()> {
        ledger::handle_recompute(&self.effects, bill).await
    }

    /// Handle `bills`
    pub async fn handle_bills(&self) -> Result<()> {
        ledger::handle_bills(&self.effects).await
    }

    /// Handle `bill`
    pub async fn handle_bill(&self, id: &str) -> Result<()> {
        ledger::handle_bill(&self.effects, id).await
    }

    /// Handle `watermark`
    pub async fn handle_watermark(&self, action: WatermarkAction) -> Result<()> {
        watermark::handle_watermark(self.effects.store(), action).await
    }

    /// Handle `participants`
    pub async fn handle_participants(&self, action: ParticipantAction) -> Result<()> {
        participants::handle_participants(self.effects.store(), action).await
    }
}

/// Print `value` as pretty JSON on stdout
pub(crate) fn print_json<T: Serialize + ?Sized>(value: &T) -> Result<()> {
    println!("{}", serde_json::to_string_pretty(value)?);
    Ok(())
}
