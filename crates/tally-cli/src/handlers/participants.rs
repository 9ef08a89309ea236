//! `tally participants`

use anyhow::Result;

use tally_core::Participant;
use tally_effects::FilesystemLedgerStore;

use super::print_json;
use crate::commands::ParticipantAction;

pub async fn handle_participants(
    store: &FilesystemLedgerStore,
    action: ParticipantAction,
) -> Result<()> {
    match action {
        ParticipantAction::List => print_json(&store.list_participants().await?),
        ParticipantAction::Add {
            id,
            email,
            name,
            inactive,
        } => {
            let participant = Participant::new(id, email)
                .with_display_name(name.unwrap_or_default())
                .with_active(!inactive);
            store.upsert_participant(&participant).await?;
            tracing::info!(participant = %participant.id, active = participant.active, "Participant saved");
            print_json(&participant)
        }
    }
}
