//! `tally watermark`

use anyhow::{bail, Result};
use serde_json::json;

use tally_core::effects::LedgerStoreEffects;
use tally_effects::FilesystemLedgerStore;

use super::print_json;
use crate::commands::WatermarkAction;

pub async fn handle_watermark(store: &FilesystemLedgerStore, action: WatermarkAction) -> Result<()> {
    match action {
        WatermarkAction::Show => {
            let cursor = store.load_watermark().await?;
            print_json(&json!({ "watermark": cursor }))
        }
        WatermarkAction::Set { cursor, force: true } => {
            store.reset_watermark(cursor).await?;
            print_json(&json!({ "watermark": cursor }))
        }
        WatermarkAction::Set {
            cursor,
            force: false,
        } => {
            let stored = store.load_watermark().await?;
            if let Some(stored) = stored {
                if cursor < stored {
                    bail!("watermark {stored} is ahead of {cursor}; pass --force to move it back");
                }
            }
            if !store.compare_and_set_watermark(stored, cursor).await? {
                bail!("watermark changed while updating; retry");
            }
            print_json(&json!({ "watermark": cursor }))
        }
    }
}
