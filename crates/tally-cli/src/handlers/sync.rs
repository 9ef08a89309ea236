//! `tally sync`

use anyhow::Result;
use serde_json::json;

use tally_core::{EventCursor, TallyConfig};
use tally_sync::{BatchReport, Outcome, SyncCoordinator, WakeSignal, WatermarkUpdate};

use super::{print_json, CliEffects};

pub async fn handle_sync(
    config: &TallyConfig,
    effects: &CliEffects,
    push_data: Option<&str>,
    hint: Option<EventCursor>,
    from: Option<EventCursor>,
) -> Result<()> {
    let signal = match (push_data, hint) {
        (Some(data), _) => WakeSignal::from_push_message(data)?,
        (None, Some(cursor)) => WakeSignal::with_hint(cursor),
        (None, None) => WakeSignal::empty(),
    };

    let coordinator = SyncCoordinator::new(config)?;
    let report = match from {
        Some(start) => {
            tracing::warn!(start = %start, "Running batch from an operator-supplied cursor");
            coordinator.run_batch_from(effects, start, &signal).await?
        }
        None => coordinator.run_batch(effects, &signal).await?,
    };

    print_json(&summary(&report))
}

fn summary(report: &BatchReport) -> serde_json::Value {
    let events: Vec<_> = report
        .events
        .iter()
        .map(|event| {
            let outcome = match &event.result {
                Ok(Outcome::Processed { bill_id, created }) => json!({
                    "status": if *created { "created" } else { "already_recorded" },
                    "bill_id": bill_id,
                }),
                Ok(Outcome::Skipped(reason)) => json!({
                    "status": "skipped",
                    "reason": reason.to_string(),
                }),
                Err(e) => json!({
                    "status": "failed",
                    "error": e.to_string(),
                }),
            };
            json!({
                "event_id": event.event_id,
                "attempts": event.attempts,
                "outcome": outcome,
            })
        })
        .collect();

    let watermark = match report.watermark {
        WatermarkUpdate::Advanced { from, to } => json!({ "advanced": { "from": from, "to": to } }),
        WatermarkUpdate::Retained { stored, candidate } => {
            json!({ "retained": { "stored": stored, "candidate": candidate } })
        }
        WatermarkUpdate::Unchanged(cursor) => json!({ "unchanged": cursor }),
        WatermarkUpdate::NoCandidate => json!("no_candidate"),
    };

    json!({
        "start_cursor": report.start_cursor,
        "created": report.created(),
        "skipped": report.skipped(),
        "failed": report.failed().count(),
        "events": events,
        "watermark": watermark,
    })
}
