//! Event processor
//!
//! Turns one inbox event into at most one bill. The pipeline is
//! fetch, filter, extract, directory snapshot, split, idempotent record and,
//! for newly created bills only, one notification per debt.

use std::fmt;
use tracing::{debug, info, warn};

use tally_core::effects::{
    DirectoryEffects, InboxEffects, LedgerStoreEffects, NotificationEffects, TimeEffects,
    TransportError,
};
use tally_core::{BillId, BillSnapshot, EventId, Participant, RawEvent, TallyConfig, TallyError};
use tally_ledger::{split, LedgerStateMachine, NewBill};

use crate::errors::ProcessError;
use crate::extract::Extractor;
use crate::filter::EventFilter;
use crate::notify::NotificationComposer;

/// Why an event produced no bill
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum SkipReason {
    /// The event did not pass the configured filter
    Filtered,
    /// No total was found in the body
    NoBillDetected,
    /// The directory had no active participants
    NoActiveParticipants,
    /// The event was removed upstream before it could be fetched
    Removed,
}

impl fmt::Display for SkipReason {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            SkipReason::Filtered => "filtered",
            SkipReason::NoBillDetected => "no bill detected",
            SkipReason::NoActiveParticipants => "no active participants",
            SkipReason::Removed => "removed upstream",
        };
        f.write_str(s)
    }
}

/// Result of processing one event
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Outcome {
    /// Nothing was written
    Skipped(SkipReason),
    /// A bill exists for the event
    Processed {
        /// The bill
        bill_id: BillId,
        /// Whether this call created it (false on replay)
        created: bool,
    },
}

/// Per-event pipeline
#[derive(Debug, Clone)]
pub struct EventProcessor {
    filter: EventFilter,
    extractor: Extractor,
    composer: Option<NotificationComposer>,
    currency: String,
}

impl EventProcessor {
    /// Build from configuration
    pub fn new(config: &TallyConfig) -> Result<Self, TallyError> {
        let composer = config
            .notify
            .enabled
            .then(|| NotificationComposer::new(&config.inbox.user, config.notify.excerpt_limit));
        Ok(Self {
            filter: EventFilter::new(&config.filters),
            extractor: Extractor::new(&config.extraction)?,
            composer,
            currency: config.ledger.currency.clone(),
        })
    }

    /// Process one event id
    pub async fn process_event<E>(&self, effects: &E, id: &EventId) -> Result<Outcome, ProcessError>
    where
        E: InboxEffects
            + LedgerStoreEffects
            + DirectoryEffects
            + NotificationEffects
            + TimeEffects,
    {
        let event = match effects.fetch_event(id).await {
            Ok(event) => event,
            Err(TransportError::EventNotFound { .. }) => {
                info!(event_id = %id, "Event no longer exists upstream");
                return Ok(Outcome::Skipped(SkipReason::Removed));
            }
            Err(source) => {
                return Err(ProcessError::Fetch {
                    id: id.clone(),
                    source,
                })
            }
        };

        if !self.filter.matches(&event) {
            debug!(event_id = %id, sender = %event.sender, "Event filtered out");
            return Ok(Outcome::Skipped(SkipReason::Filtered));
        }

        let Some(extraction) = self.extractor.extract(&event) else {
            debug!(event_id = %id, "No bill total found");
            return Ok(Outcome::Skipped(SkipReason::NoBillDetected));
        };

        let participants = effects
            .active_participants()
            .await
            .map_err(|source| ProcessError::Directory {
                id: id.clone(),
                source,
            })?;
        if participants.is_empty() {
            warn!(event_id = %id, total = %extraction.total, "No active participants to split bill");
            return Ok(Outcome::Skipped(SkipReason::NoActiveParticipants));
        }

        let shares = split(extraction.total, &participants);
        let received_at = effects.now().await;
        let new_bill = NewBill {
            source_event_id: event.id.clone(),
            biller_name: extraction.biller_name,
            total: extraction.total,
            due_date: extraction.due_date,
            currency: self.currency.clone(),
            received_at,
        };

        let outcome = LedgerStateMachine::new(effects)
            .record_bill(new_bill, &shares)
            .await
            .map_err(|source| ProcessError::Persistence {
                id: id.clone(),
                source,
            })?;

        let created = outcome.is_created();
        let snapshot = outcome.into_snapshot();
        if created {
            self.notify(effects, &snapshot, &participants, &event).await;
        } else {
            debug!(event_id = %id, "Bill already recorded; not notifying again");
        }

        Ok(Outcome::Processed {
            bill_id: snapshot.bill.id,
            created,
        })
    }

    async fn notify<E: NotificationEffects>(
        &self,
        effects: &E,
        snapshot: &BillSnapshot,
        participants: &[Participant],
        source: &RawEvent,
    ) {
        let Some(composer) = &self.composer else {
            return;
        };

        for debt in &snapshot.debts {
            let Some(participant) = participants.iter().find(|p| p.id == debt.participant_id) else {
                continue;
            };
            let message = composer.compose(&snapshot.bill, participant, debt.amount, source);
            if let Err(e) = effects.send(&message).await {
                warn!(
                    bill_id = %snapshot.bill.id,
                    participant = %participant.id,
                    error = %e,
                    "Failed to notify participant"
                );
            }
        }
    }
}
