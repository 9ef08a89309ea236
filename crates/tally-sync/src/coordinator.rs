//! Sync coordinator
//!
//! One batch: read the watermark, drain the change listing from it, process
//! every listed event with bounded concurrency, then move the watermark
//! forward. The watermark only ever moves forward and is written at most once
//! per batch, after every event has been attempted.
//!
//! A batch writes no watermark when the listing fails, when the start cursor
//! has expired, when the deadline elapses, or when any event still cannot be
//! fetched after retries. Events that fail for other reasons are recorded in
//! the [`BatchReport`] and do not hold the watermark.

use futures::stream::{self, StreamExt};
use std::collections::HashSet;
use tracing::{debug, error, info, info_span, warn, Instrument};

use tally_core::effects::{
    DirectoryEffects, InboxEffects, LedgerStoreEffects, NotificationEffects, TimeEffects,
};
use tally_core::{EventCursor, EventId, RetryConfig, SyncConfig, TallyConfig, TallyError};

use crate::errors::{ProcessError, SyncError, SyncResult};
use crate::processor::{EventProcessor, Outcome};
use crate::wake::WakeSignal;

const MAX_WATERMARK_ATTEMPTS: usize = 8;

/// Every event listed after a cursor
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ChangeSet {
    /// Added events in stream order, without duplicates
    pub event_ids: Vec<EventId>,
    /// Cursor reported by the final page
    pub next_cursor: Option<EventCursor>,
}

/// What happened to the watermark at the end of a batch
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum WatermarkUpdate {
    /// The watermark moved forward
    Advanced {
        /// Previous value
        from: Option<EventCursor>,
        /// New value
        to: EventCursor,
    },
    /// The candidate was behind the stored value and was discarded
    Retained {
        /// Value kept
        stored: EventCursor,
        /// Value rejected
        candidate: EventCursor,
    },
    /// The candidate equals the stored value
    Unchanged(EventCursor),
    /// Neither the listing nor the wake signal carried a cursor
    NoCandidate,
}

/// Outcome of one event within a batch
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct EventReport {
    /// The event
    pub event_id: EventId,
    /// Fetch attempts made
    pub attempts: u32,
    /// Processing result
    pub result: Result<Outcome, ProcessError>,
}

/// Summary of a completed batch
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BatchReport {
    /// Cursor the listing started from
    pub start_cursor: EventCursor,
    /// Per-event results in stream order
    pub events: Vec<EventReport>,
    /// Watermark movement
    pub watermark: WatermarkUpdate,
}

impl BatchReport {
    /// Events that produced or found a bill
    pub fn processed(&self) -> usize {
        self.events
            .iter()
            .filter(|e| matches!(e.result, Ok(Outcome::Processed { .. })))
            .count()
    }

    /// Events that created a new bill
    pub fn created(&self) -> usize {
        self.events
            .iter()
            .filter(|e| matches!(e.result, Ok(Outcome::Processed { created: true, .. })))
            .count()
    }

    /// Events skipped without a bill
    pub fn skipped(&self) -> usize {
        self.events
            .iter()
            .filter(|e| matches!(e.result, Ok(Outcome::Skipped(_))))
            .count()
    }

    /// Events that failed
    pub fn failed(&self) -> impl Iterator<Item = &EventReport> {
        self.events.iter().filter(|e| e.result.is_err())
    }
}

/// Drives batches of change-stream ingestion
#[derive(Debug, Clone)]
pub struct SyncCoordinator {
    processor: EventProcessor,
    config: SyncConfig,
}

impl SyncCoordinator {
    /// Build from configuration
    pub fn new(config: &TallyConfig) -> Result<Self, TallyError> {
        Ok(Self {
            processor: EventProcessor::new(config)?,
            config: config.sync.clone(),
        })
    }

    /// Drain every page of changes after `cursor`
    pub async fn sync_since<E: InboxEffects>(
        &self,
        effects: &E,
        cursor: EventCursor,
    ) -> SyncResult<ChangeSet> {
        let mut seen = HashSet::new();
        let mut changes = ChangeSet::default();
        let mut page_token: Option<String> = None;
        let mut pages = 0usize;

        loop {
            let page = effects.list_changes(cursor, page_token.as_deref()).await?;
            pages += 1;
            for id in page.added {
                if seen.insert(id.clone()) {
                    changes.event_ids.push(id);
                }
            }
            match page.next_page_token {
                Some(token) => page_token = Some(token),
                None => {
                    changes.next_cursor = page.cursor;
                    break;
                }
            }
        }

        debug!(
            start = %cursor,
            pages,
            events = changes.event_ids.len(),
            "Listed changes"
        );
        Ok(changes)
    }

    /// Run one batch from the stored watermark, or the bootstrap cursor when
    /// none is stored
    pub async fn run_batch<E>(&self, effects: &E, signal: &WakeSignal) -> SyncResult<BatchReport>
    where
        E: InboxEffects
            + LedgerStoreEffects
            + DirectoryEffects
            + NotificationEffects
            + TimeEffects,
    {
        let start = effects
            .load_watermark()
            .await?
            .unwrap_or(self.config.bootstrap_cursor);
        self.run_batch_from(effects, start, signal).await
    }

    /// Run one batch from an explicit start cursor
    pub async fn run_batch_from<E>(
        &self,
        effects: &E,
        start: EventCursor,
        signal: &WakeSignal,
    ) -> SyncResult<BatchReport>
    where
        E: InboxEffects
            + LedgerStoreEffects
            + DirectoryEffects
            + NotificationEffects
            + TimeEffects,
    {
        let span = info_span!("sync_batch", start = %start);
        async move {
            let work = self.ingest(effects, start);
            let events = match self.config.batch_deadline() {
                Some(deadline) => tokio::time::timeout(deadline, work).await.map_err(|_| {
                    error!(seconds = deadline.as_secs(), "Batch deadline exceeded");
                    SyncError::DeadlineExceeded {
                        seconds: deadline.as_secs(),
                    }
                })??,
                None => work.await?,
            };
            let (changes, events) = events;

            let unfetched: Vec<EventId> = events
                .iter()
                .filter(|e| matches!(&e.result, Err(err) if err.is_fetch()))
                .map(|e| e.event_id.clone())
                .collect();
            for failed in events.iter().filter(|e| e.result.is_err()) {
                if let Err(err) = &failed.result {
                    warn!(event_id = %failed.event_id, error = %err, "Event failed");
                }
            }
            if !unfetched.is_empty() {
                error!(count = unfetched.len(), "Holding watermark for unfetched events");
                return Err(SyncError::EventsUnfetched { unfetched });
            }

            let candidate = changes.next_cursor.or(signal.cursor_hint);
            let watermark = match candidate {
                Some(candidate) => self.advance_watermark(effects, candidate).await?,
                None => {
                    warn!("No cursor from listing or wake signal; watermark not moved");
                    WatermarkUpdate::NoCandidate
                }
            };

            let report = BatchReport {
                start_cursor: start,
                events,
                watermark,
            };
            info!(
                events = report.events.len(),
                created = report.created(),
                skipped = report.skipped(),
                failed = report.failed().count(),
                "Batch complete"
            );
            Ok(report)
        }
        .instrument(span)
        .await
    }

    async fn ingest<E>(
        &self,
        effects: &E,
        start: EventCursor,
    ) -> SyncResult<(ChangeSet, Vec<EventReport>)>
    where
        E: InboxEffects
            + LedgerStoreEffects
            + DirectoryEffects
            + NotificationEffects
            + TimeEffects,
    {
        let changes = match self.sync_since(effects, start).await {
            Ok(changes) => changes,
            Err(SyncError::CursorExpired { cursor }) => {
                error!(cursor = %cursor, "Start cursor expired; manual resync required");
                return Err(SyncError::CursorExpired { cursor });
            }
            Err(e) => return Err(e),
        };

        let concurrency = self.config.max_concurrent_events.max(1);
        let mut events: Vec<(usize, EventReport)> =
            stream::iter(changes.event_ids.iter().cloned().enumerate())
                .map(|(index, id)| async move {
                    let report = self.process_with_retry(effects, id).await;
                    (index, report)
                })
                .buffer_unordered(concurrency)
                .collect()
                .await;
        events.sort_by_key(|(index, _)| *index);

        Ok((changes, events.into_iter().map(|(_, report)| report).collect()))
    }

    async fn process_with_retry<E>(&self, effects: &E, id: EventId) -> EventReport
    where
        E: InboxEffects
            + LedgerStoreEffects
            + DirectoryEffects
            + NotificationEffects
            + TimeEffects,
    {
        let policy: &RetryConfig = &self.config.fetch_retry;
        let max_attempts = policy.max_attempts.max(1);
        let mut attempts = 0;

        let result = loop {
            attempts += 1;
            let result = self
                .processor
                .process_event(effects, &id)
                .instrument(info_span!("process_event", event_id = %id, attempt = attempts))
                .await;
            match result {
                Err(err) if err.is_retryable() && attempts < max_attempts => {
                    let delay = policy.delay_for(attempts);
                    debug!(event_id = %id, attempt = attempts, ?delay, error = %err, "Retrying fetch");
                    tokio::time::sleep(delay).await;
                }
                other => break other,
            }
        };

        EventReport {
            event_id: id,
            attempts,
            result,
        }
    }

    /// Compare-and-set loop moving the watermark to `max(stored, candidate)`
    async fn advance_watermark<S>(&self, store: &S, candidate: EventCursor) -> SyncResult<WatermarkUpdate>
    where
        S: LedgerStoreEffects,
    {
        for _ in 0..MAX_WATERMARK_ATTEMPTS {
            let stored = store.load_watermark().await?;
            match stored {
                Some(stored) if candidate < stored => {
                    warn!(
                        stored = %stored,
                        candidate = %candidate,
                        "Watermark candidate is behind stored value; keeping stored"
                    );
                    return Ok(WatermarkUpdate::Retained { stored, candidate });
                }
                Some(stored) if candidate == stored => {
                    return Ok(WatermarkUpdate::Unchanged(stored));
                }
                _ => {}
            }
            if store.compare_and_set_watermark(stored, candidate).await? {
                info!(from = ?stored.map(|c| c.to_string()), to = %candidate, "Watermark advanced");
                return Ok(WatermarkUpdate::Advanced {
                    from: stored,
                    to: candidate,
                });
            }
            debug!("Watermark changed concurrently; retrying");
        }
        Err(SyncError::WatermarkContention)
    }
}
