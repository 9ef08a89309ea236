//! Fixture inbox
//!
//! An in-memory change log standing in for a mail provider. Each delivered
//! event advances the head cursor by one. Listings are paginated by a fixed
//! page size and report the head cursor with every page. Cursors below the
//! retention horizon are rejected as expired.

use async_trait::async_trait;
use parking_lot::RwLock;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::path::Path;
use tracing::debug;

use tally_core::effects::{InboxEffects, TransportError};
use tally_core::{ChangePage, EventCursor, EventId, RawEvent, TallyError};

const DEFAULT_PAGE_SIZE: usize = 100;

/// On-disk fixture format
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct FixtureFile {
    /// Events in delivery order
    #[serde(default)]
    pub events: Vec<RawEvent>,
    /// Cursor the change log starts at
    #[serde(default)]
    pub start_cursor: Option<EventCursor>,
    /// Oldest cursor still listable
    #[serde(default)]
    pub retained_from: Option<EventCursor>,
    /// Items per listing page
    #[serde(default)]
    pub page_size: Option<usize>,
}

#[derive(Debug)]
struct ChangeLog {
    events: HashMap<EventId, RawEvent>,
    changes: Vec<(EventCursor, EventId)>,
    head: EventCursor,
    retained_from: EventCursor,
}

/// In-memory paginated inbox
#[derive(Debug)]
pub struct FixtureInbox {
    log: RwLock<ChangeLog>,
    page_size: usize,
}

impl Default for FixtureInbox {
    fn default() -> Self {
        Self::new()
    }
}

impl FixtureInbox {
    /// Empty inbox whose head cursor is 1
    pub fn new() -> Self {
        Self::starting_at(EventCursor::new(1))
    }

    /// Empty inbox whose head cursor is `start`
    pub fn starting_at(start: EventCursor) -> Self {
        Self {
            log: RwLock::new(ChangeLog {
                events: HashMap::new(),
                changes: Vec::new(),
                head: start,
                retained_from: start,
            }),
            page_size: DEFAULT_PAGE_SIZE,
        }
    }

    /// Set the listing page size (at least one)
    pub fn with_page_size(mut self, page_size: usize) -> Self {
        self.page_size = page_size.max(1);
        self
    }

    /// Build from a parsed fixture
    pub fn from_fixture(fixture: FixtureFile) -> Self {
        let start = fixture.start_cursor.unwrap_or(EventCursor::new(1));
        let inbox = Self::starting_at(start)
            .with_page_size(fixture.page_size.unwrap_or(DEFAULT_PAGE_SIZE));
        for event in fixture.events {
            inbox.deliver(event);
        }
        if let Some(horizon) = fixture.retained_from {
            inbox.expire_before(horizon);
        }
        inbox
    }

    /// Load a JSON fixture file
    pub async fn load(path: &Path) -> Result<Self, TallyError> {
        let bytes = tokio::fs::read(path).await.map_err(|e| {
            TallyError::configuration(format!("Failed to read inbox fixture {}: {e}", path.display()))
        })?;
        let fixture: FixtureFile = serde_json::from_slice(&bytes)?;
        debug!(path = %path.display(), events = fixture.events.len(), "Loaded inbox fixture");
        Ok(Self::from_fixture(fixture))
    }

    /// Append an event to the change log and return its cursor
    pub fn deliver(&self, event: RawEvent) -> EventCursor {
        let mut log = self.log.write();
        log.head = EventCursor::new(log.head.position() + 1);
        let cursor = log.head;
        log.changes.push((cursor, event.id.clone()));
        log.events.insert(event.id.clone(), event);
        cursor
    }

    /// Record another change for an already delivered event
    pub fn redeliver(&self, id: &EventId) -> EventCursor {
        let mut log = self.log.write();
        log.head = EventCursor::new(log.head.position() + 1);
        let cursor = log.head;
        log.changes.push((cursor, id.clone()));
        cursor
    }

    /// Remove an event's content; later fetches fail with not-found
    pub fn remove(&self, id: &EventId) {
        self.log.write().events.remove(id);
    }

    /// Drop history older than `horizon`
    pub fn expire_before(&self, horizon: EventCursor) {
        let mut log = self.log.write();
        log.retained_from = log.retained_from.max(horizon);
    }

    /// Current head cursor
    pub fn head(&self) -> EventCursor {
        self.log.read().head
    }
}

#[async_trait]
impl InboxEffects for FixtureInbox {
    async fn fetch_event(&self, id: &EventId) -> Result<RawEvent, TransportError> {
        self.log
            .read()
            .events
            .get(id)
            .cloned()
            .ok_or_else(|| TransportError::EventNotFound { id: id.clone() })
    }

    async fn list_changes(
        &self,
        cursor: EventCursor,
        page_token: Option<&str>,
    ) -> Result<ChangePage, TransportError> {
        let log = self.log.read();
        if cursor < log.retained_from {
            return Err(TransportError::CursorExpired { cursor });
        }

        let offset = match page_token {
            Some(token) => token
                .parse::<usize>()
                .map_err(|_| TransportError::malformed(format!("Unknown page token {token:?}")))?,
            None => 0,
        };

        let pending: Vec<&EventId> = log
            .changes
            .iter()
            .filter(|(position, _)| *position > cursor)
            .map(|(_, id)| id)
            .collect();
        let end = offset.saturating_add(self.page_size).min(pending.len());
        let added = pending
            .get(offset..end)
            .unwrap_or_default()
            .iter()
            .map(|id| (*id).clone())
            .collect();
        let next_page_token = (end < pending.len()).then(|| end.to_string());

        Ok(ChangePage {
            added,
            next_page_token,
            cursor: Some(log.head),
        })
    }
}
