//! Service configuration
//!
//! Configuration is layered: built-in defaults, then an optional TOML file,
//! then `TALLY_*` environment overrides, then validation. A missing file is
//! not an error; a file that exists but does not parse is.
//!
//! ```toml
//! [inbox]
//! user = "billing@example.com"
//!
//! [filters]
//! biller_senders = ["power-co.example", "water.example"]
//!
//! [sync]
//! max_concurrent_events = 4
//! ```

pub mod validation;

use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use std::time::Duration;

use crate::{EventCursor, TallyError, TallyResult};
pub use validation::{ConfigValidator, ValidationError};

/// Default pattern for the bill total. The first capture group is the amount.
pub const DEFAULT_TOTAL_PATTERN: &str =
    r"(?i)(?:total|amount due|balance)[:\s]*\$?\s*([\d,]+(?:\.\d{2})?)";

/// Default pattern for an optional due date. The first capture group is the date.
pub const DEFAULT_DUE_DATE_PATTERN: &str = r"(?i)due(?:\s+date|\s+by|\s+on)?[:\s]*([A-Za-z]{3,9}\.?\s+\d{1,2},?\s+\d{4}|\d{4}-\d{2}-\d{2}|\d{1,2}/\d{1,2}/\d{4})";

const ENV_PREFIX: &str = "TALLY_";

/// Top-level configuration
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct TallyConfig {
    /// Monitored inbox
    pub inbox: InboxConfig,
    /// Ledger store location
    pub store: StoreConfig,
    /// Which events count as bills
    pub filters: FilterSpec,
    /// Amount and due-date extraction
    pub extraction: ExtractionConfig,
    /// Batch ingestion
    pub sync: SyncConfig,
    /// Ledger defaults
    pub ledger: LedgerConfig,
    /// Participant notifications
    pub notify: NotifyConfig,
}

/// Monitored inbox settings
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct InboxConfig {
    /// Inbox address; also the sender of notifications. Required.
    pub user: String,
    /// JSON change-log fixture used by the bundled file-backed inbox
    pub fixture: Option<PathBuf>,
}

/// Ledger store settings
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct StoreConfig {
    /// Root directory of the filesystem store
    pub path: PathBuf,
}

impl Default for StoreConfig {
    fn default() -> Self {
        Self {
            path: PathBuf::from(".tally/store"),
        }
    }
}

/// Which events are treated as bills. Empty lists do not constrain.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct FilterSpec {
    /// Sender must contain one of these (case-insensitive)
    pub biller_senders: Vec<String>,
    /// Every keyword must appear in sender, subject or snippet
    pub keywords: Vec<String>,
    /// Every label must be attached to the event
    pub label_ids: Vec<String>,
}

/// Extraction patterns
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct ExtractionConfig {
    /// Pattern locating the bill total
    pub total_pattern: String,
    /// Pattern locating the due date; empty disables due-date extraction
    pub due_date_pattern: String,
}

impl Default for ExtractionConfig {
    fn default() -> Self {
        Self {
            total_pattern: DEFAULT_TOTAL_PATTERN.to_string(),
            due_date_pattern: DEFAULT_DUE_DATE_PATTERN.to_string(),
        }
    }
}

/// Retry policy with capped exponential backoff
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct RetryConfig {
    /// Total attempts including the first
    pub max_attempts: u32,
    /// Delay before the first retry
    pub base_delay_ms: u64,
    /// Upper bound for any single delay
    pub max_delay_ms: u64,
}

impl Default for RetryConfig {
    fn default() -> Self {
        Self {
            max_attempts: 3,
            base_delay_ms: 200,
            max_delay_ms: 5_000,
        }
    }
}

impl RetryConfig {
    /// Delay before retry number `retry` (1-based)
    pub fn delay_for(&self, retry: u32) -> Duration {
        let factor = 1u64 << retry.saturating_sub(1).min(16);
        Duration::from_millis(self.base_delay_ms.saturating_mul(factor).min(self.max_delay_ms))
    }

    /// A policy that never waits, for tests
    pub fn immediate(max_attempts: u32) -> Self {
        Self {
            max_attempts,
            base_delay_ms: 0,
            max_delay_ms: 0,
        }
    }
}

/// Batch ingestion settings
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct SyncConfig {
    /// Start cursor used when no watermark has been stored yet
    pub bootstrap_cursor: EventCursor,
    /// Events processed concurrently within one batch
    pub max_concurrent_events: usize,
    /// Abort a batch (without committing) after this many seconds; 0 disables
    pub batch_deadline_secs: u64,
    /// Retry policy for per-event fetches
    pub fetch_retry: RetryConfig,
}

impl Default for SyncConfig {
    fn default() -> Self {
        Self {
            bootstrap_cursor: EventCursor::new(1),
            max_concurrent_events: 4,
            batch_deadline_secs: 300,
            fetch_retry: RetryConfig::default(),
        }
    }
}

impl SyncConfig {
    /// The batch deadline, if enabled
    pub fn batch_deadline(&self) -> Option<Duration> {
        (self.batch_deadline_secs > 0).then(|| Duration::from_secs(self.batch_deadline_secs))
    }
}

/// Ledger defaults
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct LedgerConfig {
    /// Currency recorded on new bills
    pub currency: String,
}

impl Default for LedgerConfig {
    fn default() -> Self {
        Self {
            currency: "USD".to_string(),
        }
    }
}

/// Participant notification settings
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct NotifyConfig {
    /// Send a message per debt when a bill is created
    pub enabled: bool,
    /// Maximum characters of the original message quoted in notifications
    pub excerpt_limit: usize,
}

impl Default for NotifyConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            excerpt_limit: 2000,
        }
    }
}

impl TallyConfig {
    /// Load defaults, the optional file, and process environment overrides,
    /// then validate.
    pub fn load(path: Option<&Path>) -> TallyResult<Self> {
        let mut config = match path {
            Some(path) => Self::load_from_file(path)?,
            None => Self::default(),
        };
        config.merge_with_env()?;
        config.validate()?;
        Ok(config)
    }

    /// Read a TOML file over the defaults; a missing file yields the defaults
    pub fn load_from_file(path: &Path) -> TallyResult<Self> {
        match std::fs::read_to_string(path) {
            Ok(content) => Self::from_toml_str(&content),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
                tracing::debug!("Config file {} not found, using defaults", path.display());
                Ok(Self::default())
            }
            Err(e) => Err(TallyError::configuration(format!(
                "Failed to read config file {}: {e}",
                path.display()
            ))),
        }
    }

    /// Parse a TOML document over the defaults
    pub fn from_toml_str(content: &str) -> TallyResult<Self> {
        Ok(toml::from_str(content)?)
    }

    /// Apply `TALLY_*` variables from the process environment
    pub fn merge_with_env(&mut self) -> TallyResult<()> {
        self.merge_with_vars(|key| std::env::var(key).ok())
    }

    /// Apply `TALLY_*` overrides from an arbitrary variable source
    pub fn merge_with_vars<F>(&mut self, lookup: F) -> TallyResult<()>
    where
        F: Fn(&str) -> Option<String>,
    {
        let var = |name: &str| {
            lookup(&format!("{ENV_PREFIX}{name}")).filter(|v| !v.trim().is_empty())
        };

        if let Some(v) = var("INBOX_USER") {
            self.inbox.user = v;
        }
        if let Some(v) = var("INBOX_FIXTURE") {
            self.inbox.fixture = Some(PathBuf::from(v));
        }
        if let Some(v) = var("STORE_PATH") {
            self.store.path = PathBuf::from(v);
        }
        if let Some(v) = var("FILTER_BILLER_SENDERS") {
            self.filters.biller_senders = split_list(&v);
        }
        if let Some(v) = var("FILTER_KEYWORDS") {
            self.filters.keywords = split_list(&v);
        }
        if let Some(v) = var("FILTER_LABEL_IDS") {
            self.filters.label_ids = split_list(&v);
        }
        if let Some(v) = var("EXTRACTION_TOTAL_PATTERN") {
            self.extraction.total_pattern = v;
        }
        if let Some(v) = lookup(&format!("{ENV_PREFIX}EXTRACTION_DUE_DATE_PATTERN")) {
            // An explicitly empty value disables the due-date rule
            self.extraction.due_date_pattern = v;
        }
        if let Some(v) = var("SYNC_BOOTSTRAP_CURSOR") {
            self.sync.bootstrap_cursor = v.parse()?;
        }
        if let Some(v) = var("SYNC_MAX_CONCURRENT_EVENTS") {
            self.sync.max_concurrent_events = parse_number("SYNC_MAX_CONCURRENT_EVENTS", &v)?;
        }
        if let Some(v) = var("SYNC_BATCH_DEADLINE_SECS") {
            self.sync.batch_deadline_secs = parse_number("SYNC_BATCH_DEADLINE_SECS", &v)?;
        }
        if let Some(v) = var("LEDGER_CURRENCY") {
            self.ledger.currency = v;
        }
        if let Some(v) = var("NOTIFY_ENABLED") {
            self.notify.enabled = parse_bool("NOTIFY_ENABLED", &v)?;
        }
        Ok(())
    }

    /// Check every section, reporting all problems at once
    pub fn validate(&self) -> TallyResult<()> {
        let mut validator = ConfigValidator::new();

        let mut inbox = validator.for_field("inbox");
        inbox.required("user", &self.inbox.user);
        validator.merge(inbox);

        let mut extraction = validator.for_field("extraction");
        extraction
            .capture_pattern("total_pattern", &self.extraction.total_pattern, false)
            .capture_pattern("due_date_pattern", &self.extraction.due_date_pattern, true);
        validator.merge(extraction);

        let mut sync = validator.for_field("sync");
        sync.at_least("max_concurrent_events", self.sync.max_concurrent_events as u64, 1)
            .at_least(
                "fetch_retry.max_attempts",
                u64::from(self.sync.fetch_retry.max_attempts),
                1,
            );
        validator.merge(sync);

        let mut ledger = validator.for_field("ledger");
        ledger.custom(
            "currency",
            &self.ledger.currency,
            |c| c.len() == 3 && c.chars().all(|ch| ch.is_ascii_uppercase()),
            "must be a three-letter uppercase currency code",
        );
        validator.merge(ledger);

        validator.finish()
    }
}

fn split_list(value: &str) -> Vec<String> {
    value
        .split(',')
        .map(str::trim)
        .filter(|s| !s.is_empty())
        .map(str::to_string)
        .collect()
}

fn parse_number<T: std::str::FromStr>(name: &str, value: &str) -> TallyResult<T> {
    value.trim().parse().map_err(|_| {
        TallyError::configuration(format!("{ENV_PREFIX}{name} must be a number, got {value:?}"))
    })
}

fn parse_bool(name: &str, value: &str) -> TallyResult<bool> {
    match value.trim().to_ascii_lowercase().as_str() {
        "1" | "true" | "yes" | "on" => Ok(true),
        "0" | "false" | "no" | "off" => Ok(false),
        _ => Err(TallyError::configuration(format!(
            "{ENV_PREFIX}{name} must be a boolean, got {value:?}"
        ))),
    }
}
