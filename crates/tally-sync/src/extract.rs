//! Bill extraction
//!
//! Finds the total (and optionally a due date) in an event body with
//! configurable patterns. A body without a recognisable total is not an
//! error: the event is simply not a bill.

use chrono::NaiveDate;
use regex::Regex;
use tracing::debug;

use tally_core::config::{ConfigValidator, ExtractionConfig};
use tally_core::{Amount, RawEvent, TallyError};

const DATE_FORMATS: &[&str] = &[
    "%Y-%m-%d",
    "%m/%d/%Y",
    "%B %d, %Y",
    "%b %d, %Y",
    "%B %d %Y",
    "%b %d %Y",
];

/// What was found in a qualifying event
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Extraction {
    /// Counterparty, taken from the event sender
    pub biller_name: String,
    /// Bill total, rounded to cents
    pub total: Amount,
    /// Due date, when the body states one
    pub due_date: Option<NaiveDate>,
}

/// Compiled extraction rule
#[derive(Debug, Clone)]
pub struct Extractor {
    total: Regex,
    due_date: Option<Regex>,
}

impl Extractor {
    /// Compile the configured patterns
    pub fn new(config: &ExtractionConfig) -> Result<Self, TallyError> {
        let mut validator = ConfigValidator::new();
        validator
            .capture_pattern("extraction.total_pattern", &config.total_pattern, false)
            .capture_pattern("extraction.due_date_pattern", &config.due_date_pattern, true);
        validator.finish()?;

        let total = compile(&config.total_pattern)?;
        let due_date = if config.due_date_pattern.is_empty() {
            None
        } else {
            Some(compile(&config.due_date_pattern)?)
        };
        Ok(Self { total, due_date })
    }

    /// Extract a bill from an event, `None` when it does not look like one
    pub fn extract(&self, event: &RawEvent) -> Option<Extraction> {
        let body = event.preferred_body()?;
        let total = self.find_total(body)?;
        Some(Extraction {
            biller_name: event.sender.clone(),
            total,
            due_date: self.find_due_date(body),
        })
    }

    /// The first total in `body`
    pub fn find_total(&self, body: &str) -> Option<Amount> {
        let literal = self.total.captures(body)?.get(1)?.as_str();
        let digits: String = literal.chars().filter(|c| *c != ',').collect();
        match digits.parse::<Amount>() {
            Ok(amount) => Some(amount),
            Err(e) => {
                debug!(literal, error = %e, "Ignoring unparseable total");
                None
            }
        }
    }

    /// The first parseable due date in `body`
    pub fn find_due_date(&self, body: &str) -> Option<NaiveDate> {
        let literal = self.due_date.as_ref()?.captures(body)?.get(1)?.as_str();
        parse_date(literal)
    }
}

fn compile(pattern: &str) -> Result<Regex, TallyError> {
    Regex::new(pattern).map_err(|e| TallyError::configuration(e.to_string()))
}

fn parse_date(literal: &str) -> Option<NaiveDate> {
    let normalised = literal
        .replace('.', "")
        .split_whitespace()
        .collect::<Vec<_>>()
        .join(" ");
    DATE_FORMATS
        .iter()
        .find_map(|format| NaiveDate::parse_from_str(&normalised, format).ok())
}
