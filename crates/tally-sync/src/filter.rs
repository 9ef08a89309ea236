//! Event filter
//!
//! Categories combine with AND; an empty category does not constrain.
//! Senders match if any entry is a case-insensitive substring of the sender.
//! Keywords must all appear in sender, subject or snippet. Labels must all be
//! attached.

use tally_core::{FilterSpec, RawEvent};

/// Compiled filter predicate
#[derive(Debug, Clone, Default)]
pub struct EventFilter {
    senders: Vec<String>,
    keywords: Vec<String>,
    labels: Vec<String>,
}

impl EventFilter {
    /// Build from configuration. Blank entries are ignored.
    pub fn new(spec: &FilterSpec) -> Self {
        Self {
            senders: lowered(&spec.biller_senders),
            keywords: lowered(&spec.keywords),
            labels: spec
                .label_ids
                .iter()
                .filter(|l| !l.trim().is_empty())
                .cloned()
                .collect(),
        }
    }

    /// Whether the event qualifies for extraction
    pub fn matches(&self, event: &RawEvent) -> bool {
        self.sender_matches(event) && self.keywords_match(event) && self.labels_match(event)
    }

    fn sender_matches(&self, event: &RawEvent) -> bool {
        if self.senders.is_empty() {
            return true;
        }
        let sender = event.sender.to_lowercase();
        self.senders.iter().any(|s| sender.contains(s.as_str()))
    }

    fn keywords_match(&self, event: &RawEvent) -> bool {
        if self.keywords.is_empty() {
            return true;
        }
        let haystack =
            format!("{} {} {}", event.sender, event.subject, event.snippet).to_lowercase();
        self.keywords.iter().all(|k| haystack.contains(k.as_str()))
    }

    fn labels_match(&self, event: &RawEvent) -> bool {
        self.labels.iter().all(|l| event.has_label(l))
    }
}

fn lowered(entries: &[String]) -> Vec<String> {
    entries
        .iter()
        .map(|e| e.trim().to_lowercase())
        .filter(|e| !e.is_empty())
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use tally_core::EventId;

    fn event() -> RawEvent {
        RawEvent {
            id: EventId::new("m1"),
            sender: "City Water <Billing@Water.example>".into(),
            subject: "Your March statement".into(),
            snippet: "Amount due in 14 days".into(),
            labels: vec!["INBOX".into(), "Label_7".into()],
            ..Default::default()
        }
    }

    fn spec(senders: &[&str], keywords: &[&str], labels: &[&str]) -> FilterSpec {
        let owned = |xs: &[&str]| xs.iter().map(|s| s.to_string()).collect();
        FilterSpec {
            biller_senders: owned(senders),
            keywords: owned(keywords),
            label_ids: owned(labels),
        }
    }

    #[test]
    fn test_empty_spec_matches_everything() {
        assert!(EventFilter::new(&FilterSpec::default()).matches(&event()));
    }

    #[test]
    fn test_senders_are_any_of() {
        assert!(EventFilter::new(&spec(&["power.example", "water.example"], &[], &[])).matches(&event()));
        assert!(!EventFilter::new(&spec(&["power.example"], &[], &[])).matches(&event()));
    }

    #[test]
    fn test_keywords_are_all_of() {
        assert!(EventFilter::new(&spec(&[], &["statement", "AMOUNT DUE"], &[])).matches(&event()));
        assert!(!EventFilter::new(&spec(&[], &["statement", "overdue"], &[])).matches(&event()));
    }

    #[test]
    fn test_labels_are_all_of() {
        assert!(EventFilter::new(&spec(&[], &[], &["INBOX", "Label_7"])).matches(&event()));
        assert!(!EventFilter::new(&spec(&[], &[], &["INBOX", "Label_9"])).matches(&event()));
    }

    #[test]
    fn test_categories_combine_with_and() {
        let filter = EventFilter::new(&spec(&["water.example"], &["statement"], &["Label_9"]));
        assert!(!filter.matches(&event()));
    }
}
