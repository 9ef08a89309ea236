//! Inbox event payloads as delivered by the transport

use serde::{Deserialize, Serialize};

use crate::{EventCursor, EventId};

/// Full content of one inbox item
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RawEvent {
    /// Inbox item identifier
    pub id: EventId,
    /// Declared sender (the `From` header)
    #[serde(default)]
    pub sender: String,
    /// Subject line
    #[serde(default)]
    pub subject: String,
    /// Short preview text supplied by the inbox
    #[serde(default)]
    pub snippet: String,
    /// Labels attached to the item
    #[serde(default)]
    pub labels: Vec<String>,
    /// Rich (HTML) body, if any
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub html_body: Option<String>,
    /// Plain text body, if any
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub plain_body: Option<String>,
}

impl RawEvent {
    /// The body used for extraction: rich representation first, plain text
    /// as fallback. Empty bodies count as absent.
    pub fn preferred_body(&self) -> Option<&str> {
        non_empty(self.html_body.as_deref()).or_else(|| non_empty(self.plain_body.as_deref()))
    }

    /// The body used for human-readable excerpts: plain text first.
    pub fn excerpt_body(&self) -> Option<&str> {
        non_empty(self.plain_body.as_deref()).or_else(|| non_empty(self.html_body.as_deref()))
    }

    /// Whether the event carries the given label
    pub fn has_label(&self, label: &str) -> bool {
        self.labels.iter().any(|l| l == label)
    }
}

fn non_empty(s: Option<&str>) -> Option<&str> {
    s.filter(|s| !s.is_empty())
}

/// One page of the inbox change stream
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ChangePage {
    /// Items added within this page, in stream order
    pub added: Vec<EventId>,
    /// Token for the next page; `None` on the final page
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub next_page_token: Option<String>,
    /// Stream position reported with this page. Only the final page's value
    /// is a valid watermark.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub cursor: Option<EventCursor>,
}

impl ChangePage {
    /// Whether this is the last page of the listing
    pub fn is_final(&self) -> bool {
        self.next_page_token.is_none()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_preferred_body_falls_back_to_plain() {
        let mut event = RawEvent {
            id: EventId::new("m1"),
            plain_body: Some("Total: $5.00".into()),
            ..Default::default()
        };
        assert_eq!(event.preferred_body(), Some("Total: $5.00"));

        event.html_body = Some(String::new());
        assert_eq!(event.preferred_body(), Some("Total: $5.00"));

        event.html_body = Some("<b>Total: $6.00</b>".into());
        assert_eq!(event.preferred_body(), Some("<b>Total: $6.00</b>"));
        assert_eq!(event.excerpt_body(), Some("Total: $5.00"));
    }

    #[test]
    fn test_empty_event_has_no_body() {
        let event = RawEvent::default();
        assert_eq!(event.preferred_body(), None);
        assert_eq!(event.excerpt_body(), None);
    }
}
