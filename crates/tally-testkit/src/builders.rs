//! Builders for inbox events

use tally_core::{EventId, RawEvent};

/// Fluent builder for [`RawEvent`]
#[derive(Debug, Clone)]
pub struct RawEventBuilder {
    event: RawEvent,
}

impl RawEventBuilder {
    /// Start an event with the given id from a default utility sender
    pub fn new(id: impl Into<EventId>) -> Self {
        Self {
            event: RawEvent {
                id: id.into(),
                sender: "billing@power.example".into(),
                subject: "Your monthly statement".into(),
                ..Default::default()
            },
        }
    }

    /// Set the sender
    pub fn sender(mut self, sender: impl Into<String>) -> Self {
        self.event.sender = sender.into();
        self
    }

    /// Set the subject
    pub fn subject(mut self, subject: impl Into<String>) -> Self {
        self.event.subject = subject.into();
        self
    }

    /// Set the snippet
    pub fn snippet(mut self, snippet: impl Into<String>) -> Self {
        self.event.snippet = snippet.into();
        self
    }

    /// Add a label
    pub fn label(mut self, label: impl Into<String>) -> Self {
        self.event.labels.push(label.into());
        self
    }

    /// Set the plain text body
    pub fn plain(mut self, body: impl Into<String>) -> Self {
        self.event.plain_body = Some(body.into());
        self
    }

    /// Set the HTML body
    pub fn html(mut self, body: impl Into<String>) -> Self {
        self.event.html_body = Some(body.into());
        self
    }

    /// Plain text body wrapping a total line in some statement boilerplate
    pub fn total_line(self, line: &str) -> Self {
        self.plain(format!(
            "Thanks for being a customer.\n\n{line}\n\nPay online at any time."
        ))
    }

    /// Finish
    pub fn build(self) -> RawEvent {
        self.event
    }
}
