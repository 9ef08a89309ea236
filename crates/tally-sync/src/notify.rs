//! Notification content for newly split bills

use tally_core::effects::OutboundMessage;
use tally_core::{Amount, Bill, Participant, RawEvent};

const EXCERPT_HEADER: &str = "\n--- Original message excerpt ---\n";

/// Renders one message per participant share
#[derive(Debug, Clone)]
pub struct NotificationComposer {
    from: String,
    excerpt_limit: usize,
}

impl NotificationComposer {
    /// Messages are sent from `from`; quoted bodies are cut at `excerpt_limit`
    /// characters
    pub fn new(from: impl Into<String>, excerpt_limit: usize) -> Self {
        Self {
            from: from.into(),
            excerpt_limit,
        }
    }

    /// Message telling `participant` their share of `bill`
    pub fn compose(
        &self,
        bill: &Bill,
        participant: &Participant,
        share: Amount,
        source: &RawEvent,
    ) -> OutboundMessage {
        let biller = &bill.biller_name;
        let subject = format!("Bill split: {biller} - Your share ${share}");

        let mut body = String::new();
        if !participant.display_name.is_empty() {
            body.push_str(&format!("Hi {},\n\n", participant.display_name));
        }
        body.push_str(&format!("Your share for the bill from {biller} is ${share}.\n"));
        if let Some(due) = bill.due_date {
            body.push_str(&format!("Due date: {}\n", due.format("%Y-%m-%d")));
        }
        body.push_str(EXCERPT_HEADER);
        body.push_str(&self.excerpt(source));

        OutboundMessage {
            from: self.from.clone(),
            to: participant.email.clone(),
            subject,
            body,
        }
    }

    fn excerpt(&self, source: &RawEvent) -> String {
        let text = source.excerpt_body().unwrap_or_default();
        match text.char_indices().nth(self.excerpt_limit) {
            Some((cut, _)) => format!("{}...", &text[..cut]),
            None => text.to_string(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::{NaiveDate, Utc};
    use tally_core::{BillId, BillStatus, EventId};

    fn bill(due: Option<NaiveDate>) -> Bill {
        Bill {
            id: BillId::new("m1"),
            biller_name: "billing@power.example".into(),
            total_amount: Amount::from_cents(10_000),
            status: BillStatus::Unpaid,
            due_date: due,
            date_received: Utc::now(),
            source_event_id: EventId::new("m1"),
            currency: "USD".into(),
            created_at: Utc::now(),
        }
    }

    fn source(plain: &str) -> RawEvent {
        RawEvent {
            id: EventId::new("m1"),
            plain_body: Some(plain.into()),
            html_body: Some("<p>ignored</p>".into()),
            ..Default::default()
        }
    }

    #[test]
    fn test_message_with_greeting_and_due_date() {
        let composer = NotificationComposer::new("house@example.com", 2000);
        let alice = Participant::new("alice", "alice@example.com").with_display_name("Alice");
        let message = composer.compose(
            &bill(NaiveDate::from_ymd_opt(2024, 4, 1)),
            &alice,
            Amount::from_cents(3334),
            &source("Total: $100.00"),
        );

        assert_eq!(message.from, "house@example.com");
        assert_eq!(message.to, "alice@example.com");
        assert_eq!(message.subject, "Bill split: billing@power.example - Your share $33.34");
        assert_eq!(
            message.body,
            "Hi Alice,\n\nYour share for the bill from billing@power.example is $33.34.\n\
             Due date: 2024-04-01\n\n--- Original message excerpt ---\nTotal: $100.00"
        );
    }

    #[test]
    fn test_message_without_name_or_due_date() {
        let composer = NotificationComposer::new("house@example.com", 2000);
        let carol = Participant::new("carol", "carol@example.com");
        let message = composer.compose(&bill(None), &carol, Amount::from_cents(3333), &source("x"));
        assert!(message
            .body
            .starts_with("Your share for the bill from billing@power.example is $33.33.\n\n---"));
    }

    #[test]
    fn test_excerpt_is_truncated() {
        let composer = NotificationComposer::new("house@example.com", 5);
        let carol = Participant::new("carol", "carol@example.com");
        let message = composer.compose(
            &bill(None),
            &carol,
            Amount::from_cents(1),
            &source("ÄÖÜäöüß and more"),
        );
        assert!(message.body.ends_with("ÄÖÜäö..."));
    }
}
