//! Household fixtures

use tally_core::{Participant, ParticipantId};

/// `n` active participants with ids `p00`, `p01`, ... in directory order
pub fn household(n: usize) -> Vec<Participant> {
    (0..n)
        .map(|i| {
            Participant::new(format!("p{i:02}"), format!("p{i:02}@example.com"))
                .with_display_name(format!("Roommate {i}"))
        })
        .collect()
}

/// Three named roommates, one without a display name
pub fn roommates() -> Vec<Participant> {
    vec![
        Participant::new("alice", "alice@example.com").with_display_name("Alice"),
        Participant::new("bob", "bob@example.com").with_display_name("Bob"),
        Participant::new("carol", "carol@example.com"),
    ]
}

/// Ids of the given participants
pub fn ids(participants: &[Participant]) -> Vec<ParticipantId> {
    participants.iter().map(|p| p.id.clone()).collect()
}
