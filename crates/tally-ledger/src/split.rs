//! Split engine
//!
//! `share = round(total / n)` to cents, half away from zero; every participant
//! gets `share`, then `total - share * n` is added to the first participant.
//! The remainder is at most `n/2` cents in magnitude and may be negative when
//! the rounded share overshoots.

use serde::{Deserialize, Serialize};
use tally_core::{Amount, Participant, ParticipantId};

/// One participant's portion of a split
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Share {
    /// Participant owing the share
    pub participant_id: ParticipantId,
    /// Amount owed
    pub amount: Amount,
}

/// Split `total` across `participants` in list order.
///
/// An empty participant list yields no shares; callers must not persist a
/// bill in that case.
pub fn split(total: Amount, participants: &[Participant]) -> Vec<Share> {
    let Some(share) = total.divide_rounded(participants.len()) else {
        return Vec::new();
    };

    let mut shares: Vec<Share> = participants
        .iter()
        .map(|p| Share {
            participant_id: p.id.clone(),
            amount: share,
        })
        .collect();

    let remainder = total - share.times(participants.len());
    if remainder != Amount::ZERO {
        shares[0].amount = shares[0].amount + remainder;
    }

    shares
}

#[cfg(test)]
mod tests {
    use super::*;

    fn people(n: usize) -> Vec<Participant> {
        (0..n)
            .map(|i| Participant::new(format!("p{i}"), format!("p{i}@example.com")))
            .collect()
    }

    fn amounts(shares: &[Share]) -> Vec<Amount> {
        shares.iter().map(|s| s.amount).collect()
    }

    #[test]
    fn test_three_way_split_gives_remainder_to_first() {
        let shares = split(Amount::from_cents(10_000), &people(3));
        assert_eq!(
            amounts(&shares),
            vec![
                Amount::from_cents(3334),
                Amount::from_cents(3333),
                Amount::from_cents(3333)
            ]
        );
    }

    #[test]
    fn test_single_participant_owes_everything() {
        let shares = split(Amount::from_cents(1000), &people(1));
        assert_eq!(amounts(&shares), vec![Amount::from_cents(1000)]);
        assert_eq!(shares[0].participant_id, ParticipantId::new("p0"));
    }

    #[test]
    fn test_rounded_share_can_overshoot() {
        // 0.05 / 3 = 0.0166.. rounds up to 0.02, so the first share absorbs -0.01
        let shares = split(Amount::from_cents(5), &people(3));
        assert_eq!(
            amounts(&shares),
            vec![
                Amount::from_cents(1),
                Amount::from_cents(2),
                Amount::from_cents(2)
            ]
        );
    }

    #[test]
    fn test_even_split_has_no_remainder() {
        let shares = split(Amount::from_cents(9000), &people(3));
        assert!(shares.iter().all(|s| s.amount == Amount::from_cents(3000)));
    }

    #[test]
    fn test_empty_participants_yield_nothing() {
        assert!(split(Amount::from_cents(1000), &[]).is_empty());
    }

    #[test]
    fn test_zero_total() {
        let shares = split(Amount::ZERO, &people(4));
        assert_eq!(shares.len(), 4);
        assert!(shares.iter().all(|s| s.amount == Amount::ZERO));
    }
}
