use crate::config::weights::{base_weight, VERIFIED_MULTIPLIER};
use crate::domain::status::VoterClassification;

/// Weight of a single vote: the classification's base weight, boosted when
/// the vote is backed by a confirmed reservation
pub fn vote_weight(classification: VoterClassification, verified: bool) -> f64 {
    let base = base_weight(classification);

    if verified {
        base * VERIFIED_MULTIPLIER
    } else {
        base
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_local_votes_weigh_more_than_tourist_votes() {
        let local = vote_weight(VoterClassification::Local, false);
        let tourist = vote_weight(VoterClassification::Tourist, false);

        assert!(local > tourist);
        assert!((tourist - 1.0).abs() < f64::EPSILON);
    }

    #[test]
    fn test_verified_multiplier_applied() {
        let unverified = vote_weight(VoterClassification::Local, false);
        let verified = vote_weight(VoterClassification::Local, true);

        assert!((verified - unverified * 1.5).abs() < 1e-9);
    }

    #[test]
    fn test_critic_has_highest_base_weight() {
        let critic = vote_weight(VoterClassification::Critic, false);

        for classification in [
            VoterClassification::Local,
            VoterClassification::Tourist,
            VoterClassification::Foodie,
        ] {
            assert!(critic >= vote_weight(classification, false));
        }
    }
}
