use rust_decimal::prelude::FromPrimitive;
use rust_decimal::{Decimal, RoundingStrategy};

use crate::config::weights::ScoringCoefficients;

const SCORE_SCALE: u32 = 4;

/// Inputs to the ranking score formula for one entry
#[derive(Debug, Clone, Copy, Default)]
pub struct EntryStats {
    pub votes_count: i64,
    pub avg_rating: f64,
    pub seated_reservations: i64,
    pub verified_votes: i64,
    pub local_votes: i64,
}

/// Weighted ranking score of one entry, rounded to 4 decimal places,
/// half-up
pub fn entry_score(stats: &EntryStats, coefficients: &ScoringCoefficients) -> Decimal {
    let avg_rating = Decimal::from_f64(stats.avg_rating).unwrap_or_default();

    let score = Decimal::from(stats.votes_count) * coefficients.per_vote
        + avg_rating * coefficients.per_avg_rating_point
        + Decimal::from(stats.seated_reservations) * coefficients.per_seated_reservation
        + Decimal::from(stats.verified_votes) * coefficients.per_verified_vote
        + Decimal::from(stats.local_votes) * coefficients.per_local_vote;

    score.round_dp_with_strategy(SCORE_SCALE, RoundingStrategy::MidpointAwayFromZero)
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::str::FromStr;

    #[test]
    fn test_reference_score_scenario() {
        // 10 votes (6 local), avg 4.5, 2 seated, 3 verified:
        // 100 + 90 + 10 + 4.5 + 7.2 = 211.7
        let stats = EntryStats {
            votes_count: 10,
            avg_rating: 4.5,
            seated_reservations: 2,
            verified_votes: 3,
            local_votes: 6,
        };

        let score = entry_score(&stats, &ScoringCoefficients::default());
        assert_eq!(score, Decimal::from_str("211.7").unwrap());
    }

    #[test]
    fn test_zero_stats_score_zero() {
        let score = entry_score(&EntryStats::default(), &ScoringCoefficients::default());
        assert_eq!(score, Decimal::ZERO);
    }

    #[test]
    fn test_score_rounds_to_four_places_half_up() {
        let stats = EntryStats {
            votes_count: 0,
            avg_rating: 0.123456,
            seated_reservations: 0,
            verified_votes: 0,
            local_votes: 0,
        };

        // 0.123456 * 20 = 2.46912, rounds down at the 5th place
        let score = entry_score(&stats, &ScoringCoefficients::default());
        assert_eq!(score, Decimal::from_str("2.4691").unwrap())
    }

    #[test]
    fn test_more_votes_score_higher() {
        let coefficients = ScoringCoefficients::default();
        let few = entry_score(
            &EntryStats {
                votes_count: 3,
                ..Default::default()
            },
            &coefficients,
        );
        let many = entry_score(
            &EntryStats {
                votes_count: 30,
                ..Default::default()
            },
            &coefficients,
        );

        assert!(many > few);
    }
}
