use rust_decimal::Decimal;

use crate::domain::status::VoterClassification;

/// Multiplier applied on top of the base weight for reservation-verified votes
pub const VERIFIED_MULTIPLIER: f64 = 1.5;

/// Base vote weight per voter classification
#[derive(Debug, Clone)]
pub struct ClassificationWeight {
    pub classification: VoterClassification,
    pub base: f64,
}

impl ClassificationWeight {
    pub fn new(classification: VoterClassification, base: f64) -> Self {
        Self {
            classification,
            base,
        }
    }
}

/// Get the configured base weights for all voter classifications
pub fn classification_weights() -> Vec<ClassificationWeight> {
    vec![
        ClassificationWeight::new(VoterClassification::Local, 1.2),
        ClassificationWeight::new(VoterClassification::Tourist, 1.0),
        ClassificationWeight::new(VoterClassification::Foodie, 1.3),
        ClassificationWeight::new(VoterClassification::Critic, 1.5),
    ]
}

/// Base weight for a single classification
pub fn base_weight(classification: VoterClassification) -> f64 {
    classification_weights()
        .iter()
        .find(|w| w.classification == classification)
        .map(|w| w.base)
        .unwrap_or(1.0)
}

/// Heuristic limits for the anti-fraud gate
#[derive(Debug, Clone, Copy)]
pub struct FraudThresholds {
    pub same_ip_per_match: i64,
    pub same_device_per_match: i64,
    pub voter_votes_per_hour: i64,
}

impl Default for FraudThresholds {
    fn default() -> Self {
        Self {
            same_ip_per_match: 3,
            same_device_per_match: 2,
            voter_votes_per_hour: 10,
        }
    }
}

/// Coefficients of the ranking score formula
#[derive(Debug, Clone, Copy)]
pub struct ScoringCoefficients {
    pub per_vote: Decimal,
    pub per_avg_rating_point: Decimal,
    pub per_seated_reservation: Decimal,
    pub per_verified_vote: Decimal,
    pub per_local_vote: Decimal,
}

impl Default for ScoringCoefficients {
    fn default() -> Self {
        Self {
            per_vote: Decimal::new(10, 0),
            per_avg_rating_point: Decimal::new(20, 0),
            per_seated_reservation: Decimal::new(5, 0),
            per_verified_vote: Decimal::new(15, 1),
            per_local_vote: Decimal::new(12, 1),
        }
    }
}
