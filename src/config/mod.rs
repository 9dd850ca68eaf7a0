pub mod weights;

pub use weights::{
    base_weight, ClassificationWeight, FraudThresholds, ScoringCoefficients, VERIFIED_MULTIPLIER,
};
