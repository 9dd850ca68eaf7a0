pub mod bracket;
pub mod fraud;
pub mod scoring;
pub mod standings;
pub mod weighting;

pub use bracket::{assign_groups, knockout_pairings, round_robin_fixtures, Fixture};
pub use fraud::{evaluate_fraud, FraudCheck, FraudCounts};
pub use scoring::{entry_score, EntryStats};
pub use standings::{decide_winner, order_by_points, MatchDecision};
pub use weighting::vote_weight;
