use crate::config::weights::FraudThresholds;

/// Raw counters consulted by the gate, gathered by the caller from the vote
/// ledger before the new vote is inserted
#[derive(Debug, Clone, Copy, Default)]
pub struct FraudCounts {
    pub same_ip_on_match: i64,
    pub same_device_on_match: i64,
    pub voter_votes_last_hour: i64,
}

/// Result of the heuristic checks.
///
/// The gate is advisory: a suspicious attempt is flagged and audited, never
/// rejected by the engine itself. Callers may choose to enforce.
#[derive(Debug, Clone, Copy, Default)]
pub struct FraudCheck {
    pub same_ip_burst: bool,
    pub same_device_burst: bool,
    pub voter_rate_exceeded: bool,
}

impl FraudCheck {
    pub fn is_suspicious(&self) -> bool {
        self.same_ip_burst || self.same_device_burst || self.voter_rate_exceeded
    }
}

/// Evaluate the three independent heuristics against their thresholds
pub fn evaluate_fraud(counts: FraudCounts, thresholds: &FraudThresholds) -> FraudCheck {
    FraudCheck {
        same_ip_burst: counts.same_ip_on_match >= thresholds.same_ip_per_match,
        same_device_burst: counts.same_device_on_match >= thresholds.same_device_per_match,
        voter_rate_exceeded: counts.voter_votes_last_hour >= thresholds.voter_votes_per_hour,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_clean_counts_are_not_suspicious() {
        let check = evaluate_fraud(FraudCounts::default(), &FraudThresholds::default());
        assert!(!check.is_suspicious());
    }

    #[test]
    fn test_ip_burst_flags_at_three() {
        let thresholds = FraudThresholds::default();

        let below = evaluate_fraud(
            FraudCounts {
                same_ip_on_match: 2,
                ..Default::default()
            },
            &thresholds,
        );
        assert!(!below.same_ip_burst);

        let at = evaluate_fraud(
            FraudCounts {
                same_ip_on_match: 3,
                ..Default::default()
            },
            &thresholds,
        );
        assert!(at.same_ip_burst);
        assert!(at.is_suspicious());
    }

    #[test]
    fn test_device_burst_flags_at_two() {
        let check = evaluate_fraud(
            FraudCounts {
                same_device_on_match: 2,
                ..Default::default()
            },
            &FraudThresholds::default(),
        );
        assert!(check.same_device_burst);
    }

    #[test]
    fn test_voter_rate_flags_at_ten_per_hour() {
        let check = evaluate_fraud(
            FraudCounts {
                voter_votes_last_hour: 10,
                ..Default::default()
            },
            &FraudThresholds::default(),
        );
        assert!(check.voter_rate_exceeded);
    }

    #[test]
    fn test_heuristics_are_independent() {
        let check = evaluate_fraud(
            FraudCounts {
                same_ip_on_match: 5,
                same_device_on_match: 0,
                voter_votes_last_hour: 0,
            },
            &FraudThresholds::default(),
        );

        assert!(check.same_ip_burst);
        assert!(!check.same_device_burst);
        assert!(!check.voter_rate_exceeded);
    }
}
