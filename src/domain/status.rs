use serde::{Deserialize, Serialize};

/// Lifecycle status of a standalone challenge.
///
/// Statuses only ever advance forward through the declared order, except
/// that CANCELLED is reachable from every non-terminal state.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum ChallengeStatus {
    Draft,
    Upcoming,
    Registration,
    Preliminary,
    Active,
    Voting,
    Completed,
    Cancelled,
}

impl ChallengeStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            ChallengeStatus::Draft => "DRAFT",
            ChallengeStatus::Upcoming => "UPCOMING",
            ChallengeStatus::Registration => "REGISTRATION",
            ChallengeStatus::Preliminary => "PRELIMINARY",
            ChallengeStatus::Active => "ACTIVE",
            ChallengeStatus::Voting => "VOTING",
            ChallengeStatus::Completed => "COMPLETED",
            ChallengeStatus::Cancelled => "CANCELLED",
        }
    }

    pub fn parse(value: &str) -> Option<Self> {
        match value {
            "DRAFT" => Some(ChallengeStatus::Draft),
            "UPCOMING" => Some(ChallengeStatus::Upcoming),
            "REGISTRATION" => Some(ChallengeStatus::Registration),
            "PRELIMINARY" => Some(ChallengeStatus::Preliminary),
            "ACTIVE" => Some(ChallengeStatus::Active),
            "VOTING" => Some(ChallengeStatus::Voting),
            "COMPLETED" => Some(ChallengeStatus::Completed),
            "CANCELLED" => Some(ChallengeStatus::Cancelled),
            _ => None,
        }
    }

    /// Position in the forward order; CANCELLED sits outside the order.
    pub fn order_index(&self) -> Option<usize> {
        match self {
            ChallengeStatus::Draft => Some(0),
            ChallengeStatus::Upcoming => Some(1),
            ChallengeStatus::Registration => Some(2),
            ChallengeStatus::Preliminary => Some(3),
            ChallengeStatus::Active => Some(4),
            ChallengeStatus::Voting => Some(5),
            ChallengeStatus::Completed => Some(6),
            ChallengeStatus::Cancelled => None,
        }
    }

    pub fn is_terminal(&self) -> bool {
        matches!(self, ChallengeStatus::Completed | ChallengeStatus::Cancelled)
    }

    /// Cancellation is allowed from every state except COMPLETED.
    pub fn can_cancel(&self) -> bool {
        !matches!(self, ChallengeStatus::Completed)
    }
}

/// Lifecycle status of a multi-phase tournament
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum TournamentStatus {
    Draft,
    Registration,
    Ongoing,
    Completed,
    Cancelled,
}

impl TournamentStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            TournamentStatus::Draft => "DRAFT",
            TournamentStatus::Registration => "REGISTRATION",
            TournamentStatus::Ongoing => "ONGOING",
            TournamentStatus::Completed => "COMPLETED",
            TournamentStatus::Cancelled => "CANCELLED",
        }
    }

    pub fn parse(value: &str) -> Option<Self> {
        match value {
            "DRAFT" => Some(TournamentStatus::Draft),
            "REGISTRATION" => Some(TournamentStatus::Registration),
            "ONGOING" => Some(TournamentStatus::Ongoing),
            "COMPLETED" => Some(TournamentStatus::Completed),
            "CANCELLED" => Some(TournamentStatus::Cancelled),
            _ => None,
        }
    }

    pub fn is_terminal(&self) -> bool {
        matches!(
            self,
            TournamentStatus::Completed | TournamentStatus::Cancelled
        )
    }
}

/// Phase of an ongoing tournament
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum TournamentPhase {
    GroupStage,
    RoundOf16,
    QuarterFinals,
    SemiFinals,
    Finals,
}

impl TournamentPhase {
    pub fn as_str(&self) -> &'static str {
        match self {
            TournamentPhase::GroupStage => "GROUP_STAGE",
            TournamentPhase::RoundOf16 => "ROUND_OF_16",
            TournamentPhase::QuarterFinals => "QUARTER_FINALS",
            TournamentPhase::SemiFinals => "SEMI_FINALS",
            TournamentPhase::Finals => "FINALS",
        }
    }

    pub fn parse(value: &str) -> Option<Self> {
        match value {
            "GROUP_STAGE" => Some(TournamentPhase::GroupStage),
            "ROUND_OF_16" => Some(TournamentPhase::RoundOf16),
            "QUARTER_FINALS" => Some(TournamentPhase::QuarterFinals),
            "SEMI_FINALS" => Some(TournamentPhase::SemiFinals),
            "FINALS" => Some(TournamentPhase::Finals),
            _ => None,
        }
    }

    pub fn is_knockout(&self) -> bool {
        !matches!(self, TournamentPhase::GroupStage)
    }
}

/// Total successor function over tournament phases.
///
/// Leaving the group stage, the entry point into the knockout tree depends
/// on how many participants survived; knockout phases are strictly
/// sequential afterwards. FINALS has no successor.
pub fn next_phase(
    current: TournamentPhase,
    surviving_participants: usize,
) -> Option<TournamentPhase> {
    match current {
        TournamentPhase::GroupStage => {
            if surviving_participants >= 16 {
                Some(TournamentPhase::RoundOf16)
            } else if surviving_participants >= 8 {
                Some(TournamentPhase::QuarterFinals)
            } else {
                Some(TournamentPhase::SemiFinals)
            }
        }
        TournamentPhase::RoundOf16 => Some(TournamentPhase::QuarterFinals),
        TournamentPhase::QuarterFinals => Some(TournamentPhase::SemiFinals),
        TournamentPhase::SemiFinals => Some(TournamentPhase::Finals),
        TournamentPhase::Finals => None,
    }
}

/// Status of a restaurant's participation in a competition
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum ParticipationStatus {
    Registered,
    Qualified,
    Active,
    Eliminated,
    Disqualified,
    Withdrawn,
    Winner,
}

impl ParticipationStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            ParticipationStatus::Registered => "REGISTERED",
            ParticipationStatus::Qualified => "QUALIFIED",
            ParticipationStatus::Active => "ACTIVE",
            ParticipationStatus::Eliminated => "ELIMINATED",
            ParticipationStatus::Disqualified => "DISQUALIFIED",
            ParticipationStatus::Withdrawn => "WITHDRAWN",
            ParticipationStatus::Winner => "WINNER",
        }
    }

    pub fn parse(value: &str) -> Option<Self> {
        match value {
            "REGISTERED" => Some(ParticipationStatus::Registered),
            "QUALIFIED" => Some(ParticipationStatus::Qualified),
            "ACTIVE" => Some(ParticipationStatus::Active),
            "ELIMINATED" => Some(ParticipationStatus::Eliminated),
            "DISQUALIFIED" => Some(ParticipationStatus::Disqualified),
            "WITHDRAWN" => Some(ParticipationStatus::Withdrawn),
            "WINNER" => Some(ParticipationStatus::Winner),
            _ => None,
        }
    }
}

/// Status of a single match
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum MatchStatus {
    Scheduled,
    Voting,
    Completed,
}

impl MatchStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            MatchStatus::Scheduled => "SCHEDULED",
            MatchStatus::Voting => "VOTING",
            MatchStatus::Completed => "COMPLETED",
        }
    }

    pub fn parse(value: &str) -> Option<Self> {
        match value {
            "SCHEDULED" => Some(MatchStatus::Scheduled),
            "VOTING" => Some(MatchStatus::Voting),
            "COMPLETED" => Some(MatchStatus::Completed),
            _ => None,
        }
    }
}

/// Category of voter, driving the base vote weight
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum VoterClassification {
    Local,
    Tourist,
    Foodie,
    Critic,
}

impl VoterClassification {
    pub fn as_str(&self) -> &'static str {
        match self {
            VoterClassification::Local => "LOCAL",
            VoterClassification::Tourist => "TOURIST",
            VoterClassification::Foodie => "FOODIE",
            VoterClassification::Critic => "CRITIC",
        }
    }

    pub fn parse(value: &str) -> Option<Self> {
        match value {
            "LOCAL" => Some(VoterClassification::Local),
            "TOURIST" => Some(VoterClassification::Tourist),
            "FOODIE" => Some(VoterClassification::Foodie),
            "CRITIC" => Some(VoterClassification::Critic),
            _ => None,
        }
    }
}

/// Time window of a ranking leaderboard
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum RankingPeriod {
    Weekly,
    Monthly,
    Quarterly,
    Yearly,
    AllTime,
}

impl RankingPeriod {
    pub fn as_str(&self) -> &'static str {
        match self {
            RankingPeriod::Weekly => "WEEKLY",
            RankingPeriod::Monthly => "MONTHLY",
            RankingPeriod::Quarterly => "QUARTERLY",
            RankingPeriod::Yearly => "YEARLY",
            RankingPeriod::AllTime => "ALL_TIME",
        }
    }

    pub fn parse(value: &str) -> Option<Self> {
        match value {
            "WEEKLY" => Some(RankingPeriod::Weekly),
            "MONTHLY" => Some(RankingPeriod::Monthly),
            "QUARTERLY" => Some(RankingPeriod::Quarterly),
            "YEARLY" => Some(RankingPeriod::Yearly),
            "ALL_TIME" => Some(RankingPeriod::AllTime),
            _ => None,
        }
    }

    /// Number of days covered by the period, None for ALL_TIME
    pub fn window_days(&self) -> Option<i64> {
        match self {
            RankingPeriod::Weekly => Some(7),
            RankingPeriod::Monthly => Some(30),
            RankingPeriod::Quarterly => Some(90),
            RankingPeriod::Yearly => Some(365),
            RankingPeriod::AllTime => None,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_challenge_status_round_trip() {
        let statuses = [
            ChallengeStatus::Draft,
            ChallengeStatus::Upcoming,
            ChallengeStatus::Registration,
            ChallengeStatus::Preliminary,
            ChallengeStatus::Active,
            ChallengeStatus::Voting,
            ChallengeStatus::Completed,
            ChallengeStatus::Cancelled,
        ];

        for status in statuses {
            assert_eq!(ChallengeStatus::parse(status.as_str()), Some(status));
        }
    }

    #[test]
    fn test_challenge_forward_order() {
        let draft = ChallengeStatus::Draft.order_index().unwrap();
        let voting = ChallengeStatus::Voting.order_index().unwrap();
        let completed = ChallengeStatus::Completed.order_index().unwrap();

        assert!(draft < voting);
        assert!(voting < completed);
        assert_eq!(ChallengeStatus::Cancelled.order_index(), None);
    }

    #[test]
    fn test_cancel_allowed_except_completed() {
        assert!(ChallengeStatus::Draft.can_cancel());
        assert!(ChallengeStatus::Voting.can_cancel());
        assert!(ChallengeStatus::Cancelled.can_cancel());
        assert!(!ChallengeStatus::Completed.can_cancel());
    }

    #[test]
    fn test_next_phase_from_group_stage_by_survivor_count() {
        assert_eq!(
            next_phase(TournamentPhase::GroupStage, 16),
            Some(TournamentPhase::RoundOf16)
        );
        assert_eq!(
            next_phase(TournamentPhase::GroupStage, 10),
            Some(TournamentPhase::QuarterFinals)
        );
        assert_eq!(
            next_phase(TournamentPhase::GroupStage, 8),
            Some(TournamentPhase::QuarterFinals)
        );
        assert_eq!(
            next_phase(TournamentPhase::GroupStage, 4),
            Some(TournamentPhase::SemiFinals)
        );
    }

    #[test]
    fn test_knockout_phases_are_sequential() {
        assert_eq!(
            next_phase(TournamentPhase::RoundOf16, 8),
            Some(TournamentPhase::QuarterFinals)
        );
        assert_eq!(
            next_phase(TournamentPhase::QuarterFinals, 4),
            Some(TournamentPhase::SemiFinals)
        );
        assert_eq!(
            next_phase(TournamentPhase::SemiFinals, 2),
            Some(TournamentPhase::Finals)
        );
        assert_eq!(next_phase(TournamentPhase::Finals, 1), None);
    }
}
