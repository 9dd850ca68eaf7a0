pub mod models;
pub mod status;

pub use models::{
    AuditRecord, Challenge, Customer, Match, MatchVote, OutboxEvent, Participation, Ranking,
    RankingEntry, RankingVote, Reservation, Restaurant, Tournament,
};
pub use status::{
    next_phase, ChallengeStatus, MatchStatus, ParticipationStatus, RankingPeriod, TournamentPhase,
    TournamentStatus, VoterClassification,
};
