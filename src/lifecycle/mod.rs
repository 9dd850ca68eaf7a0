pub mod challenge;
pub mod queries;
pub mod ranking;
pub mod tournament;
pub mod voting;

pub use challenge::NewChallenge;
pub use ranking::NewRanking;
pub use tournament::NewTournament;
pub use voting::{CastMatchVote, CastRankingVote, MatchVoteOutcome};

// Outbox event types emitted by the engine
pub const EVENT_CHALLENGE_STATUS_CHANGED: &str = "challenge.status_changed";
pub const EVENT_CHALLENGE_REGISTERED: &str = "challenge.registered";
pub const EVENT_CHALLENGE_WITHDRAWN: &str = "challenge.withdrawn";
pub const EVENT_TOURNAMENT_REGISTERED: &str = "tournament.registered";
pub const EVENT_TOURNAMENT_WITHDRAWN: &str = "tournament.withdrawn";
pub const EVENT_TOURNAMENT_STARTED: &str = "tournament.started";
pub const EVENT_TOURNAMENT_PHASE_ADVANCED: &str = "tournament.phase_advanced";
pub const EVENT_TOURNAMENT_COMPLETED: &str = "tournament.completed";
pub const EVENT_MATCH_COMPLETED: &str = "match.completed";
pub const EVENT_VOTE_CAST: &str = "vote.cast";
pub const EVENT_RANKING_UPDATED: &str = "ranking.updated";

pub const AGGREGATE_CHALLENGE: &str = "challenge";
pub const AGGREGATE_TOURNAMENT: &str = "tournament";
pub const AGGREGATE_MATCH: &str = "match";
pub const AGGREGATE_RANKING: &str = "ranking";
