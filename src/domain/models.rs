use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

use super::status::{
    ChallengeStatus, MatchStatus, ParticipationStatus, RankingPeriod, TournamentPhase,
    TournamentStatus, VoterClassification,
};

/// Restaurant directory entry (external collaborator, lookup only)
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Restaurant {
    pub id: i64,
    pub name: String,
    pub city: String,
    pub cuisine: String,
}

/// Customer/voter directory entry (external collaborator, lookup only)
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Customer {
    pub id: i64,
    pub name: String,
    pub classification: VoterClassification,
}

/// Reservation record used to back verified votes
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Reservation {
    pub id: i64,
    pub customer_id: i64,
    pub restaurant_id: i64,
    pub seated: bool,
    pub visited_at: DateTime<Utc>,
}

/// Standalone themed competition
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Challenge {
    pub id: i64,
    pub name: String,
    pub slug: String,
    pub status: ChallengeStatus,
    pub registration_starts_at: Option<DateTime<Utc>>,
    pub registration_ends_at: Option<DateTime<Utc>>,
    pub voting_starts_at: Option<DateTime<Utc>>,
    pub voting_ends_at: Option<DateTime<Utc>>,
    pub min_participants: i64,
    pub max_participants: i64,
    pub participants_count: i64,
    pub votes_count: i64,
    pub views_count: i64,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

/// Multi-phase competition: group stage then single-elimination knockout
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Tournament {
    pub id: i64,
    pub name: String,
    pub status: TournamentStatus,
    pub current_phase: Option<TournamentPhase>,
    pub city: String,
    pub cuisine: Option<String>,
    pub max_participants: i64,
    pub group_count: i64,
    pub group_size: i64,
    pub qualifiers_per_group: i64,
    pub match_voting_hours: i64,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

/// A restaurant's enrollment in a challenge or tournament.
///
/// Exactly one of `challenge_id`/`tournament_id` is set; group tallies are
/// recomputed from match results and never drift from match history.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Participation {
    pub id: i64,
    pub restaurant_id: i64,
    pub challenge_id: Option<i64>,
    pub tournament_id: Option<i64>,
    pub status: ParticipationStatus,
    pub qualification_score: Option<f64>,
    pub qualification_rank: Option<i64>,
    pub group_number: Option<i64>,
    pub matches_played: i64,
    pub matches_won: i64,
    pub matches_lost: i64,
    pub matches_drawn: i64,
    pub group_points: i64,
    pub group_position: Option<i64>,
    pub total_votes: i64,
    pub furthest_phase: Option<TournamentPhase>,
    pub elimination_reason: Option<String>,
    pub eliminated_at: Option<DateTime<Utc>>,
    pub created_at: DateTime<Utc>,
}

/// One scheduled vote-off between two restaurants inside a phase
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Match {
    pub id: i64,
    pub tournament_id: i64,
    pub phase: TournamentPhase,
    pub group_number: Option<i64>,
    pub round_number: Option<i64>,
    pub match_number: i64,
    pub restaurant1_id: i64,
    pub restaurant2_id: i64,
    pub status: MatchStatus,
    pub voting_starts_at: Option<DateTime<Utc>>,
    pub voting_ends_at: Option<DateTime<Utc>>,
    pub votes1: i64,
    pub votes2: i64,
    pub weighted_votes1: f64,
    pub weighted_votes2: f64,
    pub winner_id: Option<i64>,
    pub completed_at: Option<DateTime<Utc>>,
    pub created_at: DateTime<Utc>,
}

impl Match {
    pub fn involves(&self, restaurant_id: i64) -> bool {
        self.restaurant1_id == restaurant_id || self.restaurant2_id == restaurant_id
    }

    pub fn opponent_of(&self, restaurant_id: i64) -> Option<i64> {
        if self.restaurant1_id == restaurant_id {
            Some(self.restaurant2_id)
        } else if self.restaurant2_id == restaurant_id {
            Some(self.restaurant1_id)
        } else {
            None
        }
    }
}

/// One ledger row per (match, voter); immutable once created
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MatchVote {
    pub id: i64,
    pub match_id: i64,
    pub customer_id: i64,
    pub restaurant_id: i64,
    pub classification: VoterClassification,
    pub weight: f64,
    pub verified: bool,
    pub reservation_id: Option<i64>,
    pub ip_address: String,
    pub device_id: String,
    pub user_agent: String,
    pub created_at: DateTime<Utc>,
}

/// A scoped, periodic leaderboard of restaurants
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Ranking {
    pub id: i64,
    pub name: String,
    pub scope: String,
    pub city: String,
    pub cuisine: Option<String>,
    pub period: RankingPeriod,
    pub period_start: Option<DateTime<Utc>>,
    pub period_end: Option<DateTime<Utc>>,
    pub active: bool,
    pub last_calculated_at: Option<DateTime<Utc>>,
    pub created_at: DateTime<Utc>,
}

/// One restaurant's position inside a ranking
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RankingEntry {
    pub id: i64,
    pub ranking_id: i64,
    pub restaurant_id: i64,
    pub position: i64,
    pub previous_position: Option<i64>,
    pub score: Decimal,
    pub votes_count: i64,
    pub local_votes: i64,
    pub tourist_votes: i64,
    pub verified_votes: i64,
    pub seated_reservations: i64,
    pub avg_rating: f64,
    pub created_at: DateTime<Utc>,
}

/// One ledger row per (ranking, restaurant, voter); backed by a seated visit
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RankingVote {
    pub id: i64,
    pub ranking_id: i64,
    pub restaurant_id: i64,
    pub customer_id: i64,
    pub reservation_id: i64,
    pub classification: VoterClassification,
    pub rating: i64,
    pub food_rating: Option<i64>,
    pub service_rating: Option<i64>,
    pub ambience_rating: Option<i64>,
    pub suspicious: bool,
    pub verified: bool,
    pub weight: f64,
    pub created_at: DateTime<Utc>,
}

/// Outbox record awaiting asynchronous delivery
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct OutboxEvent {
    pub id: i64,
    pub event_type: String,
    pub aggregate_type: String,
    pub aggregate_id: i64,
    pub payload: serde_json::Value,
    pub status: String,
    pub created_at: DateTime<Utc>,
}

/// Append-only audit record of a lifecycle or vote action
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AuditRecord {
    pub id: i64,
    pub actor: String,
    pub action: String,
    pub aggregate_type: String,
    pub aggregate_id: i64,
    pub before_state: Option<String>,
    pub after_state: Option<String>,
    pub created_at: DateTime<Utc>,
}
