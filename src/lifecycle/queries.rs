use rusqlite::Connection;

use crate::database::{challenges, directory, matches, participations, tournaments};
use crate::domain::status::{MatchStatus, ParticipationStatus};
use crate::domain::{Match, Participation};
use crate::engine::order_by_points;
use crate::errors::Result;

/// Current standings of one group, best first
pub fn group_standings(
    conn: &Connection,
    tournament_id: i64,
    group_number: i64,
) -> Result<Vec<Participation>> {
    let members = participations::list_by_group(conn, tournament_id, group_number)?;
    Ok(order_by_points(members))
}

/// A match joined with its restaurants' display names
#[derive(Debug, Clone)]
pub struct MatchCard {
    pub match_info: Match,
    pub restaurant1_name: String,
    pub restaurant2_name: String,
}

pub fn match_card(conn: &Connection, match_id: i64) -> Result<MatchCard> {
    let m = matches::get_match(conn, match_id)?;
    let restaurant1 = directory::get_restaurant(conn, m.restaurant1_id)?;
    let restaurant2 = directory::get_restaurant(conn, m.restaurant2_id)?;

    Ok(MatchCard {
        match_info: m,
        restaurant1_name: restaurant1.name,
        restaurant2_name: restaurant2.name,
    })
}

/// Aggregate counters over one tournament
#[derive(Debug, Clone, Default)]
pub struct TournamentStatistics {
    pub participants: usize,
    pub active_participants: usize,
    pub matches_total: usize,
    pub matches_completed: usize,
    pub matches_pending: usize,
    pub total_votes: i64,
}

pub fn tournament_statistics(conn: &Connection, tournament_id: i64) -> Result<TournamentStatistics> {
    tournaments::get_tournament(conn, tournament_id)?;

    let all_participations = participations::list_by_tournament(conn, tournament_id)?;
    let all_matches = matches::list_by_tournament(conn, tournament_id)?;

    let completed = all_matches
        .iter()
        .filter(|m| m.status == MatchStatus::Completed)
        .count();

    Ok(TournamentStatistics {
        participants: all_participations.len(),
        active_participants: all_participations
            .iter()
            .filter(|p| {
                !matches!(
                    p.status,
                    ParticipationStatus::Eliminated
                        | ParticipationStatus::Disqualified
                        | ParticipationStatus::Withdrawn
                )
            })
            .count(),
        matches_total: all_matches.len(),
        matches_completed: completed,
        matches_pending: all_matches.len() - completed,
        total_votes: all_matches.iter().map(|m| m.votes1 + m.votes2).sum(),
    })
}

/// Aggregate counters over one challenge
#[derive(Debug, Clone, Default)]
pub struct ChallengeStatistics {
    pub participants_count: i64,
    pub votes_count: i64,
    pub views_count: i64,
    pub withdrawn: usize,
}

pub fn challenge_statistics(conn: &Connection, challenge_id: i64) -> Result<ChallengeStatistics> {
    let challenge = challenges::get_challenge(conn, challenge_id)?;
    let all = participations::list_by_challenge(conn, challenge_id)?;

    Ok(ChallengeStatistics {
        participants_count: challenge.participants_count,
        votes_count: challenge.votes_count,
        views_count: challenge.views_count,
        withdrawn: all
            .iter()
            .filter(|p| p.status == ParticipationStatus::Withdrawn)
            .count(),
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Utc;
    use rand::rngs::StdRng;
    use rand::SeedableRng;

    use crate::database::connection::DbConn;
    use crate::database::{memory_pool, setup};
    use crate::domain::status::TournamentPhase;
    use crate::lifecycle::challenge::{self, NewChallenge};
    use crate::lifecycle::tournament::{self, NewTournament};
    use crate::lifecycle::voting;

    fn test_conn() -> DbConn {
        let pool = memory_pool().unwrap();
        let conn = pool.get().unwrap();
        setup::initialize_schema(&conn).unwrap();
        conn
    }

    #[test]
    fn test_tournament_statistics_count_matches_and_votes() {
        let mut conn = test_conn();
        let now = Utc::now();
        let t = tournament::create_tournament(
            &mut conn,
            &NewTournament {
                name: "Cup".into(),
                city: "Faro".into(),
                cuisine: None,
                max_participants: 8,
                group_count: 1,
                group_size: 4,
                qualifiers_per_group: 2,
                match_voting_hours: 24,
            },
            "tester",
            now,
        )
        .unwrap();
        tournament::open_registration(&mut conn, t.id, "tester", now).unwrap();
        for i in 0..4 {
            let r = directory::insert_restaurant(&conn, &format!("R{}", i), "Faro", "fish")
                .unwrap();
            tournament::register_restaurant(&mut conn, t.id, r.id, "tester", now).unwrap();
        }
        tournament::start_tournament(&mut conn, t.id, &mut StdRng::seed_from_u64(1), "tester", now)
            .unwrap();

        let stats = tournament_statistics(&conn, t.id).unwrap();
        assert_eq!(stats.participants, 4);
        assert_eq!(stats.matches_total, 6);
        assert_eq!(stats.matches_pending, 6);
        assert_eq!(stats.total_votes, 0);

        let m = matches::list_by_phase(&conn, t.id, TournamentPhase::GroupStage).unwrap()[0].id;
        let card = match_card(&conn, m).unwrap();
        assert!(card.restaurant1_name.starts_with('R'));
    }

    #[test]
    fn test_challenge_statistics_reflect_votes_and_withdrawals() {
        let mut conn = test_conn();
        let now = Utc::now();
        let c = challenge::create_challenge(
            &mut conn,
            &NewChallenge {
                name: "Best Bifana".into(),
                slug: "best-bifana".into(),
                registration_starts_at: None,
                registration_ends_at: None,
                voting_starts_at: None,
                voting_ends_at: None,
                min_participants: 2,
                max_participants: 8,
            },
            "tester",
            now,
        )
        .unwrap();
        challenge::publish(&mut conn, c.id, "tester", now).unwrap();
        challenge::open_registration(&mut conn, c.id, "tester", now).unwrap();

        let ids: Vec<i64> = (0..3)
            .map(|i| {
                let r = directory::insert_restaurant(&conn, &format!("B{}", i), "Porto", "bifana")
                    .unwrap();
                challenge::register_restaurant(&mut conn, c.id, r.id, "tester", now).unwrap();
                r.id
            })
            .collect();
        challenge::withdraw_restaurant(&mut conn, c.id, ids[2], "closed early", "tester", now)
            .unwrap();

        challenge::start(&mut conn, c.id, "tester", now).unwrap();
        challenge::open_voting(&mut conn, c.id, "tester", now).unwrap();
        voting::record_challenge_vote(&mut conn, c.id, now).unwrap();
        voting::record_challenge_vote(&mut conn, c.id, now).unwrap();
        challenge::record_view(&mut conn, c.id, now).unwrap();

        let stats = challenge_statistics(&conn, c.id).unwrap();
        assert_eq!(stats.participants_count, 2);
        assert_eq!(stats.votes_count, 2);
        assert_eq!(stats.views_count, 1);
        assert_eq!(stats.withdrawn, 1);
    }
}
