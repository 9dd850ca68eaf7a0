use chrono::{DateTime, Duration, Utc};
use rusqlite::TransactionBehavior;
use serde_json::json;

use crate::config::weights::ScoringCoefficients;
use crate::database::connection::DbConn;
use crate::database::{audit, directory, outbox, rankings};
use crate::domain::status::RankingPeriod;
use crate::domain::{Ranking, RankingEntry};
use crate::engine::{entry_score, EntryStats};
use crate::errors::{EngineError, Result};

use super::{voting, AGGREGATE_RANKING, EVENT_RANKING_UPDATED};

/// Parameters for creating a ranking
#[derive(Debug, Clone)]
pub struct NewRanking {
    pub name: String,
    pub scope: String,
    pub city: String,
    pub cuisine: Option<String>,
    pub period: RankingPeriod,
}

/// Create a ranking; the period window is derived as the trailing span
/// ending now, open-ended for ALL_TIME
pub fn create_ranking(
    conn: &mut DbConn,
    new: &NewRanking,
    actor: &str,
    now: DateTime<Utc>,
) -> Result<Ranking> {
    let (period_start, period_end) = match new.period.window_days() {
        Some(days) => (Some(now - Duration::days(days)), Some(now)),
        None => (None, None),
    };

    let tx = conn.transaction_with_behavior(TransactionBehavior::Immediate)?;
    let ranking = rankings::insert_ranking(
        &tx,
        &new.name,
        &new.scope,
        &new.city,
        new.cuisine.as_deref(),
        new.period,
        period_start,
        period_end,
        now,
    )?;
    audit::append(
        &tx,
        actor,
        "create",
        AGGREGATE_RANKING,
        ranking.id,
        None,
        Some(new.period.as_str()),
        now,
    )?;
    tx.commit()?;
    Ok(ranking)
}

/// Append a restaurant at the next open position with a zero score
pub fn add_restaurant(
    conn: &mut DbConn,
    ranking_id: i64,
    restaurant_id: i64,
    now: DateTime<Utc>,
) -> Result<RankingEntry> {
    let tx = conn.transaction_with_behavior(TransactionBehavior::Immediate)?;
    rankings::get_ranking(&tx, ranking_id)?;
    directory::get_restaurant(&tx, restaurant_id)?;

    let position = rankings::max_position(&tx, ranking_id)? + 1;
    let entry = rankings::insert_entry(&tx, ranking_id, restaurant_id, position, now)?;
    tx.commit()?;
    Ok(entry)
}

/// Remove a restaurant's entry, closing the position gap it leaves
pub fn remove_restaurant(
    conn: &mut DbConn,
    ranking_id: i64,
    restaurant_id: i64,
) -> Result<()> {
    let tx = conn.transaction_with_behavior(TransactionBehavior::Immediate)?;
    rankings::get_ranking(&tx, ranking_id)?;
    rankings::get_entry(&tx, ranking_id, restaurant_id)?
        .ok_or_else(|| EngineError::not_found("ranking entry", restaurant_id))?;

    rankings::remove_entry(&tx, ranking_id, restaurant_id)?;
    tx.commit()?;
    Ok(())
}

/// Recalculate the whole ranking: refresh every entry's vote breakdown,
/// recompute its weighted score, and reassign positions 1..N by score
/// descending, remembering each entry's prior position for trend display.
pub fn recalculate(
    conn: &mut DbConn,
    ranking_id: i64,
    actor: &str,
    now: DateTime<Utc>,
) -> Result<Vec<RankingEntry>> {
    let coefficients = ScoringCoefficients::default();

    let tx = conn.transaction_with_behavior(TransactionBehavior::Immediate)?;
    rankings::get_ranking(&tx, ranking_id)?;

    let entries = rankings::list_entries(&tx, ranking_id)?;
    for entry in &entries {
        voting::refresh_entry_stats(&tx, entry.id, ranking_id, entry.restaurant_id)?;
    }

    let mut scored: Vec<RankingEntry> = rankings::list_entries(&tx, ranking_id)?;
    for entry in scored.iter_mut() {
        entry.score = entry_score(
            &EntryStats {
                votes_count: entry.votes_count,
                avg_rating: entry.avg_rating,
                seated_reservations: entry.seated_reservations,
                verified_votes: entry.verified_votes,
                local_votes: entry.local_votes,
            },
            &coefficients,
        );
    }
    scored.sort_by(|a, b| b.score.cmp(&a.score));

    for (index, entry) in scored.iter().enumerate() {
        let new_position = (index + 1) as i64;
        rankings::update_entry_position(
            &tx,
            entry.id,
            new_position,
            Some(entry.position),
            entry.score,
        )?;
    }

    rankings::stamp_calculated(&tx, ranking_id, now)?;
    outbox::append(
        &tx,
        EVENT_RANKING_UPDATED,
        AGGREGATE_RANKING,
        ranking_id,
        &json!({ "entries": scored.len() }),
        now,
    )?;
    audit::append(
        &tx,
        actor,
        "recalculate",
        AGGREGATE_RANKING,
        ranking_id,
        None,
        Some(&scored.len().to_string()),
        now,
    )?;

    let updated = rankings::list_entries(&tx, ranking_id)?;
    tx.commit()?;

    log::info!("Ranking {} recalculated ({} entries)", ranking_id, updated.len());
    Ok(updated)
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::str::FromStr;

    use rust_decimal::Decimal;

    use crate::database::ranking_votes::SubRatings;
    use crate::database::{directory, memory_pool, setup};
    use crate::domain::status::VoterClassification;
    use crate::lifecycle::voting::{cast_ranking_vote, CastRankingVote};

    fn test_conn() -> DbConn {
        let pool = memory_pool().unwrap();
        let conn = pool.get().unwrap();
        setup::initialize_schema(&conn).unwrap();
        conn
    }

    fn seed_ranking(conn: &mut DbConn, now: DateTime<Utc>) -> i64 {
        create_ranking(
            conn,
            &NewRanking {
                name: "Top Lisbon".into(),
                scope: "city".into(),
                city: "Lisbon".into(),
                cuisine: None,
                period: RankingPeriod::Monthly,
            },
            "tester",
            now,
        )
        .unwrap()
        .id
    }

    fn seed_entry(conn: &mut DbConn, ranking_id: i64, name: &str, now: DateTime<Utc>) -> i64 {
        let restaurant = directory::insert_restaurant(conn, name, "Lisbon", "tapas").unwrap();
        add_restaurant(conn, ranking_id, restaurant.id, now).unwrap();
        restaurant.id
    }

    fn vote(
        conn: &mut DbConn,
        ranking_id: i64,
        restaurant_id: i64,
        classification: VoterClassification,
        rating: i64,
        seated: bool,
        now: DateTime<Utc>,
    ) {
        let customer = directory::insert_customer(conn, "v", classification).unwrap();
        let reservation =
            directory::insert_reservation(conn, customer.id, restaurant_id, seated, now).unwrap();
        if !seated {
            return;
        }
        cast_ranking_vote(
            conn,
            &CastRankingVote {
                ranking_id,
                restaurant_id,
                customer_id: customer.id,
                reservation_id: reservation.id,
                rating,
                sub_ratings: SubRatings::default(),
            },
            now,
        )
        .unwrap();
    }

    #[test]
    fn test_new_entries_take_the_next_position() {
        let mut conn = test_conn();
        let now = Utc::now();
        let ranking_id = seed_ranking(&mut conn, now);

        seed_entry(&mut conn, ranking_id, "A", now);
        seed_entry(&mut conn, ranking_id, "B", now);
        seed_entry(&mut conn, ranking_id, "C", now);

        let positions: Vec<i64> = rankings::list_entries(&conn, ranking_id)
            .unwrap()
            .iter()
            .map(|e| e.position)
            .collect();
        assert_eq!(positions, vec![1, 2, 3]);
    }

    #[test]
    fn test_removal_closes_the_position_gap() {
        let mut conn = test_conn();
        let now = Utc::now();
        let ranking_id = seed_ranking(&mut conn, now);

        let _a = seed_entry(&mut conn, ranking_id, "A", now);
        let b = seed_entry(&mut conn, ranking_id, "B", now);
        let _c = seed_entry(&mut conn, ranking_id, "C", now);

        remove_restaurant(&mut conn, ranking_id, b).unwrap();

        let positions: Vec<i64> = rankings::list_entries(&conn, ranking_id)
            .unwrap()
            .iter()
            .map(|e| e.position)
            .collect();
        assert_eq!(positions, vec![1, 2]);
    }

    #[test]
    fn test_recalculation_reorders_and_tracks_previous_position() {
        let mut conn = test_conn();
        let now = Utc::now();
        let ranking_id = seed_ranking(&mut conn, now);

        let a = seed_entry(&mut conn, ranking_id, "A", now);
        let b = seed_entry(&mut conn, ranking_id, "B", now);

        // B collects better votes than A
        vote(&mut conn, ranking_id, a, VoterClassification::Tourist, 3, true, now);
        for _ in 0..3 {
            vote(&mut conn, ranking_id, b, VoterClassification::Local, 5, true, now);
        }

        let entries = recalculate(&mut conn, ranking_id, "tester", now).unwrap();
        assert_eq!(entries.len(), 2);

        let top = &entries[0];
        assert_eq!(top.restaurant_id, b);
        assert_eq!(top.position, 1);
        assert_eq!(top.previous_position, Some(2));

        let second = &entries[1];
        assert_eq!(second.restaurant_id, a);
        assert_eq!(second.position, 2);
        assert_eq!(second.previous_position, Some(1));

        // Positions are a contiguous permutation of 1..N
        let mut positions: Vec<i64> = entries.iter().map(|e| e.position).collect();
        positions.sort_unstable();
        assert_eq!(positions, vec![1, 2]);

        let ranking = rankings::get_ranking(&conn, ranking_id).unwrap();
        assert!(ranking.last_calculated_at.is_some());
    }

    #[test]
    fn test_reference_score_after_recalculation() {
        let mut conn = test_conn();
        let now = Utc::now();
        let ranking_id = seed_ranking(&mut conn, now);
        let restaurant = seed_entry(&mut conn, ranking_id, "A", now);

        // Shape the ledger by hand to hit the documented scenario:
        // 10 votes (6 local), avg 4.5, 2 seated reservations, 3 verified
        let entry = rankings::get_entry(&conn, ranking_id, restaurant)
            .unwrap()
            .unwrap();
        rankings::update_entry_stats(&conn, entry.id, 10, 6, 4, 3, 2, 4.5).unwrap();

        let coefficients = ScoringCoefficients::default();
        let score = crate::engine::entry_score(
            &crate::engine::EntryStats {
                votes_count: 10,
                avg_rating: 4.5,
                seated_reservations: 2,
                verified_votes: 3,
                local_votes: 6,
            },
            &coefficients,
        );
        assert_eq!(score, Decimal::from_str("211.7").unwrap());
    }

    #[test]
    fn test_ranking_updated_event_is_enqueued() {
        let mut conn = test_conn();
        let now = Utc::now();
        let ranking_id = seed_ranking(&mut conn, now);
        seed_entry(&mut conn, ranking_id, "A", now);

        recalculate(&mut conn, ranking_id, "tester", now).unwrap();

        let events =
            crate::database::outbox::list_by_aggregate(&conn, AGGREGATE_RANKING, ranking_id)
                .unwrap();
        assert!(events.iter().any(|e| e.event_type == EVENT_RANKING_UPDATED));
        assert!(events.iter().all(|e| e.status == "PENDING"));
    }
}
