use chrono::{DateTime, Duration, Utc};
use rusqlite::{params, Connection};

use crate::domain::status::VoterClassification;
use crate::domain::RankingVote;
use crate::errors::{map_unique_violation, Result};

use super::parse_enum;

const RANKING_VOTE_COLUMNS: &str = "id, ranking_id, restaurant_id, customer_id, reservation_id, classification, rating, food_rating, service_rating, ambience_rating, suspicious, verified, weight, created_at";

/// Optional per-aspect sub-ratings accompanying a ranking vote
#[derive(Debug, Clone, Copy, Default)]
pub struct SubRatings {
    pub food: Option<i64>,
    pub service: Option<i64>,
    pub ambience: Option<i64>,
}

#[allow(clippy::too_many_arguments)]
pub fn insert_ranking_vote(
    conn: &Connection,
    ranking_id: i64,
    restaurant_id: i64,
    customer_id: i64,
    reservation_id: i64,
    classification: VoterClassification,
    rating: i64,
    sub_ratings: SubRatings,
    suspicious: bool,
    verified: bool,
    weight: f64,
    now: DateTime<Utc>,
) -> Result<RankingVote> {
    let sql = format!(
        "INSERT INTO ranking_votes (ranking_id, restaurant_id, customer_id, reservation_id, classification, rating, food_rating, service_rating, ambience_rating, suspicious, verified, weight, created_at) VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10, ?11, ?12, ?13) RETURNING {}",
        RANKING_VOTE_COLUMNS
    );

    conn.query_row(
        &sql,
        params![
            ranking_id,
            restaurant_id,
            customer_id,
            reservation_id,
            classification.as_str(),
            rating,
            sub_ratings.food,
            sub_ratings.service,
            sub_ratings.ambience,
            suspicious,
            verified,
            weight,
            now
        ],
        parse_ranking_vote_row,
    )
    .map_err(|e| map_unique_violation(e, "customer already voted for this restaurant in this ranking"))
}

pub fn list_for_entry(
    conn: &Connection,
    ranking_id: i64,
    restaurant_id: i64,
) -> Result<Vec<RankingVote>> {
    let sql = format!(
        "SELECT {} FROM ranking_votes WHERE ranking_id = ?1 AND restaurant_id = ?2 ORDER BY id",
        RANKING_VOTE_COLUMNS
    );

    let mut stmt = conn.prepare(&sql)?;
    let rows = stmt
        .query_map(params![ranking_id, restaurant_id], parse_ranking_vote_row)?
        .collect::<rusqlite::Result<Vec<_>>>()?;
    Ok(rows)
}

/// Ranking votes from one customer across all rankings in the trailing hour
pub fn count_recent_by_customer(
    conn: &Connection,
    customer_id: i64,
    now: DateTime<Utc>,
) -> Result<i64> {
    let cutoff = now - Duration::hours(1);
    let count = conn.query_row(
        "SELECT COUNT(*) FROM ranking_votes WHERE customer_id = ?1 AND created_at >= ?2",
        params![customer_id, cutoff],
        |row| row.get(0),
    )?;
    Ok(count)
}

/// Average rating and vote count for one entry, straight from ledger rows
pub fn aggregate_for_entry(
    conn: &Connection,
    ranking_id: i64,
    restaurant_id: i64,
) -> Result<(i64, f64)> {
    let aggregate = conn.query_row(
        "SELECT COUNT(*), COALESCE(AVG(rating), 0) FROM ranking_votes WHERE ranking_id = ?1 AND restaurant_id = ?2",
        params![ranking_id, restaurant_id],
        |row| Ok((row.get(0)?, row.get(1)?)),
    )?;
    Ok(aggregate)
}

fn parse_ranking_vote_row(row: &rusqlite::Row) -> rusqlite::Result<RankingVote> {
    let classification_raw: String = row.get(5)?;
    Ok(RankingVote {
        id: row.get(0)?,
        ranking_id: row.get(1)?,
        restaurant_id: row.get(2)?,
        customer_id: row.get(3)?,
        reservation_id: row.get(4)?,
        classification: parse_enum(5, &classification_raw, VoterClassification::parse)?,
        rating: row.get(6)?,
        food_rating: row.get(7)?,
        service_rating: row.get(8)?,
        ambience_rating: row.get(9)?,
        suspicious: row.get(10)?,
        verified: row.get(11)?,
        weight: row.get(12)?,
        created_at: row.get(13)?,
    })
}
