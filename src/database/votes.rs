use chrono::{DateTime, Duration, Utc};
use rusqlite::{params, Connection};

use crate::domain::status::VoterClassification;
use crate::domain::MatchVote;
use crate::errors::{map_unique_violation, Result};

use super::parse_enum;

const VOTE_COLUMNS: &str = "id, match_id, customer_id, restaurant_id, classification, weight, verified, reservation_id, ip_address, device_id, user_agent, created_at";

/// Audit metadata captured with every vote
#[derive(Debug, Clone)]
pub struct VoteAudit {
    pub ip_address: String,
    pub device_id: String,
    pub user_agent: String,
}

#[allow(clippy::too_many_arguments)]
pub fn insert_vote(
    conn: &Connection,
    match_id: i64,
    customer_id: i64,
    restaurant_id: i64,
    classification: VoterClassification,
    weight: f64,
    verified: bool,
    reservation_id: Option<i64>,
    audit: &VoteAudit,
    now: DateTime<Utc>,
) -> Result<MatchVote> {
    let sql = format!(
        "INSERT INTO match_votes (match_id, customer_id, restaurant_id, classification, weight, verified, reservation_id, ip_address, device_id, user_agent, created_at) VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10, ?11) RETURNING {}",
        VOTE_COLUMNS
    );

    conn.query_row(
        &sql,
        params![
            match_id,
            customer_id,
            restaurant_id,
            classification.as_str(),
            weight,
            verified,
            reservation_id,
            audit.ip_address,
            audit.device_id,
            audit.user_agent,
            now
        ],
        parse_vote_row,
    )
    .map_err(|e| map_unique_violation(e, "customer already voted in this match"))
}

pub fn list_by_match(conn: &Connection, match_id: i64) -> Result<Vec<MatchVote>> {
    let sql = format!(
        "SELECT {} FROM match_votes WHERE match_id = ?1 ORDER BY id",
        VOTE_COLUMNS
    );

    let mut stmt = conn.prepare(&sql)?;
    let rows = stmt
        .query_map(params![match_id], parse_vote_row)?
        .collect::<rusqlite::Result<Vec<_>>>()?;
    Ok(rows)
}

/// Raw count and weighted sum for one side of a match, straight from the
/// ledger rows
pub fn totals_for_restaurant(
    conn: &Connection,
    match_id: i64,
    restaurant_id: i64,
) -> Result<(i64, f64)> {
    let totals = conn.query_row(
        "SELECT COUNT(*), COALESCE(SUM(weight), 0) FROM match_votes WHERE match_id = ?1 AND restaurant_id = ?2",
        params![match_id, restaurant_id],
        |row| Ok((row.get(0)?, row.get(1)?)),
    )?;
    Ok(totals)
}

pub fn count_by_ip(conn: &Connection, match_id: i64, ip_address: &str) -> Result<i64> {
    let count = conn.query_row(
        "SELECT COUNT(*) FROM match_votes WHERE match_id = ?1 AND ip_address = ?2",
        params![match_id, ip_address],
        |row| row.get(0),
    )?;
    Ok(count)
}

pub fn count_by_device(conn: &Connection, match_id: i64, device_id: &str) -> Result<i64> {
    let count = conn.query_row(
        "SELECT COUNT(*) FROM match_votes WHERE match_id = ?1 AND device_id = ?2",
        params![match_id, device_id],
        |row| row.get(0),
    )?;
    Ok(count)
}

/// Votes from one customer across all matches in the trailing hour
pub fn count_recent_by_customer(
    conn: &Connection,
    customer_id: i64,
    now: DateTime<Utc>,
) -> Result<i64> {
    let cutoff = now - Duration::hours(1);
    let count = conn.query_row(
        "SELECT COUNT(*) FROM match_votes WHERE customer_id = ?1 AND created_at >= ?2",
        params![customer_id, cutoff],
        |row| row.get(0),
    )?;
    Ok(count)
}

fn parse_vote_row(row: &rusqlite::Row) -> rusqlite::Result<MatchVote> {
    let classification_raw: String = row.get(4)?;
    Ok(MatchVote {
        id: row.get(0)?,
        match_id: row.get(1)?,
        customer_id: row.get(2)?,
        restaurant_id: row.get(3)?,
        classification: parse_enum(4, &classification_raw, VoterClassification::parse)?,
        weight: row.get(5)?,
        verified: row.get(6)?,
        reservation_id: row.get(7)?,
        ip_address: row.get(8)?,
        device_id: row.get(9)?,
        user_agent: row.get(10)?,
        created_at: row.get(11)?,
    })
}
