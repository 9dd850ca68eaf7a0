use std::str::FromStr;

use chrono::{DateTime, Utc};
use rusqlite::{params, Connection, OptionalExtension};
use rust_decimal::Decimal;

use crate::domain::status::RankingPeriod;
use crate::domain::{Ranking, RankingEntry};
use crate::errors::{map_unique_violation, EngineError, Result};

use super::parse_enum;

const RANKING_COLUMNS: &str = "id, name, scope, city, cuisine, period, period_start, period_end, active, last_calculated_at, created_at";
const ENTRY_COLUMNS: &str = "id, ranking_id, restaurant_id, position, previous_position, score, votes_count, local_votes, tourist_votes, verified_votes, seated_reservations, avg_rating, created_at";

#[allow(clippy::too_many_arguments)]
pub fn insert_ranking(
    conn: &Connection,
    name: &str,
    scope: &str,
    city: &str,
    cuisine: Option<&str>,
    period: RankingPeriod,
    period_start: Option<DateTime<Utc>>,
    period_end: Option<DateTime<Utc>>,
    now: DateTime<Utc>,
) -> Result<Ranking> {
    let sql = format!(
        "INSERT INTO rankings (name, scope, city, cuisine, period, period_start, period_end, active, created_at) VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, 1, ?8) RETURNING {}",
        RANKING_COLUMNS
    );

    let ranking = conn.query_row(
        &sql,
        params![
            name,
            scope,
            city,
            cuisine,
            period.as_str(),
            period_start,
            period_end,
            now
        ],
        parse_ranking_row,
    )?;
    Ok(ranking)
}

pub fn get_ranking(conn: &Connection, id: i64) -> Result<Ranking> {
    let sql = format!("SELECT {} FROM rankings WHERE id = ?1", RANKING_COLUMNS);

    conn.query_row(&sql, params![id], parse_ranking_row)
        .optional()?
        .ok_or_else(|| EngineError::not_found("ranking", id))
}

pub fn stamp_calculated(conn: &Connection, id: i64, now: DateTime<Utc>) -> Result<()> {
    conn.execute(
        "UPDATE rankings SET last_calculated_at = ?1 WHERE id = ?2",
        params![now, id],
    )?;
    Ok(())
}

fn parse_ranking_row(row: &rusqlite::Row) -> rusqlite::Result<Ranking> {
    let period_raw: String = row.get(5)?;
    Ok(Ranking {
        id: row.get(0)?,
        name: row.get(1)?,
        scope: row.get(2)?,
        city: row.get(3)?,
        cuisine: row.get(4)?,
        period: parse_enum(5, &period_raw, RankingPeriod::parse)?,
        period_start: row.get(6)?,
        period_end: row.get(7)?,
        active: row.get(8)?,
        last_calculated_at: row.get(9)?,
        created_at: row.get(10)?,
    })
}

pub fn insert_entry(
    conn: &Connection,
    ranking_id: i64,
    restaurant_id: i64,
    position: i64,
    now: DateTime<Utc>,
) -> Result<RankingEntry> {
    let sql = format!(
        "INSERT INTO ranking_entries (ranking_id, restaurant_id, position, created_at) VALUES (?1, ?2, ?3, ?4) RETURNING {}",
        ENTRY_COLUMNS
    );

    conn.query_row(&sql, params![ranking_id, restaurant_id, position, now], parse_entry_row)
        .map_err(|e| map_unique_violation(e, "restaurant already has an entry in this ranking"))
}

pub fn get_entry(
    conn: &Connection,
    ranking_id: i64,
    restaurant_id: i64,
) -> Result<Option<RankingEntry>> {
    let sql = format!(
        "SELECT {} FROM ranking_entries WHERE ranking_id = ?1 AND restaurant_id = ?2",
        ENTRY_COLUMNS
    );

    let entry = conn
        .query_row(&sql, params![ranking_id, restaurant_id], parse_entry_row)
        .optional()?;
    Ok(entry)
}

pub fn list_entries(conn: &Connection, ranking_id: i64) -> Result<Vec<RankingEntry>> {
    let sql = format!(
        "SELECT {} FROM ranking_entries WHERE ranking_id = ?1 ORDER BY position",
        ENTRY_COLUMNS
    );

    let mut stmt = conn.prepare(&sql)?;
    let rows = stmt
        .query_map(params![ranking_id], parse_entry_row)?
        .collect::<rusqlite::Result<Vec<_>>>()?;
    Ok(rows)
}

pub fn max_position(conn: &Connection, ranking_id: i64) -> Result<i64> {
    let max = conn.query_row(
        "SELECT COALESCE(MAX(position), 0) FROM ranking_entries WHERE ranking_id = ?1",
        params![ranking_id],
        |row| row.get(0),
    )?;
    Ok(max)
}

/// Rewrite an entry after recalculation: new position, prior position
/// preserved for trend display, and the recomputed score
pub fn update_entry_position(
    conn: &Connection,
    entry_id: i64,
    position: i64,
    previous_position: Option<i64>,
    score: Decimal,
) -> Result<()> {
    conn.execute(
        "UPDATE ranking_entries SET position = ?1, previous_position = ?2, score = ?3 WHERE id = ?4",
        params![position, previous_position, score.to_string(), entry_id],
    )?;
    Ok(())
}

#[allow(clippy::too_many_arguments)]
pub fn update_entry_stats(
    conn: &Connection,
    entry_id: i64,
    votes_count: i64,
    local_votes: i64,
    tourist_votes: i64,
    verified_votes: i64,
    seated_reservations: i64,
    avg_rating: f64,
) -> Result<()> {
    conn.execute(
        "UPDATE ranking_entries SET votes_count = ?1, local_votes = ?2, tourist_votes = ?3, verified_votes = ?4, seated_reservations = ?5, avg_rating = ?6 WHERE id = ?7",
        params![
            votes_count,
            local_votes,
            tourist_votes,
            verified_votes,
            seated_reservations,
            avg_rating,
            entry_id
        ],
    )?;
    Ok(())
}

/// Delete an entry and close the position gap it leaves behind
pub fn remove_entry(conn: &Connection, ranking_id: i64, restaurant_id: i64) -> Result<()> {
    let removed: Option<i64> = conn
        .query_row(
            "DELETE FROM ranking_entries WHERE ranking_id = ?1 AND restaurant_id = ?2 RETURNING position",
            params![ranking_id, restaurant_id],
            |row| row.get(0),
        )
        .optional()?;

    if let Some(position) = removed {
        conn.execute(
            "UPDATE ranking_entries SET position = position - 1 WHERE ranking_id = ?1 AND position > ?2",
            params![ranking_id, position],
        )?;
    }
    Ok(())
}

fn parse_entry_row(row: &rusqlite::Row) -> rusqlite::Result<RankingEntry> {
    let score_raw: String = row.get(5)?;
    let score = Decimal::from_str(&score_raw).map_err(|e| {
        rusqlite::Error::FromSqlConversionFailure(5, rusqlite::types::Type::Text, Box::new(e))
    })?;

    Ok(RankingEntry {
        id: row.get(0)?,
        ranking_id: row.get(1)?,
        restaurant_id: row.get(2)?,
        position: row.get(3)?,
        previous_position: row.get(4)?,
        score,
        votes_count: row.get(6)?,
        local_votes: row.get(7)?,
        tourist_votes: row.get(8)?,
        verified_votes: row.get(9)?,
        seated_reservations: row.get(10)?,
        avg_rating: row.get(11)?,
        created_at: row.get(12)?,
    })
}
