use chrono::{DateTime, Utc};
use rusqlite::{params, Connection, OptionalExtension};

use crate::domain::status::{MatchStatus, TournamentPhase};
use crate::domain::Match;
use crate::errors::{EngineError, Result};

use super::parse_enum;

const MATCH_COLUMNS: &str = "id, tournament_id, phase, group_number, round_number, match_number, restaurant1_id, restaurant2_id, status, voting_starts_at, voting_ends_at, votes1, votes2, weighted_votes1, weighted_votes2, winner_id, completed_at, created_at";

#[allow(clippy::too_many_arguments)]
pub fn insert_match(
    conn: &Connection,
    tournament_id: i64,
    phase: TournamentPhase,
    group_number: Option<i64>,
    round_number: Option<i64>,
    match_number: i64,
    restaurant1_id: i64,
    restaurant2_id: i64,
    now: DateTime<Utc>,
) -> Result<Match> {
    let sql = format!(
        "INSERT INTO matches (tournament_id, phase, group_number, round_number, match_number, restaurant1_id, restaurant2_id, status, created_at) VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, 'SCHEDULED', ?8) RETURNING {}",
        MATCH_COLUMNS
    );

    let m = conn.query_row(
        &sql,
        params![
            tournament_id,
            phase.as_str(),
            group_number,
            round_number,
            match_number,
            restaurant1_id,
            restaurant2_id,
            now
        ],
        parse_match_row,
    )?;
    Ok(m)
}

pub fn get_match(conn: &Connection, id: i64) -> Result<Match> {
    let sql = format!("SELECT {} FROM matches WHERE id = ?1", MATCH_COLUMNS);

    conn.query_row(&sql, params![id], parse_match_row)
        .optional()?
        .ok_or_else(|| EngineError::not_found("match", id))
}

pub fn list_by_tournament(conn: &Connection, tournament_id: i64) -> Result<Vec<Match>> {
    let sql = format!(
        "SELECT {} FROM matches WHERE tournament_id = ?1 ORDER BY id",
        MATCH_COLUMNS
    );

    let mut stmt = conn.prepare(&sql)?;
    let rows = stmt
        .query_map(params![tournament_id], parse_match_row)?
        .collect::<rusqlite::Result<Vec<_>>>()?;
    Ok(rows)
}

pub fn list_by_phase(
    conn: &Connection,
    tournament_id: i64,
    phase: TournamentPhase,
) -> Result<Vec<Match>> {
    let sql = format!(
        "SELECT {} FROM matches WHERE tournament_id = ?1 AND phase = ?2 ORDER BY id",
        MATCH_COLUMNS
    );

    let mut stmt = conn.prepare(&sql)?;
    let rows = stmt
        .query_map(params![tournament_id, phase.as_str()], parse_match_row)?
        .collect::<rusqlite::Result<Vec<_>>>()?;
    Ok(rows)
}

pub fn list_by_group(
    conn: &Connection,
    tournament_id: i64,
    group_number: i64,
) -> Result<Vec<Match>> {
    let sql = format!(
        "SELECT {} FROM matches WHERE tournament_id = ?1 AND group_number = ?2 ORDER BY match_number",
        MATCH_COLUMNS
    );

    let mut stmt = conn.prepare(&sql)?;
    let rows = stmt
        .query_map(params![tournament_id, group_number], parse_match_row)?
        .collect::<rusqlite::Result<Vec<_>>>()?;
    Ok(rows)
}

/// Number of matches in the tournament still SCHEDULED or VOTING
pub fn count_pending(conn: &Connection, tournament_id: i64) -> Result<i64> {
    let count = conn.query_row(
        "SELECT COUNT(*) FROM matches WHERE tournament_id = ?1 AND status IN ('SCHEDULED', 'VOTING')",
        params![tournament_id],
        |row| row.get(0),
    )?;
    Ok(count)
}

pub fn open_voting(
    conn: &Connection,
    id: i64,
    starts_at: DateTime<Utc>,
    ends_at: DateTime<Utc>,
) -> Result<()> {
    conn.execute(
        "UPDATE matches SET status = 'VOTING', voting_starts_at = ?1, voting_ends_at = ?2 WHERE id = ?3",
        params![starts_at, ends_at, id],
    )?;
    Ok(())
}

/// Overwrite both sides' cached totals with freshly recomputed values
pub fn set_vote_totals(
    conn: &Connection,
    id: i64,
    votes1: i64,
    votes2: i64,
    weighted_votes1: f64,
    weighted_votes2: f64,
) -> Result<()> {
    conn.execute(
        "UPDATE matches SET votes1 = ?1, votes2 = ?2, weighted_votes1 = ?3, weighted_votes2 = ?4 WHERE id = ?5",
        params![votes1, votes2, weighted_votes1, weighted_votes2, id],
    )?;
    Ok(())
}

pub fn complete_match(
    conn: &Connection,
    id: i64,
    winner_id: Option<i64>,
    now: DateTime<Utc>,
) -> Result<()> {
    conn.execute(
        "UPDATE matches SET status = 'COMPLETED', winner_id = ?1, completed_at = ?2 WHERE id = ?3",
        params![winner_id, now, id],
    )?;
    Ok(())
}

fn parse_match_row(row: &rusqlite::Row) -> rusqlite::Result<Match> {
    let phase_raw: String = row.get(2)?;
    let status_raw: String = row.get(8)?;
    Ok(Match {
        id: row.get(0)?,
        tournament_id: row.get(1)?,
        phase: parse_enum(2, &phase_raw, TournamentPhase::parse)?,
        group_number: row.get(3)?,
        round_number: row.get(4)?,
        match_number: row.get(5)?,
        restaurant1_id: row.get(6)?,
        restaurant2_id: row.get(7)?,
        status: parse_enum(8, &status_raw, MatchStatus::parse)?,
        voting_starts_at: row.get(9)?,
        voting_ends_at: row.get(10)?,
        votes1: row.get(11)?,
        votes2: row.get(12)?,
        weighted_votes1: row.get(13)?,
        weighted_votes2: row.get(14)?,
        winner_id: row.get(15)?,
        completed_at: row.get(16)?,
        created_at: row.get(17)?,
    })
}
