use chrono::{DateTime, Utc};
use rusqlite::{params, Connection, OptionalExtension};

use crate::domain::status::{TournamentPhase, TournamentStatus};
use crate::domain::Tournament;
use crate::errors::{EngineError, Result};

use super::{parse_enum, parse_enum_opt};

const TOURNAMENT_COLUMNS: &str = "id, name, status, current_phase, city, cuisine, max_participants, group_count, group_size, qualifiers_per_group, match_voting_hours, created_at, updated_at";

#[allow(clippy::too_many_arguments)]
pub fn insert_tournament(
    conn: &Connection,
    name: &str,
    city: &str,
    cuisine: Option<&str>,
    max_participants: i64,
    group_count: i64,
    group_size: i64,
    qualifiers_per_group: i64,
    match_voting_hours: i64,
    now: DateTime<Utc>,
) -> Result<Tournament> {
    let sql = format!(
        "INSERT INTO tournaments (name, status, city, cuisine, max_participants, group_count, group_size, qualifiers_per_group, match_voting_hours, created_at, updated_at) VALUES (?1, 'DRAFT', ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?9) RETURNING {}",
        TOURNAMENT_COLUMNS
    );

    let tournament = conn.query_row(
        &sql,
        params![
            name,
            city,
            cuisine,
            max_participants,
            group_count,
            group_size,
            qualifiers_per_group,
            match_voting_hours,
            now
        ],
        parse_tournament_row,
    )?;
    Ok(tournament)
}

pub fn get_tournament(conn: &Connection, id: i64) -> Result<Tournament> {
    let sql = format!("SELECT {} FROM tournaments WHERE id = ?1", TOURNAMENT_COLUMNS);

    conn.query_row(&sql, params![id], parse_tournament_row)
        .optional()?
        .ok_or_else(|| EngineError::not_found("tournament", id))
}

#[allow(clippy::too_many_arguments)]
pub fn update_details(
    conn: &Connection,
    id: i64,
    name: &str,
    city: &str,
    cuisine: Option<&str>,
    max_participants: i64,
    group_count: i64,
    group_size: i64,
    qualifiers_per_group: i64,
    match_voting_hours: i64,
    now: DateTime<Utc>,
) -> Result<()> {
    conn.execute(
        "UPDATE tournaments SET name = ?1, city = ?2, cuisine = ?3, max_participants = ?4, group_count = ?5, group_size = ?6, qualifiers_per_group = ?7, match_voting_hours = ?8, updated_at = ?9 WHERE id = ?10",
        params![
            name,
            city,
            cuisine,
            max_participants,
            group_count,
            group_size,
            qualifiers_per_group,
            match_voting_hours,
            now,
            id
        ],
    )?;
    Ok(())
}

pub fn update_status_and_phase(
    conn: &Connection,
    id: i64,
    status: TournamentStatus,
    phase: Option<TournamentPhase>,
    now: DateTime<Utc>,
) -> Result<()> {
    conn.execute(
        "UPDATE tournaments SET status = ?1, current_phase = ?2, updated_at = ?3 WHERE id = ?4",
        params![status.as_str(), phase.map(|p| p.as_str()), now, id],
    )?;
    Ok(())
}

fn parse_tournament_row(row: &rusqlite::Row) -> rusqlite::Result<Tournament> {
    let status_raw: String = row.get(2)?;
    let phase_raw: Option<String> = row.get(3)?;
    Ok(Tournament {
        id: row.get(0)?,
        name: row.get(1)?,
        status: parse_enum(2, &status_raw, TournamentStatus::parse)?,
        current_phase: parse_enum_opt(3, phase_raw.as_deref(), TournamentPhase::parse)?,
        city: row.get(4)?,
        cuisine: row.get(5)?,
        max_participants: row.get(6)?,
        group_count: row.get(7)?,
        group_size: row.get(8)?,
        qualifiers_per_group: row.get(9)?,
        match_voting_hours: row.get(10)?,
        created_at: row.get(11)?,
        updated_at: row.get(12)?,
    })
}
