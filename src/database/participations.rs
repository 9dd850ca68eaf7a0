use chrono::{DateTime, Utc};
use rusqlite::{params, Connection, OptionalExtension};

use crate::domain::status::{ParticipationStatus, TournamentPhase};
use crate::domain::Participation;
use crate::engine::standings::{DRAW_POINTS, WIN_POINTS};
use crate::errors::{map_unique_violation, EngineError, Result};

use super::{parse_enum, parse_enum_opt};

const PARTICIPATION_COLUMNS: &str = "id, restaurant_id, challenge_id, tournament_id, status, qualification_score, qualification_rank, group_number, matches_played, matches_won, matches_lost, matches_drawn, group_points, group_position, total_votes, furthest_phase, elimination_reason, eliminated_at, created_at";

/// Outcome of one group match for one side
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum GroupOutcome {
    Win,
    Draw,
    Loss,
}

pub fn insert_for_challenge(
    conn: &Connection,
    restaurant_id: i64,
    challenge_id: i64,
    now: DateTime<Utc>,
) -> Result<Participation> {
    let sql = format!(
        "INSERT INTO participations (restaurant_id, challenge_id, status, created_at) VALUES (?1, ?2, 'REGISTERED', ?3) RETURNING {}",
        PARTICIPATION_COLUMNS
    );

    conn.query_row(&sql, params![restaurant_id, challenge_id, now], parse_participation_row)
        .map_err(|e| map_unique_violation(e, "restaurant already registered in this challenge"))
}

pub fn insert_for_tournament(
    conn: &Connection,
    restaurant_id: i64,
    tournament_id: i64,
    now: DateTime<Utc>,
) -> Result<Participation> {
    let sql = format!(
        "INSERT INTO participations (restaurant_id, tournament_id, status, created_at) VALUES (?1, ?2, 'REGISTERED', ?3) RETURNING {}",
        PARTICIPATION_COLUMNS
    );

    conn.query_row(&sql, params![restaurant_id, tournament_id, now], parse_participation_row)
        .map_err(|e| map_unique_violation(e, "restaurant already registered in this tournament"))
}

pub fn get_participation(conn: &Connection, id: i64) -> Result<Participation> {
    let sql = format!("SELECT {} FROM participations WHERE id = ?1", PARTICIPATION_COLUMNS);

    conn.query_row(&sql, params![id], parse_participation_row)
        .optional()?
        .ok_or_else(|| EngineError::not_found("participation", id))
}

pub fn find_for_challenge(
    conn: &Connection,
    challenge_id: i64,
    restaurant_id: i64,
) -> Result<Option<Participation>> {
    let sql = format!(
        "SELECT {} FROM participations WHERE challenge_id = ?1 AND restaurant_id = ?2",
        PARTICIPATION_COLUMNS
    );

    let row = conn
        .query_row(&sql, params![challenge_id, restaurant_id], parse_participation_row)
        .optional()?;
    Ok(row)
}

pub fn find_for_tournament(
    conn: &Connection,
    tournament_id: i64,
    restaurant_id: i64,
) -> Result<Option<Participation>> {
    let sql = format!(
        "SELECT {} FROM participations WHERE tournament_id = ?1 AND restaurant_id = ?2",
        PARTICIPATION_COLUMNS
    );

    let row = conn
        .query_row(&sql, params![tournament_id, restaurant_id], parse_participation_row)
        .optional()?;
    Ok(row)
}

pub fn list_by_challenge(conn: &Connection, challenge_id: i64) -> Result<Vec<Participation>> {
    let sql = format!(
        "SELECT {} FROM participations WHERE challenge_id = ?1 ORDER BY id",
        PARTICIPATION_COLUMNS
    );

    let mut stmt = conn.prepare(&sql)?;
    let rows = stmt
        .query_map(params![challenge_id], parse_participation_row)?
        .collect::<rusqlite::Result<Vec<_>>>()?;
    Ok(rows)
}

pub fn list_by_tournament(conn: &Connection, tournament_id: i64) -> Result<Vec<Participation>> {
    let sql = format!(
        "SELECT {} FROM participations WHERE tournament_id = ?1 ORDER BY id",
        PARTICIPATION_COLUMNS
    );

    let mut stmt = conn.prepare(&sql)?;
    let rows = stmt
        .query_map(params![tournament_id], parse_participation_row)?
        .collect::<rusqlite::Result<Vec<_>>>()?;
    Ok(rows)
}

pub fn list_by_group(
    conn: &Connection,
    tournament_id: i64,
    group_number: i64,
) -> Result<Vec<Participation>> {
    let sql = format!(
        "SELECT {} FROM participations WHERE tournament_id = ?1 AND group_number = ?2 ORDER BY id",
        PARTICIPATION_COLUMNS
    );

    let mut stmt = conn.prepare(&sql)?;
    let rows = stmt
        .query_map(params![tournament_id, group_number], parse_participation_row)?
        .collect::<rusqlite::Result<Vec<_>>>()?;
    Ok(rows)
}

pub fn count_by_tournament(conn: &Connection, tournament_id: i64) -> Result<i64> {
    let count = conn.query_row(
        "SELECT COUNT(*) FROM participations WHERE tournament_id = ?1 AND status != 'WITHDRAWN'",
        params![tournament_id],
        |row| row.get(0),
    )?;
    Ok(count)
}

pub fn assign_group(conn: &Connection, id: i64, group_number: i64) -> Result<()> {
    conn.execute(
        "UPDATE participations SET group_number = ?1, status = 'ACTIVE' WHERE id = ?2",
        params![group_number, id],
    )?;
    Ok(())
}

pub fn update_status(conn: &Connection, id: i64, status: ParticipationStatus) -> Result<()> {
    conn.execute(
        "UPDATE participations SET status = ?1 WHERE id = ?2",
        params![status.as_str(), id],
    )?;
    Ok(())
}

/// Fold one group match outcome into the participation's tallies.
///
/// `group_points` is rewritten as 3*wins + draws from the post-update
/// counters so it can never drift from the match history.
pub fn apply_group_outcome(conn: &Connection, id: i64, outcome: GroupOutcome) -> Result<()> {
    let (won, drawn, lost) = match outcome {
        GroupOutcome::Win => (1, 0, 0),
        GroupOutcome::Draw => (0, 1, 0),
        GroupOutcome::Loss => (0, 0, 1),
    };

    let sql = format!(
        "UPDATE participations SET \
            matches_played = matches_played + 1, \
            matches_won = matches_won + ?1, \
            matches_drawn = matches_drawn + ?2, \
            matches_lost = matches_lost + ?3, \
            group_points = {} * (matches_won + ?1) + {} * (matches_drawn + ?2) \
         WHERE id = ?4",
        WIN_POINTS, DRAW_POINTS
    );
    conn.execute(&sql, params![won, drawn, lost, id])?;
    Ok(())
}

pub fn add_votes(conn: &Connection, id: i64, votes: i64) -> Result<()> {
    conn.execute(
        "UPDATE participations SET total_votes = total_votes + ?1 WHERE id = ?2",
        params![votes, id],
    )?;
    Ok(())
}

pub fn set_group_position(conn: &Connection, id: i64, position: i64) -> Result<()> {
    conn.execute(
        "UPDATE participations SET group_position = ?1 WHERE id = ?2",
        params![position, id],
    )?;
    Ok(())
}

pub fn mark_qualified(
    conn: &Connection,
    id: i64,
    qualification_rank: i64,
    qualification_score: f64,
) -> Result<()> {
    conn.execute(
        "UPDATE participations SET status = 'QUALIFIED', qualification_rank = ?1, qualification_score = ?2 WHERE id = ?3",
        params![qualification_rank, qualification_score, id],
    )?;
    Ok(())
}

pub fn mark_eliminated(
    conn: &Connection,
    id: i64,
    status: ParticipationStatus,
    reason: &str,
    now: DateTime<Utc>,
) -> Result<()> {
    conn.execute(
        "UPDATE participations SET status = ?1, elimination_reason = ?2, eliminated_at = ?3 WHERE id = ?4",
        params![status.as_str(), reason, now, id],
    )?;
    Ok(())
}

pub fn set_furthest_phase(conn: &Connection, id: i64, phase: TournamentPhase) -> Result<()> {
    conn.execute(
        "UPDATE participations SET furthest_phase = ?1 WHERE id = ?2",
        params![phase.as_str(), id],
    )?;
    Ok(())
}

fn parse_participation_row(row: &rusqlite::Row) -> rusqlite::Result<Participation> {
    let status_raw: String = row.get(4)?;
    let phase_raw: Option<String> = row.get(15)?;
    Ok(Participation {
        id: row.get(0)?,
        restaurant_id: row.get(1)?,
        challenge_id: row.get(2)?,
        tournament_id: row.get(3)?,
        status: parse_enum(4, &status_raw, ParticipationStatus::parse)?,
        qualification_score: row.get(5)?,
        qualification_rank: row.get(6)?,
        group_number: row.get(7)?,
        matches_played: row.get(8)?,
        matches_won: row.get(9)?,
        matches_lost: row.get(10)?,
        matches_drawn: row.get(11)?,
        group_points: row.get(12)?,
        group_position: row.get(13)?,
        total_votes: row.get(14)?,
        furthest_phase: parse_enum_opt(15, phase_raw.as_deref(), TournamentPhase::parse)?,
        elimination_reason: row.get(16)?,
        eliminated_at: row.get(17)?,
        created_at: row.get(18)?,
    })
}
