use chrono::{DateTime, Utc};
use rusqlite::{params, Connection, OptionalExtension};

use crate::domain::status::ChallengeStatus;
use crate::domain::Challenge;
use crate::errors::{EngineError, Result};

use super::parse_enum;

const CHALLENGE_COLUMNS: &str = "id, name, slug, status, registration_starts_at, registration_ends_at, voting_starts_at, voting_ends_at, min_participants, max_participants, participants_count, votes_count, views_count, created_at, updated_at";

#[allow(clippy::too_many_arguments)]
pub fn insert_challenge(
    conn: &Connection,
    name: &str,
    slug: &str,
    registration_starts_at: Option<DateTime<Utc>>,
    registration_ends_at: Option<DateTime<Utc>>,
    voting_starts_at: Option<DateTime<Utc>>,
    voting_ends_at: Option<DateTime<Utc>>,
    min_participants: i64,
    max_participants: i64,
    now: DateTime<Utc>,
) -> Result<Challenge> {
    let sql = format!(
        "INSERT INTO challenges (name, slug, status, registration_starts_at, registration_ends_at, voting_starts_at, voting_ends_at, min_participants, max_participants, created_at, updated_at) VALUES (?1, ?2, 'DRAFT', ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?9) RETURNING {}",
        CHALLENGE_COLUMNS
    );

    let challenge = conn.query_row(
        &sql,
        params![
            name,
            slug,
            registration_starts_at,
            registration_ends_at,
            voting_starts_at,
            voting_ends_at,
            min_participants,
            max_participants,
            now
        ],
        parse_challenge_row,
    )?;
    Ok(challenge)
}

pub fn get_challenge(conn: &Connection, id: i64) -> Result<Challenge> {
    let sql = format!("SELECT {} FROM challenges WHERE id = ?1", CHALLENGE_COLUMNS);

    conn.query_row(&sql, params![id], parse_challenge_row)
        .optional()?
        .ok_or_else(|| EngineError::not_found("challenge", id))
}

#[allow(clippy::too_many_arguments)]
pub fn update_details(
    conn: &Connection,
    id: i64,
    name: &str,
    slug: &str,
    registration_starts_at: Option<DateTime<Utc>>,
    registration_ends_at: Option<DateTime<Utc>>,
    voting_starts_at: Option<DateTime<Utc>>,
    voting_ends_at: Option<DateTime<Utc>>,
    min_participants: i64,
    max_participants: i64,
    now: DateTime<Utc>,
) -> Result<()> {
    conn.execute(
        "UPDATE challenges SET name = ?1, slug = ?2, registration_starts_at = ?3, registration_ends_at = ?4, voting_starts_at = ?5, voting_ends_at = ?6, min_participants = ?7, max_participants = ?8, updated_at = ?9 WHERE id = ?10",
        params![
            name,
            slug,
            registration_starts_at,
            registration_ends_at,
            voting_starts_at,
            voting_ends_at,
            min_participants,
            max_participants,
            now,
            id
        ],
    )?;
    Ok(())
}

pub fn update_status(
    conn: &Connection,
    id: i64,
    status: ChallengeStatus,
    now: DateTime<Utc>,
) -> Result<()> {
    conn.execute(
        "UPDATE challenges SET status = ?1, updated_at = ?2 WHERE id = ?3",
        params![status.as_str(), now, id],
    )?;
    Ok(())
}

pub fn set_participants_count(
    conn: &Connection,
    id: i64,
    count: i64,
    now: DateTime<Utc>,
) -> Result<()> {
    conn.execute(
        "UPDATE challenges SET participants_count = ?1, updated_at = ?2 WHERE id = ?3",
        params![count, now, id],
    )?;
    Ok(())
}

pub fn set_votes_count(conn: &Connection, id: i64, count: i64, now: DateTime<Utc>) -> Result<()> {
    conn.execute(
        "UPDATE challenges SET votes_count = ?1, updated_at = ?2 WHERE id = ?3",
        params![count, now, id],
    )?;
    Ok(())
}

pub fn increment_views(conn: &Connection, id: i64, now: DateTime<Utc>) -> Result<()> {
    conn.execute(
        "UPDATE challenges SET views_count = views_count + 1, updated_at = ?1 WHERE id = ?2",
        params![now, id],
    )?;
    Ok(())
}

fn parse_challenge_row(row: &rusqlite::Row) -> rusqlite::Result<Challenge> {
    let status_raw: String = row.get(3)?;
    Ok(Challenge {
        id: row.get(0)?,
        name: row.get(1)?,
        slug: row.get(2)?,
        status: parse_enum(3, &status_raw, ChallengeStatus::parse)?,
        registration_starts_at: row.get(4)?,
        registration_ends_at: row.get(5)?,
        voting_starts_at: row.get(6)?,
        voting_ends_at: row.get(7)?,
        min_participants: row.get(8)?,
        max_participants: row.get(9)?,
        participants_count: row.get(10)?,
        votes_count: row.get(11)?,
        views_count: row.get(12)?,
        created_at: row.get(13)?,
        updated_at: row.get(14)?,
    })
}
