use chrono::{DateTime, Utc};
use rusqlite::{params, Connection};

use crate::domain::OutboxEvent;
use crate::errors::Result;

const OUTBOX_COLUMNS: &str = "id, event_type, aggregate_type, aggregate_id, payload, status, created_at";

/// Append one event for later asynchronous delivery.
///
/// The engine only enqueues; a separate relay owns delivery and status
/// transitions past PENDING.
pub fn append(
    conn: &Connection,
    event_type: &str,
    aggregate_type: &str,
    aggregate_id: i64,
    payload: &serde_json::Value,
    now: DateTime<Utc>,
) -> Result<()> {
    conn.execute(
        "INSERT INTO outbox_events (event_type, aggregate_type, aggregate_id, payload, status, created_at) VALUES (?1, ?2, ?3, ?4, 'PENDING', ?5)",
        params![event_type, aggregate_type, aggregate_id, payload.to_string(), now],
    )?;
    Ok(())
}

pub fn list_pending(conn: &Connection) -> Result<Vec<OutboxEvent>> {
    let sql = format!(
        "SELECT {} FROM outbox_events WHERE status = 'PENDING' ORDER BY id",
        OUTBOX_COLUMNS
    );

    let mut stmt = conn.prepare(&sql)?;
    let rows = stmt
        .query_map([], parse_outbox_row)?
        .collect::<rusqlite::Result<Vec<_>>>()?;
    Ok(rows)
}

pub fn list_by_aggregate(
    conn: &Connection,
    aggregate_type: &str,
    aggregate_id: i64,
) -> Result<Vec<OutboxEvent>> {
    let sql = format!(
        "SELECT {} FROM outbox_events WHERE aggregate_type = ?1 AND aggregate_id = ?2 ORDER BY id",
        OUTBOX_COLUMNS
    );

    let mut stmt = conn.prepare(&sql)?;
    let rows = stmt
        .query_map(params![aggregate_type, aggregate_id], parse_outbox_row)?
        .collect::<rusqlite::Result<Vec<_>>>()?;
    Ok(rows)
}

fn parse_outbox_row(row: &rusqlite::Row) -> rusqlite::Result<OutboxEvent> {
    let payload_raw: String = row.get(4)?;
    let payload = serde_json::from_str(&payload_raw).map_err(|e| {
        rusqlite::Error::FromSqlConversionFailure(4, rusqlite::types::Type::Text, Box::new(e))
    })?;

    Ok(OutboxEvent {
        id: row.get(0)?,
        event_type: row.get(1)?,
        aggregate_type: row.get(2)?,
        aggregate_id: row.get(3)?,
        payload,
        status: row.get(5)?,
        created_at: row.get(6)?,
    })
}
