use chrono::{DateTime, Utc};
use rusqlite::{params, Connection};

use crate::domain::AuditRecord;
use crate::errors::Result;

const AUDIT_COLUMNS: &str = "id, actor, action, aggregate_type, aggregate_id, before_state, after_state, created_at";

#[allow(clippy::too_many_arguments)]
pub fn append(
    conn: &Connection,
    actor: &str,
    action: &str,
    aggregate_type: &str,
    aggregate_id: i64,
    before_state: Option<&str>,
    after_state: Option<&str>,
    now: DateTime<Utc>,
) -> Result<()> {
    conn.execute(
        "INSERT INTO audit_log (actor, action, aggregate_type, aggregate_id, before_state, after_state, created_at) VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7)",
        params![actor, action, aggregate_type, aggregate_id, before_state, after_state, now],
    )?;
    Ok(())
}

pub fn list_by_aggregate(
    conn: &Connection,
    aggregate_type: &str,
    aggregate_id: i64,
) -> Result<Vec<AuditRecord>> {
    let sql = format!(
        "SELECT {} FROM audit_log WHERE aggregate_type = ?1 AND aggregate_id = ?2 ORDER BY id",
        AUDIT_COLUMNS
    );

    let mut stmt = conn.prepare(&sql)?;
    let rows = stmt
        .query_map(params![aggregate_type, aggregate_id], parse_audit_row)?
        .collect::<rusqlite::Result<Vec<_>>>()?;
    Ok(rows)
}

fn parse_audit_row(row: &rusqlite::Row) -> rusqlite::Result<AuditRecord> {
    Ok(AuditRecord {
        id: row.get(0)?,
        actor: row.get(1)?,
        action: row.get(2)?,
        aggregate_type: row.get(3)?,
        aggregate_id: row.get(4)?,
        before_state: row.get(5)?,
        after_state: row.get(6)?,
        created_at: row.get(7)?,
    })
}
