use rusqlite::Connection;

use crate::errors::Result;

const SCHEMA_SQL: &str = include_str!("schema.sql");

/// Create all tables and indexes if they do not exist yet
pub fn initialize_schema(conn: &Connection) -> Result<()> {
    let statements = split_sql_statements(SCHEMA_SQL);

    for statement in &statements {
        conn.execute_batch(statement)?;
    }

    log::info!("Database schema initialized ({} statements)", statements.len());
    Ok(())
}

fn split_sql_statements(sql: &str) -> Vec<String> {
    sql.split(';')
        .map(|s| s.trim().to_string())
        .filter(|s| !s.is_empty())
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_schema_initializes_on_fresh_database() {
        let conn = Connection::open_in_memory().unwrap();
        initialize_schema(&conn).unwrap();

        // Idempotent on a second run
        initialize_schema(&conn).unwrap();

        let count: i64 = conn
            .query_row(
                "SELECT COUNT(*) FROM sqlite_master WHERE type = 'table'",
                [],
                |row| row.get(0),
            )
            .unwrap();
        assert!(count >= 11);
    }
}
