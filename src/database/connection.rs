use r2d2::Pool;
use r2d2_sqlite::SqliteConnectionManager;

use crate::errors::Result;

pub type DbPool = Pool<SqliteConnectionManager>;
pub type DbConn = r2d2::PooledConnection<SqliteConnectionManager>;

/// Open a pooled connection to a database file
pub fn open_pool(path: &str) -> Result<DbPool> {
    let manager = SqliteConnectionManager::file(path);
    build_pool(manager, 8)
}

/// Open a single-connection in-memory pool.
///
/// Every in-memory connection is its own database, so the pool is capped at
/// one connection; used by tests and the demo command.
pub fn memory_pool() -> Result<DbPool> {
    let manager = SqliteConnectionManager::memory();
    build_pool(manager, 1)
}

fn build_pool(manager: SqliteConnectionManager, max_size: u32) -> Result<DbPool> {
    let pool = Pool::builder().max_size(max_size).build(manager)?;
    Ok(pool)
}
