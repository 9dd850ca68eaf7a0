pub mod audit;
pub mod challenges;
pub mod connection;
pub mod directory;
pub mod matches;
pub mod outbox;
pub mod participations;
pub mod ranking_votes;
pub mod rankings;
pub mod setup;
pub mod tournaments;
pub mod votes;

pub use connection::{memory_pool, open_pool, DbConn, DbPool};
pub use setup::initialize_schema;

/// Decode a TEXT column into a domain enum inside a row parser
pub(crate) fn parse_enum<T>(
    idx: usize,
    raw: &str,
    parse: impl Fn(&str) -> Option<T>,
) -> rusqlite::Result<T> {
    parse(raw).ok_or_else(|| {
        rusqlite::Error::FromSqlConversionFailure(
            idx,
            rusqlite::types::Type::Text,
            format!("unrecognized value: {}", raw).into(),
        )
    })
}

/// Decode an optional TEXT column into an optional domain enum
pub(crate) fn parse_enum_opt<T>(
    idx: usize,
    raw: Option<&str>,
    parse: impl Fn(&str) -> Option<T>,
) -> rusqlite::Result<Option<T>> {
    match raw {
        Some(value) => parse_enum(idx, value, parse).map(Some),
        None => Ok(None),
    }
}
