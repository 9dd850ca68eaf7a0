use thiserror::Error;

/// Failure taxonomy for engine operations.
///
/// `Conflict` is distinct from `InvalidState` on purpose: a conflict means a
/// concurrent writer got there first and the caller may re-read and retry,
/// while an invalid state is a lifecycle violation that retrying cannot fix.
#[derive(Debug, Error)]
pub enum EngineError {
    #[error("{entity} {id} not found")]
    NotFound { entity: &'static str, id: i64 },

    #[error("operation requires state {expected}, current state is {actual}")]
    InvalidState { expected: String, actual: String },

    #[error("conflict: {0}")]
    Conflict(String),

    #[error("validation failed: {0}")]
    Validation(String),

    #[error("unsupported: {0}")]
    Unsupported(String),

    #[error("storage error: {0}")]
    Storage(#[from] rusqlite::Error),

    #[error("connection pool error: {0}")]
    Pool(#[from] r2d2::Error),
}

pub type Result<T> = std::result::Result<T, EngineError>;

impl EngineError {
    pub fn not_found(entity: &'static str, id: i64) -> Self {
        EngineError::NotFound { entity, id }
    }

    pub fn invalid_state(expected: impl Into<String>, actual: impl Into<String>) -> Self {
        EngineError::InvalidState {
            expected: expected.into(),
            actual: actual.into(),
        }
    }

    pub fn conflict(message: impl Into<String>) -> Self {
        EngineError::Conflict(message.into())
    }

    pub fn validation(message: impl Into<String>) -> Self {
        EngineError::Validation(message.into())
    }

    pub fn unsupported(message: impl Into<String>) -> Self {
        EngineError::Unsupported(message.into())
    }

    pub fn is_conflict(&self) -> bool {
        matches!(self, EngineError::Conflict(_))
    }
}

/// Convert a storage error into `Conflict` when it is a UNIQUE violation.
///
/// Duplicate votes and duplicate registrations are enforced by unique
/// indexes, so the constraint error is the authoritative duplicate signal
/// even under concurrent writers. Only the unique and primary-key extended
/// codes map to `Conflict`; other constraint failures, foreign keys in
/// particular, stay `Storage`.
pub fn map_unique_violation(err: rusqlite::Error, message: &str) -> EngineError {
    if let rusqlite::Error::SqliteFailure(code, _) = &err {
        if code.extended_code == rusqlite::ffi::SQLITE_CONSTRAINT_UNIQUE
            || code.extended_code == rusqlite::ffi::SQLITE_CONSTRAINT_PRIMARYKEY
        {
            return EngineError::Conflict(message.to_string());
        }
    }
    EngineError::Storage(err)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_conflict_is_distinct_from_invalid_state() {
        let conflict = EngineError::conflict("duplicate vote");
        let invalid = EngineError::invalid_state("REGISTRATION", "DRAFT");

        assert!(conflict.is_conflict());
        assert!(!invalid.is_conflict());
    }

    #[test]
    fn test_only_unique_violations_map_to_conflict() {
        let unique = rusqlite::Error::SqliteFailure(
            rusqlite::ffi::Error::new(rusqlite::ffi::SQLITE_CONSTRAINT_UNIQUE),
            None,
        );
        assert!(map_unique_violation(unique, "duplicate").is_conflict());

        let foreign_key = rusqlite::Error::SqliteFailure(
            rusqlite::ffi::Error::new(rusqlite::ffi::SQLITE_CONSTRAINT_FOREIGNKEY),
            None,
        );
        let mapped = map_unique_violation(foreign_key, "duplicate");
        assert!(matches!(mapped, EngineError::Storage(_)));
    }

    #[test]
    fn test_invalid_state_carries_current_state() {
        let err = EngineError::invalid_state("VOTING", "ACTIVE");
        let message = err.to_string();

        assert!(message.contains("VOTING"));
        assert!(message.contains("ACTIVE"));
    }
}
