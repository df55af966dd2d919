//! Error types for the contract engine.

use rusqlite::ErrorCode;

/// Errors surfaced by engine operations.
#[derive(Debug, thiserror::Error)]
pub enum EngineError {
    /// The referenced record does not exist or is outside the caller's scope.
    #[error("{0} not found")]
    NotFound(String),

    /// The requested transition is not allowed from the current status.
    #[error("invalid state: {0}")]
    InvalidState(String),

    /// A concurrent writer changed the lineage first. The whole operation can be retried.
    #[error("conflict: {0}")]
    Conflict(String),

    #[error("validation failed: {0}")]
    Validation(String),

    #[error("forbidden: {0}")]
    Forbidden(String),

    #[error("collaborator failure: {0}")]
    Collaborator(String),

    #[error("database error: {0}")]
    Database(rusqlite::Error),
}

impl EngineError {
    pub fn not_found(what: impl Into<String>) -> Self {
        Self::NotFound(what.into())
    }

    pub fn invalid_state(msg: impl Into<String>) -> Self {
        Self::InvalidState(msg.into())
    }

    pub fn validation(msg: impl Into<String>) -> Self {
        Self::Validation(msg.into())
    }

    /// Only lineage races are safe to retry from scratch.
    pub fn is_retryable(&self) -> bool {
        matches!(self, Self::Conflict(_))
    }
}

impl From<rusqlite::Error> for EngineError {
    fn from(err: rusqlite::Error) -> Self {
        match &err {
            rusqlite::Error::SqliteFailure(e, msg) => match e.code {
                ErrorCode::DatabaseBusy | ErrorCode::DatabaseLocked => {
                    Self::Conflict(format!("database busy: {}", msg.as_deref().unwrap_or("locked")))
                }
                ErrorCode::ConstraintViolation
                    if msg.as_deref().map_or(false, is_lineage_constraint) =>
                {
                    Self::Conflict(msg.clone().unwrap_or_default())
                }
                _ => Self::Database(err),
            },
            _ => Self::Database(err),
        }
    }
}

/// Unique indexes that guard per-lineage sequences.
fn is_lineage_constraint(msg: &str) -> bool {
    msg.contains("UNIQUE")
        && (msg.contains("sow_contracts.lineage_id")
            || msg.contains("contract_appendices.")
            || msg.contains("change_requests.code"))
}

pub type EngineResult<T> = Result<T, EngineError>;

#[cfg(test)]
mod tests {
    use super::*;

    fn sqlite_failure(code: ErrorCode, msg: &str) -> rusqlite::Error {
        rusqlite::Error::SqliteFailure(
            rusqlite::ffi::Error {
                code,
                extended_code: 0,
            },
            Some(msg.to_string()),
        )
    }

    #[test]
    fn test_busy_is_retryable_conflict() {
        let err: EngineError = sqlite_failure(ErrorCode::DatabaseBusy, "database is locked").into();
        assert!(matches!(err, EngineError::Conflict(_)));
        assert!(err.is_retryable());
    }

    #[test]
    fn test_version_unique_violation_is_conflict() {
        let err: EngineError = sqlite_failure(
            ErrorCode::ConstraintViolation,
            "UNIQUE constraint failed: sow_contracts.lineage_id, sow_contracts.version",
        )
        .into();
        assert!(err.is_retryable());
    }

    #[test]
    fn test_other_constraint_is_database_error() {
        let err: EngineError = sqlite_failure(
            ErrorCode::ConstraintViolation,
            "FOREIGN KEY constraint failed",
        )
        .into();
        assert!(matches!(err, EngineError::Database(_)));
        assert!(!err.is_retryable());
    }

    #[test]
    fn test_business_errors_not_retryable() {
        assert!(!EngineError::invalid_state("x").is_retryable());
        assert!(!EngineError::not_found("x").is_retryable());
    }
}
