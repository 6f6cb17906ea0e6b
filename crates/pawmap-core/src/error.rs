//! Error types for pawmap-core

use thiserror::Error;

use crate::models::ValidationError;

/// Result type alias using pawmap-core's Error
pub type Result<T> = std::result::Result<T, Error>;

/// Errors that can occur in pawmap-core operations
#[derive(Error, Debug)]
pub enum Error {
    /// Candidate incident failed validation (client-correctable)
    #[error(transparent)]
    Validation(#[from] ValidationError),

    /// Backing store could not be reached or timed out (retryable)
    #[error("Store unavailable: {0}")]
    StoreUnavailable(String),

    /// Store schema rejected a record that passed validation
    #[error("Record rejected by store: {0}")]
    ValidationRejected(String),

    /// IO error
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    /// Invalid input
    #[error("Invalid input: {0}")]
    InvalidInput(String),

    /// Serialization error
    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),
}

impl Error {
    /// Whether retrying the same operation later may succeed.
    pub const fn is_retryable(&self) -> bool {
        matches!(self, Self::StoreUnavailable(_))
    }
}

/// Primary `SQLite` result code for a violated constraint
const SQLITE_CONSTRAINT: i32 = 19;

impl From<libsql::Error> for Error {
    fn from(error: libsql::Error) -> Self {
        if is_constraint_violation(&error) {
            Self::ValidationRejected(error.to_string())
        } else {
            Self::StoreUnavailable(error.to_string())
        }
    }
}

/// Extended codes (e.g. `SQLITE_CONSTRAINT_CHECK`) carry the primary code in the low byte.
const fn is_constraint_violation(error: &libsql::Error) -> bool {
    matches!(error, libsql::Error::SqliteFailure(code, _) if *code & 0xff == SQLITE_CONSTRAINT)
}
