//! Error types shared across the gate, intake, store and controller.

use thiserror::Error;

use crate::models::AccessLevel;

pub type Result<T> = std::result::Result<T, Error>;

#[derive(Debug, Error)]
pub enum Error {
    /// Entered code matched neither configured secret; caller re-prompts.
    #[error("incorrect access code")]
    InvalidCode,

    #[error("{0}")]
    Validation(#[from] ValidationError),

    /// Store call failed; prior data stays displayed.
    #[error("record store unavailable: {0}")]
    StorageUnavailable(String),

    #[error("operation requires {0} access")]
    PermissionDenied(AccessLevel),

    #[error("configuration error: {0}")]
    Config(String),
}

impl From<sqlx::Error> for Error {
    fn from(err: sqlx::Error) -> Self {
        Error::StorageUnavailable(err.to_string())
    }
}

impl From<sqlx::migrate::MigrateError> for Error {
    fn from(err: sqlx::migrate::MigrateError) -> Self {
        Error::StorageUnavailable(format!("migration failed: {err}"))
    }
}

/// Intake rejection naming the first missing or invalid field.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ValidationError {
    #[error("{0} is required")]
    Missing(&'static str),

    #[error("year {0} is outside the accepted range")]
    YearOutOfRange(i32),

    #[error("unknown path type '{0}'")]
    InvalidType(String),
}

impl ValidationError {
    pub fn field(&self) -> &'static str {
        match self {
            ValidationError::Missing(field) => field,
            ValidationError::YearOutOfRange(_) => "year",
            ValidationError::InvalidType(_) => "type",
        }
    }
}
