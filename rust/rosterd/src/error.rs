use crate::db::StoreError;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum RosterError {
    #[error("{reason}")]
    Validation { field: &'static str, reason: String },
    #[error("email already exists: {email}")]
    UniqueViolation { email: String },
    #[error("select a student first")]
    NoSelection,
    #[error("student {0} not found")]
    NotFound(i64),
    #[error("{0:#}")]
    Io(anyhow::Error),
    #[error("database error: {0}")]
    Db(#[from] rusqlite::Error),
}

impl RosterError {
    pub fn validation(field: &'static str, reason: impl Into<String>) -> Self {
        RosterError::Validation {
            field,
            reason: reason.into(),
        }
    }

    /// Stable error code used on the IPC wire.
    pub fn code(&self) -> &'static str {
        match self {
            RosterError::Validation { .. } => "validation_failed",
            RosterError::UniqueViolation { .. } => "email_exists",
            RosterError::NoSelection => "no_selection",
            RosterError::NotFound(_) => "not_found",
            RosterError::Io(_) => "io_failed",
            RosterError::Db(_) => "db_query_failed",
        }
    }
}

impl From<StoreError> for RosterError {
    fn from(e: StoreError) -> Self {
        match e {
            StoreError::UniqueViolation { email } => RosterError::UniqueViolation { email },
            StoreError::NotFound(id) => RosterError::NotFound(id),
            StoreError::Sqlite(e) => RosterError::Db(e),
        }
    }
}
