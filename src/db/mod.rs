pub mod sqlite;
pub mod repository;

pub use sqlite::*;
pub use repository::*;

use thiserror::Error;

#[derive(Error, Debug)]
pub enum DatabaseError {
    #[error("SQLite error: {0}")]
    Sqlite(#[from] rusqlite::Error),

    #[error("Entity not found: {entity_type} with id {id}")]
    NotFound { entity_type: String, id: String },

    #[error("Invalid enum value for {field}: {value}")]
    InvalidEnum { field: String, value: String },

    #[error("Malformed {column} payload: {reason}")]
    MalformedPayload { column: String, reason: String },

    #[error("Migration failed at version {version}: {reason}")]
    MigrationFailed { version: i64, reason: String },

    #[error("Constraint violated: {0}")]
    ConstraintViolation(String),
}

impl DatabaseError {
    /// The constraint message when the error is a SQLite uniqueness
    /// failure, `None` for every other error.
    pub fn unique_violation(&self) -> Option<&str> {
        match self {
            DatabaseError::Sqlite(rusqlite::Error::SqliteFailure(e, Some(msg)))
                if e.code == rusqlite::ErrorCode::ConstraintViolation
                    && msg.contains("UNIQUE constraint failed") =>
            {
                Some(msg.as_str())
            }
            _ => None,
        }
    }
}
