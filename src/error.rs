//! Crate error types and result alias.

use thiserror::Error;

/// Crate result type alias
pub type Result<T> = std::result::Result<T, Error>;

/// Errors surfaced to the embedding application.
#[derive(Error, Debug)]
pub enum Error {
    #[error("Configuration error: {0}")]
    Config(String),

    #[error("Database error: {0}")]
    Database(String),

    #[error("Database error: {0}")]
    Sqlx(#[from] sqlx::Error),

    #[error("Validation error: {0}")]
    Validation(String),

    /// Uniqueness violation on a natural key, or a duplicate assignment.
    #[error("Conflict: {0}")]
    Conflict(String),

    /// Deletion refused because other rows still reference the entity.
    #[error("Dependency error: {0}")]
    Dependency(String),

    #[error("Not found: {0}")]
    NotFound(String),

    #[error("Internal error: {0}")]
    Internal(String),
}

impl Error {
    /// Translate a sqlx error into a `Conflict` when it is a unique-key
    /// violation, naming the entity; everything else becomes `Database`.
    pub(crate) fn from_db(e: sqlx::Error, conflict_message: &str) -> Self {
        let msg = e.to_string();
        if msg.contains("duplicate key") {
            Error::Conflict(conflict_message.to_string())
        } else {
            Error::Database(msg)
        }
    }

    /// Translate a sqlx error into a `Dependency` when it is a foreign-key
    /// restriction, naming the entity; everything else becomes `Database`.
    pub(crate) fn from_db_restrict(e: sqlx::Error, dependency_message: &str) -> Self {
        let msg = e.to_string();
        if msg.contains("violates foreign key constraint") {
            Error::Dependency(dependency_message.to_string())
        } else {
            Error::Database(msg)
        }
    }
}
