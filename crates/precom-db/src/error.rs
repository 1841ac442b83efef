//! Database error types for precom-db.

use thiserror::Error;

/// Errors from database operations.
#[derive(Debug, Error)]
pub enum DatabaseError {
    /// A SQL query failed.
    #[error("Query failed: {0}")]
    Query(String),

    /// Schema migration failed.
    #[error("Migration failed: {0}")]
    Migration(String),

    /// Expected a result row but none was returned.
    #[error("No result returned")]
    NoResult,

    /// Invalid state encountered (bad data in DB, illegal status change).
    #[error("Invalid state: {0}")]
    InvalidState(String),

    /// Another holder owns an unexpired run lease.
    #[error("Run lease '{name}' is held by {holder} until {expires_at}")]
    LeaseHeld {
        name: String,
        holder: String,
        expires_at: String,
    },

    /// Underlying libSQL error.
    #[error("libSQL error: {0}")]
    LibSql(#[from] libsql::Error),

    /// Catch-all for unexpected errors.
    #[error(transparent)]
    Other(#[from] anyhow::Error),
}
