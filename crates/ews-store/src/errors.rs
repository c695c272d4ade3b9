//! Storage error types.

use thiserror::Error;

/// Errors that can occur while persisting or reading back readings.
#[derive(Debug, Error)]
pub enum StoreError {
    /// `SQLite` database error.
    #[error("sqlite error: {0}")]
    Sqlite(#[from] rusqlite::Error),

    /// Connection pool error.
    #[error("connection pool error: {0}")]
    Pool(#[from] r2d2::Error),

    /// Schema migration failed.
    #[error("migration error: {message}")]
    Migration {
        /// Describes which migration failed and why.
        message: String,
    },

    /// Could not prepare the database directory.
    #[error("io error: {0}")]
    Io(#[from] std::io::Error),
}

/// Convenience type alias for storage results.
pub type Result<T> = std::result::Result<T, StoreError>;
