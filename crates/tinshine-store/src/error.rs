use thiserror::Error;

/// Errors produced by the local cache.
#[derive(Error, Debug)]
pub enum StoreError {
    /// SQLite error (includes "database is locked" and disk-full conditions).
    #[error("Database error: {0}")]
    Sqlite(#[from] rusqlite::Error),

    /// Failed to determine a platform data directory.
    #[error("Could not determine application data directory")]
    NoDataDir,

    /// Generic I/O error (e.g. creating the cache directory).
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    /// A cached value could not be encoded or decoded.
    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    /// A scalar key held something other than what it should.
    #[error("Corrupt value under {key}: {reason}")]
    Corrupt { key: String, reason: String },

    /// Migration failure.
    #[error("Migration error: {0}")]
    Migration(String),
}

/// Convenience alias used throughout the crate.
pub type Result<T> = std::result::Result<T, StoreError>;
