//! Error types for catalog_sync

use thiserror::Error;

/// Unified error type for catalog sync operations
#[derive(Debug, Error)]
pub enum SyncError {
    /// HTTP request failed (network error, timeout, etc.)
    #[error("Network error: {0}")]
    Network(#[from] reqwest::Error),

    /// Failed to parse JSON data
    #[error("Parse error: {0}")]
    Parse(#[from] serde_json::Error),

    /// HTTP error status code
    #[error("HTTP error: {0}")]
    HttpStatus(reqwest::StatusCode),

    /// Warehouse or history database operation failed
    #[error("Database error: {0}")]
    Database(#[from] rusqlite::Error),

    /// File I/O error
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// A source produced zero listings; empty snapshots are never published
    #[error("empty snapshot from {0}")]
    EmptySnapshot(String),

    /// The acquisition call exceeded its timeout
    #[error("timed out fetching {0}")]
    Timeout(String),

    /// A refresh for this source is already in flight
    #[error("{0} is already being refreshed")]
    AlreadyRefreshing(String),

    /// No source registered under this shorthand
    #[error("unknown source: {0}")]
    UnknownSource(String),

    /// The warehouse table contains a column the decoder does not know
    #[error("unknown warehouse column: {0}")]
    UnknownColumn(String),

    /// A bulk cycle produced no usable data on one side and was discarded
    #[error("bulk cycle abandoned: {0}")]
    CycleAbandoned(&'static str),
}

/// Result alias for catalog sync operations
pub type Result<T> = std::result::Result<T, SyncError>;
