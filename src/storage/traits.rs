//! Storage traits and error types
//!
//! This module defines the trait interface for index backends and
//! associated error types.

use crate::output::CrawlStats;
use crate::storage::{IndexDocument, RunRecord, SearchPage};
use rusqlite::ErrorCode;
use thiserror::Error;

/// Errors that can occur during storage operations
#[derive(Debug, Error)]
pub enum StorageError {
    #[error("Database error: {0}")]
    Database(String),

    #[error("Invalid document key: {0}")]
    InvalidKey(String),

    #[error("Run not found: {0}")]
    RunNotFound(i64),

    #[error("Store unavailable: {0}")]
    Unavailable(String),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("SQLite error: {0}")]
    Sqlite(#[from] rusqlite::Error),
}

impl StorageError {
    /// Returns true if the backing store can no longer accept any write
    ///
    /// Per-document problems (bad key, constraint violation, busy database)
    /// are not fatal; a store that cannot be opened, is corrupt, full or
    /// read-only is.
    pub fn is_fatal(&self) -> bool {
        match self {
            Self::Unavailable(_) | Self::Io(_) => true,
            Self::Sqlite(rusqlite::Error::SqliteFailure(err, _)) => matches!(
                err.code,
                ErrorCode::CannotOpen
                    | ErrorCode::SystemIoFailure
                    | ErrorCode::DatabaseCorrupt
                    | ErrorCode::NotADatabase
                    | ErrorCode::DiskFull
                    | ErrorCode::ReadOnly
                    | ErrorCode::PermissionDenied
            ),
            _ => false,
        }
    }
}

/// Result type for storage operations
pub type StorageResult<T> = Result<T, StorageError>;

/// Trait for index backend implementations
///
/// The coordinator is the only writer during a crawl run; all writes for
/// one run are issued sequentially from its task.
pub trait IndexStore {
    // ===== Documents =====

    /// Inserts or replaces the document stored under the normalized `document.url`
    ///
    /// Idempotent: writing the same document twice leaves the store in the
    /// same observable state as writing it once. The previous version,
    /// including its link set, is replaced entirely.
    fn upsert(&mut self, document: &IndexDocument) -> StorageResult<()>;

    /// Gets a document by URL (normalized before lookup)
    fn get(&self, url: &str) -> StorageResult<Option<IndexDocument>>;

    /// Removes a document; returns true if it existed
    fn remove(&mut self, url: &str) -> StorageResult<bool>;

    /// All document keys in ascending order
    fn urls(&self) -> StorageResult<Vec<String>>;

    /// Number of stored documents
    fn count(&self) -> StorageResult<u64>;

    /// Ensures written documents are durable
    fn flush(&mut self) -> StorageResult<()>;

    // ===== Search =====

    /// Results per search page
    fn page_size(&self) -> usize;

    /// Ranked free-text search; `page` is 1-based
    ///
    /// Never fails for an empty result: an empty page with correct
    /// pagination metadata is returned instead.
    fn search(&self, query: &str, page: usize) -> StorageResult<SearchPage>;

    // ===== Run Management =====

    /// Creates a new crawl run and returns its ID
    fn create_run(&mut self, config_hash: &str) -> StorageResult<i64>;

    /// Records the final statistics and status of a run
    fn complete_run(&mut self, run_id: i64, stats: &CrawlStats) -> StorageResult<()>;

    /// Gets a run by ID
    fn get_run(&self, run_id: i64) -> StorageResult<RunRecord>;

    /// Gets the most recent run
    fn latest_run(&self) -> StorageResult<Option<RunRecord>>;
}
