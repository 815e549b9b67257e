//! Storage traits and error types
//!
//! This module defines the trait interface for record stores and
//! associated error types.

use crate::record::{Record, Tag};
use crate::storage::{RunRecord, RunStatus, StoredQuote};
use thiserror::Error;

/// Errors that can occur during storage operations
#[derive(Debug, Error)]
pub enum StorageError {
    #[error("Run not found: {0}")]
    RunNotFound(i64),

    #[error("SQLite error: {0}")]
    Sqlite(#[from] rusqlite::Error),

    #[error("Constraint violation: {0}")]
    ConstraintViolation(String),
}

/// Result type for storage operations
pub type StorageResult<T> = Result<T, StorageError>;

/// Trait for record store implementations
///
/// Every write is idempotent: saving the same record or tag again updates the
/// existing row instead of creating a duplicate, whatever order calls arrive in.
pub trait RecordStore {
    // ===== Run Management =====

    /// Creates a new harvest run in the `Running` status
    ///
    /// # Arguments
    ///
    /// * `config_hash` - Hash of the configuration file
    ///
    /// # Returns
    ///
    /// The ID of the newly created run
    fn create_run(&mut self, config_hash: &str) -> StorageResult<i64>;

    /// Records how a run ended
    fn finish_run(
        &mut self,
        run_id: i64,
        status: RunStatus,
        record_count: usize,
        abort_reason: Option<&str>,
    ) -> StorageResult<()>;

    /// Gets a run by ID
    fn get_run(&self, run_id: i64) -> StorageResult<RunRecord>;

    /// Gets the most recent run
    fn get_latest_run(&self) -> StorageResult<Option<RunRecord>>;

    // ===== Records =====

    /// Inserts a tag or refreshes its URL, returning the tag ID
    fn upsert_tag(&mut self, tag: &Tag) -> StorageResult<i64>;

    /// Creates or updates the quote (unique by text and author) and links its tags
    ///
    /// # Returns
    ///
    /// The quote ID
    fn save_record(&mut self, record: &Record, run_id: i64) -> StorageResult<i64>;

    /// Loads every stored quote with its tags, oldest first
    fn list_records(&self) -> StorageResult<Vec<StoredQuote>>;

    /// Loads the quotes seen by a given run
    fn list_records_for_run(&self, run_id: i64) -> StorageResult<Vec<StoredQuote>>;

    // ===== Statistics =====

    fn count_records(&self) -> StorageResult<u64>;

    fn count_tags(&self) -> StorageResult<u64>;

    fn count_runs(&self) -> StorageResult<u64>;

    /// Gets the most used tags with their quote counts, most used first
    fn top_tags(&self, limit: usize) -> StorageResult<Vec<(String, u64)>>;

    /// Gets the number of quotes per author, most quoted first
    fn author_breakdown(&self) -> StorageResult<Vec<(String, u64)>>;
}
