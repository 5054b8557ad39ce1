//! Storage traits and error types
//!
//! This module defines the trait interface for progress stores and the
//! error type shared by every persistence path.

use crate::state::UnitKey;
use std::collections::HashSet;
use thiserror::Error;

/// Errors that can occur during storage operations
#[derive(Debug, Error)]
pub enum StorageError {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("CSV error: {0}")]
    Csv(#[from] csv::Error),

    #[error("SQLite error: {0}")]
    Sqlite(#[from] rusqlite::Error),

    #[error("Refusing to overwrite existing output: {0}")]
    Collision(String),
}

/// Result type for storage operations
pub type StorageResult<T> = Result<T, StorageError>;

/// Durable record of completed work units
///
/// Implementations must only report a key as recorded once it has reached
/// stable storage. Membership is read at startup to build the resume set.
pub trait ProgressStore<K: UnitKey>: Send {
    /// Returns true if the key was recorded by this or an earlier run
    fn contains(&self, key: &K) -> bool;

    /// Number of distinct keys recorded
    fn len(&self) -> usize;

    /// Returns true if nothing has been recorded yet
    fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Snapshot of every recorded key
    fn completed(&self) -> &HashSet<K>;

    /// Appends the keys and makes them durable
    ///
    /// On error none of the keys may be treated as recorded by the caller,
    /// although some may have reached the log; re-processing them is safe.
    fn record(&mut self, keys: &[K]) -> StorageResult<()>;
}
