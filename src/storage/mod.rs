//! Storage module for persisting crawl progress
//!
//! This module handles everything that must survive a restart:
//! - Append-only progress logs (the source of truth for resume)
//! - Failure logs for units that exhausted their retries
//! - The optional SQLite run journal

mod failure_log;
mod progress;
mod schema;
mod sqlite;
mod traits;

pub use failure_log::FailureLog;
pub use progress::ProgressLog;
pub use sqlite::RunJournal;
pub use traits::{ProgressStore, StorageError, StorageResult};

use std::fmt;

/// Which pipeline a run executed
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum RunMode {
    Discovery,
    Extraction,
}

impl RunMode {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Discovery => "discovery",
            Self::Extraction => "extraction",
        }
    }

    pub fn from_db_string(s: &str) -> Option<Self> {
        match s {
            "discovery" => Some(Self::Discovery),
            "extraction" => Some(Self::Extraction),
            _ => None,
        }
    }
}

impl fmt::Display for RunMode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Represents a journaled run
#[derive(Debug, Clone)]
pub struct RunRecord {
    pub id: i64,
    pub mode: RunMode,
    pub started_at: String,
    pub finished_at: Option<String>,
    pub config_hash: String,
    pub status: RunStatus,
    pub completed: u64,
    pub failed: u64,
    pub skipped: u64,
}

/// Represents a journaled batch flush
#[derive(Debug, Clone)]
pub struct BatchRecord {
    pub sequence: u32,
    pub path: String,
    pub records: u64,
    pub units: u64,
    pub flushed_at: String,
}

/// Status of a harvest run
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RunStatus {
    Running,
    Completed,
    Interrupted,
}

impl RunStatus {
    pub fn to_db_string(&self) -> &'static str {
        match self {
            Self::Running => "running",
            Self::Completed => "completed",
            Self::Interrupted => "interrupted",
        }
    }

    pub fn from_db_string(s: &str) -> Option<Self> {
        match s {
            "running" => Some(Self::Running),
            "completed" => Some(Self::Completed),
            "interrupted" => Some(Self::Interrupted),
            _ => None,
        }
    }
}
