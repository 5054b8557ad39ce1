//! Forum-Harvest: a resumable forum crawler
//!
//! This crate discovers the topics of a paginated web forum and then fetches
//! every page of every topic, writing the extracted posts into numbered CSV
//! batches. Work is tracked in append-only progress logs so an interrupted
//! run picks up where it left off without losing or double-completing units.

pub mod config;
pub mod crawler;
pub mod extractor;
pub mod output;
pub mod state;
pub mod storage;

use thiserror::Error;

/// Main error type for Forum-Harvest startup and orchestration
///
/// Per-unit failures never surface here; they are counted in the run
/// summary. Anything returned as `HarvestError` aborts before work begins.
#[derive(Debug, Error)]
pub enum HarvestError {
    #[error("Configuration error: {0}")]
    Config(#[from] ConfigError),

    #[error("Storage error: {0}")]
    Storage(#[from] storage::StorageError),

    #[error("HTTP client error: {0}")]
    Http(#[from] reqwest::Error),

    #[error("Worker pool error: {0}")]
    Pool(String),
}

/// Configuration-specific errors
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("Failed to read config file: {0}")]
    Io(#[from] std::io::Error),

    #[error("Failed to parse TOML: {0}")]
    Parse(#[from] toml::de::Error),

    #[error("Validation error: {0}")]
    Validation(String),

    #[error("Invalid URL in config: {0}")]
    InvalidUrl(String),

    #[error("Topic list not found: {0}")]
    MissingTopicList(String),

    #[error("Malformed topic list: {0}")]
    MalformedTopicList(String),
}

/// Errors raised while fetching a single document
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum FetchError {
    #[error("Transport error for {url}: {message}")]
    Transport { url: String, message: String },

    #[error("HTTP {status} for {url}")]
    Status { url: String, status: u16 },

    #[error("Failed to read body of {url}: {message}")]
    Body { url: String, message: String },

    #[error("Gave up on {url} after {attempts} attempts: {last_cause}")]
    Exhausted {
        url: String,
        attempts: u32,
        last_cause: String,
    },
}

impl FetchError {
    /// Returns true once the retry policy has given up on the target
    pub fn is_exhausted(&self) -> bool {
        matches!(self, Self::Exhausted { .. })
    }

    /// The URL this error refers to
    pub fn url(&self) -> &str {
        match self {
            Self::Transport { url, .. }
            | Self::Status { url, .. }
            | Self::Body { url, .. }
            | Self::Exhausted { url, .. } => url,
        }
    }
}

/// Result type alias for Forum-Harvest operations
pub type Result<T> = std::result::Result<T, HarvestError>;

/// Result type alias for configuration operations
pub type ConfigResult<T> = std::result::Result<T, ConfigError>;

/// Result type alias for fetch operations
pub type FetchResult<T> = std::result::Result<T, FetchError>;

// Re-export commonly used types
pub use config::Config;
pub use crawler::Harvester;
pub use output::RunSummary;
pub use storage::RunMode;
pub use state::{PageUnit, PostRecord, TopicRef, TopicUnit, UnitState};

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_exhausted_detection() {
        let transient = FetchError::Status {
            url: "https://forum.example/t/1".to_string(),
            status: 503,
        };
        assert!(!transient.is_exhausted());

        let exhausted = FetchError::Exhausted {
            url: "https://forum.example/t/1".to_string(),
            attempts: 3,
            last_cause: transient.to_string(),
        };
        assert!(exhausted.is_exhausted());
        assert_eq!(exhausted.url(), "https://forum.example/t/1");
        assert!(exhausted.to_string().contains("after 3 attempts"));
    }
}
