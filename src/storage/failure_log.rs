//! Failure log for units that exhausted their retries
//!
//! Kept apart from the progress log: a failed unit is not complete and is
//! enumerated again on the next run. Each line is
//! `<key>\t<rfc3339 timestamp>\t<reason>`.

use crate::storage::traits::StorageResult;
use chrono::Utc;
use std::fmt::Display;
use std::fs::OpenOptions;
use std::io::Write;
use std::path::{Path, PathBuf};

#[derive(Debug, Clone)]
pub struct FailureLog {
    path: PathBuf,
}

impl FailureLog {
    pub fn new(path: impl AsRef<Path>) -> Self {
        Self {
            path: path.as_ref().to_path_buf(),
        }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Appends one failure entry
    pub fn record(&self, key: &impl Display, reason: &str) -> StorageResult<()> {
        let mut file = OpenOptions::new()
            .create(true)
            .append(true)
            .open(&self.path)?;

        let reason: String = reason
            .chars()
            .map(|c| if c == '\n' || c == '\t' || c == '\r' { ' ' } else { c })
            .collect();
        writeln!(file, "{}\t{}\t{}", key, Utc::now().to_rfc3339(), reason)?;
        file.flush()?;
        Ok(())
    }

    /// Reads back the keys of every entry, oldest first
    pub fn keys(&self) -> StorageResult<Vec<String>> {
        if !self.path.exists() {
            return Ok(Vec::new());
        }
        let content = std::fs::read_to_string(&self.path)?;
        Ok(content
            .lines()
            .filter_map(|line| line.split('\t').next())
            .map(str::trim)
            .filter(|key| !key.is_empty())
            .map(str::to_string)
            .collect())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[test]
    fn test_record_and_read_keys() {
        let dir = TempDir::new().unwrap();
        let log = FailureLog::new(dir.path().join("failed_pages.log"));

        assert!(log.keys().unwrap().is_empty());

        log.record(&17, "HTTP 503 for https://forum.example/page-17")
            .unwrap();
        log.record(&"https://forum.example/threads/a.1/", "timed out\nagain")
            .unwrap();

        assert_eq!(
            log.keys().unwrap(),
            vec!["17", "https://forum.example/threads/a.1/"]
        );

        let content = std::fs::read_to_string(log.path()).unwrap();
        assert_eq!(content.lines().count(), 2);
        assert!(content.contains("timed out again"));
    }
}
