//! Append-only progress log
//!
//! One key per line. The whole file is read at startup; lines that do not
//! parse as the expected key type are ignored.

use crate::state::UnitKey;
use crate::storage::traits::{ProgressStore, StorageResult};
use std::collections::HashSet;
use std::fs::{File, OpenOptions};
use std::io::{BufRead, BufReader, Write};
use std::path::{Path, PathBuf};

/// Text-file backed progress store
#[derive(Debug)]
pub struct ProgressLog<K: UnitKey> {
    path: PathBuf,
    completed: HashSet<K>,
}

impl<K: UnitKey> ProgressLog<K> {
    /// Opens the log at `path`, loading every parseable key
    ///
    /// A missing file is an empty log; it is created on the first append.
    pub fn open(path: impl AsRef<Path>) -> StorageResult<Self> {
        let path = path.as_ref().to_path_buf();
        let mut completed = HashSet::new();
        let mut ignored = 0usize;

        if path.exists() {
            let reader = BufReader::new(File::open(&path)?);
            for line in reader.lines() {
                let line = line?;
                if line.trim().is_empty() {
                    continue;
                }
                match K::parse_key(&line) {
                    Some(key) => {
                        completed.insert(key);
                    }
                    None => ignored += 1,
                }
            }
        }

        if ignored > 0 {
            tracing::warn!(
                "Ignored {} unparseable lines in {}",
                ignored,
                path.display()
            );
        }
        tracing::debug!(
            "Loaded {} completed units from {}",
            completed.len(),
            path.display()
        );

        Ok(Self { path, completed })
    }
}

impl<K: UnitKey> ProgressStore<K> for ProgressLog<K> {
    fn contains(&self, key: &K) -> bool {
        self.completed.contains(key)
    }

    fn len(&self) -> usize {
        self.completed.len()
    }

    fn completed(&self) -> &HashSet<K> {
        &self.completed
    }

    fn record(&mut self, keys: &[K]) -> StorageResult<()> {
        if keys.is_empty() {
            return Ok(());
        }

        let mut file = OpenOptions::new()
            .create(true)
            .append(true)
            .open(&self.path)?;

        let mut buf = String::new();
        for key in keys {
            buf.push_str(&key.to_string());
            buf.push('\n');
        }
        file.write_all(buf.as_bytes())?;
        file.sync_data()?;

        self.completed.extend(keys.iter().cloned());
        Ok(())
    }
}
