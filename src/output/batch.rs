//! Batch writer for extracted posts
//!
//! Records accumulate in one open batch. When it reaches the configured size
//! it is written to a new numbered CSV file in the data directory, and only
//! after that write succeeds are the contributing topics appended to the
//! progress store. A topic whose records straddle two batches is credited to
//! the batch holding its last record.

use crate::output::BOM;
use crate::state::PostRecord;
use crate::storage::{ProgressStore, StorageError, StorageResult};
use std::fs::{self, File};
use std::io::Write;
use std::mem;
use std::path::{Path, PathBuf};

const BATCH_PREFIX: &str = "posts_";
const BATCH_SUFFIX: &str = ".csv";

/// How a flush ended
#[derive(Debug)]
pub enum FlushStatus {
    /// File written and every unit recorded
    Committed,
    /// The batch file could not be written; no unit was recorded
    WriteFailed(StorageError),
    /// The file exists but the units could not be recorded
    MarkFailed(StorageError),
}

/// Result of one flush, handed back to the caller for accounting
#[derive(Debug)]
pub struct FlushReport {
    /// Sequence number of the file, if one was written
    pub sequence: Option<u32>,
    pub path: Option<PathBuf>,
    pub records: usize,
    /// Units credited to this batch
    pub units: Vec<String>,
    pub status: FlushStatus,
}

impl FlushReport {
    pub fn is_committed(&self) -> bool {
        matches!(self.status, FlushStatus::Committed)
    }
}

pub struct BatchWriter {
    data_dir: PathBuf,
    batch_size: usize,
    store: Box<dyn ProgressStore<String>>,
    records: Vec<PostRecord>,
    pending: Vec<String>,
    next_sequence: u32,
}

impl BatchWriter {
    /// Opens a writer over `data_dir`, creating it if needed
    ///
    /// Numbering continues after the highest `posts_NNNN.csv` already there.
    pub fn open(
        data_dir: impl AsRef<Path>,
        batch_size: usize,
        store: Box<dyn ProgressStore<String>>,
    ) -> StorageResult<Self> {
        let data_dir = data_dir.as_ref().to_path_buf();
        fs::create_dir_all(&data_dir)?;
        let next_sequence = highest_sequence(&data_dir)? + 1;

        tracing::debug!(
            "Batch writer on {} starts at sequence {}",
            data_dir.display(),
            next_sequence
        );

        Ok(Self {
            data_dir,
            batch_size: batch_size.max(1),
            store,
            records: Vec::new(),
            pending: Vec::new(),
            next_sequence,
        })
    }

    /// The progress store this writer marks units in
    #[cfg(test)]
    pub fn store(&self) -> &dyn ProgressStore<String> {
        self.store.as_ref()
    }

    /// Records currently held in the open batch
    #[cfg(test)]
    pub fn buffered(&self) -> usize {
        self.records.len()
    }

    /// Number the next written batch will take unless that name is taken
    pub fn next_sequence(&self) -> u32 {
        self.next_sequence
    }

    /// Adds every record of one completed unit
    ///
    /// Returns a report for each flush the records triggered. If a flush
    /// fails before the unit's last record has been buffered, the rest of
    /// its records are dropped and the unit is listed in that failed report.
    pub fn accept(&mut self, unit_id: String, records: Vec<PostRecord>) -> Vec<FlushReport> {
        let mut reports = Vec::new();
        let mut remaining = records.into_iter().peekable();

        while let Some(record) = remaining.next() {
            self.records.push(record);
            if self.records.len() < self.batch_size {
                continue;
            }

            let last = remaining.peek().is_none();
            if last {
                self.pending.push(unit_id.clone());
            }

            let mut report = self.flush();
            if !report.is_committed() && !last {
                report.units.push(unit_id);
                reports.push(report);
                return reports;
            }
            reports.push(report);
            if last {
                return reports;
            }
        }

        self.pending.push(unit_id);
        reports
    }

    /// Flushes whatever is left at the end of a run
    ///
    /// Returns `None` when there is nothing to write or mark. Units that
    /// finished with no records are marked without writing an empty file.
    pub fn finish(&mut self) -> Option<FlushReport> {
        if self.records.is_empty() && self.pending.is_empty() {
            return None;
        }
        Some(self.flush())
    }

    fn flush(&mut self) -> FlushReport {
        let records = mem::take(&mut self.records);
        let units = mem::take(&mut self.pending);

        if records.is_empty() {
            let status = match self.store.record(&units) {
                Ok(()) => FlushStatus::Committed,
                Err(e) => FlushStatus::MarkFailed(e),
            };
            return FlushReport {
                sequence: None,
                path: None,
                records: 0,
                units,
                status,
            };
        }

        let (sequence, path) = self.free_slot();
        if let Err(e) = write_batch(&path, &records) {
            return FlushReport {
                sequence: None,
                path: None,
                records: records.len(),
                units,
                status: FlushStatus::WriteFailed(e),
            };
        }
        self.next_sequence = sequence + 1;

        let status = match self.store.record(&units) {
            Ok(()) => FlushStatus::Committed,
            Err(e) => FlushStatus::MarkFailed(e),
        };

        FlushReport {
            sequence: Some(sequence),
            path: Some(path),
            records: records.len(),
            units,
            status,
        }
    }

    /// First sequence at or after `next_sequence` with no file on disk
    fn free_slot(&self) -> (u32, PathBuf) {
        let mut sequence = self.next_sequence;
        loop {
            let path = self.data_dir.join(batch_file_name(sequence));
            if !path.exists() {
                return (sequence, path);
            }
            tracing::warn!("{} already exists, skipping its number", path.display());
            sequence += 1;
        }
    }
}

/// `posts_0007.csv`; widens past four digits as needed
pub fn batch_file_name(sequence: u32) -> String {
    format!("{}{:04}{}", BATCH_PREFIX, sequence, BATCH_SUFFIX)
}

fn parse_batch_sequence(file_name: &str) -> Option<u32> {
    file_name
        .strip_prefix(BATCH_PREFIX)?
        .strip_suffix(BATCH_SUFFIX)?
        .parse()
        .ok()
}

fn highest_sequence(data_dir: &Path) -> StorageResult<u32> {
    let mut highest = 0;
    for entry in fs::read_dir(data_dir)? {
        let entry = entry?;
        if let Some(sequence) = entry.file_name().to_str().and_then(parse_batch_sequence) {
            highest = highest.max(sequence);
        }
    }
    Ok(highest)
}

/// Writes the batch beside its final name, syncs it, then renames it in
fn write_batch(path: &Path, records: &[PostRecord]) -> StorageResult<()> {
    let file_name = path
        .file_name()
        .and_then(|n| n.to_str())
        .unwrap_or("batch");
    let tmp = path.with_file_name(format!(".{}.tmp", file_name));

    let result = write_synced(&tmp, records).and_then(|()| {
        if path.exists() {
            return Err(StorageError::Collision(path.display().to_string()));
        }
        fs::rename(&tmp, path)?;
        Ok(())
    });

    if result.is_err() {
        let _ = fs::remove_file(&tmp);
    }
    result
}

fn write_synced(path: &Path, records: &[PostRecord]) -> StorageResult<()> {
    let mut file = File::create(path)?;
    file.write_all(BOM.as_bytes())?;

    let mut writer = csv::Writer::from_writer(file);
    for record in records {
        writer.serialize(record)?;
    }
    let file = writer
        .into_inner()
        .map_err(|e| StorageError::Io(e.into_error()))?;
    file.sync_all()?;
    Ok(())
}
