//! SQLite run journal
//!
//! Records when runs started and finished, what they achieved, and which
//! batch files they flushed. Used by `--stats`.

use crate::storage::schema::initialize_schema;
use crate::storage::traits::StorageResult;
use crate::storage::{BatchRecord, RunMode, RunRecord, RunStatus};
use chrono::Utc;
use rusqlite::{params, Connection};
use std::path::Path;

/// SQLite journal backend
pub struct RunJournal {
    conn: Connection,
}

impl RunJournal {
    /// Opens or creates the journal database
    pub fn open(path: &Path) -> StorageResult<Self> {
        let conn = Connection::open(path)?;

        conn.execute_batch(
            "
            PRAGMA journal_mode = WAL;
            PRAGMA synchronous = NORMAL;
            PRAGMA foreign_keys = ON;
        ",
        )?;

        initialize_schema(&conn)?;

        Ok(Self { conn })
    }

    /// Creates an in-memory journal (for testing)
    #[cfg(test)]
    pub fn open_in_memory() -> StorageResult<Self> {
        let conn = Connection::open_in_memory()?;
        conn.execute_batch("PRAGMA foreign_keys = ON;")?;
        initialize_schema(&conn)?;
        Ok(Self { conn })
    }

    /// Starts a new run
    ///
    /// Runs of the same mode still marked running were cut short by a kill
    /// and are marked interrupted first.
    pub fn begin_run(&mut self, mode: RunMode, config_hash: &str) -> StorageResult<i64> {
        let interrupted = self.conn.execute(
            "UPDATE runs SET status = ?1 WHERE status = ?2 AND mode = ?3",
            params![
                RunStatus::Interrupted.to_db_string(),
                RunStatus::Running.to_db_string(),
                mode.as_str()
            ],
        )?;
        if interrupted > 0 {
            tracing::info!("Marked {} earlier {} run(s) as interrupted", interrupted, mode);
        }

        let now = Utc::now().to_rfc3339();
        self.conn.execute(
            "INSERT INTO runs (mode, started_at, config_hash, status) VALUES (?1, ?2, ?3, ?4)",
            params![
                mode.as_str(),
                now,
                config_hash,
                RunStatus::Running.to_db_string()
            ],
        )?;
        Ok(self.conn.last_insert_rowid())
    }

    /// Records a flushed batch
    pub fn record_batch(
        &mut self,
        run_id: i64,
        sequence: u32,
        path: &str,
        records: usize,
        units: usize,
    ) -> StorageResult<()> {
        let now = Utc::now().to_rfc3339();
        self.conn.execute(
            "INSERT INTO batches (run_id, sequence, path, records, units, flushed_at)
             VALUES (?1, ?2, ?3, ?4, ?5, ?6)",
            params![run_id, sequence, path, records as i64, units as i64, now],
        )?;
        Ok(())
    }

    /// Marks a run completed with its final counters
    pub fn finish_run(
        &mut self,
        run_id: i64,
        completed: u64,
        failed: u64,
        skipped: u64,
    ) -> StorageResult<()> {
        let now = Utc::now().to_rfc3339();
        self.conn.execute(
            "UPDATE runs SET status = ?1, finished_at = ?2, completed = ?3, failed = ?4, skipped = ?5
             WHERE id = ?6",
            params![
                RunStatus::Completed.to_db_string(),
                now,
                completed as i64,
                failed as i64,
                skipped as i64,
                run_id
            ],
        )?;
        Ok(())
    }

    /// All runs, oldest first
    pub fn runs(&self) -> StorageResult<Vec<RunRecord>> {
        let mut stmt = self.conn.prepare(
            "SELECT id, mode, started_at, finished_at, config_hash, status, completed, failed, skipped
             FROM runs ORDER BY id",
        )?;

        let rows = stmt.query_map([], |row| {
            Ok(RunRecord {
                id: row.get(0)?,
                mode: RunMode::from_db_string(&row.get::<_, String>(1)?)
                    .unwrap_or(RunMode::Extraction),
                started_at: row.get(2)?,
                finished_at: row.get(3)?,
                config_hash: row.get(4)?,
                status: RunStatus::from_db_string(&row.get::<_, String>(5)?)
                    .unwrap_or(RunStatus::Running),
                completed: row.get::<_, i64>(6)? as u64,
                failed: row.get::<_, i64>(7)? as u64,
                skipped: row.get::<_, i64>(8)? as u64,
            })
        })?;

        let mut runs = Vec::new();
        for run in rows {
            runs.push(run?);
        }
        Ok(runs)
    }

    /// Batches flushed by one run, in flush order
    pub fn batches(&self, run_id: i64) -> StorageResult<Vec<BatchRecord>> {
        let mut stmt = self.conn.prepare(
            "SELECT sequence, path, records, units, flushed_at FROM batches
             WHERE run_id = ?1 ORDER BY id",
        )?;

        let rows = stmt.query_map(params![run_id], |row| {
            Ok(BatchRecord {
                sequence: row.get(0)?,
                path: row.get(1)?,
                records: row.get::<_, i64>(2)? as u64,
                units: row.get::<_, i64>(3)? as u64,
                flushed_at: row.get(4)?,
            })
        })?;

        let mut batches = Vec::new();
        for batch in rows {
            batches.push(batch?);
        }
        Ok(batches)
    }
}
