//! Run summaries and journal statistics
//!
//! This module provides the end-of-run summary and the `--stats` report
//! built from the run journal.

use crate::storage::{RunJournal, RunMode, RunRecord, StorageResult};
use std::time::Duration;

/// Counts reported at the end of a run
#[derive(Debug, Clone, PartialEq)]
pub struct RunSummary {
    pub mode: RunMode,

    /// Units in the configured range or topic list
    pub total: usize,

    /// Units completed and recorded in this run
    pub completed: usize,

    /// Units that exhausted retries or whose output could not be persisted
    pub failed: usize,

    /// Units already completed by an earlier run
    pub skipped: usize,

    /// Topic rows or post records durably written
    pub records: usize,

    /// Batch files written
    pub batches: usize,

    /// Flushes or appends that failed to persist
    pub persistence_failures: usize,

    pub elapsed: Duration,
}

impl RunSummary {
    pub fn new(mode: RunMode, total: usize, skipped: usize) -> Self {
        Self {
            mode,
            total,
            completed: 0,
            failed: 0,
            skipped,
            records: 0,
            batches: 0,
            persistence_failures: 0,
            elapsed: Duration::ZERO,
        }
    }

    /// Units neither completed nor skipped
    pub fn outstanding(&self) -> usize {
        self.total.saturating_sub(self.completed + self.skipped)
    }

    /// Returns true if every unit is now done
    pub fn is_clean(&self) -> bool {
        self.failed == 0 && self.outstanding() == 0
    }

    /// Writes the summary to the log
    pub fn log(&self) {
        tracing::info!(
            "{} run finished in {:.1?}: {} completed, {} failed, {} skipped, {} records",
            self.mode,
            self.elapsed,
            self.completed,
            self.failed,
            self.skipped,
            self.records
        );
        if self.persistence_failures > 0 {
            tracing::error!(
                "{} persistence failures; affected units will be redone next run",
                self.persistence_failures
            );
        }
    }
}

/// Prints a run summary to stdout
pub fn print_run_summary(summary: &RunSummary) {
    println!("=== {} summary ===\n", summary.mode);
    println!("  Total units: {}", summary.total);
    println!("  Completed:   {}", summary.completed);
    println!("  Failed:      {}", summary.failed);
    println!("  Skipped:     {}", summary.skipped);
    println!("  Outstanding: {}", summary.outstanding());
    match summary.mode {
        RunMode::Discovery => println!("  Topics saved: {}", summary.records),
        RunMode::Extraction => {
            println!("  Posts saved: {}", summary.records);
            println!("  Batches:     {}", summary.batches);
        }
    }
    if summary.persistence_failures > 0 {
        println!("  Persistence failures: {}", summary.persistence_failures);
    }
    println!("  Elapsed:     {:.1?}", summary.elapsed);
}

/// Totals for one journaled run
#[derive(Debug, Clone)]
pub struct JournalEntry {
    pub run: RunRecord,
    pub batches: usize,
    pub records: u64,
}

/// Loads every run with its batch totals, oldest first
pub fn load_journal(journal: &RunJournal) -> StorageResult<Vec<JournalEntry>> {
    journal
        .runs()?
        .into_iter()
        .map(|run| {
            let batches = journal.batches(run.id)?;
            Ok(JournalEntry {
                records: batches.iter().map(|b| b.records).sum(),
                batches: batches.len(),
                run,
            })
        })
        .collect()
}

/// Prints the journal in a formatted manner
pub fn print_journal(entries: &[JournalEntry]) {
    println!("=== Run Journal ===\n");
    if entries.is_empty() {
        println!("No runs recorded.");
        return;
    }

    for entry in entries {
        let run = &entry.run;
        println!(
            "Run {} [{}] {}",
            run.id,
            run.mode,
            run.status.to_db_string()
        );
        println!(
            "  Started: {}  Finished: {}",
            run.started_at,
            run.finished_at.as_deref().unwrap_or("-")
        );
        println!(
            "  Completed: {}  Failed: {}  Skipped: {}",
            run.completed, run.failed, run.skipped
        );
        if entry.batches > 0 {
            println!(
                "  Batches: {} ({} records)",
                entry.batches, entry.records
            );
        }
    }

    let batches: usize = entries.iter().map(|e| e.batches).sum();
    let records: u64 = entries.iter().map(|e| e.records).sum();
    println!(
        "\nTotal: {} runs, {} batches, {} records",
        entries.len(),
        batches,
        records
    );
}
