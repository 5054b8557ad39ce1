//! Worker pool for running crawl jobs concurrently
//!
//! This module handles:
//! - A fixed number of workers pulling units from a shared bounded queue
//! - Delivering each unit's outcome to a single consumer in completion order
//! - Guaranteeing exactly one outcome per submitted unit, even if a job panics
//!
//! The consumer callback runs on the caller's task, so everything it touches
//! (the batch writer, the progress logs) is mutated by one writer at a time.

use crate::crawler::jobs::{CrawlJob, UnitOutcome};
use crate::state::UnitState;
use crate::HarvestError;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::Instant;
use tokio::sync::{mpsc, Mutex};
use tokio::task::JoinSet;

/// Outcomes between progress log lines
const PROGRESS_EVERY: usize = 50;

/// Counters gathered while a pool runs
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct PoolStats {
    pub submitted: usize,
    pub completed: usize,
    pub failed: usize,
    /// Highest number of units observed in flight at once
    pub peak_in_flight: usize,
}

/// Fixed-size pool of async workers
#[derive(Debug, Clone, Copy)]
pub struct WorkerPool {
    concurrency: usize,
}

impl WorkerPool {
    /// Creates a pool; a concurrency of 0 is treated as 1
    pub fn new(concurrency: usize) -> Self {
        Self {
            concurrency: concurrency.max(1),
        }
    }

    pub fn concurrency(&self) -> usize {
        self.concurrency
    }

    /// Runs `job` over every unit, calling `on_result` once per unit
    ///
    /// At most `concurrency` units are in flight. Outcomes arrive in the
    /// order units finish, not the order they were submitted; with a
    /// concurrency of 1 the two coincide.
    pub async fn run<J, I, F>(
        &self,
        job: Arc<J>,
        units: I,
        mut on_result: F,
    ) -> Result<PoolStats, HarvestError>
    where
        J: CrawlJob,
        I: Iterator<Item = J::Unit> + Send + 'static,
        F: FnMut(UnitOutcome<J::Unit, J::Output>),
    {
        let (task_tx, task_rx) = mpsc::channel::<J::Unit>(self.concurrency);
        let (result_tx, mut result_rx) =
            mpsc::channel::<UnitOutcome<J::Unit, J::Output>>(self.concurrency);
        let task_rx = Arc::new(Mutex::new(task_rx));
        let submitted = Arc::new(AtomicUsize::new(0));
        let in_flight = Arc::new(AtomicUsize::new(0));
        let peak = Arc::new(AtomicUsize::new(0));

        // Feed the queue lazily; the bounded channel keeps memory flat
        let producer = {
            let submitted = submitted.clone();
            tokio::spawn(async move {
                for unit in units {
                    if task_tx.send(unit).await.is_err() {
                        break;
                    }
                    submitted.fetch_add(1, Ordering::SeqCst);
                }
            })
        };

        let mut workers = JoinSet::new();
        for worker_id in 0..self.concurrency {
            let task_rx = task_rx.clone();
            let result_tx = result_tx.clone();
            let job = job.clone();
            let in_flight = in_flight.clone();
            let peak = peak.clone();

            workers.spawn(async move {
                loop {
                    let next = { task_rx.lock().await.recv().await };
                    let Some(unit) = next else {
                        break;
                    };

                    let now = in_flight.fetch_add(1, Ordering::SeqCst) + 1;
                    peak.fetch_max(now, Ordering::SeqCst);
                    tracing::trace!(
                        "worker {}: {:?} {} -> {}",
                        worker_id,
                        unit,
                        UnitState::Pending,
                        UnitState::Running
                    );

                    let outcome = run_isolated(job.clone(), unit).await;
                    in_flight.fetch_sub(1, Ordering::SeqCst);
                    debug_assert!(UnitState::Running.can_transition_to(outcome.state()));

                    if result_tx.send(outcome).await.is_err() {
                        break;
                    }
                }
            });
        }
        drop(result_tx);

        let mut stats = PoolStats::default();
        let started = Instant::now();
        while let Some(outcome) = result_rx.recv().await {
            match outcome.state() {
                UnitState::Completed => stats.completed += 1,
                _ => stats.failed += 1,
            }
            on_result(outcome);

            let done = stats.completed + stats.failed;
            if done % PROGRESS_EVERY == 0 {
                tracing::info!(
                    "Progress: {} units done ({} failed), {:.2} units/sec",
                    done,
                    stats.failed,
                    done as f64 / started.elapsed().as_secs_f64().max(f64::EPSILON)
                );
            }
        }

        while let Some(joined) = workers.join_next().await {
            if let Err(e) = joined {
                return Err(HarvestError::Pool(format!("worker task failed: {}", e)));
            }
        }
        producer
            .await
            .map_err(|e| HarvestError::Pool(format!("task producer failed: {}", e)))?;

        stats.submitted = submitted.load(Ordering::SeqCst);
        stats.peak_in_flight = peak.load(Ordering::SeqCst);
        Ok(stats)
    }
}

/// Runs one unit on its own task so a panicking job still yields an outcome
async fn run_isolated<J: CrawlJob>(job: Arc<J>, unit: J::Unit) -> UnitOutcome<J::Unit, J::Output> {
    let task_unit = unit.clone();
    let handle = tokio::spawn(async move { job.process(&task_unit).await });

    match handle.await {
        Ok(Ok(output)) => UnitOutcome::Completed { unit, output },
        Ok(Err(error)) => UnitOutcome::Failed {
            unit,
            reason: error.to_string(),
        },
        Err(join_error) => UnitOutcome::Failed {
            unit,
            reason: format!("job aborted: {}", join_error),
        },
    }
}
