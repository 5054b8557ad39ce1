//! Unit state definitions for tracking crawl progress
//!
//! A unit moves `Pending -> Running -> Completed | Failed`. Units the
//! progress log already holds are never enumerated, so they have no state.

use std::fmt;

/// Represents the current state of a work unit
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum UnitState {
    /// Enumerated and waiting for a worker
    Pending,

    /// A worker is fetching it
    Running,

    /// Fetched, extracted, and handed to the writer
    Completed,

    /// Retries exhausted or output could not be persisted
    Failed,
}

impl UnitState {
    /// Returns true if the state may legally follow `self`
    pub fn can_transition_to(&self, next: UnitState) -> bool {
        matches!(
            (self, next),
            (Self::Pending, Self::Running)
                | (Self::Running, Self::Completed)
                | (Self::Running, Self::Failed)
        )
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Pending => "pending",
            Self::Running => "running",
            Self::Completed => "completed",
            Self::Failed => "failed",
        }
    }
}

impl fmt::Display for UnitState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}
