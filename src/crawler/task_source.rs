//! Task sources: the frontier of units still to do
//!
//! The completed set is consulted once, when the source is built. Units
//! recorded in the progress log never come out again, so re-enumerating
//! after a crash yields a subset of the original sequence.

use crate::state::{PageUnit, TopicRef, TopicUnit};
use std::collections::HashSet;

/// A lazy, finite sequence of units with resume bookkeeping
pub struct TaskSource<U> {
    pending: Box<dyn Iterator<Item = U> + Send>,
    total: usize,
    skipped: usize,
}

impl TaskSource<PageUnit> {
    /// Listing pages in `[start, end]` that are not yet completed
    pub fn pages(start: u32, end: u32, completed: &HashSet<u32>) -> Self {
        let total = if end >= start {
            (end - start) as usize + 1
        } else {
            0
        };
        let skipped = completed
            .iter()
            .filter(|&&p| p >= start && p <= end)
            .count();

        let done = completed.clone();
        let pending = (start..=end).filter_map(move |page| {
            if done.contains(&page) {
                tracing::debug!("[SKIP] page {} already done", page);
                None
            } else {
                Some(PageUnit::new(page))
            }
        });

        TaskSource {
            pending: Box::new(pending),
            total,
            skipped,
        }
    }
}

impl TaskSource<TopicUnit> {
    /// Topics from the list whose URL is not yet completed
    pub fn topics(list: Vec<TopicRef>, completed: &HashSet<String>) -> Self {
        let total = list.len();
        let pending: Vec<TopicUnit> = list
            .into_iter()
            .filter(|topic| !completed.contains(&topic.url))
            .map(TopicUnit::from)
            .collect();
        let skipped = total - pending.len();

        TaskSource {
            pending: Box::new(pending.into_iter()),
            total,
            skipped,
        }
    }
}

impl<U> TaskSource<U> {
    /// Units in the full range or list, done or not
    pub fn total(&self) -> usize {
        self.total
    }

    /// Units left out because an earlier run completed them
    pub fn skipped(&self) -> usize {
        self.skipped
    }

    /// Units this source will produce
    pub fn remaining(&self) -> usize {
        self.total - self.skipped
    }
}

impl<U> Iterator for TaskSource<U> {
    type Item = U;

    fn next(&mut self) -> Option<U> {
        self.pending.next()
    }
}
