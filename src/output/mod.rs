//! Output module for everything a run produces
//!
//! This module handles:
//! - Numbered CSV batches of extracted posts
//! - The `url,title` topic list written by discovery and read by extraction
//! - Run summaries and journal statistics

pub mod batch;
pub mod stats;
mod topic_list;

/// Leading byte-order mark on every CSV this crate creates
pub(crate) const BOM: &str = "\u{feff}";

pub use batch::{batch_file_name, BatchWriter, FlushReport, FlushStatus};
pub use stats::{load_journal, print_journal, print_run_summary, JournalEntry, RunSummary};
pub use topic_list::{load_topic_list, TopicListWriter};
