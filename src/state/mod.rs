//! State module for work units and crawl progress
//!
//! # Components
//!
//! - `WorkUnit`: one schedulable item (`PageUnit` for discovery, `TopicUnit` for extraction)
//! - `UnitKey`: the identifier a unit is recorded under in its progress log
//! - `TopicRef` / `PostRecord`: the records each mode produces
//! - `UnitState`: lifecycle of a unit within a run

mod unit_state;
mod work_unit;

// Re-export main types
pub use unit_state::UnitState;
pub use work_unit::{PageUnit, PostRecord, TopicRef, TopicUnit, UnitKey, WorkUnit};
