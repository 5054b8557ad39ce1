//! Crawler module for fetching and processing forum pages
//!
//! This module contains the core crawling logic, including:
//! - HTTP fetching with retry and identity rotation
//! - Politeness delays between requests
//! - Task sources that skip already-completed units
//! - A bounded worker pool and the per-unit jobs it runs
//! - Overall run coordination

mod coordinator;
mod fetcher;
mod governor;
mod jobs;
mod retry;
mod scheduler;
mod task_source;

pub use coordinator::{CrawlContext, Harvester, RunPlan};
pub use fetcher::{build_http_client, Document, FetchRequest, Fetcher, HttpFetcher};
pub use governor::PolitenessGovernor;
pub use jobs::{CrawlJob, DiscoveryJob, TopicHarvest, TopicJob, UnitOutcome};
pub use retry::{IdentityPool, RetryPolicy, DEFAULT_USER_AGENT};
pub use scheduler::{PoolStats, WorkerPool};
pub use task_source::TaskSource;
