use rand::Rng;
use serde::Deserialize;
use std::time::Duration;

/// Main configuration structure for Forum-Harvest
#[derive(Debug, Clone, Deserialize)]
pub struct Config {
    pub crawler: CrawlerConfig,
    pub site: SiteConfig,
    pub output: OutputConfig,
    #[serde(default)]
    pub identity: IdentityConfig,
}

/// Crawler behavior configuration
#[derive(Debug, Clone, Deserialize)]
pub struct CrawlerConfig {
    /// First listing page to discover (inclusive)
    #[serde(rename = "start-page")]
    pub start_page: u32,

    /// Last listing page to discover (inclusive)
    #[serde(rename = "end-page")]
    pub end_page: u32,

    /// Number of work units processed in parallel
    #[serde(rename = "max-concurrency")]
    pub max_concurrency: u32,

    /// Number of posts per output batch
    #[serde(rename = "batch-size")]
    pub batch_size: usize,

    /// Attempts per request before a unit is given up on
    #[serde(rename = "max-attempts")]
    pub max_attempts: u32,

    /// Per-request timeout (seconds)
    #[serde(rename = "request-timeout-secs")]
    pub request_timeout_secs: u64,

    /// Pause between a worker's successive requests
    #[serde(rename = "inter-request-delay")]
    pub inter_request_delay: DelayRange,

    /// Pause between failed attempts of the same request
    #[serde(rename = "retry-backoff")]
    pub retry_backoff: DelayRange,
}

/// An inclusive `[min, max]` interval in milliseconds
#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize)]
pub struct DelayRange {
    #[serde(rename = "min-ms")]
    pub min_ms: u64,

    #[serde(rename = "max-ms")]
    pub max_ms: u64,
}

impl DelayRange {
    pub const ZERO: DelayRange = DelayRange {
        min_ms: 0,
        max_ms: 0,
    };

    pub fn new(min_ms: u64, max_ms: u64) -> Self {
        Self { min_ms, max_ms }
    }

    /// Draws a duration uniformly from the interval
    pub fn sample(&self) -> Duration {
        if self.max_ms <= self.min_ms {
            return Duration::from_millis(self.min_ms);
        }
        let ms = rand::thread_rng().gen_range(self.min_ms..=self.max_ms);
        Duration::from_millis(ms)
    }
}

/// Site-specific addressing
#[derive(Debug, Clone, Deserialize)]
pub struct SiteConfig {
    /// Base URL that relative topic links are resolved against
    #[serde(rename = "base-url")]
    pub base_url: String,

    /// Listing page URL template; `{page}` is replaced by the page number
    #[serde(rename = "listing-url")]
    pub listing_url: String,

    /// Suffix appended to a topic URL to address page 2 and beyond
    #[serde(rename = "topic-page-suffix")]
    pub topic_page_suffix: String,
}

impl SiteConfig {
    /// URL of the forum listing page `page`
    pub fn listing_page_url(&self, page: u32) -> String {
        self.listing_url.replace("{page}", &page.to_string())
    }

    /// URL of page `page` of the topic at `topic_url`
    ///
    /// Page 1 is the topic URL itself.
    pub fn topic_page_url(&self, topic_url: &str, page: u32) -> String {
        if page <= 1 {
            topic_url.to_string()
        } else {
            format!(
                "{}{}",
                topic_url,
                self.topic_page_suffix.replace("{page}", &page.to_string())
            )
        }
    }
}

/// Output configuration
#[derive(Debug, Clone, Deserialize)]
pub struct OutputConfig {
    /// Discovered topic list (`url,title`); read by extraction mode
    #[serde(rename = "topic-list")]
    pub topic_list: String,

    /// Directory receiving the numbered post batches
    #[serde(rename = "data-dir")]
    pub data_dir: String,

    /// Completed listing pages
    #[serde(rename = "pages-progress")]
    pub pages_progress: String,

    /// Listing pages that exhausted their retries
    #[serde(rename = "pages-failed")]
    pub pages_failed: String,

    /// Completed topic URLs
    #[serde(rename = "topics-progress")]
    pub topics_progress: String,

    /// Topics that exhausted their retries
    #[serde(rename = "topics-failed")]
    pub topics_failed: String,

    /// Optional SQLite run journal
    #[serde(rename = "journal-path", default)]
    pub journal_path: Option<String>,
}

/// Client identities rotated across requests
#[derive(Debug, Clone, Default, Deserialize)]
pub struct IdentityConfig {
    #[serde(rename = "user-agents", default)]
    pub user_agents: Vec<String>,
}
