//! Per-unit pipelines
//!
//! A job turns one work unit into its output: fetch with retry, pause,
//! extract. The pause follows every request whether or not it succeeded. Discovery and extraction share the retry policy, governor, and
//! pool; they differ only in the unit they take and what they extract.

use crate::crawler::coordinator::CrawlContext;
use crate::state::{PageUnit, PostRecord, TopicRef, TopicUnit, UnitState, WorkUnit};
use crate::FetchError;
use async_trait::async_trait;
use std::sync::Arc;

/// Work performed for each unit of one crawl mode
#[async_trait]
pub trait CrawlJob: Send + Sync + 'static {
    type Unit: WorkUnit;
    type Output: Send + 'static;

    /// Processes one unit; an error means the unit is not complete
    async fn process(&self, unit: &Self::Unit) -> Result<Self::Output, FetchError>;
}

/// What the pool reports for a unit
#[derive(Debug)]
pub enum UnitOutcome<U, O> {
    Completed { unit: U, output: O },
    /// No records travel with a failure; the unit is simply not done
    Failed { unit: U, reason: String },
}

impl<U, O> UnitOutcome<U, O> {
    pub fn unit(&self) -> &U {
        match self {
            Self::Completed { unit, .. } | Self::Failed { unit, .. } => unit,
        }
    }

    pub fn state(&self) -> UnitState {
        match self {
            Self::Completed { .. } => UnitState::Completed,
            Self::Failed { .. } => UnitState::Failed,
        }
    }
}

/// Scans one listing page for topic links
pub struct DiscoveryJob {
    ctx: Arc<CrawlContext>,
}

impl DiscoveryJob {
    pub fn new(ctx: Arc<CrawlContext>) -> Self {
        Self { ctx }
    }
}

#[async_trait]
impl CrawlJob for DiscoveryJob {
    type Unit = PageUnit;
    type Output = Vec<TopicRef>;

    async fn process(&self, unit: &PageUnit) -> Result<Vec<TopicRef>, FetchError> {
        let url = self.ctx.config.site.listing_page_url(unit.page_number);
        let fetched = self.ctx.retry.fetch(self.ctx.fetcher.as_ref(), &url).await;
        // The worker pauses after every request, including a failed one
        self.ctx.governor.pause().await;

        let doc = fetched?;
        Ok(self.ctx.extractor.extract_topic_refs(&doc))
    }
}

/// Every post of one topic
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TopicHarvest {
    pub pages: u32,
    pub posts: Vec<PostRecord>,
}

/// Fetches all pages of one topic, in order
///
/// Page 1 tells how many pages there are, so pages are fetched strictly
/// ascending within the unit. If any page exhausts its retries the whole
/// topic fails and a later run starts it again from page 1.
pub struct TopicJob {
    ctx: Arc<CrawlContext>,
}

impl TopicJob {
    pub fn new(ctx: Arc<CrawlContext>) -> Self {
        Self { ctx }
    }
}

#[async_trait]
impl CrawlJob for TopicJob {
    type Unit = TopicUnit;
    type Output = TopicHarvest;

    async fn process(&self, unit: &TopicUnit) -> Result<TopicHarvest, FetchError> {
        let ctx = &self.ctx;
        let fetched = ctx.retry.fetch(ctx.fetcher.as_ref(), &unit.url).await;
        ctx.governor.pause().await;
        let first = fetched?;

        let pages = ctx.extractor.extract_page_count(&first);
        let mut posts = ctx
            .extractor
            .extract_posts(&first, &unit.title, &unit.url, 1);
        drop(first);

        for page in 2..=pages {
            let url = ctx.config.site.topic_page_url(&unit.url, page);
            let fetched = ctx.retry.fetch(ctx.fetcher.as_ref(), &url).await;
            ctx.governor.pause().await;
            match fetched {
                Ok(doc) => {
                    posts.extend(
                        ctx.extractor
                            .extract_posts(&doc, &unit.title, &unit.url, page),
                    );
                }
                Err(e) => {
                    tracing::error!(
                        "Topic {} failed at page {}/{}; discarding {} posts",
                        unit.url,
                        page,
                        pages,
                        posts.len()
                    );
                    return Err(e);
                }
            }
        }

        Ok(TopicHarvest { pages, posts })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::crawler::retry::testing::ScriptedFetcher;
    use crate::crawler::coordinator::tests::{paced_context, test_context};
    use std::time::{Duration, Instant};

    const TOPIC: &str = "https://forum.example/threads/vnindex.7/";

    fn message(text: &str) -> String {
        format!(
            r#"<div class="messageInfo"><a class="datePermalink">1/1/24</a><blockquote class="messageText">{}</blockquote></div>"#,
            text
        )
    }

    fn topic_page(total: u32, messages: &[&str]) -> String {
        let body: String = messages.iter().map(|m| message(m)).collect();
        format!(
            r#"<html><body><span class="pageNavHeader">Trang 1/{}</span>{}</body></html>"#,
            total, body
        )
    }

    fn unit() -> TopicUnit {
        TopicUnit {
            url: TOPIC.to_string(),
            title: "VNINDEX".to_string(),
        }
    }

    #[tokio::test]
    async fn test_topic_pages_fetched_in_order() {
        let fetcher = Arc::new(ScriptedFetcher::default());
        fetcher.script(TOPIC, vec![Ok(topic_page(3, &["p1a", "p1b"]).as_str())]);
        fetcher.script(&format!("{}page-2", TOPIC), vec![Ok(topic_page(3, &["p2"]).as_str())]);
        fetcher.script(&format!("{}page-3", TOPIC), vec![Ok(topic_page(3, &["p3"]).as_str())]);

        let job = TopicJob::new(test_context(fetcher.clone(), 3));
        let harvest = job.process(&unit()).await.unwrap();

        assert_eq!(harvest.pages, 3);
        let pages: Vec<u32> = harvest.posts.iter().map(|p| p.page).collect();
        assert_eq!(pages, vec![1, 1, 2, 3]);
        assert_eq!(harvest.posts[2].content, "p2");
        assert!(harvest.posts.iter().all(|p| p.topic_url == TOPIC));

        let urls: Vec<String> = fetcher
            .requests
            .lock()
            .unwrap()
            .iter()
            .map(|r| r.url.clone())
            .collect();
        assert_eq!(
            urls,
            vec![
                TOPIC.to_string(),
                format!("{}page-2", TOPIC),
                format!("{}page-3", TOPIC)
            ]
        );
    }

    #[tokio::test]
    async fn test_failed_middle_page_fails_topic() {
        let fetcher = Arc::new(ScriptedFetcher::default());
        fetcher.script(TOPIC, vec![Ok(topic_page(3, &["p1"]).as_str())]);
        fetcher.script(&format!("{}page-2", TOPIC), vec![Err(503)]);
        fetcher.script(&format!("{}page-3", TOPIC), vec![Ok(topic_page(3, &["p3"]).as_str())]);

        let job = TopicJob::new(test_context(fetcher.clone(), 2));
        let err = job.process(&unit()).await.unwrap_err();

        assert!(err.is_exhausted());
        assert_eq!(fetcher.calls_to(&format!("{}page-2", TOPIC)), 2);
        assert_eq!(fetcher.calls_to(&format!("{}page-3", TOPIC)), 0);
    }

    #[tokio::test]
    async fn test_discovery_job_reads_listing_page() {
        let fetcher = Arc::new(ScriptedFetcher::default());
        fetcher.script(
            "https://forum.example/forums/market.3/page-4",
            vec![Ok(r#"<h3 class="title"><a href="threads/a.1/">A</a></h3>"#)],
        );

        let job = DiscoveryJob::new(test_context(fetcher, 1));
        let topics = job.process(&PageUnit::new(4)).await.unwrap();
        assert_eq!(
            topics,
            vec![TopicRef::new("https://forum.example/threads/a.1/", "A")]
        );
    }

    #[tokio::test]
    async fn test_failed_listing_page_still_pauses() {
        let fetcher = Arc::new(ScriptedFetcher::default());
        fetcher.script("https://forum.example/forums/market.3/page-4", vec![Err(503)]);

        let job = DiscoveryJob::new(paced_context(fetcher.clone(), 1, 60));
        let started = Instant::now();
        let err = job.process(&PageUnit::new(4)).await.unwrap_err();

        assert!(err.is_exhausted());
        assert!(started.elapsed() >= Duration::from_millis(60));
    }

    #[tokio::test]
    async fn test_failed_topic_pauses_after_every_request() {
        let fetcher = Arc::new(ScriptedFetcher::default());
        fetcher.script(TOPIC, vec![Ok(topic_page(2, &["p1"]).as_str())]);
        fetcher.script(&format!("{}page-2", TOPIC), vec![Err(503)]);

        let job = TopicJob::new(paced_context(fetcher.clone(), 1, 60));
        let started = Instant::now();
        assert!(job.process(&unit()).await.is_err());

        // One pause after page 1 and one after the failed page 2
        assert_eq!(fetcher.requests.lock().unwrap().len(), 2);
        assert!(started.elapsed() >= Duration::from_millis(120));
    }

    #[tokio::test]
    async fn test_unreachable_first_page_still_pauses() {
        let fetcher = Arc::new(ScriptedFetcher::default());
        fetcher.script(TOPIC, vec![Err(500)]);

        let job = TopicJob::new(paced_context(fetcher.clone(), 1, 60));
        let started = Instant::now();
        assert!(job.process(&unit()).await.is_err());
        assert!(started.elapsed() >= Duration::from_millis(60));
    }
}
