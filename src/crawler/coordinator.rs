//! Harvest coordinator - run orchestration
//!
//! This module ties the pieces of a run together:
//! - Opening the progress store, failure log, and optional journal
//! - Building the task source from what earlier runs completed
//! - Driving the worker pool and persisting each outcome
//! - Producing the final run summary

use crate::config::Config;
use crate::crawler::fetcher::{build_http_client, Fetcher, HttpFetcher};
use crate::crawler::governor::PolitenessGovernor;
use crate::crawler::jobs::{DiscoveryJob, TopicJob, UnitOutcome};
use crate::crawler::retry::{IdentityPool, RetryPolicy};
use crate::crawler::scheduler::WorkerPool;
use crate::crawler::task_source::TaskSource;
use crate::extractor::{PageExtractor, XenForoExtractor};
use crate::output::{
    batch_file_name, load_topic_list, BatchWriter, FlushReport, FlushStatus, RunSummary,
    TopicListWriter,
};
use crate::state::WorkUnit;
use crate::storage::{FailureLog, ProgressLog, ProgressStore, RunJournal, RunMode};
use crate::{ConfigError, HarvestError};
use std::path::Path;
use std::sync::Arc;
use std::time::Instant;
use url::Url;

/// Everything a job needs, shared by all workers
pub struct CrawlContext {
    pub config: Arc<Config>,
    pub fetcher: Arc<dyn Fetcher>,
    pub extractor: Arc<dyn PageExtractor>,
    pub retry: RetryPolicy,
    pub governor: PolitenessGovernor,
}

impl CrawlContext {
    pub fn new(
        config: Arc<Config>,
        fetcher: Arc<dyn Fetcher>,
        extractor: Arc<dyn PageExtractor>,
    ) -> Self {
        let crawler = &config.crawler;
        let retry = RetryPolicy::new(
            crawler.max_attempts,
            crawler.retry_backoff,
            IdentityPool::new(config.identity.user_agents.clone()),
        );
        let governor = PolitenessGovernor::new(crawler.inter_request_delay);

        Self {
            config,
            fetcher,
            extractor,
            retry,
            governor,
        }
    }
}

/// What a run would do, computed without touching the network
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RunPlan {
    pub mode: RunMode,
    pub total: usize,
    pub skipped: usize,
}

impl RunPlan {
    pub fn remaining(&self) -> usize {
        self.total - self.skipped
    }
}

/// Main harvest coordinator
pub struct Harvester {
    ctx: Arc<CrawlContext>,
    config_hash: String,
}

impl Harvester {
    /// Creates a harvester talking to the configured site over HTTP
    ///
    /// # Arguments
    ///
    /// * `config` - A validated configuration
    ///
    /// # Returns
    ///
    /// * `Ok(Harvester)` - Ready to run either mode
    /// * `Err(HarvestError)` - The base URL or HTTP client could not be set up
    pub fn new(config: Config) -> Result<Self, HarvestError> {
        let base_url = Url::parse(&config.site.base_url).map_err(|e| {
            ConfigError::InvalidUrl(format!("{}: {}", config.site.base_url, e))
        })?;
        let client = build_http_client(&config.crawler)?;

        Ok(Self::with_components(
            config,
            Arc::new(HttpFetcher::new(client)),
            Arc::new(XenForoExtractor::new(base_url)),
        ))
    }

    /// Creates a harvester with a caller-supplied fetcher and extractor
    pub fn with_components(
        config: Config,
        fetcher: Arc<dyn Fetcher>,
        extractor: Arc<dyn PageExtractor>,
    ) -> Self {
        Self {
            ctx: Arc::new(CrawlContext::new(Arc::new(config), fetcher, extractor)),
            config_hash: String::new(),
        }
    }

    /// Sets the config hash stored with journaled runs
    pub fn with_config_hash(mut self, hash: impl Into<String>) -> Self {
        self.config_hash = hash.into();
        self
    }

    pub fn config(&self) -> &Config {
        &self.ctx.config
    }

    /// Runs the given mode to completion
    pub async fn run(&self, mode: RunMode) -> Result<RunSummary, HarvestError> {
        match mode {
            RunMode::Discovery => self.run_discovery().await,
            RunMode::Extraction => self.run_extraction().await,
        }
    }

    /// Counts the units a run would process, reading only local state
    pub fn plan(&self, mode: RunMode) -> Result<RunPlan, HarvestError> {
        let config = &self.ctx.config;
        let (total, skipped) = match mode {
            RunMode::Discovery => {
                let progress = ProgressLog::<u32>::open(&config.output.pages_progress)?;
                let source = TaskSource::pages(
                    config.crawler.start_page,
                    config.crawler.end_page,
                    progress.completed(),
                );
                (source.total(), source.skipped())
            }
            RunMode::Extraction => {
                let topics = load_topic_list(&config.output.topic_list)?;
                let progress = ProgressLog::<String>::open(&config.output.topics_progress)?;
                let source = TaskSource::topics(topics, progress.completed());
                (source.total(), source.skipped())
            }
        };
        Ok(RunPlan {
            mode,
            total,
            skipped,
        })
    }

    /// Walks the listing pages and appends every topic found to the list
    ///
    /// A page is recorded as done only after its topics are on disk.
    pub async fn run_discovery(&self) -> Result<RunSummary, HarvestError> {
        let config = self.ctx.config.clone();
        let output = &config.output;
        let started = Instant::now();

        let mut progress = ProgressLog::<u32>::open(&output.pages_progress)?;
        let failures = FailureLog::new(&output.pages_failed);
        let mut topic_list = TopicListWriter::open(&output.topic_list)?;

        let source = TaskSource::pages(
            config.crawler.start_page,
            config.crawler.end_page,
            progress.completed(),
        );
        tracing::info!(
            "Discovery: {} of {} pages to do ({} already completed)",
            source.remaining(),
            source.total(),
            source.skipped()
        );

        let mut summary = RunSummary::new(RunMode::Discovery, source.total(), source.skipped());
        let mut journal = JournalSession::begin(
            output.journal_path.as_deref(),
            RunMode::Discovery,
            &self.config_hash,
        );

        let pool = WorkerPool::new(config.crawler.max_concurrency as usize);
        let job = Arc::new(DiscoveryJob::new(self.ctx.clone()));

        pool.run(job, source, |outcome| match outcome {
            UnitOutcome::Completed { unit, output: topics } => {
                let saved = topic_list
                    .append(&topics)
                    .and_then(|()| progress.record(&[unit.key()]));
                match saved {
                    Ok(()) => {
                        tracing::info!("{}: {} topics saved", unit, topics.len());
                        summary.completed += 1;
                        summary.records += topics.len();
                    }
                    Err(e) => {
                        tracing::error!("{}: could not persist topics: {}", unit, e);
                        summary.failed += 1;
                        summary.persistence_failures += 1;
                        note_failure(&failures, &unit.key(), &format!("persistence: {}", e));
                    }
                }
            }
            UnitOutcome::Failed { unit, reason } => {
                tracing::error!("{} failed: {}", unit, reason);
                summary.failed += 1;
                note_failure(&failures, &unit.key(), &reason);
            }
        })
        .await?;

        summary.elapsed = started.elapsed();
        if let Some(journal) = journal.as_mut() {
            journal.finish(&summary);
        }
        summary.log();
        Ok(summary)
    }

    /// Fetches every pending topic and writes its posts in batches
    ///
    /// Fails before any request if the topic list is missing or malformed.
    pub async fn run_extraction(&self) -> Result<RunSummary, HarvestError> {
        let config = self.ctx.config.clone();
        let output = &config.output;
        let started = Instant::now();

        let topics = load_topic_list(&output.topic_list)?;
        let progress = ProgressLog::<String>::open(&output.topics_progress)?;
        let failures = FailureLog::new(&output.topics_failed);

        let source = TaskSource::topics(topics, progress.completed());
        tracing::info!(
            "Extraction: {} of {} topics to do ({} already completed)",
            source.remaining(),
            source.total(),
            source.skipped()
        );

        let mut writer = BatchWriter::open(
            &output.data_dir,
            config.crawler.batch_size,
            Box::new(progress),
        )?;
        tracing::info!(
            "Next batch: {}",
            Path::new(&output.data_dir)
                .join(batch_file_name(writer.next_sequence()))
                .display()
        );
        let mut summary = RunSummary::new(RunMode::Extraction, source.total(), source.skipped());
        let mut journal = JournalSession::begin(
            output.journal_path.as_deref(),
            RunMode::Extraction,
            &self.config_hash,
        );

        let pool = WorkerPool::new(config.crawler.max_concurrency as usize);
        let job = Arc::new(TopicJob::new(self.ctx.clone()));

        pool.run(job, source, |outcome| match outcome {
            UnitOutcome::Completed { unit, output: harvest } => {
                tracing::info!(
                    "{}: {} pages, {} posts",
                    unit,
                    harvest.pages,
                    harvest.posts.len()
                );
                for report in writer.accept(unit.key(), harvest.posts) {
                    settle_flush(report, &mut summary, &failures, journal.as_mut());
                }
            }
            UnitOutcome::Failed { unit, reason } => {
                tracing::error!("{} failed: {}", unit, reason);
                summary.failed += 1;
                note_failure(&failures, &unit.key(), &reason);
            }
        })
        .await?;

        if let Some(report) = writer.finish() {
            settle_flush(report, &mut summary, &failures, journal.as_mut());
        }

        summary.elapsed = started.elapsed();
        if let Some(journal) = journal.as_mut() {
            journal.finish(&summary);
        }
        summary.log();
        Ok(summary)
    }
}

/// Applies one flush outcome to the summary, failure log, and journal
fn settle_flush(
    report: FlushReport,
    summary: &mut RunSummary,
    failures: &FailureLog,
    journal: Option<&mut JournalSession>,
) {
    match &report.status {
        FlushStatus::Committed => {
            summary.completed += report.units.len();
            summary.records += report.records;
            if let (Some(sequence), Some(path)) = (report.sequence, report.path.as_deref()) {
                summary.batches += 1;
                tracing::info!(
                    "Saved batch {} ({} posts, {} topics) to {}",
                    sequence,
                    report.records,
                    report.units.len(),
                    path.display()
                );
                if let Some(journal) = journal {
                    journal.record_batch(sequence, path, report.records, report.units.len());
                }
            } else {
                tracing::info!("Marked {} topics with no posts as done", report.units.len());
            }
        }
        FlushStatus::WriteFailed(e) | FlushStatus::MarkFailed(e) => {
            tracing::error!(
                "Batch of {} posts not persisted ({} topics left for next run): {}",
                report.records,
                report.units.len(),
                e
            );
            summary.failed += report.units.len();
            summary.persistence_failures += 1;
            let reason = format!("batch not persisted: {}", e);
            for unit in &report.units {
                note_failure(failures, unit, &reason);
            }
        }
    }
}

fn note_failure(failures: &FailureLog, key: &impl std::fmt::Display, reason: &str) {
    if let Err(e) = failures.record(key, reason) {
        tracing::warn!(
            "Could not write {} to {}: {}",
            key,
            failures.path().display(),
            e
        );
    }
}

/// An open journal and the run being recorded in it
///
/// Journal errors are logged and otherwise ignored; they never change what
/// counts as complete.
struct JournalSession {
    journal: RunJournal,
    run_id: i64,
}

impl JournalSession {
    fn begin(path: Option<&str>, mode: RunMode, config_hash: &str) -> Option<Self> {
        let path = path?;
        let opened = RunJournal::open(Path::new(path)).and_then(|mut journal| {
            let run_id = journal.begin_run(mode, config_hash)?;
            Ok(Self { journal, run_id })
        });
        match opened {
            Ok(session) => {
                tracing::debug!("Journaling run {} to {}", session.run_id, path);
                Some(session)
            }
            Err(e) => {
                tracing::warn!("Run journal {} unavailable: {}", path, e);
                None
            }
        }
    }

    fn record_batch(&mut self, sequence: u32, path: &Path, records: usize, units: usize) {
        let path = path.display().to_string();
        if let Err(e) = self
            .journal
            .record_batch(self.run_id, sequence, &path, records, units)
        {
            tracing::warn!("Could not journal batch {}: {}", sequence, e);
        }
    }

    fn finish(&mut self, summary: &RunSummary) {
        if let Err(e) = self.journal.finish_run(
            self.run_id,
            summary.completed as u64,
            summary.failed as u64,
            summary.skipped as u64,
        ) {
            tracing::warn!("Could not journal end of run {}: {}", self.run_id, e);
        }
    }
}

#[cfg(test)]
pub(crate) mod tests {
    use super::*;
    use crate::config::{parse_config, DelayRange};
    use crate::crawler::retry::testing::ScriptedFetcher;

    /// Config with zero delays writing under `dir`
    pub(crate) fn test_config(dir: &Path, max_attempts: u32, batch_size: usize) -> Config {
        let p = |name: &str| dir.join(name).display().to_string();
        parse_config(&format!(
            r#"
[crawler]
start-page = 1
end-page = 2
max-concurrency = 1
batch-size = {batch_size}
max-attempts = {max_attempts}
request-timeout-secs = 5
inter-request-delay = {{ min-ms = 0, max-ms = 0 }}
retry-backoff = {{ min-ms = 0, max-ms = 0 }}

[site]
base-url = "https://forum.example/"
listing-url = "https://forum.example/forums/market.3/page-{{page}}"
topic-page-suffix = "page-{{page}}"

[output]
topic-list = "{topics}"
data-dir = "{data}"
pages-progress = "{pages_progress}"
pages-failed = "{pages_failed}"
topics-progress = "{topics_progress}"
topics-failed = "{topics_failed}"
journal-path = "{journal}"
"#,
            topics = p("topics.csv"),
            data = p("data"),
            pages_progress = p("completed_pages.log"),
            pages_failed = p("failed_pages.log"),
            topics_progress = p("progress.txt"),
            topics_failed = p("failed_topics.log"),
            journal = p("harvest.db"),
        ))
        .unwrap()
    }

    pub(crate) fn test_context(fetcher: Arc<dyn Fetcher>, max_attempts: u32) -> Arc<CrawlContext> {
        paced_context(fetcher, max_attempts, 0)
    }

    /// Like `test_context`, with a fixed politeness pause of `delay_ms`
    pub(crate) fn paced_context(
        fetcher: Arc<dyn Fetcher>,
        max_attempts: u32,
        delay_ms: u64,
    ) -> Arc<CrawlContext> {
        let mut config = test_config(Path::new("/nonexistent"), max_attempts, 100);
        config.crawler.inter_request_delay = DelayRange::new(delay_ms, delay_ms);
        let extractor = XenForoExtractor::new(Url::parse("https://forum.example/").unwrap());
        Arc::new(CrawlContext::new(
            Arc::new(config),
            fetcher,
            Arc::new(extractor),
        ))
    }

    fn harvester(dir: &Path, fetcher: Arc<ScriptedFetcher>, batch_size: usize) -> Harvester {
        let extractor = XenForoExtractor::new(Url::parse("https://forum.example/").unwrap());
        Harvester::with_components(test_config(dir, 2, batch_size), fetcher, Arc::new(extractor))
            .with_config_hash("test-hash")
    }

    fn topic_body(posts: usize) -> String {
        let messages: String = (0..posts)
            .map(|i| {
                format!(
                    r#"<div class="messageInfo"><a class="datePermalink">d{i}</a><blockquote class="messageText">m{i}</blockquote></div>"#
                )
            })
            .collect();
        format!("<html><body>{}</body></html>", messages)
    }

    #[tokio::test]
    async fn test_extraction_splits_batches_and_marks_topics() {
        let dir = tempfile::TempDir::new().unwrap();
        std::fs::write(
            dir.path().join("topics.csv"),
            "url,title\nhttps://forum.example/threads/a.1/,A\nhttps://forum.example/threads/b.2/,B\n",
        )
        .unwrap();

        let fetcher = Arc::new(ScriptedFetcher::default());
        fetcher.script("https://forum.example/threads/a.1/", vec![Ok(topic_body(3).as_str())]);
        fetcher.script("https://forum.example/threads/b.2/", vec![Ok(topic_body(4).as_str())]);

        let summary = harvester(dir.path(), fetcher, 5)
            .run_extraction()
            .await
            .unwrap();

        assert_eq!(summary.completed, 2);
        assert_eq!(summary.batches, 2);
        assert_eq!(summary.records, 7);
        assert!(summary.is_clean());

        let progress = std::fs::read_to_string(dir.path().join("progress.txt")).unwrap();
        assert_eq!(progress.lines().count(), 2);
        assert!(dir.path().join("data/posts_0001.csv").exists());
        assert!(dir.path().join("data/posts_0002.csv").exists());

        let journal = RunJournal::open(&dir.path().join("harvest.db")).unwrap();
        let runs = journal.runs().unwrap();
        assert_eq!(runs.len(), 1);
        assert_eq!(runs[0].config_hash, "test-hash");
        assert_eq!(journal.batches(runs[0].id).unwrap().len(), 2);
    }

    #[tokio::test]
    async fn test_discovery_failure_goes_to_failure_log() {
        let dir = tempfile::TempDir::new().unwrap();
        let fetcher = Arc::new(ScriptedFetcher::default());
        fetcher.script(
            "https://forum.example/forums/market.3/page-1",
            vec![Ok(r#"<h3 class="title"><a href="threads/a.1/">A</a></h3>"#)],
        );
        fetcher.script("https://forum.example/forums/market.3/page-2", vec![Err(500)]);

        let summary = harvester(dir.path(), fetcher.clone(), 100)
            .run_discovery()
            .await
            .unwrap();

        assert_eq!(summary.completed, 1);
        assert_eq!(summary.failed, 1);
        assert_eq!(fetcher.calls_to("https://forum.example/forums/market.3/page-2"), 2);

        let failed = FailureLog::new(dir.path().join("failed_pages.log"));
        assert_eq!(failed.keys().unwrap(), vec!["2"]);
        let done = std::fs::read_to_string(dir.path().join("completed_pages.log")).unwrap();
        assert_eq!(done.trim(), "1");
    }

    #[tokio::test]
    async fn test_plan_counts_pending_topics() {
        let dir = tempfile::TempDir::new().unwrap();
        std::fs::write(
            dir.path().join("topics.csv"),
            "url,title\nhttps://forum.example/threads/a.1/,A\nhttps://forum.example/threads/b.2/,B\n",
        )
        .unwrap();
        std::fs::write(
            dir.path().join("progress.txt"),
            "https://forum.example/threads/a.1/\n",
        )
        .unwrap();

        let fetcher = Arc::new(ScriptedFetcher::default());
        let plan = harvester(dir.path(), fetcher.clone(), 10)
            .plan(RunMode::Extraction)
            .unwrap();

        assert_eq!(plan.total, 2);
        assert_eq!(plan.remaining(), 1);
        assert!(fetcher.requests.lock().unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_missing_topic_list_fails_before_fetching() {
        let dir = tempfile::TempDir::new().unwrap();
        let fetcher = Arc::new(ScriptedFetcher::default());

        let err = harvester(dir.path(), fetcher.clone(), 10)
            .run_extraction()
            .await
            .unwrap_err();

        assert!(matches!(
            err,
            HarvestError::Config(ConfigError::MissingTopicList(_))
        ));
        assert!(fetcher.requests.lock().unwrap().is_empty());
    }
}
