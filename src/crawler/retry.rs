//! Retry policy with randomized backoff and identity rotation
//!
//! | Outcome of an attempt | Action |
//! |-----------------------|--------|
//! | 2xx | Return the document |
//! | Non-2xx, timeout, connection error, body error | Back off, try again |
//! | Attempts exhausted | `FetchError::Exhausted` carrying the last cause |

use crate::config::DelayRange;
use crate::crawler::fetcher::{Document, FetchRequest, Fetcher};
use crate::crawler::governor::sleep_within;
use crate::{FetchError, FetchResult};
use rand::seq::SliceRandom;

/// Identity used when no user agents are configured
pub const DEFAULT_USER_AGENT: &str = concat!("forum-harvest/", env!("CARGO_PKG_VERSION"));

/// Pool of client identities; one is picked at random per attempt
#[derive(Debug, Clone)]
pub struct IdentityPool {
    user_agents: Vec<String>,
}

impl IdentityPool {
    pub fn new(user_agents: Vec<String>) -> Self {
        Self { user_agents }
    }

    pub fn choose(&self) -> &str {
        self.user_agents
            .choose(&mut rand::thread_rng())
            .map(String::as_str)
            .unwrap_or(DEFAULT_USER_AGENT)
    }
}

#[derive(Debug, Clone)]
pub struct RetryPolicy {
    max_attempts: u32,
    backoff: DelayRange,
    identities: IdentityPool,
}

impl RetryPolicy {
    /// `max_attempts` below 1 is treated as 1
    pub fn new(max_attempts: u32, backoff: DelayRange, identities: IdentityPool) -> Self {
        Self {
            max_attempts: max_attempts.max(1),
            backoff,
            identities,
        }
    }

    /// Fetches `url`, retrying transient failures
    ///
    /// The backoff sleep suspends only the calling worker. An `Exhausted`
    /// error is final; callers must not retry it within the run.
    pub async fn fetch(&self, fetcher: &dyn Fetcher, url: &str) -> FetchResult<Document> {
        let mut last_cause = String::new();

        for attempt in 1..=self.max_attempts {
            let request = FetchRequest {
                url: url.to_string(),
                user_agent: self.identities.choose().to_string(),
            };

            match fetcher.fetch(&request).await {
                Ok(doc) => {
                    if attempt > 1 {
                        tracing::debug!("{} succeeded on attempt {}", url, attempt);
                    }
                    return Ok(doc);
                }
                Err(e) => {
                    tracing::warn!(
                        "Attempt {}/{} failed for {}: {}",
                        attempt,
                        self.max_attempts,
                        url,
                        e
                    );
                    last_cause = e.to_string();
                    if attempt < self.max_attempts {
                        sleep_within(self.backoff).await;
                    }
                }
            }
        }

        Err(FetchError::Exhausted {
            url: url.to_string(),
            attempts: self.max_attempts,
            last_cause,
        })
    }
}


#[cfg(test)]
mod tests {
    use super::testing::ScriptedFetcher;
    use super::*;

    const URL: &str = "https://forum.example/threads/a.1/";

    fn policy(max_attempts: u32) -> RetryPolicy {
        RetryPolicy::new(
            max_attempts,
            DelayRange::ZERO,
            IdentityPool::new(vec!["agent-a".to_string(), "agent-b".to_string()]),
        )
    }

    #[tokio::test]
    async fn test_succeeds_after_transient_failures() {
        let fetcher = ScriptedFetcher::default();
        fetcher.script(URL, vec![Err(503), Err(502), Ok("<html>ok</html>")]);

        let doc = policy(3).fetch(&fetcher, URL).await.unwrap();
        assert_eq!(doc.body, "<html>ok</html>");
        assert_eq!(fetcher.calls_to(URL), 3);
    }

    #[tokio::test]
    async fn test_exhaustion_reports_last_cause() {
        let fetcher = ScriptedFetcher::default();
        fetcher.script(URL, vec![Err(500), Err(502), Err(503)]);

        let err = policy(3).fetch(&fetcher, URL).await.unwrap_err();
        match err {
            FetchError::Exhausted {
                url,
                attempts,
                last_cause,
            } => {
                assert_eq!(url, URL);
                assert_eq!(attempts, 3);
                assert!(last_cause.contains("503"));
            }
            other => panic!("expected exhaustion, got {:?}", other),
        }
        assert_eq!(fetcher.calls_to(URL), 3);
    }

    #[tokio::test]
    async fn test_single_attempt_policy() {
        let fetcher = ScriptedFetcher::default();
        fetcher.script(URL, vec![Err(500), Ok("late")]);

        assert!(policy(1).fetch(&fetcher, URL).await.unwrap_err().is_exhausted());
        assert_eq!(fetcher.calls_to(URL), 1);

        let fetcher = ScriptedFetcher::default();
        fetcher.script(URL, vec![Err(500)]);
        assert!(policy(0).fetch(&fetcher, URL).await.is_err());
        assert_eq!(fetcher.calls_to(URL), 1);
    }

    #[tokio::test]
    async fn test_each_attempt_uses_pool_identity() {
        let fetcher = ScriptedFetcher::default();
        fetcher.script(URL, vec![Err(500)]);

        let _ = policy(4).fetch(&fetcher, URL).await;
        let requests = fetcher.requests.lock().unwrap();
        assert_eq!(requests.len(), 4);
        assert!(requests
            .iter()
            .all(|r| r.user_agent == "agent-a" || r.user_agent == "agent-b"));
    }

    #[test]
    fn test_empty_pool_falls_back_to_default() {
        let pool = IdentityPool::new(Vec::new());
        assert_eq!(pool.choose(), DEFAULT_USER_AGENT);
    }
}
