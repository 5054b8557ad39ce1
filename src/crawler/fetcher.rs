//! HTTP fetcher implementation
//!
//! A fetcher performs exactly one GET. Retrying, pacing, and identity
//! rotation all live in the layers above it.

use crate::config::CrawlerConfig;
use crate::FetchError;
use async_trait::async_trait;
use reqwest::header::USER_AGENT;
use reqwest::Client;
use std::time::Duration;

/// A successfully fetched document
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Document {
    /// URL that was requested
    pub url: String,
    /// HTTP status code (always 2xx)
    pub status: u16,
    /// Response body
    pub body: String,
}

/// One fetch to perform
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FetchRequest {
    pub url: String,
    /// Identity presented to the server for this attempt
    pub user_agent: String,
}

/// Performs a single request with no retry of its own
#[async_trait]
pub trait Fetcher: Send + Sync {
    async fn fetch(&self, request: &FetchRequest) -> Result<Document, FetchError>;
}

/// Fetcher backed by a shared reqwest client
#[derive(Debug, Clone)]
pub struct HttpFetcher {
    client: Client,
}

impl HttpFetcher {
    pub fn new(client: Client) -> Self {
        Self { client }
    }
}

/// Builds the HTTP client shared by all workers
///
/// The timeout bounds every request, which also bounds how long an
/// interrupted run waits for in-flight work.
pub fn build_http_client(config: &CrawlerConfig) -> Result<Client, reqwest::Error> {
    Client::builder()
        .timeout(Duration::from_secs(config.request_timeout_secs))
        .connect_timeout(Duration::from_secs(config.request_timeout_secs.min(10)))
        .gzip(true)
        .brotli(true)
        .build()
}

#[async_trait]
impl Fetcher for HttpFetcher {
    async fn fetch(&self, request: &FetchRequest) -> Result<Document, FetchError> {
        let response = self
            .client
            .get(&request.url)
            .header(USER_AGENT, &request.user_agent)
            .send()
            .await
            .map_err(|e| FetchError::Transport {
                url: request.url.clone(),
                message: classify_transport_error(&e),
            })?;

        let status = response.status();
        if !status.is_success() {
            return Err(FetchError::Status {
                url: request.url.clone(),
                status: status.as_u16(),
            });
        }

        let body = response.text().await.map_err(|e| FetchError::Body {
            url: request.url.clone(),
            message: e.to_string(),
        })?;

        Ok(Document {
            url: request.url.clone(),
            status: status.as_u16(),
            body,
        })
    }
}

fn classify_transport_error(e: &reqwest::Error) -> String {
    if e.is_timeout() {
        "request timeout".to_string()
    } else if e.is_connect() {
        format!("connection failed: {}", e)
    } else {
        e.to_string()
    }
}
