//! Paper source abstraction
//!
//! A source answers one keyword query with the provider's raw response body.
//! Parsing is a separate, pure step so the same payload can be replayed in tests.

mod arxiv;

pub use arxiv::ArxivClient;

use async_trait::async_trait;
use paperscout_common::config::ArxivConfig;
use paperscout_common::{AppError, DateRange, Result};
use std::collections::{HashMap, HashSet};
use std::sync::Arc;
use tokio::sync::Mutex;

/// Unparsed provider response body
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct RawPayload(pub String);

impl RawPayload {
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl From<String> for RawPayload {
    fn from(body: String) -> Self {
        Self(body)
    }
}

/// Trait for keyword search against a bibliographic provider
#[async_trait]
pub trait PaperSource: Send + Sync {
    /// Issue exactly one query. No retries.
    async fn search(&self, query: &str, range: Option<&DateRange>, max_results: u32) -> Result<RawPayload>;

    /// Provider name for logs and metrics
    fn provider(&self) -> &str;
}

/// Create the primary source from configuration
pub fn create_source(config: &ArxivConfig) -> Result<Arc<dyn PaperSource>> {
    let client = ArxivClient::new(config)?;
    tracing::info!(base_url = %config.base_url, timeout_secs = config.request_timeout_secs, "arXiv source ready");
    Ok(Arc::new(client))
}

/// Canned source for tests and dry runs
#[derive(Default)]
pub struct MockSource {
    default_payload: RawPayload,
    by_query: HashMap<String, RawPayload>,
    failing: HashSet<String>,
    calls: Mutex<Vec<String>>,
}

impl MockSource {
    /// Answer every query with `payload`
    pub fn new(payload: impl Into<String>) -> Self {
        Self {
            default_payload: RawPayload(payload.into()),
            ..Self::default()
        }
    }

    /// Answer `query` with its own payload
    pub fn with_response(mut self, query: &str, payload: impl Into<String>) -> Self {
        self.by_query.insert(query.to_string(), RawPayload(payload.into()));
        self
    }

    /// Fail `query` with `SourceUnavailable`
    pub fn failing_on(mut self, query: &str) -> Self {
        self.failing.insert(query.to_string());
        self
    }

    /// Queries seen so far, in call order
    pub async fn calls(&self) -> Vec<String> {
        self.calls.lock().await.clone()
    }
}

#[async_trait]
impl PaperSource for MockSource {
    async fn search(&self, query: &str, _range: Option<&DateRange>, _max_results: u32) -> Result<RawPayload> {
        self.calls.lock().await.push(query.to_string());

        if self.failing.contains(query) {
            return Err(AppError::SourceUnavailable {
                provider: self.provider().to_string(),
                status: Some(503),
                message: "HTTP 503 Service Unavailable".to_string(),
            });
        }

        Ok(self
            .by_query
            .get(query)
            .cloned()
            .unwrap_or_else(|| self.default_payload.clone()))
    }

    fn provider(&self) -> &str {
        "mock"
    }
}
