//! arXiv export API client

use async_trait::async_trait;
use paperscout_common::config::ArxivConfig;
use paperscout_common::metrics::record_source_request;
use paperscout_common::{AppError, DateRange, Result};
use std::time::Instant;
use tracing::debug;

use super::{PaperSource, RawPayload};

const PROVIDER: &str = "arXiv";

/// arXiv Atom API client
pub struct ArxivClient {
    client: reqwest::Client,
    base_url: String,
    max_results_cap: u32,
}

impl ArxivClient {
    /// Create a client with an explicit per-request timeout
    pub fn new(config: &ArxivConfig) -> Result<Self> {
        let client = reqwest::Client::builder()
            .timeout(config.request_timeout())
            .user_agent(config.user_agent.clone())
            .build()
            .map_err(|e| AppError::Configuration {
                message: format!("Failed to create HTTP client: {}", e),
            })?;

        Ok(Self {
            client,
            base_url: config.base_url.clone(),
            max_results_cap: config.max_results_cap,
        })
    }

    /// `all:<query>`, narrowed to a submission window when one is given
    pub fn search_expression(query: &str, range: Option<&DateRange>) -> String {
        match range {
            Some(range) => format!(
                "all:{} AND submittedDate:[{} TO {}]",
                query,
                range.from_compact(),
                range.to_compact()
            ),
            None => format!("all:{}", query),
        }
    }

    fn validate(&self, query: &str, max_results: u32) -> Result<()> {
        if query.trim().is_empty() {
            return Err(AppError::invalid("query", "query must not be empty"));
        }
        if max_results == 0 || max_results > self.max_results_cap {
            return Err(AppError::invalid(
                "maxResults",
                format!("must be between 1 and {}", self.max_results_cap),
            ));
        }
        Ok(())
    }

    async fn fetch(&self, expression: &str, max_results: u32) -> Result<RawPayload> {
        let max_results = max_results.to_string();
        let response = self
            .client
            .get(&self.base_url)
            .query(&[
                ("search_query", expression),
                ("start", "0"),
                ("max_results", max_results.as_str()),
                ("sortBy", "submittedDate"),
                ("sortOrder", "descending"),
            ])
            .send()
            .await
            .map_err(|e| AppError::SourceUnavailable {
                provider: PROVIDER.to_string(),
                status: None,
                message: format!("Request failed: {}", e),
            })?;

        let status = response.status();
        if !status.is_success() {
            return Err(AppError::SourceUnavailable {
                provider: PROVIDER.to_string(),
                status: Some(status.as_u16()),
                message: format!("HTTP {}", status),
            });
        }

        let body = response.text().await.map_err(|e| AppError::SourceUnavailable {
            provider: PROVIDER.to_string(),
            status: Some(status.as_u16()),
            message: format!("Failed to read response body: {}", e),
        })?;

        Ok(RawPayload(body))
    }
}

#[async_trait]
impl PaperSource for ArxivClient {
    async fn search(&self, query: &str, range: Option<&DateRange>, max_results: u32) -> Result<RawPayload> {
        self.validate(query, max_results)?;

        let expression = Self::search_expression(query.trim(), range);
        debug!(search_query = %expression, max_results, "Querying arXiv");

        let start = Instant::now();
        let result = self.fetch(&expression, max_results).await;
        record_source_request(PROVIDER, start.elapsed(), result.is_ok());

        if let Ok(payload) = &result {
            debug!(bytes = payload.0.len(), elapsed_ms = start.elapsed().as_millis() as u64, "arXiv responded");
        }
        result
    }

    fn provider(&self) -> &str {
        PROVIDER
    }
}
