// src/feed/fetcher.rs
use std::time::Duration;

use async_trait::async_trait;
use reqwest::Client;

use super::types::FeedError;
use crate::config::FeedConfig;

/// Where raw feed documents come from. One call = one attempt.
#[async_trait]
pub trait FeedSource: Send + Sync {
    async fn fetch(&self) -> Result<String, FeedError>;
    fn name(&self) -> &'static str;
}

/// Plain HTTP GET against the arXiv query API.
#[derive(Clone)]
pub struct HttpFeedSource {
    client: Client,
    endpoint: String,
    query: Vec<(&'static str, String)>,
    timeout: Duration,
}

impl HttpFeedSource {
    pub fn from_config(cfg: &FeedConfig) -> anyhow::Result<Self> {
        let client = Client::builder().user_agent(cfg.user_agent.clone()).build()?;
        Ok(Self {
            client,
            endpoint: cfg.endpoint.clone(),
            query: query_params(cfg),
            timeout: Duration::from_secs(cfg.http_timeout_secs),
        })
    }

    pub fn endpoint(&self) -> &str {
        &self.endpoint
    }
}

/// Fixed query window: category filter, offset, count and sort.
pub fn query_params(cfg: &FeedConfig) -> Vec<(&'static str, String)> {
    vec![
        ("search_query", cfg.search_query.clone()),
        ("start", cfg.start.to_string()),
        ("max_results", cfg.max_results.to_string()),
        ("sortBy", cfg.sort_by.clone()),
        ("sortOrder", cfg.sort_order.clone()),
    ]
}

#[async_trait]
impl FeedSource for HttpFeedSource {
    async fn fetch(&self) -> Result<String, FeedError> {
        let resp = self
            .client
            .get(&self.endpoint)
            .query(&self.query)
            .timeout(self.timeout)
            .send()
            .await
            .map_err(|e| FeedError::Transport(e.to_string()))?;

        let status = resp.status();
        if !status.is_success() {
            return Err(FeedError::HttpStatus(status.as_u16()));
        }

        resp.text()
            .await
            .map_err(|e| FeedError::Transport(format!("reading body: {e}")))
    }

    fn name(&self) -> &'static str {
        "arxiv"
    }
}
