//! HTTP dataset fetcher
//!
//! Fetches a topic's dataset from a JSON endpoint. Caching and source
//! specific parsing live behind the endpoint; this side only expects
//! `{ "source": .., "summary": .., "records": [..] }` or a bare array.

use async_trait::async_trait;
use std::time::Duration;
use tracing::debug;

use crate::{AgentError, Dataset, DatasetFetcher};

/// Request timeout for dataset calls
const FETCH_TIMEOUT_SECS: u64 = 10;

/// Records included in a digest built from a bare array
const DIGEST_RECORDS: usize = 5;

/// Fetches datasets from `{base_url}?topic=<topic>`
pub struct HttpDatasetFetcher {
    client: reqwest::Client,
    base_url: String,
}

impl HttpDatasetFetcher {
    pub fn new(base_url: &str) -> Result<Self, AgentError> {
        let client = reqwest::Client::builder()
            .timeout(Duration::from_secs(FETCH_TIMEOUT_SECS))
            .build()
            .map_err(|e| AgentError::Network(e.to_string()))?;
        Ok(Self {
            client,
            base_url: base_url.trim_end_matches('/').to_string(),
        })
    }

    fn url_for(&self, topic: &str) -> String {
        format!("{}?topic={}", self.base_url, urlencoding::encode(topic))
    }
}

#[async_trait]
impl DatasetFetcher for HttpDatasetFetcher {
    async fn fetch(&self, topic: &str) -> Result<Option<Dataset>, AgentError> {
        let response = self
            .client
            .get(self.url_for(topic))
            .send()
            .await
            .map_err(|e| AgentError::Network(e.to_string()))?;

        if response.status() == reqwest::StatusCode::NOT_FOUND
            || response.status() == reqwest::StatusCode::NO_CONTENT
        {
            debug!("No dataset available for {}", topic);
            return Ok(None);
        }
        if !response.status().is_success() {
            return Err(AgentError::Network(format!(
                "dataset endpoint returned {}",
                response.status()
            )));
        }

        let body: serde_json::Value = response
            .json()
            .await
            .map_err(|e| AgentError::Parse(e.to_string()))?;

        Ok(parse_dataset(topic, &self.base_url, &body))
    }
}

/// Interpret a dataset response body. Empty datasets are `None`.
pub fn parse_dataset(topic: &str, default_source: &str, body: &serde_json::Value) -> Option<Dataset> {
    let (records, source, summary) = match body {
        serde_json::Value::Array(records) => (records.clone(), None, None),
        serde_json::Value::Object(map) => (
            map.get("records")
                .and_then(|r| r.as_array())
                .cloned()
                .unwrap_or_default(),
            map.get("source").and_then(|s| s.as_str()).map(str::to_string),
            map.get("summary").and_then(|s| s.as_str()).map(str::to_string),
        ),
        _ => return None,
    };

    if records.is_empty() && summary.is_none() {
        return None;
    }

    let summary = summary.unwrap_or_else(|| {
        records
            .iter()
            .take(DIGEST_RECORDS)
            .map(|r| match r {
                serde_json::Value::String(s) => s.clone(),
                other => other.to_string(),
            })
            .collect::<Vec<_>>()
            .join("; ")
    });

    Some(Dataset {
        topic: topic.to_string(),
        source: source.unwrap_or_else(|| default_source.to_string()),
        summary,
        record_count: records.len(),
    })
}
