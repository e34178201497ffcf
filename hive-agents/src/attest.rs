//! Attestation adapters
//!
//! A signal starts out attested by its local hash. When an attestation
//! service is configured, the payload is dispersed to it and the returned
//! commitment replaces the hash on the local copy.

use async_trait::async_trait;
use serde::Deserialize;
use std::time::Duration;

use crate::{AgentError, Attestor};

/// Request timeout for dispersal calls
const DISPERSE_TIMEOUT_SECS: u64 = 20;

#[derive(Debug, Deserialize)]
struct DisperseResponse {
    commitment: Option<String>,
    #[serde(default)]
    error: Option<String>,
}

/// Disperses payloads to an HTTP attestation service via `POST {url}`
pub struct HttpAttestor {
    client: reqwest::Client,
    url: String,
}

impl HttpAttestor {
    pub fn new(url: &str) -> Result<Self, AgentError> {
        let client = reqwest::Client::builder()
            .timeout(Duration::from_secs(DISPERSE_TIMEOUT_SECS))
            .build()
            .map_err(|e| AgentError::Network(e.to_string()))?;
        Ok(Self {
            client,
            url: url.to_string(),
        })
    }
}

#[async_trait]
impl Attestor for HttpAttestor {
    async fn disperse(&self, payload: &serde_json::Value) -> Result<String, AgentError> {
        let response = self
            .client
            .post(&self.url)
            .json(payload)
            .send()
            .await
            .map_err(|e| AgentError::Network(e.to_string()))?;

        if !response.status().is_success() {
            return Err(AgentError::Network(format!(
                "attestation service returned {}",
                response.status()
            )));
        }

        let body: DisperseResponse = response
            .json()
            .await
            .map_err(|e| AgentError::Parse(e.to_string()))?;

        match body.commitment {
            Some(commitment) if !commitment.is_empty() => Ok(commitment),
            _ => Err(AgentError::Parse(
                body.error.unwrap_or_else(|| "missing commitment".to_string()),
            )),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::{routing::post, Json, Router};

    async fn spawn(router: Router) -> String {
        let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        tokio::spawn(async move { axum::serve(listener, router).await.unwrap() });
        format!("http://{addr}/disperse")
    }

    #[tokio::test]
    async fn test_disperse_returns_commitment() {
        let url = spawn(Router::new().route(
            "/disperse",
            post(|Json(body): Json<serde_json::Value>| async move {
                let hash = body["hash"].as_str().unwrap_or("").to_string();
                Json(serde_json::json!({ "commitment": format!("blob:{hash}") }))
            }),
        ))
        .await;

        let attestor = HttpAttestor::new(&url).unwrap();
        let commitment = attestor
            .disperse(&serde_json::json!({ "hash": "abc" }))
            .await
            .unwrap();
        assert_eq!(commitment, "blob:abc");
    }

    #[tokio::test]
    async fn test_disperse_without_commitment_fails() {
        let url = spawn(Router::new().route(
            "/disperse",
            post(|| async { Json(serde_json::json!({ "error": "quota" })) }),
        ))
        .await;

        let attestor = HttpAttestor::new(&url).unwrap();
        let err = attestor.disperse(&serde_json::json!({})).await.unwrap_err();
        assert!(err.to_string().contains("quota"));
    }
}
