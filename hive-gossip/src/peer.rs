//! Peer HTTP client configuration
//!
//! Creates the HTTP client every gossip call goes through.

use reqwest::Client;
use serde::{Deserialize, Serialize};
use std::time::Duration;
use thiserror::Error;

/// Default per-call timeout in milliseconds
pub const DEFAULT_PEER_TIMEOUT_MS: u64 = 3000;

/// Gossip configuration
#[derive(Debug, Clone)]
pub struct GossipConfig {
    /// Peer base URLs, e.g. `http://10.0.0.2:7400`
    pub peers: Vec<String>,
    /// Hard timeout for each outbound call
    pub timeout_ms: u64,
}

impl Default for GossipConfig {
    fn default() -> Self {
        Self {
            peers: Vec::new(),
            timeout_ms: DEFAULT_PEER_TIMEOUT_MS,
        }
    }
}

impl GossipConfig {
    pub fn with_peers<I, S>(mut self, peers: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        self.peers = peers
            .into_iter()
            .map(|p| normalize_peer(p.as_ref()))
            .filter(|p| !p.is_empty())
            .collect();
        self
    }

    pub fn timeout(&self) -> Duration {
        Duration::from_millis(self.timeout_ms)
    }
}

/// Errors from a single peer call
#[derive(Debug, Error)]
pub enum GossipError {
    #[error("Failed to build HTTP client: {0}")]
    ClientBuild(String),

    #[error("Request failed: {0}")]
    Request(#[from] reqwest::Error),

    #[error("Timeout after {0} ms")]
    Timeout(u64),

    #[error("Peer {peer} answered with status {status}")]
    Status { peer: String, status: u16 },

    #[error("Peer {peer} rejected the signal: {reason}")]
    Rejected { peer: String, reason: String },
}

/// Acknowledgement body for `POST /pheromone`
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PushAck {
    pub ok: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

impl PushAck {
    pub fn accepted() -> Self {
        Self { ok: true, error: None }
    }

    pub fn rejected(reason: impl Into<String>) -> Self {
        Self {
            ok: false,
            error: Some(reason.into()),
        }
    }
}

/// Trim whitespace and trailing slashes, default the scheme to http
pub fn normalize_peer(peer: &str) -> String {
    let trimmed = peer.trim().trim_end_matches('/');
    if trimmed.is_empty() {
        return String::new();
    }
    if trimmed.starts_with("http://") || trimmed.starts_with("https://") {
        trimmed.to_string()
    } else {
        format!("http://{trimmed}")
    }
}

/// Create the HTTP client used for gossip
pub fn create_client(config: &GossipConfig) -> Result<Client, GossipError> {
    Client::builder()
        .timeout(config.timeout())
        .connect_timeout(config.timeout())
        .user_agent(concat!("hive-gossip/", env!("CARGO_PKG_VERSION")))
        .build()
        .map_err(|e| GossipError::ClientBuild(e.to_string()))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_config() {
        let config = GossipConfig::default();
        assert!(config.peers.is_empty());
        assert_eq!(config.timeout(), Duration::from_secs(3));
    }

    #[test]
    fn test_peer_normalization() {
        let config = GossipConfig::default().with_peers([
            " 10.0.0.2:7400/ ",
            "https://node-b.example:7400",
            "",
        ]);
        assert_eq!(
            config.peers,
            vec![
                "http://10.0.0.2:7400".to_string(),
                "https://node-b.example:7400".to_string()
            ]
        );
    }

    #[test]
    fn test_ack_wire_format() {
        let json = serde_json::to_string(&PushAck::accepted()).unwrap();
        assert_eq!(json, r#"{"ok":true}"#);
        let rejected: PushAck = serde_json::from_str(r#"{"ok":false,"error":"bad"}"#).unwrap();
        assert_eq!(rejected, PushAck::rejected("bad"));
    }
}
