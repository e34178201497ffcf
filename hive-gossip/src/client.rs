//! Gossip client
//!
//! Fans push and pull calls out to every peer concurrently. Each call
//! carries a hard timeout and a failed or slow peer only loses its own
//! contribution: the fan-out waits for all peers and keeps what succeeded.

use futures::future::join_all;
use reqwest::Client;
use std::time::Duration;
use tracing::{debug, warn};

use hive_core::Pheromone;

use crate::{create_client, GossipConfig, GossipError, PushAck};

/// Outcome of pushing one signal to every peer
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct PushReport {
    pub delivered: usize,
    pub failed: usize,
}

/// Everything collected from one pull round
#[derive(Debug, Clone, Default)]
pub struct PullReport {
    /// Well-formed signals from every responding peer (may contain repeats)
    pub signals: Vec<Pheromone>,
    pub peers_ok: usize,
    pub peers_failed: usize,
    /// Elements dropped because they did not decode or validate
    pub malformed: usize,
}

/// HTTP gossip client for a fixed peer set
#[derive(Debug, Clone)]
pub struct GossipClient {
    http: Client,
    config: GossipConfig,
}

impl GossipClient {
    pub fn new(config: GossipConfig) -> Result<Self, GossipError> {
        let http = create_client(&config)?;
        Ok(Self { http, config })
    }

    pub fn peers(&self) -> &[String] {
        &self.config.peers
    }

    /// Push a signal to every peer. Never fails as a whole.
    pub async fn push_all(&self, signal: &Pheromone) -> PushReport {
        let results = join_all(
            self.config
                .peers
                .iter()
                .map(|peer| self.with_timeout(self.push(peer, signal))),
        )
        .await;

        let mut report = PushReport::default();
        for (peer, result) in self.config.peers.iter().zip(results) {
            match result {
                Ok(()) => report.delivered += 1,
                Err(e) => {
                    debug!("Push of {} to {} failed: {}", signal.id, peer, e);
                    report.failed += 1;
                }
            }
        }
        report
    }

    /// Pull every peer's known signals. Never fails as a whole.
    pub async fn pull_all(&self) -> PullReport {
        let results = join_all(
            self.config
                .peers
                .iter()
                .map(|peer| self.with_timeout(self.pull(peer))),
        )
        .await;

        let mut report = PullReport::default();
        for (peer, result) in self.config.peers.iter().zip(results) {
            match result {
                Ok((signals, malformed)) => {
                    report.peers_ok += 1;
                    report.malformed += malformed;
                    report.signals.extend(signals);
                }
                Err(e) => {
                    debug!("Pull from {} failed: {}", peer, e);
                    report.peers_failed += 1;
                }
            }
        }

        if report.malformed > 0 {
            warn!("Dropped {} malformed signals during pull", report.malformed);
        }
        report
    }

    /// Fetch a peer's `/state` document
    pub async fn probe(&self, peer: &str) -> Result<serde_json::Value, GossipError> {
        self.with_timeout(self.fetch_state(peer)).await
    }

    async fn fetch_state(&self, peer: &str) -> Result<serde_json::Value, GossipError> {
        let response = self.http.get(format!("{peer}/state")).send().await?;
        let response = check_status(peer, response)?;
        Ok(response.json().await?)
    }

    async fn push(&self, peer: &str, signal: &Pheromone) -> Result<(), GossipError> {
        let response = self
            .http
            .post(format!("{peer}/pheromone"))
            .json(signal)
            .send()
            .await?;
        let response = check_status(peer, response)?;
        let ack: PushAck = response.json().await?;

        if ack.ok {
            Ok(())
        } else {
            Err(GossipError::Rejected {
                peer: peer.to_string(),
                reason: ack.error.unwrap_or_default(),
            })
        }
    }

    async fn pull(&self, peer: &str) -> Result<(Vec<Pheromone>, usize), GossipError> {
        let response = self.http.get(format!("{peer}/pheromones")).send().await?;
        let response = check_status(peer, response)?;
        let body = response.bytes().await?;
        Ok(decode_signals(&body))
    }

    async fn with_timeout<T, F>(&self, call: F) -> Result<T, GossipError>
    where
        F: std::future::Future<Output = Result<T, GossipError>>,
    {
        let limit = Duration::from_millis(self.config.timeout_ms);
        match tokio::time::timeout(limit, call).await {
            Ok(result) => result,
            Err(_) => Err(GossipError::Timeout(self.config.timeout_ms)),
        }
    }
}

fn check_status(peer: &str, response: reqwest::Response) -> Result<reqwest::Response, GossipError> {
    if response.status().is_success() {
        Ok(response)
    } else {
        Err(GossipError::Status {
            peer: peer.to_string(),
            status: response.status().as_u16(),
        })
    }
}

/// Decode a single inbound signal, rejecting anything malformed
pub fn decode_signal(body: &[u8]) -> Result<Pheromone, String> {
    let signal: Pheromone = serde_json::from_slice(body).map_err(|e| e.to_string())?;
    signal.validate().map_err(|e| e.to_string())?;
    Ok(signal)
}

/// Decode a JSON array of signals element by element.
///
/// Returns the valid signals and the number of dropped elements. A body
/// that is not an array at all counts as one malformed element.
pub fn decode_signals(body: &[u8]) -> (Vec<Pheromone>, usize) {
    let values: Vec<serde_json::Value> = match serde_json::from_slice(body) {
        Ok(values) => values,
        Err(_) => return (Vec::new(), 1),
    };

    let mut signals = Vec::with_capacity(values.len());
    let mut malformed = 0;
    for value in values {
        match serde_json::from_value::<Pheromone>(value) {
            Ok(signal) if signal.validate().is_ok() => signals.push(signal),
            _ => malformed += 1,
        }
    }
    (signals, malformed)
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::{
        http::StatusCode,
        routing::{get, post},
        Json, Router,
    };
    use std::sync::{Arc, Mutex};

    fn signal(domain: &str) -> Pheromone {
        Pheromone::builder(domain, "finding").origin("peer-a").build()
    }

    async fn spawn_peer(router: Router) -> String {
        let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        tokio::spawn(async move {
            axum::serve(listener, router).await.unwrap();
        });
        format!("http://{addr}")
    }

    fn client(peers: Vec<String>, timeout_ms: u64) -> GossipClient {
        GossipClient::new(GossipConfig {
            peers,
            timeout_ms,
        })
        .unwrap()
    }

    #[test]
    fn test_decode_signals_drops_bad_elements() {
        let good = signal("a");
        let mut out_of_range = signal("b");
        out_of_range.confidence = 3.0;
        let body = serde_json::to_vec(&serde_json::json!([
            good,
            out_of_range,
            {"id": "not-a-uuid"},
            42
        ]))
        .unwrap();

        let (signals, malformed) = decode_signals(&body);
        assert_eq!(signals.len(), 1);
        assert_eq!(signals[0].id, good.id);
        assert_eq!(malformed, 3);
    }

    #[test]
    fn test_decode_signals_non_array() {
        let (signals, malformed) = decode_signals(b"{\"ok\":true}");
        assert!(signals.is_empty());
        assert_eq!(malformed, 1);
    }

    #[test]
    fn test_decode_signal() {
        let good = signal("a");
        let body = serde_json::to_vec(&good).unwrap();
        assert_eq!(decode_signal(&body).unwrap().id, good.id);
        assert!(decode_signal(b"garbage").is_err());
    }

    #[tokio::test]
    async fn test_pull_collects_from_live_peers_only() {
        let known = vec![signal("a"), signal("b")];
        let served = known.clone();
        let peer = spawn_peer(Router::new().route(
            "/pheromones",
            get(move || {
                let served = served.clone();
                async move { Json(served) }
            }),
        ))
        .await;

        let gossip = client(vec![peer, "http://127.0.0.1:1".to_string()], 1000);
        let report = gossip.pull_all().await;

        assert_eq!(report.peers_ok, 1);
        assert_eq!(report.peers_failed, 1);
        assert_eq!(report.signals.len(), 2);
        assert_eq!(report.malformed, 0);
    }

    #[tokio::test]
    async fn test_push_delivers_and_counts_failures() {
        let received: Arc<Mutex<Vec<Pheromone>>> = Arc::new(Mutex::new(Vec::new()));
        let sink = received.clone();
        let peer = spawn_peer(Router::new().route(
            "/pheromone",
            post(move |Json(p): Json<Pheromone>| {
                let sink = sink.clone();
                async move {
                    sink.lock().unwrap().push(p);
                    Json(PushAck::accepted())
                }
            }),
        ))
        .await;

        let rejecting = spawn_peer(Router::new().route(
            "/pheromone",
            post(|| async { (StatusCode::BAD_REQUEST, Json(PushAck::rejected("stale"))) }),
        ))
        .await;

        let gossip = client(vec![peer, rejecting, "http://127.0.0.1:1".to_string()], 1000);
        let p = signal("a");
        let report = gossip.push_all(&p).await;

        assert_eq!(report, PushReport { delivered: 1, failed: 2 });
        assert_eq!(received.lock().unwrap()[0].id, p.id);
    }

    #[tokio::test]
    async fn test_slow_peer_is_bounded_by_timeout() {
        let slow = spawn_peer(Router::new().route(
            "/pheromones",
            get(|| async {
                tokio::time::sleep(Duration::from_secs(5)).await;
                Json(Vec::<Pheromone>::new())
            }),
        ))
        .await;

        let gossip = client(vec![slow], 200);
        let started = std::time::Instant::now();
        let report = gossip.pull_all().await;

        assert!(started.elapsed() < Duration::from_secs(2));
        assert_eq!(report.peers_failed, 1);
        assert!(report.signals.is_empty());
    }

    #[tokio::test]
    async fn test_no_peers_is_a_noop() {
        let gossip = client(Vec::new(), 100);
        assert_eq!(gossip.push_all(&signal("a")).await, PushReport::default());
        assert_eq!(gossip.pull_all().await.peers_ok, 0);
    }
}
