//! Pheromones - the gossiped unit of shared discovery state
//!
//! A pheromone is immutable once created apart from two fields:
//! - `strength` only ever decreases, as the signal goes stale
//! - `attestation` may be upgraded from the local hash to an external commitment
//!
//! `confidence` is the originator's certainty and never changes. It is
//! unrelated to `strength`, which only tracks propagation freshness.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};
use thiserror::Error;
use uuid::Uuid;

/// Reasons an inbound pheromone is rejected before insertion
#[derive(Debug, Error, PartialEq)]
pub enum PheromoneError {
    #[error("confidence {0} outside [0, 1]")]
    Confidence(f64),

    #[error("strength {0} outside [0, 1]")]
    Strength(f64),

    #[error("missing origin agent id")]
    MissingOrigin,

    #[error("missing domain")]
    MissingDomain,
}

/// A pheromone signal
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Pheromone {
    /// Globally unique signal id
    pub id: Uuid,

    /// Agent that created this signal
    pub origin_agent_id: String,

    /// Short topic label used for grouping
    pub domain: String,

    /// Opaque finding payload
    pub content: String,

    /// Originator's certainty (0.0 - 1.0), fixed at creation
    pub confidence: f64,

    /// Propagation freshness (0.0 - 1.0), only decreases
    pub strength: f64,

    /// Creation timestamp
    pub created_at: DateTime<Utc>,

    /// Local content hash, or an external commitment once attested
    pub attestation: String,
}

impl Pheromone {
    /// Create a new pheromone builder
    pub fn builder(domain: &str, content: &str) -> PheromoneBuilder {
        PheromoneBuilder::new(domain, content)
    }

    /// Multiply strength by `1 - rate`. Strength never increases.
    pub fn decay(&mut self, rate: f64) {
        let factor = (1.0 - rate).clamp(0.0, 1.0);
        self.strength = (self.strength * factor).max(0.0);
    }

    /// Check the fields a peer could have corrupted
    pub fn validate(&self) -> Result<(), PheromoneError> {
        if !(0.0..=1.0).contains(&self.confidence) {
            return Err(PheromoneError::Confidence(self.confidence));
        }
        if !(0.0..=1.0).contains(&self.strength) {
            return Err(PheromoneError::Strength(self.strength));
        }
        if self.origin_agent_id.trim().is_empty() {
            return Err(PheromoneError::MissingOrigin);
        }
        if self.domain.trim().is_empty() {
            return Err(PheromoneError::MissingDomain);
        }
        Ok(())
    }

    /// Whether the attestation is still the locally computed hash
    pub fn is_locally_attested(&self) -> bool {
        self.attestation == Self::local_attestation(self)
    }

    /// Payload handed to an external attestation service
    pub fn attestation_payload(&self) -> serde_json::Value {
        serde_json::json!({
            "id": self.id,
            "origin_agent_id": self.origin_agent_id,
            "domain": self.domain,
            "content": self.content,
            "confidence": self.confidence,
            "created_at": self.created_at,
            "hash": Self::local_attestation(self),
        })
    }

    /// SHA-256 over the immutable fields
    pub fn local_attestation(&self) -> String {
        compute_hash(
            &self.id,
            &self.origin_agent_id,
            &self.domain,
            &self.content,
            &self.created_at,
        )
    }
}

fn compute_hash(
    id: &Uuid,
    origin: &str,
    domain: &str,
    content: &str,
    created_at: &DateTime<Utc>,
) -> String {
    let mut hasher = Sha256::new();
    hasher.update(id.as_bytes());
    hasher.update(origin.as_bytes());
    hasher.update(domain.as_bytes());
    hasher.update(content.as_bytes());
    hasher.update(created_at.to_rfc3339().as_bytes());
    format!("{:x}", hasher.finalize())
}

/// Builder for pheromones
pub struct PheromoneBuilder {
    domain: String,
    content: String,
    confidence: f64,
    strength: f64,
    origin_agent_id: String,
    created_at: Option<DateTime<Utc>>,
}

impl PheromoneBuilder {
    pub fn new(domain: &str, content: &str) -> Self {
        Self {
            domain: domain.to_string(),
            content: content.to_string(),
            confidence: 0.5,
            strength: 1.0,
            origin_agent_id: String::new(),
            created_at: None,
        }
    }

    pub fn confidence(mut self, confidence: f64) -> Self {
        self.confidence = confidence.clamp(0.0, 1.0);
        self
    }

    pub fn strength(mut self, strength: f64) -> Self {
        self.strength = strength.clamp(0.0, 1.0);
        self
    }

    pub fn origin(mut self, agent_id: &str) -> Self {
        self.origin_agent_id = agent_id.to_string();
        self
    }

    /// Override the creation instant (replayed or synthetic signals)
    pub fn created_at(mut self, at: DateTime<Utc>) -> Self {
        self.created_at = Some(at);
        self
    }

    pub fn build(self) -> Pheromone {
        let id = Uuid::new_v4();
        let created_at = self.created_at.unwrap_or_else(Utc::now);
        let attestation = compute_hash(
            &id,
            &self.origin_agent_id,
            &self.domain,
            &self.content,
            &created_at,
        );

        Pheromone {
            id,
            origin_agent_id: self.origin_agent_id,
            domain: self.domain,
            content: self.content,
            confidence: self.confidence,
            strength: self.strength,
            created_at,
            attestation,
        }
    }
}
