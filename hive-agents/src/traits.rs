//! Collaborator interfaces consumed by agents
//!
//! Reasoning, dataset fetching, attestation and synthesis live outside the
//! core. Agents only see these traits; every failure is caught by the caller
//! and degrades the tick instead of stopping it.

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use thiserror::Error;

use hive_core::TransitionReport;

/// Errors from agent operations and collaborators
#[derive(Debug, Error)]
pub enum AgentError {
    #[error("LLM error: {0}")]
    Llm(String),

    #[error("Network error: {0}")]
    Network(String),

    #[error("Parse error: {0}")]
    Parse(String),

    #[error("No work available")]
    NoWork,

    #[error("Collaborator unavailable: {0}")]
    Unavailable(&'static str),
}

/// Input to a reasoning call
#[derive(Debug, Clone, Serialize)]
pub struct ThinkContext {
    pub agent_id: String,
    pub domain: String,
    /// Task description
    pub task: String,
    /// Evidence lines handed to the reasoner
    pub evidence: Vec<String>,
    /// Upper bound on generated tokens for this call
    pub max_tokens: u32,
}

/// Output of a reasoning call
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Thought {
    /// The reasoning artifact (becomes signal content)
    pub artifact: String,
    /// Reasoner's self-reported confidence (0.0 - 1.0)
    pub confidence: f64,
    /// Resource units consumed by the call
    pub tokens_consumed: u64,
}

/// A fetched dataset
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Dataset {
    pub topic: String,
    pub source: String,
    /// Short human-readable digest of the records
    pub summary: String,
    pub record_count: usize,
}

/// Reasoning collaborator
#[async_trait]
pub trait Reasoner: Send + Sync {
    async fn think(&self, context: &ThinkContext) -> Result<Thought, AgentError>;
}

/// Dataset-fetch collaborator. `Ok(None)` means nothing was available.
#[async_trait]
pub trait DatasetFetcher: Send + Sync {
    async fn fetch(&self, topic: &str) -> Result<Option<Dataset>, AgentError>;
}

/// Attestation collaborator: turns a payload into an external commitment
#[async_trait]
pub trait Attestor: Send + Sync {
    async fn disperse(&self, payload: &serde_json::Value) -> Result<String, AgentError>;
}

/// Synthesis collaborator run on every declared transition
#[async_trait]
pub trait Synthesizer: Send + Sync {
    async fn synthesize(&self, report: &TransitionReport) -> Result<String, AgentError>;
}

pub type SharedReasoner = Arc<dyn Reasoner>;
pub type SharedFetcher = Arc<dyn DatasetFetcher>;
pub type SharedAttestor = Arc<dyn Attestor>;
pub type SharedSynthesizer = Arc<dyn Synthesizer>;

/// The optional collaborators available to an agent
#[derive(Clone, Default)]
pub struct Collaborators {
    pub reasoner: Option<SharedReasoner>,
    pub fetcher: Option<SharedFetcher>,
    pub attestor: Option<SharedAttestor>,
    pub synthesizer: Option<SharedSynthesizer>,
}

impl std::fmt::Debug for Collaborators {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Collaborators")
            .field("reasoner", &self.reasoner.is_some())
            .field("fetcher", &self.fetcher.is_some())
            .field("attestor", &self.attestor.is_some())
            .field("synthesizer", &self.synthesizer.is_some())
            .finish()
    }
}
