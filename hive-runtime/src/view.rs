//! Read-only views published by the tick loop

use serde::Serialize;
use std::collections::BTreeMap;

use hive_core::{ActionKind, CreditSnapshot, Phase, Pheromone};

use crate::NodeState;

/// Snapshot of node state republished after every mutation
#[derive(Debug, Clone, Serialize)]
pub struct NodeView {
    pub agent_id: String,
    pub persona: String,
    pub tick: u64,
    pub density: f64,
    pub phase: Phase,
    pub transition_flag: bool,
    pub transition_tick: Option<u64>,
    pub critical_threshold: f64,
    pub lockout_until_tick: u64,
    pub signal_count: usize,
    /// Mean strength of held signals
    pub avg_strength: f64,
    pub thoughts: u64,
    pub signals_emitted: u64,
    pub energy: f64,
    pub synced_peers: usize,
    pub credits: CreditSnapshot,
    /// Transitions declared by this process
    pub transitions: u64,
    pub domains: BTreeMap<String, usize>,
    pub last_action: Option<ActionKind>,
    /// Store contents, served by `GET /pheromones`
    #[serde(skip)]
    pub signals: Vec<Pheromone>,
}

impl NodeView {
    pub fn capture(state: &NodeState) -> Self {
        let stats = state.store.stats();
        Self {
            agent_id: state.agent.id.clone(),
            persona: state.persona.persona.id.clone(),
            tick: state.tick,
            density: state.store.density(),
            phase: state.detector.phase(),
            transition_flag: state.detector.transition_flag(),
            transition_tick: state.detector.transition_tick(),
            critical_threshold: state.store.critical_threshold(),
            lockout_until_tick: state.detector.lockout_until_tick(),
            signal_count: stats.signals,
            avg_strength: stats.avg_strength,
            thoughts: state.agent.thoughts,
            signals_emitted: state.agent.signals_emitted,
            energy: state.agent.energy,
            synced_peers: state.agent.synced_peers.len(),
            credits: state.ledger.snapshot(),
            transitions: state.detector.transitions(),
            domains: state.store.domain_histogram(),
            last_action: state.last_action,
            signals: state.store.to_vec(),
        }
    }
}

/// `GET /health` body
#[derive(Debug, Clone, Serialize)]
pub struct Health {
    pub status: &'static str,
    pub agent_id: String,
    pub tick: u64,
}

impl From<&NodeView> for Health {
    fn from(view: &NodeView) -> Self {
        Self {
            status: "ok",
            agent_id: view.agent_id.clone(),
            tick: view.tick,
        }
    }
}
