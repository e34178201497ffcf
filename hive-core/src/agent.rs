//! Agent state - the local agent's synchronization bookkeeping
//!
//! Tracks which peers this agent has synchronized with during the current
//! cycle, which foreign signals it has absorbed, its energy, and a short
//! window of recent actions used by the decision scorer.

use rand::Rng;
use serde::{Deserialize, Serialize};
use std::collections::{BTreeSet, HashSet, VecDeque};
use uuid::Uuid;

/// Number of recent actions remembered
pub const ACTION_WINDOW: usize = 16;

/// Energy range an agent is re-seeded into after a reset
pub const RESET_ENERGY: std::ops::RangeInclusive<f64> = 0.1..=0.3;

/// Actions an agent can take on a tick
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ActionKind {
    Scan,
    Absorb,
    Explore,
    Adapt,
    Analyze,
    Correlate,
}

impl ActionKind {
    pub const ALL: [ActionKind; 6] = [
        ActionKind::Scan,
        ActionKind::Absorb,
        ActionKind::Explore,
        ActionKind::Adapt,
        ActionKind::Analyze,
        ActionKind::Correlate,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            ActionKind::Scan => "scan",
            ActionKind::Absorb => "absorb",
            ActionKind::Explore => "explore",
            ActionKind::Adapt => "adapt",
            ActionKind::Analyze => "analyze",
            ActionKind::Correlate => "correlate",
        }
    }

    /// Capability class gating this action
    pub fn class(&self) -> ActionClass {
        match self {
            ActionKind::Scan | ActionKind::Absorb => ActionClass::Passive,
            ActionKind::Explore | ActionKind::Adapt => ActionClass::Light,
            ActionKind::Analyze | ActionKind::Correlate => ActionClass::Heavy,
        }
    }

    /// Actions that build on other agents' work
    pub fn is_collective(&self) -> bool {
        matches!(self, ActionKind::Absorb | ActionKind::Correlate)
    }
}

impl std::str::FromStr for ActionKind {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        ActionKind::ALL
            .into_iter()
            .find(|k| k.as_str() == s)
            .ok_or_else(|| format!("unknown action: {s}"))
    }
}

/// Capability classes, cheapest first
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ActionClass {
    /// Local bookkeeping only
    Passive,
    /// External data, no generation
    Light,
    /// Requires generation
    Heavy,
}

/// One remembered action
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct ActionRecord {
    pub tick: u64,
    pub kind: ActionKind,
    /// Whether the action emitted or absorbed anything
    pub productive: bool,
}

/// The local agent's state
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AgentState {
    /// Agent identity, also the origin id of emitted signals
    pub id: String,
    /// Activity level (0.0 - 1.0)
    pub energy: f64,
    /// Peers whose signals were absorbed this cycle
    pub synced_peers: BTreeSet<String>,
    /// Foreign signals absorbed this cycle
    pub absorbed: HashSet<Uuid>,
    /// Recent actions, oldest first
    pub recent_actions: VecDeque<ActionRecord>,
    /// Reasoning calls completed
    pub thoughts: u64,
    /// Signals emitted over the agent's lifetime
    pub signals_emitted: u64,
    /// Signals emitted since the last reset
    pub cycle_emissions: u64,
    /// Tick of the last transition this agent declared
    pub last_transition_tick: Option<u64>,
    /// Transitions declared over the agent's lifetime
    pub transitions: u64,
}

impl AgentState {
    pub fn new(id: &str) -> Self {
        Self {
            id: id.to_string(),
            energy: 1.0,
            synced_peers: BTreeSet::new(),
            absorbed: HashSet::new(),
            recent_actions: VecDeque::with_capacity(ACTION_WINDOW),
            thoughts: 0,
            signals_emitted: 0,
            cycle_emissions: 0,
            last_transition_tick: None,
            transitions: 0,
        }
    }

    /// Record an action taken on `tick`
    pub fn record_action(&mut self, tick: u64, kind: ActionKind, productive: bool) {
        if self.recent_actions.len() == ACTION_WINDOW {
            self.recent_actions.pop_front();
        }
        self.recent_actions.push_back(ActionRecord {
            tick,
            kind,
            productive,
        });
    }

    /// Tick on which `kind` was last taken, if still in the window
    pub fn last_taken(&self, kind: ActionKind) -> Option<u64> {
        self.recent_actions
            .iter()
            .rev()
            .find(|r| r.kind == kind)
            .map(|r| r.tick)
    }

    /// Record an own emission
    pub fn record_emission(&mut self) {
        self.signals_emitted += 1;
        self.cycle_emissions += 1;
    }

    /// Absorb a foreign signal. Returns false if already absorbed or own.
    pub fn absorb(&mut self, id: Uuid, origin: &str) -> bool {
        if origin == self.id || !self.absorbed.insert(id) {
            return false;
        }
        self.synced_peers.insert(origin.to_string());
        self.energy = (self.energy + 0.05).min(1.0);
        true
    }

    /// Clear synchronization bookkeeping after a transition
    pub fn reset_sync<R: Rng + ?Sized>(&mut self, rng: &mut R) {
        self.synced_peers.clear();
        self.absorbed.clear();
        self.cycle_emissions = 0;
        self.energy = rng.gen_range(RESET_ENERGY);
    }

    /// Whether the sync bookkeeping is empty
    pub fn is_unsynced(&self) -> bool {
        self.synced_peers.is_empty() && self.absorbed.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rand::rngs::StdRng;
    use rand::SeedableRng;

    #[test]
    fn test_action_window_is_bounded() {
        let mut agent = AgentState::new("a");
        for tick in 0..40 {
            agent.record_action(tick, ActionKind::Scan, false);
        }
        assert_eq!(agent.recent_actions.len(), ACTION_WINDOW);
        assert_eq!(agent.last_taken(ActionKind::Scan), Some(39));
        assert_eq!(agent.last_taken(ActionKind::Analyze), None);
    }

    #[test]
    fn test_absorb_ignores_own_and_repeats() {
        let mut agent = AgentState::new("a");
        let id = Uuid::new_v4();

        assert!(!agent.absorb(Uuid::new_v4(), "a"));
        assert!(agent.absorb(id, "b"));
        assert!(!agent.absorb(id, "b"));
        assert_eq!(agent.synced_peers.len(), 1);
        assert_eq!(agent.absorbed.len(), 1);
    }

    #[test]
    fn test_reset_sync_reseeds_energy() {
        let mut rng = StdRng::seed_from_u64(7);
        let mut agent = AgentState::new("a");
        agent.absorb(Uuid::new_v4(), "b");
        agent.record_emission();

        agent.reset_sync(&mut rng);
        assert!(agent.is_unsynced());
        assert_eq!(agent.cycle_emissions, 0);
        assert_eq!(agent.signals_emitted, 1);
        assert!(RESET_ENERGY.contains(&agent.energy));
    }

    #[test]
    fn test_action_classes() {
        assert_eq!(ActionKind::Scan.class(), ActionClass::Passive);
        assert_eq!(ActionKind::Explore.class(), ActionClass::Light);
        assert_eq!(ActionKind::Correlate.class(), ActionClass::Heavy);
        assert!(ActionClass::Passive < ActionClass::Heavy);
        assert_eq!("absorb".parse::<ActionKind>(), Ok(ActionKind::Absorb));
    }
}
