//! Phase-transition detector
//!
//! Each process decides on its own, from its own store, that the swarm has
//! synchronized. A declaration resets the store and the agent's sync
//! bookkeeping in one synchronous step, then raises a short-lived flag so
//! polling observers can see the edge. A lockout window keeps the detector
//! from re-firing while peers' stale copies drain away.
//!
//! There is no cross-process suppression. Several processes may declare at
//! nearly the same tick and each resets independently.

use chrono::{DateTime, Utc};
use rand::Rng;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use tracing::info;

use crate::{
    AgentState, Pheromone, PheromoneStore, LOCKOUT_TICKS, MIN_SYNCED_SIGNALS, SYNC_STRENGTH,
};

/// Observable detector state
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Phase {
    Quiescent,
    JustTransitioned,
}

/// Pre-reset capture handed to synthesis collaborators
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TransitionReport {
    pub agent_id: String,
    pub tick: u64,
    pub declared_at: DateTime<Utc>,
    pub density: f64,
    pub synced_signals: usize,
    pub signals: Vec<Pheromone>,
    pub domains: BTreeMap<String, usize>,
    pub synced_peers: Vec<String>,
    pub energy: f64,
    /// Own signals emitted during the closing cycle
    pub cycle_emissions: u64,
}

/// Detector tuning
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct PhaseConfig {
    pub sync_strength: f64,
    pub min_synced: usize,
    pub lockout_ticks: u64,
}

impl Default for PhaseConfig {
    fn default() -> Self {
        Self {
            sync_strength: SYNC_STRENGTH,
            min_synced: MIN_SYNCED_SIGNALS,
            lockout_ticks: LOCKOUT_TICKS,
        }
    }
}

/// Local phase-transition state machine
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PhaseDetector {
    config: PhaseConfig,
    transition_flag: bool,
    transition_tick: Option<u64>,
    lockout_until_tick: u64,
    transitions: u64,
}

impl PhaseDetector {
    pub fn new(config: PhaseConfig) -> Self {
        Self {
            config,
            transition_flag: false,
            transition_tick: None,
            lockout_until_tick: 0,
            transitions: 0,
        }
    }

    /// Whether `tick` is inside the lockout window
    pub fn is_locked_out(&self, tick: u64) -> bool {
        tick < self.lockout_until_tick
    }

    /// Whether the thresholds are met, ignoring lockout and flag
    pub fn thresholds_met(&self, store: &PheromoneStore) -> bool {
        store.density() >= store.critical_threshold()
            && store.synced_count(self.config.sync_strength) >= self.config.min_synced
    }

    /// Run the once-per-tick transition check.
    ///
    /// Expects the store's density to be current. On declaration the
    /// returned report reflects the store as it was before the reset.
    pub fn evaluate<R: Rng + ?Sized>(
        &mut self,
        tick: u64,
        store: &mut PheromoneStore,
        agent: &mut AgentState,
        now: DateTime<Utc>,
        rng: &mut R,
    ) -> Option<TransitionReport> {
        if self.is_locked_out(tick) || self.transition_flag {
            return None;
        }
        if !self.thresholds_met(store) {
            return None;
        }
        Some(self.declare(tick, store, agent, now, rng))
    }

    fn declare<R: Rng + ?Sized>(
        &mut self,
        tick: u64,
        store: &mut PheromoneStore,
        agent: &mut AgentState,
        now: DateTime<Utc>,
        rng: &mut R,
    ) -> TransitionReport {
        let report = TransitionReport {
            agent_id: agent.id.clone(),
            tick,
            declared_at: now,
            density: store.density(),
            synced_signals: store.synced_count(self.config.sync_strength),
            signals: store.to_vec(),
            domains: store.domain_histogram(),
            synced_peers: agent.synced_peers.iter().cloned().collect(),
            energy: agent.energy,
            cycle_emissions: agent.cycle_emissions,
        };

        self.lockout_until_tick = tick + self.config.lockout_ticks;
        store.reset(now);
        agent.reset_sync(rng);
        agent.last_transition_tick = Some(tick);
        agent.transitions += 1;

        self.transition_flag = true;
        self.transition_tick = Some(tick);
        self.transitions += 1;

        info!(
            "Phase transition declared at tick {} (density {:.3}, {} synced signals); locked out until tick {}",
            tick, report.density, report.synced_signals, self.lockout_until_tick
        );

        report
    }

    /// Clear the flag raised by the transition at `tick`.
    ///
    /// A clear scheduled for an older transition leaves a newer flag alone.
    pub fn clear_flag(&mut self, tick: u64) -> bool {
        if self.transition_flag && self.transition_tick == Some(tick) {
            self.transition_flag = false;
            true
        } else {
            false
        }
    }

    pub fn phase(&self) -> Phase {
        if self.transition_flag {
            Phase::JustTransitioned
        } else {
            Phase::Quiescent
        }
    }

    pub fn transition_flag(&self) -> bool {
        self.transition_flag
    }

    pub fn transition_tick(&self) -> Option<u64> {
        self.transition_tick
    }

    pub fn lockout_until_tick(&self) -> u64 {
        self.lockout_until_tick
    }

    /// Transitions declared by this process
    pub fn transitions(&self) -> u64 {
        self.transitions
    }
}

impl Default for PhaseDetector {
    fn default() -> Self {
        Self::new(PhaseConfig::default())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rand::rngs::StdRng;
    use rand::SeedableRng;
    use uuid::Uuid;

    /// Fill a store until density crosses the reference threshold
    fn saturated_store(threshold: f64) -> PheromoneStore {
        let mut store = PheromoneStore::new(threshold);
        for i in 0..12 {
            store.insert(
                Pheromone::builder("d", &format!("finding {i}"))
                    .origin("peer")
                    .strength(0.9)
                    .build(),
            );
        }
        store.recompute_density();
        store
    }

    #[test]
    fn test_declares_when_thresholds_met() {
        let mut rng = StdRng::seed_from_u64(1);
        let mut detector = PhaseDetector::default();
        let mut store = saturated_store(0.6);
        let mut agent = AgentState::new("me");
        agent.absorb(Uuid::new_v4(), "peer");

        // 12 signals at 0.9 => (12/24) * 0.9 * 1.5 = 0.675
        assert!(store.density() >= 0.6);

        let now = Utc::now();
        let report = detector
            .evaluate(40, &mut store, &mut agent, now, &mut rng)
            .expect("transition");

        assert_eq!(report.signals.len(), 12);
        assert_eq!(report.synced_peers, vec!["peer".to_string()]);
        assert!(report.density >= 0.6);

        assert!(store.is_empty());
        assert_eq!(store.density(), 0.0);
        assert_eq!(store.cycle_reset_at(), Some(now));
        assert!(agent.is_unsynced());
        assert_eq!(detector.lockout_until_tick(), 52);
        assert_eq!(detector.phase(), Phase::JustTransitioned);
        assert_eq!(detector.transition_tick(), Some(40));
    }

    #[test]
    fn test_reference_declaration_scenario() {
        // threshold 0.6, density 0.62, 4 strong signals
        let mut rng = StdRng::seed_from_u64(2);
        let mut detector = PhaseDetector::default();
        let mut store = PheromoneStore::new(0.6);
        for _ in 0..4 {
            store.insert(Pheromone::builder("d", "c").origin("p").strength(0.9).build());
        }
        for _ in 0..10 {
            store.insert(Pheromone::builder("d", "c").origin("p").strength(0.45).build());
        }
        // 14 active, avg (3.6 + 4.5) / 14 => (14/24) * (8.1/14) * 1.5 = 0.50625
        store.recompute_density();
        assert!(store.density() < 0.6);
        assert!(detector
            .evaluate(5, &mut store, &mut AgentState::new("me"), Utc::now(), &mut rng)
            .is_none());

        for _ in 0..2 {
            store.insert(Pheromone::builder("d", "c").origin("p").strength(0.45).build());
        }
        // 16 active, total 9.0 => (16/24) * (9/16) * 1.5 = 0.5625; one more strong
        store.insert(Pheromone::builder("d", "c").origin("p").strength(0.9).build());
        store.recompute_density();
        // 17 active, total 9.9 => 9.9 / 24 * 1.5 = 0.61875
        assert!((store.density() - 0.61875).abs() < 1e-9);

        let mut agent = AgentState::new("me");
        assert!(detector
            .evaluate(9, &mut store, &mut agent, Utc::now(), &mut rng)
            .is_some());
        assert!(store.is_empty());
        assert_eq!(detector.lockout_until_tick(), 21);
    }

    #[test]
    fn test_requires_synced_signals() {
        let mut rng = StdRng::seed_from_u64(3);
        let mut detector = PhaseDetector::default();
        // High density from signals that are all at or below the sync floor
        let mut store = PheromoneStore::new(0.1);
        for _ in 0..30 {
            store.insert(Pheromone::builder("d", "c").origin("p").strength(0.4).build());
        }
        store.recompute_density();
        assert!(store.density() >= 0.1);

        assert!(detector
            .evaluate(1, &mut store, &mut AgentState::new("me"), Utc::now(), &mut rng)
            .is_none());
        assert_eq!(store.len(), 30);
    }

    #[test]
    fn test_lockout_blocks_redeclaration() {
        let mut rng = StdRng::seed_from_u64(4);
        let mut detector = PhaseDetector::default();
        let mut agent = AgentState::new("me");

        let mut store = saturated_store(0.6);
        assert!(detector
            .evaluate(10, &mut store, &mut agent, Utc::now(), &mut rng)
            .is_some());
        detector.clear_flag(10);

        for tick in 11..22 {
            let mut refilled = saturated_store(0.6);
            assert!(detector.thresholds_met(&refilled));
            assert!(
                detector
                    .evaluate(tick, &mut refilled, &mut agent, Utc::now(), &mut rng)
                    .is_none(),
                "declared inside lockout at tick {tick}"
            );
            assert_eq!(refilled.len(), 12);
        }

        let mut refilled = saturated_store(0.6);
        assert!(detector
            .evaluate(22, &mut refilled, &mut agent, Utc::now(), &mut rng)
            .is_some());
        assert_eq!(detector.transitions(), 2);
    }

    #[test]
    fn test_flag_blocks_until_cleared() {
        let mut rng = StdRng::seed_from_u64(5);
        let mut detector = PhaseDetector::new(PhaseConfig {
            lockout_ticks: 0,
            ..PhaseConfig::default()
        });
        let mut agent = AgentState::new("me");

        let mut store = saturated_store(0.6);
        assert!(detector.evaluate(1, &mut store, &mut agent, Utc::now(), &mut rng).is_some());

        let mut refilled = saturated_store(0.6);
        assert!(detector.evaluate(2, &mut refilled, &mut agent, Utc::now(), &mut rng).is_none());

        assert!(!detector.clear_flag(0));
        assert!(detector.clear_flag(1));
        assert_eq!(detector.phase(), Phase::Quiescent);
        assert!(detector.evaluate(3, &mut refilled, &mut agent, Utc::now(), &mut rng).is_some());
    }
}
