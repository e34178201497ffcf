//! Pheromone Store - the per-process view of the swarm's signals
//!
//! The store is the only place signals live inside a process:
//! - Own and gossiped signals are inserted keyed by id
//! - Signals from a cycle that ended at the last reset are rejected
//! - Strength decays each tick and faded signals are pruned
//! - Density is derived from the contents after every decay
//!
//! Every copy is local. Pruning or resetting here never affects peers.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, HashMap};
use uuid::Uuid;

use crate::{density, DensityParams, Pheromone, DEFAULT_CRITICAL_THRESHOLD, PRUNE_FLOOR};

/// Result of an insertion attempt
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum InsertOutcome {
    /// Stored as a new signal
    Inserted,
    /// Id already present, existing copy kept
    Duplicate,
    /// Created at or before the last cycle reset
    Stale,
}

impl InsertOutcome {
    pub fn is_inserted(self) -> bool {
        matches!(self, InsertOutcome::Inserted)
    }
}

/// The per-process signal store
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PheromoneStore {
    /// Active signals (id -> pheromone)
    signals: HashMap<Uuid, Pheromone>,

    /// Last computed density
    density: f64,

    /// Density at which a transition may be declared
    critical_threshold: f64,

    /// Instant of the last reset; older signals belong to a dead cycle
    cycle_reset_at: Option<DateTime<Utc>>,

    /// Density formula parameters
    params: DensityParams,
}

impl PheromoneStore {
    /// Create an empty store
    pub fn new(critical_threshold: f64) -> Self {
        Self {
            signals: HashMap::new(),
            density: 0.0,
            critical_threshold,
            cycle_reset_at: None,
            params: DensityParams::default(),
        }
    }

    /// Use non-reference density parameters
    pub fn with_params(mut self, params: DensityParams) -> Self {
        self.params = params;
        self
    }

    /// Insert a signal unless it is a duplicate or from a stale cycle.
    ///
    /// The cycle boundary is exclusive: a signal created exactly at the
    /// reset instant is stale.
    pub fn insert(&mut self, signal: Pheromone) -> InsertOutcome {
        if self.is_stale(&signal) {
            return InsertOutcome::Stale;
        }
        if self.signals.contains_key(&signal.id) {
            return InsertOutcome::Duplicate;
        }
        self.signals.insert(signal.id, signal);
        InsertOutcome::Inserted
    }

    /// Whether a signal predates the current cycle
    pub fn is_stale(&self, signal: &Pheromone) -> bool {
        self.cycle_reset_at
            .is_some_and(|reset| signal.created_at <= reset)
    }

    /// Apply one tick of decay and prune faded signals
    pub fn decay(&mut self, rate: f64) -> DecayReport {
        for signal in self.signals.values_mut() {
            signal.decay(rate);
        }

        let before = self.signals.len();
        self.signals.retain(|_, s| s.strength > PRUNE_FLOOR);

        DecayReport {
            pruned: before - self.signals.len(),
            remaining: self.signals.len(),
        }
    }

    /// Recompute and cache density from the current contents
    pub fn recompute_density(&mut self) -> f64 {
        self.density = density::estimate(self.signals.values(), &self.params);
        self.density
    }

    /// Drop every signal and start a new cycle at `now`
    pub fn reset(&mut self, now: DateTime<Utc>) {
        self.signals.clear();
        self.density = 0.0;
        self.cycle_reset_at = Some(now);
    }

    /// Replace a signal's attestation with an external commitment
    pub fn attest(&mut self, id: &Uuid, commitment: String) -> bool {
        match self.signals.get_mut(id) {
            Some(signal) => {
                signal.attestation = commitment;
                true
            }
            None => false,
        }
    }

    /// Get a signal by id
    pub fn get(&self, id: &Uuid) -> Option<&Pheromone> {
        self.signals.get(id)
    }

    pub fn contains(&self, id: &Uuid) -> bool {
        self.signals.contains_key(id)
    }

    /// Iterate over stored signals in no particular order
    pub fn iter(&self) -> impl Iterator<Item = &Pheromone> {
        self.signals.values()
    }

    /// Signals matching a predicate
    pub fn sense_where<F>(&self, predicate: F) -> Vec<&Pheromone>
    where
        F: Fn(&Pheromone) -> bool,
    {
        self.signals.values().filter(|s| predicate(s)).collect()
    }

    /// Snapshot of all signals ordered by creation time (for display and gossip)
    pub fn to_vec(&self) -> Vec<Pheromone> {
        let mut signals: Vec<_> = self.signals.values().cloned().collect();
        signals.sort_by(|a, b| a.created_at.cmp(&b.created_at).then(a.id.cmp(&b.id)));
        signals
    }

    /// Count of stored signals
    pub fn len(&self) -> usize {
        self.signals.len()
    }

    pub fn is_empty(&self) -> bool {
        self.signals.is_empty()
    }

    /// Count of signals above a strength floor
    pub fn synced_count(&self, floor: f64) -> usize {
        density::synced_count(self.signals.values(), floor)
    }

    pub fn density(&self) -> f64 {
        self.density
    }

    pub fn critical_threshold(&self) -> f64 {
        self.critical_threshold
    }

    pub fn cycle_reset_at(&self) -> Option<DateTime<Utc>> {
        self.cycle_reset_at
    }

    /// Signal count per domain
    pub fn domain_histogram(&self) -> BTreeMap<String, usize> {
        let mut histogram = BTreeMap::new();
        for signal in self.signals.values() {
            *histogram.entry(signal.domain.clone()).or_insert(0) += 1;
        }
        histogram
    }

    /// Get store statistics
    pub fn stats(&self) -> StoreStats {
        let total_strength: f64 = self.signals.values().map(|s| s.strength).sum();
        let avg_strength = if self.signals.is_empty() {
            0.0
        } else {
            total_strength / self.signals.len() as f64
        };

        StoreStats {
            signals: self.signals.len(),
            avg_strength,
            density: self.density,
            domains: self.domain_histogram().len(),
        }
    }
}

impl Default for PheromoneStore {
    fn default() -> Self {
        Self::new(DEFAULT_CRITICAL_THRESHOLD)
    }
}

/// Result of a decay pass
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct DecayReport {
    pub pruned: usize,
    pub remaining: usize,
}

/// Store statistics
#[derive(Debug, Clone, Serialize)]
pub struct StoreStats {
    pub signals: usize,
    pub avg_strength: f64,
    pub density: f64,
    pub domains: usize,
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Duration;

    fn signal(strength: f64) -> Pheromone {
        Pheromone::builder("ocean", "salinity drop")
            .origin("agent-1")
            .strength(strength)
            .build()
    }

    #[test]
    fn test_insert_and_dedupe() {
        let mut store = PheromoneStore::default();
        let p = signal(1.0);

        assert_eq!(store.insert(p.clone()), InsertOutcome::Inserted);
        assert_eq!(store.insert(p.clone()), InsertOutcome::Duplicate);
        assert_eq!(store.len(), 1);
        assert!(store.contains(&p.id));
    }

    #[test]
    fn test_duplicate_keeps_existing_copy() {
        let mut store = PheromoneStore::default();
        let p = signal(1.0);
        store.insert(p.clone());
        store.decay(0.5);

        let mut fresh = p.clone();
        fresh.strength = 1.0;
        store.insert(fresh);
        assert!((store.get(&p.id).unwrap().strength - 0.5).abs() < 1e-12);
    }

    #[test]
    fn test_staleness_rejection() {
        let mut store = PheromoneStore::default();
        let reset = Utc::now();
        store.reset(reset);

        let before = Pheromone::builder("d", "old")
            .origin("peer")
            .created_at(reset - Duration::seconds(30))
            .build();
        assert_eq!(store.insert(before), InsertOutcome::Stale);

        let after = Pheromone::builder("d", "new")
            .origin("peer")
            .created_at(reset + Duration::milliseconds(1))
            .build();
        assert_eq!(store.insert(after), InsertOutcome::Inserted);
    }

    #[test]
    fn test_reset_boundary_is_exclusive() {
        let mut store = PheromoneStore::default();
        let reset = Utc::now();
        store.reset(reset);

        let at_boundary = Pheromone::builder("d", "edge")
            .origin("peer")
            .created_at(reset)
            .build();
        assert_eq!(store.insert(at_boundary), InsertOutcome::Stale);
        assert!(store.is_empty());
    }

    #[test]
    fn test_no_reset_accepts_anything() {
        let mut store = PheromoneStore::default();
        let ancient = Pheromone::builder("d", "c")
            .origin("peer")
            .created_at(Utc::now() - Duration::days(365))
            .build();
        assert!(store.insert(ancient).is_inserted());
    }

    #[test]
    fn test_decay_monotonic_and_prunes() {
        let mut store = PheromoneStore::default();
        let p = signal(1.0);
        let id = p.id;
        store.insert(p);

        let mut last = 1.0;
        let mut ticks = 0;
        while store.contains(&id) {
            let current = store.get(&id).unwrap().strength;
            assert!(current <= last);
            last = current;
            store.decay(0.1);
            ticks += 1;
            assert!(ticks < 100, "signal never pruned");
        }
        assert!(last > PRUNE_FLOOR);
    }

    #[test]
    fn test_faded_signal_gone_next_tick() {
        let mut store = PheromoneStore::default();
        store.insert(signal(0.055));
        let report = store.decay(0.1);
        assert_eq!(report.pruned, 1);
        assert!(store.is_empty());
    }

    #[test]
    fn test_reset_clears_everything() {
        let mut store = PheromoneStore::default();
        for _ in 0..10 {
            store.insert(signal(0.9));
        }
        store.recompute_density();
        assert!(store.density() > 0.0);

        let now = Utc::now();
        store.reset(now);
        assert!(store.is_empty());
        assert_eq!(store.density(), 0.0);
        assert_eq!(store.cycle_reset_at(), Some(now));
    }

    #[test]
    fn test_attest_updates_in_place() {
        let mut store = PheromoneStore::default();
        let p = signal(1.0);
        let id = p.id;
        store.insert(p);

        assert!(store.attest(&id, "commitment-1".to_string()));
        assert_eq!(store.get(&id).unwrap().attestation, "commitment-1");
        assert!(!store.attest(&Uuid::new_v4(), "x".to_string()));
    }

    #[test]
    fn test_histogram_and_ordering() {
        let mut store = PheromoneStore::default();
        let t0 = Utc::now();
        for (i, domain) in ["a", "b", "a"].iter().enumerate() {
            store.insert(
                Pheromone::builder(domain, "c")
                    .origin("x")
                    .created_at(t0 + Duration::seconds(i as i64))
                    .build(),
            );
        }

        let histogram = store.domain_histogram();
        assert_eq!(histogram["a"], 2);
        assert_eq!(histogram["b"], 1);

        let ordered = store.to_vec();
        assert!(ordered.windows(2).all(|w| w[0].created_at <= w[1].created_at));
    }
}
