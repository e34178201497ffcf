//! Hive Core - pheromone signals and the local synchronization model
//!
//! This crate provides the foundational primitives:
//! - Gossiped pheromone signals with multiplicative decay
//! - The per-process pheromone store with cycle-reset staleness filtering
//! - Density estimation over the store
//! - The phase-transition detector and its reset/lockout protocol
//! - The credit economy that gates agent capabilities
//!
//! Everything here is synchronous and free of I/O. The runtime owns one
//! instance of each and mutates them from a single tick loop.

pub mod agent;
pub mod density;
pub mod economy;
pub mod phase;
pub mod pheromone;
pub mod store;

pub use agent::*;
pub use density::*;
pub use economy::*;
pub use phase::*;
pub use pheromone::*;
pub use store::*;

/// Default per-tick decay rate
pub const DEFAULT_DECAY_RATE: f64 = 0.1;

/// Signals at or below this strength are pruned during decay
pub const PRUNE_FLOOR: f64 = 0.05;

/// Signals above this strength count towards density
pub const ACTIVE_STRENGTH: f64 = 0.1;

/// Signals above this strength count as synchronized for transition checks
pub const SYNC_STRENGTH: f64 = 0.4;

/// Reference swarm breadth used to normalise density
pub const DENSITY_NORMALIZER: f64 = 24.0;

/// Density multiplier
pub const DENSITY_SCALE: f64 = 1.5;

/// Default density at which a transition may be declared
pub const DEFAULT_CRITICAL_THRESHOLD: f64 = 0.6;

/// Minimum synchronized signals required to declare a transition
pub const MIN_SYNCED_SIGNALS: usize = 3;

/// Ticks during which a new transition cannot be declared
pub const LOCKOUT_TICKS: u64 = 12;
