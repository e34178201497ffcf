//! Node configuration

use std::path::PathBuf;
use thiserror::Error;

use hive_agents::{DEFAULT_TEMPERATURE, DEFAULT_TOKEN_BUDGET};
use hive_core::{
    DEFAULT_CRITICAL_THRESHOLD, DEFAULT_DECAY_RATE, DEFAULT_STARTING_BALANCE,
    DEFAULT_UNITS_PER_CREDIT,
};
use hive_gossip::DEFAULT_PEER_TIMEOUT_MS;

/// Ticks between periodic snapshots
pub const DEFAULT_SNAPSHOT_EVERY: u64 = 10;

/// How long a transition flag stays raised
pub const DEFAULT_FLAG_HOLD_MS: u64 = 5000;

/// Invalid configuration
#[derive(Debug, Error, PartialEq)]
pub enum ConfigError {
    #[error("agent id must not be empty")]
    EmptyAgentId,

    #[error("tick interval must be positive")]
    ZeroTick,

    #[error("decay rate must be in [0, 1), got {0}")]
    DecayRate(f64),

    #[error("critical threshold must be in (0, 1], got {0}")]
    Threshold(f64),

    #[error("starting balance must be non-negative, got {0}")]
    StartingBalance(f64),

    #[error("units per credit must be positive, got {0}")]
    UnitsPerCredit(f64),
}

/// Everything a node needs to start
#[derive(Debug, Clone)]
pub struct NodeConfig {
    /// Agent identity, also the origin id on emitted signals
    pub agent_id: String,
    /// Listen address for the peer protocol
    pub bind: String,
    /// Peer base URLs
    pub peers: Vec<String>,
    pub tick_interval_ms: u64,
    pub decay_rate: f64,
    pub critical_threshold: f64,
    pub starting_balance: f64,
    /// Resource units per credit
    pub units_per_credit: f64,
    /// Generation budget per call at full tier
    pub token_budget: u32,
    pub gossip_timeout_ms: u64,
    /// Where snapshots go; `None` disables persistence
    pub snapshot_dir: Option<PathBuf>,
    pub snapshot_every: u64,
    pub flag_hold_ms: u64,
    /// Scorer softmax temperature
    pub temperature: f64,
    /// Fixed RNG seed (tests and replays)
    pub seed: Option<u64>,
}

impl Default for NodeConfig {
    fn default() -> Self {
        Self {
            agent_id: "agent-1".to_string(),
            bind: "0.0.0.0:7070".to_string(),
            peers: Vec::new(),
            tick_interval_ms: 1000,
            decay_rate: DEFAULT_DECAY_RATE,
            critical_threshold: DEFAULT_CRITICAL_THRESHOLD,
            starting_balance: DEFAULT_STARTING_BALANCE,
            units_per_credit: DEFAULT_UNITS_PER_CREDIT,
            token_budget: DEFAULT_TOKEN_BUDGET,
            gossip_timeout_ms: DEFAULT_PEER_TIMEOUT_MS,
            snapshot_dir: None,
            snapshot_every: DEFAULT_SNAPSHOT_EVERY,
            flag_hold_ms: DEFAULT_FLAG_HOLD_MS,
            temperature: DEFAULT_TEMPERATURE,
            seed: None,
        }
    }
}

impl NodeConfig {
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.agent_id.trim().is_empty() {
            return Err(ConfigError::EmptyAgentId);
        }
        if self.tick_interval_ms == 0 {
            return Err(ConfigError::ZeroTick);
        }
        if !(0.0..1.0).contains(&self.decay_rate) {
            return Err(ConfigError::DecayRate(self.decay_rate));
        }
        if !(self.critical_threshold > 0.0 && self.critical_threshold <= 1.0) {
            return Err(ConfigError::Threshold(self.critical_threshold));
        }
        if !(self.starting_balance >= 0.0) {
            return Err(ConfigError::StartingBalance(self.starting_balance));
        }
        if !(self.units_per_credit > 0.0) {
            return Err(ConfigError::UnitsPerCredit(self.units_per_credit));
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_is_valid() {
        assert_eq!(NodeConfig::default().validate(), Ok(()));
    }

    #[test]
    fn test_rejects_bad_values() {
        let bad = NodeConfig {
            decay_rate: 1.0,
            ..Default::default()
        };
        assert_eq!(bad.validate(), Err(ConfigError::DecayRate(1.0)));

        let bad = NodeConfig {
            critical_threshold: 0.0,
            ..Default::default()
        };
        assert_eq!(bad.validate(), Err(ConfigError::Threshold(0.0)));

        let bad = NodeConfig {
            agent_id: "  ".to_string(),
            ..Default::default()
        };
        assert_eq!(bad.validate(), Err(ConfigError::EmptyAgentId));

        let bad = NodeConfig {
            starting_balance: f64::NAN,
            ..Default::default()
        };
        assert!(matches!(bad.validate(), Err(ConfigError::StartingBalance(_))));
    }
}
