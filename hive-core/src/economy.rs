//! Credit-gated survival economy
//!
//! Each agent carries a credit balance. Useful work earns fixed rewards,
//! generation spends credits in proportion to the resources it consumed, and
//! the balance maps onto a capability tier that decides which action classes
//! the agent may still take. Running out of credits is not an error; the
//! agent goes dormant and keeps doing the cheapest work.

use serde::{Deserialize, Serialize};

use crate::ActionClass;

/// Default starting balance
pub const DEFAULT_STARTING_BALANCE: f64 = 100.0;

/// Default resource units (tokens) bought by one credit
pub const DEFAULT_UNITS_PER_CREDIT: f64 = 1000.0;

/// Capability tiers, lowest first
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Tier {
    Dormant,
    Critical,
    Reduced,
    Normal,
}

impl Tier {
    /// Map a balance onto a tier. Boundaries are inclusive lower bounds.
    pub fn from_balance(balance: f64) -> Self {
        if balance >= 50.0 {
            Tier::Normal
        } else if balance >= 10.0 {
            Tier::Reduced
        } else if balance >= 1.0 {
            Tier::Critical
        } else {
            Tier::Dormant
        }
    }

    /// Whether actions of `class` are reachable from this tier
    pub fn allows(&self, class: ActionClass) -> bool {
        match self {
            Tier::Normal | Tier::Reduced => true,
            Tier::Critical => class <= ActionClass::Light,
            Tier::Dormant => class == ActionClass::Passive,
        }
    }

    /// Fraction of the generation budget available
    pub fn generation_factor(&self) -> f64 {
        match self {
            Tier::Normal => 1.0,
            Tier::Reduced => 0.5,
            Tier::Critical | Tier::Dormant => 0.0,
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Tier::Normal => "normal",
            Tier::Reduced => "reduced",
            Tier::Critical => "critical",
            Tier::Dormant => "dormant",
        }
    }
}

impl std::fmt::Display for Tier {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Events that earn credits
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RewardEvent {
    HighConfidenceFinding,
    MediumConfidenceFinding,
    CrossDomainCorrelation,
    CollectiveContribution,
    SelfModification,
}

impl RewardEvent {
    /// Fixed reward for this event
    pub fn reward(&self) -> f64 {
        match self {
            RewardEvent::HighConfidenceFinding => 5.0,
            RewardEvent::MediumConfidenceFinding => 2.0,
            RewardEvent::CrossDomainCorrelation => 8.0,
            RewardEvent::CollectiveContribution => 10.0,
            RewardEvent::SelfModification => 3.0,
        }
    }

    /// Bucket a finding's confidence: >0.7 high, 0.5..=0.7 medium, else nothing
    pub fn for_confidence(confidence: f64) -> Option<Self> {
        if confidence > 0.7 {
            Some(RewardEvent::HighConfidenceFinding)
        } else if confidence >= 0.5 {
            Some(RewardEvent::MediumConfidenceFinding)
        } else {
            None
        }
    }
}

/// An agent's credit record
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CreditLedger {
    balance: f64,
    lifetime_earned: f64,
    lifetime_spent: f64,
    units_per_credit: f64,
}

impl CreditLedger {
    pub fn new(starting_balance: f64) -> Self {
        Self {
            balance: starting_balance.max(0.0),
            lifetime_earned: 0.0,
            lifetime_spent: 0.0,
            units_per_credit: DEFAULT_UNITS_PER_CREDIT,
        }
    }

    /// Change the resource exchange rate
    pub fn with_units_per_credit(mut self, units: f64) -> Self {
        if units > 0.0 {
            self.units_per_credit = units;
        }
        self
    }

    /// Restore a ledger from persisted totals
    pub fn restore(balance: f64, lifetime_earned: f64, lifetime_spent: f64) -> Self {
        Self {
            balance: balance.max(0.0),
            lifetime_earned: lifetime_earned.max(0.0),
            lifetime_spent: lifetime_spent.max(0.0),
            units_per_credit: DEFAULT_UNITS_PER_CREDIT,
        }
    }

    /// Credit a reward event, returning the amount earned
    pub fn earn(&mut self, event: RewardEvent) -> f64 {
        let amount = event.reward();
        self.balance += amount;
        self.lifetime_earned += amount;
        amount
    }

    /// Deduct credits, flooring at zero. Returns what was actually deducted.
    pub fn spend(&mut self, credits: f64) -> f64 {
        if !credits.is_finite() || credits <= 0.0 {
            return 0.0;
        }
        let deducted = credits.min(self.balance);
        self.balance -= deducted;
        self.lifetime_spent += deducted;
        deducted
    }

    /// Deduct the credit equivalent of consumed resource units
    pub fn spend_units(&mut self, units: u64) -> f64 {
        self.spend(units as f64 / self.units_per_credit)
    }

    pub fn balance(&self) -> f64 {
        self.balance
    }

    pub fn lifetime_earned(&self) -> f64 {
        self.lifetime_earned
    }

    pub fn lifetime_spent(&self) -> f64 {
        self.lifetime_spent
    }

    /// Current tier, always derived from the balance
    pub fn tier(&self) -> Tier {
        Tier::from_balance(self.balance)
    }

    pub fn snapshot(&self) -> CreditSnapshot {
        CreditSnapshot {
            balance: self.balance,
            lifetime_earned: self.lifetime_earned,
            lifetime_spent: self.lifetime_spent,
            tier: self.tier(),
        }
    }
}

impl Default for CreditLedger {
    fn default() -> Self {
        Self::new(DEFAULT_STARTING_BALANCE)
    }
}

/// Serializable view of a ledger
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CreditSnapshot {
    pub balance: f64,
    pub lifetime_earned: f64,
    pub lifetime_spent: f64,
    pub tier: Tier,
}
