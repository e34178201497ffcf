//! Decision scorer
//!
//! Scores every action the agent's tier permits as a weighted sum of
//! cost-efficiency, priority, risk, staleness, swarm alignment and persona
//! fit, turns the scores into a softmax distribution and samples from it.
//! Sampling instead of taking the argmax keeps agents with similar state
//! from all picking the same action on the same tick.

use rand::Rng;
use serde::{Deserialize, Serialize};

use hive_core::{ActionKind, AgentState, Tier};

use crate::Persona;

/// Reference softmax temperature
pub const DEFAULT_TEMPERATURE: f64 = 0.3;

/// Ticks after which an untaken action earns the full staleness bonus
pub const DEFAULT_STALENESS_WINDOW: u64 = 8;

/// Balance at and above which resources are not scarce
const COMFORTABLE_BALANCE: f64 = 50.0;

/// Static description of an action
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct ActionSpec {
    pub kind: ActionKind,
    /// Base priority (0.0 - 1.0)
    pub priority: f64,
    /// Estimated credit cost
    pub cost: f64,
    /// Likelihood of wasting the spend (0.0 - 1.0)
    pub risk: f64,
}

/// The full action catalogue
pub const CATALOGUE: [ActionSpec; 6] = [
    ActionSpec { kind: ActionKind::Scan, priority: 0.2, cost: 0.0, risk: 0.0 },
    ActionSpec { kind: ActionKind::Absorb, priority: 0.5, cost: 0.0, risk: 0.05 },
    ActionSpec { kind: ActionKind::Explore, priority: 0.6, cost: 0.2, risk: 0.2 },
    ActionSpec { kind: ActionKind::Adapt, priority: 0.3, cost: 0.0, risk: 0.3 },
    ActionSpec { kind: ActionKind::Analyze, priority: 0.9, cost: 2.0, risk: 0.5 },
    ActionSpec { kind: ActionKind::Correlate, priority: 0.8, cost: 3.0, risk: 0.7 },
];

/// Look up an action's static spec
pub fn spec_for(kind: ActionKind) -> ActionSpec {
    CATALOGUE
        .iter()
        .copied()
        .find(|s| s.kind == kind)
        .unwrap_or(ActionSpec { kind, priority: 0.0, cost: 0.0, risk: 0.0 })
}

/// Weights of the scoring terms
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ScoreWeights {
    pub cost: f64,
    pub priority: f64,
    pub risk: f64,
    pub staleness: f64,
    pub swarm: f64,
    pub personality: f64,
}

impl Default for ScoreWeights {
    fn default() -> Self {
        Self {
            cost: 1.0,
            priority: 1.0,
            risk: 1.0,
            staleness: 1.0,
            swarm: 1.0,
            personality: 1.0,
        }
    }
}

/// State the scorer reads
pub struct ScoringContext<'a> {
    pub tick: u64,
    pub balance: f64,
    pub tier: Tier,
    pub agent: &'a AgentState,
    pub persona: &'a Persona,
}

impl ScoringContext<'_> {
    /// 0 when comfortable, 1 when broke
    pub fn scarcity(&self) -> f64 {
        1.0 - (self.balance.max(0.0) / COMFORTABLE_BALANCE).min(1.0)
    }
}

/// Individual term values for one action
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct ScoreBreakdown {
    pub kind: ActionKind,
    pub cost_efficiency: f64,
    pub priority: f64,
    pub risk_penalty: f64,
    pub staleness: f64,
    pub swarm_alignment: f64,
    pub personality: f64,
    pub total: f64,
}

/// A sampled decision with its distribution
#[derive(Debug, Clone, Serialize)]
pub struct Decision {
    pub chosen: ActionKind,
    pub probabilities: Vec<(ActionKind, f64)>,
    pub breakdown: Vec<ScoreBreakdown>,
}

impl Decision {
    pub fn probability_of(&self, kind: ActionKind) -> f64 {
        self.probabilities
            .iter()
            .find(|(k, _)| *k == kind)
            .map(|(_, p)| *p)
            .unwrap_or(0.0)
    }
}

/// Softmax-with-temperature action selector
#[derive(Debug, Clone)]
pub struct DecisionScorer {
    temperature: f64,
    staleness_window: u64,
}

impl Default for DecisionScorer {
    fn default() -> Self {
        Self {
            temperature: DEFAULT_TEMPERATURE,
            staleness_window: DEFAULT_STALENESS_WINDOW,
        }
    }
}

impl DecisionScorer {
    pub fn new(temperature: f64, staleness_window: u64) -> Self {
        Self {
            temperature: if temperature > 0.0 { temperature } else { DEFAULT_TEMPERATURE },
            staleness_window: staleness_window.max(1),
        }
    }

    /// Catalogue entries the tier permits and the environment can serve
    pub fn candidates<F>(&self, tier: Tier, available: F) -> Vec<ActionSpec>
    where
        F: Fn(ActionKind) -> bool,
    {
        CATALOGUE
            .iter()
            .copied()
            .filter(|spec| tier.allows(spec.kind.class()) && available(spec.kind))
            .collect()
    }

    /// Score one candidate
    pub fn score(&self, spec: &ActionSpec, ctx: &ScoringContext<'_>) -> ScoreBreakdown {
        let weights = &ctx.persona.weights;
        let scarcity = ctx.scarcity();
        let max_cost = CATALOGUE.iter().map(|s| s.cost).fold(0.0, f64::max);

        let cost_efficiency = if max_cost > 0.0 {
            scarcity * (1.0 - spec.cost / max_cost)
        } else {
            0.0
        };
        let risk_penalty = spec.risk * scarcity;
        let staleness = match ctx.agent.last_taken(spec.kind) {
            None => 1.0,
            Some(last) => {
                (ctx.tick.saturating_sub(last) as f64 / self.staleness_window as f64).min(1.0)
            }
        };
        let swarm_alignment =
            if ctx.agent.last_transition_tick.is_some() && spec.kind.is_collective() {
                1.0
            } else {
                0.0
            };
        let personality = ctx.persona.affinity(spec.kind);

        let total = weights.cost * cost_efficiency + weights.priority * spec.priority
            - weights.risk * risk_penalty
            + weights.staleness * staleness
            + weights.swarm * swarm_alignment
            + weights.personality * personality;

        ScoreBreakdown {
            kind: spec.kind,
            cost_efficiency,
            priority: spec.priority,
            risk_penalty,
            staleness,
            swarm_alignment,
            personality,
            total,
        }
    }

    /// Score all candidates and sample one. `None` only if there are none.
    pub fn decide<R: Rng + ?Sized>(
        &self,
        candidates: &[ActionSpec],
        ctx: &ScoringContext<'_>,
        rng: &mut R,
    ) -> Option<Decision> {
        if candidates.is_empty() {
            return None;
        }

        let breakdown: Vec<_> = candidates.iter().map(|c| self.score(c, ctx)).collect();
        let scores: Vec<f64> = breakdown.iter().map(|b| b.total).collect();
        let probabilities = softmax(&scores, self.temperature);

        let chosen = candidates[sample_index(&probabilities, rng)].kind;

        Some(Decision {
            chosen,
            probabilities: candidates
                .iter()
                .map(|c| c.kind)
                .zip(probabilities)
                .collect(),
            breakdown,
        })
    }
}

/// Numerically stable softmax with temperature
pub fn softmax(scores: &[f64], temperature: f64) -> Vec<f64> {
    if scores.is_empty() {
        return Vec::new();
    }
    let t = if temperature > 0.0 { temperature } else { DEFAULT_TEMPERATURE };
    let max = scores.iter().copied().fold(f64::NEG_INFINITY, f64::max);
    let exps: Vec<f64> = scores.iter().map(|s| ((s - max) / t).exp()).collect();
    let sum: f64 = exps.iter().sum();
    exps.into_iter().map(|e| e / sum).collect()
}

fn sample_index<R: Rng + ?Sized>(probabilities: &[f64], rng: &mut R) -> usize {
    let draw: f64 = rng.gen();
    let mut cumulative = 0.0;
    for (i, p) in probabilities.iter().enumerate() {
        cumulative += p;
        if draw < cumulative {
            return i;
        }
    }
    probabilities.len() - 1
}
