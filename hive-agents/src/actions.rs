//! Action executor
//!
//! Carries out the action the scorer picked. Passive actions only touch
//! local state; light actions may call the dataset fetcher; heavy actions
//! call the reasoner under a token budget scaled by the credit tier.
//!
//! An action that has nothing to do returns [`AgentError::NoWork`]. Any
//! collaborator error is returned as-is and the caller degrades the tick to
//! "no signal".

use serde::Serialize;
use tracing::debug;

use hive_core::{
    ActionKind, AgentState, Pheromone, PheromoneStore, RewardEvent, Tier, SYNC_STRENGTH,
};

use crate::{truncate, AgentError, Collaborators, Persona, ThinkContext};

/// Default per-call generation budget at full tier
pub const DEFAULT_TOKEN_BUDGET: u32 = 1024;

/// Affinity step applied by self-modification
pub const DEFAULT_ADAPT_STEP: f64 = 0.05;

/// Store signals handed to the reasoner as evidence
const MAX_EVIDENCE_SIGNALS: usize = 6;

/// Record count at which an observation reaches full confidence
const OBSERVATION_SATURATION: f64 = 50.0;

/// Confidence of an observation with no records behind it
const OBSERVATION_BASE_CONFIDENCE: f64 = 0.3;

/// Confidence added by a saturated observation
const OBSERVATION_SPAN: f64 = 0.4;

/// Mutable state an action may read and change
pub struct ActionContext<'a> {
    pub tick: u64,
    pub tier: Tier,
    pub store: &'a PheromoneStore,
    pub agent: &'a mut AgentState,
    pub persona: &'a mut Persona,
}

/// What an action produced
#[derive(Debug, Clone, Default, Serialize)]
pub struct ActionOutcome {
    /// New signal to insert locally and gossip
    pub emitted: Option<Pheromone>,
    /// Foreign signals absorbed
    pub absorbed: usize,
    /// Resource units to charge
    pub tokens_consumed: u64,
    /// Credit rewards earned
    pub rewards: Vec<RewardEvent>,
    /// Short human-readable summary
    pub note: String,
}

impl ActionOutcome {
    fn noted(note: impl Into<String>) -> Self {
        Self {
            note: note.into(),
            ..Default::default()
        }
    }

    /// Whether the action emitted or absorbed anything
    pub fn is_productive(&self) -> bool {
        self.emitted.is_some() || self.absorbed > 0
    }
}

/// Runs actions against the agent's collaborators
#[derive(Debug, Clone)]
pub struct ActionExecutor {
    collaborators: Collaborators,
    token_budget: u32,
    adapt_step: f64,
}

impl ActionExecutor {
    pub fn new(collaborators: Collaborators, token_budget: u32) -> Self {
        Self {
            collaborators,
            token_budget,
            adapt_step: DEFAULT_ADAPT_STEP,
        }
    }

    pub fn with_adapt_step(mut self, step: f64) -> Self {
        self.adapt_step = step;
        self
    }

    pub fn collaborators(&self) -> &Collaborators {
        &self.collaborators
    }

    /// Whether the collaborators needed by `kind` are configured
    pub fn is_available(&self, kind: ActionKind) -> bool {
        match kind {
            ActionKind::Explore => self.collaborators.fetcher.is_some(),
            ActionKind::Analyze | ActionKind::Correlate => self.collaborators.reasoner.is_some(),
            ActionKind::Scan | ActionKind::Absorb | ActionKind::Adapt => true,
        }
    }

    /// Generation budget for one call at `tier`
    pub fn generation_budget(&self, tier: Tier) -> u32 {
        (self.token_budget as f64 * tier.generation_factor()).floor() as u32
    }

    /// Execute one action
    pub async fn execute(
        &self,
        kind: ActionKind,
        ctx: &mut ActionContext<'_>,
    ) -> Result<ActionOutcome, AgentError> {
        match kind {
            ActionKind::Scan => Ok(self.scan(ctx)),
            ActionKind::Absorb => self.absorb(ctx),
            ActionKind::Explore => self.explore(ctx).await,
            ActionKind::Adapt => self.adapt(ctx),
            ActionKind::Analyze => self.analyze(ctx).await,
            ActionKind::Correlate => self.correlate(ctx).await,
        }
    }

    fn scan(&self, ctx: &ActionContext<'_>) -> ActionOutcome {
        let histogram = ctx.store.domain_histogram();
        let summary = histogram
            .iter()
            .map(|(domain, count)| format!("{}={}", domain, count))
            .collect::<Vec<_>>()
            .join(", ");
        ActionOutcome::noted(format!("{} signals [{}]", ctx.store.len(), summary))
    }

    fn absorb(&self, ctx: &mut ActionContext<'_>) -> Result<ActionOutcome, AgentError> {
        let agent = &mut *ctx.agent;
        let absorbed = ctx
            .store
            .iter()
            .filter(|s| s.strength > SYNC_STRENGTH)
            .filter(|s| agent.absorb(s.id, &s.origin_agent_id))
            .count();

        if absorbed == 0 {
            return Err(AgentError::NoWork);
        }

        Ok(ActionOutcome {
            absorbed,
            note: format!(
                "absorbed {} signals, {} peers synced",
                absorbed,
                agent.synced_peers.len()
            ),
            ..Default::default()
        })
    }

    async fn explore(&self, ctx: &mut ActionContext<'_>) -> Result<ActionOutcome, AgentError> {
        let fetcher = self
            .collaborators
            .fetcher
            .as_ref()
            .ok_or(AgentError::Unavailable("dataset fetcher"))?;

        let topic = ctx.persona.domain_for_tick(ctx.tick).to_string();
        let dataset = fetcher.fetch(&topic).await?.ok_or(AgentError::NoWork)?;

        let confidence = OBSERVATION_BASE_CONFIDENCE
            + OBSERVATION_SPAN * (dataset.record_count as f64 / OBSERVATION_SATURATION).min(1.0);

        let signal = Pheromone::builder(
            &topic,
            &format!("[{}] {}", dataset.source, dataset.summary),
        )
        .origin(&ctx.agent.id)
        .confidence(confidence)
        .build();

        Ok(ActionOutcome {
            rewards: RewardEvent::for_confidence(signal.confidence).into_iter().collect(),
            note: format!("observed {} records on {}", dataset.record_count, topic),
            emitted: Some(signal),
            ..Default::default()
        })
    }

    fn adapt(&self, ctx: &mut ActionContext<'_>) -> Result<ActionOutcome, AgentError> {
        let outcomes: Vec<(ActionKind, bool)> = ctx
            .agent
            .recent_actions
            .iter()
            .filter(|r| r.kind != ActionKind::Adapt)
            .map(|r| (r.kind, r.productive))
            .collect();

        if outcomes.is_empty() {
            return Err(AgentError::NoWork);
        }

        let changed = ctx.persona.adapt(&outcomes, self.adapt_step);
        if changed == 0 {
            return Err(AgentError::NoWork);
        }

        Ok(ActionOutcome {
            rewards: vec![RewardEvent::SelfModification],
            note: format!("adjusted {} affinities", changed),
            ..Default::default()
        })
    }

    async fn analyze(&self, ctx: &mut ActionContext<'_>) -> Result<ActionOutcome, AgentError> {
        let reasoner = self
            .collaborators
            .reasoner
            .as_ref()
            .ok_or(AgentError::Unavailable("reasoner"))?;

        let max_tokens = self.generation_budget(ctx.tier);
        if max_tokens == 0 {
            return Err(AgentError::Unavailable("generation budget exhausted"));
        }

        let domain = ctx.persona.domain_for_tick(ctx.tick).to_string();
        let mut evidence = Vec::new();

        if let Some(fetcher) = &self.collaborators.fetcher {
            match fetcher.fetch(&domain).await {
                Ok(Some(dataset)) => {
                    evidence.push(format!("[{}] {}", dataset.source, dataset.summary))
                }
                Ok(None) => {}
                Err(e) => debug!("No dataset for {}: {}", domain, e),
            }
        }

        let mut related = ctx.store.sense_where(|s| s.domain == domain);
        related.sort_by(|a, b| b.strength.total_cmp(&a.strength));
        evidence.extend(
            related
                .into_iter()
                .take(MAX_EVIDENCE_SIGNALS)
                .map(|s| format!("[{:.2}] {}", s.confidence, truncate(&s.content, 300))),
        );

        let task = if evidence.is_empty() {
            format!("Propose one concrete, checkable finding about {}.", domain)
        } else {
            format!("Derive one new finding about {} from the evidence.", domain)
        };

        let thought = reasoner
            .think(&ThinkContext {
                agent_id: ctx.agent.id.clone(),
                domain: domain.clone(),
                task,
                evidence,
                max_tokens,
            })
            .await?;
        ctx.agent.thoughts += 1;

        let signal = Pheromone::builder(&domain, &thought.artifact)
            .origin(&ctx.agent.id)
            .confidence(thought.confidence)
            .build();

        Ok(ActionOutcome {
            rewards: RewardEvent::for_confidence(signal.confidence).into_iter().collect(),
            tokens_consumed: thought.tokens_consumed,
            note: format!("finding on {} at {:.2}", domain, signal.confidence),
            emitted: Some(signal),
            ..Default::default()
        })
    }

    async fn correlate(&self, ctx: &mut ActionContext<'_>) -> Result<ActionOutcome, AgentError> {
        let reasoner = self
            .collaborators
            .reasoner
            .as_ref()
            .ok_or(AgentError::Unavailable("reasoner"))?;

        let max_tokens = self.generation_budget(ctx.tier);
        if max_tokens == 0 {
            return Err(AgentError::Unavailable("generation budget exhausted"));
        }

        let (first, second) = strongest_pair(ctx.store).ok_or(AgentError::NoWork)?;

        let mut domains = [first.domain.as_str(), second.domain.as_str()];
        domains.sort_unstable();
        let domain = format!("{}×{}", domains[0], domains[1]);

        let thought = reasoner
            .think(&ThinkContext {
                agent_id: ctx.agent.id.clone(),
                domain: domain.clone(),
                task: format!(
                    "Find a connection between the {} and {} findings, or say there is none.",
                    first.domain, second.domain
                ),
                evidence: vec![
                    format!("({}) {}", first.domain, truncate(&first.content, 400)),
                    format!("({}) {}", second.domain, truncate(&second.content, 400)),
                ],
                max_tokens,
            })
            .await?;
        ctx.agent.thoughts += 1;

        let signal = Pheromone::builder(&domain, &thought.artifact)
            .origin(&ctx.agent.id)
            .confidence(thought.confidence)
            .build();

        let rewards = if signal.confidence >= 0.5 {
            vec![RewardEvent::CrossDomainCorrelation]
        } else {
            Vec::new()
        };

        Ok(ActionOutcome {
            rewards,
            tokens_consumed: thought.tokens_consumed,
            note: format!("correlated {} at {:.2}", domain, signal.confidence),
            emitted: Some(signal),
            ..Default::default()
        })
    }
}

/// The strongest synchronized signal and the strongest one from another domain
fn strongest_pair(store: &PheromoneStore) -> Option<(&Pheromone, &Pheromone)> {
    let mut strong = store.sense_where(|s| s.strength > SYNC_STRENGTH);
    strong.sort_by(|a, b| b.strength.total_cmp(&a.strength).then(a.id.cmp(&b.id)));

    let first = *strong.first()?;
    let second = strong.iter().find(|s| s.domain != first.domain)?;
    Some((first, second))
}
