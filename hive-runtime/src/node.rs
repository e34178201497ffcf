//! The node: one agent, one store, one tick loop
//!
//! A single task owns [`NodeState`] and is the only writer. Each tick it
//! pulls from peers, decays the store, checks for a phase transition, then
//! lets the scorer pick one action and executes it. Slow side effects are
//! spawned and report back through the event channel.

use chrono::Utc;
use rand::rngs::StdRng;
use rand::SeedableRng;
use std::future::Future;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::{mpsc, watch};
use tokio::time::{interval, MissedTickBehavior};
use tracing::{debug, error, info, warn};
use uuid::Uuid;

use hive_agents::{
    ActionContext, ActionExecutor, AgentError, Collaborators, DecisionScorer, Persona,
    ScoringContext, DEFAULT_STALENESS_WINDOW,
};
use hive_core::{
    ActionKind, AgentState, CreditLedger, InsertOutcome, PhaseDetector, Pheromone,
    PheromoneStore, RewardEvent, TransitionReport,
};
use hive_gossip::{GossipClient, GossipConfig};

use crate::{AppState, NodeConfig, NodeSnapshot, NodeView, SnapshotStore};

/// Pending events before pushers are back-pressured
const EVENT_CAPACITY: usize = 1024;

/// Inputs delivered to the tick loop from outside
#[derive(Debug, Clone)]
pub enum NodeEvent {
    /// A signal pushed by a peer
    Inbound(Pheromone),
    /// External commitment for a stored signal
    Attested { id: Uuid, commitment: String },
    /// Lower the flag raised by the transition at `tick`
    ClearTransition { tick: u64 },
}

/// All mutable node state, owned by the tick loop
#[derive(Debug, Clone)]
pub struct NodeState {
    pub tick: u64,
    pub store: PheromoneStore,
    pub detector: PhaseDetector,
    pub ledger: CreditLedger,
    pub agent: AgentState,
    pub persona: Persona,
    pub last_action: Option<ActionKind>,
}

impl NodeState {
    pub fn new(config: &NodeConfig, persona: Persona) -> Self {
        Self {
            tick: 0,
            store: PheromoneStore::new(config.critical_threshold),
            detector: PhaseDetector::default(),
            ledger: CreditLedger::new(config.starting_balance)
                .with_units_per_credit(config.units_per_credit),
            agent: AgentState::new(&config.agent_id),
            persona,
            last_action: None,
        }
    }

    /// Apply a persisted snapshot over fresh state
    pub fn restore(&mut self, snapshot: &NodeSnapshot, units_per_credit: f64) {
        let credits = &snapshot.credits;
        self.tick = snapshot.tick;
        self.ledger = CreditLedger::restore(
            credits.balance,
            credits.lifetime_earned,
            credits.lifetime_spent,
        )
        .with_units_per_credit(units_per_credit);
        self.agent.signals_emitted = snapshot.signals_emitted;
        self.agent.thoughts = snapshot.thoughts;
        self.agent.transitions = snapshot.transitions;

        // Learned affinities only make sense for the same persona
        if snapshot.persona_id == self.persona.persona.id {
            self.persona.affinity.extend(snapshot.affinity.clone());
        }
    }

    pub fn snapshot(&self) -> NodeSnapshot {
        NodeSnapshot {
            agent_id: self.agent.id.clone(),
            saved_at: Utc::now(),
            tick: self.tick,
            credits: self.ledger.snapshot(),
            signals_emitted: self.agent.signals_emitted,
            thoughts: self.agent.thoughts,
            transitions: self.agent.transitions,
            persona_id: self.persona.persona.id.clone(),
            affinity: self.persona.affinity.clone(),
            signals_held: self.store.len(),
            density: self.store.density(),
        }
    }

    /// Apply one event. Returns the id of a newly stored signal.
    pub fn handle_event(&mut self, event: NodeEvent) -> Option<Uuid> {
        match event {
            NodeEvent::Inbound(signal) => {
                let id = signal.id;
                match self.store.insert(signal) {
                    InsertOutcome::Inserted => {
                        debug!("Accepted pushed signal {}", id);
                        return Some(id);
                    }
                    InsertOutcome::Duplicate => {}
                    InsertOutcome::Stale => debug!("Dropped stale signal {}", id),
                }
            }
            NodeEvent::Attested { id, commitment } => {
                if !self.store.attest(&id, commitment) {
                    debug!("Attested signal {} is no longer held", id);
                }
            }
            NodeEvent::ClearTransition { tick } => {
                if self.detector.clear_flag(tick) {
                    info!("Transition flag from tick {} cleared", tick);
                }
            }
        }
        None
    }
}

/// What one tick did
#[derive(Debug, Clone, Default, PartialEq)]
pub struct TickSummary {
    pub tick: u64,
    pub pulled: usize,
    pub inserted: usize,
    pub pruned: usize,
    pub density: f64,
    pub transitioned: bool,
    pub action: Option<ActionKind>,
    pub emitted: bool,
}

/// A running agent process
pub struct Node {
    config: NodeConfig,
    state: NodeState,
    gossip: Arc<GossipClient>,
    scorer: DecisionScorer,
    executor: ActionExecutor,
    snapshots: Option<Arc<dyn SnapshotStore>>,
    rng: StdRng,
    events_tx: mpsc::Sender<NodeEvent>,
    events_rx: mpsc::Receiver<NodeEvent>,
    view_tx: watch::Sender<NodeView>,
}

impl Node {
    pub fn new(
        config: NodeConfig,
        persona: Persona,
        collaborators: Collaborators,
        snapshots: Option<Arc<dyn SnapshotStore>>,
    ) -> anyhow::Result<Self> {
        config.validate()?;

        let gossip = GossipClient::new(
            GossipConfig {
                timeout_ms: config.gossip_timeout_ms,
                ..Default::default()
            }
            .with_peers(&config.peers),
        )?;

        let mut state = NodeState::new(&config, persona);
        if let Some(store) = &snapshots {
            match store.load(&config.agent_id) {
                Ok(Some(snapshot)) => {
                    state.restore(&snapshot, config.units_per_credit);
                    info!(
                        "Restored {} at tick {} with {:.2} credits",
                        config.agent_id, snapshot.tick, snapshot.credits.balance
                    );
                }
                Ok(None) => {}
                Err(e) => warn!("Ignoring unreadable snapshot for {}: {}", config.agent_id, e),
            }
        }

        let rng = match config.seed {
            Some(seed) => StdRng::seed_from_u64(seed),
            None => StdRng::from_entropy(),
        };
        let executor = ActionExecutor::new(collaborators, config.token_budget);
        let scorer = DecisionScorer::new(config.temperature, DEFAULT_STALENESS_WINDOW);
        let (events_tx, events_rx) = mpsc::channel(EVENT_CAPACITY);
        let (view_tx, _) = watch::channel(NodeView::capture(&state));

        Ok(Self {
            config,
            state,
            gossip: Arc::new(gossip),
            scorer,
            executor,
            snapshots,
            rng,
            events_tx,
            events_rx,
            view_tx,
        })
    }

    /// Handles for the HTTP surface
    pub fn app_state(&self) -> AppState {
        AppState {
            events: self.events_tx.clone(),
            view: self.view_tx.subscribe(),
        }
    }

    pub fn state(&self) -> &NodeState {
        &self.state
    }

    /// Tick until `shutdown` resolves, then save a final snapshot
    pub async fn run<F>(mut self, shutdown: F) -> NodeState
    where
        F: Future<Output = ()>,
    {
        let mut ticker = interval(Duration::from_millis(self.config.tick_interval_ms));
        ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);
        tokio::pin!(shutdown);

        info!(
            "Node {} ({}) starting with {} peers, {:.2} credits",
            self.state.agent.id,
            self.state.persona.persona.id,
            self.gossip.peers().len(),
            self.state.ledger.balance()
        );

        loop {
            tokio::select! {
                _ = &mut shutdown => break,
                _ = ticker.tick() => {
                    self.step().await;
                }
                Some(event) = self.events_rx.recv() => {
                    if let Some(id) = self.state.handle_event(event) {
                        self.forward(&id);
                    }
                    self.publish();
                }
            }
        }

        self.save_snapshot();
        info!("Node {} stopped at tick {}", self.state.agent.id, self.state.tick);
        self.state
    }

    /// Advance one tick
    pub async fn step(&mut self) -> TickSummary {
        self.state.tick += 1;
        let tick = self.state.tick;
        let tier_before = self.state.ledger.tier();

        let pulled = self.gossip.pull_all().await;
        let pulled_count = pulled.signals.len();
        let mut inserted = 0;
        for signal in pulled.signals {
            let id = signal.id;
            if self.state.store.insert(signal).is_inserted() {
                inserted += 1;
                self.forward(&id);
            }
        }

        let decay = self.state.store.decay(self.config.decay_rate);
        let density = self.state.store.recompute_density();

        let report = self.state.detector.evaluate(
            tick,
            &mut self.state.store,
            &mut self.state.agent,
            Utc::now(),
            &mut self.rng,
        );
        let transitioned = report.is_some();
        if let Some(report) = report {
            self.on_transition(report);
        }

        let (action, emitted) = self.act(tick).await;

        let tier_after = self.state.ledger.tier();
        if tier_after != tier_before {
            info!(
                "Credit tier {} -> {} (balance {:.2})",
                tier_before,
                tier_after,
                self.state.ledger.balance()
            );
        }

        if self.config.snapshot_every > 0 && tick % self.config.snapshot_every == 0 {
            self.save_snapshot();
        }
        self.publish();

        debug!(
            "Tick {}: pulled {} (+{}), pruned {}, density {:.3}, action {:?}",
            tick,
            pulled_count,
            inserted,
            decay.pruned,
            density,
            action.map(|a| a.as_str())
        );

        TickSummary {
            tick,
            pulled: pulled_count,
            inserted,
            pruned: decay.pruned,
            density,
            transitioned,
            action,
            emitted,
        }
    }

    fn on_transition(&mut self, report: TransitionReport) {
        if report.cycle_emissions > 0 {
            self.state.ledger.earn(RewardEvent::CollectiveContribution);
        }

        let tick = report.tick;
        let events = self.events_tx.clone();
        let hold = Duration::from_millis(self.config.flag_hold_ms);
        tokio::spawn(async move {
            tokio::time::sleep(hold).await;
            let _ = events.send(NodeEvent::ClearTransition { tick }).await;
        });

        if let Some(synthesizer) = self.executor.collaborators().synthesizer.clone() {
            tokio::spawn(async move {
                match synthesizer.synthesize(&report).await {
                    Ok(digest) => info!("Transition digest (tick {}):\n{}", report.tick, digest),
                    Err(e) => warn!("Synthesis for tick {} failed: {}", report.tick, e),
                }
            });
        }
    }

    /// Pick and execute one action. Returns the action and whether it emitted.
    async fn act(&mut self, tick: u64) -> (Option<ActionKind>, bool) {
        let tier = self.state.ledger.tier();
        let executor = &self.executor;
        let candidates = self
            .scorer
            .candidates(tier, |kind| executor.is_available(kind));

        let context = ScoringContext {
            tick,
            balance: self.state.ledger.balance(),
            tier,
            agent: &self.state.agent,
            persona: &self.state.persona,
        };
        let Some(decision) = self.scorer.decide(&candidates, &context, &mut self.rng) else {
            return (None, false);
        };
        let kind = decision.chosen;
        self.state.last_action = Some(kind);

        let mut ctx = ActionContext {
            tick,
            tier,
            store: &self.state.store,
            agent: &mut self.state.agent,
            persona: &mut self.state.persona,
        };
        let result = self.executor.execute(kind, &mut ctx).await;
        let outcome = match result {
            Ok(outcome) => outcome,
            Err(AgentError::NoWork) => {
                debug!("{} had nothing to do on tick {}", kind.as_str(), tick);
                self.state.agent.record_action(tick, kind, false);
                return (Some(kind), false);
            }
            Err(e) => {
                warn!("{} failed on tick {}: {}", kind.as_str(), tick, e);
                self.state.agent.record_action(tick, kind, false);
                return (Some(kind), false);
            }
        };

        self.state.ledger.spend_units(outcome.tokens_consumed);
        for reward in &outcome.rewards {
            self.state.ledger.earn(*reward);
        }
        self.state
            .agent
            .record_action(tick, kind, outcome.is_productive());
        debug!("{}: {}", kind.as_str(), outcome.note);

        match outcome.emitted {
            Some(signal) => {
                self.emit(signal);
                (Some(kind), true)
            }
            None => (Some(kind), false),
        }
    }

    /// Store an own signal and push it to every peer
    fn emit(&mut self, signal: Pheromone) {
        let id = signal.id;
        if self.state.store.insert(signal.clone()).is_inserted() {
            self.forward(&id);
        } else {
            warn!("Own signal {} was not stored", id);
        }
        self.state.agent.record_emission();

        if !self.gossip.peers().is_empty() {
            let gossip = self.gossip.clone();
            tokio::spawn(async move {
                let report = gossip.push_all(&signal).await;
                debug!(
                    "Pushed {} to {} peers ({} failed)",
                    signal.id, report.delivered, report.failed
                );
            });
        }
    }

    /// Best-effort attestation and logging for a newly stored signal
    fn forward(&self, id: &Uuid) {
        let Some(signal) = self.state.store.get(id) else {
            return;
        };

        if signal.is_locally_attested() {
            if let Some(attestor) = self.executor.collaborators().attestor.clone() {
                let events = self.events_tx.clone();
                let id = signal.id;
                let payload = signal.attestation_payload();
                tokio::spawn(async move {
                    match attestor.disperse(&payload).await {
                        Ok(commitment) => {
                            let _ = events.send(NodeEvent::Attested { id, commitment }).await;
                        }
                        Err(e) => warn!("Attestation of {} failed, keeping local hash: {}", id, e),
                    }
                });
            }
        }

        if let Some(snapshots) = self.snapshots.clone() {
            let agent_id = self.state.agent.id.clone();
            let signal = signal.clone();
            tokio::task::spawn_blocking(move || {
                if let Err(e) = snapshots.append_signal(&agent_id, &signal) {
                    error!("Failed to log signal {}: {}", signal.id, e);
                }
            });
        }
    }

    fn save_snapshot(&self) {
        let Some(snapshots) = &self.snapshots else {
            return;
        };
        match snapshots.save(&self.state.snapshot()) {
            Ok(()) => debug!("Snapshot saved at tick {}", self.state.tick),
            Err(e) => error!("Snapshot save failed at tick {}: {}", self.state.tick, e),
        }
    }

    fn publish(&self) {
        self.view_tx.send_replace(NodeView::capture(&self.state));
    }
}
