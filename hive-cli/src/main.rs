//! hive-node CLI
//!
//! Runs one swarm agent per process. Agents find each other only through
//! the peer list and coordinate through gossiped pheromones.

use std::path::{Path, PathBuf};
use std::sync::Arc;

use anyhow::{Context, Result};
use clap::{Args, Parser, Subcommand};
use tokio::net::TcpListener;
use tracing::{info, warn, Level};
use tracing_subscriber::{filter::LevelFilter, EnvFilter, FmtSubscriber};

use hive_agents::{
    create_anthropic_backend, create_backend, AnthropicConfig, Collaborators, HttpAttestor,
    HttpDatasetFetcher, LlmReasoner, LlmSynthesizer, OpenAIBackendConfig, Persona,
    PersonaRegistry, SharedBackend, DEFAULT_TOKEN_BUDGET,
};
use hive_gossip::{GossipClient, GossipConfig};
use hive_runtime::{
    serve, JsonFileSnapshotStore, Node, NodeConfig, SnapshotStore, DEFAULT_SNAPSHOT_EVERY,
};

/// Token cap for transition digests
const SYNTHESIS_MAX_TOKENS: u32 = 800;

#[derive(Parser)]
#[command(name = "hive-node")]
#[command(author, version, about = "Hive: a leaderless research swarm node", long_about = None)]
struct Cli {
    #[command(subcommand)]
    command: Commands,

    /// Verbosity level (0-3), overridden by RUST_LOG
    #[arg(short, long, default_value = "1")]
    verbose: u8,
}

#[derive(Subcommand)]
enum Commands {
    /// Run an agent until interrupted
    Run(RunArgs),

    /// Print the /state document of each peer
    Probe {
        /// Peer base URLs
        #[arg(long, env = "HIVE_PEERS", value_delimiter = ',', required = true)]
        peers: Vec<String>,

        /// Per-peer timeout in milliseconds
        #[arg(long, default_value = "3000")]
        timeout_ms: u64,
    },

    /// List the embedded personas
    Personas,
}

#[derive(Args)]
struct RunArgs {
    /// Agent identity
    #[arg(long, env = "HIVE_AGENT_ID")]
    agent_id: String,

    /// Listen address for the peer protocol
    #[arg(long, env = "HIVE_BIND", default_value = "0.0.0.0:7070")]
    bind: String,

    /// Comma-separated peer base URLs
    #[arg(long, env = "HIVE_PEERS", value_delimiter = ',')]
    peers: Vec<String>,

    /// Tick interval in milliseconds
    #[arg(long, env = "HIVE_TICK_MS", default_value = "1000")]
    tick_ms: u64,

    /// Per-tick decay rate
    #[arg(long, env = "HIVE_DECAY_RATE", default_value = "0.1")]
    decay_rate: f64,

    /// Density at which a transition may be declared
    #[arg(long, env = "HIVE_CRITICAL_THRESHOLD", default_value = "0.6")]
    critical_threshold: f64,

    /// Credits at first start (ignored when a snapshot exists)
    #[arg(long, env = "HIVE_STARTING_BALANCE", default_value = "100")]
    starting_balance: f64,

    /// Generation budget per reasoning call at full tier
    #[arg(long, env = "HIVE_TOKEN_BUDGET", default_value_t = DEFAULT_TOKEN_BUDGET)]
    token_budget: u32,

    /// Snapshot directory (persistence disabled when unset)
    #[arg(long, env = "HIVE_SNAPSHOT_DIR")]
    snapshot_dir: Option<PathBuf>,

    /// Ticks between snapshots
    #[arg(long, env = "HIVE_SNAPSHOT_EVERY", default_value_t = DEFAULT_SNAPSHOT_EVERY)]
    snapshot_every: u64,

    /// Embedded persona id or path to a persona TOML file
    #[arg(long, env = "HIVE_PERSONA", default_value = "explorer")]
    persona: String,

    /// Attestation endpoint (signals keep their local hash when unset)
    #[arg(long, env = "HIVE_ATTESTOR_URL")]
    attestor_url: Option<String>,

    /// Dataset endpoint (exploration disabled when unset)
    #[arg(long, env = "HIVE_DATASET_URL")]
    dataset_url: Option<String>,

    /// Anthropic API key
    #[arg(long, env = "ANTHROPIC_API_KEY", hide_env_values = true)]
    anthropic_key: Option<String>,

    /// OpenAI API key
    #[arg(long, env = "OPENAI_API_KEY", hide_env_values = true)]
    openai_key: Option<String>,

    /// Model name (provider default when unset)
    #[arg(long, env = "HIVE_MODEL")]
    model: Option<String>,

    /// OpenAI-compatible base URL for a local or proxied model
    #[arg(long, env = "HIVE_LLM_BASE_URL")]
    llm_base_url: Option<String>,

    /// Fixed RNG seed
    #[arg(long)]
    seed: Option<u64>,
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    // Set up logging
    let log_level = match cli.verbose {
        0 => Level::ERROR,
        1 => Level::INFO,
        2 => Level::DEBUG,
        _ => Level::TRACE,
    };

    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::default().add_directive(LevelFilter::from_level(log_level).into()));

    FmtSubscriber::builder()
        .with_env_filter(filter)
        .with_target(false)
        .with_thread_ids(false)
        .compact()
        .init();

    match cli.command {
        Commands::Run(args) => run_node(args).await?,
        Commands::Probe { peers, timeout_ms } => probe(peers, timeout_ms).await?,
        Commands::Personas => list_personas(),
    }

    Ok(())
}

async fn run_node(args: RunArgs) -> Result<()> {
    let persona = load_persona(&args.persona)?;
    let backend = select_backend(&args)?;

    let mut collaborators = Collaborators::default();
    match &backend {
        Some(backend) => {
            info!("Reasoning with {}", backend.model_name());
            collaborators.reasoner = Some(Arc::new(LlmReasoner::new(
                backend.clone(),
                persona.system_prompt(),
            )));
            collaborators.synthesizer = Some(Arc::new(LlmSynthesizer::new(
                backend.clone(),
                SYNTHESIS_MAX_TOKENS,
            )));
        }
        None => warn!("No LLM configured; analysis and correlation are disabled"),
    }
    if let Some(url) = &args.dataset_url {
        collaborators.fetcher = Some(Arc::new(HttpDatasetFetcher::new(url)?));
    }
    if let Some(url) = &args.attestor_url {
        collaborators.attestor = Some(Arc::new(HttpAttestor::new(url)?));
    }

    let snapshots: Option<Arc<dyn SnapshotStore>> = match &args.snapshot_dir {
        Some(dir) => Some(Arc::new(JsonFileSnapshotStore::new(dir).with_context(|| {
            format!("cannot open snapshot directory {}", dir.display())
        })?)),
        None => None,
    };

    let config = NodeConfig {
        agent_id: args.agent_id,
        bind: args.bind,
        peers: args.peers,
        tick_interval_ms: args.tick_ms,
        decay_rate: args.decay_rate,
        critical_threshold: args.critical_threshold,
        starting_balance: args.starting_balance,
        token_budget: args.token_budget,
        snapshot_dir: args.snapshot_dir,
        snapshot_every: args.snapshot_every,
        seed: args.seed,
        ..Default::default()
    };

    let listener = TcpListener::bind(&config.bind)
        .await
        .with_context(|| format!("cannot bind {}", config.bind))?;

    println!("🐝 Hive node {} ({})", config.agent_id, persona.persona.name);
    println!("📡 Listening on {} | Peers: {}", config.bind, config.peers.len());
    println!("⏱️  Tick: {}ms | Threshold: {}\n", config.tick_interval_ms, config.critical_threshold);

    let node = Node::new(config, persona, collaborators, snapshots)?;

    let (stop_tx, stop_rx) = tokio::sync::oneshot::channel::<()>();
    let server = tokio::spawn(serve(listener, node.app_state(), async move {
        let _ = stop_rx.await;
    }));

    let state = node
        .run(async {
            if let Err(e) = tokio::signal::ctrl_c().await {
                warn!("Cannot listen for ctrl-c: {}", e);
                std::future::pending::<()>().await;
            }
            info!("Shutdown requested");
        })
        .await;

    let _ = stop_tx.send(());
    server.await??;

    let credits = state.ledger.snapshot();
    println!("\n📊 Final state at tick {}:", state.tick);
    println!("   Signals held: {}", state.store.len());
    println!("   Signals emitted: {}", state.agent.signals_emitted);
    println!("   Transitions: {}", state.agent.transitions);
    println!("   Credits: {:.2} ({})", credits.balance, credits.tier);

    Ok(())
}

/// Local base URL first, then Anthropic, then OpenAI
fn select_backend(args: &RunArgs) -> Result<Option<SharedBackend>> {
    if let Some(base_url) = &args.llm_base_url {
        let model = args.model.as_deref().unwrap_or("local");
        let mut config = OpenAIBackendConfig::local(base_url, model);
        if let Some(key) = &args.openai_key {
            config.api_key = key.clone();
        }
        return Ok(Some(create_backend(config)?));
    }

    if let Some(key) = &args.anthropic_key {
        let model = args.model.as_deref().unwrap_or("claude-sonnet-4-20250514");
        return Ok(Some(create_anthropic_backend(AnthropicConfig::new(key, model))?));
    }

    if let Some(key) = &args.openai_key {
        let model = args.model.as_deref().unwrap_or("gpt-4o-mini");
        return Ok(Some(create_backend(OpenAIBackendConfig::openai(key, model))?));
    }

    Ok(None)
}

/// Resolve an embedded persona id or a TOML file path
fn load_persona(name_or_path: &str) -> Result<Persona> {
    let path = Path::new(name_or_path);
    if path.is_file() {
        return Persona::from_file(path)
            .with_context(|| format!("cannot load persona {}", path.display()));
    }

    let registry = PersonaRegistry::load_embedded();
    registry.get(name_or_path).cloned().ok_or_else(|| {
        anyhow::anyhow!(
            "unknown persona '{}'; available: {}",
            name_or_path,
            registry.list_ids().join(", ")
        )
    })
}

async fn probe(peers: Vec<String>, timeout_ms: u64) -> Result<()> {
    let gossip = GossipClient::new(
        GossipConfig {
            timeout_ms,
            ..Default::default()
        }
        .with_peers(&peers),
    )?;

    for peer in gossip.peers() {
        match gossip.probe(peer).await {
            Ok(state) => {
                println!("✅ {}", peer);
                println!("{}", serde_json::to_string_pretty(&state)?);
            }
            Err(e) => println!("❌ {}: {}", peer, e),
        }
    }

    Ok(())
}

fn list_personas() {
    let registry = PersonaRegistry::load_embedded();
    println!("Embedded personas:\n");
    for id in registry.list_ids() {
        if let Some(persona) = registry.get(id) {
            println!(
                "  {:<10} {:<12} domains: {}",
                id,
                persona.persona.name,
                persona.expertise.domains.join(", ")
            );
        }
    }
}
