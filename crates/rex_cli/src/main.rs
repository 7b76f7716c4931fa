mod brain;
mod remote_reasoner;

use brain::AutonomousBrain;
use clap::{Parser, Subcommand};
use remote_reasoner::AnthropicReasoner;
use rex_core::CoreConfig;
use rex_limbic::{PersonalityModel, SharedMood};
use rex_memory::MemoryStore;
use rex_reasoning::{ExternalReasoner, MemoryMaintainer, ToolDispatcher};
use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;
use tracing_subscriber::EnvFilter;

#[derive(Parser)]
#[command(name = "rex", version, about = "Autonomous cognitive core for a social robot dog")]
struct Args {
    /// Path to the TOML configuration file.
    #[arg(long, env = "REX_CONFIG", default_value = "rex.toml")]
    config: PathBuf,

    /// Overrides `memory.db_path` from the config file.
    #[arg(long, env = "REX_DB_PATH")]
    db_path: Option<String>,

    /// Forces the local behavior-tree backend, skipping the remote reasoner.
    #[arg(long, env = "REX_LOCAL_ONLY")]
    local_only: bool,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand)]
enum Command {
    /// Start the autonomous loop and run until interrupted.
    Run,
    /// Print memory store counts and the last maintenance cycle's stats.
    Stats,
    /// Overwrite the persisted personality file from a TOML file.
    ImportPersonality { path: PathBuf },
    /// Write the current personality to a TOML file.
    ExportPersonality { path: PathBuf },
}

/// A reasoner that always reports unavailable. Used in place of a real
/// remote reasoner so `MemoryMaintainer`, which always needs one, still has
/// somewhere to send consolidation requests when running fully local.
struct UnavailableReasoner;

#[async_trait::async_trait]
impl ExternalReasoner for UnavailableReasoner {
    async fn think(&self, _system: &str, _prompt: &str) -> anyhow::Result<String> {
        anyhow::bail!("remote reasoner unavailable (running in local-only mode)")
    }
}

fn init_tracing() {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));
    tracing_subscriber::fmt().with_env_filter(filter).init();
}

fn load_config(args: &Args) -> CoreConfig {
    let mut config = CoreConfig::load_or_default(&args.config);
    if let Some(db_path) = &args.db_path {
        config.memory.db_path = db_path.clone();
    }
    if args.local_only {
        config.reasoner.local_only = true;
    }
    config
}

fn build_reasoner(config: &CoreConfig) -> Arc<dyn ExternalReasoner> {
    if config.reasoner.local_only {
        return Arc::new(UnavailableReasoner);
    }
    match AnthropicReasoner::new(&config.reasoner.model, config.reasoner.timeout_secs) {
        Ok(reasoner) => Arc::new(reasoner),
        Err(e) => {
            tracing::warn!("falling back to local-only mode: {e}");
            Arc::new(UnavailableReasoner)
        }
    }
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    dotenv::dotenv().ok();
    init_tracing();
    let args = Args::parse();
    let config = load_config(&args);

    match &args.command {
        Command::Run => run(config).await,
        Command::Stats => stats(config).await,
        Command::ImportPersonality { path } => import_personality(config, path).await,
        Command::ExportPersonality { path } => export_personality(config, path).await,
    }
}

async fn run(config: CoreConfig) -> anyhow::Result<()> {
    let memory = Arc::new(MemoryStore::connect(&config.memory.db_path).await?);
    let personality = Arc::new(PersonalityModel::load(&config.memory.personality_path));
    let mood = SharedMood::new(rex_core::Mood::default());
    let dispatcher = Arc::new(ToolDispatcher::new(memory.clone(), personality.clone()));

    let reasoner_for_brain: Option<Arc<dyn ExternalReasoner>> = if config.reasoner.local_only {
        None
    } else {
        Some(build_reasoner(&config))
    };

    let brain = Arc::new(AutonomousBrain::new(
        mood,
        personality.clone(),
        memory.clone(),
        dispatcher,
        reasoner_for_brain,
        config.reasoner.local_only,
        &config.rate_limit,
        config.brain.observation_queue_capacity,
        Duration::from_secs_f64(config.brain.tick_interval_secs),
    ));

    let maintainer = Arc::new(MemoryMaintainer::new(
        memory.clone(),
        build_reasoner(&config),
        config.maintenance.clone(),
    ));

    let brain_handle = tokio::spawn({
        let brain = brain.clone();
        async move { brain.run().await }
    });

    let stop = tokio::sync::Notify::new();
    let maintainer_handle = tokio::spawn({
        let maintainer = maintainer.clone();
        let brain = brain.clone();
        async move {
            maintainer.run(stop, move || brain.is_interacting()).await;
        }
    });

    tracing::info!("rex is running; press Ctrl-C to stop");
    tokio::signal::ctrl_c().await?;
    tracing::info!("shutting down");

    brain.stop();
    let shutdown_timeout = Duration::from_secs(5);
    if tokio::time::timeout(shutdown_timeout, brain_handle).await.is_err() {
        tracing::warn!("brain loop did not exit within the shutdown timeout");
    }
    maintainer_handle.abort();

    memory.close().await;
    Ok(())
}

async fn stats(config: CoreConfig) -> anyhow::Result<()> {
    let memory = MemoryStore::connect(&config.memory.db_path).await?;
    let counts = memory.stats().await?;
    println!("memory counts:");
    for (table, count) in &counts {
        println!("  {table}: {count}");
    }
    memory.close().await;
    Ok(())
}

async fn import_personality(config: CoreConfig, path: &PathBuf) -> anyhow::Result<()> {
    let content = std::fs::read_to_string(path)?;
    let personality: rex_core::Personality = toml::from_str(&content)?;
    let mut personality = personality;
    personality.normalize();
    let serialized = toml::to_string_pretty(&personality)?;
    std::fs::write(&config.memory.personality_path, serialized)?;
    println!("imported personality into {}", config.memory.personality_path);
    Ok(())
}

async fn export_personality(config: CoreConfig, path: &PathBuf) -> anyhow::Result<()> {
    let model = PersonalityModel::load(&config.memory.personality_path);
    let personality = model.get();
    let serialized = toml::to_string_pretty(&personality)?;
    std::fs::write(path, serialized)?;
    println!("exported personality to {}", path.display());
    Ok(())
}
