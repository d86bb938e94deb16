//! Retain CLI - Main entry point

mod chat;
mod demo;

use clap::{Parser, Subcommand, ValueEnum};
use retain_foundation::{JsonStore, RetentionConfig};
use std::path::PathBuf;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

/// Retain - tiered response cache and conversation memory
#[derive(Parser, Debug)]
#[command(name = "retain")]
#[command(author, version, about, long_about = None)]
struct Args {
    #[command(subcommand)]
    command: Command,

    /// Configuration file (.toml or .json); defaults to the global retain.json
    #[arg(short, long, global = true)]
    config: Option<PathBuf>,

    /// Built-in configuration used when no --config file is given
    #[arg(long, global = true, value_enum, default_value_t = Preset::Default)]
    preset: Preset,

    /// Log level used when RUST_LOG is not set
    #[arg(long, global = true, default_value = "info")]
    log_level: String,

    /// Skip the shared cache tier
    #[arg(long, global = true)]
    local_only: bool,
}

#[derive(ValueEnum, Clone, Copy, Debug, PartialEq, Eq)]
enum Preset {
    /// Global retain.json if present, else defaults
    Default,
    /// Small caches and short conversation windows
    Minimal,
    /// Large caches and long conversation windows
    Performance,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Walk through cache hits and misses, then conversation memory
    Demo {
        /// Model name used for cache keys
        #[arg(short, long, default_value = "qwen2.5:8b")]
        model: String,
    },
    /// Read prompts from stdin, answer through the cache, track the conversation
    Chat {
        /// Model name used for cache keys
        #[arg(short, long, default_value = "qwen2.5:8b")]
        model: String,

        /// Session id; a new one is generated when omitted
        #[arg(short, long)]
        session: Option<String>,

        /// Restore the session from the store on start and save it on exit
        #[arg(long)]
        persist: bool,

        /// Persist under ./.retain instead of the global config directory
        #[arg(long, requires = "persist")]
        project: bool,

        /// Simulated generation latency in milliseconds
        #[arg(long, default_value = "300")]
        latency_ms: u64,
    },
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let args = Args::parse();

    // Initialize logging
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new(&args.log_level)),
        )
        .with(tracing_subscriber::fmt::layer().with_target(false))
        .init();

    let mut config = load_config(args.config.as_deref(), args.preset)?;
    if args.local_only {
        config.cache.shared.enabled = false;
    }

    match args.command {
        Command::Demo { model } => demo::run(config, &model).await,
        Command::Chat {
            model,
            session,
            persist,
            project,
            latency_ms,
        } => {
            let session = session.unwrap_or_else(|| uuid::Uuid::new_v4().to_string());
            let store = match (persist, project) {
                (false, _) => None,
                (true, false) => Some(JsonStore::global()?),
                (true, true) => Some(JsonStore::current_project()?),
            };
            let options = chat::ChatOptions {
                model,
                session,
                store,
                latency: std::time::Duration::from_millis(latency_ms),
            };
            chat::run(config, options).await
        }
    }
}

/// Explicit file, else a preset, else the global store; env overrides last
fn load_config(path: Option<&std::path::Path>, preset: Preset) -> anyhow::Result<RetentionConfig> {
    let mut config = match (path, preset) {
        (Some(path), _) => RetentionConfig::load_file(path)?,
        (None, Preset::Minimal) => RetentionConfig::minimal(),
        (None, Preset::Performance) => RetentionConfig::performance(),
        (None, Preset::Default) => match JsonStore::global() {
            Ok(store) => RetentionConfig::load(&store)?,
            Err(e) => {
                tracing::warn!("No global config directory, using defaults: {}", e);
                RetentionConfig::default()
            }
        },
    };

    config.apply_env()?;
    Ok(config)
}
