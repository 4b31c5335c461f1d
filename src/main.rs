//! Chathub Server
//!
//! Run with: cargo run -- serve
//!
//! # Configuration
//!
//! Settings are read from `--config`, then the default locations
//! (`~/.config/chathub/config.toml`, `/etc/chathub/config.toml`,
//! `./config.toml`), then `CHATHUB_*` environment variables.
//! `RUST_LOG` takes precedence over `logging.level`.

use anyhow::Context;
use clap::{Parser, Subcommand};
use std::path::PathBuf;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

use chathub::api::{serve, AppState};
use chathub::config::{generate_default_config, Config, LoggingConfig};

#[derive(Parser)]
#[command(name = "chathub")]
#[command(version = env!("CARGO_PKG_VERSION"))]
#[command(about = "Real-time connection hub for chat clients")]
pub struct Cli {
    #[command(subcommand)]
    pub command: Commands,
}

#[derive(Subcommand)]
pub enum Commands {
    /// Run the HTTP and WebSocket server
    Serve {
        /// Config file (default: search standard locations)
        #[arg(short, long)]
        config: Option<PathBuf>,

        /// Override the bind host
        #[arg(long)]
        host: Option<String>,

        /// Override the bind port
        #[arg(short, long)]
        port: Option<u16>,
    },
    /// Print a default config file
    Config,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();

    match cli.command {
        Commands::Serve { config, host, port } => {
            // The real subscriber depends on the config, so anything logged
            // while loading it goes through a temporary one
            let bootstrap = tracing_subscriber::fmt()
                .with_env_filter(
                    EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
                )
                .finish();
            let mut config = tracing::subscriber::with_default(bootstrap, || load_config(config))?;

            if let Some(host) = host {
                config.server.host = host;
            }
            if let Some(port) = port {
                config.server.port = port;
            }

            init_tracing(&config.logging);

            tracing::info!("Starting Chathub v{}", env!("CARGO_PKG_VERSION"));
            tracing::info!(
                outbox_capacity = config.hub.outbox_capacity,
                fanout_queue = config.hub.fanout_queue,
                overflow_policy = %config.hub.overflow_policy,
                duplicate_policy = %config.hub.duplicate_policy,
                "Hub configuration"
            );

            let state = AppState::new(config);
            serve(state).await.context("Server failed")?;
        }
        Commands::Config => {
            print!("{}", generate_default_config());
        }
    }

    Ok(())
}

fn load_config(path: Option<PathBuf>) -> anyhow::Result<Config> {
    if let Some(path) = path {
        return Config::load_with_env(&path)
            .with_context(|| format!("Failed to load config from {:?}", path));
    }

    let report = Config::load_default();
    for failure in &report.failures {
        tracing::warn!("Skipping config file: {}", failure);
    }
    match &report.source {
        Some(path) => tracing::info!("Loaded config from {:?}", path),
        None => tracing::info!("Using default config with environment overrides"),
    }

    Ok(report.config)
}

fn init_tracing(logging: &LoggingConfig) {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| {
        format!("chathub={},tower_http=info", logging.level).into()
    });

    let registry = tracing_subscriber::registry().with(filter);

    if logging.format == "json" {
        registry.with(tracing_subscriber::fmt::layer().json()).init();
    } else {
        registry.with(tracing_subscriber::fmt::layer()).init();
    }
}
