//! `scribe`: run the blog server or write a starter config.
//!
//! Usage:
//!   scribe serve [--host <host>] [--port <port>] [--config <path>]
//!   scribe init-config [--config <path>] [--force]

use anyhow::{bail, Result};
use clap::{Parser, Subcommand};
use scribe::config::{default_config_path, Config};
use std::path::PathBuf;

#[derive(Parser, Debug)]
#[command(name = "scribe", version, about = "A small multi-user blog")]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand, Debug)]
enum Commands {
    /// Start the HTTP server.
    Serve {
        /// Bind address (overrides config).
        #[arg(long)]
        host: Option<String>,

        /// Port (overrides config).
        #[arg(short, long)]
        port: Option<u16>,

        /// Config file (default: per-user config dir).
        #[arg(short, long)]
        config: Option<PathBuf>,
    },

    /// Write a default config file.
    InitConfig {
        #[arg(short, long)]
        config: Option<PathBuf>,

        /// Overwrite an existing file.
        #[arg(long)]
        force: bool,
    },
}

#[tokio::main]
async fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "scribe=info,tower_http=info".into()),
        )
        .init();

    match Cli::parse().command {
        Commands::Serve { host, port, config } => {
            let mut config = Config::load(config.as_deref())?;
            if let Some(host) = host {
                config.gateway.host = host;
            }
            if let Some(port) = port {
                config.gateway.port = port;
            }
            scribe::gateway::run_gateway(config).await
        }
        Commands::InitConfig { config, force } => {
            let path = match config {
                Some(p) => p,
                None => default_config_path()?,
            };
            if path.exists() && !force {
                bail!(
                    "Config already exists at {} (use --force to overwrite)",
                    path.display()
                );
            }
            Config::default().save(&path)?;
            println!("✅ Wrote default config to {}", path.display());
            Ok(())
        }
    }
}
