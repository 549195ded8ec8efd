mod commands;

use alphasync_core::Config;
use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use std::path::PathBuf;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

#[derive(Parser, Debug)]
#[command(name = "alphasync", version, about = "Sync photos and videos from a camera over UPnP")]
struct Cli {
    /// Configuration file (defaults to <config dir>/alphasync/config.toml)
    #[arg(long, global = true)]
    config: Option<PathBuf>,

    /// Skip SSDP and fetch the service directory from the fallback URL
    #[arg(long, global = true)]
    no_ssdp: bool,

    /// SSDP deadline in milliseconds
    #[arg(long, global = true, value_name = "MS")]
    wait_for: Option<u64>,

    /// SSDP M-SEARCH repeat period in milliseconds
    #[arg(long, global = true, value_name = "MS")]
    send_every: Option<u64>,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Find the camera and list its services
    Discover,
    /// Print the camera's folder tree and per-date item counts
    Tree {
        /// Print the tree and date index as JSON
        #[arg(long)]
        json: bool,
    },
    /// Download media that is not present locally yet
    Sync {
        /// Destination root (defaults to the configured destination)
        #[arg(long)]
        dest: Option<PathBuf>,
        /// Walk the tree and download photos flat into the destination
        #[arg(long, conflicts_with = "date")]
        by_tree: bool,
        /// Only sync this date folder
        #[arg(long)]
        date: Option<String>,
    },
    /// Save the current live-view image
    Shot { path: PathBuf },
    /// Download a single URL, overwriting the destination
    Fetch { url: String, path: PathBuf },
}

#[tokio::main]
async fn main() -> Result<()> {
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "info,alphasync=debug".into()),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();

    let cli = Cli::parse();
    let config = load_config(&cli)?;

    match cli.command {
        Command::Discover => commands::discover(config, cli.no_ssdp).await,
        Command::Tree { json } => commands::tree(config, cli.no_ssdp, json).await,
        Command::Sync { dest, by_tree, date } => {
            let dest = dest.unwrap_or_else(|| config.sync.destination.clone());
            commands::sync(config, cli.no_ssdp, &dest, by_tree, date.as_deref()).await
        }
        Command::Shot { path } => commands::shot(config, cli.no_ssdp, &path).await,
        Command::Fetch { url, path } => commands::fetch(config, &url, &path).await,
    }
}

/// Load the configuration file and apply command-line overrides
fn load_config(cli: &Cli) -> Result<Config> {
    let mut config = match &cli.config {
        Some(path) => Config::load(path)
            .with_context(|| format!("Failed to load config from {}", path.display()))?,
        None => {
            let path = default_config_path()?;
            Config::load_or_default(&path)
                .with_context(|| format!("Failed to load config from {}", path.display()))?
        }
    };

    if let Some(ms) = cli.wait_for {
        config.ssdp.wait_for_ms = ms;
    }
    if let Some(ms) = cli.send_every {
        config.ssdp.send_every_ms = ms;
    }
    config.validate().context("Invalid configuration")?;

    Ok(config)
}

fn default_config_path() -> Result<PathBuf> {
    let config_dir = dirs::config_dir()
        .ok_or_else(|| anyhow::anyhow!("Failed to get config directory"))?
        .join("alphasync");
    Ok(config_dir.join("config.toml"))
}
