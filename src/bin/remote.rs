//! Climb remote relay
//!
//! Runs outside the filtered network:
//! - Accepts tunnel connections from local relays
//! - Opens the real outbound connection for each one

use anyhow::{Context, Result};
use clap::Parser;
use climb::config::{generate_example_config, Config};
use climb::RemoteRelay;
use tracing::{error, info, warn};

/// Climb remote relay - exit end of the tunnel
#[derive(Parser, Debug)]
#[command(name = "climb-remote")]
#[command(about = "Climb remote relay - exit end of the tunnel")]
#[command(version)]
struct Args {
    /// Configuration file path
    #[arg(short, long)]
    config: Option<String>,

    /// Print an example configuration and exit
    #[arg(long)]
    generate_config: bool,

    /// Listen host (overrides config)
    #[arg(short = 'H', long)]
    host: Option<String>,

    /// Listen port (overrides config)
    #[arg(short, long)]
    port: Option<u16>,

    /// Shared key (overrides config)
    #[arg(short, long)]
    key: Option<String>,

    /// Log level (trace, debug, info, warn, error)
    #[arg(short = 'v', long)]
    log_level: Option<String>,
}

#[tokio::main]
async fn main() -> Result<()> {
    let args = Args::parse();

    if args.generate_config {
        let example = toml::to_string_pretty(&generate_example_config())
            .context("Failed to render example config")?;
        println!("{}", example);
        return Ok(());
    }

    let config = match &args.config {
        Some(path) => Config::load(path).context("Failed to load configuration")?,
        None => Config::default(),
    };

    let level = args.log_level.unwrap_or(config.logging.level);
    tracing_subscriber::fmt().with_env_filter(level).init();

    let mut remote = config.remote.unwrap_or_default();
    if let Some(host) = args.host {
        remote.listen_host = host;
    }
    if let Some(port) = args.port {
        remote.listen_port = port;
    }
    if let Some(key) = args.key {
        remote.key = key;
    }

    info!("Climb remote relay v{}", climb::VERSION);
    if remote.key == climb::protocol::DEFAULT_KEY {
        warn!("Using the built-in default key; set key in the [remote] section or pass --key");
    }

    let listener = RemoteRelay::new(remote)
        .bind()
        .await
        .context("Failed to bind to address")?;

    tokio::select! {
        result = listener.run() => {
            if let Err(e) = &result {
                error!("Relay stopped: {}", e);
            }
            result.context("Remote relay failed")?;
        }
        _ = tokio::signal::ctrl_c() => {
            info!("Shutting down...");
        }
    }

    Ok(())
}
