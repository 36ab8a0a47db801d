//! Climb local relay
//!
//! Runs next to the applications:
//! - Accepts SOCKS5 CONNECT requests
//! - Forwards each one through the obfuscated tunnel to the remote relay

use anyhow::{Context, Result};
use clap::Parser;
use climb::config::{generate_example_config, Config, LocalConfig};
use climb::LocalRelay;
use tracing::{error, info};

/// Climb local relay - SOCKS5 front end of the tunnel
#[derive(Parser, Debug)]
#[command(name = "climb-local")]
#[command(about = "Climb local relay - SOCKS5 front end of the tunnel")]
#[command(version)]
struct Args {
    /// Configuration file path
    #[arg(short, long)]
    config: Option<String>,

    /// Print an example configuration and exit
    #[arg(long)]
    generate_config: bool,

    /// SOCKS5 listen host (overrides config)
    #[arg(short = 'H', long)]
    host: Option<String>,

    /// SOCKS5 listen port (overrides config)
    #[arg(short, long)]
    port: Option<u16>,

    /// Remote relay host (overrides config)
    #[arg(long)]
    server_host: Option<String>,

    /// Remote relay port (overrides config)
    #[arg(long)]
    server_port: Option<u16>,

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

    let level = args.log_level.clone().unwrap_or(config.logging.level);
    tracing_subscriber::fmt().with_env_filter(level).init();

    let mut local = config.local.unwrap_or_default();
    apply_overrides(&mut local, args);

    info!("Climb local relay v{}", climb::VERSION);
    info!("Tunnel to {}:{}", local.server_host, local.server_port);

    let listener = LocalRelay::new(local)
        .bind()
        .await
        .context("Failed to bind to address")?;

    tokio::select! {
        result = listener.run() => {
            if let Err(e) = &result {
                error!("Relay stopped: {}", e);
            }
            result.context("Local relay failed")?;
        }
        _ = tokio::signal::ctrl_c() => {
            info!("Shutting down...");
        }
    }

    Ok(())
}

fn apply_overrides(local: &mut LocalConfig, args: Args) {
    if let Some(host) = args.host {
        local.listen_host = host;
    }
    if let Some(port) = args.port {
        local.listen_port = port;
    }
    if let Some(host) = args.server_host {
        local.server_host = host;
    }
    if let Some(port) = args.server_port {
        local.server_port = port;
    }
    if let Some(key) = args.key {
        local.key = key;
    }
}
