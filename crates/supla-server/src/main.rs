//! Server binary.
//!
//! ```bash
//! supla-server --config server.toml
//! ```
//!
//! The config file declares listeners, credentials and the whole world
//! (devices, channels, scenes); see `config.example.toml`.

use std::path::PathBuf;

use clap::Parser;
use supla_server::{handlers, RuntimeConfig, Server};
use tracing_subscriber::{fmt, layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

/// Lightweight SUPLA protocol server
#[derive(Parser, Debug)]
#[command(name = "supla-server")]
#[command(about = "Lightweight SUPLA home-automation server")]
#[command(version)]
struct Args {
    /// Path to the TOML configuration file
    #[arg(short, long)]
    config: PathBuf,

    /// Log level (trace, debug, info, warn, error)
    #[arg(long, default_value = "info")]
    log_level: String,
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    let args = Args::parse();
    let filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(&args.log_level));
    tracing_subscriber::registry().with(fmt::layer()).with(filter).init();

    let raw = std::fs::read_to_string(&args.config)?;
    let config: supla_core::Config = toml::from_str(&raw)?;

    let base = args.config.parent().unwrap_or_else(|| std::path::Path::new("."));
    let state = supla_core::config::build_state(&config, base)?;
    let runtime = RuntimeConfig::from_config(&config);

    let registry = handlers::default_registry().build();
    let server = Server::start(runtime, state, registry).await?;

    server.run().await?;
    Ok(())
}
