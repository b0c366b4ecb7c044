//! Helpline server binary.
//!
//! # Usage
//!
//! ```bash
//! # Uses ./helpline.toml
//! helpline-server
//!
//! # Explicit config, verbose logging
//! helpline-server --config /etc/helpline/helpline.toml --log-level debug
//! ```

use std::path::PathBuf;

use clap::Parser;
use helpline_server::{Config, Credentials, Server};
use tracing_subscriber::{EnvFilter, fmt, layer::SubscriberExt, util::SubscriberInitExt};

/// Help desk queue server
#[derive(Parser, Debug)]
#[command(name = "helpline-server")]
#[command(about = "Walk-in help desk queue server")]
#[command(version)]
struct Args {
    /// Path to the TOML config file
    #[arg(short, long, default_value = "helpline.toml")]
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

    tracing::info!("Helpline server starting");
    tracing::info!("Loading config from {}", args.config.display());

    let config = Config::load(&args.config)?;
    let credentials = Credentials::load(&config.credentials_path)?;
    tracing::info!("Loaded {} staff accounts", credentials.len());
    tracing::info!("Binding to {}", config.listen_address);

    let server = Server::bind(config, credentials).await?;

    tracing::info!("Server listening on {}", server.local_addr()?);

    server.run().await?;

    Ok(())
}
