//! Veil Gateway - crypt metadata server

use clap::Parser;
use std::path::PathBuf;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};
use veil_gateway::{GatewayConfig, run_server_with_shutdown};

#[derive(Parser, Debug)]
#[command(name = "veil-gateway")]
#[command(about = "Crypt metadata gateway for the Veil virtual filesystem")]
#[command(version)]
struct Args {
    /// Configuration file (TOML, JSON or YAML)
    #[arg(short, long, env = "VEIL_CONFIG")]
    config: Option<PathBuf>,

    /// Host to bind to, overrides the configuration
    #[arg(short = 'H', long)]
    host: Option<String>,

    /// Port to listen on, overrides the configuration
    #[arg(short, long)]
    port: Option<u16>,

    /// Enable debug logging
    #[arg(short, long, env = "VEIL_DEBUG")]
    debug: bool,

    /// Emit logs as JSON
    #[arg(long, env = "VEIL_LOG_JSON")]
    log_json: bool,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Load .env file if present
    dotenvy::dotenv().ok();

    let args = Args::parse();

    // Setup logging
    let log_level = if args.debug { "debug" } else { "info" };
    let filter = tracing_subscriber::EnvFilter::try_from_default_env().unwrap_or_else(|_| {
        format!(
            "veil_gateway={level},veil_core={level},veil_storage={level},tower_http=debug",
            level = log_level
        )
        .into()
    });
    let registry = tracing_subscriber::registry().with(filter);
    if args.log_json {
        registry.with(tracing_subscriber::fmt::layer().json()).init();
    } else {
        registry.with(tracing_subscriber::fmt::layer()).init();
    }

    let mut config = GatewayConfig::load(args.config.as_deref())?;
    if let Some(host) = args.host {
        config.host = host;
    }
    if let Some(port) = args.port {
        config.port = port;
    }

    tracing::info!(
        "Starting Veil Gateway on {} with {} mount(s)",
        config.bind_addr(),
        config.mounts.len()
    );
    if config.token.is_empty() {
        tracing::warn!("Signed links will not survive a restart without a configured token");
    }

    run_server_with_shutdown(config, async {
        if let Err(e) = tokio::signal::ctrl_c().await {
            tracing::error!(error = %e, "failed to listen for shutdown signal");
        }
    })
    .await
}
