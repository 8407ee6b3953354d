//! Futures gateway entry point

use anyhow::{Context, Result};
use clap::Parser;
use gateway::{build_context, GatewayEvents, MarketDataRouter};
use gateway_config::GatewayConfig;
use network::Server;
use std::path::PathBuf;
use std::sync::Arc;
use tracing::{info, warn};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

#[derive(Parser, Debug)]
#[command(author, version, about, long_about = None)]
struct Args {
    /// Configuration file path
    #[arg(short, long)]
    config: Option<PathBuf>,

    /// Log filter used when RUST_LOG is unset (overrides the config file)
    #[arg(long)]
    log_level: Option<String>,

    /// Emit logs as JSON lines
    #[arg(long)]
    json_logs: bool,

    /// Print the effective configuration and exit
    #[arg(long)]
    print_config: bool,
}

fn init_tracing(level: &str, json: bool) {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(level));
    let registry = tracing_subscriber::registry().with(filter);
    if json {
        registry.with(tracing_subscriber::fmt::layer().json()).init();
    } else {
        registry.with(tracing_subscriber::fmt::layer()).init();
    }
}

#[tokio::main]
async fn main() -> Result<()> {
    let args = Args::parse();

    let config = GatewayConfig::load(args.config.as_deref()).context("Failed to load configuration")?;
    if args.print_config {
        print!("{}", config.to_toml_string()?);
        return Ok(());
    }

    let level = args.log_level.as_deref().unwrap_or(&config.logging.level);
    init_tracing(level, args.json_logs || config.logging.json);

    info!("Starting futures gateway");
    info!("Version: {}", env!("CARGO_PKG_VERSION"));
    if config.users.is_empty() {
        warn!("No users configured; every login will be refused");
    }

    let router = MarketDataRouter::new();
    let events = Arc::new(GatewayEvents::default());
    let context = build_context(&config, router).with_events(events.clone());
    let server = Server::bind(context).await.context("Failed to start server")?;
    info!(addr = %server.local_addr()?, users = config.users.len(), "Gateway listening");

    let shutdown = server.shutdown_token();
    tokio::spawn(async move {
        if let Err(e) = tokio::signal::ctrl_c().await {
            warn!("Failed to listen for Ctrl-C: {}", e);
            return;
        }
        info!("Shutdown signal received");
        shutdown.cancel();
    });

    server.run().await?;

    for (event, total) in events.totals() {
        info!(event, total, "Session event total");
    }
    Ok(())
}
