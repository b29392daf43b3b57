use std::net::SocketAddr;
use std::sync::Arc;

use clap::Parser;
use tokio::signal;
use tracing::info;
use tracing_subscriber::EnvFilter;

use slidegate::brokers::{BrokerValidator, HttpBrokerDirectory};
use slidegate::config::SlidegateConfig;
use slidegate::http::{AppState, HttpServer};
use slidegate::ratelimit::{spawn_sweeper, RateLimiter};

/// Sliding-window rate limiting and broker validation service.
#[derive(Debug, Parser)]
#[command(name = "slidegate", version, about)]
struct Args {
    /// Path to a YAML configuration file
    #[arg(short, long)]
    config: Option<String>,

    /// Override the HTTP listen address
    #[arg(long)]
    http_addr: Option<SocketAddr>,

    /// Emit logs as JSON
    #[arg(long)]
    log_json: bool,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let args = Args::parse();

    // Initialize tracing
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));
    if args.log_json {
        tracing_subscriber::fmt()
            .json()
            .with_env_filter(filter)
            .with_target(false)
            .init();
    } else {
        tracing_subscriber::fmt()
            .with_env_filter(filter)
            .with_target(false)
            .with_thread_ids(true)
            .init();
    }

    info!("Starting Slidegate");
    info!("Version: {}", env!("CARGO_PKG_VERSION"));

    // Load configuration, letting SLIDEGATE__* variables override the file
    let mut config = SlidegateConfig::load(args.config.as_deref())?;
    if let Some(addr) = args.http_addr {
        config.server.http_addr = addr;
    }
    info!(
        http_addr = %config.server.http_addr,
        cleanup_interval_ms = config.rate_limiting.cleanup_interval_ms,
        "Configuration loaded"
    );

    // Initialize the rate limiter and its sweep
    let rate_limiter = Arc::new(RateLimiter::with_cleanup_interval(
        config.rate_limiting.cleanup_interval(),
    ));
    let sweeper = spawn_sweeper(rate_limiter.clone());
    info!("Rate limiter initialized");

    let validator = match config.brokers.directory_url.as_deref() {
        Some(url) => {
            info!(directory_url = %url, "Using admin broker directory");
            let directory = HttpBrokerDirectory::new(url, config.brokers.request_timeout());
            BrokerValidator::new(Arc::new(directory), config.brokers.fallback.clone())
        }
        None => {
            info!("No broker directory configured, using fallback table only");
            BrokerValidator::fallback_only(config.brokers.fallback.clone())
        }
    };

    let state = AppState {
        rate_limiter,
        validator: Arc::new(validator),
        broker_policy: config.rate_limiting.broker_validation,
    };

    // Run the server with graceful shutdown on Ctrl+C
    HttpServer::new(config.server.http_addr, state)
        .serve_with_shutdown(shutdown_signal())
        .await?;

    sweeper.shutdown().await;

    info!("Slidegate stopped");
    Ok(())
}

/// Wait for a shutdown signal (Ctrl+C or SIGTERM).
async fn shutdown_signal() {
    let ctrl_c = async {
        signal::ctrl_c()
            .await
            .expect("Failed to install Ctrl+C handler");
    };

    #[cfg(unix)]
    let terminate = async {
        signal::unix::signal(signal::unix::SignalKind::terminate())
            .expect("Failed to install SIGTERM handler")
            .recv()
            .await;
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {
            info!("Received Ctrl+C, initiating graceful shutdown");
        }
        _ = terminate => {
            info!("Received SIGTERM, initiating graceful shutdown");
        }
    }
}
