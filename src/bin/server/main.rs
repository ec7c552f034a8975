//! Kuba Counter HTTP server
//!
//! # Usage
//!
//! ```bash
//! # Start with application.toml or defaults (in-memory store)
//! kuba-counter
//!
//! # Explicit config file and listen address
//! kuba-counter --config /etc/counter.toml --listen 0.0.0.0:9000 start
//!
//! # Validate configuration only
//! kuba-counter check-config
//! ```

mod config;

use clap::{Parser, Subcommand};
use kuba_counter::config::{ApplicationConfig, CONFIG_PATH_ENV};
use kuba_counter::http::{build_router, AppState};
use kuba_counter::metrics;
use kuba_counter::redis::{HealthStatus, RedisPool, RedisRecordStore};
use kuba_counter::store::{InMemoryRecordStore, RecordStore};
use kuba_counter::MetricService;

use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Duration;
use tokio::signal;
use tracing::{debug, info, warn};

/// Interval between background Redis health checks
const HEALTH_CHECK_INTERVAL: Duration = Duration::from_secs(30);

// =============================================================================
// CLI Definition
// =============================================================================

/// Kuba Counter - per-entity event counting service
#[derive(Parser)]
#[command(name = "kuba-counter")]
#[command(version)]
#[command(about = "Streamed per-entity counts with windowed bucket sums", long_about = None)]
struct Cli {
    #[command(subcommand)]
    command: Option<Commands>,

    /// Path to configuration file (overrides COUNTER_CONFIG env var)
    #[arg(short, long, global = true)]
    config: Option<std::path::PathBuf>,

    /// Override listen address (e.g., 0.0.0.0:8080)
    #[arg(short, long, global = true)]
    listen: Option<String>,
}

#[derive(Subcommand)]
enum Commands {
    /// Start the HTTP server (default)
    Start,

    /// Validate configuration without starting the server
    CheckConfig,
}

// =============================================================================
// Server Setup
// =============================================================================

/// Graceful shutdown signal handler
///
/// Signal registration failure is logged and that signal is ignored.
async fn shutdown_signal() {
    let ctrl_c = async {
        match signal::ctrl_c().await {
            Ok(()) => {},
            Err(e) => {
                warn!(
                    error = %e,
                    "Ctrl+C handler installation failed - graceful shutdown unavailable"
                );
                std::future::pending::<()>().await;
            },
        }
    };

    #[cfg(unix)]
    let terminate = async {
        match signal::unix::signal(signal::unix::SignalKind::terminate()) {
            Ok(mut stream) => {
                stream.recv().await;
            },
            Err(e) => {
                warn!(
                    error = %e,
                    "SIGTERM handler installation failed - SIGTERM shutdown unavailable"
                );
                std::future::pending::<()>().await;
            },
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {},
        _ = terminate => {},
    }

    info!("Shutdown signal received, starting graceful shutdown");
}

/// Open the configured record store
async fn init_store(
    app_config: &ApplicationConfig,
) -> Result<Arc<dyn RecordStore>, Box<dyn std::error::Error>> {
    if !app_config.redis.enabled {
        info!("Redis disabled, records are kept in memory and lost on restart");
        metrics::set_healthy(true);
        return Ok(Arc::new(InMemoryRecordStore::new()));
    }

    let pool = RedisPool::new(app_config.redis.pool_config()).await?;
    let store = Arc::new(RedisRecordStore::new(pool, app_config.redis.store_config())?);
    metrics::set_healthy(store.health_check().await == HealthStatus::Healthy);

    // Periodic health probe feeding the health gauge
    let probe = store.clone();
    tokio::spawn(async move {
        let mut interval = tokio::time::interval(HEALTH_CHECK_INTERVAL);
        interval.tick().await;

        loop {
            interval.tick().await;
            let status = probe.health_check().await;
            metrics::set_healthy(status == HealthStatus::Healthy);
            if status != HealthStatus::Healthy {
                let pool = probe.pool_metrics();
                warn!(
                    status = status.as_str(),
                    command_failures = pool.command_failures,
                    retries = pool.retries,
                    "Redis health check degraded"
                );
            }
        }
    });

    Ok(store)
}

/// Validate configuration and print the effective settings
fn check_config(app_config: &ApplicationConfig) -> Result<(), Box<dyn std::error::Error>> {
    app_config.validate()?;
    println!("{}", app_config.to_toml()?);
    println!("Configuration is valid");
    Ok(())
}

async fn start(app_config: ApplicationConfig) -> Result<(), Box<dyn std::error::Error>> {
    let filter = tracing_subscriber::EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new(&app_config.server.log_level));

    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(true)
        .with_thread_ids(false)
        .with_file(false)
        .with_line_number(false)
        .init();

    info!("Starting Kuba Counter v{}", env!("CARGO_PKG_VERSION"));
    app_config.validate()?;
    debug!(
        listen_addr = %app_config.server.listen_addr,
        redis_enabled = app_config.redis.enabled,
        granularity_secs = app_config.query.granularity_secs,
        "Configuration loaded"
    );

    let store = init_store(&app_config).await?;
    let service = MetricService::new(store, app_config.query.granularity_secs)?;
    let state = Arc::new(AppState::new(service, app_config.ingestion.max_line_bytes));

    let app = build_router(state, &app_config.server.cors_allowed_origins);

    let addr: SocketAddr = app_config.server.listen_addr.parse()?;
    let listener = tokio::net::TcpListener::bind(addr).await?;
    info!("Server listening on http://{}", addr);

    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await?;

    info!("Server shutdown complete");
    Ok(())
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    let cli = Cli::parse();

    if let Some(config_path) = &cli.config {
        std::env::set_var(CONFIG_PATH_ENV, config_path);
    }

    let mut app_config = config::load_config()?;
    if let Some(listen) = &cli.listen {
        app_config.server.listen_addr = listen.clone();
    }

    match cli.command.unwrap_or(Commands::Start) {
        Commands::Start => start(app_config).await,
        Commands::CheckConfig => check_config(&app_config),
    }
}
