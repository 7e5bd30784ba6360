//! Transition engine service.
//!
//! Runs the background side of path-exploration analytics:
//! - Periodic full recompute of every project's transitions
//! - Incremental updates for sessions that went idle, polled from ClickHouse
//!   into the session queue
//! - ClickHouse schema bootstrap and health reporting

use std::sync::Arc;

use anyhow::{Context, Result};
use tokio::signal;
use tracing::{error, info, warn};

use aggregator::{EngineConfig, TransitionEngine};
use clickhouse_client::{ClickHouseClient, ClickHouseConfig, ClickHouseStore};
use telemetry::{health, init_tracing, TracingConfig};
use worker::{WorkerConfig, WorkerScheduler};

/// Application configuration.
#[derive(Debug, Clone, Default, serde::Serialize, serde::Deserialize)]
struct Config {
    #[serde(default)]
    logging: TracingConfig,

    #[serde(default)]
    engine: EngineConfig,

    #[serde(default)]
    clickhouse: ClickHouseConfig,

    #[serde(default)]
    worker: WorkerConfig,
}

#[tokio::main]
async fn main() -> Result<()> {
    // Load .env file if present
    dotenvy::dotenv().ok();

    let config = load_config()?;

    init_tracing(&config.logging.clone().overlay_env());

    info!("Starting transition engine v{}", env!("CARGO_PKG_VERSION"));
    info!(
        url = %config.clickhouse.url,
        database = %config.clickhouse.database,
        recompute_timeout_secs = config.engine.recompute_timeout_secs,
        sweep_interval_secs = config.worker.sweep_interval_secs,
        "Loaded configuration"
    );

    let clickhouse = Arc::new(
        ClickHouseClient::new(config.clickhouse.clone())
            .context("Failed to create ClickHouse client")?,
    );

    if let Err(e) = clickhouse_client::health::init_schema(&clickhouse).await {
        error!("Failed to initialize ClickHouse schema: {}", e);
        // Continue anyway - schema might already exist
    }

    check_health(&clickhouse).await;

    let store = Arc::new(ClickHouseStore::new(clickhouse.clone()));
    let engine = TransitionEngine::new(
        store.clone(),
        store.clone(),
        store,
        config.engine.clone(),
    );

    let scheduler = Arc::new(WorkerScheduler::new(config.worker.clone(), engine));
    let workers = scheduler.start();

    shutdown_signal().await;

    info!("Shutting down...");
    workers.shutdown().await;
    info!("Shutdown complete");
    Ok(())
}

/// Load configuration from files and environment.
fn load_config() -> Result<Config> {
    let config = config::Config::builder()
        // Start with defaults
        .add_source(config::Config::try_from(&Config::default())?)
        // Load from config file if exists
        .add_source(
            config::File::with_name("config/default")
                .required(false)
                .format(config::FileFormat::Toml),
        )
        // Override with environment variables, e.g. TRANSITIONS__CLICKHOUSE__URL
        .add_source(
            config::Environment::with_prefix("TRANSITIONS")
                .prefix_separator("__")
                .separator("__")
                .try_parsing(true),
        )
        .build()
        .context("Failed to build configuration")?;

    config
        .try_deserialize()
        .context("Failed to deserialize configuration")
}

/// Check component health on startup.
async fn check_health(clickhouse: &ClickHouseClient) {
    let ch_healthy = clickhouse_client::health::check_connection(clickhouse).await;
    if ch_healthy {
        health().clickhouse.set_healthy();
        info!("ClickHouse connection: healthy");
    } else {
        health().clickhouse.set_unhealthy("Connection failed");
        warn!("ClickHouse connection: unhealthy, workers will retry on their schedule");
    }
}

/// Graceful shutdown signal handler.
async fn shutdown_signal() {
    let ctrl_c = async {
        if let Err(e) = signal::ctrl_c().await {
            error!("Failed to install Ctrl+C handler: {}", e);
            std::future::pending::<()>().await;
        }
    };

    #[cfg(unix)]
    let terminate = async {
        match signal::unix::signal(signal::unix::SignalKind::terminate()) {
            Ok(mut stream) => {
                stream.recv().await;
            }
            Err(e) => {
                error!("Failed to install terminate handler: {}", e);
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {
            info!("Received Ctrl+C signal");
        }
        _ = terminate => {
            info!("Received terminate signal");
        }
    }
}
