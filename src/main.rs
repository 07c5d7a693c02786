//! syncd - the incremental sync engine daemon.

use std::sync::Arc;
use syncd_ng::bus::EventBus;
use syncd_ng::config::Config;
use syncd_ng::consumers::{self, ConsumerContext};
use syncd_ng::db::Database;
use syncd_ng::notifier::Notifier;
use syncd_ng::state::TypingCache;
use syncd_ng::streams::Streams;
use syncd_ng::{http, metrics};
use tokio_util::sync::CancellationToken;
use tracing::{error, info};
use tracing_subscriber::EnvFilter;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Initialize tracing
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .with_target(true)
        .init();

    // Load configuration
    let config_path = std::env::args()
        .nth(1)
        .unwrap_or_else(|| "config.toml".to_string());

    let config = Config::load(&config_path).map_err(|e| {
        error!(path = %config_path, error = %e, "Failed to load config");
        e
    })?;

    info!(server = %config.server.name, "Starting syncd-ng");

    let shutdown = CancellationToken::new();

    // Initialize database
    let db = Database::new(&config.database.path).await?;

    // Prometheus metrics are optional.
    // Convention: metrics_port = 0 disables the HTTP endpoint (used by tests).
    let metrics_port = config.server.metrics_port;
    if metrics_port == 0 {
        info!("Metrics disabled");
    } else {
        metrics::init();
        info!("Metrics initialized");

        tokio::spawn(http::run_http_server(metrics_port, shutdown.clone()));
        info!(port = metrics_port, "Prometheus HTTP server started");
    }

    // Every stream position comes from one storage snapshot.
    let typing_cache = Arc::new(TypingCache::new());
    let streams = match Streams::new(&db, Arc::clone(&typing_cache), &shutdown).await {
        Ok(streams) => Arc::new(streams),
        Err(e) => {
            error!(error = %e, code = e.error_code(), "FATAL: failed to load stream positions");
            return Err(e.into());
        }
    };
    let notifier = Arc::new(Notifier::new());
    let bus = EventBus::new(&config.bus);

    let ctx = ConsumerContext::new(db.clone(), Arc::clone(&streams), Arc::clone(&notifier));
    let mut tasks = consumers::spawn_all(
        &ctx,
        &bus,
        Arc::clone(&typing_cache),
        config.typing.default_timeout(),
        &shutdown,
    )?;
    info!(count = tasks.len(), "Consumers started");

    tasks.push(tokio::spawn(consumers::run_typing_sweeper(
        ctx,
        typing_cache,
        config.typing.sweep_interval(),
        shutdown.clone(),
    )));
    tasks.push(tokio::spawn(Arc::clone(&notifier).run_pruner(
        config.notifier.prune_interval(),
        shutdown.clone(),
    )));
    info!("Typing sweeper and notifier pruner started");

    // The bus is in-process and nothing outside publishes into it. Hosts
    // that serve clients embed the library instead (see README).
    info!(token = %streams.latest(), "Ready");

    tokio::signal::ctrl_c().await?;
    info!("Shutdown requested");
    shutdown.cancel();

    for task in tasks {
        if let Err(e) = task.await {
            error!(error = %e, "Background task failed");
        }
    }
    db.close().await;
    info!("Shutdown complete");
    Ok(())
}
