use corral_core::{
    init_observability, Config, Gateway, HealthChecker, RetentionScheduler, Store, Thresholds,
};
use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Duration;
use tokio::net::TcpListener;
use tracing::{info, warn};

mod api;
mod shutdown;

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    let config = Config::load()?;

    // Initialize observability FIRST
    init_observability(&config.log_level, config.metrics_port)?;

    info!("corral daemon starting");

    let health = HealthChecker::new();
    health.register("daemon").await;

    info!("Initializing sample store at {}", config.db_path);
    let store = Arc::new(Store::new(&config.db_path).await?);
    health.register("database").await;

    let shutdown_rx = shutdown::shutdown_signal();

    // Retention runs for the life of the process and dies with it.
    let retention = RetentionScheduler::new(store.clone(), config.retention_days, config.prune_hour);
    let retention_handle = retention.spawn(shutdown_rx.resubscribe());
    health.register("retention").await;

    let state = api::ApiState {
        gateway: Gateway::new(store.clone()),
        store,
        health,
        thresholds: Thresholds {
            online_threshold: Duration::from_secs(config.online_threshold_minutes * 60),
            warning_threshold: config.warning_threshold,
        },
        auth_token: config.auth_token.clone(),
        history_default_hours: config.history_default_hours,
    };

    if state.auth_token.is_empty() {
        warn!("No auth token configured; the ingest endpoint is open");
    }

    let app = api::build_router(state);
    let addr = SocketAddr::from(([0, 0, 0, 0], config.listen_port));
    let listener = TcpListener::bind(addr).await?;
    info!("API listening on http://{}", addr);

    let mut serve_shutdown = shutdown_rx;
    axum::serve(listener, app)
        .with_graceful_shutdown(async move {
            let _ = serve_shutdown.recv().await;
        })
        .await?;

    info!("Received shutdown signal, draining background tasks");
    if tokio::time::timeout(Duration::from_secs(10), retention_handle).await.is_err() {
        warn!("Retention scheduler did not stop within the grace period");
    }

    info!("corral daemon stopped");
    Ok(())
}
