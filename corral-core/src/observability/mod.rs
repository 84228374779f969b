//! Observability infrastructure: tracing, metrics, health checks.

use metrics_exporter_prometheus::PrometheusBuilder;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

pub mod health;
pub mod metrics;

/// Initialize the global observability infrastructure.
///
/// Must be called once at process startup, before the store or any
/// background task comes up. `RUST_LOG` wins over the configured level.
pub fn init(log_level: &str, metrics_port: u16) -> Result<(), Box<dyn std::error::Error>> {
    let filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(log_level));

    tracing_subscriber::registry()
        .with(filter)
        .with(tracing_subscriber::fmt::layer().with_target(true).with_level(true))
        .init();

    // Prometheus scrape endpoint on its own port, away from the API.
    PrometheusBuilder::new()
        .with_http_listener(([0, 0, 0, 0], metrics_port))
        .install()?;

    metrics::register_core_metrics();

    tracing::info!(metrics_port, "Observability initialized");
    Ok(())
}
