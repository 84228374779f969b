//! Graceful shutdown handling for corrald.
//!
//! Every long-lived activity (the HTTP server, the retention scheduler)
//! subscribes to one broadcast channel that fires when the process receives
//! SIGTERM or SIGINT.

use tokio::sync::broadcast;
use tracing::info;

/// Create a shutdown signal receiver.
///
/// Returns a broadcast receiver that fires when SIGTERM or SIGINT arrives.
/// Use `resubscribe()` to hand a copy to each background task.
pub fn shutdown_signal() -> broadcast::Receiver<()> {
    let (tx, rx) = broadcast::channel(1);

    tokio::spawn(async move {
        let ctrl_c = async {
            tokio::signal::ctrl_c().await.expect("Failed to install Ctrl+C handler");
        };

        #[cfg(unix)]
        let terminate = async {
            tokio::signal::unix::signal(tokio::signal::unix::SignalKind::terminate())
                .expect("Failed to install SIGTERM handler")
                .recv()
                .await;
        };

        #[cfg(not(unix))]
        let terminate = std::future::pending::<()>();

        tokio::select! {
            _ = ctrl_c => {
                info!("Received SIGINT (Ctrl+C)");
            }
            _ = terminate => {
                info!("Received SIGTERM");
            }
        }

        let _ = tx.send(());
    });

    rx
}
