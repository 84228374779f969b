//! Sample retention.
//!
//! A long-lived background task that prunes samples past the retention
//! window: once at process start, then every day at a fixed local wall-clock
//! hour so the delete lands in a low-traffic window regardless of uptime.
//! Failures are logged and retried at the next tick, never fatal.

use crate::store::Store;
use chrono::{DateTime, Local, TimeDelta, TimeZone, Timelike};
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::broadcast;
use tokio::task::JoinHandle;
use tracing::{info, instrument, warn};

/// Periodic pruning of expired samples.
pub struct RetentionScheduler {
    store: Arc<Store>,
    retention: Duration,
    prune_hour: u32,
}

impl RetentionScheduler {
    pub fn new(store: Arc<Store>, retention_days: u32, prune_hour: u32) -> Self {
        Self {
            store,
            retention: Duration::from_secs(u64::from(retention_days) * 24 * 3600),
            prune_hour: prune_hour.min(23),
        }
    }

    /// Spawn the scheduler loop. It runs until the shutdown channel fires.
    pub fn spawn(self, shutdown: broadcast::Receiver<()>) -> JoinHandle<()> {
        tokio::spawn(self.run(shutdown))
    }

    async fn run(self, mut shutdown: broadcast::Receiver<()>) {
        // One pass right away so a long-stopped server catches up without
        // waiting for tonight's tick.
        self.prune().await;

        loop {
            let now = Local::now();
            let next = next_run_after(now, self.prune_hour);
            let wait = (next - now).to_std().unwrap_or(Duration::from_secs(60));
            info!(next = %next, "retention pass scheduled");

            tokio::select! {
                _ = tokio::time::sleep(wait) => self.prune().await,
                _ = shutdown.recv() => {
                    info!("Retention scheduler stopping");
                    return;
                }
            }
        }
    }

    #[instrument(skip(self))]
    async fn prune(&self) {
        match self.store.delete_older_than(self.retention).await {
            Ok(deleted) => {
                metrics::counter!("corral_retention_deleted_total").increment(deleted);
                if deleted > 0 {
                    info!(deleted, "Pruned expired samples");
                }
            }
            Err(e) => warn!("Retention pass failed, will retry at next tick: {}", e),
        }
    }
}

/// Next occurrence of `hour`:00:00 strictly after `now`.
///
/// If the wall-clock time does not exist on the current day (DST gap), the
/// pass slips by a day rather than running early.
pub fn next_run_after<Tz: TimeZone>(now: DateTime<Tz>, hour: u32) -> DateTime<Tz> {
    let candidate = now
        .with_hour(hour)
        .and_then(|t| t.with_minute(0))
        .and_then(|t| t.with_second(0))
        .and_then(|t| t.with_nanosecond(0));

    match candidate {
        Some(at) if at > now => at,
        Some(at) => at + TimeDelta::days(1),
        None => now + TimeDelta::days(1),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Utc;

    fn at(s: &str) -> DateTime<Utc> {
        s.parse().unwrap()
    }

    #[test]
    fn before_the_hour_runs_today() {
        let next = next_run_after(at("2024-05-10T01:15:00Z"), 3);
        assert_eq!(next, at("2024-05-10T03:00:00Z"));
    }

    #[test]
    fn after_the_hour_runs_tomorrow() {
        let next = next_run_after(at("2024-05-10T07:30:00Z"), 3);
        assert_eq!(next, at("2024-05-11T03:00:00Z"));
    }

    #[test]
    fn exactly_on_the_hour_is_not_the_future() {
        let next = next_run_after(at("2024-05-10T03:00:00Z"), 3);
        assert_eq!(next, at("2024-05-11T03:00:00Z"));
    }

    #[test]
    fn always_strictly_in_the_future() {
        for ts in ["2024-05-10T00:00:00Z", "2024-05-10T02:59:59Z", "2024-05-10T23:59:59Z"] {
            let now = at(ts);
            assert!(next_run_after(now, 3) > now);
        }
    }
}
