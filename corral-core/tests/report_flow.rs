//! End-to-end flow tests for the ingestion path.
//!
//! These run a real in-memory store through the gateway, fleet view, and
//! retention scheduler - no mocks.

use corral_core::store::Store;
use corral_core::{fleet, Gateway, MachineStatus, Report, RetentionScheduler, Thresholds};
use std::sync::Arc;
use std::time::{Duration, SystemTime, UNIX_EPOCH};
use tokio::sync::broadcast;

fn report(hostname: &str, group: &str, cpu: f64) -> Report {
    Report {
        hostname: hostname.to_string(),
        ip: "10.1.0.4".to_string(),
        group_name: group.to_string(),
        swarm_role: "worker".to_string(),
        cpu_percent: cpu,
        memory_percent: 35.0,
        disk_percent: 50.0,
        docker_running: 3,
        docker_stopped: 0,
    }
}

fn unix_now() -> i64 {
    SystemTime::now().duration_since(UNIX_EPOCH).unwrap().as_secs() as i64
}

#[tokio::test]
async fn reports_flow_through_to_the_fleet_view() {
    let store = Arc::new(Store::new_in_memory().await.unwrap());
    let gateway = Gateway::new(store.clone());

    gateway.ingest(&report("barn-1", "pasture", 12.0)).await.unwrap();
    gateway.ingest(&report("barn-2", "pasture", 97.0)).await.unwrap();
    let resolved = gateway.ingest(&report("barn-1", "pasture", 15.0)).await.unwrap();

    let rows = store.fleet_snapshot().await.unwrap();
    assert_eq!(rows.len(), 2);

    let view = fleet::build_view(rows, unix_now(), &Thresholds::default());
    // The hot machine sorts first within its group.
    assert_eq!(view[0].record.machine.hostname, "barn-2");
    assert_eq!(view[0].status, MachineStatus::Warning);
    assert_eq!(view[1].record.machine.hostname, "barn-1");
    assert_eq!(view[1].status, MachineStatus::Online);
    // The re-report updated in place rather than duplicating.
    assert_eq!(view[1].record.machine.id, resolved);
    assert_eq!(view[1].record.latest.unwrap().metrics.cpu_percent, 15.0);
}

#[tokio::test]
async fn reports_without_a_hostname_are_rejected() {
    let store = Arc::new(Store::new_in_memory().await.unwrap());
    let gateway = Gateway::new(store.clone());

    let result = gateway.ingest(&report("", "pasture", 10.0)).await;
    assert!(matches!(result, Err(corral_core::CorralError::InvalidReport { .. })));

    // Nothing was written.
    assert!(store.fleet_snapshot().await.unwrap().is_empty());
}

#[tokio::test]
async fn retention_scheduler_prunes_on_start_and_stops_on_shutdown() {
    let store = Arc::new(Store::new_in_memory().await.unwrap());
    let gateway = Gateway::new(store.clone());

    let id = gateway.ingest(&report("barn-1", "pasture", 10.0)).await.unwrap();
    store
        .insert_sample(id, &Default::default(), Some(unix_now() - 120 * 24 * 3600))
        .await
        .unwrap();

    let (shutdown_tx, _) = broadcast::channel(1);
    let handle = RetentionScheduler::new(store.clone(), 90, 3).spawn(shutdown_tx.subscribe());

    // The on-start pass removes the 120-day-old sample but keeps the fresh one.
    let deadline = tokio::time::Instant::now() + Duration::from_secs(5);
    loop {
        let history = store.history(id, Duration::from_secs(365 * 24 * 3600)).await.unwrap();
        if history.len() == 1 {
            break;
        }
        assert!(tokio::time::Instant::now() < deadline, "initial prune never ran");
        tokio::time::sleep(Duration::from_millis(20)).await;
    }

    // The loop is cancellable: it must exit promptly once shutdown fires.
    shutdown_tx.send(()).unwrap();
    tokio::time::timeout(Duration::from_secs(5), handle)
        .await
        .expect("scheduler did not stop after shutdown signal")
        .unwrap();
}
