//! Fleet view projection.
//!
//! Pure functions from (machine, latest sample, current time) to the
//! online/warning/offline view the dashboard consumes. Nothing here touches
//! the store; the daemon feeds it snapshot rows.

use crate::types::{FleetStats, MachineRecord};
use serde::{Deserialize, Serialize};
use std::time::Duration;

/// Tunables for the staleness and attention rules.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Thresholds {
    /// Maximum silence before a machine counts as offline.
    pub online_threshold: Duration,
    /// Percent value a metric must exceed (strictly) to flag attention.
    pub warning_threshold: f64,
}

impl Default for Thresholds {
    fn default() -> Self {
        Self {
            // One missed hourly report plus margin for clock and network skew.
            online_threshold: Duration::from_secs(70 * 60),
            warning_threshold: 85.0,
        }
    }
}

/// Derived machine state. Offline trumps warning: a stale machine is
/// reported offline no matter what its last sample said.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum MachineStatus {
    Online,
    Warning,
    Offline,
}

impl MachineStatus {
    /// Display rank within a group: problems sort first.
    fn rank(self) -> u8 {
        match self {
            MachineStatus::Offline => 0,
            MachineStatus::Warning => 1,
            MachineStatus::Online => 2,
        }
    }
}

/// One row of the fleet view.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct FleetRow {
    #[serde(flatten)]
    pub record: MachineRecord,
    pub status: MachineStatus,
}

/// Derive the state of a single machine at `now` (unix seconds).
pub fn classify(record: &MachineRecord, now: i64, thresholds: &Thresholds) -> MachineStatus {
    let silence = now - record.machine.last_seen;
    if silence > thresholds.online_threshold.as_secs() as i64 {
        return MachineStatus::Offline;
    }

    // A machine with no sample yet has nothing to warn about.
    match &record.latest {
        Some(sample) => {
            let m = &sample.metrics;
            if m.cpu_percent > thresholds.warning_threshold
                || m.memory_percent > thresholds.warning_threshold
                || m.disk_percent > thresholds.warning_threshold
            {
                MachineStatus::Warning
            } else {
                MachineStatus::Online
            }
        }
        None => MachineStatus::Online,
    }
}

/// Build the display-ordered fleet view: groups lexically, then within a
/// group offline before warning before online, ties broken by
/// case-insensitive hostname.
pub fn build_view(records: Vec<MachineRecord>, now: i64, thresholds: &Thresholds) -> Vec<FleetRow> {
    let mut rows: Vec<FleetRow> = records
        .into_iter()
        .map(|record| {
            let status = classify(&record, now, thresholds);
            FleetRow { record, status }
        })
        .collect();

    rows.sort_by(|a, b| {
        (a.record.machine.group_name.as_str(), a.status.rank(), a.record.machine.hostname.to_lowercase())
            .cmp(&(b.record.machine.group_name.as_str(), b.status.rank(), b.record.machine.hostname.to_lowercase()))
    });

    rows
}

/// Aggregate fleet counters. The three states are mutually exclusive, so
/// online + warning + offline always equals total.
pub fn aggregate(records: &[MachineRecord], now: i64, thresholds: &Thresholds) -> FleetStats {
    let mut stats = FleetStats { total_machines: records.len() as i64, ..Default::default() };

    for record in records {
        match classify(record, now, thresholds) {
            MachineStatus::Online => stats.online += 1,
            MachineStatus::Warning => stats.warning += 1,
            MachineStatus::Offline => stats.offline += 1,
        }
        if let Some(sample) = &record.latest {
            stats.total_containers += sample.metrics.docker_running;
        }
    }

    stats
}
