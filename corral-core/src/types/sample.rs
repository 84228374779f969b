//! Sample and report payload types.

use serde::{Deserialize, Serialize};

/// One point-in-time metric reading. Values are stored exactly as reported;
/// range checking is the reporting agent's concern.
#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize, Deserialize)]
pub struct Metrics {
    pub cpu_percent: f64,
    pub memory_percent: f64,
    pub disk_percent: f64,
    pub docker_running: i64,
    pub docker_stopped: i64,
}

/// A persisted sample. Immutable once written; destroyed only by retention
/// pruning or machine cascade-delete.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Sample {
    #[serde(skip)]
    pub id: i64,
    #[serde(skip)]
    pub machine_id: i64,
    /// Unix timestamp, assigned by the server at write time.
    pub collected_at: i64,
    #[serde(flatten)]
    pub metrics: Metrics,
}

/// The payload a reporting agent submits. Missing fields decode to their
/// zero values; only `hostname` is mandatory.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct Report {
    pub hostname: String,
    pub ip: String,
    #[serde(rename = "group")]
    pub group_name: String,
    pub swarm_role: String,
    pub cpu_percent: f64,
    pub memory_percent: f64,
    pub disk_percent: f64,
    pub docker_running: i64,
    pub docker_stopped: i64,
}

impl Report {
    /// Split the payload into its metric portion.
    pub fn metrics(&self) -> Metrics {
        Metrics {
            cpu_percent: self.cpu_percent,
            memory_percent: self.memory_percent,
            disk_percent: self.disk_percent,
            docker_running: self.docker_running,
            docker_stopped: self.docker_stopped,
        }
    }
}
