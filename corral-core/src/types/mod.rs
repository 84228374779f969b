//! Core types shared across the corral workspace.

mod machine;
mod sample;

pub use machine::{Machine, MachineRecord, SwarmRole};
pub use sample::{Metrics, Report, Sample};

use serde::{Deserialize, Serialize};

/// Aggregate fleet counters, computed from each machine's latest sample.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct FleetStats {
    pub total_machines: i64,
    pub online: i64,
    pub warning: i64,
    pub offline: i64,
    /// Running containers summed over every machine's latest sample.
    pub total_containers: i64,
}
