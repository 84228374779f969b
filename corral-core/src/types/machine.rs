//! Machine registry types.

use serde::{Deserialize, Serialize};

use super::Sample;

/// Cluster role reported by the agent.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SwarmRole {
    #[default]
    None,
    Worker,
    Manager,
}

impl SwarmRole {
    /// Parse a role from its wire form. Unknown or empty values fall back to `None`.
    pub fn parse(s: &str) -> Self {
        match s.to_lowercase().as_str() {
            "worker" => SwarmRole::Worker,
            "manager" => SwarmRole::Manager,
            _ => SwarmRole::None,
        }
    }

    /// Convert to string representation.
    pub fn as_str(&self) -> &'static str {
        match self {
            SwarmRole::None => "none",
            SwarmRole::Worker => "worker",
            SwarmRole::Manager => "manager",
        }
    }
}

impl std::fmt::Display for SwarmRole {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// A registered machine. Created implicitly on first report, never deleted
/// through the API.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Machine {
    /// Row id, assigned on first sight and stable for the machine's lifetime.
    pub id: i64,
    /// Unique reporting identity.
    pub hostname: String,
    /// Last reported address.
    pub ip: String,
    #[serde(rename = "group")]
    pub group_name: String,
    pub swarm_role: SwarmRole,
    /// Unix timestamp of the first accepted report. Immutable.
    pub first_seen: i64,
    /// Unix timestamp of the most recent accepted report.
    pub last_seen: i64,
}

/// A machine joined with its most recent sample, as returned by the store's
/// fleet snapshot. `latest` is `None` for a machine that has registered but
/// not yet produced a sample - distinct from a sample of zeros.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MachineRecord {
    #[serde(flatten)]
    pub machine: Machine,
    #[serde(rename = "metrics")]
    pub latest: Option<Sample>,
}
