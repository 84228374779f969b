//! Health check reporting.

use serde::{Deserialize, Serialize};
use std::sync::Arc;
use tokio::sync::RwLock;

/// Overall system health status.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum HealthStatus {
    Healthy,
    Degraded,
    Unhealthy,
}

/// Health rollup served on the API.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct HealthReport {
    pub status: HealthStatus,
    pub version: &'static str,
    pub subsystems: Vec<SubsystemHealth>,
}

/// Per-subsystem health entry.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SubsystemHealth {
    pub name: String,
    pub status: HealthStatus,
    pub message: Option<String>,
}

/// Tracks the health of the daemon's subsystems (database, retention, ...).
#[derive(Clone, Default)]
pub struct HealthChecker {
    subsystems: Arc<RwLock<Vec<SubsystemHealth>>>,
}

impl HealthChecker {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a subsystem. It starts out healthy.
    pub async fn register(&self, name: impl Into<String>) {
        let mut subsystems = self.subsystems.write().await;
        subsystems.push(SubsystemHealth {
            name: name.into(),
            status: HealthStatus::Healthy,
            message: None,
        });
    }

    /// Update one subsystem's status.
    pub async fn set_status(&self, name: &str, status: HealthStatus, message: Option<String>) {
        let mut subsystems = self.subsystems.write().await;
        if let Some(subsystem) = subsystems.iter_mut().find(|s| s.name == name) {
            subsystem.status = status;
            subsystem.message = message;
        }
    }

    /// Roll up subsystem states: any unhealthy subsystem makes the whole
    /// daemon unhealthy, any degraded one makes it degraded.
    pub async fn report(&self) -> HealthReport {
        let subsystems = self.subsystems.read().await.clone();

        let status = if subsystems.iter().any(|s| s.status == HealthStatus::Unhealthy) {
            HealthStatus::Unhealthy
        } else if subsystems.iter().any(|s| s.status == HealthStatus::Degraded) {
            HealthStatus::Degraded
        } else {
            HealthStatus::Healthy
        };

        HealthReport { status, version: env!("CARGO_PKG_VERSION"), subsystems }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn rollup_takes_the_worst_subsystem() {
        let checker = HealthChecker::new();
        checker.register("database").await;
        checker.register("retention").await;

        let report = checker.report().await;
        assert_eq!(report.status, HealthStatus::Healthy);
        assert_eq!(report.subsystems.len(), 2);

        checker.set_status("retention", HealthStatus::Degraded, Some("slow".to_string())).await;
        assert_eq!(checker.report().await.status, HealthStatus::Degraded);

        checker.set_status("database", HealthStatus::Unhealthy, Some("down".to_string())).await;
        assert_eq!(checker.report().await.status, HealthStatus::Unhealthy);
    }
}
