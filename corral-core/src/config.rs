//! Configuration management.

use crate::error::{CorralError, Result};
use crate::paths;
use serde::{Deserialize, Serialize};
use std::path::PathBuf;

/// Persistent configuration for the corral daemon.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    /// Port the HTTP API listens on.
    pub listen_port: u16,
    /// SQLite database file.
    pub db_path: String,
    /// Bearer token required on the ingest endpoint. Empty disables auth.
    pub auth_token: String,
    /// Days of sample history to keep.
    pub retention_days: u32,
    /// Local wall-clock hour at which the daily pruning pass runs.
    pub prune_hour: u32,
    /// Minutes since last report before a machine counts as offline.
    pub online_threshold_minutes: u64,
    /// Percent value above which a metric flags the machine for attention.
    pub warning_threshold: f64,
    /// Default lookback for the history endpoint, in hours.
    pub history_default_hours: u32,
    /// Port the Prometheus metrics exporter listens on.
    pub metrics_port: u16,
    pub log_level: String,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            listen_port: 8080,
            db_path: paths::db_path().to_string_lossy().to_string(),
            auth_token: String::new(),
            retention_days: 90,
            prune_hour: 3,
            // One hourly cycle plus margin for clock and network skew.
            online_threshold_minutes: 70,
            warning_threshold: 85.0,
            history_default_hours: 24,
            metrics_port: 9209,
            log_level: "info".to_string(),
        }
    }
}

impl Config {
    /// Get the path to the configuration file.
    pub fn config_path() -> PathBuf {
        paths::config_dir().join("config.json")
    }

    /// Load configuration from disk, then apply environment overrides.
    pub fn load() -> Result<Self> {
        let path = Self::config_path();
        let mut config = if path.exists() {
            let content = std::fs::read_to_string(&path).map_err(|e| CorralError::InvalidConfig {
                reason: format!("Failed to read config: {}", e),
            })?;
            serde_json::from_str(&content).map_err(|e| CorralError::InvalidConfig {
                reason: format!("Failed to parse config: {}", e),
            })?
        } else {
            Self::default()
        };
        config.apply_env();
        Ok(config)
    }

    /// Save configuration to disk.
    pub fn save(&self) -> Result<()> {
        let path = Self::config_path();
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent)
                .map_err(|e| CorralError::IoError { path: parent.to_path_buf(), source: e })?;
        }
        let content = serde_json::to_string_pretty(self).map_err(|e| CorralError::InvalidConfig {
            reason: format!("Failed to serialize config: {}", e),
        })?;
        std::fs::write(&path, content).map_err(|e| CorralError::IoError { path, source: e })
    }

    /// Environment variables take precedence over the config file so a
    /// containerized deployment needs no file at all.
    fn apply_env(&mut self) {
        if let Ok(v) = std::env::var("CORRAL_PORT") {
            if let Ok(port) = v.parse() {
                self.listen_port = port;
            }
        }
        if let Ok(v) = std::env::var("CORRAL_DB_PATH") {
            self.db_path = v;
        }
        if let Ok(v) = std::env::var("CORRAL_AUTH_TOKEN") {
            self.auth_token = v;
        }
        if let Ok(v) = std::env::var("CORRAL_RETENTION_DAYS") {
            if let Ok(days) = v.parse() {
                self.retention_days = days;
            }
        }
        if let Ok(v) = std::env::var("CORRAL_LOG_LEVEL") {
            self.log_level = v;
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults_match_deployment_expectations() {
        let config = Config::default();
        assert_eq!(config.listen_port, 8080);
        assert_eq!(config.retention_days, 90);
        assert_eq!(config.prune_hour, 3);
        assert_eq!(config.online_threshold_minutes, 70);
        assert_eq!(config.warning_threshold, 85.0);
        assert!(config.auth_token.is_empty());
    }
}
