//! Error types for corral.
//!
//! All errors use `thiserror` for ergonomic error handling and proper error chains.

use std::path::PathBuf;
use thiserror::Error;

/// Result type alias for corral operations.
pub type Result<T> = std::result::Result<T, CorralError>;

/// Main error type for corral.
#[derive(Error, Debug)]
pub enum CorralError {
    // Ingestion errors - the caller's fault, not retryable
    #[error("invalid report: {reason}")]
    InvalidReport { reason: String },

    // Lookup errors - distinct from "machine exists but has no samples yet"
    #[error("machine not found: {machine_id}")]
    MachineNotFound { machine_id: i64 },

    // Storage errors - possibly transient, the caller decides whether to retry
    #[error("storage error in {operation}: {reason}")]
    Storage { operation: &'static str, reason: String },

    #[error("database migration failed: {reason}")]
    MigrationFailed { reason: String },

    // Configuration errors
    #[error("invalid configuration: {reason}")]
    InvalidConfig { reason: String },

    #[error("I/O error at {path:?}: {source}")]
    IoError {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error(transparent)]
    Other(#[from] anyhow::Error),
}

impl CorralError {
    /// Create a Storage error tagged with the failed operation.
    pub fn storage(operation: &'static str, err: impl std::fmt::Display) -> Self {
        metrics::counter!("corral_db_errors_total", "operation" => operation).increment(1);
        Self::Storage { operation, reason: err.to_string() }
    }
}
