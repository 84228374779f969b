//! Centralized path configuration for corral.
//!
//! All data paths go through this module so the daemon and tooling agree on
//! locations whether running as a user process or a system service.

use std::path::PathBuf;

/// Get the corral data directory.
///
/// Resolution order:
/// 1. `CORRAL_DATA_DIR` environment variable
/// 2. `/var/lib/corral` if it exists (system install)
/// 3. `~/.corral` for user-only installs
pub fn data_dir() -> PathBuf {
    if let Ok(dir) = std::env::var("CORRAL_DATA_DIR") {
        return PathBuf::from(dir);
    }

    let system_dir = PathBuf::from("/var/lib/corral");
    if system_dir.exists() {
        return system_dir;
    }

    dirs::home_dir().map(|h| h.join(".corral")).unwrap_or(system_dir)
}

/// Get the database path.
pub fn db_path() -> PathBuf {
    data_dir().join("corral.db")
}

/// Get the configuration directory.
pub fn config_dir() -> PathBuf {
    data_dir().join("config")
}
