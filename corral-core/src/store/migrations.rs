//! Database migrations.

use crate::error::{CorralError, Result};
use sqlx::SqlitePool;
use tracing::{info, instrument};

const SCHEMA_VERSION: i64 = 1;

#[instrument(skip(pool))]
pub async fn run(pool: &SqlitePool) -> Result<()> {
    // Create schema_version table if not exists
    sqlx::query(
        r#"
        CREATE TABLE IF NOT EXISTS schema_version (
            version INTEGER PRIMARY KEY
        )
        "#,
    )
    .execute(pool)
    .await
    .map_err(|e| CorralError::MigrationFailed { reason: e.to_string() })?;

    // Get current schema version
    let current_version: Option<i64> =
        sqlx::query_scalar("SELECT version FROM schema_version LIMIT 1")
            .fetch_optional(pool)
            .await
            .map_err(|e| CorralError::MigrationFailed { reason: e.to_string() })?;

    let current_version = current_version.unwrap_or(0);

    if current_version >= SCHEMA_VERSION {
        info!("Database schema is up to date (version {})", current_version);
        return Ok(());
    }

    info!("Migrating database from version {} to {}", current_version, SCHEMA_VERSION);

    if current_version < 1 {
        migrate_to_v1(pool).await?;
    }

    Ok(())
}

#[instrument(skip(pool))]
async fn migrate_to_v1(pool: &SqlitePool) -> Result<()> {
    info!("Running migration to schema version 1");

    // Machine registry, keyed by hostname
    sqlx::query(
        r#"
        CREATE TABLE IF NOT EXISTS machines (
            id          INTEGER PRIMARY KEY AUTOINCREMENT,
            hostname    TEXT UNIQUE NOT NULL,
            ip          TEXT NOT NULL DEFAULT '',
            group_name  TEXT NOT NULL DEFAULT 'default',
            swarm_role  TEXT NOT NULL DEFAULT 'none',
            first_seen  INTEGER NOT NULL,
            last_seen   INTEGER NOT NULL
        )
        "#,
    )
    .execute(pool)
    .await
    .map_err(|e| CorralError::MigrationFailed { reason: e.to_string() })?;

    sqlx::query("CREATE INDEX IF NOT EXISTS idx_machines_hostname ON machines(hostname)")
        .execute(pool)
        .await
        .map_err(|e| CorralError::MigrationFailed { reason: e.to_string() })?;

    // Sample history; one row per accepted report
    sqlx::query(
        r#"
        CREATE TABLE IF NOT EXISTS samples (
            id              INTEGER PRIMARY KEY AUTOINCREMENT,
            machine_id      INTEGER NOT NULL REFERENCES machines(id) ON DELETE CASCADE,
            collected_at    INTEGER NOT NULL,
            cpu_percent     REAL NOT NULL DEFAULT 0,
            memory_percent  REAL NOT NULL DEFAULT 0,
            disk_percent    REAL NOT NULL DEFAULT 0,
            docker_running  INTEGER NOT NULL DEFAULT 0,
            docker_stopped  INTEGER NOT NULL DEFAULT 0
        )
        "#,
    )
    .execute(pool)
    .await
    .map_err(|e| CorralError::MigrationFailed { reason: e.to_string() })?;

    // Index for the latest-sample window query
    sqlx::query(
        "CREATE INDEX IF NOT EXISTS idx_samples_machine_time ON samples(machine_id, collected_at DESC)",
    )
    .execute(pool)
    .await
    .map_err(|e| CorralError::MigrationFailed { reason: e.to_string() })?;

    // Index for retention pruning
    sqlx::query("CREATE INDEX IF NOT EXISTS idx_samples_collected ON samples(collected_at)")
        .execute(pool)
        .await
        .map_err(|e| CorralError::MigrationFailed { reason: e.to_string() })?;

    // Update schema version
    sqlx::query("DELETE FROM schema_version")
        .execute(pool)
        .await
        .map_err(|e| CorralError::MigrationFailed { reason: e.to_string() })?;

    sqlx::query("INSERT INTO schema_version (version) VALUES (?)")
        .bind(1i64)
        .execute(pool)
        .await
        .map_err(|e| CorralError::MigrationFailed { reason: e.to_string() })?;

    info!("Migration to schema version 1 complete");
    Ok(())
}
