//! Sample store with SQLite persistence.
//!
//! The Store owns all durable state for corral:
//! - the machine registry, keyed by hostname
//! - the per-machine sample history
//!
//! It is the only holder of the database session. Writes serialize through a
//! single connection; `save_report` is transactional so a machine upsert and
//! its sample either both land or neither does.

use crate::error::{CorralError, Result};
use crate::fleet::{self, Thresholds};
use crate::types::{FleetStats, Machine, MachineRecord, Metrics, Report, Sample, SwarmRole};
use sqlx::sqlite::{
    SqliteConnectOptions, SqliteJournalMode, SqlitePool, SqlitePoolOptions, SqliteRow,
};
use sqlx::{ConnectOptions, Row, SqliteConnection};
use std::collections::HashMap;
use std::path::Path;
use std::str::FromStr;
use std::time::{Duration, SystemTime, UNIX_EPOCH};
use tracing::{info, instrument};

pub mod migrations;


/// Current unix time in whole seconds.
pub fn unix_now() -> i64 {
    SystemTime::now().duration_since(UNIX_EPOCH).unwrap_or_default().as_secs() as i64
}

/// Store for the machine registry and sample history.
#[derive(Clone)]
pub struct Store {
    pool: SqlitePool,
}

impl Store {
    /// Create a new Store with an in-memory database (for tests).
    pub async fn new_in_memory() -> Result<Self> {
        Self::new(":memory:").await
    }

    /// Create a new Store with a database at the specified path.
    #[instrument(skip(db_path))]
    pub async fn new(db_path: impl AsRef<Path>) -> Result<Self> {
        let db_path = db_path.as_ref();
        info!("Initializing sample store at {:?}", db_path);

        // Create parent directory if it doesn't exist (but not for :memory:)
        if db_path != Path::new(":memory:") {
            if let Some(parent) = db_path.parent() {
                tokio::fs::create_dir_all(parent).await.map_err(|e| {
                    CorralError::InvalidConfig {
                        reason: format!("Failed to create directory {}: {}", parent.display(), e),
                    }
                })?;
            }
        }

        let options = SqliteConnectOptions::from_str(db_path.to_str().ok_or_else(|| {
            CorralError::InvalidConfig { reason: "Invalid database path".to_string() }
        })?)
        .map_err(|e| CorralError::storage("open", e))?
        .create_if_missing(true)
        .journal_mode(SqliteJournalMode::Wal)
        .foreign_keys(true)
        .busy_timeout(Duration::from_secs(5))
        .log_statements(tracing::log::LevelFilter::Debug);

        // A single connection: SQLite allows one writer at a time anyway, and
        // queueing callers on the pool keeps upsert+insert pairs serialized.
        let pool = SqlitePoolOptions::new()
            .max_connections(1)
            .connect_with(options)
            .await
            .map_err(|e| CorralError::storage("open", e))?;

        let store = Self { pool };
        store.run_migrations().await?;

        info!("Sample store initialized successfully");
        Ok(store)
    }

    /// Run database migrations.
    #[instrument(skip(self))]
    async fn run_migrations(&self) -> Result<()> {
        info!("Running database migrations");
        migrations::run(&self.pool).await?;
        info!("Database migrations complete");
        Ok(())
    }

    // ========================
    // Machine Operations
    // ========================

    /// Insert or update a machine by hostname and return its id.
    ///
    /// ip and role take the reported value unconditionally; the group label is
    /// only replaced by a non-empty value, so an agent that omits its group
    /// never erases one assigned earlier. `last_seen` advances to now.
    #[instrument(skip(self), fields(hostname = %hostname))]
    pub async fn upsert_machine(
        &self,
        hostname: &str,
        ip: &str,
        group: &str,
        role: SwarmRole,
    ) -> Result<i64> {
        let mut conn = self.pool.acquire().await.map_err(|e| CorralError::storage("upsert_machine", e))?;
        upsert_machine_on(&mut conn, hostname, ip, group, role, unix_now()).await
    }

    /// Append a sample for a machine. The collection timestamp defaults to
    /// the time of the call.
    #[instrument(skip(self, metrics))]
    pub async fn insert_sample(
        &self,
        machine_id: i64,
        metrics: &Metrics,
        collected_at: Option<i64>,
    ) -> Result<()> {
        let mut conn = self.pool.acquire().await.map_err(|e| CorralError::storage("insert_sample", e))?;
        insert_sample_on(&mut conn, machine_id, metrics, collected_at.unwrap_or_else(unix_now))
            .await
    }

    /// Persist a full report: machine upsert plus sample insert as one
    /// transaction. Returns the machine id.
    #[instrument(skip(self, report), fields(hostname = %report.hostname))]
    pub async fn save_report(&self, report: &Report) -> Result<i64> {
        let now = unix_now();
        let mut tx =
            self.pool.begin().await.map_err(|e| CorralError::storage("save_report", e))?;

        let machine_id = upsert_machine_on(
            &mut tx,
            &report.hostname,
            &report.ip,
            &report.group_name,
            SwarmRole::parse(&report.swarm_role),
            now,
        )
        .await?;
        insert_sample_on(&mut tx, machine_id, &report.metrics(), now).await?;

        tx.commit().await.map_err(|e| CorralError::storage("save_report", e))?;
        Ok(machine_id)
    }

    /// Delete a machine row. Its samples go with it via cascade.
    ///
    /// No API surface calls this today; it exists so registry cleanup cannot
    /// strand orphaned samples.
    #[instrument(skip(self), fields(machine_id = %id))]
    pub async fn delete_machine(&self, id: i64) -> Result<()> {
        sqlx::query("DELETE FROM machines WHERE id = ?")
            .bind(id)
            .execute(&self.pool)
            .await
            .map_err(|e| CorralError::storage("delete_machine", e))?;

        Ok(())
    }

    // ========================
    // Query Operations
    // ========================

    /// Most recent sample per machine, keyed by machine id.
    ///
    /// One window query over the whole samples table; ties on collected_at go
    /// to the highest sample id. Machines without samples are simply absent.
    #[instrument(skip(self))]
    pub async fn latest_samples(&self) -> Result<HashMap<i64, Sample>> {
        let rows = sqlx::query(
            r#"
            SELECT id, machine_id, collected_at, cpu_percent, memory_percent,
                   disk_percent, docker_running, docker_stopped
            FROM (
                SELECT *, ROW_NUMBER() OVER (
                    PARTITION BY machine_id ORDER BY collected_at DESC, id DESC
                ) AS rn
                FROM samples
            )
            WHERE rn = 1
            "#,
        )
        .fetch_all(&self.pool)
        .await
        .map_err(|e| CorralError::storage("latest_samples", e))?;

        Ok(rows
            .into_iter()
            .map(|row| {
                let sample = row_to_sample(&row);
                (sample.machine_id, sample)
            })
            .collect())
    }

    /// All machines joined with their latest sample, ordered by group label
    /// then case-insensitive hostname.
    #[instrument(skip(self))]
    pub async fn fleet_snapshot(&self) -> Result<Vec<MachineRecord>> {
        let rows = sqlx::query(&format!(
            r#"
            {MACHINE_WITH_LATEST}
            ORDER BY m.group_name, m.hostname COLLATE NOCASE
            "#
        ))
        .fetch_all(&self.pool)
        .await
        .map_err(|e| CorralError::storage("fleet_snapshot", e))?;

        rows.iter().map(row_to_record).collect()
    }

    /// One machine with its latest sample attached.
    #[instrument(skip(self), fields(machine_id = %id))]
    pub async fn machine_by_id(&self, id: i64) -> Result<MachineRecord> {
        let row = sqlx::query(&format!(
            r#"
            {MACHINE_WITH_LATEST}
            WHERE m.id = ?
            "#
        ))
        .bind(id)
        .fetch_optional(&self.pool)
        .await
        .map_err(|e| CorralError::storage("machine_by_id", e))?
        .ok_or(CorralError::MachineNotFound { machine_id: id })?;

        row_to_record(&row)
    }

    /// Samples for one machine within the lookback window, newest first.
    ///
    /// An unknown machine id is an error; a known machine with no samples in
    /// the window returns an empty list.
    #[instrument(skip(self), fields(machine_id = %machine_id))]
    pub async fn history(&self, machine_id: i64, window: Duration) -> Result<Vec<Sample>> {
        let known: Option<i64> = sqlx::query_scalar("SELECT id FROM machines WHERE id = ?")
            .bind(machine_id)
            .fetch_optional(&self.pool)
            .await
            .map_err(|e| CorralError::storage("history", e))?;
        if known.is_none() {
            return Err(CorralError::MachineNotFound { machine_id });
        }

        let cutoff = unix_now() - window.as_secs() as i64;
        let rows = sqlx::query(
            r#"
            SELECT id, machine_id, collected_at, cpu_percent, memory_percent,
                   disk_percent, docker_running, docker_stopped
            FROM samples
            WHERE machine_id = ? AND collected_at > ?
            ORDER BY collected_at DESC, id DESC
            "#,
        )
        .bind(machine_id)
        .bind(cutoff)
        .fetch_all(&self.pool)
        .await
        .map_err(|e| CorralError::storage("history", e))?;

        Ok(rows.iter().map(row_to_sample).collect())
    }

    /// Aggregate fleet counters from the latest sample per machine and the
    /// staleness/warning rules.
    #[instrument(skip(self, thresholds))]
    pub async fn aggregate_stats(&self, thresholds: &Thresholds) -> Result<FleetStats> {
        let rows = self.fleet_snapshot().await?;
        Ok(fleet::aggregate(&rows, unix_now(), thresholds))
    }

    // ========================
    // Retention
    // ========================

    /// Delete samples older than the given age. Machine rows are untouched.
    /// Returns the number of samples removed.
    #[instrument(skip(self))]
    pub async fn delete_older_than(&self, cutoff_age: Duration) -> Result<u64> {
        let cutoff = unix_now() - cutoff_age.as_secs() as i64;

        let result = sqlx::query("DELETE FROM samples WHERE collected_at < ?")
            .bind(cutoff)
            .execute(&self.pool)
            .await
            .map_err(|e| CorralError::storage("delete_older_than", e))?;

        Ok(result.rows_affected())
    }
}

/// Shared SELECT for a machine joined with its rank-1 sample. The window
/// subquery keeps the whole fleet read proportional to machines + samples
/// instead of issuing one lookup per machine.
const MACHINE_WITH_LATEST: &str = r#"
    SELECT m.id, m.hostname, m.ip, m.group_name, m.swarm_role,
           m.first_seen, m.last_seen,
           s.id AS sample_id, s.collected_at, s.cpu_percent, s.memory_percent,
           s.disk_percent, s.docker_running, s.docker_stopped
    FROM machines m
    LEFT JOIN (
        SELECT *, ROW_NUMBER() OVER (
            PARTITION BY machine_id ORDER BY collected_at DESC, id DESC
        ) AS rn
        FROM samples
    ) s ON s.machine_id = m.id AND s.rn = 1
"#;

async fn upsert_machine_on(
    conn: &mut SqliteConnection,
    hostname: &str,
    ip: &str,
    group: &str,
    role: SwarmRole,
    now: i64,
) -> Result<i64> {
    // The DO UPDATE arm reuses the raw group bind rather than
    // excluded.group_name: the insert arm normalizes '' to 'default', and that
    // normalized value must never clobber an existing label.
    sqlx::query_scalar::<_, i64>(
        r#"
        INSERT INTO machines (hostname, ip, group_name, swarm_role, first_seen, last_seen)
        VALUES (?1, ?2, COALESCE(NULLIF(?3, ''), 'default'), ?4, ?5, ?5)
        ON CONFLICT(hostname) DO UPDATE SET
            ip = ?2,
            group_name = COALESCE(NULLIF(?3, ''), group_name),
            swarm_role = ?4,
            last_seen = ?5
        RETURNING id
        "#,
    )
    .bind(hostname)
    .bind(ip)
    .bind(group)
    .bind(role.as_str())
    .bind(now)
    .fetch_one(conn)
    .await
    .map_err(|e| CorralError::storage("upsert_machine", e))
}

async fn insert_sample_on(
    conn: &mut SqliteConnection,
    machine_id: i64,
    metrics: &Metrics,
    collected_at: i64,
) -> Result<()> {
    sqlx::query(
        r#"
        INSERT INTO samples (machine_id, collected_at, cpu_percent, memory_percent,
                             disk_percent, docker_running, docker_stopped)
        VALUES (?, ?, ?, ?, ?, ?, ?)
        "#,
    )
    .bind(machine_id)
    .bind(collected_at)
    .bind(metrics.cpu_percent)
    .bind(metrics.memory_percent)
    .bind(metrics.disk_percent)
    .bind(metrics.docker_running)
    .bind(metrics.docker_stopped)
    .execute(conn)
    .await
    .map_err(|e| CorralError::storage("insert_sample", e))?;

    Ok(())
}

fn row_to_sample(row: &SqliteRow) -> Sample {
    Sample {
        id: row.get("id"),
        machine_id: row.get("machine_id"),
        collected_at: row.get("collected_at"),
        metrics: Metrics {
            cpu_percent: row.get("cpu_percent"),
            memory_percent: row.get("memory_percent"),
            disk_percent: row.get("disk_percent"),
            docker_running: row.get("docker_running"),
            docker_stopped: row.get("docker_stopped"),
        },
    }
}

fn row_to_record(row: &SqliteRow) -> Result<MachineRecord> {
    let role_str: String = row.get("swarm_role");

    let latest = row.get::<Option<i64>, _>("sample_id").map(|sample_id| Sample {
        id: sample_id,
        machine_id: row.get("id"),
        collected_at: row.get("collected_at"),
        metrics: Metrics {
            cpu_percent: row.get("cpu_percent"),
            memory_percent: row.get("memory_percent"),
            disk_percent: row.get("disk_percent"),
            docker_running: row.get("docker_running"),
            docker_stopped: row.get("docker_stopped"),
        },
    });

    Ok(MachineRecord {
        machine: Machine {
            id: row.get("id"),
            hostname: row.get("hostname"),
            ip: row.get("ip"),
            group_name: row.get("group_name"),
            swarm_role: SwarmRole::parse(&role_str),
            first_seen: row.get("first_seen"),
            last_seen: row.get("last_seen"),
        },
        latest,
    })
}
