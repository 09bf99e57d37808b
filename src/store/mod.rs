// SQLite fleet state: miners, config_overrides, hashrate_history.
// Timestamps are stored as INTEGER milliseconds since the Unix epoch (UTC).
// All access goes through one process-wide readers-writer lock: writes take it exclusively,
// reads shared, so a read never interleaves with a half-applied upsert.

pub mod overview;

use crate::models::{
    AgentReport, ConfigDocument, HashrateData, HashrateSample, Miner, MinerStatus, Overview,
};
use chrono::{DateTime, TimeDelta, Utc};
use sqlx::Row;
use sqlx::sqlite::{SqliteConnectOptions, SqlitePool, SqlitePoolOptions, SqliteRow};
use std::path::Path;
use std::str::FromStr;
use tokio::sync::RwLock;
use tracing::instrument;

/// How many miners `get_overview` lists in `top_miners`.
pub const TOP_MINERS: usize = 5;

const MINER_COLUMNS: &str = "id, miner_id, worker_id, hostname, ip, cpu_model, cpu_family, cores, os, arch,
     miner_version, agent_version, uptime_seconds,
     hashrate_current, hashrate_average, hashrate_max, config_json, last_seen";

pub struct Store {
    pool: SqlitePool,
    lock: RwLock<()>,
}

impl Store {
    pub async fn connect(path: &str, max_pool_size: u32) -> anyhow::Result<Self> {
        if let Some(parent) = Path::new(path).parent() {
            std::fs::create_dir_all(parent)?;
        }
        let opts = SqliteConnectOptions::from_str(&format!("sqlite:{}", path))?
            .create_if_missing(true)
            .journal_mode(sqlx::sqlite::SqliteJournalMode::Wal)
            .busy_timeout(std::time::Duration::from_secs(5))
            .synchronous(sqlx::sqlite::SqliteSynchronous::Normal);
        let pool = SqlitePoolOptions::new()
            .max_connections(max_pool_size)
            .connect_with(opts)
            .await?;
        Ok(Self {
            pool,
            lock: RwLock::new(()),
        })
    }

    pub async fn init(&self) -> anyhow::Result<()> {
        let _guard = self.lock.write().await;

        sqlx::query(
            r#"
            CREATE TABLE IF NOT EXISTS miners (
                id TEXT PRIMARY KEY,
                miner_id TEXT NOT NULL,
                worker_id TEXT NOT NULL,
                hostname TEXT NOT NULL DEFAULT '',
                ip TEXT NOT NULL DEFAULT '',
                cpu_model TEXT NOT NULL DEFAULT '',
                cpu_family TEXT NOT NULL DEFAULT '',
                cores INTEGER NOT NULL DEFAULT 0,
                os TEXT NOT NULL DEFAULT '',
                arch TEXT NOT NULL DEFAULT '',
                miner_version TEXT NOT NULL DEFAULT '',
                agent_version TEXT NOT NULL DEFAULT '',
                uptime_seconds INTEGER NOT NULL DEFAULT 0,
                hashrate_current REAL,
                hashrate_average REAL,
                hashrate_max REAL,
                config_json TEXT,
                last_seen INTEGER NOT NULL
            )
            "#,
        )
        .execute(&self.pool)
        .await?;

        sqlx::query(
            r#"
            CREATE TABLE IF NOT EXISTS config_overrides (
                miner_id TEXT PRIMARY KEY,
                override_json TEXT NOT NULL,
                created_at INTEGER NOT NULL,
                applied_at INTEGER
            )
            "#,
        )
        .execute(&self.pool)
        .await?;

        sqlx::query(
            r#"
            CREATE TABLE IF NOT EXISTS hashrate_history (
                id INTEGER PRIMARY KEY AUTOINCREMENT,
                miner_id TEXT NOT NULL,
                timestamp INTEGER NOT NULL,
                current REAL NOT NULL DEFAULT 0,
                average REAL NOT NULL DEFAULT 0,
                max REAL NOT NULL DEFAULT 0
            )
            "#,
        )
        .execute(&self.pool)
        .await?;

        sqlx::query(
            "CREATE INDEX IF NOT EXISTS idx_hashrate_history_miner_ts ON hashrate_history(miner_id, timestamp)",
        )
        .execute(&self.pool)
        .await?;

        Ok(())
    }

    /// Insert or overwrite the miner row for this report's identity and append one history
    /// sample when the report carries hashrate. Returns the resolved identity.
    pub async fn upsert_miner(&self, report: &AgentReport) -> anyhow::Result<String> {
        self.upsert_miner_at(report, Utc::now()).await
    }

    /// `upsert_miner` with an explicit `last_seen` / sample timestamp.
    #[instrument(skip(self, report), fields(repo = "store", operation = "upsert_miner", miner_id = report.identity()))]
    pub async fn upsert_miner_at(
        &self,
        report: &AgentReport,
        now: DateTime<Utc>,
    ) -> anyhow::Result<String> {
        let Some(id) = report.identity() else {
            anyhow::bail!("report has neither miner_id nor worker_id");
        };
        let config_json = report
            .config
            .as_ref()
            .map(serde_json::to_string)
            .transpose()?;
        let now_ms = now.timestamp_millis();

        let _guard = self.lock.write().await;
        let mut tx = self.pool.begin().await?;

        sqlx::query(
            r#"
            INSERT INTO miners (id, miner_id, worker_id, hostname, ip, cpu_model, cpu_family,
                cores, os, arch, miner_version, agent_version, uptime_seconds,
                hashrate_current, hashrate_average, hashrate_max, config_json, last_seen)
            VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10, $11, $12, $13, $14, $15, $16, $17, $18)
            ON CONFLICT(id) DO UPDATE SET
                miner_id = excluded.miner_id,
                worker_id = excluded.worker_id,
                hostname = excluded.hostname,
                ip = excluded.ip,
                cpu_model = excluded.cpu_model,
                cpu_family = excluded.cpu_family,
                cores = excluded.cores,
                os = excluded.os,
                arch = excluded.arch,
                miner_version = excluded.miner_version,
                agent_version = excluded.agent_version,
                uptime_seconds = excluded.uptime_seconds,
                hashrate_current = excluded.hashrate_current,
                hashrate_average = excluded.hashrate_average,
                hashrate_max = excluded.hashrate_max,
                config_json = excluded.config_json,
                last_seen = excluded.last_seen
            "#,
        )
        .bind(id)
        .bind(&report.miner_id)
        .bind(&report.worker_id)
        .bind(&report.hostname)
        .bind(&report.ip)
        .bind(&report.cpu_model)
        .bind(&report.cpu_family)
        .bind(report.cores as i64)
        .bind(&report.os)
        .bind(&report.arch)
        .bind(&report.miner_version)
        .bind(&report.agent_version)
        .bind(report.uptime_seconds as i64)
        .bind(report.hashrate.map(|h| h.current))
        .bind(report.hashrate.map(|h| h.average))
        .bind(report.hashrate.map(|h| h.max))
        .bind(config_json)
        .bind(now_ms)
        .execute(&mut *tx)
        .await?;

        if let Some(h) = report.hashrate {
            sqlx::query(
                "INSERT INTO hashrate_history (miner_id, timestamp, current, average, max) VALUES ($1, $2, $3, $4, $5)",
            )
            .bind(id)
            .bind(now_ms)
            .bind(h.current)
            .bind(h.average)
            .bind(h.max)
            .execute(&mut *tx)
            .await?;
        }

        tx.commit().await?;
        Ok(id.to_string())
    }

    /// All miners, highest current hashrate first.
    #[instrument(skip(self), fields(repo = "store", operation = "get_miners"))]
    pub async fn get_miners(&self) -> anyhow::Result<Vec<Miner>> {
        let _guard = self.lock.read().await;
        self.load_miners(Utc::now()).await
    }

    #[instrument(skip(self), fields(repo = "store", operation = "get_miner"))]
    pub async fn get_miner(&self, id: &str) -> anyhow::Result<Option<Miner>> {
        let _guard = self.lock.read().await;
        let row = sqlx::query(&format!("SELECT {MINER_COLUMNS} FROM miners WHERE id = $1"))
            .bind(id)
            .fetch_optional(&self.pool)
            .await?;
        let now = Utc::now();
        row.map(|r| parse_miner_row(&r, now)).transpose()
    }

    /// Replace any existing override for this miner; the new one is always pending.
    #[instrument(skip(self, doc), fields(repo = "store", operation = "set_config_override"))]
    pub async fn set_config_override(&self, id: &str, doc: &ConfigDocument) -> anyhow::Result<()> {
        let override_json = serde_json::to_string(doc)?;
        let _guard = self.lock.write().await;
        sqlx::query(
            r#"
            INSERT INTO config_overrides (miner_id, override_json, created_at, applied_at)
            VALUES ($1, $2, $3, NULL)
            ON CONFLICT(miner_id) DO UPDATE SET
                override_json = excluded.override_json,
                created_at = excluded.created_at,
                applied_at = NULL
            "#,
        )
        .bind(id)
        .bind(override_json)
        .bind(Utc::now().timestamp_millis())
        .execute(&self.pool)
        .await?;
        Ok(())
    }

    /// The override document if one exists and has not been acknowledged.
    #[instrument(skip(self), fields(repo = "store", operation = "get_config_override"))]
    pub async fn get_config_override(&self, id: &str) -> anyhow::Result<Option<ConfigDocument>> {
        let _guard = self.lock.read().await;
        let json = sqlx::query_scalar::<_, String>(
            "SELECT override_json FROM config_overrides WHERE miner_id = $1 AND applied_at IS NULL",
        )
        .bind(id)
        .fetch_optional(&self.pool)
        .await?;
        json.map(|j| parse_document(&j)).transpose()
    }

    /// The override document regardless of whether it was applied.
    #[instrument(skip(self), fields(repo = "store", operation = "get_last_override"))]
    pub async fn get_last_override(&self, id: &str) -> anyhow::Result<Option<ConfigDocument>> {
        let _guard = self.lock.read().await;
        let json = sqlx::query_scalar::<_, String>(
            "SELECT override_json FROM config_overrides WHERE miner_id = $1",
        )
        .bind(id)
        .fetch_optional(&self.pool)
        .await?;
        json.map(|j| parse_document(&j)).transpose()
    }

    /// Stamp `applied_at`. No row: no-op. Already applied: the stamp moves, still applied.
    #[instrument(skip(self), fields(repo = "store", operation = "mark_config_applied"))]
    pub async fn mark_config_applied(&self, id: &str) -> anyhow::Result<()> {
        let _guard = self.lock.write().await;
        sqlx::query("UPDATE config_overrides SET applied_at = $1 WHERE miner_id = $2")
            .bind(Utc::now().timestamp_millis())
            .bind(id)
            .execute(&self.pool)
            .await?;
        Ok(())
    }

    #[instrument(skip(self), fields(repo = "store", operation = "delete_config_override"))]
    pub async fn delete_config_override(&self, id: &str) -> anyhow::Result<()> {
        let _guard = self.lock.write().await;
        sqlx::query("DELETE FROM config_overrides WHERE miner_id = $1")
            .bind(id)
            .execute(&self.pool)
            .await?;
        Ok(())
    }

    /// Samples newer than `since`, oldest first. `miner_id = None` returns every miner's samples.
    #[instrument(skip(self), fields(repo = "store", operation = "get_hashrate_history"))]
    pub async fn get_hashrate_history(
        &self,
        miner_id: Option<&str>,
        since: DateTime<Utc>,
    ) -> anyhow::Result<Vec<HashrateSample>> {
        let _guard = self.lock.read().await;
        let rows = match miner_id {
            Some(id) => {
                sqlx::query(
                    "SELECT miner_id, timestamp, current, average, max FROM hashrate_history
                     WHERE timestamp > $1 AND miner_id = $2 ORDER BY timestamp ASC, id ASC",
                )
                .bind(since.timestamp_millis())
                .bind(id)
                .fetch_all(&self.pool)
                .await?
            }
            None => {
                sqlx::query(
                    "SELECT miner_id, timestamp, current, average, max FROM hashrate_history
                     WHERE timestamp > $1 ORDER BY timestamp ASC, id ASC",
                )
                .bind(since.timestamp_millis())
                .fetch_all(&self.pool)
                .await?
            }
        };

        let mut out = Vec::with_capacity(rows.len());
        for row in rows {
            out.push(HashrateSample {
                miner_id: row.try_get("miner_id")?,
                timestamp: from_millis(row.try_get("timestamp")?),
                current: row.try_get("current")?,
                average: row.try_get("average")?,
                max: row.try_get("max")?,
            });
        }
        Ok(out)
    }

    #[instrument(skip(self), fields(repo = "store", operation = "get_overview"))]
    pub async fn get_overview(&self) -> anyhow::Result<Overview> {
        let _guard = self.lock.read().await;
        let miners = self.load_miners(Utc::now()).await?;
        Ok(overview::summarize(miners, TOP_MINERS))
    }

    /// Delete history samples older than `retention`. Returns rows deleted.
    #[instrument(skip(self), fields(repo = "store", operation = "prune_history"))]
    pub async fn prune_history(&self, retention: TimeDelta) -> anyhow::Result<u64> {
        // A cutoff before the earliest representable time has nothing older than it.
        let Some(cutoff) = Utc::now().checked_sub_signed(retention) else {
            return Ok(0);
        };
        let cutoff = cutoff.timestamp_millis();
        let _guard = self.lock.write().await;
        let r = sqlx::query("DELETE FROM hashrate_history WHERE timestamp < $1")
            .bind(cutoff)
            .execute(&self.pool)
            .await?;
        Ok(r.rows_affected())
    }

    /// Caller holds the lock.
    async fn load_miners(&self, now: DateTime<Utc>) -> anyhow::Result<Vec<Miner>> {
        let rows = sqlx::query(&format!(
            "SELECT {MINER_COLUMNS} FROM miners ORDER BY COALESCE(hashrate_current, 0) DESC, id ASC"
        ))
        .fetch_all(&self.pool)
        .await?;

        let mut out = Vec::with_capacity(rows.len());
        for row in rows {
            out.push(parse_miner_row(&row, now)?);
        }
        Ok(out)
    }
}

fn parse_miner_row(row: &SqliteRow, now: DateTime<Utc>) -> anyhow::Result<Miner> {
    let current: Option<f64> = row.try_get("hashrate_current")?;
    let average: Option<f64> = row.try_get("hashrate_average")?;
    let max: Option<f64> = row.try_get("hashrate_max")?;
    let hashrate = current.map(|current| HashrateData {
        current,
        average: average.unwrap_or(0.0),
        max: max.unwrap_or(0.0),
    });

    let id: String = row.try_get("id")?;
    let config_json: Option<String> = row.try_get("config_json")?;
    let config = config_json.and_then(|j| match parse_document(&j) {
        Ok(doc) => Some(doc),
        Err(e) => {
            tracing::debug!(error = %e, miner_id = %id, "stored config is not a JSON object, dropping");
            None
        }
    });

    let cores: i64 = row.try_get("cores")?;
    let uptime_seconds: i64 = row.try_get("uptime_seconds")?;
    let last_seen = from_millis(row.try_get("last_seen")?);

    Ok(Miner {
        id,
        miner_id: row.try_get("miner_id")?,
        worker_id: row.try_get("worker_id")?,
        hostname: row.try_get("hostname")?,
        ip: row.try_get("ip")?,
        cpu_model: row.try_get("cpu_model")?,
        cpu_family: row.try_get("cpu_family")?,
        cores: cores.max(0) as u32,
        os: row.try_get("os")?,
        arch: row.try_get("arch")?,
        miner_version: row.try_get("miner_version")?,
        agent_version: row.try_get("agent_version")?,
        uptime_seconds: uptime_seconds.max(0) as u64,
        hashrate,
        config,
        last_seen,
        status: MinerStatus::derive(last_seen, now),
    })
}

fn parse_document(json: &str) -> anyhow::Result<ConfigDocument> {
    Ok(serde_json::from_str(json)?)
}

fn from_millis(ms: i64) -> DateTime<Utc> {
    DateTime::from_timestamp_millis(ms).unwrap_or_default()
}
