use serde::Deserialize;
use std::str::FromStr;
use std::time::Duration;

/// Coordinator config, read from `$CONFIG_FILE` (default `config.toml`).
#[derive(Debug, Clone, Deserialize)]
pub struct AppConfig {
    pub server: ServerConfig,
    pub database: DatabaseConfig,
    #[serde(default)]
    pub auth: AuthConfig,
    #[serde(default)]
    pub history: HistoryConfig,
    pub proxy: Option<ProxyConfig>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct ServerConfig {
    pub port: u16,
    pub host: String,
}

#[derive(Debug, Clone, Deserialize)]
pub struct DatabaseConfig {
    pub path: String,
    #[serde(default = "default_max_pool_size")]
    pub max_pool_size: u32,
}

fn default_max_pool_size() -> u32 {
    5
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct AuthConfig {
    /// Shared secret agents send as `Authorization: Bearer <key>`. Empty disables the check.
    #[serde(default)]
    pub agent_key: String,
}

impl AuthConfig {
    pub fn agent_key(&self) -> Option<&str> {
        Some(self.agent_key.as_str()).filter(|k| !k.is_empty())
    }
}

#[derive(Debug, Clone, Deserialize)]
pub struct HistoryConfig {
    #[serde(default = "default_retention_days")]
    pub retention_days: u32,
    #[serde(default = "default_prune_interval_secs")]
    pub prune_interval_secs: u64,
    /// Optional cron expression for pruning (e.g. "0 0 * * * *" = top of every hour). Uses local
    /// time. Takes precedence over prune_interval_secs.
    #[serde(default)]
    pub prune_schedule: Option<String>,
}

impl Default for HistoryConfig {
    fn default() -> Self {
        Self {
            retention_days: default_retention_days(),
            prune_interval_secs: default_prune_interval_secs(),
            prune_schedule: None,
        }
    }
}

/// 100 years.
const MAX_RETENTION_DAYS: u32 = 36_500;

fn default_retention_days() -> u32 {
    7
}

fn default_prune_interval_secs() -> u64 {
    3600
}

/// Mining-pool proxy whose summary/worker endpoints are passed through under /api/proxy.
#[derive(Debug, Clone, Deserialize)]
pub struct ProxyConfig {
    pub url: String,
    #[serde(default)]
    pub access_token: String,
}

impl AppConfig {
    pub fn load() -> anyhow::Result<Self> {
        let path = std::env::var("CONFIG_FILE").unwrap_or_else(|_| "config.toml".into());
        let s = std::fs::read_to_string(&path)?;
        Self::load_from_str(&s)
    }

    /// Parse and validate config from a string (e.g. for tests).
    pub fn load_from_str(s: &str) -> anyhow::Result<Self> {
        let config: AppConfig = toml::from_str(s)?;
        config.validate()?;
        Ok(config)
    }

    fn validate(&self) -> anyhow::Result<()> {
        anyhow::ensure!(
            self.server.port > 0,
            "server.port must be between 1 and 65535, got {}",
            self.server.port
        );
        anyhow::ensure!(
            !self.database.path.is_empty(),
            "database.path must be non-empty"
        );
        anyhow::ensure!(
            self.database.max_pool_size > 0,
            "database.max_pool_size must be > 0, got {}",
            self.database.max_pool_size
        );
        anyhow::ensure!(
            (1..=MAX_RETENTION_DAYS).contains(&self.history.retention_days),
            "history.retention_days must be between 1 and {}, got {}",
            MAX_RETENTION_DAYS,
            self.history.retention_days
        );
        anyhow::ensure!(
            self.history.prune_interval_secs > 0,
            "history.prune_interval_secs must be > 0, got {}",
            self.history.prune_interval_secs
        );
        if let Some(ref expr) = self.history.prune_schedule {
            cron::Schedule::from_str(expr).map_err(|e| {
                anyhow::anyhow!("history.prune_schedule is not a valid cron expression: {}", e)
            })?;
        }
        if let Some(ref proxy) = self.proxy {
            anyhow::ensure!(!proxy.url.is_empty(), "proxy.url must be non-empty");
        }
        Ok(())
    }
}

/// Agent config, read from `$AGENT_CONFIG_FILE` (default `agent.toml`).
#[derive(Debug, Clone, Deserialize)]
pub struct AgentConfig {
    pub coordinator: CoordinatorConfig,
    #[serde(default)]
    pub miner: MinerApiConfig,
    #[serde(default)]
    pub schedule: ScheduleConfig,
}

#[derive(Debug, Clone, Deserialize)]
pub struct CoordinatorConfig {
    pub url: String,
    #[serde(default)]
    pub agent_key: String,
}

/// Where the local mining process exposes its HTTP API.
#[derive(Debug, Clone, Deserialize)]
pub struct MinerApiConfig {
    #[serde(default = "default_miner_api_url")]
    pub api_url: String,
    #[serde(default)]
    pub access_token: String,
    /// Fixed identity; when unset the agent reads `api.id` / `api.worker-id` from the live config.
    #[serde(default)]
    pub miner_id: Option<String>,
}

impl Default for MinerApiConfig {
    fn default() -> Self {
        Self {
            api_url: default_miner_api_url(),
            access_token: String::new(),
            miner_id: None,
        }
    }
}

fn default_miner_api_url() -> String {
    "http://127.0.0.1:8181".into()
}

#[derive(Debug, Clone, Deserialize)]
pub struct ScheduleConfig {
    #[serde(default = "default_heartbeat_interval_secs")]
    pub heartbeat_interval_secs: u64,
    #[serde(default = "default_poll_interval_secs")]
    pub poll_interval_secs: u64,
    /// Grace period for the mining process to bring up its API before the first report.
    #[serde(default = "default_startup_delay_secs")]
    pub startup_delay_secs: u64,
}

impl Default for ScheduleConfig {
    fn default() -> Self {
        Self {
            heartbeat_interval_secs: default_heartbeat_interval_secs(),
            poll_interval_secs: default_poll_interval_secs(),
            startup_delay_secs: default_startup_delay_secs(),
        }
    }
}

impl ScheduleConfig {
    pub fn heartbeat_interval(&self) -> Duration {
        Duration::from_secs(self.heartbeat_interval_secs)
    }

    pub fn poll_interval(&self) -> Duration {
        Duration::from_secs(self.poll_interval_secs)
    }

    pub fn startup_delay(&self) -> Duration {
        Duration::from_secs(self.startup_delay_secs)
    }
}

fn default_heartbeat_interval_secs() -> u64 {
    30
}

fn default_poll_interval_secs() -> u64 {
    3
}

fn default_startup_delay_secs() -> u64 {
    5
}

impl AgentConfig {
    pub fn load() -> anyhow::Result<Self> {
        let path = std::env::var("AGENT_CONFIG_FILE").unwrap_or_else(|_| "agent.toml".into());
        let s = std::fs::read_to_string(&path)?;
        Self::load_from_str(&s)
    }

    pub fn load_from_str(s: &str) -> anyhow::Result<Self> {
        let config: AgentConfig = toml::from_str(s)?;
        config.validate()?;
        Ok(config)
    }

    fn validate(&self) -> anyhow::Result<()> {
        anyhow::ensure!(
            !self.coordinator.url.is_empty(),
            "coordinator.url must be non-empty"
        );
        anyhow::ensure!(
            !self.miner.api_url.is_empty(),
            "miner.api_url must be non-empty"
        );
        anyhow::ensure!(
            self.schedule.heartbeat_interval_secs > 0,
            "schedule.heartbeat_interval_secs must be > 0, got {}",
            self.schedule.heartbeat_interval_secs
        );
        anyhow::ensure!(
            self.schedule.poll_interval_secs > 0,
            "schedule.poll_interval_secs must be > 0, got {}",
            self.schedule.poll_interval_secs
        );
        Ok(())
    }
}
