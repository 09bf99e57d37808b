// Miner row and derived liveness status

use chrono::{DateTime, TimeDelta, Utc};
use serde::{Deserialize, Serialize};

use super::ConfigDocument;

/// A miner last seen less than this many seconds ago is online.
pub const ONLINE_WITHIN_SECS: i64 = 90;
/// A miner last seen at least this many seconds ago is offline; in between it is stale.
pub const OFFLINE_AFTER_SECS: i64 = 300;

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct HashrateData {
    pub current: f64,
    pub average: f64,
    pub max: f64,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum MinerStatus {
    Online,
    Stale,
    Offline,
}

impl MinerStatus {
    /// Classify by time since the last successful report. Negative elapsed time
    /// (coordinator clock stepped backwards) counts as online.
    pub fn from_elapsed(elapsed: TimeDelta) -> Self {
        let secs = elapsed.num_seconds();
        if secs < ONLINE_WITHIN_SECS {
            Self::Online
        } else if secs < OFFLINE_AFTER_SECS {
            Self::Stale
        } else {
            Self::Offline
        }
    }

    pub fn derive(last_seen: DateTime<Utc>, now: DateTime<Utc>) -> Self {
        Self::from_elapsed(now - last_seen)
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Online => "online",
            Self::Stale => "stale",
            Self::Offline => "offline",
        }
    }
}

/// One row per mining identity. `status` is computed at read time, never stored.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Miner {
    pub id: String,
    pub miner_id: String,
    pub worker_id: String,
    pub hostname: String,
    pub ip: String,
    pub cpu_model: String,
    pub cpu_family: String,
    pub cores: u32,
    pub os: String,
    pub arch: String,
    pub miner_version: String,
    pub agent_version: String,
    pub uptime_seconds: u64,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub hashrate: Option<HashrateData>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub config: Option<ConfigDocument>,
    pub last_seen: DateTime<Utc>,
    pub status: MinerStatus,
}

impl Miner {
    pub fn current_hashrate(&self) -> f64 {
        self.hashrate.map(|h| h.current).unwrap_or(0.0)
    }

    pub fn is_online(&self) -> bool {
        self.status == MinerStatus::Online
    }
}
