// Agent -> coordinator report and the coordinator's replies

use serde::{Deserialize, Serialize};

use super::{ConfigDocument, HashrateData};

/// Everything one agent knows about its host and mining process at report time.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct AgentReport {
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
    #[serde(skip_serializing_if = "Option::is_none")]
    pub hashrate: Option<HashrateData>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub config: Option<ConfigDocument>,
}

impl AgentReport {
    /// Row key: `miner_id`, falling back to `worker_id`. `None` when both are empty.
    pub fn identity(&self) -> Option<&str> {
        [self.miner_id.as_str(), self.worker_id.as_str()]
            .into_iter()
            .find(|s| !s.is_empty())
    }
}

/// Reply to `POST /api/report` and `GET /api/miners/{id}/config/pending`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ReportResponse {
    pub ok: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub config_override: Option<ConfigDocument>,
}

impl ReportResponse {
    pub fn with_override(config_override: Option<ConfigDocument>) -> Self {
        Self {
            ok: true,
            config_override,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct OkResponse {
    pub ok: bool,
}

impl OkResponse {
    pub const OK: Self = Self { ok: true };
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn identity_prefers_miner_id() {
        let mut r = AgentReport {
            miner_id: "5900x-0".into(),
            worker_id: "10-0-0-7".into(),
            ..Default::default()
        };
        assert_eq!(r.identity(), Some("5900x-0"));
        r.miner_id.clear();
        assert_eq!(r.identity(), Some("10-0-0-7"));
        r.worker_id.clear();
        assert_eq!(r.identity(), None);
    }

    #[test]
    fn response_omits_absent_override() {
        let json = serde_json::to_string(&ReportResponse::with_override(None)).unwrap();
        assert_eq!(json, r#"{"ok":true}"#);
    }

    #[test]
    fn report_accepts_sparse_payload() {
        let r: AgentReport = serde_json::from_str(r#"{"worker_id":"w1"}"#).unwrap();
        assert_eq!(r.identity(), Some("w1"));
        assert!(r.hashrate.is_none());
        assert!(r.config.is_none());
    }
}
