// Assembles one AgentReport from host identity, the miner summary and the live config.

use super::{Agent, host};
use crate::models::{AgentReport, ConfigDocument};
use tracing::debug;

/// `(api.id, api.worker-id)` from a live config document; missing entries are empty.
pub(crate) fn identity_from_config(config: &ConfigDocument) -> (String, String) {
    let api = config.get("api").and_then(|v| v.as_object());
    let field = |key: &str| {
        api.and_then(|a| a.get(key))
            .and_then(|v| v.as_str())
            .unwrap_or_default()
            .to_string()
    };
    (field("id"), field("worker-id"))
}

impl Agent {
    /// Never fails: whatever the local API cannot provide is left empty.
    ///
    /// Identity comes from the live config's `api` section. When that is unreachable the
    /// identity of the previous report is reused, so the coordinator keeps updating the same
    /// row; the summary's `id` / `worker_id` only fill in an identity nothing else supplied.
    pub async fn build_report(&self) -> AgentReport {
        let mut report = AgentReport {
            hostname: self.host.hostname.clone(),
            cpu_model: self.host.cpu_model.clone(),
            cpu_family: self.host.cpu_family.clone(),
            cores: self.host.cores,
            os: self.host.os.clone(),
            arch: self.host.arch.clone(),
            agent_version: crate::version::VERSION.to_string(),
            ..Default::default()
        };

        match self.miner_api.live_config().await {
            Ok(config) => {
                let (id, worker_id) = identity_from_config(&config);
                report.miner_id = id;
                report.worker_id = worker_id;
                report.config = Some(config);
            }
            Err(e) => debug!(error = %e, "live config unavailable"),
        }

        if let Some(ref id) = self.fixed_miner_id {
            report.miner_id = id.clone();
        }
        if report.identity().is_none()
            && let Some(previous) = self.last_report.lock().await.as_ref()
        {
            report.miner_id = previous.miner_id.clone();
            report.worker_id = previous.worker_id.clone();
        }

        match self.miner_api.summary().await {
            Ok(summary) => {
                report.hashrate = summary.hashrate();
                report.uptime_seconds = summary.uptime;
                if report.identity().is_none() {
                    report.miner_id = summary.id;
                    report.worker_id = summary.worker_id;
                } else if !report.miner_id.is_empty() && report.worker_id.is_empty() {
                    report.worker_id = summary.worker_id;
                }
                report.miner_version = summary.version;
            }
            Err(e) => debug!(error = %e, "miner summary unavailable"),
        }

        report.ip = host::detect_lan_ip()
            .await
            .or_else(|| host::ip_from_worker_id(&report.worker_id))
            .map(|ip| ip.to_string())
            .unwrap_or_default();

        *self.last_report.lock().await = Some(report.clone());
        report
    }
}
