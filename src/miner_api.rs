// Client for the mining process's embedded HTTP API on the local host:
// GET /1/summary, GET /1/config, PUT /1/config. PUT merge semantics belong to the mining
// process; the override document is forwarded verbatim and only the status code is trusted.

use crate::models::{ConfigDocument, HashrateData};
use anyhow::Context;
use reqwest::StatusCode;
use serde::Deserialize;
use std::time::Duration;
use tracing::instrument;

const READ_TIMEOUT: Duration = Duration::from_secs(2);
const WRITE_TIMEOUT: Duration = Duration::from_secs(5);

/// Subset of `GET /1/summary` the agent reports.
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default)]
pub struct MinerSummary {
    /// Same value as the live config's `api.id`.
    pub id: String,
    pub worker_id: String,
    pub version: String,
    pub uptime: u64,
    pub hashrate: SummaryHashrate,
}

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default)]
pub struct SummaryHashrate {
    /// `[current, average, max]`; entries are null while a window is still filling.
    pub total: Vec<Option<f64>>,
}

impl MinerSummary {
    /// `None` unless all three windows are present.
    pub fn hashrate(&self) -> Option<HashrateData> {
        match self.hashrate.total.as_slice() {
            [current, average, max, ..] => Some(HashrateData {
                current: current.unwrap_or(0.0),
                average: average.unwrap_or(0.0),
                max: max.unwrap_or(0.0),
            }),
            _ => None,
        }
    }
}

/// Result of pushing an override to the mining process.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ApplyOutcome {
    Applied,
    Rejected { status: u16, body: String },
}

pub struct MinerApiClient {
    base_url: String,
    access_token: Option<String>,
    http: reqwest::Client,
}

impl MinerApiClient {
    pub fn new(base_url: &str, access_token: &str) -> anyhow::Result<Self> {
        let http = reqwest::Client::builder()
            .build()
            .context("build miner API HTTP client")?;
        Ok(Self {
            base_url: base_url.trim_end_matches('/').to_string(),
            access_token: Some(access_token.to_string()).filter(|t| !t.is_empty()),
            http,
        })
    }

    #[instrument(skip(self), fields(client = "miner_api", operation = "summary"))]
    pub async fn summary(&self) -> anyhow::Result<MinerSummary> {
        self.get_json("/1/summary").await
    }

    #[instrument(skip(self), fields(client = "miner_api", operation = "live_config"))]
    pub async fn live_config(&self) -> anyhow::Result<ConfigDocument> {
        self.get_json("/1/config").await
    }

    #[instrument(skip(self, doc), fields(client = "miner_api", operation = "apply_config"))]
    pub async fn apply_config(&self, doc: &ConfigDocument) -> anyhow::Result<ApplyOutcome> {
        let req = self
            .authorize(self.http.put(self.url("/1/config")))
            .timeout(WRITE_TIMEOUT)
            .json(doc);
        let resp = req.send().await.context("miner API PUT /1/config failed")?;
        let status = resp.status();
        if status == StatusCode::OK || status == StatusCode::NO_CONTENT {
            return Ok(ApplyOutcome::Applied);
        }
        let body = resp.text().await.unwrap_or_default();
        Ok(ApplyOutcome::Rejected {
            status: status.as_u16(),
            body,
        })
    }

    async fn get_json<T: serde::de::DeserializeOwned>(&self, path: &str) -> anyhow::Result<T> {
        let resp = self
            .authorize(self.http.get(self.url(path)))
            .timeout(READ_TIMEOUT)
            .send()
            .await
            .with_context(|| format!("miner API GET {} failed", path))?;
        let status = resp.status();
        anyhow::ensure!(
            status == StatusCode::OK,
            "miner API GET {} returned status {}",
            path,
            status.as_u16()
        );
        resp.json()
            .await
            .with_context(|| format!("miner API GET {} returned invalid JSON", path))
    }

    fn url(&self, path: &str) -> String {
        format!("{}{}", self.base_url, path)
    }

    fn authorize(&self, req: reqwest::RequestBuilder) -> reqwest::RequestBuilder {
        match self.access_token {
            Some(ref token) => req.bearer_auth(token),
            None => req,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn summary_hashrate_needs_three_windows() {
        let s: MinerSummary =
            serde_json::from_str(r#"{"id":"rig-1","version":"6.21.0","hashrate":{"total":[1000.0,950.0,1100.0]}}"#)
                .unwrap();
        let h = s.hashrate().unwrap();
        assert_eq!((h.current, h.average, h.max), (1000.0, 950.0, 1100.0));
        assert_eq!(s.id, "rig-1");

        let short: MinerSummary =
            serde_json::from_str(r#"{"hashrate":{"total":[1000.0]}}"#).unwrap();
        assert!(short.hashrate().is_none());
    }

    #[test]
    fn summary_null_windows_read_as_zero() {
        let s: MinerSummary =
            serde_json::from_str(r#"{"hashrate":{"total":[812.5,null,null]}}"#).unwrap();
        let h = s.hashrate().unwrap();
        assert_eq!(h.current, 812.5);
        assert_eq!(h.average, 0.0);
    }
}
