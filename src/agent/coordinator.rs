// Agent-side client for the coordinator's agent endpoints (report, pending, ack).

use crate::models::{AgentReport, ConfigDocument, ReportResponse};
use anyhow::Context;
use reqwest::StatusCode;
use std::time::Duration;
use tracing::instrument;

const REPORT_TIMEOUT: Duration = Duration::from_secs(10);
const POLL_TIMEOUT: Duration = Duration::from_secs(5);
const ACK_TIMEOUT: Duration = Duration::from_secs(5);

pub struct CoordinatorClient {
    base_url: String,
    agent_key: Option<String>,
    http: reqwest::Client,
}

impl CoordinatorClient {
    pub fn new(base_url: &str, agent_key: &str) -> anyhow::Result<Self> {
        let http = reqwest::Client::builder()
            .user_agent(format!("{}/{}", crate::version::NAME, crate::version::VERSION))
            .build()
            .context("build coordinator HTTP client")?;
        Ok(Self {
            base_url: base_url.trim_end_matches('/').to_string(),
            agent_key: Some(agent_key.to_string()).filter(|k| !k.is_empty()),
            http,
        })
    }

    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    /// POST /api/report. The reply may carry a pending override.
    #[instrument(skip(self, report), fields(client = "coordinator", operation = "report"))]
    pub async fn post_report(&self, report: &AgentReport) -> anyhow::Result<ReportResponse> {
        let req = self
            .authorize(self.http.post(format!("{}/api/report", self.base_url)))
            .timeout(REPORT_TIMEOUT)
            .json(report);
        let resp = check_ok(req.send().await.context("report request failed")?).await?;
        resp.json().await.context("report response is not valid JSON")
    }

    /// GET /api/miners/{id}/config/pending
    #[instrument(skip(self), fields(client = "coordinator", operation = "pending"))]
    pub async fn pending_override(&self, miner_id: &str) -> anyhow::Result<Option<ConfigDocument>> {
        let url = self.miner_config_url(miner_id, "pending")?;
        let req = self.authorize(self.http.get(url)).timeout(POLL_TIMEOUT);
        let resp = check_ok(req.send().await.context("pending request failed")?).await?;
        let body: ReportResponse = resp
            .json()
            .await
            .context("pending response is not valid JSON")?;
        Ok(body.config_override)
    }

    /// POST /api/miners/{id}/config/ack
    #[instrument(skip(self), fields(client = "coordinator", operation = "ack"))]
    pub async fn ack(&self, miner_id: &str) -> anyhow::Result<()> {
        let url = self.miner_config_url(miner_id, "ack")?;
        let req = self.authorize(self.http.post(url)).timeout(ACK_TIMEOUT);
        check_ok(req.send().await.context("ack request failed")?).await?;
        Ok(())
    }

    /// `{base}/api/miners/{id}/config/{action}` with `id` percent-encoded as one segment.
    fn miner_config_url(&self, miner_id: &str, action: &str) -> anyhow::Result<reqwest::Url> {
        let mut url = reqwest::Url::parse(&self.base_url)
            .with_context(|| format!("invalid coordinator url {}", self.base_url))?;
        url.path_segments_mut()
            .map_err(|_| anyhow::anyhow!("coordinator url {} cannot take a path", self.base_url))?
            .pop_if_empty()
            .extend(["api", "miners", miner_id, "config", action]);
        Ok(url)
    }

    fn authorize(&self, req: reqwest::RequestBuilder) -> reqwest::RequestBuilder {
        match self.agent_key {
            Some(ref key) => req.bearer_auth(key),
            None => req,
        }
    }
}

async fn check_ok(resp: reqwest::Response) -> anyhow::Result<reqwest::Response> {
    let status = resp.status();
    if status == StatusCode::OK {
        return Ok(resp);
    }
    let body = resp.text().await.unwrap_or_default();
    anyhow::bail!("coordinator returned {}: {}", status.as_u16(), body.trim())
}
