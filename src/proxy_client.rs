// Read-through client for a mining-pool proxy's HTTP API (GET /1/summary, GET /1/workers).
// Responses are forwarded as opaque JSON; nothing is cached.

use anyhow::Context;
use serde_json::Value;
use std::time::Duration;
use tracing::instrument;

const PROXY_TIMEOUT: Duration = Duration::from_secs(5);

pub struct ProxyClient {
    base_url: String,
    access_token: Option<String>,
    http: reqwest::Client,
}

impl ProxyClient {
    pub fn new(base_url: &str, access_token: &str) -> anyhow::Result<Self> {
        let http = reqwest::Client::builder()
            .timeout(PROXY_TIMEOUT)
            .build()
            .context("build proxy HTTP client")?;
        Ok(Self {
            base_url: base_url.trim_end_matches('/').to_string(),
            access_token: Some(access_token.to_string()).filter(|t| !t.is_empty()),
            http,
        })
    }

    #[instrument(skip(self), fields(client = "proxy", operation = "summary"))]
    pub async fn summary(&self) -> anyhow::Result<Value> {
        self.get("/1/summary").await
    }

    #[instrument(skip(self), fields(client = "proxy", operation = "workers"))]
    pub async fn workers(&self) -> anyhow::Result<Vec<Value>> {
        normalize_workers(self.get("/1/workers").await?)
    }

    async fn get(&self, path: &str) -> anyhow::Result<Value> {
        let mut req = self.http.get(format!("{}{}", self.base_url, path));
        if let Some(ref token) = self.access_token {
            req = req.bearer_auth(token);
        }
        let resp = req.send().await.context("proxy request failed")?;
        let status = resp.status();
        anyhow::ensure!(
            status == reqwest::StatusCode::OK,
            "proxy returned status {}",
            status.as_u16()
        );
        resp.json().await.context("proxy response is not JSON")
    }
}

/// The proxy answers either `{"workers": [...]}` or a bare array.
pub(crate) fn normalize_workers(body: Value) -> anyhow::Result<Vec<Value>> {
    match body {
        Value::Array(workers) => Ok(workers),
        Value::Object(mut obj) => match obj.remove("workers") {
            Some(Value::Array(workers)) => Ok(workers),
            _ => anyhow::bail!("proxy workers response has no workers array"),
        },
        other => anyhow::bail!("unexpected proxy workers response: {}", other),
    }
}
