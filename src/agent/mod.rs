//! Host agent: reports telemetry on a heartbeat, polls for pending overrides, applies them to
//! the local mining process and acknowledges success.

mod coordinator;
pub mod host;
mod report;

pub use coordinator::CoordinatorClient;
pub use host::HostInfo;

use crate::config::{AgentConfig, ScheduleConfig};
use crate::miner_api::{ApplyOutcome, MinerApiClient};
use crate::models::{AgentReport, ConfigDocument};
use std::sync::Arc;
use tokio::sync::{Mutex, watch};
use tokio::time::{Instant, MissedTickBehavior};
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AgentState {
    /// Waiting out the startup delay; nothing has been reported yet.
    Starting,
    Reporting,
    Stopped,
}

pub struct Agent {
    schedule: ScheduleConfig,
    fixed_miner_id: Option<String>,
    host: HostInfo,
    coordinator: CoordinatorClient,
    miner_api: MinerApiClient,
    /// Serializes apply-then-ack between the heartbeat and poll paths.
    apply_lock: Mutex<()>,
    last_report: Mutex<Option<AgentReport>>,
    state: watch::Sender<AgentState>,
}

impl Agent {
    pub fn new(config: &AgentConfig, host: HostInfo) -> anyhow::Result<Self> {
        let (state, _) = watch::channel(AgentState::Starting);
        Ok(Self {
            schedule: config.schedule.clone(),
            fixed_miner_id: config.miner.miner_id.clone().filter(|id| !id.is_empty()),
            host,
            coordinator: CoordinatorClient::new(
                &config.coordinator.url,
                &config.coordinator.agent_key,
            )?,
            miner_api: MinerApiClient::new(&config.miner.api_url, &config.miner.access_token)?,
            apply_lock: Mutex::new(()),
            last_report: Mutex::new(None),
            state,
        })
    }

    pub fn state(&self) -> watch::Receiver<AgentState> {
        self.state.subscribe()
    }

    /// Startup delay, first report, then heartbeat and poll loops until `shutdown` fires.
    /// Cancelling during the startup delay stops the agent without reporting.
    pub async fn run(self: Arc<Self>, shutdown: CancellationToken) {
        info!(
            coordinator = %self.coordinator.base_url(),
            heartbeat_secs = self.schedule.heartbeat_interval_secs,
            poll_secs = self.schedule.poll_interval_secs,
            "Agent starting"
        );

        tokio::select! {
            _ = shutdown.cancelled() => {
                info!("Shutdown during startup delay; exiting without reporting");
                self.state.send_replace(AgentState::Stopped);
                return;
            }
            _ = tokio::time::sleep(self.schedule.startup_delay()) => {}
        }

        self.state.send_replace(AgentState::Reporting);
        self.heartbeat().await;

        let poller = tokio::spawn(self.clone().poll_loop(shutdown.clone()));
        self.heartbeat_loop(&shutdown).await;
        if let Err(e) = poller.await {
            warn!(error = %e, "poll loop task failed");
        }

        self.state.send_replace(AgentState::Stopped);
        info!("Agent stopped");
    }

    async fn heartbeat_loop(&self, shutdown: &CancellationToken) {
        let period = self.schedule.heartbeat_interval();
        let mut ticker = tokio::time::interval_at(Instant::now() + period, period);
        ticker.set_missed_tick_behavior(MissedTickBehavior::Skip);
        loop {
            tokio::select! {
                _ = shutdown.cancelled() => break,
                _ = ticker.tick() => self.heartbeat().await,
            }
        }
    }

    async fn poll_loop(self: Arc<Self>, shutdown: CancellationToken) {
        let period = self.schedule.poll_interval();
        let mut ticker = tokio::time::interval_at(Instant::now() + period, period);
        ticker.set_missed_tick_behavior(MissedTickBehavior::Skip);
        loop {
            tokio::select! {
                _ = shutdown.cancelled() => break,
                _ = ticker.tick() => self.poll_once().await,
            }
        }
        debug!("Poll loop stopped");
    }

    /// Build and send one report; apply the override the coordinator returns, if any.
    pub async fn heartbeat(&self) {
        let report = self.build_report().await;
        let Some(id) = report.identity().map(str::to_string) else {
            warn!("No miner identity known yet; skipping report");
            return;
        };
        match self.coordinator.post_report(&report).await {
            Ok(resp) => {
                debug!(
                    miner_id = %id,
                    hashrate = report.hashrate.map(|h| h.current).unwrap_or(0.0),
                    "report accepted"
                );
                if let Some(doc) = resp.config_override {
                    info!(miner_id = %id, "Override returned with report");
                    self.apply_and_ack(&id, &doc).await;
                }
            }
            Err(e) => warn!(miner_id = %id, error = %e, "Failed to send report"),
        }
    }

    /// One pending-override check. Skipped while the miner id is unknown.
    pub async fn poll_once(&self) {
        let Some(id) = self.miner_id().await else {
            debug!("miner id unknown; skipping poll");
            return;
        };
        match self.coordinator.pending_override(&id).await {
            Ok(Some(doc)) => {
                info!(miner_id = %id, "Pending override found");
                self.apply_and_ack(&id, &doc).await;
            }
            Ok(None) => {}
            Err(e) => debug!(miner_id = %id, error = %e, "pending override check failed"),
        }
    }

    /// Configured id, else the identity of the last report, else the live config's.
    async fn miner_id(&self) -> Option<String> {
        if let Some(ref id) = self.fixed_miner_id {
            return Some(id.clone());
        }
        if let Some(id) = self
            .last_report
            .lock()
            .await
            .as_ref()
            .and_then(|r| r.identity().map(str::to_string))
        {
            return Some(id);
        }
        let config = self.miner_api.live_config().await.ok()?;
        let (id, worker_id) = report::identity_from_config(&config);
        [id, worker_id].into_iter().find(|s| !s.is_empty())
    }

    /// PUT the override to the mining process and ack only on success. A failed ack leaves
    /// the override pending; the next poll re-applies it, which the mining process tolerates.
    /// Returns true when the ack went through.
    pub async fn apply_and_ack(&self, miner_id: &str, doc: &ConfigDocument) -> bool {
        let _guard = self.apply_lock.lock().await;
        match self.miner_api.apply_config(doc).await {
            Ok(ApplyOutcome::Applied) => {}
            Ok(ApplyOutcome::Rejected { status, body }) => {
                warn!(miner_id, status, body = %body.trim(), "Mining process rejected override");
                return false;
            }
            Err(e) => {
                warn!(miner_id, error = %e, "Failed to apply override");
                return false;
            }
        }
        match self.coordinator.ack(miner_id).await {
            Ok(()) => {
                info!(miner_id, "Override applied and acknowledged");
                true
            }
            Err(e) => {
                warn!(miner_id, error = %e, "Override applied but ack failed; will retry");
                false
            }
        }
    }
}
