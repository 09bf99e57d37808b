// Background history pruner. Runs on a fixed interval, or on a cron schedule (local time) when
// one is configured, until the shutdown token is cancelled.

use crate::store::Store;
use chrono::TimeDelta;
use std::str::FromStr;
use std::sync::Arc;
use std::time::Duration;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

/// Pruner timing and retention.
#[derive(Debug, Clone)]
pub struct PruneWorkerConfig {
    pub retention_days: u32,
    pub interval_secs: u64,
    /// Cron expression; when set it replaces `interval_secs`.
    pub schedule: Option<String>,
}

impl PruneWorkerConfig {
    pub fn retention(&self) -> TimeDelta {
        TimeDelta::days(i64::from(self.retention_days))
    }

    /// Delay until the next prune: next cron fire time, else the fixed interval.
    fn next_delay(&self, schedule: Option<&cron::Schedule>) -> Duration {
        let interval = Duration::from_secs(self.interval_secs);
        let Some(schedule) = schedule else {
            return interval;
        };
        let now = chrono::Local::now();
        match schedule.after(&now).next() {
            Some(next) => (next - now).to_std().unwrap_or(Duration::from_secs(1)),
            None => interval,
        }
    }
}

/// Spawns the pruner. The returned handle completes once `shutdown` is cancelled.
pub fn spawn(
    store: Arc<Store>,
    config: PruneWorkerConfig,
    shutdown: CancellationToken,
) -> tokio::task::JoinHandle<()> {
    tokio::spawn(async move {
        let schedule = match config.schedule.as_deref().map(cron::Schedule::from_str) {
            Some(Ok(s)) => Some(s),
            Some(Err(e)) => {
                warn!(error = %e, "invalid prune_schedule; falling back to prune_interval_secs");
                None
            }
            None => None,
        };
        let mut pruned_total: u64 = 0;

        loop {
            let delay = config.next_delay(schedule.as_ref());
            tokio::select! {
                _ = shutdown.cancelled() => {
                    debug!("Prune worker shutting down");
                    break;
                }
                _ = tokio::time::sleep(delay) => {
                    match store.prune_history(config.retention()).await {
                        Ok(n) => {
                            pruned_total += n;
                            info!(
                                operation = "prune_history",
                                samples_pruned = n,
                                samples_pruned_total = pruned_total,
                                "hashrate history pruned"
                            );
                        }
                        Err(e) => warn!(
                            error = %e,
                            operation = "prune_history",
                            "Failed to prune hashrate history"
                        ),
                    }
                }
            }
        }
    })
}
