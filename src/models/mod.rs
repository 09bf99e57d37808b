// Fleet domain models (wire JSON + store rows)

mod history;
mod miner;
mod overview;
mod report;

pub use history::HashrateSample;
pub use miner::{HashrateData, Miner, MinerStatus, OFFLINE_AFTER_SECS, ONLINE_WITHIN_SECS};
pub use overview::Overview;
pub use report::{AgentReport, OkResponse, ReportResponse};

/// Opaque, key-order-preserving JSON object. Used for live miner configs and overrides;
/// the fleet never interprets its contents beyond the `api` identity keys and the `cpu` backfill.
pub type ConfigDocument = serde_json::Map<String, serde_json::Value>;
