// Hashrate history sample (append-only, pruned by age)

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct HashrateSample {
    pub miner_id: String,
    pub timestamp: DateTime<Utc>,
    pub current: f64,
    pub average: f64,
    pub max: f64,
}
