// Fleet-wide aggregate for GET /api/overview

use serde::{Deserialize, Serialize};

use super::Miner;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Overview {
    /// Sum of online miners' current hashrate.
    pub total_hashrate: f64,
    /// Sum of online miners' reported average hashrate.
    pub average_hashrate: f64,
    pub active_miners: usize,
    pub total_miners: usize,
    pub top_miners: Vec<Miner>,
}
