// Fleet overview: online counts and hashrate sums over already-classified miners.

use crate::models::{Miner, Overview};

/// Aggregate `miners` (status already derived). Only online miners contribute to the
/// hashrate sums; `top_miners` is the `top_n` highest current hashrates regardless of status.
pub fn summarize(mut miners: Vec<Miner>, top_n: usize) -> Overview {
    let total_miners = miners.len();
    let mut active_miners = 0;
    let mut total_hashrate = 0.0;
    let mut average_hashrate = 0.0;

    for m in miners.iter().filter(|m| m.is_online()) {
        active_miners += 1;
        if let Some(h) = m.hashrate {
            total_hashrate += h.current;
            average_hashrate += h.average;
        }
    }

    miners.sort_by(|a, b| b.current_hashrate().total_cmp(&a.current_hashrate()));
    miners.truncate(top_n);

    Overview {
        total_hashrate,
        average_hashrate,
        active_miners,
        total_miners,
        top_miners: miners,
    }
}
