// Shared test helpers
#![allow(dead_code)]

use rigfleet::models::{AgentReport, ConfigDocument, HashrateData};
use rigfleet::store::Store;
use serde_json::Value;
use std::sync::Arc;
use tempfile::TempDir;

/// Fresh, initialized store in a temp dir. Keep the `TempDir` alive for the test's duration.
pub async fn temp_store() -> (TempDir, Arc<Store>) {
    let dir = TempDir::new().unwrap();
    let path = dir.path().join("fleet.db");
    let store = Store::connect(path.to_str().unwrap(), 2).await.unwrap();
    store.init().await.unwrap();
    (dir, Arc::new(store))
}

pub fn report(miner_id: &str, current: Option<f64>) -> AgentReport {
    AgentReport {
        miner_id: miner_id.into(),
        worker_id: "192-168-1-50".into(),
        hostname: format!("{miner_id}-host"),
        ip: "192.168.1.50".into(),
        cpu_model: "AMD Ryzen 9 5900X 12-Core Processor".into(),
        cpu_family: "amd".into(),
        cores: 12,
        os: "linux".into(),
        arch: "x86_64".into(),
        miner_version: "6.21.0".into(),
        agent_version: "0.3.0".into(),
        uptime_seconds: 3600,
        hashrate: current.map(|c| HashrateData {
            current: c,
            average: c - 20.0,
            max: c + 50.0,
        }),
        config: None,
    }
}

pub fn doc(v: Value) -> ConfigDocument {
    match v {
        Value::Object(m) => m,
        other => panic!("not a JSON object: {other}"),
    }
}
