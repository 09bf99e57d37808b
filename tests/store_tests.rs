// Store tests: upsert, status derivation, override lifecycle, history, overview, prune

mod common;

use chrono::{TimeDelta, Utc};
use common::{doc, report, temp_store};
use rigfleet::models::{AgentReport, MinerStatus};
use rigfleet::store::Store;
use serde_json::json;

#[tokio::test]
async fn report_creates_online_miner_and_one_sample() {
    let (_dir, store) = temp_store().await;
    let id = store.upsert_miner(&report("rig-1", Some(1000.0))).await.unwrap();
    assert_eq!(id, "rig-1");

    let miners = store.get_miners().await.unwrap();
    assert_eq!(miners.len(), 1);
    let m = &miners[0];
    assert_eq!(m.status, MinerStatus::Online);
    assert_eq!(m.cores, 12);
    assert_eq!(m.hashrate.unwrap().current, 1000.0);

    let samples = store
        .get_hashrate_history(Some("rig-1"), Utc::now() - TimeDelta::hours(1))
        .await
        .unwrap();
    assert_eq!(samples.len(), 1);
    assert_eq!(samples[0].average, 980.0);
}

#[tokio::test]
async fn repeated_reports_update_in_place_and_append_history() {
    let (_dir, store) = temp_store().await;
    store.upsert_miner(&report("rig-1", Some(1000.0))).await.unwrap();
    let mut second = report("rig-1", Some(1200.0));
    second.hostname = "renamed".into();
    store.upsert_miner(&second).await.unwrap();

    let miners = store.get_miners().await.unwrap();
    assert_eq!(miners.len(), 1);
    assert_eq!(miners[0].hostname, "renamed");
    assert_eq!(miners[0].current_hashrate(), 1200.0);

    let samples = store
        .get_hashrate_history(Some("rig-1"), Utc::now() - TimeDelta::hours(1))
        .await
        .unwrap();
    let currents: Vec<f64> = samples.iter().map(|s| s.current).collect();
    assert_eq!(currents, [1000.0, 1200.0]);
}

#[tokio::test]
async fn report_without_hashrate_keeps_row_but_adds_no_sample() {
    let (_dir, store) = temp_store().await;
    store.upsert_miner(&report("rig-1", None)).await.unwrap();

    let m = store.get_miner("rig-1").await.unwrap().unwrap();
    assert!(m.hashrate.is_none());
    assert_eq!(m.status, MinerStatus::Online);
    let samples = store
        .get_hashrate_history(None, Utc::now() - TimeDelta::hours(1))
        .await
        .unwrap();
    assert!(samples.is_empty());
}

#[tokio::test]
async fn identity_falls_back_to_worker_id() {
    let (_dir, store) = temp_store().await;
    let mut r = report("", Some(500.0));
    r.worker_id = "192-168-1-77".into();
    let id = store.upsert_miner(&r).await.unwrap();
    assert_eq!(id, "192-168-1-77");
    assert!(store.get_miner("192-168-1-77").await.unwrap().is_some());
}

#[tokio::test]
async fn report_without_identity_is_rejected() {
    let (_dir, store) = temp_store().await;
    let err = store.upsert_miner(&AgentReport::default()).await.unwrap_err();
    assert!(err.to_string().contains("miner_id"));
    assert!(store.get_miners().await.unwrap().is_empty());
}

#[tokio::test]
async fn status_derived_from_last_seen() {
    let (_dir, store) = temp_store().await;
    let now = Utc::now();
    store
        .upsert_miner_at(&report("fresh", Some(1.0)), now - TimeDelta::seconds(10))
        .await
        .unwrap();
    store
        .upsert_miner_at(&report("quiet", Some(2.0)), now - TimeDelta::seconds(120))
        .await
        .unwrap();
    store
        .upsert_miner_at(&report("gone", Some(3.0)), now - TimeDelta::seconds(400))
        .await
        .unwrap();

    let status = |id: &str| {
        let store = store.clone();
        let id = id.to_string();
        async move { store.get_miner(&id).await.unwrap().unwrap().status }
    };
    assert_eq!(status("fresh").await, MinerStatus::Online);
    assert_eq!(status("quiet").await, MinerStatus::Stale);
    assert_eq!(status("gone").await, MinerStatus::Offline);

    // A new report brings an offline miner straight back online.
    store.upsert_miner(&report("gone", Some(3.0))).await.unwrap();
    assert_eq!(status("gone").await, MinerStatus::Online);
}

#[tokio::test]
async fn miners_listed_by_hashrate_desc() {
    let (_dir, store) = temp_store().await;
    store.upsert_miner(&report("slow", Some(100.0))).await.unwrap();
    store.upsert_miner(&report("idle", None)).await.unwrap();
    store.upsert_miner(&report("fast", Some(900.0))).await.unwrap();
    let ids: Vec<String> = store
        .get_miners()
        .await
        .unwrap()
        .into_iter()
        .map(|m| m.id)
        .collect();
    assert_eq!(ids, ["fast", "slow", "idle"]);
}

#[tokio::test]
async fn live_config_round_trips_in_order() {
    let (_dir, store) = temp_store().await;
    let mut r = report("rig-1", Some(1.0));
    r.config = Some(doc(json!({"api": {"id": "rig-1"}, "cpu": {"enabled": true}, "pools": []})));
    store.upsert_miner(&r).await.unwrap();
    let m = store.get_miner("rig-1").await.unwrap().unwrap();
    let keys: Vec<&str> = m.config.as_ref().unwrap().keys().map(String::as_str).collect();
    assert_eq!(keys, ["api", "cpu", "pools"]);
}

#[tokio::test]
async fn override_lifecycle() {
    let (_dir, store) = temp_store().await;
    let first = doc(json!({"cpu": {"max-threads-hint": 50}}));
    let second = doc(json!({"cpu": {"max-threads-hint": 75}}));

    assert!(store.get_config_override("rig-1").await.unwrap().is_none());

    store.set_config_override("rig-1", &first).await.unwrap();
    assert_eq!(store.get_config_override("rig-1").await.unwrap(), Some(first.clone()));

    store.mark_config_applied("rig-1").await.unwrap();
    assert!(store.get_config_override("rig-1").await.unwrap().is_none());
    assert_eq!(store.get_last_override("rig-1").await.unwrap(), Some(first));

    // Replacing an applied override makes it pending again.
    store.set_config_override("rig-1", &second).await.unwrap();
    assert_eq!(store.get_config_override("rig-1").await.unwrap(), Some(second.clone()));

    // Acking twice is harmless.
    store.mark_config_applied("rig-1").await.unwrap();
    store.mark_config_applied("rig-1").await.unwrap();
    assert!(store.get_config_override("rig-1").await.unwrap().is_none());

    store.delete_config_override("rig-1").await.unwrap();
    assert!(store.get_last_override("rig-1").await.unwrap().is_none());
}

#[tokio::test]
async fn ack_and_delete_without_override_are_noops() {
    let (_dir, store) = temp_store().await;
    store.mark_config_applied("nobody").await.unwrap();
    store.delete_config_override("nobody").await.unwrap();
    assert!(store.get_last_override("nobody").await.unwrap().is_none());
}

#[tokio::test]
async fn override_may_target_unknown_miner() {
    let (_dir, store) = temp_store().await;
    let d = doc(json!({"cpu": {"enabled": false}}));
    store.set_config_override("future-rig", &d).await.unwrap();
    assert!(store.get_miner("future-rig").await.unwrap().is_none());
    assert_eq!(store.get_config_override("future-rig").await.unwrap(), Some(d));
}

#[tokio::test]
async fn history_window_and_filter() {
    let (_dir, store) = temp_store().await;
    let now = Utc::now();
    store
        .upsert_miner_at(&report("a", Some(1.0)), now - TimeDelta::hours(30))
        .await
        .unwrap();
    store
        .upsert_miner_at(&report("a", Some(2.0)), now - TimeDelta::hours(2))
        .await
        .unwrap();
    store
        .upsert_miner_at(&report("b", Some(3.0)), now - TimeDelta::hours(1))
        .await
        .unwrap();

    let day = now - TimeDelta::hours(24);
    let all = store.get_hashrate_history(None, day).await.unwrap();
    let seen: Vec<(&str, f64)> = all.iter().map(|s| (s.miner_id.as_str(), s.current)).collect();
    assert_eq!(seen, [("a", 2.0), ("b", 3.0)]);

    let only_a = store.get_hashrate_history(Some("a"), day).await.unwrap();
    assert_eq!(only_a.len(), 1);
    assert!(only_a.windows(2).all(|w| w[0].timestamp <= w[1].timestamp));

    let week = store
        .get_hashrate_history(Some("a"), now - TimeDelta::days(7))
        .await
        .unwrap();
    assert_eq!(week.len(), 2);
}

#[tokio::test]
async fn prune_drops_only_old_samples() {
    let (_dir, store) = temp_store().await;
    let now = Utc::now();
    store
        .upsert_miner_at(&report("a", Some(1.0)), now - TimeDelta::days(10))
        .await
        .unwrap();
    store.upsert_miner(&report("a", Some(2.0))).await.unwrap();

    let deleted = store.prune_history(TimeDelta::days(7)).await.unwrap();
    assert_eq!(deleted, 1);
    let left = store
        .get_hashrate_history(Some("a"), now - TimeDelta::days(30))
        .await
        .unwrap();
    assert_eq!(left.len(), 1);
    assert_eq!(left[0].current, 2.0);
    // Miner rows are never pruned.
    assert!(store.get_miner("a").await.unwrap().is_some());
}

#[tokio::test]
async fn prune_with_retention_past_earliest_time_deletes_nothing() {
    let (_dir, store) = temp_store().await;
    store.upsert_miner(&report("a", Some(1.0))).await.unwrap();
    let deleted = store
        .prune_history(TimeDelta::days(365 * 1_000_000))
        .await
        .unwrap();
    assert_eq!(deleted, 0);
    let left = store
        .get_hashrate_history(Some("a"), Utc::now() - TimeDelta::hours(1))
        .await
        .unwrap();
    assert_eq!(left.len(), 1);
}

#[tokio::test]
async fn identical_report_twice_gives_one_row_two_samples() {
    let (_dir, store) = temp_store().await;
    let r = report("abc", Some(1000.0));
    store.upsert_miner(&r).await.unwrap();
    store.upsert_miner(&r).await.unwrap();

    let miners = store.get_miners().await.unwrap();
    assert_eq!(miners.len(), 1);
    assert_eq!(miners[0].id, "abc");
    assert_eq!(miners[0].hostname, r.hostname);

    let samples = store
        .get_hashrate_history(Some("abc"), Utc::now() - TimeDelta::hours(1))
        .await
        .unwrap();
    assert_eq!(samples.len(), 2);
    assert!(samples.iter().all(|s| s.current == 1000.0 && s.max == 1050.0));
    assert!(samples[0].timestamp <= samples[1].timestamp);
}

#[tokio::test]
async fn overview_counts_online_only() {
    let (_dir, store) = temp_store().await;
    let now = Utc::now();
    store.upsert_miner(&report("a", Some(1000.0))).await.unwrap();
    store.upsert_miner(&report("b", Some(500.0))).await.unwrap();
    store
        .upsert_miner_at(&report("c", Some(9000.0)), now - TimeDelta::seconds(400))
        .await
        .unwrap();

    let o = store.get_overview().await.unwrap();
    assert_eq!(o.total_miners, 3);
    assert_eq!(o.active_miners, 2);
    assert_eq!(o.total_hashrate, 1500.0);
    assert_eq!(o.average_hashrate, 1460.0);
    assert_eq!(o.top_miners[0].id, "c");
    assert_eq!(o.top_miners.len(), 3);
}

#[tokio::test]
async fn overview_of_empty_fleet() {
    let (_dir, store) = temp_store().await;
    let o = store.get_overview().await.unwrap();
    assert_eq!(o.total_miners, 0);
    assert_eq!(o.active_miners, 0);
    assert_eq!(o.total_hashrate, 0.0);
    assert!(o.top_miners.is_empty());
}

#[tokio::test]
async fn data_survives_reopen() {
    let dir = tempfile::TempDir::new().unwrap();
    let path = dir.path().join("nested").join("fleet.db");
    let path = path.to_str().unwrap();
    {
        let store = Store::connect(path, 2).await.unwrap();
        store.init().await.unwrap();
        store.upsert_miner(&report("rig-1", Some(1.0))).await.unwrap();
        store
            .set_config_override("rig-1", &doc(json!({"cpu": {}})))
            .await
            .unwrap();
    }
    let store = Store::connect(path, 2).await.unwrap();
    store.init().await.unwrap();
    assert_eq!(store.get_miners().await.unwrap().len(), 1);
    assert!(store.get_config_override("rig-1").await.unwrap().is_some());
}

#[tokio::test]
async fn concurrent_reports_from_many_miners() {
    let (_dir, store) = temp_store().await;
    let mut handles = Vec::new();
    for i in 0..20 {
        let store = store.clone();
        handles.push(tokio::spawn(async move {
            store
                .upsert_miner(&report(&format!("rig-{i}"), Some(f64::from(i))))
                .await
                .unwrap();
        }));
    }
    for h in handles {
        h.await.unwrap();
    }
    assert_eq!(store.get_miners().await.unwrap().len(), 20);
    assert_eq!(store.get_overview().await.unwrap().active_miners, 20);
}
