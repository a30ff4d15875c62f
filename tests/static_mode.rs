//! Static mode: entering, serving from cache, leaving

use dcs2node::dcs::memory::{MemoryBackend, MemoryClient, StoreHealth};
use dcs2node::dcs::{ServiceRegistration, STATIC_LEADER_INDEX, STATIC_NODE_INDEX};
use dcs2node::{Cluster, Coordinator, DcsStore, Mode};
use serde_json::json;
use std::time::Duration;

/// node-a holds the leader key, node-b runs the coordinator.
async fn setup() -> (MemoryBackend, MemoryClient, Coordinator<MemoryClient>) {
    let backend = MemoryBackend::new();
    backend.initialize("6970123456789");

    let a = backend.client("node-a");
    a.touch_member(&json!({"role": "master", "state": "running"}), false)
        .await
        .unwrap();
    assert!(a.attempt_to_acquire_leader(false).await.unwrap());
    a.write_leader_optime(1000).await.unwrap();
    a.set_history_value("[[1, 1000, \"no recovery target specified\"]]")
        .await
        .unwrap();

    let b = Coordinator::new(backend.client("node-b"), "node-b", true);
    b.touch_member(&json!({"role": "replica", "state": "running"}), false)
        .await
        .unwrap();
    (backend, a, b)
}

async fn enter_static(b: &Coordinator<MemoryClient>) -> Cluster {
    b.load_cluster().await.unwrap();
    b.store().set_health(StoreHealth::NoQuorum);
    let cluster = b.load_cluster().await.unwrap().unwrap();
    assert_eq!(b.mode().await, Mode::Static);
    cluster
}

#[tokio::test]
async fn test_quorum_loss_enters_static_with_leader_cleared() {
    let (backend, _a, b) = setup().await;
    let before = b.load_cluster().await.unwrap().unwrap();
    assert!(before.has_leader("node-a"));

    b.store().set_health(StoreHealth::NoQuorum);
    let cluster = b.load_cluster().await.unwrap().unwrap();

    assert!(cluster.is_unlocked());
    assert_eq!(cluster, before.without_leader());
    assert_eq!(b.cached_cluster().await, cluster);
    // the store itself is untouched
    assert!(backend.cluster().unwrap().has_leader("node-a"));
}

#[tokio::test]
async fn test_repeated_quorum_loss_returns_cache_unchanged() {
    let (_backend, _a, b) = setup().await;
    let first = enter_static(&b).await;

    for _ in 0..3 {
        let again = b.load_cluster().await.unwrap().unwrap();
        assert_eq!(again, first);
        assert_eq!(b.cached_cluster().await, first);
        assert_eq!(b.mode().await, Mode::Static);
    }
}

#[tokio::test]
async fn test_static_acquire_is_idempotent() {
    let (_backend, _a, b) = setup().await;
    enter_static(&b).await;
    b.store().clear_calls();

    assert!(b.attempt_to_acquire_leader(false).await.unwrap());
    let first = b.cached_cluster().await;
    assert!(first.has_leader("node-b"));
    assert_eq!(first.leader.as_ref().unwrap().index, STATIC_LEADER_INDEX);

    assert!(b.attempt_to_acquire_leader(true).await.unwrap());
    assert_eq!(b.cached_cluster().await, first);

    // the leader key lives in the cache only
    assert!(b.store().calls().is_empty());
}

#[tokio::test]
async fn test_static_leader_survives_reloads() {
    let (_backend, _a, b) = setup().await;
    enter_static(&b).await;
    b.attempt_to_acquire_leader(false).await.unwrap();

    let cluster = b.load_cluster().await.unwrap().unwrap();
    assert!(cluster.has_leader("node-b"));
}

#[tokio::test]
async fn test_housekeeping_is_noop_in_static_mode() {
    let (_backend, _a, b) = setup().await;
    enter_static(&b).await;
    let before = b.cached_cluster().await;
    b.store().clear_calls();

    let service = ServiceRegistration {
        name: "postgres".into(),
        service_id: "postgres/node-b".into(),
        address: "10.0.0.2".into(),
        port: 5432,
        tags: vec!["master".into()],
        check_ttl: None,
    };
    assert!(b.touch_member(&json!({"role": "master"}), false).await.unwrap());
    assert!(b.create_session().await.unwrap());
    assert!(b.refresh_session().await.unwrap());
    assert!(b.update_leader().await.unwrap());
    assert!(b.register_service(&service).await.unwrap());
    assert!(b.deregister_service("postgres/node-b").await.unwrap());
    assert!(b.update_service(&json!({"role": "master"})).await.unwrap());
    assert!(b.delete_sync_state(Some(7)).await.unwrap());
    assert!(b.watch(Some(3), Duration::from_secs(10)).await.unwrap());

    assert_eq!(b.cached_cluster().await, before);
    assert!(b.store().calls().is_empty());
}

#[tokio::test]
async fn test_cache_mutators_change_exactly_one_field() {
    let (_backend, _a, b) = setup().await;
    enter_static(&b).await;
    b.store().clear_calls();

    let before = b.cached_cluster().await;
    assert!(b
        .set_history_value("[[1, 1000, \"r\"], [2, 2000, \"r\"]]")
        .await
        .unwrap());
    let after = b.cached_cluster().await;
    let history = after.history.clone().unwrap();
    assert_eq!(history.index, STATIC_NODE_INDEX);
    assert_eq!(history.lines.len(), 2);
    assert_eq!(after.with_history(before.history.clone()), before);

    let before = after;
    assert!(b
        .set_sync_state_value(r#"{"leader":"node-b","sync_standby":null}"#, Some(4))
        .await
        .unwrap());
    let after = b.cached_cluster().await;
    assert_eq!(after.sync.index, STATIC_NODE_INDEX);
    assert_eq!(after.sync.leader.as_deref(), Some("node-b"));
    assert_eq!(after.with_sync(before.sync.clone()), before);

    let before = after;
    assert!(b.write_leader_optime(5000).await.unwrap());
    let after = b.cached_cluster().await;
    assert_eq!(after.last_leader_operation, 5000);
    assert_eq!(after.with_last_leader_operation(before.last_leader_operation), before);

    assert!(b.store().calls().is_empty());
}

#[tokio::test]
async fn test_recovery_clears_stale_leader_and_reacquires() {
    let (backend, _a, b) = setup().await;
    enter_static(&b).await;
    b.attempt_to_acquire_leader(false).await.unwrap();
    assert!(b.cached_cluster().await.has_leader("node-b"));

    // DCS recovers still reporting node-a as leader
    b.store().set_health(StoreHealth::Healthy);
    b.store().clear_calls();
    let stale = backend.cluster().unwrap();
    assert!(stale.has_leader("node-a"));

    let cluster = b.load_cluster().await.unwrap().unwrap();
    assert!(cluster.is_unlocked());
    assert_eq!(cluster, stale.without_leader());
    assert_eq!(b.mode().await, Mode::Normal);
    assert!(b.static_since().await.is_none());
    assert_eq!(
        b.store().calls(),
        vec!["load_cluster", "attempt_to_acquire_leader"]
    );
    // the cache holds what the store returned, leader included
    assert_eq!(b.cached_cluster().await, stale);

    // only one cycle is leaderless
    let next = b.load_cluster().await.unwrap().unwrap();
    assert!(next.has_leader("node-a"));
}

#[tokio::test]
async fn test_recovery_takes_free_leader_key() {
    let (backend, _a, b) = setup().await;
    enter_static(&b).await;
    b.attempt_to_acquire_leader(false).await.unwrap();

    backend.expire_session("node-a");
    b.store().set_health(StoreHealth::Healthy);

    let cluster = b.load_cluster().await.unwrap().unwrap();
    assert!(cluster.is_unlocked());
    assert!(backend.cluster().unwrap().has_leader("node-b"));
    assert!(b.load_cluster().await.unwrap().unwrap().has_leader("node-b"));
}

#[tokio::test]
async fn test_uninitialized_cluster_is_returned_as_is() {
    let backend = MemoryBackend::new();
    let b = Coordinator::new(backend.client("node-b"), "node-b", true);
    assert!(b.load_cluster().await.unwrap().is_none());
    assert_eq!(b.mode().await, Mode::Normal);
}

#[tokio::test]
async fn test_watch_never_reaches_the_store() {
    let (_backend, _a, b) = setup().await;
    b.store().clear_calls();

    assert!(b.watch(Some(1), Duration::from_secs(30)).await.unwrap());
    enter_static(&b).await;
    assert!(b.watch(Some(1), Duration::from_secs(30)).await.unwrap());

    assert!(!b.store().calls().iter().any(|c| c == "watch"));
}
