//! Degraded-mode coordinator for two-node clusters
//!
//! Wraps a [`DcsStore`] and keeps the HA loop running when the DCS servers
//! are reachable but have lost quorum ("no cluster leader"). In that case the
//! coordinator switches to static mode and serves the cluster from the last
//! snapshot it saw, letting this node take the leader key locally. This is
//! only safe when the cluster has exactly two members: the node that still
//! reaches its DCS server is the only one that can be running.
//!
//! # State machine
//!
//! ```text
//!                 reload: no cluster leader
//!                 (cached leader cleared)
//!   ┌────────┐ ─────────────────────────────▶ ┌────────┐
//!   │ normal │                                │ static │ ◀─┐ reload: no cluster leader
//!   └────────┘ ◀───────────────────────────── └────────┘ ──┘ (cache returned as is)
//!                 reload: cluster loaded
//!                 (leader cleared once, re-acquire)
//! ```
//!
//! Connectivity errors never change the mode and are always returned to the
//! caller. Only quorum loss is absorbed.

use std::time::{Duration, Instant};

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde_json::Value;
use tokio::sync::Mutex;

use super::delegate::{delegate_or_noop, delegate_or_swallow_quorum_loss};
use super::mode::Mode;
use crate::common::metrics::METRICS;
use crate::common::{Config, Error, Result};
use crate::dcs::{
    Cluster, DcsStore, Leader, Member, ServiceRegistration, SyncState, TimelineHistory,
    STATIC_LEADER_INDEX, STATIC_NODE_INDEX,
};

/// Members the static-mode takeover is safe for.
pub const TWO_NODE_MEMBERS: usize = 2;

#[derive(Debug, Default)]
struct State {
    mode: Mode,
    /// Last snapshot loaded from, or synthesized for, the DCS
    cluster: Cluster,
    static_since: Option<DateTime<Utc>>,
}

/// Degraded-mode coordinator
pub struct Coordinator<S> {
    store: S,
    name: String,
    enabled: bool,
    state: Mutex<State>,
}

impl<S: DcsStore> Coordinator<S> {
    /// Wrap `store` for node `name`. With `enabled == false` every call is
    /// passed through untouched.
    pub fn new(store: S, name: impl Into<String>, enabled: bool) -> Self {
        Self {
            store,
            name: name.into(),
            enabled,
            state: Mutex::new(State::default()),
        }
    }

    pub fn from_config(store: S, config: &Config) -> Self {
        Self::new(store, config.name.clone(), config.two_node.enabled)
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn store(&self) -> &S {
        &self.store
    }

    pub fn is_enabled(&self) -> bool {
        self.enabled
    }

    pub async fn mode(&self) -> Mode {
        self.state.lock().await.mode
    }

    /// The snapshot served while in static mode.
    pub async fn cached_cluster(&self) -> Cluster {
        self.state.lock().await.cluster.clone()
    }

    pub async fn static_since(&self) -> Option<DateTime<Utc>> {
        self.state.lock().await.static_since
    }

    fn log_invocation(&self, op: &str, mode: Mode) {
        tracing::debug!("{}, static: {}", op, mode.is_static());
    }

    async fn reload(&self, state: &mut State) -> Result<Option<Cluster>> {
        match self.store.load_cluster().await {
            Ok(Some(cluster)) => {
                let was_static = state.mode.is_static();
                state.cluster = cluster.clone();
                if !was_static {
                    return Ok(Some(cluster));
                }

                self.leave_static_mode(state);
                match self.acquire_leader(state, false).await {
                    Ok(acquired) => tracing::info!(
                        "{}: leader key {} after DCS recovery",
                        self.name,
                        if acquired { "acquired" } else { "not acquired" }
                    ),
                    Err(e) => tracing::warn!(
                        "{}: failed to acquire leader key after DCS recovery: {}",
                        self.name,
                        e
                    ),
                }
                // Report no leader for one cycle so every node runs a fresh
                // election against the recovered DCS.
                Ok(Some(cluster.without_leader()))
            }
            Ok(None) => Ok(None),
            Err(Error::QuorumLoss(reason)) => {
                if !state.mode.is_static() {
                    self.enter_static_mode(state, &reason);
                }
                Ok(Some(state.cluster.clone()))
            }
            Err(e) => Err(e),
        }
    }

    fn enter_static_mode(&self, state: &mut State, reason: &str) {
        let members = state.cluster.members.len();
        if members > TWO_NODE_MEMBERS {
            tracing::error!(
                "{}: entering static mode with {} members; only {} are safe",
                self.name,
                members,
                TWO_NODE_MEMBERS
            );
        }

        // TODO: keep the cached leader if it is this node, instead of forcing
        // a re-acquire through the HA loop.
        state.cluster = state.cluster.without_leader();
        state.mode = Mode::Static;
        state.static_since = Some(Utc::now());
        METRICS.record_static_mode(&self.name, true);
        tracing::warn!("{}: {}, entering static mode", self.name, reason);
    }

    fn leave_static_mode(&self, state: &mut State) {
        let duration = state
            .static_since
            .take()
            .map(|since| (Utc::now() - since).to_std().unwrap_or(Duration::ZERO))
            .unwrap_or_default();
        state.mode = Mode::Normal;
        METRICS.record_static_mode(&self.name, false);
        tracing::info!(
            "{}: DCS back online, leaving static mode after {:?}",
            self.name,
            duration
        );
    }

    async fn acquire_leader(&self, state: &mut State, permanent: bool) -> Result<bool> {
        if !state.mode.is_static() {
            return delegate_or_swallow_quorum_loss(
                "attempt_to_acquire_leader",
                self.store.attempt_to_acquire_leader(permanent),
            )
            .await;
        }

        if state.cluster.has_leader(&self.name) {
            return Ok(true);
        }

        let member = state
            .cluster
            .get_member(&self.name)
            .cloned()
            .unwrap_or_else(|| Member::placeholder(self.name.as_str()));
        let leader = Leader::new(STATIC_LEADER_INDEX, self.store.session_id(), member);
        state.cluster = state.cluster.with_leader(Some(leader));
        METRICS.static_leader_acquired.inc();
        tracing::info!("{}: took the leader key in static mode", self.name);
        Ok(true)
    }

    /// Static mode rewrites one field of the cached snapshot; normal mode delegates.
    async fn write_cached_or_delegate<F>(
        &self,
        op: &'static str,
        call: F,
        rewrite: impl FnOnce(&Cluster) -> Cluster,
    ) -> Result<bool>
    where
        F: std::future::Future<Output = Result<bool>>,
    {
        if !self.enabled {
            return call.await;
        }
        let mut state = self.state.lock().await;
        self.log_invocation(op, state.mode);
        if state.mode.is_static() {
            state.cluster = rewrite(&state.cluster);
            return Ok(true);
        }
        delegate_or_swallow_quorum_loss(op, call).await
    }

    /// Bookkeeping writes that have no meaning without a real DCS.
    async fn housekeeping<F>(&self, op: &'static str, call: F) -> Result<bool>
    where
        F: std::future::Future<Output = Result<bool>>,
    {
        if !self.enabled {
            return call.await;
        }
        let state = self.state.lock().await;
        self.log_invocation(op, state.mode);
        delegate_or_noop(state.mode, op, call).await
    }
}

#[async_trait]
impl<S: DcsStore> DcsStore for Coordinator<S> {
    fn session_id(&self) -> Option<String> {
        self.store.session_id()
    }

    async fn load_cluster(&self) -> Result<Option<Cluster>> {
        if !self.enabled {
            return self.store.load_cluster().await;
        }
        let mut state = self.state.lock().await;
        self.log_invocation("load_cluster", state.mode);

        let started = Instant::now();
        let result = self.reload(&mut state).await;
        METRICS.record_reload(started.elapsed(), result.is_ok());
        result
    }

    async fn attempt_to_acquire_leader(&self, permanent: bool) -> Result<bool> {
        if !self.enabled {
            return self.store.attempt_to_acquire_leader(permanent).await;
        }
        let mut state = self.state.lock().await;
        self.log_invocation("attempt_to_acquire_leader", state.mode);
        self.acquire_leader(&mut state, permanent).await
    }

    async fn write_leader_optime(&self, last_operation: u64) -> Result<bool> {
        self.write_cached_or_delegate(
            "write_leader_optime",
            self.store.write_leader_optime(last_operation),
            |c| c.with_last_leader_operation(last_operation),
        )
        .await
    }

    async fn set_history_value(&self, value: &str) -> Result<bool> {
        self.write_cached_or_delegate(
            "set_history_value",
            self.store.set_history_value(value),
            |c| c.with_history(Some(TimelineHistory::from_node(STATIC_NODE_INDEX, value))),
        )
        .await
    }

    async fn set_sync_state_value(&self, value: &str, index: Option<i64>) -> Result<bool> {
        self.write_cached_or_delegate(
            "set_sync_state_value",
            self.store.set_sync_state_value(value, index),
            |c| c.with_sync(SyncState::from_node(STATIC_NODE_INDEX, value)),
        )
        .await
    }

    async fn delete_sync_state(&self, index: Option<i64>) -> Result<bool> {
        self.housekeeping("delete_sync_state", self.store.delete_sync_state(index))
            .await
    }

    async fn touch_member(&self, data: &Value, permanent: bool) -> Result<bool> {
        self.housekeeping("touch_member", self.store.touch_member(data, permanent))
            .await
    }

    async fn create_session(&self) -> Result<bool> {
        self.housekeeping("create_session", self.store.create_session())
            .await
    }

    async fn refresh_session(&self) -> Result<bool> {
        self.housekeeping("refresh_session", self.store.refresh_session())
            .await
    }

    async fn update_leader(&self) -> Result<bool> {
        self.housekeeping("update_leader", self.store.update_leader())
            .await
    }

    async fn register_service(&self, service: &ServiceRegistration) -> Result<bool> {
        self.housekeeping("register_service", self.store.register_service(service))
            .await
    }

    async fn deregister_service(&self, service_id: &str) -> Result<bool> {
        self.housekeeping("deregister_service", self.store.deregister_service(service_id))
            .await
    }

    async fn update_service(&self, data: &Value) -> Result<bool> {
        self.housekeeping("update_service", self.store.update_service(data))
            .await
    }

    /// Never blocks: the HA loop falls back to polling `load_cluster`, the
    /// only path that notices mode changes.
    async fn watch(&self, leader_index: Option<i64>, timeout: Duration) -> Result<bool> {
        if !self.enabled {
            return self.store.watch(leader_index, timeout).await;
        }
        let mode = self.state.lock().await.mode;
        self.log_invocation("watch", mode);
        Ok(true)
    }
}
