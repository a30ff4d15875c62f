//! In-memory DCS for testing and simulation.
//!
//! [`MemoryBackend`] stands in for the consensus store servers and holds the
//! shared cluster state. Each node talks to it through its own
//! [`MemoryClient`], which models that node's local store server: it can be
//! healthy, reachable without quorum, or unreachable.
//!
//! ```rust,no_run
//! use dcs2node::dcs::memory::{MemoryBackend, StoreHealth};
//!
//! let backend = MemoryBackend::new();
//! backend.initialize("6970123456789");
//! let node1 = backend.client("node1");
//! let node2 = backend.client("node2");
//!
//! // node1's store server dies, node2's server is left without a quorum
//! node1.set_health(StoreHealth::Unreachable);
//! node2.set_health(StoreHealth::NoQuorum);
//! ```

use std::collections::BTreeMap;
use std::sync::{Arc, Mutex, MutexGuard};
use std::time::Duration;

use async_trait::async_trait;
use serde_json::Value;

use super::cluster::{Cluster, Leader, Member, SyncState, TimelineHistory};
use super::store::{DcsStore, ServiceRegistration};
use crate::common::{Error, Result};

/// Error text the store returns when its servers have no elected leader.
pub const NO_CLUSTER_LEADER: &str = "Unexpected response code: 500 (No cluster leader)";

fn lock<T>(m: &Mutex<T>) -> MutexGuard<'_, T> {
    m.lock().unwrap_or_else(|e| e.into_inner())
}

/// Health of one node's local store server
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StoreHealth {
    Healthy,
    /// Reachable, but the servers cannot elect a leader
    NoQuorum,
    Unreachable,
}

impl std::fmt::Display for StoreHealth {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            StoreHealth::Healthy => write!(f, "healthy"),
            StoreHealth::NoQuorum => write!(f, "no-quorum"),
            StoreHealth::Unreachable => write!(f, "unreachable"),
        }
    }
}

#[derive(Debug, Default)]
struct BackendState {
    cluster: Option<Cluster>,
    services: BTreeMap<String, ServiceRegistration>,
    service_data: BTreeMap<String, Value>,
    /// Modify index handed out to every write
    next_index: i64,
}

impl BackendState {
    fn bump(&mut self) -> i64 {
        self.next_index += 1;
        self.next_index
    }

    fn cluster_mut(&mut self) -> &mut Cluster {
        self.cluster.get_or_insert_with(Cluster::empty)
    }
}

/// Shared cluster state
#[derive(Debug, Clone, Default)]
pub struct MemoryBackend {
    state: Arc<Mutex<BackendState>>,
}

impl MemoryBackend {
    pub fn new() -> Self {
        Self::default()
    }

    /// Mark the cluster as bootstrapped.
    pub fn initialize(&self, system_id: impl Into<String>) {
        let mut state = lock(&self.state);
        let cluster = state.cluster_mut();
        cluster.initialize = Some(system_id.into());
    }

    pub fn client(&self, name: impl Into<String>) -> MemoryClient {
        MemoryClient {
            name: name.into(),
            backend: self.clone(),
            health: Mutex::new(StoreHealth::Healthy),
            session: Mutex::new(None),
            calls: Mutex::new(Vec::new()),
        }
    }

    pub fn cluster(&self) -> Option<Cluster> {
        lock(&self.state).cluster.clone()
    }

    pub fn set_cluster(&self, cluster: Option<Cluster>) {
        lock(&self.state).cluster = cluster;
    }

    /// Drop the leader key and session of `name`, as a session TTL expiry would.
    pub fn expire_session(&self, name: &str) {
        let mut state = lock(&self.state);
        if let Some(cluster) = state.cluster.as_mut() {
            if cluster.has_leader(name) {
                *cluster = cluster.without_leader();
            }
            for member in cluster.members.iter_mut().filter(|m| m.name == name) {
                member.session = None;
            }
        }
    }

    pub fn services(&self) -> Vec<ServiceRegistration> {
        lock(&self.state).services.values().cloned().collect()
    }

    pub fn service_data(&self, name: &str) -> Option<Value> {
        lock(&self.state).service_data.get(name).cloned()
    }
}

/// One node's connection to the in-memory DCS
#[derive(Debug)]
pub struct MemoryClient {
    name: String,
    backend: MemoryBackend,
    health: Mutex<StoreHealth>,
    session: Mutex<Option<String>>,
    calls: Mutex<Vec<String>>,
}

impl MemoryClient {
    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn backend(&self) -> &MemoryBackend {
        &self.backend
    }

    pub fn health(&self) -> StoreHealth {
        *lock(&self.health)
    }

    pub fn set_health(&self, health: StoreHealth) {
        tracing::debug!("{}: store health -> {}", self.name, health);
        *lock(&self.health) = health;
    }

    /// Names of the operations that reached this client, in order.
    pub fn calls(&self) -> Vec<String> {
        lock(&self.calls).clone()
    }

    pub fn clear_calls(&self) {
        lock(&self.calls).clear();
    }

    fn enter(&self, op: &str) -> Result<()> {
        lock(&self.calls).push(op.to_string());
        match self.health() {
            StoreHealth::Healthy => Ok(()),
            StoreHealth::NoQuorum => Err(Error::QuorumLoss(NO_CLUSTER_LEADER.to_string())),
            StoreHealth::Unreachable => Err(Error::ConnectionFailed(format!(
                "{}: local store server is unreachable",
                self.name
            ))),
        }
    }

    fn ensure_session(&self) -> String {
        lock(&self.session)
            .get_or_insert_with(|| uuid::Uuid::new_v4().to_string())
            .clone()
    }

    fn sync_index_matches(cluster: &Cluster, index: Option<i64>) -> bool {
        index.map_or(true, |i| cluster.sync.index == i)
    }
}

#[async_trait]
impl DcsStore for MemoryClient {
    fn session_id(&self) -> Option<String> {
        lock(&self.session).clone()
    }

    async fn load_cluster(&self) -> Result<Option<Cluster>> {
        self.enter("load_cluster")?;
        Ok(self.backend.cluster())
    }

    async fn attempt_to_acquire_leader(&self, _permanent: bool) -> Result<bool> {
        self.enter("attempt_to_acquire_leader")?;
        let session = self.ensure_session();

        let mut state = lock(&self.backend.state);
        let index = state.bump();
        let cluster = state.cluster_mut();
        if cluster.leader_name().is_some_and(|holder| holder != self.name) {
            return Ok(false);
        }
        let member = cluster
            .get_member(&self.name)
            .cloned()
            .unwrap_or_else(|| Member::placeholder(self.name.clone()));
        *cluster = cluster.with_leader(Some(Leader::new(index, Some(session), member)));
        Ok(true)
    }

    async fn write_leader_optime(&self, last_operation: u64) -> Result<bool> {
        self.enter("write_leader_optime")?;
        let mut state = lock(&self.backend.state);
        let cluster = state.cluster_mut();
        *cluster = cluster.with_last_leader_operation(last_operation);
        Ok(true)
    }

    async fn set_history_value(&self, value: &str) -> Result<bool> {
        self.enter("set_history_value")?;
        let mut state = lock(&self.backend.state);
        let index = state.bump();
        let cluster = state.cluster_mut();
        *cluster = cluster.with_history(Some(TimelineHistory::from_node(index, value)));
        Ok(true)
    }

    async fn set_sync_state_value(&self, value: &str, index: Option<i64>) -> Result<bool> {
        self.enter("set_sync_state_value")?;
        let mut state = lock(&self.backend.state);
        let next = state.bump();
        let cluster = state.cluster_mut();
        if !Self::sync_index_matches(cluster, index) {
            return Ok(false);
        }
        *cluster = cluster.with_sync(SyncState::from_node(next, value));
        Ok(true)
    }

    async fn delete_sync_state(&self, index: Option<i64>) -> Result<bool> {
        self.enter("delete_sync_state")?;
        let mut state = lock(&self.backend.state);
        let cluster = state.cluster_mut();
        if !Self::sync_index_matches(cluster, index) {
            return Ok(false);
        }
        *cluster = cluster.with_sync(SyncState::default());
        Ok(true)
    }

    async fn touch_member(&self, data: &Value, _permanent: bool) -> Result<bool> {
        self.enter("touch_member")?;
        let session = self.ensure_session();

        let mut state = lock(&self.backend.state);
        let index = state.bump();
        let cluster = state.cluster_mut();
        let member = Member::new(index, self.name.clone(), Some(session), data.clone());
        match cluster.members.iter_mut().find(|m| m.name == self.name) {
            Some(existing) => *existing = member,
            None => cluster.members.push(member),
        }
        Ok(true)
    }

    async fn create_session(&self) -> Result<bool> {
        self.enter("create_session")?;
        *lock(&self.session) = Some(uuid::Uuid::new_v4().to_string());
        Ok(true)
    }

    async fn refresh_session(&self) -> Result<bool> {
        self.enter("refresh_session")?;
        self.ensure_session();
        Ok(true)
    }

    async fn update_leader(&self) -> Result<bool> {
        self.enter("update_leader")?;
        let state = lock(&self.backend.state);
        Ok(state
            .cluster
            .as_ref()
            .is_some_and(|c| c.has_leader(&self.name)))
    }

    async fn register_service(&self, service: &ServiceRegistration) -> Result<bool> {
        self.enter("register_service")?;
        lock(&self.backend.state)
            .services
            .insert(service.service_id.clone(), service.clone());
        Ok(true)
    }

    async fn deregister_service(&self, service_id: &str) -> Result<bool> {
        self.enter("deregister_service")?;
        Ok(lock(&self.backend.state)
            .services
            .remove(service_id)
            .is_some())
    }

    async fn update_service(&self, data: &Value) -> Result<bool> {
        self.enter("update_service")?;
        lock(&self.backend.state)
            .service_data
            .insert(self.name.clone(), data.clone());
        Ok(true)
    }

    async fn watch(&self, _leader_index: Option<i64>, _timeout: Duration) -> Result<bool> {
        self.enter("watch")?;
        Ok(false)
    }
}
