//! Consensus store adapter interface.
//!
//! This is the seam between the HA control loop and whatever talks to the
//! real DCS. Implementations:
//!
//! - [`MemoryClient`](super::memory::MemoryClient): in-memory store for tests and simulation
//! - [`Coordinator`](crate::coordinator::Coordinator): wraps another store and absorbs quorum loss
//!
//! Every call may fail with [`Error::QuorumLoss`](crate::Error::QuorumLoss) when
//! the store is reachable but has no elected leader, or with a connectivity
//! error when it cannot be reached at all.

use std::time::Duration;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use serde_json::Value;

use super::cluster::Cluster;
use crate::common::Result;

/// A discoverable service entry registered alongside the member.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ServiceRegistration {
    pub name: String,
    pub service_id: String,
    pub address: String,
    pub port: u16,
    #[serde(default)]
    pub tags: Vec<String>,
    /// TTL health check interval, if any
    #[serde(default)]
    pub check_ttl: Option<String>,
}

#[async_trait]
pub trait DcsStore: Send + Sync {
    /// Session currently held with the store, if any.
    fn session_id(&self) -> Option<String> {
        None
    }

    /// Read the whole cluster. `None` means the cluster was never initialized.
    async fn load_cluster(&self) -> Result<Option<Cluster>>;

    /// Try to take (or keep) the leader key.
    async fn attempt_to_acquire_leader(&self, permanent: bool) -> Result<bool>;

    /// Publish the leader's last WAL position.
    async fn write_leader_optime(&self, last_operation: u64) -> Result<bool>;

    async fn set_history_value(&self, value: &str) -> Result<bool>;

    /// Write the sync state; with `index`, only if it still matches.
    async fn set_sync_state_value(&self, value: &str, index: Option<i64>) -> Result<bool>;

    async fn delete_sync_state(&self, index: Option<i64>) -> Result<bool>;

    async fn touch_member(&self, data: &Value, permanent: bool) -> Result<bool>;

    async fn create_session(&self) -> Result<bool>;

    async fn refresh_session(&self) -> Result<bool>;

    /// Renew the leader key held by this node.
    async fn update_leader(&self) -> Result<bool>;

    async fn register_service(&self, service: &ServiceRegistration) -> Result<bool>;

    async fn deregister_service(&self, service_id: &str) -> Result<bool>;

    async fn update_service(&self, data: &Value) -> Result<bool>;

    /// Block until the leader key changes or `timeout` elapses.
    async fn watch(&self, leader_index: Option<i64>, timeout: Duration) -> Result<bool>;
}
