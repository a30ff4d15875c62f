//! DCS-facing types: the cluster snapshot and the store adapter interface
//!
//! - `cluster`: immutable cluster snapshot and its records
//! - `store`: the adapter trait every store client implements
//! - `memory`: in-memory store used by tests and `dcs2node simulate`

pub mod cluster;
pub mod memory;
pub mod store;

pub use cluster::{
    Cluster, ClusterConfig, Failover, Leader, Member, SyncState, TimelineHistory,
    PLACEHOLDER_MEMBER_INDEX, STATIC_LEADER_INDEX, STATIC_NODE_INDEX,
};
pub use store::{DcsStore, ServiceRegistration};
