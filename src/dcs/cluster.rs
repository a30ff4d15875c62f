//! Cluster snapshot as observed in the DCS
//!
//! A [`Cluster`] is a value: it is never mutated in place. The `with_*`
//! setters return a copy with exactly one field replaced, so a reader holding
//! a snapshot never sees a partially applied update.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::Value;

/// Index used for the synthetic member of a node missing from the member list.
pub const PLACEHOLDER_MEMBER_INDEX: i64 = -1;

/// Index of a leader record asserted without a DCS lease.
pub const STATIC_LEADER_INDEX: i64 = 0;

/// Index of history and sync-state records written to the cached snapshot.
pub const STATIC_NODE_INDEX: i64 = -1;

/// A cluster member registered in the DCS
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Member {
    pub index: i64,
    pub name: String,
    pub session: Option<String>,
    pub data: Value,
}

impl Member {
    pub fn new(index: i64, name: impl Into<String>, session: Option<String>, data: Value) -> Self {
        Self {
            index,
            name: name.into(),
            session,
            data,
        }
    }

    /// Stand-in member for a node that has no entry in the member list.
    pub fn placeholder(name: impl Into<String>) -> Self {
        Self::new(
            PLACEHOLDER_MEMBER_INDEX,
            name,
            None,
            Value::Object(Default::default()),
        )
    }

    fn data_str(&self, key: &str) -> Option<&str> {
        self.data.get(key).and_then(Value::as_str)
    }

    pub fn role(&self) -> Option<&str> {
        self.data_str("role")
    }

    pub fn state(&self) -> Option<&str> {
        self.data_str("state")
    }

    pub fn conn_url(&self) -> Option<&str> {
        self.data_str("conn_url")
    }
}

/// The leader key: who holds it, under which session
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Leader {
    pub index: i64,
    pub session: Option<String>,
    pub member: Member,
}

impl Leader {
    pub fn new(index: i64, session: Option<String>, member: Member) -> Self {
        Self {
            index,
            session,
            member,
        }
    }

    pub fn name(&self) -> &str {
        &self.member.name
    }
}

/// Cluster-wide dynamic configuration, opaque to this crate
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ClusterConfig {
    pub index: i64,
    pub data: Value,
}

/// Pending manual failover or switchover request
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
pub struct Failover {
    pub index: i64,
    pub leader: Option<String>,
    pub candidate: Option<String>,
    pub scheduled_at: Option<DateTime<Utc>>,
}

#[derive(Deserialize)]
struct FailoverValue {
    leader: Option<String>,
    #[serde(alias = "member")]
    candidate: Option<String>,
    scheduled_at: Option<DateTime<Utc>>,
}

impl Failover {
    /// Parse the stored failover value. Anything unparsable means "no request".
    pub fn from_node(index: i64, value: &str) -> Option<Self> {
        let parsed: FailoverValue = serde_json::from_str(value).ok()?;
        if parsed.leader.is_none() && parsed.candidate.is_none() {
            return None;
        }
        Some(Self {
            index,
            leader: parsed.leader,
            candidate: parsed.candidate,
            scheduled_at: parsed.scheduled_at,
        })
    }
}

/// Synchronous replication state
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct SyncState {
    pub index: i64,
    pub leader: Option<String>,
    pub sync_standby: Option<String>,
}

#[derive(Deserialize)]
struct SyncStateValue {
    leader: Option<String>,
    sync_standby: Option<String>,
}

impl SyncState {
    /// Parse the stored sync value. An empty or malformed value yields an empty state.
    pub fn from_node(index: i64, value: &str) -> Self {
        match serde_json::from_str::<SyncStateValue>(value) {
            Ok(v) => Self {
                index,
                leader: v.leader,
                sync_standby: v.sync_standby,
            },
            Err(_) => Self {
                index,
                ..Default::default()
            },
        }
    }

    pub fn is_empty(&self) -> bool {
        self.leader.is_none()
    }

    /// Does `name` appear as the sync leader or the sync standby?
    pub fn matches(&self, name: &str) -> bool {
        self.leader.as_deref() == Some(name) || self.sync_standby.as_deref() == Some(name)
    }
}

/// Timeline history: one line per promotion
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TimelineHistory {
    pub index: i64,
    pub value: String,
    pub lines: Vec<Value>,
}

impl TimelineHistory {
    pub fn from_node(index: i64, value: impl Into<String>) -> Self {
        let value = value.into();
        let lines = match serde_json::from_str::<Value>(&value) {
            Ok(Value::Array(lines)) => lines,
            _ => Vec::new(),
        };
        Self {
            index,
            value,
            lines,
        }
    }
}

/// Immutable snapshot of the cluster state
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
pub struct Cluster {
    /// Bootstrap marker (the system identifier once initialized)
    pub initialize: Option<String>,
    pub config: Option<ClusterConfig>,
    pub leader: Option<Leader>,
    /// Last known WAL position of the leader
    pub last_leader_operation: u64,
    pub members: Vec<Member>,
    pub failover: Option<Failover>,
    pub sync: SyncState,
    pub history: Option<TimelineHistory>,
}

impl Cluster {
    /// The absent snapshot: nothing bootstrapped, nothing known.
    pub fn empty() -> Self {
        Self::default()
    }

    pub fn is_initialized(&self) -> bool {
        self.initialize.is_some()
    }

    /// No leader key is held.
    pub fn is_unlocked(&self) -> bool {
        self.leader.is_none()
    }

    pub fn leader_name(&self) -> Option<&str> {
        self.leader.as_ref().map(Leader::name)
    }

    pub fn has_leader(&self, name: &str) -> bool {
        self.leader_name() == Some(name)
    }

    pub fn get_member(&self, name: &str) -> Option<&Member> {
        self.members.iter().find(|m| m.name == name)
    }

    pub fn with_leader(&self, leader: Option<Leader>) -> Self {
        Self {
            leader,
            ..self.clone()
        }
    }

    pub fn without_leader(&self) -> Self {
        self.with_leader(None)
    }

    pub fn with_last_leader_operation(&self, last_leader_operation: u64) -> Self {
        Self {
            last_leader_operation,
            ..self.clone()
        }
    }

    pub fn with_sync(&self, sync: SyncState) -> Self {
        Self {
            sync,
            ..self.clone()
        }
    }

    pub fn with_history(&self, history: Option<TimelineHistory>) -> Self {
        Self {
            history,
            ..self.clone()
        }
    }
}
