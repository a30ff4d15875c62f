//! # dcs2node
//!
//! Keeps leader election working in a two-node HA cluster when the
//! distributed configuration store (DCS) loses quorum but is still reachable:
//! - Delegates to the real DCS client while it has a leader
//! - Switches to a cached cluster snapshot ("static mode") on quorum loss
//! - Lets this node assume leadership locally while in static mode
//! - Forces a fresh election when the DCS recovers
//!
//! Connectivity failures are never masked: a node that cannot reach its DCS
//! server at all still drops leadership as usual.
//!
//! ## Architecture
//!
//! ```text
//! ┌─────────────────────────────────────────┐
//! │            HA control loop              │
//! │  load_cluster / acquire / write optime  │
//! └───────────────────┬─────────────────────┘
//!                     │ DcsStore
//! ┌───────────────────▼─────────────────────┐
//! │             Coordinator                 │
//! │   mode: normal | static                 │
//! │   cached Cluster snapshot               │
//! └───────────────────┬─────────────────────┘
//!                     │ DcsStore (normal mode only)
//! ┌───────────────────▼─────────────────────┐
//! │            DCS client                   │
//! │  (QuorumLoss | ConnectionFailed | Ok)   │
//! └─────────────────────────────────────────┘
//! ```
//!
//! ## Usage
//!
//! ```rust,no_run
//! use dcs2node::dcs::memory::MemoryBackend;
//! use dcs2node::{Coordinator, DcsStore};
//!
//! # async fn run() -> dcs2node::Result<()> {
//! let backend = MemoryBackend::new();
//! let dcs = Coordinator::new(backend.client("node1"), "node1", true);
//!
//! if let Some(cluster) = dcs.load_cluster().await? {
//!     if cluster.is_unlocked() || cluster.has_leader("node1") {
//!         dcs.attempt_to_acquire_leader(false).await?;
//!     }
//! }
//! # Ok(())
//! # }
//! ```
//!
//! ### Simulate a DCS outage
//! ```bash
//! dcs2node simulate --config ./dcs2node.toml --cycles 12 --fail-at 4 --restore-at 8
//! ```

pub mod common;
pub mod coordinator;
pub mod dcs;

// Re-export commonly used types
pub use common::{Config, Error, Result};
pub use coordinator::{Coordinator, Mode};
pub use dcs::{Cluster, DcsStore};

/// Current version
pub const VERSION: &str = env!("CARGO_PKG_VERSION");

/// Build info
pub const BUILD_INFO: &str = concat!(env!("CARGO_PKG_VERSION"), " (", env!("CARGO_PKG_NAME"), ")");
