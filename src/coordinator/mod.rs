//! Degraded-mode coordinator
//!
//! The coordinator sits between the HA control loop and the DCS client:
//! - Delegates to the DCS while it has quorum
//! - Serves and mutates a cached cluster snapshot while it does not
//! - Never reports a quorum loss to the caller

pub mod delegate;
pub mod mode;
pub mod two_node;

pub use mode::Mode;
pub use two_node::{Coordinator, TWO_NODE_MEMBERS};
