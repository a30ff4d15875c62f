//! Common utilities and types shared across dcs2node

pub mod config;
pub mod error;
pub mod metrics;
pub mod utils;

pub use config::{Config, TwoNodeConfig};
pub use error::{Error, Result};
pub use utils::{now_rfc3339, parse_duration};
