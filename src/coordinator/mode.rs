//! Coordinator operating mode

use serde::{Deserialize, Serialize};

/// Where cluster state comes from
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Mode {
    /// Reads and writes go to the DCS
    #[default]
    Normal,
    /// The DCS has no quorum; the cached snapshot is the source of truth
    Static,
}

impl Mode {
    pub fn is_static(&self) -> bool {
        matches!(self, Mode::Static)
    }
}

impl std::fmt::Display for Mode {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Mode::Normal => write!(f, "normal"),
            Mode::Static => write!(f, "static"),
        }
    }
}
