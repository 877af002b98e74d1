//! System load classification supplied by an external load monitor.

use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

use crate::error::CoreError;

/// Coarse system load state.
///
/// The core never measures load itself; a monitor outside this crate reports
/// transitions via `StreamSystem::update_load_state`. `Critical` pauses
/// background sensors outright.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SystemLoad {
    Normal,
    Elevated,
    High,
    Critical,
}

impl SystemLoad {
    /// Wire/display name, matching the serialized form.
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Normal => "normal",
            Self::Elevated => "elevated",
            Self::High => "high",
            Self::Critical => "critical",
        }
    }

    /// Normalized pressure in [0, 1] for the homeostatic tuner.
    ///
    /// `Normal` sits at the tuner's neutral point so a healthy system keeps
    /// the load multiplier at 1.0.
    #[inline]
    pub fn pressure(&self) -> f32 {
        match self {
            Self::Normal => 0.25,
            Self::Elevated => 0.5,
            Self::High => 0.75,
            Self::Critical => 1.0,
        }
    }
}

impl Default for SystemLoad {
    fn default() -> Self {
        Self::Normal
    }
}

impl fmt::Display for SystemLoad {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for SystemLoad {
    type Err = CoreError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "normal" => Ok(Self::Normal),
            "elevated" => Ok(Self::Elevated),
            "high" => Ok(Self::High),
            "critical" => Ok(Self::Critical),
            other => Err(CoreError::validation(
                "system_load",
                format!("unknown load state '{other}'"),
            )),
        }
    }
}
