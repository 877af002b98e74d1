//! Attention levels for sensor streams.
//!
//! Attention expresses how urgently viewers need a sensor's data and is the
//! primary input to batch-window selection. Only the attention registry
//! assigns levels; everything else treats them as read-only.

use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

use crate::error::CoreError;

/// Attention level for a sensor, ordered by urgency.
///
/// Variants are declared ascending so the derived `Ord` ranks
/// `High > Medium > Low > None`: the registry resolves a sensor's effective
/// level as the maximum tier any viewer registered.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum AttentionLevel {
    /// No viewer registered. Delivery idles at the slowest cadence.
    None,
    /// Background interest (dashboards, aggregates).
    Low,
    /// Actively displayed among other streams.
    Medium,
    /// Focused real-time viewing.
    High,
}

impl AttentionLevel {
    /// Wire/display name, matching the serialized form.
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::None => "none",
            Self::Low => "low",
            Self::Medium => "medium",
            Self::High => "high",
        }
    }

    /// Background levels are the ones eligible for pausing under memory
    /// protection or critical system load.
    #[inline]
    pub fn is_background(&self) -> bool {
        matches!(self, Self::Low | Self::None)
    }

    /// All levels, most urgent first.
    pub fn all() -> [AttentionLevel; 4] {
        [Self::High, Self::Medium, Self::Low, Self::None]
    }
}

impl fmt::Display for AttentionLevel {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for AttentionLevel {
    type Err = CoreError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "none" => Ok(Self::None),
            "low" => Ok(Self::Low),
            "medium" => Ok(Self::Medium),
            "high" => Ok(Self::High),
            other => Err(CoreError::validation(
                "attention_level",
                format!("unknown level '{other}'"),
            )),
        }
    }
}
