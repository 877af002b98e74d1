//! Backpressure decisions and the batches that carry them downstream.

use serde::{Deserialize, Serialize};
use uuid::Uuid;

use super::attention::AttentionLevel;
use super::load::SystemLoad;
use super::sensor::Measurement;

/// The computed delivery decision for one sensor at one instant.
///
/// Immutable value object: every recomputation yields a fresh instance and
/// the previous one stays valid for whoever holds it. The serialized shape is
/// the contract with downstream transports — field names here are wire names.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct BackpressureConfig {
    pub attention_level: AttentionLevel,
    pub system_load: SystemLoad,
    pub memory_protection_active: bool,
    /// True when delivery for this sensor is suspended entirely.
    pub paused: bool,
    /// Milliseconds between flushes, clamped to the attention tier's range.
    #[serde(rename = "recommended_batch_window")]
    pub recommended_batch_window_ms: u64,
    /// Measurements per flush; attention-tier base size, never factor-scaled.
    pub recommended_batch_size: usize,
    /// The homeostatic load multiplier that went into the window, echoed for
    /// downstream visibility.
    pub load_multiplier: f32,
    /// Epoch milliseconds at computation time.
    pub timestamp: i64,
}

impl BackpressureConfig {
    /// Window as a std duration, for timer scheduling.
    #[inline]
    pub fn window(&self) -> std::time::Duration {
        std::time::Duration::from_millis(self.recommended_batch_window_ms)
    }
}

/// One delivery handed to the downstream transport: the freshly computed
/// config plus up to `recommended_batch_size` queued measurements (none while
/// paused — the config still travels so the pause decision reaches the edge).
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct FlushBatch {
    pub id: Uuid,
    pub sensor_id: String,
    pub config: BackpressureConfig,
    pub measurements: Vec<Measurement>,
}
