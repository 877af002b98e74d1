//! Attention tier table.
//!
//! Static configuration mapping each attention level to its window
//! multiplier, clamp range, and batch size. The table is the contract that
//! keeps every other influence bounded: whatever the factors do, the final
//! window lands inside the active tier's range.

use crate::types::AttentionLevel;

/// Delivery parameters for one attention level.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct AttentionTier {
    /// Scales the neutral base window.
    pub multiplier: f32,
    /// Hard floor for the computed window.
    pub min_window_ms: u64,
    /// Hard ceiling for the computed window; also the parking cadence for
    /// paused sensors.
    pub max_window_ms: u64,
    /// Measurements per flush. Factors never change this.
    pub batch_size: usize,
}

/// Focused real-time viewing: single measurements at up to 10 Hz.
pub const TIER_HIGH: AttentionTier = AttentionTier {
    multiplier: 0.2,
    min_window_ms: 100,
    max_window_ms: 500,
    batch_size: 1,
};

/// Actively displayed among other streams.
pub const TIER_MEDIUM: AttentionTier = AttentionTier {
    multiplier: 0.4,
    min_window_ms: 150,
    max_window_ms: 500,
    batch_size: 5,
};

/// Background interest; whole seconds between flushes.
pub const TIER_LOW: AttentionTier = AttentionTier {
    multiplier: 4.0,
    min_window_ms: 2_000,
    max_window_ms: 10_000,
    batch_size: 10,
};

/// Nobody watching; the stream idles at a crawl.
pub const TIER_NONE: AttentionTier = AttentionTier {
    multiplier: 10.0,
    min_window_ms: 5_000,
    max_window_ms: 30_000,
    batch_size: 20,
};

impl AttentionTier {
    /// Tier for an attention level.
    #[inline]
    pub fn for_level(level: AttentionLevel) -> &'static AttentionTier {
        match level {
            AttentionLevel::High => &TIER_HIGH,
            AttentionLevel::Medium => &TIER_MEDIUM,
            AttentionLevel::Low => &TIER_LOW,
            AttentionLevel::None => &TIER_NONE,
        }
    }

    /// Structural sanity of a tier row.
    pub fn is_valid(&self) -> bool {
        self.multiplier > 0.0
            && self.min_window_ms > 0
            && self.min_window_ms <= self.max_window_ms
            && self.batch_size >= 1
    }
}
