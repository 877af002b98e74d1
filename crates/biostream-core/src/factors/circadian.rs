//! Circadian cadence shaping.
//!
//! Range: [0.85, 1.2]
//! Trigger: wall-clock hour; republished on the producer tick.
//!
//! A 24-entry hour table maps UTC time of day to a window multiplier:
//! overnight hours relax delivery (1.2), daytime activity tightens it toward
//! 0.85. Values interpolate linearly across each hour on the minute fraction
//! so the factor drifts instead of stepping at hour boundaries.

use chrono::{DateTime, Timelike, Utc};

use crate::error::{CoreError, CoreResult};

/// Fastest circadian adjustment (daytime).
pub const CIRCADIAN_MIN: f32 = 0.85;

/// Slowest circadian adjustment (overnight).
pub const CIRCADIAN_MAX: f32 = 1.2;

/// Default hour table, UTC. Index is the hour; the value drifts linearly
/// toward the next entry as the hour progresses.
pub const DEFAULT_HOUR_TABLE: [f32; 24] = [
    1.2, 1.2, 1.2, 1.2, 1.2, // 00-04 deep night
    1.15, 1.05, 0.95, 0.9, 0.88, // 05-09 morning ramp
    0.85, 0.85, 0.85, 0.85, 0.85, 0.85, 0.85, // 10-16 active day
    0.88, 0.92, 0.98, 1.02, 1.08, // 17-21 evening wind-down
    1.12, 1.18, // 22-23 toward night
];

/// Hour-table circadian factor source.
#[derive(Debug, Clone)]
pub struct CircadianRhythm {
    table: [f32; 24],
}

impl CircadianRhythm {
    pub fn new() -> Self {
        Self {
            table: DEFAULT_HOUR_TABLE,
        }
    }

    /// Custom table; every entry must sit inside the factor bounds.
    pub fn with_table(table: [f32; 24]) -> CoreResult<Self> {
        for (hour, value) in table.iter().enumerate() {
            if !(CIRCADIAN_MIN..=CIRCADIAN_MAX).contains(value) {
                return Err(CoreError::config(format!(
                    "circadian table hour {hour}: {value} outside [{CIRCADIAN_MIN}, {CIRCADIAN_MAX}]"
                )));
            }
        }
        Ok(Self { table })
    }

    /// Factor for a moment in time, interpolated within the hour.
    pub fn factor_at(&self, at: DateTime<Utc>) -> f32 {
        let hour = at.hour() as usize;
        let next = (hour + 1) % 24;
        let frac = (at.minute() as f32 * 60.0 + at.second() as f32) / 3600.0;
        let value = self.table[hour] * (1.0 - frac) + self.table[next] * frac;
        value.clamp(CIRCADIAN_MIN, CIRCADIAN_MAX)
    }
}

impl Default for CircadianRhythm {
    fn default() -> Self {
        Self::new()
    }
}
