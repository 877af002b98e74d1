//! Homeostatic load multiplier.
//!
//! Range: [1.0, 5.0]
//! Trigger: system load reports; republished on the producer tick.
//!
//! The tuner smooths reported load pressure with an EWMA and maps the excess
//! over the healthy operating point through a quadratic curve:
//!
//! ```text
//! multiplier = clamp(1 + 4 · excess², 1.0, 5.0)
//! where excess = max(0, smoothed - neutral) / (1 - neutral)
//! ```
//!
//! A healthy system stays exactly at 1.0; sustained critical load saturates
//! at the 5x ceiling. The quadratic keeps mild elevation cheap and reserves
//! the steep slowdown for genuine pressure, and the smoothing stops the
//! multiplier from oscillating when load flaps between reports.

use tracing::debug;

use crate::types::SystemLoad;

/// Multiplier floor: load never speeds a stream up.
pub const LOAD_MULTIPLIER_MIN: f32 = 1.0;

/// Multiplier ceiling.
pub const LOAD_MULTIPLIER_MAX: f32 = 5.0;

/// EWMA smoothing constant for pressure reports.
pub const PRESSURE_ALPHA: f32 = 0.2;

/// Pressure of a healthy system; matches `SystemLoad::Normal.pressure()`.
pub const PRESSURE_NEUTRAL: f32 = 0.25;

/// Smoothed-pressure load multiplier source.
#[derive(Debug, Clone)]
pub struct HomeostaticTuner {
    smoothed_pressure: f32,
}

impl HomeostaticTuner {
    pub fn new() -> Self {
        Self {
            smoothed_pressure: PRESSURE_NEUTRAL,
        }
    }

    /// Fold one load report into the smoothed pressure. Returns the
    /// multiplier now in effect.
    pub fn observe_load(&mut self, load: SystemLoad) -> f32 {
        self.observe_pressure(load.pressure())
    }

    /// Fold a raw pressure sample in [0, 1].
    pub fn observe_pressure(&mut self, pressure: f32) -> f32 {
        let pressure = pressure.clamp(0.0, 1.0);
        self.smoothed_pressure =
            PRESSURE_ALPHA * pressure + (1.0 - PRESSURE_ALPHA) * self.smoothed_pressure;
        let m = self.multiplier();
        debug!(
            smoothed_pressure = self.smoothed_pressure,
            multiplier = m,
            "homeostatic pressure updated"
        );
        m
    }

    /// Current multiplier.
    pub fn multiplier(&self) -> f32 {
        let excess =
            ((self.smoothed_pressure - PRESSURE_NEUTRAL) / (1.0 - PRESSURE_NEUTRAL)).max(0.0);
        (1.0 + 4.0 * excess * excess).clamp(LOAD_MULTIPLIER_MIN, LOAD_MULTIPLIER_MAX)
    }

    /// Smoothed pressure, for introspection.
    pub fn pressure(&self) -> f32 {
        self.smoothed_pressure
    }

    /// Back to the healthy operating point.
    pub fn reset(&mut self) {
        self.smoothed_pressure = PRESSURE_NEUTRAL;
    }
}

impl Default for HomeostaticTuner {
    fn default() -> Self {
        Self::new()
    }
}
