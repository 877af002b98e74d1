//! Runtime configuration for the streaming core.
//!
//! Hub-level knobs live here; estimator-specific tuning (novelty thresholds,
//! smoothing constants) stays next to the estimator that owns it. Defaults
//! come from the named constants in [`defaults`] so tests and docs can refer
//! to one source of truth.

use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::error::{CoreError, CoreResult};

/// Default values for [`CoreConfig`].
pub mod defaults {
    /// Neutral flush cadence before any multipliers are applied (1 Hz).
    ///
    /// The tier multipliers scale this value: high attention lands at
    /// 200 ms before clamping, `none` at 10 s.
    pub const BASE_WINDOW_MS: u64 = 1000;

    /// Per-sensor pending-measurement queue bound. Overflow evicts the
    /// oldest entry (counted, never an error).
    pub const MAX_PENDING_MEASUREMENTS: usize = 256;

    /// Sensor records are destroyed after this much ingest silence.
    pub const SENSOR_TTL_SECS: u64 = 60;

    /// Cadence of the background sweep that enforces the sensor TTL.
    pub const SWEEP_INTERVAL_SECS: u64 = 10;

    /// Cadence of the producer tick that republishes slow factors
    /// (circadian, homeostatic, novelty decay).
    pub const PRODUCER_TICK_MS: u64 = 1000;
}

/// Hub-level configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CoreConfig {
    /// Neutral flush cadence in milliseconds before multipliers.
    pub base_window_ms: u64,
    /// Upper bound on queued measurements per sensor.
    pub max_pending_measurements: usize,
    /// Ingest silence after which a sensor record is destroyed.
    pub sensor_ttl: Duration,
    /// How often the TTL sweeper runs.
    pub sweep_interval: Duration,
    /// How often slow factor producers republish.
    pub producer_tick: Duration,
}

impl Default for CoreConfig {
    fn default() -> Self {
        Self {
            base_window_ms: defaults::BASE_WINDOW_MS,
            max_pending_measurements: defaults::MAX_PENDING_MEASUREMENTS,
            sensor_ttl: Duration::from_secs(defaults::SENSOR_TTL_SECS),
            sweep_interval: Duration::from_secs(defaults::SWEEP_INTERVAL_SECS),
            producer_tick: Duration::from_millis(defaults::PRODUCER_TICK_MS),
        }
    }
}

impl CoreConfig {
    /// Validate ranges. Call once at assembly; invalid configs never reach
    /// the running system.
    pub fn validate(&self) -> CoreResult<()> {
        if self.base_window_ms == 0 {
            return Err(CoreError::config("base_window_ms must be > 0"));
        }
        if self.max_pending_measurements == 0 {
            return Err(CoreError::config("max_pending_measurements must be > 0"));
        }
        if self.sensor_ttl.is_zero() {
            return Err(CoreError::config("sensor_ttl must be > 0"));
        }
        if self.sweep_interval.is_zero() {
            return Err(CoreError::config("sweep_interval must be > 0"));
        }
        if self.producer_tick.is_zero() {
            return Err(CoreError::config("producer_tick must be > 0"));
        }
        Ok(())
    }
}
