//! Phase synchronization across sensors.
//!
//! Phase estimates per `(sensor, class)` stream and a demand-gated Kuramoto
//! order parameter per class.

mod engine;
mod phase;

pub use engine::{
    order_parameter, PhaseSyncEngine, SyncState, DEFAULT_SENSOR_TTL_SECS,
    MIN_RECOMPUTE_INTERVAL_MS, MIN_SENSORS_FOR_SYNC, SYNC_SMOOTHING_ALPHA,
};
pub use phase::{PhaseEstimator, TWO_PI};
