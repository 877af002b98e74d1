//! Demand-gated phase synchronization engine.
//!
//! Per signal class, the engine tracks one [`PhaseEstimator`] per sensor and
//! folds their latest phases into the Kuramoto order parameter
//! `R = |(1/N) Σ e^{iθ_k}|`: 1.0 when every tracked stream beats in phase,
//! near 0 when phases scatter. A smoothed copy damps frame-to-frame jitter
//! for display.
//!
//! Everything is ingestion-driven — no timers. Recomputation piggybacks on
//! ingest and is rate-limited per class; with zero registered viewers for a
//! class, ingest is a no-op and the last computed state stays frozen, so an
//! unwatched deployment spends nothing here.

use std::collections::HashMap;
use std::sync::atomic::{AtomicU64, AtomicUsize, Ordering};

use chrono::{DateTime, Duration, Utc};
use parking_lot::Mutex;
use serde::{Deserialize, Serialize};
use tracing::{debug, info};

use super::phase::PhaseEstimator;
use crate::error::{CoreError, CoreResult};
use crate::types::SignalClass;

// ============================================================================
// CONSTANTS
// ============================================================================

/// Exponential smoothing weight for the order parameter.
pub const SYNC_SMOOTHING_ALPHA: f64 = 0.15;

/// Minimum milliseconds between recomputations per class.
pub const MIN_RECOMPUTE_INTERVAL_MS: i64 = 200;

/// Sensors silent this long drop out of the computation.
pub const DEFAULT_SENSOR_TTL_SECS: i64 = 30;

/// Below this population the order parameter reads 0 (a single oscillator is
/// not "in sync" with anything).
pub const MIN_SENSORS_FOR_SYNC: usize = 2;

/// Synchronization snapshot for one signal class.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SyncState {
    /// Kuramoto order parameter from the latest recomputation, in [0, 1].
    pub order_parameter: f32,
    /// Exponentially smoothed order parameter, seeded with the first
    /// computed value.
    pub smoothed_order_parameter: f32,
    /// Sensors that contributed to the latest recomputation window.
    pub tracked_sensors: usize,
    /// When the state was last recomputed.
    pub last_update: Option<DateTime<Utc>>,
}

impl Default for SyncState {
    fn default() -> Self {
        Self {
            order_parameter: 0.0,
            smoothed_order_parameter: 0.0,
            tracked_sensors: 0,
            last_update: None,
        }
    }
}

#[derive(Debug, Default)]
struct ClassState {
    sensors: HashMap<String, PhaseEstimator>,
    sync: SyncState,
    smoothed_seeded: bool,
    last_tick: Option<DateTime<Utc>>,
}

/// Kuramoto order parameter over a set of phases. Returns 0 for an empty
/// slice.
pub fn order_parameter(phases: &[f64]) -> f64 {
    if phases.is_empty() {
        return 0.0;
    }
    let (sum_cos, sum_sin) = phases
        .iter()
        .fold((0.0_f64, 0.0_f64), |(c, s), theta| {
            (c + theta.cos(), s + theta.sin())
        });
    let n = phases.len() as f64;
    ((sum_cos / n).powi(2) + (sum_sin / n).powi(2)).sqrt()
}

/// Per-class phase tracking and order-parameter computation.
pub struct PhaseSyncEngine {
    classes: [Mutex<ClassState>; 2],
    viewers: [AtomicUsize; 2],
    sensor_ttl: Duration,
    ingest_count: AtomicU64,
    tick_count: AtomicU64,
}

impl PhaseSyncEngine {
    pub fn new() -> Self {
        Self::with_ttl(Duration::seconds(DEFAULT_SENSOR_TTL_SECS))
    }

    /// Engine with a custom sensor TTL (tests mostly).
    pub fn with_ttl(sensor_ttl: Duration) -> Self {
        Self {
            classes: [Mutex::new(ClassState::default()), Mutex::new(ClassState::default())],
            viewers: [AtomicUsize::new(0), AtomicUsize::new(0)],
            sensor_ttl,
            ingest_count: AtomicU64::new(0),
            tick_count: AtomicU64::new(0),
        }
    }

    /// Feed one qualifying measurement value.
    ///
    /// Rejects non-finite values; gates on viewer demand; otherwise updates
    /// the sensor's phase estimate and recomputes the class state if the
    /// rate limit allows.
    pub fn ingest(
        &self,
        sensor_id: &str,
        class: SignalClass,
        value: f64,
        at: DateTime<Utc>,
    ) -> CoreResult<()> {
        if !value.is_finite() {
            return Err(CoreError::validation(
                "value",
                format!("non-finite sample {value} for {}", class.as_str()),
            ));
        }

        if self.viewer_count(class) == 0 {
            debug!(
                sensor_id,
                class = class.as_str(),
                "sync ingest skipped, no viewers"
            );
            return Ok(());
        }

        let mut state = self.classes[class.index()].lock();
        let capacity = class.ring_capacity();
        state
            .sensors
            .entry(sensor_id.to_string())
            .or_insert_with(|| PhaseEstimator::new(capacity))
            .push(value, at);
        self.ingest_count.fetch_add(1, Ordering::Relaxed);

        let due = match state.last_tick {
            Some(last) => (at - last) >= Duration::milliseconds(MIN_RECOMPUTE_INTERVAL_MS),
            None => true,
        };
        if due {
            self.recompute(&mut state, class, at);
        }
        Ok(())
    }

    /// Latest synchronization snapshot for a class.
    pub fn current_sync(&self, class: SignalClass) -> SyncState {
        self.classes[class.index()].lock().sync.clone()
    }

    /// Register a viewer for a class. Returns the new viewer count.
    pub fn add_viewer(&self, class: SignalClass) -> usize {
        let previous = self.viewers[class.index()].fetch_add(1, Ordering::SeqCst);
        if previous == 0 {
            info!(class = class.as_str(), "sync computation active");
        }
        previous + 1
    }

    /// Drop a viewer; saturates at zero. At zero the class state freezes.
    pub fn remove_viewer(&self, class: SignalClass) -> usize {
        let result = self.viewers[class.index()].fetch_update(
            Ordering::SeqCst,
            Ordering::SeqCst,
            |count| count.checked_sub(1),
        );
        match result {
            Ok(1) => {
                info!(class = class.as_str(), "sync computation frozen, no viewers");
                0
            }
            Ok(previous) => previous - 1,
            // Already at zero; stay there.
            Err(_) => 0,
        }
    }

    pub fn viewer_count(&self, class: SignalClass) -> usize {
        self.viewers[class.index()].load(Ordering::SeqCst)
    }

    /// Sensors currently buffered for a class (pruning happens on ticks, so
    /// this can briefly include silent sensors).
    pub fn tracked_sensors(&self, class: SignalClass) -> usize {
        self.classes[class.index()].lock().sensors.len()
    }

    /// Drop a sensor's phase state in every class (lifecycle cleanup). The
    /// published sync state catches up on the next tick.
    pub fn remove_sensor(&self, sensor_id: &str) {
        for class in SignalClass::all() {
            self.classes[class.index()].lock().sensors.remove(sensor_id);
        }
    }

    /// Accepted ingests (gated ones not included).
    pub fn ingest_count(&self) -> u64 {
        self.ingest_count.load(Ordering::Relaxed)
    }

    /// Completed recomputations across classes.
    pub fn tick_count(&self) -> u64 {
        self.tick_count.load(Ordering::Relaxed)
    }

    fn recompute(&self, state: &mut ClassState, class: SignalClass, at: DateTime<Utc>) {
        // Silent sensors age out of the computation entirely.
        let ttl = self.sensor_ttl;
        state
            .sensors
            .retain(|_, est| matches!(est.last_sample_at(), Some(t) if at - t <= ttl));

        let phases: Vec<f64> = state
            .sensors
            .values()
            .filter_map(|est| est.latest_phase())
            .collect();

        if phases.len() >= MIN_SENSORS_FOR_SYNC {
            let r = order_parameter(&phases);
            let smoothed = if state.smoothed_seeded {
                SYNC_SMOOTHING_ALPHA * r
                    + (1.0 - SYNC_SMOOTHING_ALPHA) * state.sync.smoothed_order_parameter as f64
            } else {
                state.smoothed_seeded = true;
                r
            };
            state.sync.order_parameter = r as f32;
            state.sync.smoothed_order_parameter = smoothed as f32;
        } else {
            // Not enough oscillators for coherence to mean anything. Report
            // zero but leave the smoothed history in place; a transient
            // dropout should not erase it.
            state.sync.order_parameter = 0.0;
        }

        state.sync.tracked_sensors = state.sensors.len();
        state.sync.last_update = Some(at);
        state.last_tick = Some(at);
        self.tick_count.fetch_add(1, Ordering::Relaxed);
        debug!(
            class = class.as_str(),
            order_parameter = state.sync.order_parameter,
            smoothed = state.sync.smoothed_order_parameter,
            tracked = state.sync.tracked_sensors,
            "sync state recomputed"
        );
    }
}

impl Default for PhaseSyncEngine {
    fn default() -> Self {
        Self::new()
    }
}
