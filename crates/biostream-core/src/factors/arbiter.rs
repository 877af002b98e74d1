//! Competitive resource arbitration across active sensors.
//!
//! Range: [0.5, 5.0]
//! Trigger: membership or priority-weight changes.
//!
//! Each active sensor holds a positive priority weight (default 1.0). The
//! published factor follows a power-law share:
//!
//! ```text
//! factor = clamp(0.5 · total_weight / (n · own_weight), 0.5, 5.0)
//! ```
//!
//! Heavier-than-average sensors land below 1.0 (faster delivery), lighter
//! ones above it. Equal weights always resolve to the 0.5 floor regardless of
//! population, and a lone sensor gets the floor with no division hazard.

use std::collections::HashMap;

use tracing::debug;

use crate::error::{CoreError, CoreResult};

/// Lower clamp: no sensor is ever granted more than a 2x cadence boost from
/// competition alone.
pub const COMPETITIVE_MIN: f32 = 0.5;

/// Upper clamp: competition alone never slows a sensor more than fivefold.
pub const COMPETITIVE_MAX: f32 = 5.0;

/// Weight assumed for sensors that never had one set.
pub const DEFAULT_PRIORITY_WEIGHT: f32 = 1.0;

/// Membership and weights for competitive allocation.
#[derive(Debug, Default)]
pub struct ResourceArbiter {
    weights: HashMap<String, f32>,
}

impl ResourceArbiter {
    pub fn new() -> Self {
        Self::default()
    }

    /// Enroll a sensor at the default weight. Idempotent: an existing weight
    /// is left alone.
    pub fn add_sensor(&mut self, sensor_id: &str) {
        self.weights
            .entry(sensor_id.to_string())
            .or_insert(DEFAULT_PRIORITY_WEIGHT);
    }

    /// Set a sensor's priority weight. Enrolls the sensor if new.
    ///
    /// Weights must be finite and strictly positive; anything else is a
    /// caller error, rejected before it can poison every sensor's share.
    pub fn set_weight(&mut self, sensor_id: &str, weight: f32) -> CoreResult<()> {
        if !weight.is_finite() || weight <= 0.0 {
            return Err(CoreError::validation(
                "priority_weight",
                format!("must be finite and > 0, got {weight}"),
            ));
        }
        self.weights.insert(sensor_id.to_string(), weight);
        debug!(sensor_id, weight, "priority weight updated");
        Ok(())
    }

    /// Remove a sensor from the competition.
    pub fn remove_sensor(&mut self, sensor_id: &str) -> bool {
        self.weights.remove(sensor_id).is_some()
    }

    /// A sensor's weight, default for non-members.
    pub fn weight(&self, sensor_id: &str) -> f32 {
        self.weights
            .get(sensor_id)
            .copied()
            .unwrap_or(DEFAULT_PRIORITY_WEIGHT)
    }

    /// Competitive factor for one sensor against current membership.
    ///
    /// Non-members read neutral 1.0 — same missing-data convention as the
    /// signal bus.
    pub fn factor(&self, sensor_id: &str) -> f32 {
        let Some(own) = self.weights.get(sensor_id) else {
            return 1.0;
        };
        let n = self.weights.len() as f32;
        let total: f32 = self.weights.values().sum();
        (COMPETITIVE_MIN * total / (n * own)).clamp(COMPETITIVE_MIN, COMPETITIVE_MAX)
    }

    /// Factors for every member, for bulk republication after a change.
    pub fn factors(&self) -> Vec<(String, f32)> {
        let n = self.weights.len() as f32;
        let total: f32 = self.weights.values().sum();
        self.weights
            .iter()
            .map(|(id, own)| {
                let f = (COMPETITIVE_MIN * total / (n * own)).clamp(COMPETITIVE_MIN, COMPETITIVE_MAX);
                (id.clone(), f)
            })
            .collect()
    }

    pub fn sensor_count(&self) -> usize {
        self.weights.len()
    }

    pub fn total_weight(&self) -> f32 {
        self.weights.values().sum()
    }
}
