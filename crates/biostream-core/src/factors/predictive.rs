//! Predictive load balancing from arrival-rate trends.
//!
//! Range: [0.75, 1.2]
//! Trigger: measurement arrivals; publishes at most once per second.
//!
//! Two EWMAs over inter-arrival time track each sensor: a fast one that
//! follows the current burst and a slow one that remembers the recent norm.
//! Their ratio is the trend: `fast < slow` means arrivals are accelerating,
//! so the factor dips below 1.0 and deliveries lead the surge; a stalling
//! stream drifts toward the 1.2 relaxation cap. The bounds are asymmetric on
//! purpose — aggressive speedups belong to novelty and attention, not to
//! rate guessing.

use std::collections::HashMap;

use chrono::{DateTime, Utc};

/// Fastest the predictor may speed a stream up.
pub const PREDICTIVE_MIN: f32 = 0.75;

/// Most it may relax one.
pub const PREDICTIVE_MAX: f32 = 1.2;

/// Burst-tracking smoothing constant.
pub const FAST_ALPHA: f64 = 0.3;

/// Norm-tracking smoothing constant.
pub const SLOW_ALPHA: f64 = 0.05;

/// Minimum seconds between published updates per sensor.
pub const PUBLISH_INTERVAL_SECS: f64 = 1.0;

/// Floor on inter-arrival samples; bursts can land on the same millisecond.
const MIN_INTERVAL_SECS: f64 = 1e-3;

#[derive(Debug, Clone, Default)]
struct ArrivalTrend {
    last_arrival: Option<DateTime<Utc>>,
    fast: Option<f64>,
    slow: Option<f64>,
    last_published: Option<DateTime<Utc>>,
}

impl ArrivalTrend {
    fn factor(&self) -> f32 {
        match (self.fast, self.slow) {
            (Some(fast), Some(slow)) if slow > 0.0 => {
                ((fast / slow) as f32).clamp(PREDICTIVE_MIN, PREDICTIVE_MAX)
            }
            _ => 1.0,
        }
    }
}

/// Dual-EWMA arrival-trend estimator, one trend per sensor.
#[derive(Debug, Default)]
pub struct LoadPredictor {
    trends: HashMap<String, ArrivalTrend>,
}

impl LoadPredictor {
    pub fn new() -> Self {
        Self::default()
    }

    /// Record an arrival. Returns `Some(factor)` when the once-per-second
    /// publish window has elapsed, `None` when the caller should stay quiet.
    pub fn observe_arrival(&mut self, sensor_id: &str, at: DateTime<Utc>) -> Option<f32> {
        let trend = self.trends.entry(sensor_id.to_string()).or_default();

        if let Some(last) = trend.last_arrival {
            let interval = ((at - last).num_milliseconds() as f64 / 1000.0).max(MIN_INTERVAL_SECS);
            trend.fast = Some(match trend.fast {
                Some(fast) => FAST_ALPHA * interval + (1.0 - FAST_ALPHA) * fast,
                None => interval,
            });
            trend.slow = Some(match trend.slow {
                Some(slow) => SLOW_ALPHA * interval + (1.0 - SLOW_ALPHA) * slow,
                None => interval,
            });
        }
        trend.last_arrival = Some(at);

        let due = match trend.last_published {
            Some(published) => {
                (at - published).num_milliseconds() as f64 / 1000.0 >= PUBLISH_INTERVAL_SECS
            }
            None => true,
        };
        if due {
            trend.last_published = Some(at);
            Some(trend.factor())
        } else {
            None
        }
    }

    /// Current factor regardless of the publish gate (tests, introspection).
    pub fn value(&self, sensor_id: &str) -> f32 {
        self.trends
            .get(sensor_id)
            .map(ArrivalTrend::factor)
            .unwrap_or(1.0)
    }

    pub fn sensor_count(&self) -> usize {
        self.trends.len()
    }

    /// Drop a sensor's trend state (lifecycle cleanup).
    pub fn remove_sensor(&mut self, sensor_id: &str) -> bool {
        self.trends.remove(sensor_id).is_some()
    }
}
