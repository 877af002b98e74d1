//! Per-sensor oscillator phase estimation.
//!
//! Quadrature-free: no Hilbert transform, no model fitting. Each value is
//! normalized against the sensor's rolling min/max to `u ∈ [0, 1]`, then
//! mapped onto the unit circle by direction of change — rising values sweep
//! the first half-cycle (`θ = u·π`), falling values the second
//! (`θ = π + u·π`). Crude, but two oscillators moving in step land on the
//! same phase, which is all the order parameter needs.

use std::collections::VecDeque;
use std::f64::consts::PI;

use chrono::{DateTime, Utc};

/// Full circle; phases stay in `[0, TWO_PI)`.
pub const TWO_PI: f64 = 2.0 * PI;

/// Ranges narrower than this count as degenerate (flatline).
const DEGENERATE_RANGE: f64 = 1e-9;

/// Rolling phase state for one `(sensor, class)` stream.
#[derive(Debug, Clone)]
pub struct PhaseEstimator {
    capacity: usize,
    values: VecDeque<f64>,
    phases: VecDeque<f64>,
    last_value: Option<f64>,
    rising: bool,
    last_sample_at: Option<DateTime<Utc>>,
}

impl PhaseEstimator {
    /// New estimator with a fixed ring capacity (set by the signal class).
    pub fn new(capacity: usize) -> Self {
        Self {
            capacity: capacity.max(1),
            values: VecDeque::with_capacity(capacity),
            phases: VecDeque::with_capacity(capacity),
            last_value: None,
            // A first sample has no history; it counts as rising.
            rising: true,
            last_sample_at: None,
        }
    }

    /// Absorb one value and return the phase estimate for it.
    ///
    /// The rolling min/max window is the same ring as the phases, so an old
    /// extreme ages out of the normalization once it ages out of the buffer.
    /// Equal consecutive values keep the previous direction.
    pub fn push(&mut self, value: f64, at: DateTime<Utc>) -> f64 {
        match self.last_value {
            Some(prev) if value > prev => self.rising = true,
            Some(prev) if value < prev => self.rising = false,
            _ => {}
        }
        self.last_value = Some(value);
        self.last_sample_at = Some(at);

        self.values.push_back(value);
        if self.values.len() > self.capacity {
            self.values.pop_front();
        }

        let (min, max) = self
            .values
            .iter()
            .fold((f64::INFINITY, f64::NEG_INFINITY), |(lo, hi), v| {
                (lo.min(*v), hi.max(*v))
            });
        let u = if (max - min).abs() < DEGENERATE_RANGE {
            // Flatline: park mid-phase instead of dividing by nothing.
            0.5
        } else {
            ((value - min) / (max - min)).clamp(0.0, 1.0)
        };

        let theta = if self.rising { u * PI } else { PI + u * PI };
        let theta = theta.rem_euclid(TWO_PI);

        self.phases.push_back(theta);
        if self.phases.len() > self.capacity {
            self.phases.pop_front();
        }
        theta
    }

    /// Most recent phase, if any sample has arrived.
    pub fn latest_phase(&self) -> Option<f64> {
        self.phases.back().copied()
    }

    /// All buffered phases, oldest first.
    pub fn phases(&self) -> impl Iterator<Item = f64> + '_ {
        self.phases.iter().copied()
    }

    pub fn sample_count(&self) -> usize {
        self.phases.len()
    }

    pub fn last_sample_at(&self) -> Option<DateTime<Utc>> {
        self.last_sample_at
    }
}
