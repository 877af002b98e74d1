//! Novelty detection - surprise-driven delivery boost.
//!
//! Range: [0.5, 1.0]
//! Trigger: incoming value more than `NOVELTY_Z_THRESHOLD` standard
//! deviations from the sensor's rolling mean.
//!
//! Each sensor carries single-pass running statistics (Welford's update, so
//! mean and variance stay numerically stable over long streams). A value that
//! lands outside the z threshold arms a boost: the published factor drops to
//! `NOVELTY_BOOST_FACTOR` and relaxes linearly back to neutral over
//! `NOVELTY_DECAY_SECS`. Another outlier re-arms the full decay window.
//!
//! The z-score is computed against the statistics *before* the new value is
//! absorbed, so an outlier cannot mask itself by inflating the variance it is
//! judged against. Timestamps are caller-supplied; the detector holds no
//! clock.

use std::collections::HashMap;

use chrono::{DateTime, Utc};
use tracing::debug;

/// Z-score beyond which a value counts as novel.
pub const NOVELTY_Z_THRESHOLD: f64 = 3.0;

/// Factor published while a boost is fresh (faster delivery).
pub const NOVELTY_BOOST_FACTOR: f32 = 0.5;

/// Seconds for a boost to relax back to neutral.
pub const NOVELTY_DECAY_SECS: f64 = 10.0;

/// Neutral factor when nothing novel is happening.
pub const NOVELTY_NEUTRAL: f32 = 1.0;

/// Observations required before z-scores are meaningful.
pub const NOVELTY_MIN_SAMPLES: u64 = 2;

/// Floor for the standard deviation; a perfectly constant stream has zero
/// variance and must never divide by it.
const SIGMA_FLOOR: f64 = 1e-6;

/// Running statistics and boost state for one sensor.
#[derive(Debug, Clone, Default)]
struct SensorStats {
    count: u64,
    mean: f64,
    m2: f64,
    boost_armed_at: Option<DateTime<Utc>>,
}

impl SensorStats {
    fn variance(&self) -> f64 {
        if self.count < 2 {
            0.0
        } else {
            self.m2 / (self.count - 1) as f64
        }
    }

    /// Welford single-pass update.
    fn absorb(&mut self, value: f64) {
        self.count += 1;
        let delta = value - self.mean;
        self.mean += delta / self.count as f64;
        let delta2 = value - self.mean;
        self.m2 += delta * delta2;
    }

    fn factor_at(&self, at: DateTime<Utc>) -> f32 {
        let Some(armed_at) = self.boost_armed_at else {
            return NOVELTY_NEUTRAL;
        };
        let elapsed = (at - armed_at).num_milliseconds() as f64 / 1000.0;
        if elapsed < 0.0 {
            // Clock went backwards relative to the arming event; hold the
            // full boost rather than inventing a decay.
            return NOVELTY_BOOST_FACTOR;
        }
        let progress = (elapsed / NOVELTY_DECAY_SECS).min(1.0) as f32;
        NOVELTY_BOOST_FACTOR + (NOVELTY_NEUTRAL - NOVELTY_BOOST_FACTOR) * progress
    }
}

/// Per-sensor statistical novelty detector.
///
/// Shared behind a lock by the orchestrator; all methods take `&mut self` and
/// return the factor value so callers can publish it in the same breath.
#[derive(Debug, Default)]
pub struct NoveltyDetector {
    stats: HashMap<String, SensorStats>,
}

impl NoveltyDetector {
    pub fn new() -> Self {
        Self::default()
    }

    /// Feed one value for a sensor and return the factor now in effect.
    ///
    /// Non-finite values are ignored (the ingest path validates payloads
    /// before they get here; this keeps the statistics safe regardless).
    pub fn observe(&mut self, sensor_id: &str, value: f64, at: DateTime<Utc>) -> f32 {
        if !value.is_finite() {
            return self.value(sensor_id, at);
        }

        let stats = self.stats.entry(sensor_id.to_string()).or_default();

        if stats.count >= NOVELTY_MIN_SAMPLES {
            let sigma = stats.variance().sqrt().max(SIGMA_FLOOR);
            let z = (value - stats.mean).abs() / sigma;
            if z > NOVELTY_Z_THRESHOLD {
                stats.boost_armed_at = Some(at);
                debug!(
                    sensor_id,
                    value,
                    mean = stats.mean,
                    z,
                    "novelty boost armed"
                );
            }
        }

        stats.absorb(value);
        stats.factor_at(at)
    }

    /// Current factor for a sensor without observing anything — used by the
    /// producer tick to keep the published value decaying between samples.
    pub fn value(&self, sensor_id: &str, at: DateTime<Utc>) -> f32 {
        self.stats
            .get(sensor_id)
            .map(|s| s.factor_at(at))
            .unwrap_or(NOVELTY_NEUTRAL)
    }

    /// Whether a boost is still decaying for this sensor.
    pub fn is_boosted(&self, sensor_id: &str, at: DateTime<Utc>) -> bool {
        self.value(sensor_id, at) < NOVELTY_NEUTRAL
    }

    /// `(count, mean, variance)` for a sensor's running statistics.
    pub fn stats(&self, sensor_id: &str) -> Option<(u64, f64, f64)> {
        self.stats
            .get(sensor_id)
            .map(|s| (s.count, s.mean, s.variance()))
    }

    /// Sensors with recorded statistics.
    pub fn sensor_count(&self) -> usize {
        self.stats.len()
    }

    /// Drop a sensor's statistics (lifecycle cleanup).
    pub fn remove_sensor(&mut self, sensor_id: &str) -> bool {
        self.stats.remove(sensor_id).is_some()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Duration;

    fn base_time() -> DateTime<Utc> {
        Utc::now()
    }

    #[test]
    fn test_constant_sequence_never_boosts() {
        let mut detector = NoveltyDetector::new();
        let t0 = base_time();

        for i in 0..200 {
            let at = t0 + Duration::milliseconds(i * 100);
            let factor = detector.observe("resp-1", 36.6, at);
            assert_eq!(factor, NOVELTY_NEUTRAL, "sample {i} must stay neutral");
        }
        assert!(!detector.is_boosted("resp-1", t0 + Duration::seconds(30)));
        println!("[PASS] test_constant_sequence_never_boosts");
    }

    #[test]
    fn test_single_outlier_arms_boost() {
        println!("\n=== novelty: stable stream, one extreme outlier ===");
        let mut detector = NoveltyDetector::new();
        let t0 = base_time();

        // Stable heart-rate values with mild jitter.
        let stable = [72.0, 72.5, 71.8, 72.2, 71.9, 72.1, 72.3, 71.7, 72.0, 72.4];
        for (i, v) in stable.iter().enumerate() {
            let factor = detector.observe("hr-1", *v, t0 + Duration::seconds(i as i64));
            assert_eq!(factor, NOVELTY_NEUTRAL);
        }
        let (count, mean, variance) = detector.stats("hr-1").unwrap();
        println!("BEFORE: count={count} mean={mean:.2} variance={variance:.4}");

        let spike_at = t0 + Duration::seconds(stable.len() as i64);
        let factor = detector.observe("hr-1", 160.0, spike_at);
        println!("AFTER: factor={factor}");
        assert_eq!(factor, NOVELTY_BOOST_FACTOR);
        assert!(detector.is_boosted("hr-1", spike_at));
        println!("RESULT: PASS - outlier armed a {NOVELTY_BOOST_FACTOR} boost");
    }

    #[test]
    fn test_outlier_after_constant_sequence_boosts() {
        // Zero variance is floored, not divided by; a jump off a perfectly
        // flat stream still counts as novel.
        let mut detector = NoveltyDetector::new();
        let t0 = base_time();
        for i in 0..10 {
            detector.observe("s", 10.0, t0 + Duration::seconds(i));
        }
        let factor = detector.observe("s", 11.0, t0 + Duration::seconds(10));
        assert_eq!(factor, NOVELTY_BOOST_FACTOR);
        println!("[PASS] test_outlier_after_constant_sequence_boosts");
    }

    #[test]
    fn test_first_two_samples_never_boost() {
        let mut detector = NoveltyDetector::new();
        let t0 = base_time();
        assert_eq!(detector.observe("s", 1.0, t0), NOVELTY_NEUTRAL);
        assert_eq!(
            detector.observe("s", 1000.0, t0 + Duration::seconds(1)),
            NOVELTY_NEUTRAL,
            "no variance yet, no verdict yet"
        );
        println!("[PASS] test_first_two_samples_never_boost");
    }

    #[test]
    fn test_boost_decays_linearly_over_ten_seconds() {
        let mut detector = NoveltyDetector::new();
        let t0 = base_time();
        for i in 0..10 {
            detector.observe("s", 50.0 + (i % 2) as f64 * 0.2, t0 + Duration::seconds(i));
        }
        let armed_at = t0 + Duration::seconds(10);
        detector.observe("s", 500.0, armed_at);

        let test_cases = [
            (0, 0.5),
            (2_500, 0.625),
            (5_000, 0.75),
            (7_500, 0.875),
            (10_000, 1.0),
            (60_000, 1.0),
        ];
        for (offset_ms, expected) in test_cases {
            let at = armed_at + Duration::milliseconds(offset_ms);
            let value = detector.value("s", at);
            assert!(
                (value - expected).abs() < 1e-3,
                "at +{offset_ms}ms expected {expected}, got {value}"
            );
        }
        println!("[PASS] test_boost_decays_linearly_over_ten_seconds");
    }

    #[test]
    fn test_new_outlier_rearms_full_decay() {
        let mut detector = NoveltyDetector::new();
        let t0 = base_time();
        for i in 0..10 {
            detector.observe("s", 50.0 + (i % 2) as f64 * 0.2, t0 + Duration::seconds(i));
        }
        detector.observe("s", 500.0, t0 + Duration::seconds(10));

        // Half-decayed, then a second outlier lands (far below the inflated
        // mean as well as the original band).
        let later = t0 + Duration::seconds(15);
        assert!((detector.value("s", later) - 0.75).abs() < 1e-3);
        let factor = detector.observe("s", -500.0, later);
        assert_eq!(factor, NOVELTY_BOOST_FACTOR);
        assert!((detector.value("s", later + Duration::seconds(5)) - 0.75).abs() < 1e-3);
        println!("[PASS] test_new_outlier_rearms_full_decay");
    }

    #[test]
    fn test_welford_matches_two_pass_statistics() {
        let mut detector = NoveltyDetector::new();
        let t0 = base_time();
        let values = [12.0, 15.5, 11.2, 14.8, 13.3, 12.9, 16.1, 10.5];
        for (i, v) in values.iter().enumerate() {
            detector.observe("s", *v, t0 + Duration::seconds(i as i64));
        }

        let n = values.len() as f64;
        let mean: f64 = values.iter().sum::<f64>() / n;
        let variance: f64 =
            values.iter().map(|v| (v - mean).powi(2)).sum::<f64>() / (n - 1.0);

        let (count, got_mean, got_var) = detector.stats("s").unwrap();
        assert_eq!(count, values.len() as u64);
        assert!((got_mean - mean).abs() < 1e-9, "mean {got_mean} vs {mean}");
        assert!((got_var - variance).abs() < 1e-9, "var {got_var} vs {variance}");
        println!("[PASS] test_welford_matches_two_pass_statistics");
    }

    #[test]
    fn test_non_finite_observation_ignored() {
        let mut detector = NoveltyDetector::new();
        let t0 = base_time();
        detector.observe("s", 10.0, t0);
        detector.observe("s", f64::NAN, t0 + Duration::seconds(1));
        let (count, mean, _) = detector.stats("s").unwrap();
        assert_eq!(count, 1);
        assert_eq!(mean, 10.0);
        println!("[PASS] test_non_finite_observation_ignored");
    }

    #[test]
    fn test_remove_sensor_forgets_history() {
        let mut detector = NoveltyDetector::new();
        let t0 = base_time();
        detector.observe("s", 10.0, t0);
        assert_eq!(detector.sensor_count(), 1);
        assert!(detector.remove_sensor("s"));
        assert!(!detector.remove_sensor("s"));
        assert_eq!(detector.value("s", t0), NOVELTY_NEUTRAL);
        println!("[PASS] test_remove_sensor_forgets_history");
    }
}
