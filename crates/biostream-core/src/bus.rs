//! Shared signal bus connecting load-factor producers to the controller.
//!
//! One slot per sensor holding the five factor samples. Producers publish at
//! their own cadence; the controller reads whatever is present. The contract
//! is eventually consistent and loss-tolerant by design: a missing sample is
//! the neutral default, never an error, so a crashed or silent producer can
//! not stall delivery decisions.

use chrono::{DateTime, Utc};
use dashmap::DashMap;
use serde::{Deserialize, Serialize};
use tracing::{debug, warn};

/// Number of factor kinds; sized for the slot arrays.
pub const FACTOR_COUNT: usize = 5;

/// The five independent load factors feeding window computation.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum FactorKind {
    /// Statistical surprise in the sensor's values. Boost below 1.0 speeds
    /// delivery when something unusual happens.
    Novelty,
    /// Arrival-trend anticipation.
    Predictive,
    /// Cross-sensor priority share.
    Competitive,
    /// Time-of-day cadence shaping.
    Circadian,
    /// System-wide resource pressure; the only factor that can slow a
    /// stream fivefold on its own.
    LoadMultiplier,
}

impl FactorKind {
    /// Neutral value for every factor: absent data means "no adjustment".
    pub const NEUTRAL: f32 = 1.0;

    /// Inclusive clamp bounds for this kind. Producers clamp before
    /// publishing; the bus clamps again as a last resort.
    #[inline]
    pub fn bounds(&self) -> (f32, f32) {
        match self {
            Self::Novelty => (0.5, 1.0),
            Self::Predictive => (0.75, 1.2),
            Self::Competitive => (0.5, 5.0),
            Self::Circadian => (0.85, 1.2),
            Self::LoadMultiplier => (1.0, 5.0),
        }
    }

    /// Clamp `value` into this kind's bounds.
    #[inline]
    pub fn clamp(&self, value: f32) -> f32 {
        let (lo, hi) = self.bounds();
        value.clamp(lo, hi)
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Novelty => "novelty",
            Self::Predictive => "predictive",
            Self::Competitive => "competitive",
            Self::Circadian => "circadian",
            Self::LoadMultiplier => "load_multiplier",
        }
    }

    pub fn all() -> [FactorKind; FACTOR_COUNT] {
        [
            Self::Novelty,
            Self::Predictive,
            Self::Competitive,
            Self::Circadian,
            Self::LoadMultiplier,
        ]
    }

    #[inline]
    fn index(&self) -> usize {
        match self {
            Self::Novelty => 0,
            Self::Predictive => 1,
            Self::Competitive => 2,
            Self::Circadian => 3,
            Self::LoadMultiplier => 4,
        }
    }
}

/// A published factor value with its update time.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct FactorSample {
    pub value: f32,
    pub updated_at: DateTime<Utc>,
}

/// All five factors for one sensor, defaults filled in for missing slots.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct FactorSnapshot {
    pub novelty: f32,
    pub predictive: f32,
    pub competitive: f32,
    pub circadian: f32,
    pub load_multiplier: f32,
}

impl FactorSnapshot {
    /// Snapshot with every factor at its neutral default.
    pub const NEUTRAL: FactorSnapshot = FactorSnapshot {
        novelty: 1.0,
        predictive: 1.0,
        competitive: 1.0,
        circadian: 1.0,
        load_multiplier: 1.0,
    };
}

impl Default for FactorSnapshot {
    fn default() -> Self {
        Self::NEUTRAL
    }
}

#[derive(Debug, Default)]
struct SensorSlot {
    samples: [Option<FactorSample>; FACTOR_COUNT],
}

/// Concurrent per-sensor factor store.
///
/// Reads dominate (every flush reads five factors); DashMap sharding keeps
/// them lock-cheap. Unknown sensors read as all-neutral rather than erroring,
/// which is what lets producers and the controller start up in any order.
#[derive(Debug, Default)]
pub struct SignalBus {
    slots: DashMap<String, SensorSlot>,
}

impl SignalBus {
    pub fn new() -> Self {
        Self {
            slots: DashMap::new(),
        }
    }

    /// Publish a factor value for a sensor.
    ///
    /// Non-finite input is dropped (warned, slot unchanged). Out-of-bounds
    /// input is clamped and warned — producers are expected to clamp first,
    /// so a clamp here means a producer bug worth surfacing. Returns the
    /// value now effective for the slot.
    pub fn publish(&self, sensor_id: &str, kind: FactorKind, value: f32, at: DateTime<Utc>) -> f32 {
        if !value.is_finite() {
            warn!(
                sensor_id,
                kind = kind.as_str(),
                value,
                "dropping non-finite factor publish"
            );
            return self.get(sensor_id, kind);
        }

        let clamped = kind.clamp(value);
        if (clamped - value).abs() > f32::EPSILON {
            warn!(
                sensor_id,
                kind = kind.as_str(),
                value,
                clamped,
                "factor publish outside bounds, clamped"
            );
        }

        let mut slot = self.slots.entry(sensor_id.to_string()).or_default();
        slot.samples[kind.index()] = Some(FactorSample {
            value: clamped,
            updated_at: at,
        });
        clamped
    }

    /// Current value for one factor, neutral default when absent.
    #[inline]
    pub fn get(&self, sensor_id: &str, kind: FactorKind) -> f32 {
        self.sample(sensor_id, kind)
            .map(|s| s.value)
            .unwrap_or(FactorKind::NEUTRAL)
    }

    /// Raw sample (value + timestamp) for one factor, if ever published.
    pub fn sample(&self, sensor_id: &str, kind: FactorKind) -> Option<FactorSample> {
        self.slots
            .get(sensor_id)
            .and_then(|slot| slot.samples[kind.index()])
    }

    /// All five factors for a sensor in one read, defaults filled in.
    pub fn snapshot(&self, sensor_id: &str) -> FactorSnapshot {
        match self.slots.get(sensor_id) {
            Some(slot) => {
                let value = |kind: FactorKind| {
                    slot.samples[kind.index()]
                        .map(|s| s.value)
                        .unwrap_or(FactorKind::NEUTRAL)
                };
                FactorSnapshot {
                    novelty: value(FactorKind::Novelty),
                    predictive: value(FactorKind::Predictive),
                    competitive: value(FactorKind::Competitive),
                    circadian: value(FactorKind::Circadian),
                    load_multiplier: value(FactorKind::LoadMultiplier),
                }
            }
            None => FactorSnapshot::NEUTRAL,
        }
    }

    /// Clear every slot for a sensor. Returns whether anything was stored.
    pub fn remove_sensor(&self, sensor_id: &str) -> bool {
        let removed = self.slots.remove(sensor_id).is_some();
        if removed {
            debug!(sensor_id, "cleared signal bus slot");
        }
        removed
    }

    /// Number of sensors with at least one published factor.
    pub fn sensor_count(&self) -> usize {
        self.slots.len()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_missing_sensor_reads_neutral() {
        let bus = SignalBus::new();
        for kind in FactorKind::all() {
            assert_eq!(bus.get("ghost", kind), 1.0, "{kind:?} default");
        }
        assert_eq!(bus.snapshot("ghost"), FactorSnapshot::NEUTRAL);
        println!("[PASS] test_missing_sensor_reads_neutral");
    }

    #[test]
    fn test_publish_then_get() {
        let bus = SignalBus::new();
        let now = Utc::now();
        let stored = bus.publish("hr-1", FactorKind::Novelty, 0.5, now);
        assert_eq!(stored, 0.5);
        assert_eq!(bus.get("hr-1", FactorKind::Novelty), 0.5);
        // Other slots for the same sensor stay at the default.
        assert_eq!(bus.get("hr-1", FactorKind::Competitive), 1.0);
        assert_eq!(bus.sample("hr-1", FactorKind::Novelty).unwrap().updated_at, now);
        println!("[PASS] test_publish_then_get");
    }

    #[test]
    fn test_publish_clamps_to_kind_bounds() {
        let bus = SignalBus::new();
        let now = Utc::now();

        let test_cases = [
            (FactorKind::Novelty, 0.1, 0.5),
            (FactorKind::Novelty, 2.0, 1.0),
            (FactorKind::Predictive, 0.0, 0.75),
            (FactorKind::Predictive, 9.0, 1.2),
            (FactorKind::Competitive, 0.0, 0.5),
            (FactorKind::Competitive, 50.0, 5.0),
            (FactorKind::Circadian, 0.5, 0.85),
            (FactorKind::Circadian, 2.0, 1.2),
            (FactorKind::LoadMultiplier, 0.5, 1.0),
            (FactorKind::LoadMultiplier, 10.0, 5.0),
        ];

        for (kind, input, expected) in test_cases {
            let stored = bus.publish("s", kind, input, now);
            assert_eq!(stored, expected, "{kind:?} publish({input})");
            assert_eq!(bus.get("s", kind), expected);
        }
        println!("[PASS] test_publish_clamps_to_kind_bounds");
    }

    #[test]
    fn test_non_finite_publish_leaves_slot_unchanged() {
        let bus = SignalBus::new();
        let now = Utc::now();
        bus.publish("s", FactorKind::Novelty, 0.7, now);

        let effective = bus.publish("s", FactorKind::Novelty, f32::NAN, now);
        assert_eq!(effective, 0.7);
        assert_eq!(bus.get("s", FactorKind::Novelty), 0.7);

        // Never-published slot rejects non-finite and stays at default.
        let effective = bus.publish("s2", FactorKind::Circadian, f32::INFINITY, now);
        assert_eq!(effective, 1.0);
        assert!(bus.sample("s2", FactorKind::Circadian).is_none());
        println!("[PASS] test_non_finite_publish_leaves_slot_unchanged");
    }

    #[test]
    fn test_snapshot_mixes_published_and_default() {
        let bus = SignalBus::new();
        let now = Utc::now();
        bus.publish("s", FactorKind::Novelty, 0.5, now);
        bus.publish("s", FactorKind::LoadMultiplier, 3.0, now);

        let snap = bus.snapshot("s");
        assert_eq!(snap.novelty, 0.5);
        assert_eq!(snap.predictive, 1.0);
        assert_eq!(snap.competitive, 1.0);
        assert_eq!(snap.circadian, 1.0);
        assert_eq!(snap.load_multiplier, 3.0);
        println!("[PASS] test_snapshot_mixes_published_and_default");
    }

    #[test]
    fn test_remove_sensor_resets_to_defaults() {
        let bus = SignalBus::new();
        let now = Utc::now();
        bus.publish("s", FactorKind::Competitive, 2.5, now);
        assert_eq!(bus.sensor_count(), 1);

        assert!(bus.remove_sensor("s"));
        assert!(!bus.remove_sensor("s"));
        assert_eq!(bus.sensor_count(), 0);
        assert_eq!(bus.get("s", FactorKind::Competitive), 1.0);
        println!("[PASS] test_remove_sensor_resets_to_defaults");
    }
}
