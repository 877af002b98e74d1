//! Adaptive batch-window computation.
//!
//! The controller folds the attention tier, the five bus factors, and the
//! current load state into one [`BackpressureConfig`]. It holds no per-sensor
//! state of its own: everything it needs is read at computation time, so a
//! config is a pure function of (tier table, bus snapshot, load state, clock)
//! and any number of computations can run concurrently.

use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;

use chrono::{DateTime, Utc};
use parking_lot::RwLock;
use tracing::{debug, info};

use super::tiers::AttentionTier;
use crate::attention::AttentionRegistry;
use crate::bus::SignalBus;
use crate::types::{AttentionLevel, BackpressureConfig, SystemLoad};

// ============================================================================
// CONSTANTS
// ============================================================================

/// Floor for the combined biomimetic factor product.
pub const BIO_FACTOR_FLOOR: f32 = 0.3;

/// Ceiling for the combined biomimetic factor product.
pub const BIO_FACTOR_CEIL: f32 = 3.0;

/// Extra window stretch for sensors that stay live under memory protection.
pub const MEMORY_PROTECTION_SLOWDOWN: f64 = 5.0;

/// Externally reported resource state.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct LoadState {
    pub system_load: SystemLoad,
    pub memory_protection_active: bool,
}

impl LoadState {
    /// Background sensors pause when either trigger is active.
    #[inline]
    pub fn pause_trigger(&self) -> bool {
        self.memory_protection_active || self.system_load == SystemLoad::Critical
    }
}

/// Per-sensor batch-window controller.
pub struct BatchWindowController {
    bus: Arc<SignalBus>,
    registry: Arc<AttentionRegistry>,
    base_window_ms: u64,
    load_state: RwLock<LoadState>,
    recompute_count: AtomicU64,
    pause_count: AtomicU64,
}

impl BatchWindowController {
    pub fn new(bus: Arc<SignalBus>, registry: Arc<AttentionRegistry>, base_window_ms: u64) -> Self {
        Self {
            bus,
            registry,
            base_window_ms,
            load_state: RwLock::new(LoadState::default()),
            recompute_count: AtomicU64::new(0),
            pause_count: AtomicU64::new(0),
        }
    }

    /// Record a load-state report. Returns the previous state so callers can
    /// react to transitions.
    pub fn update_load_state(
        &self,
        system_load: SystemLoad,
        memory_protection_active: bool,
    ) -> LoadState {
        let next = LoadState {
            system_load,
            memory_protection_active,
        };
        let previous = {
            let mut guard = self.load_state.write();
            std::mem::replace(&mut *guard, next)
        };
        if previous != next {
            info!(
                system_load = system_load.as_str(),
                memory_protection_active, "load state changed"
            );
        }
        previous
    }

    /// Current load state.
    pub fn load_state(&self) -> LoadState {
        *self.load_state.read()
    }

    /// Compute a fresh config for a sensor, stamped with the current time.
    pub fn compute_config(&self, sensor_id: &str) -> BackpressureConfig {
        self.compute_config_at(sensor_id, Utc::now())
    }

    /// Compute a fresh config stamped with a caller-supplied instant.
    ///
    /// The pipeline, in order: tier lookup, bus snapshot (missing factors
    /// read neutral), bio product clamp, window multiply, memory-protection
    /// stretch, tier clamp. Paused sensors skip the arithmetic and park at
    /// the tier ceiling — the most conservative cadence that still honors
    /// the tier contract.
    pub fn compute_config_at(&self, sensor_id: &str, at: DateTime<Utc>) -> BackpressureConfig {
        let level = self.registry.get_level(sensor_id);
        let tier = AttentionTier::for_level(level);
        let factors = self.bus.snapshot(sensor_id);
        let state = self.load_state();

        let combined_bio = (factors.novelty
            * factors.predictive
            * factors.competitive
            * factors.circadian)
            .clamp(BIO_FACTOR_FLOOR, BIO_FACTOR_CEIL);

        let paused = state.pause_trigger() && level.is_background();

        let window_ms = if paused {
            tier.max_window_ms
        } else {
            let mut window = self.base_window_ms as f64
                * tier.multiplier as f64
                * factors.load_multiplier as f64
                * combined_bio as f64;
            if state.memory_protection_active {
                window *= MEMORY_PROTECTION_SLOWDOWN;
            }
            (window.round() as u64).clamp(tier.min_window_ms, tier.max_window_ms)
        };

        self.recompute_count.fetch_add(1, Ordering::Relaxed);
        if paused {
            self.pause_count.fetch_add(1, Ordering::Relaxed);
        }
        debug!(
            sensor_id,
            level = level.as_str(),
            combined_bio,
            load_multiplier = factors.load_multiplier,
            window_ms,
            paused,
            "computed backpressure config"
        );

        BackpressureConfig {
            attention_level: level,
            system_load: state.system_load,
            memory_protection_active: state.memory_protection_active,
            paused,
            recommended_batch_window_ms: window_ms,
            recommended_batch_size: tier.batch_size,
            load_multiplier: factors.load_multiplier,
            timestamp: at.timestamp_millis(),
        }
    }

    /// Total configs computed since startup.
    pub fn recompute_count(&self) -> u64 {
        self.recompute_count.load(Ordering::Relaxed)
    }

    /// How many of those were pause decisions.
    pub fn pause_count(&self) -> u64 {
        self.pause_count.load(Ordering::Relaxed)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::bus::FactorKind;

    fn fixture() -> (Arc<SignalBus>, Arc<AttentionRegistry>, BatchWindowController) {
        let bus = Arc::new(SignalBus::new());
        let registry = Arc::new(AttentionRegistry::new());
        let controller = BatchWindowController::new(bus.clone(), registry.clone(), 1000);
        (bus, registry, controller)
    }

    fn set_level(registry: &AttentionRegistry, sensor: &str, level: AttentionLevel) {
        if level != AttentionLevel::None {
            registry.register_view(level, sensor, "test-viewer");
        }
    }

    #[test]
    fn test_neutral_factors_per_tier() {
        println!("\n=== neutral window per tier (base 1000 ms) ===");
        let test_cases = [
            (AttentionLevel::High, 200),
            (AttentionLevel::Medium, 400),
            (AttentionLevel::Low, 4_000),
            (AttentionLevel::None, 10_000),
        ];

        for (level, expected_ms) in test_cases {
            let (_bus, registry, controller) = fixture();
            set_level(&registry, "s", level);
            let config = controller.compute_config("s");
            println!("  {level}: {} ms", config.recommended_batch_window_ms);
            assert_eq!(config.recommended_batch_window_ms, expected_ms);
            assert_eq!(config.attention_level, level);
            assert!(!config.paused);
            assert_eq!(config.load_multiplier, 1.0);
        }
        println!("RESULT: PASS - neutral cadence scales by tier multiplier");
    }

    #[test]
    fn test_window_always_inside_tier_bounds() {
        // Sweep every tier against extreme factor corners; the clamp must
        // hold regardless of what producers publish.
        let novelty = [0.5_f32, 1.0];
        let predictive = [0.75_f32, 1.2];
        let competitive = [0.5_f32, 5.0];
        let circadian = [0.85_f32, 1.2];
        let load = [1.0_f32, 5.0];
        let now = Utc::now();

        for level in AttentionLevel::all() {
            let tier = AttentionTier::for_level(level);
            for n in novelty {
                for p in predictive {
                    for c in competitive {
                        for ci in circadian {
                            for lm in load {
                                let (bus, registry, controller) = fixture();
                                set_level(&registry, "s", level);
                                bus.publish("s", FactorKind::Novelty, n, now);
                                bus.publish("s", FactorKind::Predictive, p, now);
                                bus.publish("s", FactorKind::Competitive, c, now);
                                bus.publish("s", FactorKind::Circadian, ci, now);
                                bus.publish("s", FactorKind::LoadMultiplier, lm, now);

                                let config = controller.compute_config("s");
                                let w = config.recommended_batch_window_ms;
                                assert!(
                                    (tier.min_window_ms..=tier.max_window_ms).contains(&w),
                                    "{level} n={n} p={p} c={c} ci={ci} lm={lm}: {w} ms \
                                     outside [{}, {}]",
                                    tier.min_window_ms,
                                    tier.max_window_ms
                                );
                                assert_eq!(config.recommended_batch_size, tier.batch_size);
                            }
                        }
                    }
                }
            }
        }
        println!("[PASS] test_window_always_inside_tier_bounds");
    }

    #[test]
    fn test_pause_rule_truth_table() {
        println!("\n=== pause rule: trigger x attention ===");
        let triggers = [
            (SystemLoad::Normal, false, false),
            (SystemLoad::Normal, true, true),
            (SystemLoad::Critical, false, true),
            (SystemLoad::Critical, true, true),
            (SystemLoad::High, false, false),
            (SystemLoad::Elevated, false, false),
        ];

        for (load, protection, trigger_active) in triggers {
            for level in AttentionLevel::all() {
                let (_bus, registry, controller) = fixture();
                set_level(&registry, "s", level);
                controller.update_load_state(load, protection);

                let config = controller.compute_config("s");
                let expected = trigger_active && level.is_background();
                println!(
                    "  load={load} protection={protection} level={level} -> paused={}",
                    config.paused
                );
                assert_eq!(
                    config.paused, expected,
                    "load={load} protection={protection} level={level}"
                );
                // Paused implies background level and an active trigger.
                if config.paused {
                    assert!(level.is_background());
                    assert!(trigger_active);
                }
            }
        }
        println!("RESULT: PASS - pause requires trigger AND background level");
    }

    #[test]
    fn test_paused_sensor_parks_at_tier_ceiling() {
        // ECG nobody watches, memory protection on: parked at 30 s, batch
        // stays at the tier's 20.
        let (_bus, _registry, controller) = fixture();
        controller.update_load_state(SystemLoad::Normal, true);

        let config = controller.compute_config("ecg-1");
        assert!(config.paused);
        assert_eq!(config.attention_level, AttentionLevel::None);
        assert_eq!(config.recommended_batch_window_ms, 30_000);
        assert_eq!(config.recommended_batch_size, 20);
        println!("[PASS] test_paused_sensor_parks_at_tier_ceiling");
    }

    #[test]
    fn test_memory_protection_stretches_live_sensors() {
        // Focused viewer under memory protection: 1000·0.2·5 = 1000 ms,
        // clamped to the high tier's 500 ms cap. Not paused.
        let (_bus, registry, controller) = fixture();
        set_level(&registry, "hr-2", AttentionLevel::High);
        controller.update_load_state(SystemLoad::Normal, true);

        let config = controller.compute_config("hr-2");
        assert!(!config.paused);
        assert!(config.memory_protection_active);
        assert_eq!(config.recommended_batch_window_ms, 500);
        assert_eq!(config.recommended_batch_size, 1);

        // Medium gets the same stretch: 1000·0.4·5 = 2000 → cap 500.
        set_level(&registry, "hr-3", AttentionLevel::Medium);
        let config = controller.compute_config("hr-3");
        assert!(!config.paused);
        assert_eq!(config.recommended_batch_window_ms, 500);
        println!("[PASS] test_memory_protection_stretches_live_sensors");
    }

    #[test]
    fn test_bio_product_clamped_both_ends() {
        let now = Utc::now();

        // All four at their floors: 0.5·0.75·0.5·0.85 = 0.159 → floor 0.3.
        // Low tier: 1000·4.0·0.3 = 1200 → clamped up to 2000.
        let (bus, registry, controller) = fixture();
        set_level(&registry, "s", AttentionLevel::Low);
        bus.publish("s", FactorKind::Novelty, 0.5, now);
        bus.publish("s", FactorKind::Predictive, 0.75, now);
        bus.publish("s", FactorKind::Competitive, 0.5, now);
        bus.publish("s", FactorKind::Circadian, 0.85, now);
        let config = controller.compute_config("s");
        assert_eq!(config.recommended_batch_window_ms, 2_000);

        // Competitive at 5.0 with the rest ≥ 1: 1.0·1.2·5.0·1.2 = 7.2 →
        // ceiling 3.0. Low tier: 1000·4.0·3.0 = 12000 → clamped to 10000.
        let (bus, registry, controller) = fixture();
        set_level(&registry, "s", AttentionLevel::Low);
        bus.publish("s", FactorKind::Predictive, 1.2, now);
        bus.publish("s", FactorKind::Competitive, 5.0, now);
        bus.publish("s", FactorKind::Circadian, 1.2, now);
        let config = controller.compute_config("s");
        assert_eq!(config.recommended_batch_window_ms, 10_000);

        // A mid-range product passes through unclamped:
        // 0.5·0.75·1.0·0.85 = 0.31875; none tier: 10000·0.31875 = 3188 →
        // clamped up to the 5000 floor.
        let (bus, _registry, controller) = fixture();
        bus.publish("s", FactorKind::Novelty, 0.5, now);
        bus.publish("s", FactorKind::Predictive, 0.75, now);
        bus.publish("s", FactorKind::Circadian, 0.85, now);
        let config = controller.compute_config("s");
        assert_eq!(config.recommended_batch_window_ms, 5_000);
        println!("[PASS] test_bio_product_clamped_both_ends");
    }

    #[test]
    fn test_unknown_sensor_reads_all_defaults() {
        // No registrations, no published factors: the controller still
        // answers, at the none tier with neutral factors.
        let (_bus, _registry, controller) = fixture();
        let config = controller.compute_config("never-seen");
        assert_eq!(config.attention_level, AttentionLevel::None);
        assert_eq!(config.recommended_batch_window_ms, 10_000);
        assert!(!config.paused);
        println!("[PASS] test_unknown_sensor_reads_all_defaults");
    }

    #[test]
    fn test_load_multiplier_echoed_and_applied() {
        let now = Utc::now();
        let (bus, registry, controller) = fixture();
        set_level(&registry, "s", AttentionLevel::Low);
        bus.publish("s", FactorKind::LoadMultiplier, 2.0, now);

        let config = controller.compute_config("s");
        // 1000·4.0·2.0 = 8000, inside the low tier range.
        assert_eq!(config.recommended_batch_window_ms, 8_000);
        assert_eq!(config.load_multiplier, 2.0);
        println!("[PASS] test_load_multiplier_echoed_and_applied");
    }

    #[test]
    fn test_counters_and_timestamps() {
        let (_bus, _registry, controller) = fixture();
        controller.update_load_state(SystemLoad::Critical, false);

        let at = Utc::now();
        let config = controller.compute_config_at("s", at);
        assert_eq!(config.timestamp, at.timestamp_millis());
        assert_eq!(controller.recompute_count(), 1);
        assert_eq!(controller.pause_count(), 1, "none-level sensor pauses under critical");

        controller.update_load_state(SystemLoad::Normal, false);
        let _ = controller.compute_config("s");
        assert_eq!(controller.recompute_count(), 2);
        assert_eq!(controller.pause_count(), 1);
        println!("[PASS] test_counters_and_timestamps");
    }

    #[test]
    fn test_update_load_state_returns_previous() {
        let (_bus, _registry, controller) = fixture();
        let previous = controller.update_load_state(SystemLoad::High, true);
        assert_eq!(previous, LoadState::default());

        let previous = controller.update_load_state(SystemLoad::Normal, false);
        assert_eq!(previous.system_load, SystemLoad::High);
        assert!(previous.memory_protection_active);
        assert_eq!(controller.load_state(), LoadState::default());
        println!("[PASS] test_update_load_state_returns_previous");
    }
}
