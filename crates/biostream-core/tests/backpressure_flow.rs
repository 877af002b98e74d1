//! Integration tests for the adaptive delivery flow.
//!
//! These drive a REAL hub end to end: measurements in, batches out over the
//! delivery channel, with attention shifts and load reports arriving
//! mid-stream. Assertions read the delivered configs, not internal state,
//! because the delivered config is the downstream contract.

use std::time::Duration;

use chrono::Utc;
use tokio::sync::mpsc::UnboundedReceiver;

use biostream_core::{
    AttentionLevel, CoreConfig, FlushBatch, Measurement, StreamSystem, SystemLoad,
};

// ============================================================================
// HELPER FUNCTIONS
// ============================================================================

async fn hub() -> (StreamSystem, UnboundedReceiver<FlushBatch>) {
    StreamSystem::new(CoreConfig::default())
        .await
        .expect("default config must assemble")
}

fn vitals(sensor_id: &str, value: f64) -> Measurement {
    Measurement::numeric(sensor_id, "skin_temp", value, Utc::now())
}

/// Drain the delivery channel until a batch matches, with a hard deadline.
async fn wait_for(
    rx: &mut UnboundedReceiver<FlushBatch>,
    what: &str,
    pred: impl Fn(&FlushBatch) -> bool,
) -> FlushBatch {
    tokio::time::timeout(Duration::from_secs(5), async {
        loop {
            let batch = rx.recv().await.expect("delivery channel closed");
            if pred(&batch) {
                return batch;
            }
        }
    })
    .await
    .unwrap_or_else(|_| panic!("timed out waiting for {what}"))
}

// ============================================================================
// ATTENTION-DRIVEN CADENCE
// ============================================================================

#[tokio::test]
async fn test_attention_shift_drives_cadence() {
    let (system, mut rx) = hub().await;

    // Unwatched sensors idle in the none tier.
    system
        .submit_measurement(vitals("hr-1", 36.6))
        .expect("submit failed");
    let idle = wait_for(&mut rx, "initial config", |b| b.sensor_id == "hr-1").await;
    assert_eq!(idle.config.attention_level, AttentionLevel::None);
    assert!(
        idle.config.recommended_batch_window_ms >= 5_000,
        "none tier must crawl, got {} ms",
        idle.config.recommended_batch_window_ms
    );

    // A focused viewer arrives: cadence jumps inside the high tier without
    // waiting out the idle window.
    system.register_view(AttentionLevel::High, "hr-1", "dashboard");
    let hot = wait_for(&mut rx, "high-tier config", |b| {
        b.sensor_id == "hr-1" && b.config.attention_level == AttentionLevel::High
    })
    .await;
    assert!(
        (100..=500).contains(&hot.config.recommended_batch_window_ms),
        "high tier window out of range: {} ms",
        hot.config.recommended_batch_window_ms
    );
    assert_eq!(hot.config.recommended_batch_size, 1);

    // Viewer leaves: back to the crawl.
    system.unregister_view(AttentionLevel::High, "hr-1", "dashboard");
    let cold = wait_for(&mut rx, "fallback config", |b| {
        b.sensor_id == "hr-1" && b.config.attention_level == AttentionLevel::None
    })
    .await;
    assert!(cold.config.recommended_batch_window_ms >= 5_000);
    assert_eq!(cold.config.recommended_batch_size, 20);

    system.shutdown();
    println!("PASS: cadence followed the viewer through register and unregister");
}

#[tokio::test]
async fn test_watched_sensor_delivers_measurements() {
    let (system, mut rx) = hub().await;
    system.register_view(AttentionLevel::Medium, "hr-1", "ward-view");

    for n in 0..12 {
        system
            .submit_measurement(Measurement::numeric(
                "hr-1",
                "heart_rate",
                68.0 + n as f64,
                Utc::now(),
            ))
            .expect("submit failed");
    }

    let batch = wait_for(&mut rx, "measurement batch", |b| !b.measurements.is_empty()).await;
    assert_eq!(batch.sensor_id, "hr-1");
    assert!(
        batch.measurements.len() <= 5,
        "medium tier batches at most 5, got {}",
        batch.measurements.len()
    );
    // Oldest first within the batch.
    let first = batch.measurements[0].numeric_value().unwrap();
    assert_eq!(first, 68.0, "delivery must preserve arrival order");

    system.shutdown();
    println!("PASS: watched sensor delivered ordered batches inside its tier");
}

// ============================================================================
// LOAD AND MEMORY PROTECTION
// ============================================================================

#[tokio::test]
async fn test_memory_protection_saturates_then_pauses() {
    let (system, mut rx) = hub().await;
    system.register_view(AttentionLevel::High, "hr-2", "icu-monitor");
    wait_for(&mut rx, "high-tier config", |b| {
        b.sensor_id == "hr-2" && b.config.attention_level == AttentionLevel::High
    })
    .await;

    // Memory protection stretches the watched sensor toward its tier
    // ceiling but never pauses it.
    system.update_load_state(SystemLoad::Normal, true);
    let slowed = wait_for(&mut rx, "protected config", |b| {
        b.sensor_id == "hr-2" && b.config.memory_protection_active
    })
    .await;
    assert!(!slowed.config.paused, "high attention must never pause");
    assert!(
        (400..=500).contains(&slowed.config.recommended_batch_window_ms),
        "5x slowdown should saturate near the tier ceiling, got {} ms",
        slowed.config.recommended_batch_window_ms
    );

    // The moment nobody watches, the same pressure pauses the stream.
    system.unregister_view(AttentionLevel::High, "hr-2", "icu-monitor");
    let paused = wait_for(&mut rx, "paused config", |b| {
        b.sensor_id == "hr-2" && b.config.paused
    })
    .await;
    assert_eq!(paused.config.attention_level, AttentionLevel::None);
    assert_eq!(paused.config.recommended_batch_window_ms, 30_000);
    assert!(paused.measurements.is_empty());

    system.shutdown();
    println!("PASS: memory protection slowed the watched stream and paused the idle one");
}

#[tokio::test]
async fn test_pause_holds_data_and_resume_delivers_it() {
    let (system, mut rx) = hub().await;

    for n in 0..3 {
        system
            .submit_measurement(vitals("ecg-1", 36.0 + n as f64))
            .expect("submit failed");
    }

    // Critical load pauses the unwatched sensor; batches still carry the
    // config so the edge learns about the pause.
    system.update_load_state(SystemLoad::Critical, false);
    let paused = wait_for(&mut rx, "paused config", |b| {
        b.sensor_id == "ecg-1" && b.config.paused
    })
    .await;
    assert!(paused.measurements.is_empty(), "paused flushes carry no data");
    assert_eq!(paused.config.system_load, SystemLoad::Critical);

    let held = system
        .sensor_status("ecg-1")
        .expect("sensor must still be live");
    assert_eq!(held.pending, 3, "pause must hold data, not shed it");

    // Recovery resumes delivery immediately; the held measurements ride the
    // first unpaused flush.
    system.update_load_state(SystemLoad::Normal, false);
    let resumed = wait_for(&mut rx, "resume batch", |b| {
        b.sensor_id == "ecg-1" && !b.config.paused
    })
    .await;
    assert_eq!(resumed.measurements.len(), 3);

    system.shutdown();
    println!("PASS: pause held 3 measurements and resume delivered all of them");
}

// ============================================================================
// COMPETITIVE PRIORITY
// ============================================================================

#[tokio::test]
async fn test_priority_weights_separate_windows() {
    let (system, _rx) = hub().await;
    system
        .submit_measurement(vitals("vip", 36.5))
        .expect("submit failed");
    system
        .submit_measurement(vitals("bulk", 36.5))
        .expect("submit failed");

    system
        .set_sensor_priority("vip", 4.0)
        .expect("valid weight rejected");

    let vip = system.current_config("vip");
    let bulk = system.current_config("bulk");
    assert!(
        bulk.recommended_batch_window_ms > vip.recommended_batch_window_ms,
        "outweighed sensor must flush slower: vip {} ms vs bulk {} ms",
        vip.recommended_batch_window_ms,
        bulk.recommended_batch_window_ms
    );

    system.shutdown();
    println!(
        "PASS: 4:1 priority split windows {} ms vs {} ms",
        vip.recommended_batch_window_ms, bulk.recommended_batch_window_ms
    );
}

// ============================================================================
// LIFECYCLE
// ============================================================================

#[tokio::test]
async fn test_idle_sensor_destroyed_after_ttl() {
    let config = CoreConfig {
        sensor_ttl: Duration::from_secs(1),
        sweep_interval: Duration::from_millis(200),
        ..CoreConfig::default()
    };
    let (system, _rx) = StreamSystem::new(config)
        .await
        .expect("short-ttl config must assemble");

    system
        .submit_measurement(vitals("transient", 36.8))
        .expect("submit failed");
    assert_eq!(system.sensor_count(), 1);

    // Poll rather than sleep a fixed amount; the sweeper owns the timing.
    let deadline = tokio::time::Instant::now() + Duration::from_secs(5);
    while system.sensor_count() > 0 {
        assert!(
            tokio::time::Instant::now() < deadline,
            "sensor outlived its ttl"
        );
        tokio::time::sleep(Duration::from_millis(100)).await;
    }

    assert!(system.sensor_status("transient").is_none());
    assert_eq!(system.bus().sensor_count(), 0, "bus slot must be scrubbed");

    system.shutdown();
    println!("PASS: idle sensor destroyed by the ttl sweep, stores scrubbed");
}
