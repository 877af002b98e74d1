//! Simulated ward: three sensors, one viewer coming and going, a load spike.
//!
//! Walks the hub through its whole behavior range and prints what the
//! downstream transport would see. Run with:
//!
//! `cargo run -p biostream-core --example simulated_stream`
//!
//! Set `RUST_LOG=biostream_core=debug` to watch the internal decisions.

use std::time::Duration;

use chrono::Utc;
use rand::Rng;
use tracing::warn;

use biostream_core::{
    AttentionLevel, CoreConfig, CoreResult, Measurement, SignalClass, StreamSystem, SystemLoad,
};

/// Simulate one sensor: a noisy waveform submitted at a fixed rate.
fn spawn_sensor(
    system: StreamSystem,
    sensor_id: &'static str,
    attribute: &'static str,
    base: f64,
    amplitude: f64,
    period: Duration,
) -> tokio::task::JoinHandle<()> {
    tokio::spawn(async move {
        let mut tick: u64 = 0;
        loop {
            // ThreadRng is not Send; keep it scoped away from the await.
            let value = {
                let mut rng = rand::rng();
                base + amplitude * (tick as f64 * 0.35).sin() + rng.random_range(-0.3..0.3)
            };
            let m = Measurement::numeric(sensor_id, attribute, value, Utc::now());
            if let Err(err) = system.submit_measurement(m) {
                warn!(sensor_id, %err, "simulated submit failed");
            }
            tick += 1;
            tokio::time::sleep(period).await;
        }
    })
}

fn print_sync(system: &StreamSystem) {
    let sync = system.current_sync(SignalClass::Respiration);
    println!(
        "  respiration sync: R = {:.3} (smoothed {:.3}) across {} sensors",
        sync.order_parameter, sync.smoothed_order_parameter, sync.tracked_sensors
    );
}

#[tokio::main]
async fn main() -> CoreResult<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "biostream_core=info".into()),
        )
        .init();

    let (system, mut deliveries) = StreamSystem::new(CoreConfig::default()).await?;

    // Downstream transport stand-in: print every delivered batch.
    let printer = tokio::spawn(async move {
        while let Some(batch) = deliveries.recv().await {
            println!(
                "  -> {} [{}] window {} ms, batch {}, {} measurement(s){}",
                batch.sensor_id,
                batch.config.attention_level,
                batch.config.recommended_batch_window_ms,
                batch.config.recommended_batch_size,
                batch.measurements.len(),
                if batch.config.paused { " [PAUSED]" } else { "" },
            );
        }
    });

    let sensors = vec![
        spawn_sensor(
            system.clone(),
            "hr-alpha",
            "heart_rate",
            72.0,
            4.0,
            Duration::from_millis(80),
        ),
        spawn_sensor(
            system.clone(),
            "resp-alpha",
            "respiration",
            14.0,
            6.0,
            Duration::from_millis(200),
        ),
        spawn_sensor(
            system.clone(),
            "resp-beta",
            "respiration",
            15.0,
            6.0,
            Duration::from_millis(200),
        ),
    ];

    println!("== stage 1: nobody watching (none tier, slow crawl) ==");
    tokio::time::sleep(Duration::from_secs(3)).await;

    println!("== stage 2: clinician opens hr-alpha full-screen ==");
    system.register_view(AttentionLevel::High, "hr-alpha", "clinician-1");
    system.register_view(AttentionLevel::Low, "resp-alpha", "clinician-1");
    system.register_sync_viewer(SignalClass::Respiration);
    tokio::time::sleep(Duration::from_secs(4)).await;
    print_sync(&system);

    println!("== stage 3: load spike with memory protection ==");
    system.update_load_state(SystemLoad::Critical, true);
    tokio::time::sleep(Duration::from_secs(3)).await;

    println!("== stage 4: recovery ==");
    system.update_load_state(SystemLoad::Normal, false);
    tokio::time::sleep(Duration::from_secs(3)).await;
    print_sync(&system);

    println!("== summary ==");
    for id in system.sensor_ids() {
        if let Some(status) = system.sensor_status(&id) {
            println!(
                "  {} [{}] pending {}, dropped {}",
                status.sensor_id, status.attention_level, status.pending, status.dropped
            );
        }
    }
    println!(
        "  {} flushes total, {} measurements dropped",
        system.flush_total(),
        system.dropped_total()
    );

    for handle in sensors {
        handle.abort();
    }
    printer.abort();
    system.shutdown();
    Ok(())
}
