//! The stream hub: ingest, factor refresh, flush scheduling, delivery.
//!
//! [`StreamSystem`] owns every component and runs the glue the components
//! deliberately don't: measurement routing, per-sensor flush timers, the
//! attention-shift listener, slow-factor republish, and TTL cleanup. All
//! cross-component coupling lives here so the components stay testable in
//! isolation.
//!
//! Concurrency model: one `parking_lot` mutex per sensor record serializes
//! that sensor's queue and timer, the factor producers sit behind their own
//! mutexes, and background tasks hold only a [`Weak`] reference so dropping
//! the hub winds everything down.

use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Weak};

use chrono::{DateTime, Utc};
use dashmap::mapref::entry::Entry;
use dashmap::DashMap;
use parking_lot::Mutex;
use tokio::sync::mpsc::{self, UnboundedReceiver, UnboundedSender};
use tokio::task::JoinHandle;
use tracing::{debug, info};
use uuid::Uuid;

use crate::attention::{AttentionRegistry, AttentionShift};
use crate::backpressure::BatchWindowController;
use crate::bus::{FactorKind, SignalBus};
use crate::config::CoreConfig;
use crate::error::{CoreError, CoreResult};
use crate::factors::{
    CircadianRhythm, HomeostaticTuner, LoadPredictor, NoveltyDetector, ResourceArbiter,
};
use crate::stream::record::{SensorRecord, SensorStatus};
use crate::sync::{PhaseSyncEngine, SyncState};
use crate::types::{
    AttentionLevel, BackpressureConfig, FlushBatch, Measurement, SignalClass, SystemLoad,
};

// ============================================================================
// Hub
// ============================================================================

/// Ingest-to-delivery orchestrator.
///
/// Cheap to clone; all clones share one hub. Create it inside a Tokio
/// runtime — flush timers and the background loops are spawned tasks.
#[derive(Clone)]
pub struct StreamSystem {
    inner: Arc<StreamInner>,
}

struct StreamInner {
    config: CoreConfig,
    /// `config.sensor_ttl` converted once; chrono arithmetic needs it signed.
    sensor_ttl: chrono::Duration,

    bus: Arc<SignalBus>,
    registry: Arc<AttentionRegistry>,
    controller: Arc<BatchWindowController>,
    sync: Arc<PhaseSyncEngine>,

    novelty: Mutex<NoveltyDetector>,
    arbiter: Mutex<ResourceArbiter>,
    predictor: Mutex<LoadPredictor>,
    circadian: CircadianRhythm,
    homeostat: Mutex<HomeostaticTuner>,

    sensors: DashMap<String, Arc<Mutex<SensorRecord>>>,
    delivery_tx: UnboundedSender<FlushBatch>,

    dropped_total: AtomicU64,
    flush_total: AtomicU64,
    background: Mutex<Vec<JoinHandle<()>>>,
}

impl StreamSystem {
    /// Assemble the hub and spawn its background loops.
    ///
    /// Returns the hub plus the delivery side of the flush channel; the
    /// caller owns draining it. Batches sent after the receiver is dropped
    /// are discarded quietly.
    pub async fn new(config: CoreConfig) -> CoreResult<(Self, UnboundedReceiver<FlushBatch>)> {
        config.validate()?;
        let sensor_ttl = chrono::Duration::from_std(config.sensor_ttl)
            .map_err(|_| CoreError::config("sensor_ttl does not fit a signed duration"))?;

        let bus = Arc::new(SignalBus::new());
        let registry = Arc::new(AttentionRegistry::new());
        let controller = Arc::new(BatchWindowController::new(
            Arc::clone(&bus),
            Arc::clone(&registry),
            config.base_window_ms,
        ));
        let sync = Arc::new(PhaseSyncEngine::new());
        let (delivery_tx, delivery_rx) = mpsc::unbounded_channel();
        let shifts = registry.subscribe_shifts();

        let inner = Arc::new(StreamInner {
            sensor_ttl,
            bus,
            registry,
            controller,
            sync,
            novelty: Mutex::new(NoveltyDetector::new()),
            arbiter: Mutex::new(ResourceArbiter::new()),
            predictor: Mutex::new(LoadPredictor::new()),
            circadian: CircadianRhythm::new(),
            homeostat: Mutex::new(HomeostaticTuner::new()),
            sensors: DashMap::new(),
            delivery_tx,
            dropped_total: AtomicU64::new(0),
            flush_total: AtomicU64::new(0),
            background: Mutex::new(Vec::new()),
            config,
        });

        let tasks = vec![
            tokio::spawn(shift_loop(Arc::downgrade(&inner), shifts)),
            tokio::spawn(producer_loop(
                Arc::downgrade(&inner),
                inner.config.producer_tick,
            )),
            tokio::spawn(sweep_loop(
                Arc::downgrade(&inner),
                inner.config.sweep_interval,
            )),
        ];
        *inner.background.lock() = tasks;

        info!(
            base_window_ms = inner.config.base_window_ms,
            sensor_ttl_secs = inner.config.sensor_ttl.as_secs(),
            "stream hub initialized"
        );
        Ok((Self { inner }, delivery_rx))
    }

    /// Ingest one measurement.
    ///
    /// First sight of a sensor id creates its record, enrolls it with the
    /// competitive arbiter, and emits an initial config-only batch so the
    /// downstream learns the cadence immediately. Sync-qualifying attributes
    /// must carry a finite numeric payload; malformed ones are rejected
    /// before any state is touched. Other payloads ride along opaquely.
    pub fn submit_measurement(&self, measurement: Measurement) -> CoreResult<()> {
        self.inner.submit(measurement)
    }

    /// Register a viewer's interest in a sensor at an attention tier.
    ///
    /// Creates the sensor record if this is the first sign of life. Returns
    /// the effective level after the update.
    pub fn register_view(
        &self,
        level: AttentionLevel,
        sensor_id: &str,
        viewer_id: &str,
    ) -> AttentionLevel {
        self.inner.ensure_sensor(sensor_id, Utc::now());
        self.inner.registry.register_view(level, sensor_id, viewer_id)
    }

    /// Remove one `(tier, viewer)` registration. Unknown pairs are no-ops.
    pub fn unregister_view(
        &self,
        level: AttentionLevel,
        sensor_id: &str,
        viewer_id: &str,
    ) -> AttentionLevel {
        self.inner.registry.unregister_view(level, sensor_id, viewer_id)
    }

    /// Record an external load report and push fresh configs to every live
    /// sensor. Pause decisions take effect on this call, not a window later.
    pub fn update_load_state(&self, system_load: SystemLoad, memory_protection_active: bool) {
        self.inner
            .apply_load_state(system_load, memory_protection_active);
    }

    /// Set a sensor's competitive priority weight. Finite and positive only.
    pub fn set_sensor_priority(&self, sensor_id: &str, weight: f32) -> CoreResult<()> {
        self.inner.set_priority(sensor_id, weight)
    }

    /// Declare a viewer for a signal class's sync computation.
    pub fn register_sync_viewer(&self, class: SignalClass) -> usize {
        self.inner.sync.add_viewer(class)
    }

    /// Withdraw a sync viewer. Saturates at zero.
    pub fn unregister_sync_viewer(&self, class: SignalClass) -> usize {
        self.inner.sync.remove_viewer(class)
    }

    /// Latest synchronization state for a class.
    pub fn current_sync(&self, class: SignalClass) -> SyncState {
        self.inner.sync.current_sync(class)
    }

    /// Compute a sensor's delivery config right now, without flushing.
    pub fn current_config(&self, sensor_id: &str) -> BackpressureConfig {
        self.inner.controller.compute_config(sensor_id)
    }

    /// Runtime snapshot of one sensor, or `None` if it isn't live.
    pub fn sensor_status(&self, sensor_id: &str) -> Option<SensorStatus> {
        let record = self.inner.sensors.get(sensor_id)?;
        let level = self.inner.registry.get_level(sensor_id);
        let status = record.value().lock().status(level);
        Some(status)
    }

    /// Ids of all live sensors.
    pub fn sensor_ids(&self) -> Vec<String> {
        self.inner.sensors.iter().map(|e| e.key().clone()).collect()
    }

    pub fn sensor_count(&self) -> usize {
        self.inner.sensors.len()
    }

    /// Measurements evicted from full pending queues since startup.
    pub fn dropped_total(&self) -> u64 {
        self.inner.dropped_total.load(Ordering::Relaxed)
    }

    /// Batches emitted since startup, config-only ones included.
    pub fn flush_total(&self) -> u64 {
        self.inner.flush_total.load(Ordering::Relaxed)
    }

    /// Destroy a sensor and scrub it from every store. Returns whether it
    /// existed. Idempotent.
    pub fn deregister_sensor(&self, sensor_id: &str) -> bool {
        self.inner.remove_sensor(sensor_id)
    }

    /// Stop background loops and cancel all pending flush timers. Sensor
    /// state stays readable afterwards; ingest still works but nothing
    /// flushes on a timer.
    pub fn shutdown(&self) {
        self.inner.shutdown();
    }

    /// Shared handle to the factor bus, for wiring external producers.
    pub fn bus(&self) -> Arc<SignalBus> {
        Arc::clone(&self.inner.bus)
    }

    /// Shared handle to the attention registry.
    pub fn registry(&self) -> Arc<AttentionRegistry> {
        Arc::clone(&self.inner.registry)
    }

    /// Shared handle to the batch-window controller.
    pub fn controller(&self) -> Arc<BatchWindowController> {
        Arc::clone(&self.inner.controller)
    }

    /// Shared handle to the phase-sync engine.
    pub fn sync_engine(&self) -> Arc<PhaseSyncEngine> {
        Arc::clone(&self.inner.sync)
    }
}

// ============================================================================
// Internals
// ============================================================================

impl StreamInner {
    fn submit(self: &Arc<Self>, measurement: Measurement) -> CoreResult<()> {
        let sensor_id = measurement.sensor_id.clone();
        let at = measurement.timestamp;

        // Qualifying attributes feed phase sync and must parse; reject
        // before creating any per-sensor state.
        if let Some(class) = SignalClass::from_attribute(&measurement.attribute) {
            let value = measurement.require_numeric()?;
            self.sync.ingest(&sensor_id, class, value, at)?;
        }

        let record = self.ensure_sensor(&sensor_id, at);

        if let Some(value) = measurement.numeric_value() {
            let factor = self.novelty.lock().observe(&sensor_id, value, at);
            self.bus.publish(&sensor_id, FactorKind::Novelty, factor, at);
        }
        if let Some(factor) = self.predictor.lock().observe_arrival(&sensor_id, at) {
            self.bus
                .publish(&sensor_id, FactorKind::Predictive, factor, at);
        }

        let mut rec = record.lock();
        rec.touch(at);
        if let Some(evicted) = rec.enqueue(measurement) {
            let dropped_total = self.dropped_total.fetch_add(1, Ordering::Relaxed) + 1;
            debug!(
                sensor_id = %evicted.sensor_id,
                pending = rec.pending(),
                dropped_total,
                "pending queue full, evicted oldest measurement"
            );
        }
        // Creation already scheduled a timer; this covers records whose
        // timer was cancelled by shutdown and then saw new traffic.
        if rec.flush_task.is_none() {
            let window = rec
                .last_config
                .as_ref()
                .map(BackpressureConfig::window)
                .unwrap_or_else(|| std::time::Duration::from_millis(self.config.base_window_ms));
            self.schedule_flush(&sensor_id, &mut rec, window);
        }
        Ok(())
    }

    /// Fetch a sensor's record, creating it on first sight.
    ///
    /// Creation enrolls the sensor with the arbiter (which moves every
    /// sensor's competitive share), publishes its starting factors, and
    /// emits an initial flush so the cadence contract reaches downstream
    /// before the first window elapses.
    fn ensure_sensor(self: &Arc<Self>, sensor_id: &str, at: DateTime<Utc>) -> Arc<Mutex<SensorRecord>> {
        if let Some(record) = self.sensors.get(sensor_id) {
            return Arc::clone(record.value());
        }

        let (record, created) = match self.sensors.entry(sensor_id.to_string()) {
            Entry::Occupied(entry) => (Arc::clone(entry.get()), false),
            Entry::Vacant(entry) => {
                let record = Arc::new(Mutex::new(SensorRecord::new(
                    sensor_id,
                    self.config.max_pending_measurements,
                    at,
                )));
                entry.insert(Arc::clone(&record));
                (record, true)
            }
        };

        if created {
            info!(sensor_id, "sensor registered");
            let shares = {
                let mut arbiter = self.arbiter.lock();
                arbiter.add_sensor(sensor_id);
                arbiter.factors()
            };
            for (id, factor) in shares {
                self.bus.publish(&id, FactorKind::Competitive, factor, at);
            }
            self.flush_sensor(sensor_id);
        }
        record
    }

    /// Flush one sensor now: refresh slow factors, compute a fresh config,
    /// drain up to the batch size (nothing while paused), deliver, and
    /// schedule the next flush at the new window.
    fn flush_sensor(self: &Arc<Self>, sensor_id: &str) {
        let Some(record) = self
            .sensors
            .get(sensor_id)
            .map(|entry| Arc::clone(entry.value()))
        else {
            return;
        };

        let now = Utc::now();
        self.refresh_slow_factors(sensor_id, now);
        let config = self.controller.compute_config_at(sensor_id, now);
        let window = config.window();

        let mut rec = record.lock();
        let measurements = if config.paused {
            Vec::new()
        } else {
            rec.drain(config.recommended_batch_size)
        };
        let delivered = measurements.len();
        let batch = FlushBatch {
            id: Uuid::new_v4(),
            sensor_id: sensor_id.to_string(),
            config: config.clone(),
            measurements,
        };
        if self.delivery_tx.send(batch).is_err() {
            debug!(sensor_id, "delivery receiver gone, discarding batch");
        }
        rec.last_config = Some(config);
        self.flush_total.fetch_add(1, Ordering::Relaxed);
        debug!(
            sensor_id,
            delivered,
            pending = rec.pending(),
            window_ms = window.as_millis() as u64,
            "flushed sensor"
        );
        self.schedule_flush(sensor_id, &mut rec, window);
    }

    /// Replace the sensor's pending flush timer with one firing after
    /// `delay`.
    ///
    /// When called from inside a running flush task, `cancel_flush` aborts
    /// that very task; safe because no await point remains on its path.
    fn schedule_flush(
        self: &Arc<Self>,
        sensor_id: &str,
        record: &mut SensorRecord,
        delay: std::time::Duration,
    ) {
        record.cancel_flush();
        let weak = Arc::downgrade(self);
        let id = sensor_id.to_string();
        record.flush_task = Some(tokio::spawn(async move {
            tokio::time::sleep(delay).await;
            if let Some(inner) = weak.upgrade() {
                inner.flush_sensor(&id);
            }
        }));
    }

    /// Republish the factors that drift without ingest traffic: circadian
    /// position, the homeostatic multiplier, and novelty boost decay.
    fn refresh_slow_factors(&self, sensor_id: &str, now: DateTime<Utc>) {
        let circadian = self.circadian.factor_at(now);
        self.bus
            .publish(sensor_id, FactorKind::Circadian, circadian, now);
        let multiplier = self.homeostat.lock().multiplier();
        self.bus
            .publish(sensor_id, FactorKind::LoadMultiplier, multiplier, now);
        let novelty = self.novelty.lock().value(sensor_id, now);
        self.bus.publish(sensor_id, FactorKind::Novelty, novelty, now);
    }

    fn republish_slow_factors(&self) {
        let now = Utc::now();
        let ids: Vec<String> = self.sensors.iter().map(|e| e.key().clone()).collect();
        for id in ids {
            self.refresh_slow_factors(&id, now);
        }
    }

    /// Apply a load report and flush every sensor so the new state lands in
    /// delivered configs immediately. The homeostatic multiplier moves on
    /// every report, not only on level transitions, so this never shortcuts.
    fn apply_load_state(self: &Arc<Self>, system_load: SystemLoad, memory_protection_active: bool) {
        self.controller
            .update_load_state(system_load, memory_protection_active);
        let multiplier = self.homeostat.lock().observe_load(system_load);
        let now = Utc::now();

        let ids: Vec<String> = self.sensors.iter().map(|e| e.key().clone()).collect();
        for id in &ids {
            self.bus
                .publish(id, FactorKind::LoadMultiplier, multiplier, now);
        }
        for id in &ids {
            self.flush_sensor(id);
        }
    }

    fn set_priority(self: &Arc<Self>, sensor_id: &str, weight: f32) -> CoreResult<()> {
        let at = Utc::now();
        let shares = {
            let mut arbiter = self.arbiter.lock();
            arbiter.set_weight(sensor_id, weight)?;
            arbiter.factors()
        };
        self.ensure_sensor(sensor_id, at);
        for (id, factor) in shares {
            self.bus.publish(&id, FactorKind::Competitive, factor, at);
        }
        info!(sensor_id, weight, "sensor priority updated");
        Ok(())
    }

    /// Remove a sensor from every store and republish the competitive shares
    /// of the sensors that remain.
    fn remove_sensor(&self, sensor_id: &str) -> bool {
        let Some((_, record)) = self.sensors.remove(sensor_id) else {
            return false;
        };
        record.lock().cancel_flush();
        self.registry.remove_sensor(sensor_id);
        self.bus.remove_sensor(sensor_id);
        self.sync.remove_sensor(sensor_id);
        self.novelty.lock().remove_sensor(sensor_id);
        self.predictor.lock().remove_sensor(sensor_id);

        let at = Utc::now();
        let shares = {
            let mut arbiter = self.arbiter.lock();
            arbiter.remove_sensor(sensor_id);
            arbiter.factors()
        };
        for (id, factor) in shares {
            self.bus.publish(&id, FactorKind::Competitive, factor, at);
        }
        info!(sensor_id, "sensor deregistered");
        true
    }

    fn sweep_expired(self: &Arc<Self>) {
        let now = Utc::now();
        let expired: Vec<String> = self
            .sensors
            .iter()
            .filter(|entry| now - entry.value().lock().last_seen > self.sensor_ttl)
            .map(|entry| entry.key().clone())
            .collect();
        for sensor_id in expired {
            info!(sensor_id = %sensor_id, "sensor idle past ttl, destroying");
            self.remove_sensor(&sensor_id);
        }
    }

    fn shutdown(&self) {
        for task in self.background.lock().drain(..) {
            task.abort();
        }
        for entry in self.sensors.iter() {
            entry.value().lock().cancel_flush();
        }
        info!("stream hub shut down");
    }
}

// ============================================================================
// Background loops
// ============================================================================

/// React to attention shifts with an immediate flush, which both delivers a
/// fresh config and rearms the timer at the new cadence.
async fn shift_loop(inner: Weak<StreamInner>, mut shifts: UnboundedReceiver<AttentionShift>) {
    while let Some(shift) = shifts.recv().await {
        let Some(inner) = inner.upgrade() else { break };
        debug!(
            sensor_id = %shift.sensor_id,
            previous = shift.previous.as_str(),
            current = shift.current.as_str(),
            "attention shift, recomputing cadence"
        );
        inner.flush_sensor(&shift.sensor_id);
    }
}

async fn producer_loop(inner: Weak<StreamInner>, period: std::time::Duration) {
    let mut tick = tokio::time::interval(period);
    tick.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Delay);
    loop {
        tick.tick().await;
        let Some(inner) = inner.upgrade() else { break };
        inner.republish_slow_factors();
    }
}

async fn sweep_loop(inner: Weak<StreamInner>, period: std::time::Duration) {
    let mut tick = tokio::time::interval(period);
    tick.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Delay);
    loop {
        tick.tick().await;
        let Some(inner) = inner.upgrade() else { break };
        inner.sweep_expired();
    }
}

// ============================================================================
// Tests
// ============================================================================
