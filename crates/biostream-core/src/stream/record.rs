//! Per-sensor runtime record.

use std::collections::VecDeque;

use chrono::{DateTime, Utc};
use serde::Serialize;
use tokio::task::JoinHandle;

use crate::types::{AttentionLevel, BackpressureConfig, Measurement};

/// Mutable state for one live sensor: the pending queue, flush bookkeeping,
/// and the handle of its scheduled flush task. One record mutex serializes
/// all writes for a sensor, which is the whole per-sensor ordering story.
#[derive(Debug)]
pub(crate) struct SensorRecord {
    pub(crate) sensor_id: String,
    queue: VecDeque<Measurement>,
    queue_limit: usize,
    dropped: u64,
    pub(crate) created_at: DateTime<Utc>,
    pub(crate) last_seen: DateTime<Utc>,
    pub(crate) last_config: Option<BackpressureConfig>,
    pub(crate) flush_task: Option<JoinHandle<()>>,
}

impl SensorRecord {
    pub(crate) fn new(sensor_id: &str, queue_limit: usize, at: DateTime<Utc>) -> Self {
        Self {
            sensor_id: sensor_id.to_string(),
            queue: VecDeque::new(),
            queue_limit: queue_limit.max(1),
            dropped: 0,
            created_at: at,
            last_seen: at,
            last_config: None,
            flush_task: None,
        }
    }

    /// Append a measurement. At the bound, the oldest entry is evicted and
    /// returned so the caller can count it — delivery lag loses the stalest
    /// data first, never the freshest.
    pub(crate) fn enqueue(&mut self, measurement: Measurement) -> Option<Measurement> {
        self.queue.push_back(measurement);
        if self.queue.len() > self.queue_limit {
            self.dropped += 1;
            self.queue.pop_front()
        } else {
            None
        }
    }

    /// Take up to `max` measurements, oldest first.
    pub(crate) fn drain(&mut self, max: usize) -> Vec<Measurement> {
        let take = max.min(self.queue.len());
        self.queue.drain(..take).collect()
    }

    pub(crate) fn pending(&self) -> usize {
        self.queue.len()
    }

    pub(crate) fn dropped(&self) -> u64 {
        self.dropped
    }

    pub(crate) fn touch(&mut self, at: DateTime<Utc>) {
        if at > self.last_seen {
            self.last_seen = at;
        }
    }

    /// Abort the pending flush task, if any. Idempotent.
    pub(crate) fn cancel_flush(&mut self) {
        if let Some(task) = self.flush_task.take() {
            task.abort();
        }
    }

    pub(crate) fn status(&self, attention_level: AttentionLevel) -> SensorStatus {
        SensorStatus {
            sensor_id: self.sensor_id.clone(),
            attention_level,
            pending: self.pending(),
            dropped: self.dropped,
            created_at: self.created_at,
            last_seen: self.last_seen,
            last_config: self.last_config.clone(),
        }
    }
}

/// Introspection snapshot of one sensor's runtime state.
#[derive(Debug, Clone, Serialize)]
pub struct SensorStatus {
    pub sensor_id: String,
    pub attention_level: AttentionLevel,
    pub pending: usize,
    pub dropped: u64,
    pub created_at: DateTime<Utc>,
    pub last_seen: DateTime<Utc>,
    pub last_config: Option<BackpressureConfig>,
}
