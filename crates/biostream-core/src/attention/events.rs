//! Attention shift events.
//!
//! The registry announces effective-level changes so the orchestrator can
//! recompute a sensor's backpressure immediately instead of waiting for the
//! next natural flush. Fan-out is a list of unbounded senders; a subscriber
//! that goes away is pruned on the next emit.

use chrono::{DateTime, Utc};
use parking_lot::Mutex;
use serde::{Deserialize, Serialize};
use tokio::sync::mpsc::{self, UnboundedReceiver, UnboundedSender};
use tracing::debug;

use crate::types::AttentionLevel;

/// A change in a sensor's effective attention level.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AttentionShift {
    pub sensor_id: String,
    pub previous: AttentionLevel,
    pub current: AttentionLevel,
    pub timestamp: DateTime<Utc>,
}

/// Fan-out of [`AttentionShift`] events to any number of subscribers.
#[derive(Debug, Default)]
pub struct ShiftBroadcaster {
    senders: Mutex<Vec<UnboundedSender<AttentionShift>>>,
}

impl ShiftBroadcaster {
    pub fn new() -> Self {
        Self::default()
    }

    /// Open a new subscription. The receiver sees every shift emitted after
    /// this call.
    pub fn subscribe(&self) -> UnboundedReceiver<AttentionShift> {
        let (tx, rx) = mpsc::unbounded_channel();
        self.senders.lock().push(tx);
        rx
    }

    /// Deliver a shift to all live subscribers, dropping closed ones.
    pub fn emit(&self, shift: AttentionShift) {
        let mut senders = self.senders.lock();
        senders.retain(|tx| tx.send(shift.clone()).is_ok());
        debug!(
            sensor_id = %shift.sensor_id,
            previous = shift.previous.as_str(),
            current = shift.current.as_str(),
            subscribers = senders.len(),
            "attention shift emitted"
        );
    }

    /// Number of live subscribers (post-prune count from the last emit).
    pub fn subscriber_count(&self) -> usize {
        self.senders.lock().len()
    }
}
