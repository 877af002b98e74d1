//! Viewer attention registry.
//!
//! Tracks which viewers watch which sensors at which tier and resolves each
//! sensor's effective attention level as the maximum registered tier. This is
//! the only place attention levels are assigned; the controller just reads
//! them.

use std::collections::HashSet;

use chrono::Utc;
use dashmap::DashMap;
use tokio::sync::mpsc::UnboundedReceiver;
use tracing::debug;

use super::events::{AttentionShift, ShiftBroadcaster};
use crate::types::AttentionLevel;

type ViewSet = HashSet<(AttentionLevel, String)>;

/// Multiset of `(tier, viewer)` registrations per sensor.
///
/// Both directions are idempotent: re-registering an existing pair and
/// unregistering an absent one are no-ops. A registration at a lower tier
/// never lowers the effective level while a higher-tier view remains — the
/// maximum wins, and dropping the last viewer decays the level naturally.
#[derive(Debug, Default)]
pub struct AttentionRegistry {
    views: DashMap<String, ViewSet>,
    broadcaster: ShiftBroadcaster,
}

fn effective_level(views: &ViewSet) -> AttentionLevel {
    views
        .iter()
        .map(|(level, _)| *level)
        .max()
        .unwrap_or(AttentionLevel::None)
}

impl AttentionRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Subscribe to effective-level changes across all sensors.
    pub fn subscribe_shifts(&self) -> UnboundedReceiver<AttentionShift> {
        self.broadcaster.subscribe()
    }

    /// Register a viewer's interest in a sensor at a tier.
    ///
    /// Returns the sensor's effective level after the update. Emits an
    /// [`AttentionShift`] only when the effective level actually changed.
    pub fn register_view(
        &self,
        level: AttentionLevel,
        sensor_id: &str,
        viewer_id: &str,
    ) -> AttentionLevel {
        let (previous, current) = {
            let mut entry = self.views.entry(sensor_id.to_string()).or_default();
            let previous = effective_level(&entry);
            entry.insert((level, viewer_id.to_string()));
            (previous, effective_level(&entry))
        };

        if previous != current {
            self.emit_shift(sensor_id, previous, current);
        }
        current
    }

    /// Remove one `(tier, viewer)` registration.
    ///
    /// Unknown sensors and absent pairs are no-ops. Returns the effective
    /// level after the update.
    pub fn unregister_view(
        &self,
        level: AttentionLevel,
        sensor_id: &str,
        viewer_id: &str,
    ) -> AttentionLevel {
        let mut change = None;
        if let Some(mut entry) = self.views.get_mut(sensor_id) {
            let previous = effective_level(entry.value());
            entry.value_mut().remove(&(level, viewer_id.to_string()));
            let current = effective_level(entry.value());
            drop(entry);

            // Empty sets are garbage; remove_if keeps this safe against a
            // concurrent register on the same sensor.
            self.views.remove_if(sensor_id, |_, views| views.is_empty());

            if previous != current {
                change = Some((previous, current));
            }
        }

        match change {
            Some((previous, current)) => {
                self.emit_shift(sensor_id, previous, current);
                current
            }
            None => self.get_level(sensor_id),
        }
    }

    /// Effective attention level for a sensor; `None` when unwatched.
    pub fn get_level(&self, sensor_id: &str) -> AttentionLevel {
        self.views
            .get(sensor_id)
            .map(|entry| effective_level(entry.value()))
            .unwrap_or(AttentionLevel::None)
    }

    /// Number of `(tier, viewer)` registrations for a sensor.
    pub fn view_count(&self, sensor_id: &str) -> usize {
        self.views
            .get(sensor_id)
            .map(|entry| entry.value().len())
            .unwrap_or(0)
    }

    /// Sensors with at least one registration.
    pub fn watched_sensors(&self) -> Vec<String> {
        self.views.iter().map(|e| e.key().clone()).collect()
    }

    /// Drop every registration for a sensor (lifecycle cleanup). No shift is
    /// emitted: the sensor is going away, not changing cadence.
    pub fn remove_sensor(&self, sensor_id: &str) {
        if self.views.remove(sensor_id).is_some() {
            debug!(sensor_id, "cleared attention registrations");
        }
    }

    fn emit_shift(&self, sensor_id: &str, previous: AttentionLevel, current: AttentionLevel) {
        self.broadcaster.emit(AttentionShift {
            sensor_id: sensor_id.to_string(),
            previous,
            current,
            timestamp: Utc::now(),
        });
    }
}
