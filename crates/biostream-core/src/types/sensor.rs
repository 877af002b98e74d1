//! Measurements and the signal classes eligible for phase tracking.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::error::{CoreError, CoreResult};

/// One raw reading from a sensor.
///
/// `payload` is arbitrary JSON so non-numeric sensors (annotations, device
/// status) flow through the same pipeline; phase tracking only engages when
/// the attribute maps to a [`SignalClass`] and the payload is numeric.
/// Timestamps are caller-supplied so ingestion stays deterministic under test.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Measurement {
    pub sensor_id: String,
    pub attribute: String,
    pub payload: Value,
    pub timestamp: DateTime<Utc>,
}

impl Measurement {
    pub fn new(
        sensor_id: impl Into<String>,
        attribute: impl Into<String>,
        payload: Value,
        timestamp: DateTime<Utc>,
    ) -> Self {
        Self {
            sensor_id: sensor_id.into(),
            attribute: attribute.into(),
            payload,
            timestamp,
        }
    }

    /// Shorthand for the common numeric case.
    pub fn numeric(
        sensor_id: impl Into<String>,
        attribute: impl Into<String>,
        value: f64,
        timestamp: DateTime<Utc>,
    ) -> Self {
        Self::new(sensor_id, attribute, Value::from(value), timestamp)
    }

    /// Numeric view of the payload, if it has one.
    #[inline]
    pub fn numeric_value(&self) -> Option<f64> {
        self.payload.as_f64()
    }

    /// Numeric payload required for phase-qualifying attributes.
    ///
    /// Malformed payloads are rejected here with a typed error instead of
    /// silently polluting a phase buffer downstream.
    pub fn require_numeric(&self) -> CoreResult<f64> {
        match self.numeric_value() {
            Some(v) if v.is_finite() => Ok(v),
            Some(v) => Err(CoreError::validation(
                "payload",
                format!("non-finite value {v} for attribute '{}'", self.attribute),
            )),
            None => Err(CoreError::validation(
                "payload",
                format!("non-numeric payload for attribute '{}'", self.attribute),
            )),
        }
    }
}

/// Signal classes tracked by the phase synchronization engine.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SignalClass {
    /// Breathing waveforms; slow oscillation, deeper history.
    Respiration,
    /// Heart-rate variability; faster turnover, shorter history.
    Hrv,
}

impl SignalClass {
    /// Phase ring-buffer capacity per sensor for this class.
    #[inline]
    pub fn ring_capacity(&self) -> usize {
        match self {
            Self::Respiration => 50,
            Self::Hrv => 20,
        }
    }

    /// Wire/display name, matching the serialized form.
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Respiration => "respiration",
            Self::Hrv => "hrv",
        }
    }

    /// Map a measurement attribute to its signal class, if it qualifies for
    /// phase tracking. Everything else flows through delivery untouched.
    pub fn from_attribute(attribute: &str) -> Option<Self> {
        match attribute {
            "respiration" | "breathing_rate" => Some(Self::Respiration),
            "hrv" | "rr_interval" => Some(Self::Hrv),
            _ => None,
        }
    }

    pub fn all() -> [SignalClass; 2] {
        [Self::Respiration, Self::Hrv]
    }

    /// Dense index for per-class storage arrays.
    #[inline]
    pub(crate) fn index(&self) -> usize {
        match self {
            Self::Respiration => 0,
            Self::Hrv => 1,
        }
    }
}
