//! Biostream Core Library
//!
//! Real-time adaptive delivery core for biometric sensor streams: per-sensor
//! batch-window control driven by viewer attention and load factors, plus
//! demand-gated phase synchronization across sensors.
//!
//! # Architecture
//!
//! This crate defines:
//! - Domain types (`Measurement`, `AttentionLevel`, `BackpressureConfig`, etc.)
//! - The factor bus and its five bounded load-factor producers
//! - The attention registry with shift broadcasting
//! - The batch-window controller and attention tier table
//! - The Kuramoto phase-sync engine
//! - The [`StreamSystem`] hub that wires it all together
//!
//! # Example
//!
//! ```
//! use biostream_core::types::{AttentionLevel, Measurement};
//! use biostream_core::backpressure::TIER_HIGH;
//!
//! // High-attention sensors flush one measurement at a time.
//! assert_eq!(TIER_HIGH.batch_size, 1);
//! let m = Measurement::numeric("hr-1", "heart_rate", 72.0, chrono::Utc::now());
//! assert_eq!(m.numeric_value(), Some(72.0));
//! ```

pub mod attention;
pub mod backpressure;
pub mod bus;
pub mod config;
pub mod error;
pub mod factors;
pub mod stream;
pub mod sync;
pub mod types;

// Re-exports for convenience
pub use bus::{FactorKind, SignalBus};
pub use config::CoreConfig;
pub use error::{CoreError, CoreResult};
pub use stream::{SensorStatus, StreamSystem};
pub use types::{
    AttentionLevel, BackpressureConfig, FlushBatch, Measurement, SignalClass, SystemLoad,
};
