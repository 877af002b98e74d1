//! Core value types shared across the crate.
//!
//! Everything here is a plain data shape: enums with wire-stable serde forms,
//! the measurement envelope, and the computed backpressure decision. Behavior
//! lives in the component modules.

mod attention;
mod backpressure;
mod load;
mod sensor;

pub use attention::AttentionLevel;
pub use backpressure::{BackpressureConfig, FlushBatch};
pub use load::SystemLoad;
pub use sensor::{Measurement, SignalClass};
