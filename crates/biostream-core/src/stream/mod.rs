//! Stream orchestration.
//!
//! Everything between "a measurement arrived" and "a batch left": per-sensor
//! records, flush timers, and the hub that owns the components.

mod record;
mod system;

pub use record::SensorStatus;
pub use system::StreamSystem;
