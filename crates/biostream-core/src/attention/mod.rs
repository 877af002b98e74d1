//! Viewer attention tracking.
//!
//! Attention is demand: viewers register interest in sensors at a tier, the
//! registry resolves the effective level, and level changes are broadcast so
//! delivery cadence reacts immediately.

mod events;
mod registry;

pub use events::{AttentionShift, ShiftBroadcaster};
pub use registry::AttentionRegistry;
