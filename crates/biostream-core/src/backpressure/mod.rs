//! Adaptive batch-window control.
//!
//! The tier table bounds everything; the controller combines attention,
//! bus factors, and load state into per-sensor delivery decisions.

mod controller;
mod tiers;

pub use controller::{
    BatchWindowController, LoadState, BIO_FACTOR_CEIL, BIO_FACTOR_FLOOR,
    MEMORY_PROTECTION_SLOWDOWN,
};
pub use tiers::{AttentionTier, TIER_HIGH, TIER_LOW, TIER_MEDIUM, TIER_NONE};
