//! Load-factor producers.
//!
//! Five independent estimators, one per [`crate::bus::FactorKind`]. Each
//! produces a bounded multiplier with 1.0 as the neutral default and never
//! talks to the others; the signal bus is the only coupling to the rest of
//! the system. Timestamps come from the caller so every estimator is
//! deterministic under test.

mod arbiter;
mod circadian;
mod homeostat;
mod novelty;
mod predictive;

pub use arbiter::{ResourceArbiter, COMPETITIVE_MAX, COMPETITIVE_MIN, DEFAULT_PRIORITY_WEIGHT};
pub use circadian::{CircadianRhythm, CIRCADIAN_MAX, CIRCADIAN_MIN, DEFAULT_HOUR_TABLE};
pub use homeostat::{HomeostaticTuner, LOAD_MULTIPLIER_MAX, LOAD_MULTIPLIER_MIN};
pub use novelty::{
    NoveltyDetector, NOVELTY_BOOST_FACTOR, NOVELTY_DECAY_SECS, NOVELTY_NEUTRAL,
    NOVELTY_Z_THRESHOLD,
};
pub use predictive::{LoadPredictor, PREDICTIVE_MAX, PREDICTIVE_MIN};
