//! Error types for biostream-core.
//!
//! A single unified [`CoreError`] covers the crate: callers match on variants,
//! library code propagates with `?` and never panics. Missing load-factor data
//! is deliberately NOT an error anywhere in this crate — absent producers
//! degrade to neutral defaults — so the surface here stays small.

use thiserror::Error;

/// Unified error type for biostream-core.
///
/// # Recoverability
///
/// - [`CoreError::Validation`] is recoverable: the caller supplied bad input
///   (a non-finite measurement payload, a non-positive priority weight) and
///   can retry with corrected data.
/// - [`CoreError::Config`] is not: the process was assembled with an invalid
///   configuration and needs intervention.
/// - [`CoreError::Internal`] indicates a bug and should be investigated.
#[derive(Debug, Error)]
pub enum CoreError {
    /// Input data failed validation.
    ///
    /// # When This Occurs
    ///
    /// - Measurement payload for a phase-qualifying attribute is not numeric
    /// - NaN or Infinity in numeric fields
    /// - Priority weight is zero, negative, or non-finite
    #[error("Validation error: {field}: {message}")]
    Validation {
        /// Field or parameter that failed validation
        field: String,
        /// What was wrong with it
        message: String,
    },

    /// Configuration value out of its allowed range.
    #[error("Configuration error: {0}")]
    Config(String),

    /// Internal error indicating a bug or invariant violation.
    #[error("Internal error: {0}")]
    Internal(String),
}

impl CoreError {
    /// Build a [`CoreError::Validation`] without repeating `.to_string()` at
    /// every call site.
    pub fn validation(field: impl Into<String>, message: impl Into<String>) -> Self {
        Self::Validation {
            field: field.into(),
            message: message.into(),
        }
    }

    /// Build a [`CoreError::Config`].
    pub fn config(message: impl Into<String>) -> Self {
        Self::Config(message.into())
    }

    /// Check if this error is recoverable via corrected input.
    #[inline]
    pub fn is_recoverable(&self) -> bool {
        matches!(self, Self::Validation { .. })
    }
}

/// Result type alias used throughout the crate.
pub type CoreResult<T> = std::result::Result<T, CoreError>;
