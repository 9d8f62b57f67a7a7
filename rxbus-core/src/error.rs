//! Error types for rxbus-core.
//!
//! Setup mistakes (bad counters, unknown lock reasons, unregistered signals)
//! and unknown entity keys are the only failures the engine reports. Repeated
//! teardown (disconnecting an absent callback, deactivating a dead slot) is
//! never an error.

use thiserror::Error;

/// Errors produced by the dispatch engine and the value pipeline.
#[derive(Debug, Error)]
pub enum Error {
    /// A lock reason outside the lock's allowed set was used.
    #[error("unknown lock reason: {reason}")]
    UnknownLockReason { reason: String },

    /// A lifetime counter is below its allowed floor.
    #[error("invalid slot {field}: {value}")]
    InvalidCounter { field: &'static str, value: i64 },

    /// A signal was used on a bus it was never registered with.
    #[error("signal {signal} not registered")]
    SignalNotRegistered { signal: String },

    /// An entity key was never registered on a reactive value.
    #[error("unknown key: {key}")]
    UnknownKey { key: String },

    /// Slot options could not be parsed.
    #[error("invalid slot options: {0}")]
    InvalidOptions(#[from] serde_json::Error),
}

impl Error {
    /// Creates an unknown-lock-reason error.
    pub fn unknown_reason(reason: impl std::fmt::Debug) -> Self {
        Self::UnknownLockReason {
            reason: format!("{reason:?}"),
        }
    }

    /// Creates an unknown-key error.
    pub fn unknown_key(key: impl std::fmt::Debug) -> Self {
        Self::UnknownKey {
            key: format!("{key:?}"),
        }
    }

    /// Creates a signal-not-registered error.
    pub fn not_registered(signal: impl std::fmt::Display) -> Self {
        Self::SignalNotRegistered {
            signal: signal.to_string(),
        }
    }

    /// Returns true for mistakes made while wiring the engine.
    pub fn is_configuration(&self) -> bool {
        !matches!(self, Self::UnknownKey { .. })
    }
}

/// Result type alias
pub type Result<T> = std::result::Result<T, Error>;
