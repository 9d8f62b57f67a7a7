//! Slot Configuration
//!
//! Lifetime counters for a slot, loadable from data files.
//!
//! Counter encoding (shared by `duration` and `invocations`):
//!
//! - `-1`: unlimited
//! - `0`: the slot never fires (it is deactivated on creation)
//! - `N > 0`: counts down; the slot deactivates when it reaches zero
//!
//! Delays are plain non-negative counts that must run out before the
//! corresponding counter starts.

use serde::{Deserialize, Serialize};

use crate::error::{Error, Result};

/// Counter value meaning "no limit".
pub const UNLIMITED: i64 = -1;

fn unlimited() -> i64 {
    UNLIMITED
}

/// Lifetime counters applied to a slot.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct SlotOptions {
    /// Ticks the slot stays alive.
    #[serde(default = "unlimited")]
    pub duration: i64,
    /// Delivered dispatches the slot stays alive for.
    #[serde(default = "unlimited")]
    pub invocations: i64,
    /// Ticks to wait before `duration` starts counting.
    #[serde(default)]
    pub duration_delay: i64,
    /// Matching dispatches to swallow before delivery starts.
    #[serde(default)]
    pub invocation_delay: i64,
}

impl Default for SlotOptions {
    fn default() -> Self {
        Self {
            duration: UNLIMITED,
            invocations: UNLIMITED,
            duration_delay: 0,
            invocation_delay: 0,
        }
    }
}

impl SlotOptions {
    /// Options for a slot that lives forever.
    pub fn unlimited() -> Self {
        Self::default()
    }

    /// Options for a value modifier: applied once, no duration limit.
    pub fn modifier() -> Self {
        Self::default().with_invocations(1)
    }

    /// Parse options from a JSON string.
    pub fn from_json(json: &str) -> Result<Self> {
        let options: Self = serde_json::from_str(json)?;
        options.validate()?;
        Ok(options)
    }

    pub fn with_duration(mut self, duration: i64) -> Self {
        self.duration = duration;
        self
    }

    pub fn with_invocations(mut self, invocations: i64) -> Self {
        self.invocations = invocations;
        self
    }

    pub fn with_duration_delay(mut self, delay: i64) -> Self {
        self.duration_delay = delay;
        self
    }

    pub fn with_invocation_delay(mut self, delay: i64) -> Self {
        self.invocation_delay = delay;
        self
    }

    /// Check every counter against its floor.
    pub fn validate(&self) -> Result<()> {
        let checks = [
            ("duration", self.duration, UNLIMITED),
            ("invocations", self.invocations, UNLIMITED),
            ("duration_delay", self.duration_delay, 0),
            ("invocation_delay", self.invocation_delay, 0),
        ];

        for (field, value, floor) in checks {
            if value < floor {
                return Err(Error::InvalidCounter { field, value });
            }
        }
        Ok(())
    }

    /// True if a counter is already exhausted, so the slot can never fire.
    pub fn is_exhausted(&self) -> bool {
        self.duration == 0 || self.invocations == 0
    }
}

/// Whether a value pipeline commits its fold result back into the baseline.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Default)]
#[serde(rename_all = "lowercase")]
pub enum Retention {
    /// Fold results become the new baseline; modifiers compound.
    #[default]
    Persistent,
    /// Fold results are cached for observation only; every request starts
    /// again from the baseline.
    Ephemeral,
}
