//! Bounded unit counting against a target quantity.
//!
//! Every function here is pure: it takes a [`Tally`] and hands back the
//! adjusted copy. Requests that would leave `[0, required]` are clamped and
//! report which [`Bound`] stopped them.

use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct Tally {
    accumulated: u32,
    required: u32,
}

impl Tally {
    /// Creates a tally, clamping `accumulated` to `required`.
    pub fn new(accumulated: u32, required: u32) -> Self {
        Self {
            accumulated: accumulated.min(required),
            required,
        }
    }

    pub fn accumulated(self) -> u32 {
        self.accumulated
    }

    pub fn is_full(self) -> bool {
        self.accumulated == self.required
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Bound {
    Min,
    Max,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Adjusted {
    pub tally: Tally,
    /// Set when the requested change could not be applied in full.
    pub clamped: Option<Bound>,
}

impl Adjusted {
    pub fn changed_from(&self, before: Tally) -> bool {
        self.tally.accumulated != before.accumulated
    }
}

pub fn increment(tally: Tally) -> Adjusted {
    adjust(tally, 1)
}

pub fn decrement(tally: Tally) -> Adjusted {
    adjust(tally, -1)
}

/// Moves the tally by `delta` units, clamped to `[0, required]`.
pub fn adjust(tally: Tally, delta: i64) -> Adjusted {
    let target = i64::from(tally.accumulated).saturating_add(delta);
    let (accumulated, clamped) = if target > i64::from(tally.required) {
        (tally.required, Some(Bound::Max))
    } else if target < 0 {
        (0, Some(Bound::Min))
    } else {
        // In range, so it fits in u32.
        (u32::try_from(target).unwrap_or(tally.required), None)
    };
    Adjusted {
        tally: Tally {
            accumulated,
            required: tally.required,
        },
        clamped,
    }
}
