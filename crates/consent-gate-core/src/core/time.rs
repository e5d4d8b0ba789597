// crates/consent-gate-core/src/core/time.rs
// ============================================================================
// Module: Consent Gate Time Model
// Description: Canonical timestamp representation for tokens and confirmations.
// Purpose: Provide explicit, comparable time values injected by hosts.
// Dependencies: serde
// ============================================================================

//! ## Overview
//! Consent Gate never reads wall-clock time inside core logic. Hosts supply
//! timestamps through the [`crate::interfaces::Clock`] interface so expiry
//! behavior is deterministic under test.

// ============================================================================
// SECTION: Imports
// ============================================================================

use std::fmt;

use serde::Deserialize;
use serde::Serialize;

// ============================================================================
// SECTION: Time Values
// ============================================================================

/// Milliseconds per second.
const MILLIS_PER_SECOND: i64 = 1_000;

/// Unix epoch timestamp in milliseconds.
///
/// # Invariants
/// - Values are explicitly provided by callers; the core never reads wall-clock time.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Timestamp(i64);

impl Timestamp {
    /// Creates a timestamp from unix epoch milliseconds.
    #[must_use]
    pub const fn from_unix_millis(millis: i64) -> Self {
        Self(millis)
    }

    /// Creates a timestamp from unix epoch seconds (JWT `NumericDate`).
    #[must_use]
    pub const fn from_unix_seconds(seconds: i64) -> Self {
        Self(seconds.saturating_mul(MILLIS_PER_SECOND))
    }

    /// Returns the timestamp as unix epoch milliseconds.
    #[must_use]
    pub const fn as_unix_millis(self) -> i64 {
        self.0
    }

    /// Returns the timestamp as whole unix epoch seconds.
    #[must_use]
    pub const fn as_unix_seconds(self) -> i64 {
        self.0.div_euclid(MILLIS_PER_SECOND)
    }

    /// Returns a timestamp shifted forward by `seconds`, saturating on overflow.
    #[must_use]
    pub fn plus_seconds(self, seconds: u64) -> Self {
        let delta = seconds_to_millis(seconds);
        Self(self.0.saturating_add(delta))
    }

    /// Returns a timestamp shifted backward by `seconds`, saturating on overflow.
    #[must_use]
    pub fn minus_seconds(self, seconds: u64) -> Self {
        let delta = seconds_to_millis(seconds);
        Self(self.0.saturating_sub(delta))
    }
}

impl fmt::Display for Timestamp {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        self.0.fmt(f)
    }
}

/// Converts seconds to milliseconds, clamping to `i64::MAX`.
fn seconds_to_millis(seconds: u64) -> i64 {
    i64::try_from(seconds.saturating_mul(1_000)).unwrap_or(i64::MAX)
}
