// crates/quota-guard-core/src/core/time.rs
// ============================================================================
// Module: Quota Guard Time Model
// Description: Caller-supplied timestamps for sliding-window decisions.
// Purpose: Keep throttle decisions replayable by never reading wall-clock time.
// Dependencies: serde
// ============================================================================

//! ## Overview
//! The core engine never reads wall-clock time directly; hosts pass the
//! observation time of each download in the check context. Rate limiters
//! and ban stores derive their windows from that value.

// ============================================================================
// SECTION: Imports
// ============================================================================

use serde::Deserialize;
use serde::Serialize;

// ============================================================================
// SECTION: Time Values
// ============================================================================

/// Milliseconds in one second.
const MILLIS_PER_SECOND: i64 = 1_000;

/// Unix epoch timestamp in milliseconds.
///
/// # Invariants
/// - Values are explicitly provided by callers; the core never reads wall-clock time.
/// - No validation is performed; monotonicity is a caller responsibility.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Timestamp(i64);

impl Timestamp {
    /// Creates a timestamp from unix epoch milliseconds.
    #[must_use]
    pub const fn from_unix_millis(value: i64) -> Self {
        Self(value)
    }

    /// Returns the timestamp as unix epoch milliseconds.
    #[must_use]
    pub const fn as_unix_millis(self) -> i64 {
        self.0
    }

    /// Returns the start of a window of `seconds` ending at this timestamp.
    #[must_use]
    pub fn window_start(self, seconds: u64) -> Self {
        let span = i64::try_from(seconds).unwrap_or(i64::MAX).saturating_mul(MILLIS_PER_SECOND);
        Self(self.0.saturating_sub(span))
    }
}

// ============================================================================
// SECTION: Tests
// ============================================================================
