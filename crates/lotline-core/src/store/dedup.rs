//! Equivalence rule for history entries.
//!
//! Two entries describe the same real-world occurrence when:
//!
//! 1. their kinds match (legacy `REGISTERED_ONCHAIN` counts as `REGISTERED`),
//! 2. their actors match exactly (actors are already lowercase),
//! 3. their timestamps are within the tolerance window (inclusive), and
//! 4. for `STATUS_CHANGED`, `TRANSFERRED` and `ATTESTED`, both `status_from`
//!    and `status_to` match.
//!
//! The tolerance covers disagreement between ledger block time and any
//! client-side estimate of the same event.

use chrono::TimeDelta;

use crate::model::HistoryEntry;

/// Default timestamp tolerance in milliseconds.
pub const DEFAULT_TOLERANCE_MS: i64 = 10_000;

/// Default timestamp tolerance: 10 seconds.
#[must_use]
pub fn default_tolerance() -> TimeDelta {
    TimeDelta::milliseconds(DEFAULT_TOLERANCE_MS)
}

/// True if `a` and `b` fall in the same equivalence class.
#[must_use]
pub fn equivalent(a: &HistoryEntry, b: &HistoryEntry, tolerance: TimeDelta) -> bool {
    if a.kind.canonical() != b.kind.canonical() {
        return false;
    }
    if a.actor != b.actor {
        return false;
    }
    if (a.timestamp - b.timestamp).abs() > tolerance {
        return false;
    }
    if a.kind.carries_transition()
        && (a.status_from != b.status_from || a.status_to != b.status_to)
    {
        return false;
    }
    true
}

/// Position of the first existing entry equivalent to `candidate`.
#[must_use]
pub fn find_equivalent(
    existing: &[HistoryEntry],
    candidate: &HistoryEntry,
    tolerance: TimeDelta,
) -> Option<usize> {
    existing
        .iter()
        .position(|entry| equivalent(entry, candidate, tolerance))
}
