//! Event normalizer: ledger events → canonical history entries.
//!
//! Each replayed event kind becomes exactly one [`HistoryEntry`] plus, where
//! the event implies it, a [`ProjectionDelta`] (new status and derived role).
//!
//! | event           | entry kind                 | from / to             | actor     |
//! |-----------------|----------------------------|-----------------------|-----------|
//! | `Minted`        | `REGISTERED`               | – / `CREATED`         | producer  |
//! | `Inspected`     | `ATTESTED`                 | `CREATED`/`INSPECTING`| inspector |
//! | `StatusUpdated` | [`classify_transition`]    | old / new             | updater   |
//! | `Transfer`      | `TRANSFERRED`              | – / –                 | recipient |
//! | `Recalled`      | `RECALLED`                 | – / `RECALLED`        | caller    |
//!
//! Issuance transfers (origin is the zero address) and archive notices are
//! suppressed before any block lookup: the first duplicates `REGISTERED`, the
//! second duplicates the `Transfer` to the vault.

use chrono::{DateTime, Utc};

use super::{LedgerEvent, RawEvent};
use crate::error::ErrorCode;
use crate::ledger::{Ledger, LedgerError};
use crate::model::{EntryKind, HistoryEntry, ItemId, Role, Status, status_name};

/// Status/role change implied by an event.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ProjectionDelta {
    pub status: Status,
    pub role: Role,
}

impl ProjectionDelta {
    const fn derived(status: Status) -> Self {
        Self {
            status,
            role: status.holder_role(),
        }
    }
}

/// The canonical form of one ledger event.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Normalized {
    pub item: ItemId,
    pub entry: HistoryEntry,
    pub delta: Option<ProjectionDelta>,
}

/// Normalization failed for a single event. Callers log and skip.
#[derive(Debug, thiserror::Error)]
pub enum NormalizeError {
    #[error("failed to resolve block {block} time: {source}")]
    BlockTime {
        block: u64,
        #[source]
        source: LedgerError,
    },
}

impl NormalizeError {
    #[must_use]
    pub const fn code(&self) -> ErrorCode {
        match self {
            Self::BlockTime { .. } => ErrorCode::BlockTimeUnavailable,
        }
    }
}

/// Derive the entry kind for a generic status change from its code pair.
#[must_use]
pub const fn classify_transition(old_code: u8, new_code: u8) -> EntryKind {
    match (old_code, new_code) {
        (_, 7) => EntryKind::Recalled,
        (1, 2) => EntryKind::Attested,
        (2, 3) | (3, 4) => EntryKind::Transferred,
        _ => EntryKind::StatusChanged,
    }
}

/// True for events that never produce a history entry.
#[must_use]
pub fn is_suppressed(raw: &RawEvent) -> bool {
    match &raw.payload {
        LedgerEvent::Transfer { from, .. } => from.is_zero(),
        LedgerEvent::Archived { .. } => true,
        _ => false,
    }
}

/// Build the canonical entry for `raw` at the given ledger time.
///
/// `location` is the item's display location, used as the note on
/// registration entries. Returns `None` for suppressed events.
#[must_use]
pub fn build_entry(raw: &RawEvent, block_time: DateTime<Utc>, location: &str) -> Option<Normalized> {
    if is_suppressed(raw) {
        return None;
    }

    let (entry, delta) = match &raw.payload {
        LedgerEvent::Minted { producer, .. } => (
            HistoryEntry::new(EntryKind::Registered, producer.clone(), block_time)
                .with_transition(None, Some(Status::Created))
                .with_note(location),
            Some(ProjectionDelta::derived(Status::Created)),
        ),
        LedgerEvent::Inspected { inspector, .. } => (
            HistoryEntry::new(EntryKind::Attested, inspector.clone(), block_time)
                .with_transition(Some(Status::Created), Some(Status::Inspecting))
                .with_note("Certificate attached by inspector"),
            Some(ProjectionDelta::derived(Status::Inspecting)),
        ),
        LedgerEvent::StatusUpdated {
            updater,
            old_code,
            new_code,
            ..
        } => {
            let to = status_name(*new_code);
            (
                HistoryEntry::new(
                    classify_transition(*old_code, *new_code),
                    updater.clone(),
                    block_time,
                )
                .with_transition(Some(status_name(*old_code)), Some(to))
                .with_note(format!("Status updated by {}...", updater.short())),
                Some(ProjectionDelta::derived(to)),
            )
        }
        LedgerEvent::Transfer { from, to, .. } => (
            HistoryEntry::new(EntryKind::Transferred, to.clone(), block_time).with_note(format!(
                "Transferred from {}... to {}...",
                from.short(),
                to.short()
            )),
            None,
        ),
        LedgerEvent::Recalled { caller, reason, .. } => (
            HistoryEntry::new(EntryKind::Recalled, caller.clone(), block_time)
                .with_transition(None, Some(Status::Recalled))
                .with_note("Recalled by administrator")
                .with_reason(reason.clone()),
            Some(ProjectionDelta::derived(Status::Recalled)),
        ),
        LedgerEvent::Archived { .. } => return None,
    };

    Some(Normalized {
        item: raw.item(),
        entry,
        delta,
    })
}

/// Resolve the event's block time on the ledger and normalize it.
///
/// Suppressed events return `Ok(None)` without touching the ledger.
///
/// # Errors
///
/// Returns [`NormalizeError::BlockTime`] if the block cannot be resolved; the
/// event is then unusable because wall-clock time must never stand in.
pub async fn normalize<L: Ledger + ?Sized>(
    ledger: &L,
    raw: &RawEvent,
    location: &str,
) -> Result<Option<Normalized>, NormalizeError> {
    if is_suppressed(raw) {
        return Ok(None);
    }
    let block_time = ledger
        .resolve_block_time(raw.block_number)
        .await
        .map_err(|source| NormalizeError::BlockTime {
            block: raw.block_number,
            source,
        })?;
    Ok(build_entry(raw, block_time, location))
}
