//! Ledger events as they arrive at the client boundary.
//!
//! The ledger emits several differently-shaped events. They are turned into
//! the [`LedgerEvent`] sum type as soon as they cross into the engine, so the
//! normalizer matches a closed set of variants instead of probing fields.
//!
//! Every event is wrapped in a [`RawEvent`] carrying its position on the
//! ledger (`block_number`, `log_index`). The block number is what the
//! normalizer resolves to a ledger timestamp.

pub mod normalize;
pub mod types;

pub use normalize::{
    NormalizeError, Normalized, ProjectionDelta, build_entry, classify_transition, is_suppressed,
};
pub use types::{EventKind, UnknownEventKind};

use serde::{Deserialize, Serialize};

use crate::model::{Address, ItemId};

/// Typed payload of a ledger event.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "event", rename_all = "snake_case")]
pub enum LedgerEvent {
    Minted {
        item: ItemId,
        producer: Address,
    },
    Inspected {
        item: ItemId,
        inspector: Address,
    },
    StatusUpdated {
        item: ItemId,
        updater: Address,
        old_code: u8,
        new_code: u8,
    },
    Transfer {
        item: ItemId,
        from: Address,
        to: Address,
    },
    Recalled {
        item: ItemId,
        caller: Address,
        /// Hash/reference of the recall reason document.
        reason: String,
    },
    Archived {
        item: ItemId,
        caller: Address,
        vault: Address,
    },
}

impl LedgerEvent {
    /// The channel this event is delivered on.
    #[must_use]
    pub const fn kind(&self) -> EventKind {
        match self {
            Self::Minted { .. } => EventKind::Minted,
            Self::Inspected { .. } => EventKind::Inspected,
            Self::StatusUpdated { .. } => EventKind::StatusUpdated,
            Self::Transfer { .. } => EventKind::Transfer,
            Self::Recalled { .. } => EventKind::Recalled,
            Self::Archived { .. } => EventKind::Archived,
        }
    }

    /// The item the event targets.
    #[must_use]
    pub const fn item(&self) -> ItemId {
        match self {
            Self::Minted { item, .. }
            | Self::Inspected { item, .. }
            | Self::StatusUpdated { item, .. }
            | Self::Transfer { item, .. }
            | Self::Recalled { item, .. }
            | Self::Archived { item, .. } => *item,
        }
    }
}

/// A ledger event together with its position on the ledger.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RawEvent {
    pub block_number: u64,
    pub log_index: u32,
    pub payload: LedgerEvent,
}

impl RawEvent {
    #[must_use]
    pub const fn new(block_number: u64, log_index: u32, payload: LedgerEvent) -> Self {
        Self {
            block_number,
            log_index,
            payload,
        }
    }

    #[must_use]
    pub const fn kind(&self) -> EventKind {
        self.payload.kind()
    }

    #[must_use]
    pub const fn item(&self) -> ItemId {
        self.payload.item()
    }
}
