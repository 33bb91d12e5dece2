//! Ledger access interface.
//!
//! The engine reads item state, historical events and block times through
//! [`Ledger`], and submits user writes through it. Events are converted to the
//! typed [`RawEvent`] form before they leave an implementation.

pub mod memory;
pub mod script;

pub use memory::{Faults, MemoryLedger};
pub use script::{LedgerScript, ScriptOp};

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use tokio::sync::mpsc;

use crate::event::{EventKind, RawEvent};
use crate::model::{Address, ItemId};

/// Errors surfaced by a ledger implementation.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum LedgerError {
    /// The signer declined the request.
    #[error("user rejected the request")]
    Rejected,

    #[error("insufficient funds: {0}")]
    InsufficientFunds(String),

    /// The contract refused the call.
    #[error("execution reverted: {0}")]
    Reverted(String),

    #[error("transport error: {0}")]
    Transport(String),

    #[error("{0} not found")]
    NotFound(String),
}

/// A state-changing contract call.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "call", rename_all = "snake_case")]
pub enum LedgerCall {
    /// Register a new item.
    Mint { metadata_pointer: String },
    /// Attest a `CREATED` item, optionally replacing its metadata pointer.
    Inspect {
        item: ItemId,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        metadata_pointer: Option<String>,
    },
    /// Move the custody token. Status advances as the contract dictates.
    TransferFrom {
        item: ItemId,
        from: Address,
        to: Address,
    },
    /// `DELIVERED → RETAILED → CONSUMED`, one step per call.
    AdvanceRetail { item: ItemId },
    Recall { item: ItemId, reason: String },
}

impl LedgerCall {
    /// Target item, if the call addresses an existing one.
    #[must_use]
    pub const fn item(&self) -> Option<ItemId> {
        match self {
            Self::Mint { .. } => None,
            Self::Inspect { item, .. }
            | Self::TransferFrom { item, .. }
            | Self::AdvanceRetail { item }
            | Self::Recall { item, .. } => Some(*item),
        }
    }

    #[must_use]
    pub const fn name(&self) -> &'static str {
        match self {
            Self::Mint { .. } => "mint",
            Self::Inspect { .. } => "inspect",
            Self::TransferFrom { .. } => "transfer_from",
            Self::AdvanceRetail { .. } => "advance_retail",
            Self::Recall { .. } => "recall",
        }
    }
}

/// Handle for a submitted, not yet confirmed write.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct PendingTx {
    pub hash: String,
}

/// Confirmation of a write.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Receipt {
    pub hash: String,
    pub block_number: u64,
    /// Item created by a `Mint`, if any.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub minted: Option<ItemId>,
}

/// Receiving end of a live notification channel.
pub type EventStream = mpsc::UnboundedReceiver<RawEvent>;

/// Read/write access to the external ledger.
#[async_trait]
pub trait Ledger: Send + Sync {
    /// Number of items ever registered. Ids run `1..=count`.
    async fn item_count(&self) -> Result<u64, LedgerError>;

    async fn owner(&self, item: ItemId) -> Result<Address, LedgerError>;

    /// Raw status code; `0` for ids that were never registered.
    async fn status_code(&self, item: ItemId) -> Result<u8, LedgerError>;

    async fn metadata_pointer(&self, item: ItemId) -> Result<String, LedgerError>;

    /// Current chain height.
    async fn block_number(&self) -> Result<u64, LedgerError>;

    /// Historical events of one kind in `from_block..=to_block` (open-ended
    /// when `to_block` is `None`), optionally restricted to one item, in log
    /// order.
    async fn query_events(
        &self,
        kind: EventKind,
        item: Option<ItemId>,
        from_block: u64,
        to_block: Option<u64>,
    ) -> Result<Vec<RawEvent>, LedgerError>;

    /// Ledger-assigned time of `block`.
    async fn resolve_block_time(&self, block: u64) -> Result<DateTime<Utc>, LedgerError>;

    /// Open a live notification channel for `kind`.
    async fn subscribe(&self, kind: EventKind) -> Result<EventStream, LedgerError>;

    /// Close every channel opened for `kind`.
    fn unsubscribe_all(&self, kind: EventKind);

    async fn submit_write(
        &self,
        caller: &Address,
        call: &LedgerCall,
    ) -> Result<PendingTx, LedgerError>;

    /// Wait until `tx` is included. Fails if it reverted.
    async fn await_confirmation(&self, tx: &PendingTx) -> Result<Receipt, LedgerError>;
}
