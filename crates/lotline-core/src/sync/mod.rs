//! Reconciliation between the ledger and the local store.
//!
//! Three paths feed the [`HistoryStore`](crate::store::HistoryStore):
//!
//! - [`Replayer::load_all`] rebuilds every item's projected state from the
//!   ledger's current view, then appends the normalized historical events of
//!   the recent block window.
//! - [`Replayer::resync_one`] repeats the history half for a single item over
//!   a short window. It runs after local writes and live notifications.
//! - [`LiveListener`] reacts to push notifications by updating projected
//!   state only. History is always written with ledger block times, so the
//!   live path never appends.
//!
//! [`SubscriptionManager`] owns the live channels, and [`WriteCoordinator`]
//! implements write-then-resync for operator actions.

pub mod live;
pub mod replay;
pub mod subscription;
pub mod write;

pub use live::{LiveListener, LiveOutcome};
pub use replay::{ReplayStats, Replayer};
pub use subscription::{LiveHandle, SubscriptionManager};
pub use write::{WriteAction, WriteCoordinator, WriteFailure, WriteOutcome};

use crate::config::{CustodyConfig, DisplayConfig, ProjectConfig};
use crate::error::ErrorCode;
use crate::event::EventKind;
use crate::ledger::LedgerError;
use crate::model::{Address, Role, Status};

/// Settings shared by the reconciliation paths.
#[derive(Debug, Clone)]
pub struct SyncOptions {
    pub replay_window_blocks: u64,
    pub resync_window_blocks: u64,
    pub resync_on_live_event: bool,
    pub custody: CustodyConfig,
    pub display: DisplayConfig,
}

impl Default for SyncOptions {
    fn default() -> Self {
        Self::from_config(&ProjectConfig::default())
    }
}

impl SyncOptions {
    #[must_use]
    pub fn from_config(config: &ProjectConfig) -> Self {
        Self {
            replay_window_blocks: config.sync.replay_window_blocks,
            resync_window_blocks: config.sync.resync_window_blocks,
            resync_on_live_event: config.sync.resync_on_live_event,
            custody: config.custody.clone(),
            display: config.display.clone(),
        }
    }

    /// Holder role for an item in `status` held by `holder`.
    ///
    /// Items parked at a custody vault take the vault's role; everything else
    /// follows the lexicon.
    #[must_use]
    pub fn role_for(&self, status: Status, holder: &Address) -> Role {
        if *holder == self.custody.quarantine_vault {
            Role::Quarantine
        } else if *holder == self.custody.archive_vault {
            Role::Archive
        } else {
            status.holder_role()
        }
    }
}

/// Systemic reconciliation failures. Per-item and per-event problems are
/// logged and counted in [`ReplayStats`] instead.
#[derive(Debug, thiserror::Error)]
pub enum SyncError {
    #[error("failed to read item count: {0}")]
    ItemCount(#[source] LedgerError),

    #[error("failed to read chain height: {0}")]
    BlockHeight(#[source] LedgerError),

    #[error("{kind} event query failed: {source}")]
    EventQuery {
        kind: EventKind,
        #[source]
        source: LedgerError,
    },
}

impl SyncError {
    #[must_use]
    pub const fn code(&self) -> ErrorCode {
        match self {
            Self::ItemCount(_) | Self::BlockHeight(_) => ErrorCode::LedgerUnreachable,
            Self::EventQuery { .. } => ErrorCode::EventQueryFailed,
        }
    }
}
