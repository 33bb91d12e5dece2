//! Write-then-resync.
//!
//! An operator action is checked against the local projection, submitted,
//! and awaited. Once the ledger confirms it, the expected projection is
//! applied without history and a targeted resync pulls in the canonical
//! entries. Failures are classified and returned; nothing is retried.

use std::sync::Arc;

use tracing::{error, info, warn};

use super::{ReplayStats, Replayer};
use crate::error::ErrorCode;
use crate::ledger::{Ledger, LedgerCall, LedgerError, Receipt};
use crate::model::{Address, Item, ItemId, Role, ShellFields, Status};
use crate::store::{StatusChange, StatusOptions};

/// Operator actions that change ledger state.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum WriteAction {
    /// Register a new item with its metadata pointer.
    Register { metadata_pointer: String },
    /// Inspection sign-off, optionally replacing the metadata pointer.
    Attest {
        item: ItemId,
        metadata_pointer: Option<String>,
    },
    Transfer { item: ItemId, to: Address },
    /// `DELIVERED -> RETAILED -> CONSUMED`.
    AdvanceRetail { item: ItemId },
    Recall { item: ItemId, reason: String },
    /// Send a recalled item to the quarantine vault.
    Quarantine { item: ItemId },
    /// Send a consumed item to the archive vault.
    Archive { item: ItemId },
}

impl WriteAction {
    #[must_use]
    pub const fn item(&self) -> Option<ItemId> {
        match self {
            Self::Register { .. } => None,
            Self::Attest { item, .. }
            | Self::Transfer { item, .. }
            | Self::AdvanceRetail { item }
            | Self::Recall { item, .. }
            | Self::Quarantine { item }
            | Self::Archive { item } => Some(*item),
        }
    }

    #[must_use]
    pub const fn name(&self) -> &'static str {
        match self {
            Self::Register { .. } => "register",
            Self::Attest { .. } => "attest",
            Self::Transfer { .. } => "transfer",
            Self::AdvanceRetail { .. } => "advance_retail",
            Self::Recall { .. } => "recall",
            Self::Quarantine { .. } => "quarantine",
            Self::Archive { .. } => "archive",
        }
    }
}

/// Why a write did not go through.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum WriteFailure {
    #[error("Transaction rejected by user")]
    UserRejected,

    #[error("Insufficient funds for gas: {0}")]
    InsufficientFunds(String),

    #[error("Transaction failed: {0}")]
    Reverted(String),

    #[error("item {0} is not loaded")]
    UnknownItem(ItemId),

    #[error("{0}")]
    Precondition(String),

    #[error("Ledger unreachable: {0}")]
    Transport(String),
}

impl WriteFailure {
    /// Map a ledger error to a failure class.
    ///
    /// Transports that only report a message are matched on the phrases
    /// wallets use for rejection and missing funds.
    #[must_use]
    pub fn classify(err: LedgerError) -> Self {
        match err {
            LedgerError::Rejected => Self::UserRejected,
            LedgerError::InsufficientFunds(msg) => Self::InsufficientFunds(msg),
            LedgerError::Reverted(reason) => Self::Reverted(reason),
            LedgerError::Transport(msg) | LedgerError::NotFound(msg) => {
                let lower = msg.to_ascii_lowercase();
                if lower.contains("user rejected") || lower.contains("user denied") {
                    Self::UserRejected
                } else if lower.contains("insufficient funds") {
                    Self::InsufficientFunds(msg)
                } else {
                    Self::Transport(msg)
                }
            }
        }
    }

    #[must_use]
    pub const fn code(&self) -> ErrorCode {
        match self {
            Self::UserRejected => ErrorCode::WriteRejected,
            Self::InsufficientFunds(_) => ErrorCode::InsufficientFunds,
            Self::Reverted(_) => ErrorCode::WriteReverted,
            Self::UnknownItem(_) => ErrorCode::ItemNotFound,
            Self::Precondition(_) => ErrorCode::PreconditionFailed,
            Self::Transport(_) => ErrorCode::LedgerUnreachable,
        }
    }
}

/// A confirmed write.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct WriteOutcome {
    pub receipt: Receipt,
    pub item: Option<ItemId>,
    /// The optimistic projection, if one applied.
    pub projection: Option<StatusChange>,
    /// `None` when the follow-up resync failed. The write itself stands.
    pub resync: Option<ReplayStats>,
}

/// Projection to apply once the ledger confirms.
struct Expected {
    status: Status,
    role: Option<Role>,
    holder: Option<Address>,
}

/// Executes [`WriteAction`]s with write-then-resync semantics.
#[derive(Clone)]
pub struct WriteCoordinator {
    ledger: Arc<dyn Ledger>,
    replayer: Replayer,
}

impl WriteCoordinator {
    pub fn new(ledger: Arc<dyn Ledger>, replayer: Replayer) -> Self {
        Self { ledger, replayer }
    }

    /// Check, submit, confirm, project, resync.
    ///
    /// # Errors
    ///
    /// Returns a classified [`WriteFailure`] if a local precondition fails or
    /// the ledger refuses or cannot confirm the call.
    pub async fn perform(
        &self,
        caller: &Address,
        action: WriteAction,
    ) -> Result<WriteOutcome, WriteFailure> {
        let (call, expected) = self.prepare(caller, &action).inspect_err(|e| {
            warn!(action = action.name(), error = %e, "write precondition failed");
        })?;

        let receipt = self.submit(caller, &call).await.inspect_err(|e| {
            error!(action = action.name(), code = %e.code(), error = %e, "write failed");
        })?;
        info!(
            action = action.name(),
            tx = %receipt.hash,
            block = receipt.block_number,
            "write confirmed"
        );

        let item = action.item().or(receipt.minted);
        let projection = match (&action, item) {
            (WriteAction::Register { metadata_pointer }, Some(id)) => {
                self.project_registration(id, caller, metadata_pointer);
                None
            }
            (_, Some(id)) => self.project(id, &action, expected),
            (_, None) => None,
        };

        let resync = match item {
            Some(id) => match self.replayer.resync_one(id).await {
                Ok(stats) => Some(stats),
                Err(e) => {
                    warn!(item_id = %id, error = %e, "resync after confirmed write failed");
                    None
                }
            },
            None => None,
        };

        Ok(WriteOutcome {
            receipt,
            item,
            projection,
            resync,
        })
    }

    async fn submit(&self, caller: &Address, call: &LedgerCall) -> Result<Receipt, WriteFailure> {
        let pending = self
            .ledger
            .submit_write(caller, call)
            .await
            .map_err(WriteFailure::classify)?;
        self.ledger
            .await_confirmation(&pending)
            .await
            .map_err(WriteFailure::classify)
    }

    fn prepare(
        &self,
        caller: &Address,
        action: &WriteAction,
    ) -> Result<(LedgerCall, Option<Expected>), WriteFailure> {
        let custody = &self.replayer.options().custody;
        if let WriteAction::Register { metadata_pointer } = action {
            if metadata_pointer.trim().is_empty() {
                return Err(WriteFailure::Precondition("metadata pointer is required".into()));
            }
            return Ok((
                LedgerCall::Mint {
                    metadata_pointer: metadata_pointer.clone(),
                },
                None,
            ));
        }

        let Some(id) = action.item() else {
            return Err(WriteFailure::Precondition("action has no target item".into()));
        };
        let item = self
            .replayer
            .store()
            .get(id)
            .ok_or(WriteFailure::UnknownItem(id))?;

        let prepared = match action {
            WriteAction::Register { .. } => {
                return Err(WriteFailure::Precondition("register has no target item".into()));
            }
            WriteAction::Attest {
                metadata_pointer, ..
            } => {
                require_status(&item, &[Status::Created])?;
                (
                    LedgerCall::Inspect {
                        item: id,
                        metadata_pointer: metadata_pointer.clone(),
                    },
                    Some(expected(Status::Inspecting)),
                )
            }
            WriteAction::Transfer { to, .. } => {
                require_holder(&item, caller)?;
                if to.is_zero() {
                    return Err(WriteFailure::Precondition("cannot transfer to the zero address".into()));
                }
                let next = match item.status {
                    Status::Inspecting => Status::InTransit,
                    Status::InTransit => Status::Delivered,
                    other => other,
                };
                (
                    LedgerCall::TransferFrom {
                        item: id,
                        from: caller.clone(),
                        to: to.clone(),
                    },
                    Some(Expected {
                        status: next,
                        role: Some(self.replayer.options().role_for(next, to)),
                        holder: Some(to.clone()),
                    }),
                )
            }
            WriteAction::AdvanceRetail { .. } => {
                require_status(&item, &[Status::Delivered, Status::Retailed])?;
                require_holder(&item, caller)?;
                let next = if item.status == Status::Delivered {
                    Status::Retailed
                } else {
                    Status::Consumed
                };
                (LedgerCall::AdvanceRetail { item: id }, Some(expected(next)))
            }
            WriteAction::Recall { reason, .. } => {
                if matches!(item.status, Status::Consumed | Status::Recalled) {
                    return Err(WriteFailure::Precondition(format!(
                        "item {id} is {} and cannot be recalled",
                        item.status
                    )));
                }
                (
                    LedgerCall::Recall {
                        item: id,
                        reason: reason.clone(),
                    },
                    Some(expected(Status::Recalled)),
                )
            }
            WriteAction::Quarantine { .. } => {
                require_status(&item, &[Status::Recalled])?;
                if item.holder_address.as_ref() == Some(&custody.quarantine_vault) {
                    return Err(WriteFailure::Precondition(format!(
                        "item {id} is already in quarantine"
                    )));
                }
                require_holder(&item, caller)?;
                (
                    LedgerCall::TransferFrom {
                        item: id,
                        from: caller.clone(),
                        to: custody.quarantine_vault.clone(),
                    },
                    Some(Expected {
                        status: Status::Recalled,
                        role: Some(Role::Quarantine),
                        holder: Some(custody.quarantine_vault.clone()),
                    }),
                )
            }
            WriteAction::Archive { .. } => {
                require_status(&item, &[Status::Consumed])?;
                require_holder(&item, caller)?;
                (
                    LedgerCall::TransferFrom {
                        item: id,
                        from: caller.clone(),
                        to: custody.archive_vault.clone(),
                    },
                    Some(Expected {
                        status: Status::Consumed,
                        role: Some(Role::Archive),
                        holder: Some(custody.archive_vault.clone()),
                    }),
                )
            }
        };
        Ok(prepared)
    }

    fn project(
        &self,
        id: ItemId,
        action: &WriteAction,
        expected: Option<Expected>,
    ) -> Option<StatusChange> {
        let expected = expected?;
        let mut opts = StatusOptions::projection_only();
        if let Some(role) = expected.role {
            opts = opts.with_role(role);
        }
        if let Some(holder) = expected.holder {
            opts = opts.with_holder(holder);
        }

        self.replayer.store().write(|store| {
            if let WriteAction::Attest {
                metadata_pointer: Some(pointer),
                ..
            } = action
            {
                if let Err(e) = store.replace_metadata_ref(id, pointer.clone()) {
                    warn!(item_id = %id, error = %e, "could not replace metadata pointer");
                }
            }
            store.set_status(id, expected.status.as_str(), opts).ok()
        })
    }

    fn project_registration(&self, id: ItemId, caller: &Address, pointer: &str) {
        let name = self.replayer.options().display.fallback_name(id);
        self.replayer.store().write(|store| {
            store.upsert_shell(
                id,
                ShellFields {
                    name: Some(name),
                    status: Some(Status::Created),
                    holder_role: Some(Role::Producer),
                    holder_address: Some(caller.clone()),
                    metadata_ref: Some(pointer.to_string()),
                    ..ShellFields::default()
                },
            );
        });
    }
}

const fn expected(status: Status) -> Expected {
    Expected {
        status,
        role: None,
        holder: None,
    }
}

fn require_status(item: &Item, allowed: &[Status]) -> Result<(), WriteFailure> {
    if allowed.contains(&item.status) {
        return Ok(());
    }
    let names: Vec<&str> = allowed.iter().map(|s| s.as_str()).collect();
    Err(WriteFailure::Precondition(format!(
        "item {} is {}, expected {}",
        item.id,
        item.status,
        names.join(" or ")
    )))
}

fn require_holder(item: &Item, caller: &Address) -> Result<(), WriteFailure> {
    if item.is_held_by(caller) {
        Ok(())
    } else {
        Err(WriteFailure::Precondition(format!(
            "caller {} is not the current holder of item {}",
            caller.short(),
            item.id
        )))
    }
}
