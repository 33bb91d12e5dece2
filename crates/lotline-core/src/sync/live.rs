//! Live notification handlers.
//!
//! Every handler updates projected state only. Entries for these events are
//! written later by replay or resync, with the ledger's block time.

use std::sync::Arc;

use tracing::{debug, warn};

use super::SyncOptions;
use crate::event::{LedgerEvent, RawEvent};
use crate::ledger::Ledger;
use crate::model::{Address, ItemId, Role, ShellFields, Status};
use crate::storage::{DocumentResolver, resolve_metadata};
use crate::store::{MutationRejected, ProjectionPatch, SharedStore};

/// What a notification did to the store.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LiveOutcome {
    Projected,
    /// The item has no shell yet; a later replay picks it up.
    UnknownItem,
    /// Nothing applicable (unknown status code).
    Ignored,
}

/// Applies live notifications to the store.
#[derive(Clone)]
pub struct LiveListener {
    ledger: Arc<dyn Ledger>,
    documents: Arc<dyn DocumentResolver>,
    store: SharedStore,
    options: SyncOptions,
}

impl LiveListener {
    pub fn new(
        ledger: Arc<dyn Ledger>,
        documents: Arc<dyn DocumentResolver>,
        store: SharedStore,
        options: SyncOptions,
    ) -> Self {
        Self {
            ledger,
            documents,
            store,
            options,
        }
    }

    pub async fn handle(&self, raw: &RawEvent) -> LiveOutcome {
        let id = raw.item();
        debug!(item_id = %id, kind = %raw.kind(), block = raw.block_number, "live notification");
        match &raw.payload {
            LedgerEvent::Minted { producer, .. } => self.on_minted(id, producer.clone()).await,
            LedgerEvent::Transfer { to, .. } => self.on_transfer(id, to.clone()).await,
            LedgerEvent::Inspected { .. } => {
                self.apply(id, ProjectionPatch::derived(Status::Inspecting))
            }
            LedgerEvent::StatusUpdated { new_code, .. } => match Status::from_code(*new_code) {
                Ok(status) => self.apply(id, ProjectionPatch::derived(status)),
                Err(e) => {
                    warn!(item_id = %id, code = e.code, error_code = %e.error_code(), "ignoring status update with unknown code");
                    LiveOutcome::Ignored
                }
            },
            LedgerEvent::Recalled { .. } => {
                self.apply(id, ProjectionPatch::derived(Status::Recalled))
            }
            LedgerEvent::Archived { vault, .. } => self.apply(
                id,
                ProjectionPatch {
                    status: Some(Status::Consumed),
                    role: Some(Role::Archive),
                    holder: Some(vault.clone()),
                },
            ),
        }
    }

    async fn on_minted(&self, id: ItemId, producer: Address) -> LiveOutcome {
        let metadata = match self.ledger.metadata_pointer(id).await {
            Ok(pointer) => match resolve_metadata(self.documents.as_ref(), &pointer).await {
                Ok(metadata) => Some((pointer, metadata)),
                Err(e) => {
                    warn!(item_id = %id, %pointer, error = %e, "metadata unresolved for new item");
                    None
                }
            },
            Err(e) => {
                warn!(item_id = %id, error = %e, "failed to read metadata pointer for new item");
                None
            }
        };

        let mut fields = ShellFields {
            status: Some(Status::Created),
            holder_role: Some(Role::Producer),
            holder_address: Some(producer),
            ..ShellFields::default()
        };
        match metadata {
            Some((pointer, metadata)) => {
                fields.name = metadata.name.clone();
                fields.description = metadata.description.clone();
                fields.location = metadata.location.clone();
                fields.metadata_ref = Some(pointer);
                fields.metadata = Some(metadata);
            }
            None => {
                if self.store.read(|s| s.get(id).is_none_or(|item| item.name.is_empty())) {
                    fields.name = Some(self.options.display.fallback_name(id));
                }
            }
        }

        self.store.write(|s| {
            s.upsert_shell(id, fields);
        });
        LiveOutcome::Projected
    }

    async fn on_transfer(&self, id: ItemId, to: Address) -> LiveOutcome {
        let outcome = self.apply(
            id,
            ProjectionPatch {
                holder: Some(to.clone()),
                ..ProjectionPatch::default()
            },
        );
        if outcome != LiveOutcome::Projected {
            return outcome;
        }

        match self.ledger.status_code(id).await {
            Ok(code) => match Status::from_code(code) {
                Ok(status) => {
                    let role = self.options.role_for(status, &to);
                    self.apply(
                        id,
                        ProjectionPatch {
                            status: Some(status),
                            role: Some(role),
                            holder: None,
                        },
                    )
                }
                Err(e) => {
                    warn!(item_id = %id, code = e.code, error_code = %e.error_code(), "holder updated, status code unknown");
                    LiveOutcome::Projected
                }
            },
            Err(e) => {
                warn!(item_id = %id, error = %e, "holder updated, status re-read failed");
                LiveOutcome::Projected
            }
        }
    }

    fn apply(&self, id: ItemId, patch: ProjectionPatch) -> LiveOutcome {
        match self.store.write(|s| s.patch(id, patch).map(|_| ())) {
            Ok(()) => LiveOutcome::Projected,
            Err(MutationRejected::UnknownItem(_)) => LiveOutcome::UnknownItem,
            Err(e) => {
                warn!(item_id = %id, error_code = %e.code(), error = %e, "live projection rejected");
                LiveOutcome::Ignored
            }
        }
    }
}
