//! Historical replay and targeted resync.

use std::sync::Arc;

use futures::future::try_join_all;
use serde::Serialize;
use tracing::{debug, info, warn};

use super::{SyncError, SyncOptions};
use crate::event::normalize::normalize;
use crate::event::{EventKind, RawEvent, is_suppressed};
use crate::ledger::{Ledger, LedgerError};
use crate::model::{ItemId, Metadata, ShellFields, Status};
use crate::storage::{DocumentResolver, resolve_metadata};
use crate::store::{AppendOutcome, SharedStore};

/// Counters for one replay or resync pass.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct ReplayStats {
    /// Items whose projected state was refreshed from the ledger.
    pub items_loaded: usize,
    /// Ids the ledger reports as `NOT_EXIST`.
    pub items_missing: usize,
    /// Ids with a status code outside the lexicon.
    pub unknown_status: usize,
    /// Ids whose ledger reads failed.
    pub item_errors: usize,
    /// Metadata documents that could not be resolved.
    pub metadata_errors: usize,
    pub events_seen: usize,
    pub appended: usize,
    pub duplicates: usize,
    /// Issuance transfers and archive notices.
    pub suppressed: usize,
    /// Events dropped because their block time could not be resolved.
    pub normalize_errors: usize,
    /// Events for items the store does not hold.
    pub orphaned: usize,
    pub from_block: u64,
    pub to_block: u64,
}

enum ItemRead {
    Loaded { metadata_failed: bool },
    Missing,
    UnknownStatus(u8),
}

/// Rebuilds store state from the ledger.
#[derive(Clone)]
pub struct Replayer {
    ledger: Arc<dyn Ledger>,
    documents: Arc<dyn DocumentResolver>,
    store: SharedStore,
    options: SyncOptions,
}

impl Replayer {
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

    #[must_use]
    pub const fn store(&self) -> &SharedStore {
        &self.store
    }

    #[must_use]
    pub const fn options(&self) -> &SyncOptions {
        &self.options
    }

    /// Full replay: refresh every item's projected state, then append the
    /// history of the replay window.
    ///
    /// Safe to call repeatedly; a second pass over an unchanged ledger only
    /// finds duplicates.
    ///
    /// # Errors
    ///
    /// Fails if the item count or chain height cannot be read, or if any event
    /// kind's query fails. A failed pass appends no history at all, since a
    /// partial event set would under-report.
    pub async fn load_all(&self) -> Result<ReplayStats, SyncError> {
        let mut stats = ReplayStats::default();

        let count = self.ledger.item_count().await.map_err(SyncError::ItemCount)?;
        for raw in 1..=count {
            let id = ItemId::new_unchecked(raw);
            match self.load_item(id).await {
                Ok(ItemRead::Loaded { metadata_failed }) => {
                    stats.items_loaded += 1;
                    if metadata_failed {
                        stats.metadata_errors += 1;
                    }
                }
                Ok(ItemRead::Missing) => stats.items_missing += 1,
                Ok(ItemRead::UnknownStatus(code)) => {
                    warn!(item_id = %id, code, "skipping item with unknown status code");
                    stats.unknown_status += 1;
                }
                Err(e) => {
                    warn!(item_id = %id, error = %e, "skipping item due to ledger read error");
                    stats.item_errors += 1;
                }
            }
        }

        self.replay_events(None, self.options.replay_window_blocks, &mut stats)
            .await?;

        info!(
            items = stats.items_loaded,
            missing = stats.items_missing,
            item_errors = stats.item_errors,
            appended = stats.appended,
            duplicates = stats.duplicates,
            from_block = stats.from_block,
            to_block = stats.to_block,
            "replay complete"
        );
        Ok(stats)
    }

    /// Pull the recent history of one item over the resync window.
    ///
    /// # Errors
    ///
    /// Same systemic failures as [`Self::load_all`], scoped to `id`.
    pub async fn resync_one(&self, id: ItemId) -> Result<ReplayStats, SyncError> {
        let mut stats = ReplayStats::default();
        self.replay_events(Some(id), self.options.resync_window_blocks, &mut stats)
            .await?;
        debug!(
            item_id = %id,
            appended = stats.appended,
            duplicates = stats.duplicates,
            "resync complete"
        );
        Ok(stats)
    }

    async fn load_item(&self, id: ItemId) -> Result<ItemRead, LedgerError> {
        let code = self.ledger.status_code(id).await?;
        let status = match Status::from_code(code) {
            Ok(Status::NotExist) => return Ok(ItemRead::Missing),
            Ok(status) => status,
            Err(e) => return Ok(ItemRead::UnknownStatus(e.code)),
        };
        let owner = self.ledger.owner(id).await?;
        let pointer = self.ledger.metadata_pointer(id).await?;

        let (existing_name, cached) = self.store.read(|store| {
            store.get(id).map_or((None, None), |item| {
                let cached = item
                    .metadata
                    .clone()
                    .filter(|_| item.metadata_ref.as_deref() == Some(pointer.as_str()));
                (Some(item.name.clone()), cached)
            })
        });

        let mut metadata_failed = false;
        let metadata = match cached {
            Some(metadata) => Some(metadata),
            None => match resolve_metadata(self.documents.as_ref(), &pointer).await {
                Ok(metadata) => Some(metadata),
                Err(e) => {
                    warn!(
                        item_id = %id,
                        %pointer,
                        error_code = %e.code(),
                        error = %e,
                        "metadata unresolved, using fallback name"
                    );
                    metadata_failed = true;
                    None
                }
            },
        };

        let mut fields = shell_fields(metadata);
        if fields.name.is_none() && existing_name.is_none_or(|name| name.is_empty()) {
            fields.name = Some(self.options.display.fallback_name(id));
        }
        fields.status = Some(status);
        fields.holder_role = Some(self.options.role_for(status, &owner));
        fields.holder_address = Some(owner);
        fields.metadata_ref = Some(pointer);

        self.store.write(|store| {
            store.upsert_shell(id, fields);
        });
        Ok(ItemRead::Loaded { metadata_failed })
    }

    async fn replay_events(
        &self,
        item: Option<ItemId>,
        window: u64,
        stats: &mut ReplayStats,
    ) -> Result<(), SyncError> {
        let height = self.ledger.block_number().await.map_err(SyncError::BlockHeight)?;
        let from = height.saturating_sub(window);
        stats.from_block = from;
        stats.to_block = height;

        let ledger = self.ledger.as_ref();
        let batches = try_join_all(EventKind::REPLAYED.into_iter().map(|kind| async move {
            ledger
                .query_events(kind, item, from, None)
                .await
                .map(|events| (kind, events))
                .map_err(|source| SyncError::EventQuery { kind, source })
        }))
        .await?;

        for (kind, events) in batches {
            debug!(kind = %kind, count = events.len(), "applying event batch");
            for raw in &events {
                self.apply_event(raw, stats).await;
            }
        }
        Ok(())
    }

    async fn apply_event(&self, raw: &RawEvent, stats: &mut ReplayStats) {
        stats.events_seen += 1;
        if is_suppressed(raw) {
            stats.suppressed += 1;
            return;
        }

        let id = raw.item();
        let Some(location) = self.store.read(|store| store.get(id).map(|i| i.location.clone()))
        else {
            debug!(item_id = %id, kind = %raw.kind(), "event for item not in store");
            stats.orphaned += 1;
            return;
        };

        let normalized = match normalize(self.ledger.as_ref(), raw, &location).await {
            Ok(Some(normalized)) => normalized,
            Ok(None) => {
                stats.suppressed += 1;
                return;
            }
            Err(e) => {
                warn!(
                    item_id = %id,
                    kind = %raw.kind(),
                    block = raw.block_number,
                    error_code = %e.code(),
                    error = %e,
                    "skipping event due to normalization error"
                );
                stats.normalize_errors += 1;
                return;
            }
        };

        match self
            .store
            .write(|store| store.append_history(normalized.item, normalized.entry))
        {
            Ok(AppendOutcome::Appended { .. }) => stats.appended += 1,
            Ok(AppendOutcome::Duplicate { .. }) => stats.duplicates += 1,
            Err(_) => stats.orphaned += 1,
        }
    }
}

fn shell_fields(metadata: Option<Metadata>) -> ShellFields {
    let Some(metadata) = metadata else {
        return ShellFields::default();
    };
    ShellFields {
        name: metadata.name.clone(),
        description: metadata.description.clone(),
        location: metadata.location.clone(),
        metadata: Some(metadata),
        ..ShellFields::default()
    }
}
