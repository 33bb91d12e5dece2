//! The engine facade: one store, one ledger, one document resolver.

use std::path::Path;
use std::sync::Arc;

use anyhow::Result;
use chrono::TimeDelta;

use crate::config::{EffectiveConfig, ProjectConfig};
use crate::event::RawEvent;
use crate::ledger::{Ledger, LedgerError};
use crate::model::{Address, Item, ItemId};
use crate::storage::{DocumentResolver, GatewayResolver, LocalDocuments, StorageError};
use crate::store::{HistoryStore, SharedStore, snapshot};
use crate::sync::{
    LiveHandle, LiveListener, LiveOutcome, ReplayStats, Replayer, SubscriptionManager, SyncError,
    SyncOptions, WriteAction, WriteCoordinator, WriteFailure, WriteOutcome,
};

/// Read model plus the reconciliation and write paths around it.
#[derive(Clone)]
pub struct Engine {
    store: SharedStore,
    replayer: Replayer,
    listener: LiveListener,
    writer: WriteCoordinator,
    subscriptions: SubscriptionManager,
}

impl Engine {
    /// Engine over an empty store.
    pub fn new(
        ledger: Arc<dyn Ledger>,
        documents: Arc<dyn DocumentResolver>,
        config: &ProjectConfig,
    ) -> Self {
        let store = HistoryStore::with_tolerance(TimeDelta::milliseconds(
            config.sync.dedup_tolerance_ms,
        ));
        Self::with_store(ledger, documents, store, config)
    }

    /// Engine over an existing store, e.g. one loaded from a snapshot.
    pub fn with_store(
        ledger: Arc<dyn Ledger>,
        documents: Arc<dyn DocumentResolver>,
        store: HistoryStore,
        config: &ProjectConfig,
    ) -> Self {
        let options = SyncOptions::from_config(config);
        let store = SharedStore::new(store);
        let replayer = Replayer::new(
            Arc::clone(&ledger),
            Arc::clone(&documents),
            store.clone(),
            options.clone(),
        );
        let listener = LiveListener::new(
            Arc::clone(&ledger),
            documents,
            store.clone(),
            options.clone(),
        );
        let resync = options.resync_on_live_event.then(|| replayer.clone());
        let subscriptions =
            SubscriptionManager::new(Arc::clone(&ledger), listener.clone(), resync);
        let writer = WriteCoordinator::new(ledger, replayer.clone());
        Self {
            store,
            replayer,
            listener,
            writer,
            subscriptions,
        }
    }

    /// Full replay. Idempotent.
    ///
    /// # Errors
    ///
    /// See [`Replayer::load_all`].
    pub async fn load_all(&self) -> Result<ReplayStats, SyncError> {
        self.replayer.load_all().await
    }

    /// # Errors
    ///
    /// See [`Replayer::resync_one`].
    pub async fn resync_one(&self, id: ItemId) -> Result<ReplayStats, SyncError> {
        self.replayer.resync_one(id).await
    }

    #[must_use]
    pub fn get(&self, id: ItemId) -> Option<Item> {
        self.store.get(id)
    }

    #[must_use]
    pub fn exists(&self, id: ItemId) -> bool {
        self.store.exists(id)
    }

    #[must_use]
    pub fn items(&self) -> Vec<Item> {
        self.store.items()
    }

    #[must_use]
    pub const fn store(&self) -> &SharedStore {
        &self.store
    }

    /// Attach to live notifications; see [`SubscriptionManager::attach`].
    ///
    /// # Errors
    ///
    /// Returns the ledger error if a channel cannot be opened.
    pub async fn attach_live(&self) -> Result<LiveHandle, LedgerError> {
        self.subscriptions.attach().await
    }

    #[must_use]
    pub const fn subscriptions(&self) -> &SubscriptionManager {
        &self.subscriptions
    }

    /// Apply one live notification directly, without a subscription.
    pub async fn handle_live(&self, raw: &RawEvent) -> LiveOutcome {
        self.listener.handle(raw).await
    }

    /// # Errors
    ///
    /// See [`WriteCoordinator::perform`].
    pub async fn perform(
        &self,
        caller: &Address,
        action: WriteAction,
    ) -> Result<WriteOutcome, WriteFailure> {
        self.writer.perform(caller, action).await
    }

    /// Persist the store to `path`.
    ///
    /// # Errors
    ///
    /// Returns an error if the snapshot cannot be written.
    pub fn save_snapshot(&self, path: &Path, block_height: Option<u64>) -> Result<()> {
        snapshot::save(&self.store.to_store(), block_height, path)
    }
}

/// Build the network resolver described by `config`.
///
/// `local://` pointers resolve under `[storage] local_dir`, relative to
/// `project_root`, when it is set.
///
/// # Errors
///
/// Returns [`StorageError::Client`] if the HTTP client cannot be built.
pub fn resolver_from_config(
    config: &EffectiveConfig,
    project_root: &Path,
) -> Result<GatewayResolver, StorageError> {
    let storage = &config.project.storage;
    let resolver = GatewayResolver::new(config.resolved_gateways.clone(), storage.timeouts())?;
    Ok(match &storage.local_dir {
        Some(dir) => resolver.with_local(LocalDocuments::new(project_root.join(dir))),
        None => resolver,
    })
}
