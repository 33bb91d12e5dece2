//! Process-wide handle to the single store instance.
//!
//! Access is closure-scoped so the lock can never be held across an `.await`:
//! each mutation runs to completion before the caller suspends again.

use std::sync::{Arc, Mutex, PoisonError};

use super::HistoryStore;
use crate::model::{Item, ItemId};

/// Cloneable shared handle to a [`HistoryStore`].
#[derive(Debug, Clone, Default)]
pub struct SharedStore {
    inner: Arc<Mutex<HistoryStore>>,
}

impl SharedStore {
    #[must_use]
    pub fn new(store: HistoryStore) -> Self {
        Self {
            inner: Arc::new(Mutex::new(store)),
        }
    }

    /// Run `f` with shared access to the store.
    pub fn read<R>(&self, f: impl FnOnce(&HistoryStore) -> R) -> R {
        let guard = self.inner.lock().unwrap_or_else(PoisonError::into_inner);
        f(&guard)
    }

    /// Run `f` with exclusive access to the store.
    pub fn write<R>(&self, f: impl FnOnce(&mut HistoryStore) -> R) -> R {
        let mut guard = self.inner.lock().unwrap_or_else(PoisonError::into_inner);
        f(&mut guard)
    }

    /// Snapshot of one item.
    #[must_use]
    pub fn get(&self, id: ItemId) -> Option<Item> {
        self.read(|store| store.get(id).cloned())
    }

    #[must_use]
    pub fn exists(&self, id: ItemId) -> bool {
        self.read(|store| store.exists(id))
    }

    /// Snapshot of every item in id order.
    #[must_use]
    pub fn items(&self) -> Vec<Item> {
        self.read(|store| store.items().cloned().collect())
    }

    /// Clone of the whole store, used for snapshots.
    #[must_use]
    pub fn to_store(&self) -> HistoryStore {
        self.read(Clone::clone)
    }
}
