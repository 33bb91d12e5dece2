//! Deduplicating history store.
//!
//! The [`HistoryStore`] owns every [`Item`] the engine has observed: its
//! projected state (status, holder, metadata) and its append-only history.
//! All mutation goes through this type:
//!
//! - [`HistoryStore::upsert_shell`] creates items or merges projected fields,
//!   never touching history.
//! - [`HistoryStore::set_status`] is the authoritative status transition path
//!   (role derivation, optional `STATUS_CHANGED` entry).
//! - [`HistoryStore::patch`] is the live-notification path: projected fields
//!   only, no role derivation beyond what the caller supplies, no history.
//! - [`HistoryStore::append_history`] is the only way an entry is added, and
//!   it suppresses entries equivalent to one already stored (see [`dedup`]).
//!
//! Rejections (unknown item, status outside the closed set) are returned as
//! [`MutationRejected`] values and logged; they never panic and are not meant
//! to abort a reconciliation pass.
//!
//! Items are never removed.

pub mod dedup;
pub mod shared;
pub mod snapshot;

pub use shared::SharedStore;

use std::collections::BTreeMap;
use std::str::FromStr;

use chrono::{DateTime, TimeDelta, Utc};
use tracing::{debug, warn};

use crate::error::ErrorCode;
use crate::model::{Address, EntryKind, HistoryEntry, Item, ItemId, Role, ShellFields, Status};

// ---------------------------------------------------------------------------
// Outcomes
// ---------------------------------------------------------------------------

/// Why a mutation was not applied.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum MutationRejected {
    #[error("item {0} does not exist")]
    UnknownItem(ItemId),

    #[error("invalid status '{value}' for item {item}")]
    InvalidStatus { item: ItemId, value: String },
}

impl MutationRejected {
    #[must_use]
    pub const fn code(&self) -> ErrorCode {
        match self {
            Self::UnknownItem(_) => ErrorCode::ItemNotFound,
            Self::InvalidStatus { .. } => ErrorCode::InvalidStatus,
        }
    }
}

/// Result of [`HistoryStore::append_history`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AppendOutcome {
    /// The entry was stored at `index`.
    Appended { index: usize },
    /// An equivalent entry already exists at `existing`; nothing changed.
    Duplicate { existing: usize },
}

impl AppendOutcome {
    #[must_use]
    pub const fn is_appended(self) -> bool {
        matches!(self, Self::Appended { .. })
    }
}

/// Whether `set_status` records a history entry.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum HistoryMode {
    /// Projection only.
    Suppress,
    /// Append a `STATUS_CHANGED` entry. Ledger-sourced callers pass the block
    /// time here, never the local clock.
    Record {
        actor: Address,
        timestamp: DateTime<Utc>,
    },
}

/// Options for [`HistoryStore::set_status`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StatusOptions {
    /// Overrides the role derived from the new status (custody transfers to
    /// a terminal vault).
    pub role: Option<Role>,
    pub holder: Option<Address>,
    pub history: HistoryMode,
}

impl StatusOptions {
    /// Projection-only update with derived role and unchanged holder.
    #[must_use]
    pub const fn projection_only() -> Self {
        Self {
            role: None,
            holder: None,
            history: HistoryMode::Suppress,
        }
    }

    /// Update that records a `STATUS_CHANGED` entry.
    #[must_use]
    pub const fn recorded(actor: Address, timestamp: DateTime<Utc>) -> Self {
        Self {
            role: None,
            holder: None,
            history: HistoryMode::Record { actor, timestamp },
        }
    }

    #[must_use]
    pub const fn with_role(mut self, role: Role) -> Self {
        self.role = Some(role);
        self
    }

    #[must_use]
    pub fn with_holder(mut self, holder: Address) -> Self {
        self.holder = Some(holder);
        self
    }
}

/// Result of a successful [`HistoryStore::set_status`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct StatusChange {
    pub from: Status,
    pub to: Status,
    pub role: Role,
    /// Present when history was requested.
    pub history: Option<AppendOutcome>,
}

/// Direct projected-state update used by live notifications.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ProjectionPatch {
    pub status: Option<Status>,
    pub role: Option<Role>,
    pub holder: Option<Address>,
}

impl ProjectionPatch {
    /// Status plus the role the lexicon derives for it.
    #[must_use]
    pub const fn derived(status: Status) -> Self {
        Self {
            status: Some(status),
            role: Some(status.holder_role()),
            holder: None,
        }
    }
}

// ---------------------------------------------------------------------------
// HistoryStore
// ---------------------------------------------------------------------------

/// In-memory item store keyed by id.
#[derive(Debug, Clone)]
pub struct HistoryStore {
    items: BTreeMap<ItemId, Item>,
    tolerance: TimeDelta,
}

impl Default for HistoryStore {
    fn default() -> Self {
        Self::new()
    }
}

impl HistoryStore {
    /// Empty store with the default 10 s dedup tolerance.
    #[must_use]
    pub fn new() -> Self {
        Self::with_tolerance(dedup::default_tolerance())
    }

    #[must_use]
    pub const fn with_tolerance(tolerance: TimeDelta) -> Self {
        Self {
            items: BTreeMap::new(),
            tolerance,
        }
    }

    #[must_use]
    pub const fn tolerance(&self) -> TimeDelta {
        self.tolerance
    }

    #[must_use]
    pub fn get(&self, id: ItemId) -> Option<&Item> {
        self.items.get(&id)
    }

    #[must_use]
    pub fn exists(&self, id: ItemId) -> bool {
        self.items.contains_key(&id)
    }

    /// All items in ascending id order.
    pub fn items(&self) -> impl Iterator<Item = &Item> {
        self.items.values()
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.items.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.items.is_empty()
    }

    /// Create the item if absent (empty history, `CREATED`/`PRODUCER`), then
    /// merge the non-empty `fields` into its projected state.
    pub fn upsert_shell(&mut self, id: ItemId, fields: ShellFields) -> &Item {
        let item = self.items.entry(id).or_insert_with(|| {
            debug!(item_id = %id, "creating item shell");
            Item::shell(id)
        });
        fields.merge_into(item);
        item
    }

    /// Authoritative status transition.
    ///
    /// `status` is parsed against the closed status set. On success the role
    /// is recomputed from the lexicon unless `opts.role` overrides it, the
    /// holder is replaced if `opts.holder` is given, and a `STATUS_CHANGED`
    /// entry is appended when `opts.history` asks for one.
    ///
    /// # Errors
    ///
    /// Returns [`MutationRejected`] (and logs it) when the item is unknown or
    /// `status` is not a valid status name. The item is left unchanged.
    pub fn set_status(
        &mut self,
        id: ItemId,
        status: &str,
        opts: StatusOptions,
    ) -> Result<StatusChange, MutationRejected> {
        let Some(item) = self.items.get_mut(&id) else {
            warn!(item_id = %id, "set_status on unknown item");
            return Err(MutationRejected::UnknownItem(id));
        };
        let Ok(to) = Status::from_str(status) else {
            warn!(item_id = %id, value = status, "rejecting status outside the closed set");
            return Err(MutationRejected::InvalidStatus {
                item: id,
                value: status.to_string(),
            });
        };

        let from = item.status;
        let role = opts.role.unwrap_or_else(|| to.holder_role());
        item.status = to;
        item.holder_role = role;
        if let Some(holder) = opts.holder {
            item.holder_address = Some(holder);
        }

        let history = match opts.history {
            HistoryMode::Suppress => None,
            HistoryMode::Record { actor, timestamp } => {
                let entry = HistoryEntry::new(EntryKind::StatusChanged, actor, timestamp)
                    .with_transition(Some(from), Some(to));
                Some(self.append_history(id, entry)?)
            }
        };

        Ok(StatusChange {
            from,
            to,
            role,
            history,
        })
    }

    /// Overwrite projected fields directly. Never appends history.
    ///
    /// # Errors
    ///
    /// Returns [`MutationRejected::UnknownItem`] if the item has no shell yet.
    pub fn patch(&mut self, id: ItemId, patch: ProjectionPatch) -> Result<&Item, MutationRejected> {
        let Some(item) = self.items.get_mut(&id) else {
            debug!(item_id = %id, "projection patch for unknown item");
            return Err(MutationRejected::UnknownItem(id));
        };
        if let Some(status) = patch.status {
            item.status = status;
        }
        if let Some(role) = patch.role {
            item.holder_role = role;
        }
        if let Some(holder) = patch.holder {
            item.holder_address = Some(holder);
        }
        Ok(item)
    }

    /// Replace the metadata pointer and drop the cached document so the next
    /// replay resolves the new one.
    ///
    /// # Errors
    ///
    /// Returns [`MutationRejected::UnknownItem`] if the item does not exist.
    pub fn replace_metadata_ref(
        &mut self,
        id: ItemId,
        pointer: String,
    ) -> Result<(), MutationRejected> {
        let item = self
            .items
            .get_mut(&id)
            .ok_or(MutationRejected::UnknownItem(id))?;
        item.metadata_ref = Some(pointer);
        item.metadata = None;
        Ok(())
    }

    /// Append `entry` unless an equivalent entry is already stored.
    ///
    /// # Errors
    ///
    /// Returns [`MutationRejected::UnknownItem`] if the item does not exist.
    pub fn append_history(
        &mut self,
        id: ItemId,
        entry: HistoryEntry,
    ) -> Result<AppendOutcome, MutationRejected> {
        let Some(item) = self.items.get_mut(&id) else {
            warn!(item_id = %id, kind = %entry.kind, "append_history on unknown item");
            return Err(MutationRejected::UnknownItem(id));
        };

        if let Some(existing) = dedup::find_equivalent(&item.history, &entry, self.tolerance) {
            debug!(
                item_id = %id,
                kind = %entry.kind,
                actor = %entry.actor,
                "duplicate history entry suppressed"
            );
            return Ok(AppendOutcome::Duplicate { existing });
        }

        item.history.push(entry);
        Ok(AppendOutcome::Appended {
            index: item.history.len() - 1,
        })
    }

    pub(crate) fn insert_item(&mut self, item: Item) {
        self.items.insert(item.id, item);
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    fn id(n: u64) -> ItemId {
        ItemId::new_unchecked(n)
    }

    fn ts(secs: i64) -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2024, 1, 1, 0, 0, 0).unwrap() + TimeDelta::seconds(secs)
    }

    fn registered(actor: &str, secs: i64) -> HistoryEntry {
        HistoryEntry::new(EntryKind::Registered, Address::new(actor), ts(secs))
            .with_transition(None, Some(Status::Created))
    }

    fn store_with(ids: &[u64]) -> HistoryStore {
        let mut store = HistoryStore::new();
        for n in ids {
            store.upsert_shell(id(*n), ShellFields::default());
        }
        store
    }

    #[test]
    fn upsert_creates_shell_with_defaults() {
        let mut store = HistoryStore::new();
        let item = store.upsert_shell(id(1), ShellFields::default());
        assert_eq!(item.status, Status::Created);
        assert_eq!(item.holder_role, Role::Producer);
        assert!(item.history.is_empty());
        assert!(store.exists(id(1)));
        assert!(!store.exists(id(2)));
    }

    #[test]
    fn upsert_never_touches_history() {
        let mut store = store_with(&[1]);
        store.append_history(id(1), registered("0xabc", 0)).unwrap();

        let item = store.upsert_shell(
            id(1),
            ShellFields {
                name: Some("Durian".into()),
                status: Some(Status::InTransit),
                ..ShellFields::default()
            },
        );
        assert_eq!(item.name, "Durian");
        assert_eq!(item.status, Status::InTransit);
        assert_eq!(item.history.len(), 1);
    }

    #[test]
    fn duplicate_within_tolerance_is_suppressed() {
        let mut store = store_with(&[1]);
        let first = store.append_history(id(1), registered("0xabc", 0)).unwrap();
        let second = store.append_history(id(1), registered("0xabc", 5)).unwrap();
        assert_eq!(first, AppendOutcome::Appended { index: 0 });
        assert_eq!(second, AppendOutcome::Duplicate { existing: 0 });
        assert_eq!(store.get(id(1)).unwrap().history.len(), 1);
    }

    #[test]
    fn distinct_entries_are_kept() {
        let mut store = store_with(&[1]);
        store.append_history(id(1), registered("0xabc", 0)).unwrap();
        assert!(store.append_history(id(1), registered("0xabc", 11)).unwrap().is_appended());
        assert!(store.append_history(id(1), registered("0xdef", 0)).unwrap().is_appended());
        assert_eq!(store.get(id(1)).unwrap().history.len(), 3);
    }

    #[test]
    fn append_to_unknown_item_is_rejected() {
        let mut store = HistoryStore::new();
        assert_eq!(
            store.append_history(id(9), registered("0xabc", 0)),
            Err(MutationRejected::UnknownItem(id(9)))
        );
        assert!(store.is_empty());
    }

    #[test]
    fn set_status_rejects_values_outside_closed_set() {
        let mut store = store_with(&[1]);
        let result = store.set_status(id(1), "SHIPPED", StatusOptions::projection_only());
        assert_eq!(
            result,
            Err(MutationRejected::InvalidStatus {
                item: id(1),
                value: "SHIPPED".into()
            })
        );
        assert_eq!(store.get(id(1)).unwrap().status, Status::Created);
    }

    #[test]
    fn rejections_map_to_catalog_codes() {
        let mut store = store_with(&[1]);
        let invalid = store
            .set_status(id(1), "SHIPPED", StatusOptions::projection_only())
            .unwrap_err();
        assert_eq!(invalid.code(), ErrorCode::InvalidStatus);
        let unknown = store
            .append_history(id(9), registered("0xabc", 0))
            .unwrap_err();
        assert_eq!(unknown.code(), ErrorCode::ItemNotFound);
    }

    #[test]
    fn set_status_on_unknown_item_is_rejected() {
        let mut store = HistoryStore::new();
        assert_eq!(
            store.set_status(id(3), "DELIVERED", StatusOptions::projection_only()),
            Err(MutationRejected::UnknownItem(id(3)))
        );
    }

    #[test]
    fn set_status_derives_role_from_lexicon() {
        let mut store = store_with(&[1]);
        for status in Status::ALL {
            let change = store
                .set_status(id(1), status.as_str(), StatusOptions::projection_only())
                .unwrap();
            assert_eq!(change.to, status);
            assert_eq!(store.get(id(1)).unwrap().holder_role, status.holder_role());
        }
    }

    #[test]
    fn set_status_custody_override_sets_role_directly() {
        let mut store = store_with(&[1]);
        let vault = Address::new(Address::QUARANTINE_VAULT);
        let change = store
            .set_status(
                id(1),
                "RECALLED",
                StatusOptions::projection_only()
                    .with_role(Role::Quarantine)
                    .with_holder(vault.clone()),
            )
            .unwrap();
        assert_eq!(change.role, Role::Quarantine);
        let item = store.get(id(1)).unwrap();
        assert_eq!(item.holder_role, Role::Quarantine);
        assert_eq!(item.holder_address, Some(vault));
        assert!(item.history.is_empty());
    }

    #[test]
    fn recorded_set_status_appends_status_changed() {
        let mut store = store_with(&[1]);
        store
            .set_status(id(1), "INSPECTING", StatusOptions::projection_only())
            .unwrap();
        let change = store
            .set_status(
                id(1),
                "IN_TRANSIT",
                StatusOptions::recorded(Address::new("0xFarm"), ts(30)),
            )
            .unwrap();
        assert_eq!(change.from, Status::Inspecting);
        assert_eq!(change.history, Some(AppendOutcome::Appended { index: 0 }));

        let entry = &store.get(id(1)).unwrap().history[0];
        assert_eq!(entry.kind, EntryKind::StatusChanged);
        assert_eq!(entry.actor.as_str(), "0xfarm");
        assert_eq!(entry.timestamp, ts(30));
        assert_eq!(entry.status_from, Some(Status::Inspecting));
        assert_eq!(entry.status_to, Some(Status::InTransit));
    }

    #[test]
    fn patch_updates_projection_without_history() {
        let mut store = store_with(&[1]);
        let item = store
            .patch(
                id(1),
                ProjectionPatch {
                    holder: Some(Address::new("0xNEW")),
                    ..ProjectionPatch::derived(Status::Delivered)
                },
            )
            .unwrap();
        assert_eq!(item.status, Status::Delivered);
        assert_eq!(item.holder_role, Role::Retailer);
        assert_eq!(item.holder_address, Some(Address::new("0xnew")));
        assert!(item.history.is_empty());
        assert!(store.patch(id(2), ProjectionPatch::default()).is_err());
    }

    #[test]
    fn replacing_metadata_ref_drops_cached_document() {
        let mut store = store_with(&[1]);
        store.upsert_shell(
            id(1),
            ShellFields {
                metadata_ref: Some("ipfs://old".into()),
                metadata: Some(crate::model::Metadata::default()),
                ..ShellFields::default()
            },
        );
        store.replace_metadata_ref(id(1), "ipfs://new".into()).unwrap();
        let item = store.get(id(1)).unwrap();
        assert_eq!(item.metadata_ref.as_deref(), Some("ipfs://new"));
        assert!(item.metadata.is_none());
    }

    #[test]
    fn items_iterate_in_id_order() {
        let store = store_with(&[3, 1, 2]);
        let ids: Vec<u64> = store.items().map(|i| i.id.get()).collect();
        assert_eq!(ids, vec![1, 2, 3]);
        assert_eq!(store.len(), 3);
    }
}
