//! JSON snapshot of the whole store.
//!
//! A snapshot carries every item with its full history. Loading one and then
//! replaying the ledger over it adds nothing: replayed entries hit the dedup
//! rule against the restored history.

use std::fs;
use std::path::Path;

use anyhow::{Context, Result, bail};
use chrono::{DateTime, TimeDelta, Utc};
use serde::{Deserialize, Serialize};

use super::HistoryStore;
use crate::model::Item;

/// Current on-disk format version.
pub const SNAPSHOT_VERSION: u32 = 1;

/// Serialized form of a [`HistoryStore`].
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Snapshot {
    pub version: u32,
    pub saved_at: DateTime<Utc>,
    pub dedup_tolerance_ms: i64,
    /// Latest block observed by the producing replay, if any.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub block_height: Option<u64>,
    pub items: Vec<Item>,
}

impl Snapshot {
    #[must_use]
    pub fn capture(store: &HistoryStore, block_height: Option<u64>) -> Self {
        Self {
            version: SNAPSHOT_VERSION,
            saved_at: Utc::now(),
            dedup_tolerance_ms: store.tolerance().num_milliseconds(),
            block_height,
            items: store.items().cloned().collect(),
        }
    }

    /// Rebuild a store from this snapshot.
    #[must_use]
    pub fn restore(self) -> HistoryStore {
        let mut store = HistoryStore::with_tolerance(TimeDelta::milliseconds(self.dedup_tolerance_ms));
        for item in self.items {
            store.insert_item(item);
        }
        store
    }
}

/// Write `store` to `path`, creating parent directories.
///
/// # Errors
///
/// Returns an error if serialization or file I/O fails.
pub fn save(store: &HistoryStore, block_height: Option<u64>, path: &Path) -> Result<()> {
    if let Some(parent) = path.parent() {
        fs::create_dir_all(parent)
            .with_context(|| format!("create snapshot dir {}", parent.display()))?;
    }
    let snapshot = Snapshot::capture(store, block_height);
    let json = serde_json::to_string_pretty(&snapshot).context("serialize store snapshot")?;

    // Write beside the target and rename so a crash never leaves a torn file.
    let tmp = path.with_extension("json.tmp");
    fs::write(&tmp, json).with_context(|| format!("write snapshot {}", tmp.display()))?;
    fs::rename(&tmp, path)
        .with_context(|| format!("move snapshot into place at {}", path.display()))?;
    Ok(())
}

/// Read a snapshot from `path`.
///
/// # Errors
///
/// Returns an error if the file cannot be read or parsed, or if it was written
/// by a newer format version.
pub fn load(path: &Path) -> Result<Snapshot> {
    let content =
        fs::read_to_string(path).with_context(|| format!("read snapshot {}", path.display()))?;
    let snapshot: Snapshot = serde_json::from_str(&content)
        .with_context(|| format!("parse snapshot {}", path.display()))?;
    if snapshot.version > SNAPSHOT_VERSION {
        bail!(
            "snapshot {} has version {}, this build reads up to {SNAPSHOT_VERSION}",
            path.display(),
            snapshot.version
        );
    }
    Ok(snapshot)
}

/// Load a snapshot if `path` exists, else return an empty store.
///
/// # Errors
///
/// Returns an error if an existing file cannot be read or parsed.
pub fn load_or_default(path: &Path, tolerance: TimeDelta) -> Result<(HistoryStore, Option<u64>)> {
    if !path.exists() {
        return Ok((HistoryStore::with_tolerance(tolerance), None));
    }
    let snapshot = load(path)?;
    let height = snapshot.block_height;
    Ok((snapshot.restore(), height))
}
