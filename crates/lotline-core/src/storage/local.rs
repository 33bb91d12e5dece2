//! Local document store for `local://` pointers.
//!
//! Documents are JSON, stored one file per key under a directory. Keys are the
//! BLAKE3 hex digest of the serialized document. The whole store can be
//! exported to a single JSON object (`{ key: document }`) and imported on
//! another machine so that `local://` pointers resolve there too.

use std::collections::BTreeMap;
use std::fs;
use std::path::{Path, PathBuf};

use anyhow::{Context, Result, bail};
use serde_json::Value;
use tracing::{debug, warn};

const EXTENSION: &str = "json";

/// Directory-backed JSON document store.
#[derive(Debug, Clone)]
pub struct LocalDocuments {
    dir: PathBuf,
}

impl LocalDocuments {
    pub fn new(dir: impl Into<PathBuf>) -> Self {
        Self { dir: dir.into() }
    }

    #[must_use]
    pub fn dir(&self) -> &Path {
        &self.dir
    }

    /// Content key for `doc`.
    ///
    /// # Errors
    ///
    /// Returns an error if `doc` cannot be serialized.
    pub fn key_for(doc: &Value) -> Result<String> {
        let bytes = serde_json::to_vec(doc).context("serialize local document")?;
        Ok(blake3::hash(&bytes).to_hex().to_string())
    }

    fn path_for(&self, key: &str) -> PathBuf {
        self.dir.join(format!("{key}.{EXTENSION}"))
    }

    /// Store `doc` and return its `local://` pointer.
    ///
    /// # Errors
    ///
    /// Returns an error if the document cannot be serialized or written.
    pub fn put(&self, doc: &Value) -> Result<String> {
        let key = Self::key_for(doc)?;
        self.write(&key, doc)?;
        Ok(format!("local://{key}"))
    }

    fn write(&self, key: &str, doc: &Value) -> Result<()> {
        fs::create_dir_all(&self.dir)
            .with_context(|| format!("create local document dir {}", self.dir.display()))?;
        let path = self.path_for(key);
        let bytes = serde_json::to_vec(doc).context("serialize local document")?;
        fs::write(&path, bytes).with_context(|| format!("write {}", path.display()))?;
        debug!(key, "local document stored");
        Ok(())
    }

    /// Raw bytes stored under `key`, or `None` if absent.
    ///
    /// # Errors
    ///
    /// Returns an error for invalid keys or unreadable files.
    pub fn get(&self, key: &str) -> Result<Option<Vec<u8>>> {
        if !is_valid_key(key) {
            bail!("invalid local document key '{key}'");
        }
        let path = self.path_for(key);
        if !path.exists() {
            return Ok(None);
        }
        fs::read(&path)
            .map(Some)
            .with_context(|| format!("read {}", path.display()))
    }

    /// Every stored document keyed by its key. Unparseable files are skipped.
    ///
    /// # Errors
    ///
    /// Returns an error if the directory exists but cannot be listed.
    pub fn export(&self) -> Result<BTreeMap<String, Value>> {
        let mut docs = BTreeMap::new();
        if !self.dir.exists() {
            return Ok(docs);
        }
        let entries = fs::read_dir(&self.dir)
            .with_context(|| format!("list local documents in {}", self.dir.display()))?;
        for entry in entries {
            let path = entry.context("read local document entry")?.path();
            if path.extension().and_then(|e| e.to_str()) != Some(EXTENSION) {
                continue;
            }
            let Some(key) = path.file_stem().and_then(|s| s.to_str()) else {
                continue;
            };
            let parsed = fs::read(&path)
                .map_err(anyhow::Error::from)
                .and_then(|bytes| serde_json::from_slice::<Value>(&bytes).map_err(Into::into));
            match parsed {
                Ok(doc) => {
                    docs.insert(key.to_string(), doc);
                }
                Err(e) => warn!(path = %path.display(), error = %e, "skipping unreadable local document"),
            }
        }
        Ok(docs)
    }

    /// Write [`Self::export`] to `path` as pretty JSON. Returns the count.
    ///
    /// # Errors
    ///
    /// Returns an error if listing or writing fails.
    pub fn export_to(&self, path: &Path) -> Result<usize> {
        let docs = self.export()?;
        let json = serde_json::to_string_pretty(&docs).context("serialize export")?;
        fs::write(path, json).with_context(|| format!("write export {}", path.display()))?;
        Ok(docs.len())
    }

    /// Store every document from an export under its original key. Entries
    /// with unusable keys are skipped. Returns how many were stored.
    ///
    /// # Errors
    ///
    /// Returns an error if a document cannot be written.
    pub fn import(&self, docs: &BTreeMap<String, Value>) -> Result<usize> {
        let mut count = 0;
        for (key, doc) in docs {
            if !is_valid_key(key) {
                warn!(key, "skipping import entry with invalid key");
                continue;
            }
            self.write(key, doc)?;
            count += 1;
        }
        Ok(count)
    }

    /// Read an export file and [`Self::import`] it.
    ///
    /// # Errors
    ///
    /// Returns an error if the file is unreadable or not a JSON object.
    pub fn import_from(&self, path: &Path) -> Result<usize> {
        let content =
            fs::read_to_string(path).with_context(|| format!("read import {}", path.display()))?;
        let docs: BTreeMap<String, Value> = serde_json::from_str(&content)
            .with_context(|| format!("parse import {}", path.display()))?;
        self.import(&docs)
    }
}

/// Keys become file names; only allow a conservative character set.
fn is_valid_key(key: &str) -> bool {
    !key.is_empty()
        && key.len() <= 128
        && key
            .chars()
            .all(|c| c.is_ascii_alphanumeric() || c == '-' || c == '_')
}
