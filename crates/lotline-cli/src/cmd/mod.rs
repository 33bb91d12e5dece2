pub mod list;
pub mod resync;
pub mod show;
pub mod sync;

use std::path::{Path, PathBuf};
use std::sync::Arc;

use anyhow::Context;
use chrono::TimeDelta;
use lotline_core::config::resolve_config;
use lotline_core::ledger::LedgerScript;
use lotline_core::store::{HistoryStore, snapshot};
use lotline_core::{Engine, ErrorCode, resolver_from_config};

use crate::output::{CliError, OutputMode, render_error};

/// Store snapshot location under the project root.
pub const STORE_PATH: &str = ".lotline/store.json";

pub fn store_path(project_root: &Path) -> PathBuf {
    project_root.join(STORE_PATH)
}

/// An engine over the persisted store, reading from the ledger that `script`
/// builds. Returns the engine with the snapshot's block height.
///
/// With `fresh`, any existing snapshot is ignored.
pub fn open_engine(
    project_root: &Path,
    script: &Path,
    output: OutputMode,
    fresh: bool,
) -> anyhow::Result<(Engine, Option<u64>)> {
    let config = match resolve_config(project_root) {
        Ok(config) => config,
        Err(e) => {
            render_error(
                output,
                &CliError::coded(ErrorCode::ConfigParseError, format!("{e:#}")),
            )?;
            return Err(e);
        }
    };
    let script = LedgerScript::from_path(script)?;
    let ledger = Arc::new(script.build().context("replay ledger script")?);
    let resolver = match resolver_from_config(&config, project_root) {
        Ok(resolver) => resolver,
        Err(e) => {
            render_error(output, &CliError::coded(e.code(), e.to_string()))?;
            return Err(e.into());
        }
    };

    let tolerance = TimeDelta::milliseconds(config.project.sync.dedup_tolerance_ms);
    let (store, height) = if fresh {
        (HistoryStore::with_tolerance(tolerance), None)
    } else {
        snapshot::load_or_default(&store_path(project_root), tolerance)?
    };
    let engine = Engine::with_store(ledger, Arc::new(resolver), store, &config.project);
    Ok((engine, height))
}

/// Read the persisted store for read-only commands.
///
/// Renders a `NotInitialized` error when no snapshot exists yet.
pub fn read_store(project_root: &Path, output: OutputMode) -> anyhow::Result<HistoryStore> {
    let path = store_path(project_root);
    if !path.exists() {
        render_error(output, &CliError::from(ErrorCode::NotInitialized))?;
        anyhow::bail!("no store at {}", path.display());
    }
    match snapshot::load(&path) {
        Ok(snapshot) => Ok(snapshot.restore()),
        Err(e) => {
            render_error(
                output,
                &CliError::coded(ErrorCode::SnapshotCorrupt, format!("{e:#}")),
            )?;
            Err(e)
        }
    }
}
