//! `lot resync`: refresh one item from the ledger.

use std::path::{Path, PathBuf};

use clap::Args;
use lotline_core::ErrorCode;
use lotline_core::model::ItemId;

use super::sync::{render_pretty, render_text};
use super::{open_engine, store_path};
use crate::output::{CliError, OutputMode, render_error, render_mode};

#[derive(Args, Debug)]
pub struct ResyncArgs {
    /// Item id, e.g. `7` or `#7`.
    pub id: ItemId,

    /// Ledger script (JSON) to read from.
    #[arg(long)]
    pub script: PathBuf,
}

pub async fn run_resync(
    args: &ResyncArgs,
    output: OutputMode,
    project_root: &Path,
) -> anyhow::Result<()> {
    let (engine, height) = open_engine(project_root, &args.script, output, false)?;
    let stats = engine.resync_one(args.id).await?;

    if !engine.exists(args.id) {
        render_error(
            output,
            &CliError::coded(
                ErrorCode::ItemNotFound,
                format!("item {} is not in the store", args.id),
            ),
        )?;
        anyhow::bail!("item {} not found", args.id);
    }

    // A targeted pass does not advance the store-wide high-water mark.
    engine.save_snapshot(&store_path(project_root), height)?;
    render_mode(output, &stats, render_text, render_pretty)
}
