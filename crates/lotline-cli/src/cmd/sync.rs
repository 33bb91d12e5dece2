//! `lot sync`: replay a ledger into the local store.

use std::io::Write;
use std::path::{Path, PathBuf};

use clap::Args;
use lotline_core::sync::ReplayStats;
use tracing::info;

use super::{open_engine, store_path};
use crate::output::{OutputMode, pretty_kv, pretty_section, render_mode};

#[derive(Args, Debug)]
pub struct SyncArgs {
    /// Ledger script (JSON) to replay.
    #[arg(long)]
    pub script: PathBuf,

    /// Ignore the existing snapshot and rebuild from scratch.
    #[arg(long)]
    pub fresh: bool,
}

pub async fn run_sync(
    args: &SyncArgs,
    output: OutputMode,
    project_root: &Path,
) -> anyhow::Result<()> {
    let (engine, _) = open_engine(project_root, &args.script, output, args.fresh)?;
    let stats = engine.load_all().await?;
    engine.save_snapshot(&store_path(project_root), Some(stats.to_block))?;
    info!(
        items = stats.items_loaded,
        appended = stats.appended,
        to_block = stats.to_block,
        "store saved"
    );

    render_mode(output, &stats, render_text, render_pretty)
}

pub(super) fn render_text(stats: &ReplayStats, w: &mut dyn Write) -> std::io::Result<()> {
    writeln!(
        w,
        "items={} appended={} duplicates={} blocks={}..{}",
        stats.items_loaded, stats.appended, stats.duplicates, stats.from_block, stats.to_block
    )
}

pub(super) fn render_pretty(stats: &ReplayStats, w: &mut dyn Write) -> std::io::Result<()> {
    pretty_section(w, "Sync")?;
    pretty_kv(w, "Items", stats.items_loaded.to_string())?;
    pretty_kv(w, "Blocks", format!("{}..{}", stats.from_block, stats.to_block))?;
    pretty_kv(
        w,
        "Events",
        format!(
            "{} seen, {} new, {} duplicate",
            stats.events_seen, stats.appended, stats.duplicates
        ),
    )?;

    let skipped = [
        ("missing", stats.items_missing),
        ("unknown status", stats.unknown_status),
        ("read errors", stats.item_errors),
        ("metadata errors", stats.metadata_errors),
        ("unresolved time", stats.normalize_errors),
        ("orphaned", stats.orphaned),
    ];
    for (label, count) in skipped {
        if count > 0 {
            pretty_kv(w, "Skipped", format!("{count} {label}"))?;
        }
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    fn stats() -> ReplayStats {
        ReplayStats {
            items_loaded: 2,
            events_seen: 9,
            appended: 7,
            duplicates: 2,
            metadata_errors: 1,
            from_block: 0,
            to_block: 12,
            ..ReplayStats::default()
        }
    }

    #[test]
    fn text_is_one_line() {
        let mut buf = Vec::new();
        render_text(&stats(), &mut buf).unwrap();
        assert_eq!(
            String::from_utf8(buf).unwrap(),
            "items=2 appended=7 duplicates=2 blocks=0..12\n"
        );
    }

    #[test]
    fn pretty_lists_only_nonzero_skips() {
        let mut buf = Vec::new();
        render_pretty(&stats(), &mut buf).unwrap();
        let text = String::from_utf8(buf).unwrap();
        assert!(text.contains("1 metadata errors"));
        assert!(!text.contains("orphaned"));
    }
}
