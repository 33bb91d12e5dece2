#![forbid(unsafe_code)]

mod cmd;
mod output;

use clap::{Parser, Subcommand};
use output::OutputMode;
use std::env;
use tracing::debug;
use tracing_subscriber::{EnvFilter, fmt, prelude::*};

#[derive(Parser, Debug)]
#[command(
    author,
    version,
    about = "lotline: ledger-backed supply chain tracker",
    long_about = None
)]
struct Cli {
    /// Enable verbose logging.
    #[arg(short, long)]
    verbose: bool,

    /// Emit JSON output instead of human-readable text.
    #[arg(long, global = true)]
    json: bool,

    /// Output format (overrides `FORMAT`).
    #[arg(long, global = true, value_enum)]
    format: Option<OutputMode>,

    #[command(subcommand)]
    command: Commands,
}

impl Cli {
    /// Derive the output mode from flags.
    fn output_mode(&self) -> OutputMode {
        output::resolve_output_mode(self.format, self.json)
    }
}

#[derive(Subcommand, Debug)]
enum Commands {
    #[command(
        next_help_heading = "Sync",
        about = "Replay the ledger into the local store",
        long_about = "Load every item and replay the recent event window into .lotline/store.json. Safe to repeat: already recorded events are not duplicated.",
        after_help = "EXAMPLES:\n    # Replay a scripted ledger\n    lot sync --script ledger.json\n\n    # Rebuild the store from scratch\n    lot sync --script ledger.json --fresh"
    )]
    Sync(cmd::sync::SyncArgs),

    #[command(
        next_help_heading = "Sync",
        about = "Refresh one item from the ledger",
        long_about = "Re-read one item's state and replay the short resync window for that item only.",
        after_help = "EXAMPLES:\n    # Refresh item 7\n    lot resync 7 --script ledger.json"
    )]
    Resync(cmd::resync::ResyncArgs),

    #[command(
        next_help_heading = "Read",
        about = "List tracked items",
        long_about = "List items in the local store with optional status and role filters.",
        after_help = "EXAMPLES:\n    # Everything in transit\n    lot list --status in_transit\n\n    # Emit machine-readable output\n    lot list --json"
    )]
    List(cmd::list::ListArgs),

    #[command(
        next_help_heading = "Read",
        about = "Show one item and its timeline",
        long_about = "Show an item's projected state and its history, newest first.",
        after_help = "EXAMPLES:\n    # Show item 7\n    lot show 7\n\n    # Emit machine-readable output\n    lot show 7 --json"
    )]
    Show(cmd::show::ShowArgs),
}

fn init_tracing(verbose: bool) {
    let filter = EnvFilter::try_from_env("LOTLINE_LOG").unwrap_or_else(|_| {
        EnvFilter::new(if verbose || env::var("DEBUG").is_ok() {
            "lotline=debug,info"
        } else {
            "lotline=info,warn"
        })
    });

    let format = env::var("LOTLINE_LOG_FORMAT").unwrap_or_else(|_| "compact".to_string());

    let registry = tracing_subscriber::registry().with(filter);

    match format.as_str() {
        "json" => {
            registry
                .with(fmt::layer().json().with_ansi(false).with_writer(std::io::stderr))
                .init();
        }
        _ => {
            registry
                .with(fmt::layer().compact().with_writer(std::io::stderr))
                .init();
        }
    }
}

#[tokio::main(flavor = "current_thread")]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();
    init_tracing(cli.verbose);

    let project_root = std::env::current_dir()?;
    let output = cli.output_mode();
    debug!(root = %project_root.display(), ?output, "starting");

    match cli.command {
        Commands::Sync(ref args) => cmd::sync::run_sync(args, output, &project_root).await,
        Commands::Resync(ref args) => cmd::resync::run_resync(args, output, &project_root).await,
        Commands::List(ref args) => cmd::list::run_list(args, output, &project_root),
        Commands::Show(ref args) => cmd::show::run_show(args, output, &project_root),
    }
}
