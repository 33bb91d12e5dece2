//! `lot show`: display one item with its timeline, newest first.

use std::io::Write;
use std::path::Path;

use chrono::{DateTime, Local, Utc};
use clap::Args;
use lotline_core::ErrorCode;
use lotline_core::model::{HistoryEntry, Item, ItemId, Role, Status};
use serde::Serialize;

use super::read_store;
use crate::output::{
    CliError, OutputMode, pretty_kv, pretty_rule, pretty_section, render_error, render_mode,
};

#[derive(Args, Debug)]
pub struct ShowArgs {
    /// Item id, e.g. `7` or `#7`.
    pub id: ItemId,
}

/// Full item detail as returned in JSON output.
#[derive(Debug, Serialize)]
pub struct ShowItem<'a> {
    pub id: u64,
    pub name: &'a str,
    #[serde(skip_serializing_if = "str::is_empty")]
    pub description: &'a str,
    #[serde(skip_serializing_if = "str::is_empty")]
    pub location: &'a str,
    pub status: Status,
    pub holder_role: Role,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub holder: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub metadata_ref: Option<&'a str>,
    /// Newest first.
    pub timeline: Vec<&'a HistoryEntry>,
}

impl<'a> From<&'a Item> for ShowItem<'a> {
    fn from(item: &'a Item) -> Self {
        Self {
            id: item.id.get(),
            name: &item.name,
            description: &item.description,
            location: &item.location,
            status: item.status,
            holder_role: item.holder_role,
            holder: item.holder_address.as_ref().map(ToString::to_string),
            metadata_ref: item.metadata_ref.as_deref(),
            timeline: item.timeline(),
        }
    }
}

fn local_time(ts: DateTime<Utc>) -> String {
    ts.with_timezone(&Local).format("%Y-%m-%d %H:%M:%S").to_string()
}

fn transition(entry: &HistoryEntry) -> String {
    match (entry.status_from, entry.status_to) {
        (Some(from), Some(to)) => format!("{from} -> {to}"),
        (None, Some(to)) => format!("-> {to}"),
        _ => String::new(),
    }
}

fn render_text(item: &ShowItem<'_>, w: &mut dyn Write) -> std::io::Result<()> {
    writeln!(
        w,
        "{}  {}  {}  {}",
        item.id, item.status, item.holder_role, item.name
    )?;
    for entry in &item.timeline {
        writeln!(w, "{entry}")?;
    }
    Ok(())
}

fn render_pretty(item: &ShowItem<'_>, w: &mut dyn Write) -> std::io::Result<()> {
    pretty_section(w, &format!("#{} {}", item.id, item.name))?;
    pretty_kv(w, "Status", item.status.as_str())?;
    pretty_kv(w, "Role", item.holder_role.as_str())?;
    if let Some(holder) = &item.holder {
        pretty_kv(w, "Holder", holder)?;
    }
    if !item.location.is_empty() {
        pretty_kv(w, "Location", item.location)?;
    }
    if let Some(pointer) = item.metadata_ref {
        pretty_kv(w, "Metadata", pointer)?;
    }
    if !item.description.is_empty() {
        writeln!(w)?;
        writeln!(w, "{}", item.description)?;
    }

    writeln!(w)?;
    pretty_section(w, &format!("Timeline ({})", item.timeline.len()))?;
    for entry in &item.timeline {
        writeln!(
            w,
            "{}  {:<14} {:<12} {}",
            local_time(entry.timestamp),
            entry.kind.as_str(),
            entry.actor.short(),
            transition(entry)
        )?;
        if !entry.note.is_empty() {
            writeln!(w, "{:>21}{}", "", entry.note)?;
        }
        if let Some(reason) = &entry.reason {
            writeln!(w, "{:>21}reason: {reason}", "")?;
        }
    }
    pretty_rule(w)
}

/// Execute `lot show <id>`.
///
/// # Errors
///
/// Returns an error if the store is missing, the item is unknown, or output
/// rendering fails.
pub fn run_show(args: &ShowArgs, output: OutputMode, project_root: &Path) -> anyhow::Result<()> {
    let store = read_store(project_root, output)?;
    let Some(item) = store.get(args.id) else {
        render_error(
            output,
            &CliError::coded(
                ErrorCode::ItemNotFound,
                format!("item {} is not in the store", args.id),
            ),
        )?;
        anyhow::bail!("item {} not found", args.id);
    };

    render_mode(output, &ShowItem::from(item), render_text, render_pretty)
}
