//! `lot list`: list tracked items from the local store.

use std::io::{self, Write};
use std::path::Path;

use clap::Args;
use lotline_core::model::{Item, Role, Status};
use serde::Serialize;

use super::read_store;
use crate::output::{OutputMode, Renderable, render_list};

#[derive(Args, Debug)]
pub struct ListArgs {
    /// Filter by status, e.g. `in_transit`.
    #[arg(short, long)]
    pub status: Option<Status>,

    /// Filter by holder role, e.g. `retailer`.
    #[arg(short, long)]
    pub role: Option<Role>,

    /// Maximum items to show.
    #[arg(short = 'n', long, default_value = "50")]
    pub limit: usize,
}

/// One row of `lot list`.
#[derive(Debug, Serialize)]
pub struct ListRow {
    pub id: u64,
    pub name: String,
    pub status: Status,
    pub holder_role: Role,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub holder: Option<String>,
    pub entries: usize,
}

impl From<&Item> for ListRow {
    fn from(item: &Item) -> Self {
        Self {
            id: item.id.get(),
            name: item.name.clone(),
            status: item.status,
            holder_role: item.holder_role,
            holder: item.holder_address.as_ref().map(ToString::to_string),
            entries: item.history.len(),
        }
    }
}

impl Renderable for ListRow {
    fn render_human(&self, w: &mut dyn Write) -> io::Result<()> {
        writeln!(
            w,
            "#{:<5} {:<28} {:<11} {:<10} {}",
            self.id,
            self.name,
            self.status.as_str(),
            self.holder_role.as_str(),
            self.entries
        )
    }

    fn render_json(&self, w: &mut dyn Write) -> io::Result<()> {
        serde_json::to_writer(&mut *w, self).map_err(io::Error::other)?;
        writeln!(w)
    }

    fn render_table(&self, w: &mut dyn Write) -> io::Result<()> {
        writeln!(
            w,
            "{}  {}  {}  {}  {}",
            self.id, self.status, self.holder_role, self.entries, self.name
        )
    }

    fn table_headers() -> &'static [&'static str] {
        &["ID", "STATUS", "ROLE", "ENTRIES", "NAME"]
    }
}

fn matches(item: &Item, args: &ListArgs) -> bool {
    args.status.is_none_or(|s| item.status == s) && args.role.is_none_or(|r| item.holder_role == r)
}

pub fn run_list(args: &ListArgs, output: OutputMode, project_root: &Path) -> anyhow::Result<()> {
    let store = read_store(project_root, output)?;
    let rows: Vec<ListRow> = store
        .items()
        .filter(|item| matches(item, args))
        .take(args.limit)
        .map(ListRow::from)
        .collect();
    render_list(&rows, output)?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use clap::Parser;
    use lotline_core::model::ItemId;

    #[derive(Parser)]
    struct Wrapper {
        #[command(flatten)]
        args: ListArgs,
    }

    #[test]
    fn list_args_defaults() {
        let w = Wrapper::parse_from(["test"]);
        assert!(w.args.status.is_none());
        assert!(w.args.role.is_none());
        assert_eq!(w.args.limit, 50);
    }

    #[test]
    fn filters_parse_lexicon_names() {
        let w = Wrapper::parse_from(["test", "--status", "in_transit", "--role", "CARRIER"]);
        assert_eq!(w.args.status, Some(Status::InTransit));
        assert_eq!(w.args.role, Some(Role::Carrier));
        assert!(Wrapper::try_parse_from(["test", "--status", "lost"]).is_err());
    }

    #[test]
    fn filter_matches_status_and_role() {
        let item = Item::shell(ItemId::new_unchecked(3));
        let w = Wrapper::parse_from(["test", "--status", "created"]);
        assert!(matches(&item, &w.args));
        let w = Wrapper::parse_from(["test", "--role", "carrier"]);
        assert!(!matches(&item, &w.args));
    }

    #[test]
    fn table_row_columns_follow_headers() {
        let mut item = Item::shell(ItemId::new_unchecked(3));
        item.name = "Lot #3".into();
        let mut buf = Vec::new();
        ListRow::from(&item).render_table(&mut buf).unwrap();
        assert_eq!(String::from_utf8(buf).unwrap(), "3  CREATED  PRODUCER  0  Lot #3\n");
    }
}
