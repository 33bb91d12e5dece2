//! Domain model: lexicon, identities, items, and history entries.

pub mod entry;
pub mod ids;
pub mod item;
pub mod status;

pub use entry::{EntryKind, HistoryEntry};
pub use ids::{Address, InvalidItemId, ItemId};
pub use item::{Item, Metadata, ShellFields};
pub use status::{ParseEnumError, Role, Status, UnknownStatusCode, role_for_status, status_name};
