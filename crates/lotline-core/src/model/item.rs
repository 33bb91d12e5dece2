use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

use super::entry::HistoryEntry;
use super::ids::{Address, ItemId};
use super::status::{Role, Status};

/// Resolved off-ledger metadata document for an item.
///
/// Only the fields the engine reads are typed; everything else is kept in
/// `extra` so a round-trip through a snapshot loses nothing.
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct Metadata {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub location: Option<String>,
    #[serde(rename = "productType", alias = "product_type", skip_serializing_if = "Option::is_none")]
    pub product_type: Option<String>,
    /// Content pointer to an image attachment.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub image: Option<String>,
    /// Content pointer to an inspection certificate.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub certificate: Option<String>,
    #[serde(flatten)]
    pub extra: BTreeMap<String, serde_json::Value>,
}

/// One tracked physical batch/lot: projected state plus its history.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Item {
    pub id: ItemId,
    pub name: String,
    #[serde(default)]
    pub description: String,
    #[serde(default)]
    pub location: String,
    pub status: Status,
    pub holder_role: Role,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub holder_address: Option<Address>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub metadata_ref: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub metadata: Option<Metadata>,
    /// Append-only, in storage order. Use [`Item::timeline`] for display.
    #[serde(default)]
    pub history: Vec<HistoryEntry>,
}

impl Item {
    /// A fresh shell: empty history, `CREATED` held by the producer.
    #[must_use]
    pub fn shell(id: ItemId) -> Self {
        Self {
            id,
            name: String::new(),
            description: String::new(),
            location: String::new(),
            status: Status::Created,
            holder_role: Role::Producer,
            holder_address: None,
            metadata_ref: None,
            metadata: None,
            history: Vec::new(),
        }
    }

    /// History sorted newest-first. Ties keep storage order.
    #[must_use]
    pub fn timeline(&self) -> Vec<&HistoryEntry> {
        let mut entries: Vec<&HistoryEntry> = self.history.iter().collect();
        entries.sort_by(|a, b| b.timestamp.cmp(&a.timestamp));
        entries
    }

    /// Case-insensitive custody check against a user identity.
    #[must_use]
    pub fn is_held_by(&self, who: &Address) -> bool {
        self.holder_address.as_ref() == Some(who)
    }
}

/// Fields merged into an item's projected state by `upsert_shell`.
///
/// `None` means "leave as is"; history is never part of a shell update.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct ShellFields {
    pub name: Option<String>,
    pub description: Option<String>,
    pub location: Option<String>,
    pub status: Option<Status>,
    pub holder_role: Option<Role>,
    pub holder_address: Option<Address>,
    pub metadata_ref: Option<String>,
    pub metadata: Option<Metadata>,
}

impl ShellFields {
    /// Apply the non-`None` fields to `item`. Empty strings count as absent.
    pub(crate) fn merge_into(self, item: &mut Item) {
        fn non_empty(value: Option<String>) -> Option<String> {
            value.filter(|v| !v.is_empty())
        }

        if let Some(name) = non_empty(self.name) {
            item.name = name;
        }
        if let Some(description) = non_empty(self.description) {
            item.description = description;
        }
        if let Some(location) = non_empty(self.location) {
            item.location = location;
        }
        if let Some(status) = self.status {
            item.status = status;
        }
        if let Some(role) = self.holder_role {
            item.holder_role = role;
        }
        if let Some(holder) = self.holder_address {
            item.holder_address = Some(holder);
        }
        if let Some(pointer) = non_empty(self.metadata_ref) {
            item.metadata_ref = Some(pointer);
        }
        if let Some(metadata) = self.metadata {
            item.metadata = Some(metadata);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::entry::EntryKind;
    use chrono::{TimeZone, Utc};

    #[test]
    fn shell_defaults_are_stable() {
        let item = Item::shell(ItemId::new_unchecked(4));
        assert_eq!(item.status, Status::Created);
        assert_eq!(item.holder_role, Role::Producer);
        assert!(item.history.is_empty());
        assert!(item.metadata.is_none());
    }

    #[test]
    fn merge_skips_absent_and_empty_fields() {
        let mut item = Item::shell(ItemId::new_unchecked(1));
        item.name = "Mangoes".into();
        item.location = "Dong Thap".into();

        ShellFields {
            name: Some(String::new()),
            location: None,
            status: Some(Status::InTransit),
            holder_address: Some(Address::new("0xCAFE")),
            ..ShellFields::default()
        }
        .merge_into(&mut item);

        assert_eq!(item.name, "Mangoes");
        assert_eq!(item.location, "Dong Thap");
        assert_eq!(item.status, Status::InTransit);
        assert_eq!(item.holder_address, Some(Address::new("0xcafe")));
    }

    #[test]
    fn timeline_is_newest_first_without_reordering_storage() {
        let mut item = Item::shell(ItemId::new_unchecked(1));
        let early = Utc.with_ymd_and_hms(2024, 1, 1, 0, 0, 0).unwrap();
        let late = Utc.with_ymd_and_hms(2024, 1, 2, 0, 0, 0).unwrap();
        item.history
            .push(HistoryEntry::new(EntryKind::Transferred, Address::new("0xb"), late));
        item.history
            .push(HistoryEntry::new(EntryKind::Registered, Address::new("0xa"), early));

        let timeline = item.timeline();
        assert_eq!(timeline[0].timestamp, late);
        assert_eq!(timeline[1].timestamp, early);
        assert_eq!(item.history[0].timestamp, late);
    }

    #[test]
    fn metadata_keeps_unknown_fields() {
        let json = r#"{"name":"Rice","productType":"grain","harvestDate":"2024-05-01"}"#;
        let meta: Metadata = serde_json::from_str(json).unwrap();
        assert_eq!(meta.name.as_deref(), Some("Rice"));
        assert_eq!(meta.product_type.as_deref(), Some("grain"));
        assert_eq!(
            meta.extra.get("harvestDate"),
            Some(&serde_json::json!("2024-05-01"))
        );
    }
}
