//! Ledger event channels.
//!
//! Each kind names one event stream the ledger emits. The string form is the
//! ledger's own event name, which is also how subscriptions are keyed.

use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

/// The six ledger event kinds.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum EventKind {
    /// A new item was registered by its producer.
    Minted,
    /// An inspector attested the item.
    Inspected,
    /// Generic status transition with old and new codes.
    StatusUpdated,
    /// Custody-token movement.
    Transfer,
    /// Administrative recall.
    Recalled,
    /// Custody moved to the archive vault.
    Archived,
}

/// Error returned when parsing an unknown event kind string.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct UnknownEventKind {
    /// The unrecognised input string.
    pub raw: String,
}

impl fmt::Display for UnknownEventKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "unknown event kind '{}': expected one of BatchMinted, BatchInspected, \
             StatusUpdated, Transfer, BatchRecalled, BatchArchived",
            self.raw
        )
    }
}

impl std::error::Error for UnknownEventKind {}

impl EventKind {
    /// All channels the live listener subscribes to.
    pub const ALL: [Self; 6] = [
        Self::Minted,
        Self::Inspected,
        Self::StatusUpdated,
        Self::Transfer,
        Self::Recalled,
        Self::Archived,
    ];

    /// Kinds that carry history and are read back during replay. Archival is
    /// left out because its custody move is already a `Transfer`.
    pub const REPLAYED: [Self; 5] = [
        Self::Minted,
        Self::Inspected,
        Self::StatusUpdated,
        Self::Transfer,
        Self::Recalled,
    ];

    /// The ledger's event name.
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Minted => "BatchMinted",
            Self::Inspected => "BatchInspected",
            Self::StatusUpdated => "StatusUpdated",
            Self::Transfer => "Transfer",
            Self::Recalled => "BatchRecalled",
            Self::Archived => "BatchArchived",
        }
    }
}

impl fmt::Display for EventKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for EventKind {
    type Err = UnknownEventKind;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "BatchMinted" => Ok(Self::Minted),
            "BatchInspected" => Ok(Self::Inspected),
            "StatusUpdated" => Ok(Self::StatusUpdated),
            "Transfer" => Ok(Self::Transfer),
            "BatchRecalled" => Ok(Self::Recalled),
            "BatchArchived" => Ok(Self::Archived),
            _ => Err(UnknownEventKind { raw: s.to_string() }),
        }
    }
}

// Custom serde: serialize as the ledger event name.
impl Serialize for EventKind {
    fn serialize<S: serde::Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_str(self.as_str())
    }
}

impl<'de> Deserialize<'de> for EventKind {
    fn deserialize<D: serde::Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let s = String::deserialize(deserializer)?;
        Self::from_str(&s).map_err(serde::de::Error::custom)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn fromstr_all_kinds() {
        for kind in EventKind::ALL {
            let parsed: EventKind = kind.as_str().parse().expect("should parse");
            assert_eq!(parsed, kind);
        }
    }

    #[test]
    fn replayed_is_all_but_archived() {
        assert_eq!(EventKind::REPLAYED.len(), EventKind::ALL.len() - 1);
        assert!(!EventKind::REPLAYED.contains(&EventKind::Archived));
    }

    #[test]
    fn fromstr_rejects_unknown() {
        let err = "Approval".parse::<EventKind>().unwrap_err();
        assert_eq!(err.raw, "Approval");
        assert!(err.to_string().contains("expected one of"));
    }

    #[test]
    fn error_display_includes_valid_options() {
        let msg = UnknownEventKind { raw: "nope".into() }.to_string();
        for kind in EventKind::ALL {
            assert!(msg.contains(kind.as_str()), "missing {}", kind.as_str());
        }
    }

    #[test]
    fn serde_uses_ledger_names() {
        let json = serde_json::to_string(&EventKind::Recalled).unwrap();
        assert_eq!(json, "\"BatchRecalled\"");
        let back: EventKind = serde_json::from_str(&json).unwrap();
        assert_eq!(back, EventKind::Recalled);
        assert!(serde_json::from_str::<EventKind>("\"Recalled\"").is_err());
    }
}
