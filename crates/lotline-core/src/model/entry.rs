//! History entries: the immutable, timestamped records on an item's timeline.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

use super::ids::Address;
use super::status::{ParseEnumError, Status};

/// What happened to the item.
///
/// `RegisteredOnchain` is a legacy spelling of `Registered` that older
/// snapshots still carry. It is kept distinct so those snapshots round-trip,
/// but it is equivalent to `Registered` for deduplication.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum EntryKind {
    Registered,
    RegisteredOnchain,
    #[serde(alias = "ATTEST")]
    Attested,
    #[serde(alias = "TRANSFER")]
    Transferred,
    #[serde(alias = "STATUS_UPDATED")]
    StatusChanged,
    #[serde(alias = "RECALL")]
    Recalled,
}

impl EntryKind {
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Registered => "REGISTERED",
            Self::RegisteredOnchain => "REGISTERED_ONCHAIN",
            Self::Attested => "ATTESTED",
            Self::Transferred => "TRANSFERRED",
            Self::StatusChanged => "STATUS_CHANGED",
            Self::Recalled => "RECALLED",
        }
    }

    /// Collapse legacy aliases onto their canonical kind.
    #[must_use]
    pub const fn canonical(self) -> Self {
        match self {
            Self::RegisteredOnchain => Self::Registered,
            other => other,
        }
    }

    /// Kinds whose `status_from`/`status_to` take part in equivalence.
    #[must_use]
    pub const fn carries_transition(self) -> bool {
        matches!(
            self.canonical(),
            Self::StatusChanged | Self::Transferred | Self::Attested
        )
    }
}

impl fmt::Display for EntryKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for EntryKind {
    type Err = ParseEnumError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_uppercase().as_str() {
            "REGISTERED" => Ok(Self::Registered),
            "REGISTERED_ONCHAIN" => Ok(Self::RegisteredOnchain),
            "ATTESTED" | "ATTEST" => Ok(Self::Attested),
            "TRANSFERRED" | "TRANSFER" => Ok(Self::Transferred),
            "STATUS_CHANGED" | "STATUS_UPDATED" => Ok(Self::StatusChanged),
            "RECALLED" | "RECALL" => Ok(Self::Recalled),
            _ => Err(ParseEnumError {
                expected: "entry kind",
                got: s.to_string(),
            }),
        }
    }
}

/// One immutable record on an item's timeline.
///
/// When the entry comes from a ledger event, `timestamp` is the block time,
/// never the local clock, so replays produce identical entries.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct HistoryEntry {
    pub kind: EntryKind,
    pub actor: Address,
    pub timestamp: DateTime<Utc>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub status_from: Option<Status>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub status_to: Option<Status>,
    #[serde(default)]
    pub note: String,
    /// Reason reference carried by recalls.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub reason: Option<String>,
}

impl HistoryEntry {
    pub fn new(kind: EntryKind, actor: Address, timestamp: DateTime<Utc>) -> Self {
        Self {
            kind,
            actor,
            timestamp,
            status_from: None,
            status_to: None,
            note: String::new(),
            reason: None,
        }
    }

    #[must_use]
    pub const fn with_transition(mut self, from: Option<Status>, to: Option<Status>) -> Self {
        self.status_from = from;
        self.status_to = to;
        self
    }

    #[must_use]
    pub fn with_note(mut self, note: impl Into<String>) -> Self {
        self.note = note.into();
        self
    }

    #[must_use]
    pub fn with_reason(mut self, reason: impl Into<String>) -> Self {
        self.reason = Some(reason.into());
        self
    }
}

impl fmt::Display for HistoryEntry {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}\t{}\t{}", self.timestamp.to_rfc3339(), self.kind, self.actor)?;
        match (self.status_from, self.status_to) {
            (Some(from), Some(to)) => write!(f, "\t{from} -> {to}")?,
            (None, Some(to)) => write!(f, "\t-> {to}")?,
            _ => {}
        }
        if !self.note.is_empty() {
            write!(f, "\t{}", self.note)?;
        }
        Ok(())
    }
}
