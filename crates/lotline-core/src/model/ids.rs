//! Identity newtypes: ledger-assigned item ids and custody addresses.

use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

/// Stable, ledger-assigned item identifier. Ids start at 1 and are
/// contiguous; zero is never a valid id.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct ItemId(u64);

impl ItemId {
    /// Construct an id, rejecting zero.
    #[must_use]
    pub const fn new(raw: u64) -> Option<Self> {
        if raw == 0 { None } else { Some(Self(raw)) }
    }

    /// Construct an id without validation. Intended for tests and for values
    /// already read back from the ledger.
    #[must_use]
    pub const fn new_unchecked(raw: u64) -> Self {
        Self(raw)
    }

    #[must_use]
    pub const fn get(self) -> u64 {
        self.0
    }
}

impl fmt::Display for ItemId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Error returned when parsing an [`ItemId`] from text.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("invalid item id '{raw}': expected a positive integer")]
pub struct InvalidItemId {
    pub raw: String,
}

impl FromStr for ItemId {
    type Err = InvalidItemId;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let trimmed = s.trim().trim_start_matches('#');
        trimmed
            .parse::<u64>()
            .ok()
            .and_then(Self::new)
            .ok_or_else(|| InvalidItemId { raw: s.to_string() })
    }
}

/// A custodian identity, always stored lowercase so that comparisons with
/// user identities are case-insensitive by construction.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize)]
#[serde(transparent)]
pub struct Address(String);

impl Address {
    /// The void origin of issuance transfers.
    pub const ZERO: &'static str = "0x0000000000000000000000000000000000000000";
    /// Default terminal vault for recalled items.
    pub const QUARANTINE_VAULT: &'static str = "0x000000000000000000000000000000000000dead";
    /// Default terminal vault for consumed items.
    pub const ARCHIVE_VAULT: &'static str = "0x000000000000000000000000000000000000aaaa";

    pub fn new(raw: impl AsRef<str>) -> Self {
        Self(raw.as_ref().trim().to_ascii_lowercase())
    }

    #[must_use]
    pub fn zero() -> Self {
        Self(Self::ZERO.to_string())
    }

    #[must_use]
    pub fn is_zero(&self) -> bool {
        self.0 == Self::ZERO
    }

    #[must_use]
    pub fn as_str(&self) -> &str {
        &self.0
    }

    /// Shortened form used in history notes (`0x1234abcd…`).
    #[must_use]
    pub fn short(&self) -> &str {
        self.0.get(..10).unwrap_or(&self.0)
    }
}

impl<'de> Deserialize<'de> for Address {
    fn deserialize<D: serde::Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let s = String::deserialize(deserializer)?;
        Ok(Self::new(s))
    }
}

impl fmt::Display for Address {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl From<&str> for Address {
    fn from(value: &str) -> Self {
        Self::new(value)
    }
}

impl PartialEq<str> for Address {
    fn eq(&self, other: &str) -> bool {
        self.0.eq_ignore_ascii_case(other.trim())
    }
}
