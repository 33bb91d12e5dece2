//! Status/role lexicon.
//!
//! Pure lookup tables between the ledger's numeric status codes, the closed
//! set of lifecycle statuses, and the custody role that holds an item in each
//! status. Nothing here has behaviour beyond mapping.
//!
//! | code | status       | holder role |
//! |------|--------------|-------------|
//! | 0    | `NOT_EXIST`  | `UNKNOWN`   |
//! | 1    | `CREATED`    | `PRODUCER`  |
//! | 2    | `INSPECTING` | `PRODUCER`  |
//! | 3    | `IN_TRANSIT` | `CARRIER`   |
//! | 4    | `DELIVERED`  | `RETAILER`  |
//! | 5    | `RETAILED`   | `RETAILER`  |
//! | 6    | `CONSUMED`   | `CONSUMER`  |
//! | 7    | `RECALLED`   | `PRODUCER`  |

use serde::{Deserialize, Serialize};
use std::{fmt, str::FromStr};

use crate::error::ErrorCode;

/// The eight lifecycle statuses. This set is closed: an item's status is
/// always one of these values.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum Status {
    NotExist,
    /// Registered by the producer (the ledger calls this "harvested").
    Created,
    Inspecting,
    InTransit,
    Delivered,
    Retailed,
    Consumed,
    Recalled,
}

impl Status {
    /// All statuses in ledger code order.
    pub const ALL: [Self; 8] = [
        Self::NotExist,
        Self::Created,
        Self::Inspecting,
        Self::InTransit,
        Self::Delivered,
        Self::Retailed,
        Self::Consumed,
        Self::Recalled,
    ];

    /// Canonical upper-case name.
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::NotExist => "NOT_EXIST",
            Self::Created => "CREATED",
            Self::Inspecting => "INSPECTING",
            Self::InTransit => "IN_TRANSIT",
            Self::Delivered => "DELIVERED",
            Self::Retailed => "RETAILED",
            Self::Consumed => "CONSUMED",
            Self::Recalled => "RECALLED",
        }
    }

    /// The ledger's numeric code for this status.
    #[must_use]
    pub const fn code(self) -> u8 {
        match self {
            Self::NotExist => 0,
            Self::Created => 1,
            Self::Inspecting => 2,
            Self::InTransit => 3,
            Self::Delivered => 4,
            Self::Retailed => 5,
            Self::Consumed => 6,
            Self::Recalled => 7,
        }
    }

    /// Strict lookup of a ledger status code.
    ///
    /// # Errors
    ///
    /// Returns [`UnknownStatusCode`] for codes outside `0..=7`.
    pub const fn from_code(code: u8) -> Result<Self, UnknownStatusCode> {
        match code {
            0 => Ok(Self::NotExist),
            1 => Ok(Self::Created),
            2 => Ok(Self::Inspecting),
            3 => Ok(Self::InTransit),
            4 => Ok(Self::Delivered),
            5 => Ok(Self::Retailed),
            6 => Ok(Self::Consumed),
            7 => Ok(Self::Recalled),
            _ => Err(UnknownStatusCode { code }),
        }
    }

    /// The role that holds an item while it is in this status.
    #[must_use]
    pub const fn holder_role(self) -> Role {
        match self {
            Self::Created | Self::Inspecting | Self::Recalled => Role::Producer,
            Self::InTransit => Role::Carrier,
            Self::Delivered | Self::Retailed => Role::Retailer,
            Self::Consumed => Role::Consumer,
            Self::NotExist => Role::Unknown,
        }
    }
}

/// Custody roles. `Quarantine` and `Archive` are never derived from a status;
/// they are set explicitly by custody transfers to a terminal vault.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum Role {
    Producer,
    Inspector,
    Carrier,
    Retailer,
    Consumer,
    Quarantine,
    Archive,
    Unknown,
}

impl Role {
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Producer => "PRODUCER",
            Self::Inspector => "INSPECTOR",
            Self::Carrier => "CARRIER",
            Self::Retailer => "RETAILER",
            Self::Consumer => "CONSUMER",
            Self::Quarantine => "QUARANTINE",
            Self::Archive => "ARCHIVE",
            Self::Unknown => "UNKNOWN",
        }
    }

    /// True for the terminal custody roles that override status derivation.
    #[must_use]
    pub const fn is_custody_override(self) -> bool {
        matches!(self, Self::Quarantine | Self::Archive)
    }
}

/// Map a ledger status code to a status name, falling back to `NOT_EXIST`.
///
/// The fallback hides ledger states added after this client was built, so it
/// is logged. Callers that need to tell the difference use
/// [`Status::from_code`].
#[must_use]
pub fn status_name(code: u8) -> Status {
    Status::from_code(code).unwrap_or_else(|e| {
        tracing::warn!(code = e.code, "unmapped ledger status code, treating as NOT_EXIST");
        Status::NotExist
    })
}

/// Total mapping from a ledger status code to the holder role.
/// Unknown codes map to [`Role::Unknown`].
#[must_use]
pub const fn role_for_status(code: u8) -> Role {
    match Status::from_code(code) {
        Ok(status) => status.holder_role(),
        Err(_) => Role::Unknown,
    }
}

/// Error returned for a ledger status code outside the lexicon.
#[derive(Debug, Clone, Copy, PartialEq, Eq, thiserror::Error)]
#[error("unknown ledger status code {code}")]
pub struct UnknownStatusCode {
    pub code: u8,
}

impl UnknownStatusCode {
    #[must_use]
    pub const fn error_code(self) -> ErrorCode {
        ErrorCode::UnknownStatusCode
    }
}

/// Error returned when parsing a status or role name.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ParseEnumError {
    pub expected: &'static str,
    pub got: String,
}

impl fmt::Display for ParseEnumError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "invalid {}: '{}'", self.expected, self.got)
    }
}

impl std::error::Error for ParseEnumError {}

impl fmt::Display for Status {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl fmt::Display for Role {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

fn normalize(input: &str) -> String {
    input.trim().to_ascii_uppercase()
}

impl FromStr for Status {
    type Err = ParseEnumError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match normalize(s).as_str() {
            "NOT_EXIST" => Ok(Self::NotExist),
            // The ledger contract names the initial state HARVESTED.
            "CREATED" | "HARVESTED" => Ok(Self::Created),
            "INSPECTING" => Ok(Self::Inspecting),
            "IN_TRANSIT" => Ok(Self::InTransit),
            "DELIVERED" => Ok(Self::Delivered),
            "RETAILED" => Ok(Self::Retailed),
            "CONSUMED" => Ok(Self::Consumed),
            "RECALLED" => Ok(Self::Recalled),
            _ => Err(ParseEnumError {
                expected: "status",
                got: s.to_string(),
            }),
        }
    }
}

impl FromStr for Role {
    type Err = ParseEnumError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match normalize(s).as_str() {
            "PRODUCER" | "FARMER" => Ok(Self::Producer),
            "INSPECTOR" => Ok(Self::Inspector),
            "CARRIER" | "LOGISTICS" => Ok(Self::Carrier),
            "RETAILER" => Ok(Self::Retailer),
            "CONSUMER" => Ok(Self::Consumer),
            "QUARANTINE" => Ok(Self::Quarantine),
            "ARCHIVE" => Ok(Self::Archive),
            "UNKNOWN" => Ok(Self::Unknown),
            _ => Err(ParseEnumError {
                expected: "role",
                got: s.to_string(),
            }),
        }
    }
}
