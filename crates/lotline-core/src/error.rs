use std::fmt;

/// Machine-readable error codes surfaced to operators and scripts.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ErrorCode {
    NotInitialized,
    ConfigParseError,
    ItemNotFound,
    InvalidStatus,
    PreconditionFailed,
    UnknownStatusCode,
    InvalidPointer,
    LedgerUnreachable,
    EventQueryFailed,
    BlockTimeUnavailable,
    WriteRejected,
    InsufficientFunds,
    WriteReverted,
    DocumentUnavailable,
    SnapshotCorrupt,
}

impl ErrorCode {
    pub const ALL: [Self; 15] = [
        Self::NotInitialized,
        Self::ConfigParseError,
        Self::ItemNotFound,
        Self::InvalidStatus,
        Self::PreconditionFailed,
        Self::UnknownStatusCode,
        Self::InvalidPointer,
        Self::LedgerUnreachable,
        Self::EventQueryFailed,
        Self::BlockTimeUnavailable,
        Self::WriteRejected,
        Self::InsufficientFunds,
        Self::WriteReverted,
        Self::DocumentUnavailable,
        Self::SnapshotCorrupt,
    ];

    /// Stable code identifier (`E####`) for machine parsing.
    #[must_use]
    pub const fn code(self) -> &'static str {
        match self {
            Self::NotInitialized => "E1001",
            Self::ConfigParseError => "E1002",
            Self::ItemNotFound => "E2001",
            Self::InvalidStatus => "E2002",
            Self::PreconditionFailed => "E2003",
            Self::UnknownStatusCode => "E2004",
            Self::InvalidPointer => "E2005",
            Self::LedgerUnreachable => "E3001",
            Self::EventQueryFailed => "E3002",
            Self::BlockTimeUnavailable => "E3003",
            Self::WriteRejected => "E4001",
            Self::InsufficientFunds => "E4002",
            Self::WriteReverted => "E4003",
            Self::DocumentUnavailable => "E5001",
            Self::SnapshotCorrupt => "E5002",
        }
    }

    /// Short human-facing summary for logs and terminal output.
    #[must_use]
    pub const fn message(self) -> &'static str {
        match self {
            Self::NotInitialized => "No store snapshot found",
            Self::ConfigParseError => "Config file parse error",
            Self::ItemNotFound => "Item not found",
            Self::InvalidStatus => "Status outside the known set",
            Self::PreconditionFailed => "Action not allowed in the item's current state",
            Self::UnknownStatusCode => "Ledger reported an unknown status code",
            Self::InvalidPointer => "Unsupported document pointer",
            Self::LedgerUnreachable => "Ledger unreachable",
            Self::EventQueryFailed => "Historical event query failed",
            Self::BlockTimeUnavailable => "Block time could not be resolved",
            Self::WriteRejected => "Transaction rejected by signer",
            Self::InsufficientFunds => "Insufficient funds for transaction",
            Self::WriteReverted => "Transaction reverted",
            Self::DocumentUnavailable => "Document could not be fetched",
            Self::SnapshotCorrupt => "Store snapshot unreadable",
        }
    }

    /// Optional remediation hint that can be surfaced to operators.
    #[must_use]
    pub const fn hint(self) -> Option<&'static str> {
        match self {
            Self::NotInitialized => Some("Run `lot sync --script <file>` to build the store."),
            Self::ConfigParseError => Some("Fix syntax in .lotline/config.toml and retry."),
            Self::ItemNotFound | Self::InvalidStatus => None,
            Self::PreconditionFailed => {
                Some("Check the item's status and current holder before retrying.")
            }
            Self::UnknownStatusCode => {
                Some("The ledger may be newer than this client. Upgrade lotline.")
            }
            Self::InvalidPointer => Some("Use an ipfs://, local:// or https:// pointer."),
            Self::LedgerUnreachable => Some("Check the ledger connection and retry."),
            Self::EventQueryFailed => {
                Some("Retry the sync. Partial event sets are never applied.")
            }
            Self::BlockTimeUnavailable => Some("The event is skipped until the next sync."),
            Self::WriteRejected => Some("Approve the request in your signer to continue."),
            Self::InsufficientFunds => Some("Top up the signing account and retry."),
            Self::WriteReverted => Some("The ledger refused the call; see the revert reason."),
            Self::DocumentUnavailable => {
                Some("Add a reachable gateway via LOTLINE_GATEWAYS or [storage] gateways.")
            }
            Self::SnapshotCorrupt => Some("Delete the snapshot and run `lot sync` again."),
        }
    }
}

impl fmt::Display for ErrorCode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.code())
    }
}

#[cfg(test)]
mod tests {
    use super::ErrorCode;
    use std::collections::HashSet;

    #[test]
    fn all_codes_are_unique() {
        let mut seen = HashSet::new();
        for code in ErrorCode::ALL {
            assert!(seen.insert(code.code()), "duplicate code {}", code.code());
        }
    }

    #[test]
    fn code_format_is_machine_friendly() {
        for code in ErrorCode::ALL {
            let s = code.code();
            assert_eq!(s.len(), 5);
            assert!(s.starts_with('E'));
            assert!(s.chars().skip(1).all(|c| c.is_ascii_digit()));
        }
    }

    #[test]
    fn display_is_the_code() {
        assert_eq!(ErrorCode::WriteReverted.to_string(), "E4003");
    }
}
