//! Content pointers: `ipfs://`, `local://`, `http(s)://` and bare CIDs.

use std::fmt;
use std::str::FromStr;

use super::StorageError;

/// A parsed content pointer.
///
/// Attachment references inside metadata are often bare CIDs, so a string
/// without a scheme is read as an IPFS CID.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum Pointer {
    /// CID, optionally followed by a path (`bafy.../meta.json`).
    Ipfs(String),
    /// Key in the local document store.
    Local(String),
    /// Full `http://` or `https://` URL.
    Http(String),
}

impl Pointer {
    /// True when the pointer can be resolved without network access.
    #[must_use]
    pub const fn is_local(&self) -> bool {
        matches!(self, Self::Local(_))
    }
}

impl FromStr for Pointer {
    type Err = StorageError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let raw = s.trim();
        let unsupported = || StorageError::UnsupportedPointer(s.to_string());

        if let Some(rest) = raw.strip_prefix("ipfs://") {
            let cid = rest.trim_start_matches("ipfs/");
            return if cid.is_empty() {
                Err(unsupported())
            } else {
                Ok(Self::Ipfs(cid.to_string()))
            };
        }
        if let Some(key) = raw.strip_prefix("local://") {
            return if key.is_empty() {
                Err(unsupported())
            } else {
                Ok(Self::Local(key.to_string()))
            };
        }
        if raw.starts_with("http://") || raw.starts_with("https://") {
            return Ok(Self::Http(raw.to_string()));
        }
        if raw.is_empty() || raw.contains("://") || raw.contains(char::is_whitespace) {
            return Err(unsupported());
        }
        Ok(Self::Ipfs(raw.to_string()))
    }
}

impl fmt::Display for Pointer {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Ipfs(cid) => write!(f, "ipfs://{cid}"),
            Self::Local(key) => write!(f, "local://{key}"),
            Self::Http(url) => f.write_str(url),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_each_scheme() {
        assert_eq!(
            "ipfs://bafy/meta.json".parse::<Pointer>().unwrap(),
            Pointer::Ipfs("bafy/meta.json".into())
        );
        assert_eq!(
            "ipfs://ipfs/bafy".parse::<Pointer>().unwrap(),
            Pointer::Ipfs("bafy".into())
        );
        assert_eq!(
            "local://abc123".parse::<Pointer>().unwrap(),
            Pointer::Local("abc123".into())
        );
        assert_eq!(
            "https://example.com/a.json".parse::<Pointer>().unwrap(),
            Pointer::Http("https://example.com/a.json".into())
        );
    }

    #[test]
    fn bare_cid_is_ipfs() {
        assert_eq!(
            " QmHash ".parse::<Pointer>().unwrap(),
            Pointer::Ipfs("QmHash".into())
        );
    }

    #[test]
    fn rejects_unknown_or_empty() {
        for raw in ["", "ipfs://", "local://", "ftp://x", "two words"] {
            assert!(raw.parse::<Pointer>().is_err(), "{raw:?} should be rejected");
        }
    }

    #[test]
    fn display_is_canonical() {
        let p: Pointer = "QmHash".parse().unwrap();
        assert_eq!(p.to_string(), "ipfs://QmHash");
        assert!("local://k".parse::<Pointer>().unwrap().is_local());
    }
}
