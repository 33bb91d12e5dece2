//! Document storage interface.
//!
//! Metadata documents and binary attachments live outside the ledger and are
//! addressed by [`Pointer`]s. The engine fetches them through a
//! [`DocumentResolver`]; [`GatewayResolver`] is the network implementation and
//! [`MemoryDocuments`] a fixed in-memory one.

pub mod gateway;
pub mod local;
pub mod pointer;

pub use gateway::{GatewayResolver, Timeouts};
pub use local::LocalDocuments;
pub use pointer::Pointer;

use std::collections::HashMap;
use std::time::Duration;

use async_trait::async_trait;
use tracing::debug;

use crate::error::ErrorCode;
use crate::model::Metadata;

/// What a fetch is for. Selects the timeout.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum DocumentKind {
    Metadata,
    Image,
    Certificate,
}

impl DocumentKind {
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Metadata => "metadata",
            Self::Image => "image",
            Self::Certificate => "certificate",
        }
    }
}

impl std::fmt::Display for DocumentKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Document fetch failures.
#[derive(Debug, thiserror::Error)]
pub enum StorageError {
    #[error("unsupported document pointer '{0}'")]
    UnsupportedPointer(String),

    #[error("request to {url} timed out after {timeout:?}")]
    Timeout { url: String, timeout: Duration },

    #[error("request to {url} returned HTTP {status}")]
    Status { url: String, status: u16 },

    #[error("request to {url} failed: {message}")]
    Request { url: String, message: String },

    #[error("all {attempts} gateways failed for {pointer}")]
    AllGatewaysFailed { pointer: String, attempts: usize },

    #[error("no local document store configured for {0}")]
    NoLocalStore(String),

    #[error("local document {0} not found")]
    LocalMissing(String),

    #[error("local document store error: {0}")]
    Local(String),

    #[error("document {pointer} is not valid metadata: {source}")]
    Decode {
        pointer: String,
        #[source]
        source: serde_json::Error,
    },

    #[error("failed to build HTTP client: {0}")]
    Client(String),

    #[error("document {0} not found")]
    NotFound(String),
}

impl StorageError {
    #[must_use]
    pub const fn code(&self) -> ErrorCode {
        match self {
            Self::UnsupportedPointer(_) => ErrorCode::InvalidPointer,
            _ => ErrorCode::DocumentUnavailable,
        }
    }
}

/// Fetches document bytes by pointer.
#[async_trait]
pub trait DocumentResolver: Send + Sync {
    async fn fetch(&self, pointer: &Pointer, kind: DocumentKind) -> Result<Vec<u8>, StorageError>;
}

/// Parse `pointer`, fetch it and decode it as [`Metadata`].
///
/// # Errors
///
/// Returns a [`StorageError`] if the pointer is unsupported, every endpoint
/// fails, or the body is not a metadata document.
pub async fn resolve_metadata<R: DocumentResolver + ?Sized>(
    resolver: &R,
    pointer: &str,
) -> Result<Metadata, StorageError> {
    let parsed: Pointer = pointer.parse()?;
    let bytes = resolver.fetch(&parsed, DocumentKind::Metadata).await?;
    serde_json::from_slice(&bytes).map_err(|source| StorageError::Decode {
        pointer: pointer.to_string(),
        source,
    })
}

/// Fetch the image or certificate referenced by `metadata`.
///
/// Returns `Ok(None)` when the document has no such attachment.
///
/// # Errors
///
/// Returns a [`StorageError`] if the attachment exists but cannot be fetched.
pub async fn fetch_attachment<R: DocumentResolver + ?Sized>(
    resolver: &R,
    metadata: &Metadata,
    kind: DocumentKind,
) -> Result<Option<Vec<u8>>, StorageError> {
    let reference = match kind {
        DocumentKind::Image => metadata.image.as_deref(),
        DocumentKind::Certificate => metadata.certificate.as_deref(),
        DocumentKind::Metadata => None,
    };
    let Some(reference) = reference.filter(|r| !r.trim().is_empty()) else {
        return Ok(None);
    };
    let pointer: Pointer = reference.parse()?;
    debug!(%pointer, kind = %kind, "fetching attachment");
    resolver.fetch(&pointer, kind).await.map(Some)
}

/// Fixed documents keyed by canonical pointer string.
#[derive(Debug, Clone, Default)]
pub struct MemoryDocuments {
    docs: HashMap<String, Vec<u8>>,
}

impl MemoryDocuments {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Register `bytes` under `pointer`.
    ///
    /// # Errors
    ///
    /// Returns [`StorageError::UnsupportedPointer`] if `pointer` does not parse.
    pub fn insert(&mut self, pointer: &str, bytes: impl Into<Vec<u8>>) -> Result<(), StorageError> {
        let parsed: Pointer = pointer.parse()?;
        self.docs.insert(parsed.to_string(), bytes.into());
        Ok(())
    }

    /// Register `metadata` as JSON under `pointer`.
    ///
    /// # Errors
    ///
    /// Returns [`StorageError::UnsupportedPointer`] if `pointer` does not parse.
    pub fn insert_metadata(&mut self, pointer: &str, metadata: &Metadata) -> Result<(), StorageError> {
        let bytes = serde_json::to_vec(metadata).map_err(|source| StorageError::Decode {
            pointer: pointer.to_string(),
            source,
        })?;
        self.insert(pointer, bytes)
    }
}

#[async_trait]
impl DocumentResolver for MemoryDocuments {
    async fn fetch(&self, pointer: &Pointer, _kind: DocumentKind) -> Result<Vec<u8>, StorageError> {
        self.docs
            .get(&pointer.to_string())
            .cloned()
            .ok_or_else(|| StorageError::NotFound(pointer.to_string()))
    }
}
