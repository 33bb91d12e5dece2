//! Network document resolver with ordered gateway fallback.
//!
//! `ipfs://` pointers are tried against each configured gateway in order; a
//! gateway that errors, answers non-2xx, or exceeds the per-kind timeout is
//! skipped and the next one is tried. The fetch fails only once every gateway
//! has been exhausted. `http(s)://` pointers get a single attempt under the
//! same timeout, and `local://` pointers are served from [`LocalDocuments`].

use std::time::Duration;

use async_trait::async_trait;
use reqwest::Client;
use tokio::time::timeout;
use tracing::{debug, warn};

use super::{DocumentKind, DocumentResolver, LocalDocuments, Pointer, StorageError};

/// Default gateway bases, tried in this order.
pub const DEFAULT_GATEWAYS: [&str; 4] = [
    "https://gateway.pinata.cloud/ipfs/",
    "https://ipfs.io/ipfs/",
    "https://cloudflare-ipfs.com/ipfs/",
    "https://dweb.link/ipfs/",
];

/// Per-kind request deadlines.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Timeouts {
    pub metadata: Duration,
    pub image: Duration,
    pub certificate: Duration,
}

impl Default for Timeouts {
    fn default() -> Self {
        Self {
            metadata: Duration::from_secs(10),
            image: Duration::from_secs(10),
            certificate: Duration::from_secs(15),
        }
    }
}

impl Timeouts {
    #[must_use]
    pub const fn for_kind(&self, kind: DocumentKind) -> Duration {
        match kind {
            DocumentKind::Metadata => self.metadata,
            DocumentKind::Image => self.image,
            DocumentKind::Certificate => self.certificate,
        }
    }

    /// The same deadline for every kind.
    #[must_use]
    pub const fn uniform(limit: Duration) -> Self {
        Self {
            metadata: limit,
            image: limit,
            certificate: limit,
        }
    }
}

/// Resolves pointers over HTTP gateways and the local store.
#[derive(Debug, Clone)]
pub struct GatewayResolver {
    client: Client,
    gateways: Vec<String>,
    timeouts: Timeouts,
    local: Option<LocalDocuments>,
}

impl GatewayResolver {
    /// # Errors
    ///
    /// Returns [`StorageError::Client`] if the HTTP client cannot be built.
    pub fn new(gateways: Vec<String>, timeouts: Timeouts) -> Result<Self, StorageError> {
        let client = Client::builder()
            .build()
            .map_err(|e| StorageError::Client(e.to_string()))?;
        Ok(Self::with_client(client, gateways, timeouts))
    }

    #[must_use]
    pub fn with_client(client: Client, gateways: Vec<String>, timeouts: Timeouts) -> Self {
        Self {
            client,
            gateways,
            timeouts,
            local: None,
        }
    }

    /// Serve `local://` pointers from `store`.
    #[must_use]
    pub fn with_local(mut self, store: LocalDocuments) -> Self {
        self.local = Some(store);
        self
    }

    #[must_use]
    pub fn gateways(&self) -> &[String] {
        &self.gateways
    }

    async fn get_once(&self, url: &str, limit: Duration) -> Result<Vec<u8>, StorageError> {
        let request = async {
            let response = self
                .client
                .get(url)
                .send()
                .await
                .map_err(|e| request_error(url, &e))?;
            let status = response.status();
            if !status.is_success() {
                return Err(StorageError::Status {
                    url: url.to_string(),
                    status: status.as_u16(),
                });
            }
            let body = response.bytes().await.map_err(|e| request_error(url, &e))?;
            Ok(body.to_vec())
        };

        timeout(limit, request)
            .await
            .unwrap_or_else(|_| {
                Err(StorageError::Timeout {
                    url: url.to_string(),
                    timeout: limit,
                })
            })
    }

    async fn fetch_ipfs(&self, cid: &str, kind: DocumentKind) -> Result<Vec<u8>, StorageError> {
        let limit = self.timeouts.for_kind(kind);
        for gateway in &self.gateways {
            let url = join_gateway(gateway, cid);
            match self.get_once(&url, limit).await {
                Ok(bytes) => {
                    debug!(%url, kind = %kind, bytes = bytes.len(), "gateway fetch succeeded");
                    return Ok(bytes);
                }
                Err(e) => warn!(%gateway, kind = %kind, error = %e, "gateway failed, trying next"),
            }
        }
        Err(StorageError::AllGatewaysFailed {
            pointer: format!("ipfs://{cid}"),
            attempts: self.gateways.len(),
        })
    }

    fn fetch_local(&self, key: &str) -> Result<Vec<u8>, StorageError> {
        let pointer = format!("local://{key}");
        let store = self
            .local
            .as_ref()
            .ok_or_else(|| StorageError::NoLocalStore(pointer.clone()))?;
        match store.get(key) {
            Ok(Some(bytes)) => Ok(bytes),
            Ok(None) => Err(StorageError::LocalMissing(pointer)),
            Err(e) => Err(StorageError::Local(format!("{e:#}"))),
        }
    }
}

#[async_trait]
impl DocumentResolver for GatewayResolver {
    async fn fetch(&self, pointer: &Pointer, kind: DocumentKind) -> Result<Vec<u8>, StorageError> {
        match pointer {
            Pointer::Ipfs(cid) => self.fetch_ipfs(cid, kind).await,
            Pointer::Local(key) => self.fetch_local(key),
            Pointer::Http(url) => self.get_once(url, self.timeouts.for_kind(kind)).await,
        }
    }
}

fn join_gateway(gateway: &str, cid: &str) -> String {
    if gateway.ends_with('/') {
        format!("{gateway}{cid}")
    } else {
        format!("{gateway}/{cid}")
    }
}

fn request_error(url: &str, err: &reqwest::Error) -> StorageError {
    StorageError::Request {
        url: url.to_string(),
        message: err.to_string(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;
    use tempfile::TempDir;

    #[test]
    fn gateway_join_handles_trailing_slash() {
        assert_eq!(join_gateway("https://g/ipfs/", "Qm"), "https://g/ipfs/Qm");
        assert_eq!(join_gateway("https://g/ipfs", "Qm"), "https://g/ipfs/Qm");
    }

    #[test]
    fn certificate_timeout_is_longest_by_default() {
        let t = Timeouts::default();
        assert_eq!(t.for_kind(DocumentKind::Metadata), Duration::from_secs(10));
        assert_eq!(t.for_kind(DocumentKind::Image), Duration::from_secs(10));
        assert_eq!(t.for_kind(DocumentKind::Certificate), Duration::from_secs(15));
    }

    #[tokio::test]
    async fn local_pointers_use_local_store() {
        let dir = TempDir::new().expect("tempdir");
        let local = LocalDocuments::new(dir.path());
        let pointer = local.put(&json!({"name": "Salt"})).unwrap();

        let resolver = GatewayResolver::new(Vec::new(), Timeouts::default())
            .unwrap()
            .with_local(local);
        let meta = crate::storage::resolve_metadata(&resolver, &pointer).await.unwrap();
        assert_eq!(meta.name.as_deref(), Some("Salt"));

        assert!(matches!(
            crate::storage::resolve_metadata(&resolver, "local://missing").await,
            Err(StorageError::LocalMissing(_))
        ));
    }

    #[tokio::test]
    async fn local_pointer_without_store_fails() {
        let resolver = GatewayResolver::new(Vec::new(), Timeouts::default()).unwrap();
        let err = resolver
            .fetch(&Pointer::Local("k".into()), DocumentKind::Metadata)
            .await
            .unwrap_err();
        assert!(matches!(err, StorageError::NoLocalStore(_)));
    }

    #[tokio::test]
    async fn no_gateways_means_immediate_failure() {
        let resolver = GatewayResolver::new(Vec::new(), Timeouts::default()).unwrap();
        let err = resolver
            .fetch(&Pointer::Ipfs("Qm".into()), DocumentKind::Image)
            .await
            .unwrap_err();
        assert!(matches!(err, StorageError::AllGatewaysFailed { attempts: 0, .. }));
    }
}
