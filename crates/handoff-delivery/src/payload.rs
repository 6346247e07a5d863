//! The payload every client receives, fetched once and shared.

use std::path::PathBuf;
use std::sync::Arc;

use futures_util::future::BoxFuture;
use tokio::sync::OnceCell;

use crate::DeliveryError;

/// Sent instead of the real payload when it cannot be read.
pub const FALLBACK_PAYLOAD: &[u8] =
    b"<!doctype html><meta charset=\"utf-8\"><title>Unavailable</title><p>Content unavailable.</p>";

/// Where the payload comes from.
pub trait PayloadSource: Send + Sync + 'static {
    /// Reads the payload bytes.
    fn fetch(&self) -> BoxFuture<'_, Result<Vec<u8>, DeliveryError>>;
}

/// A payload already in memory.
#[derive(Debug, Clone)]
pub struct StaticPayload(Vec<u8>);

impl StaticPayload {
    pub fn new(bytes: impl Into<Vec<u8>>) -> Self {
        Self(bytes.into())
    }
}

impl PayloadSource for StaticPayload {
    fn fetch(&self) -> BoxFuture<'_, Result<Vec<u8>, DeliveryError>> {
        Box::pin(async move { Ok(self.0.clone()) })
    }
}

/// A payload read from disk on first use.
#[derive(Debug, Clone)]
pub struct FilePayload {
    path: PathBuf,
}

impl FilePayload {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }
}

impl PayloadSource for FilePayload {
    fn fetch(&self) -> BoxFuture<'_, Result<Vec<u8>, DeliveryError>> {
        Box::pin(async move {
            tokio::fs::read(&self.path)
                .await
                .map_err(DeliveryError::Payload)
        })
    }
}

/// Lazily fetched, process-wide payload.
///
/// The source is asked at most once. If that fetch fails,
/// [`FALLBACK_PAYLOAD`] is cached in its place and the source is never
/// asked again.
pub struct PayloadCache {
    source: Box<dyn PayloadSource>,
    cell: OnceCell<Arc<[u8]>>,
}

impl PayloadCache {
    pub fn new(source: impl PayloadSource) -> Self {
        Self {
            source: Box::new(source),
            cell: OnceCell::new(),
        }
    }

    /// Returns the payload, fetching it on the first call.
    pub async fn get(&self) -> Arc<[u8]> {
        self.cell
            .get_or_init(|| async {
                match self.source.fetch().await {
                    Ok(bytes) => {
                        tracing::debug!(bytes = bytes.len(), "payload loaded");
                        Arc::from(bytes)
                    }
                    Err(e) => {
                        tracing::warn!(error = %e, "payload fetch failed, using fallback");
                        Arc::from(FALLBACK_PAYLOAD)
                    }
                }
            })
            .await
            .clone()
    }

    /// Whether the payload (or the fallback) has been cached.
    pub fn is_loaded(&self) -> bool {
        self.cell.initialized()
    }
}

impl std::fmt::Debug for PayloadCache {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("PayloadCache")
            .field("loaded", &self.is_loaded())
            .finish_non_exhaustive()
    }
}

#[cfg(test)]
mod tests {
    use std::sync::atomic::{AtomicUsize, Ordering};

    use super::*;

    /// Counts fetches and fails every one of them.
    struct Flaky(Arc<AtomicUsize>);

    impl PayloadSource for Flaky {
        fn fetch(&self) -> BoxFuture<'_, Result<Vec<u8>, DeliveryError>> {
            self.0.fetch_add(1, Ordering::SeqCst);
            Box::pin(async {
                Err(DeliveryError::Payload(std::io::Error::new(
                    std::io::ErrorKind::NotFound,
                    "gone",
                )))
            })
        }
    }

    #[tokio::test]
    async fn test_get_static_payload_returns_bytes() {
        let cache = PayloadCache::new(StaticPayload::new("hello"));
        assert!(!cache.is_loaded());

        assert_eq!(&*cache.get().await, b"hello");
        assert!(cache.is_loaded());
    }

    #[tokio::test]
    async fn test_get_failed_fetch_caches_fallback() {
        let calls = Arc::new(AtomicUsize::new(0));
        let cache = PayloadCache::new(Flaky(calls.clone()));

        assert_eq!(&*cache.get().await, FALLBACK_PAYLOAD);
        assert_eq!(&*cache.get().await, FALLBACK_PAYLOAD);
        assert_eq!(calls.load(Ordering::SeqCst), 1, "fallback is cached");
    }

    #[tokio::test]
    async fn test_get_missing_file_returns_fallback() {
        let cache = PayloadCache::new(FilePayload::new("/definitely/not/here.html"));
        assert_eq!(&*cache.get().await, FALLBACK_PAYLOAD);
    }

    #[tokio::test]
    async fn test_get_file_payload_reads_file() {
        let path = std::env::temp_dir().join(format!("handoff-payload-{}.html", std::process::id()));
        tokio::fs::write(&path, b"<p>hi</p>").await.unwrap();

        let cache = PayloadCache::new(FilePayload::new(&path));
        let bytes = cache.get().await;
        let _ = tokio::fs::remove_file(&path).await;

        assert_eq!(&*bytes, b"<p>hi</p>");
    }

    #[tokio::test]
    async fn test_get_concurrent_callers_share_one_fetch() {
        let calls = Arc::new(AtomicUsize::new(0));
        let cache = Arc::new(PayloadCache::new(Flaky(calls.clone())));

        let (a, b) = tokio::join!(cache.get(), cache.get());

        assert_eq!(a, b);
        assert_eq!(calls.load(Ordering::SeqCst), 1);
    }
}
