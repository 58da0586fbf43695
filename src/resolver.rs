//! Cache-first resolution of a single manifest file.

use std::sync::Arc;
use std::time::Duration;

use bytes::Bytes;
use tokio::task::JoinHandle;

use crate::client::AssetSource;
use crate::db::ResourceStore;
use crate::error::{ResolveError, StoreError};
use crate::models::ResourceKey;

/// Delay before the first retry; later retries back off linearly.
const RETRY_BACKOFF: Duration = Duration::from_millis(200);

/// Where a resolved resource came from.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Origin {
    Cache,
    Network,
}

/// A file resolved to bytes.
#[derive(Debug)]
pub struct Resolved {
    pub path: String,
    pub key: ResourceKey,
    pub bytes: Bytes,
    pub origin: Origin,
    /// Background store write for a network fetch. Resolution never waits on it.
    pub cache_write: Option<JoinHandle<Result<(), StoreError>>>,
}

/// Resolves file paths to bytes, using the store as a write-through cache.
#[derive(Clone)]
pub struct ResourceResolver {
    store: ResourceStore,
    source: Arc<dyn AssetSource>,
    retries: u32,
}

impl ResourceResolver {
    pub fn new(store: ResourceStore, source: Arc<dyn AssetSource>) -> Self {
        Self {
            store,
            source,
            retries: 0,
        }
    }

    /// Re-issue a failed fetch up to `retries` more times.
    pub fn with_retries(mut self, retries: u32) -> Self {
        self.retries = retries;
        self
    }

    pub fn store(&self) -> &ResourceStore {
        &self.store
    }

    pub async fn resolve(&self, path: &str) -> Result<Resolved, ResolveError> {
        let key = ResourceKey::normalize(path);

        match self.store.get(&key).await {
            Ok(Some(bytes)) => {
                tracing::debug!(%key, "cache hit");
                return Ok(Resolved {
                    path: path.to_string(),
                    key,
                    bytes,
                    origin: Origin::Cache,
                    cache_write: None,
                });
            }
            Ok(None) => tracing::debug!(%key, "cache miss"),
            Err(e) => tracing::warn!(%key, "Store read failed, fetching instead: {}", e),
        }

        let bytes = self.fetch_with_retry(path).await?;

        let store = self.store.clone();
        let write_key = key.clone();
        let write_bytes = bytes.clone();
        let cache_write = tokio::spawn(async move {
            let result = store.put(&write_key, write_bytes).await;
            if let Err(e) = &result {
                tracing::warn!(key = %write_key, "Failed to cache resource: {}", e);
            }
            result
        });

        Ok(Resolved {
            path: path.to_string(),
            key,
            bytes,
            origin: Origin::Network,
            cache_write: Some(cache_write),
        })
    }

    async fn fetch_with_retry(&self, path: &str) -> Result<Bytes, ResolveError> {
        let mut attempt = 0;
        loop {
            match self.source.fetch_resource(path).await {
                Ok(bytes) => return Ok(bytes),
                Err(e) if attempt < self.retries => {
                    attempt += 1;
                    tracing::warn!(
                        path,
                        "Fetch failed (attempt {}/{}): {}",
                        attempt,
                        self.retries + 1,
                        e
                    );
                    tokio::time::sleep(RETRY_BACKOFF * attempt).await;
                }
                Err(source) => {
                    return Err(ResolveError::FetchFailed {
                        path: path.to_string(),
                        source,
                    })
                }
            }
        }
    }
}
