//! HTTP access to the asset host.
//!
//! The manifest lives at `<asset_root>/<manifest_name>` and every resource at
//! `<asset_root>/<raw path>`. Paths are sent as listed in the manifest, never
//! in their normalized key form. Each path segment is percent-encoded, so
//! names containing `#`, `?` or `%` reach the host intact.

use async_trait::async_trait;
use bytes::Bytes;
use reqwest::{Client, Url};

use crate::config::{PreloadConfig, DEFAULT_MANIFEST_NAME};
use crate::error::ClientError;
use crate::models::Manifest;

/// Where manifests and resource bytes come from.
#[async_trait]
pub trait AssetSource: Send + Sync {
    /// Retrieve the session manifest. Called once per session.
    async fn fetch_manifest(&self) -> Result<Manifest, ClientError>;

    /// Retrieve the raw bytes of one manifest file entry.
    async fn fetch_resource(&self, path: &str) -> Result<Bytes, ClientError>;
}

/// HTTP client for an asset host.
#[derive(Debug, Clone)]
pub struct AssetClient {
    asset_root: String,
    manifest_name: String,
    client: Client,
}

impl AssetClient {
    /// Create with default settings.
    pub fn new(asset_root: impl Into<String>) -> Self {
        Self {
            asset_root: asset_root.into(),
            manifest_name: DEFAULT_MANIFEST_NAME.to_string(),
            client: Client::new(),
        }
    }

    /// Create from configuration, applying the request timeout if one is set.
    pub fn from_config(config: &PreloadConfig) -> Result<Self, ClientError> {
        Url::parse(&config.asset_root).map_err(|e| ClientError::InvalidUrl {
            url: config.asset_root.clone(),
            reason: e.to_string(),
        })?;

        let mut builder = Client::builder();
        if let Some(timeout) = config.request_timeout() {
            builder = builder.timeout(timeout);
        }
        Ok(Self {
            asset_root: config.asset_root.clone(),
            manifest_name: config.manifest_name.clone(),
            client: builder.build()?,
        })
    }

    pub fn with_manifest_name(mut self, name: impl Into<String>) -> Self {
        self.manifest_name = name.into();
        self
    }

    pub fn asset_root(&self) -> &str {
        &self.asset_root
    }

    /// Resolve a path under the asset root. Either separator splits segments.
    pub fn url_for(&self, path: &str) -> Result<Url, ClientError> {
        let invalid = |reason: String| ClientError::InvalidUrl {
            url: self.asset_root.clone(),
            reason,
        };
        let mut url = Url::parse(&self.asset_root).map_err(|e| invalid(e.to_string()))?;
        url.path_segments_mut()
            .map_err(|_| invalid("cannot hold a path".to_string()))?
            .pop_if_empty()
            .extend(path.split(&['/', '\\'][..]).filter(|segment| !segment.is_empty()));
        Ok(url)
    }

    async fn get_bytes(&self, url: Url) -> Result<Bytes, ClientError> {
        let response = self.client.get(url.clone()).send().await?;
        let status = response.status();
        if !status.is_success() {
            return Err(ClientError::Status {
                url: url.to_string(),
                status,
            });
        }
        Ok(response.bytes().await?)
    }
}

#[async_trait]
impl AssetSource for AssetClient {
    async fn fetch_manifest(&self) -> Result<Manifest, ClientError> {
        let url = self.url_for(&self.manifest_name)?;
        tracing::debug!("Fetching manifest from {}", url);
        let body = self.get_bytes(url.clone()).await?;
        serde_json::from_slice(&body).map_err(|source| ClientError::Malformed {
            url: url.to_string(),
            source,
        })
    }

    async fn fetch_resource(&self, path: &str) -> Result<Bytes, ClientError> {
        self.get_bytes(self.url_for(path)?).await
    }
}
