//! Preloader configuration.
//!
//! Values are layered: built-in defaults, then the JSON config file, then
//! environment variables. The CLI applies its flags on top of the result.
//!
//! Environment variables:
//! - `ASSET_PRELOADER_ROOT` - Base URL the manifest and resources live under
//! - `ASSET_PRELOADER_STORE` - Path of the SQLite resource store
//! - `ASSET_PRELOADER_CONCURRENCY` - Maximum simultaneous file fetches
//! - `ASSET_PRELOADER_TIMEOUT_SECS` - Per-request timeout
//! - `ASSET_PRELOADER_RETRIES` - Extra attempts for a failed file fetch

use std::fs;
use std::path::{Path, PathBuf};
use std::time::Duration;

use anyhow::{Context, Result};
use dirs::config_dir;
use serde::{Deserialize, Serialize};

const APP_NAME: &str = "asset-preloader";
const CONFIG_FILE: &str = "config.json";

/// Default asset host, matching `preload serve`.
pub const DEFAULT_ASSET_ROOT: &str = "http://127.0.0.1:3000/assets";

/// Well-known manifest document name under the asset root.
pub const DEFAULT_MANIFEST_NAME: &str = "index.json";

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct PreloadConfig {
    /// Base URL for both the manifest and every resource.
    pub asset_root: String,
    /// Manifest document name, relative to `asset_root`.
    pub manifest_name: String,
    /// Store location. `None` uses the platform data directory.
    pub store_path: Option<PathBuf>,
    /// Maximum simultaneous fetches. `None` fans out to every file at once.
    pub concurrency_limit: Option<usize>,
    /// Per-request timeout in seconds.
    pub request_timeout_secs: Option<u64>,
    /// Extra attempts after a failed file fetch. Manifest fetches never retry.
    pub fetch_retries: u32,
}

impl Default for PreloadConfig {
    fn default() -> Self {
        Self {
            asset_root: DEFAULT_ASSET_ROOT.to_string(),
            manifest_name: DEFAULT_MANIFEST_NAME.to_string(),
            store_path: None,
            concurrency_limit: None,
            request_timeout_secs: None,
            fetch_retries: 0,
        }
    }
}

impl PreloadConfig {
    /// Load from the user's config directory, then apply environment overrides.
    /// Falls back to defaults if the file is missing or fails to parse.
    pub fn load() -> Self {
        let config = match get_config_path().and_then(|path| Self::from_file(&path)) {
            Ok(config) => config,
            Err(e) => {
                tracing::warn!("Failed to load config, using defaults: {:#}", e);
                Self::default()
            }
        };
        config.with_env()
    }

    /// Load from an explicit file. A missing file yields defaults.
    pub fn from_file(path: &Path) -> Result<Self> {
        if !path.exists() {
            return Ok(Self::default());
        }

        let content = fs::read_to_string(path)
            .with_context(|| format!("Failed to read config file {}", path.display()))?;

        let config = serde_json::from_str(&content)
            .with_context(|| format!("Failed to parse config file {}", path.display()))?;

        Ok(config)
    }

    /// Apply `ASSET_PRELOADER_*` environment variables on top of `self`.
    pub fn with_env(self) -> Self {
        self.with_vars(|name| std::env::var(name).ok())
    }

    fn with_vars(mut self, var: impl Fn(&str) -> Option<String>) -> Self {
        if let Some(root) = var("ASSET_PRELOADER_ROOT") {
            self.asset_root = root;
        }
        if let Some(store) = var("ASSET_PRELOADER_STORE") {
            self.store_path = Some(PathBuf::from(store));
        }
        if let Some(limit) = var("ASSET_PRELOADER_CONCURRENCY").and_then(|s| s.parse().ok()) {
            self.concurrency_limit = Some(limit);
        }
        if let Some(secs) = var("ASSET_PRELOADER_TIMEOUT_SECS").and_then(|s| s.parse().ok()) {
            self.request_timeout_secs = Some(secs);
        }
        if let Some(retries) = var("ASSET_PRELOADER_RETRIES").and_then(|s| s.parse().ok()) {
            self.fetch_retries = retries;
        }
        self
    }

    pub fn request_timeout(&self) -> Option<Duration> {
        self.request_timeout_secs.map(Duration::from_secs)
    }

    /// Save the configuration to the user's config directory.
    pub fn save(&self) -> Result<()> {
        let config_path = get_config_path()?;

        if let Some(parent) = config_path.parent() {
            fs::create_dir_all(parent).context("Failed to create config directory")?;
        }

        let content = serde_json::to_string_pretty(self).context("Failed to serialize config")?;

        fs::write(&config_path, content).context("Failed to write config file")?;

        Ok(())
    }
}

pub fn get_config_path() -> Result<PathBuf> {
    let mut path =
        config_dir().ok_or_else(|| anyhow::anyhow!("Could not determine config directory"))?;
    path.push(APP_NAME);
    path.push(CONFIG_FILE);
    Ok(path)
}
