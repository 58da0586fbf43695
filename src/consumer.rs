//! The boundary between a load session and the runtime it prepares.

use std::collections::HashMap;
use std::path::Path;
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::RwLock;

use anyhow::{Context, Result};
use bytes::Bytes;

use crate::models::ResourceKey;

/// Entry points a load session calls on the runtime.
///
/// Every `declare_directory` happens before any `deliver_resource`, and
/// `signal_ready` happens last, at most once per session. Deliveries for
/// different keys may arrive in any order.
pub trait ConsumerBridge: Send + Sync {
    fn declare_directory(&self, path: &str);

    fn deliver_resource(&self, key: &ResourceKey, bytes: Bytes);

    fn signal_ready(&self);
}

/// In-memory resource registry the runtime reads assets from.
#[derive(Debug, Default)]
pub struct AssetRegistry {
    directories: RwLock<Vec<String>>,
    resources: RwLock<HashMap<ResourceKey, Bytes>>,
    deliveries: AtomicUsize,
    ready_signals: AtomicUsize,
    ready: AtomicBool,
}

impl AssetRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn get(&self, key: &str) -> Option<Bytes> {
        self.resources
            .read()
            .expect("registry lock poisoned")
            .get(&ResourceKey::normalize(key))
            .cloned()
    }

    pub fn contains(&self, key: &str) -> bool {
        self.get(key).is_some()
    }

    /// Declared directories, in declaration order.
    pub fn directories(&self) -> Vec<String> {
        self.directories
            .read()
            .expect("registry lock poisoned")
            .clone()
    }

    /// Delivered keys, sorted.
    pub fn keys(&self) -> Vec<ResourceKey> {
        let mut keys: Vec<_> = self
            .resources
            .read()
            .expect("registry lock poisoned")
            .keys()
            .cloned()
            .collect();
        keys.sort();
        keys
    }

    pub fn len(&self) -> usize {
        self.resources.read().expect("registry lock poisoned").len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Total `deliver_resource` calls, including repeats of a key.
    pub fn delivery_count(&self) -> usize {
        self.deliveries.load(Ordering::SeqCst)
    }

    pub fn ready_count(&self) -> usize {
        self.ready_signals.load(Ordering::SeqCst)
    }

    pub fn is_ready(&self) -> bool {
        self.ready.load(Ordering::SeqCst)
    }

    /// Write every resource to `dir/<key>`, returning how many were written.
    ///
    /// Keys that cannot name a file inside `dir` (empty, `.` or `..`) fail the
    /// export before anything is written.
    pub fn export_to(&self, dir: &Path) -> Result<usize> {
        let resources = self.resources.read().expect("registry lock poisoned");
        if let Some(key) = resources
            .keys()
            .find(|key| matches!(key.as_str(), "" | "." | ".."))
        {
            anyhow::bail!("Cannot export resource with key {:?}", key.as_str());
        }

        std::fs::create_dir_all(dir)
            .with_context(|| format!("Failed to create export directory {}", dir.display()))?;

        for (key, bytes) in resources.iter() {
            let target = dir.join(key.as_str());
            std::fs::write(&target, bytes)
                .with_context(|| format!("Failed to write {}", target.display()))?;
        }
        Ok(resources.len())
    }
}

impl ConsumerBridge for AssetRegistry {
    fn declare_directory(&self, path: &str) {
        let mut directories = self.directories.write().expect("registry lock poisoned");
        // Nested paths rely on the first declaration.
        if !directories.iter().any(|d| d == path) {
            directories.push(path.to_string());
        }
    }

    fn deliver_resource(&self, key: &ResourceKey, bytes: Bytes) {
        self.resources
            .write()
            .expect("registry lock poisoned")
            .insert(key.clone(), bytes);
        self.deliveries.fetch_add(1, Ordering::SeqCst);
    }

    fn signal_ready(&self) {
        self.ready_signals.fetch_add(1, Ordering::SeqCst);
        self.ready.store(true, Ordering::SeqCst);
        tracing::info!("Asset registry ready with {} resources", self.len());
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn registry_looks_up_by_raw_or_normalized_path() {
        let registry = AssetRegistry::new();
        registry.deliver_resource(&ResourceKey::normalize("ui/icon.png"), Bytes::from_static(b"png"));

        assert_eq!(registry.get("ui.icon.png"), Some(Bytes::from_static(b"png")));
        assert_eq!(registry.get("ui/icon.png"), Some(Bytes::from_static(b"png")));
        assert!(!registry.contains("ui/other.png"));
        assert_eq!(registry.keys(), vec![ResourceKey::normalize("ui/icon.png")]);
        assert_eq!(registry.delivery_count(), 1);
    }

    #[test]
    fn first_directory_declaration_wins() {
        let registry = AssetRegistry::new();
        registry.declare_directory("voxel");
        registry.declare_directory("voxel.sprite");
        registry.declare_directory("voxel");

        assert_eq!(registry.directories(), vec!["voxel", "voxel.sprite"]);
    }

    #[test]
    fn empty_resource_is_still_present() {
        let registry = AssetRegistry::new();
        registry.deliver_resource(&ResourceKey::normalize("empty.txt"), Bytes::new());
        assert!(registry.contains("empty.txt"));
        assert_eq!(registry.len(), 1);
    }

    #[test]
    fn export_writes_flat_files_by_key() {
        let registry = AssetRegistry::new();
        registry.deliver_resource(&ResourceKey::normalize("a/b.txt"), Bytes::from_static(b"hi"));

        let dir = tempfile::tempdir().unwrap();
        let written = registry.export_to(dir.path()).unwrap();

        assert_eq!(written, 1);
        assert_eq!(std::fs::read(dir.path().join("a.b.txt")).unwrap(), b"hi");
    }

    #[test]
    fn export_rejects_keys_that_escape_the_directory() {
        let dir = tempfile::tempdir().unwrap();
        let target = dir.path().join("export");

        for bad in ["..", ".", ""] {
            let registry = AssetRegistry::new();
            registry.deliver_resource(&ResourceKey::normalize("ok.txt"), Bytes::from_static(b"ok"));
            registry.deliver_resource(&ResourceKey::normalize(bad), Bytes::from_static(b"x"));

            assert!(registry.export_to(&target).is_err());
            assert!(!target.exists());
        }
    }

    #[test]
    fn ready_flag_tracks_signals() {
        let registry = AssetRegistry::new();
        assert!(!registry.is_ready());
        registry.signal_ready();
        assert!(registry.is_ready());
        assert_eq!(registry.ready_count(), 1);
    }
}
