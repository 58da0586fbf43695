//! Shared fakes for session and resolver specs.
#![allow(dead_code)]

use std::collections::HashMap;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Mutex;
use std::time::Duration;

use asset_preloader::error::ClientError;
use asset_preloader::models::{Manifest, ResourceKey};
use asset_preloader::{AssetSource, ConsumerBridge};
use async_trait::async_trait;
use bytes::Bytes;
use reqwest::StatusCode;

/// In-process asset host that records every request.
#[derive(Default)]
pub struct FakeSource {
    manifest: Option<Manifest>,
    files: HashMap<String, Bytes>,
    /// Remaining failures per path before a fetch succeeds.
    flaky: Mutex<HashMap<String, usize>>,
    delay: Option<Duration>,
    fetches: Mutex<Vec<String>>,
    manifest_fetches: AtomicUsize,
    in_flight: AtomicUsize,
    max_in_flight: AtomicUsize,
}

impl FakeSource {
    /// A host whose manifest lists `dirs` and every file in `files`.
    pub fn new(dirs: &[&str], files: &[(&str, &[u8])]) -> Self {
        let manifest = Manifest::new(
            dirs.iter().map(|d| d.to_string()).collect(),
            files.iter().map(|(p, _)| p.to_string()).collect(),
        );
        Self {
            manifest: Some(manifest),
            files: files
                .iter()
                .map(|(p, b)| (p.to_string(), Bytes::copy_from_slice(b)))
                .collect(),
            ..Self::default()
        }
    }

    /// A host with no manifest at all.
    pub fn without_manifest() -> Self {
        Self::default()
    }

    /// List `path` in the manifest without serving it.
    pub fn with_missing_file(mut self, path: &str) -> Self {
        if let Some(manifest) = self.manifest.as_mut() {
            manifest.files.push(path.to_string());
        }
        self
    }

    /// Fail the first `failures` fetches of `path`.
    pub fn with_flaky_file(self, path: &str, failures: usize) -> Self {
        self.flaky
            .lock()
            .unwrap()
            .insert(path.to_string(), failures);
        self
    }

    pub fn with_delay(mut self, delay: Duration) -> Self {
        self.delay = Some(delay);
        self
    }

    pub fn fetches(&self) -> Vec<String> {
        let mut fetches = self.fetches.lock().unwrap().clone();
        fetches.sort();
        fetches
    }

    pub fn manifest_fetches(&self) -> usize {
        self.manifest_fetches.load(Ordering::SeqCst)
    }

    pub fn max_in_flight(&self) -> usize {
        self.max_in_flight.load(Ordering::SeqCst)
    }

    fn not_found(path: &str) -> ClientError {
        ClientError::Status {
            url: format!("fake://{}", path),
            status: StatusCode::NOT_FOUND,
        }
    }
}

#[async_trait]
impl AssetSource for FakeSource {
    async fn fetch_manifest(&self) -> Result<Manifest, ClientError> {
        self.manifest_fetches.fetch_add(1, Ordering::SeqCst);
        self.manifest
            .clone()
            .ok_or_else(|| Self::not_found("index.json"))
    }

    async fn fetch_resource(&self, path: &str) -> Result<Bytes, ClientError> {
        self.fetches.lock().unwrap().push(path.to_string());

        let now = self.in_flight.fetch_add(1, Ordering::SeqCst) + 1;
        self.max_in_flight.fetch_max(now, Ordering::SeqCst);
        if let Some(delay) = self.delay {
            tokio::time::sleep(delay).await;
        }
        self.in_flight.fetch_sub(1, Ordering::SeqCst);

        {
            let mut flaky = self.flaky.lock().unwrap();
            if let Some(remaining) = flaky.get_mut(path) {
                if *remaining > 0 {
                    *remaining -= 1;
                    return Err(Self::not_found(path));
                }
            }
        }

        self.files
            .get(path)
            .cloned()
            .ok_or_else(|| Self::not_found(path))
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Event {
    Declare(String),
    Deliver(String, Bytes),
    Ready,
}

/// Consumer that records every call in order.
#[derive(Default)]
pub struct RecordingConsumer {
    events: Mutex<Vec<Event>>,
}

impl RecordingConsumer {
    pub fn events(&self) -> Vec<Event> {
        self.events.lock().unwrap().clone()
    }

    pub fn declarations(&self) -> Vec<String> {
        self.events()
            .into_iter()
            .filter_map(|e| match e {
                Event::Declare(path) => Some(path),
                _ => None,
            })
            .collect()
    }

    /// Delivered keys, sorted.
    pub fn deliveries(&self) -> Vec<String> {
        let mut keys: Vec<_> = self
            .events()
            .into_iter()
            .filter_map(|e| match e {
                Event::Deliver(key, _) => Some(key),
                _ => None,
            })
            .collect();
        keys.sort();
        keys
    }

    pub fn delivered(&self, key: &str) -> Option<Bytes> {
        self.events().into_iter().find_map(|e| match e {
            Event::Deliver(k, bytes) if k == key => Some(bytes),
            _ => None,
        })
    }

    pub fn ready_count(&self) -> usize {
        self.events()
            .iter()
            .filter(|e| matches!(e, Event::Ready))
            .count()
    }
}

impl ConsumerBridge for RecordingConsumer {
    fn declare_directory(&self, path: &str) {
        self.events
            .lock()
            .unwrap()
            .push(Event::Declare(path.to_string()));
    }

    fn deliver_resource(&self, key: &ResourceKey, bytes: Bytes) {
        self.events
            .lock()
            .unwrap()
            .push(Event::Deliver(key.to_string(), bytes));
    }

    fn signal_ready(&self) {
        self.events.lock().unwrap().push(Event::Ready);
    }
}
