//! Load sessions: manifest to ready signal.
//!
//! A session fetches the manifest, declares every directory in manifest
//! order, resolves every file concurrently, and delivers each resolved file
//! to the consumer. The ready signal fires once the join over all resolvers
//! finishes with every file delivered. If any file failed the session ends
//! [`SessionState::Stalled`] and the consumer is never told to start.

use std::fmt;
use std::sync::Arc;
use std::time::{Duration, Instant};

use futures::future::join_all;
use futures::stream::{self, StreamExt};
use tokio::sync::watch;
use tracing::Instrument;
use uuid::Uuid;

use crate::client::{AssetClient, AssetSource};
use crate::config::PreloadConfig;
use crate::consumer::ConsumerBridge;
use crate::db::ResourceStore;
use crate::error::{FileFailure, ManifestError, SessionError};
use crate::models::{Manifest, Progress, ResourceKey, SessionState};
use crate::resolver::{Origin, ResourceResolver};

/// Summary of a session that reached ready.
#[derive(Debug, Clone)]
pub struct SessionReport {
    pub session_id: Uuid,
    pub directories: usize,
    pub delivered: usize,
    pub cache_hits: usize,
    pub cache_misses: usize,
    pub cache_write_failures: usize,
    pub elapsed: Duration,
}

impl fmt::Display for SessionReport {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{} resources in {} directories ({} cached, {} fetched",
            self.delivered, self.directories, self.cache_hits, self.cache_misses
        )?;
        if self.cache_write_failures > 0 {
            write!(f, ", {} not cached", self.cache_write_failures)?;
        }
        write!(f, ") in {:.2?}", self.elapsed)
    }
}

pub struct LoadOrchestrator {
    source: Arc<dyn AssetSource>,
    resolver: ResourceResolver,
    concurrency_limit: Option<usize>,
    progress: watch::Sender<Progress>,
}

impl LoadOrchestrator {
    pub fn new(store: ResourceStore, source: Arc<dyn AssetSource>) -> Self {
        let (progress, _) = watch::channel(Progress::default());
        Self {
            resolver: ResourceResolver::new(store, Arc::clone(&source)),
            source,
            concurrency_limit: None,
            progress,
        }
    }

    /// Open the configured store and build an HTTP-backed orchestrator.
    pub fn from_config(config: &PreloadConfig) -> Result<Self, SessionError> {
        let store = match &config.store_path {
            Some(path) => ResourceStore::open(path),
            None => ResourceStore::open_default(),
        }
        .map_err(SessionError::StoreUnavailable)?;

        let client = AssetClient::from_config(config).map_err(SessionError::ClientSetup)?;

        Ok(Self::new(store, Arc::new(client))
            .with_concurrency_limit(config.concurrency_limit)
            .with_retries(config.fetch_retries))
    }

    /// Bound the number of files resolved at once. `None` starts all of them.
    pub fn with_concurrency_limit(mut self, limit: Option<usize>) -> Self {
        self.concurrency_limit = limit.filter(|&n| n > 0);
        self
    }

    pub fn with_retries(mut self, retries: u32) -> Self {
        self.resolver = self.resolver.with_retries(retries);
        self
    }

    pub fn store(&self) -> &ResourceStore {
        self.resolver.store()
    }

    /// Observe progress of the current and future sessions.
    pub fn subscribe(&self) -> watch::Receiver<Progress> {
        self.progress.subscribe()
    }

    /// Run one session against `consumer`.
    ///
    /// Returns the report once the consumer has been signaled ready. A
    /// manifest failure or any failed file returns an error instead, and the
    /// consumer is never signaled.
    pub async fn run(&self, consumer: &dyn ConsumerBridge) -> Result<SessionReport, SessionError> {
        let session_id = Uuid::new_v4();
        let span = tracing::info_span!("session", id = %session_id);
        self.run_session(session_id, consumer).instrument(span).await
    }

    async fn run_session(
        &self,
        session_id: Uuid,
        consumer: &dyn ConsumerBridge,
    ) -> Result<SessionReport, SessionError> {
        let started = Instant::now();
        self.progress.send_replace(Progress::default());

        self.set_state(SessionState::ManifestPending);
        let manifest = match self.fetch_manifest().await {
            Ok(manifest) => manifest,
            Err(e) => {
                tracing::error!("Manifest unavailable: {}", e);
                self.set_state(SessionState::Failed);
                return Err(e.into());
            }
        };

        for dir in &manifest.directories {
            consumer.declare_directory(ResourceKey::normalize(dir).as_str());
        }
        self.set_state(SessionState::DirectoriesDeclared);

        let total = manifest.total_files();
        self.progress.send_replace(Progress::new(total));
        tracing::info!(
            "Resolving {} files across {} directories",
            total,
            manifest.directories.len()
        );

        let limit = self.concurrency_limit.unwrap_or(total).max(1);
        let mut resolutions = stream::iter(manifest.files.iter())
            .map(|path| self.resolver.resolve(path))
            .buffer_unordered(limit);

        let mut completed = 0;
        let mut cache_hits = 0;
        let mut cache_misses = 0;
        let mut failures = Vec::new();
        let mut cache_writes = Vec::new();

        while let Some(result) = resolutions.next().await {
            match result {
                Ok(resolved) => {
                    consumer.deliver_resource(&resolved.key, resolved.bytes);
                    match resolved.origin {
                        Origin::Cache => cache_hits += 1,
                        Origin::Network => cache_misses += 1,
                    }
                    if let Some(write) = resolved.cache_write {
                        cache_writes.push(write);
                    }
                    completed += 1;
                    self.progress.send_modify(|p| p.completed += 1);
                }
                Err(e) => {
                    tracing::error!("{}", e);
                    failures.push(FileFailure {
                        path: e.path().to_string(),
                        reason: e.to_string(),
                    });
                    self.progress.send_modify(|p| p.failed += 1);
                }
            }
        }

        let ready = completed == total;
        if ready {
            consumer.signal_ready();
            self.set_state(SessionState::Ready);
            tracing::info!("Session ready: {}/{} delivered", completed, total);
        } else {
            self.set_state(SessionState::Stalled);
            tracing::error!(
                "Session stalled at {}/{}: {} file(s) failed",
                completed,
                total,
                failures.len()
            );
        }

        let cache_write_failures = join_all(cache_writes)
            .await
            .into_iter()
            .filter(|write| !matches!(write, Ok(Ok(()))))
            .count();

        if !ready {
            return Err(SessionError::Incomplete {
                completed,
                total,
                failures,
            });
        }

        Ok(SessionReport {
            session_id,
            directories: manifest.directories.len(),
            delivered: completed,
            cache_hits,
            cache_misses,
            cache_write_failures,
            elapsed: started.elapsed(),
        })
    }

    async fn fetch_manifest(&self) -> Result<Manifest, ManifestError> {
        let manifest = self.source.fetch_manifest().await?;
        manifest.check_keys()?;
        Ok(manifest)
    }

    fn set_state(&self, state: SessionState) {
        self.progress.send_modify(|p| p.state = state);
    }
}
