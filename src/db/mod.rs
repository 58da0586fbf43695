//! Durable key -> bytes storage for resolved resources.
//!
//! The store is a single SQLite table keyed by [`ResourceKey`]. One handle is
//! opened at process start and cloned into every component that needs it;
//! clones share the same connection. SQLite work runs on the blocking pool so
//! callers on the async runtime only ever suspend.

mod schema;

use std::path::{Path, PathBuf};
use std::sync::{Arc, Mutex};

use bytes::Bytes;
use chrono::Utc;
use rusqlite::{Connection, OptionalExtension};

use crate::error::StoreError;
use crate::models::{CacheRecord, ResourceKey};

/// Application name used for the default data directory.
const APP_NAME: &str = "asset-preloader";

/// Well-known store file name inside the data directory.
pub const STORE_FILE: &str = "resources.db";

#[derive(Clone)]
pub struct ResourceStore {
    conn: Arc<Mutex<Connection>>,
    location: Arc<str>,
}

impl ResourceStore {
    /// Open (creating on first use) the store at `path`.
    pub fn open(path: impl Into<PathBuf>) -> Result<Self, StoreError> {
        let path = path.into();
        let location = path.display().to_string();
        Self::try_open(&path).map_err(|e| StoreError::Unavailable {
            path: location.clone(),
            reason: format!("{:#}", e),
        })
    }

    fn try_open(path: &Path) -> anyhow::Result<Self> {
        if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
            std::fs::create_dir_all(parent)?;
        }
        let conn = Connection::open(path)?;
        conn.pragma_update(None, "journal_mode", "WAL")?;
        schema::run_migrations(&conn)?;
        tracing::debug!("Opened resource store at {}", path.display());
        Ok(Self {
            conn: Arc::new(Mutex::new(conn)),
            location: path.display().to_string().into(),
        })
    }

    /// Open the store in the platform data directory.
    pub fn open_default() -> Result<Self, StoreError> {
        Self::open(Self::default_path()?)
    }

    pub fn default_path() -> Result<PathBuf, StoreError> {
        let dirs = directories::ProjectDirs::from("", "", APP_NAME).ok_or_else(|| {
            StoreError::Unavailable {
                path: STORE_FILE.to_string(),
                reason: "could not determine data directory".to_string(),
            }
        })?;
        Ok(dirs.data_dir().join(STORE_FILE))
    }

    /// A throwaway store, used by tests and `--no-cache` runs.
    pub fn open_memory() -> Result<Self, StoreError> {
        let conn = Connection::open_in_memory().map_err(|e| StoreError::Unavailable {
            path: ":memory:".to_string(),
            reason: e.to_string(),
        })?;
        schema::run_migrations(&conn).map_err(|e| StoreError::Unavailable {
            path: ":memory:".to_string(),
            reason: format!("{:#}", e),
        })?;
        Ok(Self {
            conn: Arc::new(Mutex::new(conn)),
            location: Arc::from(":memory:"),
        })
    }

    pub fn location(&self) -> &str {
        &self.location
    }

    async fn with_conn<T, F>(&self, f: F) -> Result<T, StoreError>
    where
        T: Send + 'static,
        F: FnOnce(&Connection) -> Result<T, StoreError> + Send + 'static,
    {
        let conn = Arc::clone(&self.conn);
        tokio::task::spawn_blocking(move || {
            let conn = conn.lock().expect("store lock poisoned");
            f(&conn)
        })
        .await?
    }

    // ============================================================
    // Resource operations
    // ============================================================

    /// Look up the bytes cached under `key`.
    ///
    /// A missing key is `Ok(None)`; only genuine I/O failures are errors.
    pub async fn get(&self, key: &ResourceKey) -> Result<Option<Bytes>, StoreError> {
        let key = key.clone();
        self.with_conn(move |conn| {
            let found = conn
                .query_row(
                    "SELECT bytes FROM resources WHERE key = ?",
                    [key.as_str()],
                    |row| row.get::<_, Vec<u8>>(0),
                )
                .optional();
            match found {
                Ok(bytes) => Ok(bytes.map(Bytes::from)),
                Err(source) => Err(StoreError::Read {
                    key: key.into_string(),
                    source,
                }),
            }
        })
        .await
    }

    /// Insert or overwrite the record for `key`.
    pub async fn put(&self, key: &ResourceKey, bytes: Bytes) -> Result<(), StoreError> {
        let key = key.clone();
        self.with_conn(move |conn| {
            let now = Utc::now().to_rfc3339();
            let written = conn.execute(
                "INSERT INTO resources (key, bytes, cached_at) VALUES (?, ?, ?)
                 ON CONFLICT(key) DO UPDATE SET bytes = excluded.bytes, cached_at = excluded.cached_at",
                (key.as_str(), bytes.as_ref(), &now),
            );
            match written {
                Ok(_) => Ok(()),
                Err(source) => Err(StoreError::Write {
                    key: key.into_string(),
                    source,
                }),
            }
        })
        .await
    }

    /// Fetch the full record, including when it was cached.
    pub async fn get_record(&self, key: &ResourceKey) -> Result<Option<CacheRecord>, StoreError> {
        let key = key.clone();
        self.with_conn(move |conn| {
            let row = conn
                .query_row(
                    "SELECT bytes, cached_at FROM resources WHERE key = ?",
                    [key.as_str()],
                    |row| Ok((row.get::<_, Vec<u8>>(0)?, row.get::<_, String>(1)?)),
                )
                .optional()?;
            Ok(row.map(|(bytes, cached_at)| CacheRecord {
                key,
                bytes: Bytes::from(bytes),
                cached_at: parse_datetime(cached_at),
            }))
        })
        .await
    }

    pub async fn contains(&self, key: &ResourceKey) -> Result<bool, StoreError> {
        let key = key.clone();
        self.with_conn(move |conn| {
            let count: i64 = conn.query_row(
                "SELECT COUNT(*) FROM resources WHERE key = ?",
                [key.as_str()],
                |row| row.get(0),
            )?;
            Ok(count > 0)
        })
        .await
    }

    /// Number of cached records.
    pub async fn len(&self) -> Result<usize, StoreError> {
        self.with_conn(|conn| {
            let count: i64 =
                conn.query_row("SELECT COUNT(*) FROM resources", [], |row| row.get(0))?;
            Ok(count as usize)
        })
        .await
    }

    pub async fn is_empty(&self) -> Result<bool, StoreError> {
        Ok(self.len().await? == 0)
    }

    /// All cached keys, ordered.
    pub async fn keys(&self) -> Result<Vec<ResourceKey>, StoreError> {
        self.with_conn(|conn| {
            let mut stmt = conn.prepare("SELECT key FROM resources ORDER BY key")?;
            let keys = stmt
                .query_map([], |row| row.get::<_, String>(0))?
                .map(|key| key.map(|k| ResourceKey::normalize(&k)))
                .collect::<Result<Vec<_>, _>>()?;
            Ok(keys)
        })
        .await
    }

    /// Sum of all cached payload sizes in bytes.
    pub async fn total_bytes(&self) -> Result<u64, StoreError> {
        self.with_conn(|conn| {
            let total: i64 = conn.query_row(
                "SELECT COALESCE(SUM(LENGTH(bytes)), 0) FROM resources",
                [],
                |row| row.get(0),
            )?;
            Ok(total as u64)
        })
        .await
    }
}

impl std::fmt::Debug for ResourceStore {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ResourceStore")
            .field("location", &self.location)
            .finish()
    }
}

fn parse_datetime(s: String) -> chrono::DateTime<Utc> {
    chrono::DateTime::parse_from_rfc3339(&s)
        .map(|dt| dt.with_timezone(&Utc))
        .unwrap_or_else(|_| Utc::now())
}
