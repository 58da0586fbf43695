//! Error types for the load pipeline.
//!
//! Store and per-file errors are contained by the resolver. Manifest and
//! store-open errors end the session. A session that finishes with failed
//! files reports [`SessionError::Incomplete`] instead of signaling ready.

use reqwest::StatusCode;
use thiserror::Error;

use crate::models::KeyCollision;

/// Persistent store errors.
#[derive(Debug, Error)]
pub enum StoreError {
    #[error("persistent store unavailable at {path}: {reason}")]
    Unavailable { path: String, reason: String },

    #[error("failed to read '{key}' from store: {source}")]
    Read {
        key: String,
        #[source]
        source: rusqlite::Error,
    },

    #[error("failed to write '{key}' to store: {source}")]
    Write {
        key: String,
        #[source]
        source: rusqlite::Error,
    },

    #[error("store query failed: {0}")]
    Query(#[from] rusqlite::Error),

    #[error("store task failed: {0}")]
    Task(#[from] tokio::task::JoinError),
}

/// HTTP errors talking to the asset host.
#[derive(Debug, Error)]
pub enum ClientError {
    #[error("HTTP request failed: {0}")]
    Http(#[from] reqwest::Error),

    #[error("invalid asset root {url}: {reason}")]
    InvalidUrl { url: String, reason: String },

    #[error("{url} returned {status}")]
    Status { url: String, status: StatusCode },

    #[error("malformed manifest at {url}: {source}")]
    Malformed {
        url: String,
        #[source]
        source: serde_json::Error,
    },
}

/// The manifest could not be obtained or is unusable.
#[derive(Debug, Error)]
pub enum ManifestError {
    #[error(transparent)]
    Client(#[from] ClientError),

    #[error("manifest key collision: {0}")]
    Collision(#[from] KeyCollision),
}

/// A single file could not be resolved.
#[derive(Debug, Error)]
pub enum ResolveError {
    #[error("failed to fetch '{path}': {source}")]
    FetchFailed {
        path: String,
        #[source]
        source: ClientError,
    },
}

impl ResolveError {
    pub fn path(&self) -> &str {
        match self {
            Self::FetchFailed { path, .. } => path,
        }
    }
}

/// A file that never reached the consumer.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FileFailure {
    pub path: String,
    pub reason: String,
}

/// Session-level outcomes that prevent the ready signal.
#[derive(Debug, Error)]
pub enum SessionError {
    #[error("store unavailable: {0}")]
    StoreUnavailable(#[source] StoreError),

    #[error("HTTP client setup failed: {0}")]
    ClientSetup(#[source] ClientError),

    #[error("manifest unavailable: {0}")]
    ManifestUnavailable(#[from] ManifestError),

    #[error("session stalled at {completed}/{total}: {} file(s) failed", .failures.len())]
    Incomplete {
        completed: usize,
        total: usize,
        failures: Vec<FileFailure>,
    },
}
