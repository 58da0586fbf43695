use bytes::Bytes;
use chrono::{DateTime, Utc};

use super::ResourceKey;

/// A cached resource as persisted in the store.
///
/// Records are written on a cache miss right after a successful fetch. The
/// pipeline never updates or deletes them afterwards.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CacheRecord {
    pub key: ResourceKey,
    pub bytes: Bytes,
    pub cached_at: DateTime<Utc>,
}

impl CacheRecord {
    pub fn len(&self) -> usize {
        self.bytes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.bytes.is_empty()
    }
}
