//! Secret cache keyed by path.
//!
//! Records are immutable and shared as `Arc<SecretRecord>`. A refresh builds
//! a complete new record and swaps the `Arc` in under a short write lock, so
//! readers see either the whole old record or the whole new one.

use chrono::{DateTime, Utc};
use parking_lot::RwLock;
use std::{
    collections::{BTreeMap, HashMap},
    sync::Arc,
};

use crate::gateway::VersionedSecret;

/// Most recently fetched data of one secret path.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SecretRecord {
    /// Secret path relative to the KV mount
    pub path: String,
    /// Key/value pairs
    pub data: BTreeMap<String, String>,
    /// Version marker, when reported
    pub version: Option<u64>,
    /// When the read completed
    pub fetched_at: DateTime<Utc>,
}

impl SecretRecord {
    /// Build a record from a gateway read of `path`.
    #[must_use]
    pub fn from_read(path: impl Into<String>, secret: VersionedSecret) -> Self {
        Self {
            path: path.into(),
            data: secret.data,
            version: secret.version,
            fetched_at: Utc::now(),
        }
    }

    /// Value of one key.
    #[must_use]
    pub fn get(&self, key: &str) -> Option<&str> {
        self.data.get(key).map(String::as_str)
    }
}

/// Point-in-time copy of the cache.
pub type CacheSnapshot = BTreeMap<String, Arc<SecretRecord>>;

/// Concurrent map from path to [`SecretRecord`].
///
/// Entries are never evicted; one stays until the next successful refresh of
/// its path replaces it.
#[derive(Debug, Default)]
pub struct SecretCache {
    entries: RwLock<HashMap<String, Arc<SecretRecord>>>,
}

impl SecretCache {
    /// Create an empty cache.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Replace the entry for `record.path`, returning the previous one.
    pub fn replace(&self, record: SecretRecord) -> Option<Arc<SecretRecord>> {
        let record = Arc::new(record);
        self.entries.write().insert(record.path.clone(), record)
    }

    /// Current record for `path`.
    #[must_use]
    pub fn get(&self, path: &str) -> Option<Arc<SecretRecord>> {
        self.entries.read().get(path).cloned()
    }

    /// Copy of every entry, ordered by path.
    #[must_use]
    pub fn snapshot(&self) -> CacheSnapshot {
        self.entries
            .read()
            .iter()
            .map(|(path, record)| (path.clone(), Arc::clone(record)))
            .collect()
    }

    /// Cached paths, sorted.
    #[must_use]
    pub fn paths(&self) -> Vec<String> {
        let mut paths: Vec<String> = self.entries.read().keys().cloned().collect();
        paths.sort();
        paths
    }

    /// Number of cached paths.
    #[must_use]
    pub fn len(&self) -> usize {
        self.entries.read().len()
    }

    /// Whether nothing has been cached yet.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.entries.read().is_empty()
    }
}
