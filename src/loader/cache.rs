//! Cache of loaded config files.
//!
//! Entries hold the raw object a file exported, keyed by absolute path. An
//! entry is served only while the file's modification time and length are
//! unchanged and, when a TTL is set, while it is younger than the TTL.

use serde_json::Value;
use std::collections::HashMap;
use std::path::{Path, PathBuf};
use std::sync::{Mutex, MutexGuard, PoisonError};
use std::time::{Duration, Instant, SystemTime};

/// File identity used to detect edits.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct FileStamp {
    pub modified: SystemTime,
    pub len: u64,
}

impl FileStamp {
    /// Stamp from file metadata, if the platform reports a modification time.
    pub fn from_metadata(meta: &std::fs::Metadata) -> Option<Self> {
        Some(Self {
            modified: meta.modified().ok()?,
            len: meta.len(),
        })
    }
}

#[derive(Debug, Clone)]
struct CacheEntry {
    value: Value,
    stamp: FileStamp,
    loaded_at: Instant,
}

#[derive(Debug, Default)]
pub struct ConfigCache {
    entries: Mutex<HashMap<PathBuf, CacheEntry>>,
    ttl: Option<Duration>,
}

impl ConfigCache {
    pub fn new() -> Self {
        Self::default()
    }

    /// A cache whose entries also expire after `ttl`.
    pub fn with_ttl(ttl: Duration) -> Self {
        Self {
            entries: Mutex::new(HashMap::new()),
            ttl: Some(ttl),
        }
    }

    pub fn ttl(&self) -> Option<Duration> {
        self.ttl
    }

    /// Cached value for `path` if it is still valid for `stamp`. Stale
    /// entries are evicted.
    pub fn get(&self, path: &Path, stamp: FileStamp) -> Option<Value> {
        let key = cache_key(path);
        let mut entries = self.lock();
        let fresh = entries.get(&key).map(|entry| {
            entry.stamp == stamp && self.ttl.is_none_or(|ttl| entry.loaded_at.elapsed() < ttl)
        })?;
        if fresh {
            entries.get(&key).map(|entry| entry.value.clone())
        } else {
            entries.remove(&key);
            None
        }
    }

    pub fn insert(&self, path: &Path, stamp: FileStamp, value: Value) {
        self.lock().insert(
            cache_key(path),
            CacheEntry {
                value,
                stamp,
                loaded_at: Instant::now(),
            },
        );
    }

    /// Drop the entry for `path`. Returns whether one existed.
    pub fn invalidate(&self, path: &Path) -> bool {
        self.lock().remove(&cache_key(path)).is_some()
    }

    pub fn clear(&self) {
        self.lock().clear();
    }

    pub fn len(&self) -> usize {
        self.lock().len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    // Entries are plain data, so a poisoned lock is still usable.
    fn lock(&self) -> MutexGuard<'_, HashMap<PathBuf, CacheEntry>> {
        self.entries.lock().unwrap_or_else(PoisonError::into_inner)
    }
}

fn cache_key(path: &Path) -> PathBuf {
    std::path::absolute(path).unwrap_or_else(|_| path.to_path_buf())
}
