//! Directory listing cache with TTL
//!
//! Keyed by canonical remote path. Entries older than the TTL are never
//! returned; expiry is lazy, evicting on read rather than on a timer.

use std::collections::HashMap;
use std::time::{Duration, Instant};

use tether_core::RemoteFile;

struct CacheEntry {
    files: Vec<RemoteFile>,
    fetched_at: Instant,
}

/// TTL cache of remote directory listings
pub struct DirectoryCache {
    entries: HashMap<String, CacheEntry>,
    ttl: Duration,
}

impl DirectoryCache {
    /// Create a cache whose entries expire after `ttl`
    pub fn new(ttl: Duration) -> Self {
        Self {
            entries: HashMap::new(),
            ttl,
        }
    }

    /// Look up a listing; an expired entry is evicted and reported as a
    /// miss
    pub fn get(&mut self, path: &str) -> Option<&[RemoteFile]> {
        let expired = self
            .entries
            .get(path)
            .is_some_and(|entry| entry.fetched_at.elapsed() >= self.ttl);
        if expired {
            self.entries.remove(path);
            return None;
        }
        self.entries.get(path).map(|entry| entry.files.as_slice())
    }

    /// Store a fresh listing for `path`
    pub fn insert(&mut self, path: String, files: Vec<RemoteFile>) {
        self.entries.insert(
            path,
            CacheEntry {
                files,
                fetched_at: Instant::now(),
            },
        );
    }

    /// Drop the entry for `path`, if any
    pub fn invalidate(&mut self, path: &str) {
        self.entries.remove(path);
    }

    /// Drop all entries
    pub fn clear(&mut self) {
        self.entries.clear();
    }

    /// Number of cached listings (expired entries included until read)
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    /// Whether the cache is empty
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}
