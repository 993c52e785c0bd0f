//! Bounded path -> last-known-content cache.
//!
//! The attribution engine diffs on-disk changes against this cache instead of
//! re-reading the workspace on every notification. Capacity is hard-capped
//! with least-recently-used eviction; an evicted file simply degrades to
//! full-diff classification the next time it changes.

use std::num::NonZeroUsize;
use std::path::{Path, PathBuf};

use lru::LruCache;

/// LRU cache of file contents keyed by absolute path.
#[derive(Debug)]
pub struct ContentCache {
    entries: LruCache<PathBuf, String>,
}

impl ContentCache {
    /// Create a cache holding at most `capacity` entries.
    pub fn new(capacity: usize) -> Self {
        let capacity = NonZeroUsize::new(capacity).unwrap_or(NonZeroUsize::MIN);
        Self {
            entries: LruCache::new(capacity),
        }
    }

    /// Look up a file's last known content, refreshing its recency.
    pub fn get(&mut self, path: &Path) -> Option<&String> {
        self.entries.get(path)
    }

    /// Whether the cache knows this path, without touching recency.
    pub fn contains(&self, path: &Path) -> bool {
        self.entries.contains(path)
    }

    /// Store a file's content, evicting the least recently used entry on
    /// overflow.
    pub fn insert(&mut self, path: PathBuf, content: String) {
        self.entries.put(path, content);
    }

    /// Store content only if the path is not already cached. Used by the
    /// warm-up task so it never clobbers fresher change-driven entries.
    pub fn insert_if_absent(&mut self, path: PathBuf, content: String) {
        if !self.entries.contains(&path) {
            self.entries.put(path, content);
        }
    }

    /// Remove a deleted file's entry, returning its last known content.
    pub fn remove(&mut self, path: &Path) -> Option<String> {
        self.entries.pop(path)
    }

    /// Drop every entry (session reset).
    pub fn clear(&mut self) {
        self.entries.clear();
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}
