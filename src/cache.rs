//! A mutex-guarded path → (bytes, mime type) cache with LRU eviction.
//!
//! One lock covers both the map and the LRU timestamps, so `get` and `put` are each a single
//! critical section with no lock held across a syscall. Eviction is a linear scan for the oldest
//! `last_access` stamp, which is fine at the default capacity of 1024 entries — an intrusive LRU
//! list would be faster but isn't needed to preserve the observable LRU semantics.

use std::collections::HashMap;
use std::sync::Mutex;
use std::time::Instant;

/// A cached file's bytes and detected MIME type.
#[derive(Debug, Clone)]
pub struct CachedFile {
    /// The file's full contents.
    pub content: Vec<u8>,
    /// The detected MIME type.
    pub mime_type: String,
}

struct Entry {
    content: Vec<u8>,
    mime_type: String,
    last_access: Instant,
}

/// Shared LRU cache, keyed by canonical filesystem path.
pub struct FileCache {
    inner: Mutex<HashMap<String, Entry>>,
    capacity: usize,
}

impl FileCache {
    /// Creates a cache holding up to `capacity` entries. A capacity of 0 is coerced to 1.
    pub fn new(capacity: usize) -> Self {
        FileCache {
            inner: Mutex::new(HashMap::new()),
            capacity: capacity.max(1),
        }
    }

    /// Looks up `path`. On a hit, refreshes its LRU timestamp and returns a clone of its content
    /// and MIME type. On a miss, leaves the map untouched and returns `None`.
    pub fn get(&self, path: &str) -> Option<CachedFile> {
        let mut entries = self.inner.lock().unwrap();
        let entry = entries.get_mut(path)?;
        entry.last_access = Instant::now();
        Some(CachedFile {
            content: entry.content.clone(),
            mime_type: entry.mime_type.clone(),
        })
    }

    /// Inserts or replaces the entry for `path`. If the cache is already at capacity, the entry
    /// with the oldest `last_access` stamp is evicted first. The map never exceeds `capacity`
    /// after this returns.
    pub fn put(&self, path: String, content: Vec<u8>, mime_type: String) {
        let mut entries = self.inner.lock().unwrap();
        if entries.len() >= self.capacity && !entries.contains_key(&path) {
            evict_lru(&mut entries);
        }
        entries.insert(
            path,
            Entry {
                content,
                mime_type,
                last_access: Instant::now(),
            },
        );
    }
}

fn evict_lru(entries: &mut HashMap<String, Entry>) {
    if let Some(oldest_key) = entries
        .iter()
        .min_by_key(|(_, entry)| entry.last_access)
        .map(|(key, _)| key.clone())
    {
        entries.remove(&oldest_key);
    }
}

impl std::fmt::Debug for FileCache {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("FileCache")
            .field("capacity", &self.capacity)
            .field("len", &self.inner.lock().unwrap().len())
            .finish()
    }
}
