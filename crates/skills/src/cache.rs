//! Time-boxed key/value store shared by every resolver task.
//!
//! Entries expire lazily: a lookup past the timeout deletes the entry and
//! reports a miss. Nothing sweeps the map in the background.

use std::{
    collections::HashMap,
    sync::Mutex,
    time::{Duration, Instant},
};

use tracing::trace;

/// A cached value with its creation time.
#[derive(Debug, Clone)]
pub struct CacheEntry<V> {
    pub value: V,
    pub timestamp: Instant,
    /// Reserved for conditional requests; never validated.
    pub etag: Option<String>,
}

/// Generic cache keyed by logical resource name.
///
/// The timeout is supplied per lookup so a config change applies on the
/// next read without rebuilding the cache.
#[derive(Debug)]
pub struct TimedCache<V> {
    entries: Mutex<HashMap<String, CacheEntry<V>>>,
}

impl<V: Clone> TimedCache<V> {
    pub fn new() -> Self {
        Self {
            entries: Mutex::new(HashMap::new()),
        }
    }

    /// Return the value for `key` unless it is older than `timeout`.
    pub fn get(&self, key: &str, timeout: Duration) -> Option<V> {
        self.get_at(key, timeout, Instant::now())
    }

    fn get_at(&self, key: &str, timeout: Duration, now: Instant) -> Option<V> {
        let mut entries = self.entries.lock().ok()?;
        let entry = entries.get(key)?;
        if now.saturating_duration_since(entry.timestamp) > timeout {
            trace!(key, "cache entry expired");
            entries.remove(key);
            return None;
        }
        Some(entry.value.clone())
    }

    /// Insert or overwrite `key`.
    pub fn set(&self, key: impl Into<String>, value: V) {
        self.insert(key.into(), value, None, Instant::now());
    }

    pub fn set_with_etag(&self, key: impl Into<String>, value: V, etag: Option<String>) {
        self.insert(key.into(), value, etag, Instant::now());
    }

    fn insert(&self, key: String, value: V, etag: Option<String>, timestamp: Instant) {
        if let Ok(mut entries) = self.entries.lock() {
            entries.insert(key, CacheEntry {
                value,
                timestamp,
                etag,
            });
        }
    }

    /// Stored etag for `key`, regardless of age.
    pub fn etag(&self, key: &str) -> Option<String> {
        self.entries.lock().ok()?.get(key)?.etag.clone()
    }

    pub fn clear(&self) {
        if let Ok(mut entries) = self.entries.lock() {
            entries.clear();
        }
    }

    /// Number of stored entries, expired ones included until they are read.
    pub fn len(&self) -> usize {
        self.entries.lock().map(|e| e.len()).unwrap_or_default()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

impl<V: Clone> Default for TimedCache<V> {
    fn default() -> Self {
        Self::new()
    }
}
