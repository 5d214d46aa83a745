//! In-memory store (default, thread-safe, async).
//!
//! Uses DashMap for lock-free concurrent access with per-key sharding.
//! Expired entries are dropped lazily on access.

use super::Store;
use crate::error::Result;
use crate::shape::Value;
use dashmap::DashMap;
use std::sync::Arc;
use std::time::{Duration, Instant};

/// In-memory entry with its expiry deadline.
///
/// `None` means the TTL lies beyond what `Instant` can represent; such
/// entries never expire.
struct StoreEntry {
    value: Value,
    expires_at: Option<Instant>,
}

impl StoreEntry {
    fn new(value: Value, ttl: Duration) -> Self {
        StoreEntry {
            value,
            expires_at: Instant::now().checked_add(ttl),
        }
    }

    fn is_expired(&self) -> bool {
        self.expires_at.is_some_and(|exp| Instant::now() >= exp)
    }
}

/// Thread-safe in-memory store.
///
/// Keeps values in their original shape, so a produced record comes back as
/// the same record. Clones share the same map.
///
/// # Example
///
/// ```no_run
/// use readthrough::shape::Value;
/// use readthrough::store::{InMemoryStore, Store};
/// use std::time::Duration;
///
/// #[tokio::main]
/// async fn main() -> Result<(), Box<dyn std::error::Error>> {
///     let store = InMemoryStore::new();
///
///     store.set("key1", Value::from("value"), Duration::from_secs(300)).await?;
///
///     let value = store.get("key1").await?;
///     assert_eq!(value, Some(Value::from("value")));
///
///     Ok(())
/// }
/// ```
#[derive(Clone)]
pub struct InMemoryStore {
    entries: Arc<DashMap<String, StoreEntry>>,
}

impl InMemoryStore {
    pub fn new() -> Self {
        InMemoryStore {
            entries: Arc::new(DashMap::new()),
        }
    }

    /// Number of entries, including expired ones not yet dropped.
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Remaining lifetime of a live entry; `Duration::MAX` if it never
    /// expires.
    pub fn ttl(&self, key: &str) -> Option<Duration> {
        self.entries
            .get(key)
            .filter(|entry| !entry.is_expired())
            .map(|entry| match entry.expires_at {
                Some(exp) => exp.saturating_duration_since(Instant::now()),
                None => Duration::MAX,
            })
    }

    /// Drop every entry.
    pub fn clear(&self) {
        self.entries.clear();
        warn!("⚠ InMemory CLEAR executed - all entries dropped!");
    }
}

impl Default for InMemoryStore {
    fn default() -> Self {
        Self::new()
    }
}

impl Store for InMemoryStore {
    async fn get(&self, key: &str) -> Result<Option<Value>> {
        if let Some(entry) = self.entries.get(key) {
            if !entry.is_expired() {
                trace!("✓ InMemory GET {} -> HIT", key);
                return Ok(Some(entry.value.clone()));
            }
        }

        // Only drop the entry if it is still expired; a concurrent set may
        // have replaced it.
        self.entries.remove_if(key, |_, entry| entry.is_expired());
        trace!("✓ InMemory GET {} -> MISS", key);
        Ok(None)
    }

    async fn set(&self, key: &str, value: Value, ttl: Duration) -> Result<()> {
        self.entries
            .insert(key.to_string(), StoreEntry::new(value, ttl));
        trace!("✓ InMemory SET {} (TTL: {:?})", key, ttl);
        Ok(())
    }

    async fn delete(&self, key: &str) -> Result<()> {
        self.entries.remove(key);
        trace!("✓ InMemory DELETE {}", key);
        Ok(())
    }

    async fn exists(&self, key: &str) -> Result<bool> {
        Ok(self
            .entries
            .get(key)
            .is_some_and(|entry| !entry.is_expired()))
    }
}
