//! Registries for transfers waiting on a user decision.
//!
//! A session is created when the bot offers choices and consumed exactly once
//! when the user picks one. [`SessionStore::take`] is the only way out, so a
//! double-clicked button can never start two transfers.

use std::collections::HashMap;
use std::hash::Hash;
use std::sync::{Mutex, MutexGuard, PoisonError};
use std::time::{Duration, Instant};

use tracing::debug;

/// Errors produced by session stores.
#[derive(Debug, thiserror::Error)]
pub enum SessionError {
    #[error("session key already in use")]
    KeyInUse,
}

/// Keyed storage with atomic remove-and-return.
pub trait SessionStore<K, V>: Send + Sync {
    /// Inserts `value`; fails if `key` is already present.
    fn put(&self, key: K, value: V) -> Result<(), SessionError>;

    /// Inserts `value` unconditionally and returns what it displaced.
    fn replace(&self, key: K, value: V) -> Option<V>;

    /// Removes and returns the entry. Concurrent callers on the same key
    /// get `Some` at most once.
    fn take(&self, key: &K) -> Option<V>;

    /// Returns `true` if `key` is present.
    fn peek(&self, key: &K) -> bool;

    /// Number of live entries.
    fn len(&self) -> usize;

    fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Drops expired entries and returns how many were removed.
    fn evict_expired(&self) -> usize;
}

struct Entry<V> {
    value: V,
    inserted_at: Instant,
}

/// [`SessionStore`] backed by a mutex-guarded `HashMap`.
///
/// Entries live until taken unless a TTL is configured with
/// [`with_ttl`](Self::with_ttl).
pub struct InMemoryStore<K, V> {
    entries: Mutex<HashMap<K, Entry<V>>>,
    ttl: Option<Duration>,
}

impl<K, V> InMemoryStore<K, V> {
    pub fn new() -> Self {
        Self {
            entries: Mutex::new(HashMap::new()),
            ttl: None,
        }
    }

    /// Store whose entries become evictable after `ttl`.
    pub fn with_ttl(ttl: Duration) -> Self {
        Self {
            entries: Mutex::new(HashMap::new()),
            ttl: Some(ttl),
        }
    }

    // A panic while holding the lock leaves the map consistent; keep going.
    fn lock(&self) -> MutexGuard<'_, HashMap<K, Entry<V>>> {
        self.entries.lock().unwrap_or_else(PoisonError::into_inner)
    }
}

impl<K, V> Default for InMemoryStore<K, V> {
    fn default() -> Self {
        Self::new()
    }
}

impl<K, V> SessionStore<K, V> for InMemoryStore<K, V>
where
    K: Eq + Hash + Send,
    V: Send,
{
    fn put(&self, key: K, value: V) -> Result<(), SessionError> {
        let mut entries = self.lock();
        if entries.contains_key(&key) {
            return Err(SessionError::KeyInUse);
        }
        entries.insert(
            key,
            Entry {
                value,
                inserted_at: Instant::now(),
            },
        );
        Ok(())
    }

    fn replace(&self, key: K, value: V) -> Option<V> {
        let entry = Entry {
            value,
            inserted_at: Instant::now(),
        };
        self.lock().insert(key, entry).map(|previous| previous.value)
    }

    fn take(&self, key: &K) -> Option<V> {
        self.lock().remove(key).map(|entry| entry.value)
    }

    fn peek(&self, key: &K) -> bool {
        self.lock().contains_key(key)
    }

    fn len(&self) -> usize {
        self.lock().len()
    }

    fn evict_expired(&self) -> usize {
        let Some(ttl) = self.ttl else {
            return 0;
        };

        let mut entries = self.lock();
        let before = entries.len();
        entries.retain(|_, entry| entry.inserted_at.elapsed() < ttl);
        let evicted = before - entries.len();

        if evicted > 0 {
            debug!(evicted, remaining = entries.len(), "expired sessions evicted");
        }
        evicted
    }
}
