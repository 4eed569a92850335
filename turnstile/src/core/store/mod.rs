//! Concurrent per-key limiter state
//!
//! [`KeyStore`] maps client keys to a [`KeyEntry`] behind a single exclusive
//! lock. Every operation holds the lock only for a map access plus a few
//! arithmetic steps, so a coarse lock is enough.
//!
//! Creation is lazy: the first [`get_or_create`](KeyStore::get_or_create) for
//! an unseen key inserts its entry while still holding the lock, so two
//! concurrent first calls can never both create one.

use super::policy::LimiterState;
use parking_lot::Mutex;
use std::time::{Duration, Instant};

#[cfg(feature = "ahash")]
use ahash::AHashMap as HashMap;
#[cfg(not(feature = "ahash"))]
use std::collections::HashMap;


const DEFAULT_CAPACITY: usize = 1000;
const CAPACITY_OVERHEAD_FACTOR: f64 = 1.3;

/// Limiter state of one key plus the last time it was used
#[derive(Debug, Clone, PartialEq)]
pub struct KeyEntry {
    pub state: LimiterState,
    pub last_used: Instant,
}

/// Point-in-time view of an entry, as seen by the reaper
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct EntrySnapshot {
    pub key: String,
    pub last_used: Instant,
}

/// Map from client key to [`KeyEntry`]
///
/// # Example
///
/// ```
/// use turnstile::{KeyStore, Limiter, LimiterState, TokenBucket};
/// use std::time::Instant;
///
/// let store = KeyStore::new();
/// let now = Instant::now();
/// let fresh = || LimiterState::TokenBucket(TokenBucket::new(1, 0.0, now).unwrap());
///
/// let (allowed, created) = store.get_or_create("10.0.0.1", now, fresh, |entry| {
///     entry.state.consume(now)
/// });
/// assert!(allowed && created);
///
/// let (allowed, created) = store.get_or_create("10.0.0.1", now, fresh, |entry| {
///     entry.state.consume(now)
/// });
/// assert!(!allowed && !created);
/// assert_eq!(store.len(), 1);
/// ```
pub struct KeyStore {
    entries: Mutex<HashMap<String, KeyEntry>>,
}

impl KeyStore {
    /// Largest initial capacity accepted by a controller
    pub const MAX_CAPACITY: usize = 10_000_000;

    /// Create an empty store with room for 1000 keys
    pub fn new() -> Self {
        Self::with_capacity(DEFAULT_CAPACITY)
    }

    /// Create an empty store sized for `capacity` keys
    ///
    /// The map is allocated 30% larger to delay rehashing. Requests above
    /// [`MAX_CAPACITY`](Self::MAX_CAPACITY) are clamped to it; the map still
    /// grows past it on demand.
    pub fn with_capacity(capacity: usize) -> Self {
        let capacity = capacity.min(Self::MAX_CAPACITY);
        KeyStore {
            entries: Mutex::new(HashMap::with_capacity(
                (capacity as f64 * CAPACITY_OVERHEAD_FACTOR) as usize,
            )),
        }
    }

    /// Run `f` on the entry for `key`, creating it first if needed
    ///
    /// `create` is called at most once, and only when the key is absent.
    /// The entry's `last_used` is set to `now` before `f` runs. Returns the
    /// result of `f` and whether the entry was created by this call.
    pub fn get_or_create<R>(
        &self,
        key: &str,
        now: Instant,
        create: impl FnOnce() -> LimiterState,
        f: impl FnOnce(&mut KeyEntry) -> R,
    ) -> (R, bool) {
        let mut entries = self.entries.lock();

        // Existing keys skip the String allocation
        if let Some(entry) = entries.get_mut(key) {
            entry.last_used = now;
            return (f(entry), false);
        }

        let entry = entries.entry(key.to_owned()).or_insert_with(|| KeyEntry {
            state: create(),
            last_used: now,
        });
        (f(entry), true)
    }

    /// Remove `key` unconditionally
    ///
    /// Returns whether an entry was removed.
    pub fn delete(&self, key: &str) -> bool {
        self.entries.lock().remove(key).is_some()
    }

    /// Remove `key` if it has been idle for longer than `ttl` at `now`
    ///
    /// The idle time is re-read under the lock, so an entry used after a
    /// snapshot was taken survives with its state intact.
    pub fn remove_if_idle(&self, key: &str, ttl: Duration, now: Instant) -> bool {
        let mut entries = self.entries.lock();
        match entries.get(key) {
            Some(entry) if now.saturating_duration_since(entry.last_used) > ttl => {
                entries.remove(key);
                true
            }
            _ => false,
        }
    }

    /// Copy every key with its last use time, ordered by key
    ///
    /// The lock is released before sorting, so a sweep over the snapshot
    /// never blocks request handling.
    pub fn snapshot(&self) -> Vec<EntrySnapshot> {
        let mut snapshot: Vec<EntrySnapshot> = {
            let entries = self.entries.lock();
            entries
                .iter()
                .map(|(key, entry)| EntrySnapshot {
                    key: key.clone(),
                    last_used: entry.last_used,
                })
                .collect()
        };
        snapshot.sort_unstable_by(|a, b| a.key.cmp(&b.key));
        snapshot
    }

    /// Copy of the entry for `key`, if present
    pub fn get(&self, key: &str) -> Option<KeyEntry> {
        self.entries.lock().get(key).cloned()
    }

    pub fn contains(&self, key: &str) -> bool {
        self.entries.lock().contains_key(key)
    }

    pub fn len(&self) -> usize {
        self.entries.lock().len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.lock().is_empty()
    }
}

impl Default for KeyStore {
    fn default() -> Self {
        Self::new()
    }
}
