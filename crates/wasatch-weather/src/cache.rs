//! In-memory TTL cache for weather snapshots.
//!
//! One instance is created at startup and shared by every caller. Each key
//! owns an async mutex held for the duration of a fetch, so concurrent
//! callers for the same key wait for the in-flight fetch and share its
//! outcome instead of hitting the upstream API again. Failed fetches are
//! never stored; the previous entry is served with `stale: true` instead.

use std::collections::HashMap;
use std::fmt::Display;
use std::future::Future;
use std::hash::Hash;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::time::Duration;

use chrono::{DateTime, Utc};
use parking_lot::Mutex;
use tokio::time::Instant;

use crate::error::CacheMiss;

/// How long a snapshot is served without refetching (15 minutes).
pub const DEFAULT_TTL: Duration = Duration::from_secs(15 * 60);

/// A cached value handed back to callers.
#[derive(Debug, Clone, PartialEq)]
pub struct Fetched<V> {
    pub value: V,
    /// Wall-clock time of the successful fetch that produced `value`
    pub fetched_at: DateTime<Utc>,
    /// True when a refresh was due but failed, or the entry is past its TTL
    pub stale: bool,
}

#[derive(Debug, Clone)]
struct CacheEntry<V> {
    value: V,
    fetched_at: DateTime<Utc>,
    stored_at: Instant,
}

impl<V: Clone> CacheEntry<V> {
    fn new(value: V) -> Self {
        Self {
            value,
            fetched_at: Utc::now(),
            stored_at: Instant::now(),
        }
    }

    fn is_live(&self, ttl: Duration) -> bool {
        self.stored_at.elapsed() < ttl
    }

    fn to_fetched(&self, stale: bool) -> Fetched<V> {
        Fetched {
            value: self.value.clone(),
            fetched_at: self.fetched_at,
            stale,
        }
    }
}

/// Result of the most recent fetch for a key.
#[derive(Debug, Clone)]
enum Outcome<E> {
    Stored,
    Failed(E),
}

struct SlotState<V, E> {
    entry: Option<CacheEntry<V>>,
    last_outcome: Option<Outcome<E>>,
}

struct Slot<V, E> {
    /// Bumped every time a fetch completes; lets a waiter tell whether a
    /// fetch finished while it was queued on `state`.
    completed: AtomicU64,
    state: tokio::sync::Mutex<SlotState<V, E>>,
}

impl<V, E> Slot<V, E> {
    fn new() -> Self {
        Self {
            completed: AtomicU64::new(0),
            state: tokio::sync::Mutex::new(SlotState {
                entry: None,
                last_outcome: None,
            }),
        }
    }
}

/// TTL cache with stale fallback and per-key fetch coalescing.
pub struct TtlCache<K, V, E> {
    default_ttl: Duration,
    slots: Mutex<HashMap<K, Arc<Slot<V, E>>>>,
}

impl<K, V, E> Default for TtlCache<K, V, E>
where
    K: Eq + Hash + Clone + Display,
    V: Clone,
    E: Clone + Display,
{
    fn default() -> Self {
        Self::new(DEFAULT_TTL)
    }
}

impl<K, V, E> TtlCache<K, V, E>
where
    K: Eq + Hash + Clone + Display,
    V: Clone,
    E: Clone + Display,
{
    pub fn new(default_ttl: Duration) -> Self {
        Self {
            default_ttl,
            slots: Mutex::new(HashMap::new()),
        }
    }

    pub fn default_ttl(&self) -> Duration {
        self.default_ttl
    }

    fn slot(&self, key: &K) -> Arc<Slot<V, E>> {
        let mut slots = self.slots.lock();
        slots
            .entry(key.clone())
            .or_insert_with(|| Arc::new(Slot::new()))
            .clone()
    }

    /// Return the live entry for `key`, or run `fetch` and cache its result.
    ///
    /// On fetch failure the previous entry (if any) is returned with
    /// `stale: true`; without one the error is returned.
    pub async fn get_or_fetch<F, Fut>(&self, key: &K, ttl: Duration, fetch: F) -> Result<Fetched<V>, E>
    where
        F: FnOnce() -> Fut,
        Fut: Future<Output = Result<V, E>>,
    {
        let slot = self.slot(key);
        let seen = slot.completed.load(Ordering::Acquire);
        let mut state = slot.state.lock().await;

        if slot.completed.load(Ordering::Acquire) != seen {
            match (&state.last_outcome, &state.entry) {
                (Some(Outcome::Stored), Some(entry)) => {
                    tracing::debug!("Joined in-flight fetch for {}", key);
                    return Ok(entry.to_fetched(false));
                }
                (Some(Outcome::Failed(_)), Some(entry)) => {
                    tracing::debug!("Joined failed fetch for {}, serving stale entry", key);
                    return Ok(entry.to_fetched(true));
                }
                (Some(Outcome::Failed(err)), None) => return Err(err.clone()),
                _ => {}
            }
        }

        if let Some(entry) = state.entry.as_ref().filter(|e| e.is_live(ttl)) {
            tracing::debug!("Cache hit for {}", key);
            return Ok(entry.to_fetched(false));
        }

        let result = fetch().await;
        slot.completed.fetch_add(1, Ordering::Release);

        match result {
            Ok(value) => {
                let entry = CacheEntry::new(value);
                let fetched = entry.to_fetched(false);
                state.entry = Some(entry);
                state.last_outcome = Some(Outcome::Stored);
                Ok(fetched)
            }
            Err(err) => {
                state.last_outcome = Some(Outcome::Failed(err.clone()));
                match &state.entry {
                    Some(entry) => {
                        tracing::warn!(
                            "Refresh for {} failed ({}), serving data from {}",
                            key,
                            err,
                            entry.fetched_at
                        );
                        Ok(entry.to_fetched(true))
                    }
                    None => Err(err),
                }
            }
        }
    }

    /// Return whatever is cached for `key`, however old. `stale` is set
    /// when the entry is past the default TTL.
    ///
    /// Waits for an in-flight fetch of the same key to finish.
    pub async fn get_stale(&self, key: &K) -> Result<Fetched<V>, CacheMiss> {
        let slot = self.slots.lock().get(key).cloned();
        let Some(slot) = slot else {
            return Err(CacheMiss(key.to_string()));
        };

        let state = slot.state.lock().await;
        state
            .entry
            .as_ref()
            .map(|entry| entry.to_fetched(!entry.is_live(self.default_ttl)))
            .ok_or_else(|| CacheMiss(key.to_string()))
    }

    /// Store `value` as freshly fetched.
    pub async fn insert(&self, key: &K, value: V) {
        let slot = self.slot(key);
        let mut state = slot.state.lock().await;
        state.entry = Some(CacheEntry::new(value));
        state.last_outcome = Some(Outcome::Stored);
    }

    /// Drop the entry for `key`; the next lookup fetches.
    pub fn invalidate(&self, key: &K) {
        self.slots.lock().remove(key);
    }

    pub fn clear(&self) {
        self.slots.lock().clear();
    }

    /// Number of keys holding a value.
    pub async fn len(&self) -> usize {
        let slots: Vec<_> = self.slots.lock().values().cloned().collect();
        let mut count = 0;
        for slot in slots {
            if slot.state.lock().await.entry.is_some() {
                count += 1;
            }
        }
        count
    }

    pub async fn is_empty(&self) -> bool {
        self.len().await == 0
    }
}
