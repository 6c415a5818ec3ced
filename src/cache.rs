//! Memoisation of async computations.
//!
//! [`FutureCache`] stores the value of an async computation per key. While a
//! computation for a key is still in flight, further callers for the same key
//! await that computation instead of starting another one. Computations are
//! spawned eagerly, so they finish and populate the cache even if every
//! caller stops waiting.
//!
//! # Eviction
//!
//! With a maximum size, completed entries are kept in insertion order and
//! the oldest ones are evicted first once the bound is exceeded. In-flight
//! computations never count against the bound and are never evicted.
//!
//! # Failures
//!
//! A failed computation is not cached: every caller waiting on it receives
//! the failure, and the next call for that key computes again.
//!
//! # Examples
//!
//! ```
//! use async_toolbox::cache::FutureCache;
//!
//! # tokio::runtime::Runtime::new().unwrap().block_on(async {
//! let cache = FutureCache::with_max_size(2);
//!
//! let v = cache.get_or_compute("answer", || async { Ok(42) }).await.unwrap();
//! assert_eq!(v, 42);
//!
//! // Cached: the closure is not called again.
//! let v = cache
//!     .get_or_compute("answer", || async { Err(anyhow::anyhow!("not called")) })
//!     .await
//!     .unwrap();
//! assert_eq!(v, 42);
//! # });
//! ```

use std::fmt;
use std::future::Future;
use std::hash::Hash;
use std::panic::AssertUnwindSafe;
use std::sync::Arc;

use futures::future::{BoxFuture, FutureExt, Shared};
use indexmap::IndexMap;
use parking_lot::Mutex;

use crate::config::CacheConfig;
use crate::error::{Result, TaskError};

/// Outcome of an in-flight computation, shareable between waiters.
type Pending<V> = Shared<BoxFuture<'static, std::result::Result<V, ComputeFailure>>>;

#[derive(Clone)]
enum ComputeFailure {
    Failed(Arc<anyhow::Error>),
    Panicked(String),
    Cancelled,
}

impl From<TaskError> for ComputeFailure {
    fn from(err: TaskError) -> Self {
        match err {
            TaskError::Panicked(msg) => Self::Panicked(msg),
            _ => Self::Cancelled,
        }
    }
}

impl From<ComputeFailure> for TaskError {
    fn from(failure: ComputeFailure) -> Self {
        match failure {
            ComputeFailure::Failed(err) => Self::Shared(err),
            ComputeFailure::Panicked(msg) => Self::Panicked(msg),
            ComputeFailure::Cancelled => Self::Cancelled,
        }
    }
}

enum Slot<V> {
    Pending { id: u64, future: Pending<V> },
    Ready(V),
}

struct Inner<K, V> {
    entries: IndexMap<K, Slot<V>>,
    ready: usize,
    next_id: u64,
    stats: CacheStats,
}

/// Hit/miss/eviction counters.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct CacheStats {
    /// Calls answered from a completed entry.
    pub hits: u64,
    /// Calls that joined an in-flight computation.
    pub joins: u64,
    /// Calls that started a new computation.
    pub misses: u64,
    /// Completed entries removed to respect the size bound.
    pub evictions: u64,
}

/// Concurrent memo table for async computations.
///
/// Cloning a `FutureCache` yields another handle to the same table.
pub struct FutureCache<K, V> {
    inner: Arc<Mutex<Inner<K, V>>>,
    max_size: Option<usize>,
}

impl<K, V> Clone for FutureCache<K, V> {
    fn clone(&self) -> Self {
        Self {
            inner: Arc::clone(&self.inner),
            max_size: self.max_size,
        }
    }
}

impl<K, V> Default for FutureCache<K, V>
where
    K: Hash + Eq + Clone + Send + 'static,
    V: Clone + Send + Sync + 'static,
{
    fn default() -> Self {
        Self::new()
    }
}

impl<K, V> FutureCache<K, V>
where
    K: Hash + Eq + Clone + Send + 'static,
    V: Clone + Send + Sync + 'static,
{
    /// Creates an unbounded cache.
    pub fn new() -> Self {
        Self::build(None)
    }

    /// Creates a cache that keeps at most `max_size` completed entries.
    pub fn with_max_size(max_size: usize) -> Self {
        Self::build(Some(max_size))
    }

    /// Creates a cache from configuration.
    pub fn from_config(config: &CacheConfig) -> Self {
        Self::build(config.max_size)
    }

    fn build(max_size: Option<usize>) -> Self {
        Self {
            inner: Arc::new(Mutex::new(Inner {
                entries: IndexMap::new(),
                ready: 0,
                next_id: 0,
                stats: CacheStats::default(),
            })),
            max_size,
        }
    }

    /// Returns the cached value for `key`, computing it if necessary.
    ///
    /// `compute` is only called when there is neither a cached value nor an
    /// in-flight computation for `key`. It is called with the cache locked,
    /// so it must only build the future and not touch the cache itself. The
    /// computation runs on the current tokio runtime.
    ///
    /// # Errors
    ///
    /// - [`TaskError::Shared`] if the computation returned an error.
    /// - [`TaskError::Panicked`] if it panicked.
    /// - [`TaskError::Cancelled`] if the runtime shut down under it.
    ///
    /// # Panics
    ///
    /// Panics if a computation has to be spawned outside a tokio runtime.
    pub async fn get_or_compute<F, Fut>(&self, key: K, compute: F) -> Result<V>
    where
        F: FnOnce() -> Fut,
        Fut: Future<Output = anyhow::Result<V>> + Send + 'static,
    {
        let pending = {
            let mut inner = self.inner.lock();
            match inner.entries.get(&key) {
                Some(Slot::Ready(value)) => {
                    let value = value.clone();
                    inner.stats.hits += 1;
                    return Ok(value);
                },
                Some(Slot::Pending { future, .. }) => {
                    let pending = future.clone();
                    inner.stats.joins += 1;
                    pending
                },
                None => {
                    inner.stats.misses += 1;
                    inner.next_id += 1;
                    let id = inner.next_id;
                    let pending = self.spawn_compute(id, key.clone(), compute());
                    inner.entries.insert(
                        key,
                        Slot::Pending {
                            id,
                            future: pending.clone(),
                        },
                    );
                    pending
                },
            }
        };

        pending.await.map_err(TaskError::from)
    }

    /// Spawns `future` and returns a shareable handle to its outcome. The
    /// spawned task records the outcome in the table itself, provided the
    /// entry still belongs to computation `id`.
    fn spawn_compute<Fut>(&self, id: u64, key: K, future: Fut) -> Pending<V>
    where
        Fut: Future<Output = anyhow::Result<V>> + Send + 'static,
    {
        let inner = Arc::clone(&self.inner);
        let max_size = self.max_size;

        let handle = tokio::spawn(async move {
            let output = match AssertUnwindSafe(future).catch_unwind().await {
                Ok(Ok(value)) => Ok(value),
                Ok(Err(err)) => Err(ComputeFailure::Failed(Arc::new(err))),
                Err(payload) => Err(ComputeFailure::from(TaskError::from_panic(payload))),
            };

            let mut guard = inner.lock();
            let pending = matches!(
                guard.entries.get(&key),
                Some(Slot::Pending { id: current, .. }) if *current == id
            );
            match &output {
                Ok(value) if pending => {
                    guard.entries.insert(key, Slot::Ready(value.clone()));
                    guard.ready += 1;
                    if let Some(max) = max_size {
                        guard.evict_to(max);
                    }
                },
                Err(_) if pending => {
                    tracing::debug!("cached computation failed, entry dropped");
                    guard.entries.shift_remove(&key);
                },
                _ => {},
            }
            output
        });

        async move {
            handle
                .await
                .unwrap_or_else(|err| Err(ComputeFailure::from(TaskError::from_join(err))))
        }
        .boxed()
        .shared()
    }

    /// Number of entries, including in-flight computations.
    pub fn len(&self) -> usize {
        self.inner.lock().entries.len()
    }

    /// Returns `true` if the cache holds no entries.
    pub fn is_empty(&self) -> bool {
        self.inner.lock().entries.is_empty()
    }

    /// Returns `true` if a completed value is cached for `key`.
    pub fn contains_key(&self, key: &K) -> bool {
        matches!(self.inner.lock().entries.get(key), Some(Slot::Ready(_)))
    }

    /// Returns the cached value for `key` without computing anything.
    pub fn get(&self, key: &K) -> Option<V> {
        match self.inner.lock().entries.get(key) {
            Some(Slot::Ready(value)) => Some(value.clone()),
            _ => None,
        }
    }

    /// Removes the entry for `key`. Returns `true` if there was one.
    ///
    /// Waiters on an in-flight computation still receive its outcome, but
    /// the outcome is not cached.
    pub fn invalidate(&self, key: &K) -> bool {
        let mut inner = self.inner.lock();
        match inner.entries.shift_remove(key) {
            Some(Slot::Ready(_)) => {
                inner.ready -= 1;
                true
            },
            Some(Slot::Pending { .. }) => true,
            None => false,
        }
    }

    /// Removes every entry.
    pub fn clear(&self) {
        let mut inner = self.inner.lock();
        inner.entries.clear();
        inner.ready = 0;
    }

    /// Snapshot of the hit/miss/eviction counters.
    pub fn stats(&self) -> CacheStats {
        self.inner.lock().stats
    }

    /// Configured bound on completed entries.
    pub fn max_size(&self) -> Option<usize> {
        self.max_size
    }
}

impl<K, V> Inner<K, V> {
    /// Evicts the oldest completed entries until at most `max` remain.
    fn evict_to(&mut self, max: usize) {
        while self.ready > max {
            let Some(index) = self
                .entries
                .values()
                .position(|slot| matches!(slot, Slot::Ready(_)))
            else {
                break;
            };
            self.entries.shift_remove_index(index);
            self.ready -= 1;
            self.stats.evictions += 1;
        }
    }
}

impl<K, V> fmt::Debug for FutureCache<K, V> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let inner = self.inner.lock();
        f.debug_struct("FutureCache")
            .field("entries", &inner.entries.len())
            .field("ready", &inner.ready)
            .field("max_size", &self.max_size)
            .field("stats", &inner.stats)
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::time::Duration;

    use super::*;

    #[tokio::test]
    async fn second_call_is_a_hit() {
        let cache = FutureCache::new();
        let calls = Arc::new(AtomicUsize::new(0));

        for _ in 0..3 {
            let calls = Arc::clone(&calls);
            let v = cache
                .get_or_compute(1_u32, move || async move {
                    calls.fetch_add(1, Ordering::SeqCst);
                    Ok("one")
                })
                .await
                .unwrap();
            assert_eq!(v, "one");
        }

        assert_eq!(calls.load(Ordering::SeqCst), 1);
        let stats = cache.stats();
        assert_eq!(stats.misses, 1);
        assert_eq!(stats.hits, 2);
    }

    #[tokio::test(start_paused = true)]
    async fn concurrent_callers_share_one_computation() {
        let cache: FutureCache<&str, u64> = FutureCache::new();
        let calls = Arc::new(AtomicUsize::new(0));

        let make = |calls: Arc<AtomicUsize>| {
            move || async move {
                calls.fetch_add(1, Ordering::SeqCst);
                tokio::time::sleep(Duration::from_secs(1)).await;
                Ok(7)
            }
        };

        let (a, b) = tokio::join!(
            cache.get_or_compute("k", make(Arc::clone(&calls))),
            cache.get_or_compute("k", make(Arc::clone(&calls))),
        );
        assert_eq!(a.unwrap(), 7);
        assert_eq!(b.unwrap(), 7);
        assert_eq!(calls.load(Ordering::SeqCst), 1);
        assert_eq!(cache.stats().joins, 1);
    }

    #[tokio::test]
    async fn oldest_entries_are_evicted_first() {
        let cache = FutureCache::with_max_size(2);
        for k in 0..3_u8 {
            cache
                .get_or_compute(k, move || async move { Ok(k) })
                .await
                .unwrap();
        }

        assert!(!cache.contains_key(&0));
        assert!(cache.contains_key(&1));
        assert!(cache.contains_key(&2));
        assert_eq!(cache.len(), 2);
        assert_eq!(cache.stats().evictions, 1);
    }

    #[tokio::test]
    async fn failures_are_not_cached() {
        let cache: FutureCache<u8, u8> = FutureCache::new();

        let err = cache
            .get_or_compute(1, || async { Err(anyhow::anyhow!("flaky")) })
            .await
            .unwrap_err();
        assert!(matches!(err, TaskError::Shared(_)));
        assert!(cache.is_empty());

        let v = cache.get_or_compute(1, || async { Ok(9) }).await.unwrap();
        assert_eq!(v, 9);
    }

    #[tokio::test]
    async fn panics_are_reported_and_not_cached() {
        let cache: FutureCache<u8, u8> = FutureCache::new();
        let err = cache
            .get_or_compute(1, || async {
                if true {
                    panic!("compute boom");
                }
                Ok(0)
            })
            .await
            .unwrap_err();
        match err {
            TaskError::Panicked(msg) => assert_eq!(msg, "compute boom"),
            other => panic!("unexpected error: {other:?}"),
        }
        assert!(cache.is_empty());

        let v = cache.get_or_compute(1, || async { Ok(3) }).await.unwrap();
        assert_eq!(v, 3);
    }

    #[tokio::test]
    async fn invalidate_and_clear() {
        let cache = FutureCache::new();
        cache.get_or_compute("a", || async { Ok(1) }).await.unwrap();
        cache.get_or_compute("b", || async { Ok(2) }).await.unwrap();

        assert_eq!(cache.get(&"a"), Some(1));
        assert!(cache.invalidate(&"a"));
        assert!(!cache.invalidate(&"a"));
        assert_eq!(cache.get(&"a"), None);

        cache.clear();
        assert!(cache.is_empty());
    }

    #[tokio::test(start_paused = true)]
    async fn invalidated_computation_does_not_repopulate() {
        let cache: FutureCache<u8, &str> = FutureCache::new();

        let slow = {
            let cache = cache.clone();
            tokio::spawn(async move {
                cache
                    .get_or_compute(1, || async {
                        tokio::time::sleep(Duration::from_secs(5)).await;
                        Ok("stale")
                    })
                    .await
            })
        };
        tokio::task::yield_now().await;
        assert_eq!(cache.len(), 1);
        assert!(cache.invalidate(&1));

        let fresh = cache.get_or_compute(1, || async { Ok("fresh") }).await.unwrap();
        assert_eq!(fresh, "fresh");

        // The old waiter still gets its own value.
        assert_eq!(slow.await.unwrap().unwrap(), "stale");
        assert_eq!(cache.get(&1), Some("fresh"));
    }

    #[test]
    fn from_config_uses_max_size() {
        let cache: FutureCache<u8, u8> = FutureCache::from_config(&CacheConfig {
            max_size: Some(3),
        });
        assert_eq!(cache.max_size(), Some(3));
    }
}
