//! Source tree cache.
//!
//! Memoizes one [`CachedTree`] per [`SourceKey`]. A cached tree keeps its
//! identity for the life of the cache; fetches and refreshes swap the
//! snapshot inside it, so anyone holding the tree sees the latest snapshot
//! on their next read while a snapshot already handed out never changes.
//!
//! Concurrent [`SourceCache::get_or_fetch`] calls for the same key share a
//! single provider fetch.

use std::collections::HashMap;
use std::sync::{Arc, Condvar, Mutex, PoisonError, RwLock};

use tracing::{debug, info, warn};

use crate::core::source::{RetryPolicy, Snapshot, SourceKey, SourceProvider};
use crate::error::SourceError;

/// The cache entry for one source key.
#[derive(Debug)]
pub struct CachedTree {
    key: SourceKey,
    snapshot: RwLock<Arc<Snapshot>>,
}

impl CachedTree {
    fn new(key: SourceKey, snapshot: Snapshot) -> Self {
        Self {
            key,
            snapshot: RwLock::new(Arc::new(snapshot)),
        }
    }

    /// Key this tree was fetched for.
    pub fn key(&self) -> &SourceKey {
        &self.key
    }

    /// Current snapshot.
    ///
    /// The returned snapshot is immutable; a later refresh installs a new
    /// one without affecting it.
    pub fn snapshot(&self) -> Arc<Snapshot> {
        Arc::clone(&self.snapshot.read().unwrap_or_else(PoisonError::into_inner))
    }

    /// Commit of the current snapshot.
    pub fn commit(&self) -> String {
        self.snapshot().commit().to_string()
    }

    fn replace(&self, snapshot: Snapshot) {
        *self.snapshot.write().unwrap_or_else(PoisonError::into_inner) = Arc::new(snapshot);
    }
}

type FetchResult = Result<Arc<CachedTree>, SourceError>;

/// A fetch in progress that other callers can wait on.
#[derive(Default)]
struct Flight {
    result: Mutex<Option<FetchResult>>,
    ready: Condvar,
}

impl Flight {
    fn complete(&self, result: FetchResult) {
        let mut slot = self.result.lock().unwrap_or_else(PoisonError::into_inner);
        if slot.is_none() {
            *slot = Some(result);
        }
        self.ready.notify_all();
    }

    fn wait(&self) -> FetchResult {
        let mut slot = self.result.lock().unwrap_or_else(PoisonError::into_inner);
        loop {
            if let Some(result) = slot.as_ref() {
                return result.clone();
            }
            slot = self
                .ready
                .wait(slot)
                .unwrap_or_else(PoisonError::into_inner);
        }
    }
}

/// Removes the in-flight marker when the leading fetch ends, even by panic.
struct FlightGuard<'a> {
    cache: &'a SourceCache,
    key: &'a SourceKey,
    flight: Arc<Flight>,
}

impl Drop for FlightGuard<'_> {
    fn drop(&mut self) {
        self.flight.complete(Err(SourceError::Fetch {
            location: self.key.location.clone(),
            branch: self.key.branch.clone(),
            message: "fetch aborted".to_string(),
        }));
        self.cache
            .in_flight
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .remove(self.key);
    }
}

/// Cache of fetched source trees, shared by the CLI and the watcher.
pub struct SourceCache {
    provider: Arc<dyn SourceProvider>,
    retry: RetryPolicy,
    entries: RwLock<HashMap<SourceKey, Arc<CachedTree>>>,
    in_flight: Mutex<HashMap<SourceKey, Arc<Flight>>>,
}

impl std::fmt::Debug for SourceCache {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SourceCache")
            .field("retry", &self.retry)
            .field("entries", &self.keys())
            .finish()
    }
}

impl SourceCache {
    /// Create an empty cache over `provider`, retrying transient failures
    /// with the default policy.
    pub fn new(provider: Arc<dyn SourceProvider>) -> Self {
        Self {
            provider,
            retry: RetryPolicy::default(),
            entries: RwLock::new(HashMap::new()),
            in_flight: Mutex::new(HashMap::new()),
        }
    }

    /// Replace the retry policy.
    pub fn with_retry(mut self, retry: RetryPolicy) -> Self {
        self.retry = retry;
        self
    }

    /// Cached tree for `key`, without fetching.
    pub fn get(&self, key: &SourceKey) -> Option<Arc<CachedTree>> {
        self.entries
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .get(key)
            .cloned()
    }

    /// Fetch `key` from the provider and store it.
    ///
    /// An existing entry keeps its identity and receives the new snapshot.
    ///
    /// # Errors
    ///
    /// Propagates the provider's error unchanged; nothing is stored.
    pub fn fetch(&self, key: &SourceKey) -> Result<Arc<CachedTree>, SourceError> {
        let snapshot = self.retry.run("fetch", || self.provider.fetch(key))?;
        debug!(source = %key, commit = %snapshot.commit(), "caching snapshot");

        let mut entries = self.entries.write().unwrap_or_else(PoisonError::into_inner);
        let tree = match entries.get(key) {
            Some(tree) => {
                tree.replace(snapshot);
                Arc::clone(tree)
            }
            None => {
                let tree = Arc::new(CachedTree::new(key.clone(), snapshot));
                entries.insert(key.clone(), Arc::clone(&tree));
                tree
            }
        };
        Ok(tree)
    }

    /// Cached tree for `key`, fetching it on first use.
    ///
    /// Concurrent first requests for the same key wait for one fetch and
    /// all receive its outcome.
    ///
    /// # Errors
    ///
    /// Returns the fetch error, shared with every waiter.
    pub fn get_or_fetch(&self, key: &SourceKey) -> Result<Arc<CachedTree>, SourceError> {
        if let Some(tree) = self.get(key) {
            return Ok(tree);
        }

        let (flight, leader) = {
            let mut in_flight = self.in_flight.lock().unwrap_or_else(PoisonError::into_inner);
            // The leader stores its entry before clearing the marker.
            if let Some(tree) = self.get(key) {
                return Ok(tree);
            }
            match in_flight.get(key) {
                Some(flight) => (Arc::clone(flight), false),
                None => {
                    let flight = Arc::new(Flight::default());
                    in_flight.insert(key.clone(), Arc::clone(&flight));
                    (flight, true)
                }
            }
        };

        if !leader {
            debug!(source = %key, "waiting on in-flight fetch");
            return flight.wait();
        }

        let guard = FlightGuard {
            cache: self,
            key,
            flight,
        };
        let result = self.fetch(key);
        guard.flight.complete(result.clone());
        drop(guard);
        result
    }

    /// Advance every cached tree to the latest state of its branch.
    ///
    /// Every entry is attempted. Entries that refreshed keep their new
    /// snapshot even when others fail.
    ///
    /// # Returns
    ///
    /// The number of entries refreshed.
    ///
    /// # Errors
    ///
    /// Returns `SourceError::Refresh` listing every entry that failed.
    pub fn refresh(&self) -> Result<usize, SourceError> {
        let mut trees: Vec<Arc<CachedTree>> = self
            .entries
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .values()
            .cloned()
            .collect();
        trees.sort_by(|a, b| a.key().cmp(b.key()));

        let mut refreshed = 0;
        let mut failures = Vec::new();

        for tree in trees {
            let current = tree.snapshot();
            match self
                .retry
                .run("refresh", || self.provider.refresh(tree.key(), &current))
            {
                Ok(snapshot) => {
                    if snapshot.commit() != current.commit() {
                        info!(
                            source = %tree.key(),
                            from = %current.commit(),
                            to = %snapshot.commit(),
                            "source advanced"
                        );
                    }
                    tree.replace(snapshot);
                    refreshed += 1;
                }
                Err(e) => {
                    warn!(source = %tree.key(), error = %e, "refresh failed");
                    failures.push((tree.key().clone(), e));
                }
            }
        }

        if failures.is_empty() {
            Ok(refreshed)
        } else {
            Err(SourceError::Refresh { failures })
        }
    }

    /// Drop every cached entry.
    pub fn clear(&self) {
        self.entries
            .write()
            .unwrap_or_else(PoisonError::into_inner)
            .clear();
    }

    /// Cached keys, sorted.
    pub fn keys(&self) -> Vec<SourceKey> {
        let mut keys: Vec<SourceKey> = self
            .entries
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .keys()
            .cloned()
            .collect();
        keys.sort();
        keys
    }

    /// Number of cached entries.
    pub fn len(&self) -> usize {
        self.entries
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .len()
    }

    /// Whether nothing is cached.
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}
