//! In-process source provider.
//!
//! Holds trees in memory. Useful for embedding cellar behind another
//! transport and for exercising the cache and engine without a network.

use std::collections::{BTreeMap, HashMap};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, PoisonError, RwLock};
use std::time::Duration;

use super::{Snapshot, SourceKey, SourceProvider};
use crate::error::SourceError;

/// Source provider backed by in-memory file maps.
#[derive(Debug, Default)]
pub struct MemoryProvider {
    trees: RwLock<HashMap<SourceKey, BTreeMap<String, Arc<[u8]>>>>,
    failures: RwLock<HashMap<SourceKey, SourceError>>,
    revision: AtomicUsize,
    fetches: AtomicUsize,
    latency: Duration,
}

impl MemoryProvider {
    pub fn new() -> Self {
        Self::default()
    }

    /// Delay every fetch by `latency`, simulating a slow remote.
    pub fn with_latency(mut self, latency: Duration) -> Self {
        self.latency = latency;
        self
    }

    /// Add or replace a file under `key`.
    pub fn put_file(&self, key: &SourceKey, path: &str, contents: impl Into<Vec<u8>>) {
        let contents: Vec<u8> = contents.into();
        self.trees
            .write()
            .unwrap_or_else(PoisonError::into_inner)
            .entry(key.clone())
            .or_default()
            .insert(path.to_string(), Arc::from(contents));
        self.revision.fetch_add(1, Ordering::SeqCst);
    }

    /// Remove a file from `key`'s tree.
    pub fn remove_file(&self, key: &SourceKey, path: &str) {
        if let Some(tree) = self
            .trees
            .write()
            .unwrap_or_else(PoisonError::into_inner)
            .get_mut(key)
        {
            tree.remove(path);
        }
        self.revision.fetch_add(1, Ordering::SeqCst);
    }

    /// Make every fetch of `key` fail with `error` until cleared.
    pub fn fail(&self, key: &SourceKey, error: SourceError) {
        self.failures
            .write()
            .unwrap_or_else(PoisonError::into_inner)
            .insert(key.clone(), error);
    }

    /// Stop failing fetches of `key`.
    pub fn clear_failure(&self, key: &SourceKey) {
        self.failures
            .write()
            .unwrap_or_else(PoisonError::into_inner)
            .remove(key);
    }

    /// Number of fetch/refresh calls served so far.
    pub fn fetch_count(&self) -> usize {
        self.fetches.load(Ordering::SeqCst)
    }
}

impl SourceProvider for MemoryProvider {
    fn fetch(&self, key: &SourceKey) -> Result<Snapshot, SourceError> {
        self.fetches.fetch_add(1, Ordering::SeqCst);
        if !self.latency.is_zero() {
            std::thread::sleep(self.latency);
        }

        if let Some(err) = self
            .failures
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .get(key)
        {
            return Err(err.clone());
        }

        let trees = self.trees.read().unwrap_or_else(PoisonError::into_inner);
        let files = trees
            .get(key)
            .cloned()
            .ok_or_else(|| SourceError::BranchNotFound {
                location: key.location.clone(),
                branch: key.branch.clone(),
            })?;

        let commit = format!("mem-{}", self.revision.load(Ordering::SeqCst));
        Ok(Snapshot::new(commit, files))
    }
}
