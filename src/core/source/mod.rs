//! Versioned source trees.
//!
//! A [`SourceProvider`] turns a [`SourceKey`] (location + branch) into an
//! immutable [`Snapshot`] of every file at the branch head. Providers are
//! opaque to the sync engine; the git implementation is the production one.

use std::collections::BTreeMap;
use std::fmt;
use std::sync::Arc;

use crate::error::SourceError;

mod git;
mod memory;
mod retry;

pub use git::{GitAuth, GitProvider};
pub use memory::MemoryProvider;
pub use retry::RetryPolicy;

/// Cache key identifying one versioned tree.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct SourceKey {
    /// Repository location (URL or local path)
    pub location: String,
    /// Branch name
    pub branch: String,
}

impl SourceKey {
    pub fn new(location: impl Into<String>, branch: impl Into<String>) -> Self {
        Self {
            location: location.into(),
            branch: branch.into(),
        }
    }
}

impl fmt::Display for SourceKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}@{}", self.location, self.branch)
    }
}

/// Point-in-time view of a tree.
///
/// Never mutated after construction; a refresh produces a new snapshot.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Snapshot {
    commit: String,
    files: BTreeMap<String, Arc<[u8]>>,
}

impl Snapshot {
    pub fn new(commit: impl Into<String>, files: BTreeMap<String, Arc<[u8]>>) -> Self {
        Self {
            commit: commit.into(),
            files,
        }
    }

    /// Commit (or revision) identifier of this snapshot.
    pub fn commit(&self) -> &str {
        &self.commit
    }

    /// Raw blob at `path`, if present.
    pub fn file(&self, path: &str) -> Option<&[u8]> {
        self.files.get(normalize(path)).map(|b| b.as_ref())
    }

    /// Raw blob at `path`.
    ///
    /// # Errors
    ///
    /// Returns `SourceError::FileNotFound` if the path isn't in the tree.
    pub fn read(&self, path: &str) -> Result<&[u8], SourceError> {
        self.file(path).ok_or_else(|| SourceError::FileNotFound {
            path: path.to_string(),
        })
    }

    /// Whether `path` exists in the tree.
    pub fn contains(&self, path: &str) -> bool {
        self.files.contains_key(normalize(path))
    }

    /// All file paths, sorted.
    pub fn paths(&self) -> impl Iterator<Item = &str> {
        self.files.keys().map(String::as_str)
    }

    /// Number of files.
    pub fn len(&self) -> usize {
        self.files.len()
    }

    /// Whether the tree has no files.
    pub fn is_empty(&self) -> bool {
        self.files.is_empty()
    }
}

fn normalize(path: &str) -> &str {
    path.trim_start_matches("./").trim_start_matches('/')
}

/// Capability that fetches versioned trees.
pub trait SourceProvider: Send + Sync {
    /// Fetch the head of `key`'s branch.
    ///
    /// # Errors
    ///
    /// Returns `SourceError` on network, authentication or missing-branch
    /// failures.
    fn fetch(&self, key: &SourceKey) -> Result<Snapshot, SourceError>;

    /// Produce an up-to-date snapshot for `key`, given the current one.
    ///
    /// Providers that keep local state (such as a git object store) can use
    /// this to fetch incrementally. The default performs a full fetch.
    ///
    /// # Errors
    ///
    /// Same as [`SourceProvider::fetch`].
    fn refresh(&self, key: &SourceKey, _current: &Snapshot) -> Result<Snapshot, SourceError> {
        self.fetch(key)
    }
}
