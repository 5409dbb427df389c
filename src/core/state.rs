//! Change-tracking state.
//!
//! Persists a flat map from `app:path` to the content hash of the ciphertext
//! that was last materialized, plus a single `lastUpdated` timestamp for the
//! whole record. The file is rewritten in full on every save.

use std::collections::BTreeMap;
use std::io::ErrorKind;
use std::path::Path;

use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};
use tracing::debug;

use crate::core::fsutil;
use crate::error::{Result, StateError};

/// In-memory view of the state file.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct StateRecord {
    /// Unix timestamp of the last recorded write
    #[serde(default, alias = "LastUpdated")]
    pub last_updated: i64,
    /// Map of `app:path` keys to hex-encoded content hashes
    #[serde(default, alias = "Data")]
    pub data: BTreeMap<String, String>,
}

impl StateRecord {
    /// Create an empty record.
    pub fn new() -> Self {
        Self::default()
    }

    /// Load a record from `path`.
    ///
    /// A missing file yields an empty record.
    ///
    /// # Errors
    ///
    /// Returns `StateError::Parse` if the file exists but is malformed,
    /// or `StateError::Read` on other I/O failures.
    pub fn load(path: &Path) -> Result<Self> {
        debug!(path = %path.display(), "loading state");

        let contents = match std::fs::read_to_string(path) {
            Ok(contents) => contents,
            Err(e) if e.kind() == ErrorKind::NotFound => {
                debug!("no state file, starting empty");
                return Ok(Self::new());
            }
            Err(e) => return Err(StateError::Read(e).into()),
        };

        let record: Self = serde_json::from_str(&contents).map_err(StateError::Parse)?;
        debug!(entries = record.data.len(), "state loaded");
        Ok(record)
    }

    /// Write the record to `path`, replacing any existing file.
    ///
    /// The new content is written to a temporary file in the same directory
    /// and renamed over the target, so readers never see a partial file.
    ///
    /// # Errors
    ///
    /// Returns `StateError` if serialization or the write fails.
    pub fn save(&self, path: &Path) -> Result<()> {
        debug!(path = %path.display(), entries = self.data.len(), "saving state");

        let json = serde_json::to_vec_pretty(self).map_err(StateError::Serialize)?;
        fsutil::write_atomic(path, &json).map_err(|source| StateError::Write {
            path: path.to_path_buf(),
            source,
        })?;
        Ok(())
    }

    /// Hash recorded for a file, if any.
    pub fn get(&self, app: &str, path: &str) -> Option<&str> {
        self.data.get(&state_key(app, path)).map(String::as_str)
    }

    /// Whether the recorded hash for a file equals `hash`.
    pub fn is_current(&self, app: &str, path: &str, hash: &str) -> bool {
        self.get(app, path) == Some(hash)
    }

    /// Record a successful materialization and bump the timestamp.
    pub fn record(&mut self, app: &str, path: &str, hash: String) {
        self.data.insert(state_key(app, path), hash);
        self.touch();
    }

    /// Update `last_updated` to now.
    pub fn touch(&mut self) {
        self.last_updated = chrono::Utc::now().timestamp();
    }

    /// Number of tracked files.
    pub fn len(&self) -> usize {
        self.data.len()
    }

    /// Whether no files are tracked.
    pub fn is_empty(&self) -> bool {
        self.data.is_empty()
    }
}

/// Composite key for a file of an app.
pub fn state_key(app: &str, path: &str) -> String {
    format!("{}:{}", app, path)
}

/// SHA-256 of `data`, hex encoded.
///
/// Used for change detection only.
pub fn hash_content(data: &[u8]) -> String {
    let digest = Sha256::digest(data);
    digest.iter().map(|b| format!("{:02x}", b)).collect()
}
