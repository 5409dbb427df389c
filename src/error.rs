//! Error types.
//!
//! One enum per concern, folded into [`Error`]. Callers match on the inner
//! enums to decide fatality (configuration errors abort a run, per-file
//! errors are logged and skipped).

use std::path::PathBuf;

use thiserror::Error;

use crate::core::source::SourceKey;

/// Top-level error.
#[derive(Error, Debug)]
pub enum Error {
    #[error(transparent)]
    Config(#[from] ConfigError),

    #[error(transparent)]
    Source(#[from] SourceError),

    #[error(transparent)]
    Cipher(#[from] CipherError),

    #[error(transparent)]
    State(#[from] StateError),

    #[error(transparent)]
    Sync(#[from] SyncError),

    #[error("io error: {0}")]
    Io(#[from] std::io::Error),
}

/// Configuration loading and validation errors.
///
/// All of these are fatal: they abort before any sync work begins.
#[derive(Error, Debug)]
pub enum ConfigError {
    #[error("config file not found: {}", .0.display())]
    NotFound(PathBuf),

    #[error("config file already exists: {}", .0.display())]
    AlreadyExists(PathBuf),

    #[error("failed to read config: {0}")]
    ReadFile(#[source] std::io::Error),

    #[error("failed to parse config: {0}")]
    Parse(#[source] serde_yaml::Error),

    #[error("failed to serialize config: {0}")]
    Serialize(#[source] serde_yaml::Error),

    #[error("no git configuration found: set either top-level git or app-specific git")]
    NoSource,

    #[error("app '{app}' has no usable git source (repo and branch must both be set)")]
    UnresolvedSource { app: String },

    #[error("no age identities configured")]
    NoIdentities,

    #[error("app '{app}' not found in configuration (available: {})", .available.join(", "))]
    UnknownApp { app: String, available: Vec<String> },

    #[error("invalid interval '{value}': {reason}")]
    InvalidInterval { value: String, reason: String },

    #[error("destination {} is written by both {first} and {second}", .path.display())]
    DestinationCollision {
        path: PathBuf,
        first: String,
        second: String,
    },

    #[error("invalid value for '{field}': {reason}")]
    InvalidValue { field: &'static str, reason: String },
}

/// Errors from obtaining or refreshing a source tree.
///
/// Cloneable so that callers waiting on a coalesced fetch receive the
/// winner's failure.
#[derive(Error, Debug, Clone)]
pub enum SourceError {
    #[error("fetch of {location}@{branch} failed: {message}")]
    Fetch {
        location: String,
        branch: String,
        message: String,
    },

    #[error("branch '{branch}' not found in {location}")]
    BranchNotFound { location: String, branch: String },

    #[error("file not found in source tree: {path}")]
    FileNotFound { path: String },

    #[error("git authentication failed: {0}")]
    Auth(String),

    #[error("refresh failed for {} source(s): {}", .failures.len(), summarize(.failures))]
    Refresh { failures: Vec<(SourceKey, SourceError)> },
}

impl SourceError {
    /// Whether retrying the same operation could plausibly succeed.
    pub fn is_transient(&self) -> bool {
        matches!(self, SourceError::Fetch { .. })
    }
}

fn summarize(failures: &[(SourceKey, SourceError)]) -> String {
    failures
        .iter()
        .map(|(key, err)| format!("[{}: {}]", key, err))
        .collect::<Vec<_>>()
        .join(" ")
}

/// Encryption and key material errors.
#[derive(Error, Debug)]
pub enum CipherError {
    #[error("decryption failed: {0}")]
    DecryptionFailed(String),

    #[error("encryption failed: {0}")]
    EncryptionFailed(String),

    #[error("armor failed: {0}")]
    ArmorFailed(String),

    #[error("invalid public key: {0}")]
    InvalidPublicKey(String),

    #[error("invalid identity in {source_name}: {reason}")]
    InvalidIdentity { source_name: String, reason: String },

    #[error("no recipients given")]
    NoRecipients,

    #[error("no identities given")]
    NoIdentities,
}

/// State file errors.
#[derive(Error, Debug)]
pub enum StateError {
    #[error("failed to read state file: {0}")]
    Read(#[source] std::io::Error),

    #[error("malformed state file: {0}")]
    Parse(#[source] serde_json::Error),

    #[error("failed to serialize state: {0}")]
    Serialize(#[source] serde_json::Error),

    #[error("failed to write state file {}: {source}", .path.display())]
    Write {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
}

/// Sync errors that are not already covered by a collaborator's error.
#[derive(Error, Debug)]
pub enum SyncError {
    #[error("app '{app}': file {path} not found in source tree")]
    FileNotFound { app: String, path: String },

    /// A missing file stopped the app and the state of the files written
    /// before it could not be saved either.
    #[error("app '{app}': file {path} not found in source tree; state not saved: {source}")]
    FileNotFoundUnsaved {
        app: String,
        path: String,
        #[source]
        source: Box<Error>,
    },

    #[error("{} app(s) failed to sync: {}", .failures.len(), summarize_apps(.failures))]
    Apps { failures: Vec<(String, Error)> },
}

fn summarize_apps(failures: &[(String, Error)]) -> String {
    failures
        .iter()
        .map(|(app, err)| format!("[{}: {}]", app, err))
        .collect::<Vec<_>>()
        .join(" ")
}

pub type Result<T> = std::result::Result<T, Error>;
