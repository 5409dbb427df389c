//! Git source provider.
//!
//! Keeps one bare repository per source key under a cache directory and
//! fetches only the configured branch into it. Each fetch reads the whole
//! tree at the branch head into a [`Snapshot`]; later fetches reuse the
//! objects already on disk.

use std::collections::BTreeMap;
use std::path::{Path, PathBuf};
use std::sync::{Arc, Mutex, PoisonError};

use git2::{
    Cred, CredentialType, ErrorClass, ErrorCode, FetchOptions, ObjectType, RemoteCallbacks,
    Repository, TreeWalkMode, TreeWalkResult,
};
use tracing::{debug, trace};

use super::{Snapshot, SourceKey, SourceProvider};
use crate::core::constants;
use crate::core::state::hash_content;
use crate::error::SourceError;

/// Credentials for remote access, resolved from the environment.
#[derive(Default, Clone)]
pub struct GitAuth {
    ssh_key: Option<PathBuf>,
    ssh_passphrase: Option<String>,
    token: Option<String>,
}

impl std::fmt::Debug for GitAuth {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("GitAuth")
            .field("ssh_key", &self.ssh_key)
            .field("ssh_passphrase", &self.ssh_passphrase.as_ref().map(|_| "<redacted>"))
            .field("token", &self.token.as_ref().map(|_| "<redacted>"))
            .finish()
    }
}

impl GitAuth {
    /// No credentials.
    pub fn anonymous() -> Self {
        Self::default()
    }

    /// Read credentials from the environment.
    ///
    /// An SSH key file takes precedence over a token.
    pub fn from_env() -> Self {
        let ssh_key = std::env::var_os(constants::ENV_SSH_KEY_FILE).map(PathBuf::from);
        let ssh_passphrase = std::env::var(constants::ENV_SSH_KEY_PASSWORD).ok();
        let token = std::env::var(constants::ENV_GIT_TOKEN).ok();
        Self {
            ssh_key,
            ssh_passphrase,
            token,
        }
    }

    /// SSH key authentication.
    pub fn ssh_key(path: impl Into<PathBuf>, passphrase: Option<String>) -> Self {
        Self {
            ssh_key: Some(path.into()),
            ssh_passphrase: passphrase,
            token: None,
        }
    }

    /// Token authentication over HTTP basic.
    pub fn token(token: impl Into<String>) -> Self {
        Self {
            token: Some(token.into()),
            ..Self::default()
        }
    }

    fn is_anonymous(&self) -> bool {
        self.ssh_key.is_none() && self.token.is_none()
    }

    fn callbacks(&self) -> RemoteCallbacks<'_> {
        let mut callbacks = RemoteCallbacks::new();
        if self.is_anonymous() {
            return callbacks;
        }

        // libgit2 keeps asking while the server rejects; give up after one try.
        let mut attempts = 0;
        callbacks.credentials(move |_url, username, allowed| {
            attempts += 1;
            if attempts > 1 {
                return Err(git2::Error::new(
                    ErrorCode::Auth,
                    ErrorClass::Callback,
                    "credentials rejected",
                ));
            }

            if let Some(key) = &self.ssh_key {
                if allowed.contains(CredentialType::SSH_KEY) {
                    return Cred::ssh_key(
                        username.unwrap_or("git"),
                        None,
                        key,
                        self.ssh_passphrase.as_deref(),
                    );
                }
            }
            if let Some(token) = &self.token {
                if allowed.contains(CredentialType::USER_PASS_PLAINTEXT) {
                    return Cred::userpass_plaintext(constants::TOKEN_USERNAME, token);
                }
            }
            Cred::default()
        });
        callbacks
    }
}

/// Source provider backed by git2.
pub struct GitProvider {
    root: PathBuf,
    auth: GitAuth,
    // Serializes access to the on-disk repositories.
    lock: Mutex<()>,
    _tmp: Option<tempfile::TempDir>,
}

impl std::fmt::Debug for GitProvider {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("GitProvider")
            .field("root", &self.root)
            .field("auth", &self.auth)
            .finish()
    }
}

impl GitProvider {
    /// Create a provider storing objects under `cache_dir`.
    ///
    /// Without a cache directory, a temporary one is created and removed
    /// when the provider is dropped.
    ///
    /// # Errors
    ///
    /// Returns an I/O error if the directory can't be created.
    pub fn new(cache_dir: Option<&Path>, auth: GitAuth) -> std::io::Result<Self> {
        let (root, tmp) = match cache_dir {
            Some(dir) => {
                std::fs::create_dir_all(dir)?;
                (dir.to_path_buf(), None)
            }
            None => {
                let tmp = tempfile::Builder::new().prefix("cellar-git-").tempdir()?;
                (tmp.path().to_path_buf(), Some(tmp))
            }
        };
        debug!(root = %root.display(), "git cache ready");

        Ok(Self {
            root,
            auth,
            lock: Mutex::new(()),
            _tmp: tmp,
        })
    }

    /// Directory holding the bare repository for `key`.
    pub fn repo_dir(&self, key: &SourceKey) -> PathBuf {
        let stem: String = key
            .location
            .trim_end_matches('/')
            .trim_end_matches(".git")
            .rsplit(['/', ':', '\\'])
            .next()
            .unwrap_or("repo")
            .chars()
            .map(|c| if c.is_ascii_alphanumeric() || c == '-' { c } else { '_' })
            .collect();
        let digest = hash_content(key.to_string().as_bytes());
        self.root.join(format!("{}-{}", stem, &digest[..16]))
    }

    fn open_or_init(&self, key: &SourceKey) -> Result<Repository, SourceError> {
        let dir = self.repo_dir(key);
        if dir.exists() {
            match Repository::open_bare(&dir) {
                Ok(repo) => return Ok(repo),
                Err(e) => {
                    debug!(path = %dir.display(), error = %e, "discarding unreadable cache");
                    let _ = std::fs::remove_dir_all(&dir);
                }
            }
        }
        let repo = Repository::init_bare(&dir).map_err(|e| map_git_error(key, e))?;
        repo.remote("origin", &key.location)
            .map_err(|e| map_git_error(key, e))?;
        Ok(repo)
    }
}

impl SourceProvider for GitProvider {
    fn fetch(&self, key: &SourceKey) -> Result<Snapshot, SourceError> {
        let _guard = self.lock.lock().unwrap_or_else(PoisonError::into_inner);
        debug!(location = %key.location, branch = %key.branch, "fetching");

        let repo = self.open_or_init(key)?;
        let err = |e| map_git_error(key, e);

        let refspec = format!("+refs/heads/{0}:refs/remotes/origin/{0}", key.branch);
        let mut options = FetchOptions::new();
        options.remote_callbacks(self.auth.callbacks());
        repo.find_remote("origin")
            .map_err(err)?
            .fetch(&[refspec.as_str()], Some(&mut options), None)
            .map_err(err)?;

        let tracking = format!("refs/remotes/origin/{}", key.branch);
        let commit = repo
            .find_reference(&tracking)
            .and_then(|r| r.peel_to_commit())
            .map_err(|_| SourceError::BranchNotFound {
                location: key.location.clone(),
                branch: key.branch.clone(),
            })?;

        let snapshot = read_tree(&repo, &commit).map_err(err)?;
        debug!(commit = %snapshot.commit(), files = snapshot.len(), "fetched");
        Ok(snapshot)
    }
}

fn read_tree(repo: &Repository, commit: &git2::Commit<'_>) -> Result<Snapshot, git2::Error> {
    let tree = commit.tree()?;

    let mut blobs = Vec::new();
    tree.walk(TreeWalkMode::PreOrder, |root, entry| {
        if entry.kind() == Some(ObjectType::Blob) {
            if let Some(name) = entry.name() {
                blobs.push((format!("{}{}", root, name), entry.id()));
            }
        }
        TreeWalkResult::Ok
    })?;

    let mut files = BTreeMap::new();
    for (path, id) in blobs {
        let blob = repo.find_blob(id)?;
        trace!(path = %path, size = blob.size(), "blob");
        files.insert(path, Arc::from(blob.content()));
    }

    Ok(Snapshot::new(commit.id().to_string(), files))
}

fn map_git_error(key: &SourceKey, e: git2::Error) -> SourceError {
    match (e.code(), e.class()) {
        (ErrorCode::Auth, _) | (_, ErrorClass::Ssh) => SourceError::Auth(e.message().to_string()),
        (ErrorCode::NotFound, ErrorClass::Reference) => SourceError::BranchNotFound {
            location: key.location.clone(),
            branch: key.branch.clone(),
        },
        _ => SourceError::Fetch {
            location: key.location.clone(),
            branch: key.branch.clone(),
            message: e.message().to_string(),
        },
    }
}
