//! Test support utilities for cellar integration tests.
//!
//! Provides isolated environments backed by a real local git repository,
//! plus an in-memory harness for driving the sync engine directly.

#![allow(dead_code)]

pub mod commands;
pub mod fixtures;
pub mod harness;

#[allow(unused_imports)]
pub use assertions::*;
#[allow(unused_imports)]
pub use fixtures::*;
#[allow(unused_imports)]
pub use harness::*;

use std::path::{Path, PathBuf};

use cellar::core::cipher::{self, Age, Cipher, Recipient};
use git2::{IndexAddOption, Repository, Signature};
use tempfile::TempDir;

/// Test environment with isolated temp directories.
///
/// Each test gets its own project dir, home dir and origin repository.
/// Child processes use `.current_dir()` so tests can run in parallel.
pub struct Test {
    /// Project directory; the CLI runs here
    pub dir: TempDir,
    /// Temporary home directory
    pub home: TempDir,
    /// Working copy of the origin repository
    pub origin: TempDir,
    repo: Repository,
    /// Public key matching `key.txt` in the project dir
    pub public_key: String,
}

impl Test {
    /// Create an environment with an empty origin and a fresh identity at
    /// `key.txt`.
    pub fn new() -> Self {
        let dir = TempDir::new().expect("failed to create temp dir");
        let home = TempDir::new().expect("failed to create temp home");
        let origin = TempDir::new().expect("failed to create origin dir");
        let repo = Repository::init(origin.path()).expect("failed to init origin");
        let public_key =
            cipher::write_identity(&dir.path().join(KEY_FILE)).expect("failed to write identity");

        Self {
            dir,
            home,
            origin,
            repo,
            public_key,
        }
    }

    /// Environment with `cellar.yaml` declaring `apps` and the given secrets
    /// committed to `main`.
    pub fn with_secrets(apps: &str, secrets: &[(&str, &str)]) -> Self {
        let t = Self::new();
        t.commit_secrets(secrets);
        t.write_config(apps);
        t
    }

    pub fn origin_url(&self) -> String {
        self.origin.path().to_string_lossy().to_string()
    }

    pub fn key_path(&self) -> PathBuf {
        self.dir.path().join(KEY_FILE)
    }

    pub fn recipient(&self) -> Recipient {
        cipher::parse_recipient(&self.public_key).expect("invalid test recipient")
    }

    /// Encrypt `plaintext` to the test identity.
    pub fn encrypt(&self, plaintext: &str) -> Vec<u8> {
        Age.encrypt(plaintext.as_bytes(), &[self.recipient()])
            .expect("failed to encrypt")
    }

    /// Encrypt each `(path, plaintext)` and commit them to `main`.
    pub fn commit_secrets(&self, files: &[(&str, &str)]) {
        let encrypted: Vec<(&str, Vec<u8>)> = files
            .iter()
            .map(|(path, plaintext)| (*path, self.encrypt(plaintext)))
            .collect();
        let raw: Vec<(&str, &[u8])> = encrypted
            .iter()
            .map(|(path, data)| (*path, data.as_slice()))
            .collect();
        self.commit_raw(&raw);
    }

    /// Commit files as-is to `main`.
    pub fn commit_raw(&self, files: &[(&str, &[u8])]) {
        let workdir = self.origin.path();
        for (path, contents) in files {
            let full = workdir.join(path);
            std::fs::create_dir_all(full.parent().unwrap()).unwrap();
            std::fs::write(full, contents).unwrap();
        }

        let mut index = self.repo.index().unwrap();
        index
            .add_all(["*"].iter(), IndexAddOption::DEFAULT, None)
            .unwrap();
        index.write().unwrap();
        let tree = self.repo.find_tree(index.write_tree().unwrap()).unwrap();
        let sig = Signature::now("test", "test@example.com").unwrap();
        let parent = self
            .repo
            .find_reference("refs/heads/main")
            .ok()
            .and_then(|r| r.peel_to_commit().ok());
        let parents: Vec<&git2::Commit<'_>> = parent.iter().collect();
        self.repo
            .commit(Some("refs/heads/main"), &sig, &sig, "update secrets", &tree, &parents)
            .unwrap();
    }

    /// Write `cellar.yaml` pointing at the origin and test identity.
    pub fn write_config(&self, apps: &str) {
        let yaml = config_yaml(&self.origin_url(), &self.key_path(), apps);
        std::fs::write(self.path(CONFIG_FILE), yaml).unwrap();
    }

    /// Path inside the project dir.
    pub fn path(&self, rel: &str) -> PathBuf {
        self.dir.path().join(rel)
    }

    /// Read a project file as a string.
    pub fn read(&self, rel: &str) -> String {
        std::fs::read_to_string(self.path(rel))
            .unwrap_or_else(|e| panic!("failed to read {}: {}", rel, e))
    }

    pub fn exists(&self, rel: &str) -> bool {
        self.path(rel).exists()
    }
}

/// Unix permission bits of `path`.
#[cfg(unix)]
pub fn mode(path: &Path) -> u32 {
    use std::os::unix::fs::PermissionsExt;
    std::fs::metadata(path).unwrap().permissions().mode() & 0o777
}
