//! In-memory harness for driving the sync engine without git or the CLI.

use std::io::Write;
use std::path::PathBuf;
use std::sync::{Arc, Mutex};
use std::time::Duration;

use cellar::core::cache::SourceCache;
use cellar::core::cipher::{self, Age, Cipher, Recipient};
use cellar::core::config::Config;
use cellar::core::context::{RuntimeContext, SyncOptions};
use cellar::core::source::{MemoryProvider, RetryPolicy, SourceKey};
use cellar::core::state::StateRecord;
use cellar::core::sync::SyncEngine;
use tempfile::TempDir;

/// Location used for the in-memory source.
pub const MEM_REPO: &str = "mem://secrets";

/// Shared buffer standing in for stdout.
#[derive(Clone, Default)]
pub struct Captured(pub Arc<Mutex<Vec<u8>>>);

impl Captured {
    pub fn contents(&self) -> String {
        String::from_utf8_lossy(&self.0.lock().unwrap()).to_string()
    }
}

impl Write for Captured {
    fn write(&mut self, buf: &[u8]) -> std::io::Result<usize> {
        self.0.lock().unwrap().extend_from_slice(buf);
        Ok(buf.len())
    }

    fn flush(&mut self) -> std::io::Result<()> {
        Ok(())
    }
}

/// Engine over a [`MemoryProvider`] with outputs in a temp dir.
pub struct Harness {
    pub tmp: TempDir,
    pub provider: Arc<MemoryProvider>,
    pub cache: Arc<SourceCache>,
    pub engine: Arc<SyncEngine>,
    pub captured: Captured,
    pub key: SourceKey,
    recipient: Recipient,
}

impl Harness {
    pub fn new() -> Self {
        Self::with_provider(MemoryProvider::new())
    }

    /// Harness whose source takes `latency` per fetch.
    pub fn with_latency(latency: Duration) -> Self {
        Self::with_provider(MemoryProvider::new().with_latency(latency))
    }

    fn with_provider(provider: MemoryProvider) -> Self {
        let tmp = TempDir::new().unwrap();
        let public = cipher::write_identity(&tmp.path().join("key.txt")).unwrap();
        let recipient = cipher::parse_recipient(&public).unwrap();

        let provider = Arc::new(provider);
        let cache = Arc::new(SourceCache::new(provider.clone()).with_retry(RetryPolicy::none()));
        let captured = Captured::default();
        let engine = Arc::new(SyncEngine::new(cache.clone()).with_sink(captured.clone()));

        Self {
            tmp,
            provider,
            cache,
            engine,
            captured,
            key: SourceKey::new(MEM_REPO, "main"),
            recipient,
        }
    }

    /// Encrypt and store `plaintext` at `path` on the default source.
    pub fn put(&self, path: &str, plaintext: &str) {
        self.put_on(&self.key, path, plaintext);
    }

    pub fn put_on(&self, key: &SourceKey, path: &str, plaintext: &str) {
        let ciphertext = Age
            .encrypt(plaintext.as_bytes(), &[self.recipient.clone()])
            .unwrap();
        self.provider.put_file(key, path, ciphertext);
    }

    /// Config text with `apps`, the in-memory source and outputs under `out/`.
    pub fn config(&self, apps: &str) -> Config {
        let yaml = format!(
            "git: {{ repo: '{}', branch: main }}\noutputDir: '{}'\napps:{}",
            MEM_REPO,
            self.out_dir().display(),
            apps
        );
        Config::from_yaml(&yaml).unwrap()
    }

    /// Context for `apps`, with state at `state.json` loaded from disk.
    pub fn context(&self, apps: &str) -> RuntimeContext {
        self.context_with(apps, SyncOptions::default())
    }

    pub fn context_with(&self, apps: &str, options: SyncOptions) -> RuntimeContext {
        let state_path = self.state_path();
        let state = StateRecord::load(&state_path).unwrap();
        let identities = cipher::load_identities(&[self.tmp.path().join("key.txt")]).unwrap();
        RuntimeContext::new(self.config(apps), state, state_path, identities).with_options(options)
    }

    pub fn out_dir(&self) -> PathBuf {
        self.tmp.path().join("out")
    }

    pub fn out(&self, name: &str) -> PathBuf {
        self.out_dir().join(name)
    }

    pub fn read_out(&self, name: &str) -> String {
        std::fs::read_to_string(self.out(name)).unwrap()
    }

    pub fn state_path(&self) -> PathBuf {
        self.tmp.path().join("state.json")
    }

    pub fn saved_state(&self) -> StateRecord {
        StateRecord::load(&self.state_path()).unwrap()
    }
}
