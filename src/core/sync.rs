//! Incremental sync of encrypted files to their destinations.
//!
//! For each app the engine resolves its source, obtains the tree through the
//! [`SourceCache`], and walks the file mappings in order. A file whose
//! ciphertext hash matches the state record is skipped without decryption;
//! anything else is decrypted and written atomically with owner-only
//! permissions, and its hash recorded. State is persisted once per app.
//!
//! Error policy:
//! - a missing file aborts the rest of its app (files already written stay
//!   recorded)
//! - decrypt and write failures skip that file only
//! - [`SyncEngine::sync_all`] attempts every app and aggregates failures

use std::io::Write;
use std::path::PathBuf;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex, PoisonError};

use tracing::{debug, error, info, warn};
use zeroize::Zeroizing;

use crate::core::cache::SourceCache;
use crate::core::cipher::{Age, Cipher, Identity};
use crate::core::config::{Config, FileMapping};
use crate::core::context::{RuntimeContext, SyncOptions};
use crate::core::fsutil;
use crate::core::state::{hash_content, StateRecord};
use crate::error::{Error, Result, SyncError};

/// Cooperative cancellation flag, checked between apps.
#[derive(Debug, Clone, Default)]
pub struct CancelToken(Arc<AtomicBool>);

impl CancelToken {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn cancel(&self) {
        self.0.store(true, Ordering::SeqCst);
    }

    pub fn is_cancelled(&self) -> bool {
        self.0.load(Ordering::SeqCst)
    }
}

/// What happened to one file.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum FileOutcome {
    /// Decrypted and written
    Written { destination: PathBuf },
    /// Ciphertext unchanged since the last write
    UpToDate,
    /// Decrypted to the dry-run sink
    DryRun,
    /// No identity could decrypt the file, or it was malformed
    DecryptFailed { reason: String },
    /// Decrypted but the destination could not be written
    WriteFailed { destination: PathBuf, reason: String },
}

impl FileOutcome {
    pub fn is_failure(&self) -> bool {
        matches!(
            self,
            FileOutcome::DecryptFailed { .. } | FileOutcome::WriteFailed { .. }
        )
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FileReport {
    pub path: String,
    pub outcome: FileOutcome,
}

/// Per-file results for one app.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AppReport {
    pub app: String,
    pub commit: String,
    pub files: Vec<FileReport>,
}

impl AppReport {
    fn new(app: &str, commit: &str) -> Self {
        Self {
            app: app.to_string(),
            commit: commit.to_string(),
            files: Vec::new(),
        }
    }

    pub fn written(&self) -> usize {
        self.count(|o| matches!(o, FileOutcome::Written { .. }))
    }

    pub fn up_to_date(&self) -> usize {
        self.count(|o| matches!(o, FileOutcome::UpToDate))
    }

    pub fn failed(&self) -> usize {
        self.count(FileOutcome::is_failure)
    }

    fn count(&self, pred: impl Fn(&FileOutcome) -> bool) -> usize {
        self.files.iter().filter(|f| pred(&f.outcome)).count()
    }
}

/// Result of syncing several apps.
#[derive(Debug, Default)]
pub struct SyncSummary {
    pub reports: Vec<AppReport>,
    pub failures: Vec<(String, Error)>,
    /// Set when the run stopped early on cancellation
    pub cancelled: bool,
}

impl SyncSummary {
    /// Collapse into the reports, or an aggregated error if any app failed.
    ///
    /// # Errors
    ///
    /// Returns `SyncError::Apps` listing every failed app.
    pub fn into_result(self) -> Result<Vec<AppReport>> {
        if self.failures.is_empty() {
            Ok(self.reports)
        } else {
            Err(SyncError::Apps {
                failures: self.failures,
            }
            .into())
        }
    }
}

/// Outcome of [`SyncEngine::validate`].
#[derive(Debug, Default)]
pub struct ValidationReport {
    /// Files found in their trees
    pub checked: usize,
    /// `(app, path)` pairs absent from their tree
    pub missing: Vec<(String, String)>,
    /// Apps whose source could not be resolved or fetched
    pub failures: Vec<(String, Error)>,
}

impl ValidationReport {
    pub fn is_ok(&self) -> bool {
        self.missing.is_empty() && self.failures.is_empty()
    }
}

/// Drives decryption of configured apps.
pub struct SyncEngine<C: Cipher = Age> {
    cache: Arc<SourceCache>,
    cipher: C,
    sink: Mutex<Box<dyn Write + Send>>,
}

impl SyncEngine<Age> {
    /// Engine using age, printing dry-run plaintext to stdout.
    pub fn new(cache: Arc<SourceCache>) -> Self {
        Self::with_cipher(cache, Age)
    }
}

impl<C> SyncEngine<C>
where
    C: Cipher<Identity = Identity>,
{
    pub fn with_cipher(cache: Arc<SourceCache>, cipher: C) -> Self {
        Self {
            cache,
            cipher,
            sink: Mutex::new(Box::new(std::io::stdout())),
        }
    }

    /// Send dry-run plaintext to `sink` instead of stdout.
    #[must_use]
    pub fn with_sink(mut self, sink: impl Write + Send + 'static) -> Self {
        self.sink = Mutex::new(Box::new(sink));
        self
    }

    pub fn cache(&self) -> &Arc<SourceCache> {
        &self.cache
    }

    /// Sync one app.
    ///
    /// # Errors
    ///
    /// - `ConfigError` if the app is unknown or its source doesn't resolve
    /// - `SourceError` if the tree cannot be fetched
    /// - `SyncError::FileNotFound` if a mapped file is absent; earlier files
    ///   of the app have been written and recorded
    /// - `StateError` if the state file cannot be saved, or
    ///   `SyncError::FileNotFoundUnsaved` when both happen
    pub fn sync_app(&self, ctx: &mut RuntimeContext, app: &str) -> Result<AppReport> {
        let key = ctx.config.resolve_source(app)?;
        let spec = ctx.config.app(app)?;
        let options = ctx.options;

        info!(app, source = %key, "syncing app");
        let tree = self.cache.get_or_fetch(&key)?;
        let snapshot = tree.snapshot();

        let mut report = AppReport::new(app, snapshot.commit());
        let mut missing = None;

        for file in &spec.files {
            let Some(blob) = snapshot.file(&file.path) else {
                error!(app, path = %file.path, "file not found in source tree");
                missing = Some(file.path.clone());
                break;
            };

            let outcome = self.sync_file(
                app,
                file,
                blob,
                &ctx.config,
                &mut ctx.state,
                &ctx.identities,
                options,
            );
            report.files.push(FileReport {
                path: file.path.clone(),
                outcome,
            });
        }

        let saved = if options.dry_run {
            Ok(())
        } else {
            ctx.state.save(&ctx.state_path)
        };

        match (missing, saved) {
            (None, Ok(())) => {}
            (None, Err(e)) => return Err(e),
            (Some(path), Ok(())) => {
                return Err(SyncError::FileNotFound {
                    app: app.to_string(),
                    path,
                }
                .into());
            }
            (Some(path), Err(e)) => {
                error!(app, error = %e, "failed to save state after missing file");
                return Err(SyncError::FileNotFoundUnsaved {
                    app: app.to_string(),
                    path,
                    source: Box::new(e),
                }
                .into());
            }
        }

        debug!(
            app,
            written = report.written(),
            up_to_date = report.up_to_date(),
            failed = report.failed(),
            "app synced"
        );
        Ok(report)
    }

    /// Sync every app in scope, continuing past failures.
    ///
    /// Stops before the next app once `cancel` is tripped.
    pub fn sync_each(&self, ctx: &mut RuntimeContext, cancel: &CancelToken) -> SyncSummary {
        let mut summary = SyncSummary::default();

        for app in ctx.selected_apps() {
            if cancel.is_cancelled() {
                info!("sync cancelled");
                summary.cancelled = true;
                break;
            }

            match self.sync_app(ctx, &app) {
                Ok(report) => summary.reports.push(report),
                Err(e) => {
                    error!(app = %app, error = %e, "app sync failed");
                    summary.failures.push((app, e));
                }
            }
        }

        summary
    }

    /// Sync every app in scope.
    ///
    /// # Errors
    ///
    /// Returns `SyncError::Apps` if any app failed; all apps are attempted.
    pub fn sync_all(&self, ctx: &mut RuntimeContext, cancel: &CancelToken) -> Result<Vec<AppReport>> {
        self.sync_each(ctx, cancel).into_result()
    }

    /// Check that every mapped file exists in its tree, without decrypting.
    pub fn validate(&self, config: &Config, apps: &[String]) -> ValidationReport {
        let mut report = ValidationReport::default();

        for app in apps {
            let resolved = config
                .resolve_source(app)
                .and_then(|key| Ok((config.app(app)?, key)));
            let (spec, key) = match resolved {
                Ok(found) => found,
                Err(e) => {
                    report.failures.push((app.clone(), e));
                    continue;
                }
            };

            let tree = match self.cache.get_or_fetch(&key) {
                Ok(tree) => tree,
                Err(e) => {
                    report.failures.push((app.clone(), e.into()));
                    continue;
                }
            };
            let snapshot = tree.snapshot();

            for file in &spec.files {
                if snapshot.contains(&file.path) {
                    report.checked += 1;
                } else {
                    warn!(app = %app, path = %file.path, "file not found in source tree");
                    report.missing.push((app.clone(), file.path.clone()));
                }
            }
        }

        report
    }

    #[allow(clippy::too_many_arguments)]
    fn sync_file(
        &self,
        app: &str,
        file: &FileMapping,
        blob: &[u8],
        config: &Config,
        state: &mut StateRecord,
        identities: &[Identity],
        options: SyncOptions,
    ) -> FileOutcome {
        let hash = hash_content(blob);

        if !options.force && !options.dry_run && state.is_current(app, &file.path, &hash) {
            debug!(app, path = %file.path, "up to date");
            return FileOutcome::UpToDate;
        }

        let plaintext = match self.cipher.decrypt(blob, identities) {
            Ok(plaintext) => Zeroizing::new(plaintext),
            Err(e) => {
                warn!(app, path = %file.path, error = %e, "failed to decrypt");
                return FileOutcome::DecryptFailed {
                    reason: e.to_string(),
                };
            }
        };

        let destination = config.destination(file);

        if options.dry_run {
            info!(app, path = %file.path, destination = %destination.display(), "dry run, not writing");
            let mut sink = self.sink.lock().unwrap_or_else(PoisonError::into_inner);
            if let Err(e) = sink.write_all(&plaintext).and_then(|()| sink.flush()) {
                warn!(error = %e, "failed to write dry-run output");
            }
            return FileOutcome::DryRun;
        }

        match fsutil::write_atomic(&destination, &plaintext) {
            Ok(()) => {
                state.record(app, &file.path, hash);
                info!(
                    app,
                    path = %file.path,
                    destination = %destination.display(),
                    bytes = plaintext.len(),
                    "decrypted"
                );
                FileOutcome::Written { destination }
            }
            Err(e) => {
                error!(app, destination = %destination.display(), error = %e, "failed to write");
                FileOutcome::WriteFailed {
                    destination,
                    reason: e.to_string(),
                }
            }
        }
    }
}
