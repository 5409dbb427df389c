//! Per-invocation runtime context.

use std::path::PathBuf;

use tracing::debug;

use crate::core::cipher::{self, Identity};
use crate::core::config::{self, Config};
use crate::core::constants;
use crate::core::state::StateRecord;
use crate::error::{ConfigError, Result};

/// Execution flags for a sync run.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct SyncOptions {
    /// Decrypt and write even when the content hash is unchanged
    pub force: bool,
    /// Print plaintext instead of writing files or touching state
    pub dry_run: bool,
}

/// Inputs for [`RuntimeContext::build`], usually straight from the CLI.
#[derive(Debug, Clone, Default)]
pub struct RuntimeOptions {
    /// Configuration file; defaults to `cellar.yaml`
    pub config_path: Option<PathBuf>,
    /// Overrides `statePath` from the config
    pub state_path: Option<PathBuf>,
    /// Overrides the configured identity files
    pub identities: Vec<PathBuf>,
    /// Restrict the run to one app
    pub app: Option<String>,
    pub sync: SyncOptions,
}

/// Everything one invocation needs: configuration, state, key material and
/// the selected scope. Owned exclusively by that invocation.
pub struct RuntimeContext {
    pub config: Config,
    pub state: StateRecord,
    pub state_path: PathBuf,
    pub identities: Vec<Identity>,
    pub app: Option<String>,
    pub options: SyncOptions,
}

impl std::fmt::Debug for RuntimeContext {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("RuntimeContext")
            .field("state_path", &self.state_path)
            .field("identities", &self.identities.len())
            .field("app", &self.app)
            .field("options", &self.options)
            .finish_non_exhaustive()
    }
}

impl RuntimeContext {
    /// Assemble a context from already-loaded parts.
    pub fn new(
        config: Config,
        state: StateRecord,
        state_path: PathBuf,
        identities: Vec<Identity>,
    ) -> Self {
        Self {
            config,
            state,
            state_path,
            identities,
            app: None,
            options: SyncOptions::default(),
        }
    }

    /// Load configuration, state and identities.
    ///
    /// # Errors
    ///
    /// Fails before any sync work if the config is missing or invalid, no
    /// identity is configured, an identity file is unreadable, the state file
    /// is malformed, or the requested app doesn't exist.
    pub fn build(options: RuntimeOptions) -> Result<Self> {
        let config_path = options
            .config_path
            .unwrap_or_else(|| PathBuf::from(constants::CONFIG_FILE));
        let config = Config::load(&config_path)?;

        if let Some(app) = &options.app {
            config.app(app)?;
        }

        let identity_paths = if options.identities.is_empty() {
            config.identity_paths()
        } else {
            options
                .identities
                .iter()
                .map(|p| config::expand_home(p))
                .collect()
        };
        if identity_paths.is_empty() {
            return Err(ConfigError::NoIdentities.into());
        }
        let identities = cipher::load_identities(&identity_paths)?;
        if identities.is_empty() {
            return Err(ConfigError::NoIdentities.into());
        }

        let state_path = options
            .state_path
            .map(|p| config::expand_home(&p))
            .unwrap_or_else(|| config.state_path());
        let state = StateRecord::load(&state_path)?;

        debug!(
            config = %config_path.display(),
            state = %state_path.display(),
            identities = identities.len(),
            "runtime context ready"
        );

        Ok(Self {
            config,
            state,
            state_path,
            identities,
            app: options.app,
            options: options.sync,
        })
    }

    /// Restrict the run to one app.
    #[must_use]
    pub fn with_app(mut self, app: impl Into<String>) -> Self {
        self.app = Some(app.into());
        self
    }

    #[must_use]
    pub fn with_options(mut self, options: SyncOptions) -> Self {
        self.options = options;
        self
    }

    /// Apps in scope: the selected one, or all configured apps in order.
    pub fn selected_apps(&self) -> Vec<String> {
        match &self.app {
            Some(app) => vec![app.clone()],
            None => self.config.app_names(),
        }
    }
}
