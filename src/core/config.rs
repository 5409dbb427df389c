//! Configuration file management.
//!
//! Handles reading, writing, and validating the YAML configuration that maps
//! apps to encrypted files in git repositories.

use std::collections::{BTreeMap, HashMap};
use std::path::{Path, PathBuf};
use std::time::Duration;

use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::core::constants;
use crate::core::source::SourceKey;
use crate::error::{ConfigError, Result};

/// Git source section. Either field may be left out to inherit the
/// top-level value.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct GitConfig {
    /// Repository URL or local path
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub repo: Option<String>,
    /// Branch name
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub branch: Option<String>,
}

impl GitConfig {
    pub fn new(repo: impl Into<String>, branch: impl Into<String>) -> Self {
        Self {
            repo: Some(repo.into()),
            branch: Some(branch.into()),
        }
    }

    fn repo(&self) -> Option<&str> {
        self.repo.as_deref().filter(|r| !r.trim().is_empty())
    }

    fn branch(&self) -> Option<&str> {
        self.branch.as_deref().filter(|b| !b.trim().is_empty())
    }

    /// Whether both repo and branch are set.
    pub fn is_valid(&self) -> bool {
        self.repo().is_some() && self.branch().is_some()
    }
}

/// One encrypted file and where its plaintext goes.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FileMapping {
    /// Path of the encrypted file within the source tree
    pub path: String,
    /// Destination of the plaintext; derived from `path` when absent
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub output: Option<PathBuf>,
}

impl FileMapping {
    pub fn new(path: impl Into<String>, output: Option<PathBuf>) -> Self {
        Self {
            path: path.into(),
            output,
        }
    }

    /// Destination path before any output directory is applied.
    ///
    /// Without an explicit output this is the base name of `path`, with the
    /// encrypted suffix swapped for the decrypted one.
    pub fn destination(&self) -> PathBuf {
        if let Some(output) = self.output.as_ref().filter(|o| !o.as_os_str().is_empty()) {
            return output.clone();
        }
        let base = self.path.rsplit('/').next().unwrap_or(&self.path);
        match base.strip_suffix(constants::ENCRYPTED_SUFFIX) {
            Some(stem) if !stem.is_empty() => {
                PathBuf::from(format!("{}{}", stem, constants::DECRYPTED_SUFFIX))
            }
            _ => PathBuf::from(base),
        }
    }
}

/// An app: a named group of file mappings sharing a source.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct AppSpec {
    /// Per-app source overrides
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub git: Option<GitConfig>,
    /// Files, processed in this order
    #[serde(default)]
    pub files: Vec<FileMapping>,
}

/// Age key material settings.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct AgeConfig {
    /// Single identity file
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub identity: Option<PathBuf>,
    /// Several identity files, used when `identity` is unset
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub identities: Vec<PathBuf>,
    /// Public keys used by `cellar encrypt`
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub recipients: Vec<String>,
}

/// Top-level configuration.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Config {
    /// Sync interval for `cellar watch` (e.g. `10m`, `1h30m`)
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub interval: Option<String>,
    /// Age key settings
    #[serde(default)]
    pub age: AgeConfig,
    /// State file location
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub state_path: Option<PathBuf>,
    /// Base directory for relative destinations
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub output_dir: Option<PathBuf>,
    /// Persistent git object cache; a temporary one is used when unset
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub cache_dir: Option<PathBuf>,
    /// Default source
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub git: Option<GitConfig>,
    /// Apps by name
    #[serde(default)]
    pub apps: BTreeMap<String, AppSpec>,
}

impl Config {
    /// Configuration written by `cellar init`.
    pub fn starter() -> Self {
        Self {
            interval: Some("10m".to_string()),
            state_path: Some(PathBuf::from(constants::STATE_FILE)),
            git: Some(GitConfig {
                repo: Some(String::new()),
                branch: Some(constants::DEFAULT_BRANCH.to_string()),
            }),
            ..Self::default()
        }
    }

    /// Load and validate configuration from `path`.
    ///
    /// # Errors
    ///
    /// Returns `ConfigError::NotFound` if the file doesn't exist,
    /// `ConfigError::Parse` if the YAML is malformed, or a validation error.
    pub fn load(path: &Path) -> Result<Self> {
        debug!(path = %path.display(), "loading config");

        if !path.exists() {
            return Err(ConfigError::NotFound(path.to_path_buf()).into());
        }
        let contents = std::fs::read_to_string(path).map_err(ConfigError::ReadFile)?;
        let config = Self::from_yaml(&contents)?;

        debug!(apps = config.apps.len(), "config loaded");
        Ok(config)
    }

    /// Parse and validate configuration from YAML text.
    ///
    /// # Errors
    ///
    /// Same as [`Config::load`], minus the file errors.
    pub fn from_yaml(contents: &str) -> Result<Self> {
        let config: Self = serde_yaml::from_str(contents).map_err(ConfigError::Parse)?;
        config.validate()?;
        Ok(config)
    }

    /// Write configuration to `path` with owner-only permissions.
    ///
    /// # Errors
    ///
    /// Returns error if serialization or the write fails.
    pub fn save(&self, path: &Path) -> Result<()> {
        debug!(path = %path.display(), "saving config");
        let contents = serde_yaml::to_string(self).map_err(ConfigError::Serialize)?;
        crate::core::fsutil::write_private(path, contents.as_bytes())?;
        Ok(())
    }

    /// Write the starter configuration to `path`.
    ///
    /// # Errors
    ///
    /// Returns `ConfigError::AlreadyExists` rather than overwrite a file.
    pub fn init(path: &Path) -> Result<Self> {
        if path.exists() {
            return Err(ConfigError::AlreadyExists(path.to_path_buf()).into());
        }
        let config = Self::starter();
        config.save(path)?;
        Ok(config)
    }

    /// Validate structure and contents.
    ///
    /// Checks:
    /// - Some git source is complete, globally or in at least one app
    /// - The interval parses
    /// - Every file mapping has a path
    /// - No two file mappings write the same destination
    ///
    /// # Errors
    ///
    /// Returns the first `ConfigError` found.
    pub fn validate(&self) -> Result<()> {
        debug!("validating config");

        let global_valid = self.git.as_ref().is_some_and(GitConfig::is_valid);
        let any_app_valid = self
            .apps
            .values()
            .any(|app| app.git.as_ref().is_some_and(GitConfig::is_valid));
        if !global_valid && !any_app_valid {
            return Err(ConfigError::NoSource.into());
        }

        self.interval()?;

        let mut seen: HashMap<PathBuf, String> = HashMap::new();
        for (name, app) in &self.apps {
            for file in &app.files {
                if file.path.trim().is_empty() {
                    return Err(ConfigError::InvalidValue {
                        field: "files.path",
                        reason: format!("empty path in app '{}'", name),
                    }
                    .into());
                }

                let label = format!("{}:{}", name, file.path);
                let dest = self.destination(file);
                if let Some(first) = seen.insert(dest.clone(), label.clone()) {
                    return Err(ConfigError::DestinationCollision {
                        path: dest,
                        first,
                        second: label,
                    }
                    .into());
                }
            }
        }

        Ok(())
    }

    /// Sync interval.
    ///
    /// # Errors
    ///
    /// Returns `ConfigError::InvalidInterval` if the value doesn't parse.
    pub fn interval(&self) -> Result<Duration> {
        match self.interval.as_deref().map(str::trim) {
            None | Some("") => Ok(constants::DEFAULT_INTERVAL),
            Some(value) => Ok(parse_interval(value)?),
        }
    }

    /// Look up an app.
    ///
    /// # Errors
    ///
    /// Returns `ConfigError::UnknownApp` listing the configured apps.
    pub fn app(&self, name: &str) -> Result<&AppSpec> {
        self.apps.get(name).ok_or_else(|| {
            ConfigError::UnknownApp {
                app: name.to_string(),
                available: self.apps.keys().cloned().collect(),
            }
            .into()
        })
    }

    /// Effective source for an app.
    ///
    /// The app's git section wins when both its repo and branch are set;
    /// otherwise the top-level section is used.
    ///
    /// # Errors
    ///
    /// Returns `ConfigError::UnknownApp` or `ConfigError::UnresolvedSource`.
    pub fn resolve_source(&self, name: &str) -> Result<SourceKey> {
        let app = self.app(name)?;
        let git = app
            .git
            .as_ref()
            .filter(|g| g.is_valid())
            .or_else(|| self.git.as_ref().filter(|g| g.is_valid()));

        match git.and_then(|g| Some((g.repo()?, g.branch()?))) {
            Some((repo, branch)) => Ok(SourceKey::new(repo, branch)),
            None => Err(ConfigError::UnresolvedSource {
                app: name.to_string(),
            }
            .into()),
        }
    }

    /// Final destination of a mapping, with the output directory applied to
    /// relative paths.
    pub fn destination(&self, file: &FileMapping) -> PathBuf {
        let dest = expand_home(&file.destination());
        match &self.output_dir {
            Some(dir) if dest.is_relative() => expand_home(dir).join(dest),
            _ => dest,
        }
    }

    /// Identity files, `identity` taking precedence over `identities`.
    pub fn identity_paths(&self) -> Vec<PathBuf> {
        match &self.age.identity {
            Some(path) if !path.as_os_str().is_empty() => vec![expand_home(path)],
            _ => self.age.identities.iter().map(|p| expand_home(p)).collect(),
        }
    }

    /// State file path, falling back to the default name.
    pub fn state_path(&self) -> PathBuf {
        self.state_path
            .as_deref()
            .filter(|p| !p.as_os_str().is_empty())
            .map(expand_home)
            .unwrap_or_else(|| PathBuf::from(constants::STATE_FILE))
    }

    /// Git cache directory, if configured.
    pub fn cache_dir(&self) -> Option<PathBuf> {
        self.cache_dir.as_deref().map(expand_home)
    }

    /// App names in processing order.
    pub fn app_names(&self) -> Vec<String> {
        self.apps.keys().cloned().collect()
    }
}

/// Expand a leading `~/` to the home directory.
pub fn expand_home(path: &Path) -> PathBuf {
    if let Ok(rest) = path.strip_prefix("~") {
        if let Some(home) = dirs::home_dir() {
            return home.join(rest);
        }
    }
    path.to_path_buf()
}

/// Parse a duration such as `90s`, `10m`, `1h30m` or `250ms`.
///
/// # Errors
///
/// Returns `ConfigError::InvalidInterval` for unknown units, missing units,
/// a zero duration, or one too large to represent.
pub fn parse_interval(value: &str) -> std::result::Result<Duration, ConfigError> {
    let invalid = |reason: &str| ConfigError::InvalidInterval {
        value: value.to_string(),
        reason: reason.to_string(),
    };

    let mut total = Duration::ZERO;
    let mut rest = value.trim();
    if rest.is_empty() {
        return Err(invalid("empty"));
    }

    while !rest.is_empty() {
        let num_len = rest
            .find(|c: char| !(c.is_ascii_digit() || c == '.'))
            .unwrap_or(rest.len());
        if num_len == 0 {
            return Err(invalid("expected a number"));
        }
        let amount: f64 = rest[..num_len]
            .parse()
            .map_err(|_| invalid("malformed number"))?;
        rest = &rest[num_len..];

        let unit_len = rest
            .find(|c: char| c.is_ascii_digit() || c == '.')
            .unwrap_or(rest.len());
        let seconds = match &rest[..unit_len] {
            "ms" => amount / 1000.0,
            "s" => amount,
            "m" => amount * 60.0,
            "h" => amount * 3600.0,
            "" => return Err(invalid("missing unit (ms, s, m, h)")),
            _ => return Err(invalid("unknown unit (expected ms, s, m, h)")),
        };
        rest = &rest[unit_len..];
        let part = Duration::try_from_secs_f64(seconds).map_err(|_| invalid("out of range"))?;
        total = total
            .checked_add(part)
            .ok_or_else(|| invalid("out of range"))?;
    }

    if total.is_zero() {
        return Err(invalid("must be greater than zero"));
    }
    Ok(total)
}
