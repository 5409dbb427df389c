//! Constants used throughout cellar.
//!
//! Centralizes file names, suffixes and environment variable names.

use std::time::Duration;

/// Default configuration file name.
pub const CONFIG_FILE: &str = "cellar.yaml";

/// Default state file name.
pub const STATE_FILE: &str = ".cellar-state.json";

/// Suffix marking an encrypted file in the source tree.
pub const ENCRYPTED_SUFFIX: &str = ".age";

/// Suffix given to a derived destination when the mapping has no output.
pub const DECRYPTED_SUFFIX: &str = ".env";

/// Default branch written by `cellar init`.
pub const DEFAULT_BRANCH: &str = "main";

/// Default sync interval used when the config leaves it empty.
pub const DEFAULT_INTERVAL: Duration = Duration::from_secs(600);

/// Marker for stdin/stdout in file arguments.
pub const STDIO: &str = "-";

/// Path to an SSH private key used for git authentication.
pub const ENV_SSH_KEY_FILE: &str = "CELLAR_GIT_SSH_KEY_FILE";

/// Passphrase for the SSH private key.
pub const ENV_SSH_KEY_PASSWORD: &str = "CELLAR_GIT_SSH_KEY_PASSWORD";

/// Bearer token used as HTTP basic password for git.
pub const ENV_GIT_TOKEN: &str = "CELLAR_GIT_TOKEN";

/// Username presented alongside a token.
pub const TOKEN_USERNAME: &str = "cellar";

/// Log filter override.
pub const ENV_LOG: &str = "CELLAR_LOG";
