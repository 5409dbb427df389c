//! Init command - write a starter configuration.

use std::path::Path;

use tracing::info;

use crate::cli::output;
use crate::core::cipher;
use crate::core::config::Config;
use crate::error::{ConfigError, Result};

/// Create `config_path`, optionally with a fresh identity.
pub fn execute(config_path: &Path, identity: Option<&Path>) -> Result<()> {
    info!(path = %config_path.display(), "initializing");

    if let Some(identity) = identity {
        if identity.exists() {
            return Err(ConfigError::AlreadyExists(identity.to_path_buf()).into());
        }
    }

    let mut config = Config::init(config_path)?;
    output::success(&format!("created {}", output::path(config_path.display())));

    if let Some(identity) = identity {
        let public = cipher::write_identity(identity)?;
        config.age.identity = Some(identity.to_path_buf());
        config.age.recipients.push(public.clone());
        config.save(config_path)?;

        output::success(&format!("identity written to {}", output::path(identity.display())));
        output::kv("public key:", &public);
    }

    output::hint(&format!(
        "set git.repo and add apps in {}",
        config_path.display()
    ));
    Ok(())
}
