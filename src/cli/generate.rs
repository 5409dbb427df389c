//! Generate command - create an age key pair.

use std::path::Path;

use crate::cli::output;
use crate::core::cipher;
use crate::error::{ConfigError, Result};

/// Write a new identity to `path`, or print it to stdout.
pub fn execute(path: Option<&Path>) -> Result<()> {
    let Some(path) = path else {
        let (secret, public) = cipher::generate_identity();
        let secret = zeroize::Zeroizing::new(secret);
        println!("# public key: {}", public);
        println!("{}", secret.as_str());
        return Ok(());
    };

    if path.exists() {
        return Err(ConfigError::AlreadyExists(path.to_path_buf()).into());
    }

    let public = cipher::write_identity(path)?;
    output::success(&format!("identity written to {}", output::path(path.display())));
    output::kv("public key:", &public);
    Ok(())
}
