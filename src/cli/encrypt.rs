//! Encrypt command - stand-alone age encryption.

use std::io::{Read, Write};
use std::path::Path;

use tracing::debug;

use crate::cli::{output, GlobalArgs};
use crate::core::cipher::{self, Age, Cipher};
use crate::core::config::Config;
use crate::core::constants::STDIO;
use crate::core::fsutil;
use crate::error::{CipherError, Result};

/// Encrypt `input` to `output` for the given recipients, falling back to
/// `age.recipients` from the config.
pub fn execute(global: &GlobalArgs, input: &str, out: &str, recipients: &[String]) -> Result<()> {
    let keys = if recipients.is_empty() {
        Config::load(&global.config)?.age.recipients
    } else {
        recipients.to_vec()
    };
    if keys.is_empty() {
        return Err(CipherError::NoRecipients.into());
    }
    let recipients = cipher::parse_recipients(&keys)?;

    let plaintext = zeroize::Zeroizing::new(read_input(input)?);
    let ciphertext = Age.encrypt(&plaintext, &recipients)?;
    debug!(recipients = recipients.len(), bytes = ciphertext.len(), "encrypted");

    if out == STDIO {
        let mut stdout = std::io::stdout().lock();
        stdout.write_all(&ciphertext)?;
        stdout.flush()?;
    } else {
        fsutil::write_private(Path::new(out), &ciphertext)?;
        output::success(&format!(
            "encrypted to {} for {} recipient(s)",
            output::path(out),
            recipients.len()
        ));
    }
    Ok(())
}

fn read_input(input: &str) -> Result<Vec<u8>> {
    if input == STDIO {
        let mut buf = Vec::new();
        std::io::stdin().lock().read_to_end(&mut buf)?;
        Ok(buf)
    } else {
        Ok(std::fs::read(input)?)
    }
}
