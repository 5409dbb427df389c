//! Age encryption backend implementation.
//!
//! Decrypts binary or ASCII-armored age files with x25519 identities and
//! encrypts to ASCII armor.

use std::fs;
use std::io::{Read, Write};
use std::path::Path;

use ::age::secrecy::ExposeSecret;
use ::age::x25519;
use tracing::{debug, trace};

use super::Cipher;
use crate::core::fsutil::{create_dirs, write_private};
use crate::error::{CipherError, Result};

/// Age-based cryptographic backend using x25519 keys
#[derive(Debug, Clone, Copy, Default)]
pub struct Age;

impl Cipher for Age {
    type Recipient = x25519::Recipient;
    type Identity = x25519::Identity;

    fn name(&self) -> &'static str {
        "age"
    }

    fn encrypt(&self, plaintext: &[u8], recipients: &[x25519::Recipient]) -> Result<Vec<u8>> {
        trace!(
            recipients = recipients.len(),
            plaintext_len = plaintext.len(),
            "encrypting"
        );

        if recipients.is_empty() {
            return Err(CipherError::NoRecipients.into());
        }

        let encryptor =
            age::Encryptor::with_recipients(recipients.iter().map(|r| r as &dyn age::Recipient))
                .map_err(|e| CipherError::EncryptionFailed(format!("{}", e)))?;

        let mut encrypted = Vec::new();
        let mut writer = encryptor
            .wrap_output(age::armor::ArmoredWriter::wrap_output(
                &mut encrypted,
                age::armor::Format::AsciiArmor,
            )?)
            .map_err(|e| CipherError::EncryptionFailed(format!("{}", e)))?;

        writer.write_all(plaintext)?;
        let armored = writer
            .finish()
            .map_err(|e| CipherError::EncryptionFailed(format!("{}", e)))?;
        armored
            .finish()
            .map_err(|e| CipherError::ArmorFailed(format!("{}", e)))?;

        trace!(ciphertext_len = encrypted.len(), "encrypted");

        Ok(encrypted)
    }

    fn decrypt(&self, ciphertext: &[u8], identities: &[x25519::Identity]) -> Result<Vec<u8>> {
        trace!(
            ciphertext_len = ciphertext.len(),
            identities = identities.len(),
            "decrypting"
        );

        if identities.is_empty() {
            return Err(CipherError::NoIdentities.into());
        }

        // ArmoredReader passes binary input through untouched.
        let reader = age::armor::ArmoredReader::new(ciphertext);
        let decryptor = age::Decryptor::new(reader)
            .map_err(|e| CipherError::DecryptionFailed(format!("{}", e)))?;

        let mut reader = decryptor
            .decrypt(identities.iter().map(|i| i as &dyn age::Identity))
            .map_err(|e| CipherError::DecryptionFailed(format!("{}", e)))?;

        let mut decrypted = Vec::new();
        reader
            .read_to_end(&mut decrypted)
            .map_err(|e| CipherError::DecryptionFailed(format!("{}", e)))?;

        trace!(plaintext_len = decrypted.len(), "decrypted");

        Ok(decrypted)
    }
}

/// Parse a public key string into an age recipient
///
/// # Errors
///
/// Returns `CipherError::InvalidPublicKey` if the key format is invalid.
pub fn parse_recipient(key: &str) -> Result<x25519::Recipient> {
    key.trim()
        .parse::<x25519::Recipient>()
        .map_err(|_| CipherError::InvalidPublicKey(key.to_string()).into())
}

/// Parse a list of public keys, skipping blank entries.
///
/// # Errors
///
/// Returns `CipherError::NoRecipients` if nothing is left after skipping
/// blanks, or `CipherError::InvalidPublicKey` for the first bad key.
pub fn parse_recipients<S: AsRef<str>>(keys: &[S]) -> Result<Vec<x25519::Recipient>> {
    let recipients = keys
        .iter()
        .map(AsRef::as_ref)
        .filter(|k| !k.trim().is_empty())
        .map(parse_recipient)
        .collect::<Result<Vec<_>>>()?;

    if recipients.is_empty() {
        return Err(CipherError::NoRecipients.into());
    }
    Ok(recipients)
}

/// Parse identity material: one `AGE-SECRET-KEY-1...` per line.
///
/// Blank lines and `#` comments are ignored. `source_name` only labels
/// errors.
///
/// # Errors
///
/// Returns `CipherError::InvalidIdentity` for a malformed line or when the
/// material holds no identity at all.
pub fn parse_identities(material: &str, source_name: &str) -> Result<Vec<x25519::Identity>> {
    let mut identities = Vec::new();

    for (lineno, line) in material.lines().enumerate() {
        let line = line.trim();
        if line.is_empty() || line.starts_with('#') {
            continue;
        }
        let identity = line
            .parse::<x25519::Identity>()
            .map_err(|e: &str| CipherError::InvalidIdentity {
                source_name: source_name.to_string(),
                reason: format!("line {}: {}", lineno + 1, e),
            })?;
        identities.push(identity);
    }

    if identities.is_empty() {
        return Err(CipherError::InvalidIdentity {
            source_name: source_name.to_string(),
            reason: "no identities found".to_string(),
        }
        .into());
    }

    Ok(identities)
}

/// Read and parse identities from every path, in order.
///
/// # Errors
///
/// Returns an I/O error if a file can't be read, or `CipherError` if a file
/// holds malformed material.
pub fn load_identities<P: AsRef<Path>>(paths: &[P]) -> Result<Vec<x25519::Identity>> {
    let mut all = Vec::new();
    for path in paths {
        let path = path.as_ref();
        debug!(path = %path.display(), "loading identities");
        let material = fs::read_to_string(path)?;
        all.extend(parse_identities(&material, &path.display().to_string())?);
    }
    Ok(all)
}

/// Generate a fresh key pair.
///
/// Returns `(secret, public)` in their string encodings. Persisting the
/// secret is the caller's job; see [`write_identity`].
pub fn generate_identity() -> (String, String) {
    let identity = x25519::Identity::generate();
    let secret = identity.to_string().expose_secret().to_string();
    let public = identity.to_public().to_string();
    (secret, public)
}

/// Generate a key pair and store it at `path` (mode 0600) with the public
/// key alongside at `<path>.pub`.
///
/// # Errors
///
/// Returns an I/O error if the directory or files cannot be written.
pub fn write_identity(path: &Path) -> Result<String> {
    let (secret, public) = generate_identity();
    let secret = zeroize::Zeroizing::new(secret);

    if let Some(dir) = path.parent().filter(|d| !d.as_os_str().is_empty()) {
        create_dirs(dir, 0o700)?;
    }

    let created = chrono::Utc::now().to_rfc3339();
    let contents = format!(
        "# created: {}\n# public key: {}\n{}\n",
        created,
        public,
        secret.as_str()
    );
    write_private(path, contents.as_bytes())?;
    fs::write(path.with_extension(pub_extension(path)), format!("{}\n", public))?;

    debug!(path = %path.display(), "identity written");
    Ok(public)
}

fn pub_extension(path: &Path) -> String {
    match path.extension() {
        Some(ext) => format!("{}.pub", ext.to_string_lossy()),
        None => "pub".to_string(),
    }
}
