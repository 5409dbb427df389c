//! Cryptographic operations.
//!
//! The sync pipeline only needs to decrypt a blob with a set of identities;
//! the CLI additionally encrypts and generates keys. Both go through the
//! [`Cipher`] trait so the engine never depends on a concrete backend.
//!
//! ## Adding a New Backend
//!
//! 1. Implement the `Cipher` trait
//! 2. Add the implementation in a new file next to `age.rs`
//! 3. Re-export from this module

use crate::error::Result;

mod age;

pub use self::age::{
    generate_identity, load_identities, parse_identities, parse_recipient, parse_recipients,
    write_identity, Age,
};

// Re-export the age key types so callers don't need a direct `age` import.
pub use ::age::x25519::{Identity, Recipient};

/// Cryptographic backend trait.
///
/// Implementations must be shareable across threads: the watcher drives the
/// sync engine from a blocking worker.
pub trait Cipher: Send + Sync {
    /// Type representing a recipient public key.
    type Recipient;

    /// Type representing a private identity/key.
    type Identity: Send + Sync;

    /// Encrypt `plaintext` so that any of `recipients` can decrypt it.
    ///
    /// # Errors
    ///
    /// Returns `CipherError::NoRecipients` for an empty recipient set,
    /// or `CipherError::EncryptionFailed` if encryption fails.
    fn encrypt(&self, plaintext: &[u8], recipients: &[Self::Recipient]) -> Result<Vec<u8>>;

    /// Decrypt `ciphertext` with the first matching identity.
    ///
    /// # Errors
    ///
    /// Returns `CipherError::DecryptionFailed` if no identity can unwrap the
    /// file key or the ciphertext is malformed.
    fn decrypt(&self, ciphertext: &[u8], identities: &[Self::Identity]) -> Result<Vec<u8>>;

    /// Backend name for display/logging.
    fn name(&self) -> &'static str;
}
