//! External cryptographic collaborators
//!
//! Backends never implement primitives themselves. They consume:
//! - [`PlatformKeystore`]: per-alias key management (OS keychain, Android Keystore, ...)
//! - [`EntityCipher`]: a symmetric library binding an entity label into each ciphertext
//! - [`KeyChain`]: the single key behind an `EntityCipher`
//!
//! Shipped implementations use the OS keychain (`keyring`), AES-256-GCM and
//! Argon2id. The in-memory ones in [`memory`] exist for tests.

mod entity_cipher;
mod keychain;
mod keyring_keystore;
mod keystore;
pub mod memory;

pub use entity_cipher::{AesGcmEntityCipher, Entity, EntityCipher};
pub use keychain::{FileKeyChain, KeyChain, PassphraseKeyChain};
pub use keyring_keystore::{KeyringKeystore, DEFAULT_SERVICE};
pub use keystore::{KeySpec, PlatformKeystore};

use thiserror::Error;

/// Failure reported by a collaborator
///
/// Backends translate these into the cipher contract's errors, adding the
/// alias and their own name.
#[derive(Error, Debug)]
pub enum PlatformError {
    #[error("not ready: {0}")]
    Unavailable(String),

    #[error("no key for alias '{0}'")]
    KeyNotFound(String),

    #[error("unsupported: {0}")]
    Unsupported(String),

    #[error("{0}")]
    Crypto(String),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

impl From<crate::crypto::AeadError> for PlatformError {
    fn from(e: crate::crypto::AeadError) -> Self {
        Self::Crypto(e.to_string())
    }
}

/// Result type alias for collaborator calls
pub type PlatformResult<T> = std::result::Result<T, PlatformError>;
