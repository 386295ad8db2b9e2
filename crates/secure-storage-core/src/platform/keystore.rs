//! Platform key-management primitive

use super::PlatformResult;
use crate::cipher::KeyInfo;

/// Parameters for generating a per-alias key
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct KeySpec {
    pub alias: String,
    /// Key size in bits
    pub key_size: u32,
    /// Refuse to create the key outside secure hardware
    pub require_hardware: bool,
}

impl KeySpec {
    /// AES-256 spec for an alias
    pub fn aes256(alias: &str) -> Self {
        Self {
            alias: alias.to_string(),
            key_size: 256,
            require_hardware: false,
        }
    }

    pub fn with_hardware(mut self, require_hardware: bool) -> Self {
        self.require_hardware = require_hardware;
        self
    }
}

/// Per-alias key management with encryption performed next to the key
///
/// Platform implementations should keep key material non-exportable where
/// the platform supports it. Implementations must be safe to call from
/// several threads; whether calls on the same alias are serialized is up to
/// the platform and must be documented by the implementation.
pub trait PlatformKeystore: Send + Sync {
    /// Whether the keystore can currently be used (e.g. device unlocked)
    fn is_ready(&self) -> bool;

    /// Whether generated keys live in secure hardware
    fn is_hardware_backed(&self) -> bool;

    /// Whether a key exists for `alias`
    fn contains_key(&self, alias: &str) -> PlatformResult<bool>;

    /// Create a key as described by `spec`
    fn generate_key(&self, spec: &KeySpec) -> PlatformResult<()>;

    /// Encrypt with the key for `alias`
    fn encrypt(&self, alias: &str, plaintext: &[u8]) -> PlatformResult<Vec<u8>>;

    /// Decrypt with the key for `alias`
    fn decrypt(&self, alias: &str, ciphertext: &[u8]) -> PlatformResult<Vec<u8>>;

    /// Where the key for `alias` lives
    fn key_info(&self, alias: &str) -> PlatformResult<KeyInfo>;

    /// Delete the key for `alias`; returns whether a key existed
    fn delete_key(&self, alias: &str) -> PlatformResult<bool>;
}
