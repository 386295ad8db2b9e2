//! Cipher backend trait definition

use super::types::{CipherIdentity, DecryptionResult, EncryptionResult, KeyInfo, SecurityLevel};
use crate::error::{Result, StorageError};

/// Uniform contract implemented by every storage strategy
///
/// Implementations hold no state shared with other backends. Each one
/// documents whether `remove_key` really deletes key material and what it
/// guarantees for concurrent calls on the same alias.
pub trait CipherBackend: Send + Sync {
    /// Static capabilities, used by the registry only
    fn identity(&self) -> &CipherIdentity;

    /// Encrypt `plaintext` under the key for `alias`
    ///
    /// Fails with `InsufficientSecurityLevel` when `level` exceeds the
    /// declared level, `BackendUnavailable` when the primitive is not ready,
    /// and `CryptoFailure` for any lower-level fault.
    fn encrypt(&self, alias: &str, plaintext: &str, level: SecurityLevel)
        -> Result<EncryptionResult>;

    /// Decrypt `ciphertext` produced by this backend for `alias`
    ///
    /// Same preconditions as `encrypt`; integrity failures surface as
    /// `CryptoFailure`.
    fn decrypt(&self, alias: &str, ciphertext: &[u8], level: SecurityLevel)
        -> Result<DecryptionResult>;

    /// Best-effort removal of the key material for `alias`
    fn remove_key(&self, alias: &str) -> Result<()>;

    /// Placement of the key for `alias`
    ///
    /// Optional capability: backends without per-alias keys, or whose
    /// platform cannot report placement, keep this default.
    fn key_info(&self, alias: &str) -> Result<KeyInfo> {
        Err(self.not_supported(alias, "key_info"))
    }

    /// Backend name from the identity
    fn name(&self) -> &'static str {
        self.identity().name
    }

    /// Reject requests above the declared level
    fn ensure_level(&self, alias: &str, requested: SecurityLevel) -> Result<()> {
        let supported = self.identity().security_level;
        if supported.satisfies(requested) {
            Ok(())
        } else {
            Err(StorageError::InsufficientSecurityLevel {
                alias: alias.to_string(),
                backend: self.name().to_string(),
                requested,
                supported,
            })
        }
    }

    /// Build a `CryptoFailure` for this backend
    fn crypto_failure(&self, alias: &str, reason: impl Into<String>) -> StorageError
    where
        Self: Sized,
    {
        StorageError::CryptoFailure {
            alias: alias.to_string(),
            backend: self.name().to_string(),
            reason: reason.into(),
        }
    }

    /// Build a `BackendUnavailable` for this backend
    fn unavailable(&self, alias: &str, reason: impl Into<String>) -> StorageError
    where
        Self: Sized,
    {
        StorageError::BackendUnavailable {
            alias: alias.to_string(),
            backend: self.name().to_string(),
            reason: reason.into(),
        }
    }

    /// Build a `NotSupported` for this backend
    fn not_supported(&self, alias: &str, operation: &'static str) -> StorageError {
        StorageError::NotSupported {
            alias: alias.to_string(),
            backend: self.name().to_string(),
            operation,
        }
    }
}
