//! Legacy keystore backend
//!
//! For platforms whose keystore predates key attestation: per-alias keys
//! are kept by the keystore but their placement cannot be queried, so the
//! backend never claims more than `SECURE_SOFTWARE` and `key_info` is not
//! supported. Keys are always requested without a hardware requirement.
//!
//! Concurrency guarantees are those of [`super::KeystoreBackend`].

use std::sync::Arc;

use super::keystore::{decrypt_with_keystore, encrypt_with_keystore, remove_from_keystore};
use crate::cipher::{CipherBackend, CipherIdentity, DecryptionResult, EncryptionResult, SecurityLevel};
use crate::error::Result;
use crate::platform::{KeySpec, PlatformKeystore};

/// Backend over a keystore without placement reporting
pub struct LegacyKeystoreBackend {
    keystore: Arc<dyn PlatformKeystore>,
    identity: CipherIdentity,
}

impl LegacyKeystoreBackend {
    pub const NAME: &'static str = "KeystoreLegacy";
    pub const MIN_PLATFORM_VERSION: u32 = 18;

    pub fn new(keystore: Arc<dyn PlatformKeystore>) -> Self {
        Self {
            keystore,
            identity: CipherIdentity {
                name: Self::NAME,
                min_platform_version: Self::MIN_PLATFORM_VERSION,
                security_level: SecurityLevel::SecureSoftware,
                supports_hardware: false,
                supports_biometry: false,
            },
        }
    }
}

impl CipherBackend for LegacyKeystoreBackend {
    fn identity(&self) -> &CipherIdentity {
        &self.identity
    }

    fn encrypt(&self, alias: &str, plaintext: &str, level: SecurityLevel) -> Result<EncryptionResult> {
        self.ensure_level(alias, level)?;

        let ciphertext = encrypt_with_keystore(
            Self::NAME,
            self.keystore.as_ref(),
            &KeySpec::aes256(alias),
            plaintext,
        )?;

        Ok(EncryptionResult {
            ciphertext,
            backend: Self::NAME,
        })
    }

    fn decrypt(&self, alias: &str, ciphertext: &[u8], level: SecurityLevel) -> Result<DecryptionResult> {
        self.ensure_level(alias, level)?;

        let plaintext = decrypt_with_keystore(Self::NAME, self.keystore.as_ref(), alias, ciphertext)?;
        Ok(DecryptionResult::new(plaintext, SecurityLevel::SecureSoftware))
    }

    fn remove_key(&self, alias: &str) -> Result<()> {
        remove_from_keystore(Self::NAME, self.keystore.as_ref(), alias)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::StorageError;
    use crate::platform::memory::MemoryKeystore;

    #[test]
    fn test_roundtrip_reports_software() {
        // Even on hardware the legacy backend cannot attest placement
        let backend = LegacyKeystoreBackend::new(Arc::new(MemoryKeystore::hardware()));

        let encrypted = backend.encrypt("user", "alice", SecurityLevel::SecureSoftware).unwrap();
        let decrypted = backend
            .decrypt("user", &encrypted.ciphertext, SecurityLevel::SecureSoftware)
            .unwrap();

        assert_eq!(decrypted.plaintext(), "alice");
        assert_eq!(decrypted.achieved_level, SecurityLevel::SecureSoftware);
    }

    #[test]
    fn test_hardware_request_rejected() {
        let backend = LegacyKeystoreBackend::new(Arc::new(MemoryKeystore::hardware()));

        let err = backend
            .encrypt("user", "alice", SecurityLevel::SecureHardware)
            .unwrap_err();
        match err {
            StorageError::InsufficientSecurityLevel {
                requested,
                supported,
                backend,
                ..
            } => {
                assert_eq!(requested, SecurityLevel::SecureHardware);
                assert_eq!(supported, SecurityLevel::SecureSoftware);
                assert_eq!(backend, LegacyKeystoreBackend::NAME);
            }
            other => panic!("unexpected error: {other}"),
        }
    }

    #[test]
    fn test_key_info_not_supported() {
        let backend = LegacyKeystoreBackend::new(Arc::new(MemoryKeystore::new()));
        backend.encrypt("user", "alice", SecurityLevel::Any).unwrap();

        assert!(matches!(
            backend.key_info("user"),
            Err(StorageError::NotSupported { operation: "key_info", .. })
        ));
    }

    #[test]
    fn test_decrypt_under_other_alias_fails() {
        let backend = LegacyKeystoreBackend::new(Arc::new(MemoryKeystore::new()));
        let encrypted = backend.encrypt("a", "secret", SecurityLevel::Any).unwrap();
        backend.encrypt("b", "other", SecurityLevel::Any).unwrap();

        let err = backend.decrypt("b", &encrypted.ciphertext, SecurityLevel::Any).unwrap_err();
        assert!(matches!(err, StorageError::CryptoFailure { .. }));
    }
}
