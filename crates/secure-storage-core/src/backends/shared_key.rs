//! Shared-key backend over a symmetric entity cipher
//!
//! Every alias is encrypted under the same key; aliases are kept apart by
//! binding the entity label `SECURE_STORAGE:{alias}:value` into each
//! ciphertext.
//!
//! `remove_key` is a documented no-op: deleting the shared key would make
//! the data of every other alias undecryptable. The call is logged at
//! `warn` and succeeds without touching key material.
//!
//! Concurrency: the backend holds no per-alias state, so any number of calls
//! may run at once; the shared key is created exactly once by the key chain.

use std::sync::Arc;
use tracing::warn;

use super::{decode_utf8, translate};
use crate::cipher::{CipherBackend, CipherIdentity, DecryptionResult, EncryptionResult, SecurityLevel};
use crate::error::Result;
use crate::platform::{Entity, EntityCipher};

/// Prefix of every entity label
pub const ENTITY_PREFIX: &str = "SECURE_STORAGE";

/// Backend over one shared symmetric key
pub struct SharedKeyBackend {
    cipher: Arc<dyn EntityCipher>,
    identity: CipherIdentity,
}

impl SharedKeyBackend {
    pub const NAME: &'static str = "SharedKeyAesGcm";
    pub const MIN_PLATFORM_VERSION: u32 = 16;

    pub fn new(cipher: Arc<dyn EntityCipher>) -> Self {
        Self {
            cipher,
            identity: CipherIdentity {
                name: Self::NAME,
                min_platform_version: Self::MIN_PLATFORM_VERSION,
                security_level: SecurityLevel::Any,
                supports_hardware: false,
                supports_biometry: false,
            },
        }
    }

    fn value_entity(alias: &str) -> Entity {
        Entity::create(format!("{}:{}:value", ENTITY_PREFIX, alias))
    }

    fn ensure_available(&self, alias: &str) -> Result<()> {
        if self.cipher.is_available() {
            Ok(())
        } else {
            Err(self.unavailable(alias, "Crypto is missing"))
        }
    }
}

impl CipherBackend for SharedKeyBackend {
    fn identity(&self) -> &CipherIdentity {
        &self.identity
    }

    fn encrypt(&self, alias: &str, plaintext: &str, level: SecurityLevel) -> Result<EncryptionResult> {
        self.ensure_level(alias, level)?;
        self.ensure_available(alias)?;

        let ciphertext = self
            .cipher
            .encrypt(plaintext.as_bytes(), &Self::value_entity(alias))
            .map_err(|e| translate(Self::NAME, alias, "Encryption", e))?;

        Ok(EncryptionResult {
            ciphertext,
            backend: Self::NAME,
        })
    }

    fn decrypt(&self, alias: &str, ciphertext: &[u8], level: SecurityLevel) -> Result<DecryptionResult> {
        self.ensure_level(alias, level)?;
        self.ensure_available(alias)?;

        let bytes = self
            .cipher
            .decrypt(ciphertext, &Self::value_entity(alias))
            .map_err(|e| translate(Self::NAME, alias, "Decryption", e))?;

        Ok(DecryptionResult::new(
            decode_utf8(Self::NAME, alias, bytes)?,
            SecurityLevel::Any,
        ))
    }

    fn remove_key(&self, alias: &str) -> Result<()> {
        warn!(
            "{} removeKey called for alias {}: the key is shared by all aliases and is kept",
            Self::NAME,
            alias
        );
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::StorageError;
    use crate::platform::memory::StaticKeyChain;
    use crate::platform::AesGcmEntityCipher;

    fn backend() -> (SharedKeyBackend, Arc<StaticKeyChain>) {
        let key_chain = Arc::new(StaticKeyChain::random());
        let cipher = AesGcmEntityCipher::new(key_chain.clone());
        (SharedKeyBackend::new(Arc::new(cipher)), key_chain)
    }

    #[test]
    fn test_roundtrip() {
        let (backend, _) = backend();

        let encrypted = backend.encrypt("token", "abc", SecurityLevel::Any).unwrap();
        assert_eq!(encrypted.backend, SharedKeyBackend::NAME);

        let decrypted = backend.decrypt("token", &encrypted.ciphertext, SecurityLevel::Any).unwrap();
        assert_eq!(decrypted.plaintext(), "abc");
        assert_eq!(decrypted.achieved_level, SecurityLevel::Any);
    }

    #[test]
    fn test_ciphertext_bound_to_alias() {
        let (backend, _) = backend();
        let encrypted = backend.encrypt("token", "abc", SecurityLevel::Any).unwrap();

        let err = backend
            .decrypt("other", &encrypted.ciphertext, SecurityLevel::Any)
            .unwrap_err();
        assert!(matches!(err, StorageError::CryptoFailure { .. }));
    }

    #[test]
    fn test_hardware_request_produces_no_ciphertext() {
        let (backend, _) = backend();

        let result = backend.encrypt("token", "abc", SecurityLevel::SecureHardware);
        assert!(matches!(
            result,
            Err(StorageError::InsufficientSecurityLevel { .. })
        ));
    }

    #[test]
    fn test_missing_crypto_is_unavailable() {
        let (backend, key_chain) = backend();
        key_chain.set_available(false);

        let err = backend.encrypt("token", "abc", SecurityLevel::Any).unwrap_err();
        assert!(matches!(err, StorageError::BackendUnavailable { .. }));
        assert!(err.to_string().contains("Crypto is missing"));
    }

    #[test]
    fn test_tampered_ciphertext() {
        let (backend, _) = backend();
        let mut encrypted = backend.encrypt("token", "abc", SecurityLevel::Any).unwrap();
        let last = encrypted.ciphertext.len() - 1;
        encrypted.ciphertext[last] ^= 0x80;

        let err = backend
            .decrypt("token", &encrypted.ciphertext, SecurityLevel::Any)
            .unwrap_err();
        assert!(matches!(err, StorageError::CryptoFailure { .. }));
        assert!(err.to_string().contains("token"));
    }

    #[test]
    fn test_remove_key_keeps_shared_key() {
        let (backend, _) = backend();
        let a = backend.encrypt("a", "first", SecurityLevel::Any).unwrap();
        let b = backend.encrypt("b", "second", SecurityLevel::Any).unwrap();

        backend.remove_key("a").unwrap();
        backend.remove_key("a").unwrap();

        // Other aliases, and the "removed" one, still decrypt
        let decrypted = backend.decrypt("b", &b.ciphertext, SecurityLevel::Any).unwrap();
        assert_eq!(decrypted.plaintext(), "second");
        let decrypted = backend.decrypt("a", &a.ciphertext, SecurityLevel::Any).unwrap();
        assert_eq!(decrypted.plaintext(), "first");
    }
}
