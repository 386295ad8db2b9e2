//! Single entry point for encrypt / decrypt / remove-key calls
//!
//! Each call is a fresh traversal `Idle -> Selecting -> Delegating ->
//! Succeeded | Failed`; nothing is carried over between calls. Failures are
//! propagated unchanged apart from filling in the alias and the selected
//! backend's name. There are no retries.

use std::fmt;
use std::sync::Arc;
use tracing::{debug, warn};

use crate::cipher::{CipherBackend, DecryptionResult, EncryptionResult, KeyInfo, SecurityLevel};
use crate::error::{Result, StorageError};
use crate::registry::BackendRegistry;

/// Phase of a facade call, used for tracing
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CallState {
    Idle,
    Selecting,
    Delegating,
    Succeeded,
    Failed,
}

impl fmt::Display for CallState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Self::Idle => "idle",
            Self::Selecting => "selecting",
            Self::Delegating => "delegating",
            Self::Succeeded => "succeeded",
            Self::Failed => "failed",
        };
        f.write_str(name)
    }
}

/// How the backend for a call is chosen
enum Target<'a> {
    /// Strongest backend satisfying the level
    Select(SecurityLevel),
    /// The backend that produced earlier output
    Named(&'a str),
}

/// Facade over a backend registry
#[derive(Clone)]
pub struct SecureStorageFacade {
    registry: BackendRegistry,
}

impl SecureStorageFacade {
    pub fn new(registry: BackendRegistry) -> Self {
        Self { registry }
    }

    /// The underlying registry
    pub fn registry(&self) -> &BackendRegistry {
        &self.registry
    }

    /// Encrypt `plaintext` for `alias` with the best backend for `level`
    pub fn encrypt(&self, alias: &str, plaintext: &str, level: SecurityLevel) -> Result<EncryptionResult> {
        self.run("encrypt", alias, Target::Select(level), |backend| {
            backend.encrypt(alias, plaintext, level)
        })
    }

    /// Decrypt with the best backend for `level`
    pub fn decrypt(&self, alias: &str, ciphertext: &[u8], level: SecurityLevel) -> Result<DecryptionResult> {
        self.run("decrypt", alias, Target::Select(level), |backend| {
            backend.decrypt(alias, ciphertext, level)
        })
    }

    /// Decrypt with the backend that produced the ciphertext
    pub fn decrypt_with(
        &self,
        backend: &str,
        alias: &str,
        ciphertext: &[u8],
        level: SecurityLevel,
    ) -> Result<DecryptionResult> {
        self.run("decrypt", alias, Target::Named(backend), |backend| {
            backend.decrypt(alias, ciphertext, level)
        })
    }

    /// Remove the key for `alias` from the best backend for `level`
    pub fn remove_key(&self, alias: &str, level: SecurityLevel) -> Result<()> {
        self.run("remove_key", alias, Target::Select(level), |backend| {
            backend.remove_key(alias)
        })
    }

    /// Remove the key for `alias` from a named backend
    pub fn remove_key_with(&self, backend: &str, alias: &str) -> Result<()> {
        self.run("remove_key", alias, Target::Named(backend), |backend| {
            backend.remove_key(alias)
        })
    }

    /// Key placement for `alias` on the best backend for `level`
    pub fn key_info(&self, alias: &str, level: SecurityLevel) -> Result<KeyInfo> {
        self.run("key_info", alias, Target::Select(level), |backend| {
            backend.key_info(alias)
        })
    }

    fn run<T>(
        &self,
        operation: &'static str,
        alias: &str,
        target: Target<'_>,
        call: impl FnOnce(&dyn CipherBackend) -> Result<T>,
    ) -> Result<T> {
        debug!("{} '{}': {}", operation, alias, CallState::Idle);

        if alias.is_empty() {
            warn!("{} rejected: empty alias", operation);
            return Err(StorageError::InvalidRequest("alias must not be empty".to_string()));
        }

        debug!("{} '{}': {}", operation, alias, CallState::Selecting);
        let backend: Arc<dyn CipherBackend> = match target {
            Target::Select(level) => self.registry.select(level),
            Target::Named(name) => self.registry.find(name),
        }
        .map_err(|e| {
            debug!("{} '{}': {} ({})", operation, alias, CallState::Failed, e);
            e.for_alias(alias)
        })?;

        let name = backend.name();
        debug!("{} '{}': {} to {}", operation, alias, CallState::Delegating, name);

        match call(backend.as_ref()) {
            Ok(value) => {
                debug!("{} '{}': {} on {}", operation, alias, CallState::Succeeded, name);
                Ok(value)
            }
            Err(e) => {
                warn!("{} '{}': {} on {}: {}", operation, alias, CallState::Failed, name, e);
                Err(e.for_alias(alias).with_backend(name))
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::backends::{KeystoreBackend, SharedKeyBackend};
    use crate::platform::memory::{MemoryKeystore, StaticKeyChain};
    use crate::platform::AesGcmEntityCipher;
    use crate::registry::tests::StubBackend;
    use crate::registry::RegistryConfig;

    fn shared_key_backend() -> Arc<dyn CipherBackend> {
        let cipher = AesGcmEntityCipher::new(Arc::new(StaticKeyChain::random()));
        Arc::new(SharedKeyBackend::new(Arc::new(cipher)))
    }

    fn facade(hardware: bool) -> SecureStorageFacade {
        let keystore = if hardware {
            MemoryKeystore::hardware()
        } else {
            MemoryKeystore::new()
        };
        let registry = BackendRegistry::new(
            RegistryConfig::new(30)
                .register(shared_key_backend())
                .register(Arc::new(KeystoreBackend::new(Arc::new(keystore)))),
        );
        SecureStorageFacade::new(registry)
    }

    #[test]
    fn test_roundtrip_through_selected_backend() {
        let facade = facade(true);

        let encrypted = facade.encrypt("pin", "1234", SecurityLevel::Any).unwrap();
        assert_eq!(encrypted.backend, KeystoreBackend::NAME);

        let decrypted = facade
            .decrypt("pin", &encrypted.ciphertext, SecurityLevel::Any)
            .unwrap();
        assert_eq!(decrypted.plaintext(), "1234");
        assert_eq!(decrypted.achieved_level, SecurityLevel::SecureHardware);
    }

    #[test]
    fn test_decrypt_with_producing_backend() {
        let facade = facade(true);
        let backend = facade.registry().find(SharedKeyBackend::NAME).unwrap();
        let encrypted = backend.encrypt("pin", "1234", SecurityLevel::Any).unwrap();

        let decrypted = facade
            .decrypt_with(encrypted.backend, "pin", &encrypted.ciphertext, SecurityLevel::Any)
            .unwrap();
        assert_eq!(decrypted.plaintext(), "1234");
    }

    #[test]
    fn test_no_eligible_backend_carries_alias() {
        let facade = facade(false);

        let err = facade
            .encrypt("pin", "1234", SecurityLevel::SecureHardware)
            .unwrap_err();
        assert!(matches!(err, StorageError::NoEligibleBackend { .. }));
        assert_eq!(err.alias(), Some("pin"));
    }

    #[test]
    fn test_tampered_ciphertext_propagates_crypto_failure() {
        let facade = facade(false);
        let mut encrypted = facade.encrypt("pin", "1234", SecurityLevel::Any).unwrap();
        encrypted.ciphertext[0] ^= 0x01;

        let err = facade
            .decrypt("pin", &encrypted.ciphertext, SecurityLevel::Any)
            .unwrap_err();
        assert!(matches!(err, StorageError::CryptoFailure { .. }));
        assert_eq!(err.backend(), Some(KeystoreBackend::NAME));
    }

    #[test]
    fn test_unknown_backend_name() {
        let facade = facade(false);
        let err = facade
            .decrypt_with("Retired", "pin", b"", SecurityLevel::Any)
            .unwrap_err();
        assert!(matches!(err, StorageError::UnknownBackend { .. }));
        assert_eq!(err.alias(), Some("pin"));
        assert_eq!(err.backend(), Some("Retired"));
    }

    #[test]
    fn test_empty_alias_rejected() {
        let facade = facade(false);
        let err = facade.encrypt("", "1234", SecurityLevel::Any).unwrap_err();
        assert!(matches!(err, StorageError::InvalidRequest(_)));
    }

    #[test]
    fn test_key_info_not_supported_on_stub() {
        let registry = BackendRegistry::new(
            RegistryConfig::new(1).register(StubBackend::new("stub", SecurityLevel::Any)),
        );
        let facade = SecureStorageFacade::new(registry);

        let err = facade.key_info("pin", SecurityLevel::Any).unwrap_err();
        assert!(matches!(err, StorageError::NotSupported { .. }));
        assert_eq!(err.backend(), Some("stub"));
    }

    #[test]
    fn test_remove_key_twice() {
        let facade = facade(true);
        let encrypted = facade.encrypt("pin", "1234", SecurityLevel::Any).unwrap();

        facade.remove_key("pin", SecurityLevel::Any).unwrap();
        facade.remove_key("pin", SecurityLevel::Any).unwrap();

        assert!(facade
            .decrypt("pin", &encrypted.ciphertext, SecurityLevel::Any)
            .is_err());
    }

    #[test]
    fn test_concurrent_distinct_aliases() {
        let facade = facade(true);

        std::thread::scope(|scope| {
            for i in 0..8 {
                let facade = &facade;
                scope.spawn(move || {
                    let alias = format!("alias-{}", i);
                    let value = format!("value-{}", i);
                    for _ in 0..20 {
                        let encrypted = facade.encrypt(&alias, &value, SecurityLevel::Any).unwrap();
                        let decrypted = facade
                            .decrypt(&alias, &encrypted.ciphertext, SecurityLevel::Any)
                            .unwrap();
                        assert_eq!(decrypted.plaintext(), value);
                    }
                });
            }
        });
    }
}
