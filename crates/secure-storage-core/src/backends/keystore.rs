//! Platform keystore backend
//!
//! One key per alias, generated on first encrypt and kept by the platform
//! keystore. The declared level is read from the keystore once, at
//! construction; the level reported on decrypt comes from the key's own
//! placement.
//!
//! Concurrency: calls on the same alias are serialized only as far as the
//! platform keystore serializes them. Two first-time encrypts racing on one
//! alias may each generate a key; the last one wins and ciphertext from the
//! other no longer decrypts.

use std::sync::Arc;
use tracing::{debug, warn};

use super::{decode_utf8, translate};
use crate::cipher::{
    CipherBackend, CipherIdentity, DecryptionResult, EncryptionResult, KeyInfo, SecurityLevel,
};
use crate::error::Result;
use crate::platform::{KeySpec, PlatformKeystore};

/// Backend over a per-alias platform keystore
pub struct KeystoreBackend {
    keystore: Arc<dyn PlatformKeystore>,
    identity: CipherIdentity,
}

impl KeystoreBackend {
    pub const NAME: &'static str = "KeystoreAesGcm";
    pub const MIN_PLATFORM_VERSION: u32 = 23;

    pub fn new(keystore: Arc<dyn PlatformKeystore>) -> Self {
        let hardware = keystore.is_hardware_backed();
        let security_level = if hardware {
            SecurityLevel::SecureHardware
        } else {
            SecurityLevel::SecureSoftware
        };

        debug!("{} declares level {}", Self::NAME, security_level);

        Self {
            keystore,
            identity: CipherIdentity {
                name: Self::NAME,
                min_platform_version: Self::MIN_PLATFORM_VERSION,
                security_level,
                supports_hardware: hardware,
                supports_biometry: false,
            },
        }
    }
}

impl CipherBackend for KeystoreBackend {
    fn identity(&self) -> &CipherIdentity {
        &self.identity
    }

    fn encrypt(&self, alias: &str, plaintext: &str, level: SecurityLevel) -> Result<EncryptionResult> {
        self.ensure_level(alias, level)?;

        let spec = KeySpec::aes256(alias).with_hardware(self.identity.supports_hardware);
        let ciphertext = encrypt_with_keystore(Self::NAME, self.keystore.as_ref(), &spec, plaintext)?;

        Ok(EncryptionResult {
            ciphertext,
            backend: Self::NAME,
        })
    }

    fn decrypt(&self, alias: &str, ciphertext: &[u8], level: SecurityLevel) -> Result<DecryptionResult> {
        self.ensure_level(alias, level)?;

        let plaintext = decrypt_with_keystore(Self::NAME, self.keystore.as_ref(), alias, ciphertext)?;
        let achieved = self.key_info(alias)?.security_level();

        Ok(DecryptionResult::new(plaintext, achieved))
    }

    fn remove_key(&self, alias: &str) -> Result<()> {
        remove_from_keystore(Self::NAME, self.keystore.as_ref(), alias)
    }

    fn key_info(&self, alias: &str) -> Result<KeyInfo> {
        ensure_ready(Self::NAME, self.keystore.as_ref(), alias)?;

        self.keystore
            .key_info(alias)
            .map_err(|e| translate(Self::NAME, alias, "Key lookup", e))
    }
}

pub(super) fn ensure_ready(
    backend: &'static str,
    keystore: &dyn PlatformKeystore,
    alias: &str,
) -> Result<()> {
    if keystore.is_ready() {
        Ok(())
    } else {
        Err(crate::error::StorageError::BackendUnavailable {
            alias: alias.to_string(),
            backend: backend.to_string(),
            reason: "keystore is not ready".to_string(),
        })
    }
}

/// Encrypt with the alias key, generating it if needed
///
/// A key generated by this call is deleted again when the encryption fails,
/// so no key-to-alias mapping outlives a failed call.
pub(super) fn encrypt_with_keystore(
    backend: &'static str,
    keystore: &dyn PlatformKeystore,
    spec: &KeySpec,
    plaintext: &str,
) -> Result<Vec<u8>> {
    let alias = spec.alias.as_str();
    ensure_ready(backend, keystore, alias)?;

    let exists = keystore
        .contains_key(alias)
        .map_err(|e| translate(backend, alias, "Key lookup", e))?;

    if !exists {
        keystore
            .generate_key(spec)
            .map_err(|e| translate(backend, alias, "Key generation", e))?;
        debug!("{} generated key for alias: {}", backend, alias);
    }

    match keystore.encrypt(alias, plaintext.as_bytes()) {
        Ok(ciphertext) => Ok(ciphertext),
        Err(e) => {
            if !exists {
                if let Err(rollback) = keystore.delete_key(alias) {
                    warn!(
                        "{} could not roll back key for alias {}: {}",
                        backend, alias, rollback
                    );
                }
            }
            Err(translate(backend, alias, "Encryption", e))
        }
    }
}

pub(super) fn decrypt_with_keystore(
    backend: &'static str,
    keystore: &dyn PlatformKeystore,
    alias: &str,
    ciphertext: &[u8],
) -> Result<String> {
    ensure_ready(backend, keystore, alias)?;

    let bytes = keystore
        .decrypt(alias, ciphertext)
        .map_err(|e| translate(backend, alias, "Decryption", e))?;

    decode_utf8(backend, alias, bytes)
}

pub(super) fn remove_from_keystore(
    backend: &'static str,
    keystore: &dyn PlatformKeystore,
    alias: &str,
) -> Result<()> {
    ensure_ready(backend, keystore, alias)?;

    let existed = keystore
        .delete_key(alias)
        .map_err(|e| translate(backend, alias, "Key removal", e))?;

    debug!("{} removed key for alias {} (existed: {})", backend, alias, existed);
    Ok(())
}
