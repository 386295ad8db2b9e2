//! OS keychain keystore
//!
//! Keeps one random AES-256 key per alias in the system keychain:
//! - macOS: Keychain
//! - Windows: Credential Manager (DPAPI)
//! - Linux: Secret Service (GNOME Keyring, KWallet)
//!
//! Encryption happens in process with AES-256-GCM, the alias bound as
//! associated data. Keys are OS-protected but not hardware-resident, so
//! `is_hardware_backed` is always false. Same-alias calls are not serialized
//! beyond what the OS keychain provides.

use base64::Engine;
use keyring::Entry;
use tracing::{debug, warn};

use super::{KeySpec, PlatformError, PlatformKeystore, PlatformResult};
use crate::cipher::KeyInfo;
use crate::crypto::{open, seal, MasterKey};

/// Default keychain service name
pub const DEFAULT_SERVICE: &str = "secure-storage";

/// System keychain keystore
pub struct KeyringKeystore {
    service: String,
    /// Prefix for all entries (for namespacing)
    prefix: String,
    /// Whether keychain is available
    available: bool,
}

impl KeyringKeystore {
    /// Create a keystore in `service`, entries namespaced by `prefix`
    pub fn new(service: &str, prefix: Option<&str>) -> Self {
        let prefix = prefix.map(|p| format!("{}-", p)).unwrap_or_default();
        let available = Self::test_availability(service);

        if available {
            debug!("Keychain keystore '{}' is available", service);
        } else {
            warn!("Keychain keystore '{}' is not available", service);
        }

        Self {
            service: service.to_string(),
            prefix,
            available,
        }
    }

    /// Test if the keychain accepts writes
    fn test_availability(service: &str) -> bool {
        match Entry::new(service, "__test_availability__") {
            Ok(entry) => {
                if entry.set_password("test").is_ok() {
                    let _ = entry.delete_password();
                    true
                } else {
                    false
                }
            }
            Err(_) => false,
        }
    }

    fn entry(&self, alias: &str) -> PlatformResult<Entry> {
        let user = format!("{}{}", self.prefix, alias);
        Entry::new(&self.service, &user).map_err(|e| PlatformError::Unavailable(e.to_string()))
    }

    fn ensure_available(&self) -> PlatformResult<()> {
        if self.available {
            Ok(())
        } else {
            Err(PlatformError::Unavailable("Keychain not available".to_string()))
        }
    }

    fn load_key(&self, alias: &str) -> PlatformResult<MasterKey> {
        self.ensure_available()?;

        let encoded = match self.entry(alias)?.get_password() {
            Ok(encoded) => encoded,
            Err(keyring::Error::NoEntry) => return Err(PlatformError::KeyNotFound(alias.to_string())),
            Err(e) => return Err(PlatformError::Unavailable(e.to_string())),
        };

        let bytes = base64::engine::general_purpose::STANDARD
            .decode(encoded)
            .map_err(|e| PlatformError::Crypto(format!("Corrupt key entry: {}", e)))?;

        MasterKey::from_slice(&bytes)
            .ok_or_else(|| PlatformError::Crypto("Corrupt key entry: wrong length".to_string()))
    }
}

impl PlatformKeystore for KeyringKeystore {
    fn is_ready(&self) -> bool {
        self.available
    }

    fn is_hardware_backed(&self) -> bool {
        false
    }

    fn contains_key(&self, alias: &str) -> PlatformResult<bool> {
        self.ensure_available()?;

        match self.entry(alias)?.get_password() {
            Ok(_) => Ok(true),
            Err(keyring::Error::NoEntry) => Ok(false),
            Err(e) => Err(PlatformError::Unavailable(e.to_string())),
        }
    }

    fn generate_key(&self, spec: &KeySpec) -> PlatformResult<()> {
        self.ensure_available()?;

        if spec.require_hardware {
            return Err(PlatformError::Unsupported(
                "the system keychain cannot hold hardware-resident keys".to_string(),
            ));
        }
        if spec.key_size != 256 {
            return Err(PlatformError::Unsupported(format!(
                "key size {} (only 256 is available)",
                spec.key_size
            )));
        }

        let key = MasterKey::generate();
        let encoded = base64::engine::general_purpose::STANDARD.encode(key.as_bytes());

        self.entry(&spec.alias)?
            .set_password(&encoded)
            .map_err(|e| PlatformError::Unavailable(e.to_string()))?;

        debug!("Generated keychain key for alias: {}", spec.alias);
        Ok(())
    }

    fn encrypt(&self, alias: &str, plaintext: &[u8]) -> PlatformResult<Vec<u8>> {
        let key = self.load_key(alias)?;
        Ok(seal(&key, alias.as_bytes(), plaintext)?)
    }

    fn decrypt(&self, alias: &str, ciphertext: &[u8]) -> PlatformResult<Vec<u8>> {
        let key = self.load_key(alias)?;
        Ok(open(&key, alias.as_bytes(), ciphertext)?)
    }

    fn key_info(&self, alias: &str) -> PlatformResult<KeyInfo> {
        if !self.contains_key(alias)? {
            return Err(PlatformError::KeyNotFound(alias.to_string()));
        }

        Ok(KeyInfo {
            alias: alias.to_string(),
            inside_secure_hardware: false,
            created_at: None,
        })
    }

    fn delete_key(&self, alias: &str) -> PlatformResult<bool> {
        self.ensure_available()?;

        match self.entry(alias)?.delete_password() {
            Ok(()) => {
                debug!("Deleted keychain key for alias: {}", alias);
                Ok(true)
            }
            Err(keyring::Error::NoEntry) => Ok(false),
            Err(e) => Err(PlatformError::Unavailable(e.to_string())),
        }
    }
}
