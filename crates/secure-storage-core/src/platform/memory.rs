//! In-memory collaborators for testing
//!
//! These use real AES-256-GCM but keep keys in process memory only. They are
//! NOT suitable for production use.

use chrono::Utc;
use std::collections::HashMap;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Mutex;

use super::{KeyChain, KeySpec, PlatformError, PlatformKeystore, PlatformResult};
use crate::cipher::KeyInfo;
use crate::crypto::{open, seal, MasterKey};

/// Keystore holding keys in a map
///
/// Every call takes the map lock, so calls on the same alias are serialized.
pub struct MemoryKeystore {
    keys: Mutex<HashMap<String, (MasterKey, KeyInfo)>>,
    hardware_backed: bool,
    ready: AtomicBool,
    fail_encryption: AtomicBool,
}

impl MemoryKeystore {
    /// Software keystore
    pub fn new() -> Self {
        Self::build(false)
    }

    /// Keystore reporting hardware-resident keys
    pub fn hardware() -> Self {
        Self::build(true)
    }

    fn build(hardware_backed: bool) -> Self {
        Self {
            keys: Mutex::new(HashMap::new()),
            hardware_backed,
            ready: AtomicBool::new(true),
            fail_encryption: AtomicBool::new(false),
        }
    }

    /// Simulate a locked device
    pub fn set_ready(&self, ready: bool) {
        self.ready.store(ready, Ordering::SeqCst);
    }

    /// Make every `encrypt` call fail after key lookup
    pub fn set_fail_encryption(&self, fail: bool) {
        self.fail_encryption.store(fail, Ordering::SeqCst);
    }

    /// Number of keys currently held
    pub fn key_count(&self) -> usize {
        self.keys.lock().map(|keys| keys.len()).unwrap_or(0)
    }

    fn with_keys<T>(
        &self,
        f: impl FnOnce(&mut HashMap<String, (MasterKey, KeyInfo)>) -> PlatformResult<T>,
    ) -> PlatformResult<T> {
        if !self.ready.load(Ordering::SeqCst) {
            return Err(PlatformError::Unavailable("keystore locked".to_string()));
        }
        let mut keys = self
            .keys
            .lock()
            .map_err(|_| PlatformError::Unavailable("keystore lock poisoned".to_string()))?;
        f(&mut keys)
    }
}

impl Default for MemoryKeystore {
    fn default() -> Self {
        Self::new()
    }
}

impl PlatformKeystore for MemoryKeystore {
    fn is_ready(&self) -> bool {
        self.ready.load(Ordering::SeqCst)
    }

    fn is_hardware_backed(&self) -> bool {
        self.hardware_backed
    }

    fn contains_key(&self, alias: &str) -> PlatformResult<bool> {
        self.with_keys(|keys| Ok(keys.contains_key(alias)))
    }

    fn generate_key(&self, spec: &KeySpec) -> PlatformResult<()> {
        if spec.require_hardware && !self.hardware_backed {
            return Err(PlatformError::Unsupported("no secure hardware".to_string()));
        }
        let hardware = self.hardware_backed;

        self.with_keys(|keys| {
            let info = KeyInfo {
                alias: spec.alias.clone(),
                inside_secure_hardware: hardware,
                created_at: Some(Utc::now()),
            };
            keys.insert(spec.alias.clone(), (MasterKey::generate(), info));
            Ok(())
        })
    }

    fn encrypt(&self, alias: &str, plaintext: &[u8]) -> PlatformResult<Vec<u8>> {
        let fail = self.fail_encryption.load(Ordering::SeqCst);
        self.with_keys(|keys| {
            let (key, _) = keys
                .get(alias)
                .ok_or_else(|| PlatformError::KeyNotFound(alias.to_string()))?;
            if fail {
                return Err(PlatformError::Crypto("injected encryption failure".to_string()));
            }
            Ok(seal(key, alias.as_bytes(), plaintext)?)
        })
    }

    fn decrypt(&self, alias: &str, ciphertext: &[u8]) -> PlatformResult<Vec<u8>> {
        self.with_keys(|keys| {
            let (key, _) = keys
                .get(alias)
                .ok_or_else(|| PlatformError::KeyNotFound(alias.to_string()))?;
            Ok(open(key, alias.as_bytes(), ciphertext)?)
        })
    }

    fn key_info(&self, alias: &str) -> PlatformResult<KeyInfo> {
        self.with_keys(|keys| {
            keys.get(alias)
                .map(|(_, info)| info.clone())
                .ok_or_else(|| PlatformError::KeyNotFound(alias.to_string()))
        })
    }

    fn delete_key(&self, alias: &str) -> PlatformResult<bool> {
        self.with_keys(|keys| Ok(keys.remove(alias).is_some()))
    }
}

/// Key chain returning a fixed key
pub struct StaticKeyChain {
    key: MasterKey,
    available: AtomicBool,
}

impl StaticKeyChain {
    pub fn new(key: MasterKey) -> Self {
        Self {
            key,
            available: AtomicBool::new(true),
        }
    }

    pub fn random() -> Self {
        Self::new(MasterKey::generate())
    }

    /// Simulate a missing crypto library
    pub fn set_available(&self, available: bool) {
        self.available.store(available, Ordering::SeqCst);
    }
}

impl KeyChain for StaticKeyChain {
    fn is_available(&self) -> bool {
        self.available.load(Ordering::SeqCst)
    }

    fn cipher_key(&self) -> PlatformResult<MasterKey> {
        if !self.is_available() {
            return Err(PlatformError::Unavailable("key chain disabled".to_string()));
        }
        Ok(self.key.clone())
    }
}
