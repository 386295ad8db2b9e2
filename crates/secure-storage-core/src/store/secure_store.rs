//! Namespaced key/value store over the facade
//!
//! Values are encrypted with the backend selected for the requested level;
//! the resulting ciphertext is persisted together with the producing
//! backend's name so later reads and removals go back to that backend even
//! if a stronger one has been registered since.

use base64::{engine::general_purpose::STANDARD as BASE64, Engine};
use chrono::Utc;
use std::collections::BTreeMap;
use std::sync::Arc;
use tracing::{debug, info, warn};

use super::{Record, RecordStore};
use crate::cipher::SecurityLevel;
use crate::error::{Result, StorageError};
use crate::facade::SecureStorageFacade;

/// Key/value store whose values never touch disk in plaintext
pub struct SecureStore {
    facade: SecureStorageFacade,
    records: Arc<dyn RecordStore>,
    namespace: String,
}

/// Check that `namespace` can prefix keys without colliding with another
///
/// Stored aliases are `{namespace}.{key}`; keys may contain dots, so a
/// namespace must not.
pub fn validate_namespace(namespace: &str) -> Result<()> {
    if namespace.is_empty() || namespace.contains('.') {
        return Err(StorageError::InvalidRequest(format!(
            "namespace must be non-empty and contain no '.': {:?}",
            namespace
        )));
    }
    Ok(())
}

impl SecureStore {
    pub fn new(
        facade: SecureStorageFacade,
        records: Arc<dyn RecordStore>,
        namespace: impl Into<String>,
    ) -> Result<Self> {
        let namespace = namespace.into();
        validate_namespace(&namespace)?;

        Ok(Self {
            facade,
            records,
            namespace,
        })
    }

    pub fn namespace(&self) -> &str {
        &self.namespace
    }

    pub fn facade(&self) -> &SecureStorageFacade {
        &self.facade
    }

    /// Storage key, also used as the backend alias
    fn alias(&self, key: &str) -> Result<String> {
        if key.is_empty() {
            return Err(StorageError::InvalidRequest("key must not be empty".to_string()));
        }
        Ok(format!("{}.{}", self.namespace, key))
    }

    fn prefix(&self) -> String {
        format!("{}.", self.namespace)
    }

    /// Encrypt and persist `value`, replacing any previous value
    ///
    /// If the record cannot be written, key material the encryption may
    /// have created for this alias is removed again.
    pub fn set(&self, key: &str, value: &str, level: SecurityLevel) -> Result<()> {
        let alias = self.alias(key)?;
        let previous = self.records.get(&alias)?;
        let encrypted = self.facade.encrypt(&alias, value, level)?;

        let record = Record {
            backend: encrypted.backend.to_string(),
            level,
            ciphertext: BASE64.encode(&encrypted.ciphertext),
            updated_at: Utc::now(),
        };
        if let Err(e) = self.records.put(&alias, record) {
            let key_in_use = previous.is_some_and(|p| p.backend == encrypted.backend);
            if !key_in_use {
                if let Err(cleanup) = self.facade.remove_key_with(encrypted.backend, &alias) {
                    warn!("Could not roll back key for {}: {}", alias, cleanup);
                }
            }
            return Err(e);
        }

        debug!("Stored {} via {}", alias, encrypted.backend);
        Ok(())
    }

    /// Decrypt the value under `key`, if any
    pub fn get(&self, key: &str) -> Result<Option<String>> {
        let alias = self.alias(key)?;
        let record = match self.records.get(&alias)? {
            Some(record) => record,
            None => {
                debug!("Key not found: {}", alias);
                return Ok(None);
            }
        };

        let ciphertext = BASE64.decode(&record.ciphertext).map_err(|e| {
            StorageError::StorageError(format!("Corrupt record for {}: {}", alias, e))
        })?;
        let decrypted = self
            .facade
            .decrypt_with(&record.backend, &alias, &ciphertext, record.level)?;

        Ok(Some(decrypted.into_plaintext()))
    }

    pub fn exists(&self, key: &str) -> Result<bool> {
        let alias = self.alias(key)?;
        Ok(self.records.get(&alias)?.is_some())
    }

    /// Keys in this namespace, sorted, without the namespace prefix
    pub fn keys(&self) -> Result<Vec<String>> {
        let prefix = self.prefix();
        let mut keys: Vec<String> = self
            .records
            .keys(&prefix)?
            .into_iter()
            .filter_map(|k| k.strip_prefix(&prefix).map(str::to_string))
            .collect();
        keys.sort();
        Ok(keys)
    }

    /// Remove the key material and the record; `false` if nothing was stored
    pub fn remove(&self, key: &str) -> Result<bool> {
        let alias = self.alias(key)?;
        let record = match self.records.get(&alias)? {
            Some(record) => record,
            None => return Ok(false),
        };

        self.facade.remove_key_with(&record.backend, &alias)?;
        self.records.delete(&alias)?;

        debug!("Removed {}", alias);
        Ok(true)
    }

    /// Store several values; returns the keys that failed
    pub fn multi_set<'a>(
        &self,
        pairs: impl IntoIterator<Item = (&'a str, &'a str)>,
        level: SecurityLevel,
    ) -> Vec<String> {
        pairs
            .into_iter()
            .filter_map(|(key, value)| match self.set(key, value, level) {
                Ok(()) => None,
                Err(e) => {
                    warn!("multiSet failed for {}: {}", key, e);
                    Some(key.to_string())
                }
            })
            .collect()
    }

    /// Read several values
    ///
    /// Missing keys and values that fail to decrypt both map to `None`; the
    /// failures are logged at `warn`.
    pub fn multi_get(&self, keys: &[&str]) -> Result<BTreeMap<String, Option<String>>> {
        if keys.is_empty() {
            return Err(StorageError::InvalidRequest(
                "multiGet requires at least one key".to_string(),
            ));
        }

        Ok(keys
            .iter()
            .map(|key| {
                let value = self.get(key).unwrap_or_else(|e| {
                    warn!("multiGet failed for {}: {}", key, e);
                    None
                });
                (key.to_string(), value)
            })
            .collect())
    }

    /// Remove several values; returns the keys that were not removed,
    /// including keys that were never stored
    pub fn multi_remove(&self, keys: &[&str]) -> Vec<String> {
        keys.iter()
            .filter_map(|key| match self.remove(key) {
                Ok(true) => None,
                Ok(false) => {
                    debug!("multiRemove: nothing stored under {}", key);
                    Some(key.to_string())
                }
                Err(e) => {
                    warn!("multiRemove failed for {}: {}", key, e);
                    Some(key.to_string())
                }
            })
            .collect()
    }

    /// Remove everything in this namespace; returns the keys left behind
    pub fn clear(&self) -> Result<Vec<String>> {
        let keys = self.keys()?;
        let refs: Vec<&str> = keys.iter().map(String::as_str).collect();
        let failed = self.multi_remove(&refs);

        info!(
            "Cleared namespace {} ({} removed, {} failed)",
            self.namespace,
            keys.len() - failed.len(),
            failed.len()
        );
        Ok(failed)
    }
}
