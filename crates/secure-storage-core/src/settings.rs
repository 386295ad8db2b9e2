//! Storage settings management
//!
//! Stores non-sensitive configuration in a plain JSON file next to the
//! records, and turns it into a backend registry for the desktop platform.

use directories::ProjectDirs;
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tracing::{debug, info};

use crate::backends::{KeystoreBackend, LegacyKeystoreBackend, SharedKeyBackend, KNOWN_BACKENDS};
use crate::cipher::{CipherBackend, SecurityLevel};
use crate::error::{Result, StorageError};
use crate::platform::{
    AesGcmEntityCipher, FileKeyChain, KeyChain, KeyringKeystore, PassphraseKeyChain,
    DEFAULT_SERVICE,
};
use crate::registry::{BackendRegistry, RegistryConfig};
use crate::store::validate_namespace;

/// Platform version reported by desktop hosts; every backend is usable
pub const DESKTOP_PLATFORM_VERSION: u32 = 23;

/// Storage settings
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct StorageSettings {
    /// Settings file version
    pub version: u32,
    /// Prefix scoping every stored key
    pub namespace: String,
    /// Platform version the registry is built for
    pub platform_version: u32,
    /// Level used when a caller does not ask for one
    pub default_level: SecurityLevel,
    /// Enabled backends in preference order
    pub backends: Vec<String>,
    /// OS keychain service holding keystore keys
    pub keychain_service: String,
}

impl Default for StorageSettings {
    fn default() -> Self {
        Self {
            version: 1,
            namespace: "default".to_string(),
            platform_version: DESKTOP_PLATFORM_VERSION,
            default_level: SecurityLevel::Any,
            backends: KNOWN_BACKENDS.iter().map(|name| name.to_string()).collect(),
            keychain_service: DEFAULT_SERVICE.to_string(),
        }
    }
}

/// Default data directory for settings, records and key files
pub fn default_data_dir() -> Result<PathBuf> {
    ProjectDirs::from("com", "symbia-labs", "secure-storage")
        .map(|dirs| dirs.data_dir().to_path_buf())
        .ok_or_else(|| StorageError::StorageError("Could not determine data directory".to_string()))
}

/// Build the registry described by `settings`
///
/// The shared-key backend uses a passphrase-derived key when `passphrase`
/// is given, otherwise a random key file in `data_dir`.
pub fn build_registry(
    settings: &StorageSettings,
    data_dir: &Path,
    passphrase: Option<String>,
) -> Result<BackendRegistry> {
    let mut config = RegistryConfig::new(settings.platform_version);
    let mut passphrase = passphrase;

    for name in &settings.backends {
        let backend: Arc<dyn CipherBackend> = match name.as_str() {
            KeystoreBackend::NAME => Arc::new(KeystoreBackend::new(Arc::new(KeyringKeystore::new(
                &settings.keychain_service,
                Some("keystore"),
            )))),
            LegacyKeystoreBackend::NAME => Arc::new(LegacyKeystoreBackend::new(Arc::new(
                KeyringKeystore::new(&settings.keychain_service, Some("legacy")),
            ))),
            SharedKeyBackend::NAME => {
                let key_chain: Arc<dyn KeyChain> = match passphrase.take() {
                    Some(passphrase) => Arc::new(
                        PassphraseKeyChain::new(data_dir, passphrase)
                            .map_err(|e| StorageError::KeychainError(e.to_string()))?,
                    ),
                    None => Arc::new(
                        FileKeyChain::new(data_dir)
                            .map_err(|e| StorageError::KeychainError(e.to_string()))?,
                    ),
                };
                Arc::new(SharedKeyBackend::new(Arc::new(AesGcmEntityCipher::new(key_chain))))
            }
            other => {
                return Err(StorageError::UnknownBackend {
                    alias: String::new(),
                    name: other.to_string(),
                })
            }
        };
        debug!("Configured backend {}", name);
        config = config.register(backend);
    }

    Ok(BackendRegistry::new(config))
}

/// Settings manager
pub struct SettingsManager {
    settings_file: PathBuf,
    settings: StorageSettings,
}

impl SettingsManager {
    /// Load `settings.json` from `storage_dir`, falling back to defaults
    pub fn new(storage_dir: &Path) -> Result<Self> {
        let settings_file = storage_dir.join("settings.json");
        let settings = Self::load_from_file(&settings_file)?;

        Ok(Self {
            settings_file,
            settings,
        })
    }

    fn load_from_file(path: &Path) -> Result<StorageSettings> {
        if !path.exists() {
            debug!("No settings file found, using defaults");
            return Ok(StorageSettings::default());
        }

        let contents = fs::read_to_string(path)?;
        let settings: StorageSettings = serde_json::from_str(&contents)?;
        validate_namespace(&settings.namespace)?;
        debug!("Loaded settings from {:?}", path);
        Ok(settings)
    }

    /// Save settings to file
    pub fn save(&self) -> Result<()> {
        if let Some(parent) = self.settings_file.parent() {
            fs::create_dir_all(parent)?;
        }
        let contents = serde_json::to_string_pretty(&self.settings)?;

        let temp_path = self.settings_file.with_extension("tmp");
        fs::write(&temp_path, &contents)?;
        fs::rename(&temp_path, &self.settings_file)?;

        debug!("Saved settings to {:?}", self.settings_file);
        Ok(())
    }

    pub fn get(&self) -> &StorageSettings {
        &self.settings
    }

    pub fn get_mut(&mut self) -> &mut StorageSettings {
        &mut self.settings
    }

    /// Reset to defaults and delete the settings file
    pub fn reset(&mut self) -> Result<()> {
        self.settings = StorageSettings::default();

        if self.settings_file.exists() {
            fs::remove_file(&self.settings_file)?;
        }

        info!("Settings reset to defaults");
        Ok(())
    }
}
