//! Sources of the single shared key used by an `EntityCipher`
//!
//! The key is created or derived on first use and then cached for the
//! lifetime of the key chain. Creation happens under a lock, so concurrent
//! first calls observe the same key.

use std::fs::{self, OpenOptions};
use std::io::{self, Write};
use std::path::{Path, PathBuf};
use std::sync::Mutex;
use tracing::{debug, info};

use super::{PlatformError, PlatformResult};
use crate::crypto::{derive_key, generate_salt, KeyDerivationParams, MasterKey, SecretString};

/// Provider of one symmetric key shared by every alias
pub trait KeyChain: Send + Sync {
    /// Whether the key can be produced right now
    fn is_available(&self) -> bool;

    /// The shared key, created on first use
    fn cipher_key(&self) -> PlatformResult<MasterKey>;
}

/// Write `contents` next to `path` and rename it into place
///
/// The temp file is created owner-only before anything is written to it.
fn write_atomic(path: &Path, contents: &str) -> PlatformResult<()> {
    let temp_path = path.with_extension("tmp");
    match fs::remove_file(&temp_path) {
        Err(e) if e.kind() != io::ErrorKind::NotFound => return Err(e.into()),
        _ => {}
    }

    let mut options = OpenOptions::new();
    options.write(true).create_new(true);
    #[cfg(unix)]
    {
        use std::os::unix::fs::OpenOptionsExt;
        options.mode(0o600);
    }

    let mut file = options.open(&temp_path)?;
    file.write_all(contents.as_bytes())?;
    file.sync_all()?;
    drop(file);

    fs::rename(&temp_path, path)?;
    Ok(())
}

/// Random key persisted as hex in the data directory
pub struct FileKeyChain {
    key_file: PathBuf,
    cached: Mutex<Option<MasterKey>>,
}

impl FileKeyChain {
    /// Key chain storing `shared.key` under `storage_dir`
    pub fn new(storage_dir: &Path) -> PlatformResult<Self> {
        fs::create_dir_all(storage_dir)?;

        Ok(Self {
            key_file: storage_dir.join("shared.key"),
            cached: Mutex::new(None),
        })
    }

    /// Path of the key file
    pub fn key_file(&self) -> &Path {
        &self.key_file
    }
}

impl KeyChain for FileKeyChain {
    fn is_available(&self) -> bool {
        self.key_file.parent().map(Path::exists).unwrap_or(false)
    }

    fn cipher_key(&self) -> PlatformResult<MasterKey> {
        let mut cached = self
            .cached
            .lock()
            .map_err(|_| PlatformError::Unavailable("key chain lock poisoned".to_string()))?;

        if let Some(key) = cached.as_ref() {
            return Ok(key.clone());
        }

        let key = if self.key_file.exists() {
            let contents = fs::read_to_string(&self.key_file)?;
            let key = MasterKey::from_hex(&contents)
                .ok_or_else(|| PlatformError::Crypto("Corrupt shared key file".to_string()))?;
            debug!("Loaded shared key from {:?}", self.key_file);
            key
        } else {
            let key = MasterKey::generate();
            write_atomic(&self.key_file, &key.to_hex())?;
            info!("Created shared key at {:?}", self.key_file);
            key
        };

        *cached = Some(key.clone());
        Ok(key)
    }
}

/// Key derived from a passphrase with Argon2id; only the salt is persisted
pub struct PassphraseKeyChain {
    passphrase: SecretString,
    salt_file: PathBuf,
    params: KeyDerivationParams,
    cached: Mutex<Option<MasterKey>>,
}

impl PassphraseKeyChain {
    /// Key chain storing `shared.salt` under `storage_dir`
    pub fn new(storage_dir: &Path, passphrase: String) -> PlatformResult<Self> {
        fs::create_dir_all(storage_dir)?;

        Ok(Self {
            passphrase: SecretString::new(passphrase),
            salt_file: storage_dir.join("shared.salt"),
            params: KeyDerivationParams::default(),
            cached: Mutex::new(None),
        })
    }

    /// Override the Argon2id cost parameters
    pub fn with_params(mut self, params: KeyDerivationParams) -> Self {
        self.params = params;
        self
    }

    fn load_or_create_salt(&self) -> PlatformResult<String> {
        if self.salt_file.exists() {
            return Ok(fs::read_to_string(&self.salt_file)?.trim().to_string());
        }

        let salt = generate_salt();
        write_atomic(&self.salt_file, &salt)?;
        debug!("Saved salt to {:?}", self.salt_file);
        Ok(salt)
    }
}

impl KeyChain for PassphraseKeyChain {
    fn is_available(&self) -> bool {
        !self.passphrase.expose().is_empty()
    }

    fn cipher_key(&self) -> PlatformResult<MasterKey> {
        if !self.is_available() {
            return Err(PlatformError::Unavailable("empty passphrase".to_string()));
        }

        let mut cached = self
            .cached
            .lock()
            .map_err(|_| PlatformError::Unavailable("key chain lock poisoned".to_string()))?;

        if let Some(key) = cached.as_ref() {
            return Ok(key.clone());
        }

        let salt = self.load_or_create_salt()?;
        let key = derive_key(self.passphrase.expose(), &salt, Some(self.params.clone()))
            .map_err(|e| PlatformError::Crypto(e.to_string()))?;

        *cached = Some(key.clone());
        Ok(key)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    fn fast_params() -> KeyDerivationParams {
        KeyDerivationParams {
            memory_cost: 8192,
            time_cost: 1,
            parallelism: 1,
        }
    }

    #[test]
    fn test_file_key_chain_persists_key() {
        let temp_dir = TempDir::new().unwrap();

        let first = FileKeyChain::new(temp_dir.path()).unwrap();
        let key1 = first.cipher_key().unwrap();
        assert!(first.key_file().exists());

        let second = FileKeyChain::new(temp_dir.path()).unwrap();
        let key2 = second.cipher_key().unwrap();
        assert_eq!(key1.as_bytes(), key2.as_bytes());
    }

    #[test]
    fn test_file_key_chain_rejects_corrupt_file() {
        let temp_dir = TempDir::new().unwrap();
        fs::write(temp_dir.path().join("shared.key"), "garbage").unwrap();

        let chain = FileKeyChain::new(temp_dir.path()).unwrap();
        assert!(matches!(chain.cipher_key(), Err(PlatformError::Crypto(_))));
    }

    #[test]
    fn test_passphrase_key_chain_is_stable() {
        let temp_dir = TempDir::new().unwrap();

        let key1 = PassphraseKeyChain::new(temp_dir.path(), "open sesame".to_string())
            .unwrap()
            .with_params(fast_params())
            .cipher_key()
            .unwrap();
        let key2 = PassphraseKeyChain::new(temp_dir.path(), "open sesame".to_string())
            .unwrap()
            .with_params(fast_params())
            .cipher_key()
            .unwrap();
        let other = PassphraseKeyChain::new(temp_dir.path(), "wrong".to_string())
            .unwrap()
            .with_params(fast_params())
            .cipher_key()
            .unwrap();

        assert_eq!(key1.as_bytes(), key2.as_bytes());
        assert_ne!(key1.as_bytes(), other.as_bytes());
    }

    #[test]
    fn test_empty_passphrase_unavailable() {
        let temp_dir = TempDir::new().unwrap();
        let chain = PassphraseKeyChain::new(temp_dir.path(), String::new()).unwrap();

        assert!(!chain.is_available());
        assert!(matches!(chain.cipher_key(), Err(PlatformError::Unavailable(_))));
    }

    #[cfg(unix)]
    #[test]
    fn test_key_file_is_owner_only() {
        use std::os::unix::fs::PermissionsExt;

        let temp_dir = TempDir::new().unwrap();
        let chain = FileKeyChain::new(temp_dir.path()).unwrap();
        // A leftover temp file from an interrupted write is replaced
        fs::write(chain.key_file().with_extension("tmp"), "stale").unwrap();

        chain.cipher_key().unwrap();

        let mode = fs::metadata(chain.key_file()).unwrap().permissions().mode();
        assert_eq!(mode & 0o777, 0o600);
        assert!(!chain.key_file().with_extension("tmp").exists());
    }
}
