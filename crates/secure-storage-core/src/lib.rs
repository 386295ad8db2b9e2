//! # secure-storage-core
//!
//! Pluggable secure storage with backend selection:
//! - Cipher backends declaring a security level and minimum platform version
//! - An immutable registry that picks the strongest eligible backend
//! - A facade for encrypt / decrypt / remove-key calls and a JSON request contract
//! - A namespaced key/value store persisting ciphertext with its backend
//! - OS keychain, AES-256-GCM and Argon2id platform services

pub mod backends;
pub mod cipher;
pub mod crypto;
pub mod error;
pub mod platform;
pub mod registry;
pub mod request;
pub mod settings;
pub mod store;
mod facade;

pub use backends::{KeystoreBackend, LegacyKeystoreBackend, SharedKeyBackend, KNOWN_BACKENDS};
pub use cipher::{
    CipherBackend, CipherIdentity, DecryptionResult, EncryptionResult, KeyInfo, SecurityLevel,
};
pub use error::{ErrorKind, Result, StorageError};
pub use facade::{CallState, SecureStorageFacade};
pub use registry::{BackendRegistry, RegistryConfig};
pub use request::{Operation, Request, Response, Value};
pub use settings::{build_registry, default_data_dir, SettingsManager, StorageSettings};
pub use store::{FileRecordStore, MemoryRecordStore, Record, RecordStore, SecureStore};
