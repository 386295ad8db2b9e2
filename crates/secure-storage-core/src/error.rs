//! Error types for secure-storage-core

use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::cipher::SecurityLevel;

/// Result type alias for storage operations
pub type Result<T> = std::result::Result<T, StorageError>;

/// Storage error types
///
/// The first five variants are the cipher contract's taxonomy. Each carries
/// the alias and the backend name so a failure can be diagnosed from the
/// message alone.
#[derive(Error, Debug)]
pub enum StorageError {
    #[error(
        "Insufficient security level for alias '{alias}' on {backend}: \
         requested {requested}, backend provides {supported}"
    )]
    InsufficientSecurityLevel {
        alias: String,
        backend: String,
        requested: SecurityLevel,
        supported: SecurityLevel,
    },

    #[error("Backend {backend} is unavailable for alias '{alias}': {reason}")]
    BackendUnavailable {
        alias: String,
        backend: String,
        reason: String,
    },

    #[error("Crypto failure for alias '{alias}' on {backend}: {reason}")]
    CryptoFailure {
        alias: String,
        backend: String,
        reason: String,
    },

    #[error("Operation '{operation}' is not supported by {backend} (alias '{alias}')")]
    NotSupported {
        alias: String,
        backend: String,
        operation: &'static str,
    },

    #[error("No registered backend provides security level {requested} (alias '{alias}')")]
    NoEligibleBackend {
        alias: String,
        requested: SecurityLevel,
    },

    #[error("Backend not registered: {name} (alias '{alias}')")]
    UnknownBackend { alias: String, name: String },

    #[error("Invalid request: {0}")]
    InvalidRequest(String),

    #[error("Storage error: {0}")]
    StorageError(String),

    #[error("Keychain error: {0}")]
    KeychainError(String),

    #[error("IO error: {0}")]
    IoError(#[from] std::io::Error),

    #[error("Serialization error: {0}")]
    SerializationError(#[from] serde_json::Error),
}

/// Serializable error category used by the request/response contract
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum ErrorKind {
    InsufficientSecurityLevel,
    BackendUnavailable,
    CryptoFailure,
    NotSupported,
    NoEligibleBackend,
    UnknownBackend,
    InvalidRequest,
    Storage,
}

impl StorageError {
    /// Category of this error
    pub fn kind(&self) -> ErrorKind {
        match self {
            Self::InsufficientSecurityLevel { .. } => ErrorKind::InsufficientSecurityLevel,
            Self::BackendUnavailable { .. } => ErrorKind::BackendUnavailable,
            Self::CryptoFailure { .. } => ErrorKind::CryptoFailure,
            Self::NotSupported { .. } => ErrorKind::NotSupported,
            Self::NoEligibleBackend { .. } => ErrorKind::NoEligibleBackend,
            Self::UnknownBackend { .. } => ErrorKind::UnknownBackend,
            Self::InvalidRequest(_) => ErrorKind::InvalidRequest,
            Self::StorageError(_)
            | Self::KeychainError(_)
            | Self::IoError(_)
            | Self::SerializationError(_) => ErrorKind::Storage,
        }
    }

    /// Alias the error refers to, if any
    pub fn alias(&self) -> Option<&str> {
        match self {
            Self::InsufficientSecurityLevel { alias, .. }
            | Self::BackendUnavailable { alias, .. }
            | Self::CryptoFailure { alias, .. }
            | Self::NotSupported { alias, .. }
            | Self::NoEligibleBackend { alias, .. }
            | Self::UnknownBackend { alias, .. } => Some(alias),
            _ => None,
        }
    }

    /// Backend the error was raised by, if any
    pub fn backend(&self) -> Option<&str> {
        match self {
            Self::InsufficientSecurityLevel { backend, .. }
            | Self::BackendUnavailable { backend, .. }
            | Self::CryptoFailure { backend, .. }
            | Self::NotSupported { backend, .. } => Some(backend),
            Self::UnknownBackend { name, .. } => Some(name),
            _ => None,
        }
    }

    /// Fill in the alias where the raising component did not know it
    pub fn for_alias(mut self, name: &str) -> Self {
        match &mut self {
            Self::InsufficientSecurityLevel { alias, .. }
            | Self::BackendUnavailable { alias, .. }
            | Self::CryptoFailure { alias, .. }
            | Self::NotSupported { alias, .. }
            | Self::NoEligibleBackend { alias, .. }
            | Self::UnknownBackend { alias, .. }
                if alias.is_empty() =>
            {
                *alias = name.to_string();
            }
            _ => {}
        }
        self
    }

    /// Fill in the backend name where the raising backend left it empty
    pub fn with_backend(mut self, name: &str) -> Self {
        match &mut self {
            Self::InsufficientSecurityLevel { backend, .. }
            | Self::BackendUnavailable { backend, .. }
            | Self::CryptoFailure { backend, .. }
            | Self::NotSupported { backend, .. }
                if backend.is_empty() =>
            {
                *backend = name.to_string();
            }
            _ => {}
        }
        self
    }
}
