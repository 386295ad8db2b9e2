//! Concrete cipher backends
//!
//! | backend | min platform | level | per-alias key |
//! |---|---|---|---|
//! | [`KeystoreBackend`] | 23 | hardware or software, as reported by the keystore | yes |
//! | [`LegacyKeystoreBackend`] | 18 | `SECURE_SOFTWARE` | yes |
//! | [`SharedKeyBackend`] | 16 | `ANY` | no, one shared key |

mod keystore;
mod legacy;
mod shared_key;

pub use keystore::KeystoreBackend;
pub use legacy::LegacyKeystoreBackend;
pub use shared_key::SharedKeyBackend;

use crate::error::StorageError;
use crate::platform::PlatformError;

/// Known backend names, in default preference order
pub const KNOWN_BACKENDS: [&str; 3] = [
    KeystoreBackend::NAME,
    LegacyKeystoreBackend::NAME,
    SharedKeyBackend::NAME,
];

/// Translate a collaborator failure into the cipher contract
fn translate(backend: &'static str, alias: &str, action: &str, e: PlatformError) -> StorageError {
    match e {
        PlatformError::Unavailable(reason) => StorageError::BackendUnavailable {
            alias: alias.to_string(),
            backend: backend.to_string(),
            reason,
        },
        other => StorageError::CryptoFailure {
            alias: alias.to_string(),
            backend: backend.to_string(),
            reason: format!("{} failed for alias: {}: {}", action, alias, other),
        },
    }
}

/// Decode decrypted bytes, failing as a crypto fault on invalid UTF-8
fn decode_utf8(backend: &'static str, alias: &str, bytes: Vec<u8>) -> Result<String, StorageError> {
    String::from_utf8(bytes).map_err(|e| StorageError::CryptoFailure {
        alias: alias.to_string(),
        backend: backend.to_string(),
        reason: format!("Decrypted value is not UTF-8: {}", e.utf8_error()),
    })
}
