//! Passphrase-based key derivation using Argon2id

use argon2::{
    password_hash::{PasswordHasher, SaltString},
    Algorithm, Argon2, Params, Version,
};
use rand::rngs::OsRng;

use super::MasterKey;
use crate::error::{Result, StorageError};

/// Parameters for Argon2id key derivation
#[derive(Debug, Clone)]
pub struct KeyDerivationParams {
    /// Memory cost in KiB (default: 65536 = 64MB)
    pub memory_cost: u32,
    /// Time cost / iterations (default: 3)
    pub time_cost: u32,
    /// Parallelism (default: 4)
    pub parallelism: u32,
}

impl Default for KeyDerivationParams {
    fn default() -> Self {
        Self {
            memory_cost: 65536,
            time_cost: 3,
            parallelism: 4,
        }
    }
}

/// Generate a random salt in PHC base64 form
pub fn generate_salt() -> String {
    SaltString::generate(&mut OsRng).to_string()
}

/// Derive a 256-bit key from a passphrase
pub fn derive_key(
    passphrase: &str,
    salt: &str,
    params: Option<KeyDerivationParams>,
) -> Result<MasterKey> {
    let params = params.unwrap_or_default();

    let argon2_params = Params::new(
        params.memory_cost,
        params.time_cost,
        params.parallelism,
        Some(32),
    )
    .map_err(|e| StorageError::KeychainError(format!("Invalid derivation params: {}", e)))?;

    let argon2 = Argon2::new(Algorithm::Argon2id, Version::V0x13, argon2_params);

    let salt = SaltString::from_b64(salt)
        .map_err(|e| StorageError::KeychainError(format!("Invalid salt: {}", e)))?;

    let hash = argon2
        .hash_password(passphrase.as_bytes(), &salt)
        .map_err(|e| StorageError::KeychainError(format!("Key derivation failed: {}", e)))?
        .hash
        .ok_or_else(|| StorageError::KeychainError("No hash output".to_string()))?;

    MasterKey::from_slice(hash.as_bytes())
        .ok_or_else(|| StorageError::KeychainError("Hash output has wrong length".to_string()))
}
