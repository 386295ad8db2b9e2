//! Cryptographic primitives shared by the shipped collaborators
//!
//! This module provides:
//! - AES-256-GCM sealing with associated data
//! - Argon2id key derivation from passphrases
//! - Secure memory handling with zeroize

mod encryption;
mod key_derivation;
mod secure_memory;

pub use encryption::{open, seal, AeadError, EncryptedData, NONCE_LEN, TAG_LEN};
pub use key_derivation::{derive_key, generate_salt, KeyDerivationParams};
pub use secure_memory::{MasterKey, SecretString};
