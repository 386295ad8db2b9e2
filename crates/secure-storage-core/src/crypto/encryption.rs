//! AES-256-GCM authenticated encryption
//!
//! Sealed layout: `nonce (12 bytes) || ciphertext || auth tag (16 bytes)`.
//! Associated data is authenticated but not stored; the same bytes must be
//! supplied to `open`.

use aes_gcm::{
    aead::{Aead, KeyInit, Payload},
    Aes256Gcm, Nonce,
};
use rand::RngCore;

use super::MasterKey;

/// Nonce length for GCM
pub const NONCE_LEN: usize = 12;
/// Authentication tag length
pub const TAG_LEN: usize = 16;

/// Low-level AEAD failure, mapped to a backend error by the caller
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum AeadError {
    #[error("invalid key: {0}")]
    InvalidKey(String),
    #[error("sealed data too short: {0} bytes")]
    Truncated(usize),
    #[error("authentication failed")]
    Authentication,
    #[error("encryption failed")]
    Encryption,
}

/// Encrypted data split into its parts
#[derive(Debug, Clone)]
pub struct EncryptedData {
    /// Initialization vector (12 bytes for GCM)
    pub iv: [u8; NONCE_LEN],
    /// Encrypted ciphertext with the auth tag appended
    pub ciphertext: Vec<u8>,
}

impl EncryptedData {
    /// Serialize to `nonce || ciphertext || tag`
    pub fn to_bytes(&self) -> Vec<u8> {
        let mut out = Vec::with_capacity(NONCE_LEN + self.ciphertext.len());
        out.extend_from_slice(&self.iv);
        out.extend_from_slice(&self.ciphertext);
        out
    }

    /// Parse the sealed layout
    pub fn from_bytes(bytes: &[u8]) -> Result<Self, AeadError> {
        if bytes.len() < NONCE_LEN + TAG_LEN {
            return Err(AeadError::Truncated(bytes.len()));
        }

        let mut iv = [0u8; NONCE_LEN];
        iv.copy_from_slice(&bytes[..NONCE_LEN]);

        Ok(Self {
            iv,
            ciphertext: bytes[NONCE_LEN..].to_vec(),
        })
    }
}

/// Encrypt `plaintext`, binding `aad` into the tag
pub fn seal(key: &MasterKey, aad: &[u8], plaintext: &[u8]) -> Result<Vec<u8>, AeadError> {
    let cipher = Aes256Gcm::new_from_slice(key.as_bytes())
        .map_err(|e| AeadError::InvalidKey(e.to_string()))?;

    let mut iv = [0u8; NONCE_LEN];
    rand::thread_rng().fill_bytes(&mut iv);

    let ciphertext = cipher
        .encrypt(
            Nonce::from_slice(&iv),
            Payload {
                msg: plaintext,
                aad,
            },
        )
        .map_err(|_| AeadError::Encryption)?;

    Ok(EncryptedData { iv, ciphertext }.to_bytes())
}

/// Decrypt a sealed buffer, verifying `aad`
pub fn open(key: &MasterKey, aad: &[u8], sealed: &[u8]) -> Result<Vec<u8>, AeadError> {
    let encrypted = EncryptedData::from_bytes(sealed)?;

    let cipher = Aes256Gcm::new_from_slice(key.as_bytes())
        .map_err(|e| AeadError::InvalidKey(e.to_string()))?;

    cipher
        .decrypt(
            Nonce::from_slice(&encrypted.iv),
            Payload {
                msg: &encrypted.ciphertext,
                aad,
            },
        )
        .map_err(|_| AeadError::Authentication)
}
