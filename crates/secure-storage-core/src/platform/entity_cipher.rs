//! Symmetric cipher with entity-label domain separation

use std::fmt;
use std::sync::Arc;

use super::{KeyChain, PlatformError, PlatformResult};
use crate::crypto::{open, seal};

/// Opaque label bound into a ciphertext
///
/// A ciphertext produced for one entity fails authentication under any
/// other entity.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct Entity(String);

impl Entity {
    pub fn create(label: impl Into<String>) -> Self {
        Self(label.into())
    }

    pub fn as_bytes(&self) -> &[u8] {
        self.0.as_bytes()
    }
}

impl fmt::Display for Entity {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// Third-party-style symmetric library: one key, many entities
pub trait EntityCipher: Send + Sync {
    /// Whether the library and its key chain are usable
    fn is_available(&self) -> bool;

    fn encrypt(&self, plaintext: &[u8], entity: &Entity) -> PlatformResult<Vec<u8>>;

    fn decrypt(&self, ciphertext: &[u8], entity: &Entity) -> PlatformResult<Vec<u8>>;
}

/// Ciphertext format version
const VERSION: u8 = 1;
/// Cipher identifier for AES-256-GCM
const CIPHER_ID: u8 = 1;
const HEADER: [u8; 2] = [VERSION, CIPHER_ID];

/// AES-256-GCM over a `KeyChain`
///
/// Layout: `version || cipher id || nonce || ciphertext || tag`. The header
/// and the entity label are authenticated as associated data.
pub struct AesGcmEntityCipher {
    key_chain: Arc<dyn KeyChain>,
}

impl AesGcmEntityCipher {
    pub fn new(key_chain: Arc<dyn KeyChain>) -> Self {
        Self { key_chain }
    }

    fn associated_data(entity: &Entity) -> Vec<u8> {
        let mut aad = Vec::with_capacity(HEADER.len() + entity.as_bytes().len());
        aad.extend_from_slice(&HEADER);
        aad.extend_from_slice(entity.as_bytes());
        aad
    }
}

impl EntityCipher for AesGcmEntityCipher {
    fn is_available(&self) -> bool {
        self.key_chain.is_available()
    }

    fn encrypt(&self, plaintext: &[u8], entity: &Entity) -> PlatformResult<Vec<u8>> {
        let key = self.key_chain.cipher_key()?;
        let sealed = seal(&key, &Self::associated_data(entity), plaintext)?;

        let mut out = Vec::with_capacity(HEADER.len() + sealed.len());
        out.extend_from_slice(&HEADER);
        out.extend_from_slice(&sealed);
        Ok(out)
    }

    fn decrypt(&self, ciphertext: &[u8], entity: &Entity) -> PlatformResult<Vec<u8>> {
        match ciphertext {
            [VERSION, CIPHER_ID, sealed @ ..] => {
                let key = self.key_chain.cipher_key()?;
                Ok(open(&key, &Self::associated_data(entity), sealed)?)
            }
            [version, cipher_id, ..] => Err(PlatformError::Crypto(format!(
                "unsupported ciphertext version {} / cipher {}",
                version, cipher_id
            ))),
            _ => Err(PlatformError::Crypto("ciphertext too short".to_string())),
        }
    }
}
