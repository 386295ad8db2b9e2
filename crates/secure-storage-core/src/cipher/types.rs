//! Cipher contract types

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

use crate::crypto::SecretString;
use crate::error::StorageError;

/// Ordered tier of hardware-backing strength
///
/// Ordering is meaningful: `Any < SecureSoftware < SecureHardware`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum SecurityLevel {
    /// No particular protection required
    Any,
    /// Key material protected by the OS in software
    SecureSoftware,
    /// Key material never leaves secure hardware
    SecureHardware,
}

impl SecurityLevel {
    /// All levels in ascending order
    pub const ALL: [SecurityLevel; 3] = [
        SecurityLevel::Any,
        SecurityLevel::SecureSoftware,
        SecurityLevel::SecureHardware,
    ];

    /// Wire name of the level
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Any => "ANY",
            Self::SecureSoftware => "SECURE_SOFTWARE",
            Self::SecureHardware => "SECURE_HARDWARE",
        }
    }

    /// Whether a backend declaring `self` may serve a request for `requested`
    pub fn satisfies(&self, requested: SecurityLevel) -> bool {
        *self >= requested
    }
}

impl Default for SecurityLevel {
    fn default() -> Self {
        Self::Any
    }
}

impl fmt::Display for SecurityLevel {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for SecurityLevel {
    type Err = StorageError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_uppercase().replace('-', "_").as_str() {
            "ANY" => Ok(Self::Any),
            "SECURE_SOFTWARE" => Ok(Self::SecureSoftware),
            "SECURE_HARDWARE" => Ok(Self::SecureHardware),
            other => Err(StorageError::InvalidRequest(format!(
                "Unknown security level: {}",
                other
            ))),
        }
    }
}

/// Static capabilities of a backend, used only for selection
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct CipherIdentity {
    /// Unique backend name, also persisted with each record
    pub name: &'static str,
    /// Lowest platform version the backend runs on
    pub min_platform_version: u32,
    /// Highest level the backend can provide
    pub security_level: SecurityLevel,
    /// Whether key material can live in secure hardware
    pub supports_hardware: bool,
    /// Whether keys can be gated on biometric authentication
    pub supports_biometry: bool,
}

/// Ciphertext plus the name of the backend that produced it
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct EncryptionResult {
    pub ciphertext: Vec<u8>,
    /// Back-reference into the registry; resolve with `BackendRegistry::find`
    pub backend: &'static str,
}

/// Decrypted plaintext and the level actually achieved
#[derive(Debug)]
pub struct DecryptionResult {
    plaintext: SecretString,
    pub achieved_level: SecurityLevel,
}

impl DecryptionResult {
    pub fn new(plaintext: String, achieved_level: SecurityLevel) -> Self {
        Self {
            plaintext: SecretString::new(plaintext),
            achieved_level,
        }
    }

    /// Get the plaintext (use carefully)
    pub fn plaintext(&self) -> &str {
        self.plaintext.expose()
    }

    /// Consume and return the plaintext
    pub fn into_plaintext(self) -> String {
        self.plaintext.into_inner()
    }
}

/// Placement information about a per-alias key
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct KeyInfo {
    pub alias: String,
    pub inside_secure_hardware: bool,
    pub created_at: Option<DateTime<Utc>>,
}

impl KeyInfo {
    /// Level the key placement provides
    pub fn security_level(&self) -> SecurityLevel {
        if self.inside_secure_hardware {
            SecurityLevel::SecureHardware
        } else {
            SecurityLevel::SecureSoftware
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_level_ordering() {
        assert!(SecurityLevel::Any < SecurityLevel::SecureSoftware);
        assert!(SecurityLevel::SecureSoftware < SecurityLevel::SecureHardware);
        assert!(SecurityLevel::SecureHardware.satisfies(SecurityLevel::Any));
        assert!(!SecurityLevel::Any.satisfies(SecurityLevel::SecureSoftware));
    }

    #[test]
    fn test_level_parsing() {
        assert_eq!(
            "secure-hardware".parse::<SecurityLevel>().unwrap(),
            SecurityLevel::SecureHardware
        );
        assert_eq!("ANY".parse::<SecurityLevel>().unwrap(), SecurityLevel::Any);
        assert!("TOP_SECRET".parse::<SecurityLevel>().is_err());
    }

    #[test]
    fn test_level_serde_names() {
        let json = serde_json::to_string(&SecurityLevel::SecureSoftware).unwrap();
        assert_eq!(json, "\"SECURE_SOFTWARE\"");

        let level: SecurityLevel = serde_json::from_str("\"SECURE_HARDWARE\"").unwrap();
        assert_eq!(level, SecurityLevel::SecureHardware);
    }

    #[test]
    fn test_decryption_result_debug_redacted() {
        let result = DecryptionResult::new("hunter2".to_string(), SecurityLevel::Any);
        let debug = format!("{:?}", result);
        assert!(!debug.contains("hunter2"));
        assert_eq!(result.plaintext(), "hunter2");
    }
}
