//! Request/response contract for host adapters
//!
//! A host (bridge call, RPC, CLI) deserializes a [`Request`], hands it to
//! [`SecureStorageFacade::handle`] and serializes the [`Response`]. Bytes
//! travel as standard base64 in JSON.

use serde::{Deserialize, Serialize};

use crate::cipher::SecurityLevel;
use crate::error::{ErrorKind, Result, StorageError};
use crate::facade::SecureStorageFacade;

/// Operation requested by the host
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum Operation {
    Encrypt,
    Decrypt,
    RemoveKey,
}

/// Payload of a request
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum Value {
    Text(String),
    Bytes(#[serde(with = "base64_bytes")] Vec<u8>),
}

/// One call into the facade
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Request {
    pub operation: Operation,
    pub alias: String,
    #[serde(default)]
    pub value: Option<Value>,
    #[serde(default)]
    pub level: SecurityLevel,
    /// Backend that produced the ciphertext (decrypt / removeKey)
    #[serde(default)]
    pub backend: Option<String>,
}

/// Result of a call, or the typed error it failed with
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "status", rename_all = "camelCase")]
pub enum Response {
    #[serde(rename_all = "camelCase")]
    Encrypted {
        #[serde(with = "base64_bytes")]
        ciphertext: Vec<u8>,
        backend: String,
    },
    #[serde(rename_all = "camelCase")]
    Decrypted {
        plaintext: String,
        level: SecurityLevel,
    },
    #[serde(rename_all = "camelCase")]
    Removed { alias: String },
    #[serde(rename_all = "camelCase")]
    Error {
        kind: ErrorKind,
        message: String,
        alias: Option<String>,
        backend: Option<String>,
    },
}

impl Response {
    /// Error response for a failed request on `alias`
    pub fn from_error(error: &StorageError, alias: &str) -> Self {
        Self::Error {
            kind: error.kind(),
            message: error.to_string(),
            alias: Some(error.alias().unwrap_or(alias).to_string()),
            backend: error.backend().map(str::to_string),
        }
    }

    pub fn is_error(&self) -> bool {
        matches!(self, Self::Error { .. })
    }
}

impl SecureStorageFacade {
    /// Serve one request; failures become `Response::Error`
    pub fn handle(&self, request: Request) -> Response {
        let alias = request.alias.clone();
        self.dispatch(request)
            .unwrap_or_else(|e| Response::from_error(&e, &alias))
    }

    fn dispatch(&self, request: Request) -> Result<Response> {
        let Request {
            operation,
            alias,
            value,
            level,
            backend,
        } = request;

        match operation {
            Operation::Encrypt => {
                let plaintext = match value {
                    Some(Value::Text(text)) => text,
                    Some(Value::Bytes(bytes)) => String::from_utf8(bytes).map_err(|_| {
                        StorageError::InvalidRequest("encrypt value must be UTF-8".to_string())
                    })?,
                    None => {
                        return Err(StorageError::InvalidRequest(
                            "encrypt requires a value".to_string(),
                        ))
                    }
                };

                let encrypted = self.encrypt(&alias, &plaintext, level)?;
                Ok(Response::Encrypted {
                    ciphertext: encrypted.ciphertext,
                    backend: encrypted.backend.to_string(),
                })
            }
            Operation::Decrypt => {
                let ciphertext = match value {
                    Some(Value::Bytes(bytes)) => bytes,
                    _ => {
                        return Err(StorageError::InvalidRequest(
                            "decrypt requires a bytes value".to_string(),
                        ))
                    }
                };

                let decrypted = match backend.as_deref() {
                    Some(name) => self.decrypt_with(name, &alias, &ciphertext, level)?,
                    None => self.decrypt(&alias, &ciphertext, level)?,
                };
                let level = decrypted.achieved_level;
                Ok(Response::Decrypted {
                    plaintext: decrypted.into_plaintext(),
                    level,
                })
            }
            Operation::RemoveKey => {
                match backend.as_deref() {
                    Some(name) => self.remove_key_with(name, &alias)?,
                    None => self.remove_key(&alias, level)?,
                }
                Ok(Response::Removed { alias })
            }
        }
    }
}

/// Serde adapter encoding bytes as base64 strings
mod base64_bytes {
    use base64::Engine;
    use serde::{Deserialize, Deserializer, Serializer};

    pub fn serialize<S: Serializer>(bytes: &[u8], serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_str(&base64::engine::general_purpose::STANDARD.encode(bytes))
    }

    pub fn deserialize<'de, D: Deserializer<'de>>(deserializer: D) -> Result<Vec<u8>, D::Error> {
        let encoded = String::deserialize(deserializer)?;
        base64::engine::general_purpose::STANDARD
            .decode(encoded)
            .map_err(serde::de::Error::custom)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::backends::SharedKeyBackend;
    use crate::platform::memory::StaticKeyChain;
    use crate::platform::AesGcmEntityCipher;
    use crate::registry::{BackendRegistry, RegistryConfig};
    use std::sync::Arc;

    fn facade() -> SecureStorageFacade {
        let cipher = AesGcmEntityCipher::new(Arc::new(StaticKeyChain::random()));
        let registry = BackendRegistry::new(
            RegistryConfig::new(16).register(Arc::new(SharedKeyBackend::new(Arc::new(cipher)))),
        );
        SecureStorageFacade::new(registry)
    }

    #[test]
    fn test_request_json_shape() {
        let json = r#"{"operation":"encrypt","alias":"token","value":{"text":"abc"},"level":"ANY"}"#;
        let request: Request = serde_json::from_str(json).unwrap();

        assert_eq!(request.operation, Operation::Encrypt);
        assert_eq!(request.value, Some(Value::Text("abc".to_string())));
        assert_eq!(request.backend, None);
    }

    #[test]
    fn test_encrypt_then_decrypt_requests() {
        let facade = facade();

        let response = facade.handle(Request {
            operation: Operation::Encrypt,
            alias: "token".to_string(),
            value: Some(Value::Text("abc".to_string())),
            level: SecurityLevel::Any,
            backend: None,
        });
        let (ciphertext, backend) = match response {
            Response::Encrypted { ciphertext, backend } => (ciphertext, backend),
            other => panic!("unexpected response: {:?}", other),
        };

        // Survives a JSON hop like a real host would make
        let request: Request = serde_json::from_value(serde_json::json!({
            "operation": "decrypt",
            "alias": "token",
            "value": { "bytes": base64::Engine::encode(&base64::engine::general_purpose::STANDARD, &ciphertext) },
            "backend": backend,
        }))
        .unwrap();

        assert_eq!(
            facade.handle(request),
            Response::Decrypted {
                plaintext: "abc".to_string(),
                level: SecurityLevel::Any,
            }
        );
    }

    #[test]
    fn test_error_response_is_typed() {
        let facade = facade();

        let response = facade.handle(Request {
            operation: Operation::Encrypt,
            alias: "token".to_string(),
            value: Some(Value::Text("abc".to_string())),
            level: SecurityLevel::SecureHardware,
            backend: None,
        });

        match response {
            Response::Error { kind, alias, .. } => {
                assert_eq!(kind, ErrorKind::NoEligibleBackend);
                assert_eq!(alias.as_deref(), Some("token"));
            }
            other => panic!("unexpected response: {:?}", other),
        }

        let json = serde_json::to_value(facade.handle(Request {
            operation: Operation::Decrypt,
            alias: "token".to_string(),
            value: Some(Value::Text("not bytes".to_string())),
            level: SecurityLevel::Any,
            backend: None,
        }))
        .unwrap();
        assert_eq!(json["status"], "error");
        assert_eq!(json["kind"], "INVALID_REQUEST");
    }

    #[test]
    fn test_remove_key_request() {
        let facade = facade();
        let response = facade.handle(Request {
            operation: Operation::RemoveKey,
            alias: "token".to_string(),
            value: None,
            level: SecurityLevel::Any,
            backend: Some(SharedKeyBackend::NAME.to_string()),
        });

        assert_eq!(
            response,
            Response::Removed {
                alias: "token".to_string()
            }
        );
        assert!(!response.is_error());
    }
}
