//! Backend registry and selection
//!
//! The registry is built once from an explicit [`RegistryConfig`] and never
//! mutated afterwards, so it can be shared across threads without locking.
//! Selection is a pure function of the capability table and the requested
//! level.

use std::sync::Arc;
use tracing::{debug, info};

use crate::cipher::{CipherBackend, CipherIdentity, SecurityLevel};
use crate::error::{Result, StorageError};

/// Construction-time registry configuration
pub struct RegistryConfig {
    /// Version of the platform the process runs on
    pub platform_version: u32,
    /// Candidate backends in preference order
    pub backends: Vec<Arc<dyn CipherBackend>>,
}

impl RegistryConfig {
    pub fn new(platform_version: u32) -> Self {
        Self {
            platform_version,
            backends: Vec::new(),
        }
    }

    /// Append a backend; earlier registrations win ties
    pub fn register(mut self, backend: Arc<dyn CipherBackend>) -> Self {
        self.backends.push(backend);
        self
    }
}

/// Ordered, read-only table of usable backends
#[derive(Clone)]
pub struct BackendRegistry {
    platform_version: u32,
    backends: Arc<[Arc<dyn CipherBackend>]>,
}

impl BackendRegistry {
    /// Build the table, dropping backends the platform is too old for
    pub fn new(config: RegistryConfig) -> Self {
        let platform_version = config.platform_version;

        let backends: Vec<Arc<dyn CipherBackend>> = config
            .backends
            .into_iter()
            .filter(|backend| {
                let identity = backend.identity();
                let usable = identity.min_platform_version <= platform_version;
                if !usable {
                    debug!(
                        "Skipping backend {} (needs platform {}, running {})",
                        identity.name, identity.min_platform_version, platform_version
                    );
                }
                usable
            })
            .collect();

        info!(
            "Registered {} backends for platform {}",
            backends.len(),
            platform_version
        );

        Self {
            platform_version,
            backends: backends.into(),
        }
    }

    /// Platform version the table was built for
    pub fn platform_version(&self) -> u32 {
        self.platform_version
    }

    /// Registered backends in preference order
    pub fn backends(&self) -> &[Arc<dyn CipherBackend>] {
        &self.backends
    }

    /// Capability table in preference order
    pub fn identities(&self) -> Vec<CipherIdentity> {
        self.backends.iter().map(|b| *b.identity()).collect()
    }

    /// Pick the strongest backend that satisfies `requested`
    ///
    /// Among eligible backends the highest declared level wins; equal levels
    /// fall back to registration order. Never downgrades: when nothing is
    /// eligible the call fails with `NoEligibleBackend`.
    pub fn select(&self, requested: SecurityLevel) -> Result<Arc<dyn CipherBackend>> {
        let mut best: Option<&Arc<dyn CipherBackend>> = None;

        for backend in self.backends.iter() {
            let level = backend.identity().security_level;
            if !level.satisfies(requested) {
                continue;
            }
            // Strictly greater keeps the earlier registration on ties
            match best {
                Some(current) if current.identity().security_level >= level => {}
                _ => best = Some(backend),
            }
        }

        match best {
            Some(backend) => {
                debug!("Selected {} for level {}", backend.name(), requested);
                Ok(backend.clone())
            }
            None => Err(StorageError::NoEligibleBackend {
                alias: String::new(),
                requested,
            }),
        }
    }

    /// Look up a backend by name
    pub fn find(&self, name: &str) -> Result<Arc<dyn CipherBackend>> {
        self.backends
            .iter()
            .find(|backend| backend.name() == name)
            .cloned()
            .ok_or_else(|| StorageError::UnknownBackend {
                alias: String::new(),
                name: name.to_string(),
            })
    }
}

#[cfg(test)]
pub(crate) mod tests {
    use super::*;
    use crate::cipher::{DecryptionResult, EncryptionResult};

    /// Backend that only carries an identity
    pub(crate) struct StubBackend {
        identity: CipherIdentity,
    }

    impl StubBackend {
        pub(crate) fn new(name: &'static str, level: SecurityLevel) -> Arc<dyn CipherBackend> {
            Self::with_version(name, level, 1)
        }

        pub(crate) fn with_version(
            name: &'static str,
            level: SecurityLevel,
            min_platform_version: u32,
        ) -> Arc<dyn CipherBackend> {
            Arc::new(Self {
                identity: CipherIdentity {
                    name,
                    min_platform_version,
                    security_level: level,
                    supports_hardware: level == SecurityLevel::SecureHardware,
                    supports_biometry: false,
                },
            })
        }
    }

    impl CipherBackend for StubBackend {
        fn identity(&self) -> &CipherIdentity {
            &self.identity
        }

        fn encrypt(&self, alias: &str, plaintext: &str, level: SecurityLevel) -> Result<EncryptionResult> {
            self.ensure_level(alias, level)?;
            Ok(EncryptionResult {
                ciphertext: plaintext.as_bytes().to_vec(),
                backend: self.identity.name,
            })
        }

        fn decrypt(&self, alias: &str, ciphertext: &[u8], level: SecurityLevel) -> Result<DecryptionResult> {
            self.ensure_level(alias, level)?;
            let plaintext = String::from_utf8(ciphertext.to_vec())
                .map_err(|e| self.crypto_failure(alias, e.to_string()))?;
            Ok(DecryptionResult::new(plaintext, self.identity.security_level))
        }

        fn remove_key(&self, _alias: &str) -> Result<()> {
            Ok(())
        }
    }

    fn registry(backends: Vec<Arc<dyn CipherBackend>>) -> BackendRegistry {
        BackendRegistry::new(RegistryConfig {
            platform_version: 30,
            backends,
        })
    }

    #[test]
    fn test_highest_level_preferred() {
        let registry = registry(vec![
            StubBackend::new("soft", SecurityLevel::Any),
            StubBackend::new("hw", SecurityLevel::SecureHardware),
        ]);

        assert_eq!(registry.select(SecurityLevel::SecureHardware).unwrap().name(), "hw");
        assert_eq!(registry.select(SecurityLevel::Any).unwrap().name(), "hw");
    }

    #[test]
    fn test_no_eligible_backend() {
        let registry = registry(vec![StubBackend::new("soft", SecurityLevel::Any)]);

        let err = registry.select(SecurityLevel::SecureSoftware).err().unwrap();
        assert!(matches!(
            err,
            StorageError::NoEligibleBackend {
                requested: SecurityLevel::SecureSoftware,
                ..
            }
        ));
    }

    #[test]
    fn test_empty_registry() {
        let registry = registry(Vec::new());
        assert!(registry.select(SecurityLevel::Any).is_err());
    }

    #[test]
    fn test_tie_break_by_registration_order() {
        let registry = registry(vec![
            StubBackend::new("first", SecurityLevel::SecureSoftware),
            StubBackend::new("second", SecurityLevel::SecureSoftware),
            StubBackend::new("weak", SecurityLevel::Any),
        ]);

        for _ in 0..10 {
            assert_eq!(registry.select(SecurityLevel::Any).unwrap().name(), "first");
        }
    }

    #[test]
    fn test_selection_never_returns_ineligible_backend() {
        let names = ["a", "b", "c"];
        // Every assignment of levels to three backends
        for i in 0..27usize {
            let levels = [
                SecurityLevel::ALL[i % 3],
                SecurityLevel::ALL[(i / 3) % 3],
                SecurityLevel::ALL[(i / 9) % 3],
            ];
            let registry = registry(
                names
                    .iter()
                    .zip(levels)
                    .map(|(name, level)| StubBackend::new(*name, level))
                    .collect(),
            );

            for requested in SecurityLevel::ALL {
                let best = levels.iter().copied().filter(|l| *l >= requested).max();
                match registry.select(requested) {
                    Ok(backend) => {
                        let level = backend.identity().security_level;
                        assert!(level >= requested);
                        assert_eq!(Some(level), best);
                        let first = levels.iter().position(|l| *l == level).unwrap();
                        assert_eq!(backend.name(), names[first]);
                    }
                    Err(StorageError::NoEligibleBackend { .. }) => assert!(best.is_none()),
                    Err(other) => panic!("unexpected error: {other}"),
                }
            }
        }
    }

    #[test]
    fn test_platform_version_filter() {
        let registry = BackendRegistry::new(
            RegistryConfig::new(18)
                .register(StubBackend::with_version("modern", SecurityLevel::SecureHardware, 23))
                .register(StubBackend::with_version("legacy", SecurityLevel::SecureSoftware, 18)),
        );

        assert_eq!(registry.backends().len(), 1);
        assert_eq!(registry.select(SecurityLevel::Any).unwrap().name(), "legacy");
        assert!(registry.select(SecurityLevel::SecureHardware).is_err());
    }

    #[test]
    fn test_find_by_name() {
        let registry = registry(vec![
            StubBackend::new("soft", SecurityLevel::Any),
            StubBackend::new("hw", SecurityLevel::SecureHardware),
        ]);

        assert_eq!(registry.find("soft").unwrap().name(), "soft");
        assert!(matches!(
            registry.find("gone"),
            Err(StorageError::UnknownBackend { .. })
        ));
        assert_eq!(registry.identities()[1].name, "hw");
    }
}
