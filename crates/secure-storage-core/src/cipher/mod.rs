//! Cipher backend contract
//!
//! Every concrete strategy (platform keystore, legacy keystore, shared-key
//! symmetric library) implements [`CipherBackend`]. Callers never talk to a
//! backend directly; they go through the facade.

mod traits;
mod types;

pub use traits::CipherBackend;
pub use types::{
    CipherIdentity, DecryptionResult, EncryptionResult, KeyInfo, SecurityLevel,
};
