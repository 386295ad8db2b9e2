//! Ciphertext persistence and the key/value store built on the facade
//!
//! Backends only transform bytes; these types keep the output around:
//! 1. [`FileRecordStore`] (JSON file in the data directory)
//! 2. [`MemoryRecordStore`] (tests and ephemeral use)

mod file;
mod memory;
mod secure_store;
mod traits;

pub use file::FileRecordStore;
pub use memory::MemoryRecordStore;
pub use secure_store::{validate_namespace, SecureStore};
pub use traits::{Record, RecordStore};
