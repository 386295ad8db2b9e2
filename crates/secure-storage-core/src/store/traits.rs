//! Record store trait definitions

use serde::{Deserialize, Serialize};
use chrono::{DateTime, Utc};

use crate::cipher::SecurityLevel;
use crate::error::Result;

/// Ciphertext persisted for one key, with the backend that produced it
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Record {
    /// Name of the producing backend
    pub backend: String,
    /// Level requested when the value was stored
    pub level: SecurityLevel,
    /// Base64 ciphertext
    pub ciphertext: String,
    pub updated_at: DateTime<Utc>,
}

/// Persistence for ciphertext records
pub trait RecordStore: Send + Sync {
    /// Insert or replace the record under `key`
    fn put(&self, key: &str, record: Record) -> Result<()>;

    /// Fetch the record under `key`
    fn get(&self, key: &str) -> Result<Option<Record>>;

    /// Remove the record under `key`; returns whether one existed
    fn delete(&self, key: &str) -> Result<bool>;

    /// All keys starting with `prefix`
    fn keys(&self, prefix: &str) -> Result<Vec<String>>;

    /// Remove every record
    fn clear(&self) -> Result<()>;
}
