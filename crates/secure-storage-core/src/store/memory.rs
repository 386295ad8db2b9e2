//! In-memory record store

use std::collections::HashMap;
use std::sync::RwLock;

use super::{Record, RecordStore};
use crate::error::{Result, StorageError};

/// Records kept in a map; lost on drop
#[derive(Default)]
pub struct MemoryRecordStore {
    records: RwLock<HashMap<String, Record>>,
}

impl MemoryRecordStore {
    pub fn new() -> Self {
        Self::default()
    }
}

fn poisoned() -> StorageError {
    StorageError::StorageError("record lock poisoned".to_string())
}

impl RecordStore for MemoryRecordStore {
    fn put(&self, key: &str, record: Record) -> Result<()> {
        self.records
            .write()
            .map_err(|_| poisoned())?
            .insert(key.to_string(), record);
        Ok(())
    }

    fn get(&self, key: &str) -> Result<Option<Record>> {
        Ok(self.records.read().map_err(|_| poisoned())?.get(key).cloned())
    }

    fn delete(&self, key: &str) -> Result<bool> {
        Ok(self.records.write().map_err(|_| poisoned())?.remove(key).is_some())
    }

    fn keys(&self, prefix: &str) -> Result<Vec<String>> {
        Ok(self
            .records
            .read()
            .map_err(|_| poisoned())?
            .keys()
            .filter(|k| k.starts_with(prefix))
            .cloned()
            .collect())
    }

    fn clear(&self) -> Result<()> {
        self.records.write().map_err(|_| poisoned())?.clear();
        Ok(())
    }
}
