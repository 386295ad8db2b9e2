//! File-backed record store
//!
//! Records live in `records.json` in the data directory. Values are already
//! ciphertext, so the file itself is plain JSON. Every mutation rewrites the
//! file through a temp file and a rename.

use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fs;
use std::path::{Path, PathBuf};
use std::sync::RwLock;
use tracing::debug;

use super::{Record, RecordStore};
use crate::error::{Result, StorageError};

const FILE_VERSION: u32 = 1;

/// On-disk layout
#[derive(Debug, Serialize, Deserialize)]
struct RecordFile {
    version: u32,
    records: BTreeMap<String, Record>,
}

/// Record store persisted as a JSON file
pub struct FileRecordStore {
    storage_dir: PathBuf,
    cache: RwLock<BTreeMap<String, Record>>,
}

impl FileRecordStore {
    /// Open (or create) the store under `storage_dir`
    pub fn with_dir(storage_dir: impl Into<PathBuf>) -> Result<Self> {
        let storage_dir = storage_dir.into();
        fs::create_dir_all(&storage_dir)?;

        let records = Self::load(&storage_dir.join("records.json"))?;
        debug!("Record store at {:?} holds {} records", storage_dir, records.len());

        Ok(Self {
            storage_dir,
            cache: RwLock::new(records),
        })
    }

    fn file_path(&self) -> PathBuf {
        self.storage_dir.join("records.json")
    }

    fn load(path: &Path) -> Result<BTreeMap<String, Record>> {
        if !path.exists() {
            debug!("No existing record file found");
            return Ok(BTreeMap::new());
        }

        let contents = fs::read_to_string(path)?;
        let file: RecordFile = serde_json::from_str(&contents)?;
        if file.version != FILE_VERSION {
            return Err(StorageError::StorageError(format!(
                "Unsupported record file version {}",
                file.version
            )));
        }
        Ok(file.records)
    }

    fn save(&self, records: &BTreeMap<String, Record>) -> Result<()> {
        let file = RecordFile {
            version: FILE_VERSION,
            records: records.clone(),
        };
        let contents = serde_json::to_string_pretty(&file)?;

        let path = self.file_path();
        let temp_path = path.with_extension("tmp");
        fs::write(&temp_path, &contents)?;
        fs::rename(&temp_path, &path)?;

        debug!("Saved {} records", records.len());
        Ok(())
    }

    /// Apply `change` to a copy of the records, persist it, then publish it
    ///
    /// The cache only moves once the file has been written, so a failed
    /// save leaves memory and disk agreeing on the previous state.
    fn commit<T>(&self, change: impl FnOnce(&mut BTreeMap<String, Record>) -> T) -> Result<T> {
        let mut cache = self.cache.write().map_err(|_| poisoned())?;
        let mut next = cache.clone();
        let outcome = change(&mut next);
        self.save(&next)?;
        *cache = next;
        Ok(outcome)
    }
}

fn poisoned() -> StorageError {
    StorageError::StorageError("record cache lock poisoned".to_string())
}

impl RecordStore for FileRecordStore {
    fn put(&self, key: &str, record: Record) -> Result<()> {
        self.commit(|records| {
            records.insert(key.to_string(), record);
        })?;
        debug!("Stored record: {}", key);
        Ok(())
    }

    fn get(&self, key: &str) -> Result<Option<Record>> {
        let cache = self.cache.read().map_err(|_| poisoned())?;
        Ok(cache.get(key).cloned())
    }

    fn delete(&self, key: &str) -> Result<bool> {
        if !self.cache.read().map_err(|_| poisoned())?.contains_key(key) {
            return Ok(false);
        }
        let existed = self.commit(|records| records.remove(key).is_some())?;
        debug!("Deleted record: {}", key);
        Ok(existed)
    }

    fn keys(&self, prefix: &str) -> Result<Vec<String>> {
        let cache = self.cache.read().map_err(|_| poisoned())?;
        Ok(cache
            .keys()
            .filter(|k| k.starts_with(prefix))
            .cloned()
            .collect())
    }

    fn clear(&self) -> Result<()> {
        self.commit(|records| records.clear())?;
        debug!("Cleared all records");
        Ok(())
    }
}
