//! Small key/value persistence for client state that must survive restarts
//! (session tokens, the last known device).

use crate::config::AppConfig;
use crate::error::AppResult;
use std::collections::HashMap;
use std::path::{Path, PathBuf};
use std::sync::{Mutex, MutexGuard};

pub const SESSION_KEY: &str = "spotify-auth-storage";
pub const DEVICE_ID_KEY: &str = "spotify_device_id";
pub const DEVICE_ACTIVATED_AT_KEY: &str = "last_device_activation";

pub trait Storage: Send + Sync {
    fn get(&self, key: &str) -> Option<String>;
    fn set(&self, key: &str, value: &str) -> AppResult<()>;
    fn remove(&self, key: &str) -> AppResult<()>;
}

/// JSON object on disk, rewritten on every change.
pub struct FileStorage {
    path: PathBuf,
    entries: Mutex<HashMap<String, String>>,
}

impl FileStorage {
    pub fn open(path: impl AsRef<Path>) -> AppResult<Self> {
        let path = path.as_ref().to_path_buf();
        let entries = if path.exists() {
            let content = std::fs::read_to_string(&path)?;
            if content.trim().is_empty() {
                HashMap::new()
            } else {
                serde_json::from_str(&content)?
            }
        } else {
            HashMap::new()
        };

        Ok(Self {
            path,
            entries: Mutex::new(entries),
        })
    }

    pub fn open_default() -> AppResult<Self> {
        Self::open(AppConfig::storage_path()?)
    }

    fn entries(&self) -> MutexGuard<'_, HashMap<String, String>> {
        self.entries.lock().unwrap_or_else(|e| e.into_inner())
    }

    fn flush(&self, entries: &HashMap<String, String>) -> AppResult<()> {
        if let Some(dir) = self.path.parent() {
            std::fs::create_dir_all(dir)?;
        }
        let content = serde_json::to_string_pretty(entries)?;
        std::fs::write(&self.path, content)?;
        Ok(())
    }
}

impl Storage for FileStorage {
    fn get(&self, key: &str) -> Option<String> {
        self.entries().get(key).cloned()
    }

    fn set(&self, key: &str, value: &str) -> AppResult<()> {
        let mut entries = self.entries();
        entries.insert(key.to_string(), value.to_string());
        self.flush(&entries)
    }

    fn remove(&self, key: &str) -> AppResult<()> {
        let mut entries = self.entries();
        if entries.remove(key).is_some() {
            self.flush(&entries)?;
        }
        Ok(())
    }
}

#[derive(Default)]
pub struct MemoryStorage {
    entries: Mutex<HashMap<String, String>>,
}

impl MemoryStorage {
    pub fn new() -> Self {
        Self::default()
    }
}

impl Storage for MemoryStorage {
    fn get(&self, key: &str) -> Option<String> {
        self.entries
            .lock()
            .unwrap_or_else(|e| e.into_inner())
            .get(key)
            .cloned()
    }

    fn set(&self, key: &str, value: &str) -> AppResult<()> {
        self.entries
            .lock()
            .unwrap_or_else(|e| e.into_inner())
            .insert(key.to_string(), value.to_string());
        Ok(())
    }

    fn remove(&self, key: &str) -> AppResult<()> {
        self.entries
            .lock()
            .unwrap_or_else(|e| e.into_inner())
            .remove(key);
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn file_storage_survives_reopen() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("nested").join("storage.json");

        let storage = FileStorage::open(&path).unwrap();
        storage.set(DEVICE_ID_KEY, "device-1").unwrap();
        storage.set(DEVICE_ACTIVATED_AT_KEY, "1700000000000").unwrap();
        drop(storage);

        let reopened = FileStorage::open(&path).unwrap();
        assert_eq!(reopened.get(DEVICE_ID_KEY).as_deref(), Some("device-1"));

        reopened.remove(DEVICE_ID_KEY).unwrap();
        let again = FileStorage::open(&path).unwrap();
        assert!(again.get(DEVICE_ID_KEY).is_none());
        assert!(again.get(DEVICE_ACTIVATED_AT_KEY).is_some());
    }

    #[test]
    fn memory_storage_remove_missing_is_ok() {
        let storage = MemoryStorage::new();
        assert!(storage.remove(SESSION_KEY).is_ok());
        storage.set(SESSION_KEY, "{}").unwrap();
        assert_eq!(storage.get(SESSION_KEY).as_deref(), Some("{}"));
    }
}
