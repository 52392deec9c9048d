//! Durable key-value storage for the pieces of state that must survive a restart: the remembered
//! login and the pending-operation queue.

use crate::{fs, Result};
use anyhow::Context;
use std::collections::BTreeMap;
use std::path::{Path, PathBuf};
use std::sync::Mutex;
use tracing::trace;

/// A string-to-string store. Implementations must make `set` and `remove` durable before they
/// return.
pub trait Storage: Send + Sync {
    fn get(&self, key: &str) -> Result<Option<String>>;
    fn set(&self, key: &str, value: &str) -> Result<()>;
    fn remove(&self, key: &str) -> Result<()>;
}

/// Keeps everything in memory, for tests.
#[derive(Debug, Default)]
pub struct MemoryStorage {
    map: Mutex<BTreeMap<String, String>>,
}

impl MemoryStorage {
    pub fn new() -> Self {
        Self::default()
    }
}

impl Storage for MemoryStorage {
    fn get(&self, key: &str) -> Result<Option<String>> {
        Ok(lock(&self.map)?.get(key).cloned())
    }

    fn set(&self, key: &str, value: &str) -> Result<()> {
        lock(&self.map)?.insert(key.to_string(), value.to_string());
        Ok(())
    }

    fn remove(&self, key: &str) -> Result<()> {
        lock(&self.map)?.remove(key);
        Ok(())
    }
}

/// Keeps all keys in a single JSON object file, e.g. `$EXPENSES_HOME/storage.json`.
///
/// The whole file is rewritten on every change. A missing file reads as an empty store.
#[derive(Debug)]
pub struct FileStorage {
    path: PathBuf,
    // Serializes read-modify-write cycles within this process.
    guard: Mutex<()>,
}

impl FileStorage {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self {
            path: path.into(),
            guard: Mutex::new(()),
        }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    fn read_map(&self) -> Result<BTreeMap<String, String>> {
        match fs::read_optional(&self.path)? {
            None => Ok(BTreeMap::new()),
            Some(content) if content.trim().is_empty() => Ok(BTreeMap::new()),
            Some(content) => serde_json::from_str(&content).with_context(|| {
                format!("Failed to parse storage file at {}", self.path.display())
            }),
        }
    }

    fn write_map(&self, map: &BTreeMap<String, String>) -> Result<()> {
        let data = serde_json::to_vec_pretty(map).context("Unable to serialize storage")?;
        fs::write_replace(&self.path, &data)
    }

    fn modify<F>(&self, f: F) -> Result<()>
    where
        F: FnOnce(&mut BTreeMap<String, String>),
    {
        let _guard = lock(&self.guard)?;
        let mut map = self.read_map()?;
        f(&mut map);
        self.write_map(&map)
    }
}

impl Storage for FileStorage {
    fn get(&self, key: &str) -> Result<Option<String>> {
        let _guard = lock(&self.guard)?;
        Ok(self.read_map()?.remove(key))
    }

    fn set(&self, key: &str, value: &str) -> Result<()> {
        trace!("Storing {key} in {}", self.path.display());
        self.modify(|map| {
            map.insert(key.to_string(), value.to_string());
        })
    }

    fn remove(&self, key: &str) -> Result<()> {
        trace!("Removing {key} from {}", self.path.display());
        self.modify(|map| {
            map.remove(key);
        })
    }
}

pub(crate) fn lock<T>(mutex: &Mutex<T>) -> Result<std::sync::MutexGuard<'_, T>> {
    mutex
        .lock()
        .map_err(|_| anyhow::anyhow!("A storage lock was poisoned by a panicked thread"))
}
