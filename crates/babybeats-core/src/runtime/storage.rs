use std::collections::HashMap;
use std::fs;
use std::marker::PhantomData;
use std::path::{Path, PathBuf};
use std::sync::{Arc, Mutex, PoisonError};

use serde::Serialize;
use serde::de::DeserializeOwned;
use thiserror::Error;
use tracing::{debug, warn};

use crate::runtime::types::{TaskId, TaskRecord, TaskStatus};

/// Key the browser build stored its request map under.
pub const DEFAULT_STORE_KEY: &str = "babyBeats_aiRequests";

/// All task records, keyed by id.
pub type TaskMap<Req, Out> = HashMap<TaskId, TaskRecord<Req, Out>>;

/// Errors raised by the persistence layer. These stay inside the crate:
/// the manager logs them and keeps serving from memory.
#[derive(Debug, Error)]
pub enum StoreError {
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    /// Keys map to file names and may not contain path syntax.
    #[error("invalid store key: {0:?}")]
    InvalidKey(String),
}

/// Synchronous string key-value persistence.
pub trait KvStore: Send + Sync {
    fn get(&self, key: &str) -> Result<Option<String>, StoreError>;
    fn set(&self, key: &str, value: &str) -> Result<(), StoreError>;
    fn remove(&self, key: &str) -> Result<(), StoreError>;
}

/// One file per key inside a directory. Writes go to a temp file that is
/// then renamed over the old one, so readers never see a half-written blob.
#[derive(Debug, Clone)]
pub struct FileKvStore {
    dir: PathBuf,
}

impl FileKvStore {
    /// Open (creating if needed) a store rooted at `dir`.
    pub fn open(dir: impl Into<PathBuf>) -> Result<Self, StoreError> {
        let dir = dir.into();
        fs::create_dir_all(&dir)?;
        Ok(Self { dir })
    }

    pub fn dir(&self) -> &Path {
        &self.dir
    }

    fn path_for(&self, key: &str) -> Result<PathBuf, StoreError> {
        let valid = !key.is_empty()
            && key
                .chars()
                .all(|c| c.is_ascii_alphanumeric() || matches!(c, '_' | '-' | '.'))
            && !key.starts_with('.');
        if !valid {
            return Err(StoreError::InvalidKey(key.to_owned()));
        }
        Ok(self.dir.join(format!("{key}.json")))
    }
}

impl KvStore for FileKvStore {
    fn get(&self, key: &str) -> Result<Option<String>, StoreError> {
        match fs::read_to_string(self.path_for(key)?) {
            Ok(content) => Ok(Some(content)),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(None),
            Err(e) => Err(e.into()),
        }
    }

    fn set(&self, key: &str, value: &str) -> Result<(), StoreError> {
        let path = self.path_for(key)?;
        let temp_path = path.with_extension("json.tmp");
        fs::write(&temp_path, value)?;
        fs::rename(&temp_path, &path)?;
        Ok(())
    }

    fn remove(&self, key: &str) -> Result<(), StoreError> {
        match fs::remove_file(self.path_for(key)?) {
            Ok(()) => Ok(()),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(()),
            Err(e) => Err(e.into()),
        }
    }
}

/// Process-local store for tests and ephemeral deployments.
#[derive(Debug, Default)]
pub struct MemoryKvStore {
    inner: Mutex<HashMap<String, String>>,
}

impl MemoryKvStore {
    pub fn new() -> Self {
        Self::default()
    }
}

impl KvStore for MemoryKvStore {
    fn get(&self, key: &str) -> Result<Option<String>, StoreError> {
        let map = self.inner.lock().unwrap_or_else(PoisonError::into_inner);
        Ok(map.get(key).cloned())
    }

    fn set(&self, key: &str, value: &str) -> Result<(), StoreError> {
        let mut map = self.inner.lock().unwrap_or_else(PoisonError::into_inner);
        map.insert(key.to_owned(), value.to_owned());
        Ok(())
    }

    fn remove(&self, key: &str) -> Result<(), StoreError> {
        let mut map = self.inner.lock().unwrap_or_else(PoisonError::into_inner);
        map.remove(key);
        Ok(())
    }
}

/// Durable `id -> record` map stored as a single JSON blob under one key.
///
/// Saving always rewrites the whole map. Loading never fails: a missing,
/// unreadable or malformed blob yields an empty map, and the bad blob is
/// replaced by the next successful save.
pub struct TaskStore<Req, Out> {
    kv: Arc<dyn KvStore>,
    key: String,
    _records: PhantomData<fn() -> (Req, Out)>,
}

impl<Req, Out> Clone for TaskStore<Req, Out> {
    fn clone(&self) -> Self {
        Self {
            kv: Arc::clone(&self.kv),
            key: self.key.clone(),
            _records: PhantomData,
        }
    }
}

impl<Req, Out> std::fmt::Debug for TaskStore<Req, Out> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("TaskStore").field("key", &self.key).finish()
    }
}

impl<Req, Out> TaskStore<Req, Out>
where
    Req: Serialize + DeserializeOwned,
    Out: Serialize + DeserializeOwned,
{
    pub fn new(kv: Arc<dyn KvStore>, key: impl Into<String>) -> Self {
        Self {
            kv,
            key: key.into(),
            _records: PhantomData,
        }
    }

    pub fn key(&self) -> &str {
        &self.key
    }

    pub fn load(&self) -> TaskMap<Req, Out> {
        let raw = match self.kv.get(&self.key) {
            Ok(Some(raw)) => raw,
            Ok(None) => return TaskMap::new(),
            Err(e) => {
                warn!(key = %self.key, error = %e, "task store unreadable; starting empty");
                return TaskMap::new();
            }
        };

        match serde_json::from_str::<TaskMap<Req, Out>>(&raw) {
            Ok(map) => {
                debug!(key = %self.key, tasks = map.len(), "task store loaded");
                map
            }
            Err(e) => {
                warn!(key = %self.key, error = %e, "task store corrupt; discarding");
                TaskMap::new()
            }
        }
    }

    pub fn save(&self, map: &TaskMap<Req, Out>) -> Result<(), StoreError> {
        let blob = serde_json::to_string(map)?;
        self.kv.set(&self.key, &blob)
    }

    /// Ids of records that were still running when persisted; these are the
    /// candidates for resumption after a restart.
    pub fn interrupted(map: &TaskMap<Req, Out>) -> Vec<TaskId> {
        let mut ids: Vec<TaskId> = map
            .values()
            .filter(|r| r.status == TaskStatus::Running)
            .map(|r| r.id.clone())
            .collect();
        ids.sort();
        ids
    }
}
