use std::cell::RefCell;
use std::collections::HashMap;
use std::fs;
use std::io::{ErrorKind, Write};
use std::path::{Path, PathBuf};

use anyhow::{Context, anyhow};
use tempfile::NamedTempFile;
use tracing::{debug, info, warn};

use crate::task::Task;

/// Slot holding the serialized task list.
pub const TASKS_KEY: &str = "todos";

/// A durable string key-value store.
pub trait Storage {
    fn get_item(&self, key: &str) -> anyhow::Result<Option<String>>;
    fn set_item(&self, key: &str, value: &str) -> anyhow::Result<()>;
}

/// One `<key>.json` file per slot under a data directory.
#[derive(Debug)]
pub struct FileStorage {
    pub data_dir: PathBuf,
}

impl FileStorage {
    #[tracing::instrument(skip(data_dir))]
    pub fn open(data_dir: &Path) -> anyhow::Result<Self> {
        let data_dir = data_dir.to_path_buf();
        fs::create_dir_all(&data_dir)
            .with_context(|| format!("failed to create {}", data_dir.display()))?;

        info!(data_dir = %data_dir.display(), "opened file storage");
        Ok(Self { data_dir })
    }

    pub fn slot_path(&self, key: &str) -> PathBuf {
        self.data_dir.join(format!("{key}.json"))
    }
}

impl Storage for FileStorage {
    #[tracing::instrument(skip(self))]
    fn get_item(&self, key: &str) -> anyhow::Result<Option<String>> {
        let path = self.slot_path(key);
        match fs::read_to_string(&path) {
            Ok(raw) => {
                debug!(file = %path.display(), bytes = raw.len(), "read slot");
                Ok(Some(raw))
            }
            Err(err) if err.kind() == ErrorKind::NotFound => Ok(None),
            Err(err) => Err(err).with_context(|| format!("failed reading {}", path.display())),
        }
    }

    #[tracing::instrument(skip(self, value))]
    fn set_item(&self, key: &str, value: &str) -> anyhow::Result<()> {
        let path = self.slot_path(key);
        debug!(file = %path.display(), bytes = value.len(), "writing slot atomically");

        let mut temp = NamedTempFile::new_in(&self.data_dir)?;
        temp.write_all(value.as_bytes())?;
        temp.flush()?;
        temp.persist(&path)
            .map_err(|err| anyhow!("failed to persist {}: {}", path.display(), err))?;
        Ok(())
    }
}

/// In-process storage, mainly for tests.
#[derive(Debug, Default)]
pub struct MemoryStorage {
    slots: RefCell<HashMap<String, String>>,
}

impl Storage for MemoryStorage {
    fn get_item(&self, key: &str) -> anyhow::Result<Option<String>> {
        Ok(self.slots.borrow().get(key).cloned())
    }

    fn set_item(&self, key: &str, value: &str) -> anyhow::Result<()> {
        self.slots
            .borrow_mut()
            .insert(key.to_string(), value.to_string());
        Ok(())
    }
}

/// Mirrors the task list into a storage slot.
#[derive(Debug)]
pub struct DataStore<S: Storage> {
    storage: S,
}

impl DataStore<FileStorage> {
    pub fn open(data_dir: &Path) -> anyhow::Result<Self> {
        Ok(Self::new(FileStorage::open(data_dir)?))
    }
}

impl<S: Storage> DataStore<S> {
    pub fn new(storage: S) -> Self {
        Self { storage }
    }

    pub fn storage(&self) -> &S {
        &self.storage
    }

    /// Loads the list. A missing or unreadable slot yields an empty list.
    #[tracing::instrument(skip(self))]
    pub fn load(&self) -> Vec<Task> {
        let raw = match self.storage.get_item(TASKS_KEY) {
            Ok(Some(raw)) => raw,
            Ok(None) => {
                debug!("no stored tasks, starting empty");
                return Vec::new();
            }
            Err(err) => {
                warn!(error = %format!("{err:#}"), "failed reading stored tasks, starting empty");
                return Vec::new();
            }
        };

        match decode(&raw) {
            Ok(tasks) => {
                debug!(count = tasks.len(), "loaded tasks");
                tasks
            }
            Err(err) => {
                warn!(error = %err, "stored tasks are malformed, starting empty");
                Vec::new()
            }
        }
    }

    #[tracing::instrument(skip(self, tasks), fields(count = tasks.len()))]
    pub fn save(&self, tasks: &[Task]) -> anyhow::Result<()> {
        let serialized = encode(tasks)?;
        self.storage
            .set_item(TASKS_KEY, &serialized)
            .with_context(|| format!("failed to save slot {TASKS_KEY}"))
    }
}

pub fn encode(tasks: &[Task]) -> anyhow::Result<String> {
    serde_json::to_string(tasks).context("failed to serialize tasks")
}

pub fn decode(raw: &str) -> anyhow::Result<Vec<Task>> {
    let trimmed = raw.trim();
    if trimmed.is_empty() || trimmed == "null" {
        return Ok(Vec::new());
    }
    serde_json::from_str(trimmed).context("failed to parse tasks")
}
