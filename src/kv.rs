// Key-value persistence shared by the task list and theme stores

use crate::config::Config;
use crate::jsonl::JsonlStorage;
use crate::sqlite::SqliteStorage;
use clap::ValueEnum;
use eyre::{Context, Result};
use serde::{Deserialize, Serialize};
use std::cell::RefCell;
use std::collections::HashMap;
use std::fs;
use std::rc::Rc;
use tracing::{debug, info};

/// Serialized task list
pub const TODOS_KEY: &str = "todos";

/// Theme flag, stored as the literal `"true"` or `"false"`
pub const DARK_MODE_KEY: &str = "darkMode";

/// Raw task list value that failed to parse, kept aside on load
pub const CORRUPT_TODOS_KEY: &str = "todos.corrupt";

const CURRENT_VERSION: u32 = 1;

/// String-keyed, string-valued persistent storage.
///
/// Writes are synchronous: once `set` returns, the value is durable.
pub trait KeyValueStore {
    fn get(&self, key: &str) -> Result<Option<String>>;

    fn set(&self, key: &str, value: &str) -> Result<()>;

    /// Reclaim space. Returns how many stale entries were dropped.
    fn compact(&self) -> Result<usize> {
        Ok(0)
    }
}

/// Storage kept in process memory only
#[derive(Debug, Default)]
pub struct MemoryStorage {
    entries: RefCell<HashMap<String, String>>,
}

impl MemoryStorage {
    pub fn new() -> Self {
        Self::default()
    }
}

impl KeyValueStore for MemoryStorage {
    fn get(&self, key: &str) -> Result<Option<String>> {
        Ok(self.entries.borrow().get(key).cloned())
    }

    fn set(&self, key: &str, value: &str) -> Result<()> {
        self.entries.borrow_mut().insert(key.to_string(), value.to_string());
        Ok(())
    }
}

/// Which storage implementation to open.
///
/// `Memory` keeps nothing between processes; it is meant for tests and
/// embedding, not for the one-shot CLI.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize, ValueEnum)]
#[serde(rename_all = "lowercase")]
pub enum Backend {
    #[default]
    Jsonl,
    Sqlite,
    Memory,
}

impl Backend {
    /// Whether values outlive the process
    pub fn is_persistent(self) -> bool {
        !matches!(self, Backend::Memory)
    }
}

/// Open the configured backend under `config.data_dir`
pub fn open_backend(config: &Config) -> Result<Rc<dyn KeyValueStore>> {
    if config.backend == Backend::Memory {
        debug!("Using in-memory storage");
        return Ok(Rc::new(MemoryStorage::new()));
    }

    let data_dir = config.data_dir();
    fs::create_dir_all(&data_dir).context("Failed to create data directory")?;
    write_version(&data_dir)?;

    info!(backend = ?config.backend, dir = ?data_dir, "Opening storage");

    let storage: Rc<dyn KeyValueStore> = match config.backend {
        Backend::Jsonl => Rc::new(JsonlStorage::open(
            data_dir.join("storage.jsonl"),
            config.compact_threshold,
        )?),
        Backend::Sqlite => Rc::new(SqliteStorage::open(data_dir.join("storage.db"))?),
        Backend::Memory => Rc::new(MemoryStorage::new()),
    };

    Ok(storage)
}

fn write_version(data_dir: &std::path::Path) -> Result<()> {
    let version_path = data_dir.join(".version");
    if !version_path.exists() {
        fs::write(version_path, CURRENT_VERSION.to_string()).context("Failed to write version file")?;
    }
    Ok(())
}
