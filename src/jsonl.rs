// JSONL file operations and the append-only key-value log built on them

use crate::kv::KeyValueStore;
use crate::models::now_ms;
use eyre::{Context, Result, eyre};
use fs2::FileExt;
use serde::{Deserialize, Serialize, de::DeserializeOwned};
use std::cell::{Cell, RefCell};
use std::collections::HashMap;
use std::fs::{self, File, OpenOptions};
use std::io::{BufRead, BufReader, Write};
use std::path::{Path, PathBuf};
use tracing::{debug, info, warn};

/// Append a record to a JSONL file
pub fn append_jsonl<T: Serialize>(path: &Path, record: &T) -> Result<()> {
    let mut file = OpenOptions::new()
        .create(true)
        .append(true)
        .open(path)
        .context("Failed to open JSONL file for appending")?;

    file.lock_exclusive().context("Failed to acquire file lock")?;

    let json = serde_json::to_string(record)?;
    writeln!(file, "{}", json)?;
    file.sync_all()?; // Ensure data is flushed to disk

    // Lock is released when file is dropped
    Ok(())
}

/// Lines read from a JSONL file, reduced to the latest version per ID
pub struct LatestRecords<T> {
    pub records: HashMap<String, T>,
    /// Non-blank lines seen, including superseded and malformed ones
    pub line_count: usize,
}

/// Read all records from a JSONL file, returning latest version per ID
///
/// For records with duplicate IDs, the one with the highest updated_at wins.
/// On equal timestamps the later line wins.
pub fn read_jsonl_latest<T>(path: &Path) -> Result<LatestRecords<T>>
where
    T: DeserializeOwned + HasId + HasUpdatedAt,
{
    if !path.exists() {
        // File doesn't exist yet
        return Ok(LatestRecords {
            records: HashMap::new(),
            line_count: 0,
        });
    }

    let file = File::open(path).context("Failed to open JSONL file")?;
    let reader = BufReader::new(file);
    let mut records: HashMap<String, T> = HashMap::new();
    let mut line_count = 0;

    for (line_num, line) in reader.lines().enumerate() {
        let line = match line {
            Ok(l) => l,
            Err(e) => {
                warn!(
                    file = ?path,
                    line = line_num + 1,
                    error = ?e,
                    "Failed to read line, skipping"
                );
                continue;
            }
        };

        if line.trim().is_empty() {
            continue;
        }
        line_count += 1;

        let record: T = match serde_json::from_str(&line) {
            Ok(r) => r,
            Err(e) => {
                warn!(
                    file = ?path,
                    line = line_num + 1,
                    error = ?e,
                    "Failed to parse JSON, skipping"
                );
                continue;
            }
        };

        let id = record.id();
        let updated_at = record.updated_at();

        // Keep the record with the latest updated_at
        let superseded = records
            .get(&id)
            .is_some_and(|existing| updated_at < existing.updated_at());
        if !superseded {
            records.insert(id, record);
        }
    }

    info!(
        file = ?path,
        count = records.len(),
        lines = line_count,
        "Loaded latest records from JSONL"
    );

    Ok(LatestRecords { records, line_count })
}

/// Trait for types that have an ID field
pub trait HasId {
    fn id(&self) -> String;
}

/// Trait for types that have an updated_at timestamp
pub trait HasUpdatedAt {
    fn updated_at(&self) -> i64;
}

/// One line of the key-value log
#[derive(Debug, Clone, Serialize, Deserialize)]
struct Entry {
    key: String,
    value: String,
    updated_at: i64,
}

impl HasId for Entry {
    fn id(&self) -> String {
        self.key.clone()
    }
}

impl HasUpdatedAt for Entry {
    fn updated_at(&self) -> i64 {
        self.updated_at
    }
}

/// Key-value storage as an append-only JSONL log.
///
/// Every `set` appends a line; the file is read once on open and the latest
/// line per key is cached. The log is rewritten with one line per key once it
/// grows past the compaction threshold.
///
/// Stamps are strictly increasing across the whole log, so the last line
/// written wins on reload even if the wall clock has stepped backwards.
pub struct JsonlStorage {
    path: PathBuf,
    entries: RefCell<HashMap<String, Entry>>,
    last_updated: Cell<i64>,
    line_count: Cell<usize>,
    compact_threshold: usize,
}

impl JsonlStorage {
    /// Open (or lazily create) the log at `path`
    pub fn open<P: AsRef<Path>>(path: P, compact_threshold: usize) -> Result<Self> {
        let path = path.as_ref().to_path_buf();
        let latest = read_jsonl_latest::<Entry>(&path)?;
        let last_updated = latest.records.values().map(|e| e.updated_at).max().unwrap_or(0);

        Ok(Self {
            path,
            entries: RefCell::new(latest.records),
            last_updated: Cell::new(last_updated),
            line_count: Cell::new(latest.line_count),
            compact_threshold,
        })
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Lines currently in the log file
    pub fn line_count(&self) -> usize {
        self.line_count.get()
    }

    /// Current time, bumped past the newest stamp in the log
    fn next_stamp(&self) -> i64 {
        let stamp = now_ms().max(self.last_updated.get().saturating_add(1));
        self.last_updated.set(stamp);
        stamp
    }

    fn needs_compaction(&self) -> bool {
        let lines = self.line_count.get();
        lines > self.compact_threshold && lines > 2 * self.entries.borrow().len()
    }

    fn rewrite(&self) -> Result<usize> {
        let before = self.line_count.get();
        let entries = self.entries.borrow();

        let mut sorted: Vec<&Entry> = entries.values().collect();
        sorted.sort_by(|a, b| a.updated_at.cmp(&b.updated_at).then_with(|| a.key.cmp(&b.key)));

        let file_name = self
            .path
            .file_name()
            .and_then(|s| s.to_str())
            .ok_or_else(|| eyre!("Invalid JSONL filename: {:?}", self.path))?;
        let tmp_path = self.path.with_file_name(format!("{}.tmp", file_name));

        {
            let mut file = File::create(&tmp_path).context("Failed to create compaction file")?;
            file.lock_exclusive().context("Failed to acquire file lock")?;
            for entry in &sorted {
                let json = serde_json::to_string(entry)?;
                writeln!(file, "{}", json)?;
            }
            file.sync_all()?;
        }

        fs::rename(&tmp_path, &self.path).context("Failed to replace JSONL file")?;
        self.line_count.set(sorted.len());

        let dropped = before.saturating_sub(sorted.len());
        debug!(file = ?self.path, dropped, "Compacted JSONL log");
        Ok(dropped)
    }
}

impl KeyValueStore for JsonlStorage {
    fn get(&self, key: &str) -> Result<Option<String>> {
        Ok(self.entries.borrow().get(key).map(|e| e.value.clone()))
    }

    fn set(&self, key: &str, value: &str) -> Result<()> {
        let entry = Entry {
            key: key.to_string(),
            value: value.to_string(),
            updated_at: self.next_stamp(),
        };

        append_jsonl(&self.path, &entry)?;
        debug!(key, bytes = value.len(), "Appended entry");

        self.entries.borrow_mut().insert(entry.key.clone(), entry);
        self.line_count.set(self.line_count.get() + 1);

        // The value is durable once appended; a failed rewrite only leaves the log long
        if self.needs_compaction() {
            if let Err(e) = self.rewrite() {
                warn!(file = ?self.path, error = %e, "Compaction failed, keeping uncompacted log");
            }
        }

        Ok(())
    }

    fn compact(&self) -> Result<usize> {
        if self.line_count.get() == self.entries.borrow().len() {
            return Ok(0);
        }
        self.rewrite()
    }
}
