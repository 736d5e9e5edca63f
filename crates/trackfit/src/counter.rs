//! Durable per-prefix counters.
//!
//! Values are stored as decimal strings under `qr_counter_<PREFIX>`. Stores
//! hand back the raw text so the caller decides how junk is interpreted (see
//! [`parse_counter`]).

use std::collections::BTreeMap;
use std::fs::{self, File, OpenOptions};
use std::path::{Path, PathBuf};
use std::sync::{PoisonError, RwLock};

use fs2::FileExt;
use thiserror::Error;
use toml::{Table, Value};

#[derive(Error, Debug)]
pub enum StoreError {
    #[error("counter store io error: {0}")]
    Io(#[from] std::io::Error),

    #[error("counter file is not valid TOML: {0}")]
    Parse(#[from] toml::de::Error),

    #[error("counter file could not be written: {0}")]
    Serialize(#[from] toml::ser::Error),

    #[error("counter {key} kept changing under concurrent writers")]
    Contended { key: String },

    #[error("counter {key} has no successor in the supported range")]
    Exhausted { key: String },
}

/// Key-value store holding one counter per prefix.
pub trait CounterStore: Send + Sync {
    /// Raw stored value, `None` when the key was never written.
    fn read(&self, key: &str) -> Result<Option<String>, StoreError>;

    fn write(&self, key: &str, value: u64) -> Result<(), StoreError>;

    /// Writes `value` only if the stored raw value still equals `expected`.
    /// Returns whether the write happened.
    fn compare_and_swap(
        &self,
        key: &str,
        expected: Option<&str>,
        value: u64,
    ) -> Result<bool, StoreError>;

    /// All stored `(key, raw value)` pairs, ordered by key.
    fn entries(&self) -> Result<Vec<(String, String)>, StoreError>;
}

/// Interprets a stored counter.
///
/// Leading whitespace is skipped and the longest run of leading digits is
/// used (`"12abc"` -> 12). Missing values, values without leading digits and
/// 0 start the sequence at 1. `None` when the digits do not fit in a `u64`.
pub fn parse_counter(raw: Option<&str>) -> Option<u64> {
    let Some(raw) = raw else {
        return Some(1);
    };
    let trimmed = raw.trim_start();
    let digits_end = trimmed
        .find(|c: char| !c.is_ascii_digit())
        .unwrap_or(trimmed.len());
    let digits = &trimmed[..digits_end];
    if digits.is_empty() {
        return Some(1);
    }
    match digits.parse::<u64>() {
        Ok(0) => Some(1),
        Ok(n) => Some(n),
        Err(_) => None,
    }
}

/// In-memory store for tests and throwaway sessions.
#[derive(Debug, Default)]
pub struct MemoryCounterStore {
    values: RwLock<BTreeMap<String, String>>,
}

impl MemoryCounterStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Seed a raw value, including values a real store might have picked up
    /// from elsewhere (`"abc"`, `"0"`).
    pub fn with_raw(self, key: impl Into<String>, raw: impl Into<String>) -> Self {
        self.values
            .write()
            .unwrap_or_else(PoisonError::into_inner)
            .insert(key.into(), raw.into());
        self
    }
}

impl CounterStore for MemoryCounterStore {
    fn read(&self, key: &str) -> Result<Option<String>, StoreError> {
        let values = self.values.read().unwrap_or_else(PoisonError::into_inner);
        Ok(values.get(key).cloned())
    }

    fn write(&self, key: &str, value: u64) -> Result<(), StoreError> {
        let mut values = self.values.write().unwrap_or_else(PoisonError::into_inner);
        values.insert(key.to_string(), value.to_string());
        Ok(())
    }

    fn compare_and_swap(
        &self,
        key: &str,
        expected: Option<&str>,
        value: u64,
    ) -> Result<bool, StoreError> {
        let mut values = self.values.write().unwrap_or_else(PoisonError::into_inner);
        if values.get(key).map(String::as_str) != expected {
            return Ok(false);
        }
        values.insert(key.to_string(), value.to_string());
        Ok(true)
    }

    fn entries(&self) -> Result<Vec<(String, String)>, StoreError> {
        let values = self.values.read().unwrap_or_else(PoisonError::into_inner);
        Ok(values.iter().map(|(k, v)| (k.clone(), v.clone())).collect())
    }
}

/// File-backed store: one TOML table of `key = "value"` pairs.
///
/// Every call re-reads the file, so several processes sharing the file see
/// each other's writes. Mutations hold an exclusive `fs2` lock on a sibling
/// `.lock` file and replace the data file via temp file + rename.
#[derive(Debug, Clone)]
pub struct FileCounterStore {
    path: PathBuf,
}

impl FileCounterStore {
    /// Open (or lazily create) the counter file. Parent directories are created.
    pub fn open(path: impl Into<PathBuf>) -> Result<Self, StoreError> {
        let path = path.into();
        if let Some(parent) = path.parent() {
            if !parent.as_os_str().is_empty() {
                fs::create_dir_all(parent)?;
            }
        }
        Ok(Self { path })
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    fn lock_file(&self) -> Result<File, StoreError> {
        Ok(OpenOptions::new()
            .read(true)
            .write(true)
            .create(true)
            .truncate(false)
            .open(self.path.with_extension("toml.lock"))?)
    }

    fn load(&self) -> Result<Table, StoreError> {
        let content = match fs::read_to_string(&self.path) {
            Ok(content) => content,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Ok(Table::new()),
            Err(e) => return Err(e.into()),
        };
        Ok(toml::from_str(&content)?)
    }

    fn save(&self, table: &Table) -> Result<(), StoreError> {
        let text = toml::to_string(table)?;
        let tmp = self.path.with_extension("tmp");
        fs::write(&tmp, text)?;
        fs::rename(&tmp, &self.path)?;
        Ok(())
    }

    fn with_shared<R>(&self, f: impl FnOnce(&Table) -> R) -> Result<R, StoreError> {
        let lock = self.lock_file()?;
        lock.lock_shared()?;
        let result = self.load().map(|table| f(&table));
        FileExt::unlock(&lock)?;
        result
    }

    fn with_exclusive<R>(
        &self,
        f: impl FnOnce(&mut Table) -> Result<(R, bool), StoreError>,
    ) -> Result<R, StoreError> {
        let lock = self.lock_file()?;
        lock.lock_exclusive()?;
        let result = self.load().and_then(|mut table| {
            let (value, dirty) = f(&mut table)?;
            if dirty {
                self.save(&table)?;
            }
            Ok(value)
        });
        FileExt::unlock(&lock)?;
        result
    }
}

fn raw_value(value: &Value) -> String {
    match value {
        Value::String(s) => s.clone(),
        other => other.to_string(),
    }
}

impl CounterStore for FileCounterStore {
    fn read(&self, key: &str) -> Result<Option<String>, StoreError> {
        self.with_shared(|table| table.get(key).map(raw_value))
    }

    fn write(&self, key: &str, value: u64) -> Result<(), StoreError> {
        self.with_exclusive(|table| {
            table.insert(key.to_string(), Value::String(value.to_string()));
            Ok(((), true))
        })
    }

    fn compare_and_swap(
        &self,
        key: &str,
        expected: Option<&str>,
        value: u64,
    ) -> Result<bool, StoreError> {
        self.with_exclusive(|table| {
            let current = table.get(key).map(raw_value);
            if current.as_deref() != expected {
                return Ok((false, false));
            }
            table.insert(key.to_string(), Value::String(value.to_string()));
            Ok((true, true))
        })
    }

    fn entries(&self) -> Result<Vec<(String, String)>, StoreError> {
        self.with_shared(|table| {
            let mut entries: Vec<_> = table
                .iter()
                .map(|(k, v)| (k.clone(), raw_value(v)))
                .collect();
            entries.sort();
            entries
        })
    }
}
