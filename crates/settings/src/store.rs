use std::collections::HashMap;
use std::fs::{self, File, OpenOptions};
use std::path::{Path, PathBuf};
use std::sync::{Arc, PoisonError, RwLock, RwLockReadGuard, RwLockWriteGuard};

use fs2::FileExt;
use toml::{Table, Value};

use crate::{Settings, SettingsError};

/// Serialize a section struct into a TOML table.
fn to_table<T: Settings>(value: &T) -> Result<Table, SettingsError> {
    match Value::try_from(value)? {
        Value::Table(table) => Ok(table),
        _ => Err(SettingsError::Invalid("section must serialize to a table")),
    }
}

fn from_table<T: Settings>(table: &Table) -> Result<T, SettingsError> {
    Ok(Value::Table(table.clone()).try_into::<T>()?)
}

/// Typed check of a merged section table, kept per section for `reload`.
type Validator = fn(&Table) -> Result<(), SettingsError>;

fn validate_table<T: Settings>(table: &Table) -> Result<(), SettingsError> {
    from_table::<T>(table)?.validate()
}

/// Merge default + delta recursively (tables only).
fn merge_tables(default: &Table, delta: &Table) -> Table {
    let mut merged = default.clone();
    for (k, v_delta) in delta.iter() {
        match (merged.get(k), v_delta) {
            (Some(Value::Table(def_t)), Value::Table(delta_t)) => {
                let rec = merge_tables(def_t, delta_t);
                merged.insert(k.clone(), Value::Table(rec));
            }
            _ => {
                merged.insert(k.clone(), v_delta.clone());
            }
        }
    }
    merged
}

/// Recursive diff (new vs default). Keys equal to their default are dropped.
fn diff_tables(new_t: &Table, def_t: &Table) -> Table {
    let mut out = Table::new();
    for (k, new_v) in new_t.iter() {
        match (new_v, def_t.get(k)) {
            (Value::Table(new_sub), Some(Value::Table(def_sub))) => {
                let sub = diff_tables(new_sub, def_sub);
                if !sub.is_empty() {
                    out.insert(k.clone(), Value::Table(sub));
                }
            }
            (_, Some(def_v)) if def_v == new_v => {}
            _ => {
                out.insert(k.clone(), new_v.clone());
            }
        }
    }
    out
}

fn read_deltas(path: &Path) -> Result<Table, SettingsError> {
    let content = match fs::read_to_string(path) {
        Ok(content) => content,
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Ok(Table::new()),
        Err(e) => return Err(e.into()),
    };
    if content.trim().is_empty() {
        return Ok(Table::new());
    }
    Ok(toml::from_str(&content)?)
}

/// Builder for `SettingsStore` (single delta file).
#[derive(Default)]
pub struct SettingsStoreBuilder {
    settings_file: Option<PathBuf>,
}

impl SettingsStoreBuilder {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_settings_file<P: Into<PathBuf>>(mut self, path: P) -> Self {
        self.settings_file = Some(path.into());
        self
    }

    pub fn build(self) -> Result<SettingsStore, SettingsError> {
        let file_path = self
            .settings_file
            .ok_or(SettingsError::Invalid("settings file not specified"))?;

        if let Some(dir) = file_path.parent() {
            if !dir.as_os_str().is_empty() && !dir.exists() {
                fs::create_dir_all(dir)?;
            }
        }

        let deltas = read_deltas(&file_path)?;
        tracing::debug!(path = %file_path.display(), sections = deltas.len(), "settings loaded");

        Ok(SettingsStore {
            file_path,
            state: RwLock::new(StoreState {
                deltas,
                defaults: HashMap::new(),
                values: HashMap::new(),
                validators: HashMap::new(),
            }),
        })
    }
}

struct StoreState {
    /// section -> delta table as found on disk
    deltas: Table,
    /// section -> full default table
    defaults: HashMap<&'static str, Table>,
    /// section -> effective merged table
    values: HashMap<&'static str, Table>,
    validators: HashMap<&'static str, Validator>,
}

/// Settings store (thread-safe).
///
/// - `register` merges a section's defaults with the delta on disk
/// - `update` persists only the recursive diff against the defaults
/// - `reload` re-reads the delta file and re-merges all registered sections
pub struct SettingsStore {
    file_path: PathBuf,
    state: RwLock<StoreState>,
}

impl SettingsStore {
    pub fn builder() -> SettingsStoreBuilder {
        SettingsStoreBuilder::new()
    }

    pub fn file_path(&self) -> &PathBuf {
        &self.file_path
    }

    fn read_state(&self) -> RwLockReadGuard<'_, StoreState> {
        self.state.read().unwrap_or_else(PoisonError::into_inner)
    }

    fn write_state(&self) -> RwLockWriteGuard<'_, StoreState> {
        self.state.write().unwrap_or_else(PoisonError::into_inner)
    }

    /// Check if a section is already registered.
    pub fn is_registered<T: Settings>(&self) -> bool {
        self.read_state().values.contains_key(T::name())
    }

    /// Register a section type (loads defaults and applies existing delta if present).
    pub fn register<T: Settings>(&self) -> Result<(), SettingsError> {
        let section = T::name();
        let mut state = self.write_state();

        if state.values.contains_key(section) {
            return Err(SettingsError::Invalid("section already registered"));
        }

        let default_table = to_table(&T::default())?;
        let merged = match state.deltas.get(section) {
            Some(Value::Table(delta)) => merge_tables(&default_table, delta),
            Some(_) => return Err(SettingsError::Invalid("section delta must be a table")),
            None => default_table.clone(),
        };

        // Typed round trip catches wrong value types in the delta file early.
        validate_table::<T>(&merged)?;

        state.defaults.insert(section, default_table);
        state.values.insert(section, merged);
        state.validators.insert(section, validate_table::<T>);
        Ok(())
    }

    /// Snapshot get (Arc).
    pub fn get<T: Settings>(&self) -> Result<Arc<T>, SettingsError> {
        self.try_get::<T>()?.ok_or(SettingsError::NotRegistered)
    }

    /// Optional variant: None if not registered.
    pub fn try_get<T: Settings>(&self) -> Result<Option<Arc<T>>, SettingsError> {
        let state = self.read_state();
        let Some(table) = state.values.get(T::name()) else {
            return Ok(None);
        };
        Ok(Some(Arc::new(from_table(table)?)))
    }

    /// Update via mutable closure. Only the delta (recursive) is persisted.
    pub fn update<T, F>(&self, mutator: F) -> Result<(), SettingsError>
    where
        T: Settings,
        F: FnOnce(&mut T),
    {
        let section = T::name();
        let mut state = self.write_state();

        let current = state.values.get(section).ok_or(SettingsError::NotRegistered)?;
        let mut instance: T = from_table(current)?;
        mutator(&mut instance);
        instance.validate()?;

        let new_table = to_table(&instance)?;
        let default_table = state
            .defaults
            .get(section)
            .ok_or(SettingsError::NotRegistered)?;
        let diff = diff_tables(&new_table, default_table);

        let mut deltas = state.deltas.clone();
        if diff.is_empty() {
            deltas.remove(section);
        } else {
            deltas.insert(section.to_string(), Value::Table(diff));
        }

        // Memory only follows a successful write.
        self.persist_deltas(&deltas)?;
        state.deltas = deltas;
        state.values.insert(section, new_table);
        tracing::info!(section, "settings updated");
        Ok(())
    }

    /// Reload deltas from disk and re-merge all registered sections.
    ///
    /// Every section is validated before anything is replaced, so a bad file
    /// leaves the previous values in place.
    pub fn reload(&self) -> Result<(), SettingsError> {
        let new_deltas = read_deltas(&self.file_path)?;
        let mut state = self.write_state();

        let mut values = HashMap::with_capacity(state.defaults.len());
        for (section, default_table) in state.defaults.iter() {
            let merged = match new_deltas.get(*section) {
                Some(Value::Table(delta)) => merge_tables(default_table, delta),
                Some(_) => return Err(SettingsError::Invalid("section delta must be a table")),
                None => default_table.clone(),
            };
            if let Some(validate) = state.validators.get(section) {
                validate(&merged)?;
            }
            values.insert(*section, merged);
        }

        state.deltas = new_deltas;
        state.values = values;
        Ok(())
    }

    /// Exclusive advisory lock on `<file>.lock` for cross-process writers.
    fn lock_file(&self) -> Result<File, SettingsError> {
        let lock_path = self.file_path.with_extension("toml.lock");
        let file = OpenOptions::new()
            .read(true)
            .write(true)
            .create(true)
            .truncate(false)
            .open(lock_path)?;
        file.lock_exclusive()?;
        Ok(file)
    }

    fn persist_deltas(&self, deltas: &Table) -> Result<(), SettingsError> {
        let text = toml::to_string_pretty(deltas)?;

        let lock = self.lock_file()?;
        let tmp = self.file_path.with_extension("tmp");
        let written = fs::write(&tmp, text).and_then(|_| fs::rename(&tmp, &self.file_path));
        FileExt::unlock(&lock)?;
        written?;
        Ok(())
    }
}
