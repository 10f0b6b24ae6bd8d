//! Key-value storage for the simulator's answers.
//!
//! Storage is best effort: the [`Persistence`] wrapper logs and swallows every failure, so the
//! simulator only ever sees "saved answers" or "nothing saved".
use crate::simulator::SimulatorInput;
use log::warn;
use serde_json::Value;
use std::collections::HashMap;
use std::fs;
use std::io::ErrorKind;
use std::path::{Path, PathBuf};
use thiserror::Error;

/// Errors from a key-value store
#[derive(Debug, Error)]
pub enum StoreError {
    /// The store could not be reached
    #[error("Storage unavailable: {0}")]
    Unavailable(String),
    /// The key cannot be used with this store
    #[error("Invalid storage key: {0:?}")]
    InvalidKey(String),
}

/// A string-keyed store of string values
pub trait KeyValueStore {
    /// Get the value for `key`, if there is one
    fn get(&self, key: &str) -> Result<Option<String>, StoreError>;

    /// Set the value for `key`
    fn set(&mut self, key: &str, value: &str) -> Result<(), StoreError>;

    /// Remove the value for `key`. Removing a missing key is not an error.
    fn remove(&mut self, key: &str) -> Result<(), StoreError>;
}

/// A store held in memory.
///
/// A store can be created in an unavailable state, in which every operation fails, to stand in
/// for storage which has been disabled.
#[derive(Debug, Clone)]
pub struct MemoryStore {
    entries: HashMap<String, String>,
    available: bool,
}

impl Default for MemoryStore {
    fn default() -> Self {
        Self {
            entries: HashMap::new(),
            available: true,
        }
    }
}

impl MemoryStore {
    /// A store on which every operation fails
    pub fn unavailable() -> Self {
        Self {
            entries: HashMap::new(),
            available: false,
        }
    }

    /// Whether a value is stored for `key`
    pub fn contains_key(&self, key: &str) -> bool {
        self.entries.contains_key(key)
    }

    fn check_available(&self) -> Result<(), StoreError> {
        if self.available {
            Ok(())
        } else {
            Err(StoreError::Unavailable("store is disabled".to_string()))
        }
    }
}

impl KeyValueStore for MemoryStore {
    fn get(&self, key: &str) -> Result<Option<String>, StoreError> {
        self.check_available()?;
        Ok(self.entries.get(key).cloned())
    }

    fn set(&mut self, key: &str, value: &str) -> Result<(), StoreError> {
        self.check_available()?;
        self.entries.insert(key.to_string(), value.to_string());
        Ok(())
    }

    fn remove(&mut self, key: &str) -> Result<(), StoreError> {
        self.check_available()?;
        self.entries.remove(key);
        Ok(())
    }
}

/// A store keeping each value in its own JSON file within a directory
#[derive(Debug, Clone)]
pub struct FileStore {
    dir: PathBuf,
}

impl FileStore {
    /// Create a store in `dir`. The directory is created when the first value is written.
    pub fn new<P: Into<PathBuf>>(dir: P) -> Self {
        Self { dir: dir.into() }
    }

    /// The directory values are stored in
    pub fn dir(&self) -> &Path {
        &self.dir
    }

    /// The path of the file holding the value for `key`
    fn path_for(&self, key: &str) -> Result<PathBuf, StoreError> {
        let valid = !key.is_empty()
            && key
                .chars()
                .all(|c| c.is_ascii_alphanumeric() || c == '-' || c == '_');
        if !valid {
            return Err(StoreError::InvalidKey(key.to_string()));
        }

        Ok(self.dir.join(format!("{key}.json")))
    }
}

/// Convert an I/O error into a [`StoreError`]
fn unavailable(path: &Path, err: &std::io::Error) -> StoreError {
    StoreError::Unavailable(format!("{}: {err}", path.display()))
}

impl KeyValueStore for FileStore {
    fn get(&self, key: &str) -> Result<Option<String>, StoreError> {
        let path = self.path_for(key)?;
        match fs::read_to_string(&path) {
            Ok(value) => Ok(Some(value)),
            Err(err) if err.kind() == ErrorKind::NotFound => Ok(None),
            Err(err) => Err(unavailable(&path, &err)),
        }
    }

    fn set(&mut self, key: &str, value: &str) -> Result<(), StoreError> {
        let path = self.path_for(key)?;
        fs::create_dir_all(&self.dir).map_err(|err| unavailable(&self.dir, &err))?;
        fs::write(&path, value).map_err(|err| unavailable(&path, &err))
    }

    fn remove(&mut self, key: &str) -> Result<(), StoreError> {
        let path = self.path_for(key)?;
        match fs::remove_file(&path) {
            Err(err) if err.kind() != ErrorKind::NotFound => Err(unavailable(&path, &err)),
            _ => Ok(()),
        }
    }
}

/// Best-effort storage of the simulator's answers under a single key
#[derive(Debug)]
pub struct Persistence<S> {
    store: S,
    key: String,
}

impl<S: KeyValueStore> Persistence<S> {
    /// Store answers in `store` under `key`
    pub fn new(store: S, key: &str) -> Self {
        Self {
            store,
            key: key.to_string(),
        }
    }

    /// The underlying store
    pub fn store(&self) -> &S {
        &self.store
    }

    /// Load the saved answers, merged over the defaults field by field.
    ///
    /// Returns `None` if nothing is saved or the saved answers are not a JSON object. Fields which
    /// cannot be read keep their defaults (see [`SimulatorInput::merge_saved`]).
    pub fn load(&self) -> Option<SimulatorInput> {
        let raw = match self.store.get(&self.key) {
            Ok(raw) => raw?,
            Err(err) => {
                warn!("Could not load saved simulator answers: {err}");
                return None;
            }
        };

        match serde_json::from_str(&raw) {
            Ok(Value::Object(saved)) => Some(SimulatorInput::merge_saved(&saved)),
            Ok(_) => {
                warn!("Ignoring simulator answers which are not a JSON object");
                None
            }
            Err(err) => {
                warn!("Ignoring malformed simulator answers: {err}");
                None
            }
        }
    }

    /// Save the answers
    pub fn save(&mut self, input: &SimulatorInput) {
        let raw = match serde_json::to_string(input) {
            Ok(raw) => raw,
            Err(err) => {
                warn!("Could not serialise simulator answers: {err}");
                return;
            }
        };

        if let Err(err) = self.store.set(&self.key, &raw) {
            warn!("Could not save simulator answers: {err}");
        }
    }

    /// Erase the saved answers
    pub fn erase(&mut self) {
        if let Err(err) = self.store.remove(&self.key) {
            warn!("Could not erase saved simulator answers: {err}");
        }
    }
}
